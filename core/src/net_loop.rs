//! The async edge `CipContext`'s synchronous decision logic is driven from:
//! one TCP listener, three UDP sockets (unicast/broadcast explicit, and one
//! shared consuming/producing multicast pair), and a tick timer, all polled
//! from a single `tokio::select!` loop on a current-thread runtime. No
//! `tokio::spawn` anywhere - every accepted TCP connection is tracked in
//! this struct and polled for readiness alongside everything else, the way
//! a single-owner event loop has to when it can't hand work off to another
//! task.

use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::os::fd::{AsRawFd, FromRawFd, IntoRawFd};
use std::rc::Rc;
use std::time::{Duration, Instant};

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use nix::sys::socket::{self, sockopt, AddressFamily, SockFlag, SockProtocol, SockType};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream, UdpSocket};

use cip_ioconn::{derive_multicast_address, ConsumingSocketPlan, ProducingSocketPlan};
use cip_object::ConnectionHandle;

use crate::context::{CipContext, TcpToken};
use crate::explicit::ExplicitOutcome;
use crate::io_runtime::SocketToken;

const BROADCAST_ADDR: Ipv4Addr = Ipv4Addr::new(255, 255, 255, 255);

/// Creates a UDP socket with `SO_REUSEADDR` set before bind, needed so the
/// broadcast and multicast explicit-messaging listeners can share port
/// 0xAF12 with the unicast one.
fn bind_udp_shared(addr: SocketAddr) -> io::Result<std::net::UdpSocket> {
	let fd = socket::socket(AddressFamily::Inet, SockType::Datagram, SockFlag::empty(), None::<SockProtocol>)?;
	socket::setsockopt(&fd, sockopt::ReuseAddr, &true)?;
	let sock_addr = socket::SockaddrIn::from(match addr {
		SocketAddr::V4(a) => a,
		SocketAddr::V6(_) => return Err(io::Error::new(io::ErrorKind::InvalidInput, "IPv6 not supported")),
	});
	socket::bind(fd.as_raw_fd(), &sock_addr)?;
	let std_socket = unsafe { std::net::UdpSocket::from_raw_fd(fd.into_raw_fd()) };
	std_socket.set_nonblocking(true)?;
	Ok(std_socket)
}

/// A TCP-carried explicit session: the accepted stream plus the partially
/// received bytes of the encapsulation message currently in flight.
struct TcpConn {
	stream: TcpStream,
	peer_ip: IpAddr,
	read_buf: Vec<u8>,
}

/// Owns every socket the CIP stack needs and drives `CipContext` from them.
/// Built once at startup by `adapterd`'s `main`, then run for the process's
/// lifetime.
pub struct NetLoop {
	tcp_listener: TcpListener,
	tcp_connections: HashMap<TcpToken, Rc<std::cell::RefCell<TcpConn>>>,
	next_tcp_token: u64,

	explicit_unicast: UdpSocket,
	explicit_broadcast: UdpSocket,
	explicit_multicast: UdpSocket,

	io_unicast: UdpSocket,
	io_multicast_recv: UdpSocket,
	io_multicast_send: UdpSocket,
	multicast_group: Ipv4Addr,
	io_port: u16,

	tick: tokio::time::Interval,
}

/// The two shared I/O sockets' tokens, stable for the process's lifetime -
/// every point-to-point connection shares the unicast pair, every multicast
/// connection shares the multicast pair.
const TOKEN_IO_UNICAST: SocketToken = SocketToken(0);
const TOKEN_IO_MULTICAST: SocketToken = SocketToken(1);

impl NetLoop {
	pub async fn bind(device_ip: Ipv4Addr, netmask: Ipv4Addr, tick_usecs: u32, tcp_port: u16, io_port: u16) -> io::Result<Self> {
		let tcp_listener = TcpListener::bind(SocketAddr::new(IpAddr::V4(device_ip), tcp_port)).await?;

		let explicit_unicast = UdpSocket::bind(SocketAddr::new(IpAddr::V4(device_ip), tcp_port)).await?;
		let explicit_broadcast = UdpSocket::from_std(bind_udp_shared(SocketAddr::new(IpAddr::V4(BROADCAST_ADDR), tcp_port))?)?;
		let multicast_group = derive_multicast_address(device_ip, netmask);
		let explicit_multicast_std = bind_udp_shared(SocketAddr::new(IpAddr::V4(multicast_group), tcp_port))?;
		explicit_multicast_std.join_multicast_v4(&multicast_group, &device_ip)?;
		let explicit_multicast = UdpSocket::from_std(explicit_multicast_std)?;

		let io_unicast = UdpSocket::bind(SocketAddr::new(IpAddr::V4(device_ip), io_port)).await?;
		let io_multicast_recv_std = bind_udp_shared(SocketAddr::new(IpAddr::V4(multicast_group), io_port))?;
		io_multicast_recv_std.join_multicast_v4(&multicast_group, &device_ip)?;
		let io_multicast_recv = UdpSocket::from_std(io_multicast_recv_std)?;
		let io_multicast_send = UdpSocket::bind(SocketAddr::new(IpAddr::V4(device_ip), 0)).await?;

		let mut tick = tokio::time::interval(Duration::from_micros(tick_usecs as u64));
		tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

		Ok(NetLoop {
			tcp_listener,
			tcp_connections: HashMap::new(),
			next_tcp_token: 0,
			explicit_unicast,
			explicit_broadcast,
			explicit_multicast,
			io_unicast,
			io_multicast_recv,
			io_multicast_send,
			multicast_group,
			io_port,
			tick,
		})
	}

	/// Runs until a fatal socket error occurs. Intended to be awaited once
	/// from `main`, for the lifetime of the process.
	pub async fn run(&mut self, ctx: &mut CipContext) -> io::Result<()> {
		let mut buf = vec![0u8; 2048];
		loop {
			let mut readable: FuturesUnordered<_> = self
				.tcp_connections
				.iter()
				.map(|(token, conn)| {
					let token = *token;
					let conn = conn.clone();
					Box::pin(async move {
						let ready = conn.borrow().stream.readable().await;
						(token, ready)
					})
				})
				.collect();

			tokio::select! {
				accepted = self.tcp_listener.accept() => {
					if let Ok((stream, peer)) = accepted {
						let token = TcpToken(self.next_tcp_token);
						self.next_tcp_token += 1;
						self.tcp_connections.insert(token, Rc::new(std::cell::RefCell::new(TcpConn {
							stream,
							peer_ip: peer.ip(),
							read_buf: Vec::new(),
						})));
					}
				}

				Some((token, ready)) = readable.next(), if !readable.is_empty() => {
					if ready.is_ok() {
						self.service_tcp_connection(ctx, token, &mut buf).await;
					}
				}

				result = self.explicit_unicast.recv_from(&mut buf) => {
					if let Ok((n, from)) = result {
						self.dispatch_explicit_udp(ctx, &buf[..n], from, true);
					}
				}

				result = self.explicit_broadcast.recv_from(&mut buf) => {
					if let Ok((n, from)) = result {
						self.dispatch_explicit_udp(ctx, &buf[..n], from, false);
					}
				}

				result = self.explicit_multicast.recv_from(&mut buf) => {
					if let Ok((n, from)) = result {
						self.dispatch_explicit_udp(ctx, &buf[..n], from, false);
					}
				}

				result = self.io_unicast.recv_from(&mut buf) => {
					if let Ok((n, from)) = result {
						self.dispatch_io_datagram(ctx, &buf[..n], from.ip());
					}
				}

				result = self.io_multicast_recv.recv_from(&mut buf) => {
					if let Ok((n, from)) = result {
						self.dispatch_io_datagram(ctx, &buf[..n], from.ip());
					}
				}

				_ = self.tick.tick() => {
					self.run_tick(ctx).await;
				}
			}
		}
	}

	async fn service_tcp_connection(&mut self, ctx: &mut CipContext, token: TcpToken, buf: &mut [u8]) {
		let Some(conn_rc) = self.tcp_connections.get(&token).cloned() else { return };
		let peer_ip = conn_rc.borrow().peer_ip;

		let n = {
			let mut conn = conn_rc.borrow_mut();
			match conn.stream.try_read(buf) {
				Ok(0) => {
					drop(conn);
					self.close_tcp_connection(ctx, token);
					return;
				}
				Ok(n) => n,
				Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
				Err(_) => {
					drop(conn);
					self.close_tcp_connection(ctx, token);
					return;
				}
			}
		};

		conn_rc.borrow_mut().read_buf.extend_from_slice(&buf[..n]);

		loop {
			let message = {
				let conn = conn_rc.borrow();
				if conn.read_buf.len() < 24 {
					None
				} else {
					let length = u16::from_le_bytes([conn.read_buf[2], conn.read_buf[3]]) as usize;
					let total = 24 + length;
					if conn.read_buf.len() < total {
						None
					} else {
						Some(conn.read_buf[..total].to_vec())
					}
				}
			};
			let Some(message) = message else { break };
			conn_rc.borrow_mut().read_buf.drain(..message.len());

			match ctx.handle_received_explicit_tcp_data(token, peer_ip, &message) {
				Some(ExplicitOutcome::Reply(bytes)) => {
					let mut conn = conn_rc.borrow_mut();
					let _ = conn.stream.write_all(&bytes).await;
					drop(conn);
					self.promote_new_connections(ctx).await;
				}
				Some(ExplicitOutcome::NoReply) => {
					self.promote_new_connections(ctx).await;
				}
				Some(ExplicitOutcome::CloseSession) => {
					self.close_tcp_connection(ctx, token);
					return;
				}
				None => break,
			}
		}
	}

	fn close_tcp_connection(&mut self, ctx: &mut CipContext, token: TcpToken) {
		ctx.sessions.close_socket(token);
		self.tcp_connections.remove(&token);
	}

	fn dispatch_explicit_udp(&mut self, ctx: &mut CipContext, bytes: &[u8], from: SocketAddr, is_unicast: bool) {
		match ctx.handle_received_explicit_udp_data(bytes, from, is_unicast, Instant::now()) {
			Some(ExplicitOutcome::Reply(reply)) => {
				let socket = if is_unicast { &self.explicit_unicast } else { &self.explicit_broadcast };
				let _ = socket.try_send_to(&reply, from);
			}
			_ => {}
		}
	}

	fn dispatch_io_datagram(&mut self, ctx: &mut CipContext, bytes: &[u8], from: IpAddr) {
		let connection_id = cip_cpf::Message::parse(bytes).ok().and_then(|m| match m.address {
			cip_cpf::AddressItem::Connected { connection_id } | cip_cpf::AddressItem::Sequenced { connection_id, .. } => Some(connection_id),
			cip_cpf::AddressItem::Null => None,
		});
		if let Some(handle) = ctx.find_consuming_connection(from, connection_id) {
			let _ = ctx.handle_io_datagram(handle, from, bytes);
		}
	}

	async fn run_tick(&mut self, ctx: &mut CipContext) {
		let report = ctx.manage_connections(self.tick.period().as_micros() as u32);
		for send in report.sends {
			let socket = self.socket_for_token(send.socket);
			if let Some(socket) = socket {
				let _ = socket.try_send_to(&send.bytes, send.dest);
			}
		}

		let now = Instant::now();
		for pending in ctx.delay_queue.drain_ready(now) {
			let reply = ctx.build_delayed_list_identity_reply(pending.sender_context);
			let _ = self.explicit_unicast.try_send_to(&reply, pending.dest);
		}

		self.promote_new_connections(ctx).await;
	}

	fn socket_for_token(&self, token: SocketToken) -> Option<&UdpSocket> {
		match token {
			TOKEN_IO_UNICAST => Some(&self.io_unicast),
			TOKEN_IO_MULTICAST => Some(&self.io_multicast_send),
			_ => None,
		}
	}

	/// Finalizes socket setup for every connection Forward_Open just moved
	/// into `Configuring`: the plan only ever resolves to one of the shared
	/// sockets above, so there is nothing to bind here - just record which
	/// shared socket and destination the connection uses and flip its state.
	async fn promote_new_connections(&mut self, ctx: &mut CipContext) {
		for plan in ctx.connections_awaiting_socket_setup() {
			let consuming_socket = match plan.consuming {
				ConsumingSocketPlan::None => None,
				ConsumingSocketPlan::BindPointToPoint => Some(TOKEN_IO_UNICAST),
				ConsumingSocketPlan::BindMulticastGroup => Some(TOKEN_IO_MULTICAST),
			};

			let (producing_socket, send_address) = match plan.producing {
				ProducingSocketPlan::None => (None, None),
				ProducingSocketPlan::SendPointToPoint { dest_port } => (Some(TOKEN_IO_UNICAST), Some(SocketAddr::new(plan.originator_ip, dest_port))),
				ProducingSocketPlan::BindNewMulticastGroup => (Some(TOKEN_IO_MULTICAST), Some(SocketAddr::new(IpAddr::V4(self.multicast_group), self.io_port))),
				ProducingSocketPlan::ReuseExisting(peer) => self.reuse_peer_producing(ctx, peer),
			};

			ctx.mark_connection_established(plan.handle, consuming_socket, producing_socket, send_address, true);
		}
	}

	fn reuse_peer_producing(&self, _ctx: &CipContext, _peer: ConnectionHandle) -> (Option<SocketToken>, Option<SocketAddr>) {
		(Some(TOKEN_IO_MULTICAST), Some(SocketAddr::new(IpAddr::V4(self.multicast_group), self.io_port)))
	}
}
