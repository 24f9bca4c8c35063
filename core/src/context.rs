//! `CipContext`: the single collaborator surface (§6) that ties the
//! encapsulation/session layer, the object model, the Connection Manager,
//! and the I/O connection runtime together. Everything here is synchronous
//! and single-threaded - no socket, no timer, no task spawn - so the whole
//! stack can be driven from one `tokio::select!` loop without a `Mutex`
//! anywhere in sight, the same way the teacher stack's single-owner
//! collaborators (e.g. `BusAPI`) are driven from one task.

use std::cell::RefCell;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::rc::Rc;

use cip_connmgr::{register as register_conn_mgr, ActiveConnections, AssemblyBuffers, ConnMgrState, ConnectionPoint, ConnectionState, ExpectationKind};
use cip_encap::{DelayQueue, SessionTable};
use cip_ioconn::{plan_consuming_socket, plan_producing_socket, round_up_to_tick, ConsumingSocketPlan, ProducingSocketPlan, ProductionTimer};
use cip_object::{build_assembly_instance, ApplicationHooks, Class, ConnectionHandle, IoConnectionEvent, ObjectModel, ASSEMBLY_ALL_MASK, ASSEMBLY_CLASS_ID};

use crate::identity::{build_identity_class, DeviceConfig};
use crate::io_runtime::{IoRuntime, SocketToken};

/// Identifies a TCP connection the NetLoop owns, opaque to `cip-core`'s
/// synchronous logic the same way [`SocketToken`] stands in for a UDP
/// socket. `cip_encap::SessionTable` is generic over exactly this kind of
/// handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TcpToken(pub u64);

/// One outbound class 0/1 datagram `manage_connections` decided to produce,
/// for the NetLoop to actually write to a socket.
pub struct SendAction {
	pub socket: SocketToken,
	pub dest: SocketAddr,
	pub bytes: Vec<u8>,
}

/// The outcome of one `ManageConnections` tick: frames ready to send, and
/// connections that left the active set (timed out, or cascaded alongside
/// one that did) so the NetLoop can tear down their sockets.
#[derive(Default)]
pub struct ManageReport {
	pub sends: Vec<SendAction>,
	pub closed: Vec<ConnectionHandle>,
}

/// What a Forward_Open newly admitted into `Configuring` needs from the
/// NetLoop before it can be promoted to `Established`. Socket binding is
/// inherently asynchronous, so `cip-core`'s synchronous logic only ever
/// decides the plan; see [`CipContext::mark_connection_established`] and
/// [`CipContext::fail_connection_setup`] for the two ways the NetLoop
/// reports back.
pub struct SocketPlan {
	pub handle: ConnectionHandle,
	pub originator_ip: IpAddr,
	pub consuming: ConsumingSocketPlan,
	pub producing: ProducingSocketPlan,
}

/// All process-wide CIP stack state: the object model, the Connection
/// Manager (shared with its registered Forward_Open/Forward_Close
/// services via `Rc<RefCell<..>>`, per `cip_object::Service`'s design), the
/// TCP session table, the delayed-ListIdentity queue, and the per-connection
/// I/O runtime bookkeeping `cip-ioconn`'s pure decision logic needs a home
/// for.
pub struct CipContext {
	pub object_model: ObjectModel,
	pub conn_mgr: Rc<RefCell<ConnMgrState>>,
	pub assemblies: AssemblyBuffers,
	pub sessions: SessionTable<TcpToken>,
	pub delay_queue: DelayQueue,
	pub hooks: Rc<RefCell<dyn ApplicationHooks>>,
	pub device: DeviceConfig,
	pub netmask: Ipv4Addr,
	pub tick_usecs: u32,
	io_runtimes: HashMap<ConnectionHandle, IoRuntime>,
	pub logger: slog::Logger,
}

impl CipContext {
	/// `CipStackInit`'s equivalent: builds the Identity and Connection
	/// Manager classes and wires the Connection Manager's state, ready for
	/// the integrator to configure connection points and assembly instances
	/// before the NetLoop starts.
	pub fn new(device: DeviceConfig, netmask: Ipv4Addr, incarnation_id: u16, session_capacity: usize, delay_capacity: usize, tick_usecs: u32, hooks: Rc<RefCell<dyn ApplicationHooks>>, logger: slog::Logger) -> Self {
		let assemblies = AssemblyBuffers::new();
		let conn_mgr = Rc::new(RefCell::new(ConnMgrState::new(device.identity, incarnation_id, assemblies.clone(), logger.clone())));

		let mut object_model = ObjectModel::new();
		object_model.register_class(build_identity_class(&device));
		register_conn_mgr(&mut object_model, conn_mgr.clone());

		CipContext {
			object_model,
			conn_mgr,
			assemblies,
			sessions: SessionTable::new(session_capacity),
			delay_queue: DelayQueue::new(delay_capacity),
			hooks,
			device,
			netmask,
			tick_usecs,
			io_runtimes: HashMap::new(),
			logger,
		}
	}

	/// `ConfigureExclusiveOwnerConnectionPoint` (§6): the device accepts
	/// exactly one connection at this point at a time.
	pub fn configure_exclusive_owner(&mut self, point: ConnectionPoint) {
		self.conn_mgr.borrow_mut().expectations.configure(ExpectationKind::ExclusiveOwner, point, 1);
	}

	/// `ConfigureInputOnlyConnectionPoint` (§6): up to `capacity` concurrent
	/// originators, each producing into their own consuming assembly.
	pub fn configure_input_only(&mut self, point: ConnectionPoint, capacity: usize) {
		self.conn_mgr.borrow_mut().expectations.configure(ExpectationKind::InputOnly, point, capacity);
	}

	/// `ConfigureListenOnlyConnectionPoint` (§6): up to `capacity` silent
	/// listeners to another connection's multicast production.
	pub fn configure_listen_only(&mut self, point: ConnectionPoint, capacity: usize) {
		self.conn_mgr.borrow_mut().expectations.configure(ExpectationKind::ListenOnly, point, capacity);
	}

	/// `CreateAssemblyInstance` (§6): registers a new Assembly instance over
	/// a freshly allocated buffer and returns it so the integrator can read
	/// and write it directly. The setter closure refuses explicit writes
	/// while `instance_id` is the consuming target of an established
	/// connection (§4.8); that check is wired to the live active-connection
	/// set here rather than left to the caller.
	pub fn create_assembly_instance(&mut self, instance_id: u32, initial_data: Vec<u8>) -> Rc<RefCell<Vec<u8>>> {
		let buffer = Rc::new(RefCell::new(initial_data));
		self.assemblies.register(instance_id, buffer.clone());

		let conn_mgr = self.conn_mgr.clone();
		let is_consuming_target: Rc<dyn Fn(u32) -> bool> = Rc::new(move |id| {
			conn_mgr
				.borrow()
				.active
				.iter()
				.any(|(_, c)| c.point.consuming_assembly == Some(id) && matches!(c.state, ConnectionState::Established))
		});

		let instance = build_assembly_instance(instance_id, buffer.clone(), self.hooks.clone(), is_consuming_target);

		if self.object_model.class(ASSEMBLY_CLASS_ID).is_none() {
			self.object_model.register_class(Class::new(ASSEMBLY_CLASS_ID, 1, "Assembly", ASSEMBLY_ALL_MASK));
		}
		self.object_model.class_mut(ASSEMBLY_CLASS_ID).expect("just registered above").add_instance(instance);

		buffer
	}

	/// Finds which established connection a consuming datagram belongs to,
	/// for the shared point-to-point/multicast receive sockets the NetLoop
	/// keeps instead of one socket per connection: matched by originator IP
	/// for point-to-point traffic, or by O→T connection id (carried in the
	/// CPF address item) for multicast traffic shared across a subnet.
	pub fn find_consuming_connection(&self, from: IpAddr, connection_id: Option<u32>) -> Option<ConnectionHandle> {
		let conn_mgr = self.conn_mgr.borrow();
		conn_mgr
			.active
			.iter()
			.find(|(_, c)| {
				matches!(c.state, ConnectionState::Established)
					&& c.point.consuming_assembly.is_some()
					&& (c.originator_ip == from || connection_id == Some(c.data.o_to_t_connection_id))
			})
			.map(|(h, _)| h)
	}

	/// Handles is consuming socket data arriving for connection `handle`
	/// (class 0/1 I/O traffic), per §4.10's "Inbound frame" paragraph: the
	/// NetLoop hands it the raw per-connection UDP socket datagram, already
	/// attributed to the connection that owns the socket it arrived on.
	pub fn handle_io_datagram(&mut self, handle: ConnectionHandle, from: IpAddr, bytes: &[u8]) -> Result<(), cip_ioconn::FrameRejection> {
		let conn_mgr = self.conn_mgr.borrow();
		let conn = conn_mgr.active.get(handle).ok_or(cip_ioconn::FrameRejection::Truncated)?;
		let originator_ip = conn.originator_ip;
		let transport_class = conn.data.transport_trigger.transport_class;
		let consuming_instance = conn.point.consuming_assembly;
		drop(conn_mgr);

		let Some(rt) = self.io_runtimes.get_mut(&handle) else {
			return Err(cip_ioconn::FrameRejection::Truncated);
		};
		let run_idle_enabled = rt.run_idle_enabled;

		let consumed = cip_ioconn::validate_consuming_frame(bytes, from, originator_ip, transport_class, run_idle_enabled, &mut rt.eip_tracker, &mut rt.class1_tracker)?;

		if let Some(run_idle) = consumed.run_idle {
			let changed = rt.run_idle_state != Some(run_idle);
			rt.run_idle_state = Some(run_idle);
			if changed {
				self.hooks.borrow_mut().run_idle_changed(handle, run_idle.running);
			}
		}

		if let Some(instance_id) = consuming_instance {
			self.assemblies.write(instance_id, &consumed.payload);
			let _ = self.hooks.borrow_mut().after_assembly_data_received(instance_id);
		}

		self.conn_mgr.borrow_mut().active.get_mut(handle).map(|c| c.reset_watchdog());
		Ok(())
	}

	/// `ManageConnections` (§6): advances every established connection's
	/// inactivity watchdog and production timer by `elapsed_usecs`,
	/// building any class 0/1 frames that came due and cascading the
	/// multicast-takeover/exclusive-owner-timeout rules (§4.10) on whatever
	/// timed out.
	pub fn manage_connections(&mut self, elapsed_usecs: u32) -> ManageReport {
		let mut report = ManageReport::default();

		let timed_out: Vec<ConnectionHandle> = {
			let mut conn_mgr = self.conn_mgr.borrow_mut();
			let mut timed_out = Vec::new();
			for (handle, conn) in conn_mgr.active.iter_mut() {
				if !matches!(conn.state, ConnectionState::Established) {
					continue;
				}
				if conn.watchdog_remaining_usecs <= elapsed_usecs {
					conn.state = ConnectionState::TimedOut;
					timed_out.push(handle);
				} else {
					conn.watchdog_remaining_usecs -= elapsed_usecs;
				}
			}
			timed_out
		};

		for handle in timed_out {
			self.close_connection_and_cascade(handle, IoConnectionEvent::TimedOut, &mut report);
		}

		let due: Vec<(ConnectionHandle, u32)> = {
			let conn_mgr = self.conn_mgr.borrow();
			conn_mgr
				.active
				.iter()
				.filter(|(_, c)| matches!(c.state, ConnectionState::Established))
				.filter_map(|(handle, c)| c.point.producing_assembly.map(|producing| (handle, producing)))
				.filter(|(handle, _)| self.io_runtimes.get(handle).map_or(false, |rt| rt.production_timer.is_some()))
				.collect()
		};

		for (handle, producing_instance) in due {
			let should_send = self.io_runtimes.get_mut(&handle).and_then(|rt| rt.production_timer.as_mut()).map(|timer| timer.tick(elapsed_usecs)).unwrap_or(false);
			if should_send {
				if let Some(send) = self.produce_frame(handle, producing_instance) {
					report.sends.push(send);
				}
			}
		}

		report
	}

	fn produce_frame(&mut self, handle: ConnectionHandle, producing_instance: u32) -> Option<SendAction> {
		let transport_class = {
			let conn_mgr = self.conn_mgr.borrow();
			conn_mgr.active.get(handle)?.data.transport_trigger.transport_class
		};

		let rt = self.io_runtimes.get_mut(&handle)?;
		let socket = rt.producing_socket?;
		let dest = rt.send_address?;

		let advance_sequence = self.hooks.borrow_mut().before_assembly_data_send(producing_instance);
		let assembly_data = self.assemblies.read(producing_instance)?;

		let rt = self.io_runtimes.get_mut(&handle)?;
		rt.eip_sequence_producing = rt.eip_sequence_producing.wrapping_add(1);
		if advance_sequence {
			rt.sequence_count_producing = rt.sequence_count_producing.wrapping_add(1);
		}

		let frame = cip_ioconn::OutboundFrame {
			transport_class,
			connection_id: 0,
			eip_sequence: rt.eip_sequence_producing,
			sequence_count_producing: rt.sequence_count_producing,
			run_idle: rt.run_idle_state,
			assembly_data: &assembly_data,
		};

		let mut out = Vec::new();
		cip_ioconn::build_producing_frame(&frame, &mut out).ok()?;
		Some(SendAction { socket, dest, bytes: out })
	}

	/// Tears down `handle`, applying whichever §4.10 rule its role calls
	/// for: an exclusive-owner (the only kind with dependents) closing or
	/// timing out cascades every input-only/listen-only sharing its
	/// producing path; any other connection still holding a shared
	/// multicast producing socket hands it to the next peer, or to nobody
	/// (closing every listen-only on that path) if none remains. `event`
	/// distinguishes a graceful Forward_Close from a watchdog expiry for
	/// the `NotifyIoConnectionEvent` callback.
	fn close_connection_and_cascade(&mut self, handle: ConnectionHandle, event: IoConnectionEvent, report: &mut ManageReport) {
		let info = {
			let conn_mgr = self.conn_mgr.borrow();
			conn_mgr.active.get(handle).map(|c| (c.point, c.kind, c.data.t_to_o_ncp.connection_type))
		};
		let Some((point, kind, t_to_o_type)) = info else { return };

		if matches!(kind, cip_connmgr::ExpectationKind::ExclusiveOwner) {
			let cascade = {
				let conn_mgr = self.conn_mgr.borrow();
				cip_ioconn::plan_exclusive_owner_timeout_cascade(&conn_mgr.active, handle, point)
			};
			self.remove_connection(handle, event, report);
			for sibling in cascade {
				self.remove_connection(sibling, IoConnectionEvent::Closed, report);
			}
			return;
		}

		let holds_multicast_producer = matches!(t_to_o_type, cip_connmgr::ConnectionType::Multicast) && self.io_runtimes.get(&handle).map_or(false, |rt| rt.producing_socket.is_some());

		if holds_multicast_producer {
			let action = {
				let conn_mgr = self.conn_mgr.borrow();
				cip_ioconn::plan_multicast_takeover(&conn_mgr.active, handle, point)
			};
			match action {
				cip_ioconn::TakeoverAction::TransferTo(peer) => {
					if let Some(rt) = self.io_runtimes.remove(&handle) {
						if let Some(peer_rt) = self.io_runtimes.get_mut(&peer) {
							peer_rt.producing_socket = rt.producing_socket;
							peer_rt.send_address = rt.send_address;
							peer_rt.eip_sequence_producing = rt.eip_sequence_producing;
							peer_rt.sequence_count_producing = rt.sequence_count_producing;
							if rt.production_timer.is_some() {
								peer_rt.production_timer = rt.production_timer;
							}
						}
					}
					self.remove_connection(handle, event, report);
				}
				cip_ioconn::TakeoverAction::CloseListenOnlys(listen_onlys) => {
					self.remove_connection(handle, event, report);
					for listen_only in listen_onlys {
						self.remove_connection(listen_only, IoConnectionEvent::Closed, report);
					}
				}
			}
			return;
		}

		self.remove_connection(handle, event, report);
	}

	fn remove_connection(&mut self, handle: ConnectionHandle, event: IoConnectionEvent, report: &mut ManageReport) {
		if self.conn_mgr.borrow_mut().active.remove(handle).is_none() {
			return;
		}
		self.io_runtimes.remove(&handle);
		self.hooks.borrow_mut().notify_io_connection_event(handle, event);
		report.closed.push(handle);
	}

	/// Finishes tearing down connections Forward_Close just moved into
	/// `Closing` (§4.9's `Established → Closing → NonExistent` edge):
	/// applies the same multicast-takeover/cascade bookkeeping
	/// [`Self::manage_connections`] applies to timeouts, but fires
	/// `IoConnectionEvent::Closed`. The Connection Manager service closure
	/// only has access to `ConnMgrState`, not the I/O runtime or the
	/// application hooks, so it marks connections `Closing` and leaves the
	/// actual eviction to whichever `CipContext` method drove the dispatch
	/// that could have produced one (see `explicit.rs`).
	pub fn reconcile_closing_connections(&mut self) -> ManageReport {
		let mut report = ManageReport::default();
		let closing: Vec<ConnectionHandle> = {
			let conn_mgr = self.conn_mgr.borrow();
			conn_mgr.active.iter().filter(|(_, c)| matches!(c.state, ConnectionState::Closing)).map(|(h, _)| h).collect()
		};
		for handle in closing {
			self.close_connection_and_cascade(handle, IoConnectionEvent::Closed, &mut report);
		}
		report
	}

	/// The sockets every `Configuring` connection still needs before it can
	/// be promoted to `Established`; the NetLoop drains this after every
	/// explicit message that may have admitted a new connection.
	pub fn connections_awaiting_socket_setup(&self) -> Vec<SocketPlan> {
		let conn_mgr = self.conn_mgr.borrow();
		conn_mgr
			.active
			.iter()
			.filter(|(_, c)| matches!(c.state, ConnectionState::Configuring))
			.map(|(handle, conn)| {
				let existing_multicast_producer = conn_mgr
					.active
					.iter()
					.find(|(h, c)| *h != handle && conn.point.producing_assembly.is_some() && c.point.producing_assembly == conn.point.producing_assembly && matches!(c.state, ConnectionState::Established))
					.map(|(h, _)| h);
				SocketPlan {
					handle,
					originator_ip: conn.originator_ip,
					consuming: plan_consuming_socket(conn.data.o_to_t_ncp.connection_type),
					producing: plan_producing_socket(conn.data.t_to_o_ncp.connection_type, None, existing_multicast_producer),
				}
			})
			.collect()
	}

	/// Promotes `handle` from `Configuring` to `Established` once the
	/// NetLoop has carried out its `SocketPlan`, and arms its production
	/// timer (§4.10) if it produces.
	pub fn mark_connection_established(&mut self, handle: ConnectionHandle, consuming_socket: Option<SocketToken>, producing_socket: Option<SocketToken>, send_address: Option<SocketAddr>, run_idle_enabled: bool) {
		let (cyclic, rpi, pit, producing_assembly) = {
			let mut conn_mgr = self.conn_mgr.borrow_mut();
			let Some(conn) = conn_mgr.active.get_mut(handle) else { return };
			conn.state = ConnectionState::Established;
			(
				matches!(conn.data.transport_trigger.trigger, cip_connmgr::Trigger::Cyclic),
				round_up_to_tick(conn.data.t_to_o_rpi_usecs, self.tick_usecs),
				conn.data.path.production_inhibit_time_usecs.unwrap_or(0),
				conn.point.producing_assembly,
			)
		};

		let mut rt = IoRuntime::new(run_idle_enabled);
		rt.consuming_socket = consuming_socket;
		rt.producing_socket = producing_socket;
		rt.send_address = send_address;
		if producing_assembly.is_some() && producing_socket.is_some() {
			rt.production_timer = Some(ProductionTimer::new(rpi, pit, cyclic));
			if run_idle_enabled {
				rt.run_idle_state = Some(cip_ioconn::RunIdleHeader { running: true });
			}
		}
		self.io_runtimes.insert(handle, rt);
		self.hooks.borrow_mut().notify_io_connection_event(handle, IoConnectionEvent::Opened);
	}

	/// Discards a `Configuring` connection whose socket setup failed -
	/// multicast group exhaustion, a bind error, or similar. No reply is
	/// sent beyond the one already written for the Forward_Open itself;
	/// the connection simply never becomes usable.
	pub fn fail_connection_setup(&mut self, handle: ConnectionHandle) {
		self.conn_mgr.borrow_mut().active.remove(handle);
	}

	/// A connection's originating peer and multicast producing point, for
	/// the NetLoop's takeover bookkeeping when a connection closes
	/// gracefully via Forward_Close (as opposed to timing out, which
	/// `manage_connections` already handles).
	pub fn connection_point(&self, handle: ConnectionHandle) -> Option<(IpAddr, ConnectionPoint)> {
		let conn_mgr = self.conn_mgr.borrow();
		conn_mgr.active.get(handle).map(|c| (c.originator_ip, c.point))
	}

	pub fn active_handles(&self) -> Vec<ConnectionHandle> {
		self.conn_mgr.borrow().active.iter().map(|(h, _)| h).collect()
	}

	pub fn take_io_runtime(&mut self, handle: ConnectionHandle) -> Option<IoRuntime> {
		self.io_runtimes.remove(&handle)
	}
}

#[cfg(test)]
mod test {
	use cip_connmgr::{Connection, ConnectionData, ExpectationKind, ForwardOpenParseError};
	use cip_object::GeneralStatus;

	use super::*;

	fn logger() -> slog::Logger {
		slog::Logger::root(slog::Discard, slog::o!())
	}

	fn device() -> DeviceConfig {
		DeviceConfig {
			identity: cip_epath::DeviceIdentity {
				vendor_id: 1,
				device_type: 1,
				product_code: 1,
				major_revision: 1,
				minor_revision: 1,
			},
			serial_number: 1,
			product_name: "Test".to_owned(),
			status: 0,
			state: 0,
			device_ip: Ipv4Addr::new(10, 0, 0, 1),
			tcp_port: 0xAF12,
		}
	}

	fn minimal_connection_data() -> ConnectionData {
		cip_connmgr::parse_forward_open(&[
			0x03, 0xFA, 0, 0, 0, 0, 0, 0, 0, 0, 0x10, 0x27, 0x42, 0x00, 0x01, 0x02, 0x03, 0x04, 0x03, 0, 0, 0, 0x40, 0x42, 0x0F, 0x00, 0x04, 0x20, 0x40,
			0x42, 0x0F, 0x00, 0x04, 0x20, 0x01, 0x03, 0x20, 0x04, 0x24, 0x65, 0x2C, 0x66,
		])
		.unwrap_or_else(|_: ForwardOpenParseError| unreachable!())
	}

	#[derive(Default)]
	struct RecordingHooks {
		events: Vec<(ConnectionHandle, IoConnectionEvent)>,
	}

	impl ApplicationHooks for RecordingHooks {
		fn after_assembly_data_received(&mut self, _instance: u32) -> Result<(), GeneralStatus> {
			Ok(())
		}
		fn before_assembly_data_send(&mut self, _instance: u32) -> bool {
			true
		}
		fn run_idle_changed(&mut self, _connection: ConnectionHandle, _is_running: bool) {}
		fn notify_io_connection_event(&mut self, connection: ConnectionHandle, event: IoConnectionEvent) {
			self.events.push((connection, event));
		}
	}

	fn context_with_hooks() -> (CipContext, Rc<RefCell<RecordingHooks>>) {
		let hooks = Rc::new(RefCell::new(RecordingHooks::default()));
		let ctx = CipContext::new(device(), Ipv4Addr::new(255, 255, 255, 0), 1, 4, 4, 10_000, hooks.clone(), logger());
		(ctx, hooks)
	}

	fn established(point: ConnectionPoint, kind: ExpectationKind, originator_ip: &str, watchdog_remaining_usecs: u32) -> Connection {
		Connection {
			state: ConnectionState::Established,
			kind,
			point,
			data: minimal_connection_data(),
			originator_ip: originator_ip.parse().unwrap(),
			watchdog_remaining_usecs,
		}
	}

	#[test]
	fn manage_connections_cascades_exclusive_owner_timeout_to_every_sibling() {
		let (mut ctx, hooks) = context_with_hooks();
		let point = ConnectionPoint {
			consuming_assembly: Some(100),
			producing_assembly: Some(101),
			config_assembly: None,
		};

		let owner = ctx.conn_mgr.borrow_mut().active.insert(established(point, ExpectationKind::ExclusiveOwner, "10.0.0.5", 100));
		let sibling = ctx.conn_mgr.borrow_mut().active.insert(established(point, ExpectationKind::ListenOnly, "10.0.0.6", 1_000_000));
		ctx.io_runtimes.insert(owner, IoRuntime::new(false));
		ctx.io_runtimes.insert(sibling, IoRuntime::new(false));

		let report = ctx.manage_connections(200);

		assert_eq!(report.closed.len(), 2);
		assert!(report.closed.contains(&owner));
		assert!(report.closed.contains(&sibling));
		assert!(ctx.conn_mgr.borrow().active.get(owner).is_none());
		assert!(ctx.conn_mgr.borrow().active.get(sibling).is_none());
		assert!(ctx.io_runtimes.get(&owner).is_none());
		assert!(ctx.io_runtimes.get(&sibling).is_none());

		let events = hooks.borrow().events.clone();
		assert!(events.contains(&(owner, IoConnectionEvent::TimedOut)));
		assert!(events.contains(&(sibling, IoConnectionEvent::Closed)));
	}

	#[test]
	fn reconcile_closing_connections_transfers_multicast_production_to_a_peer() {
		let (mut ctx, hooks) = context_with_hooks();
		let point = ConnectionPoint {
			consuming_assembly: Some(200),
			producing_assembly: Some(201),
			config_assembly: None,
		};
		let mut multicast_data = minimal_connection_data();
		multicast_data.t_to_o_ncp.connection_type = cip_connmgr::ConnectionType::Multicast;

		let controller = ctx.conn_mgr.borrow_mut().active.insert(Connection {
			state: ConnectionState::Closing,
			kind: ExpectationKind::InputOnly,
			point,
			data: multicast_data.clone(),
			originator_ip: "10.0.0.5".parse().unwrap(),
			watchdog_remaining_usecs: 1_000_000,
		});
		let peer = ctx.conn_mgr.borrow_mut().active.insert(Connection {
			state: ConnectionState::Established,
			kind: ExpectationKind::ListenOnly,
			point,
			data: multicast_data,
			originator_ip: "10.0.0.6".parse().unwrap(),
			watchdog_remaining_usecs: 1_000_000,
		});

		let mut controller_rt = IoRuntime::new(false);
		controller_rt.producing_socket = Some(SocketToken(42));
		controller_rt.send_address = Some("239.192.1.1:2222".parse().unwrap());
		controller_rt.eip_sequence_producing = 7;
		ctx.io_runtimes.insert(controller, controller_rt);
		ctx.io_runtimes.insert(peer, IoRuntime::new(false));

		let report = ctx.reconcile_closing_connections();

		assert_eq!(report.closed, vec![controller]);
		assert!(ctx.conn_mgr.borrow().active.get(controller).is_none());
		assert!(ctx.conn_mgr.borrow().active.get(peer).is_some());

		let peer_rt = ctx.io_runtimes.get(&peer).unwrap();
		assert_eq!(peer_rt.producing_socket, Some(SocketToken(42)));
		assert_eq!(peer_rt.eip_sequence_producing, 7);

		assert_eq!(hooks.borrow().events.clone(), vec![(controller, IoConnectionEvent::Closed)]);
	}
}
