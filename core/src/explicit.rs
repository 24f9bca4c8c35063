//! Encapsulation command dispatch (§4.5): NOP/ListServices/ListIdentity/
//! ListInterfaces/RegisterSession/UnregisterSession/SendRRData/SendUnitData,
//! and the CPF unwrap/wrap around `ObjectModel::notify_mr` that SendRRData
//! and SendUnitData carry.
//!
//! This is a second `impl CipContext` block in the same crate as
//! `context.rs` - legal because inherent methods may be split across
//! multiple files, the same way the teacher spreads one collaborator's
//! surface across several modules.

use std::net::{IpAddr, SocketAddr};
use std::time::Instant;

use cip_cpf::{AddressItem, DataItem, Message};
use cip_encap::{BigHeader, EncapCommand, EncapHeader, EncapStatus};

use crate::context::{CipContext, TcpToken};

/// What the NetLoop should do after handing a raw datagram/stream chunk to
/// one of the dispatch entry points below.
pub enum ExplicitOutcome {
	/// Send these bytes back to the peer verbatim.
	Reply(Vec<u8>),
	/// The command was accepted but produces no reply (NOP, a delayed
	/// ListIdentity, UnregisterSession).
	NoReply,
	/// UnregisterSession, or a session error severe enough that Vol2 2-4.2
	/// requires closing the TCP connection.
	CloseSession,
}

const LIST_SERVICES_CAPABILITY_TCP: u16 = 1 << 5;
const LIST_SERVICES_CAPABILITY_UDP: u16 = 1 << 8;
const PROTOCOL_VERSION: u16 = 1;

fn encode_header_and_body(header: &EncapHeader, body: &[u8]) -> Vec<u8> {
	let mut out = vec![0u8; EncapHeader::SIZE + body.len()];
	{
		use cip_codec::{ByteWriter, WriteTo};
		let mut w = ByteWriter::new(&mut out);
		header.write_to(&mut w).ok();
		w.append(body).ok();
	}
	out
}

fn error_reply(request: &EncapHeader, status: EncapStatus) -> Vec<u8> {
	encode_header_and_body(&request.reply_to(0, status), &[])
}

/// `ListServices`' single "Communications" capability item (Vol2 Table
/// 2-4.4): a version word, a capability flags word, and a fixed name.
fn build_list_services_body() -> Vec<u8> {
	let name = b"Communications\0";
	let item_len = 2 + 2 + name.len();
	let mut buf = vec![0u8; 2 + 4 + item_len];
	{
		use cip_codec::ByteWriter;
		let mut w = ByteWriter::new(&mut buf);
		w.put16(1).ok(); // item_count
		w.put16(cip_cpf::LIST_SERVICES_ITEM).ok();
		w.put16(item_len as u16).ok();
		w.put16(PROTOCOL_VERSION).ok();
		w.put16(LIST_SERVICES_CAPABILITY_TCP | LIST_SERVICES_CAPABILITY_UDP).ok();
		w.append(name).ok();
	}
	buf
}

fn build_list_identity_body(ctx: &CipContext) -> Vec<u8> {
	let item = crate::identity::build_list_identity_item(&ctx.device);
	let mut buf = vec![0u8; 2 + 4 + item.len()];
	{
		use cip_codec::ByteWriter;
		let mut w = ByteWriter::new(&mut buf);
		w.put16(1).ok();
		w.put16(cip_cpf::LIST_IDENTITY_ITEM).ok();
		w.put16(item.len() as u16).ok();
		w.append(&item).ok();
	}
	buf
}

fn build_list_interfaces_body() -> Vec<u8> {
	let mut buf = vec![0u8; 2];
	{
		use cip_codec::ByteWriter;
		let mut w = ByteWriter::new(&mut buf);
		w.put16(0).ok(); // item_count = 0
	}
	buf
}

impl CipContext {
	/// Handles one complete TCP-carried encapsulation message (`socket`
	/// identifies the carrying connection for session bookkeeping).
	/// Returns `None` if `bytes` does not even hold a full 24-byte header -
	/// the caller should wait for more data rather than treat this as a
	/// protocol error.
	pub fn handle_received_explicit_tcp_data(&mut self, socket: TcpToken, peer_ip: IpAddr, bytes: &[u8]) -> Option<ExplicitOutcome> {
		if bytes.len() < EncapHeader::SIZE {
			return None;
		}

		use cip_codec::{ByteReader, ReadFrom};
		let mut reader = ByteReader::new(bytes);
		let header = EncapHeader::read_from(&mut reader).ok()?;
		let body = reader.peek_remaining();

		let Ok(command) = EncapCommand::try_from(header.command) else {
			return Some(ExplicitOutcome::Reply(error_reply(&header, EncapStatus::InvalidOrUnsupportedCommand)));
		};

		if command.requires_session() && !self.sessions.is_registered(header.session_handle) {
			return Some(ExplicitOutcome::Reply(error_reply(&header, EncapStatus::InvalidSessionHandle)));
		}

		Some(match command {
			EncapCommand::Nop => ExplicitOutcome::NoReply,
			EncapCommand::ListServices => ExplicitOutcome::Reply(encode_header_and_body(&header.reply_to(0, EncapStatus::Success), &build_list_services_body())),
			EncapCommand::ListIdentity => {
				let reply_body = build_list_identity_body(self);
				ExplicitOutcome::Reply(encode_header_and_body(&header.reply_to(reply_body.len() as u16, EncapStatus::Success), &reply_body))
			}
			EncapCommand::ListInterfaces => {
				let reply_body = build_list_interfaces_body();
				ExplicitOutcome::Reply(encode_header_and_body(&header.reply_to(reply_body.len() as u16, EncapStatus::Success), &reply_body))
			}
			EncapCommand::RegisterSession => self.handle_register_session(socket, &header, body),
			EncapCommand::UnregisterSession => {
				self.sessions.unregister(header.session_handle);
				ExplicitOutcome::CloseSession
			}
			EncapCommand::SendRRData => self.handle_send_rr_data(&header, body, Some(peer_ip)),
			EncapCommand::SendUnitData => self.handle_send_unit_data(&header, body, Some(peer_ip)),
		})
	}

	fn handle_register_session(&mut self, socket: TcpToken, header: &EncapHeader, body: &[u8]) -> ExplicitOutcome {
		use cip_codec::ByteReader;
		let mut reader = ByteReader::new(body);
		let (Ok(requested_version), Ok(options)) = (reader.get16(), reader.get16()) else {
			return ExplicitOutcome::Reply(error_reply(header, EncapStatus::IncorrectData));
		};
		if requested_version == 0 || requested_version > PROTOCOL_VERSION || options != 0 {
			return ExplicitOutcome::Reply(error_reply(header, EncapStatus::UnsupportedProtocol));
		}

		if let Some(existing) = self.sessions.find_handle(socket) {
			let mut echo = header.reply_to(4, EncapStatus::InvalidOrUnsupportedCommand);
			echo.session_handle = existing;
			return ExplicitOutcome::Reply(encode_header_and_body(&echo, &build_register_session_body(requested_version)));
		}

		match self.sessions.register(socket) {
			Ok(handle) => {
				let mut reply = header.reply_to(4, EncapStatus::Success);
				reply.session_handle = handle;
				ExplicitOutcome::Reply(encode_header_and_body(&reply, &build_register_session_body(requested_version)))
			}
			Err(_) => ExplicitOutcome::Reply(error_reply(header, EncapStatus::InsufficientMemory)),
		}
	}

	fn handle_send_rr_data(&mut self, header: &EncapHeader, body: &[u8], originator_ip: Option<IpAddr>) -> ExplicitOutcome {
		use cip_codec::{ByteReader, ReadFrom};
		let mut reader = ByteReader::new(body);
		let Ok(_big_header) = BigHeader::read_from(&mut reader) else {
			return ExplicitOutcome::Reply(error_reply(header, EncapStatus::IncorrectData));
		};
		let cpf_bytes = reader.peek_remaining();

		let Ok(message) = Message::parse(cpf_bytes) else {
			return ExplicitOutcome::Reply(error_reply(header, EncapStatus::IncorrectData));
		};

		let mr_reply = self.object_model.notify_mr(message.data.bytes(), originator_ip);
		// Forward_Close (and any future service that can retire a
		// connection) only marks it `Closing`; finish the teardown here so
		// the multicast-takeover/cascade rules and the `Closed` hook run
		// before the peer's reply is even written.
		self.reconcile_closing_connections();

		let reply_message = Message {
			address: AddressItem::Null,
			data: DataItem::Unconnected(mr_reply),
			sockaddr_o_to_t: None,
			sockaddr_t_to_o: None,
		};
		let reply_body = encode_cpf_message(&reply_message);

		let mut reply_bytes = vec![0u8; 6];
		{
			use cip_codec::{ByteWriter, WriteTo};
			let mut w = ByteWriter::new(&mut reply_bytes);
			BigHeader { interface_handle: 0, timeout: 0 }.write_to(&mut w).ok();
		}
		reply_bytes.extend_from_slice(&reply_body);

		ExplicitOutcome::Reply(encode_header_and_body(&header.reply_to(reply_bytes.len() as u16, EncapStatus::Success), &reply_bytes))
	}

	/// `NotifyConnected` (§4.4): resolves the target connection by the CPF
	/// connected address item's `connection_identifier` (the O→T connection
	/// id this device assigned), resets its inactivity watchdog, strips the
	/// class-1 2-byte sequence count prefix off the connected data item
	/// before forwarding the rest to the message router, then replies
	/// addressed with the peer's `producing_connection_id` and the same
	/// sequence count echoed back ahead of the message-router response -
	/// matching CIPster's `Cpf::NotifyConnectedCommonPacketFormat`.
	fn handle_send_unit_data(&mut self, header: &EncapHeader, body: &[u8], originator_ip: Option<IpAddr>) -> ExplicitOutcome {
		use cip_codec::{ByteReader, ReadFrom};
		let mut reader = ByteReader::new(body);
		let Ok(_big_header) = BigHeader::read_from(&mut reader) else {
			return ExplicitOutcome::Reply(error_reply(header, EncapStatus::IncorrectData));
		};
		let cpf_bytes = reader.peek_remaining();

		let Ok(message) = Message::parse(cpf_bytes) else {
			return ExplicitOutcome::Reply(error_reply(header, EncapStatus::IncorrectData));
		};
		let connection_id = match message.address {
			AddressItem::Connected { connection_id } | AddressItem::Sequenced { connection_id, .. } => connection_id,
			AddressItem::Null => return ExplicitOutcome::Reply(error_reply(header, EncapStatus::IncorrectData)),
		};
		if !matches!(message.data, DataItem::Connected(_)) {
			return ExplicitOutcome::Reply(error_reply(header, EncapStatus::IncorrectData));
		}

		let Some(handle) = self.conn_mgr.borrow().active.find_by_consuming_id(connection_id) else {
			return ExplicitOutcome::Reply(error_reply(header, EncapStatus::IncorrectData));
		};

		let mut data_reader = ByteReader::new(message.data.bytes());
		let Ok(sequence_count) = data_reader.get16() else {
			return ExplicitOutcome::Reply(error_reply(header, EncapStatus::IncorrectData));
		};
		let inner_request = data_reader.peek_remaining();

		let producing_connection_id = {
			let mut conn_mgr = self.conn_mgr.borrow_mut();
			let conn = conn_mgr.active.get_mut(handle).expect("handle just resolved above");
			conn.reset_watchdog();
			conn.data.t_to_o_connection_id
		};

		let mr_reply = self.object_model.notify_mr(inner_request, originator_ip);
		self.reconcile_closing_connections();

		let mut reply_payload = sequence_count.to_le_bytes().to_vec();
		reply_payload.extend_from_slice(&mr_reply);

		let reply_message = Message {
			address: AddressItem::Connected { connection_id: producing_connection_id },
			data: DataItem::Connected(reply_payload),
			sockaddr_o_to_t: None,
			sockaddr_t_to_o: None,
		};
		let reply_body = encode_cpf_message(&reply_message);

		let mut reply_bytes = vec![0u8; 6];
		{
			use cip_codec::{ByteWriter, WriteTo};
			let mut w = ByteWriter::new(&mut reply_bytes);
			BigHeader { interface_handle: 0, timeout: 0 }.write_to(&mut w).ok();
		}
		reply_bytes.extend_from_slice(&reply_body);

		ExplicitOutcome::Reply(encode_header_and_body(&header.reply_to(reply_bytes.len() as u16, EncapStatus::Success), &reply_bytes))
	}

	/// Handles one UDP-carried encapsulation datagram. `is_unicast`
	/// distinguishes a directly-addressed ListIdentity (answered
	/// immediately) from one arriving by broadcast or multicast (queued
	/// behind a randomized delay per §4.5).
	pub fn handle_received_explicit_udp_data(&mut self, bytes: &[u8], peer: SocketAddr, is_unicast: bool, now: Instant) -> Option<ExplicitOutcome> {
		if bytes.len() < EncapHeader::SIZE {
			return None;
		}

		use cip_codec::{ByteReader, ReadFrom};
		let mut reader = ByteReader::new(bytes);
		let header = EncapHeader::read_from(&mut reader).ok()?;

		let Ok(command) = EncapCommand::try_from(header.command) else {
			return Some(ExplicitOutcome::Reply(error_reply(&header, EncapStatus::InvalidOrUnsupportedCommand)));
		};

		Some(match command {
			EncapCommand::ListServices => ExplicitOutcome::Reply(encode_header_and_body(&header.reply_to(0, EncapStatus::Success), &build_list_services_body())),
			EncapCommand::ListInterfaces => {
				let reply_body = build_list_interfaces_body();
				ExplicitOutcome::Reply(encode_header_and_body(&header.reply_to(reply_body.len() as u16, EncapStatus::Success), &reply_body))
			}
			EncapCommand::ListIdentity if is_unicast => {
				let reply_body = build_list_identity_body(self);
				ExplicitOutcome::Reply(encode_header_and_body(&header.reply_to(reply_body.len() as u16, EncapStatus::Success), &reply_body))
			}
			EncapCommand::ListIdentity => {
				self.delay_queue.push(peer, header.sender_context, now);
				ExplicitOutcome::NoReply
			}
			_ => ExplicitOutcome::Reply(error_reply(&header, EncapStatus::InvalidOrUnsupportedCommand)),
		})
	}

	/// Builds the reply for one delayed ListIdentity that just came due,
	/// for the NetLoop to unicast to `pending.dest`.
	pub fn build_delayed_list_identity_reply(&self, sender_context: [u8; 8]) -> Vec<u8> {
		let header = EncapHeader {
			command: u16::from(&EncapCommand::ListIdentity),
			length: 0,
			session_handle: 0,
			status: 0,
			sender_context,
			options: 0,
		};
		let body = build_list_identity_body(self);
		encode_header_and_body(&header.reply_to(body.len() as u16, EncapStatus::Success), &body)
	}

}

fn build_register_session_body(protocol_version: u16) -> Vec<u8> {
	let mut buf = vec![0u8; 4];
	use cip_codec::ByteWriter;
	let mut w = ByteWriter::new(&mut buf);
	w.put16(protocol_version).ok();
	w.put16(0).ok(); // options, always 0
	buf
}

fn encode_cpf_message(message: &Message) -> Vec<u8> {
	let mut buf = vec![0u8; 512];
	let written = {
		let mut w = cip_codec::ByteWriter::new(&mut buf);
		message.write(&mut w).ok();
		w.len()
	};
	buf.truncate(written);
	buf
}
