//! Resolves Forward_Open's O→T/T→O Network Connection Parameters into the
//! socket actions §4.10's creation matrix calls for. This module only
//! decides *what* `cip-core` should do; it never touches a socket.

use cip_connmgr::ConnectionType;
use cip_object::ConnectionHandle;

use crate::multicast::DEFAULT_IO_PORT;

/// What the consuming (O→T) side needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumingSocketPlan {
	None,
	/// Bind on the device's IP at the configured explicit/IO port.
	BindPointToPoint,
	/// Bind to the multicast group the originator supplied in its
	/// SockAddr O→T item.
	BindMulticastGroup,
}

/// What the producing (T→O) side needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducingSocketPlan {
	None,
	/// Send to `dest_port` at the TCP originator's IP (defaults to
	/// [`DEFAULT_IO_PORT`] absent a SockAddr T→O override).
	SendPointToPoint { dest_port: u16 },
	/// No producer exists yet on this producing path: bind a fresh
	/// multicast sending socket and report it in the reply's SockAddr T→O.
	BindNewMulticastGroup,
	/// A peer connection already produces on this path; reuse its
	/// connection id and socket rather than opening a second one.
	ReuseExisting(ConnectionHandle),
}

pub fn plan_consuming_socket(o_to_t: ConnectionType) -> ConsumingSocketPlan {
	match o_to_t {
		ConnectionType::Null => ConsumingSocketPlan::None,
		ConnectionType::PointToPoint => ConsumingSocketPlan::BindPointToPoint,
		ConnectionType::Multicast => ConsumingSocketPlan::BindMulticastGroup,
		ConnectionType::Reserved => ConsumingSocketPlan::None,
	}
}

/// `sockaddr_t_to_o_port` is the originator-requested port from the
/// request's SockAddr T→O item, if present. `existing_multicast_producer`
/// is the handle of another established connection already producing on
/// the same path, when one exists.
pub fn plan_producing_socket(t_to_o: ConnectionType, sockaddr_t_to_o_port: Option<u16>, existing_multicast_producer: Option<ConnectionHandle>) -> ProducingSocketPlan {
	match t_to_o {
		ConnectionType::Null | ConnectionType::Reserved => ProducingSocketPlan::None,
		ConnectionType::PointToPoint => ProducingSocketPlan::SendPointToPoint {
			dest_port: sockaddr_t_to_o_port.unwrap_or(DEFAULT_IO_PORT),
		},
		ConnectionType::Multicast => match existing_multicast_producer {
			Some(peer) => ProducingSocketPlan::ReuseExisting(peer),
			None => ProducingSocketPlan::BindNewMulticastGroup,
		},
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn null_direction_needs_no_socket() {
		assert_eq!(plan_consuming_socket(ConnectionType::Null), ConsumingSocketPlan::None);
	}

	#[test]
	fn point_to_point_producer_defaults_to_the_standard_io_port() {
		let plan = plan_producing_socket(ConnectionType::PointToPoint, None, None);
		assert_eq!(plan, ProducingSocketPlan::SendPointToPoint { dest_port: DEFAULT_IO_PORT });
	}

	#[test]
	fn point_to_point_producer_honors_a_requested_port() {
		let plan = plan_producing_socket(ConnectionType::PointToPoint, Some(0x1234), None);
		assert_eq!(plan, ProducingSocketPlan::SendPointToPoint { dest_port: 0x1234 });
	}

	#[test]
	fn first_multicast_producer_binds_a_new_group() {
		let plan = plan_producing_socket(ConnectionType::Multicast, None, None);
		assert_eq!(plan, ProducingSocketPlan::BindNewMulticastGroup);
	}

	#[test]
	fn subsequent_multicast_producer_reuses_the_peer() {
		let peer = ConnectionHandle(7);
		let plan = plan_producing_socket(ConnectionType::Multicast, None, Some(peer));
		assert_eq!(plan, ProducingSocketPlan::ReuseExisting(peer));
	}
}
