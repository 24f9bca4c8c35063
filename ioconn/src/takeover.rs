//! Multicast mastership handoff and the exclusive-owner timeout cascade
//! (§4.10). Both only need to know which other established connections
//! share a producing assembly, which `cip_connmgr::ActiveConnections`
//! already tracks; this module adds the decision on top.

use cip_connmgr::{ActiveConnections, ConnectionPoint};
use cip_object::ConnectionHandle;

/// What `cip-core` should do with a closing/timed-out connection's
/// multicast producing socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TakeoverAction {
	/// Hand `producing_socket`/`send_address`/sequence counters/timer to this
	/// peer.
	TransferTo(ConnectionHandle),
	/// No peer remains; these listen-onlys (if any) must be closed too.
	CloseListenOnlys(Vec<ConnectionHandle>),
}

/// Decides what happens to `closing`'s multicast producing state, per
/// §4.10 "Multicast takeover on close/timeout". Call only when `closing`
/// actually held the producing socket (an exclusive-owner or the
/// controlling input-only); listen-onlys never hold it.
pub fn plan_multicast_takeover(active: &ActiveConnections, closing: ConnectionHandle, point: ConnectionPoint) -> TakeoverAction {
	let siblings = active.siblings_on_producing_point(point, closing);
	match siblings.first() {
		Some(&peer) => TakeoverAction::TransferTo(peer),
		None => TakeoverAction::CloseListenOnlys(siblings),
	}
}

/// §4.10 "Exclusive-owner timeout cascade": every input-only and
/// listen-only sharing `timed_out`'s producing path is closed alongside it.
pub fn plan_exclusive_owner_timeout_cascade(active: &ActiveConnections, timed_out: ConnectionHandle, point: ConnectionPoint) -> Vec<ConnectionHandle> {
	active.siblings_on_producing_point(point, timed_out)
}

#[cfg(test)]
mod test {
	use super::*;
	use cip_connmgr::{Connection, ConnectionData, ConnectionState, ExpectationKind, ForwardOpenParseError};

	fn minimal_connection_data() -> ConnectionData {
		cip_connmgr::parse_forward_open(&[
			0x03, 0xFA, 0, 0, 0, 0, 0, 0, 0, 0, 0x10, 0x27, 0x42, 0x00, 0x01, 0x02, 0x03, 0x04, 0x03, 0, 0, 0, 0x40, 0x42, 0x0F, 0x00, 0x04, 0x20, 0x40,
			0x42, 0x0F, 0x00, 0x04, 0x20, 0x01, 0x03, 0x20, 0x04, 0x24, 0x65, 0x2C, 0x66,
		])
		.unwrap_or_else(|_: ForwardOpenParseError| unreachable!())
	}

	fn established(point: ConnectionPoint, kind: ExpectationKind) -> Connection {
		Connection {
			state: ConnectionState::Established,
			kind,
			point,
			data: minimal_connection_data(),
			originator_ip: "10.0.0.5".parse().unwrap(),
			watchdog_remaining_usecs: 1_000_000,
		}
	}

	#[test]
	fn transfers_to_a_remaining_peer() {
		let point = ConnectionPoint {
			consuming_assembly: None,
			producing_assembly: Some(200),
			config_assembly: None,
		};
		let mut active = ActiveConnections::new();
		let owner = active.insert(established(point, ExpectationKind::ExclusiveOwner));
		let listener = active.insert(established(point, ExpectationKind::ListenOnly));

		let action = plan_multicast_takeover(&active, owner, point);
		assert_eq!(action, TakeoverAction::TransferTo(listener));
	}

	#[test]
	fn closes_listen_onlys_when_no_peer_remains() {
		let point = ConnectionPoint {
			consuming_assembly: None,
			producing_assembly: Some(201),
			config_assembly: None,
		};
		let mut active = ActiveConnections::new();
		let owner = active.insert(established(point, ExpectationKind::ExclusiveOwner));

		let action = plan_multicast_takeover(&active, owner, point);
		assert_eq!(action, TakeoverAction::CloseListenOnlys(vec![]));
	}

	#[test]
	fn exclusive_owner_timeout_closes_every_sibling_on_the_point() {
		let point = ConnectionPoint {
			consuming_assembly: None,
			producing_assembly: Some(202),
			config_assembly: None,
		};
		let mut active = ActiveConnections::new();
		let owner = active.insert(established(point, ExpectationKind::ExclusiveOwner));
		let input_only = active.insert(established(point, ExpectationKind::InputOnly));
		let listen_only = active.insert(established(point, ExpectationKind::ListenOnly));

		let mut cascade = plan_exclusive_owner_timeout_cascade(&active, owner, point);
		cascade.sort_by_key(|h| h.0);
		let mut expected = vec![input_only, listen_only];
		expected.sort_by_key(|h| h.0);
		assert_eq!(cascade, expected);
	}
}
