use std::collections::HashMap;
use std::net::IpAddr;

use cip_object::ConnectionHandle;

use crate::expectation::{ConnectionPoint, ExpectationKind};
use crate::forward_open::ConnectionData;
use crate::triad::ConnectionTriad;

/// §4.9's connection state machine. `NonExistent` is never stored:
/// reaching it means the connection is removed from [`ActiveConnections`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
	Configuring,
	Established,
	TimedOut,
	Closing,
}

/// An active (or being-configured) connection: the negotiated
/// [`ConnectionData`] plus the runtime bookkeeping the Connection Manager
/// tracks across its lifetime.
pub struct Connection {
	pub state: ConnectionState,
	pub kind: ExpectationKind,
	pub point: ConnectionPoint,
	pub data: ConnectionData,
	pub originator_ip: IpAddr,
	/// Counts down in the core's tick handler; reaching zero times out the
	/// connection.
	pub watchdog_remaining_usecs: u32,
}

impl Connection {
	pub fn reset_watchdog(&mut self) {
		self.watchdog_remaining_usecs = self.data.inactivity_watchdog_usecs();
	}
}

/// Generates the connection ids this device assigns on every accepted
/// Forward_Open, per §9: `(incarnation_id << 16) | counter`.
pub struct ConnectionIdAllocator {
	incarnation_id: u16,
	next_counter: u16,
}

impl ConnectionIdAllocator {
	pub fn new(incarnation_id: u16) -> Self {
		ConnectionIdAllocator {
			incarnation_id,
			next_counter: 1,
		}
	}

	pub fn next(&mut self) -> u32 {
		let id = ((self.incarnation_id as u32) << 16) | self.next_counter as u32;
		self.next_counter = self.next_counter.wrapping_add(1);
		id
	}
}

/// The set of connections currently Configuring, Established, TimedOut, or
/// Closing, keyed by an opaque [`ConnectionHandle`] shared with `cip-ioconn`
/// and the [`cip_object::ApplicationHooks`] callbacks.
#[derive(Default)]
pub struct ActiveConnections {
	connections: HashMap<ConnectionHandle, Connection>,
	next_handle: u32,
}

impl ActiveConnections {
	pub fn new() -> Self {
		ActiveConnections::default()
	}

	pub fn insert(&mut self, connection: Connection) -> ConnectionHandle {
		let handle = ConnectionHandle(self.next_handle);
		self.next_handle = self.next_handle.wrapping_add(1);
		self.connections.insert(handle, connection);
		handle
	}

	pub fn remove(&mut self, handle: ConnectionHandle) -> Option<Connection> {
		self.connections.remove(&handle)
	}

	pub fn get(&self, handle: ConnectionHandle) -> Option<&Connection> {
		self.connections.get(&handle)
	}

	pub fn get_mut(&mut self, handle: ConnectionHandle) -> Option<&mut Connection> {
		self.connections.get_mut(&handle)
	}

	pub fn iter(&self) -> impl Iterator<Item = (ConnectionHandle, &Connection)> {
		self.connections.iter().map(|(h, c)| (*h, c))
	}

	pub fn iter_mut(&mut self) -> impl Iterator<Item = (ConnectionHandle, &mut Connection)> {
		self.connections.iter_mut().map(|(h, c)| (*h, c))
	}

	/// Finds the established connection whose triad matches a Forward_Close
	/// request (§4.9). Forward_Close only ever targets `Established` or
	/// `TimedOut` connections; the others are transient internal states.
	pub fn find_by_triad(&self, triad: &ConnectionTriad) -> Option<ConnectionHandle> {
		self.connections
			.iter()
			.find(|(_, c)| c.data.triad == *triad && matches!(c.state, ConnectionState::Established | ConnectionState::TimedOut))
			.map(|(h, _)| *h)
	}

	/// Finds the established connection a connected explicit (SendUnitData)
	/// message targets by the `connection_identifier` the CPF connected
	/// address item carries - the O→T connection id this device assigned on
	/// Forward_Open, per §4.4's NotifyConnected.
	pub fn find_by_consuming_id(&self, consuming_connection_id: u32) -> Option<ConnectionHandle> {
		self.connections
			.iter()
			.find(|(_, c)| c.data.o_to_t_connection_id == consuming_connection_id && matches!(c.state, ConnectionState::Established))
			.map(|(h, _)| *h)
	}

	/// How many active connections currently occupy `point` under `kind`,
	/// for expectation capacity enforcement.
	pub fn count_at(&self, kind: ExpectationKind, point: ConnectionPoint) -> usize {
		self.connections
			.values()
			.filter(|c| c.kind == kind && c.point == point && matches!(c.state, ConnectionState::Configuring | ConnectionState::Established))
			.count()
	}

	/// All established connections sharing the same producing path, for
	/// multicast takeover and the exclusive-owner timeout cascade (§4.10).
	pub fn siblings_on_producing_point(&self, point: ConnectionPoint, exclude: ConnectionHandle) -> Vec<ConnectionHandle> {
		self.connections
			.iter()
			.filter(|(h, c)| **h != exclude && c.point.producing_assembly == point.producing_assembly && matches!(c.state, ConnectionState::Established))
			.map(|(h, _)| *h)
			.collect()
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::forward_open::parse_forward_open;

	fn sample_data() -> ConnectionData {
		parse_forward_open(&[
			0x03, 0xFA, 0, 0, 0, 0, 0, 0, 0, 0, 0x10, 0x27, 0x42, 0x00, 0x01, 0x02, 0x03, 0x04, 0x03, 0, 0, 0, 0x40, 0x42, 0x0F, 0x00, 0x04, 0x20, 0x40,
			0x42, 0x0F, 0x00, 0x04, 0x20, 0x01, 0x03, 0x20, 0x04, 0x24, 0x65, 0x2C, 0x66,
		])
		.unwrap()
	}

	#[test]
	fn allocator_produces_increasing_ids_with_incarnation_prefix() {
		let mut alloc = ConnectionIdAllocator::new(0xBEEF);
		let a = alloc.next();
		let b = alloc.next();
		assert_eq!(a >> 16, 0xBEEF);
		assert_eq!(b - a, 1);
	}

	#[test]
	fn active_connections_tracks_capacity_per_point() {
		let mut active = ActiveConnections::new();
		let point = ConnectionPoint {
			consuming_assembly: Some(100),
			producing_assembly: Some(101),
			config_assembly: None,
		};
		let data = sample_data();
		let conn = Connection {
			state: ConnectionState::Established,
			kind: ExpectationKind::InputOnly,
			point,
			data,
			originator_ip: "10.0.0.5".parse().unwrap(),
			watchdog_remaining_usecs: 1_000_000,
		};
		active.insert(conn);
		assert_eq!(active.count_at(ExpectationKind::InputOnly, point), 1);
		assert_eq!(active.count_at(ExpectationKind::ListenOnly, point), 0);
	}

	#[test]
	fn finds_connection_by_triad_only_when_established_or_timed_out() {
		let mut active = ActiveConnections::new();
		let point = ConnectionPoint {
			consuming_assembly: Some(1),
			producing_assembly: Some(2),
			config_assembly: None,
		};
		let data = sample_data();
		let triad = data.triad;
		let conn = Connection {
			state: ConnectionState::Configuring,
			kind: ExpectationKind::ExclusiveOwner,
			point,
			data,
			originator_ip: "10.0.0.5".parse().unwrap(),
			watchdog_remaining_usecs: 0,
		};
		let handle = active.insert(conn);
		assert!(active.find_by_triad(&triad).is_none());
		active.get_mut(handle).unwrap().state = ConnectionState::Established;
		assert_eq!(active.find_by_triad(&triad), Some(handle));
	}
}
