//! Per-connection bookkeeping `cip-ioconn`'s pure decision logic needs but
//! doesn't itself hold: sequence trackers, the production timer, and an
//! opaque handle standing in for whatever socket `adapterd`'s NetLoop has
//! bound for this connection's O→T/T→O traffic.

use std::net::SocketAddr;

use cip_ioconn::{Class1DuplicateTracker, IncomingSequenceTracker, ProductionTimer, RunIdleHeader};

/// Identifies a UDP socket the NetLoop owns, opaque to `cip-core`'s
/// synchronous logic the same way [`cip_encap::SessionTable`]'s `S` is
/// opaque to `cip-encap`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SocketToken(pub u64);

/// The runtime state of one established (or configuring) I/O connection,
/// keyed by [`cip_object::ConnectionHandle`] in [`crate::context::CipContext`].
pub struct IoRuntime {
	pub eip_sequence_producing: u32,
	pub sequence_count_producing: u16,
	pub eip_tracker: IncomingSequenceTracker,
	pub class1_tracker: Class1DuplicateTracker,
	pub production_timer: Option<ProductionTimer>,
	pub run_idle_enabled: bool,
	pub run_idle_state: Option<RunIdleHeader>,
	pub consuming_socket: Option<SocketToken>,
	pub producing_socket: Option<SocketToken>,
	pub send_address: Option<SocketAddr>,
}

impl IoRuntime {
	pub fn new(run_idle_enabled: bool) -> Self {
		IoRuntime {
			eip_sequence_producing: 0,
			sequence_count_producing: 0,
			eip_tracker: IncomingSequenceTracker::new(),
			class1_tracker: Class1DuplicateTracker::new(),
			production_timer: None,
			run_idle_enabled,
			run_idle_state: None,
			consuming_socket: None,
			producing_socket: None,
			send_address: None,
		}
	}
}
