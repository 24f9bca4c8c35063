//! Forward_Open/Forward_Close parsing and the Connection Manager class
//! (§4.9): connection-point expectation matching, application-path-combo
//! resolution (Vol1 Table 3-5.13), size/PIT/timeout-multiplier validation,
//! and the active connection set. `cip-ioconn` and `cip-core` build on top
//! of [`ConnMgrState`]'s [`ActiveConnections`] to run the I/O connection
//! runtime; this crate never touches a socket itself.

mod connection;
mod expectation;
mod forward_open;
mod manager;
mod ncp;
mod transport;
mod triad;

pub use connection::{ActiveConnections, Connection, ConnectionIdAllocator, ConnectionState};
pub use expectation::{ConnectionPoint, Expectation, ExpectationKind, ExpectationPool};
pub use forward_open::{ConnectionData, ConnectionPath, ForwardOpenParseError, parse_forward_open};
pub use manager::{handle_forward_close, handle_forward_open, register, AssemblyBuffers, ConnMgrState, ForwardOpenAccept, CONN_MGR_CLASS_ID};
pub use ncp::{ConnectionType, Ncp, Priority};
pub use transport::{Trigger, TransportTrigger};
pub use triad::ConnectionTriad;
