//! `cip-core`: the collaborator surface that ties the encapsulation/session
//! layer, the object model, the Connection Manager, and the I/O connection
//! runtime into one `CipContext`, plus the current-thread `NetLoop` that
//! drives it from real sockets.
//!
//! `adapterd` is the only thing that constructs a `NetLoop`; everything else
//! in this crate is synchronous and has no opinion about async runtimes.

mod context;
mod explicit;
mod identity;
mod io_runtime;
mod net_loop;

pub use context::{CipContext, ManageReport, SendAction, SocketPlan, TcpToken};
pub use explicit::ExplicitOutcome;
pub use identity::{build_identity_class, build_list_identity_item, DeviceConfig, IDENTITY_CLASS_ID};
pub use io_runtime::{IoRuntime, SocketToken};
pub use net_loop::NetLoop;
