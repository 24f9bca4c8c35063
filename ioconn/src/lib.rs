//! The class 0/1 I/O connection runtime (§4.10): sequence comparators,
//! producing/consuming frame assembly, the production/inhibit timer pair,
//! the multicast group address algorithm, and the socket-creation and
//! mastership-handoff decisions built on top of `cip-connmgr`'s active
//! connection set. No socket or timer primitive is held here - `cip-core`
//! owns the actual `tokio::net::UdpSocket`s and drives this crate's pure
//! decision logic from its event loop.

mod frame;
mod multicast;
mod sequence;
mod socket_plan;
mod takeover;
mod timer;

pub use frame::{build_producing_frame, validate_consuming_frame, ConsumedFrame, FrameRejection, OutboundFrame, RunIdleHeader};
pub use multicast::{derive_multicast_address, DEFAULT_IO_PORT};
pub use sequence::{seq_gt16, seq_gt32, seq_leq16, Class1DuplicateTracker, IncomingSequenceTracker};
pub use socket_plan::{plan_consuming_socket, plan_producing_socket, ConsumingSocketPlan, ProducingSocketPlan};
pub use takeover::{plan_exclusive_owner_timeout_cascade, plan_multicast_takeover, TakeoverAction};
pub use timer::{round_up_to_tick, ProductionTimer};
