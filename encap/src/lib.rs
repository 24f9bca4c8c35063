//! EtherNet/IP encapsulation: the 24-byte header every TCP/UDP command
//! carries, session bookkeeping, and the randomized-delay ListIdentity
//! scheduling required of UDP broadcast/multicast replies.

mod delay;
mod header;
mod session;

pub use delay::{pick_delay, DelayQueue, PendingReply};
pub use header::{BigHeader, EncapCommand, EncapHeader, EncapStatus};
pub use session::{RegisterError, SessionTable};
