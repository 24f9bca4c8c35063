use std::net::SocketAddr;
use std::time::{Duration, Instant};

use rand::Rng;

/// Default delay, in milliseconds, used when the request's `sender_context`
/// does not encode a usable maximum (Vol2 2-4.2.1).
const DEFAULT_MAX_DELAY_MS: u16 = 2000;

/// Requests asking for less than this are clamped up, so that a burst of
/// broadcast ListIdentity requests on a busy segment doesn't make every
/// adapter answer in the same instant.
const MIN_DELAY_MS: u16 = 500;

/// A ListIdentity reply queued to go out at `send_at`, once its randomized
/// delay elapses.
#[derive(Debug, Clone)]
pub struct PendingReply {
	pub dest: SocketAddr,
	pub sender_context: [u8; 8],
	pub send_at: Instant,
}

/// Picks the delay for a single ListIdentity request per §4.5: the requested
/// maximum is read from the low 16 bits of `sender_context`, clamped to
/// `[MIN_DELAY_MS, requested]`, and a point is drawn uniformly within it.
pub fn pick_delay(sender_context: &[u8; 8]) -> Duration {
	let requested = u16::from_le_bytes([sender_context[0], sender_context[1]]);
	let max_delay = if requested == 0 { DEFAULT_MAX_DELAY_MS } else { requested };
	let max_delay = max_delay.max(MIN_DELAY_MS);

	let millis = rand::thread_rng().gen_range(0..=max_delay);
	Duration::from_millis(millis as u64)
}

/// A small fixed-capacity pool of delayed ListIdentity replies awaiting
/// their send time. Overflowing requests are dropped rather than queued -
/// this is a deliberate availability/memory tradeoff, not a bug: a flooded
/// adapter favors identity replies it already promised over accepting new
/// delay commitments it cannot keep.
pub struct DelayQueue {
	capacity: usize,
	pending: Vec<PendingReply>,
}

impl DelayQueue {
	pub fn new(capacity: usize) -> Self {
		DelayQueue {
			capacity,
			pending: Vec::with_capacity(capacity),
		}
	}

	/// Returns `true` if the request was accepted, `false` if it was dropped
	/// because the pool is full.
	pub fn push(&mut self, dest: SocketAddr, sender_context: [u8; 8], now: Instant) -> bool {
		if self.pending.len() >= self.capacity {
			return false;
		}
		let send_at = now + pick_delay(&sender_context);
		self.pending.push(PendingReply {
			dest,
			sender_context,
			send_at,
		});
		true
	}

	/// Removes and returns every reply whose delay has elapsed as of `now`.
	pub fn drain_ready(&mut self, now: Instant) -> Vec<PendingReply> {
		let (ready, still_pending): (Vec<_>, Vec<_>) = self.pending.drain(..).partition(|p| p.send_at <= now);
		self.pending = still_pending;
		ready
	}

	/// The earliest time at which any pending reply becomes ready, used by
	/// the caller's select loop to size its next timeout.
	pub fn next_deadline(&self) -> Option<Instant> {
		self.pending.iter().map(|p| p.send_at).min()
	}

	pub fn len(&self) -> usize {
		self.pending.len()
	}

	pub fn is_empty(&self) -> bool {
		self.pending.is_empty()
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn zero_requested_delay_uses_default_ceiling() {
		let ctx = [0u8; 8];
		for _ in 0..50 {
			let d = pick_delay(&ctx);
			assert!(d.as_millis() <= DEFAULT_MAX_DELAY_MS as u128);
		}
	}

	#[test]
	fn small_requested_delay_is_clamped_up() {
		let ctx = [10, 0, 0, 0, 0, 0, 0, 0];
		for _ in 0..50 {
			let d = pick_delay(&ctx);
			assert!(d.as_millis() <= MIN_DELAY_MS as u128);
		}
	}

	#[test]
	fn overflow_is_dropped() {
		let mut queue = DelayQueue::new(1);
		let now = Instant::now();
		let dest: SocketAddr = "127.0.0.1:2222".parse().unwrap();
		assert!(queue.push(dest, [0; 8], now));
		assert!(!queue.push(dest, [0; 8], now));
		assert_eq!(queue.len(), 1);
	}

	#[test]
	fn drain_ready_only_returns_elapsed_entries() {
		let mut queue = DelayQueue::new(4);
		let now = Instant::now();
		let dest: SocketAddr = "127.0.0.1:2222".parse().unwrap();
		// A far-future sender_context-derived delay won't have elapsed yet.
		queue.push(dest, [0xFF, 0xFF, 0, 0, 0, 0, 0, 0], now);
		assert!(queue.drain_ready(now).is_empty());
		assert_eq!(queue.len(), 1);

		let far_future = now + Duration::from_secs(120);
		assert_eq!(queue.drain_ready(far_future).len(), 1);
		assert!(queue.is_empty());
	}
}
