//! The per-connection production/inhibit timers (§4.10 "Trigger/transmission
//! timer"), advanced once per system tick by `cip-core`'s `ManageConnections`
//! equivalent. Counters are signed so a tick that overshoots zero is
//! detected rather than silently clamped.

/// Rounds `rpi_usecs` up to the next multiple of `tick_usecs`, per
/// `expected_packet_rate`'s definition.
pub fn round_up_to_tick(rpi_usecs: u32, tick_usecs: u32) -> u32 {
	if tick_usecs == 0 {
		return rpi_usecs;
	}
	rpi_usecs.div_ceil(tick_usecs) * tick_usecs
}

/// Drives one connection's class-0/1 production schedule: a reloading
/// countdown timer gated by an optional Production Inhibit Timer for
/// non-cyclic triggers.
#[derive(Debug, Clone, Copy)]
pub struct ProductionTimer {
	expected_packet_rate_usecs: u32,
	transmission_timer_usecs: i64,
	production_inhibit_usecs: u32,
	inhibit_remaining_usecs: i64,
	cyclic: bool,
}

impl ProductionTimer {
	pub fn new(expected_packet_rate_usecs: u32, production_inhibit_usecs: u32, cyclic: bool) -> Self {
		ProductionTimer {
			expected_packet_rate_usecs,
			transmission_timer_usecs: expected_packet_rate_usecs as i64,
			production_inhibit_usecs,
			inhibit_remaining_usecs: 0,
			cyclic,
		}
	}

	/// Advances both counters by `elapsed_usecs`. Returns `true` exactly
	/// when this tick should produce a frame, reloading the transmission
	/// timer and rearming the inhibit timer as a side effect.
	pub fn tick(&mut self, elapsed_usecs: u32) -> bool {
		self.transmission_timer_usecs -= elapsed_usecs as i64;
		if !self.cyclic {
			self.inhibit_remaining_usecs -= elapsed_usecs as i64;
		}

		if self.transmission_timer_usecs > 0 {
			return false;
		}
		if !self.cyclic && self.inhibit_remaining_usecs > 0 {
			// The cyclic timer elapsed but production is still inhibited; defer
			// the reload until the next tick finds the inhibit timer clear too.
			return false;
		}

		self.transmission_timer_usecs += self.expected_packet_rate_usecs as i64;
		self.inhibit_remaining_usecs = self.production_inhibit_usecs as i64;
		true
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn rounds_up_to_the_next_tick_multiple() {
		assert_eq!(round_up_to_tick(9_500, 10_000), 10_000);
		assert_eq!(round_up_to_tick(10_000, 10_000), 10_000);
		assert_eq!(round_up_to_tick(10_001, 10_000), 20_000);
	}

	#[test]
	fn cyclic_timer_fires_every_period_and_reloads() {
		let mut timer = ProductionTimer::new(10_000, 0, true);
		assert!(!timer.tick(5_000));
		assert!(timer.tick(5_000));
		assert!(!timer.tick(5_000));
		assert!(timer.tick(5_000));
	}

	#[test]
	fn change_of_state_timer_is_gated_by_production_inhibit() {
		let mut timer = ProductionTimer::new(1_000, 5_000, false);
		assert!(timer.tick(1_000));
		// inhibit just rearmed to 5000us; even once the 1ms cyclic period
		// elapses again production stays gated until the inhibit drains.
		assert!(!timer.tick(1_000));
		assert!(!timer.tick(1_000));
		assert!(!timer.tick(1_000));
		assert!(timer.tick(2_000));
	}
}
