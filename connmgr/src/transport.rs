/// The Transport Type/Trigger byte (Vol1 Table 3-5.11).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
	Cyclic,
	ChangeOfState,
	Application,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportTrigger {
	/// True if this device is the connection's Server (the target is almost
	/// always the Server for an I/O connection).
	pub server: bool,
	pub trigger: Trigger,
	/// Transport class, 0-3; only class 0/1 (no fragmentation) are produced
	/// by the I/O connection runtime this adapter implements.
	pub transport_class: u8,
}

impl TransportTrigger {
	pub fn parse(byte: u8) -> Option<TransportTrigger> {
		let server = byte & 0x80 != 0;
		let trigger = match (byte >> 4) & 0x07 {
			0 => Trigger::Cyclic,
			1 => Trigger::ChangeOfState,
			2 => Trigger::Application,
			_ => return None,
		};
		let transport_class = byte & 0x0F;
		Some(TransportTrigger {
			server,
			trigger,
			transport_class,
		})
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn parses_server_cyclic_class1() {
		let t = TransportTrigger::parse(0b1_000_0001).unwrap();
		assert!(t.server);
		assert_eq!(t.trigger, Trigger::Cyclic);
		assert_eq!(t.transport_class, 1);
	}

	#[test]
	fn rejects_reserved_trigger() {
		assert!(TransportTrigger::parse(0b0_101_0001).is_none());
	}
}
