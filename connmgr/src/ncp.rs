/// O->T/T->O connection type carried in a Network Connection Parameters word
/// (Vol1 Table 3-5.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionType {
	Null,
	Multicast,
	PointToPoint,
	Reserved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
	Low,
	High,
	Scheduled,
	Urgent,
}

/// A decoded Network Connection Parameters word. The connection-size field
/// is the size in bytes the originator proposes for this direction's data;
/// whether it must match the assembly's length exactly or just bound it
/// depends on `fixed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ncp {
	pub connection_type: ConnectionType,
	pub priority: Priority,
	pub fixed: bool,
	pub size: u16,
}

impl Ncp {
	pub fn parse(word: u16) -> Ncp {
		let connection_type = match (word >> 13) & 0b11 {
			0b00 => ConnectionType::Null,
			0b01 => ConnectionType::Multicast,
			0b10 => ConnectionType::PointToPoint,
			_ => ConnectionType::Reserved,
		};
		let priority = match (word >> 10) & 0b11 {
			0b00 => Priority::Low,
			0b01 => Priority::High,
			0b10 => Priority::Scheduled,
			_ => Priority::Urgent,
		};
		let fixed = (word >> 9) & 1 == 0;
		let size = word & 0x01FF;
		Ncp {
			connection_type,
			priority,
			fixed,
			size,
		}
	}

	/// §9's resolved open question: a fixed-size NCP requires the assembly's
	/// length to match exactly; a variable-size NCP only bounds it above.
	pub fn accepts_assembly_length(&self, assembly_len: usize) -> bool {
		if self.fixed {
			assembly_len == self.size as usize
		} else {
			assembly_len <= self.size as usize
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn decodes_point_to_point_fixed() {
		// type=10 (PointToPoint), priority=01 (High), fixed=0, size=0x0010
		let word = 0b010_0_01_0_000010000u16;
		let ncp = Ncp::parse(word);
		assert_eq!(ncp.connection_type, ConnectionType::PointToPoint);
		assert_eq!(ncp.priority, Priority::High);
		assert!(ncp.fixed);
		assert_eq!(ncp.size, 16);
	}

	#[test]
	fn variable_size_only_bounds_above() {
		let ncp = Ncp {
			connection_type: ConnectionType::PointToPoint,
			priority: Priority::Low,
			fixed: false,
			size: 32,
		};
		assert!(ncp.accepts_assembly_length(32));
		assert!(ncp.accepts_assembly_length(10));
		assert!(!ncp.accepts_assembly_length(33));
	}

	#[test]
	fn fixed_size_requires_exact_match() {
		let ncp = Ncp {
			connection_type: ConnectionType::PointToPoint,
			priority: Priority::Low,
			fixed: true,
			size: 32,
		};
		assert!(ncp.accepts_assembly_length(32));
		assert!(!ncp.accepts_assembly_length(10));
	}
}
