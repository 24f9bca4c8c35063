/// Identifies a Forward_Open request/connection pair (Vol1 §3-5.5): the
/// triple a Forward_Close must echo exactly to be matched against an
/// established connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionTriad {
	pub connection_serial: u16,
	pub originator_vendor_id: u16,
	pub originator_serial: u32,
}
