use cip_codec::ByteReader;
use cip_epath::{group_application_paths, parse_segments, ApplicationPath, ElectronicKey, Segment};

use crate::ncp::Ncp;
use crate::transport::TransportTrigger;
use crate::triad::ConnectionTriad;

/// The Production Inhibit Time Network segment's subtype (Vol1 Table C-1.3).
const PRODUCTION_INHIBIT_TIME_SUBTYPE: u8 = 0x03;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardOpenParseError {
	Truncated,
	InvalidTransportTrigger,
	InvalidPath,
}

impl From<std::io::Error> for ForwardOpenParseError {
	fn from(_: std::io::Error) -> Self {
		ForwardOpenParseError::Truncated
	}
}

/// The Connection Path portion of a Forward_Open request (§4.9): an
/// optional Electronic Key, an optional Production Inhibit Time, up to
/// three inheriting Application Paths, and an optional trailing
/// configuration Data segment.
#[derive(Debug, Clone, Default)]
pub struct ConnectionPath {
	pub electronic_key: Option<ElectronicKey>,
	pub production_inhibit_time_usecs: Option<u32>,
	pub application_paths: Vec<ApplicationPath>,
	pub config_data: Option<Vec<u8>>,
}

/// A parsed, not-yet-validated Forward_Open request (Vol1 Table 3-5.16).
#[derive(Debug, Clone)]
pub struct ConnectionData {
	pub priority_timetick: u8,
	pub timeout_ticks: u8,
	pub o_to_t_connection_id: u32,
	pub t_to_o_connection_id: u32,
	pub triad: ConnectionTriad,
	pub timeout_multiplier: u8,
	pub o_to_t_rpi_usecs: u32,
	pub o_to_t_ncp: Ncp,
	pub t_to_o_rpi_usecs: u32,
	pub t_to_o_ncp: Ncp,
	pub transport_trigger: TransportTrigger,
	pub path: ConnectionPath,
}

impl ConnectionData {
	/// §9: the timeout multiplier byte (0-7) scales to an actual multiplier
	/// of `4 << v`.
	pub fn timeout_multiplier_actual(&self) -> u32 {
		4u32 << self.timeout_multiplier
	}

	/// The inactivity watchdog's initial value, in microseconds: the larger
	/// of 10 seconds or the consumed (O->T) RPI scaled by the timeout
	/// multiplier.
	pub fn inactivity_watchdog_usecs(&self) -> u32 {
		self.o_to_t_rpi_usecs.saturating_mul(self.timeout_multiplier_actual()).max(10_000_000)
	}

	/// §4.9's `PITGreaterThanRPI` check: a non-zero Production Inhibit Time
	/// that exceeds the producing RPI is invalid.
	pub fn pit_exceeds_rpi(&self) -> bool {
		match self.path.production_inhibit_time_usecs {
			Some(pit) => pit > self.t_to_o_rpi_usecs,
			None => false,
		}
	}
}

pub fn parse_forward_open(payload: &[u8]) -> Result<ConnectionData, ForwardOpenParseError> {
	let mut r = ByteReader::new(payload);

	let priority_timetick = r.get8()?;
	let timeout_ticks = r.get8()?;
	let o_to_t_connection_id = r.get32()?;
	let t_to_o_connection_id = r.get32()?;
	let connection_serial = r.get16()?;
	let originator_vendor_id = r.get16()?;
	let originator_serial = r.get32()?;
	let timeout_multiplier = r.get8()?;
	r.advance(3)?; // reserved
	let o_to_t_rpi_usecs = r.get32()?;
	let o_to_t_ncp = Ncp::parse(r.get16()?);
	let t_to_o_rpi_usecs = r.get32()?;
	let t_to_o_ncp = Ncp::parse(r.get16()?);
	let transport_byte = r.get8()?;
	let transport_trigger = TransportTrigger::parse(transport_byte).ok_or(ForwardOpenParseError::InvalidTransportTrigger)?;

	let path_word_count = r.get8()? as usize;
	let path_bytes = r.get_bytes(path_word_count * 2)?;
	let segments = parse_segments(path_bytes).map_err(|_| ForwardOpenParseError::InvalidPath)?;

	let production_inhibit_time_usecs = segments.iter().find_map(|s| match s {
		Segment::Network { subtype, data } if *subtype == PRODUCTION_INHIBIT_TIME_SUBTYPE => data.first().map(|&ms| ms as u32 * 1000),
		_ => None,
	});

	let (mut application_paths, electronic_key, config_data) = group_application_paths(&segments);
	inherit_application_paths(&mut application_paths);

	Ok(ConnectionData {
		priority_timetick,
		timeout_ticks,
		o_to_t_connection_id,
		t_to_o_connection_id,
		triad: ConnectionTriad {
			connection_serial,
			originator_vendor_id,
			originator_serial,
		},
		timeout_multiplier,
		o_to_t_rpi_usecs,
		o_to_t_ncp,
		t_to_o_rpi_usecs,
		t_to_o_ncp,
		transport_trigger,
		path: ConnectionPath {
			electronic_key,
			production_inhibit_time_usecs,
			application_paths,
			config_data,
		},
	})
}

/// §4.2: the second and third Forward_Open application paths inherit any
/// field the one before them specified and they omit.
fn inherit_application_paths(paths: &mut [ApplicationPath]) {
	for i in 1..paths.len() {
		let (left, right) = paths.split_at_mut(i);
		let prev = left[i - 1].clone();
		right[0].inherit_from(&prev);
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn sample_request(path: &[u8]) -> Vec<u8> {
		let mut buf = vec![
			0x03, 0xFA, // priority/timetick, timeout_ticks
			0x00, 0x00, 0x00, 0x00, // O->T connection id (target assigns)
			0x00, 0x00, 0x00, 0x00, // T->O connection id (target assigns)
			0x10, 0x27, // connection serial
			0x42, 0x00, // vendor id
			0x01, 0x02, 0x03, 0x04, // originator serial
			0x03, 0x00, 0x00, 0x00, // timeout multiplier + reserved
			0x40, 0x42, 0x0F, 0x00, // O->T RPI = 1,000,000 us
			0x04, 0x20, // O->T NCP: point-to-point, fixed, size=4
			0x40, 0x42, 0x0F, 0x00, // T->O RPI
			0x04, 0x20, // T->O NCP
			0x01, // transport trigger: client, cyclic, class 1
		];
		buf.push((path.len() / 2) as u8);
		buf.extend_from_slice(path);
		buf
	}

	#[test]
	fn parses_a_well_formed_exclusive_owner_request() {
		let path = [0x20, 0x04, 0x24, 0x65, 0x2C, 0x66]; // class 4, instance 0x65, conn point 0x66
		let request = sample_request(&path);
		let data = parse_forward_open(&request).unwrap();
		assert_eq!(data.triad.connection_serial, 0x2710);
		assert_eq!(data.o_to_t_ncp.size, 4);
		assert_eq!(data.path.application_paths.len(), 1);
		assert_eq!(data.path.application_paths[0].class, Some(4));
		assert_eq!(data.timeout_multiplier_actual(), 32);
	}

	#[test]
	fn second_path_inherits_class_from_first() {
		let path = [
			0x20, 0x04, 0x24, 0x65, // path 1: class 4, instance 0x65
			0x2C, 0x66, // path 2: connection point only
		];
		let request = sample_request(&path);
		let data = parse_forward_open(&request).unwrap();
		assert_eq!(data.path.application_paths.len(), 2);
		assert_eq!(data.path.application_paths[1].class, Some(4));
		assert_eq!(data.path.application_paths[1].instance, Some(0x66));
	}
}
