//! Padded CIP EPATH parsing (Vol1 Appendix C): segment dispatch, Application
//! Path accumulation with inheritance across Forward_Open's multiple paths,
//! and Electronic Key compatibility checking.

use cip_codec::ByteReader;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EPathError {
	#[error("path segment truncated")]
	Truncated,
	#[error("unsupported electronic key format {0}")]
	UnsupportedKeyFormat(u8),
	#[error("reserved or unrecognised segment type 0b{0:03b}")]
	InvalidSegmentType(u8),
	#[error("reserved logical format")]
	InvalidLogicalFormat,
}

impl From<std::io::Error> for EPathError {
	fn from(_: std::io::Error) -> Self {
		EPathError::Truncated
	}
}

/// The sub-type of a Logical segment (Vol1 Table C-1.1), excluding Special
/// (which this parser resolves eagerly into [`Segment::ElectronicKey`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalType {
	ClassId,
	InstanceId,
	MemberId,
	ConnectionPoint,
	AttributeId,
	ServiceId,
}

/// One decoded EPATH segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
	Port {
		port: u16,
		link_address: Vec<u8>,
	},
	Logical {
		logical_type: LogicalType,
		value: u32,
	},
	ElectronicKey(ElectronicKey),
	Network {
		subtype: u8,
		data: Vec<u8>,
	},
	Symbolic(String),
	/// A "simple" data segment: opaque 16-bit-word-counted data, most often
	/// used to carry connection configuration payload.
	Data(Vec<u8>),
}

/// The key segment carried by a connection path, validated against the
/// target device's own identity at Forward_Open time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElectronicKey {
	pub vendor_id: u16,
	pub device_type: u16,
	pub product_code: u16,
	/// High bit is the compatibility flag; low 7 bits are the major revision.
	pub major_revision: u8,
	pub minor_revision: u8,
}

#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum KeyMismatch {
	#[error("vendor id or product code mismatch")]
	VendorOrProductCodeMismatch,
	#[error("device type mismatch")]
	DeviceTypeMismatch,
	#[error("revision mismatch")]
	RevisionMismatch,
}

/// The device-side identity fields an [`ElectronicKey`] is checked against.
#[derive(Debug, Clone, Copy)]
pub struct DeviceIdentity {
	pub vendor_id: u16,
	pub device_type: u16,
	pub product_code: u16,
	pub major_revision: u8,
	pub minor_revision: u8,
}

impl ElectronicKey {
	pub fn compatibility_mode(&self) -> bool {
		self.major_revision & 0x80 != 0
	}

	pub fn major(&self) -> u8 {
		self.major_revision & 0x7F
	}

	/// Checks this key against the device's own identity per §4.3.
	pub fn check(&self, device: &DeviceIdentity) -> Result<(), KeyMismatch> {
		let matches_or_wild = |key: u16, dev: u16| key == 0 || key == dev;

		if !matches_or_wild(self.vendor_id, device.vendor_id) || !matches_or_wild(self.product_code, device.product_code) {
			return Err(KeyMismatch::VendorOrProductCodeMismatch);
		}

		if !matches_or_wild(self.device_type, device.device_type) {
			return Err(KeyMismatch::DeviceTypeMismatch);
		}

		if self.compatibility_mode() {
			if self.major() != device.major_revision {
				return Err(KeyMismatch::RevisionMismatch);
			}
			if self.minor_revision == 0 || self.minor_revision > device.minor_revision {
				return Err(KeyMismatch::RevisionMismatch);
			}
		} else {
			let major_ok = self.major() == 0 || self.major() == device.major_revision;
			let minor_ok = self.minor_revision == 0 || self.minor_revision == device.minor_revision;
			if !major_ok || !minor_ok {
				return Err(KeyMismatch::RevisionMismatch);
			}
		}

		Ok(())
	}
}

/// An accumulated Application Path: up to class/instance/attribute/member.
/// Produced by folding a run of consecutive Logical segments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplicationPath {
	pub class: Option<u16>,
	/// Instance id, or a connection point when the path targets a
	/// Connection-Point logical type (the Assembly object overloads the two).
	pub instance: Option<u32>,
	pub attribute: Option<u16>,
	pub member: Option<u16>,
}

impl ApplicationPath {
	/// A path is sufficient once it names at least a class and an instance.
	pub fn is_sufficient(&self) -> bool {
		self.class.is_some() && self.instance.is_some()
	}

	/// Fills any field this path omits from `prev`, per §4.2's rule that the
	/// second and third Forward_Open application paths inherit from the one
	/// before them.
	pub fn inherit_from(&mut self, prev: &ApplicationPath) {
		if self.class.is_none() {
			self.class = prev.class;
		}
		if self.instance.is_none() {
			self.instance = prev.instance;
		}
		if self.attribute.is_none() {
			self.attribute = prev.attribute;
		}
		if self.member.is_none() {
			self.member = prev.member;
		}
	}

	fn fold_logical(&mut self, logical_type: LogicalType, value: u32) {
		match logical_type {
			LogicalType::ClassId => self.class = Some(value as u16),
			LogicalType::InstanceId | LogicalType::ConnectionPoint => self.instance = Some(value),
			LogicalType::AttributeId => self.attribute = Some(value as u16),
			LogicalType::MemberId => self.member = Some(value as u16),
			LogicalType::ServiceId => {}
		}
	}
}

/// Parses every segment in `bytes` as a contiguous padded EPATH.
pub fn parse_segments(bytes: &[u8]) -> Result<Vec<Segment>, EPathError> {
	let mut reader = ByteReader::new(bytes);
	let mut segments = Vec::new();
	while reader.remaining() > 0 {
		segments.push(parse_one(&mut reader)?);
	}
	Ok(segments)
}

fn parse_one(reader: &mut ByteReader) -> Result<Segment, EPathError> {
	let head = reader.get8()?;

	if head == 0x34 {
		let format = reader.get8()?;
		if format != 0x04 {
			return Err(EPathError::UnsupportedKeyFormat(format));
		}
		return Ok(Segment::ElectronicKey(ElectronicKey {
			vendor_id: reader.get16()?,
			device_type: reader.get16()?,
			product_code: reader.get16()?,
			major_revision: reader.get8()?,
			minor_revision: reader.get8()?,
		}));
	}

	let segment_type = (head >> 5) & 0x07;
	match segment_type {
		0b000 => parse_port(reader, head),
		0b001 => parse_logical(reader, head),
		0b010 => {
			let subtype = head & 0x1F;
			let len = reader.get8()? as usize;
			let data = reader.get_bytes(len)?.to_vec();
			if len % 2 != 0 {
				reader.advance(1)?;
			}
			Ok(Segment::Network { subtype, data })
		}
		0b011 => {
			let len = (head & 0x1F) as usize;
			let bytes = reader.get_bytes(len)?;
			let s = String::from_utf8_lossy(bytes).into_owned();
			if len % 2 != 0 {
				reader.advance(1)?;
			}
			Ok(Segment::Symbolic(s))
		}
		0b100 => {
			// Simple data segment: word count followed by that many 16-bit words.
			let word_count = reader.get8()? as usize;
			let data = reader.get_bytes(word_count * 2)?.to_vec();
			Ok(Segment::Data(data))
		}
		other => Err(EPathError::InvalidSegmentType(other)),
	}
}

fn parse_port(reader: &mut ByteReader, head: u8) -> Result<Segment, EPathError> {
	let extended_link = head & 0x10 != 0;
	let port_id = head & 0x0F;

	let port = if port_id == 0x0F {
		reader.get16()?
	} else {
		port_id as u16
	};

	let link_len = if extended_link { reader.get8()? as usize } else { 1 };
	let link_address = reader.get_bytes(link_len)?.to_vec();
	if link_address.len() % 2 != 0 {
		reader.advance(1)?;
	}

	Ok(Segment::Port { port, link_address })
}

fn parse_logical(reader: &mut ByteReader, head: u8) -> Result<Segment, EPathError> {
	let logical_type = match (head >> 2) & 0x07 {
		0 => LogicalType::ClassId,
		1 => LogicalType::InstanceId,
		2 => LogicalType::MemberId,
		3 => LogicalType::ConnectionPoint,
		4 => LogicalType::AttributeId,
		6 => LogicalType::ServiceId,
		_ => return Err(EPathError::InvalidLogicalFormat),
	};

	let value = match head & 0x03 {
		0 => reader.get8()? as u32,
		1 => {
			reader.advance(1)?;
			reader.get16()? as u32
		}
		2 => {
			reader.advance(1)?;
			reader.get32()?
		}
		_ => return Err(EPathError::InvalidLogicalFormat),
	};

	Ok(Segment::Logical { logical_type, value })
}

/// Folds a run of [`Segment::Logical`] segments into successive
/// [`ApplicationPath`]s, splitting at every segment that is not Logical.
/// Returns the application paths in encounter order alongside any
/// [`ElectronicKey`] and trailing [`Segment::Data`] found outside a run.
pub fn group_application_paths(segments: &[Segment]) -> (Vec<ApplicationPath>, Option<ElectronicKey>, Option<Vec<u8>>) {
	let mut paths = Vec::new();
	let mut key = None;
	let mut data_segment = None;
	let mut current = ApplicationPath::default();
	let mut in_run = false;

	for segment in segments {
		match segment {
			Segment::Logical { logical_type, value } => {
				current.fold_logical(*logical_type, *value);
				in_run = true;
			}
			Segment::ElectronicKey(k) => key = Some(*k),
			Segment::Data(bytes) => data_segment = Some(bytes.clone()),
			_ => {
				if in_run {
					paths.push(std::mem::take(&mut current));
					in_run = false;
				}
			}
		}
	}

	if in_run {
		paths.push(current);
	}

	(paths, key, data_segment)
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn parses_padded_class_instance_attribute() {
		// Class 0x6B (8-bit), Instance 1 (8-bit), Attribute 3 (8-bit).
		let bytes = [0x20, 0x6B, 0x24, 0x01, 0x30, 0x03];
		let segments = parse_segments(&bytes).unwrap();
		assert_eq!(
			segments,
			vec![
				Segment::Logical {
					logical_type: LogicalType::ClassId,
					value: 0x6B
				},
				Segment::Logical {
					logical_type: LogicalType::InstanceId,
					value: 1
				},
				Segment::Logical {
					logical_type: LogicalType::AttributeId,
					value: 3
				},
			]
		);

		let (paths, key, data) = group_application_paths(&segments);
		assert_eq!(paths.len(), 1);
		assert_eq!(paths[0].class, Some(0x6B));
		assert_eq!(paths[0].instance, Some(1));
		assert_eq!(paths[0].attribute, Some(3));
		assert!(key.is_none());
		assert!(data.is_none());
	}

	#[test]
	fn parses_16_bit_logical_with_pad_byte() {
		// Class 0x20 8-bit=0x04, Instance 16-bit=0x2500 -> 0x300 with pad byte.
		let bytes = [0x20, 0x04, 0x25, 0x00, 0x00, 0x03];
		let segments = parse_segments(&bytes).unwrap();
		match &segments[1] {
			Segment::Logical { logical_type, value } => {
				assert_eq!(*logical_type, LogicalType::InstanceId);
				assert_eq!(*value, 0x0300);
			}
			_ => panic!("expected logical segment"),
		}
	}

	#[test]
	fn inherits_missing_fields_from_previous_path() {
		let mut second = ApplicationPath {
			instance: Some(5),
			..Default::default()
		};
		let first = ApplicationPath {
			class: Some(0x64),
			instance: Some(1),
			..Default::default()
		};
		second.inherit_from(&first);
		assert_eq!(second.class, Some(0x64));
		assert_eq!(second.instance, Some(5));
	}

	#[test]
	fn electronic_key_wildcards_zero_fields() {
		let key = ElectronicKey {
			vendor_id: 0,
			device_type: 0,
			product_code: 0,
			major_revision: 0,
			minor_revision: 0,
		};
		let device = DeviceIdentity {
			vendor_id: 42,
			device_type: 12,
			product_code: 99,
			major_revision: 3,
			minor_revision: 1,
		};
		assert!(key.check(&device).is_ok());
	}

	#[test]
	fn electronic_key_compatibility_mode_requires_minor_at_or_below() {
		let key = ElectronicKey {
			vendor_id: 1,
			device_type: 1,
			product_code: 1,
			major_revision: 0x80 | 3,
			minor_revision: 2,
		};
		let device = DeviceIdentity {
			vendor_id: 1,
			device_type: 1,
			product_code: 1,
			major_revision: 3,
			minor_revision: 4,
		};
		assert!(key.check(&device).is_ok());

		let device_too_old = DeviceIdentity {
			minor_revision: 1,
			..device
		};
		assert_eq!(key.check(&device_too_old), Err(KeyMismatch::RevisionMismatch));
	}

	#[test]
	fn unknown_segment_type_is_rejected() {
		let bytes = [0xE0u8];
		assert_eq!(parse_segments(&bytes), Err(EPathError::InvalidSegmentType(0b111)));
	}
}
