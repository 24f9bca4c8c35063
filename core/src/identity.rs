use std::cell::RefCell;
use std::net::Ipv4Addr;
use std::rc::Rc;

use cip_codec::{ByteWriter, CipShortString, Endian, WriteToWithEndian};
use cip_epath::DeviceIdentity;
use cip_object::{Attribute, AttributeFlags, Class, CipDataType, Instance};

/// The Identity class id (Vol1 Table C-1.1).
pub const IDENTITY_CLASS_ID: u16 = 0x01;

/// Everything `CipStackInit` needs about this device: the Electronic
/// Key-shaped identity fields the Connection Manager validates, plus the
/// handful of extra attributes the Identity object and ListIdentity reply
/// expose that a key comparison does not need.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
	pub identity: DeviceIdentity,
	pub serial_number: u32,
	pub product_name: String,
	pub status: u16,
	pub state: u8,
	pub device_ip: Ipv4Addr,
	pub tcp_port: u16,
}

/// Builds the standard Identity object (class 0x01, instance 1) with the
/// Common Services plus the attributes every ListIdentity/explicit-message
/// client expects to be able to read.
pub fn build_identity_class(config: &DeviceConfig) -> Class {
	// GetAttributeAll covers attributes 1-7; bit `i` gates attribute id `i`, so
	// attribute 1's bit is 1<<1, not 1<<0.
	let mut class = Class::new(IDENTITY_CLASS_ID, 1, "Identity", 0b1111_1110);
	let mut instance = Instance::new(1);

	let attr = |id, ty, bytes: Vec<u8>| Attribute::new_default(id, ty, AttributeFlags::get_only(), Rc::new(RefCell::new(bytes)));

	instance.add_attribute(attr(1, CipDataType::Uint, config.identity.vendor_id.to_le_bytes().to_vec()));
	instance.add_attribute(attr(2, CipDataType::Uint, config.identity.device_type.to_le_bytes().to_vec()));
	instance.add_attribute(attr(3, CipDataType::Uint, config.identity.product_code.to_le_bytes().to_vec()));
	instance.add_attribute(attr(4, CipDataType::Uint, vec![config.identity.major_revision, config.identity.minor_revision]));
	instance.add_attribute(attr(5, CipDataType::Word, config.status.to_le_bytes().to_vec()));
	instance.add_attribute(attr(6, CipDataType::Udint, config.serial_number.to_le_bytes().to_vec()));

	let mut name_bytes = Vec::new();
	{
		let mut buf = vec![0u8; 1 + config.product_name.len()];
		let mut w = ByteWriter::new(&mut buf);
		CipShortString(config.product_name.clone()).write_to_with_endian(&mut w, Endian::Little).ok();
		name_bytes.extend_from_slice(w.as_slice());
	}
	instance.add_attribute(Attribute::new_custom(
		7,
		CipDataType::ShortString,
		AttributeFlags::get_only(),
		Some(Box::new(move || Ok(name_bytes.clone()))),
		None,
	));

	class.add_instance(instance);
	class
}

/// Builds the body of a `LIST_IDENTITY_ITEM` (Vol2 Table 2-4.3): protocol
/// version, a `sockaddr_in`-shaped socket address, the identity fields, the
/// product name, and device state.
pub fn build_list_identity_item(config: &DeviceConfig) -> Vec<u8> {
	let mut buf = vec![0u8; 64 + config.product_name.len()];
	let written = {
		let mut w = ByteWriter::new(&mut buf);
		w.put16(1).ok(); // protocol_version
		w.put16_be(2).ok(); // sin_family: AF_INET
		w.put16_be(config.tcp_port).ok();
		w.put32_be(u32::from(config.device_ip)).ok();
		w.fill(8, 0).ok(); // sin_zero
		w.put16(config.identity.vendor_id).ok();
		w.put16(config.identity.device_type).ok();
		w.put16(config.identity.product_code).ok();
		w.put8(config.identity.major_revision).ok();
		w.put8(config.identity.minor_revision).ok();
		w.put16(config.status).ok();
		w.put32(config.serial_number).ok();
		CipShortString(config.product_name.clone()).write_to_with_endian(&mut w, Endian::Little).ok();
		w.put8(config.state).ok();
		w.len()
	};
	buf.truncate(written);
	buf
}

#[cfg(test)]
mod test {
	use super::*;

	fn sample_config() -> DeviceConfig {
		DeviceConfig {
			identity: DeviceIdentity {
				vendor_id: 0x42,
				device_type: 0x0C,
				product_code: 7,
				major_revision: 1,
				minor_revision: 2,
			},
			serial_number: 0xCAFEBABE,
			product_name: "Widget".to_owned(),
			status: 0,
			state: 3,
			device_ip: Ipv4Addr::new(192, 168, 1, 50),
			tcp_port: 0xAF12,
		}
	}

	#[test]
	fn identity_instance_exposes_the_expected_attributes() {
		let class = build_identity_class(&sample_config());
		let instance = class.instance(1).unwrap();
		assert_eq!(instance.attribute(1).unwrap().get_single().unwrap(), 0x42u16.to_le_bytes());
		assert_eq!(instance.attribute(6).unwrap().get_single().unwrap(), 0xCAFEBABEu32.to_le_bytes());
	}

	#[test]
	fn get_attribute_all_covers_every_registered_attribute() {
		let class = build_identity_class(&sample_config());
		let instance = class.instance(1).unwrap();
		let payload = cip_object::get_attribute_all(instance, class.attribute_all_mask, class.attribute_all_gap_widths()).unwrap();
		// vendor_id(2) + device_type(2) + product_code(2) + revision(2) +
		// status(2) + serial_number(4) + product_name short string (1 + 6).
		assert_eq!(payload.len(), 2 + 2 + 2 + 2 + 2 + 4 + 1 + "Widget".len());
	}

	#[test]
	fn list_identity_item_encodes_socket_address_big_endian() {
		let body = build_list_identity_item(&sample_config());
		assert_eq!(&body[0..2], &1u16.to_le_bytes());
		assert_eq!(&body[2..4], &2u16.to_be_bytes());
		assert_eq!(&body[4..6], &0xAF12u16.to_be_bytes());
		assert_eq!(&body[6..10], &[192, 168, 1, 50]);
		let last = *body.last().unwrap();
		assert_eq!(last, 3);
	}
}
