use std::collections::BTreeMap;

use cip_codec::{ByteReader, ByteWriter};
use cip_epath::{group_application_paths, parse_segments, Segment};

use crate::class::{get_attribute_all, Class};
use crate::service::{ServiceReply, ServiceRequest, SVC_GET_ATTRIBUTE_ALL};
use crate::status::{CipStatus, GeneralStatus};

/// The Symbol class id (Vol1 Table C-1.3): a symbolic segment addresses an
/// instance of this class rather than a Logical class/instance path.
pub const SYMBOL_CLASS_ID: u16 = 0x6B;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RequestParseError {
	#[error("message router request truncated")]
	Truncated,
	#[error("EPATH could not be resolved to a class/instance")]
	UnresolvedPath,
}

impl From<std::io::Error> for RequestParseError {
	fn from(_: std::io::Error) -> Self {
		RequestParseError::Truncated
	}
}

/// The Class/Instance/Attribute registry (§4.7): a map from `class_id` to
/// [`Class`], keyed uniquely per §3's invariant.
#[derive(Default)]
pub struct ObjectModel {
	classes: BTreeMap<u16, Class>,
}

impl ObjectModel {
	pub fn new() -> Self {
		ObjectModel::default()
	}

	pub fn register_class(&mut self, class: Class) {
		let id = class.class_id;
		if self.classes.insert(id, class).is_some() {
			panic!("duplicate class id 0x{:04X}", id);
		}
	}

	pub fn class(&self, id: u16) -> Option<&Class> {
		self.classes.get(&id)
	}

	pub fn class_mut(&mut self, id: u16) -> Option<&mut Class> {
		self.classes.get_mut(&id)
	}

	/// §4.7 `NotifyMR`: deserializes a message-router request out of
	/// `request`, resolves its target, dispatches the matching service, and
	/// returns the full reply bytes (`reply_service`, general status,
	/// additional-status words, service-specific payload). `originator_ip`
	/// is the sender's address when the carrying transport has one (UDP/TCP
	/// explicit messaging); it is threaded through to the invoked service as
	/// [`ServiceRequest::originator_ip`].
	pub fn notify_mr(&mut self, request: &[u8], originator_ip: Option<std::net::IpAddr>) -> Vec<u8> {
		match self.dispatch(request, originator_ip) {
			Ok((reply_service, status, payload)) => encode_reply(reply_service, status, &payload),
			Err(_) => encode_reply(0, GeneralStatus::PathSegmentError.into(), &[]),
		}
	}

	fn dispatch(&mut self, request: &[u8], originator_ip: Option<std::net::IpAddr>) -> Result<(u8, CipStatus, Vec<u8>), RequestParseError> {
		let mut reader = ByteReader::new(request);
		let request_service = reader.get8()?;
		let word_count = reader.get8()? as usize;
		let path_bytes = reader.get_bytes(word_count * 2)?;
		let payload = reader.peek_remaining().to_vec();

		let segments = parse_segments(path_bytes).map_err(|_| RequestParseError::UnresolvedPath)?;
		let (paths, _key, _data) = group_application_paths(&segments);
		let path = paths.first().cloned().unwrap_or_default();

		let is_symbolic = segments.iter().any(|s| matches!(s, Segment::Symbolic(_)));
		let (class_id, instance_id) = if is_symbolic {
			(SYMBOL_CLASS_ID, 0)
		} else {
			match path.class {
				Some(class_id) => (class_id, path.instance.unwrap_or(0)),
				None => return Ok((request_service | 0x80, GeneralStatus::PathDestinationUnknown.into(), vec![])),
			}
		};

		let reply_service = request_service | 0x80;

		let Some(class) = self.classes.get_mut(&class_id) else {
			return Ok((reply_service, GeneralStatus::PathDestinationUnknown.into(), vec![]));
		};

		let has_service = request_service == SVC_GET_ATTRIBUTE_ALL || class.has_service(request_service);
		if !has_service {
			return Ok((reply_service, GeneralStatus::ServiceNotSupported.into(), vec![]));
		}

		if class.instance(instance_id).is_none() {
			return Ok((reply_service, GeneralStatus::PathDestinationUnknown.into(), vec![]));
		}

		if request_service == SVC_GET_ATTRIBUTE_ALL {
			let mask = class.attribute_all_mask;
			let instance = class.instance(instance_id).unwrap();
			return match get_attribute_all(instance, mask, class.attribute_all_gap_widths()) {
				Ok(payload) => Ok((reply_service, CipStatus::ok(), payload)),
				Err(status) => Ok((reply_service, status, vec![])),
			};
		}

		let svc_request = ServiceRequest {
			class_id,
			instance_id,
			attribute: path.attribute,
			payload,
			originator_ip,
		};
		let mut reply = ServiceReply::default();
		let instance = class.instance_mut(instance_id).unwrap();
		let service = class.service_mut(request_service).unwrap();
		let status = service.invoke(instance, &svc_request, &mut reply);

		Ok((reply_service, status, reply.payload))
	}
}

fn encode_reply(reply_service: u8, status: CipStatus, payload: &[u8]) -> Vec<u8> {
	let additional_words = status.additional;
	let mut buf = vec![0u8; 4 + additional_words.len() * 2 + payload.len()];
	let mut w = ByteWriter::new(&mut buf);
	// Errors below are unreachable: `buf` is sized to exactly fit everything
	// written into it.
	w.put8(reply_service).ok();
	w.put8(0).ok(); // reserved
	w.put8(status.general.into()).ok();
	w.put8(additional_words.len() as u8).ok();
	for word in &additional_words {
		w.put16(*word).ok();
	}
	w.append(payload).ok();
	buf
}

#[cfg(test)]
mod test {
	use std::cell::RefCell;
	use std::rc::Rc;

	use super::*;
	use crate::attribute::{Attribute, AttributeFlags};
	use crate::instance::Instance;
	use crate::service::SVC_GET_ATTRIBUTE_SINGLE;
	use crate::types::CipDataType;

	fn identity_model() -> ObjectModel {
		let mut model = ObjectModel::new();
		let mut class = Class::new(0x01, 1, "Identity", 0);
		let mut instance = Instance::new(1);
		instance.add_attribute(Attribute::new_default(
			1,
			CipDataType::Uint,
			AttributeFlags::get_only(),
			Rc::new(RefCell::new(vec![0x01, 0x00])),
		));
		class.add_instance(instance);
		model.register_class(class);
		model
	}

	#[test]
	fn get_attribute_single_on_known_attribute_succeeds() {
		let mut model = identity_model();
		// service=0x0E, word_count=3 (class 8-bit=0x01, instance 8-bit=1, attr 8-bit=1)
		let request = [SVC_GET_ATTRIBUTE_SINGLE, 3, 0x20, 0x01, 0x24, 0x01, 0x30, 0x01];
		let reply = model.notify_mr(&request, None);
		assert_eq!(reply[0], SVC_GET_ATTRIBUTE_SINGLE | 0x80);
		assert_eq!(reply[2], 0); // Success
		assert_eq!(&reply[4..], &[0x01, 0x00]);
	}

	#[test]
	fn unknown_class_yields_path_destination_unknown() {
		let mut model = identity_model();
		let request = [SVC_GET_ATTRIBUTE_SINGLE, 2, 0x20, 0x99, 0x24, 0x01];
		let reply = model.notify_mr(&request, None);
		assert_eq!(reply[2], 0x05); // PathDestinationUnknown
	}

	#[test]
	fn unknown_instance_yields_path_destination_unknown() {
		let mut model = identity_model();
		let request = [SVC_GET_ATTRIBUTE_SINGLE, 2, 0x20, 0x01, 0x24, 0x63];
		let reply = model.notify_mr(&request, None);
		assert_eq!(reply[2], 0x05);
	}
}
