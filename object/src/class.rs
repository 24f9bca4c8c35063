use std::collections::BTreeMap;

use crate::instance::Instance;
use crate::service::{Service, ServiceReply, ServiceRequest, SVC_GET_ATTRIBUTE_SINGLE, SVC_SET_ATTRIBUTE_SINGLE};
use crate::status::{CipStatus, GeneralStatus};

/// A CIP Class: the class attributes (addressed as instance 0), the
/// instances it owns, the services it dispatches, and the bitmap of
/// attribute ids (< 32) that `GetAttributeAll` concatenates (§4.7).
///
/// `GetAttributeAll` is not a registered [`Service`] - it needs
/// `attribute_all_mask`, which lives on the class rather than the instance
/// the generic `Service` closure receives - so
/// [`crate::registry::ObjectModel::notify_mr`] special-cases it directly.
/// Every other service, including the two other Common Services, goes
/// through the ordinary service table.
pub struct Class {
	pub class_id: u16,
	pub revision: u16,
	pub class_name: String,
	pub attribute_all_mask: u32,
	/// Fixed wire width, in bytes, of every `attribute_all_mask`-covered
	/// attribute id that may have no registered [`Attribute`] (e.g. an
	/// optional attribute the integrator hasn't wired up) - §4.7's
	/// "Gaps... are filled with zeros of the defined fixed widths" needs to
	/// know that width from somewhere, since `Instance` has nothing to ask
	/// for a slot it never registered.
	attribute_all_gap_widths: BTreeMap<u16, usize>,
	class_attributes: Instance,
	instances: BTreeMap<u32, Instance>,
	services: BTreeMap<u8, Service>,
}

impl Class {
	/// Builds a class pre-registered with the `GetAttributeSingle`/
	/// `SetAttributeSingle` Common Services. Class-specific services (e.g.
	/// Forward_Open on the Connection Manager class) are added afterwards
	/// with [`Class::add_service`].
	pub fn new(class_id: u16, revision: u16, class_name: impl Into<String>, attribute_all_mask: u32) -> Self {
		let mut class = Class {
			class_id,
			revision,
			class_name: class_name.into(),
			attribute_all_mask,
			attribute_all_gap_widths: BTreeMap::new(),
			class_attributes: Instance::new(0),
			instances: BTreeMap::new(),
			services: BTreeMap::new(),
		};
		class.add_service(Service::new(SVC_GET_ATTRIBUTE_SINGLE, get_attribute_single));
		class.add_service(Service::new(SVC_SET_ATTRIBUTE_SINGLE, set_attribute_single));
		class
	}

	/// Declares the fixed width of a `GetAttributeAll`-masked attribute id
	/// for when it has no registered [`Attribute`] on a given instance, so
	/// [`get_attribute_all`] can zero-fill its slot instead of aborting the
	/// whole reply (§4.7).
	pub fn set_attribute_all_gap_width(&mut self, attribute_id: u16, width: usize) {
		self.attribute_all_gap_widths.insert(attribute_id, width);
	}

	pub fn attribute_all_gap_widths(&self) -> &BTreeMap<u16, usize> {
		&self.attribute_all_gap_widths
	}

	pub fn add_service(&mut self, service: Service) {
		self.services.insert(service.service_id, service);
	}

	pub fn add_instance(&mut self, instance: Instance) {
		let id = instance.instance_id;
		if id == 0 {
			panic!("instance id 0 is reserved for the class attribute set");
		}
		if self.instances.insert(id, instance).is_some() {
			panic!("duplicate instance id {} on class 0x{:04X}", id, self.class_id);
		}
	}

	pub fn class_attributes(&self) -> &Instance {
		&self.class_attributes
	}

	pub fn class_attributes_mut(&mut self) -> &mut Instance {
		&mut self.class_attributes
	}

	pub fn instance(&self, id: u32) -> Option<&Instance> {
		if id == 0 {
			Some(&self.class_attributes)
		} else {
			self.instances.get(&id)
		}
	}

	pub fn instance_mut(&mut self, id: u32) -> Option<&mut Instance> {
		if id == 0 {
			Some(&mut self.class_attributes)
		} else {
			self.instances.get_mut(&id)
		}
	}

	pub fn instances(&self) -> impl Iterator<Item = &Instance> {
		self.instances.values()
	}

	pub fn service(&self, id: u8) -> Option<&Service> {
		self.services.get(&id)
	}

	pub fn service_mut(&mut self, id: u8) -> Option<&mut Service> {
		self.services.get_mut(&id)
	}

	pub fn has_service(&self, id: u8) -> bool {
		self.services.contains_key(&id)
	}
}

/// Implements GetAttributeAll for any instance given its class's mask, used
/// directly by `ObjectModel::notify_mr` rather than through the `Service`
/// table (see the doc comment on [`Class`]).
pub fn get_attribute_all(instance: &Instance, mask: u32, gap_widths: &BTreeMap<u16, usize>) -> Result<Vec<u8>, CipStatus> {
	let mut payload = Vec::new();
	for id in 0u16..32 {
		if mask & (1 << id) == 0 {
			continue;
		}
		match instance.attribute(id) {
			Some(attribute) => match attribute.get_single() {
				Ok(bytes) => payload.extend_from_slice(&bytes),
				Err(status) => return Err(status),
			},
			// The class specification reserves the slot but no attribute was
			// registered for it on this instance; fill the gap with zeros at
			// its declared fixed width so the reply layout still matches the
			// CIP specification for the class instead of aborting the reply.
			None => match gap_widths.get(&id) {
				Some(&width) => payload.extend(std::iter::repeat(0u8).take(width)),
				None => return Err(GeneralStatus::AttributeNotSupported.into()),
			},
		}
	}
	Ok(payload)
}

fn get_attribute_single(instance: &mut Instance, request: &ServiceRequest, reply: &mut ServiceReply) -> CipStatus {
	let Some(attribute_id) = request.attribute else {
		return GeneralStatus::PathSegmentError.into();
	};
	let Some(attribute) = instance.attribute(attribute_id) else {
		return GeneralStatus::AttributeNotSupported.into();
	};
	match attribute.get_single() {
		Ok(bytes) => {
			reply.append(&bytes);
			CipStatus::ok()
		}
		Err(status) => status,
	}
}

fn set_attribute_single(instance: &mut Instance, request: &ServiceRequest, _reply: &mut ServiceReply) -> CipStatus {
	let Some(attribute_id) = request.attribute else {
		return GeneralStatus::PathSegmentError.into();
	};
	let Some(attribute) = instance.attribute_mut(attribute_id) else {
		return GeneralStatus::AttributeNotSupported.into();
	};
	match attribute.set_single(&request.payload) {
		Ok(()) => CipStatus::ok(),
		Err(status) => status,
	}
}

#[cfg(test)]
mod test {
	use std::cell::RefCell;
	use std::rc::Rc;

	use super::*;
	use crate::attribute::{Attribute, AttributeFlags};
	use crate::types::CipDataType;

	#[test]
	fn get_attribute_all_concatenates_masked_attributes() {
		let mut class = Class::new(0x01, 1, "Identity", 0b0110);
		let mut instance = Instance::new(1);
		instance.add_attribute(Attribute::new_default(
			1,
			CipDataType::Uint,
			AttributeFlags::get_only(),
			Rc::new(RefCell::new(vec![0xAA, 0xBB])),
		));
		instance.add_attribute(Attribute::new_default(
			2,
			CipDataType::Dint,
			AttributeFlags::get_only(),
			Rc::new(RefCell::new(vec![1, 2, 3, 4])),
		));
		class.add_instance(instance);

		let payload = get_attribute_all(class.instance(1).unwrap(), class.attribute_all_mask, class.attribute_all_gap_widths()).unwrap();
		assert_eq!(payload, vec![0xAA, 0xBB, 1, 2, 3, 4]);
	}

	#[test]
	fn get_attribute_all_zero_fills_an_unregistered_masked_attribute() {
		let mut class = Class::new(0x01, 1, "Identity", 0b0110);
		class.set_attribute_all_gap_width(2, 4);
		let mut instance = Instance::new(1);
		instance.add_attribute(Attribute::new_default(
			1,
			CipDataType::Uint,
			AttributeFlags::get_only(),
			Rc::new(RefCell::new(vec![0xAA, 0xBB])),
		));
		// Attribute 2 is masked into GetAttributeAll but never registered on
		// this instance - the reply must still carry its declared 4-byte
		// width as zeros instead of aborting.
		class.add_instance(instance);

		let payload = get_attribute_all(class.instance(1).unwrap(), class.attribute_all_mask, class.attribute_all_gap_widths()).unwrap();
		assert_eq!(payload, vec![0xAA, 0xBB, 0, 0, 0, 0]);
	}

	#[test]
	fn get_attribute_all_still_errors_when_gap_width_undeclared() {
		let mut class = Class::new(0x01, 1, "Identity", 0b0110);
		let mut instance = Instance::new(1);
		instance.add_attribute(Attribute::new_default(
			1,
			CipDataType::Uint,
			AttributeFlags::get_only(),
			Rc::new(RefCell::new(vec![0xAA, 0xBB])),
		));
		class.add_instance(instance);

		let err = get_attribute_all(class.instance(1).unwrap(), class.attribute_all_mask, class.attribute_all_gap_widths()).unwrap_err();
		assert_eq!(err, GeneralStatus::AttributeNotSupported.into());
	}
}
