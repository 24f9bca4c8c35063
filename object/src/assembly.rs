use std::cell::RefCell;
use std::rc::Rc;

use crate::attribute::{Attribute, AttributeFlags};
use crate::hooks::ApplicationHooks;
use crate::instance::Instance;
use crate::types::CipDataType;

/// The Assembly class id (Vol1 Table 5-3.1).
pub const ASSEMBLY_CLASS_ID: u16 = 0x04;

/// Attribute 3's `getable_all`/`setable_single` Assembly-specific bit: every
/// attribute below 32 is covered, but only attributes 3 and 4 are defined,
/// so the class mask is fixed.
pub const ASSEMBLY_ALL_MASK: u32 = (1 << 3) | (1 << 4);

/// Builds an Assembly instance over `buffer` (§4.8): attribute 3 is the raw
/// byte buffer, shared with whatever owns it (normally the application);
/// attribute 4 is its length, recomputed from `buffer` on every read.
///
/// `is_consuming_target` reports whether `instance_id` is currently the
/// consuming target of an established I/O connection - the setter on
/// attribute 3 refuses explicit writes while that holds, per §4.8. It is a
/// closure rather than a `cip-connmgr` dependency so this crate stays
/// beneath the Connection Manager in the dependency graph; `cip-core` wires
/// it to the active connection set at startup.
pub fn build_assembly_instance(
	instance_id: u32,
	buffer: Rc<RefCell<Vec<u8>>>,
	hooks: Rc<RefCell<dyn ApplicationHooks>>,
	is_consuming_target: Rc<dyn Fn(u32) -> bool>,
) -> Instance {
	let mut instance = Instance::new(instance_id);

	let set_buffer = buffer.clone();
	let set_hooks = hooks.clone();
	let set_is_consuming_target = is_consuming_target.clone();
	instance.add_attribute(Attribute::new_custom(
		3,
		CipDataType::ByteArray,
		AttributeFlags::get_set(),
		Some({
			let buffer = buffer.clone();
			Box::new(move || Ok(buffer.borrow().clone()))
		}),
		Some(Box::new(move |payload: &[u8]| {
			use crate::status::GeneralStatus;

			if set_is_consuming_target(instance_id) {
				return Err(GeneralStatus::AttributeNotSetable);
			}

			let expected = set_buffer.borrow().len();
			if payload.len() < expected {
				return Err(GeneralStatus::NotEnoughData);
			}
			if payload.len() > expected {
				return Err(GeneralStatus::TooMuchData);
			}

			*set_buffer.borrow_mut() = payload.to_vec();
			set_hooks
				.borrow_mut()
				.after_assembly_data_received(instance_id)
				.map_err(|_| GeneralStatus::InvalidAttributeValue)
		})),
	));

	let len_buffer = buffer;
	instance.add_attribute(Attribute::new_custom(
		4,
		CipDataType::Uint,
		AttributeFlags::get_only(),
		Some(Box::new(move || Ok((len_buffer.borrow().len() as u16).to_le_bytes().to_vec()))),
		None,
	));

	instance
}

/// Invokes `BeforeAssemblyDataSend` and returns the producing assembly's
/// current bytes, for `cip-ioconn`'s outbound frame assembly.
pub fn before_send(hooks: &RefCell<dyn ApplicationHooks>, instance_id: u32, buffer: &RefCell<Vec<u8>>) -> (bool, Vec<u8>) {
	let changed = hooks.borrow_mut().before_assembly_data_send(instance_id);
	(changed, buffer.borrow().clone())
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::hooks::NullHooks;

	#[test]
	fn setter_rejects_while_consuming_target() {
		let buffer = Rc::new(RefCell::new(vec![0u8; 4]));
		let hooks: Rc<RefCell<dyn ApplicationHooks>> = Rc::new(RefCell::new(NullHooks));
		let is_target: Rc<dyn Fn(u32) -> bool> = Rc::new(|_| true);
		let mut instance = build_assembly_instance(101, buffer, hooks, is_target);
		let attr = instance.attribute_mut(3).unwrap();
		assert!(attr.set_single(&[1, 2, 3, 4]).is_err());
	}

	#[test]
	fn setter_enforces_exact_length_and_invokes_hook() {
		let buffer = Rc::new(RefCell::new(vec![0u8; 2]));
		let hooks: Rc<RefCell<dyn ApplicationHooks>> = Rc::new(RefCell::new(NullHooks));
		let is_target: Rc<dyn Fn(u32) -> bool> = Rc::new(|_| false);
		let mut instance = build_assembly_instance(102, buffer.clone(), hooks, is_target);
		let attr = instance.attribute_mut(3).unwrap();

		assert!(attr.set_single(&[1]).is_err());
		assert!(attr.set_single(&[1, 2, 3]).is_err());
		assert!(attr.set_single(&[9, 9]).is_ok());
		assert_eq!(*buffer.borrow(), vec![9, 9]);
	}

	#[test]
	fn length_attribute_tracks_buffer_size() {
		let buffer = Rc::new(RefCell::new(vec![0u8; 8]));
		let hooks: Rc<RefCell<dyn ApplicationHooks>> = Rc::new(RefCell::new(NullHooks));
		let is_target: Rc<dyn Fn(u32) -> bool> = Rc::new(|_| false);
		let instance = build_assembly_instance(103, buffer, hooks, is_target);
		let attr = instance.attribute(4).unwrap();
		assert_eq!(attr.get_single().unwrap(), 8u16.to_le_bytes().to_vec());
	}
}
