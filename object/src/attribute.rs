use std::cell::RefCell;
use std::rc::Rc;

use crate::status::{CipStatus, GeneralStatus};
use crate::types::CipDataType;

/// Capability flags for a single [`Attribute`] (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeFlags {
	pub getable_single: bool,
	pub setable_single: bool,
	pub getable_all: bool,
}

impl AttributeFlags {
	pub const fn get_only() -> Self {
		AttributeFlags {
			getable_single: true,
			setable_single: false,
			getable_all: true,
		}
	}

	pub const fn get_set() -> Self {
		AttributeFlags {
			getable_single: true,
			setable_single: true,
			getable_all: true,
		}
	}

	pub const fn hidden() -> Self {
		AttributeFlags {
			getable_single: false,
			setable_single: false,
			getable_all: false,
		}
	}
}

/// Where an attribute's value lives and how it is encoded.
///
/// `Default` storage is a plain wire-format byte buffer shared with
/// whatever owns it (typically an assembly buffer owned by the
/// application); the core never copies it except to answer a read or
/// apply a write. `Custom` supersedes the default codec entirely - used
/// for attributes whose value is computed (e.g. Assembly attribute 4,
/// the buffer's length) or whose write must be validated or trigger a
/// side effect beyond a plain overwrite.
pub enum AttributeStorage {
	Default(Rc<RefCell<Vec<u8>>>),
	Custom {
		get: Option<Box<dyn Fn() -> Result<Vec<u8>, GeneralStatus>>>,
		set: Option<Box<dyn FnMut(&[u8]) -> Result<(), GeneralStatus>>>,
	},
}

pub struct Attribute {
	pub id: u16,
	pub data_type: CipDataType,
	pub flags: AttributeFlags,
	pub storage: AttributeStorage,
}

impl Attribute {
	pub fn new_default(id: u16, data_type: CipDataType, flags: AttributeFlags, storage: Rc<RefCell<Vec<u8>>>) -> Self {
		Attribute {
			id,
			data_type,
			flags,
			storage: AttributeStorage::Default(storage),
		}
	}

	pub fn new_custom(
		id: u16,
		data_type: CipDataType,
		flags: AttributeFlags,
		get: Option<Box<dyn Fn() -> Result<Vec<u8>, GeneralStatus>>>,
		set: Option<Box<dyn FnMut(&[u8]) -> Result<(), GeneralStatus>>>,
	) -> Self {
		Attribute {
			id,
			data_type,
			flags,
			storage: AttributeStorage::Custom { get, set },
		}
	}

	/// §4.7 GetAttributeSingle: returns the attribute's wire-format bytes,
	/// or the status to reply with if the read is refused.
	pub fn get_single(&self) -> Result<Vec<u8>, CipStatus> {
		if !self.flags.getable_single {
			return Err(GeneralStatus::AttributeNotSupported.into());
		}
		match &self.storage {
			AttributeStorage::Default(bytes) => Ok(bytes.borrow().clone()),
			AttributeStorage::Custom { get, .. } => match get {
				Some(get) => get().map_err(CipStatus::from),
				None => Err(GeneralStatus::AttributeNotSupported.into()),
			},
		}
	}

	/// §4.7 SetAttributeSingle: overwrites storage with `payload`, enforcing
	/// an exact-length match for fixed-width types.
	pub fn set_single(&mut self, payload: &[u8]) -> Result<(), CipStatus> {
		if !self.flags.setable_single {
			return Err(GeneralStatus::AttributeNotSetable.into());
		}
		if let Some(width) = self.data_type.fixed_width() {
			if payload.len() < width {
				return Err(GeneralStatus::NotEnoughData.into());
			}
			if payload.len() > width {
				return Err(GeneralStatus::TooMuchData.into());
			}
		}
		match &mut self.storage {
			AttributeStorage::Default(bytes) => {
				*bytes.borrow_mut() = payload.to_vec();
				Ok(())
			}
			AttributeStorage::Custom { set, .. } => match set {
				Some(set) => set(payload).map_err(CipStatus::from),
				None => Err(GeneralStatus::AttributeNotSetable.into()),
			},
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn default_storage_round_trips() {
		let storage = Rc::new(RefCell::new(vec![1, 2, 3, 4]));
		let attr = Attribute::new_default(1, CipDataType::Dint, AttributeFlags::get_set(), storage.clone());
		assert_eq!(attr.get_single().unwrap(), vec![1, 2, 3, 4]);
	}

	#[test]
	fn set_single_rejects_wrong_fixed_width() {
		let storage = Rc::new(RefCell::new(vec![0, 0]));
		let mut attr = Attribute::new_default(1, CipDataType::Int, AttributeFlags::get_set(), storage);
		assert_eq!(attr.set_single(&[1]), Err(GeneralStatus::NotEnoughData.into()));
		assert_eq!(attr.set_single(&[1, 2, 3]), Err(GeneralStatus::TooMuchData.into()));
		assert!(attr.set_single(&[1, 2]).is_ok());
	}

	#[test]
	fn not_getable_single_is_rejected() {
		let storage = Rc::new(RefCell::new(vec![0]));
		let attr = Attribute::new_default(1, CipDataType::Sint, AttributeFlags::hidden(), storage);
		assert_eq!(attr.get_single(), Err(GeneralStatus::AttributeNotSupported.into()));
	}
}
