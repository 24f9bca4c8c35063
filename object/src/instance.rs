use std::collections::BTreeMap;

use crate::attribute::Attribute;

/// A CIP Instance: an ordered-by-id set of attributes. `instance_id == 0`
/// denotes the class's own meta-class attribute set (§3, §4.9's "meta-class
/// duality"); every other value is a regular instance of its owning class.
pub struct Instance {
	pub instance_id: u32,
	attributes: BTreeMap<u16, Attribute>,
}

impl Instance {
	pub fn new(instance_id: u32) -> Self {
		Instance {
			instance_id,
			attributes: BTreeMap::new(),
		}
	}

	/// Inserts `attribute`, panicking on a duplicate id - attribute ids within
	/// an instance are an invariant established at registration time, never
	/// at runtime, so a duplicate is a programming error in the object table.
	pub fn add_attribute(&mut self, attribute: Attribute) {
		let id = attribute.id;
		if self.attributes.insert(id, attribute).is_some() {
			panic!("duplicate attribute id {} on instance {}", id, self.instance_id);
		}
	}

	pub fn attribute(&self, id: u16) -> Option<&Attribute> {
		self.attributes.get(&id)
	}

	pub fn attribute_mut(&mut self, id: u16) -> Option<&mut Attribute> {
		self.attributes.get_mut(&id)
	}

	/// Attributes in ascending id order, per the class/instance invariant.
	pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
		self.attributes.values()
	}
}
