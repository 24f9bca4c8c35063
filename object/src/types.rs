use cip_codec::int_enum;

int_enum! {
	/// The CIP elementary data types (Vol1 Appendix C) an [`crate::Attribute`]
	/// can be tagged with. Values match the elementary data type codes used
	/// in `GetAttributeList`/template services; this stack does not expose
	/// those services, but keeps the real codes for familiarity.
	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	pub enum CipDataType: u8 {
		Bool = 0xC1,
		Sint = 0xC2,
		Int = 0xC3,
		Dint = 0xC4,
		Lint = 0xC5,
		Usint = 0xC6,
		Uint = 0xC7,
		Udint = 0xC8,
		Ulint = 0xC9,
		Real = 0xCA,
		Lreal = 0xCB,
		ShortString = 0xDA,
		String = 0xD0,
		Byte = 0xD1,
		Word = 0xD2,
		Dword = 0xD3,
		Lword = 0xD4,
		ByteArray = 0xA1,
	}
}

impl CipDataType {
	/// The on-wire width in bytes, for types whose encoding is fixed-size.
	/// `None` for variable-length types (`STRING`, `SHORT_STRING`,
	/// `BYTE_ARRAY`), which GetAttributeAll cannot gap-fill and which a
	/// custom getter/setter must supply.
	pub fn fixed_width(&self) -> Option<usize> {
		match self {
			CipDataType::Bool | CipDataType::Sint | CipDataType::Usint | CipDataType::Byte => Some(1),
			CipDataType::Int | CipDataType::Uint | CipDataType::Word => Some(2),
			CipDataType::Dint | CipDataType::Udint | CipDataType::Dword | CipDataType::Real => Some(4),
			CipDataType::Lint | CipDataType::Ulint | CipDataType::Lword | CipDataType::Lreal => Some(8),
			CipDataType::String | CipDataType::ShortString | CipDataType::ByteArray => None,
		}
	}
}
