use cip_codec::{int_enum, ByteStruct, Size};

/// The 24-byte EtherNet/IP encapsulation header (Vol2 2-3.2) that precedes
/// every command sent over TCP or UDP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ByteStruct, Size)]
#[little_endian]
pub struct EncapHeader {
	pub command: u16,
	pub length: u16,
	pub session_handle: u32,
	pub status: u32,
	pub sender_context: [u8; 8],
	pub options: u32,
}

impl EncapHeader {
	pub const SIZE: usize = 24;

	pub fn reply_to(&self, length: u16, status: EncapStatus) -> EncapHeader {
		EncapHeader {
			command: self.command,
			length,
			session_handle: self.session_handle,
			status: (&status).into(),
			sender_context: self.sender_context,
			options: 0,
		}
	}
}

/// The extra 6 bytes ("big header") that `SendRRData`/`SendUnitData` carry
/// immediately after [`EncapHeader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, ByteStruct, Size)]
#[little_endian]
pub struct BigHeader {
	pub interface_handle: u32,
	pub timeout: u16,
}

int_enum! {
	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	pub enum EncapCommand: u16 {
		Nop = 0x0000,
		ListServices = 0x0004,
		ListIdentity = 0x0063,
		ListInterfaces = 0x0064,
		RegisterSession = 0x0065,
		UnregisterSession = 0x0066,
		SendRRData = 0x006F,
		SendUnitData = 0x0070,
	}
}

impl EncapCommand {
	/// Commands that carry the extra `{interface_handle, timeout}` header.
	pub fn has_big_header(&self) -> bool {
		matches!(self, EncapCommand::SendRRData | EncapCommand::SendUnitData)
	}

	/// Commands that require a previously registered session.
	pub fn requires_session(&self) -> bool {
		matches!(
			self,
			EncapCommand::UnregisterSession | EncapCommand::SendRRData | EncapCommand::SendUnitData
		)
	}
}

int_enum! {
	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	pub enum EncapStatus: u32 {
		Success = 0x0000,
		InvalidOrUnsupportedCommand = 0x0001,
		InsufficientMemory = 0x0002,
		IncorrectData = 0x0003,
		InvalidSessionHandle = 0x0064,
		InvalidLength = 0x0065,
		UnsupportedProtocol = 0x0069,
	}
}
