//! Common Packet Format: the `item_count` + `{type, length, body}*` framing
//! carried inside SendRRData, SendUnitData, and UDP I/O datagrams.

use cip_codec::{ByteReader, ByteWriter};
use thiserror::Error;

pub const NULL_ADDRESS: u16 = 0x0000;
pub const CONNECTED_ADDRESS: u16 = 0x00A1;
pub const SEQUENCED_ADDRESS: u16 = 0x8002;
pub const UNCONNECTED_DATA: u16 = 0x00B2;
pub const CONNECTED_DATA: u16 = 0x00B1;
pub const SOCKADDR_O_TO_T: u16 = 0x8000;
pub const SOCKADDR_T_TO_O: u16 = 0x8001;
pub const LIST_SERVICES_ITEM: u16 = 0x0100;
pub const LIST_IDENTITY_ITEM: u16 = 0x000C;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CpfError {
	#[error("truncated CPF buffer")]
	Truncated,
	#[error("expected exactly one address item, found {0}")]
	MissingOrDuplicateAddressItem(usize),
	#[error("expected exactly one data item, found {0}")]
	MissingOrDuplicateDataItem(usize),
	#[error("unrecognised address item type 0x{0:04X}")]
	UnknownAddressItemType(u16),
	#[error("unrecognised data item type 0x{0:04X}")]
	UnknownDataItemType(u16),
	#[error("malformed sockaddr info item")]
	MalformedSockAddr,
}

impl From<std::io::Error> for CpfError {
	fn from(_: std::io::Error) -> Self {
		CpfError::Truncated
	}
}

/// One raw, untyped CPF item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpfItem {
	pub item_type: u16,
	pub body: Vec<u8>,
}

/// Parses the `item_count` + items list out of `bytes`.
pub fn parse_items(bytes: &[u8]) -> Result<Vec<CpfItem>, CpfError> {
	let mut reader = ByteReader::new(bytes);
	let count = reader.get16()?;
	let mut items = Vec::with_capacity(count as usize);
	for _ in 0..count {
		let item_type = reader.get16()?;
		let len = reader.get16()? as usize;
		let body = reader.get_bytes(len)?.to_vec();
		items.push(CpfItem { item_type, body });
	}
	Ok(items)
}

/// Serializes a raw item list back onto the wire.
pub fn write_items(items: &[CpfItem], out: &mut ByteWriter) -> std::io::Result<()> {
	out.put16(items.len() as u16)?;
	for item in items {
		out.put16(item.item_type)?;
		out.put16(item.body.len() as u16)?;
		out.append(&item.body)?;
	}
	Ok(())
}

/// The address item of a connected-message-router frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressItem {
	Null,
	Connected { connection_id: u32 },
	Sequenced { connection_id: u32, sequence_number: u32 },
}

/// The data item of a connected-message-router frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataItem {
	Connected(Vec<u8>),
	Unconnected(Vec<u8>),
}

impl DataItem {
	pub fn bytes(&self) -> &[u8] {
		match self {
			DataItem::Connected(b) | DataItem::Unconnected(b) => b,
		}
	}
}

/// A parsed `{sin_family, sin_port, sin_addr}` SockAddr Info item (the
/// `sin_zero` padding is not carried - it is always emitted as zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SockAddrInfo {
	pub sin_family: i16,
	pub sin_port: u16,
	pub sin_addr: u32,
}

impl SockAddrInfo {
	fn parse(body: &[u8]) -> Result<Self, CpfError> {
		if body.len() != 16 {
			return Err(CpfError::MalformedSockAddr);
		}
		let mut reader = ByteReader::new(body);
		Ok(SockAddrInfo {
			sin_family: reader.get16_be()? as i16,
			sin_port: reader.get16_be()?,
			sin_addr: reader.get32_be()?,
		})
	}

	fn write(&self, out: &mut ByteWriter) -> std::io::Result<()> {
		out.put16_be(self.sin_family as u16)?;
		out.put16_be(self.sin_port)?;
		out.put32_be(self.sin_addr)?;
		out.fill(8, 0)
	}
}

/// A full explicit/connected-data CPF frame: one address item, one data
/// item, and up to two SockAddr Info items (O->T and T->O).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
	pub address: AddressItem,
	pub data: DataItem,
	pub sockaddr_o_to_t: Option<SockAddrInfo>,
	pub sockaddr_t_to_o: Option<SockAddrInfo>,
}

impl Message {
	pub fn parse(bytes: &[u8]) -> Result<Self, CpfError> {
		let items = parse_items(bytes)?;

		let address_items: Vec<&CpfItem> = items
			.iter()
			.filter(|i| matches!(i.item_type, NULL_ADDRESS | CONNECTED_ADDRESS | SEQUENCED_ADDRESS))
			.collect();
		if address_items.len() != 1 {
			return Err(CpfError::MissingOrDuplicateAddressItem(address_items.len()));
		}

		let data_items: Vec<&CpfItem> = items
			.iter()
			.filter(|i| matches!(i.item_type, CONNECTED_DATA | UNCONNECTED_DATA))
			.collect();
		if data_items.len() != 1 {
			return Err(CpfError::MissingOrDuplicateDataItem(data_items.len()));
		}

		let address = match address_items[0] {
			CpfItem { item_type, body } if *item_type == NULL_ADDRESS => {
				let _ = body;
				AddressItem::Null
			}
			CpfItem { item_type, body } if *item_type == CONNECTED_ADDRESS => {
				let mut r = ByteReader::new(body);
				AddressItem::Connected {
					connection_id: r.get32()?,
				}
			}
			CpfItem { item_type, body } if *item_type == SEQUENCED_ADDRESS => {
				let mut r = ByteReader::new(body);
				AddressItem::Sequenced {
					connection_id: r.get32()?,
					sequence_number: r.get32()?,
				}
			}
			item => return Err(CpfError::UnknownAddressItemType(item.item_type)),
		};

		let data = match data_items[0] {
			CpfItem { item_type, body } if *item_type == CONNECTED_DATA => DataItem::Connected(body.clone()),
			CpfItem { item_type, body } if *item_type == UNCONNECTED_DATA => DataItem::Unconnected(body.clone()),
			item => return Err(CpfError::UnknownDataItemType(item.item_type)),
		};

		let mut sockaddr_o_to_t = None;
		let mut sockaddr_t_to_o = None;
		for item in &items {
			if item.item_type == SOCKADDR_O_TO_T {
				sockaddr_o_to_t = Some(SockAddrInfo::parse(&item.body)?);
			} else if item.item_type == SOCKADDR_T_TO_O {
				sockaddr_t_to_o = Some(SockAddrInfo::parse(&item.body)?);
			}
		}

		Ok(Message {
			address,
			data,
			sockaddr_o_to_t,
			sockaddr_t_to_o,
		})
	}

	pub fn write(&self, out: &mut ByteWriter) -> std::io::Result<()> {
		let mut items = Vec::with_capacity(4);

		let mut addr_body = Vec::new();
		let addr_type = match self.address {
			AddressItem::Null => NULL_ADDRESS,
			AddressItem::Connected { connection_id } => {
				addr_body.extend_from_slice(&connection_id.to_le_bytes());
				CONNECTED_ADDRESS
			}
			AddressItem::Sequenced {
				connection_id,
				sequence_number,
			} => {
				addr_body.extend_from_slice(&connection_id.to_le_bytes());
				addr_body.extend_from_slice(&sequence_number.to_le_bytes());
				SEQUENCED_ADDRESS
			}
		};
		items.push(CpfItem {
			item_type: addr_type,
			body: addr_body,
		});

		let (data_type, data_body) = match &self.data {
			DataItem::Connected(b) => (CONNECTED_DATA, b.clone()),
			DataItem::Unconnected(b) => (UNCONNECTED_DATA, b.clone()),
		};
		items.push(CpfItem {
			item_type: data_type,
			body: data_body,
		});

		// SockAddr items are always emitted in numeric order (O->T before T->O).
		if let Some(sockaddr) = &self.sockaddr_o_to_t {
			let mut body = Vec::with_capacity(16);
			let mut buf = [0u8; 16];
			let mut w = ByteWriter::new(&mut buf);
			sockaddr.write(&mut w)?;
			body.extend_from_slice(w.as_slice());
			items.push(CpfItem {
				item_type: SOCKADDR_O_TO_T,
				body,
			});
		}
		if let Some(sockaddr) = &self.sockaddr_t_to_o {
			let mut body = Vec::with_capacity(16);
			let mut buf = [0u8; 16];
			let mut w = ByteWriter::new(&mut buf);
			sockaddr.write(&mut w)?;
			body.extend_from_slice(w.as_slice());
			items.push(CpfItem {
				item_type: SOCKADDR_T_TO_O,
				body,
			});
		}

		write_items(&items, out)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn round_trip(msg: &Message) -> Message {
		let mut buf = [0u8; 256];
		let mut w = ByteWriter::new(&mut buf);
		msg.write(&mut w).unwrap();
		Message::parse(w.as_slice()).unwrap()
	}

	#[test]
	fn unconnected_message_round_trips() {
		let msg = Message {
			address: AddressItem::Null,
			data: DataItem::Unconnected(vec![1, 2, 3, 4]),
			sockaddr_o_to_t: None,
			sockaddr_t_to_o: None,
		};
		assert_eq!(round_trip(&msg), msg);
	}

	#[test]
	fn connected_message_with_both_sockaddrs_round_trips() {
		let msg = Message {
			address: AddressItem::Connected { connection_id: 0xDEADBEEF },
			data: DataItem::Connected(vec![9, 9, 9]),
			sockaddr_o_to_t: Some(SockAddrInfo {
				sin_family: 2,
				sin_port: 0x08AE,
				sin_addr: 0xC0A80001,
			}),
			sockaddr_t_to_o: Some(SockAddrInfo {
				sin_family: 2,
				sin_port: 0x08AE,
				sin_addr: 0xEFC00102,
			}),
		};
		assert_eq!(round_trip(&msg), msg);
	}

	#[test]
	fn sequenced_address_round_trips() {
		let msg = Message {
			address: AddressItem::Sequenced {
				connection_id: 42,
				sequence_number: 7,
			},
			data: DataItem::Connected(vec![0xAB]),
			sockaddr_o_to_t: None,
			sockaddr_t_to_o: None,
		};
		assert_eq!(round_trip(&msg), msg);
	}

	#[test]
	fn rejects_missing_data_item() {
		let items: Vec<CpfItem> = vec![CpfItem {
			item_type: NULL_ADDRESS,
			body: vec![],
		}];
		let mut buf = [0u8; 64];
		let mut w = ByteWriter::new(&mut buf);
		write_items(&items, &mut w).unwrap();
		assert_eq!(Message::parse(w.as_slice()), Err(CpfError::MissingOrDuplicateDataItem(0)));
	}
}
