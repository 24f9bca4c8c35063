//! Class 0/1 I/O frame assembly and validation (§4.10). The CPF envelope
//! itself is `cip_cpf`'s job; this module owns the class-1 sequence prefix,
//! the optional Run/Idle header, and the accept/reject decision on the
//! consuming side.

use std::net::IpAddr;

use cip_codec::{ByteReader, ByteWriter};
use cip_cpf::{AddressItem, DataItem, Message};

use crate::sequence::{Class1DuplicateTracker, IncomingSequenceTracker};

/// The Run/Idle header (Vol1 §3-6.3 / CIP Networks Library): a 32-bit word
/// prefixing a class-1 producing frame's data once Run/Idle is enabled,
/// bit 0 set means Running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunIdleHeader {
	pub running: bool,
}

impl RunIdleHeader {
	pub fn to_word(self) -> u32 {
		if self.running {
			1
		} else {
			0
		}
	}

	pub fn from_word(word: u32) -> RunIdleHeader {
		RunIdleHeader { running: word & 1 != 0 }
	}
}

/// Parameters needed to assemble one outbound class-0/1 frame.
pub struct OutboundFrame<'a> {
	pub transport_class: u8,
	pub connection_id: u32,
	/// The EtherNet/IP level sequence count carried in the CPF address item
	/// (class 1 only); bumped on every send regardless of `BeforeAssemblyDataSend`.
	pub eip_sequence: u32,
	/// The class-1 16-bit prefix; bumped only when `BeforeAssemblyDataSend`
	/// returned true.
	pub sequence_count_producing: u16,
	pub run_idle: Option<RunIdleHeader>,
	pub assembly_data: &'a [u8],
}

/// Builds the full CPF-framed datagram body for `frame`.
pub fn build_producing_frame(frame: &OutboundFrame, out: &mut Vec<u8>) -> std::io::Result<()> {
	let mut body = Vec::with_capacity(6 + frame.assembly_data.len());
	if frame.transport_class == 1 {
		body.extend_from_slice(&frame.sequence_count_producing.to_le_bytes());
	}
	if let Some(run_idle) = frame.run_idle {
		body.extend_from_slice(&run_idle.to_word().to_le_bytes());
	}
	body.extend_from_slice(frame.assembly_data);

	let address = if frame.transport_class == 1 {
		AddressItem::Sequenced {
			connection_id: frame.connection_id,
			sequence_number: frame.eip_sequence,
		}
	} else {
		AddressItem::Connected {
			connection_id: frame.connection_id,
		}
	};

	let message = Message {
		address,
		data: DataItem::Connected(body),
		sockaddr_o_to_t: None,
		sockaddr_t_to_o: None,
	};

	let mut buf = vec![0u8; 4 + 4 + 4 + 6 + frame.assembly_data.len() + 32];
	let written = {
		let mut w = ByteWriter::new(&mut buf);
		message.write(&mut w)?;
		w.as_slice().len()
	};
	out.extend_from_slice(&buf[..written]);
	Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRejection {
	WrongOriginator,
	StaleEipSequence,
	DuplicateClass1Sequence,
	Truncated,
}

/// The outcome of successfully validating an inbound frame: the bytes ready
/// to hand to the Assembly setter, and the Run/Idle bit if a header was
/// stripped.
pub struct ConsumedFrame {
	pub payload: Vec<u8>,
	pub run_idle: Option<RunIdleHeader>,
}

/// Validates and strips an inbound class-0/1 datagram per §4.10's "Inbound
/// frame" paragraph. `from` must match `expected_originator`; the
/// EtherNet/IP level sequence (class 1 only, carried in the address item)
/// must be newer than `eip_tracker`'s high-water mark; the class-1 prefix is
/// then checked against `class1_tracker` for duplicates.
pub fn validate_consuming_frame(
	bytes: &[u8],
	from: IpAddr,
	expected_originator: IpAddr,
	transport_class: u8,
	run_idle_enabled: bool,
	eip_tracker: &mut IncomingSequenceTracker,
	class1_tracker: &mut Class1DuplicateTracker,
) -> Result<ConsumedFrame, FrameRejection> {
	if from != expected_originator {
		return Err(FrameRejection::WrongOriginator);
	}

	let message = Message::parse(bytes).map_err(|_| FrameRejection::Truncated)?;

	if transport_class == 1 {
		let eip_sequence = match message.address {
			AddressItem::Sequenced { sequence_number, .. } => sequence_number,
			_ => return Err(FrameRejection::Truncated),
		};
		if !eip_tracker.accept(eip_sequence) {
			return Err(FrameRejection::StaleEipSequence);
		}
	}

	let mut reader = ByteReader::new(message.data.bytes());

	if transport_class == 1 {
		let seq = reader.get16().map_err(|_| FrameRejection::Truncated)?;
		if !class1_tracker.accept(seq) {
			return Err(FrameRejection::DuplicateClass1Sequence);
		}
	}

	let run_idle = if run_idle_enabled {
		let word = reader.get32().map_err(|_| FrameRejection::Truncated)?;
		Some(RunIdleHeader::from_word(word))
	} else {
		None
	};

	Ok(ConsumedFrame {
		payload: reader.peek_remaining().to_vec(),
		run_idle,
	})
}

#[cfg(test)]
mod test {
	use super::*;

	fn originator() -> IpAddr {
		"10.0.0.5".parse().unwrap()
	}

	#[test]
	fn builds_and_parses_a_class1_frame_with_run_idle() {
		let mut out = Vec::new();
		let frame = OutboundFrame {
			transport_class: 1,
			connection_id: 0xABCD,
			eip_sequence: 5,
			sequence_count_producing: 9,
			run_idle: Some(RunIdleHeader { running: true }),
			assembly_data: &[1, 2, 3, 4],
		};
		build_producing_frame(&frame, &mut out).unwrap();

		let mut eip_tracker = IncomingSequenceTracker::new();
		let mut class1_tracker = Class1DuplicateTracker::new();
		let consumed = validate_consuming_frame(&out, originator(), originator(), 1, true, &mut eip_tracker, &mut class1_tracker).unwrap();
		assert_eq!(consumed.payload, vec![1, 2, 3, 4]);
		assert_eq!(consumed.run_idle, Some(RunIdleHeader { running: true }));
	}

	#[test]
	fn rejects_frames_from_the_wrong_originator() {
		let mut out = Vec::new();
		let frame = OutboundFrame {
			transport_class: 0,
			connection_id: 1,
			eip_sequence: 0,
			sequence_count_producing: 0,
			run_idle: None,
			assembly_data: &[9],
		};
		build_producing_frame(&frame, &mut out).unwrap();
		let mut eip_tracker = IncomingSequenceTracker::new();
		let mut class1_tracker = Class1DuplicateTracker::new();
		let err = validate_consuming_frame(&out, "10.0.0.9".parse().unwrap(), originator(), 0, false, &mut eip_tracker, &mut class1_tracker).unwrap_err();
		assert_eq!(err, FrameRejection::WrongOriginator);
	}

	#[test]
	fn rejects_stale_eip_sequence_and_duplicate_class1_sequence() {
		let mut eip_tracker = IncomingSequenceTracker::new();
		let mut class1_tracker = Class1DuplicateTracker::new();

		let mut first = Vec::new();
		build_producing_frame(
			&OutboundFrame {
				transport_class: 1,
				connection_id: 1,
				eip_sequence: 10,
				sequence_count_producing: 1,
				run_idle: None,
				assembly_data: &[0],
			},
			&mut first,
		)
		.unwrap();
		validate_consuming_frame(&first, originator(), originator(), 1, false, &mut eip_tracker, &mut class1_tracker).unwrap();

		let mut stale = Vec::new();
		build_producing_frame(
			&OutboundFrame {
				transport_class: 1,
				connection_id: 1,
				eip_sequence: 9,
				sequence_count_producing: 2,
				run_idle: None,
				assembly_data: &[0],
			},
			&mut stale,
		)
		.unwrap();
		let err = validate_consuming_frame(&stale, originator(), originator(), 1, false, &mut eip_tracker, &mut class1_tracker).unwrap_err();
		assert_eq!(err, FrameRejection::StaleEipSequence);

		let mut duplicate = Vec::new();
		build_producing_frame(
			&OutboundFrame {
				transport_class: 1,
				connection_id: 1,
				eip_sequence: 11,
				sequence_count_producing: 1,
				run_idle: None,
				assembly_data: &[0],
			},
			&mut duplicate,
		)
		.unwrap();
		let err = validate_consuming_frame(&duplicate, originator(), originator(), 1, false, &mut eip_tracker, &mut class1_tracker).unwrap_err();
		assert_eq!(err, FrameRejection::DuplicateClass1Sequence);
	}
}
