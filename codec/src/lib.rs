mod macros;

use std::io::{self, Read, Write};

/// A bounded, fail-fast cursor over a byte slice.
///
/// Every read is all-or-nothing: if fewer than the requested number of bytes
/// remain, the cursor position is left untouched and an `UnexpectedEof` error
/// is returned. Overrun never partially advances the cursor, so a caller can
/// always tell exactly how much of a message it managed to consume.
#[derive(Debug, Clone, Copy)]
pub struct ByteReader<'a> {
	buf: &'a [u8],
	pos: usize,
}

impl<'a> ByteReader<'a> {
	pub fn new(buf: &'a [u8]) -> Self {
		ByteReader { buf, pos: 0 }
	}

	/// The number of bytes not yet consumed.
	pub fn remaining(&self) -> usize {
		self.buf.len() - self.pos
	}

	/// The cursor's current offset from the start of the buffer.
	pub fn position(&self) -> usize {
		self.pos
	}

	/// Skips `n` bytes, failing (without moving the cursor) if fewer remain.
	pub fn advance(&mut self, n: usize) -> io::Result<()> {
		self.take(n).map(|_| ())
	}

	fn take(&mut self, n: usize) -> io::Result<&'a [u8]> {
		if self.remaining() < n {
			return Err(overrun());
		}

		let slice = &self.buf[self.pos..self.pos + n];
		self.pos += n;
		Ok(slice)
	}

	/// Returns the remaining bytes without consuming them.
	pub fn peek_remaining(&self) -> &'a [u8] {
		&self.buf[self.pos..]
	}

	pub fn get8(&mut self) -> io::Result<u8> {
		Ok(self.take(1)?[0])
	}

	pub fn get16(&mut self) -> io::Result<u16> {
		Ok(u16::from_le_bytes(self.take(2)?.try_into().unwrap()))
	}

	pub fn get32(&mut self) -> io::Result<u32> {
		Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
	}

	pub fn get64(&mut self) -> io::Result<u64> {
		Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
	}

	pub fn get16_be(&mut self) -> io::Result<u16> {
		Ok(u16::from_be_bytes(self.take(2)?.try_into().unwrap()))
	}

	pub fn get32_be(&mut self) -> io::Result<u32> {
		Ok(u32::from_be_bytes(self.take(4)?.try_into().unwrap()))
	}

	/// Reads `n` raw bytes, typically the opaque payload tail of a message.
	pub fn get_bytes(&mut self, n: usize) -> io::Result<&'a [u8]> {
		self.take(n)
	}
}

impl<'a> Read for ByteReader<'a> {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		let n = buf.len().min(self.remaining());
		buf[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
		self.pos += n;
		Ok(n)
	}

	fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
		let slice = self.take(buf.len())?;
		buf.copy_from_slice(slice);
		Ok(())
	}
}

/// A bounded, fail-fast writer over a fixed-capacity byte buffer.
///
/// Like [`ByteReader`], every write either fully succeeds or leaves the
/// buffer untouched, mirroring a fixed-size reply buffer bounded by the
/// maximum EtherNet/IP or UDP datagram size.
#[derive(Debug)]
pub struct ByteWriter<'a> {
	buf: &'a mut [u8],
	len: usize,
}

impl<'a> ByteWriter<'a> {
	pub fn new(buf: &'a mut [u8]) -> Self {
		ByteWriter { buf, len: 0 }
	}

	/// The number of bytes written so far.
	pub fn len(&self) -> usize {
		self.len
	}

	pub fn is_empty(&self) -> bool {
		self.len == 0
	}

	/// The number of bytes of free capacity remaining.
	pub fn remaining_capacity(&self) -> usize {
		self.buf.len() - self.len
	}

	pub fn as_slice(&self) -> &[u8] {
		&self.buf[..self.len]
	}

	fn reserve(&mut self, n: usize) -> io::Result<()> {
		if self.remaining_capacity() < n {
			return Err(overrun());
		}
		Ok(())
	}

	pub fn put8(&mut self, v: u8) -> io::Result<()> {
		self.append(&[v])
	}

	pub fn put16(&mut self, v: u16) -> io::Result<()> {
		self.append(&v.to_le_bytes())
	}

	pub fn put32(&mut self, v: u32) -> io::Result<()> {
		self.append(&v.to_le_bytes())
	}

	pub fn put64(&mut self, v: u64) -> io::Result<()> {
		self.append(&v.to_le_bytes())
	}

	pub fn put16_be(&mut self, v: u16) -> io::Result<()> {
		self.append(&v.to_be_bytes())
	}

	pub fn put32_be(&mut self, v: u32) -> io::Result<()> {
		self.append(&v.to_be_bytes())
	}

	/// Appends raw bytes.
	pub fn append(&mut self, bytes: &[u8]) -> io::Result<()> {
		self.reserve(bytes.len())?;
		self.buf[self.len..self.len + bytes.len()].copy_from_slice(bytes);
		self.len += bytes.len();
		Ok(())
	}

	/// Appends `n` copies of `byte`.
	pub fn fill(&mut self, n: usize, byte: u8) -> io::Result<()> {
		self.reserve(n)?;
		self.buf[self.len..self.len + n].fill(byte);
		self.len += n;
		Ok(())
	}
}

impl<'a> Write for ByteWriter<'a> {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		self.append(buf)?;
		Ok(buf.len())
	}

	fn flush(&mut self) -> io::Result<()> {
		Ok(())
	}
}

fn overrun() -> io::Error {
	io::Error::new(io::ErrorKind::UnexpectedEof, "buffer overrun")
}

/// A string that is null-terminated (C-style), with some maximum size.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NullTerminatedString<const SIZE: usize>(pub String);

/// A UUID (Universally Unique Identifier).
pub type UUID = [u8; 16];

/// The endianness of the data.
#[derive(Clone, Copy, Debug)]
pub enum Endian {
	Little,
	Big,
}

/// A trait for reading data from a source with a specified endianness.
pub trait ReadFromWithEndian {
	fn read_from_with_endian<T: Read>(source: &mut T, endian: Endian) -> io::Result<Self>
	where
		Self: Sized;
}

/// A trait for reading data from a source with an implied endianess.
pub trait ReadFrom {
	fn read_from<T: Read>(source: &mut T) -> io::Result<Self>
	where
		Self: Sized;
}

/// A trait for determining the size of the data as would be read from a source.
pub trait Size {
	fn size(&self) -> usize;
}

/// A trait for writing data to a target with a specified endianness.
pub trait WriteToWithEndian {
	fn write_to_with_endian<T: Write>(&self, target: &mut T, endian: Endian) -> io::Result<()>;
}

/// A trait for writing data to a target with an implied endianness.
pub trait WriteTo {
	fn write_to<T: Write>(&self, target: &mut T) -> io::Result<()>;
}

macro_rules! impl_int {
	($ty:ty, $size:expr) => {
		impl ReadFromWithEndian for $ty {
			fn read_from_with_endian<T: Read>(source: &mut T, endian: Endian) -> io::Result<Self> {
				let mut buf = [0u8; $size];
				source.read_exact(&mut buf)?;
				Ok(match endian {
					Endian::Big => <$ty>::from_be_bytes(buf),
					Endian::Little => <$ty>::from_le_bytes(buf),
				})
			}
		}

		impl Size for $ty {
			fn size(&self) -> usize {
				$size
			}
		}

		impl WriteToWithEndian for $ty {
			fn write_to_with_endian<T: Write>(&self, target: &mut T, endian: Endian) -> io::Result<()> {
				match endian {
					Endian::Big => target.write_all(&self.to_be_bytes()),
					Endian::Little => target.write_all(&self.to_le_bytes()),
				}
			}
		}
	};
}

impl ReadFromWithEndian for u8 {
	fn read_from_with_endian<T: Read>(source: &mut T, _: Endian) -> io::Result<Self> {
		u8::read_from(source)
	}
}

impl ReadFrom for u8 {
	fn read_from<T: Read>(source: &mut T) -> io::Result<Self> {
		let mut buf = [0u8; 1];
		source.read_exact(&mut buf)?;
		Ok(buf[0])
	}
}

impl Size for u8 {
	fn size(&self) -> usize {
		1
	}
}

impl WriteTo for u8 {
	fn write_to<T: Write>(&self, target: &mut T) -> io::Result<()> {
		target.write_all(&[*self])
	}
}

impl WriteToWithEndian for u8 {
	fn write_to_with_endian<T: Write>(&self, target: &mut T, _endian: Endian) -> io::Result<()> {
		u8::write_to(self, target)
	}
}

impl_int!(u16, 2);
impl_int!(u32, 4);
impl_int!(u64, 8);
impl_int!(i16, 2);
impl_int!(i32, 4);
impl_int!(i64, 8);

impl ReadFromWithEndian for bool {
	fn read_from_with_endian<T: Read>(source: &mut T, endian: Endian) -> io::Result<Self> {
		Ok(u8::read_from_with_endian(source, endian)? != 0)
	}
}

impl Size for bool {
	fn size(&self) -> usize {
		1
	}
}

impl WriteToWithEndian for bool {
	fn write_to_with_endian<T: Write>(&self, target: &mut T, endian: Endian) -> io::Result<()> {
		(*self as u8).write_to_with_endian(target, endian)
	}
}

impl ReadFromWithEndian for f32 {
	fn read_from_with_endian<T: Read>(source: &mut T, endian: Endian) -> io::Result<Self> {
		Ok(f32::from_bits(u32::read_from_with_endian(source, endian)?))
	}
}

impl Size for f32 {
	fn size(&self) -> usize {
		4
	}
}

impl WriteToWithEndian for f32 {
	fn write_to_with_endian<T: Write>(&self, target: &mut T, endian: Endian) -> io::Result<()> {
		self.to_bits().write_to_with_endian(target, endian)
	}
}

impl ReadFromWithEndian for f64 {
	fn read_from_with_endian<T: Read>(source: &mut T, endian: Endian) -> io::Result<Self> {
		Ok(f64::from_bits(u64::read_from_with_endian(source, endian)?))
	}
}

impl Size for f64 {
	fn size(&self) -> usize {
		8
	}
}

impl WriteToWithEndian for f64 {
	fn write_to_with_endian<T: Write>(&self, target: &mut T, endian: Endian) -> io::Result<()> {
		self.to_bits().write_to_with_endian(target, endian)
	}
}

impl<const MAX_SIZE: usize> ReadFromWithEndian for NullTerminatedString<MAX_SIZE> {
	fn read_from_with_endian<T: Read>(source: &mut T, _: Endian) -> io::Result<Self> {
		let mut buf = [0u8; MAX_SIZE];
		source.read_exact(&mut buf)?;
		let mut len = 0;
		for c in buf.iter().take(MAX_SIZE) {
			if *c == 0 {
				break;
			}
			len += 1;
		}

		if len == MAX_SIZE {
			return Err(io::Error::new(
				io::ErrorKind::InvalidData,
				"String is not null terminated",
			));
		}

		match std::str::from_utf8(&buf[..len]) {
			Ok(s) => Ok(NullTerminatedString(s.to_string())),
			Err(_) => Err(io::Error::new(io::ErrorKind::InvalidData, "String is not valid utf8")),
		}
	}
}

impl<const MAX_SIZE: usize> Size for NullTerminatedString<MAX_SIZE> {
	fn size(&self) -> usize {
		self.0.len() + 1
	}
}

impl<const MAX_SIZE: usize> WriteToWithEndian for NullTerminatedString<MAX_SIZE> {
	fn write_to_with_endian<T: Write>(&self, target: &mut T, _: Endian) -> io::Result<()> {
		target.write_all(self.0.as_bytes())?;
		target.write_all(&[0])?;
		Ok(())
	}
}

/// CIP `SHORT_STRING`: a single length byte followed by that many ASCII bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CipShortString(pub String);

impl ReadFromWithEndian for CipShortString {
	fn read_from_with_endian<T: Read>(source: &mut T, endian: Endian) -> io::Result<Self> {
		let len = u8::read_from_with_endian(source, endian)? as usize;
		let mut buf = vec![0u8; len];
		source.read_exact(&mut buf)?;
		Ok(CipShortString(
			String::from_utf8(buf).map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "invalid SHORT_STRING"))?,
		))
	}
}

impl Size for CipShortString {
	fn size(&self) -> usize {
		1 + self.0.len()
	}
}

impl WriteToWithEndian for CipShortString {
	fn write_to_with_endian<T: Write>(&self, target: &mut T, endian: Endian) -> io::Result<()> {
		(self.0.len() as u8).write_to_with_endian(target, endian)?;
		target.write_all(self.0.as_bytes())
	}
}

/// CIP `STRING`: a 2-byte length followed by that many ASCII bytes, padded to
/// an even total length on the wire. The pad byte is stripped on decode and
/// re-added on encode, so the in-memory value never carries it.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CipString(pub String);

impl ReadFromWithEndian for CipString {
	fn read_from_with_endian<T: Read>(source: &mut T, endian: Endian) -> io::Result<Self> {
		let len = u16::read_from_with_endian(source, endian)? as usize;
		let mut buf = vec![0u8; len];
		source.read_exact(&mut buf)?;
		if len % 2 != 0 {
			let mut pad = [0u8; 1];
			source.read_exact(&mut pad)?;
		}
		Ok(CipString(
			String::from_utf8(buf).map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "invalid STRING"))?,
		))
	}
}

impl Size for CipString {
	fn size(&self) -> usize {
		2 + self.0.len() + (self.0.len() % 2)
	}
}

impl WriteToWithEndian for CipString {
	fn write_to_with_endian<T: Write>(&self, target: &mut T, endian: Endian) -> io::Result<()> {
		(self.0.len() as u16).write_to_with_endian(target, endian)?;
		target.write_all(self.0.as_bytes())?;
		if self.0.len() % 2 != 0 {
			target.write_all(&[0])?;
		}
		Ok(())
	}
}

/// CIP `STRING2`: a 2-byte character count followed by that many 16-bit
/// (UCS-2-ish) code units.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CipString2(pub Vec<u16>);

impl ReadFromWithEndian for CipString2 {
	fn read_from_with_endian<T: Read>(source: &mut T, endian: Endian) -> io::Result<Self> {
		let count = u16::read_from_with_endian(source, endian)? as usize;
		let mut chars = Vec::with_capacity(count);
		for _ in 0..count {
			chars.push(u16::read_from_with_endian(source, endian)?);
		}
		Ok(CipString2(chars))
	}
}

impl Size for CipString2 {
	fn size(&self) -> usize {
		2 + self.0.len() * 2
	}
}

impl WriteToWithEndian for CipString2 {
	fn write_to_with_endian<T: Write>(&self, target: &mut T, endian: Endian) -> io::Result<()> {
		(self.0.len() as u16).write_to_with_endian(target, endian)?;
		for c in &self.0 {
			c.write_to_with_endian(target, endian)?;
		}
		Ok(())
	}
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LengthPrefixedString<const MAX_SIZE: usize>(pub String);

impl<const MAX_SIZE: usize> ReadFromWithEndian for LengthPrefixedString<MAX_SIZE> {
	fn read_from_with_endian<T: Read>(source: &mut T, _: Endian) -> io::Result<Self> {
		let len = match MAX_SIZE {
			0..=0xFF => u8::read_from_with_endian(source, Endian::Big)? as usize,
			256..=0xFFFF => u16::read_from_with_endian(source, Endian::Big)? as usize,
			65536..=0xFFFFFFFF => u32::read_from_with_endian(source, Endian::Big)? as usize,
			_ => u64::read_from_with_endian(source, Endian::Big)? as usize,
		};

		let mut buf = vec![0u8; len];
		source.read_exact(&mut buf)?;
		match std::str::from_utf8(&buf) {
			Ok(s) => Ok(LengthPrefixedString(s.to_string())),
			Err(_) => Err(io::Error::new(io::ErrorKind::InvalidData, "String is not valid utf8")),
		}
	}
}

impl<const MAX_SIZE: usize> Size for LengthPrefixedString<MAX_SIZE> {
	fn size(&self) -> usize {
		self.0.len()
			+ match MAX_SIZE {
				0..=0xFF => 1,
				256..=0xFFFF => 2,
				65536..=0xFFFFFFFF => 4,
				_ => 8,
			}
	}
}

impl<const MAX_SIZE: usize> WriteToWithEndian for LengthPrefixedString<MAX_SIZE> {
	fn write_to_with_endian<T: Write>(&self, target: &mut T, endian: Endian) -> io::Result<()> {
		match MAX_SIZE {
			0..=0xFF => (self.0.len() as u8).write_to_with_endian(target, endian)?,
			256..=0xFFFF => (self.0.len() as u16).write_to_with_endian(target, endian)?,
			65536..=0xFFFFFFFF => (self.0.len() as u32).write_to_with_endian(target, endian)?,
			_ => (self.0.len() as u64).write_to_with_endian(target, endian)?,
		}
		target.write_all(self.0.as_bytes())?;
		Ok(())
	}
}

impl<const SIZE: usize, T: ReadFromWithEndian + Default + Copy> ReadFromWithEndian for [T; SIZE] {
	fn read_from_with_endian<R: Read>(source: &mut R, endian: Endian) -> io::Result<Self> {
		let mut out = [T::default(); SIZE];
		for slot in out.iter_mut() {
			*slot = T::read_from_with_endian(source, endian)?;
		}
		Ok(out)
	}
}

impl<const SIZE: usize, T: ReadFrom + Default + Copy> ReadFrom for [T; SIZE] {
	fn read_from<R: Read>(source: &mut R) -> io::Result<Self> {
		let mut out = [T::default(); SIZE];
		for slot in out.iter_mut() {
			*slot = T::read_from(source)?;
		}
		Ok(out)
	}
}

impl<const SIZE: usize, T: Size> Size for [T; SIZE] {
	fn size(&self) -> usize {
		self.iter().map(Size::size).sum()
	}
}

impl<const SIZE: usize, T: WriteTo> WriteTo for [T; SIZE] {
	fn write_to<W: Write>(&self, target: &mut W) -> io::Result<()> {
		for item in self.iter() {
			item.write_to(target)?;
		}
		Ok(())
	}
}

impl<const SIZE: usize, T: WriteToWithEndian> WriteToWithEndian for [T; SIZE] {
	fn write_to_with_endian<W: Write>(&self, target: &mut W, endian: Endian) -> io::Result<()> {
		for item in self.iter() {
			item.write_to_with_endian(target, endian)?;
		}
		Ok(())
	}
}

impl<I: ReadFromWithEndian> ReadFromWithEndian for Vec<I> {
	fn read_from_with_endian<T: Read>(source: &mut T, endian: Endian) -> io::Result<Self>
	where
		Self: Sized,
	{
		let count = u64::read_from_with_endian(source, endian)?;
		let mut vec = Vec::with_capacity(count as usize);
		for _ in 0..count {
			vec.push(I::read_from_with_endian(source, endian)?);
		}

		Ok(vec)
	}
}

impl<T: Size> Size for Vec<T> {
	fn size(&self) -> usize {
		self.iter().map(Size::size).sum()
	}
}

impl<T: WriteToWithEndian> WriteToWithEndian for Vec<T> {
	fn write_to_with_endian<W: Write>(&self, target: &mut W, endian: Endian) -> io::Result<()> {
		(self.len() as u64).write_to_with_endian(target, endian)?;
		for item in self.iter() {
			item.write_to_with_endian(target, endian)?;
		}
		Ok(())
	}
}

/// Padding is a special type that pads a struct to a given alignment. Notably, you can put
/// it in the middle of a struct, and it will pad only the fields that came before it.
#[derive(Debug, Clone)]
pub struct Padding<const ALIGN: usize> {
	amt: usize,
}

impl<const ALIGN: usize> Padding<ALIGN> {
	pub fn new(prev_size: usize) -> Self {
		let amt = ALIGN - (prev_size % ALIGN);
		Padding { amt }
	}

	pub fn read<R: Read>(prev_size: usize, r: &mut R) -> io::Result<Self> {
		let amt = ALIGN - (prev_size % ALIGN);
		let mut buf = vec![0u8; amt];
		r.read_exact(&mut buf)?;

		Ok(Padding { amt })
	}
}

impl<const ALIGN: usize> Size for Padding<ALIGN> {
	fn size(&self) -> usize {
		self.amt
	}
}

impl<const ALIGN: usize> WriteTo for Padding<ALIGN> {
	fn write_to<W: Write>(&self, target: &mut W) -> io::Result<()> {
		target.write_all(&vec![0u8; self.amt])
	}
}

impl<const ALIGN: usize> WriteToWithEndian for Padding<ALIGN> {
	fn write_to_with_endian<W: Write>(&self, target: &mut W, _: Endian) -> io::Result<()> {
		self.write_to(target)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn byte_reader_overrun_does_not_advance() {
		let buf = [1u8, 2, 3];
		let mut r = ByteReader::new(&buf);
		assert_eq!(r.get16().unwrap(), 0x0201);
		assert!(r.get16().is_err());
		assert_eq!(r.remaining(), 1);
		assert_eq!(r.get8().unwrap(), 3);
	}

	#[test]
	fn byte_writer_overrun_does_not_grow() {
		let mut buf = [0u8; 2];
		let mut w = ByteWriter::new(&mut buf);
		w.put16(0xBEEF).unwrap();
		assert!(w.put8(1).is_err());
		assert_eq!(w.len(), 2);
	}

	#[test]
	fn cip_string_pads_to_even_length() {
		let mut buf = [0u8; 16];
		let mut w = ByteWriter::new(&mut buf);
		let s = CipString("odd".to_owned());
		s.write_to_with_endian(&mut w, Endian::Little).unwrap();
		assert_eq!(w.len(), 2 + 3 + 1);

		let mut r = ByteReader::new(w.as_slice());
		let decoded = CipString::read_from_with_endian(&mut r, Endian::Little).unwrap();
		assert_eq!(decoded.0, "odd");
		assert_eq!(r.remaining(), 0);
	}

	#[test]
	fn cip_short_string_round_trips() {
		let mut buf = [0u8; 16];
		let mut w = ByteWriter::new(&mut buf);
		let s = CipShortString("hi".to_owned());
		s.write_to_with_endian(&mut w, Endian::Little).unwrap();

		let mut r = ByteReader::new(w.as_slice());
		let decoded = CipShortString::read_from_with_endian(&mut r, Endian::Little).unwrap();
		assert_eq!(decoded.0, "hi");
	}

	#[test]
	fn integers_round_trip_both_endians() {
		for endian in [Endian::Little, Endian::Big] {
			let mut buf = [0u8; 8];
			let mut w = ByteWriter::new(&mut buf);
			0xDEAD_BEEF_u32.write_to_with_endian(&mut w, endian).unwrap();
			let mut r = ByteReader::new(w.as_slice());
			assert_eq!(u32::read_from_with_endian(&mut r, endian).unwrap(), 0xDEAD_BEEF);
		}
	}
}
