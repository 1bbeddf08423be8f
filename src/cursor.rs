use std::fmt;

use bytebuffer::ByteReader;
use encoding_rs::{Encoding, UTF_16LE, WINDOWS_1252};
use nutil::{NError, Result};

pub use bytebuffer::Endian;

/// Version-info sub-records always start on a DWORD boundary.
pub const VERSION_INFO_ALIGNMENT: usize = 4;

//Primitive reads every record is built from
pub trait ReadPrimitives {
	fn read_u8(&mut self) -> Result<u8>;
	fn read_u16_endian(&mut self, endian: Endian) -> Result<u16>;
	fn read_u32_endian(&mut self, endian: Endian) -> Result<u32>;
	fn read_u64_endian(&mut self, endian: Endian) -> Result<u64>;

	/// Reads exactly `len` bytes and decodes them with `encoding`.
	fn read_text(&mut self, len: usize, encoding: &'static Encoding) -> Result<String>;

	/// Reads UTF-16LE code units up to and including a NUL terminator, or
	/// until `max_units` units were read. The terminator is consumed but not
	/// returned.
	fn read_utf16z(&mut self, max_units: usize) -> Result<String>;

	/// Discards bytes until the absolute position is DWORD aligned. `n` is
	/// normalized to a power of two but does not change the target boundary.
	fn align(&mut self, n: usize) -> Result<()>;

	/// Moves forward `n` bytes without decoding them.
	fn skip(&mut self, n: usize) -> Result<()>;

	/// Bytes read since the cursor was created.
	fn consumed(&self) -> usize;

	/// Absolute offset of the next read.
	fn position(&self) -> usize;

	fn read_u16(&mut self) -> Result<u16> {
		self.read_u16_endian(Endian::LittleEndian)
	}
	fn read_u32(&mut self) -> Result<u32> {
		self.read_u32_endian(Endian::LittleEndian)
	}
	fn read_u64(&mut self) -> Result<u64> {
		self.read_u64_endian(Endian::LittleEndian)
	}
	fn read_string(&mut self, len: usize) -> Result<String> {
		self.read_text(len, WINDOWS_1252)
	}
}

/// A record that decodes itself from the current cursor position.
pub trait FromCursor: Sized {
	fn from_cursor(cursor: &mut Cursor<'_>) -> Result<Self>;
}

/// Forward-only reader over a shared, immutable image buffer.
///
/// Positions are absolute offsets into the buffer; `consumed` counts the bytes
/// read since `base`, which is also how every record computes its size.
pub struct Cursor<'a> {
	buffer: &'a [u8],
	reader: ByteReader<'a>,
	base: usize,
	consumed: usize,
	trace: bool,
}

macro_rules! take_int {
	( $name:ident, $read:ident, $type:ty ) => {
		fn $name(&mut self, endian: Endian) -> Result<$type> {
			let offset = self.position();
			self.ensure(std::mem::size_of::<$type>())?;
			self.reader.set_endian(endian);
			let value = self.reader.$read()?;
			self.consumed += std::mem::size_of::<$type>();
			self.devout(offset, format_args!("0x{:x}", value));
			Ok(value)
		}
	};
}

impl<'a> Cursor<'a> {
	pub fn new(buffer: &'a [u8], base: usize) -> Self {
		let mut reader = ByteReader::from_bytes(buffer);
		reader.set_endian(Endian::LittleEndian);
		reader.set_rpos(base.min(buffer.len()));
		Self {
			buffer,
			reader,
			base,
			consumed: 0,
			trace: false,
		}
	}

	/// Emits a `0x<offset> -> <value>` event per read.
	pub fn with_trace(mut self, trace: bool) -> Self {
		self.trace = trace;
		self
	}

	/// A fresh cursor over the same buffer starting at an absolute offset.
	pub fn fork(&self, offset: usize) -> Cursor<'a> {
		Cursor::new(self.buffer, offset).with_trace(self.trace)
	}

	pub fn base(&self) -> usize {
		self.base
	}

	pub fn buffer(&self) -> &'a [u8] {
		self.buffer
	}

	pub fn is_tracing(&self) -> bool {
		self.trace
	}

	fn ensure(&self, len: usize) -> Result<()> {
		let offset = self.position();
		match offset.checked_add(len) {
			Some(end) if end <= self.buffer.len() => Ok(()),
			_ => Err(NError::ErrOutOfBounds {
				offset,
				len,
				available: self.buffer.len(),
			}),
		}
	}

	fn devout(&self, offset: usize, value: fmt::Arguments) {
		if !self.trace {
			return;
		}
		tracing::debug!(target: "peview::read", "0x{:x} -> {}", offset, value);
	}

	fn take_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
		self.ensure(len)?;
		let bytes = self.reader.read_bytes(len)?;
		self.consumed += len;
		Ok(bytes)
	}

	take_int!(take_u16, read_u16, u16);
	take_int!(take_u32, read_u32, u32);
	take_int!(take_u64, read_u64, u64);
}

impl ReadPrimitives for Cursor<'_> {
	fn read_u8(&mut self) -> Result<u8> {
		let offset = self.position();
		self.ensure(1)?;
		let value = self.reader.read_u8()?;
		self.consumed += 1;
		self.devout(offset, format_args!("0x{:x}", value));
		Ok(value)
	}

	fn read_u16_endian(&mut self, endian: Endian) -> Result<u16> {
		self.take_u16(endian)
	}

	fn read_u32_endian(&mut self, endian: Endian) -> Result<u32> {
		self.take_u32(endian)
	}

	fn read_u64_endian(&mut self, endian: Endian) -> Result<u64> {
		self.take_u64(endian)
	}

	fn read_text(&mut self, len: usize, encoding: &'static Encoding) -> Result<String> {
		let offset = self.position();
		let bytes = self.take_bytes(len)?;
		let (text, _) = encoding.decode_without_bom_handling(&bytes);
		let text = text.into_owned();
		self.devout(offset, format_args!("{}", text));
		Ok(text)
	}

	fn read_utf16z(&mut self, max_units: usize) -> Result<String> {
		let offset = self.position();
		let mut bytes = Vec::new();
		for _ in 0..max_units {
			let unit = self.take_bytes(2)?;
			if unit == [0, 0] {
				break;
			}
			bytes.extend_from_slice(&unit);
		}
		let (text, _) = UTF_16LE.decode_without_bom_handling(&bytes);
		let text = text.into_owned();
		self.devout(offset, format_args!("{}", text));
		Ok(text)
	}

	fn align(&mut self, n: usize) -> Result<()> {
		if nutil::normalize_alignment(n) != VERSION_INFO_ALIGNMENT {
			tracing::trace!("align({}) at 0x{:x} pads to {} bytes", n, self.position(), VERSION_INFO_ALIGNMENT);
		}
		let pad = nutil::padding_for(self.position(), VERSION_INFO_ALIGNMENT);
		for _ in 0..pad {
			self.read_u8()?;
		}
		Ok(())
	}

	fn skip(&mut self, n: usize) -> Result<()> {
		self.ensure(n)?;
		self.reader.set_rpos(self.position() + n);
		self.consumed += n;
		Ok(())
	}

	fn consumed(&self) -> usize {
		self.consumed
	}

	fn position(&self) -> usize {
		self.base + self.consumed
	}
}
