//! `VS_VERSIONINFO` resource decoding.
//!
//! Every record in the chain starts with the same `(length, value_length,
//! type, key)` header, followed by DWORD padding, an optional value and then
//! child records until `length` bytes are covered. Children are advanced by
//! their declared length so slack at the end of a record is skipped rather
//! than decoded.

use serde::Serialize;

use nutil::{NError, Result};

use crate::cursor::{Cursor, FromCursor, ReadPrimitives, VERSION_INFO_ALIGNMENT};

pub const VS_VERSION_INFO_KEY: &str = "VS_VERSION_INFO";
pub const VAR_FILE_INFO_KEY: &str = "VarFileInfo";
pub const STRING_FILE_INFO_KEY: &str = "StringFileInfo";
pub const TRANSLATION_KEY: &str = "Translation";
pub const FIXED_FILE_INFO_SIGNATURE: u32 = 0xfeef04bd;

const VS_HEADER_SIZE: usize = 6;

//Shared record header
#[derive(Debug, Clone, Serialize)]
pub struct VsHeader {
	pub length: u16,
	pub value_length: u16,
	pub value_type: u16,
	pub key: String,
	/// Absolute offset of the key, for error reporting.
	pub key_offset: usize,
}
impl VsHeader {
	fn read(cursor: &mut Cursor<'_>) -> Result<Self> {
		let length = cursor.read_u16()?;
		let value_length = cursor.read_u16()?;
		let value_type = cursor.read_u16()?;
		let key_offset = cursor.position();
		//The key can't run past the record itself
		let max_units = (length as usize).saturating_sub(VS_HEADER_SIZE) / 2;
		let key = cursor.read_utf16z(max_units)?;
		Ok(Self {
			length,
			value_length,
			value_type,
			key,
			key_offset,
		})
	}

	/// Whether the value is text (1) rather than binary (0).
	pub fn is_text(&self) -> bool {
		self.value_type == 1
	}
}

trait VsRecord {
	fn declared_length(&self) -> usize;
	fn decoded_size(&self) -> usize;
}

macro_rules! impl_vs_record {
	( $( $type:ty ),* ) => {
		$(
			impl VsRecord for $type {
				fn declared_length(&self) -> usize {
					self.header.length as usize
				}
				fn decoded_size(&self) -> usize {
					self.size
				}
			}
		)*
	};
}

/// Reads child records until the parent's `length` (counted from `start`) is covered.
fn read_children<T: FromCursor + VsRecord>(cursor: &mut Cursor<'_>, start: usize, length: u16) -> Result<Vec<T>> {
	let length = length as usize;
	let mut children = Vec::new();
	while cursor.consumed() - start < length {
		cursor.align(VERSION_INFO_ALIGNMENT)?;
		if cursor.consumed() - start >= length {
			break;
		}

		let child_offset = cursor.position();
		//Zero-length records are padding, nothing further can be decoded
		let declared = Cursor::new(cursor.buffer(), child_offset).read_u16()?;
		if declared == 0 {
			break;
		}

		let child = T::from_cursor(&mut cursor.fork(child_offset))?;
		cursor.skip(child.declared_length().max(child.decoded_size()))?;
		children.push(child);
	}
	Ok(children)
}

/// Record size: whatever was read, but never less than the declared length.
fn record_size(cursor: &Cursor<'_>, start: usize, length: u16) -> usize {
	(cursor.consumed() - start).max(length as usize)
}

//VS_FIXEDFILEINFO
#[derive(Debug, Clone, Default, Serialize)]
pub struct VsFixedFileInfo {
	pub offset: usize,
	pub size: usize,

	pub signature: u32,
	pub struc_version: u32,
	pub file_version_ms: u32,
	pub file_version_ls: u32,
	pub product_version_ms: u32,
	pub product_version_ls: u32,
	pub file_flags_mask: u32,
	pub file_flags: u32,
	pub file_os: u32,
	pub file_type: u32,
	pub file_subtype: u32,
	pub file_date_ms: u32,
	pub file_date_ls: u32,
}
impl VsFixedFileInfo {
	pub fn has_signature(&self) -> bool {
		self.signature == FIXED_FILE_INFO_SIGNATURE
	}

	/// (major, minor, build, revision)
	pub fn file_version(&self) -> (u16, u16, u16, u16) {
		split_version(self.file_version_ms, self.file_version_ls)
	}

	pub fn product_version(&self) -> (u16, u16, u16, u16) {
		split_version(self.product_version_ms, self.product_version_ls)
	}
}
impl FromCursor for VsFixedFileInfo {
	fn from_cursor(cursor: &mut Cursor<'_>) -> Result<Self> {
		let offset = cursor.position();
		let start = cursor.consumed();
		let mut info = Self {
			offset,
			signature: cursor.read_u32()?,
			struc_version: cursor.read_u32()?,
			file_version_ms: cursor.read_u32()?,
			file_version_ls: cursor.read_u32()?,
			product_version_ms: cursor.read_u32()?,
			product_version_ls: cursor.read_u32()?,
			file_flags_mask: cursor.read_u32()?,
			file_flags: cursor.read_u32()?,
			file_os: cursor.read_u32()?,
			file_type: cursor.read_u32()?,
			file_subtype: cursor.read_u32()?,
			file_date_ms: cursor.read_u32()?,
			file_date_ls: cursor.read_u32()?,
			..Self::default()
		};
		info.size = cursor.consumed() - start;
		Ok(info)
	}
}

fn split_version(ms: u32, ls: u32) -> (u16, u16, u16, u16) {
	((ms >> 16) as u16, ms as u16, (ls >> 16) as u16, ls as u16)
}

//VS_VERSIONINFO
#[derive(Debug, Clone, Serialize)]
pub struct VsVersionInfo {
	pub offset: usize,
	pub size: usize,
	pub header: VsHeader,
	pub fixed: Option<VsFixedFileInfo>,
	pub children: Vec<FileInfo>,
}
impl VsVersionInfo {
	pub fn string_file_info(&self) -> Option<&StringFileInfo> {
		self.children.iter().find_map(|c| match c {
			FileInfo::String(info) => Some(info),
			_ => None,
		})
	}

	pub fn var_file_info(&self) -> Option<&VarFileInfo> {
		self.children.iter().find_map(|c| match c {
			FileInfo::Var(info) => Some(info),
			_ => None,
		})
	}

	/// First value stored under `key` in any string table.
	pub fn string(&self, key: StringKey) -> Option<&str> {
		self.string_file_info()?
			.children
			.iter()
			.flat_map(|table| table.children.iter())
			.find(|s| s.key == key)
			.map(|s| s.value.as_str())
	}

	pub fn translations(&self) -> Vec<Translation> {
		self.var_file_info()
			.map(|info| info.children.iter().flat_map(|v| v.translations.iter().copied()).collect())
			.unwrap_or_default()
	}
}
impl FromCursor for VsVersionInfo {
	fn from_cursor(cursor: &mut Cursor<'_>) -> Result<Self> {
		let offset = cursor.position();
		let start = cursor.consumed();

		let header = VsHeader::read(cursor)?;
		cursor.align(VERSION_INFO_ALIGNMENT)?;

		let fixed = if header.value_length != 0 {
			Some(VsFixedFileInfo::from_cursor(cursor)?)
		} else {
			None
		};

		let children = read_children::<FileInfo>(cursor, start, header.length)?;

		Ok(Self {
			offset,
			size: record_size(cursor, start, header.length),
			header,
			fixed,
			children,
		})
	}
}

/// Child of `VS_VERSIONINFO`, selected by its key.
#[derive(Debug, Clone, Serialize)]
pub enum FileInfo {
	Var(VarFileInfo),
	String(StringFileInfo),
}
impl FileInfo {
	pub fn header(&self) -> &VsHeader {
		match self {
			FileInfo::Var(info) => &info.header,
			FileInfo::String(info) => &info.header,
		}
	}

	pub fn size(&self) -> usize {
		match self {
			FileInfo::Var(info) => info.size,
			FileInfo::String(info) => info.size,
		}
	}
}
impl VsRecord for FileInfo {
	fn declared_length(&self) -> usize {
		self.header().length as usize
	}
	fn decoded_size(&self) -> usize {
		self.size()
	}
}
impl FromCursor for FileInfo {
	fn from_cursor(cursor: &mut Cursor<'_>) -> Result<Self> {
		let offset = cursor.position();
		let start = cursor.consumed();

		let header = VsHeader::read(cursor)?;
		let is_var = match header.key.as_str() {
			VAR_FILE_INFO_KEY => true,
			STRING_FILE_INFO_KEY => false,
			_ => return Err(NError::ErrUnexpectedKey {
				offset: header.key_offset,
				key: header.key.clone(),
			}),
		};
		cursor.align(VERSION_INFO_ALIGNMENT)?;

		if is_var {
			let children = read_children::<Var>(cursor, start, header.length)?;
			Ok(FileInfo::Var(VarFileInfo {
				offset,
				size: record_size(cursor, start, header.length),
				header,
				children,
			}))
		} else {
			let children = read_children::<StringTable>(cursor, start, header.length)?;
			Ok(FileInfo::String(StringFileInfo {
				offset,
				size: record_size(cursor, start, header.length),
				header,
				children,
			}))
		}
	}
}

//VarFileInfo
#[derive(Debug, Clone, Serialize)]
pub struct VarFileInfo {
	pub offset: usize,
	pub size: usize,
	pub header: VsHeader,
	pub children: Vec<Var>,
}

//StringFileInfo
#[derive(Debug, Clone, Serialize)]
pub struct StringFileInfo {
	pub offset: usize,
	pub size: usize,
	pub header: VsHeader,
	pub children: Vec<StringTable>,
}

//StringTable, keyed by an 8 hex digit language + code page
#[derive(Debug, Clone, Serialize)]
pub struct StringTable {
	pub offset: usize,
	pub size: usize,
	pub header: VsHeader,
	pub children: Vec<MsString>,
}
impl StringTable {
	pub fn language(&self) -> Option<u16> {
		self.header.key.get(0..4).and_then(|s| u16::from_str_radix(s, 16).ok())
	}

	pub fn code_page(&self) -> Option<u16> {
		self.header.key.get(4..8).and_then(|s| u16::from_str_radix(s, 16).ok())
	}

	pub fn get(&self, key: StringKey) -> Option<&str> {
		self.children.iter().find(|s| s.key == key).map(|s| s.value.as_str())
	}
}
impl FromCursor for StringTable {
	fn from_cursor(cursor: &mut Cursor<'_>) -> Result<Self> {
		let offset = cursor.position();
		let start = cursor.consumed();

		let header = VsHeader::read(cursor)?;
		cursor.align(VERSION_INFO_ALIGNMENT)?;
		let children = read_children::<MsString>(cursor, start, header.length)?;

		Ok(Self {
			offset,
			size: record_size(cursor, start, header.length),
			header,
			children,
		})
	}
}

/// Names a version string may be stored under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StringKey {
	Comments,
	CompanyName,
	FileDescription,
	FileVersion,
	InternalName,
	LegalCopyright,
	LegalTrademarks,
	OriginalFilename,
	PrivateBuild,
	ProductName,
	ProductVersion,
	SpecialBuild,
}
impl StringKey {
	pub const ALL: [StringKey; 12] = [
		StringKey::Comments,
		StringKey::CompanyName,
		StringKey::FileDescription,
		StringKey::FileVersion,
		StringKey::InternalName,
		StringKey::LegalCopyright,
		StringKey::LegalTrademarks,
		StringKey::OriginalFilename,
		StringKey::PrivateBuild,
		StringKey::ProductName,
		StringKey::ProductVersion,
		StringKey::SpecialBuild,
	];

	pub fn as_str(self) -> &'static str {
		match self {
			StringKey::Comments => "Comments",
			StringKey::CompanyName => "CompanyName",
			StringKey::FileDescription => "FileDescription",
			StringKey::FileVersion => "FileVersion",
			StringKey::InternalName => "InternalName",
			StringKey::LegalCopyright => "LegalCopyright",
			StringKey::LegalTrademarks => "LegalTrademarks",
			StringKey::OriginalFilename => "OriginalFilename",
			StringKey::PrivateBuild => "PrivateBuild",
			StringKey::ProductName => "ProductName",
			StringKey::ProductVersion => "ProductVersion",
			StringKey::SpecialBuild => "SpecialBuild",
		}
	}

	pub fn from_key(key: &str) -> Option<Self> {
		Self::ALL.iter().copied().find(|k| k.as_str() == key)
	}
}

//String
#[derive(Debug, Clone, Serialize)]
pub struct MsString {
	pub offset: usize,
	pub size: usize,
	pub header: VsHeader,
	pub key: StringKey,
	pub value: String,
}
impl FromCursor for MsString {
	fn from_cursor(cursor: &mut Cursor<'_>) -> Result<Self> {
		let offset = cursor.position();
		let start = cursor.consumed();

		let header = VsHeader::read(cursor)?;
		let key = match StringKey::from_key(&header.key) {
			Some(key) => key,
			None => return Err(NError::ErrUnsupportedStringKey {
				offset: header.key_offset,
				key: header.key,
			}),
		};
		cursor.align(VERSION_INFO_ALIGNMENT)?;
		let value = cursor.read_utf16z(header.value_length as usize)?;

		Ok(Self {
			offset,
			size: cursor.consumed() - start,
			header,
			key,
			value,
		})
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Translation {
	pub language: u16,
	pub code_page: u16,
}

//Var, always the "Translation" array
#[derive(Debug, Clone, Serialize)]
pub struct Var {
	pub offset: usize,
	pub size: usize,
	pub header: VsHeader,
	pub translations: Vec<Translation>,
}
impl FromCursor for Var {
	fn from_cursor(cursor: &mut Cursor<'_>) -> Result<Self> {
		let offset = cursor.position();
		let start = cursor.consumed();

		let header = VsHeader::read(cursor)?;
		if header.key != TRANSLATION_KEY {
			return Err(NError::ErrUnexpectedKey {
				offset: header.key_offset,
				key: header.key,
			});
		}
		cursor.align(VERSION_INFO_ALIGNMENT)?;

		let mut translations = Vec::new();
		while cursor.consumed() - start + 4 <= header.length as usize {
			translations.push(Translation {
				language: cursor.read_u16()?,
				code_page: cursor.read_u16()?,
			});
		}

		Ok(Self {
			offset,
			size: cursor.consumed() - start,
			header,
			translations,
		})
	}
}

impl_vs_record!(StringTable, MsString, Var);
