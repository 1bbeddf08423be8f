//! Resource directory tree of the `.rsrc` section.
//!
//! Every address inside the tree is relative to the raw file offset of the
//! resource section. That base, and the little state that changes with
//! depth, travels down the recursion in an immutable [`ResourceContext`].
//! Each directory offset is decoded at most once, so the work done is bounded
//! by the size of the section rather than by how often entries point back
//! into it.

use std::collections::HashSet;

use serde::Serialize;

use encoding_rs::UTF_16LE;
use nutil::{NError, Result};

use crate::cursor::{Cursor, FromCursor, ReadPrimitives};
use crate::sections::Section;
use crate::version::VsVersionInfo;

pub const RESOURCE_DIRECTORY_SIZE: usize = 16;
pub const RESOURCE_ENTRY_SIZE: usize = 8;
pub const RESOURCE_DATA_ENTRY_SIZE: usize = 16;

/// Set in an entry's offset field when the child is another directory.
pub const DIRECTORY_FLAG: u32 = 0x80000000;
/// Set in an entry's name field when it points at a string name.
pub const NAMED_ENTRY_FLAG: u32 = 0x80000000;
pub const DIRECTORY_OFFSET_MASK: u32 = 0x7fffffff;
pub const NAME_OFFSET_MASK: u32 = 0x7fffffff;
/// Leaf entry offsets only keep their low 16 bits.
pub const DATA_ENTRY_OFFSET_MASK: u32 = 0x0000ffff;
/// Applied to a data entry's OffsetToData when exposed as `data_offset`.
/// The unmasked RVA is kept separately in `rva` and is what payload
/// decoding uses.
pub const DATA_OFFSET_MASK: u32 = 0x000000ff;

/// Deepest directory nesting accepted; real images use three levels.
pub const MAX_RESOURCE_DEPTH: usize = 32;

raw_enum!(ResourceType: u16 {
	Cursor = 1,
	Bitmap = 2,
	Icon = 3,
	Menu = 4,
	Dialog = 5,
	String = 6,
	FontDir = 7,
	Font = 8,
	Accelerator = 9,
	RcData = 10,
	MessageTable = 11,
	GroupCursor = 12,
	GroupIcon = 14,
	Version = 16,
	DlgInclude = 17,
	PlugPlay = 19,
	Vxd = 20,
	AniCursor = 21,
	AniIcon = 22,
	Html = 23,
	Manifest = 24,
});

pub const RT_VERSION: u16 = 16;

/// Decode state handed to every node of the tree.
#[derive(Debug, Clone, Copy)]
pub struct ResourceContext {
	/// Raw file offset of the resource section.
	pub resource_base: usize,
	/// Virtual address and raw size of the resource section, for RVA lookups.
	pub section_rva: u32,
	pub section_sz_raw: u32,
	pub decode_version_info: bool,

	pub depth: usize,
	/// Type id of the top-level entry this subtree hangs off.
	pub resource_type: Option<u16>,
}
impl ResourceContext {
	pub fn new(resource_base: usize, section_rva: u32, section_sz_raw: u32) -> Self {
		Self {
			resource_base,
			section_rva,
			section_sz_raw,
			decode_version_info: true,
			depth: 0,
			resource_type: None,
		}
	}

	pub fn for_section(section: &Section) -> Self {
		Self::new(section.addr_raw as usize, section.addr_virtual, section.sz_raw)
	}

	pub fn with_version_info(mut self, decode: bool) -> Self {
		self.decode_version_info = decode;
		self
	}

	/// Context for the children of an entry named `name`.
	fn descend(&self, name: &EntryName) -> Self {
		let mut ctx = *self;
		ctx.depth += 1;
		if self.depth == 0 {
			ctx.resource_type = match name {
				EntryName::Id(id) => Some(*id),
				EntryName::Named { .. } => None,
			};
		}
		ctx
	}

	pub fn rva_to_offset(&self, rva: u32) -> Option<usize> {
		if rva < self.section_rva {
			return None;
		}
		let delta = rva - self.section_rva;
		if delta >= self.section_sz_raw {
			return None;
		}
		Some(self.resource_base + delta as usize)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntryName {
	Id(u16),
	/// Absolute offset of a length-prefixed UTF-16 name; not decoded here.
	Named { name_offset: usize },
}
impl EntryName {
	fn from_raw(name_id: u32, resource_base: usize) -> Self {
		if name_id & NAMED_ENTRY_FLAG != 0 {
			EntryName::Named {
				name_offset: resource_base + (name_id & NAME_OFFSET_MASK) as usize,
			}
		} else {
			EntryName::Id(name_id as u16)
		}
	}

	pub fn id(&self) -> Option<u16> {
		match self {
			EntryName::Id(id) => Some(*id),
			EntryName::Named { .. } => None,
		}
	}

	/// Decodes a string name from `buffer`. Ids yield `None`.
	pub fn read_name(&self, buffer: &[u8]) -> Result<Option<String>> {
		let name_offset = match self {
			EntryName::Id(_) => return Ok(None),
			EntryName::Named { name_offset } => *name_offset,
		};
		let mut cursor = Cursor::new(buffer, name_offset);
		let units = cursor.read_u16()? as usize;
		let name = cursor.read_text(units * 2, UTF_16LE)?;
		Ok(Some(name))
	}
}

//IMAGE_RESOURCE_DATA_ENTRY
#[derive(Debug, Clone, Serialize)]
pub struct ResourceDataEntry {
	pub offset: usize,
	pub size: usize,

	/// OffsetToData masked with `DATA_OFFSET_MASK`.
	pub data_offset: u32,
	/// OffsetToData as stored.
	pub rva: u32,
	pub sz_entry: u32,
	pub code_page: u32,
	pub reserved: u32,

	/// Set for leaves under the RT_VERSION type.
	pub version_info: Option<VsVersionInfo>,
}
impl ResourceDataEntry {
	pub fn parse(cursor: &mut Cursor<'_>, ctx: &ResourceContext) -> Result<Self> {
		let offset = cursor.position();
		let start = cursor.consumed();

		let rva = cursor.read_u32()?;
		let sz_entry = cursor.read_u32()?;
		let code_page = cursor.read_u32()?;
		let reserved = cursor.read_u32()?;
		let size = cursor.consumed() - start;

		let mut version_info = None;
		if ctx.decode_version_info && ctx.resource_type == Some(RT_VERSION) {
			match ctx.rva_to_offset(rva) {
				Some(payload) => {
					tracing::trace!("version resource at 0x{:x}", payload);
					version_info = Some(VsVersionInfo::from_cursor(&mut cursor.fork(payload))?);
				}
				None => {
					tracing::debug!("version resource rva 0x{:x} is outside the resource section", rva);
				}
			}
		}

		Ok(Self {
			offset,
			size,
			data_offset: rva & DATA_OFFSET_MASK,
			rva,
			sz_entry,
			code_page,
			reserved,
			version_info,
		})
	}

	/// File offset of the payload bytes, if they lie in the resource section.
	pub fn payload_offset(&self, ctx: &ResourceContext) -> Option<usize> {
		ctx.rva_to_offset(self.rva)
	}
}

/// What a directory entry points at; decided by `DIRECTORY_FLAG`.
#[derive(Debug, Clone, Serialize)]
pub enum ResourceChild {
	Directory(ResourceDirectory),
	Data(ResourceDataEntry),
}

//IMAGE_RESOURCE_DIRECTORY_ENTRY
#[derive(Debug, Clone, Serialize)]
pub struct ResourceDirectoryEntry {
	pub offset: usize,
	pub size: usize,

	pub name_id: u32,
	pub data_offset: u32,
	pub name: EntryName,
	pub child: ResourceChild,
}
impl ResourceDirectoryEntry {
	/// `visited` holds the offsets of every directory decoded so far in this tree.
	pub fn parse(cursor: &mut Cursor<'_>, ctx: &ResourceContext, visited: &mut HashSet<usize>) -> Result<Self> {
		let offset = cursor.position();
		let start = cursor.consumed();

		let name_id = cursor.read_u32()?;
		let data_offset = cursor.read_u32()?;
		let size = cursor.consumed() - start;

		let name = EntryName::from_raw(name_id, ctx.resource_base);
		let child_ctx = ctx.descend(&name);

		let child = if data_offset & DIRECTORY_FLAG != 0 {
			let target = ctx.resource_base + (data_offset & DIRECTORY_OFFSET_MASK) as usize;
			ResourceChild::Directory(ResourceDirectory::parse_in(&mut cursor.fork(target), &child_ctx, visited)?)
		} else {
			let target = ctx.resource_base + (data_offset & DATA_ENTRY_OFFSET_MASK) as usize;
			ResourceChild::Data(ResourceDataEntry::parse(&mut cursor.fork(target), &child_ctx)?)
		};

		Ok(Self {
			offset,
			size,
			name_id,
			data_offset,
			name,
			child,
		})
	}

	pub fn is_named(&self) -> bool {
		self.name_id & NAMED_ENTRY_FLAG != 0
	}

	pub fn is_directory(&self) -> bool {
		matches!(self.child, ResourceChild::Directory(_))
	}

	pub fn directory(&self) -> Option<&ResourceDirectory> {
		match &self.child {
			ResourceChild::Directory(dir) => Some(dir),
			ResourceChild::Data(_) => None,
		}
	}

	pub fn data(&self) -> Option<&ResourceDataEntry> {
		match &self.child {
			ResourceChild::Data(data) => Some(data),
			ResourceChild::Directory(_) => None,
		}
	}
}

//IMAGE_RESOURCE_DIRECTORY
#[derive(Debug, Clone, Serialize)]
pub struct ResourceDirectory {
	pub offset: usize,
	pub size: usize,

	pub characteristics: u32,
	pub timedate_stamp: u32,
	pub version_major: u16,
	pub version_minor: u16,
	pub n_named_entries: u16,
	pub n_id_entries: u16,

	pub entries: Vec<ResourceDirectoryEntry>,
}
impl ResourceDirectory {
	/// Decodes the tree rooted at the cursor.
	pub fn parse(cursor: &mut Cursor<'_>, ctx: &ResourceContext) -> Result<Self> {
		Self::parse_in(cursor, ctx, &mut HashSet::new())
	}

	fn parse_in(cursor: &mut Cursor<'_>, ctx: &ResourceContext, visited: &mut HashSet<usize>) -> Result<Self> {
		let offset = cursor.position();
		if ctx.depth > MAX_RESOURCE_DEPTH {
			return Err(NError::ErrRecursionLimit {
				offset,
				depth: MAX_RESOURCE_DEPTH,
			});
		}
		if !visited.insert(offset) {
			return Err(NError::ErrSharedDirectory { offset });
		}
		let start = cursor.consumed();

		let characteristics = cursor.read_u32()?;
		let timedate_stamp = cursor.read_u32()?;
		let version_major = cursor.read_u16()?;
		let version_minor = cursor.read_u16()?;
		let n_named_entries = cursor.read_u16()?;
		let n_id_entries = cursor.read_u16()?;

		let n_entries = n_named_entries as usize + n_id_entries as usize;
		let mut entries = Vec::with_capacity(n_entries);
		for _ in 0..n_entries {
			entries.push(ResourceDirectoryEntry::parse(cursor, ctx, visited)?);
		}

		Ok(Self {
			offset,
			size: cursor.consumed() - start,
			characteristics,
			timedate_stamp,
			version_major,
			version_minor,
			n_named_entries,
			n_id_entries,
			entries,
		})
	}

	pub fn named_entries(&self) -> &[ResourceDirectoryEntry] {
		let split = (self.n_named_entries as usize).min(self.entries.len());
		&self.entries[..split]
	}

	pub fn id_entries(&self) -> &[ResourceDirectoryEntry] {
		let split = (self.n_named_entries as usize).min(self.entries.len());
		&self.entries[split..]
	}

	pub fn find_id(&self, id: u16) -> Option<&ResourceDirectoryEntry> {
		self.entries.iter().find(|e| e.name == EntryName::Id(id))
	}

	/// Every leaf in the tree, depth first in on-disk order.
	pub fn data_entries(&self) -> Vec<&ResourceDataEntry> {
		let mut out = Vec::new();
		self.collect_data(&mut out);
		out
	}

	fn collect_data<'s>(&'s self, out: &mut Vec<&'s ResourceDataEntry>) {
		for entry in &self.entries {
			match &entry.child {
				ResourceChild::Directory(dir) => dir.collect_data(out),
				ResourceChild::Data(data) => out.push(data),
			}
		}
	}

	pub fn version_infos(&self) -> Vec<&VsVersionInfo> {
		self.data_entries()
			.into_iter()
			.filter_map(|data| data.version_info.as_ref())
			.collect()
	}
}
