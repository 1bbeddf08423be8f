use bitflags::bitflags;
use serde::Serialize;

use nutil::Result;

use crate::cursor::{Cursor, FromCursor, ReadPrimitives};
use crate::headers::DataDirectory;
use crate::resource::ResourceDirectory;

pub const SECTION_HEADER_SIZE: usize = 40;
pub const SECTION_NAME_SIZE: usize = 8;

bitflags! {
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
	pub struct SectionCharacteristics: u32 {
		const TYPE_NO_PAD = 0x00000008;
		const CNT_CODE = 0x00000020;
		const CNT_INITIALIZED_DATA = 0x00000040;
		const CNT_UNINITIALIZED_DATA = 0x00000080;
		const LNK_INFO = 0x00000200;
		const LNK_REMOVE = 0x00000800;
		const LNK_COMDAT = 0x00001000;
		const GPREL = 0x00008000;
		const LNK_NRELOC_OVFL = 0x01000000;
		const MEM_DISCARDABLE = 0x02000000;
		const MEM_NOT_CACHED = 0x04000000;
		const MEM_NOT_PAGED = 0x08000000;
		const MEM_SHARED = 0x10000000;
		const MEM_EXECUTE = 0x20000000;
		const MEM_READ = 0x40000000;
		const MEM_WRITE = 0x80000000;
	}
}

/// Decoded contents attached to a section during image assembly.
#[derive(Debug, Clone, Serialize)]
pub enum SectionData {
	Resources(ResourceDirectory),
}

//Section Headers
#[derive(Debug, Clone, Serialize)]
pub struct Section {
	pub offset: usize,
	pub size: usize,

	/// Fixed 8-byte name with trailing NULs removed.
	pub name: String,
	pub sz_virtual: u32,
	pub addr_virtual: u32,
	pub sz_raw: u32,
	pub addr_raw: u32,
	pub addr_relocs: u32,
	pub addr_linenums: u32,
	pub n_relocs: u16,
	pub n_linenums: u16,
	pub flags: SectionCharacteristics,

	pub data: Option<SectionData>,
}
impl Section {
	pub fn contains_rva(&self, rva: u32) -> bool {
		let extent = self.sz_virtual.max(self.sz_raw);
		rva >= self.addr_virtual && (rva - self.addr_virtual) < extent
	}

	/// File offset of `rva`, if it falls inside this section's raw data.
	pub fn rva_to_offset(&self, rva: u32) -> Option<usize> {
		if rva < self.addr_virtual {
			return None;
		}
		let delta = rva - self.addr_virtual;
		if delta >= self.sz_raw {
			return None;
		}
		Some(self.addr_raw as usize + delta as usize)
	}

	pub fn raw_range(&self) -> std::ops::Range<usize> {
		let begin = self.addr_raw as usize;
		begin..begin + self.sz_raw as usize
	}

	pub fn resources(&self) -> Option<&ResourceDirectory> {
		match &self.data {
			Some(SectionData::Resources(dir)) => Some(dir),
			None => None,
		}
	}
}
impl FromCursor for Section {
	fn from_cursor(cursor: &mut Cursor<'_>) -> Result<Self> {
		let offset = cursor.position();
		let start = cursor.consumed();

		let name = cursor.read_string(SECTION_NAME_SIZE)?
			.trim_end_matches('\0')
			.to_string();
		let sz_virtual = cursor.read_u32()?;
		let addr_virtual = cursor.read_u32()?;
		let sz_raw = cursor.read_u32()?;
		let addr_raw = cursor.read_u32()?;
		let addr_relocs = cursor.read_u32()?;
		let addr_linenums = cursor.read_u32()?;
		let n_relocs = cursor.read_u16()?;
		let n_linenums = cursor.read_u16()?;
		let flags = SectionCharacteristics::from_bits_retain(cursor.read_u32()?);

		Ok(Self {
			offset,
			size: cursor.consumed() - start,
			name,
			sz_virtual,
			addr_virtual,
			sz_raw,
			addr_raw,
			addr_relocs,
			addr_linenums,
			n_relocs,
			n_linenums,
			flags,
			data: None,
		})
	}
}

/// Reads `count` consecutive section headers.
pub fn read_section_table(cursor: &mut Cursor<'_>, count: u16) -> Result<Vec<Section>> {
	let mut sections = Vec::with_capacity(count as usize);
	for _ in 0..count {
		sections.push(Section::from_cursor(cursor)?);
	}
	Ok(sections)
}

/// Section starting exactly at `addr_virtual`.
pub fn find_by_virtual_address(sections: &[Section], addr_virtual: u32) -> Option<&Section> {
	sections.iter().find(|s| s.addr_virtual == addr_virtual)
}

/// Section whose raw data range covers `rva`.
pub fn find_containing(sections: &[Section], rva: u32) -> Option<&Section> {
	sections.iter().find(|s| s.contains_rva(rva))
}

pub fn rva_to_offset(sections: &[Section], rva: u32) -> Option<usize> {
	find_containing(sections, rva).and_then(|s| s.rva_to_offset(rva))
}

/// Attaches each directory to the section that starts at its virtual address.
/// Directories without such a section are left unattached.
pub fn map_data_directories(directories: &mut [DataDirectory], sections: &[Section]) -> usize {
	let mut mapped = 0;
	for (i, dir) in directories.iter_mut().enumerate() {
		match find_by_virtual_address(sections, dir.addr_virtual) {
			Some(section) => {
				tracing::trace!("data directory {} -> section {:?}", i, section.name);
				dir.section = Some(section.clone());
				mapped += 1;
			}
			None => {
				tracing::trace!("data directory {} (0x{:x}) has no section", i, dir.addr_virtual);
			}
		}
	}
	mapped
}
