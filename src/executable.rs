use std::path::Path;

use serde::Serialize;

use nutil::Result;

use crate::cursor::{Cursor, FromCursor};
use crate::headers::*;
use crate::options::Options;
use crate::resource::{ResourceContext, ResourceDirectory};
use crate::sections::{self, Section, SectionData};
use crate::version::VsVersionInfo;

//Decoded PE image
#[derive(Debug, Serialize)]
pub struct Image {
	#[serde(skip)]
	buffer: Option<Vec<u8>>,
	pub options: Options,

	pub dos_header: DosHeader,
	pub coff_header: CoffHeader,
	pub optional_header: OptionalHeader,

	pub sections: Vec<Section>,
}
impl Image {
	/// Decodes `buffer` front to back. Any failure aborts the whole decode.
	pub fn parse(buffer: Vec<u8>, options: Options) -> Result<Self> {
		let (dos_header, coff_header, mut optional_header, mut sections) = {
			let mut cursor = Cursor::new(&buffer, 0).with_trace(options.debug);
			let dos_header = DosHeader::from_cursor(&mut cursor)?;

			let mut cursor = cursor.fork(dos_header.lfa_new as usize);
			let coff_header = CoffHeader::from_cursor(&mut cursor)?;
			let optional_header = OptionalHeader::from_cursor(&mut cursor)?;
			let sections = sections::read_section_table(&mut cursor, coff_header.n_sections)?;

			(dos_header, coff_header, optional_header, sections)
		};
		tracing::debug!(
			"decoded {:?} image: {} section(s), {} data directories",
			optional_header.format(), sections.len(), optional_header.data_directories.len()
		);
		if !optional_header.size_matches(&coff_header) {
			tracing::debug!(
				"optional header is 0x{:x} bytes, COFF header declares 0x{:x}",
				optional_header.size, coff_header.sz_opt_headers
			);
		}

		let mapped = sections::map_data_directories(&mut optional_header.data_directories, &sections);
		tracing::debug!("mapped {} data directories onto sections", mapped);

		if options.decode_resources {
			read_resource_section(&mut optional_header, &mut sections, &buffer, &options)?;
		}

		let buffer = if options.debug { None } else { Some(buffer) };
		Ok(Self {
			buffer,
			options,
			dos_header,
			coff_header,
			optional_header,
			sections,
		})
	}

	/// Loads and decodes the file at `path`.
	pub fn from_path<P: AsRef<Path>>(path: P, options: Options) -> Result<Self> {
		let buffer = std::fs::read(path)?;
		Self::parse(buffer, options)
	}

	/// The raw image; dropped when decoding in debug mode.
	pub fn buffer(&self) -> Option<&[u8]> {
		self.buffer.as_deref()
	}

	pub fn get_section(&self, name: &str) -> Option<&Section> {
		self.sections.iter().find(|s| s.name == name)
	}

	pub fn data_directory(&self, kind: DataDirectoryKind) -> Option<&DataDirectory> {
		self.optional_header.data_directory(kind)
	}

	pub fn rva_to_offset(&self, rva: u32) -> Option<usize> {
		sections::rva_to_offset(&self.sections, rva)
	}

	pub fn resources(&self) -> Option<&ResourceDirectory> {
		self.data_directory(DataDirectoryKind::Resource)?
			.section
			.as_ref()?
			.resources()
	}

	pub fn version_info(&self) -> Vec<&VsVersionInfo> {
		self.resources()
			.map(|root| root.version_infos())
			.unwrap_or_default()
	}
}

//The decoded tree lands on the directory's section and on its entry in the table
fn read_resource_section(
	optional_header: &mut OptionalHeader,
	sections: &mut [Section],
	buffer: &[u8],
	options: &Options,
) -> Result<()> {
	let section = match optional_header.data_directories
		.get_mut(DataDirectoryKind::Resource.index())
		.and_then(|dir| dir.section.as_mut())
	{
		Some(section) => section,
		None => return Ok(()),
	};

	let ctx = ResourceContext::for_section(section)
		.with_version_info(options.decode_version_info);
	let mut cursor = Cursor::new(buffer, ctx.resource_base).with_trace(options.debug);
	let root = ResourceDirectory::parse(&mut cursor, &ctx)?;
	tracing::debug!("decoded resource directory at 0x{:x} with {} entries", root.offset, root.entries.len());

	if let Some(entry) = sections.iter_mut().find(|s| s.addr_virtual == section.addr_virtual) {
		entry.data = Some(SectionData::Resources(root.clone()));
	}
	section.data = Some(SectionData::Resources(root));
	Ok(())
}
