#![allow(dead_code)]

use bytebuffer::{ByteBuffer, Endian};

pub const LFA_NEW: u32 = 0x40;
pub const RT_VERSION: u32 = 16;

pub fn le_buffer() -> ByteBuffer {
	let mut buf = ByteBuffer::new();
	buf.set_endian(Endian::LittleEndian);
	buf
}

fn pad_to(buf: &mut ByteBuffer, len: usize) {
	while buf.len() < len {
		buf.write_u8(0);
	}
}

fn pad4(buf: &mut ByteBuffer) {
	let len = (buf.len() + 3) & !3;
	pad_to(buf, len);
}

pub struct SectionSpec {
	pub name: &'static str,
	pub addr_virtual: u32,
	pub addr_raw: u32,
	pub data: Vec<u8>,
}

/// Lays out DOS header, COFF header, optional header, section table and
/// section contents, in that order.
pub struct ImageBuilder {
	pub pe32_plus: bool,
	pub directories: Vec<(u32, u32)>,
	pub sections: Vec<SectionSpec>,
	pub sz_opt_headers: Option<u16>,
	pub lfa_new: u32,
}
impl ImageBuilder {
	pub fn new() -> Self {
		Self {
			pe32_plus: false,
			directories: Vec::new(),
			sections: Vec::new(),
			sz_opt_headers: None,
			lfa_new: LFA_NEW,
		}
	}

	pub fn optional_header_size(&self) -> u16 {
		let fixed = if self.pe32_plus { 112 } else { 96 };
		fixed + 8 * self.directories.len() as u16
	}

	pub fn build(&self) -> Vec<u8> {
		let mut buf = le_buffer();

		//DOS header
		buf.write_u16(0x5a4d);
		buf.write_u16(0x90);
		for _ in 0..28 {
			buf.write_u16(0);
		}
		buf.write_u32(self.lfa_new);
		pad_to(&mut buf, self.lfa_new as usize);

		//COFF header
		buf.write_u32(0x00004550);
		buf.write_u16(if self.pe32_plus { 0x8664 } else { 0x14c });
		buf.write_u16(self.sections.len() as u16);
		buf.write_u32(0x5f5e1000);
		buf.write_u32(0);
		buf.write_u32(0);
		buf.write_u16(self.sz_opt_headers.unwrap_or_else(|| self.optional_header_size()));
		buf.write_u16(0x0102);

		//Optional header
		let wide = self.pe32_plus;
		let write_wide = |buf: &mut ByteBuffer, v: u64| {
			if wide { buf.write_u64(v) } else { buf.write_u32(v as u32) }
		};
		buf.write_u16(if wide { 0x20b } else { 0x10b });
		buf.write_u8(14);
		buf.write_u8(0);
		buf.write_u32(0x200);
		buf.write_u32(0x400);
		buf.write_u32(0);
		buf.write_u32(0x1010);
		buf.write_u32(0x1000);
		if !wide {
			buf.write_u32(0x2000);
		}
		write_wide(&mut buf, if wide { 0x140000000 } else { 0x400000 });
		buf.write_u32(0x1000);
		buf.write_u32(0x200);
		for v in [6u16, 0, 1, 2, 6, 0] {
			buf.write_u16(v);
		}
		buf.write_u32(0);
		buf.write_u32(0x4000);
		buf.write_u32(0x400);
		buf.write_u32(0);
		buf.write_u16(2);
		buf.write_u16(0x8140);
		write_wide(&mut buf, 0x100000);
		write_wide(&mut buf, 0x1000);
		write_wide(&mut buf, 0x100000);
		write_wide(&mut buf, 0x1000);
		buf.write_u32(0);
		buf.write_u32(self.directories.len() as u32);
		for (addr_virtual, size) in &self.directories {
			buf.write_u32(*addr_virtual);
			buf.write_u32(*size);
		}

		//Section table
		for section in &self.sections {
			let mut name = [0u8; 8];
			name[..section.name.len()].copy_from_slice(section.name.as_bytes());
			buf.write_bytes(&name);
			buf.write_u32(section.data.len() as u32);
			buf.write_u32(section.addr_virtual);
			buf.write_u32(section.data.len() as u32);
			buf.write_u32(section.addr_raw);
			buf.write_u32(0);
			buf.write_u32(0);
			buf.write_u16(0);
			buf.write_u16(0);
			buf.write_u32(0x40000040);
		}

		for section in &self.sections {
			pad_to(&mut buf, section.addr_raw as usize);
			buf.write_bytes(&section.data);
		}

		buf.into_vec()
	}
}

/// One version-info record, assumed to start on a DWORD boundary.
pub fn vs_record(key: &str, value_length: u16, value_type: u16, value: &[u8], children: &[Vec<u8>]) -> Vec<u8> {
	let mut buf = le_buffer();
	buf.write_u16(0);
	buf.write_u16(value_length);
	buf.write_u16(value_type);
	for unit in key.encode_utf16().chain(std::iter::once(0)) {
		buf.write_u16(unit);
	}
	pad4(&mut buf);
	buf.write_bytes(value);
	for child in children {
		pad4(&mut buf);
		buf.write_bytes(child);
	}
	let mut out = buf.into_vec();
	let length = out.len() as u16;
	out[0..2].copy_from_slice(&length.to_le_bytes());
	out
}

pub fn vs_string(key: &str, value: &str) -> Vec<u8> {
	let units: Vec<u16> = value.encode_utf16().chain(std::iter::once(0)).collect();
	let bytes: Vec<u8> = units.iter().flat_map(|u| u.to_le_bytes()).collect();
	vs_record(key, units.len() as u16, 1, &bytes, &[])
}

pub fn version_info(file_info_key: &str) -> Vec<u8> {
	let fixed: Vec<u8> = [
		0xfeef04bdu32, 0x00010000,
		0x00010002, 0x00030004,
		0x00010002, 0x00030004,
		0x3f, 0, 0x00040004, 1, 0, 0, 0,
	].iter().flat_map(|f| f.to_le_bytes()).collect();

	let table = vs_record("040904b0", 0, 1, &[], &[
		vs_string("CompanyName", "Example Corp"),
		vs_string("FileDescription", "Sample executable"),
		vs_string("FileVersion", "1.2.3.4"),
		vs_string("ProductName", "peview"),
	]);
	let string_info = vs_record(file_info_key, 0, 1, &[], &[table]);
	let var = vs_record("Translation", 4, 0, &[0x09, 0x04, 0xb0, 0x04], &[]);
	let var_info = vs_record("VarFileInfo", 0, 1, &[], &[var]);
	vs_record("VS_VERSION_INFO", 52, 0, &fixed, &[string_info, var_info])
}

fn write_directory(buf: &mut ByteBuffer, entries: &[(u32, u32)]) {
	buf.write_u32(0);
	buf.write_u32(0);
	buf.write_u16(4);
	buf.write_u16(0);
	buf.write_u16(0);
	buf.write_u16(entries.len() as u16);
	for (name_id, offset) in entries {
		buf.write_u32(*name_id);
		buf.write_u32(*offset);
	}
}

/// Contents of a `.rsrc` section mapped at `section_rva`: a manifest-less
/// tree holding a single version resource, type -> name -> language -> leaf.
pub fn resource_section(section_rva: u32, payload: &[u8]) -> Vec<u8> {
	let mut buf = le_buffer();
	write_directory(&mut buf, &[(RT_VERSION, 0x80000000 | 0x18)]);
	write_directory(&mut buf, &[(1, 0x80000000 | 0x30)]);
	write_directory(&mut buf, &[(0x409, 0x48)]);
	buf.write_u32(section_rva + 0x58);
	buf.write_u32(payload.len() as u32);
	buf.write_u32(0);
	buf.write_u32(0);
	buf.write_bytes(payload);
	pad4(&mut buf);
	buf.into_vec()
}

/// A PE32 image with `.text` at 0x1000 and `.rsrc` at 0x2000, and the
/// resource directory pointing at the start of `.rsrc`.
pub fn sample_image(file_info_key: &str) -> ImageBuilder {
	let mut builder = ImageBuilder::new();
	builder.directories = vec![(0, 0); 16];
	builder.directories[1] = (0x1800, 0x28);
	let rsrc = resource_section(0x2000, &version_info(file_info_key));
	builder.directories[2] = (0x2000, rsrc.len() as u32);
	builder.sections.push(SectionSpec {
		name: ".text",
		addr_virtual: 0x1000,
		addr_raw: 0x200,
		data: vec![0xcc; 0x200],
	});
	builder.sections.push(SectionSpec {
		name: ".rsrc",
		addr_virtual: 0x2000,
		addr_raw: 0x400,
		data: rsrc,
	});
	builder
}
