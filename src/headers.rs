use bitflags::bitflags;
use serde::Serialize;

use nutil::Result;

use crate::cursor::{Cursor, FromCursor, ReadPrimitives};
use crate::sections::Section;

pub const PE_SIGNATURE: u32 = 0x00004550;
pub const DOS_HEADER_SIZE: usize = 0x40;
pub const COFF_HEADER_SIZE: usize = 24;
pub const DATA_DIRECTORY_SIZE: usize = 8;

//DOS Header
#[derive(Debug, Clone, Default, Serialize)]
pub struct DosHeader {
	pub offset: usize,
	pub size: usize,

	pub signature: u16,
	pub sz_last_page: u16,
	pub n_pages: u16,
	pub n_relocs: u16,
	pub sz_header: u16,
	pub min_alloc: u16,
	pub max_alloc: u16,
	pub ss: u16,
	pub sp: u16,
	pub checksum: u16,
	pub ip: u16,
	pub cs: u16,
	pub addr_reloc_table: u16,
	pub n_overlay: u16,
	pub reserved1: [u16; 4],
	pub oem_id: u16,
	pub oem_info: u16,
	pub reserved2: [u16; 10],
	pub lfa_new: u32,
}
impl FromCursor for DosHeader {
	fn from_cursor(cursor: &mut Cursor<'_>) -> Result<Self> {
		let offset = cursor.position();
		let start = cursor.consumed();

		let mut header = Self {
			offset,
			signature: cursor.read_u16()?,
			sz_last_page: cursor.read_u16()?,
			n_pages: cursor.read_u16()?,
			n_relocs: cursor.read_u16()?,
			sz_header: cursor.read_u16()?,
			min_alloc: cursor.read_u16()?,
			max_alloc: cursor.read_u16()?,
			ss: cursor.read_u16()?,
			sp: cursor.read_u16()?,
			checksum: cursor.read_u16()?,
			ip: cursor.read_u16()?,
			cs: cursor.read_u16()?,
			addr_reloc_table: cursor.read_u16()?,
			n_overlay: cursor.read_u16()?,
			..Self::default()
		};
		for word in header.reserved1.iter_mut() {
			*word = cursor.read_u16()?;
		}
		header.oem_id = cursor.read_u16()?;
		header.oem_info = cursor.read_u16()?;
		for word in header.reserved2.iter_mut() {
			*word = cursor.read_u16()?;
		}
		header.lfa_new = cursor.read_u32()?;

		header.size = cursor.consumed() - start;
		Ok(header)
	}
}

raw_enum!(Machine: u16 {
	Intel386 = 0x14c,
	MipsR3000 = 0x162,
	MipsR10000 = 0x168,
	MipsLittleEndianWciV2 = 0x169,
	OldAlphaAxp = 0x183,
	AlphaAxp = 0x184,
	HitachiSh3 = 0x1a2,
	HitachiSh3Dsp = 0x1a3,
	HitachiSh4 = 0x1a6,
	HitachiSh5 = 0x1a8,
	ArmLittleEndian = 0x1c0,
	Thumb = 0x1c2,
	ArmV7 = 0x1c4,
	MatsushitaAm33 = 0x1d3,
	PowerPcLittleEndian = 0x1f0,
	PowerPcWithFloatingPoint = 0x1f1,
	IntelIa64 = 0x200,
	Mips16 = 0x266,
	Motorola68000Series = 0x268,
	AlphaAxp64 = 0x284,
	MipsWithFpu = 0x366,
	Mips16WithFpu = 0x466,
	EfiByteCode = 0xebc,
	Amd64 = 0x8664,
	MitsubishiM32RLittleEndian = 0x9041,
	Arm64LittleEndian = 0xaa64,
	ClrPureMsil = 0xc0ee,
});

bitflags! {
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
	pub struct CoffCharacteristics: u16 {
		const RELOCS_STRIPPED = 1 << 0;
		const EXECUTABLE_IMAGE = 1 << 1;
		const LINE_NUMS_STRIPPED = 1 << 2;
		const LOCAL_SYMS_STRIPPED = 1 << 3;
		const AGGRESSIVE_WS_TRIM = 1 << 4;
		const LARGE_ADDRESS_AWARE = 1 << 5;
		const BYTES_REVERSED_LO = 1 << 7;
		const MACHINE_32BIT = 1 << 8;
		const DEBUG_STRIPPED = 1 << 9;
		const REMOVABLE_RUN_FROM_SWAP = 1 << 10;
		const NET_RUN_FROM_SWAP = 1 << 11;
		const SYSTEM = 1 << 12;
		const DLL = 1 << 13;
		const UP_SYSTEM_ONLY = 1 << 14;
		const BYTES_REVERSED_HI = 1 << 15;
	}
}

//COFF File Header, including the leading PE signature
#[derive(Debug, Clone, Serialize)]
pub struct CoffHeader {
	pub offset: usize,
	pub size: usize,

	pub magic: u32,
	pub machine: Machine,
	pub n_sections: u16,
	pub timedate_stamp: u32,
	pub addr_symbol_table: u32,
	pub n_symbols: u32,
	pub sz_opt_headers: u16,
	pub flags: CoffCharacteristics,
}
impl CoffHeader {
	pub fn has_pe_signature(&self) -> bool {
		self.magic == PE_SIGNATURE
	}
	pub fn is_dll(&self) -> bool {
		self.flags.contains(CoffCharacteristics::DLL)
	}
}
impl FromCursor for CoffHeader {
	fn from_cursor(cursor: &mut Cursor<'_>) -> Result<Self> {
		let offset = cursor.position();
		let start = cursor.consumed();

		let magic = cursor.read_u32()?;
		let machine = Machine::from_raw(cursor.read_u16()?);
		let n_sections = cursor.read_u16()?;
		let timedate_stamp = cursor.read_u32()?;
		let addr_symbol_table = cursor.read_u32()?;
		let n_symbols = cursor.read_u32()?;
		let sz_opt_headers = cursor.read_u16()?;
		let flags = CoffCharacteristics::from_bits_retain(cursor.read_u16()?);

		Ok(Self {
			offset,
			size: cursor.consumed() - start,
			magic,
			machine,
			n_sections,
			timedate_stamp,
			addr_symbol_table,
			n_symbols,
			sz_opt_headers,
			flags,
		})
	}
}

raw_enum!(PeFormat: u16 {
	Pe32 = 0x10b,
	Pe32Plus = 0x20b,
	Rom = 0x107,
});

raw_enum!(Subsystem: u16 {
	Native = 1,
	WindowsGui = 2,
	WindowsCui = 3,
	Os2Cui = 5,
	PosixCui = 7,
	NativeWindows = 8,
	WindowsCeGui = 9,
	EfiApplication = 10,
	EfiBootServiceDriver = 11,
	EfiRuntimeDriver = 12,
	EfiRom = 13,
	Xbox = 14,
	WindowsBootApplication = 16,
});

bitflags! {
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
	pub struct DllCharacteristics: u16 {
		const HIGH_ENTROPY_VA = 1 << 5;
		const DYNAMIC_BASE = 1 << 6;
		const FORCE_INTEGRITY = 1 << 7;
		const NX_COMPAT = 1 << 8;
		const NO_ISOLATION = 1 << 9;
		const NO_SEH = 1 << 10;
		const NO_BIND = 1 << 11;
		const APPCONTAINER = 1 << 12;
		const WDM_DRIVER = 1 << 13;
		const GUARD_CF = 1 << 14;
		const TERMINAL_SERVER_AWARE = 1 << 15;
	}
}

/// Slots of the data-directory table, in on-disk order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DataDirectoryKind {
	Export = 0,
	Import = 1,
	Resource = 2,
	Exception = 3,
	Security = 4,
	BaseReloc = 5,
	Debug = 6,
	Architecture = 7,
	GlobalPtr = 8,
	Tls = 9,
	LoadConfig = 10,
	BoundImport = 11,
	Iat = 12,
	DelayImport = 13,
	ClrRuntime = 14,
	Reserved = 15,
}
impl DataDirectoryKind {
	pub fn index(self) -> usize {
		self as usize
	}
}

//Data Directory
#[derive(Debug, Clone, Serialize)]
pub struct DataDirectory {
	pub offset: usize,
	pub size: usize,

	pub addr_virtual: u32,
	pub sz_data: u32,

	/// Section whose start coincides with `addr_virtual`, set while mapping.
	pub section: Option<Section>,
}
impl DataDirectory {
	pub fn is_empty(&self) -> bool {
		self.addr_virtual == 0 && self.sz_data == 0
	}
}
impl FromCursor for DataDirectory {
	fn from_cursor(cursor: &mut Cursor<'_>) -> Result<Self> {
		let offset = cursor.position();
		let start = cursor.consumed();

		let addr_virtual = cursor.read_u32()?;
		let sz_data = cursor.read_u32()?;

		Ok(Self {
			offset,
			size: cursor.consumed() - start,
			addr_virtual,
			sz_data,
			section: None,
		})
	}
}

//Optional Header, standard and Windows-specific fields
//
//PE32+ widens the image base and the stack/heap sizes to 8 bytes and has no
//base-of-data field; both layouts are widened to u64 here.
#[derive(Debug, Clone, Serialize)]
pub struct OptionalHeader {
	pub offset: usize,
	pub size: usize,

	pub magic: u16,
	pub linker_version_major: u8,
	pub linker_version_minor: u8,
	pub sz_code: u32,
	pub sz_init_data: u32,
	pub sz_uninit_data: u32,
	pub addr_entrypoint: u32,
	pub addr_base_code: u32,
	pub addr_base_data: u32,

	pub addr_base_image: u64,
	pub align_section: u32,
	pub align_file: u32,
	pub version_os_major: u16,
	pub version_os_minor: u16,
	pub version_image_major: u16,
	pub version_image_minor: u16,
	pub version_subsystem_major: u16,
	pub version_subsystem_minor: u16,
	pub version_win32: u32,
	pub sz_image: u32,
	pub sz_headers: u32,
	pub checksum: u32,
	pub subsystem: Subsystem,
	pub flags_dll: DllCharacteristics,
	pub sz_stack_reserve: u64,
	pub sz_stack_commit: u64,
	pub sz_heap_reserve: u64,
	pub sz_heap_commit: u64,
	pub flags_loader: u32,
	pub n_rva_sizes: u32,

	pub data_directories: Vec<DataDirectory>,
}
impl OptionalHeader {
	pub fn format(&self) -> PeFormat {
		PeFormat::from_raw(self.magic)
	}

	pub fn is_pe32_plus(&self) -> bool {
		self.format() == PeFormat::Pe32Plus
	}

	/// Whether the bytes decoded here agree with the COFF header's declared
	/// optional-header size.
	pub fn size_matches(&self, coff: &CoffHeader) -> bool {
		self.size == coff.sz_opt_headers as usize
	}

	pub fn data_directory(&self, kind: DataDirectoryKind) -> Option<&DataDirectory> {
		self.data_directories.get(kind.index())
	}
}
impl FromCursor for OptionalHeader {
	fn from_cursor(cursor: &mut Cursor<'_>) -> Result<Self> {
		let offset = cursor.position();
		let start = cursor.consumed();

		let magic = cursor.read_u16()?;
		let wide = PeFormat::from_raw(magic) == PeFormat::Pe32Plus;

		//Reads a field that is 8 bytes wide on PE32+ and 4 bytes otherwise
		macro_rules! read_wide {
			() => {
				if wide { cursor.read_u64()? } else { cursor.read_u32()? as u64 }
			};
		}

		let linker_version_major = cursor.read_u8()?;
		let linker_version_minor = cursor.read_u8()?;
		let sz_code = cursor.read_u32()?;
		let sz_init_data = cursor.read_u32()?;
		let sz_uninit_data = cursor.read_u32()?;
		let addr_entrypoint = cursor.read_u32()?;
		let addr_base_code = cursor.read_u32()?;
		let addr_base_data = if wide { 0 } else { cursor.read_u32()? };

		let addr_base_image = read_wide!();
		let align_section = cursor.read_u32()?;
		let align_file = cursor.read_u32()?;
		let version_os_major = cursor.read_u16()?;
		let version_os_minor = cursor.read_u16()?;
		let version_image_major = cursor.read_u16()?;
		let version_image_minor = cursor.read_u16()?;
		let version_subsystem_major = cursor.read_u16()?;
		let version_subsystem_minor = cursor.read_u16()?;
		let version_win32 = cursor.read_u32()?;
		let sz_image = cursor.read_u32()?;
		let sz_headers = cursor.read_u32()?;
		let checksum = cursor.read_u32()?;
		let subsystem = Subsystem::from_raw(cursor.read_u16()?);
		let flags_dll = DllCharacteristics::from_bits_retain(cursor.read_u16()?);
		let sz_stack_reserve = read_wide!();
		let sz_stack_commit = read_wide!();
		let sz_heap_reserve = read_wide!();
		let sz_heap_commit = read_wide!();
		let flags_loader = cursor.read_u32()?;
		let n_rva_sizes = cursor.read_u32()?;

		let mut data_directories = Vec::new();
		for _ in 0..n_rva_sizes {
			data_directories.push(DataDirectory::from_cursor(cursor)?);
		}

		Ok(Self {
			offset,
			size: cursor.consumed() - start,
			magic,
			linker_version_major,
			linker_version_minor,
			sz_code,
			sz_init_data,
			sz_uninit_data,
			addr_entrypoint,
			addr_base_code,
			addr_base_data,
			addr_base_image,
			align_section,
			align_file,
			version_os_major,
			version_os_minor,
			version_image_major,
			version_image_minor,
			version_subsystem_major,
			version_subsystem_minor,
			version_win32,
			sz_image,
			sz_headers,
			checksum,
			subsystem,
			flags_dll,
			sz_stack_reserve,
			sz_stack_commit,
			sz_heap_reserve,
			sz_heap_commit,
			flags_loader,
			n_rva_sizes,
			data_directories,
		})
	}
}
