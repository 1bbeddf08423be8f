mod common;

use common::*;
use peview::headers::{DataDirectoryKind, Machine, PeFormat, Subsystem, PE_SIGNATURE};
use peview::version::StringKey;
use peview::{Image, NError, Options};

#[test]
fn minimal_image_round_trip() {
	let data = ImageBuilder::new().build();
	let image = Image::parse(data.clone(), Options::default()).unwrap();

	assert_eq!(image.dos_header.signature, 0x5a4d);
	assert_eq!(image.dos_header.sz_last_page, 0x90);
	assert_eq!(image.dos_header.lfa_new, LFA_NEW);

	let coff = &image.coff_header;
	assert_eq!(coff.offset, LFA_NEW as usize);
	assert_eq!(coff.magic, PE_SIGNATURE);
	assert_eq!(coff.machine, Machine::Intel386);
	assert_eq!(coff.n_sections, 0);
	assert_eq!(coff.timedate_stamp, 0x5f5e1000);
	assert_eq!(coff.sz_opt_headers, 96);

	let opt = &image.optional_header;
	assert_eq!(opt.offset, LFA_NEW as usize + 24);
	assert_eq!(opt.format(), PeFormat::Pe32);
	assert_eq!(opt.linker_version_major, 14);
	assert_eq!(opt.addr_entrypoint, 0x1010);
	assert_eq!(opt.addr_base_data, 0x2000);
	assert_eq!(opt.addr_base_image, 0x400000);
	assert_eq!(opt.subsystem, Subsystem::WindowsGui);
	assert_eq!(opt.n_rva_sizes, 0);
	assert!(opt.data_directories.is_empty());
	assert!(opt.size_matches(coff));

	assert!(image.sections.is_empty());
	assert!(image.resources().is_none());
	assert_eq!(image.buffer(), Some(&data[..]));
}

#[test]
fn buffer_shorter_than_dos_header_is_out_of_bounds() {
	let res = Image::parse(vec![0u8; 0x20], Options::default());
	assert!(matches!(res, Err(NError::ErrOutOfBounds { offset: 0x20, .. })));
}

#[test]
fn lfa_new_past_the_end_is_out_of_bounds() {
	let mut builder = ImageBuilder::new();
	builder.lfa_new = 0x40;
	let mut data = builder.build();
	data[0x3c..0x40].copy_from_slice(&0x1000u32.to_le_bytes());
	let res = Image::parse(data, Options::default());
	assert!(matches!(res, Err(NError::ErrOutOfBounds { offset: 0x1000, .. })));
}

#[test]
fn declared_optional_header_size_mismatch_is_detectable() {
	let mut builder = ImageBuilder::new();
	builder.sz_opt_headers = Some(0xe0);
	let image = Image::parse(builder.build(), Options::default()).unwrap();
	assert_eq!(image.optional_header.size, 96);
	assert!(!image.optional_header.size_matches(&image.coff_header));
}

#[test]
fn pe32_plus_image() {
	let mut builder = ImageBuilder::new();
	builder.pe32_plus = true;
	builder.directories = vec![(0, 0); 16];
	let image = Image::parse(builder.build(), Options::default()).unwrap();

	let opt = &image.optional_header;
	assert!(opt.is_pe32_plus());
	assert_eq!(image.coff_header.machine, Machine::Amd64);
	assert_eq!(opt.addr_base_image, 0x140000000);
	assert_eq!(opt.addr_base_data, 0);
	assert_eq!(opt.sz_stack_reserve, 0x100000);
	assert_eq!(opt.size, 0xf0);
	assert!(opt.size_matches(&image.coff_header));
}

#[test]
fn sections_follow_the_optional_header() {
	let image = Image::parse(sample_image("StringFileInfo").build(), Options::default()).unwrap();

	assert_eq!(image.sections.len(), 2);
	let text = image.get_section(".text").unwrap();
	assert_eq!(text.offset, image.optional_header.offset + image.optional_header.size);
	assert_eq!(text.addr_raw, 0x200);
	assert!(image.get_section(".data").is_none());
	assert_eq!(image.rva_to_offset(0x1010), Some(0x210));
	assert_eq!(image.rva_to_offset(0x9000), None);
}

#[test]
fn unmatched_directories_stay_unattached() {
	let image = Image::parse(sample_image("StringFileInfo").build(), Options::default()).unwrap();

	//Import points inside .text rather than at its start
	let import = image.data_directory(DataDirectoryKind::Import).unwrap();
	assert_eq!(import.addr_virtual, 0x1800);
	assert!(import.section.is_none());
	assert!(image.data_directory(DataDirectoryKind::Export).unwrap().section.is_none());

	let rsrc = image.data_directory(DataDirectoryKind::Resource).unwrap();
	assert_eq!(rsrc.section.as_ref().unwrap().name, ".rsrc");
}

#[test]
fn resource_tree_and_version_info_are_decoded() {
	let image = Image::parse(sample_image("StringFileInfo").build(), Options::default()).unwrap();

	let root = image.resources().unwrap();
	assert_eq!(root.offset, 0x400);
	assert_eq!(root.entries.len(), 1);
	assert_eq!(root.entries[0].name.id(), Some(16));
	assert_eq!(root.data_entries().len(), 1);

	let infos = image.version_info();
	assert_eq!(infos.len(), 1);
	let info = infos[0];
	assert_eq!(info.offset, 0x458);
	assert_eq!(info.fixed.as_ref().unwrap().file_version(), (1, 2, 3, 4));
	assert_eq!(info.string(StringKey::CompanyName), Some("Example Corp"));
	assert_eq!(info.string(StringKey::FileDescription), Some("Sample executable"));
	assert_eq!(info.string(StringKey::ProductName), Some("peview"));
	assert_eq!(info.translations().len(), 1);
	assert_eq!(info.translations()[0].language, 0x0409);
}

#[test]
fn section_table_entry_carries_the_resource_tree() {
	let image = Image::parse(sample_image("StringFileInfo").build(), Options::default()).unwrap();

	let rsrc = image.get_section(".rsrc").unwrap();
	let root = rsrc.resources().unwrap();
	assert_eq!(root.offset, image.resources().unwrap().offset);
	assert_eq!(root.version_infos().len(), 1);
	assert!(image.get_section(".text").unwrap().resources().is_none());
}

#[test]
fn resource_decoding_can_be_switched_off() {
	let options = Options {
		decode_resources: false,
		..Options::default()
	};
	let image = Image::parse(sample_image("StringFileInfo").build(), options).unwrap();
	let rsrc = image.data_directory(DataDirectoryKind::Resource).unwrap();
	assert!(rsrc.section.is_some());
	assert!(image.resources().is_none());
	assert!(image.get_section(".rsrc").unwrap().resources().is_none());

	let options = Options {
		decode_version_info: false,
		..Options::default()
	};
	let image = Image::parse(sample_image("StringFileInfo").build(), options).unwrap();
	assert!(image.resources().is_some());
	assert!(image.version_info().is_empty());
}

#[test]
fn unexpected_file_info_key_aborts_the_decode() {
	let res = Image::parse(sample_image("StringFileInfX").build(), Options::default());
	match res {
		Err(NError::ErrUnexpectedKey { key, .. }) => assert_eq!(key, "StringFileInfX"),
		other => panic!("expected unexpected key, got {:?}", other.map(|_| ())),
	}
}

#[test]
fn debug_mode_drops_the_buffer() {
	let options = Options {
		debug: true,
		..Options::default()
	};
	let image = Image::parse(sample_image("StringFileInfo").build(), options).unwrap();
	assert!(image.buffer().is_none());
	assert_eq!(image.version_info().len(), 1);
}

#[test]
fn decoded_image_serializes_without_the_buffer() {
	let image = Image::parse(sample_image("StringFileInfo").build(), Options::default()).unwrap();
	let json = serde_json::to_value(&image).unwrap();
	assert!(json.get("buffer").is_none());
	assert_eq!(json["coff_header"]["n_sections"], 2);
	assert_eq!(json["sections"][1]["name"], ".rsrc");
}

#[test]
fn from_path_reads_the_file() {
	let path = std::env::temp_dir().join(format!("peview-image-{}.exe", std::process::id()));
	std::fs::write(&path, sample_image("StringFileInfo").build()).unwrap();
	let image = Image::from_path(&path, Options::default());
	std::fs::remove_file(&path).unwrap();
	assert_eq!(image.unwrap().sections.len(), 2);

	let res = Image::from_path("/nonexistent/peview.exe", Options::default());
	assert!(matches!(res, Err(NError::ErrIO(_))));
}
