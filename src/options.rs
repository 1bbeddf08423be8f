use std::fs::File;
use std::io::Read;
use std::path::Path;

use encoding_rs::UTF_8;
use encoding_rs_io::DecodeReaderBytesBuilder;
use serde::{Deserialize, Serialize};

use nutil::{NError, Result};

/// Decoder switches. Fields missing from a loaded document keep their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
	/// Trace every read and drop the raw buffer from the decoded image.
	pub debug: bool,
	pub decode_resources: bool,
	pub decode_version_info: bool,
}
impl Default for Options {
	fn default() -> Self {
		Self {
			debug: false,
			decode_resources: true,
			decode_version_info: true,
		}
	}
}
impl Options {
	pub fn from_json(text: &str) -> Result<Self> {
		serde_json::from_str(text).map_err(|e| NError::ErrOptions(e.to_string()))
	}

	/// Reads a JSON options file. UTF-16 files are accepted when they carry a BOM.
	pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
		let file = File::open(path)?;
		let mut reader = DecodeReaderBytesBuilder::new()
			.encoding(Some(UTF_8))
			.bom_override(true)
			.strip_bom(true)
			.build(file);

		let mut text = String::new();
		reader.read_to_string(&mut text)?;
		Self::from_json(&text)
	}
}
