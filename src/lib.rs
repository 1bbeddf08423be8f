//! Decoder for the on-disk layout of Windows PE images: DOS stub, COFF and
//! optional headers, the section table, and the resource directory tree down
//! to version-information records.

#[macro_use]
mod macros;

pub mod cursor;
pub mod headers;
pub mod sections;
pub mod resource;
pub mod version;
pub mod options;
pub mod executable;

pub use nutil::{NError, Result};

pub use executable::Image;
pub use options::Options;
