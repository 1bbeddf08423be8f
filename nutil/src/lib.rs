use thiserror::Error;

#[derive(Debug, Error)]
pub enum NError {
	#[error("Read of {len} byte(s) at 0x{offset:x} is out of bounds (buffer size 0x{available:x})")]
	ErrOutOfBounds {
		offset: usize,
		len: usize,
		available: usize,
	},
	#[error("Unexpected key {key:?} at 0x{offset:x}")]
	ErrUnexpectedKey {
		offset: usize,
		key: String,
	},
	#[error("Unsupported version string key {key:?} at 0x{offset:x}")]
	ErrUnsupportedStringKey {
		offset: usize,
		key: String,
	},
	#[error("Resource directory at 0x{offset:x} exceeds the nesting limit of {depth}")]
	ErrRecursionLimit {
		offset: usize,
		depth: usize,
	},
	#[error("Resource directory at 0x{offset:x} is referenced more than once")]
	ErrSharedDirectory {
		offset: usize,
	},
	#[error("{0}")]
	ErrIO(#[from] std::io::Error),
	#[error("Invalid options: {0}")]
	ErrOptions(String),
}

pub type Result<T> = std::result::Result<T, NError>;

/// Rounds a requested alignment up to the next power of two, minimum 1.
pub fn normalize_alignment(n: usize) -> usize {
	n.max(1).next_power_of_two()
}

/// Smallest multiple of `align` (a power of two) that is >= `value`.
pub fn align_up(value: usize, align: usize) -> usize {
	let align = normalize_alignment(align);
	(value + align - 1) & !(align - 1)
}

/// Number of padding bytes needed to bring `value` up to `align`.
pub fn padding_for(value: usize, align: usize) -> usize {
	align_up(value, align) - value
}
