//Numeric header fields whose unknown values are kept as-is
macro_rules! raw_enum {
	( $name:ident : $repr:ty { $( $variant:ident = $value:literal ),* $(,)? } ) => {
		#[derive(Debug, Clone, Copy, PartialEq, Eq, ::serde::Serialize)]
		pub enum $name {
			$( $variant, )*
			Unknown($repr),
		}
		impl $name {
			pub fn from_raw(raw: $repr) -> Self {
				match raw {
					$( $value => Self::$variant, )*
					other => Self::Unknown(other),
				}
			}
			pub fn raw(self) -> $repr {
				match self {
					$( Self::$variant => $value, )*
					Self::Unknown(raw) => raw,
				}
			}
		}
	};
}
