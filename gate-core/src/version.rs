use std::fmt;
use std::fmt::{Display, Formatter};

#[derive(serde::Serialize, Clone, Debug)]
pub struct BuildInfo {
	pub name: &'static str,
	pub version: &'static str,
}

/// Capture the calling crate's package name and version.
#[macro_export]
macro_rules! build_info {
	() => {
		$crate::version::BuildInfo {
			name: env!("CARGO_PKG_NAME"),
			version: env!("CARGO_PKG_VERSION"),
		}
	};
}

impl Display for BuildInfo {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "{} {}", self.name, self.version)
	}
}
