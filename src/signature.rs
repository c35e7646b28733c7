//! Comparable summaries of a tracked element's meaningful state.

use core::fmt::{self, Display, Formatter};
use web_sys::Element;

/// What an element looked like, as far as change detection is concerned.
///
/// An explicit version token always wins over the element's text, even if it is empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Signature {
	Version(String),
	Text(String),
}

impl Signature {
	/// Builds a signature from an optional version token and the element's raw text content.
	///
	/// `text` is only evaluated if there is no version token.
	pub fn new(version: Option<String>, text: impl FnOnce() -> String) -> Self {
		match version {
			Some(version) => Self::Version(version),
			None => Self::Text(normalize_text(&text())),
		}
	}

	/// Reads the signature of a live or incoming element.
	#[must_use]
	pub fn of(element: &Element, version_attribute: &str) -> Self {
		Self::new(element.get_attribute(version_attribute), || element.text_content().unwrap_or_default())
	}

	#[must_use]
	pub fn version(&self) -> Option<&str> {
		match self {
			Self::Version(version) => Some(version),
			Self::Text(_) => None,
		}
	}
}

/// The prefixed form keeps `v:` and `t:` signatures from ever comparing equal.
impl Display for Signature {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Self::Version(version) => write!(f, "v:{}", version),
			Self::Text(text) => write!(f, "t:{}", text),
		}
	}
}

/// Collapses every whitespace run to a single space and trims both ends.
#[must_use]
pub fn normalize_text(text: &str) -> String {
	text.split_whitespace().collect::<Vec<_>>().join(" ")
}
