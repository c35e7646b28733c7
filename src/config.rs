//! Attribute names, default classes and timing constants.

use crate::animation::AnimationKind;

/// Everything the engine reads off the page or waits for is named here.
///
/// [`Config::default()`] matches the attribute contract documented in the crate README.
/// Individual values can be replaced with the `with_*` methods:
///
/// ```
/// use turbo_refresh_animations::config::Config;
///
/// let config = Config::default()
/// 	.with_protection_attribute("data-keep")
/// 	.with_visit_initiator_window_ms(1500.0);
/// assert_eq!(config.protection_attribute(), "data-keep");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
	animate_attribute: String,
	protection_attribute: String,
	version_attribute: String,
	kind_attribute_prefix: String,
	default_classes: [String; 3],
	visit_initiator_window_ms: f64,
	timeout_margin_ms: f64,
	fallback_wait_ms: f64,
	stream_content_type: String,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			animate_attribute: "data-turbo-refresh-animate".to_owned(),
			protection_attribute: "data-turbo-permanent".to_owned(),
			version_attribute: "data-turbo-refresh-version".to_owned(),
			kind_attribute_prefix: "data-turbo-refresh-".to_owned(),
			default_classes: [
				"turbo-refresh-enter".to_owned(),
				"turbo-refresh-change".to_owned(),
				"turbo-refresh-exit".to_owned(),
			],
			visit_initiator_window_ms: 2000.0,
			timeout_margin_ms: 50.0,
			fallback_wait_ms: 2000.0,
			stream_content_type: "text/vnd.turbo-stream.html".to_owned(),
		}
	}
}

impl Config {
	/// The opt-in marker. Its value optionally limits tracking to some animation kinds.
	#[must_use]
	pub fn animate_attribute(&self) -> &str {
		&self.animate_attribute
	}

	#[must_use]
	pub fn protection_attribute(&self) -> &str {
		&self.protection_attribute
	}

	#[must_use]
	pub fn version_attribute(&self) -> &str {
		&self.version_attribute
	}

	/// Name of the attribute overriding the class applied for `kind`, i.e. `data-turbo-refresh-enter`.
	#[must_use]
	pub fn class_attribute(&self, kind: AnimationKind) -> String {
		format!("{}{}", self.kind_attribute_prefix, kind.as_str())
	}

	/// Name of the attribute whose presence disables `kind`, i.e. `data-turbo-refresh-enter-off`.
	#[must_use]
	pub fn disable_attribute(&self, kind: AnimationKind) -> String {
		format!("{}{}-off", self.kind_attribute_prefix, kind.as_str())
	}

	#[must_use]
	pub fn default_class(&self, kind: AnimationKind) -> &str {
		&self.default_classes[kind as usize]
	}

	/// How long a click inside a protected element stays eligible to be matched to the next visit.
	#[must_use]
	pub fn visit_initiator_window_ms(&self) -> f64 {
		self.visit_initiator_window_ms
	}

	/// Added to a computed animation duration before the completion timeout fires.
	#[must_use]
	pub fn timeout_margin_ms(&self) -> f64 {
		self.timeout_margin_ms
	}

	/// Upper bound for animations that never end on their own (`infinite` iteration count).
	#[must_use]
	pub fn fallback_wait_ms(&self) -> f64 {
		self.fallback_wait_ms
	}

	#[must_use]
	pub fn stream_content_type(&self) -> &str {
		&self.stream_content_type
	}

	/// Whether a response with `content_type` only patches parts of the page instead of rendering it.
	#[must_use]
	pub fn is_stream_response(&self, content_type: &str) -> bool {
		content_type.trim_start().to_ascii_lowercase().starts_with(&self.stream_content_type.to_ascii_lowercase())
	}

	#[must_use]
	pub fn with_animate_attribute(mut self, name: impl Into<String>) -> Self {
		self.animate_attribute = name.into();
		self
	}

	#[must_use]
	pub fn with_protection_attribute(mut self, name: impl Into<String>) -> Self {
		self.protection_attribute = name.into();
		self
	}

	#[must_use]
	pub fn with_version_attribute(mut self, name: impl Into<String>) -> Self {
		self.version_attribute = name.into();
		self
	}

	/// Replaces the `data-turbo-refresh-` prefix of the per-kind class and disable attributes.
	#[must_use]
	pub fn with_kind_attribute_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.kind_attribute_prefix = prefix.into();
		self
	}

	#[must_use]
	pub fn with_default_class(mut self, kind: AnimationKind, class: impl Into<String>) -> Self {
		self.default_classes[kind as usize] = class.into();
		self
	}

	#[must_use]
	pub fn with_visit_initiator_window_ms(mut self, window_ms: f64) -> Self {
		self.visit_initiator_window_ms = window_ms;
		self
	}

	#[must_use]
	pub fn with_timeout_margin_ms(mut self, margin_ms: f64) -> Self {
		self.timeout_margin_ms = margin_ms;
		self
	}

	#[must_use]
	pub fn with_fallback_wait_ms(mut self, fallback_ms: f64) -> Self {
		self.fallback_wait_ms = fallback_ms;
		self
	}

	#[must_use]
	pub fn with_stream_content_type(mut self, content_type: impl Into<String>) -> Self {
		self.stream_content_type = content_type.into();
		self
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn kind_attributes_follow_prefix() {
		let config = Config::default();
		assert_eq!(config.class_attribute(AnimationKind::Enter), "data-turbo-refresh-enter");
		assert_eq!(config.disable_attribute(AnimationKind::Exit), "data-turbo-refresh-exit-off");

		let config = config.with_kind_attribute_prefix("data-fx-");
		assert_eq!(config.class_attribute(AnimationKind::Change), "data-fx-change");
	}

	#[test]
	fn default_classes_are_per_kind() {
		let config = Config::default().with_default_class(AnimationKind::Change, "flash");
		assert_eq!(config.default_class(AnimationKind::Enter), "turbo-refresh-enter");
		assert_eq!(config.default_class(AnimationKind::Change), "flash");
		assert_eq!(config.default_class(AnimationKind::Exit), "turbo-refresh-exit");
	}

	#[test]
	fn stream_responses_match_by_prefix() {
		let config = Config::default();
		assert!(config.is_stream_response("text/vnd.turbo-stream.html; charset=utf-8"));
		assert!(config.is_stream_response("Text/VND.turbo-stream.HTML"));
		assert!(!config.is_stream_response("text/html; charset=utf-8"));
		assert!(!config.is_stream_response(""));
	}
}
