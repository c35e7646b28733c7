//! The attribute contract: which elements take part, and how.

use crate::{animation::AnimationKind, config::Config, signature::Signature};
use tracing::{error, warn};
use wasm_bindgen::JsCast;
use web_sys::Element;

/// Per-kind enablement and the class to apply for each enabled kind.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AnimationSettings {
	classes: [Option<String>; 3],
}

impl AnimationSettings {
	/// Evaluates the attribute contract through `attribute`, which returns an attribute's value if present.
	pub fn from_attributes(config: &Config, attribute: impl Fn(&str) -> Option<String>) -> Self {
		let marker = match attribute(config.animate_attribute()) {
			Some(marker) => marker,
			None => return Self::default(),
		};

		let mut enabled = [marker.trim().is_empty(); 3];
		for token in marker.split(|c: char| c == ',' || c.is_whitespace()).filter(|token| !token.is_empty()) {
			match AnimationKind::from_token(token) {
				Some(kind) => enabled[kind as usize] = true,
				None => warn!("Ignoring unknown animation kind {:?} in `{}`.", token, config.animate_attribute()),
			}
		}

		let mut settings = Self::default();
		for kind in AnimationKind::ALL {
			if !enabled[kind as usize] || attribute(&config.disable_attribute(kind)).is_some() {
				continue;
			}
			let class = attribute(&config.class_attribute(kind))
				.map(|class| class.trim().to_owned())
				.filter(|class| !class.is_empty())
				.unwrap_or_else(|| config.default_class(kind).to_owned());
			settings.classes[kind as usize] = Some(class);
		}
		settings
	}

	/// The class to apply for `kind`, or [`None`] if `kind` is disabled for this element.
	#[must_use]
	pub fn class(&self, kind: AnimationKind) -> Option<&str> {
		self.classes[kind as usize].as_deref()
	}

	#[must_use]
	pub fn is_enabled(&self, kind: AnimationKind) -> bool {
		self.class(kind).is_some()
	}
}

/// An element opted into animation detection, with its required `id`.
#[derive(Debug, Clone)]
pub struct TrackedElement {
	pub id: String,
	pub element: Element,
	pub settings: AnimationSettings,
}

impl TrackedElement {
	/// [`None`] unless `element` carries the opt-in marker and a non-empty `id`.
	#[must_use]
	pub fn new(element: &Element, config: &Config) -> Option<Self> {
		if !element.has_attribute(config.animate_attribute()) {
			return None;
		}
		let id = element.id();
		if id.is_empty() {
			warn!("Skipping <{}> marked with `{}` but without an `id`.", element.tag_name().to_ascii_lowercase(), config.animate_attribute());
			return None;
		}
		Some(Self {
			id,
			element: element.clone(),
			settings: AnimationSettings::from_attributes(config, |name| element.get_attribute(name)),
		})
	}

	#[must_use]
	pub fn signature(&self, config: &Config) -> Signature {
		Signature::of(&self.element, config.version_attribute())
	}

	#[must_use]
	pub fn is_protected(&self, config: &Config) -> bool {
		self.element.has_attribute(config.protection_attribute())
	}
}

/// Every tracked element at or below `root`, in document order.
#[must_use]
pub fn collect(root: &Element, config: &Config) -> Vec<TrackedElement> {
	query(root, &format!("[{}]", config.animate_attribute()))
		.iter()
		.filter_map(|element| TrackedElement::new(element, config))
		.collect()
}

/// Every element at or below `root` matching `selector`, in document order.
///
/// A failed query is logged and yields nothing.
#[must_use]
pub fn query(root: &Element, selector: &str) -> Vec<Element> {
	let mut elements = Vec::new();
	if root.matches(selector).unwrap_or(false) {
		elements.push(root.clone());
	}
	match root.query_selector_all(selector) {
		Ok(nodes) => elements.extend((0..nodes.length()).filter_map(|i| nodes.item(i)).filter_map(|node| node.dyn_into::<Element>().ok())),
		Err(error) => error!("Failed to query {:?}: {:?}", selector, error),
	}
	elements
}

/// The closest element at or above `element` that carries the protection marker and a non-empty `id`.
#[must_use]
pub fn protected_ancestor(element: &Element, config: &Config) -> Option<Element> {
	let selector = format!("[{}][id]:not([id=\"\"])", config.protection_attribute());
	match element.closest(&selector) {
		Ok(ancestor) => ancestor,
		Err(error) => {
			error!("Failed to look up protected ancestor: {:?}", error);
			None
		}
	}
}

#[must_use]
pub fn protected_ancestor_id(element: &Element, config: &Config) -> Option<String> {
	protected_ancestor(element, config).map(|ancestor| ancestor.id())
}
