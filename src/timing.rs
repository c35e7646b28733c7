//! How long an element's CSS animations and transitions run, and how many end events they fire.
//!
//! Computed style is read as plain strings ([`StyleTiming`]) and evaluated separately ([`Timing`]),
//! so the arithmetic follows CSS list matching: a shorter list of durations, delays or
//! iteration counts repeats to cover every named animation or transitioned property.

use crate::config::Config;
use hashbrown::HashSet;
use tracing::{error, trace};
use wasm_bindgen::JsValue;
use web_sys::Element;

/// The raw computed-style values relevant to timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleTiming {
	pub animation_name: String,
	pub animation_duration: String,
	pub animation_delay: String,
	pub animation_iteration_count: String,
	pub transition_property: String,
	pub transition_duration: String,
	pub transition_delay: String,
}

impl Default for StyleTiming {
	/// The CSS initial values: no animation, no transition.
	fn default() -> Self {
		Self {
			animation_name: "none".to_owned(),
			animation_duration: "0s".to_owned(),
			animation_delay: "0s".to_owned(),
			animation_iteration_count: "1".to_owned(),
			transition_property: "all".to_owned(),
			transition_duration: "0s".to_owned(),
			transition_delay: "0s".to_owned(),
		}
	}
}

impl StyleTiming {
	/// Reads `element`'s computed style.
	///
	/// # Errors
	///
	/// Iff there is no window or the browser refuses to compute the style.
	pub fn read(element: &Element) -> Result<Self, JsValue> {
		let window = web_sys::window().ok_or_else(|| JsValue::from_str("turbo-refresh-animations: No window."))?;
		let style = window
			.get_computed_style(element)?
			.ok_or_else(|| JsValue::from_str("turbo-refresh-animations: No computed style."))?;
		Ok(Self {
			animation_name: style.get_property_value("animation-name")?,
			animation_duration: style.get_property_value("animation-duration")?,
			animation_delay: style.get_property_value("animation-delay")?,
			animation_iteration_count: style.get_property_value("animation-iteration-count")?,
			transition_property: style.get_property_value("transition-property")?,
			transition_duration: style.get_property_value("transition-duration")?,
			transition_delay: style.get_property_value("transition-delay")?,
		})
	}
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IterationCount {
	Finite(f64),
	Infinite,
}

impl IterationCount {
	/// The multiplier used for wait time. `infinite` counts as one pass.
	#[must_use]
	pub fn for_wait(self) -> f64 {
		match self {
			Self::Finite(count) => count,
			Self::Infinite => 1.0,
		}
	}

	#[must_use]
	pub fn is_positive(self) -> bool {
		match self {
			Self::Finite(count) => count > 0.0,
			Self::Infinite => true,
		}
	}
}

/// The evaluated completion contract of one element.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Timing {
	/// The longest `delay + duration * iterations` over all animations and transitions.
	pub max_wait_ms: f64,
	/// Distinct named animations that will each fire their own `animationend`.
	pub expected_animation_end_events: u32,
	/// Any running transition (`transitionend` can finish the wait if no animation end is expected).
	pub has_transitions: bool,
	/// An `infinite` animation is involved, so only events or the fallback ceiling end the wait.
	pub unbounded: bool,
}

impl Timing {
	/// Reads and evaluates `element`'s computed style.
	///
	/// Failures are logged and treated as "no animation", which resolves immediately.
	#[must_use]
	pub fn of(element: &Element) -> Self {
		match StyleTiming::read(element) {
			Ok(style) => Self::from_style(&style),
			Err(error) => {
				error!("Failed to read computed animation style: {:?}", error);
				Self::default()
			}
		}
	}

	#[must_use]
	pub fn from_style(style: &StyleTiming) -> Self {
		let mut timing = Self::default();

		let names = split_list(&style.animation_name);
		let durations = parse_time_list(&style.animation_duration);
		let delays = parse_time_list(&style.animation_delay);
		let iterations: Vec<_> = split_list(&style.animation_iteration_count).into_iter().map(parse_iteration_count).collect();

		let mut ending = HashSet::new();
		for (i, name) in names.iter().enumerate() {
			if name.is_empty() || name.eq_ignore_ascii_case("none") {
				continue;
			}
			let duration = cycle(&durations, i, 0.0);
			let delay = cycle(&delays, i, 0.0);
			let iterations = cycle(&iterations, i, IterationCount::Finite(1.0));

			timing.max_wait_ms = timing.max_wait_ms.max(delay + duration * iterations.for_wait());
			if duration > 0.0 && iterations.is_positive() {
				ending.insert(*name);
				timing.unbounded |= iterations == IterationCount::Infinite;
			}
		}
		timing.expected_animation_end_events = ending.len() as u32;

		let properties = split_list(&style.transition_property);
		let durations = parse_time_list(&style.transition_duration);
		let delays = parse_time_list(&style.transition_delay);
		for (i, property) in properties.iter().enumerate() {
			if property.is_empty() || property.eq_ignore_ascii_case("none") {
				continue;
			}
			let duration = cycle(&durations, i, 0.0);
			if duration <= 0.0 {
				continue;
			}
			timing.has_transitions = true;
			timing.max_wait_ms = timing.max_wait_ms.max(cycle(&delays, i, 0.0) + duration);
		}

		trace!(?timing, "Evaluated animation timing.");
		timing
	}

	/// Nothing to wait for: the caller must not register listeners or timers.
	#[must_use]
	pub fn is_instant(&self) -> bool {
		self.max_wait_ms <= 0.0 && self.expected_animation_end_events == 0
	}

	/// When to stop waiting for end events.
	#[must_use]
	pub fn timeout_ms(&self, config: &Config) -> f64 {
		let derived = self.max_wait_ms + config.timeout_margin_ms();
		if self.unbounded {
			derived.max(config.fallback_wait_ms())
		} else {
			derived
		}
	}
}

/// Parses one CSS `<time>` into milliseconds. Anything unparseable is `0`.
#[must_use]
pub fn parse_time_ms(value: &str) -> f64 {
	let value = value.trim();
	let parsed = if let Some(ms) = strip_suffix_ignore_ascii_case(value, "ms") {
		ms.trim().parse::<f64>().ok()
	} else if let Some(s) = strip_suffix_ignore_ascii_case(value, "s") {
		s.trim().parse::<f64>().ok().map(|s| s * 1000.0)
	} else {
		None
	};
	parsed.filter(|ms| ms.is_finite()).unwrap_or(0.0)
}

#[must_use]
pub fn parse_time_list(value: &str) -> Vec<f64> {
	split_list(value).into_iter().map(parse_time_ms).collect()
}

/// Parses one `animation-iteration-count` entry. Invalid values fall back to the initial `1`.
#[must_use]
pub fn parse_iteration_count(value: &str) -> IterationCount {
	let value = value.trim();
	if value.eq_ignore_ascii_case("infinite") {
		return IterationCount::Infinite;
	}
	match value.parse::<f64>() {
		Ok(count) if count.is_finite() && count >= 0.0 => IterationCount::Finite(count),
		_ => IterationCount::Finite(1.0),
	}
}

fn split_list(value: &str) -> Vec<&str> {
	if value.trim().is_empty() {
		return Vec::new();
	}
	value.split(',').map(str::trim).collect()
}

fn cycle<T: Copy>(values: &[T], i: usize, fallback: T) -> T {
	if values.is_empty() {
		fallback
	} else {
		values[i % values.len()]
	}
}

fn strip_suffix_ignore_ascii_case<'a>(value: &'a str, suffix: &str) -> Option<&'a str> {
	let split = value.len().checked_sub(suffix.len())?;
	if value.is_char_boundary(split) && value[split..].eq_ignore_ascii_case(suffix) {
		Some(&value[..split])
	} else {
		None
	}
}
