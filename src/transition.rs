//! State scoped to a single DOM replacement, and the comparisons made on it.

use crate::{animation::AnimationKind, classifier::Classification, signature::Signature};
use hashbrown::{HashMap, HashSet};

/// Created when a render is about to happen and dropped once it committed.
#[derive(Debug, Clone, Default)]
pub struct TransitionContext {
	classification: Classification,
	before: HashMap<String, Signature>,
	exiting: HashSet<String>,
	protected_updates: HashSet<String>,
	animated: HashSet<String>,
}

impl TransitionContext {
	#[must_use]
	pub fn new(classification: Classification) -> Self {
		Self {
			classification,
			..Self::default()
		}
	}

	#[must_use]
	pub fn is_refresh(&self) -> bool {
		self.classification.refresh
	}

	/// Whether `id` is the protected element whose own submission or click caused this transition.
	#[must_use]
	pub fn is_initiator(&self, id: &str) -> bool {
		self.classification.submission_initiator.as_deref() == Some(id) || self.classification.visit_initiator.as_deref() == Some(id)
	}

	pub fn record_before(&mut self, id: String, signature: Signature) {
		self.before.insert(id, signature);
	}

	#[must_use]
	pub fn before(&self, id: &str) -> Option<&Signature> {
		self.before.get(id)
	}

	#[must_use]
	pub fn before_count(&self) -> usize {
		self.before.len()
	}

	pub fn mark_exiting(&mut self, id: String) {
		self.exiting.insert(id);
	}

	/// Whether `id` was already removed by its exit animation.
	#[must_use]
	pub fn is_exiting(&self, id: &str) -> bool {
		self.exiting.contains(id)
	}

	pub fn mark_protected_update(&mut self, id: String) {
		self.protected_updates.insert(id);
	}

	#[must_use]
	pub fn is_protected_update(&self, id: &str) -> bool {
		self.protected_updates.contains(id)
	}

	/// Returns `false` if `id` was already animated during this transition.
	pub fn mark_animated(&mut self, id: &str) -> bool {
		self.animated.insert(id.to_owned())
	}
}

/// Which animation a surviving element gets after the replacement committed.
#[must_use]
pub fn after_replace_kind(before: Option<&Signature>, current: &Signature) -> Option<AnimationKind> {
	match before {
		None => Some(AnimationKind::Enter),
		Some(before) if before != current => Some(AnimationKind::Change),
		Some(_) => None,
	}
}

/// Whether a protected element's version token changed. A missing token on either side is no signal.
#[must_use]
pub fn version_changed(current: Option<&str>, incoming: Option<&str>) -> bool {
	match (current, incoming) {
		(Some(current), Some(incoming)) => current != incoming,
		_ => false,
	}
}

/// Drops every item contained in another item, keeping the outermost ones in their original order.
pub fn top_level_only<T>(items: Vec<T>, contains: impl Fn(&T, &T) -> bool) -> Vec<T> {
	let keep: Vec<bool> = items
		.iter()
		.enumerate()
		.map(|(i, item)| !items.iter().enumerate().any(|(j, other)| i != j && contains(other, item)))
		.collect();
	items.into_iter().zip(keep).filter_map(|(item, keep)| if keep { Some(item) } else { None }).collect()
}
