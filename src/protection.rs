//! Keeping protected elements (usually forms with unsaved input) out of refresh morphs.

use crate::transition::TransitionContext;
use tracing::trace;

/// Whether an element about to be replaced must be left untouched.
///
/// `id` is [`None`] for elements without the protection marker or without an `id`.
/// The initiator of the transition is always let through, and nothing is protected outside of refreshes.
#[must_use]
pub fn should_protect(id: Option<&str>, context: &TransitionContext) -> bool {
	let id = match id {
		Some(id) => id,
		None => return false,
	};
	if context.is_initiator(id) {
		trace!(id, "Letting initiator through.");
		return false;
	}
	context.is_refresh()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::classifier::Classification;

	fn context(refresh: bool, submission_initiator: Option<&str>) -> TransitionContext {
		TransitionContext::new(Classification {
			refresh,
			submission_initiator: submission_initiator.map(str::to_owned),
			visit_initiator: None,
		})
	}

	#[test]
	fn unprotected_elements_are_never_protected() {
		assert!(!should_protect(None, &context(true, None)));
	}

	#[test]
	fn protected_during_refresh() {
		assert!(should_protect(Some("new-item-form"), &context(true, None)));
	}

	#[test]
	fn not_protected_during_navigation() {
		assert!(!should_protect(Some("new-item-form"), &context(false, None)));
	}

	#[test]
	fn initiator_is_let_through() {
		assert!(!should_protect(Some("new-item-form"), &context(true, Some("new-item-form"))));
		assert!(should_protect(Some("todo-3"), &context(true, Some("new-item-form"))));
	}
}
