//! The per-transition state machine tying detection, protection and animation together.
//!
//! ```text
//! Idle/Settled ──before_render──▶ AwaitingReplace ──exits_settled──▶ Replacing ──render_committed──▶ Settled
//!                                 (skipped if nothing exits)         before_replace_element…
//! ```
//!
//! The host calls the methods below in lifecycle order. [`crate::turbo`] does so for Turbo.
//!
//! Turbo never morphs elements that carry its own permanence marker, and doesn't ask about them either.
//! So while an initiator is active, the marker is lifted off its wrapper and put back once the
//! initiator is released. Protected elements whose version changed are animated during detection.

use crate::{
	animation::{AnimationKind, Animator},
	classifier::{RefreshClassifier, SubmissionResponse, VisitAction},
	config::Config,
	protection::should_protect,
	tracked::{self, protected_ancestor, protected_ancestor_id, TrackedElement},
	transition::{after_replace_kind, top_level_only, version_changed, TransitionContext},
};
use futures::future::{join_all, FutureExt, LocalBoxFuture};
use hashbrown::HashMap;
use std::rc::Rc;
use tracing::{debug, error, instrument, trace, trace_span, warn};
use web_sys::Element;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
	/// No transition since the session started or the page was cached.
	Idle,
	/// A render was announced. Exit animations may be holding it.
	AwaitingReplace,
	/// The host is replacing elements.
	Replacing,
	/// The last render committed and its animations were started.
	Settled,
}

/// Whether the host may structurally replace an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceDecision {
	Proceed,
	/// Leave the element and its subtree exactly as they are.
	Veto,
}

/// Exit animations started by [`Orchestrator::before_render`].
///
/// The render must be held until [`ExitPlan::run`] completes.
#[must_use = "Exiting elements are only removed by `ExitPlan::run`."]
pub struct ExitPlan {
	elements: Vec<Element>,
	animations: Vec<LocalBoxFuture<'static, ()>>,
}

impl ExitPlan {
	fn new() -> Self {
		Self {
			elements: Vec::new(),
			animations: Vec::new(),
		}
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.elements.is_empty()
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.elements.len()
	}

	/// Waits for every exit animation, then removes the exiting elements.
	pub async fn run(self) {
		let Self { elements, animations } = self;
		join_all(animations).await;
		for element in elements {
			element.remove();
		}
		trace!("Exiting elements removed.");
	}
}

impl core::fmt::Debug for ExitPlan {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("ExitPlan").field("len", &self.len()).finish_non_exhaustive()
	}
}

/// A protection marker taken off an initiator's wrapper.
#[derive(Debug)]
struct LiftedMarker {
	id: String,
	element: Element,
	value: String,
}

/// One page session's refresh animation engine.
#[derive(Debug)]
pub struct Orchestrator {
	config: Rc<Config>,
	classifier: RefreshClassifier,
	animator: Animator,
	phase: Phase,
	transition: Option<TransitionContext>,
	clicked: Option<Element>,
	lifted: Vec<LiftedMarker>,
}

impl Orchestrator {
	#[must_use]
	pub fn new(config: Config) -> Self {
		let config = Rc::new(config);
		Self {
			classifier: RefreshClassifier::new(&config),
			animator: Animator::new(Rc::clone(&config)),
			config,
			phase: Phase::Idle,
			transition: None,
			clicked: None,
			lifted: Vec::new(),
		}
	}

	#[must_use]
	pub fn config(&self) -> &Config {
		&self.config
	}

	#[must_use]
	pub fn animator(&self) -> &Animator {
		&self.animator
	}

	#[must_use]
	pub fn classifier(&self) -> &RefreshClassifier {
		&self.classifier
	}

	#[must_use]
	pub fn phase(&self) -> Phase {
		self.phase
	}

	#[must_use]
	pub fn transition(&self) -> Option<&TransitionContext> {
		self.transition.as_ref()
	}

	/// The page at `location` finished loading without a transition (initial load, or after one).
	pub fn loaded(&mut self, location: &str) {
		self.classifier.rendered(location);
	}

	/// The user clicked `target` at `now_ms`.
	pub fn record_click(&mut self, target: &Element, now_ms: f64) {
		if let Some(ancestor) = protected_ancestor(target, &self.config) {
			self.classifier.record_click(ancestor.id(), now_ms);
			self.clicked = Some(ancestor);
		}
	}

	/// A visit to `url` started. A click promoted to visit initiator loses its wrapper's protection marker.
	pub fn visit_started(&mut self, url: &str, action: VisitAction, now_ms: f64) {
		self.classifier.visit_started(url, action, now_ms);
		self.restore_released_markers();
		if let Some(clicked) = self.clicked.take() {
			if self.classifier.active_visit_initiator() == Some(clicked.id().as_str()) {
				self.lift_marker(clicked);
			}
		}
	}

	/// `form` is being submitted. Its protected wrapper, if any, loses the protection marker.
	pub fn submission_started(&mut self, form: &Element) {
		let ancestor = protected_ancestor(form, &self.config);
		self.classifier.submission_started(ancestor.as_ref().map(Element::id));
		self.restore_released_markers();
		if let Some(ancestor) = ancestor {
			self.lift_marker(ancestor);
		}
	}

	/// The submission finished with `response`, or [`None`] if the request failed outright.
	pub fn submission_ended(&mut self, response: Option<&SubmissionResponse>) {
		self.classifier.submission_ended(response, &self.config);
		self.restore_released_markers();
	}

	/// Whether `element` currently has its protection marker lifted.
	#[must_use]
	pub fn is_marker_lifted(&self, element: &Element) -> bool {
		self.lifted.iter().any(|lifted| &lifted.element == element)
	}

	fn lift_marker(&mut self, element: Element) {
		let attribute = self.config.protection_attribute();
		let value = match element.get_attribute(attribute) {
			Some(value) => value,
			None => return,
		};
		if let Err(error) = element.remove_attribute(attribute) {
			return error!("Failed to lift protection marker: {:?}", error);
		}
		let id = element.id();
		debug!(id = id.as_str(), "Lifted protection marker off initiator.");
		self.lifted.push(LiftedMarker { id, element, value });
	}

	/// Puts the protection marker back on every wrapper that is no longer an active initiator.
	fn restore_released_markers(&mut self) {
		let classifier = &self.classifier;
		let attribute = self.config.protection_attribute();
		self.lifted.retain(|lifted| {
			if classifier.is_active_initiator(&lifted.id) {
				return true;
			}
			if !lifted.element.has_attribute(attribute) {
				if let Err(error) = lifted.element.set_attribute(attribute, &lifted.value) {
					error!("Failed to restore protection marker: {:?}", error);
				}
			}
			trace!(id = lifted.id.as_str(), "Restored protection marker.");
			false
		});
	}

	/// A new document is about to replace `live_root`'s content with `incoming`'s.
	///
	/// For refreshes, this records every tracked element's signature, flags protected elements
	/// whose version token changes, and starts exit animations for departing elements.
	/// If the returned plan isn't empty, the host must hold the render until it [ran](`ExitPlan::run`)
	/// and then call [`Orchestrator::exits_settled`].
	#[instrument(skip_all)]
	pub fn before_render(&mut self, live_root: &Element, incoming: &Element) -> ExitPlan {
		if self.transition.is_some() {
			warn!("The previous transition never committed. Discarding it.");
		}
		let mut context = TransitionContext::new(self.classifier.classify());
		let mut plan = ExitPlan::new();
		self.phase = Phase::AwaitingReplace;

		if context.is_refresh() {
			self.detect(&mut context, live_root, incoming, &mut plan);
		} else {
			debug!("Not a refresh. Skipping detection.");
		}

		if plan.is_empty() {
			self.phase = Phase::Replacing;
		}
		self.transition = Some(context);
		plan
	}

	fn detect(&self, context: &mut TransitionContext, live_root: &Element, incoming: &Element, plan: &mut ExitPlan) {
		let config = &*self.config;
		let current = tracked::collect(live_root, config);
		let incoming_tracked = tracked::collect(incoming, config);
		let incoming: HashMap<&str, &TrackedElement> = incoming_tracked.iter().map(|tracked| (tracked.id.as_str(), tracked)).collect();

		for tracked in &current {
			let signature = tracked.signature(config);
			if cfg!(feature = "dangerous-logging") {
				trace!(id = tracked.id.as_str(), %signature, "Recorded signature.");
			}
			context.record_before(tracked.id.clone(), signature);
		}
		debug!("Recorded {} signature(s).", context.before_count());

		for tracked in current.iter().filter(|tracked| tracked.is_protected(config)) {
			let incoming_version = incoming
				.get(tracked.id.as_str())
				.and_then(|incoming| incoming.element.get_attribute(config.version_attribute()));
			let current_version = tracked.element.get_attribute(config.version_attribute());
			if version_changed(current_version.as_deref(), incoming_version.as_deref()) {
				debug!(id = tracked.id.as_str(), "Protected element has a new version.");
				context.mark_protected_update(tracked.id.clone());
				if should_protect(Some(tracked.id.as_str()), &*context) {
					animate_protected_update(&self.animator, context, tracked);
				}
			}
		}

		let departing: Vec<&TrackedElement> = current
			.iter()
			.filter(|tracked| !incoming.contains_key(tracked.id.as_str()))
			.filter(|tracked| tracked.settings.is_enabled(AnimationKind::Exit))
			// Kept by protection, either itself or through an ancestor.
			.filter(|tracked| !should_protect(protected_ancestor_id(&tracked.element, config).as_deref(), &*context))
			.collect();
		let departing = top_level_only(departing, |outer, inner| outer.element.contains(Some(inner.element.as_ref())));

		for tracked in departing {
			let span = trace_span!("Exiting", id = tracked.id.as_str());
			let _enter = span.enter();
			let class = match tracked.settings.class(AnimationKind::Exit) {
				Some(class) => class,
				None => continue,
			};
			context.mark_exiting(tracked.id.clone());
			plan.animations.push(self.animator.exit(&tracked.element, class).boxed_local());
			plan.elements.push(tracked.element.clone());
		}
		debug!("Started {} exit animation(s).", plan.len());
	}

	/// The exit animations finished and the held render is about to resume.
	pub fn exits_settled(&mut self) {
		self.phase = Phase::Replacing;
	}

	/// The host is about to replace `element` (with `incoming`, or remove it if [`None`]).
	#[instrument(skip_all, fields(id = %element.id()))]
	pub fn before_replace_element(&mut self, element: &Element, incoming: Option<&Element>) -> ReplaceDecision {
		let context = match &mut self.transition {
			Some(context) => context,
			None => return ReplaceDecision::Proceed,
		};
		let id = element.id();
		if id.is_empty() {
			return ReplaceDecision::Proceed;
		}

		if incoming.is_none() && context.is_exiting(&id) {
			trace!("Already removed after its exit animation.");
			return ReplaceDecision::Veto;
		}

		let protected = element.has_attribute(self.config.protection_attribute());
		if !should_protect(if protected { Some(id.as_str()) } else { None }, context) {
			return ReplaceDecision::Proceed;
		}

		debug!("Protecting element.");
		if let Some(tracked) = TrackedElement::new(element, &self.config) {
			animate_protected_update(&self.animator, context, &tracked);
		}
		ReplaceDecision::Veto
	}

	/// The render committed. `live_root` now holds the new content and the page is at `location`.
	///
	/// Starts enter and change animations, then discards the transition.
	#[instrument(skip_all)]
	pub fn render_committed(&mut self, live_root: &Element, location: &str) {
		if let Some(mut context) = self.transition.take() {
			if context.is_refresh() {
				self.animate_survivors(&mut context, live_root);
			}
		} else {
			trace!("Render without announced transition.");
		}
		self.classifier.rendered(location);
		self.classifier.end_transition();
		self.restore_released_markers();
		self.phase = Phase::Settled;
	}

	fn animate_survivors(&self, context: &mut TransitionContext, live_root: &Element) {
		let config = &*self.config;
		let (mut entered, mut changed) = (0_usize, 0_usize);
		for tracked in tracked::collect(live_root, config) {
			let signature = tracked.signature(config);
			let kind = match after_replace_kind(context.before(&tracked.id), &signature) {
				Some(kind) => kind,
				None => continue,
			};
			let class = match tracked.settings.class(kind) {
				Some(class) => class,
				None => continue,
			};
			if !context.mark_animated(&tracked.id) {
				trace!(id = tracked.id.as_str(), "Already animated during this transition.");
				continue;
			}
			match kind {
				AnimationKind::Enter => entered += 1,
				_ => changed += 1,
			}
			self.animator.play(&tracked.id, &tracked.element, kind, class);
		}
		debug!(entered, changed, "Animated surviving elements.");
	}

	/// The page is about to be cached or left. Nothing may stay mid-animation in the snapshot.
	pub fn page_cached(&mut self) {
		self.animator.cancel_all();
		self.transition = None;
		self.phase = Phase::Idle;
	}
}

/// Plays the change animation of a protected element whose version changed, at most once per transition.
fn animate_protected_update(animator: &Animator, context: &mut TransitionContext, tracked: &TrackedElement) {
	if !context.is_protected_update(&tracked.id) {
		return;
	}
	if let Some(class) = tracked.settings.class(AnimationKind::Change) {
		if context.mark_animated(&tracked.id) {
			animator.play(&tracked.id, &tracked.element, AnimationKind::Change, class);
		}
	}
}
