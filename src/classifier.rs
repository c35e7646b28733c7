//! Telling server-pushed refreshes of the current page apart from navigation.
//!
//! A transition counts as a refresh iff the visit that caused it replaces the current history entry
//! and targets the same path as the last rendered location. Query strings and fragments are ignored.
//!
//! Alongside that decision, two initiators are tracked so the user's own action is never blocked:
//! the protected element wrapping the form being submitted, and the protected element wrapping the
//! control that was clicked right before a visit started.

use crate::config::Config;
use tracing::{debug, trace, warn};
use url::Url;

/// Turbo's visit actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitAction {
	Advance,
	Replace,
	Restore,
}

impl VisitAction {
	/// [`None`] for anything Turbo doesn't define.
	#[must_use]
	pub fn parse(action: &str) -> Option<Self> {
		match action {
			"advance" => Some(Self::Advance),
			"replace" => Some(Self::Replace),
			"restore" => Some(Self::Restore),
			_ => None,
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
struct PendingInitiator {
	id: String,
	at_ms: f64,
}

#[derive(Debug, Clone, PartialEq)]
struct PendingVisit {
	url: String,
	action: VisitAction,
}

/// What a finished form submission's response says about the page.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubmissionResponse {
	pub content_type: Option<String>,
	/// A 2xx status.
	pub succeeded: bool,
	pub redirected: bool,
}

impl SubmissionResponse {
	/// Whether a page render is going to follow.
	///
	/// Successful responses only lead to a visit through a redirect. Failed ones are rendered in place.
	/// Stream responses patch the page without rendering it.
	#[must_use]
	pub fn will_render(&self, config: &Config) -> bool {
		let stream = self.content_type.as_deref().map_or(false, |content_type| config.is_stream_response(content_type));
		!stream && (self.redirected || !self.succeeded)
	}
}

/// The classifier's verdict for one transition.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Classification {
	pub refresh: bool,
	pub submission_initiator: Option<String>,
	pub visit_initiator: Option<String>,
}

/// Trackers that outlive individual transitions, for one page session.
#[derive(Debug, Clone)]
pub struct RefreshClassifier {
	visit_initiator_window_ms: f64,
	last_rendered: Option<String>,
	pending_click: Option<PendingInitiator>,
	pending_visit: Option<PendingVisit>,
	active_visit_initiator: Option<String>,
	active_submission_initiator: Option<String>,
}

impl RefreshClassifier {
	#[must_use]
	pub fn new(config: &Config) -> Self {
		Self {
			visit_initiator_window_ms: config.visit_initiator_window_ms(),
			last_rendered: None,
			pending_click: None,
			pending_visit: None,
			active_visit_initiator: None,
			active_submission_initiator: None,
		}
	}

	/// A click landed inside the protected element `id` at `now_ms`.
	pub fn record_click(&mut self, id: String, now_ms: f64) {
		trace!(id = id.as_str(), "Recorded click inside protected element.");
		self.pending_click = Some(PendingInitiator { id, at_ms: now_ms });
	}

	/// A visit to `url` started at `now_ms`.
	///
	/// A sufficiently recent click becomes this transition's visit initiator; a stale one is forgotten.
	pub fn visit_started(&mut self, url: &str, action: VisitAction, now_ms: f64) {
		self.pending_visit = Some(PendingVisit { url: url.to_owned(), action });
		self.active_visit_initiator = match self.pending_click.take() {
			Some(click) if now_ms - click.at_ms <= self.visit_initiator_window_ms => {
				debug!(id = click.id.as_str(), "Visit initiated from protected element.");
				Some(click.id)
			}
			Some(click) => {
				trace!(id = click.id.as_str(), age_ms = now_ms - click.at_ms, "Discarding stale click.");
				None
			}
			None => None,
		};
	}

	/// A form inside the protected element `initiator` (if any) is being submitted.
	pub fn submission_started(&mut self, initiator: Option<String>) {
		if let Some(id) = &initiator {
			debug!(id = id.as_str(), "Submission initiated from protected element.");
		}
		self.active_submission_initiator = initiator;
	}

	/// The submission finished with `response`, or [`None`] if the request failed outright.
	///
	/// Unless a render follows, the submission ends here and releases its initiator.
	pub fn submission_ended(&mut self, response: Option<&SubmissionResponse>, config: &Config) {
		if !response.map_or(false, |response| response.will_render(config)) {
			trace!("No render follows. Releasing submission initiator.");
			self.active_submission_initiator = None;
		}
	}

	/// Decides whether the transition about to render is a refresh. Consumes the pending visit.
	pub fn classify(&mut self) -> Classification {
		let visit = self.pending_visit.take();
		let refresh = match (&visit, &self.last_rendered) {
			(Some(visit), Some(last_rendered)) => visit.action == VisitAction::Replace && same_path(&visit.url, last_rendered),
			_ => false,
		};
		debug!(refresh, action = ?visit.as_ref().map(|visit| visit.action), "Classified transition.");
		Classification {
			refresh,
			submission_initiator: self.active_submission_initiator.clone(),
			visit_initiator: self.active_visit_initiator.clone(),
		}
	}

	/// A render committed at `location`.
	pub fn rendered(&mut self, location: &str) {
		self.last_rendered = Some(location.to_owned());
	}

	/// Releases both initiators. Called once a transition has settled.
	pub fn end_transition(&mut self) {
		self.active_submission_initiator = None;
		self.active_visit_initiator = None;
	}

	#[must_use]
	pub fn last_rendered(&self) -> Option<&str> {
		self.last_rendered.as_deref()
	}

	#[must_use]
	pub fn active_submission_initiator(&self) -> Option<&str> {
		self.active_submission_initiator.as_deref()
	}

	#[must_use]
	pub fn active_visit_initiator(&self) -> Option<&str> {
		self.active_visit_initiator.as_deref()
	}

	#[must_use]
	pub fn is_active_initiator(&self, id: &str) -> bool {
		self.active_submission_initiator() == Some(id) || self.active_visit_initiator() == Some(id)
	}
}

/// Whether `a` and `b` are absolute URLs on the same origin with the same path.
///
/// A trailing slash doesn't matter. Unparseable URLs never match.
#[must_use]
pub fn same_path(a: &str, b: &str) -> bool {
	match (Url::parse(a), Url::parse(b)) {
		(Ok(a), Ok(b)) => a.origin() == b.origin() && normalized_path(&a) == normalized_path(&b),
		(a, b) => {
			warn!(a_ok = a.is_ok(), b_ok = b.is_ok(), "Could not compare visit paths. Not treating as a refresh.");
			false
		}
	}
}

fn normalized_path(url: &Url) -> &str {
	let path = url.path().trim_end_matches('/');
	if path.is_empty() {
		"/"
	} else {
		path
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const BOARD: &str = "https://example.com/boards/1";

	fn classifier() -> RefreshClassifier {
		let mut classifier = RefreshClassifier::new(&Config::default());
		classifier.rendered(BOARD);
		classifier
	}

	#[test]
	fn paths_ignore_query_fragment_and_trailing_slash() {
		assert!(same_path("https://example.com/boards/1?page=2", "https://example.com/boards/1#top"));
		assert!(same_path("https://example.com/boards/1/", BOARD));
		assert!(same_path("https://example.com", "https://example.com/"));
		assert!(!same_path("https://example.com/boards/2", BOARD));
		assert!(!same_path("https://other.example/boards/1", BOARD));
	}

	#[test]
	fn unparseable_urls_never_match() {
		assert!(!same_path("/boards/1", BOARD));
		assert!(!same_path("", ""));
	}

	#[test]
	fn same_path_replace_is_a_refresh() {
		let mut classifier = classifier();
		classifier.visit_started("https://example.com/boards/1?sort=new", VisitAction::Replace, 0.0);
		assert!(classifier.classify().refresh);
	}

	#[test]
	fn navigation_is_not_a_refresh() {
		let mut classifier = classifier();
		classifier.visit_started("https://example.com/boards/2", VisitAction::Replace, 0.0);
		assert!(!classifier.classify().refresh);

		classifier.visit_started(BOARD, VisitAction::Advance, 0.0);
		assert!(!classifier.classify().refresh);
	}

	#[test]
	fn no_visit_means_no_refresh() {
		let mut classifier = classifier();
		assert!(!classifier.classify().refresh);

		classifier.visit_started(BOARD, VisitAction::Replace, 0.0);
		assert!(classifier.classify().refresh);
		// The visit is consumed.
		assert!(!classifier.classify().refresh);
	}

	#[test]
	fn nothing_rendered_yet_is_not_a_refresh() {
		let mut classifier = RefreshClassifier::new(&Config::default());
		classifier.visit_started(BOARD, VisitAction::Replace, 0.0);
		assert!(!classifier.classify().refresh);
	}

	#[test]
	fn fresh_click_becomes_visit_initiator() {
		let mut classifier = classifier();
		classifier.record_click("new-item-form".to_owned(), 1000.0);
		classifier.visit_started(BOARD, VisitAction::Replace, 2500.0);
		let classification = classifier.classify();
		assert!(classification.refresh);
		assert_eq!(classification.visit_initiator.as_deref(), Some("new-item-form"));

		classifier.end_transition();
		assert_eq!(classifier.active_visit_initiator(), None);
	}

	#[test]
	fn stale_click_is_discarded() {
		let mut classifier = classifier();
		classifier.record_click("new-item-form".to_owned(), 1000.0);
		classifier.visit_started(BOARD, VisitAction::Replace, 3001.0);
		assert_eq!(classifier.classify().visit_initiator, None);

		// Also gone for the next visit.
		classifier.visit_started(BOARD, VisitAction::Replace, 3002.0);
		assert_eq!(classifier.classify().visit_initiator, None);
	}

	fn response(content_type: &str, succeeded: bool, redirected: bool) -> SubmissionResponse {
		SubmissionResponse {
			content_type: Some(content_type.to_owned()),
			succeeded,
			redirected,
		}
	}

	#[test]
	fn submission_initiator_lasts_until_the_transition_ends() {
		let config = Config::default();
		let mut classifier = classifier();
		classifier.submission_started(Some("new-item-form".to_owned()));
		classifier.submission_ended(Some(&response("text/html; charset=utf-8", true, true)), &config);
		classifier.visit_started(BOARD, VisitAction::Replace, 0.0);
		assert_eq!(classifier.classify().submission_initiator.as_deref(), Some("new-item-form"));

		classifier.end_transition();
		assert_eq!(classifier.active_submission_initiator(), None);
	}

	#[test]
	fn stream_response_releases_submission_initiator() {
		let config = Config::default();
		let mut classifier = classifier();
		classifier.submission_started(Some("new-item-form".to_owned()));
		classifier.submission_ended(Some(&response("text/vnd.turbo-stream.html; charset=utf-8", true, false)), &config);
		assert_eq!(classifier.active_submission_initiator(), None);
	}

	#[test]
	fn submission_without_render_releases_initiator() {
		let config = Config::default();
		let mut classifier = classifier();
		// 204 No Content.
		classifier.submission_started(Some("new-item-form".to_owned()));
		classifier.submission_ended(Some(&SubmissionResponse {
			content_type: None,
			succeeded: true,
			redirected: false,
		}), &config);
		assert_eq!(classifier.active_submission_initiator(), None);

		// Network failure.
		classifier.submission_started(Some("new-item-form".to_owned()));
		classifier.submission_ended(None, &config);
		assert_eq!(classifier.active_submission_initiator(), None);
	}

	#[test]
	fn rejected_submission_keeps_initiator_for_its_render() {
		let config = Config::default();
		let mut classifier = classifier();
		classifier.submission_started(Some("new-item-form".to_owned()));
		classifier.submission_ended(Some(&response("text/html", false, false)), &config);
		assert_eq!(classifier.active_submission_initiator(), Some("new-item-form"));
	}

	#[test]
	fn visit_actions() {
		assert_eq!(VisitAction::parse("replace"), Some(VisitAction::Replace));
		assert_eq!(VisitAction::parse("advance"), Some(VisitAction::Advance));
		assert_eq!(VisitAction::parse("restore"), Some(VisitAction::Restore));
		assert_eq!(VisitAction::parse("REPLACE"), None);
	}
}
