//! Applying animation classes and waiting for them to finish.
//!
//! Each (element id, [`AnimationKind`]) pair has at most one outstanding record.
//! Re-triggering a kind restarts it: the class is removed, a reflow is forced, the class is re-added
//! and the completion wait starts over. A browser would otherwise ignore the already-present class.

use crate::{config::Config, listener::EventListener, timing::Timing};
use core::future::Future;
use futures::{
	channel::mpsc,
	future::{AbortHandle, Abortable},
	pin_mut, select, FutureExt, StreamExt,
};
use gloo_timers::future::TimeoutFuture;
use hashbrown::HashMap;
use std::{cell::RefCell, rc::Rc};
use tracing::{debug, error, trace, trace_span};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::spawn_local;
use web_sys::{Element, Event, EventTarget, HtmlElement};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnimationKind {
	Enter = 0,
	Change = 1,
	Exit = 2,
}

impl AnimationKind {
	pub const ALL: [Self; 3] = [Self::Enter, Self::Change, Self::Exit];

	#[must_use]
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Enter => "enter",
			Self::Change => "change",
			Self::Exit => "exit",
		}
	}

	#[must_use]
	pub fn from_token(token: &str) -> Option<Self> {
		Self::ALL.iter().copied().find(|kind| kind.as_str().eq_ignore_ascii_case(token))
	}

	/// The kind that must not stay applied alongside this one. Enter and change exclude each other.
	#[must_use]
	pub fn exclusive_with(self) -> Option<Self> {
		match self {
			Self::Enter => Some(Self::Change),
			Self::Change => Some(Self::Enter),
			Self::Exit => None,
		}
	}
}

struct Record {
	element: Element,
	class: String,
	abort: AbortHandle,
}

/// Owner of the pending enter/change animations of one page session.
///
/// Cloning yields another handle to the same records.
#[derive(Clone)]
pub struct Animator {
	config: Rc<Config>,
	records: Rc<RefCell<HashMap<(String, AnimationKind), Record>>>,
}

impl core::fmt::Debug for Animator {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("Animator").field("pending", &self.records.borrow().len()).finish_non_exhaustive()
	}
}

impl Animator {
	#[must_use]
	pub fn new(config: Rc<Config>) -> Self {
		Self {
			config,
			records: Rc::default(),
		}
	}

	/// Applies `class` to `element` and removes it again once the animation completes.
	///
	/// Replaces any outstanding record for the same `id` and `kind`.
	/// A pending enter animation is cut short by a change animation and vice versa.
	pub fn play(&self, id: &str, element: &Element, kind: AnimationKind, class: &str) {
		let span = trace_span!("Playing", id, kind = kind.as_str(), class);
		let _enter = span.enter();

		let key = (id.to_owned(), kind);
		if let Some(exclusive) = kind.exclusive_with() {
			if self.abort(&(id.to_owned(), exclusive), class) {
				debug!(superseded = exclusive.as_str(), "Superseding pending animation.");
			}
		}
		if self.abort(&key, class) {
			debug!("Restarting pending animation.");
		}

		if let Err(error) = restart_class(element, class) {
			return error!("Failed to apply animation class: {:?}", error);
		}

		let timing = Timing::of(element);
		if timing.is_instant() {
			trace!("No animation or transition applies. Removing the class right away.");
			return remove_class(element, class);
		}

		let (abort, registration) = AbortHandle::new_pair();
		self.records.borrow_mut().insert(
			key.clone(),
			Record {
				element: element.clone(),
				class: class.to_owned(),
				abort,
			},
		);

		let records = Rc::clone(&self.records);
		let element = element.clone();
		let class = class.to_owned();
		let timeout_ms = timing.timeout_ms(&self.config);
		spawn_local(async move {
			if Abortable::new(settled(&element, timing, timeout_ms), registration).await.is_ok() {
				remove_class(&element, &class);
				records.borrow_mut().remove(&key);
				trace!(id = key.0.as_str(), kind = key.1.as_str(), "Animation finished.");
			}
		});
	}

	/// Applies the exit `class` to `element` right away and resolves once its animation completes.
	///
	/// The class stays applied; the caller removes the element.
	pub fn exit(&self, element: &Element, class: &str) -> impl Future<Output = ()> {
		let applied = match restart_class(element, class) {
			Ok(()) => true,
			Err(error) => {
				error!("Failed to apply exit class: {:?}", error);
				false
			}
		};
		let timing = Timing::of(element);
		let timeout_ms = timing.timeout_ms(&self.config);
		let element = element.clone();
		async move {
			if applied {
				settled(&element, timing, timeout_ms).await
			}
		}
	}

	/// Aborts the record at `key`, if any, and strips its class unless that is `keep_class`.
	fn abort(&self, key: &(String, AnimationKind), keep_class: &str) -> bool {
		let previous = self.records.borrow_mut().remove(key);
		match previous {
			Some(previous) => {
				previous.abort.abort();
				if previous.class != keep_class {
					remove_class(&previous.element, &previous.class);
				}
				true
			}
			None => false,
		}
	}

	#[must_use]
	pub fn is_pending(&self, id: &str, kind: AnimationKind) -> bool {
		self.records.borrow().contains_key(&(id.to_owned(), kind))
	}

	/// Cancels every outstanding wait and strips the classes it would have removed.
	pub fn cancel_all(&self) {
		let records: Vec<_> = self.records.borrow_mut().drain().collect();
		debug!("Cancelling {} pending animation(s).", records.len());
		for (_, record) in records {
			record.abort.abort();
			remove_class(&record.element, &record.class);
		}
	}
}

#[derive(Debug, Clone, Copy)]
enum Signal {
	AnimationEnd,
	Cancel,
}

/// Resolves once `element`'s animations have ended, one of them was cancelled, or `timeout_ms` passed.
///
/// Returns immediately for [instant](`Timing::is_instant`) timing, without registering anything.
/// While transitions apply, only a cancellation or the timeout ends the wait:
/// `transitionend` fires once per changed property, and those can't be counted up front.
pub async fn settled(element: &Element, timing: Timing, timeout_ms: f64) {
	if timing.is_instant() {
		return;
	}

	let (sender, mut signals) = mpsc::unbounded();
	let target: &EventTarget = element.as_ref();
	let mut listeners = Vec::with_capacity(3);
	for &(name, signal) in &[
		("animationend", Signal::AnimationEnd),
		("animationcancel", Signal::Cancel),
		("transitioncancel", Signal::Cancel),
	] {
		let sender = sender.clone();
		let element = element.clone();
		match EventListener::new(target, name, move |event: Event| {
			// Descendants' events bubble up to here.
			if is_target(&event, &element) {
				sender.unbounded_send(signal).ok();
			}
		}) {
			Ok(listener) => listeners.push(listener),
			Err(error) => error!("Failed to listen for {:?}: {:?}", name, error),
		}
	}
	drop(sender);

	let timeout = TimeoutFuture::new(timer_delay(timeout_ms)).fuse();
	pin_mut!(timeout);

	let mut remaining = if timing.has_transitions {
		None
	} else {
		Some(timing.expected_animation_end_events)
	};
	loop {
		select! {
			signal = signals.next() => match signal {
				Some(Signal::AnimationEnd) => {
					if let Some(remaining) = &mut remaining {
						*remaining = remaining.saturating_sub(1);
						if *remaining == 0 {
							break;
						}
					}
				}
				Some(Signal::Cancel) => {
					trace!("Animation cancelled.");
					break;
				}
				None => break,
			},
			() = timeout => {
				debug!(timeout_ms, ?remaining, "Animation wait timed out.");
				break;
			}
		}
	}

	drop(listeners);
}

/// Browsers run `setTimeout` delays above `i32::MAX` right away.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn timer_delay(timeout_ms: f64) -> u32 {
	timeout_ms.max(0.0).ceil().min(f64::from(i32::MAX)) as u32
}

fn is_target(event: &Event, element: &Element) -> bool {
	event
		.target()
		.map_or(false, |target| AsRef::<JsValue>::as_ref(&target) == AsRef::<JsValue>::as_ref(element))
}

fn restart_class(element: &Element, class: &str) -> Result<(), JsValue> {
	let class_list = element.class_list();
	if class_list.contains(class) {
		class_list.remove_1(class)?;
		force_reflow(element);
	}
	class_list.add_1(class)
}

fn remove_class(element: &Element, class: &str) {
	if let Err(error) = element.class_list().remove_1(class) {
		error!("Failed to remove animation class: {:?}", error)
	}
}

fn force_reflow(element: &Element) {
	// Reading layout flushes pending style changes.
	match element.dyn_ref::<HtmlElement>() {
		Some(element) => {
			let _ = element.offset_width();
		}
		None => {
			let _ = element.get_bounding_client_rect();
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn kind_tokens() {
		assert_eq!(AnimationKind::from_token("enter"), Some(AnimationKind::Enter));
		assert_eq!(AnimationKind::from_token("EXIT"), Some(AnimationKind::Exit));
		assert_eq!(AnimationKind::from_token("sparkle"), None);
		for kind in AnimationKind::ALL.iter().copied() {
			assert_eq!(AnimationKind::from_token(kind.as_str()), Some(kind));
		}
	}

	#[test]
	fn enter_and_change_exclude_each_other() {
		assert_eq!(AnimationKind::Enter.exclusive_with(), Some(AnimationKind::Change));
		assert_eq!(AnimationKind::Change.exclusive_with(), Some(AnimationKind::Enter));
		assert_eq!(AnimationKind::Exit.exclusive_with(), None);
	}

	#[test]
	fn timer_delays_stay_in_range() {
		assert_eq!(timer_delay(150.4), 151);
		assert_eq!(timer_delay(-5.0), 0);
		assert_eq!(timer_delay(f64::NAN), 0);
		assert_eq!(timer_delay(1e12), i32::MAX as u32);
		assert_eq!(timer_delay(f64::INFINITY), i32::MAX as u32);
	}
}
