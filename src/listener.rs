//! Owned DOM event listeners.

use tracing::{error, trace};
use wasm_bindgen::{closure::Closure, JsCast, JsValue};
use web_sys::{AddEventListenerOptions, Event, EventTarget};

/// An event listener that is removed from its target when dropped.
///
/// Dropping also frees the [`Closure`], so the handler can't be called afterwards.
pub struct EventListener {
	target: EventTarget,
	name: &'static str,
	capture: bool,
	closure: Closure<dyn FnMut(Event)>,
}

impl EventListener {
	/// # Errors
	///
	/// Iff the browser rejects the registration.
	pub fn new(target: &EventTarget, name: &'static str, handler: impl 'static + FnMut(Event)) -> Result<Self, JsValue> {
		Self::with_capture(target, name, false, handler)
	}

	/// # Errors
	///
	/// Iff the browser rejects the registration.
	pub fn with_capture(target: &EventTarget, name: &'static str, capture: bool, handler: impl 'static + FnMut(Event)) -> Result<Self, JsValue> {
		let closure = Closure::wrap(Box::new(handler) as Box<dyn FnMut(Event)>);
		let mut options = AddEventListenerOptions::new();
		options.capture(capture);
		target.add_event_listener_with_callback_and_add_event_listener_options(name, closure.as_ref().unchecked_ref(), &options)?;
		trace!(name, capture, "Added event listener.");
		Ok(Self {
			target: target.clone(),
			name,
			capture,
			closure,
		})
	}
}

impl Drop for EventListener {
	fn drop(&mut self) {
		if let Err(error) = self
			.target
			.remove_event_listener_with_callback_and_bool(self.name, self.closure.as_ref().unchecked_ref(), self.capture)
		{
			error!("Failed to remove {:?} listener: {:?}", self.name, error)
		}
		trace!(name = self.name, "Removed event listener.");
	}
}

impl core::fmt::Debug for EventListener {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("EventListener").field("name", &self.name).field("capture", &self.capture).finish_non_exhaustive()
	}
}
