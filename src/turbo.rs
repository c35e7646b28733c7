//! Driving an [`Orchestrator`] from Turbo's DOM events.

use crate::{
	classifier::{SubmissionResponse, VisitAction},
	config::Config,
	listener::EventListener,
	orchestrator::{Orchestrator, ReplaceDecision},
};
use js_sys::{Function, Object, Reflect};
use std::{cell::RefCell, rc::Rc};
use tracing::{error, trace_span, warn};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::spawn_local;
use web_sys::{CustomEvent, Document, Element, Event, EventTarget, Response};

/// The installed engine. Dropping it removes every listener again.
#[must_use = "Dropping the `Installation` uninstalls the engine right away."]
#[derive(Debug)]
pub struct Installation {
	orchestrator: Rc<RefCell<Orchestrator>>,
	_listeners: Vec<EventListener>,
}

impl Installation {
	#[must_use]
	pub fn orchestrator(&self) -> &Rc<RefCell<Orchestrator>> {
		&self.orchestrator
	}

	/// Keeps the engine installed for the rest of the page's lifetime.
	pub fn forget(self) {
		core::mem::forget(self)
	}
}

/// Attaches a new engine to the current document.
///
/// # Errors
///
/// Iff there is no window or document, or a listener can't be registered.
pub fn install(config: Config) -> Result<Installation, JsValue> {
	let window = web_sys::window().ok_or_else(|| JsValue::from_str("turbo-refresh-animations: No window."))?;
	let document = window.document().ok_or_else(|| JsValue::from_str("turbo-refresh-animations: No document."))?;

	let orchestrator = Rc::new(RefCell::new(Orchestrator::new(config)));
	orchestrator.borrow_mut().loaded(&window.location().href()?);

	let target: &EventTarget = document.as_ref();
	let listen = |name: &'static str, handler: fn(&Rc<RefCell<Orchestrator>>, &Event)| {
		let orchestrator = Rc::clone(&orchestrator);
		EventListener::new(target, name, move |event| {
			let span = trace_span!("Handling", event = name);
			let _enter = span.enter();
			handler(&orchestrator, &event)
		})
	};

	let listeners = vec![
		{
			let orchestrator = Rc::clone(&orchestrator);
			EventListener::with_capture(target, "click", true, move |event| on_click(&orchestrator, &event))?
		},
		listen("turbo:visit", on_visit)?,
		listen("turbo:submit-start", on_submit_start)?,
		listen("turbo:submit-end", on_submit_end)?,
		listen("turbo:before-render", on_before_render)?,
		listen("turbo:before-morph-element", on_before_morph_element)?,
		listen("turbo:render", on_render)?,
		listen("turbo:before-cache", on_before_cache)?,
		listen("turbo:load", on_load)?,
	];

	Ok(Installation {
		orchestrator,
		_listeners: listeners,
	})
}

fn on_click(orchestrator: &RefCell<Orchestrator>, event: &Event) {
	if let Some(target) = event.target().and_then(|target| target.dyn_into::<Element>().ok()) {
		orchestrator.borrow_mut().record_click(&target, js_sys::Date::now());
	}
}

fn on_visit(orchestrator: &Rc<RefCell<Orchestrator>>, event: &Event) {
	let detail = detail(event);
	let url = match property(&detail, "url").as_ref().and_then(string_of) {
		Some(url) => url,
		None => return error!("`turbo:visit` without URL."),
	};
	let action = property(&detail, "action").and_then(|action| action.as_string());
	let action = match action.as_deref().and_then(VisitAction::parse) {
		Some(action) => action,
		None => {
			warn!("Unknown visit action {:?}. Treating it as navigation.", action);
			VisitAction::Advance
		}
	};
	orchestrator.borrow_mut().visit_started(&url, action, js_sys::Date::now());
}

fn on_submit_start(orchestrator: &Rc<RefCell<Orchestrator>>, event: &Event) {
	if let Some(form) = event.target().and_then(|target| target.dyn_into::<Element>().ok()) {
		orchestrator.borrow_mut().submission_started(&form);
	}
}

fn on_submit_end(orchestrator: &Rc<RefCell<Orchestrator>>, event: &Event) {
	let response = property(&detail(event), "fetchResponse").map(|fetch_response| SubmissionResponse {
		content_type: content_type(&fetch_response),
		succeeded: flag(&fetch_response, "succeeded"),
		redirected: flag(&fetch_response, "redirected"),
	});
	orchestrator.borrow_mut().submission_ended(response.as_ref());
}

fn on_before_render(orchestrator: &Rc<RefCell<Orchestrator>>, event: &Event) {
	let detail = detail(event);
	let new_body = match property(&detail, "newBody").and_then(|new_body| new_body.dyn_into::<Element>().ok()) {
		Some(new_body) => new_body,
		None => return error!("`turbo:before-render` without `newBody`."),
	};
	let live_root = match document_element(event) {
		Some(live_root) => live_root,
		None => return error!("No document element to render into."),
	};

	let plan = orchestrator.borrow_mut().before_render(&live_root, &new_body);
	if plan.is_empty() {
		return;
	}

	let resume = match property(&detail, "resume").and_then(|resume| resume.dyn_into::<Function>().ok()) {
		Some(resume) => resume,
		None => {
			warn!("Render can't be held. Exit animations will overlap it.");
			return spawn_local(plan.run());
		}
	};

	event.prevent_default();
	let orchestrator = Rc::clone(orchestrator);
	spawn_local(async move {
		plan.run().await;
		orchestrator.borrow_mut().exits_settled();
		if let Err(error) = resume.call0(&JsValue::UNDEFINED) {
			error!("Failed to resume render: {:?}", error)
		}
	});
}

fn on_before_morph_element(orchestrator: &Rc<RefCell<Orchestrator>>, event: &Event) {
	let element = match event.target().and_then(|target| target.dyn_into::<Element>().ok()) {
		Some(element) => element,
		None => return,
	};
	let incoming = property(&detail(event), "newElement").and_then(|incoming| incoming.dyn_into::<Element>().ok());
	if orchestrator.borrow_mut().before_replace_element(&element, incoming.as_ref()) == ReplaceDecision::Veto {
		event.prevent_default();
	}
}

fn on_render(orchestrator: &Rc<RefCell<Orchestrator>>, event: &Event) {
	let (live_root, location) = match (document_element(event), location_href()) {
		(Some(live_root), Some(location)) => (live_root, location),
		_ => return error!("Can't inspect the rendered document."),
	};
	orchestrator.borrow_mut().render_committed(&live_root, &location);
}

fn on_before_cache(orchestrator: &Rc<RefCell<Orchestrator>>, _: &Event) {
	orchestrator.borrow_mut().page_cached();
}

fn on_load(orchestrator: &Rc<RefCell<Orchestrator>>, _: &Event) {
	if let Some(location) = location_href() {
		orchestrator.borrow_mut().loaded(&location);
	}
}

fn detail(event: &Event) -> JsValue {
	event.dyn_ref::<CustomEvent>().map_or(JsValue::UNDEFINED, CustomEvent::detail)
}

/// `object[key]`, unless that is `undefined` or `null` or `object` isn't an object.
fn property(object: &JsValue, key: &str) -> Option<JsValue> {
	if !object.is_object() {
		return None;
	}
	Reflect::get(object, &JsValue::from_str(key))
		.ok()
		.filter(|value| !value.is_undefined() && !value.is_null())
}

fn flag(object: &JsValue, key: &str) -> bool {
	property(object, key).and_then(|value| value.as_bool()).unwrap_or(false)
}

/// Strings as-is, objects (like `URL`) through their `toString`.
fn string_of(value: &JsValue) -> Option<String> {
	value.as_string().or_else(|| value.dyn_ref::<Object>().map(|object| object.to_string().into()))
}

fn content_type(fetch_response: &JsValue) -> Option<String> {
	property(fetch_response, "contentType").and_then(|content_type| content_type.as_string()).or_else(|| {
		let response = property(fetch_response, "response")?.dyn_into::<Response>().ok()?;
		response.headers().get("Content-Type").ok().flatten()
	})
}

fn document_element(event: &Event) -> Option<Element> {
	let document = event
		.target()
		.and_then(|target| target.dyn_into::<Document>().ok())
		.or_else(|| web_sys::window()?.document())?;
	document.document_element()
}

fn location_href() -> Option<String> {
	web_sys::window()?.location().href().ok()
}
