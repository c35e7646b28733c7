use js_sys::{Object, Reflect};
use std::{cell::Cell, rc::Rc};
use turbo_refresh_animations::{install, orchestrator::Phase, Config, Installation};
use wasm_bindgen::{closure::Closure, JsValue};
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};
use web_sys::{window, CustomEvent, CustomEventInit, EventTarget, Headers, Response, ResponseInit};

wasm_bindgen_test_configure!(run_in_browser);

use web_fixture_::{by_id, document, has_class, html_by_id, incoming, init, live, sleep};

const CHANGE: &str = "turbo-refresh-change";
const EXIT: &str = "turbo-refresh-exit";

fn detail(entries: &[(&str, JsValue)]) -> JsValue {
	let object = Object::new();
	for (key, value) in entries {
		Reflect::set(&object, &JsValue::from_str(key), value).unwrap();
	}
	object.into()
}

/// Dispatches a bubbling, cancelable `name` event at `target`. `false` iff a listener prevented its default.
fn dispatch(target: &EventTarget, name: &str, detail: &JsValue) -> bool {
	let mut init = CustomEventInit::new();
	init.bubbles(true).cancelable(true).detail(detail);
	let event = CustomEvent::new_with_event_init_dict(name, &init).unwrap();
	target.dispatch_event(&event).unwrap()
}

fn visit(action: &str) {
	let url = window().unwrap().location().href().unwrap();
	dispatch(
		&document(),
		"turbo:visit",
		&detail(&[("url", JsValue::from(url)), ("action", JsValue::from(action))]),
	);
}

fn rendered() {
	dispatch(&document(), "turbo:render", &JsValue::UNDEFINED);
}

fn phase(installation: &Installation) -> Phase {
	installation.orchestrator().borrow().phase()
}

fn is_marked(id: &str) -> bool {
	by_id(id).unwrap().has_attribute("data-turbo-permanent")
}

#[wasm_bindgen_test]
async fn render_is_held_until_exits_settle() {
	init();
	let installation = install(Config::default()).unwrap();
	let container = live(r#"<p id="held-leaving" data-turbo-refresh-animate>Buy milk</p>"#);
	visit("replace");

	let resumed = Rc::new(Cell::new(false));
	let resume = Closure::wrap(Box::new({
		let resumed = Rc::clone(&resumed);
		move || resumed.set(true)
	}) as Box<dyn FnMut()>);
	let proceeded = dispatch(
		&document(),
		"turbo:before-render",
		&detail(&[("newBody", incoming("").into()), ("resume", resume.as_ref().clone())]),
	);
	assert!(!proceeded);
	assert!(has_class("held-leaving", EXIT));
	assert!(!resumed.get());
	assert_eq!(phase(&installation), Phase::AwaitingReplace);

	sleep(400).await;
	assert!(resumed.get());
	assert!(by_id("held-leaving").is_none());
	assert_eq!(phase(&installation), Phase::Replacing);

	rendered();
	assert_eq!(phase(&installation), Phase::Settled);

	container.remove();
}

#[wasm_bindgen_test]
fn protected_morph_is_vetoed_and_version_change_animates() {
	init();
	let installation = install(Config::default()).unwrap();
	let container = live(
		r#"<div id="morph-form" data-turbo-permanent><form></form></div>
		<p id="morph-todo" data-turbo-permanent data-turbo-refresh-animate data-turbo-refresh-version="v1">Buy milk</p>
		<p id="morph-plain">Walk dog</p>"#,
	);
	let next = incoming(
		r#"<div id="morph-form" data-turbo-permanent><form><p>2 items left</p></form></div>
		<p id="morph-todo" data-turbo-permanent data-turbo-refresh-animate data-turbo-refresh-version="v2">Buy oat milk</p>
		<p id="morph-plain">Walk cat</p>"#,
	);
	visit("replace");

	// Nothing exits, so the render isn't held.
	assert!(dispatch(&document(), "turbo:before-render", &detail(&[("newBody", next.clone().into())])));
	assert!(has_class("morph-todo", CHANGE));

	let incoming_form = next.query_selector("#morph-form").unwrap().unwrap();
	assert!(!dispatch(
		&by_id("morph-form").unwrap(),
		"turbo:before-morph-element",
		&detail(&[("newElement", incoming_form.into())]),
	));
	let incoming_plain = next.query_selector("#morph-plain").unwrap().unwrap();
	assert!(dispatch(
		&by_id("morph-plain").unwrap(),
		"turbo:before-morph-element",
		&detail(&[("newElement", incoming_plain.into())]),
	));

	rendered();
	assert_eq!(phase(&installation), Phase::Settled);

	container.remove();
}

#[wasm_bindgen_test]
fn submitted_form_is_morphed_and_protected_again_afterwards() {
	init();
	let _installation = install(Config::default()).unwrap();
	let container = live(r#"<div id="events-wrapper" data-turbo-permanent><form id="events-form"></form></div>"#);
	let next = incoming(r#"<div id="events-wrapper" data-turbo-permanent><form></form></div>"#);
	let form = by_id("events-form").unwrap();

	dispatch(&form, "turbo:submit-start", &detail(&[]));
	assert!(!is_marked("events-wrapper"));

	let fetch_response = detail(&[
		("contentType", JsValue::from("text/html; charset=utf-8")),
		("succeeded", JsValue::from(true)),
		("redirected", JsValue::from(true)),
	]);
	dispatch(&form, "turbo:submit-end", &detail(&[("fetchResponse", fetch_response)]));
	assert!(!is_marked("events-wrapper"));

	visit("replace");
	assert!(dispatch(&document(), "turbo:before-render", &detail(&[("newBody", next.clone().into())])));
	let incoming_wrapper = next.query_selector("#events-wrapper").unwrap().unwrap();
	assert!(dispatch(
		&by_id("events-wrapper").unwrap(),
		"turbo:before-morph-element",
		&detail(&[("newElement", incoming_wrapper.into())]),
	));

	rendered();
	assert!(is_marked("events-wrapper"));

	container.remove();
}

#[wasm_bindgen_test]
fn stream_content_type_is_read_from_response_headers() {
	init();
	let installation = install(Config::default()).unwrap();
	let container = live(r#"<div id="header-wrapper" data-turbo-permanent><form id="header-form"></form></div>"#);
	let form = by_id("header-form").unwrap();

	dispatch(&form, "turbo:submit-start", &detail(&[]));
	assert_eq!(installation.orchestrator().borrow().classifier().active_submission_initiator(), Some("header-wrapper"));

	let headers = Headers::new().unwrap();
	headers.set("Content-Type", "text/vnd.turbo-stream.html; charset=utf-8").unwrap();
	let mut response_init = ResponseInit::new();
	response_init.headers(&JsValue::from(headers));
	let response = Response::new_with_opt_str_and_init(None, &response_init).unwrap();
	let fetch_response = detail(&[
		("succeeded", JsValue::from(true)),
		("redirected", JsValue::from(true)),
		("response", response.into()),
	]);
	dispatch(&form, "turbo:submit-end", &detail(&[("fetchResponse", fetch_response)]));

	assert_eq!(installation.orchestrator().borrow().classifier().active_submission_initiator(), None);
	assert!(is_marked("header-wrapper"));

	container.remove();
}

#[wasm_bindgen_test]
fn click_before_visit_lifts_protection() {
	init();
	let _installation = install(Config::default()).unwrap();
	let container = live(r#"<nav id="events-filters" data-turbo-permanent><button id="events-filter" type="button">Done</button></nav>"#);

	html_by_id("events-filter").click();
	assert!(is_marked("events-filters"));
	visit("replace");
	assert!(!is_marked("events-filters"));

	assert!(dispatch(&document(), "turbo:before-render", &detail(&[("newBody", incoming("").into())])));
	rendered();
	assert!(is_marked("events-filters"));

	container.remove();
}

#[wasm_bindgen_test]
fn unknown_visit_action_is_navigation() {
	init();
	let installation = install(Config::default()).unwrap();
	let container = live(r#"<p id="sideways-leaving" data-turbo-refresh-animate>Buy milk</p>"#);
	visit("sideways");

	assert!(dispatch(&document(), "turbo:before-render", &detail(&[("newBody", incoming("").into())])));
	assert!(!installation.orchestrator().borrow().transition().unwrap().is_refresh());
	assert!(!has_class("sideways-leaving", EXIT));
	rendered();

	container.remove();
}

#[wasm_bindgen_test]
fn dropping_the_installation_removes_listeners() {
	init();
	let installation = install(Config::default()).unwrap();
	let orchestrator = Rc::clone(installation.orchestrator());
	drop(installation);

	visit("replace");
	dispatch(&document(), "turbo:before-render", &detail(&[("newBody", incoming("").into())]));
	assert_eq!(orchestrator.borrow().phase(), Phase::Idle);
	assert!(orchestrator.borrow().transition().is_none());
}
