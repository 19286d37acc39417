// Integration tests for script/host traffic through the adapter
//
// Tests cover:
// - method invocation requests flowing through the queue and back to the render process
// - callback execution before and after the owning client is released
// - script evaluation correlation
// - service host close, timeout-then-abort, and abort-only teardown

mod common;

use std::sync::Arc;
use std::time::Duration;

use cefbind::{
	BindingOptions, BindingSettings, BoundObject, Error, InvokeError, JavascriptResponse, MethodDescription,
	MethodInvocation, ProcessMessage, TaskScheduler,
};
use common::{Harness, MAIN_FRAME, ScriptedFactory, next_message};
use serde_json::{Value, json};
use tokio::sync::oneshot;

struct Calculator;

impl BoundObject for Calculator {
	fn methods(&self) -> Vec<MethodDescription> {
		vec![
			MethodDescription::new("Add").with_parameter_count(2),
			MethodDescription::new("Divide").with_parameter_count(2),
		]
	}

	fn invoke(&self, method: &str, args: &[Value]) -> Result<Value, InvokeError> {
		let a = args[0].as_i64().ok_or("expected an integer")?;
		let b = args[1].as_i64().ok_or("expected an integer")?;
		match method {
			"Add" => Ok(json!(a + b)),
			"Divide" if b == 0 => Err("division by zero".into()),
			"Divide" => Ok(json!(a / b)),
			other => Err(format!("no method {other}").into()),
		}
	}
}

fn calculator_harness(settings: BindingSettings) -> Harness {
	let h = Harness::new(false, settings);
	h.adapter
		.object_repository()
		.register("calc", Arc::new(Calculator), BindingOptions::default())
		.unwrap();
	h
}

/// Waits until every job scheduled so far has run.
async fn flush(scheduler: &dyn TaskScheduler) {
	let (tx, rx) = oneshot::channel();
	scheduler
		.schedule(Box::new(move || {
			let _ = tx.send(());
		}))
		.unwrap();
	tokio::time::timeout(Duration::from_secs(5), rx).await.unwrap().unwrap();
}

#[tokio::test]
async fn invocation_result_returns_to_originating_frame() {
	let h = calculator_harness(BindingSettings::default());
	let (browser, mut inbox) = h.create_main_browser();
	let client = h.engine.client();

	let request = MethodInvocation::new(0, 0, "calc", "add", vec![json!(2), json!(3)]).with_callback_id(7);
	assert!(client.on_process_message_received(
		browser.id(),
		MAIN_FRAME,
		ProcessMessage::MethodInvocationRequest(request)
	));

	let (frame, message) = next_message(&mut inbox).await;
	assert_eq!(frame, MAIN_FRAME);
	let ProcessMessage::MethodInvocationResponse(result) = message else {
		panic!("expected an invocation response, got {message:?}");
	};
	assert!(result.success);
	assert_eq!(result.result, Some(json!(5)));
	assert_eq!(result.callback_id, Some(7));
	assert_eq!(result.browser_id, browser.id());
}

#[tokio::test]
async fn failures_are_reported_and_fire_and_forget_calls_stay_silent() {
	let h = calculator_harness(BindingSettings::default());
	let (browser, mut inbox) = h.create_main_browser();
	let client = h.engine.client();

	let silent = MethodInvocation::new(0, 0, "calc", "add", vec![json!(1), json!(1)]);
	let failing = MethodInvocation::new(0, 0, "calc", "divide", vec![json!(1), json!(0)]).with_callback_id(8);
	client.on_process_message_received(browser.id(), MAIN_FRAME, ProcessMessage::MethodInvocationRequest(silent));
	client.on_process_message_received(browser.id(), MAIN_FRAME, ProcessMessage::MethodInvocationRequest(failing));

	let (_, message) = next_message(&mut inbox).await;
	let ProcessMessage::MethodInvocationResponse(result) = message else {
		panic!("expected an invocation response, got {message:?}");
	};
	assert_eq!(result.callback_id, Some(8));
	assert!(!result.success);
	assert!(result.message.unwrap().contains("division by zero"));

	flush(h.scheduler.as_ref()).await;
	assert!(inbox.try_recv().is_err());
}

#[tokio::test]
async fn requests_after_dispose_are_dropped() {
	let h = calculator_harness(BindingSettings::default());
	let (browser, mut inbox) = h.create_main_browser();
	let client = h.engine.client();

	h.adapter.dispose();
	let request = MethodInvocation::new(0, 0, "calc", "add", vec![json!(2), json!(3)]).with_callback_id(1);
	client.on_process_message_received(browser.id(), MAIN_FRAME, ProcessMessage::MethodInvocationRequest(request));

	flush(h.scheduler.as_ref()).await;
	assert!(inbox.try_recv().is_err());
	assert!(!h.adapter.object_repository().has_bound_objects());
}

#[test]
fn duplicate_registration_keeps_first_object() {
	let h = calculator_harness(BindingSettings::default());

	let err = h
		.adapter
		.object_repository()
		.register("calc", Arc::new(Calculator), BindingOptions::default())
		.unwrap_err();

	assert!(matches!(err, Error::DuplicateName(name) if name == "calc"));
	let bound = h.adapter.object_repository().get("calc").unwrap();
	assert!(bound.downcast::<Calculator>().is_some());
	assert!(bound.method("add").is_some());
}

#[tokio::test]
async fn callback_executes_until_adapter_is_disposed() {
	let h = Harness::new(false, BindingSettings::default());
	let (browser, mut inbox) = h.create_main_browser();
	let callback = h.adapter.callback_factory().create(browser.id(), MAIN_FRAME, 11);

	let response = callback.execute(vec![json!("pong")]).await.unwrap();
	assert_eq!(response, JavascriptResponse::ok(json!("pong")));
	let (_, sent) = next_message(&mut inbox).await;
	assert!(matches!(sent, ProcessMessage::CallbackExecute { callback_id: 11, .. }));

	h.adapter.dispose();

	assert!(!callback.can_execute());
	let err = callback.execute(vec![json!("late")]).await.unwrap_err();
	assert!(matches!(err, Error::CallbackInvalid(_)));
}

#[tokio::test]
async fn evaluate_script_correlates_response() {
	let h = Harness::new(false, BindingSettings::default());
	let (browser, _inbox) = h.create_main_browser();
	let client = h.engine.client();

	let response = client
		.evaluate_script(browser.id(), MAIN_FRAME, "1 + 1", Some(Duration::from_secs(5)))
		.await
		.unwrap();
	assert_eq!(response.result, Some(json!(5)));

	let missing_frame = client
		.evaluate_script(browser.id(), MAIN_FRAME + 1, "1", None)
		.await
		.unwrap_err();
	assert!(matches!(missing_frame, Error::ResourceUnavailable(_)));

	let missing_browser = client
		.evaluate_script(browser.id() + 1000, MAIN_FRAME, "1", None)
		.await
		.unwrap_err();
	assert!(matches!(missing_browser, Error::ResourceUnavailable(_)));
}

#[test]
fn service_host_closes_gracefully_on_dispose() {
	let factory = ScriptedFactory::new(true);
	let settings = BindingSettings::default()
		.with_out_of_process_messaging(factory.clone())
		.with_service_host_timeout(Some(Duration::from_millis(250)));
	let h = Harness::new(false, settings);
	let (browser, _inbox) = h.create_main_browser();

	assert!(h.adapter.has_service_host());
	assert_eq!(factory.log.lock().opened, vec![browser.id()]);

	h.adapter.dispose();

	let log = factory.log.lock();
	assert_eq!(log.closed_with, vec![Duration::from_millis(250)]);
	assert_eq!(log.aborted, 0);
	assert!(!h.adapter.has_service_host());
}

#[test]
fn service_host_close_timeout_falls_back_to_abort() {
	let factory = ScriptedFactory::new(false);
	let settings = BindingSettings::default()
		.with_out_of_process_messaging(factory.clone())
		.with_service_host_timeout(Some(Duration::from_millis(50)));
	let h = Harness::new(false, settings);
	let (browser, _inbox) = h.create_main_browser();

	h.adapter.dispose();

	let log = factory.log.lock();
	assert_eq!(log.closed_with.len(), 1);
	assert_eq!(log.aborted, 1);
	assert!(h.adapter.is_disposed());
	assert_eq!(browser.close_count(), 1);
}

#[test]
fn service_host_without_timeout_is_aborted() {
	let factory = ScriptedFactory::new(true);
	let settings = BindingSettings::default()
		.with_out_of_process_messaging(factory.clone())
		.with_service_host_timeout(None);
	let h = Harness::new(false, settings);
	let _created = h.create_main_browser();

	h.adapter.dispose();

	let log = factory.log.lock();
	assert!(log.closed_with.is_empty());
	assert_eq!(log.aborted, 1);
}

#[test]
fn no_service_host_without_out_of_process_messaging() {
	let h = Harness::new(false, BindingSettings::default());
	let _created = h.create_main_browser();

	assert!(!h.adapter.has_service_host());
	h.adapter.dispose();
}
