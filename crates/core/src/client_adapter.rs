//! The engine-facing client.
//!
//! The engine calls into [`ClientAdapter`] on its own threads. Each callback
//! either updates the client's browser table or is forwarded to the owning
//! [`BrowserAdapter`](crate::BrowserAdapter) and the embedding application
//! through weak references, so nothing here keeps them alive.
//!
//! The client is shared between the adapter and the engine. The adapter
//! releases its side explicitly during teardown; the engine drops its
//! reference once the browser has closed. A released client still answers
//! engine callbacks, but refuses new work and fails every outstanding
//! callback execution and script evaluation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use cefbind_protocol::{
	BrowserId, FrameId, JavascriptResponse, MethodInvocationResult, ProcessMessage, Rect,
};
use cefbind_runtime::{CallbackDispatcher, Error, PendingTaskRepository, Result};
use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::adapter::AdapterInner;
use crate::engine::Browser;
use crate::web_browser::WebBrowserInternal;

/// Rendering mode the client was created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientKind {
	/// Renders into a native child window.
	Windowed,
	/// Renders into buffers handed to the embedding application.
	OffScreen,
}

#[derive(Default)]
struct BrowserTable {
	main: Option<Arc<dyn Browser>>,
	popups: IndexMap<BrowserId, Arc<dyn Browser>>,
}

pub struct ClientAdapter {
	kind: ClientKind,
	web_browser: Weak<dyn WebBrowserInternal>,
	adapter: Weak<AdapterInner>,
	pending: Arc<PendingTaskRepository<JavascriptResponse>>,
	browsers: Mutex<BrowserTable>,
	released: AtomicBool,
}

impl ClientAdapter {
	pub(crate) fn new(kind: ClientKind, web_browser: Weak<dyn WebBrowserInternal>, adapter: Weak<AdapterInner>) -> Self {
		Self {
			kind,
			web_browser,
			adapter,
			pending: Arc::new(PendingTaskRepository::new()),
			browsers: Mutex::new(BrowserTable::default()),
			released: AtomicBool::new(false),
		}
	}

	pub fn kind(&self) -> ClientKind {
		self.kind
	}

	pub fn is_released(&self) -> bool {
		self.released.load(Ordering::SeqCst)
	}

	pub(crate) fn pending_tasks(&self) -> &Arc<PendingTaskRepository<JavascriptResponse>> {
		&self.pending
	}

	/// Engine callback: a browser (main or popup) finished creation.
	pub fn on_after_created(&self, browser: Arc<dyn Browser>) {
		if browser.is_popup() {
			if !self.attach_browser(Arc::clone(&browser)) {
				tracing::warn!(browser_id = browser.identifier(), "Popup created for a released client; closing");
				browser.close_browser(true);
			}
			return;
		}

		match self.adapter.upgrade() {
			Some(adapter) => adapter.on_after_browser_created(browser),
			None => {
				tracing::warn!(
					browser_id = browser.identifier(),
					"Browser created after its adapter was dropped; closing"
				);
				browser.close_browser(true);
			}
		}
	}

	/// Engine callback: a browser is about to close.
	pub fn on_before_close(&self, browser_id: BrowserId) {
		let was_main = {
			let mut browsers = self.browsers.lock();
			if browsers.popups.shift_remove(&browser_id).is_some() {
				false
			} else if browsers.main.as_ref().is_some_and(|b| b.identifier() == browser_id) {
				browsers.main = None;
				true
			} else {
				false
			}
		};

		tracing::debug!(browser_id, main = was_main, "Browser closing");
		if was_main {
			if let Some(web_browser) = self.web_browser.upgrade() {
				web_browser.on_browser_closing(browser_id);
			}
		}
	}

	/// Engine callback: a message arrived from a render process.
	///
	/// Returns whether the message was handled.
	pub fn on_process_message_received(&self, browser_id: BrowserId, frame_id: FrameId, message: ProcessMessage) -> bool {
		match message {
			ProcessMessage::MethodInvocationRequest(mut invocation) => {
				invocation.browser_id = browser_id;
				invocation.frame_id = frame_id;
				match self.adapter.upgrade() {
					Some(adapter) => adapter.enqueue_invocation(invocation),
					None => tracing::debug!(
						browser_id,
						object = %invocation.object_name,
						method = %invocation.method_name,
						"Dropping invocation for a dropped adapter"
					),
				}
				true
			}
			ProcessMessage::EvaluateScriptDone { task_id, response } => {
				self.pending.complete_pending_task(task_id, response);
				true
			}
			ProcessMessage::CallbackDone { task_id, response } => {
				self.pending.complete_callback_pending_task(task_id, response);
				true
			}
			other => {
				tracing::debug!(browser_id, message = other.name(), "Ignoring unexpected process message");
				false
			}
		}
	}

	/// Engine callback (off-screen only): the view rectangle to render into.
	pub fn get_view_rect(&self) -> Option<Rect> {
		match self.kind {
			ClientKind::OffScreen => self.web_browser.upgrade()?.view_rect(),
			ClientKind::Windowed => None,
		}
	}

	/// Engine callback (off-screen only): a new frame is available.
	pub fn on_paint(&self, browser_id: BrowserId, dirty: Rect, buffer: &[u8], width: i32, height: i32) {
		if self.kind != ClientKind::OffScreen {
			return;
		}
		if let Some(web_browser) = self.web_browser.upgrade() {
			web_browser.on_paint(browser_id, dirty, buffer, width, height);
		}
	}

	/// Main browser or popup with `browser_id`.
	pub fn get_browser(&self, browser_id: BrowserId) -> Option<Arc<dyn Browser>> {
		let browsers = self.browsers.lock();
		browsers
			.main
			.as_ref()
			.filter(|b| b.identifier() == browser_id)
			.or_else(|| browsers.popups.get(&browser_id))
			.cloned()
	}

	/// Ids of the popups currently open.
	pub fn popup_ids(&self) -> Vec<BrowserId> {
		self.browsers.lock().popups.keys().copied().collect()
	}

	/// Closes every tracked popup.
	pub fn close_all_popups(&self, force: bool) {
		let popups: Vec<_> = self.browsers.lock().popups.drain(..).map(|(_, b)| b).collect();
		for popup in popups {
			tracing::debug!(browser_id = popup.identifier(), force, "Closing popup");
			popup.close_browser(force);
		}
	}

	/// Evaluates `script` in a frame and waits for the render process to answer.
	pub async fn evaluate_script(
		&self,
		browser_id: BrowserId,
		frame_id: FrameId,
		script: impl Into<String>,
		timeout: Option<Duration>,
	) -> Result<JavascriptResponse> {
		if self.is_released() {
			return Err(Error::AlreadyDisposed("evaluate script"));
		}
		let browser = self
			.get_browser(browser_id)
			.ok_or_else(|| Error::ResourceUnavailable(format!("browser {browser_id} is not available")))?;

		let task = self.pending.create_pending_task()?;
		let message = ProcessMessage::EvaluateScript {
			task_id: task.id(),
			script: script.into(),
		};
		if !browser.send_process_message(frame_id, message) {
			return Err(Error::ResourceUnavailable(format!(
				"frame {frame_id} of browser {browser_id} is not available"
			)));
		}

		task.wait(timeout).await
	}

	/// Sends a finished invocation back to the render process that asked for it.
	pub(crate) fn method_invocation_complete(&self, result: &MethodInvocationResult) {
		if self.is_released() || result.callback_id.is_none() {
			return;
		}
		let Some(browser) = self.get_browser(result.browser_id) else {
			tracing::debug!(
				browser_id = result.browser_id,
				method = %result.method_name,
				"Browser gone before invocation result could be delivered"
			);
			return;
		};
		if !browser.send_process_message(result.frame_id, ProcessMessage::MethodInvocationResponse(result.clone())) {
			tracing::debug!(
				browser_id = result.browser_id,
				frame_id = result.frame_id,
				"Frame gone before invocation result could be delivered"
			);
		}
	}

	/// Records a browser as the main browser or as a popup.
	///
	/// Returns false, without retaining it, once the client has been released.
	pub(crate) fn attach_browser(&self, browser: Arc<dyn Browser>) -> bool {
		let mut browsers = self.browsers.lock();
		if self.is_released() {
			return false;
		}
		if browser.is_popup() {
			browsers.popups.insert(browser.identifier(), browser);
		} else {
			browsers.main = Some(browser);
		}
		true
	}

	/// Drops the adapter's side of the client. Idempotent.
	pub(crate) fn release(&self) {
		let popups: Vec<_> = {
			let mut browsers = self.browsers.lock();
			if self.released.swap(true, Ordering::SeqCst) {
				return;
			}
			browsers.main = None;
			browsers.popups.drain(..).map(|(_, b)| b).collect()
		};
		self.pending.release();
		for popup in popups {
			tracing::debug!(browser_id = popup.identifier(), "Force-closing popup of a released client");
			popup.close_browser(true);
		}
		tracing::debug!(kind = ?self.kind, "Client adapter released");
	}
}

impl CallbackDispatcher for ClientAdapter {
	fn send_callback_message(&self, browser_id: BrowserId, frame_id: FrameId, message: ProcessMessage) -> bool {
		if self.is_released() {
			return false;
		}
		self.get_browser(browser_id)
			.is_some_and(|browser| browser.send_process_message(frame_id, message))
	}
}

impl std::fmt::Debug for ClientAdapter {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let browsers = self.browsers.lock();
		f.debug_struct("ClientAdapter")
			.field("kind", &self.kind)
			.field("main", &browsers.main.as_ref().map(|b| b.identifier()))
			.field("popups", &browsers.popups.keys().collect::<Vec<_>>())
			.field("released", &self.is_released())
			.finish()
	}
}
