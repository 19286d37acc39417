//! Handles for script-side function values passed back to host code.
//!
//! A [`JavascriptCallback`] only holds weak references to the pending-task
//! table and to the dispatcher that reaches the render process. Both belong to
//! the client adapter, so once the adapter releases them every late
//! `execute` fails with [`Error::CallbackInvalid`] instead of touching freed
//! state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use cefbind_protocol::{BrowserId, FrameId, JavascriptResponse, ProcessMessage};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::pending_tasks::PendingTaskRepository;

/// Routes a message to the render process hosting `frame_id`.
pub trait CallbackDispatcher: Send + Sync {
	/// Returns false when the browser or frame is gone.
	fn send_callback_message(&self, browser_id: BrowserId, frame_id: FrameId, message: ProcessMessage) -> bool;
}

/// Creates [`JavascriptCallback`] handles wired to one client adapter.
pub struct JavascriptCallbackFactory {
	pending: Weak<PendingTaskRepository<JavascriptResponse>>,
	dispatcher: Weak<dyn CallbackDispatcher>,
}

impl JavascriptCallbackFactory {
	pub fn new(
		pending: &Arc<PendingTaskRepository<JavascriptResponse>>,
		dispatcher: Weak<dyn CallbackDispatcher>,
	) -> Self {
		Self {
			pending: Arc::downgrade(pending),
			dispatcher,
		}
	}

	/// Wraps the script-side function registered as `callback_id` in the given frame.
	pub fn create(&self, browser_id: BrowserId, frame_id: FrameId, callback_id: i64) -> JavascriptCallback {
		tracing::debug!(browser_id, frame_id, callback_id, "Created javascript callback");
		JavascriptCallback {
			id: callback_id,
			browser_id,
			frame_id,
			pending: self.pending.clone(),
			dispatcher: self.dispatcher.clone(),
			disposed: AtomicBool::new(false),
		}
	}
}

/// A script-side function value the host can invoke.
pub struct JavascriptCallback {
	id: i64,
	browser_id: BrowserId,
	frame_id: FrameId,
	pending: Weak<PendingTaskRepository<JavascriptResponse>>,
	dispatcher: Weak<dyn CallbackDispatcher>,
	disposed: AtomicBool,
}

impl JavascriptCallback {
	pub fn id(&self) -> i64 {
		self.id
	}

	pub fn browser_id(&self) -> BrowserId {
		self.browser_id
	}

	pub fn frame_id(&self) -> FrameId {
		self.frame_id
	}

	/// Whether an `execute` issued now could reach the render process.
	pub fn can_execute(&self) -> bool {
		!self.disposed.load(Ordering::SeqCst)
			&& self.pending.upgrade().is_some_and(|p| !p.is_released())
			&& self.dispatcher.strong_count() > 0
	}

	/// Runs the function with `parameters` and waits for its result.
	pub async fn execute(&self, parameters: Vec<Value>) -> Result<JavascriptResponse> {
		self.execute_with_timeout(None, parameters).await
	}

	/// Like [`execute`](Self::execute), giving up after `timeout`.
	pub async fn execute_with_timeout(
		&self,
		timeout: Option<Duration>,
		parameters: Vec<Value>,
	) -> Result<JavascriptResponse> {
		if self.disposed.load(Ordering::SeqCst) {
			return Err(Error::CallbackInvalid(format!("callback {} has been disposed", self.id)));
		}

		let task = {
			let pending = self
				.pending
				.upgrade()
				.filter(|p| !p.is_released())
				.ok_or_else(|| self.released_error())?;
			pending.create_callback_pending_task()?
		};

		let sent = {
			let dispatcher = self.dispatcher.upgrade().ok_or_else(|| self.released_error())?;
			dispatcher.send_callback_message(
				self.browser_id,
				self.frame_id,
				ProcessMessage::CallbackExecute {
					callback_id: self.id,
					task_id: task.id(),
					parameters,
				},
			)
		};

		if !sent {
			return Err(Error::CallbackInvalid(format!(
				"frame {} of browser {} is no longer available",
				self.frame_id, self.browser_id
			)));
		}

		task.wait(timeout).await
	}

	/// Tells the render process the host no longer needs the function. Idempotent.
	pub fn dispose(&self) {
		if self.disposed.swap(true, Ordering::SeqCst) {
			return;
		}
		if let Some(dispatcher) = self.dispatcher.upgrade() {
			let _ = dispatcher.send_callback_message(
				self.browser_id,
				self.frame_id,
				ProcessMessage::CallbackDestroy { callback_id: self.id },
			);
		}
	}

	fn released_error(&self) -> Error {
		Error::CallbackInvalid(format!(
			"callback {} outlived its client adapter",
			self.id
		))
	}
}

impl Drop for JavascriptCallback {
	fn drop(&mut self) {
		self.dispose();
	}
}

impl std::fmt::Debug for JavascriptCallback {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("JavascriptCallback")
			.field("id", &self.id)
			.field("browser_id", &self.browser_id)
			.field("frame_id", &self.frame_id)
			.field("disposed", &self.disposed.load(Ordering::SeqCst))
			.finish()
	}
}
