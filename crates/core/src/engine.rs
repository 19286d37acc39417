//! The engine surface the adapter consumes.
//!
//! Implementations wrap the native browser runtime. Every method may be called
//! from any thread, and none of them may call back into the adapter while the
//! caller holds adapter state; the adapter never does that.

use std::sync::Arc;

use cefbind_protocol::{BrowserId, BrowserSettings, FrameId, ProcessMessage, RequestContext, WindowInfo};

use crate::client_adapter::ClientAdapter;

/// A live engine browser instance.
pub trait Browser: Send + Sync {
	fn identifier(&self) -> BrowserId;

	fn is_popup(&self) -> bool;

	/// Asks the engine to close the browser. `force` skips unload handlers.
	fn close_browser(&self, force: bool);

	/// Resizes the native host window (windowed rendering).
	fn resize(&self, width: i32, height: i32);

	/// Tells the engine the view size changed (off-screen rendering).
	fn was_resized(&self);

	/// Sends a message to the render process for `frame_id`.
	///
	/// Returns false if the frame no longer exists.
	fn send_process_message(&self, frame_id: FrameId, message: ProcessMessage) -> bool;
}

/// Entry points into the engine runtime.
pub trait Engine: Send + Sync {
	/// Whether the runtime can host clients. A browser adapter cannot be built
	/// against an uninitialized engine.
	fn is_initialized(&self) -> bool;

	/// Requests asynchronous creation of a browser that will report to `client`.
	///
	/// The engine keeps its own reference to `client` until the browser has
	/// closed. Returns false when the request was refused outright.
	fn create_browser(
		&self,
		client: Arc<ClientAdapter>,
		window_info: &WindowInfo,
		settings: &BrowserSettings,
		request_context: Option<&RequestContext>,
		address: &str,
	) -> bool;
}

impl std::fmt::Debug for dyn Browser {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Browser")
			.field("identifier", &self.identifier())
			.field("is_popup", &self.is_popup())
			.finish()
	}
}
