//! The embedding application's browser control, as seen by the adapter.

use std::sync::Arc;

use cefbind_protocol::{BrowserId, Rect};

use crate::engine::Browser;

/// Receives lifecycle notifications forwarded from the engine.
///
/// The adapter only holds a weak reference; notifications stop once the
/// control is dropped.
pub trait WebBrowserInternal: Send + Sync {
	/// The main browser has been created and is ready for use.
	fn on_after_browser_created(&self, browser: &Arc<dyn Browser>);

	fn on_browser_closing(&self, _browser_id: BrowserId) {}

	/// View rectangle for off-screen rendering. `None` leaves the engine default.
	fn view_rect(&self) -> Option<Rect> {
		None
	}

	/// A new off-screen frame. `buffer` is BGRA, `width * height * 4` bytes.
	fn on_paint(&self, _browser_id: BrowserId, _dirty: Rect, _buffer: &[u8], _width: i32, _height: i32) {}
}
