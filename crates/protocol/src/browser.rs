//! Browser creation parameters.
//!
//! These are handed to the engine as-is; the adapter never interprets them
//! beyond the windowless flag.

use serde::{Deserialize, Serialize};

/// Rectangle in view coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
	pub x: i32,
	pub y: i32,
	pub width: i32,
	pub height: i32,
}

impl Rect {
	pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
		Self { x, y, width, height }
	}

	pub fn is_empty(&self) -> bool {
		self.width <= 0 || self.height <= 0
	}
}

/// Native window the browser is parented to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowInfo {
	/// Native handle of the parent window (0 when none).
	pub parent_window: u64,
	/// Initial bounds within the parent.
	pub bounds: Rect,
	/// Render off-screen instead of into a native window.
	pub windowless_rendering_enabled: bool,
	/// Deliver off-screen frames through a shared GPU texture.
	pub shared_texture_enabled: bool,
}

impl WindowInfo {
	/// Windowed browser parented to `parent_window`.
	pub fn as_child(parent_window: u64, bounds: Rect) -> Self {
		Self {
			parent_window,
			bounds,
			..Self::default()
		}
	}

	/// Off-screen browser; paint events are delivered to the embedder.
	pub fn as_windowless(parent_window: u64) -> Self {
		Self {
			parent_window,
			windowless_rendering_enabled: true,
			..Self::default()
		}
	}
}

/// Per-browser engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserSettings {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub default_encoding: Option<String>,
	pub javascript_enabled: bool,
	pub windowless_frame_rate: u32,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub background_color: Option<u32>,
}

impl Default for BrowserSettings {
	fn default() -> Self {
		Self {
			default_encoding: None,
			javascript_enabled: true,
			windowless_frame_rate: 30,
			background_color: None,
		}
	}
}

/// Isolation context (cache, cookies) a browser is created in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
	/// On-disk cache location; in-memory when `None`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub cache_path: Option<String>,
	pub persist_session_cookies: bool,
}
