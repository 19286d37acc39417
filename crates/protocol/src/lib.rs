//! Wire types shared by the browser adapter and the render process.
//!
//! Nothing in here knows about threads, engines or lifetimes. These are plain
//! serde shapes:
//!
//! - [`MethodInvocation`] / [`MethodInvocationResult`] - script to host calls
//! - [`JavascriptResponse`] - the result of evaluating script or running a callback
//! - [`ProcessMessage`] - every message routed between the browser and render processes
//! - [`WindowInfo`], [`BrowserSettings`], [`RequestContext`] - creation parameters
//!   passed through to the engine untouched

pub mod browser;
pub mod invocation;
pub mod message;

pub use browser::{BrowserSettings, Rect, RequestContext, WindowInfo};
pub use invocation::{JavascriptResponse, MethodInvocation, MethodInvocationResult};
pub use message::ProcessMessage;

/// Identifier the engine assigns to a browser instance.
pub type BrowserId = i32;

/// Identifier the engine assigns to a frame within a browser.
pub type FrameId = i64;
