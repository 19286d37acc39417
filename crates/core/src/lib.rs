//! cefbind: binds an embedded browser engine to a host application
//!
//! The [`BrowserAdapter`] is the one object an embedding application creates
//! per browser control. It owns:
//!
//! - the [`ClientAdapter`] the engine calls back into (windowed or off-screen)
//! - the [`JavascriptObjectRepository`] of host objects exposed to script
//! - the [`JavascriptCallbackFactory`] for script-side function values
//! - the [`MethodRunnerQueue`] that runs script-to-host calls on the
//!   application's scheduler
//! - an optional [`BrowserProcessServiceHost`] when out-of-process messaging
//!   is enabled
//!
//! and tears all of them down in a fixed order on [`BrowserAdapter::dispose`]
//! or drop.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use cefbind::{BindingSettings, BrowserAdapter, SerialScheduler};
//!
//! let scheduler = Arc::new(SerialScheduler::new("ui")?);
//! let adapter = BrowserAdapter::new(&web_browser, engine, false, scheduler, BindingSettings::from_env())?;
//! adapter.object_repository().register("bound", Arc::new(MyObject), Default::default())?;
//! adapter.create_browser(&window_info, &browser_settings, None, "https://example.com");
//! // ... engine reports creation through the client adapter ...
//! adapter.dispose();
//! ```

mod adapter;
mod client_adapter;
pub mod config;
pub mod engine;
#[cfg(feature = "logging")]
pub mod logging;
pub mod web_browser;

pub use adapter::BrowserAdapter;
pub use cefbind_protocol::{
	BrowserId, BrowserSettings, FrameId, JavascriptResponse, MethodInvocation, MethodInvocationResult,
	ProcessMessage, Rect, RequestContext, WindowInfo,
};
pub use cefbind_runtime::{
	BindingOptions, BoundObject, BrowserProcessServiceHost, CallbackDispatcher, ChannelState, ControlChannel,
	Error, InvokeError, JavascriptCallback, JavascriptCallbackFactory, JavascriptObject, JavascriptObjectRepository,
	MethodDescription, MethodRunnerQueue, ProcessChannel, ProcessServiceHostFactory, Result, SerialScheduler,
	ServiceHostFactory, ShutdownOutcome, TaskScheduler,
};
pub use client_adapter::{ClientAdapter, ClientKind};
pub use config::BindingSettings;
pub use engine::{Browser, Engine};
pub use web_browser::WebBrowserInternal;
