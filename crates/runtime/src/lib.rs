//! Browser adapter runtime - the pieces the adapter owns
//!
//! This crate provides everything the browser adapter needs that does not
//! talk to the engine directly:
//!
//! - **Scheduling**: A single logical thread that runs host-side work in order
//! - **Object repository**: Host objects exposed to script, keyed by name
//! - **Method runner queue**: FIFO marshaling of script-to-host calls onto the scheduler
//! - **Pending tasks**: Correlation table for requests awaiting a render-process answer
//! - **Callbacks**: Handles for script-side function values passed to the host
//! - **Service host**: Optional control channel to an out-of-process browser host
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │     cefbind      │  BrowserAdapter, ClientAdapter
//! └────────┬─────────┘
//!          │ owns
//! ┌────────▼─────────┐
//! │ cefbind-runtime  │  This crate
//! │  ┌────────────┐  │
//! │  │ Queue      │──┼──► TaskScheduler
//! │  └─────┬──────┘  │
//! │  ┌─────▼──────┐  │
//! │  │ Repository │  │
//! │  └────────────┘  │
//! │  ┌────────────┐  │
//! │  │ Callbacks  │──┼──► PendingTaskRepository
//! │  └────────────┘  │
//! └──────────────────┘
//! ```

pub mod callback;
pub mod error;
pub mod method_queue;
pub mod object_repository;
pub mod pending_tasks;
pub mod scheduler;
pub mod service_host;

pub use callback::{CallbackDispatcher, JavascriptCallback, JavascriptCallbackFactory};
pub use error::{Error, Result};
pub use method_queue::{CompletionHandler, HandlerId, MethodRunnerQueue};
pub use object_repository::{
	BindingOptions, BoundObject, InvokeError, JavascriptObject, JavascriptObjectRepository, MethodDescription,
};
pub use pending_tasks::{PendingTask, PendingTaskRepository};
pub use scheduler::{Job, SerialScheduler, TaskScheduler};
pub use service_host::{
	BrowserProcessServiceHost, ChannelState, ControlChannel, ProcessChannel, ProcessServiceHostFactory,
	ServiceHostFactory, ShutdownOutcome,
};
