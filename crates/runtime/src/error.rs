//! Error types for the browser adapter runtime.

use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while brokering between the engine and the host.
#[derive(Debug, Error)]
pub enum Error {
	/// Native handle missing or browser not created yet.
	#[error("Resource unavailable: {0}")]
	ResourceUnavailable(String),

	/// Operation attempted after teardown started.
	#[error("Already disposed: cannot {0} after disposal has started")]
	AlreadyDisposed(&'static str),

	/// A bound method raised an error.
	#[error("{object}.{method} failed: {message}")]
	Invocation {
		object: String,
		method: String,
		message: String,
	},

	/// No object is registered under the requested name.
	#[error("Object not found: {0}")]
	ObjectNotFound(String),

	/// The object exists but exposes no such method.
	#[error("Method not found: {object}.{method}")]
	MethodNotFound { object: String, method: String },

	/// An object is already registered under this name.
	#[error("Object already bound with name '{0}'")]
	DuplicateName(String),

	/// Invalid argument provided to a method.
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),

	/// The callback's owning client adapter has been released.
	#[error("Callback no longer valid: {0}")]
	CallbackInvalid(String),

	/// Timeout waiting for an answer.
	#[error("Timeout: {0}")]
	Timeout(String),

	/// Graceful close of the out-of-process channel did not finish in time.
	#[error("Channel teardown failed: {0}")]
	ChannelTeardown(String),

	/// Channel closed unexpectedly.
	#[error("Channel closed unexpectedly")]
	ChannelClosed,

	/// The engine could not allocate the native client.
	#[error("Native allocation failed: {0}")]
	NativeAllocation(String),

	/// I/O error.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// JSON serialization/deserialization error.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

impl Error {
	/// Returns true if this error was raised because teardown had started.
	pub fn is_disposed(&self) -> bool {
		matches!(self, Error::AlreadyDisposed(_) | Error::CallbackInvalid(_))
	}

	/// Returns true if this is a timeout error.
	pub fn is_timeout(&self) -> bool {
		matches!(self, Error::Timeout(_) | Error::ChannelTeardown(_))
	}

	/// Returns false only for failures that must abort the whole component.
	pub fn is_recoverable(&self) -> bool {
		!matches!(self, Error::NativeAllocation(_))
	}
}
