//! Method invocation requests and results.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{BrowserId, FrameId};

/// A script-initiated call of a method on a bound host object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodInvocation {
	/// Browser the call originated from.
	pub browser_id: BrowserId,
	/// Frame the call originated from.
	pub frame_id: FrameId,
	/// Script-side promise/callback correlation id, if the caller awaits a result.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub callback_id: Option<i64>,
	/// Name the object was registered under.
	pub object_name: String,
	/// JavaScript-facing method name.
	pub method_name: String,
	/// Positional arguments.
	#[serde(default)]
	pub parameters: Vec<Value>,
}

impl MethodInvocation {
	pub fn new(
		browser_id: BrowserId,
		frame_id: FrameId,
		object_name: impl Into<String>,
		method_name: impl Into<String>,
		parameters: Vec<Value>,
	) -> Self {
		Self {
			browser_id,
			frame_id,
			callback_id: None,
			object_name: object_name.into(),
			method_name: method_name.into(),
			parameters,
		}
	}

	/// Sets the callback id used to resolve the script-side promise.
	pub fn with_callback_id(mut self, callback_id: i64) -> Self {
		self.callback_id = Some(callback_id);
		self
	}
}

/// Outcome of running a [`MethodInvocation`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodInvocationResult {
	pub browser_id: BrowserId,
	pub frame_id: FrameId,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub callback_id: Option<i64>,
	pub object_name: String,
	pub method_name: String,
	/// Whether the method returned normally.
	pub success: bool,
	/// Returned value on success.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub result: Option<Value>,
	/// Failure description on error.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
}

impl MethodInvocationResult {
	pub fn success(invocation: &MethodInvocation, result: Value) -> Self {
		Self::from_invocation(invocation, true, Some(result), None)
	}

	pub fn failure(invocation: &MethodInvocation, message: impl Into<String>) -> Self {
		Self::from_invocation(invocation, false, None, Some(message.into()))
	}

	fn from_invocation(
		invocation: &MethodInvocation,
		success: bool,
		result: Option<Value>,
		message: Option<String>,
	) -> Self {
		Self {
			browser_id: invocation.browser_id,
			frame_id: invocation.frame_id,
			callback_id: invocation.callback_id,
			object_name: invocation.object_name.clone(),
			method_name: invocation.method_name.clone(),
			success,
			result,
			message,
		}
	}
}

/// Result of evaluating script or executing a script-side callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JavascriptResponse {
	pub success: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub result: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
}

impl JavascriptResponse {
	pub fn ok(result: Value) -> Self {
		Self {
			success: true,
			result: Some(result),
			message: None,
		}
	}

	pub fn error(message: impl Into<String>) -> Self {
		Self {
			success: false,
			result: None,
			message: Some(message.into()),
		}
	}
}
