//! Messages routed between the browser process and the render process.
//!
//! The render process emits [`ProcessMessage::MethodInvocationRequest`] when
//! script calls a bound method and answers host requests with the `*Done`
//! variants. The browser process sends the remaining variants.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::invocation::{JavascriptResponse, MethodInvocation, MethodInvocationResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProcessMessage {
	/// Script called a method on a bound object.
	MethodInvocationRequest(MethodInvocation),
	/// Host finished running a bound method.
	MethodInvocationResponse(MethodInvocationResult),
	/// Host asks the render process to evaluate script.
	EvaluateScript {
		/// Pending-task id used to correlate the answer.
		task_id: i64,
		script: String,
	},
	/// Render process finished evaluating script.
	EvaluateScriptDone {
		task_id: i64,
		response: JavascriptResponse,
	},
	/// Host asks the render process to run a script-side function value.
	CallbackExecute {
		callback_id: i64,
		task_id: i64,
		#[serde(default)]
		parameters: Vec<Value>,
	},
	/// Render process finished running a script-side function value.
	CallbackDone {
		task_id: i64,
		response: JavascriptResponse,
	},
	/// Host no longer references the script-side function value.
	CallbackDestroy { callback_id: i64 },
}

impl ProcessMessage {
	/// Returns the wire name of this message.
	pub fn name(&self) -> &'static str {
		match self {
			ProcessMessage::MethodInvocationRequest(_) => "method_invocation_request",
			ProcessMessage::MethodInvocationResponse(_) => "method_invocation_response",
			ProcessMessage::EvaluateScript { .. } => "evaluate_script",
			ProcessMessage::EvaluateScriptDone { .. } => "evaluate_script_done",
			ProcessMessage::CallbackExecute { .. } => "callback_execute",
			ProcessMessage::CallbackDone { .. } => "callback_done",
			ProcessMessage::CallbackDestroy { .. } => "callback_destroy",
		}
	}
}
