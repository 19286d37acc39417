//! FIFO queue marshaling script-to-host method calls onto the scheduler.
//!
//! Any thread may [`enqueue`](MethodRunnerQueue::enqueue). Until
//! [`start`](MethodRunnerQueue::start) is called, requests accumulate in a
//! backlog; once running, each request is handed to the [`TaskScheduler`]
//! as its own job while the state lock is held, so the scheduler sees them in
//! exactly the order they were enqueued.
//!
//! # Stop semantics
//!
//! [`stop`](MethodRunnerQueue::stop) flips a shared flag that every scheduled
//! job checks before executing and again before notifying. Jobs already sitting
//! in the scheduler become no-ops and the backlog is dropped. A stopped queue
//! never restarts.


use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use cefbind_protocol::{MethodInvocation, MethodInvocationResult};
use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::object_repository::JavascriptObjectRepository;
use crate::scheduler::{TaskScheduler, panic_message};

/// Identifier returned by [`MethodRunnerQueue::subscribe`].
pub type HandlerId = u64;

/// Observer of the "method invocation complete" notification.
pub type CompletionHandler = Arc<dyn Fn(&MethodInvocationResult) + Send + Sync>;

enum QueueState {
	/// Not started yet; requests wait here in arrival order.
	Idle(VecDeque<MethodInvocation>),
	Running,
	Stopped,
}

struct QueueShared {
	repository: Arc<JavascriptObjectRepository>,
	scheduler: Arc<dyn TaskScheduler>,
	state: Mutex<QueueState>,
	stopped: AtomicBool,
	handlers: Mutex<IndexMap<HandlerId, CompletionHandler>>,
	next_handler_id: AtomicU64,
}

/// Single-consumer work queue for bound method invocations.
pub struct MethodRunnerQueue {
	shared: Arc<QueueShared>,
}

impl MethodRunnerQueue {
	pub fn new(repository: Arc<JavascriptObjectRepository>, scheduler: Arc<dyn TaskScheduler>) -> Self {
		Self {
			shared: Arc::new(QueueShared {
				repository,
				scheduler,
				state: Mutex::new(QueueState::Idle(VecDeque::new())),
				stopped: AtomicBool::new(false),
				handlers: Mutex::new(IndexMap::new()),
				next_handler_id: AtomicU64::new(1),
			}),
		}
	}

	/// Starts draining. Idempotent while running; ignored once stopped.
	pub fn start(&self) {
		let mut undeliverable = Vec::new();
		{
			let mut state = self.shared.state.lock();
			match std::mem::replace(&mut *state, QueueState::Running) {
				QueueState::Idle(backlog) => {
					tracing::debug!(backlog = backlog.len(), "Method runner queue started");
					for invocation in backlog {
						if let Err(invocation) = self.shared.dispatch(invocation) {
							undeliverable.push(invocation);
						}
					}
				}
				QueueState::Running => {}
				QueueState::Stopped => {
					*state = QueueState::Stopped;
					tracing::warn!("start() called on a stopped method runner queue; ignoring");
				}
			}
		}
		self.shared.fail_undeliverable(undeliverable);
	}

	/// Stops the queue. Nothing runs or notifies afterwards.
	pub fn stop(&self) {
		self.shared.stopped.store(true, Ordering::SeqCst);
		let previous = std::mem::replace(&mut *self.shared.state.lock(), QueueState::Stopped);
		if let QueueState::Idle(backlog) = previous {
			if !backlog.is_empty() {
				tracing::debug!(dropped = backlog.len(), "Method runner queue stopped before start");
			}
		}
		tracing::debug!("Method runner queue stopped");
	}

	/// Adds a request. Silently dropped once the queue is stopped.
	pub fn enqueue(&self, invocation: MethodInvocation) {
		let undeliverable = {
			let mut state = self.shared.state.lock();
			match &mut *state {
				QueueState::Idle(backlog) => {
					backlog.push_back(invocation);
					None
				}
				QueueState::Running => self.shared.dispatch(invocation).err(),
				QueueState::Stopped => {
					tracing::debug!(
						object = %invocation.object_name,
						method = %invocation.method_name,
						"Dropping invocation enqueued after stop"
					);
					None
				}
			}
		};
		self.shared.fail_undeliverable(undeliverable.into_iter().collect());
	}

	/// Registers a completion observer.
	pub fn subscribe(&self, handler: CompletionHandler) -> HandlerId {
		let id = self.shared.next_handler_id.fetch_add(1, Ordering::SeqCst);
		self.shared.handlers.lock().insert(id, handler);
		id
	}

	/// Removes a completion observer. Returns whether it was registered.
	pub fn unsubscribe(&self, id: HandlerId) -> bool {
		self.shared.handlers.lock().shift_remove(&id).is_some()
	}

	pub fn is_running(&self) -> bool {
		matches!(*self.shared.state.lock(), QueueState::Running)
	}

	pub fn is_stopped(&self) -> bool {
		self.shared.stopped.load(Ordering::SeqCst)
	}

	/// Requests waiting for [`start`](Self::start).
	pub fn backlog_len(&self) -> usize {
		match &*self.shared.state.lock() {
			QueueState::Idle(backlog) => backlog.len(),
			_ => 0,
		}
	}
}

impl QueueShared {
	/// Hands one request to the scheduler. Caller holds the state lock.
	fn dispatch(self: &Arc<Self>, invocation: MethodInvocation) -> Result<(), MethodInvocation> {
		let shared = Arc::clone(self);
		let pending = Arc::new(Mutex::new(Some(invocation)));
		let job_pending = Arc::clone(&pending);

		let scheduled = self.scheduler.schedule(Box::new(move || {
			if let Some(invocation) = job_pending.lock().take() {
				shared.run(invocation);
			}
		}));

		match scheduled {
			Ok(()) => Ok(()),
			Err(e) => {
				tracing::warn!(error = %e, "Scheduler rejected method invocation");
				// The job was never accepted, so the request is still ours.
				match pending.lock().take() {
					Some(invocation) => Err(invocation),
					None => Ok(()),
				}
			}
		}
	}

	fn run(&self, invocation: MethodInvocation) {
		if self.stopped.load(Ordering::SeqCst) {
			return;
		}

		let result = execute(&self.repository, &invocation);

		if self.stopped.load(Ordering::SeqCst) {
			return;
		}
		self.notify(&result);
	}

	fn notify(&self, result: &MethodInvocationResult) {
		let handlers: Vec<CompletionHandler> = self.handlers.lock().values().cloned().collect();
		for handler in handlers {
			handler(result);
		}
	}

	fn fail_undeliverable(&self, invocations: Vec<MethodInvocation>) {
		if self.stopped.load(Ordering::SeqCst) {
			return;
		}
		for invocation in invocations {
			let result = MethodInvocationResult::failure(&invocation, "method runner scheduler is unavailable");
			self.notify(&result);
		}
	}
}

/// Runs one invocation against the repository, turning every failure into a result.
fn execute(repository: &JavascriptObjectRepository, invocation: &MethodInvocation) -> MethodInvocationResult {
	let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
		repository.try_call_method(
			&invocation.object_name,
			&invocation.method_name,
			&invocation.parameters,
		)
	}));

	match outcome {
		Ok(Ok(value)) => MethodInvocationResult::success(invocation, value),
		Ok(Err(e)) => {
			tracing::debug!(
				object = %invocation.object_name,
				method = %invocation.method_name,
				error = %e,
				"Bound method failed"
			);
			MethodInvocationResult::failure(invocation, e.to_string())
		}
		Err(payload) => {
			let message = panic_message(payload.as_ref());
			tracing::warn!(
				object = %invocation.object_name,
				method = %invocation.method_name,
				panic = %message,
				"Bound method panicked"
			);
			MethodInvocationResult::failure(
				invocation,
				format!("{}.{} panicked: {message}", invocation.object_name, invocation.method_name),
			)
		}
	}
}
