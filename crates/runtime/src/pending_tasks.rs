//! Correlation table for requests awaiting an answer from the render process.
//!
//! Two tables share one id sequence: plain pending tasks (script evaluation)
//! and callback pending tasks (executing a script-side function value). Each
//! entry holds the sending half of a oneshot channel; the [`PendingTask`]
//! future holds the receiving half.
//!
//! Dropping a [`PendingTask`] before it resolves removes its entry, so
//! abandoned waits (timeouts, cancelled futures) never leak. After
//! [`release`](PendingTaskRepository::release) every outstanding sender is
//! dropped and every waiter resolves to [`Error::CallbackInvalid`].

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::{Error, Result};

type TaskMap<T> = HashMap<i64, oneshot::Sender<T>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskKind {
	Plain,
	Callback,
}

pub struct PendingTaskRepository<T> {
	pending: Mutex<TaskMap<T>>,
	callback_pending: Mutex<TaskMap<T>>,
	last_id: AtomicI64,
	released: AtomicBool,
}

impl<T: Send + 'static> Default for PendingTaskRepository<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T: Send + 'static> PendingTaskRepository<T> {
	pub fn new() -> Self {
		Self {
			pending: Mutex::new(HashMap::new()),
			callback_pending: Mutex::new(HashMap::new()),
			last_id: AtomicI64::new(0),
			released: AtomicBool::new(false),
		}
	}

	/// Creates an entry in the plain table.
	pub fn create_pending_task(self: &Arc<Self>) -> Result<PendingTask<T>> {
		self.create(TaskKind::Plain)
	}

	/// Creates an entry in the callback table.
	pub fn create_callback_pending_task(self: &Arc<Self>) -> Result<PendingTask<T>> {
		self.create(TaskKind::Callback)
	}

	/// Resolves a plain entry. Returns false if no such entry exists.
	pub fn complete_pending_task(&self, id: i64, value: T) -> bool {
		self.complete(TaskKind::Plain, id, value)
	}

	/// Resolves a callback entry. Returns false if no such entry exists.
	pub fn complete_callback_pending_task(&self, id: i64, value: T) -> bool {
		self.complete(TaskKind::Callback, id, value)
	}

	/// Drops every outstanding entry and refuses new ones.
	pub fn release(&self) {
		if self.released.swap(true, Ordering::SeqCst) {
			return;
		}
		let plain = std::mem::take(&mut *self.pending.lock());
		let callbacks = std::mem::take(&mut *self.callback_pending.lock());
		tracing::debug!(
			pending = plain.len(),
			callbacks = callbacks.len(),
			"Released pending task repository"
		);
	}

	pub fn is_released(&self) -> bool {
		self.released.load(Ordering::SeqCst)
	}

	/// Outstanding entries across both tables.
	pub fn len(&self) -> usize {
		self.pending.lock().len() + self.callback_pending.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn table(&self, kind: TaskKind) -> &Mutex<TaskMap<T>> {
		match kind {
			TaskKind::Plain => &self.pending,
			TaskKind::Callback => &self.callback_pending,
		}
	}

	fn create(self: &Arc<Self>, kind: TaskKind) -> Result<PendingTask<T>> {
		let (tx, rx) = oneshot::channel();
		let id = {
			let mut table = self.table(kind).lock();
			if self.is_released() {
				return Err(Error::CallbackInvalid(
					"pending task repository has been released".into(),
				));
			}
			let id = self.last_id.fetch_add(1, Ordering::SeqCst) + 1;
			table.insert(id, tx);
			id
		};

		Ok(PendingTask {
			id,
			rx,
			guard: PendingGuard {
				id,
				kind,
				repository: Arc::downgrade(self),
				completed: false,
			},
		})
	}

	fn complete(&self, kind: TaskKind, id: i64, value: T) -> bool {
		let Some(tx) = self.table(kind).lock().remove(&id) else {
			tracing::debug!(id, ?kind, "No pending task to complete");
			return false;
		};
		tx.send(value).is_ok()
	}

	fn remove(&self, kind: TaskKind, id: i64) {
		if self.table(kind).lock().remove(&id).is_some() {
			tracing::debug!(id, ?kind, "Removed abandoned pending task");
		}
	}
}

/// Removes the entry if the waiting future goes away unresolved.
struct PendingGuard<T: Send + 'static> {
	id: i64,
	kind: TaskKind,
	repository: Weak<PendingTaskRepository<T>>,
	completed: bool,
}

impl<T: Send + 'static> Drop for PendingGuard<T> {
	fn drop(&mut self) {
		if self.completed {
			return;
		}
		if let Some(repository) = self.repository.upgrade() {
			repository.remove(self.kind, self.id);
		}
	}
}

/// Future resolving to the answer for one pending entry.
pub struct PendingTask<T: Send + 'static> {
	id: i64,
	rx: oneshot::Receiver<T>,
	guard: PendingGuard<T>,
}

impl<T: Send + 'static> PendingTask<T> {
	/// Id to send along with the request so the answer can be correlated.
	pub fn id(&self) -> i64 {
		self.id
	}

	/// Waits for the answer, optionally bounded by `timeout`.
	pub async fn wait(self, timeout: Option<Duration>) -> Result<T> {
		match timeout {
			Some(limit) => {
				let id = self.id;
				tokio::time::timeout(limit, self)
					.await
					.map_err(|_| Error::Timeout(format!("pending task {id} timed out after {limit:?}")))?
			}
			None => self.await,
		}
	}
}

impl<T: Send + 'static> Future for PendingTask<T> {
	type Output = Result<T>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		match Pin::new(&mut self.rx).poll(cx) {
			Poll::Ready(result) => {
				self.guard.completed = true;
				Poll::Ready(result.map_err(|_| {
					Error::CallbackInvalid("owning client adapter was released before an answer arrived".into())
				}))
			}
			Poll::Pending => Poll::Pending,
		}
	}
}
