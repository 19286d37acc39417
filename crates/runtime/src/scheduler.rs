//! Scheduling context for host-side work.
//!
//! The [`TaskScheduler`] trait is the seam the embedding application plugs its
//! own UI-affine dispatcher into. [`SerialScheduler`] is the stock
//! implementation: one named worker thread that runs jobs in submission order.

use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle, ThreadId};

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::{Error, Result};

/// A unit of work handed to a scheduler.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs units of work on one consistent logical thread, in submission order.
pub trait TaskScheduler: Send + Sync {
	/// Submits `job` for execution.
	///
	/// Must not block and must not run `job` inline on the caller's thread.
	/// Returns [`Error::ChannelClosed`] when the scheduler no longer accepts work.
	fn schedule(&self, job: Job) -> Result<()>;
}

/// Scheduler backed by a dedicated worker thread.
pub struct SerialScheduler {
	tx: Mutex<Option<mpsc::UnboundedSender<Job>>>,
	worker: Mutex<Option<JoinHandle<()>>>,
	worker_id: ThreadId,
}

impl SerialScheduler {
	/// Spawns the worker thread.
	pub fn new(name: impl Into<String>) -> Result<Self> {
		let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
		let name = name.into();

		let worker = thread::Builder::new().name(name.clone()).spawn(move || {
			tracing::debug!(scheduler = %name, "Scheduler worker started");
			while let Some(job) = rx.blocking_recv() {
				if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
					tracing::error!(
						scheduler = %name,
						panic = %panic_message(payload.as_ref()),
						"Scheduled job panicked"
					);
				}
			}
			tracing::debug!(scheduler = %name, "Scheduler worker exiting");
		})?;

		Ok(Self {
			worker_id: worker.thread().id(),
			tx: Mutex::new(Some(tx)),
			worker: Mutex::new(Some(worker)),
		})
	}

	/// Returns the id of the worker thread every job runs on.
	pub fn thread_id(&self) -> ThreadId {
		self.worker_id
	}

	/// Stops accepting work, lets queued jobs finish, then joins the worker.
	///
	/// Calling this from a job running on the worker itself only closes the
	/// queue; the join is skipped.
	pub fn shutdown(&self) {
		drop(self.tx.lock().take());

		if thread::current().id() == self.worker_id {
			return;
		}

		if let Some(worker) = self.worker.lock().take() {
			if worker.join().is_err() {
				tracing::warn!("Scheduler worker terminated abnormally");
			}
		}
	}
}

impl TaskScheduler for SerialScheduler {
	fn schedule(&self, job: Job) -> Result<()> {
		let guard = self.tx.lock();
		let tx = guard.as_ref().ok_or(Error::ChannelClosed)?;
		tx.send(job).map_err(|_| Error::ChannelClosed)
	}
}

impl std::fmt::Debug for SerialScheduler {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SerialScheduler")
			.field("worker_id", &self.worker_id)
			.field("accepting", &self.tx.lock().is_some())
			.finish()
	}
}

/// Extracts a printable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
	if let Some(s) = payload.downcast_ref::<&str>() {
		(*s).to_string()
	} else if let Some(s) = payload.downcast_ref::<String>() {
		s.clone()
	} else {
		"unknown panic".to_string()
	}
}
