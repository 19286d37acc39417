//! Optional control channel to an out-of-process browser host.
//!
//! When out-of-process messaging is enabled the adapter opens one
//! [`BrowserProcessServiceHost`] per created browser through a
//! [`ServiceHostFactory`]. On teardown the host is either closed gracefully
//! within a timeout or aborted immediately; a close that overruns its timeout
//! is not fatal and is followed by an abort.

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use cefbind_protocol::BrowserId;

use crate::error::{Error, Result};

const CLOSE_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Lifecycle of a control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
	Opened,
	Closing,
	Closed,
	Faulted,
}

/// A closeable service endpoint.
pub trait ControlChannel: Send {
	/// Closes gracefully, blocking for at most `timeout`.
	///
	/// Returns [`Error::ChannelTeardown`] when the peer did not finish in time.
	fn close(&mut self, timeout: Duration) -> Result<()>;

	/// Tears the channel down immediately. Must not block.
	fn abort(&mut self);

	fn state(&self) -> ChannelState;
}

/// Opens a control channel for a freshly created browser.
pub trait ServiceHostFactory: Send + Sync {
	fn open(&self, browser_id: BrowserId) -> Result<Box<dyn ControlChannel>>;
}

/// How a service host ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
	/// Graceful close finished within the timeout.
	Closed,
	/// No timeout configured; aborted straight away.
	Aborted,
	/// Graceful close overran the timeout; aborted afterwards.
	AbortedAfterTimeout,
}

/// Control channel owned by the browser adapter for one browser.
pub struct BrowserProcessServiceHost {
	browser_id: BrowserId,
	channel: Box<dyn ControlChannel>,
}

impl BrowserProcessServiceHost {
	pub fn new(browser_id: BrowserId, channel: Box<dyn ControlChannel>) -> Self {
		tracing::debug!(browser_id, "Opened browser process service host");
		Self { browser_id, channel }
	}

	/// Opens a host through `factory`.
	pub fn open(factory: &dyn ServiceHostFactory, browser_id: BrowserId) -> Result<Self> {
		Ok(Self::new(browser_id, factory.open(browser_id)?))
	}

	pub fn browser_id(&self) -> BrowserId {
		self.browser_id
	}

	pub fn state(&self) -> ChannelState {
		self.channel.state()
	}

	/// Closes within `timeout`, or aborts when `timeout` is `None` or zero.
	pub fn shutdown(mut self, timeout: Option<Duration>) -> ShutdownOutcome {
		match timeout.filter(|t| !t.is_zero()) {
			Some(limit) => match self.channel.close(limit) {
				Ok(()) => {
					tracing::debug!(browser_id = self.browser_id, "Service host closed");
					ShutdownOutcome::Closed
				}
				Err(e) => {
					tracing::warn!(
						browser_id = self.browser_id,
						error = %e,
						"Service host close failed; aborting"
					);
					self.channel.abort();
					ShutdownOutcome::AbortedAfterTimeout
				}
			},
			None => {
				self.channel.abort();
				tracing::debug!(browser_id = self.browser_id, "Service host aborted");
				ShutdownOutcome::Aborted
			}
		}
	}
}

impl std::fmt::Debug for BrowserProcessServiceHost {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("BrowserProcessServiceHost")
			.field("browser_id", &self.browser_id)
			.field("state", &self.channel.state())
			.finish()
	}
}

/// Control channel backed by a browser-process host child process.
///
/// The host is expected to exit once its stdin closes; that is the graceful
/// close. Abort kills the process and reaps it without blocking the caller.
#[derive(Debug)]
pub struct ProcessChannel {
	pid: u32,
	child: Option<Child>,
	state: ChannelState,
}

impl ProcessChannel {
	/// Spawns `command` with a piped stdin.
	pub fn spawn(mut command: Command) -> Result<Self> {
		let child = command
			.stdin(Stdio::piped())
			.stdout(Stdio::null())
			.stderr(Stdio::inherit())
			.spawn()?;
		let pid = child.id();
		tracing::debug!(pid, "Spawned browser process host");
		Ok(Self {
			pid,
			child: Some(child),
			state: ChannelState::Opened,
		})
	}

	pub fn id(&self) -> u32 {
		self.pid
	}
}

/// Waits for a killed host on a detached thread if it has not exited yet.
fn reap(pid: u32, mut child: Child) {
	match child.try_wait() {
		Ok(Some(status)) => {
			tracing::debug!(pid, %status, "Browser process host reaped");
			return;
		}
		Ok(None) => {}
		Err(e) => {
			tracing::warn!(pid, error = %e, "Failed to poll killed browser process host");
			return;
		}
	}

	let spawned = std::thread::Builder::new()
		.name(format!("host-reaper-{pid}"))
		.spawn(move || match child.wait() {
			Ok(status) => tracing::debug!(pid, %status, "Browser process host reaped"),
			Err(e) => tracing::warn!(pid, error = %e, "Failed to reap browser process host"),
		});
	if let Err(e) = spawned {
		tracing::warn!(pid, error = %e, "Could not start reaper for browser process host");
	}
}

impl ControlChannel for ProcessChannel {
	fn close(&mut self, timeout: Duration) -> Result<()> {
		let Some(child) = self.child.as_mut() else {
			return Ok(());
		};
		self.state = ChannelState::Closing;
		drop(child.stdin.take());

		let deadline = Instant::now() + timeout;
		loop {
			match child.try_wait() {
				Ok(Some(status)) => {
					self.state = ChannelState::Closed;
					self.child = None;
					tracing::debug!(pid = self.pid, %status, "Browser process host exited");
					return Ok(());
				}
				Ok(None) if Instant::now() >= deadline => {
					self.state = ChannelState::Faulted;
					return Err(Error::ChannelTeardown(format!(
						"browser process host {} still running after {timeout:?}",
						self.pid
					)));
				}
				Ok(None) => std::thread::sleep(CLOSE_POLL_INTERVAL),
				Err(e) => {
					self.state = ChannelState::Faulted;
					return Err(e.into());
				}
			}
		}
	}

	fn abort(&mut self) {
		self.state = ChannelState::Closed;
		let Some(mut child) = self.child.take() else {
			return;
		};
		drop(child.stdin.take());
		if let Err(e) = child.kill() {
			tracing::debug!(pid = self.pid, error = %e, "Kill of browser process host failed");
		}
		reap(self.pid, child);
	}

	fn state(&self) -> ChannelState {
		self.state
	}
}

impl Drop for ProcessChannel {
	fn drop(&mut self) {
		if self.child.is_some() {
			self.abort();
		}
	}
}

/// Launches one browser-process host executable per browser.
///
/// The host receives `--host-process-id=<pid>` and `--browser-id=<id>` after
/// the configured arguments.
#[derive(Debug, Clone)]
pub struct ProcessServiceHostFactory {
	program: PathBuf,
	args: Vec<String>,
}

impl ProcessServiceHostFactory {
	pub fn new(program: impl Into<PathBuf>) -> Self {
		Self {
			program: program.into(),
			args: Vec::new(),
		}
	}

	pub fn arg(mut self, arg: impl Into<String>) -> Self {
		self.args.push(arg.into());
		self
	}
}

impl ServiceHostFactory for ProcessServiceHostFactory {
	fn open(&self, browser_id: BrowserId) -> Result<Box<dyn ControlChannel>> {
		let mut command = Command::new(&self.program);
		command
			.args(&self.args)
			.arg(format!("--host-process-id={}", std::process::id()))
			.arg(format!("--browser-id={browser_id}"));
		Ok(Box::new(ProcessChannel::spawn(command)?))
	}
}
