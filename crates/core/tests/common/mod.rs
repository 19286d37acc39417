//! In-memory engine, browser and browser control for adapter tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::time::Duration;

use cefbind::{
	BindingSettings, Browser, BrowserAdapter, BrowserId, BrowserSettings, ChannelState, ClientAdapter, ControlChannel,
	Engine, FrameId, JavascriptResponse, ProcessMessage, Rect, RequestContext, Result, SerialScheduler,
	ServiceHostFactory, WebBrowserInternal, WindowInfo,
};
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::mpsc;

/// What happened to a fake browser, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserEvent {
	Closed { force: bool, client_released: bool },
	Resized(i32, i32),
	WasResized,
}

/// Browser that answers render-process requests itself.
///
/// Script evaluation answers with the script length; callback execution
/// echoes its first parameter.
pub struct FakeBrowser {
	id: BrowserId,
	popup: bool,
	client: Arc<ClientAdapter>,
	pub events: Mutex<Vec<BrowserEvent>>,
	outbox: mpsc::UnboundedSender<(FrameId, ProcessMessage)>,
	pub live_frames: Vec<FrameId>,
}

impl FakeBrowser {
	pub fn id(&self) -> BrowserId {
		self.id
	}

	pub fn close_count(&self) -> usize {
		self.events
			.lock()
			.iter()
			.filter(|e| matches!(e, BrowserEvent::Closed { .. }))
			.count()
	}
}

impl Browser for FakeBrowser {
	fn identifier(&self) -> BrowserId {
		self.id
	}

	fn is_popup(&self) -> bool {
		self.popup
	}

	fn close_browser(&self, force: bool) {
		self.events.lock().push(BrowserEvent::Closed {
			force,
			client_released: self.client.is_released(),
		});
		self.client.on_before_close(self.id);
	}

	fn resize(&self, width: i32, height: i32) {
		self.events.lock().push(BrowserEvent::Resized(width, height));
	}

	fn was_resized(&self) {
		self.events.lock().push(BrowserEvent::WasResized);
	}

	fn send_process_message(&self, frame_id: FrameId, message: ProcessMessage) -> bool {
		if !self.live_frames.contains(&frame_id) {
			return false;
		}
		let reply = match &message {
			ProcessMessage::EvaluateScript { task_id, script } => Some(ProcessMessage::EvaluateScriptDone {
				task_id: *task_id,
				response: JavascriptResponse::ok(json!(script.len())),
			}),
			ProcessMessage::CallbackExecute { task_id, parameters, .. } => Some(ProcessMessage::CallbackDone {
				task_id: *task_id,
				response: JavascriptResponse::ok(parameters.first().cloned().unwrap_or_default()),
			}),
			_ => None,
		};
		let _ = self.outbox.send((frame_id, message));
		if let Some(reply) = reply {
			self.client.on_process_message_received(self.id, frame_id, reply);
		}
		true
	}
}

/// Engine that records creation requests; tests finish creation by hand.
pub struct FakeEngine {
	initialized: bool,
	clients: Mutex<Vec<Arc<ClientAdapter>>>,
	requests: Mutex<Vec<String>>,
	next_id: AtomicI32,
}

impl FakeEngine {
	pub fn new() -> Arc<Self> {
		Self::with_initialized(true)
	}

	pub fn with_initialized(initialized: bool) -> Arc<Self> {
		Arc::new(Self {
			initialized,
			clients: Mutex::new(Vec::new()),
			requests: Mutex::new(Vec::new()),
			next_id: AtomicI32::new(1),
		})
	}

	pub fn requests(&self) -> Vec<String> {
		self.requests.lock().clone()
	}

	pub fn client(&self) -> Arc<ClientAdapter> {
		Arc::clone(self.clients.lock().last().expect("create_browser was never called"))
	}

	/// Reports a new browser to the most recent client, the way the engine
	/// does from its UI thread.
	pub fn finish_creation(
		&self,
		popup: bool,
	) -> (Arc<FakeBrowser>, mpsc::UnboundedReceiver<(FrameId, ProcessMessage)>) {
		let (outbox, inbox) = mpsc::unbounded_channel();
		let browser = Arc::new(FakeBrowser {
			id: self.next_id.fetch_add(1, Ordering::SeqCst),
			popup,
			client: self.client(),
			events: Mutex::new(Vec::new()),
			outbox,
			live_frames: vec![MAIN_FRAME],
		});
		self.client().on_after_created(browser.clone());
		(browser, inbox)
	}
}

pub const MAIN_FRAME: FrameId = 100;

impl Engine for FakeEngine {
	fn is_initialized(&self) -> bool {
		self.initialized
	}

	fn create_browser(
		&self,
		client: Arc<ClientAdapter>,
		_window_info: &WindowInfo,
		_settings: &BrowserSettings,
		_request_context: Option<&RequestContext>,
		address: &str,
	) -> bool {
		self.clients.lock().push(client);
		self.requests.lock().push(address.to_string());
		true
	}
}

/// Browser control that records forwarded notifications.
#[derive(Default)]
pub struct FakeWebBrowser {
	pub created: Mutex<Vec<BrowserId>>,
	pub closing: Mutex<Vec<BrowserId>>,
	pub paints: AtomicUsize,
	pub view: Option<Rect>,
}

impl WebBrowserInternal for FakeWebBrowser {
	fn on_after_browser_created(&self, browser: &Arc<dyn Browser>) {
		self.created.lock().push(browser.identifier());
	}

	fn on_browser_closing(&self, browser_id: BrowserId) {
		self.closing.lock().push(browser_id);
	}

	fn view_rect(&self) -> Option<Rect> {
		self.view
	}

	fn on_paint(&self, _browser_id: BrowserId, _dirty: Rect, _buffer: &[u8], _width: i32, _height: i32) {
		self.paints.fetch_add(1, Ordering::SeqCst);
	}
}

/// Everything a test needs to drive one adapter.
pub struct Harness {
	pub adapter: BrowserAdapter,
	pub engine: Arc<FakeEngine>,
	pub web_browser: Arc<FakeWebBrowser>,
	/// Keeps the weak back-reference alive.
	pub control: Arc<dyn WebBrowserInternal>,
	pub scheduler: Arc<SerialScheduler>,
}

impl Harness {
	pub fn new(off_screen: bool, settings: BindingSettings) -> Self {
		Self::with_web_browser(FakeWebBrowser::default(), off_screen, settings)
	}

	pub fn with_web_browser(web_browser: FakeWebBrowser, off_screen: bool, settings: BindingSettings) -> Self {
		cefbind::logging::init_logging(0);
		let engine = FakeEngine::new();
		let web_browser = Arc::new(web_browser);
		let control: Arc<dyn WebBrowserInternal> = web_browser.clone();
		let scheduler = Arc::new(SerialScheduler::new("adapter-test").expect("scheduler thread"));
		let adapter = BrowserAdapter::new(&control, engine.clone(), off_screen, scheduler.clone(), settings)
			.expect("adapter construction");
		Self {
			adapter,
			engine,
			web_browser,
			control,
			scheduler,
		}
	}

	/// `create_browser` followed by the engine reporting the main browser.
	pub fn create_main_browser(&self) -> (Arc<FakeBrowser>, mpsc::UnboundedReceiver<(FrameId, ProcessMessage)>) {
		self.adapter.create_browser(&WindowInfo::default(), &BrowserSettings::default(), None, "about:blank");
		self.engine.finish_creation(false)
	}
}

/// Records how a service host channel was shut down.
#[derive(Debug, Default)]
pub struct ChannelLog {
	pub opened: Vec<BrowserId>,
	pub closed_with: Vec<Duration>,
	pub aborted: usize,
}

pub struct ScriptedChannel {
	log: Arc<Mutex<ChannelLog>>,
	close_succeeds: bool,
	state: ChannelState,
}

impl ControlChannel for ScriptedChannel {
	fn close(&mut self, timeout: Duration) -> Result<()> {
		self.log.lock().closed_with.push(timeout);
		if self.close_succeeds {
			self.state = ChannelState::Closed;
			Ok(())
		} else {
			self.state = ChannelState::Faulted;
			Err(cefbind::Error::ChannelTeardown(format!("no answer within {timeout:?}")))
		}
	}

	fn abort(&mut self) {
		self.log.lock().aborted += 1;
		self.state = ChannelState::Closed;
	}

	fn state(&self) -> ChannelState {
		self.state
	}
}

pub struct ScriptedFactory {
	pub log: Arc<Mutex<ChannelLog>>,
	pub close_succeeds: bool,
}

impl ScriptedFactory {
	pub fn new(close_succeeds: bool) -> Arc<Self> {
		Arc::new(Self {
			log: Arc::new(Mutex::new(ChannelLog::default())),
			close_succeeds,
		})
	}
}

impl ServiceHostFactory for ScriptedFactory {
	fn open(&self, browser_id: BrowserId) -> Result<Box<dyn ControlChannel>> {
		self.log.lock().opened.push(browser_id);
		Ok(Box::new(ScriptedChannel {
			log: Arc::clone(&self.log),
			close_succeeds: self.close_succeeds,
			state: ChannelState::Opened,
		}))
	}
}

pub async fn next_message(
	inbox: &mut mpsc::UnboundedReceiver<(FrameId, ProcessMessage)>,
) -> (FrameId, ProcessMessage) {
	tokio::time::timeout(Duration::from_secs(5), inbox.recv())
		.await
		.expect("timed out waiting for a process message")
		.expect("browser outbox closed")
}
