//! The browser adapter: owner and orchestrator of everything one browser
//! control needs.
//!
//! # Disposal
//!
//! All mutable state sits behind one lock together with the `disposed` flag.
//! Entry points that can race with teardown (browser creation reported by the
//! engine, lookups, resizes, script calls) check the flag and act under that
//! lock, so once [`BrowserAdapter::dispose`] has flipped it nothing new is
//! retained or run.
//!
//! Notifications to the embedding application are made while holding a
//! separate reentrant lifecycle gate, which teardown also takes to flip the
//! flag. A notification in flight finishes before disposal starts, and none
//! starts after.
//!
//! Teardown marks the adapter disposed, unsubscribes from and stops the
//! method runner queue in one critical section, takes every owned resource
//! out of the state, and then releases them outside the lock, in this order:
//!
//! 1. mark disposed
//! 2. unsubscribe from and stop the method runner queue
//! 3. release the client adapter
//! 4. force-close the live browser, then drop it
//! 5. close the service host within the configured timeout, or abort it
//! 6. drop the application back-reference and clear the object repository
//!
//! Every step tolerates its resource being absent. Dropping an adapter that
//! was never disposed runs the same teardown.

use std::sync::{Arc, Weak};

use cefbind_protocol::{BrowserId, BrowserSettings, MethodInvocation, MethodInvocationResult, RequestContext, WindowInfo};
use cefbind_runtime::{
	BrowserProcessServiceHost, CallbackDispatcher, Error, HandlerId, JavascriptCallbackFactory,
	JavascriptObjectRepository, MethodRunnerQueue, Result, TaskScheduler,
};
use parking_lot::{Mutex, ReentrantMutex};

use crate::client_adapter::{ClientAdapter, ClientKind};
use crate::config::BindingSettings;
use crate::engine::{Browser, Engine};
use crate::web_browser::WebBrowserInternal;

#[derive(Default)]
struct AdapterState {
	disposed: bool,
	client: Option<Arc<ClientAdapter>>,
	browser: Option<Arc<dyn Browser>>,
	service_host: Option<BrowserProcessServiceHost>,
	web_browser: Option<Weak<dyn WebBrowserInternal>>,
	completion_handler: Option<HandlerId>,
}

pub(crate) struct AdapterInner {
	state: Mutex<AdapterState>,
	lifecycle: ReentrantMutex<()>,
	kind: ClientKind,
	engine: Arc<dyn Engine>,
	settings: BindingSettings,
	object_repository: Arc<JavascriptObjectRepository>,
	method_runner_queue: Arc<MethodRunnerQueue>,
	callback_factory: Arc<JavascriptCallbackFactory>,
}

/// Binds one engine browser to the embedding application's browser control.
pub struct BrowserAdapter {
	inner: Arc<AdapterInner>,
}

impl BrowserAdapter {
	/// Builds the adapter and starts its method runner queue.
	///
	/// `off_screen_rendering` selects the client variant. Fails with
	/// [`Error::NativeAllocation`] when the engine cannot host a client.
	pub fn new(
		web_browser: &Arc<dyn WebBrowserInternal>,
		engine: Arc<dyn Engine>,
		off_screen_rendering: bool,
		scheduler: Arc<dyn TaskScheduler>,
		settings: BindingSettings,
	) -> Result<Self> {
		if !engine.is_initialized() {
			return Err(Error::NativeAllocation(
				"engine is not initialized; cannot allocate a client adapter".into(),
			));
		}

		let kind = if off_screen_rendering {
			ClientKind::OffScreen
		} else {
			ClientKind::Windowed
		};
		let web_browser = Arc::downgrade(web_browser);

		let inner = Arc::new_cyclic(|weak: &Weak<AdapterInner>| {
			let client = Arc::new(ClientAdapter::new(kind, web_browser.clone(), weak.clone()));
			let dispatcher: Weak<dyn CallbackDispatcher> = Arc::downgrade(&client) as Weak<dyn CallbackDispatcher>;
			let callback_factory = Arc::new(JavascriptCallbackFactory::new(client.pending_tasks(), dispatcher));

			let object_repository = Arc::new(JavascriptObjectRepository::new());
			let method_runner_queue = Arc::new(MethodRunnerQueue::new(Arc::clone(&object_repository), scheduler));

			let owner = weak.clone();
			let handler = method_runner_queue.subscribe(Arc::new(move |result: &MethodInvocationResult| {
				if let Some(adapter) = owner.upgrade() {
					adapter.on_method_invocation_complete(result);
				}
			}));

			AdapterInner {
				state: Mutex::new(AdapterState {
					client: Some(client),
					web_browser: Some(web_browser),
					completion_handler: Some(handler),
					..AdapterState::default()
				}),
				lifecycle: ReentrantMutex::new(()),
				kind,
				engine,
				settings,
				object_repository,
				method_runner_queue,
				callback_factory,
			}
		});

		inner.method_runner_queue.start();
		tracing::debug!(kind = ?kind, "Browser adapter created");
		Ok(Self { inner })
	}

	/// Asks the engine to create the browser. Creation completes later through
	/// [`on_after_browser_created`](Self::on_after_browser_created).
	///
	/// Failures are reported by the engine itself; a request after disposal is
	/// ignored.
	pub fn create_browser(
		&self,
		window_info: &WindowInfo,
		settings: &BrowserSettings,
		request_context: Option<&RequestContext>,
		address: &str,
	) {
		let client = {
			let state = self.inner.state.lock();
			match (state.disposed, state.client.clone()) {
				(false, Some(client)) => client,
				_ => {
					drop(state);
					tracing::warn!(address, "Browser creation requested after disposal; ignoring");
					return;
				}
			}
		};

		tracing::debug!(address, windowless = window_info.windowless_rendering_enabled, "Creating browser");
		if !self
			.inner
			.engine
			.create_browser(client, window_info, settings, request_context, address)
		{
			tracing::warn!(address, "Engine did not accept the browser creation request");
		}
	}

	/// Records the live browser reported by the engine.
	///
	/// After disposal the browser is force-closed and dropped instead.
	pub fn on_after_browser_created(&self, browser: Arc<dyn Browser>) {
		self.inner.on_after_browser_created(browser);
	}

	/// Forwards a size change to the live browser. No-op without one.
	pub fn resize(&self, width: i32, height: i32) {
		let Some(browser) = self.browser() else {
			return;
		};
		match self.inner.kind {
			ClientKind::OffScreen => browser.was_resized(),
			ClientKind::Windowed => browser.resize(width, height),
		}
	}

	/// The adapter's browser or one of its popups, if known and not disposed.
	pub fn get_browser(&self, browser_id: BrowserId) -> Option<Arc<dyn Browser>> {
		let (own, client) = {
			let state = self.inner.state.lock();
			if state.disposed {
				return None;
			}
			(state.browser.clone(), state.client.clone())
		};

		own.filter(|b| b.identifier() == browser_id)
			.or_else(|| client.and_then(|c| c.get_browser(browser_id)))
	}

	/// The live main browser, if created and not disposed.
	pub fn browser(&self) -> Option<Arc<dyn Browser>> {
		let state = self.inner.state.lock();
		if state.disposed {
			return None;
		}
		state.browser.clone()
	}

	/// The engine-facing client, until disposal releases it.
	pub fn client(&self) -> Option<Arc<ClientAdapter>> {
		self.inner.state.lock().client.clone()
	}

	pub fn is_disposed(&self) -> bool {
		self.inner.state.lock().disposed
	}

	pub fn is_off_screen(&self) -> bool {
		self.inner.kind == ClientKind::OffScreen
	}

	pub fn settings(&self) -> &BindingSettings {
		&self.inner.settings
	}

	pub fn callback_factory(&self) -> &JavascriptCallbackFactory {
		&self.inner.callback_factory
	}

	pub fn object_repository(&self) -> &Arc<JavascriptObjectRepository> {
		&self.inner.object_repository
	}

	pub fn method_runner_queue(&self) -> &MethodRunnerQueue {
		&self.inner.method_runner_queue
	}

	/// Whether an out-of-process service host is currently open.
	pub fn has_service_host(&self) -> bool {
		self.inner.state.lock().service_host.is_some()
	}

	/// Tears everything down in order. Idempotent.
	pub fn dispose(&self) {
		self.inner.teardown();
	}
}

impl Drop for BrowserAdapter {
	fn drop(&mut self) {
		self.inner.teardown();
	}
}

impl std::fmt::Debug for BrowserAdapter {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let state = self.inner.state.lock();
		f.debug_struct("BrowserAdapter")
			.field("kind", &self.inner.kind)
			.field("disposed", &state.disposed)
			.field("browser", &state.browser.as_ref().map(|b| b.identifier()))
			.field("service_host", &state.service_host)
			.finish()
	}
}

impl AdapterInner {
	pub(crate) fn method_runner_queue(&self) -> &MethodRunnerQueue {
		&self.method_runner_queue
	}

	pub(crate) fn on_after_browser_created(&self, browser: Arc<dyn Browser>) {
		let browser_id = browser.identifier();
		let (client, web_browser) = {
			let mut state = self.state.lock();
			if state.disposed {
				drop(state);
				tracing::warn!(browser_id, "Browser created after disposal started; closing it");
				browser.close_browser(true);
				return;
			}
			state.browser = Some(Arc::clone(&browser));
			(state.client.clone(), state.web_browser.clone())
		};

		// A released client means teardown owns the stored browser and closes it.
		if let Some(client) = client {
			if !client.attach_browser(Arc::clone(&browser)) {
				tracing::debug!(browser_id, "Client released while the browser was being attached");
				return;
			}
		}
		self.open_service_host(browser_id);

		let Some(web_browser) = web_browser.and_then(|w| w.upgrade()) else {
			return;
		};
		let _gate = self.lifecycle.lock();
		if self.state.lock().disposed {
			tracing::debug!(browser_id, "Disposed during browser creation; not notifying the application");
			return;
		}
		tracing::debug!(browser_id, "Browser created");
		web_browser.on_after_browser_created(&browser);
	}

	/// Queues a script call unless disposal has started.
	pub(crate) fn enqueue_invocation(&self, invocation: MethodInvocation) {
		if self.state.lock().disposed {
			tracing::debug!(
				object = %invocation.object_name,
				method = %invocation.method_name,
				"Dropping invocation for a disposed adapter"
			);
			return;
		}
		// Teardown stops the queue in the same critical section that sets `disposed`.
		self.method_runner_queue.enqueue(invocation);
	}

	fn open_service_host(&self, browser_id: BrowserId) {
		if !self.settings.out_of_process_messaging {
			return;
		}
		let Some(factory) = self.settings.service_host_factory.as_deref() else {
			tracing::warn!(browser_id, "Out-of-process messaging enabled without a service host factory");
			return;
		};

		let host = match BrowserProcessServiceHost::open(factory, browser_id) {
			Ok(host) => host,
			Err(e) => {
				tracing::error!(browser_id, error = %e, "Failed to open browser process service host");
				return;
			}
		};

		let mut state = self.state.lock();
		if state.disposed {
			drop(state);
			tracing::debug!(browser_id, "Disposed while the service host was opening; aborting it");
			host.shutdown(None);
			return;
		}
		let previous = state.service_host.replace(host);
		drop(state);
		if let Some(previous) = previous {
			tracing::warn!(browser_id = previous.browser_id(), "Replacing an open service host");
			previous.shutdown(self.settings.service_host_timeout);
		}
	}

	fn on_method_invocation_complete(&self, result: &MethodInvocationResult) {
		let client = {
			let state = self.state.lock();
			if state.disposed {
				return;
			}
			state.client.clone()
		};
		if let Some(client) = client {
			client.method_invocation_complete(result);
		}
	}

	fn teardown(&self) {
		let (client, browser, service_host, web_browser) = {
			let _gate = self.lifecycle.lock();
			let mut state = self.state.lock();
			if state.disposed {
				return;
			}
			state.disposed = true;
			if let Some(id) = state.completion_handler.take() {
				self.method_runner_queue.unsubscribe(id);
			}
			self.method_runner_queue.stop();
			(
				state.client.take(),
				state.browser.take(),
				state.service_host.take(),
				state.web_browser.take(),
			)
		};
		tracing::debug!(kind = ?self.kind, "Disposing browser adapter");

		if let Some(client) = client {
			client.release();
		}

		if let Some(browser) = browser {
			tracing::debug!(browser_id = browser.identifier(), "Force-closing browser");
			browser.close_browser(true);
		}

		if let Some(host) = service_host {
			let outcome = host.shutdown(self.settings.service_host_timeout);
			tracing::debug!(?outcome, "Service host shut down");
		}

		drop(web_browser);
		let unbound = self.object_repository.unregister_all();
		tracing::debug!(unbound, "Browser adapter disposed");
	}
}
