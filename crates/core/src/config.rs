//! Binding-wide settings.
//!
//! Set once by the embedding application before any adapter is created.
//! [`BindingSettings::from_env`] lets the two scalar switches be flipped
//! without a rebuild:
//!
//! | variable | meaning |
//! |---|---|
//! | `CEFBIND_OUT_OF_PROCESS_MESSAGING` | `1`/`true` enables the service host |
//! | `CEFBIND_SERVICE_HOST_TIMEOUT_MS` | graceful close timeout; `0` aborts immediately |

use std::sync::Arc;
use std::time::Duration;

use cefbind_runtime::ServiceHostFactory;

pub const OUT_OF_PROCESS_MESSAGING_ENV: &str = "CEFBIND_OUT_OF_PROCESS_MESSAGING";
pub const SERVICE_HOST_TIMEOUT_ENV: &str = "CEFBIND_SERVICE_HOST_TIMEOUT_MS";

/// Default graceful close timeout for the service host.
pub const DEFAULT_SERVICE_HOST_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone)]
pub struct BindingSettings {
	/// Open a browser-process service host for every created browser.
	pub out_of_process_messaging: bool,
	/// Graceful close budget for the service host. `None` or zero aborts.
	pub service_host_timeout: Option<Duration>,
	/// Opens the service host's control channel.
	pub service_host_factory: Option<Arc<dyn ServiceHostFactory>>,
}

impl Default for BindingSettings {
	fn default() -> Self {
		Self {
			out_of_process_messaging: false,
			service_host_timeout: Some(DEFAULT_SERVICE_HOST_TIMEOUT),
			service_host_factory: None,
		}
	}
}

impl BindingSettings {
	/// Defaults overlaid with the `CEFBIND_*` environment variables.
	pub fn from_env() -> Self {
		Self::default().with_overrides(
			std::env::var(OUT_OF_PROCESS_MESSAGING_ENV).ok().as_deref(),
			std::env::var(SERVICE_HOST_TIMEOUT_ENV).ok().as_deref(),
		)
	}

	pub fn with_out_of_process_messaging(mut self, factory: Arc<dyn ServiceHostFactory>) -> Self {
		self.out_of_process_messaging = true;
		self.service_host_factory = Some(factory);
		self
	}

	pub fn with_service_host_timeout(mut self, timeout: Option<Duration>) -> Self {
		self.service_host_timeout = timeout;
		self
	}

	fn with_overrides(mut self, out_of_process: Option<&str>, timeout_ms: Option<&str>) -> Self {
		if let Some(raw) = out_of_process {
			match parse_flag(raw) {
				Some(enabled) => self.out_of_process_messaging = enabled,
				None => tracing::warn!(
					variable = OUT_OF_PROCESS_MESSAGING_ENV,
					value = raw,
					"Ignoring unparsable setting"
				),
			}
		}

		if let Some(raw) = timeout_ms {
			match raw.trim().parse::<u64>() {
				Ok(0) => self.service_host_timeout = None,
				Ok(ms) => self.service_host_timeout = Some(Duration::from_millis(ms)),
				Err(_) => tracing::warn!(variable = SERVICE_HOST_TIMEOUT_ENV, value = raw, "Ignoring unparsable setting"),
			}
		}

		self
	}
}

fn parse_flag(raw: &str) -> Option<bool> {
	match raw.trim().to_ascii_lowercase().as_str() {
		"1" | "true" | "yes" | "on" => Some(true),
		"0" | "false" | "no" | "off" | "" => Some(false),
		_ => None,
	}
}

impl std::fmt::Debug for BindingSettings {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("BindingSettings")
			.field("out_of_process_messaging", &self.out_of_process_messaging)
			.field("service_host_timeout", &self.service_host_timeout)
			.field("service_host_factory", &self.service_host_factory.is_some())
			.finish()
	}
}
