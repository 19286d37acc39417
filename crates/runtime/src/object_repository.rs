//! Registry of host objects exposed to the script environment.
//!
//! Uses [`DashMap`] so the application thread can register objects while the
//! scheduler thread resolves invocations. Lookups clone the entry out before
//! calling into user code, so a bound method may itself register or
//! unregister objects without deadlocking.
//!
//! Registering a second object under a name that is already bound is
//! rejected with [`Error::DuplicateName`]; the first registration stays.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use downcast_rs::{DowncastSync, impl_downcast};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};

/// Error type bound methods return.
pub type InvokeError = Box<dyn std::error::Error + Send + Sync>;

/// A host object that script can call into.
pub trait BoundObject: DowncastSync {
	/// Describes the invocable methods, using host-side names.
	fn methods(&self) -> Vec<MethodDescription>;

	/// Runs `method` (host-side name) with positional `args`.
	fn invoke(&self, method: &str, args: &[Value]) -> std::result::Result<Value, InvokeError>;
}

impl_downcast!(sync BoundObject);

/// Metadata for one invocable method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodDescription {
	/// Host-side name passed back to [`BoundObject::invoke`].
	pub name: String,
	/// Name script uses; filled in at registration.
	pub javascript_name: String,
	/// Expected argument count, when the method is not variadic.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub parameter_count: Option<usize>,
}

impl MethodDescription {
	pub fn new(name: impl Into<String>) -> Self {
		let name = name.into();
		Self {
			javascript_name: name.clone(),
			name,
			parameter_count: None,
		}
	}

	pub fn with_parameter_count(mut self, count: usize) -> Self {
		self.parameter_count = Some(count);
		self
	}
}

/// Options applied when registering an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingOptions {
	/// Expose `GetValue` to script as `getValue`.
	pub camel_case_javascript_names: bool,
	/// Methods return promises in script instead of blocking the render process.
	pub is_async: bool,
}

impl Default for BindingOptions {
	fn default() -> Self {
		Self {
			camel_case_javascript_names: true,
			is_async: true,
		}
	}
}

/// A registered object plus its resolved method table.
pub struct JavascriptObject {
	id: i64,
	name: Arc<str>,
	is_async: bool,
	/// Keyed by JavaScript-facing name.
	methods: IndexMap<String, MethodDescription>,
	object: Arc<dyn BoundObject>,
}

impl JavascriptObject {
	pub fn id(&self) -> i64 {
		self.id
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn is_async(&self) -> bool {
		self.is_async
	}

	/// Methods in the order the object described them.
	pub fn methods(&self) -> impl Iterator<Item = &MethodDescription> {
		self.methods.values()
	}

	pub fn method(&self, javascript_name: &str) -> Option<&MethodDescription> {
		self.methods.get(javascript_name)
	}

	/// Returns the bound object as its concrete type.
	pub fn downcast<T: BoundObject>(&self) -> Option<Arc<T>> {
		Arc::clone(&self.object).downcast_arc::<T>().ok()
	}
}

impl std::fmt::Debug for JavascriptObject {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("JavascriptObject")
			.field("id", &self.id)
			.field("name", &self.name)
			.field("is_async", &self.is_async)
			.field("methods", &self.methods.keys().collect::<Vec<_>>())
			.finish()
	}
}

/// Thread-safe registry of bound objects by name.
pub struct JavascriptObjectRepository {
	objects: DashMap<Arc<str>, Arc<JavascriptObject>>,
	last_id: AtomicI64,
}

impl Default for JavascriptObjectRepository {
	fn default() -> Self {
		Self::new()
	}
}

impl JavascriptObjectRepository {
	pub fn new() -> Self {
		Self {
			objects: DashMap::new(),
			last_id: AtomicI64::new(0),
		}
	}

	/// Binds `object` under `name`.
	///
	/// # Errors
	///
	/// [`Error::DuplicateName`] if `name` is already bound,
	/// [`Error::InvalidArgument`] if `name` is empty.
	pub fn register(
		&self,
		name: &str,
		object: Arc<dyn BoundObject>,
		options: BindingOptions,
	) -> Result<Arc<JavascriptObject>> {
		if name.trim().is_empty() {
			return Err(Error::InvalidArgument("object name must not be empty".into()));
		}

		let key: Arc<str> = Arc::from(name);
		match self.objects.entry(key.clone()) {
			Entry::Occupied(_) => Err(Error::DuplicateName(name.to_string())),
			Entry::Vacant(slot) => {
				let methods = object
					.methods()
					.into_iter()
					.map(|mut m| {
						m.javascript_name = if options.camel_case_javascript_names {
							to_camel_case(&m.name)
						} else {
							m.name.clone()
						};
						(m.javascript_name.clone(), m)
					})
					.collect::<IndexMap<_, _>>();

				let entry = Arc::new(JavascriptObject {
					id: self.last_id.fetch_add(1, Ordering::SeqCst) + 1,
					name: key,
					is_async: options.is_async,
					methods,
					object,
				});

				tracing::debug!(
					object = name,
					id = entry.id,
					methods = entry.methods.len(),
					"Registered bound object"
				);
				slot.insert(Arc::clone(&entry));
				Ok(entry)
			}
		}
	}

	/// Removes the object bound under `name`. Returns whether one was bound.
	pub fn unregister(&self, name: &str) -> bool {
		let removed = self.objects.remove(name).is_some();
		if removed {
			tracing::debug!(object = name, "Unregistered bound object");
		}
		removed
	}

	/// Removes every bound object, returning how many there were.
	pub fn unregister_all(&self) -> usize {
		let count = self.objects.len();
		self.objects.clear();
		count
	}

	pub fn is_bound(&self, name: &str) -> bool {
		self.objects.contains_key(name)
	}

	pub fn has_bound_objects(&self) -> bool {
		!self.objects.is_empty()
	}

	/// Names of all bound objects, sorted.
	pub fn object_names(&self) -> Vec<String> {
		let mut names: Vec<String> = self.objects.iter().map(|e| e.key().to_string()).collect();
		names.sort();
		names
	}

	pub fn get(&self, name: &str) -> Option<Arc<JavascriptObject>> {
		self.objects.get(name).map(|e| Arc::clone(e.value()))
	}

	/// Resolves and runs `object_name.method_name(args)`.
	///
	/// The entry is cloned out of the map before user code runs.
	pub fn try_call_method(&self, object_name: &str, method_name: &str, args: &[Value]) -> Result<Value> {
		let object = self
			.get(object_name)
			.ok_or_else(|| Error::ObjectNotFound(object_name.to_string()))?;

		let method = object.method(method_name).ok_or_else(|| Error::MethodNotFound {
			object: object_name.to_string(),
			method: method_name.to_string(),
		})?;

		if let Some(expected) = method.parameter_count {
			if expected != args.len() {
				return Err(Error::InvalidArgument(format!(
					"{object_name}.{method_name} expects {expected} argument(s), got {}",
					args.len()
				)));
			}
		}

		object.object.invoke(&method.name, args).map_err(|e| Error::Invocation {
			object: object_name.to_string(),
			method: method_name.to_string(),
			message: e.to_string(),
		})
	}
}

fn to_camel_case(name: &str) -> String {
	let mut chars = name.chars();
	match chars.next() {
		Some(first) => first.to_lowercase().chain(chars).collect(),
		None => String::new(),
	}
}
