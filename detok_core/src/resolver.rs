use std::borrow::Cow;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

use serde::Deserialize;
use serde::Serialize;

use crate::DetokError;
use crate::DetokResult;

/// A single explicit replacement: every `$(key)` token becomes `value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacementEntry {
	pub key: String,
	pub value: String,
}

impl ReplacementEntry {
	pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
		Self {
			key: key.into(),
			value: value.into(),
		}
	}
}

/// A set of explicit replacements with unique, case-sensitive keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplacementSet {
	values: HashMap<String, String>,
}

impl ReplacementSet {
	/// Build a set from `entries`, rejecting the first repeated key.
	pub fn new(entries: impl IntoIterator<Item = ReplacementEntry>) -> DetokResult<Self> {
		let mut values = HashMap::new();

		for ReplacementEntry { key, value } in entries {
			match values.entry(key) {
				Entry::Occupied(occupied) => {
					return Err(DetokError::DuplicateKey(occupied.key().clone()));
				}
				Entry::Vacant(vacant) => {
					vacant.insert(value);
				}
			}
		}

		Ok(Self { values })
	}

	pub fn get(&self, key: &str) -> Option<&str> {
		self.values.get(key).map(String::as_str)
	}

	pub fn len(&self) -> usize {
		self.values.len()
	}

	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}
}

/// A read-only key to value lookup consulted in external lookup mode.
///
/// Stores are queried one key at a time and never enumerated.
pub trait PropertyStore {
	/// The evaluated value of `key`, if the store defines it.
	fn property(&self, key: &str) -> Option<Cow<'_, str>>;
}

#[allow(clippy::implicit_hasher)]
impl PropertyStore for HashMap<String, String> {
	fn property(&self, key: &str) -> Option<Cow<'_, str>> {
		self.get(key).map(|value| Cow::Borrowed(value.as_str()))
	}
}

impl PropertyStore for BTreeMap<String, String> {
	fn property(&self, key: &str) -> Option<Cow<'_, str>> {
		self.get(key).map(|value| Cow::Borrowed(value.as_str()))
	}
}

impl<T: PropertyStore + ?Sized> PropertyStore for &T {
	fn property(&self, key: &str) -> Option<Cow<'_, str>> {
		(**self).property(key)
	}
}

impl<T: PropertyStore + ?Sized> PropertyStore for Box<T> {
	fn property(&self, key: &str) -> Option<Cow<'_, str>> {
		(**self).property(key)
	}
}

/// Which resolver variant a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
	ExplicitMapping,
	ExternalLookup,
}

/// Resolves token keys to replacement values.
///
/// A run uses exactly one variant. The explicit variant never falls back to
/// a property store.
#[derive(Clone, Copy)]
pub enum Resolver<'a> {
	/// Look keys up in a caller-supplied replacement set.
	Explicit(&'a ReplacementSet),
	/// Look keys up in an external property store.
	External(&'a dyn PropertyStore),
}

impl<'a> Resolver<'a> {
	/// Select the resolver for a run: explicit when a replacement set is
	/// supplied, otherwise the property store.
	pub fn select(replacements: Option<&'a ReplacementSet>, store: &'a dyn PropertyStore) -> Self {
		match replacements {
			Some(set) => Self::Explicit(set),
			None => Self::External(store),
		}
	}

	pub fn mode(&self) -> Mode {
		match self {
			Self::Explicit(_) => Mode::ExplicitMapping,
			Self::External(_) => Mode::ExternalLookup,
		}
	}

	/// Resolve `key`. An explicit entry with an empty value still resolves;
	/// an external property must be non-empty.
	pub fn resolve(&self, key: &str) -> Option<Cow<'a, str>> {
		match *self {
			Self::Explicit(set) => set.get(key).map(Cow::Borrowed),
			Self::External(store) => store.property(key).filter(|value| !value.is_empty()),
		}
	}
}

impl std::fmt::Debug for Resolver<'_> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Explicit(set) => f.debug_tuple("Explicit").field(set).finish(),
			Self::External(_) => f.debug_tuple("External").finish_non_exhaustive(),
		}
	}
}
