//! Property stores used by external lookup mode.
//!
//! [`Properties`] loads build properties from JSON, TOML, YAML or INI files
//! and flattens nested tables into dotted keys, so `{"app": {"url": "x"}}`
//! answers the token `$(app.url)`. [`EnvironmentProperties`] reads the
//! process environment and [`LayeredProperties`] chains several stores.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::Path;

use crate::DetokError;
use crate::DetokResult;
use crate::resolver::PropertyStore;

/// A flat map of evaluated properties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
	values: BTreeMap<String, String>,
}

impl Properties {
	/// Load a property file, picking the format from its extension.
	pub fn load(path: &Path) -> DetokResult<Self> {
		let format = path
			.extension()
			.and_then(|e| e.to_str())
			.unwrap_or("")
			.to_ascii_lowercase();
		Self::load_with_format(path, &format)
	}

	/// Load a property file with an explicit format (`json`, `toml`, `yaml`,
	/// `yml` or `ini`).
	pub fn load_with_format(path: &Path, format: &str) -> DetokResult<Self> {
		let path_display = path.display().to_string();
		let content = std::fs::read_to_string(path).map_err(|e| {
			DetokError::PropertyFile {
				path: path_display.clone(),
				reason: e.to_string(),
			}
		})?;

		Self::parse(&content, format, &path_display)
	}

	/// Parse property file content in the given format.
	pub fn parse(content: &str, format: &str, path_display: &str) -> DetokResult<Self> {
		let value = parse_property_file(content, format, path_display)?;
		let mut values = BTreeMap::new();
		flatten_value(None, value, &mut values);

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

impl PropertyStore for Properties {
	fn property(&self, key: &str) -> Option<Cow<'_, str>> {
		self.get(key).map(Cow::Borrowed)
	}
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		Self {
			values: iter
				.into_iter()
				.map(|(k, v)| (k.into(), v.into()))
				.collect(),
		}
	}
}

/// Properties read from the process environment at lookup time.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvironmentProperties;

impl PropertyStore for EnvironmentProperties {
	fn property(&self, key: &str) -> Option<Cow<'_, str>> {
		std::env::var(key).ok().map(Cow::Owned)
	}
}

/// A stack of stores consulted in order. The first store holding a
/// non-empty value for a key wins.
#[derive(Default)]
pub struct LayeredProperties {
	layers: Vec<Box<dyn PropertyStore>>,
}

impl LayeredProperties {
	pub fn new() -> Self {
		Self::default()
	}

	/// Append a store with lower precedence than those already added.
	#[must_use]
	pub fn with(mut self, store: impl PropertyStore + 'static) -> Self {
		self.push(store);
		self
	}

	pub fn push(&mut self, store: impl PropertyStore + 'static) {
		self.layers.push(Box::new(store));
	}

	pub fn len(&self) -> usize {
		self.layers.len()
	}

	pub fn is_empty(&self) -> bool {
		self.layers.is_empty()
	}
}

impl PropertyStore for LayeredProperties {
	fn property(&self, key: &str) -> Option<Cow<'_, str>> {
		self.layers
			.iter()
			.find_map(|layer| layer.property(key).filter(|value| !value.is_empty()))
	}
}

impl std::fmt::Debug for LayeredProperties {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("LayeredProperties")
			.field("layers", &self.layers.len())
			.finish()
	}
}

fn parse_property_file(
	content: &str,
	format: &str,
	path_display: &str,
) -> DetokResult<serde_json::Value> {
	let property_error = |reason: String| {
		DetokError::PropertyFile {
			path: path_display.to_string(),
			reason,
		}
	};

	match format {
		"json" => serde_json::from_str(content).map_err(|e| property_error(e.to_string())),
		"toml" => {
			let value: toml::Value =
				toml::from_str(content).map_err(|e| property_error(e.to_string()))?;
			Ok(toml_to_json(value))
		}
		"yaml" | "yml" => serde_yaml_ng::from_str(content).map_err(|e| property_error(e.to_string())),
		"ini" => serde_ini::from_str(content).map_err(|e| property_error(e.to_string())),
		other => Err(DetokError::UnsupportedPropertyFormat(other.to_string())),
	}
}

/// Flatten nested objects into dotted keys. Arrays use their index as the
/// key segment and `null` values are dropped.
fn flatten_value(
	prefix: Option<&str>,
	value: serde_json::Value,
	out: &mut BTreeMap<String, String>,
) {
	let join = |segment: &str| {
		match prefix {
			Some(prefix) => format!("{prefix}.{segment}"),
			None => segment.to_string(),
		}
	};

	match value {
		serde_json::Value::Null => {}
		serde_json::Value::Object(map) => {
			for (key, nested) in map {
				flatten_value(Some(&join(&key)), nested, out);
			}
		}
		serde_json::Value::Array(items) => {
			for (index, nested) in items.into_iter().enumerate() {
				flatten_value(Some(&join(&index.to_string())), nested, out);
			}
		}
		serde_json::Value::String(s) => {
			if let Some(key) = prefix {
				out.insert(key.to_string(), s);
			}
		}
		scalar => {
			if let Some(key) = prefix {
				out.insert(key.to_string(), scalar.to_string());
			}
		}
	}
}

/// Convert a `toml::Value` to a `serde_json::Value`. Datetimes and
/// non-finite floats become strings.
fn toml_to_json(value: toml::Value) -> serde_json::Value {
	match value {
		toml::Value::String(s) => serde_json::Value::String(s),
		toml::Value::Integer(i) => serde_json::Value::Number(i.into()),
		toml::Value::Float(f) => {
			serde_json::Number::from_f64(f).map_or_else(
				|| serde_json::Value::String(f.to_string()),
				serde_json::Value::Number,
			)
		}
		toml::Value::Boolean(b) => serde_json::Value::Bool(b),
		toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
		toml::Value::Array(items) => {
			serde_json::Value::Array(items.into_iter().map(toml_to_json).collect())
		}
		toml::Value::Table(table) => {
			serde_json::Value::Object(
				table
					.into_iter()
					.map(|(key, nested)| (key, toml_to_json(nested)))
					.collect(),
			)
		}
	}
}
