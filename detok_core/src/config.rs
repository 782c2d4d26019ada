use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;

use crate::DetokError;
use crate::DetokResult;
use crate::encoding::TextEncoding;
use crate::properties::EnvironmentProperties;
use crate::properties::LayeredProperties;
use crate::properties::Properties;
use crate::resolver::ReplacementEntry;
use crate::resolver::ReplacementSet;
use crate::traversal::FileTarget;

/// Supported config file locations in discovery order (highest precedence
/// first).
pub const CONFIG_FILE_CANDIDATES: [&str; 3] = ["detok.toml", ".detok.toml", ".config/detok.toml"];

/// Configuration loaded from a `detok.toml` file.
///
/// ```toml
/// token_pattern = '\$\(([0-9a-zA-Z\-._]+)\)'
/// encoding = "UTF8"
/// force_write = false
/// exclude = ["*.bak", "vendor/"]
///
/// [replacements]
/// Version = "1.2.3"
/// Environment = "staging"
///
/// [properties]
/// files = ["build.json"]
/// env = true
///
/// [[files]]
/// path = "app.config"
/// encoding = "Unicode"
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct DetokConfig {
	/// Token syntax. Must contain exactly one capture group for the key.
	#[serde(default)]
	pub token_pattern: Option<String>,
	/// Global write encoding name.
	#[serde(default)]
	pub encoding: Option<String>,
	/// Rewrite every visited file even when nothing matched.
	#[serde(default)]
	pub force_write: bool,
	/// Gitignore-style patterns skipped during directory traversal.
	#[serde(default)]
	pub exclude: Vec<String>,
	/// Explicit replacement values. When non-empty the run uses explicit
	/// mapping mode and property sources are ignored.
	#[serde(default)]
	pub replacements: BTreeMap<String, String>,
	/// Property sources for external lookup mode.
	#[serde(default)]
	pub properties: PropertiesConfig,
	/// Explicit file list, resolved relative to the config root.
	#[serde(default)]
	pub files: Vec<FileEntryConfig>,
}

/// `[properties]` section.
#[derive(Debug, Default, Deserialize)]
pub struct PropertiesConfig {
	/// Property files (json, toml, yaml, ini). Earlier files take precedence.
	#[serde(default)]
	pub files: Vec<PathBuf>,
	/// Fall back to environment variables.
	#[serde(default)]
	pub env: bool,
}

/// One `[[files]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct FileEntryConfig {
	pub path: PathBuf,
	/// Write encoding for this file only.
	#[serde(default)]
	pub encoding: Option<String>,
}

impl DetokConfig {
	/// Find the config file path by checking supported locations in order.
	pub fn resolve_path(root: &Path) -> Option<PathBuf> {
		CONFIG_FILE_CANDIDATES
			.iter()
			.map(|candidate| root.join(candidate))
			.find(|path| path.is_file())
	}

	/// Load the config from the first discovered config file at `root`.
	/// Returns `None` if no config file exists.
	pub fn load(root: &Path) -> DetokResult<Option<DetokConfig>> {
		let Some(config_path) = Self::resolve_path(root) else {
			return Ok(None);
		};

		Self::load_file(&config_path).map(Some)
	}

	/// Load the config from a specific file.
	pub fn load_file(path: &Path) -> DetokResult<DetokConfig> {
		let content = std::fs::read_to_string(path)?;
		Self::parse(&content)
	}

	pub fn parse(content: &str) -> DetokResult<DetokConfig> {
		toml::from_str(content).map_err(|e| DetokError::ConfigParse(e.to_string()))
	}

	/// The global write encoding, if configured.
	pub fn text_encoding(&self) -> DetokResult<Option<TextEncoding>> {
		self.encoding
			.as_deref()
			.map(TextEncoding::from_name)
			.transpose()
	}

	/// The configured replacements merged with `overrides`, or `None` when
	/// both are empty. An override replaces a configured entry with the same
	/// key. A key repeated within `overrides` is a [`DetokError::DuplicateKey`].
	pub fn replacement_set(
		&self,
		overrides: &[ReplacementEntry],
	) -> DetokResult<Option<ReplacementSet>> {
		if self.replacements.is_empty() && overrides.is_empty() {
			return Ok(None);
		}

		let configured = self
			.replacements
			.iter()
			.filter(|(key, _)| !overrides.iter().any(|entry| entry.key == **key))
			.map(|(key, value)| ReplacementEntry::new(key, value));

		ReplacementSet::new(configured.chain(overrides.iter().cloned())).map(Some)
	}

	/// Build the property store for external lookup.
	///
	/// `extra_files` take precedence over the configured files, which are
	/// resolved relative to `root`. The environment is appended when `env`
	/// is set, when `[properties] env` is enabled, or when no property file
	/// is configured at all.
	pub fn property_store(
		&self,
		root: &Path,
		extra_files: &[PathBuf],
		env: bool,
	) -> DetokResult<LayeredProperties> {
		let mut store = LayeredProperties::new();
		for file in extra_files {
			store.push(Properties::load(file)?);
		}
		for file in &self.properties.files {
			store.push(Properties::load(&root.join(file))?);
		}
		if env || self.properties.env || store.is_empty() {
			store.push(EnvironmentProperties);
		}
		Ok(store)
	}

	/// The `[[files]]` entries as file targets relative to `root`.
	pub fn file_targets(&self, root: &Path) -> DetokResult<Vec<FileTarget>> {
		self.files
			.iter()
			.map(|entry| {
				let target = FileTarget::new(root.join(&entry.path));
				match entry.encoding.as_deref() {
					Some(name) => Ok(target.with_encoding(TextEncoding::from_name(name)?)),
					None => Ok(target),
				}
			})
			.collect()
	}
}
