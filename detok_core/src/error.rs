use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum DetokError {
	#[error(transparent)]
	#[diagnostic(code(detok::io_error))]
	Io(#[from] std::io::Error),

	#[error("invalid token pattern `{pattern}`: {reason}")]
	#[diagnostic(
		code(detok::invalid_pattern),
		help("the pattern must compile and contain exactly one capture group for the token key")
	)]
	InvalidPattern { pattern: String, reason: String },

	#[error("`{0}` is not a supported encoding name")]
	#[diagnostic(
		code(detok::unsupported_encoding),
		help(
			"supported encodings: ASCII, UTF8, Unicode, BigEndianUnicode, UTF32, UTF7, or a \
			 WHATWG label such as windows-1252"
		)
	)]
	UnsupportedEncoding(String),

	#[error("the directory does not exist: `{0}`")]
	#[diagnostic(code(detok::directory_not_found))]
	DirectoryNotFound(String),

	#[error("file not found: `{0}`")]
	#[diagnostic(code(detok::file_not_found))]
	FileNotFound(String),

	#[error("property not found: `{0}`")]
	#[diagnostic(
		code(detok::token_not_found),
		help("supply a replacement value for `{0}` or remove the token from the file")
	)]
	TokenNotFound(String),

	#[error("duplicate replacement key: `{0}`")]
	#[diagnostic(
		code(detok::duplicate_key),
		help("each replacement key must be unique within a run")
	)]
	DuplicateKey(String),

	#[error("symlink cycle detected at: `{path}`")]
	#[diagnostic(
		code(detok::symlink_cycle),
		help("remove the circular symlink or exclude this path")
	)]
	SymlinkCycle { path: String },

	#[error("failed to parse config file: {0}")]
	#[diagnostic(
		code(detok::config_parse),
		help("check that detok.toml is valid TOML")
	)]
	ConfigParse(String),

	#[error("failed to load property file `{path}`: {reason}")]
	#[diagnostic(code(detok::property_file))]
	PropertyFile { path: String, reason: String },

	#[error("unsupported property file format: `{0}`")]
	#[diagnostic(
		code(detok::unsupported_format),
		help("supported formats: json, toml, yaml, yml, ini")
	)]
	UnsupportedPropertyFormat(String),

	#[error("failed to detokenise `{path}`")]
	#[diagnostic(code(detok::file))]
	File {
		path: String,
		#[source]
		source: Box<DetokError>,
	},
}

impl DetokError {
	/// Wrap this error with the path of the file being processed.
	pub fn in_file(self, path: impl Into<String>) -> Self {
		Self::File {
			path: path.into(),
			source: Box::new(self),
		}
	}

	/// The innermost error, skipping any [`DetokError::File`] wrappers.
	pub fn root_cause(&self) -> &DetokError {
		match self {
			Self::File { source, .. } => source.root_cause(),
			other => other,
		}
	}
}

pub type DetokResult<T> = Result<T, DetokError>;
pub type AnyError = Box<dyn std::error::Error>;
pub type AnyEmptyResult = Result<(), AnyError>;
