use std::path::PathBuf;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;

#[derive(Parser)]
#[command(
	author,
	version,
	about = "Stamp build-time values into text files by replacing $(Token) placeholders.",
	long_about = "detok scans text files for tokens such as `$(Version)` and replaces each one \
	              with a value from an explicit list of replacements or from property files and \
	              the environment.\n\nFiles are only rewritten when a token was replaced (or \
	              `--force-write` is set), and a token without a value stops the run so that \
	              no file is shipped with a literal placeholder.\n\nQuick start:\n  detok \
	              analyse --path dist/* --set Version=1.2.3   Check every token resolves\n  \
	              detok replace --path dist/* --set Version=1.2.3   Rewrite the files"
)]
pub struct DetokCli {
	#[command(subcommand)]
	pub command: Option<Commands>,

	/// Path to a config file. Defaults to `detok.toml`, `.detok.toml` or
	/// `.config/detok.toml` in the current directory.
	#[arg(long, short, global = true)]
	pub config: Option<PathBuf>,

	/// Enable verbose output.
	#[arg(long, short, global = true, default_value_t = false)]
	pub verbose: bool,

	/// Disable colored output.
	#[arg(long, global = true, default_value_t = false)]
	pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
	/// Check that every token resolves without writing any file.
	///
	/// Visits the target files, resolves every token, and reports which
	/// files would be rewritten. Exits with a non-zero status code when a
	/// token has no value, which makes it suitable as a CI gate before
	/// `detok replace`.
	#[command(alias = "analyze")]
	Analyse(RunArgs),
	/// Replace tokens and rewrite the files in place.
	///
	/// A file is only written when at least one token was replaced, unless
	/// `--force-write` is set. Read-only files are made writable before
	/// being rewritten.
	#[command(alias = "detokenise", alias = "detokenize")]
	Replace(RunArgs),
}

#[derive(Debug, Clone, Args)]
#[allow(clippy::struct_excessive_bools)]
pub struct RunArgs {
	/// Directory whose files are processed. A `*` anywhere in the path
	/// processes the whole tree, e.g. `dist/*`.
	#[arg(long, short, conflicts_with = "files")]
	pub path: Option<String>,

	/// A file to process. Repeat for several files. Every file must exist.
	#[arg(long = "file", short = 'f', value_name = "FILE")]
	pub files: Vec<PathBuf>,

	/// An explicit replacement. Repeat for several values. When any
	/// replacement is given, property files and the environment are not
	/// consulted.
	#[arg(long = "set", short = 's', value_name = "KEY=VALUE", value_parser = parse_key_value)]
	pub replacements: Vec<(String, String)>,

	/// A property file (json, toml, yaml, ini) used to resolve tokens when no
	/// explicit replacements are given. Nested keys are joined with `.`.
	#[arg(long = "properties", value_name = "FILE")]
	pub properties: Vec<PathBuf>,

	/// Resolve tokens from environment variables after property files.
	#[arg(long, default_value_t = false)]
	pub env: bool,

	/// Token pattern with exactly one capture group for the key.
	#[arg(long, value_name = "REGEX")]
	pub pattern: Option<String>,

	/// Encoding to write files in: ASCII, UTF8, Unicode, BigEndianUnicode,
	/// UTF32, UTF7 or a WHATWG label. Defaults to each file's own encoding.
	#[arg(long, value_name = "NAME")]
	pub encoding: Option<String>,

	/// Rewrite every visited file even when no token was replaced.
	#[arg(long, default_value_t = false)]
	pub force_write: bool,

	/// Print every processed file.
	#[arg(long, default_value_t = false)]
	pub display_files: bool,

	/// Gitignore-style pattern to skip during directory traversal. Repeat for
	/// several patterns.
	#[arg(long, value_name = "PATTERN")]
	pub exclude: Vec<String>,

	/// Output format for the run summary.
	#[arg(long, value_enum, default_value_t = OutputFormat::Text)]
	pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
	/// Human-readable text output with colors and formatting.
	Text,
	/// JSON output for programmatic consumption, including every processed
	/// file.
	Json,
}

/// Parse a `KEY=VALUE` pair. The value may be empty or contain `=`.
pub fn parse_key_value(input: &str) -> Result<(String, String), String> {
	let Some((key, value)) = input.split_once('=') else {
		return Err(format!("expected KEY=VALUE, got `{input}`"));
	};

	if key.is_empty() {
		return Err(format!("missing key in `{input}`"));
	}

	Ok((key.to_string(), value.to_string()))
}
