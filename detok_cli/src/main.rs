use std::path::Path;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use detok_cli::Commands;
use detok_cli::DetokCli;
use detok_cli::OutputFormat;
use detok_cli::RunArgs;
use detok_core::DetokConfig;
use detok_core::DetokError;
use detok_core::Detokeniser;
use detok_core::FileOutcome;
use detok_core::FileTarget;
use detok_core::Mode;
use detok_core::ReplacementEntry;
use detok_core::Resolver;
use detok_core::RunMode;
use detok_core::RunOptions;
use detok_core::RunResult;
use detok_core::TargetSource;
use detok_core::encoding::TextEncoding;
use detok_core::pattern::TokenPattern;
use detok_core::properties::LayeredProperties;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

static USE_COLOR: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(true);

fn color_enabled() -> bool {
	USE_COLOR.load(std::sync::atomic::Ordering::Relaxed)
}

/// Apply ANSI color codes only when color is enabled.
macro_rules! colored {
	($text:expr,red) => {
		if color_enabled() {
			format!("{}", $text.red())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,green) => {
		if color_enabled() {
			format!("{}", $text.green())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,dimmed) => {
		if color_enabled() {
			format!("{}", $text.dimmed())
		} else {
			format!("{}", $text)
		}
	};
}

fn main() {
	let args = DetokCli::parse();

	// Respect NO_COLOR env var, --no-color flag and terminal support.
	let use_color = !args.no_color
		&& std::env::var_os("NO_COLOR").is_none()
		&& supports_color::on(supports_color::Stream::Stdout).is_some();
	if !use_color {
		USE_COLOR.store(false, std::sync::atomic::Ordering::Relaxed);
	}

	// Install miette's fancy handler for rich error diagnostics.
	miette::set_hook(Box::new(move |_| {
		Box::new(
			miette::MietteHandlerOpts::new()
				.color(use_color)
				.unicode(use_color)
				.build(),
		)
	}))
	.ok();

	let result = match &args.command {
		Some(Commands::Analyse(run_args)) => {
			init_logging(args.verbose || run_args.display_files);
			run(&args, run_args, RunMode::Analyse)
		}
		Some(Commands::Replace(run_args)) => {
			init_logging(args.verbose || run_args.display_files);
			run(&args, run_args, RunMode::Replace)
		}
		None => {
			eprintln!("No subcommand specified. Run `detok --help` for usage.");
			process::exit(2);
		}
	};

	if let Err(e) = result {
		// Try to render through miette for rich diagnostics with help text
		// and error codes.
		match e.downcast::<DetokError>() {
			Ok(detok_err) => {
				let report: miette::Report = (*detok_err).into();
				eprintln!("{report:?}");
			}
			Err(e) => {
				eprintln!("{} {e}", colored!("error:", red));
			}
		}
		process::exit(2);
	}
}

/// Log to stderr. `DETOK_LOG` takes precedence over the verbosity flag.
fn init_logging(verbose: bool) {
	let default_level = if verbose { "debug" } else { "warn" };
	let filter =
		EnvFilter::try_from_env("DETOK_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_ansi(color_enabled())
		.without_time()
		.init();
}

/// Load the config from `--config` or discover it in the current directory.
/// Returns the config together with the directory its relative paths are
/// resolved against.
fn load_config(args: &DetokCli) -> Result<(DetokConfig, PathBuf), Box<dyn std::error::Error>> {
	let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

	if let Some(path) = &args.config {
		let config = DetokConfig::load_file(path)?;
		let root = path
			.parent()
			.filter(|parent| !parent.as_os_str().is_empty())
			.map_or_else(|| cwd.clone(), Path::to_path_buf);
		tracing::debug!(path = %path.display(), "loaded config");
		return Ok((config, root));
	}

	let config = match DetokConfig::load(&cwd)? {
		Some(config) => {
			tracing::debug!(root = %cwd.display(), "discovered config");
			config
		}
		None => DetokConfig::default(),
	};
	Ok((config, cwd))
}

fn target_source(
	config: &DetokConfig,
	root: &Path,
	run_args: &RunArgs,
) -> Result<TargetSource, Box<dyn std::error::Error>> {
	if let Some(path) = &run_args.path {
		return Ok(TargetSource::from_path(path));
	}

	if !run_args.files.is_empty() {
		return Ok(TargetSource::Files(
			run_args.files.iter().map(FileTarget::new).collect(),
		));
	}

	if !config.files.is_empty() {
		return Ok(TargetSource::Files(config.file_targets(root)?));
	}

	Err("no target files: pass `--path <DIR>` or `--file <FILE>`".into())
}

fn run(
	args: &DetokCli,
	run_args: &RunArgs,
	run_mode: RunMode,
) -> Result<(), Box<dyn std::error::Error>> {
	let (config, root) = load_config(args)?;

	// Everything that can fail on configuration is checked before any file
	// is touched.
	let pattern = match run_args.pattern.as_deref().or(config.token_pattern.as_deref()) {
		Some(pattern) => TokenPattern::new(pattern)?,
		None => TokenPattern::default(),
	};
	let encoding = match &run_args.encoding {
		Some(name) => Some(TextEncoding::from_name(name)?),
		None => config.text_encoding()?,
	};
	let source = target_source(&config, &root, run_args)?;
	let overrides: Vec<_> = run_args
		.replacements
		.iter()
		.map(|(key, value)| ReplacementEntry::new(key, value))
		.collect();
	let replacements = config.replacement_set(&overrides)?;
	let store = match replacements {
		Some(_) => LayeredProperties::new(),
		None => config.property_store(&root, &run_args.properties, run_args.env)?,
	};

	let mut exclude_patterns = config.exclude.clone();
	exclude_patterns.extend(run_args.exclude.iter().cloned());

	let detokeniser = Detokeniser::new(
		pattern,
		Resolver::select(replacements.as_ref(), &store),
		RunOptions {
			mode: run_mode,
			force_write: run_args.force_write || config.force_write,
			encoding,
			exclude_patterns,
		},
	);

	if args.verbose {
		eprintln!(
			"Resolving tokens from {}",
			match detokeniser.mode() {
				Mode::ExplicitMapping => "explicit replacements",
				Mode::ExternalLookup => "property lookup",
			}
		);
	}

	let result = detokeniser.run(&source)?;

	match run_args.format {
		OutputFormat::Text => print_text(&result, run_mode, run_args.display_files),
		OutputFormat::Json => print_json(&result, run_mode, detokeniser.mode())?,
	}

	Ok(())
}

fn print_text(result: &RunResult, run_mode: RunMode, display_files: bool) {
	if display_files {
		for file in &result.files {
			println!("  {}", describe_file(file, run_mode));
		}
	}

	match run_mode {
		RunMode::Analyse => {
			let pending = result.pending().count();
			println!(
				"Analysed {} file(s), {} would be rewritten",
				result.files_processed, pending
			);
			for file in result.pending().filter(|_| !display_files) {
				println!(
					"  {} {}",
					colored!("would rewrite", green),
					file.path.display()
				);
			}
		}
		RunMode::Replace => {
			println!(
				"Processed {} file(s), rewrote {} file(s)",
				result.files_processed, result.files_rewritten
			);
		}
	}
}

fn describe_file(file: &FileOutcome, run_mode: RunMode) -> String {
	let path = file.path.display();
	if file.rewritten {
		format!(
			"{} {path} ({} token(s), {})",
			colored!("rewrote", green),
			file.replaced,
			file.write_encoding
		)
	} else if file.needs_write && run_mode == RunMode::Analyse {
		format!(
			"{} {path} ({} token(s), {})",
			colored!("would rewrite", green),
			file.replaced,
			file.write_encoding
		)
	} else {
		format!("{} {path}", colored!("unchanged", dimmed))
	}
}

#[derive(Serialize)]
struct JsonSummary<'a> {
	run_mode: RunMode,
	mode: Mode,
	#[serde(flatten)]
	result: &'a RunResult,
}

fn print_json(
	result: &RunResult,
	run_mode: RunMode,
	mode: Mode,
) -> Result<(), Box<dyn std::error::Error>> {
	let summary = JsonSummary {
		run_mode,
		mode,
		result,
	};
	println!("{}", serde_json::to_string_pretty(&summary)?);
	Ok(())
}
