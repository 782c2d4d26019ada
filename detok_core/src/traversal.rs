use std::collections::HashSet;
use std::fs::Permissions;
use std::path::Path;
use std::path::PathBuf;

use ignore::gitignore::Gitignore;
use ignore::gitignore::GitignoreBuilder;
use serde::Deserialize;
use serde::Serialize;

use crate::DetokError;
use crate::DetokResult;
use crate::encoding::TextEncoding;
use crate::encoding::decode;
use crate::encoding::negotiate;
use crate::engine::substitute;
use crate::pattern::TokenPattern;
use crate::resolver::Mode;
use crate::resolver::Resolver;

/// Marker in a target path that selects recursive traversal.
pub const RECURSIVE_MARKER: char = '*';

/// Whether a run writes its changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
	/// Compute matches and write decisions without touching any file.
	Analyse,
	/// Rewrite files whose decision says so.
	#[default]
	Replace,
}

/// A file to detokenise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTarget {
	pub path: PathBuf,
	/// Encoding to write this file in, taking precedence over the run's
	/// global encoding.
	pub encoding: Option<TextEncoding>,
	/// Whether a missing file fails the run. True for explicit file lists;
	/// enumerated files are known to exist.
	pub must_exist: bool,
}

impl FileTarget {
	/// A target from an explicit file list.
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			encoding: None,
			must_exist: true,
		}
	}

	#[must_use]
	pub fn with_encoding(mut self, encoding: TextEncoding) -> Self {
		self.encoding = Some(encoding);
		self
	}

	fn discovered(path: PathBuf) -> Self {
		Self {
			path,
			encoding: None,
			must_exist: false,
		}
	}
}

/// Where the files of a run come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSource {
	/// An ordered list of files, each of which must exist.
	Files(Vec<FileTarget>),
	/// The immediate files of a directory.
	Directory(PathBuf),
	/// Every file of a directory tree, depth first.
	Tree(PathBuf),
}

impl TargetSource {
	/// Interpret a target path. A `*` anywhere in the path selects recursive
	/// traversal of the path with the marker removed, so `build/*` walks the
	/// whole `build/` tree while `build` only visits its immediate files.
	pub fn from_path(path: &str) -> Self {
		if path.contains(RECURSIVE_MARKER) {
			Self::Tree(PathBuf::from(path.replace(RECURSIVE_MARKER, "")))
		} else {
			Self::Directory(PathBuf::from(path))
		}
	}
}

/// Options fixed for the duration of a run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
	pub mode: RunMode,
	/// Rewrite every visited file even when no token matched.
	pub force_write: bool,
	/// Global write encoding.
	pub encoding: Option<TextEncoding>,
	/// Gitignore-style patterns skipped during directory traversal.
	pub exclude_patterns: Vec<String>,
}

/// What happened to one visited file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileOutcome {
	pub path: PathBuf,
	/// At least one token was replaced.
	pub matched: bool,
	/// Number of tokens replaced.
	pub replaced: usize,
	/// The write-back decision: `matched` or force-write.
	pub needs_write: bool,
	/// The file was actually written.
	pub rewritten: bool,
	/// Encoding detected when reading.
	pub read_encoding: TextEncoding,
	/// Encoding used, or that would be used, for writing.
	pub write_encoding: TextEncoding,
}

/// Aggregate counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunResult {
	/// Files visited, including one that failed.
	pub files_processed: usize,
	/// Files actually written.
	pub files_rewritten: usize,
	/// Outcome of every file that completed.
	pub files: Vec<FileOutcome>,
}

impl RunResult {
	/// Files whose write-back decision is positive. In analyse mode these are
	/// the files that would be rewritten.
	pub fn pending(&self) -> impl Iterator<Item = &FileOutcome> {
		self.files.iter().filter(|file| file.needs_write)
	}
}

/// Runs token substitution over a set of files.
#[derive(Debug)]
pub struct Detokeniser<'a> {
	pattern: TokenPattern,
	resolver: Resolver<'a>,
	options: RunOptions,
}

impl<'a> Detokeniser<'a> {
	pub fn new(pattern: TokenPattern, resolver: Resolver<'a>, options: RunOptions) -> Self {
		Self {
			pattern,
			resolver,
			options,
		}
	}

	pub fn mode(&self) -> Mode {
		self.resolver.mode()
	}

	/// Process every file of `source` and return the counters.
	pub fn run(&self, source: &TargetSource) -> DetokResult<RunResult> {
		let mut result = RunResult::default();
		self.run_with(source, &mut result)?;
		Ok(result)
	}

	/// Process every file of `source`, accumulating into `result`. The first
	/// failure stops the run; `result` then holds the work committed before
	/// it.
	pub fn run_with(&self, source: &TargetSource, result: &mut RunResult) -> DetokResult<()> {
		tracing::info!(
			mode = ?self.resolver.mode(),
			run_mode = ?self.options.mode,
			pattern = self.pattern.as_str(),
			"detokenise started"
		);

		match source {
			TargetSource::Files(targets) => {
				tracing::info!("detokenising collection: {} files", targets.len());
				for target in targets {
					self.process_file(target, result)?;
				}
			}
			TargetSource::Directory(dir) => {
				tracing::info!("detokenising path: {}", dir.display());
				ensure_directory(dir)?;
				for path in list_directory(dir, &self.exclude_matcher(dir)?)? {
					self.process_file(&FileTarget::discovered(path), result)?;
				}
			}
			TargetSource::Tree(root) => {
				tracing::info!("detokenising path recursively: {}", root.display());
				ensure_directory(root)?;
				let exclude = self.exclude_matcher(root)?;
				let mut ancestors = HashSet::new();
				self.walk_tree(root, &exclude, &mut ancestors, result)?;
			}
		}

		tracing::info!(
			processed = result.files_processed,
			rewritten = result.files_rewritten,
			"detokenise completed"
		);

		Ok(())
	}

	/// Detokenise a single file, counting it in `result`.
	pub fn process_file(&self, target: &FileTarget, result: &mut RunResult) -> DetokResult<()> {
		result.files_processed += 1;
		let path_display = target.path.display().to_string();

		if target.must_exist && !target.path.is_file() {
			return Err(DetokError::FileNotFound(path_display));
		}

		tracing::debug!(path = %path_display, "detokenising file");
		let outcome = self
			.detokenise_file(target)
			.map_err(|e| e.in_file(path_display))?;

		if outcome.rewritten {
			result.files_rewritten += 1;
		}
		result.files.push(outcome);

		Ok(())
	}

	fn detokenise_file(&self, target: &FileTarget) -> DetokResult<FileOutcome> {
		// Read fully before any write handle is opened on the same path.
		let bytes = std::fs::read(&target.path)?;
		let decoded = decode(&bytes);
		let encoding = negotiate(decoded.encoding, target.encoding, self.options.encoding);
		let substitution = substitute(&decoded.text, &self.pattern, &self.resolver)?;

		let needs_write = substitution.matched || self.options.force_write;
		let rewritten = needs_write && self.options.mode == RunMode::Replace;

		if rewritten {
			make_writable(&target.path)?;
			std::fs::write(&target.path, encoding.write.encode(&substitution.text))?;
			tracing::debug!(
				path = %target.path.display(),
				encoding = %encoding.write,
				"re-wrote file content"
			);
		}

		Ok(FileOutcome {
			path: target.path.clone(),
			matched: substitution.matched,
			replaced: substitution.replaced,
			needs_write,
			rewritten,
			read_encoding: encoding.read,
			write_encoding: encoding.write,
		})
	}

	fn walk_tree(
		&self,
		dir: &Path,
		exclude: &Gitignore,
		ancestors: &mut HashSet<PathBuf>,
		result: &mut RunResult,
	) -> DetokResult<()> {
		// A cycle only exists when a directory is its own ancestor. The same
		// directory reached through two sibling links is walked twice.
		let canonical = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
		if !ancestors.insert(canonical.clone()) {
			return Err(DetokError::SymlinkCycle {
				path: dir.display().to_string(),
			});
		}

		for path in sorted_entries(dir)? {
			let is_dir = path.is_dir();
			if exclude.matched(&path, is_dir).is_ignore() {
				continue;
			}

			if is_dir {
				self.walk_tree(&path, exclude, ancestors, result)?;
			} else if path.is_file() {
				self.process_file(&FileTarget::discovered(path), result)?;
			}
		}

		ancestors.remove(&canonical);
		Ok(())
	}

	fn exclude_matcher(&self, root: &Path) -> DetokResult<Gitignore> {
		build_exclude_matcher(root, &self.options.exclude_patterns)
	}
}

/// Build a gitignore-style matcher from exclude patterns.
fn build_exclude_matcher(root: &Path, patterns: &[String]) -> DetokResult<Gitignore> {
	if patterns.is_empty() {
		return Ok(Gitignore::empty());
	}

	let mut builder = GitignoreBuilder::new(root);
	for pattern in patterns {
		builder.add_line(None, pattern).map_err(|e| {
			DetokError::ConfigParse(format!("invalid exclude pattern `{pattern}`: {e}"))
		})?;
	}
	builder
		.build()
		.map_err(|e| DetokError::ConfigParse(format!("failed to build exclude rules: {e}")))
}

fn ensure_directory(dir: &Path) -> DetokResult<()> {
	if dir.is_dir() {
		Ok(())
	} else {
		Err(DetokError::DirectoryNotFound(dir.display().to_string()))
	}
}

/// Entries of `dir` sorted by file name.
fn sorted_entries(dir: &Path) -> DetokResult<Vec<PathBuf>> {
	let mut entries = std::fs::read_dir(dir)?
		.map(|entry| entry.map(|entry| entry.path()))
		.collect::<Result<Vec<_>, _>>()?;
	entries.sort();
	Ok(entries)
}

/// The immediate files of `dir`, skipping subdirectories.
fn list_directory(dir: &Path, exclude: &Gitignore) -> DetokResult<Vec<PathBuf>> {
	Ok(sorted_entries(dir)?
		.into_iter()
		.filter(|path| path.is_file() && !exclude.matched(path, false).is_ignore())
		.collect())
}

/// Clear the read-only attribute of `path` if it is set.
fn make_writable(path: &Path) -> DetokResult<()> {
	let mut permissions = std::fs::metadata(path)?.permissions();
	if permissions.readonly() {
		allow_owner_write(&mut permissions);
		std::fs::set_permissions(path, permissions)?;
	}
	Ok(())
}

#[cfg(unix)]
fn allow_owner_write(permissions: &mut Permissions) {
	use std::os::unix::fs::PermissionsExt;
	permissions.set_mode(permissions.mode() | 0o200);
}

#[cfg(not(unix))]
#[allow(clippy::permissions_set_readonly_false)]
fn allow_owner_write(permissions: &mut Permissions) {
	permissions.set_readonly(false);
}
