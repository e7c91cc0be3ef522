//! Decides which paths a session watches and which of them get reported.
//!
//! In case of doubt about globs, consult <https://docs.rs/globset/latest/globset/#syntax>

use crate::{config::WatchOptions, Error, Result};

use std::path::{Component, Path, PathBuf};

use globset::{GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};

const GLOB_CHARS: [char; 4] = ['*', '?', '[', '{'];

#[derive(Debug)]
struct WatchRoot {
	/// Directory or file actually handed to the watcher
	path: PathBuf,
	/// Only entries matching this are reported, `None` means everything below `path`
	glob: Option<GlobMatcher>,
}

#[derive(Debug)]
pub(super) struct PathMatcher {
	roots: Vec<WatchRoot>,
	ignored: GlobSet,
	depth: Option<usize>,
	cwd: Option<PathBuf>,
}

impl PathMatcher {
	pub(super) fn new(paths: &[String], options: &WatchOptions) -> Result<Self> {
		let base = match &options.cwd {
			Some(cwd) => cwd.clone(),
			None => std::env::current_dir().map_err(|e| {
				Error::Config(format!("unable to resolve the current directory: {e}"))
			})?,
		};

		let roots = paths
			.iter()
			.map(|raw| {
				let resolved = absolutize(&base, raw);

				if options.disable_globbing || !is_glob(raw) {
					return Ok(WatchRoot {
						path: PathBuf::from(resolved),
						glob: None,
					});
				}

				Ok(WatchRoot {
					path: glob_base(Path::new(&resolved)),
					glob: Some(build_glob(&resolved)?.compile_matcher()),
				})
			})
			.collect::<Result<Vec<_>>>()?;

		// Relative patterns match anywhere as written and also anchored at the base directory
		let ignored = options
			.ignored
			.iter()
			.flat_map(|pattern| {
				let anchored = absolutize(&base, pattern);
				let mut patterns = vec![pattern.clone()];
				if anchored != *pattern {
					patterns.push(anchored);
				}
				patterns
			})
			.map(|pattern| build_glob(&pattern))
			.collect::<Result<Vec<_>>>()?
			.into_iter()
			.fold(&mut GlobSetBuilder::new(), |builder, glob| builder.add(glob))
			.build()?;

		Ok(Self {
			roots,
			ignored,
			depth: options.depth,
			cwd: options.cwd.clone(),
		})
	}

	/// Paths that must be registered with the underlying watcher
	pub(super) fn roots(&self) -> impl Iterator<Item = &Path> {
		self.roots.iter().map(|root| root.path.as_path())
	}

	/// A path is ignored when it or any directory above it matches an ignore pattern
	pub(super) fn is_ignored(&self, path: &Path) -> bool {
		!self.ignored.is_empty()
			&& path
				.ancestors()
				.any(|ancestor| self.ignored.is_match(ancestor))
	}

	/// How many levels below the closest enclosing root `path` lives, `Some(0)` for a root itself
	fn depth_below_root(&self, path: &Path) -> Option<usize> {
		self.roots
			.iter()
			.filter_map(|root| path.strip_prefix(&root.path).ok())
			.map(|relative| relative.components().count())
			.min()
	}

	/// Entries deeper than `depth + 1` levels are never reported
	pub(super) fn within_depth(&self, path: &Path) -> bool {
		match (self.depth, self.depth_below_root(path)) {
			(_, None) => false,
			(None, Some(_)) => true,
			(Some(max), Some(depth)) => depth <= max + 1,
		}
	}

	/// Whether a directory's children still fall within the configured depth
	pub(super) fn can_descend(&self, dir: &Path) -> bool {
		!self.is_ignored(dir)
			&& match (self.depth, self.depth_below_root(dir)) {
				(_, None) => false,
				(None, Some(_)) => true,
				(Some(max), Some(depth)) => depth <= max,
			}
	}

	/// Whether an event for `path` should reach listeners
	pub(super) fn matches(&self, path: &Path) -> bool {
		if self.is_ignored(path) || !self.within_depth(path) {
			return false;
		}

		self.roots.iter().any(|root| match &root.glob {
			Some(glob) => glob.is_match(path),
			None => path.starts_with(&root.path),
		})
	}

	/// Path as the host gets to see it, relative to `cwd` when one was configured
	pub(super) fn to_emitted(&self, path: &Path) -> PathBuf {
		self.cwd
			.as_ref()
			.and_then(|cwd| path.strip_prefix(cwd).ok())
			.filter(|relative| !relative.as_os_str().is_empty())
			.map_or_else(|| path.to_path_buf(), Path::to_path_buf)
	}
}

fn is_glob(raw: &str) -> bool {
	raw.contains(GLOB_CHARS)
}

fn absolutize(base: &Path, raw: &str) -> String {
	let path = Path::new(raw);
	if path.is_absolute() {
		raw.to_string()
	} else {
		base.join(path).to_string_lossy().into_owned()
	}
}

fn build_glob(pattern: &str) -> Result<globset::Glob> {
	GlobBuilder::new(pattern)
		.literal_separator(true)
		.build()
		.map_err(Into::into)
}

/// Longest leading part of a glob pattern without any glob characters
fn glob_base(pattern: &Path) -> PathBuf {
	pattern
		.components()
		.take_while(|component| match component {
			Component::Normal(part) => !part.to_string_lossy().contains(GLOB_CHARS),
			_ => true,
		})
		.collect()
}
