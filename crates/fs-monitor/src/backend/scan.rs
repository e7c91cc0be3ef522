use crate::{
	config::WatchOptions,
	error::FileIOError,
	event::{FileStats, RawKind},
	session::Listeners,
	Error,
};

use super::{classify::KnownDirs, matcher::PathMatcher};

use std::{
	collections::{HashSet, VecDeque},
	fs::Metadata,
	path::{Path, PathBuf},
};

use async_channel as chan;
use tokio::fs;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy)]
pub(super) struct ScanOptions {
	pub ignore_initial: bool,
	pub follow_symlinks: bool,
	pub ignore_permission_errors: bool,
}

impl From<&WatchOptions> for ScanOptions {
	fn from(options: &WatchOptions) -> Self {
		Self {
			ignore_initial: options.ignore_initial,
			follow_symlinks: options.follow_symlinks,
			ignore_permission_errors: options.ignore_permission_errors,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ScanOutcome {
	Completed,
	Stopped,
}

/// Breadth first enumeration of watched directories, reported as add/addDir
pub(super) struct InitialScan<'a> {
	pub matcher: &'a PathMatcher,
	pub options: ScanOptions,
	pub listeners: &'a Listeners,
	pub stop_rx: &'a chan::Receiver<()>,
}

impl InitialScan<'_> {
	pub(super) async fn run(&self, known_dirs: &mut KnownDirs) -> ScanOutcome {
		let mut visited = HashSet::new();
		let mut emitted = 0usize;

		for root in self.matcher.roots() {
			let metadata = match self.stat(root).await {
				Ok(metadata) => metadata,
				Err(e) => {
					self.report(e);
					continue;
				}
			};

			let mut queue = VecDeque::new();

			if metadata.is_dir() {
				emitted += self
					.visit_dir(root.to_path_buf(), &metadata, known_dirs, &mut visited, &mut queue)
					.await;
			} else if self.matcher.matches(root) {
				emitted += self.emit(RawKind::Add, root, &metadata);
			}

			if self
				.walk(&mut queue, known_dirs, &mut visited, &mut emitted)
				.await == ScanOutcome::Stopped
			{
				return ScanOutcome::Stopped;
			}
		}

		debug!(%emitted, "Initial scan complete;");

		ScanOutcome::Completed
	}

	/// Reports the contents of a directory that appeared after the initial scan, the directory
	/// itself was already reported by its own event
	pub(super) async fn run_below(&self, dir: &Path, known_dirs: &mut KnownDirs) -> ScanOutcome {
		if !self.matcher.can_descend(dir) {
			return ScanOutcome::Completed;
		}

		let mut visited = HashSet::from([fs::canonicalize(dir)
			.await
			.unwrap_or_else(|_| dir.to_path_buf())]);
		let mut queue = VecDeque::from([dir.to_path_buf()]);
		let mut emitted = 0usize;

		let outcome = self
			.walk(&mut queue, known_dirs, &mut visited, &mut emitted)
			.await;

		trace!(dir = %dir.display(), %emitted, "Scanned new directory;");

		outcome
	}

	async fn walk(
		&self,
		queue: &mut VecDeque<PathBuf>,
		known_dirs: &mut KnownDirs,
		visited: &mut HashSet<PathBuf>,
		emitted: &mut usize,
	) -> ScanOutcome {
		while let Some(dir) = queue.pop_front() {
			if !self.stop_rx.is_empty() {
				debug!("Scan interrupted by stop signal");
				return ScanOutcome::Stopped;
			}

			*emitted += self.read_dir(&dir, known_dirs, visited, queue).await;
		}

		ScanOutcome::Completed
	}

	async fn read_dir(
		&self,
		dir: &Path,
		known_dirs: &mut KnownDirs,
		visited: &mut HashSet<PathBuf>,
		queue: &mut VecDeque<PathBuf>,
	) -> usize {
		let mut emitted = 0;

		let mut entries = match fs::read_dir(dir).await {
			Ok(entries) => entries,
			Err(e) => {
				self.report(FileIOError::from_std_io_err_with_msg(
					dir,
					e,
					"failed to read directory",
				));
				return emitted;
			}
		};

		loop {
			let entry = match entries.next_entry().await {
				Ok(Some(entry)) => entry,
				Ok(None) => break,
				Err(e) => {
					self.report(FileIOError::from_std_io_err_with_msg(
						dir,
						e,
						"failed to read directory entry",
					));
					break;
				}
			};

			let path = entry.path();
			if self.matcher.is_ignored(&path) || !self.matcher.within_depth(&path) {
				trace!(path = %path.display(), "Skipping entry;");
				continue;
			}

			let metadata = match self.stat(&path).await {
				Ok(metadata) => metadata,
				Err(e) => {
					self.report(e);
					continue;
				}
			};

			if metadata.is_dir() {
				emitted += self
					.visit_dir(path, &metadata, known_dirs, visited, queue)
					.await;
			} else if self.matcher.matches(&path) {
				emitted += self.emit(RawKind::Add, &path, &metadata);
			}
		}

		emitted
	}

	async fn visit_dir(
		&self,
		dir: PathBuf,
		metadata: &Metadata,
		known_dirs: &mut KnownDirs,
		visited: &mut HashSet<PathBuf>,
		queue: &mut VecDeque<PathBuf>,
	) -> usize {
		known_dirs.insert(dir.clone());

		let emitted = if self.matcher.matches(&dir) {
			self.emit(RawKind::AddDir, &dir, metadata)
		} else {
			0
		};

		if self.matcher.can_descend(&dir) {
			// Followed symlinks can point back up the tree
			let identity = fs::canonicalize(&dir).await.unwrap_or_else(|_| dir.clone());
			if visited.insert(identity) {
				queue.push_back(dir);
			}
		}

		emitted
	}

	async fn stat(&self, path: &Path) -> Result<Metadata, FileIOError> {
		let metadata = fs::symlink_metadata(path)
			.await
			.map_err(|e| FileIOError::from_std_io_err(path, e))?;

		if metadata.is_symlink() && self.options.follow_symlinks {
			// Dangling links are reported as the link itself
			return Ok(fs::metadata(path).await.unwrap_or(metadata));
		}

		Ok(metadata)
	}

	fn emit(&self, kind: RawKind, path: &Path, metadata: &Metadata) -> usize {
		if self.options.ignore_initial {
			return 0;
		}

		self.listeners.emit_change(
			kind,
			&self.matcher.to_emitted(path),
			Some(&FileStats::from(metadata)),
		);

		1
	}

	fn report(&self, e: FileIOError) {
		if self.options.ignore_permission_errors && e.is_permission_denied() {
			trace!(path = %e.path.display(), "Ignoring permission error during initial scan;");
			return;
		}

		self.listeners.emit_error(Error::FileIO(e));
	}
}
