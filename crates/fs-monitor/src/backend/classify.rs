//! Turns `notify` events into raw change kinds.
//!
//! Backends disagree on how much they tell us: inotify and FSEvents distinguish files from
//! folders on create and remove, Windows reports `Any` for both. When the event itself is not
//! enough we either stat the path or fall back on the set of directories we already know about.

use crate::event::{FileStats, RawKind};

use std::{
	collections::HashSet,
	path::{Path, PathBuf},
};

use notify::{
	event::{CreateKind, ModifyKind, RemoveKind, RenameMode},
	Event, EventKind,
};
use tokio::fs;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct RawNotification {
	pub kind: RawKind,
	pub path: PathBuf,
	pub stats: Option<FileStats>,
}

impl RawNotification {
	fn new(kind: RawKind, path: PathBuf, stats: Option<FileStats>) -> Self {
		Self {
			kind,
			path,
			stats: stats.filter(|_| kind.carries_stats()),
		}
	}
}

/// Directories seen so far, either by the initial scan or by live events
#[derive(Debug, Default)]
pub(super) struct KnownDirs(HashSet<PathBuf>);

impl KnownDirs {
	pub(super) fn insert(&mut self, path: PathBuf) {
		self.0.insert(path);
	}

	pub(super) fn contains(&self, path: &Path) -> bool {
		self.0.contains(path)
	}

	/// Forget a directory together with everything that lived below it
	pub(super) fn remove_tree(&mut self, path: &Path) {
		self.0.retain(|known| !known.starts_with(path));
	}
}

#[derive(Debug)]
pub(super) struct Classifier {
	known_dirs: KnownDirs,
	always_stat: bool,
}

impl Classifier {
	pub(super) fn new(always_stat: bool) -> Self {
		Self {
			known_dirs: KnownDirs::default(),
			always_stat,
		}
	}

	pub(super) fn known_dirs_mut(&mut self) -> &mut KnownDirs {
		&mut self.known_dirs
	}

	pub(super) async fn classify(&mut self, event: Event) -> Vec<RawNotification> {
		let mut paths = event.paths.into_iter();
		let Some(path) = paths.next() else {
			return vec![];
		};

		match event.kind {
			EventKind::Create(CreateKind::File) => {
				let stats = self.maybe_stat(&path).await;
				vec![RawNotification::new(RawKind::Add, path, stats)]
			}

			EventKind::Create(CreateKind::Folder) => {
				self.known_dirs.insert(path.clone());
				let stats = self.maybe_stat(&path).await;
				vec![RawNotification::new(RawKind::AddDir, path, stats)]
			}

			EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
				self.addition(path).await.into_iter().collect()
			}

			EventKind::Modify(ModifyKind::Name(RenameMode::From)) => vec![self.removal(path)],

			EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
				let mut notifications = vec![self.removal(path)];
				if let Some(to) = paths.next() {
					notifications.extend(self.addition(to).await);
				}
				notifications
			}

			// FSEvents doesn't tell which side of a rename this is
			EventKind::Modify(ModifyKind::Name(_)) => {
				if fs::symlink_metadata(&path).await.is_ok() {
					self.addition(path).await.into_iter().collect()
				} else {
					vec![self.removal(path)]
				}
			}

			EventKind::Modify(_) => {
				if self.known_dirs.contains(&path) {
					trace!(path = %path.display(), "Ignoring modify event on directory;");
					return vec![];
				}

				let stats = self.maybe_stat(&path).await;
				if stats.as_ref().is_some_and(|stats| stats.is_dir) {
					return vec![];
				}

				vec![RawNotification::new(RawKind::Change, path, stats)]
			}

			EventKind::Remove(RemoveKind::File) => {
				vec![RawNotification::new(RawKind::Unlink, path, None)]
			}

			EventKind::Remove(RemoveKind::Folder) => {
				self.known_dirs.remove_tree(&path);
				vec![RawNotification::new(RawKind::UnlinkDir, path, None)]
			}

			EventKind::Remove(_) => vec![self.removal(path)],

			EventKind::Access(_) | EventKind::Any | EventKind::Other => {
				trace!(kind = ?event.kind, path = %path.display(), "Ignoring event;");
				vec![]
			}
		}
	}

	async fn maybe_stat(&self, path: &Path) -> Option<FileStats> {
		if !self.always_stat {
			return None;
		}

		fs::metadata(path)
			.await
			.ok()
			.map(|metadata| FileStats::from(&metadata))
	}

	/// Something appeared at `path`, only a stat can tell if it's a file or a directory
	async fn addition(&mut self, path: PathBuf) -> Option<RawNotification> {
		match fs::metadata(&path).await {
			Ok(metadata) => {
				let stats = FileStats::from(&metadata);
				if stats.is_dir {
					self.known_dirs.insert(path.clone());
					Some(RawNotification::new(RawKind::AddDir, path, Some(stats)))
				} else {
					Some(RawNotification::new(RawKind::Add, path, Some(stats)))
				}
			}
			Err(e) => {
				trace!(?e, path = %path.display(), "Entry vanished before it could be inspected;");
				None
			}
		}
	}

	fn removal(&mut self, path: PathBuf) -> RawNotification {
		if self.known_dirs.contains(&path) {
			self.known_dirs.remove_tree(&path);
			RawNotification::new(RawKind::UnlinkDir, path, None)
		} else {
			RawNotification::new(RawKind::Unlink, path, None)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use notify::event::{AccessKind, AccessMode, DataChange};
	use tempfile::tempdir;

	fn event(kind: EventKind, paths: &[impl AsRef<Path>]) -> Event {
		paths.iter().fold(Event::new(kind), |event, path| {
			event.add_path(path.as_ref().to_path_buf())
		})
	}

	#[tokio::test]
	async fn create_kinds_map_to_additions() {
		let mut classifier = Classifier::new(false);

		let file = classifier
			.classify(event(EventKind::Create(CreateKind::File), &[Path::new("/w/a.txt")]))
			.await;
		assert_eq!(
			file,
			vec![RawNotification::new(RawKind::Add, PathBuf::from("/w/a.txt"), None)]
		);

		let dir = classifier
			.classify(event(EventKind::Create(CreateKind::Folder), &[Path::new("/w/sub")]))
			.await;
		assert_eq!(
			dir,
			vec![RawNotification::new(RawKind::AddDir, PathBuf::from("/w/sub"), None)]
		);
		assert!(classifier.known_dirs.contains(Path::new("/w/sub")));
	}

	#[tokio::test]
	async fn ambiguous_create_is_resolved_by_stat() {
		let root = tempdir().unwrap();
		let dir = root.path().join("inner");
		std::fs::create_dir(&dir).unwrap();

		let mut classifier = Classifier::new(false);
		let notifications = classifier
			.classify(event(EventKind::Create(CreateKind::Any), &[&dir]))
			.await;

		assert_eq!(notifications.len(), 1);
		assert_eq!(notifications[0].kind, RawKind::AddDir);
		assert!(notifications[0].stats.as_ref().unwrap().is_dir);

		let gone = classifier
			.classify(event(
				EventKind::Create(CreateKind::Any),
				&[&root.path().join("never-existed")],
			))
			.await;
		assert!(gone.is_empty());
	}

	#[tokio::test]
	async fn ambiguous_remove_uses_known_dirs() {
		let mut classifier = Classifier::new(false);
		classifier.known_dirs_mut().insert(PathBuf::from("/w/sub"));
		classifier.known_dirs_mut().insert(PathBuf::from("/w/sub/nested"));

		let removed = classifier
			.classify(event(EventKind::Remove(RemoveKind::Any), &[Path::new("/w/sub")]))
			.await;
		assert_eq!(removed[0].kind, RawKind::UnlinkDir);
		assert!(!classifier.known_dirs.contains(Path::new("/w/sub/nested")));

		let removed = classifier
			.classify(event(EventKind::Remove(RemoveKind::Any), &[Path::new("/w/a.txt")]))
			.await;
		assert_eq!(removed[0].kind, RawKind::Unlink);
	}

	#[tokio::test]
	async fn modify_on_file_is_change_and_on_dir_is_dropped() {
		let mut classifier = Classifier::new(false);
		classifier.known_dirs_mut().insert(PathBuf::from("/w/sub"));

		let changed = classifier
			.classify(event(
				EventKind::Modify(ModifyKind::Data(DataChange::Any)),
				&[Path::new("/w/a.txt")],
			))
			.await;
		assert_eq!(changed[0].kind, RawKind::Change);

		let dropped = classifier
			.classify(event(EventKind::Modify(ModifyKind::Any), &[Path::new("/w/sub")]))
			.await;
		assert!(dropped.is_empty());
	}

	#[tokio::test]
	async fn rename_both_is_removal_then_addition() {
		let root = tempdir().unwrap();
		let from = root.path().join("old.txt");
		let to = root.path().join("new.txt");
		std::fs::write(&to, "moved").unwrap();

		let mut classifier = Classifier::new(false);
		let notifications = classifier
			.classify(event(
				EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
				&[&from, &to],
			))
			.await;

		assert_eq!(
			notifications
				.iter()
				.map(|n| (n.kind, n.path.clone()))
				.collect::<Vec<_>>(),
			vec![(RawKind::Unlink, from), (RawKind::Add, to)]
		);
	}

	#[tokio::test]
	async fn access_events_are_ignored() {
		let mut classifier = Classifier::new(true);
		let notifications = classifier
			.classify(event(
				EventKind::Access(AccessKind::Close(AccessMode::Write)),
				&[Path::new("/w/a.txt")],
			))
			.await;
		assert!(notifications.is_empty());
	}

	#[tokio::test]
	async fn always_stat_attaches_stats_to_changes() {
		let root = tempdir().unwrap();
		let file = root.path().join("a.txt");
		std::fs::write(&file, "12345").unwrap();

		let mut classifier = Classifier::new(true);
		let changed = classifier
			.classify(event(EventKind::Modify(ModifyKind::Any), &[&file]))
			.await;
		assert_eq!(changed[0].stats.as_ref().unwrap().size, 5);
	}
}
