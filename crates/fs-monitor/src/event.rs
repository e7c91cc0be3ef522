//! Event vocabulary shared between watch sessions and the host reactor.
//!
//! Watch sessions speak in [`RawKind`]s, the host only ever sees [`EventType`]s. The mapping
//! between both is fixed and lives in [`NotificationEvent::translate`].

use crate::Error;

use std::{
	fmt::Display,
	fs::Metadata,
	path::{Path, PathBuf},
	sync::Arc,
	time::SystemTime,
};

use serde::{Deserialize, Serialize};

/// Change kinds a watch session can be subscribed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RawKind {
	Add,
	AddDir,
	Change,
	Unlink,
	UnlinkDir,
}

impl RawKind {
	/// Every change kind, in the order the adapter subscribes to them
	pub const ALL: [Self; 5] = [
		Self::Add,
		Self::Change,
		Self::Unlink,
		Self::AddDir,
		Self::UnlinkDir,
	];

	#[must_use]
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Add => "add",
			Self::AddDir => "addDir",
			Self::Change => "change",
			Self::Unlink => "unlink",
			Self::UnlinkDir => "unlinkDir",
		}
	}

	/// Only additions and changes may carry a stats snapshot
	#[must_use]
	pub const fn carries_stats(self) -> bool {
		matches!(self, Self::Add | Self::AddDir | Self::Change)
	}
}

impl Display for RawKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Event type delivered to the host's event callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventType {
	Add,
	AddDir,
	Change,
	Unlink,
	UnlinkDir,
}

impl EventType {
	#[must_use]
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Add => "add",
			Self::AddDir => "addDir",
			Self::Change => "change",
			Self::Unlink => "unlink",
			Self::UnlinkDir => "unlinkDir",
		}
	}
}

impl Display for EventType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Metadata snapshot taken when a file or directory was added or changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStats {
	pub size: u64,
	pub is_file: bool,
	pub is_dir: bool,
	pub is_symlink: bool,
	pub readonly: bool,
	pub modified: Option<SystemTime>,
	pub accessed: Option<SystemTime>,
	pub created: Option<SystemTime>,
	#[cfg(unix)]
	pub mode: u32,
	#[cfg(unix)]
	pub ino: u64,
	#[cfg(unix)]
	pub dev: u64,
	#[cfg(unix)]
	pub nlink: u64,
	#[cfg(unix)]
	pub uid: u32,
	#[cfg(unix)]
	pub gid: u32,
}

impl From<&Metadata> for FileStats {
	fn from(metadata: &Metadata) -> Self {
		#[cfg(unix)]
		use std::os::unix::fs::MetadataExt;

		Self {
			size: metadata.len(),
			is_file: metadata.is_file(),
			is_dir: metadata.is_dir(),
			is_symlink: metadata.is_symlink(),
			readonly: metadata.permissions().readonly(),
			modified: metadata.modified().ok(),
			accessed: metadata.accessed().ok(),
			created: metadata.created().ok(),
			#[cfg(unix)]
			mode: metadata.mode(),
			#[cfg(unix)]
			ino: metadata.ino(),
			#[cfg(unix)]
			dev: metadata.dev(),
			#[cfg(unix)]
			nlink: metadata.nlink(),
			#[cfg(unix)]
			uid: metadata.uid(),
			#[cfg(unix)]
			gid: metadata.gid(),
		}
	}
}

/// Backend specific extra information, reserved for raw event passthrough.
///
/// None of the five standard change kinds fill this in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDetails {
	pub raw_kind: String,
	pub paths: Vec<PathBuf>,
}

/// A notification after translation into the host vocabulary
#[derive(Debug, Clone)]
pub enum NotificationEvent {
	FileAdded {
		path: PathBuf,
		stats: Option<FileStats>,
	},
	DirAdded {
		path: PathBuf,
		stats: Option<FileStats>,
	},
	FileChanged {
		path: PathBuf,
		stats: Option<FileStats>,
	},
	FileRemoved {
		path: PathBuf,
	},
	DirRemoved {
		path: PathBuf,
	},
	Ready,
	Error(Arc<Error>),
}

impl NotificationEvent {
	/// Fixed translation table from raw change kinds to host events.
	///
	/// Stats given for removals are dropped, a removed entry has nothing left to describe.
	#[must_use]
	pub fn translate(kind: RawKind, path: &Path, stats: Option<&FileStats>) -> Self {
		let path = path.to_path_buf();
		let stats = stats.cloned();

		match kind {
			RawKind::Add => Self::FileAdded { path, stats },
			RawKind::AddDir => Self::DirAdded { path, stats },
			RawKind::Change => Self::FileChanged { path, stats },
			RawKind::Unlink => Self::FileRemoved { path },
			RawKind::UnlinkDir => Self::DirRemoved { path },
		}
	}

	/// `None` for [`NotificationEvent::Ready`] and [`NotificationEvent::Error`], which never
	/// reach the host's event callback
	#[must_use]
	pub const fn event_type(&self) -> Option<EventType> {
		match self {
			Self::FileAdded { .. } => Some(EventType::Add),
			Self::DirAdded { .. } => Some(EventType::AddDir),
			Self::FileChanged { .. } => Some(EventType::Change),
			Self::FileRemoved { .. } => Some(EventType::Unlink),
			Self::DirRemoved { .. } => Some(EventType::UnlinkDir),
			Self::Ready | Self::Error(_) => None,
		}
	}

	#[must_use]
	pub fn path(&self) -> Option<&Path> {
		match self {
			Self::FileAdded { path, .. }
			| Self::DirAdded { path, .. }
			| Self::FileChanged { path, .. }
			| Self::FileRemoved { path }
			| Self::DirRemoved { path } => Some(path),
			Self::Ready | Self::Error(_) => None,
		}
	}

	#[must_use]
	pub const fn stats(&self) -> Option<&FileStats> {
		match self {
			Self::FileAdded { stats, .. }
			| Self::DirAdded { stats, .. }
			| Self::FileChanged { stats, .. } => stats.as_ref(),
			_ => None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn translation_table_maps_every_raw_kind() {
		let path = Path::new("/test/entry");

		for (kind, expected) in [
			(RawKind::Add, EventType::Add),
			(RawKind::AddDir, EventType::AddDir),
			(RawKind::Change, EventType::Change),
			(RawKind::Unlink, EventType::Unlink),
			(RawKind::UnlinkDir, EventType::UnlinkDir),
		] {
			let event = NotificationEvent::translate(kind, path, None);
			assert_eq!(event.event_type(), Some(expected));
			assert_eq!(event.path(), Some(path));
			assert_eq!(kind.as_str(), expected.as_str());
		}
	}

	#[test]
	fn stats_only_kept_for_additions_and_changes() {
		let stats = FileStats {
			size: 10,
			..Default::default()
		};

		let added = NotificationEvent::translate(RawKind::Add, Path::new("/tmp/x.txt"), Some(&stats));
		assert_eq!(added.stats(), Some(&stats));

		let removed =
			NotificationEvent::translate(RawKind::Unlink, Path::new("/tmp/x.txt"), Some(&stats));
		assert_eq!(removed.stats(), None);
	}

	#[test]
	fn ready_and_error_have_no_event_type() {
		assert_eq!(NotificationEvent::Ready.event_type(), None);
		assert_eq!(NotificationEvent::Ready.path(), None);

		let error = NotificationEvent::Error(Arc::new(Error::SessionClosed));
		assert_eq!(error.event_type(), None);
	}

	#[test]
	fn event_type_serializes_to_host_vocabulary() {
		assert_eq!(
			serde_json::to_string(&EventType::UnlinkDir).unwrap(),
			"\"unlinkDir\""
		);
		assert_eq!(
			serde_json::from_str::<RawKind>("\"addDir\"").unwrap(),
			RawKind::AddDir
		);
	}

	#[test]
	fn stats_from_metadata() {
		let dir = tempfile::tempdir().unwrap();
		let file = dir.path().join("ten.bin");
		std::fs::write(&file, [0u8; 10]).unwrap();

		let stats = FileStats::from(&std::fs::metadata(&file).unwrap());
		assert_eq!(stats.size, 10);
		assert!(stats.is_file);
		assert!(!stats.is_dir);

		let stats = FileStats::from(&std::fs::metadata(dir.path()).unwrap());
		assert!(stats.is_dir);
	}
}
