use std::{fmt::Display, path::Path};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
	#[error("invalid monitor configuration: {0}")]
	Config(String),
	#[error("failed to deserialize monitor configuration: {0}")]
	Json(#[from] serde_json::Error),
	#[error("invalid glob pattern: {0}")]
	Glob(#[from] globset::Error),
	#[error("watcher error: {0}")]
	Watch(#[from] notify::Error),
	#[error(transparent)]
	FileIO(#[from] FileIOError),

	#[error("no tokio runtime available to drive the watch session")]
	NoRuntime,
	#[error("tried to subscribe to a watch session that was already started")]
	AlreadyStarted,
	#[error("watch session is closed")]
	SessionClosed,
}

/// Where a failure surfaced, used for attribution in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
	/// Session creation, subscription or start failed; the adapter is unusable.
	Construction,
	/// The watch session reported an error after it was running.
	RuntimeNotification,
}

impl Display for ErrorClass {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Construction => write!(f, "construction"),
			Self::RuntimeNotification => write!(f, "runtime_notification"),
		}
	}
}

/// File I/O error that includes the path that caused the error
#[derive(Error, Debug)]
pub struct FileIOError {
	pub path: Box<Path>,
	#[source]
	pub source: std::io::Error,
	pub maybe_context: Option<String>,
}

impl Display for FileIOError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(
			f,
			"file I/O error{}: {}; path: '{}'",
			self.maybe_context
				.as_ref()
				.map(|ctx| format!(" ({ctx})"))
				.unwrap_or_default(),
			self.source,
			self.path.display()
		)
	}
}

impl FileIOError {
	pub fn from_std_io_err(path: impl AsRef<Path>, source: std::io::Error) -> Self {
		Self {
			path: path.as_ref().into(),
			source,
			maybe_context: None,
		}
	}

	pub fn from_std_io_err_with_msg(
		path: impl AsRef<Path>,
		source: std::io::Error,
		msg: impl Into<String>,
	) -> Self {
		Self {
			path: path.as_ref().into(),
			source,
			maybe_context: Some(msg.into()),
		}
	}

	#[must_use]
	pub fn is_permission_denied(&self) -> bool {
		self.source.kind() == std::io::ErrorKind::PermissionDenied
	}
}
