//! Seam between the adapter and whatever actually watches the filesystem.
//!
//! A [`WatchSessionFactory`] produces one [`WatchSession`] per adapter. The adapter subscribes
//! listeners by kind and then starts the session; a session must not emit anything before
//! [`WatchSession::start`] was called.

use crate::{
	config::{WatchOptions, WatchPaths},
	event::{FileStats, RawKind},
	Error, Result,
};

use std::{path::Path, sync::Arc};

pub type ChangeListener = Box<dyn Fn(&Path, Option<&FileStats>) + Send + Sync>;
pub type ReadyListener = Box<dyn Fn() + Send + Sync>;
pub type ErrorListener = Box<dyn Fn(Arc<Error>) + Send + Sync>;

pub trait WatchSessionFactory {
	fn create(&self, paths: &WatchPaths, options: &WatchOptions) -> Result<Box<dyn WatchSession>>;
}

impl<F> WatchSessionFactory for F
where
	F: Fn(&WatchPaths, &WatchOptions) -> Result<Box<dyn WatchSession>>,
{
	fn create(&self, paths: &WatchPaths, options: &WatchOptions) -> Result<Box<dyn WatchSession>> {
		self(paths, options)
	}
}

pub trait WatchSession: Send {
	fn on_change(&mut self, kind: RawKind, listener: ChangeListener) -> Result<()>;

	/// The listener fires once the initial scan of every watched path completed
	fn on_ready(&mut self, listener: ReadyListener) -> Result<()>;

	fn on_error(&mut self, listener: ErrorListener) -> Result<()>;

	fn start(&mut self) -> Result<()>;

	/// Stops delivering notifications, closing twice is a no-op
	fn close(&mut self) -> Result<()>;
}

/// Listeners registered on a session, grouped by what they listen to
#[derive(Default)]
pub struct Listeners {
	change: Vec<(RawKind, ChangeListener)>,
	ready: Vec<ReadyListener>,
	error: Vec<ErrorListener>,
}

impl Listeners {
	pub fn push_change(&mut self, kind: RawKind, listener: ChangeListener) {
		self.change.push((kind, listener));
	}

	pub fn push_ready(&mut self, listener: ReadyListener) {
		self.ready.push(listener);
	}

	pub fn push_error(&mut self, listener: ErrorListener) {
		self.error.push(listener);
	}

	pub fn emit_change(&self, kind: RawKind, path: &Path, stats: Option<&FileStats>) {
		self.change
			.iter()
			.filter(|(listening, _)| *listening == kind)
			.for_each(|(_, listener)| listener(path, stats));
	}

	pub fn emit_ready(&self) {
		self.ready.iter().for_each(|listener| listener());
	}

	pub fn emit_error(&self, error: Error) {
		let error = Arc::new(error);
		self.error
			.iter()
			.for_each(|listener| listener(Arc::clone(&error)));
	}

	#[must_use]
	pub fn has_error_listener(&self) -> bool {
		!self.error.is_empty()
	}
}

impl std::fmt::Debug for Listeners {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Listeners")
			.field(
				"change",
				&self.change.iter().map(|(kind, _)| kind).collect::<Vec<_>>(),
			)
			.field("ready", &self.ready.len())
			.field("error", &self.error.len())
			.finish()
	}
}
