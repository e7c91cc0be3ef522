//! Host facing side of the adapter.
//!
//! The host hands over a single [`MonitorCallbacks`] implementation when building a
//! [`MonitorAdapter`](crate::MonitorAdapter); it is kept for the adapter's whole lifetime.
//! Use [`CallbackSet`] to plug in plain closures or [`ChannelCallbacks`] to receive everything
//! as [`HostMessage`]s on an async channel.

use crate::{
	event::{EventDetails, EventType, FileStats},
	Error,
};

use std::{
	fmt::Display,
	path::{Path, PathBuf},
	sync::Arc,
};

use async_channel as chan;
use serde::{Deserialize, Serialize};
use tracing::error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
	Trace,
	Debug,
	Info,
	Warn,
	Error,
}

impl Display for Severity {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(match self {
			Self::Trace => "trace",
			Self::Debug => "debug",
			Self::Info => "info",
			Self::Warn => "warn",
			Self::Error => "error",
		})
	}
}

/// Capability the adapter delivers everything through.
///
/// Implementations must not panic; they are called from whatever thread or task drives the
/// underlying watch session.
pub trait MonitorCallbacks: Send + Sync + 'static {
	fn log(&self, severity: Severity, origin: &str, message: &str);

	fn error(&self, message: &str, cause: Arc<Error>);

	fn event(
		&self,
		event_type: EventType,
		path: &Path,
		stats: Option<&FileStats>,
		details: Option<&EventDetails>,
	);

	/// Called at most once, after the initial scan completed
	fn ready(&self);
}

impl<T: MonitorCallbacks + ?Sized> MonitorCallbacks for Arc<T> {
	fn log(&self, severity: Severity, origin: &str, message: &str) {
		(**self).log(severity, origin, message);
	}

	fn error(&self, message: &str, cause: Arc<Error>) {
		(**self).error(message, cause);
	}

	fn event(
		&self,
		event_type: EventType,
		path: &Path,
		stats: Option<&FileStats>,
		details: Option<&EventDetails>,
	) {
		(**self).event(event_type, path, stats, details);
	}

	fn ready(&self) {
		(**self).ready();
	}
}

type LogFn = Box<dyn Fn(Severity, &str, &str) + Send + Sync>;
type ErrorFn = Box<dyn Fn(&str, Arc<Error>) + Send + Sync>;
type EventFn =
	Box<dyn Fn(EventType, &Path, Option<&FileStats>, Option<&EventDetails>) + Send + Sync>;
type ReadyFn = Box<dyn Fn() + Send + Sync>;

/// Four plain function references, the classic reactor plugin signature
pub struct CallbackSet {
	log_fn: LogFn,
	error_fn: ErrorFn,
	event_fn: EventFn,
	ready_fn: ReadyFn,
}

impl CallbackSet {
	pub fn new(
		log_fn: impl Fn(Severity, &str, &str) + Send + Sync + 'static,
		error_fn: impl Fn(&str, Arc<Error>) + Send + Sync + 'static,
		event_fn: impl Fn(EventType, &Path, Option<&FileStats>, Option<&EventDetails>)
			+ Send
			+ Sync
			+ 'static,
		ready_fn: impl Fn() + Send + Sync + 'static,
	) -> Self {
		Self {
			log_fn: Box::new(log_fn),
			error_fn: Box::new(error_fn),
			event_fn: Box::new(event_fn),
			ready_fn: Box::new(ready_fn),
		}
	}
}

impl std::fmt::Debug for CallbackSet {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CallbackSet").finish_non_exhaustive()
	}
}

impl MonitorCallbacks for CallbackSet {
	fn log(&self, severity: Severity, origin: &str, message: &str) {
		(self.log_fn)(severity, origin, message);
	}

	fn error(&self, message: &str, cause: Arc<Error>) {
		(self.error_fn)(message, cause);
	}

	fn event(
		&self,
		event_type: EventType,
		path: &Path,
		stats: Option<&FileStats>,
		details: Option<&EventDetails>,
	) {
		(self.event_fn)(event_type, path, stats, details);
	}

	fn ready(&self) {
		(self.ready_fn)();
	}
}

/// Everything a [`ChannelCallbacks`] forwards to the host
#[derive(Debug, Clone)]
pub enum HostMessage {
	Log {
		severity: Severity,
		origin: String,
		message: String,
	},
	Error {
		message: String,
		cause: Arc<Error>,
	},
	Event {
		event_type: EventType,
		path: PathBuf,
		stats: Option<FileStats>,
		details: Option<EventDetails>,
	},
	Ready,
}

/// Forwards every callback as a [`HostMessage`] through an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelCallbacks {
	tx: chan::Sender<HostMessage>,
}

impl ChannelCallbacks {
	#[must_use]
	pub fn new() -> (Self, chan::Receiver<HostMessage>) {
		let (tx, rx) = chan::unbounded();
		(Self { tx }, rx)
	}

	#[must_use]
	pub const fn from_sender(tx: chan::Sender<HostMessage>) -> Self {
		Self { tx }
	}

	fn send(&self, msg: HostMessage) {
		if self.tx.is_closed() {
			error!("Tried to send monitor message to a closed channel;");
			return;
		}

		// SAFETY: we are not blocking the thread as this is an unbounded channel
		if self.tx.send_blocking(msg).is_err() {
			error!("Unable to send monitor message to host;");
		}
	}
}

impl MonitorCallbacks for ChannelCallbacks {
	fn log(&self, severity: Severity, origin: &str, message: &str) {
		self.send(HostMessage::Log {
			severity,
			origin: origin.to_string(),
			message: message.to_string(),
		});
	}

	fn error(&self, message: &str, cause: Arc<Error>) {
		self.send(HostMessage::Error {
			message: message.to_string(),
			cause,
		});
	}

	fn event(
		&self,
		event_type: EventType,
		path: &Path,
		stats: Option<&FileStats>,
		details: Option<&EventDetails>,
	) {
		self.send(HostMessage::Event {
			event_type,
			path: path.to_path_buf(),
			stats: stats.cloned(),
			details: details.cloned(),
		});
	}

	fn ready(&self) {
		self.send(HostMessage::Ready);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use std::sync::Mutex;

	#[test]
	fn severity_display_is_lowercase() {
		assert_eq!(Severity::Trace.to_string(), "trace");
		assert_eq!(Severity::Error.to_string(), "error");
		assert!(Severity::Trace < Severity::Error);
	}

	#[test]
	fn callback_set_dispatches_to_closures() {
		let seen = Arc::new(Mutex::new(Vec::new()));

		let callbacks = CallbackSet::new(
			{
				let seen = Arc::clone(&seen);
				move |severity, origin, message| {
					seen.lock()
						.unwrap()
						.push(format!("log {severity} {origin} {message}"));
				}
			},
			{
				let seen = Arc::clone(&seen);
				move |message, cause| {
					seen.lock()
						.unwrap()
						.push(format!("error {message} {cause}"));
				}
			},
			{
				let seen = Arc::clone(&seen);
				move |event_type, path, _, _| {
					seen.lock()
						.unwrap()
						.push(format!("event {event_type} {}", path.display()));
				}
			},
			{
				let seen = Arc::clone(&seen);
				move || seen.lock().unwrap().push("ready".to_string())
			},
		);

		callbacks.log(Severity::Info, "origin", "hello");
		callbacks.error("boom", Arc::new(Error::SessionClosed));
		callbacks.event(EventType::Add, Path::new("/a"), None, None);
		callbacks.ready();

		assert_eq!(
			*seen.lock().unwrap(),
			vec![
				"log info origin hello".to_string(),
				"error boom watch session is closed".to_string(),
				"event add /a".to_string(),
				"ready".to_string(),
			]
		);
	}

	#[test]
	fn channel_callbacks_forward_messages() {
		let (callbacks, rx) = ChannelCallbacks::new();

		let stats = FileStats {
			size: 3,
			..Default::default()
		};
		callbacks.event(EventType::Change, Path::new("/c"), Some(&stats), None);
		callbacks.ready();

		match rx.try_recv().unwrap() {
			HostMessage::Event {
				event_type,
				path,
				stats: Some(forwarded),
				details: None,
			} => {
				assert_eq!(event_type, EventType::Change);
				assert_eq!(path, PathBuf::from("/c"));
				assert_eq!(forwarded, stats);
			}
			other => panic!("unexpected message: {other:?}"),
		}
		assert!(matches!(rx.try_recv().unwrap(), HostMessage::Ready));
	}

	#[test]
	fn channel_callbacks_survive_closed_receiver() {
		let (callbacks, rx) = ChannelCallbacks::new();
		drop(rx);

		callbacks.ready();
		callbacks.log(Severity::Warn, "origin", "nobody listening");
	}
}
