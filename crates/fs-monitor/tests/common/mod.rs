#![allow(dead_code, clippy::unwrap_used)]

use sd_fs_monitor::{
	ChangeListener, Error, ErrorListener, EventDetails, EventType, FileStats, Listeners,
	MonitorCallbacks, RawKind, ReadyListener, Result, Severity, WatchOptions, WatchPaths,
	WatchSession, WatchSessionFactory,
};

use std::{
	path::{Path, PathBuf},
	sync::{
		atomic::{AtomicUsize, Ordering},
		Arc, Mutex,
	},
};

#[derive(Debug, Clone)]
pub enum Call {
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

/// Records every callback invocation in order
#[derive(Debug, Clone, Default)]
pub struct RecordingCallbacks {
	calls: Arc<Mutex<Vec<Call>>>,
}

impl RecordingCallbacks {
	pub fn calls(&self) -> Vec<Call> {
		self.calls.lock().unwrap().clone()
	}

	pub fn events(&self) -> Vec<(EventType, PathBuf, Option<FileStats>, Option<EventDetails>)> {
		self.calls()
			.into_iter()
			.filter_map(|call| match call {
				Call::Event {
					event_type,
					path,
					stats,
					details,
				} => Some((event_type, path, stats, details)),
				_ => None,
			})
			.collect()
	}

	pub fn errors(&self) -> Vec<(String, Arc<Error>)> {
		self.calls()
			.into_iter()
			.filter_map(|call| match call {
				Call::Error { message, cause } => Some((message, cause)),
				_ => None,
			})
			.collect()
	}

	pub fn logs(&self) -> Vec<(Severity, String, String)> {
		self.calls()
			.into_iter()
			.filter_map(|call| match call {
				Call::Log {
					severity,
					origin,
					message,
				} => Some((severity, origin, message)),
				_ => None,
			})
			.collect()
	}

	pub fn ready_count(&self) -> usize {
		self.calls()
			.iter()
			.filter(|call| matches!(call, Call::Ready))
			.count()
	}

	fn push(&self, call: Call) {
		self.calls.lock().unwrap().push(call);
	}
}

impl MonitorCallbacks for RecordingCallbacks {
	fn log(&self, severity: Severity, origin: &str, message: &str) {
		self.push(Call::Log {
			severity,
			origin: origin.to_string(),
			message: message.to_string(),
		});
	}

	fn error(&self, message: &str, cause: Arc<Error>) {
		self.push(Call::Error {
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
		self.push(Call::Event {
			event_type,
			path: path.to_path_buf(),
			stats: stats.cloned(),
			details: details.cloned(),
		});
	}

	fn ready(&self) {
		self.push(Call::Ready);
	}
}

/// Step at which a [`MockSessionFactory`] should fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
	None,
	Create,
	Subscribe,
	Start,
}

#[derive(Debug, Default)]
struct MockState {
	listeners: Listeners,
	started: bool,
	closed: bool,
	paths: Option<WatchPaths>,
}

/// Lets a test push raw notifications into the session the adapter subscribed to
#[derive(Debug, Clone, Default)]
pub struct MockHandle {
	state: Arc<Mutex<MockState>>,
}

impl MockHandle {
	fn live<R>(&self, f: impl FnOnce(&Listeners) -> R) -> Option<R> {
		let state = self.state.lock().unwrap();
		(state.started && !state.closed).then(|| f(&state.listeners))
	}

	pub fn change(&self, kind: RawKind, path: &str, stats: Option<FileStats>) {
		self.live(|listeners| listeners.emit_change(kind, Path::new(path), stats.as_ref()));
	}

	/// Emits even after close, like a backend flushing what it had already queued
	pub fn flush_change(&self, kind: RawKind, path: &str) {
		let state = self.state.lock().unwrap();
		state.listeners.emit_change(kind, Path::new(path), None);
	}

	pub fn ready(&self) {
		self.live(Listeners::emit_ready);
	}

	pub fn error(&self, error: Error) {
		self.live(|listeners| listeners.emit_error(error));
	}

	pub fn is_started(&self) -> bool {
		self.state.lock().unwrap().started
	}

	pub fn is_closed(&self) -> bool {
		self.state.lock().unwrap().closed
	}

	pub fn paths(&self) -> Option<WatchPaths> {
		self.state.lock().unwrap().paths.clone()
	}
}

#[derive(Debug)]
pub struct MockSessionFactory {
	failure: Failure,
	handle: MockHandle,
	created: AtomicUsize,
}

impl MockSessionFactory {
	pub fn new(failure: Failure) -> (Self, MockHandle) {
		let handle = MockHandle::default();
		(
			Self {
				failure,
				handle: handle.clone(),
				created: AtomicUsize::new(0),
			},
			handle,
		)
	}

	pub fn created(&self) -> usize {
		self.created.load(Ordering::SeqCst)
	}
}

impl WatchSessionFactory for MockSessionFactory {
	fn create(&self, paths: &WatchPaths, _options: &WatchOptions) -> Result<Box<dyn WatchSession>> {
		self.created.fetch_add(1, Ordering::SeqCst);

		if self.failure == Failure::Create {
			return Err(Error::Config("mock backend refused to watch".to_string()));
		}

		self.handle.state.lock().unwrap().paths = Some(paths.clone());

		Ok(Box::new(MockSession {
			failure: self.failure,
			state: Arc::clone(&self.handle.state),
		}))
	}
}

#[derive(Debug)]
struct MockSession {
	failure: Failure,
	state: Arc<Mutex<MockState>>,
}

impl MockSession {
	fn subscribe(&self, f: impl FnOnce(&mut Listeners)) -> Result<()> {
		let mut state = self.state.lock().unwrap();
		if state.closed {
			return Err(Error::SessionClosed);
		}
		if state.started {
			return Err(Error::AlreadyStarted);
		}

		f(&mut state.listeners);
		Ok(())
	}
}

impl WatchSession for MockSession {
	fn on_change(&mut self, kind: RawKind, listener: ChangeListener) -> Result<()> {
		self.subscribe(|listeners| listeners.push_change(kind, listener))
	}

	fn on_ready(&mut self, listener: ReadyListener) -> Result<()> {
		self.subscribe(|listeners| listeners.push_ready(listener))
	}

	fn on_error(&mut self, listener: ErrorListener) -> Result<()> {
		if self.failure == Failure::Subscribe {
			return Err(Error::Config("mock backend has no error channel".to_string()));
		}

		self.subscribe(|listeners| listeners.push_error(listener))
	}

	fn start(&mut self) -> Result<()> {
		if self.failure == Failure::Start {
			return Err(Error::NoRuntime);
		}

		self.state.lock().unwrap().started = true;
		Ok(())
	}

	fn close(&mut self) -> Result<()> {
		self.state.lock().unwrap().closed = true;
		Ok(())
	}
}
