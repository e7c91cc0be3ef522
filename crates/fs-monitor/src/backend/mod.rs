//! Default watch session, backed by `notify`.
//!
//! The `notify` watcher runs on its own thread and pushes results into an unbounded channel.
//! A single tokio task owns everything else: it runs the initial scan, signals readiness and
//! then classifies live events until the session is closed.

use crate::{
	config::{WatchOptions, WatchPaths},
	session::{
		ChangeListener, ErrorListener, Listeners, ReadyListener, WatchSession, WatchSessionFactory,
	},
	Error, RawKind, Result,
};

use std::{pin::pin, sync::Arc, time::Duration};

use async_channel as chan;
use futures::StreamExt;
use futures_concurrency::stream::Merge;
use notify::{Config, Event, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::{runtime::Handle, task::JoinHandle};
use tracing::{debug, error, instrument, trace, Instrument};

mod classify;
mod matcher;
mod scan;

use classify::Classifier;
use matcher::PathMatcher;
use scan::{InitialScan, ScanOptions, ScanOutcome};

type WatcherResult = notify::Result<Event>;

/// Builds [`NotifySession`]s, spawning their event task on a tokio runtime
#[derive(Debug, Clone, Default)]
pub struct NotifySessionFactory {
	runtime: Option<Handle>,
}

impl NotifySessionFactory {
	/// Sessions run on the runtime current at creation time
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn with_runtime(runtime: Handle) -> Self {
		Self {
			runtime: Some(runtime),
		}
	}
}

impl WatchSessionFactory for NotifySessionFactory {
	fn create(&self, paths: &WatchPaths, options: &WatchOptions) -> Result<Box<dyn WatchSession>> {
		NotifySession::new(paths, options, self.runtime.clone())
			.map(|session| -> Box<dyn WatchSession> { Box::new(session) })
	}
}

enum SessionState {
	Idle {
		listeners: Listeners,
		events_rx: chan::Receiver<WatcherResult>,
	},
	Running(JoinHandle<()>),
	Closed,
}

pub struct NotifySession {
	state: SessionState,
	watcher: Option<Box<dyn Watcher + Send>>,
	runtime: Handle,
	matcher: Arc<PathMatcher>,
	scan_options: ScanOptions,
	always_stat: bool,
	stop_tx: chan::Sender<()>,
	stop_rx: chan::Receiver<()>,
}

impl NotifySession {
	#[instrument(name = "notify_session", skip_all, fields(paths = ?paths, polling = options.use_polling))]
	fn new(paths: &WatchPaths, options: &WatchOptions, runtime: Option<Handle>) -> Result<Self> {
		let runtime = match runtime {
			Some(runtime) => runtime,
			None => Handle::try_current().map_err(|_| Error::NoRuntime)?,
		};

		if !options.extra.is_empty() {
			debug!(
				keys = ?options.extra.keys().collect::<Vec<_>>(),
				"Ignoring watch options unknown to the notify backend;"
			);
		}

		let matcher = PathMatcher::new(&paths.to_vec(), options)?;

		let (events_tx, events_rx) = chan::unbounded();
		let (stop_tx, stop_rx) = chan::bounded(1);

		let mut watcher = spawn_watcher(events_tx, options)?;
		for root in matcher.roots() {
			watcher.watch(root, RecursiveMode::Recursive)?;
			trace!(root = %root.display(), "Now watching;");
		}

		Ok(Self {
			state: SessionState::Idle {
				listeners: Listeners::default(),
				events_rx,
			},
			watcher: Some(watcher),
			runtime,
			matcher: Arc::new(matcher),
			scan_options: ScanOptions::from(options),
			always_stat: options.always_stat,
			stop_tx,
			stop_rx,
		})
	}

	fn listeners_mut(&mut self) -> Result<&mut Listeners> {
		match &mut self.state {
			SessionState::Idle { listeners, .. } => Ok(listeners),
			SessionState::Running(_) => Err(Error::AlreadyStarted),
			SessionState::Closed => Err(Error::SessionClosed),
		}
	}
}

fn spawn_watcher(
	events_tx: chan::Sender<WatcherResult>,
	options: &WatchOptions,
) -> Result<Box<dyn Watcher + Send>> {
	let handler = move |result: WatcherResult| {
		if !events_tx.is_closed() {
			// SAFETY: we are not blocking the thread as this is an unbounded channel
			if events_tx.send_blocking(result).is_err() {
				error!("Unable to send watcher event to monitor session;");
			}
		} else {
			trace!("Tried to send file system events to a closed channel;");
		}
	};

	let config = Config::default()
		.with_poll_interval(Duration::from_millis(options.interval))
		.with_follow_symlinks(options.follow_symlinks);

	Ok(if options.use_polling {
		Box::new(PollWatcher::new(handler, config)?)
	} else {
		Box::new(RecommendedWatcher::new(handler, config)?)
	})
}

impl WatchSession for NotifySession {
	fn on_change(&mut self, kind: RawKind, listener: ChangeListener) -> Result<()> {
		self.listeners_mut()?.push_change(kind, listener);
		Ok(())
	}

	fn on_ready(&mut self, listener: ReadyListener) -> Result<()> {
		self.listeners_mut()?.push_ready(listener);
		Ok(())
	}

	fn on_error(&mut self, listener: ErrorListener) -> Result<()> {
		self.listeners_mut()?.push_error(listener);
		Ok(())
	}

	fn start(&mut self) -> Result<()> {
		match std::mem::replace(&mut self.state, SessionState::Closed) {
			SessionState::Idle {
				listeners,
				events_rx,
			} => {
				let handle = self.runtime.spawn(
					run_session(
						Arc::clone(&self.matcher),
						self.scan_options,
						Classifier::new(self.always_stat),
						listeners,
						events_rx,
						self.stop_rx.clone(),
					)
					.in_current_span(),
				);

				self.state = SessionState::Running(handle);
				Ok(())
			}
			running @ SessionState::Running(_) => {
				self.state = running;
				Err(Error::AlreadyStarted)
			}
			SessionState::Closed => Err(Error::SessionClosed),
		}
	}

	fn close(&mut self) -> Result<()> {
		// Dropping the watcher stops the notify thread and closes the events channel
		self.watcher.take();

		match std::mem::replace(&mut self.state, SessionState::Closed) {
			SessionState::Running(handle) => {
				if self.stop_tx.try_send(()).is_err() {
					trace!("Stop already requested for monitor session");
				}
				drop(handle);
			}
			SessionState::Idle { .. } | SessionState::Closed => {}
		}

		Ok(())
	}
}

impl Drop for NotifySession {
	fn drop(&mut self) {
		if let Err(e) = self.close() {
			error!(?e, "Failed to close monitor session;");
		}
	}
}

impl std::fmt::Debug for NotifySession {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("NotifySession")
			.field("matcher", &self.matcher)
			.field("scan_options", &self.scan_options)
			.field("always_stat", &self.always_stat)
			.finish_non_exhaustive()
	}
}

async fn run_session(
	matcher: Arc<PathMatcher>,
	scan_options: ScanOptions,
	mut classifier: Classifier,
	listeners: Listeners,
	events_rx: chan::Receiver<WatcherResult>,
	stop_rx: chan::Receiver<()>,
) {
	enum StreamMessage {
		NewEvent(WatcherResult),
		Stop,
	}

	let scan = InitialScan {
		matcher: &matcher,
		options: scan_options,
		listeners: &listeners,
		stop_rx: &stop_rx,
	};

	if scan.run(classifier.known_dirs_mut()).await == ScanOutcome::Stopped {
		return;
	}

	listeners.emit_ready();

	// Contents of directories appearing later on are always reported
	let live_scan = InitialScan {
		options: ScanOptions {
			ignore_initial: false,
			..scan_options
		},
		..scan
	};

	let mut msg_stream = pin!((
		events_rx.map(StreamMessage::NewEvent),
		stop_rx.clone().map(|()| StreamMessage::Stop),
	)
		.merge());

	while let Some(msg) = msg_stream.next().await {
		match msg {
			StreamMessage::NewEvent(Ok(event)) => {
				for notification in classifier.classify(event).await {
					if matcher.matches(&notification.path) {
						listeners.emit_change(
							notification.kind,
							&matcher.to_emitted(&notification.path),
							notification.stats.as_ref(),
						);
					} else {
						trace!(path = %notification.path.display(), "Event outside of watched set;");
					}

					if notification.kind == RawKind::AddDir
						&& live_scan
							.run_below(&notification.path, classifier.known_dirs_mut())
							.await == ScanOutcome::Stopped
					{
						return;
					}
				}
			}

			StreamMessage::NewEvent(Err(e)) => {
				error!(?e, "Watcher error;");
				listeners.emit_error(Error::Watch(e));
			}

			StreamMessage::Stop => {
				debug!("Stopping monitor session event loop");
				break;
			}
		}
	}
}
