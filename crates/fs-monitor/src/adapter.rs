use crate::{
	backend::NotifySessionFactory,
	callbacks::{MonitorCallbacks, Severity},
	config::AdapterConfig,
	error::ErrorClass,
	event::{FileStats, NotificationEvent, RawKind},
	session::{WatchSession, WatchSessionFactory},
	Error, Result,
};

use std::{
	fmt::Display,
	path::Path,
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc,
	},
};

use tracing::{debug, error, info, instrument, trace, warn};
use uuid::Uuid;

/// Name used as log origin, together with the adapter id
pub const COMPONENT_NAME: &str = "FsMonitorAdapter";

/// Opaque token identifying an adapter in logs and error messages
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AdapterId(String);

impl From<Uuid> for AdapterId {
	fn from(id: Uuid) -> Self {
		Self(id.to_string())
	}
}

impl From<&str> for AdapterId {
	fn from(id: &str) -> Self {
		Self(id.to_string())
	}
}

impl From<String> for AdapterId {
	fn from(id: String) -> Self {
		Self(id)
	}
}

impl Display for AdapterId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
	/// Session is up, notifications are being routed to the host
	Active,
	/// Session creation, subscription or start failed; the adapter holds no session
	ConstructionFailed,
	/// The host closed the adapter
	Closed,
}

/// Shared by every listener the adapter registers on its session
struct Router {
	origin: String,
	callbacks: Arc<dyn MonitorCallbacks>,
	ready: AtomicBool,
	closed: AtomicBool,
}

impl Router {
	fn new(id: &AdapterId, callbacks: Arc<dyn MonitorCallbacks>) -> Self {
		Self {
			origin: format!("{COMPONENT_NAME}[{id}]"),
			callbacks,
			ready: AtomicBool::new(false),
			closed: AtomicBool::new(false),
		}
	}

	fn log(&self, severity: Severity, message: &str) {
		let origin = self.origin.as_str();
		match severity {
			Severity::Trace => trace!(%origin, "{message}"),
			Severity::Debug => debug!(%origin, "{message}"),
			Severity::Info => info!(%origin, "{message}"),
			Severity::Warn => warn!(%origin, "{message}"),
			Severity::Error => error!(%origin, "{message}"),
		}

		self.callbacks.log(severity, origin, message);
	}

	fn react_to_event(&self, kind: RawKind, path: &Path, stats: Option<&FileStats>) {
		self.deliver(NotificationEvent::translate(kind, path, stats));
	}

	fn deliver(&self, event: NotificationEvent) {
		// Backends may still flush queued notifications while shutting down
		if self.closed.load(Ordering::Acquire) {
			trace!(origin = %self.origin, "Dropping notification for a closed adapter;");
			return;
		}

		match event {
			NotificationEvent::Ready => self.handle_ready(),
			NotificationEvent::Error(e) => self.handle_error(e),
			event => {
				if let (Some(event_type), Some(path)) = (event.event_type(), event.path()) {
					self.callbacks.event(event_type, path, event.stats(), None);
				}
			}
		}
	}

	fn handle_ready(&self) {
		if self.ready.swap(true, Ordering::AcqRel) {
			self.log(Severity::Warn, "watch session signaled ready more than once");
			return;
		}

		self.log(Severity::Trace, "READY");
		self.callbacks.ready();
	}

	fn handle_error(&self, error: Arc<Error>) {
		let message = format!("watch session reported an error: {error}");
		self.report(ErrorClass::RuntimeNotification, &message, error);
	}

	fn construction_failed(&self, error: Error) {
		let message = format!("{} unexpected error: {error}", self.origin);
		self.report(ErrorClass::Construction, &message, Arc::new(error));
	}

	fn report(&self, class: ErrorClass, message: &str, cause: Arc<Error>) {
		error!(origin = %self.origin, %class, "{message}");
		self.callbacks.log(Severity::Error, &self.origin, message);
		self.callbacks.error(message, cause);
	}
}

/// Routes a watch session's raw notifications to a host's callbacks.
///
/// Construction never fails from the caller's point of view: whatever goes wrong while
/// setting up the session is reported once through [`MonitorCallbacks::error`] and the
/// adapter ends up in [`AdapterState::ConstructionFailed`].
pub struct MonitorAdapter {
	id: AdapterId,
	router: Arc<Router>,
	session: Option<Box<dyn WatchSession>>,
	state: AdapterState,
}

impl MonitorAdapter {
	pub fn new<F>(
		id: impl Into<AdapterId>,
		callbacks: impl MonitorCallbacks,
		factory: &F,
		config: AdapterConfig,
	) -> Self
	where
		F: WatchSessionFactory + ?Sized,
	{
		let config = config.validate().map(|()| config);
		Self::build(id.into(), Arc::new(callbacks), factory, config)
	}

	/// Same as [`MonitorAdapter::new`] but for a raw JSON configuration; a missing or invalid
	/// configuration is reported like any other construction failure
	pub fn from_json<F>(
		id: impl Into<AdapterId>,
		callbacks: impl MonitorCallbacks,
		factory: &F,
		config: serde_json::Value,
	) -> Self
	where
		F: WatchSessionFactory + ?Sized,
	{
		Self::build(
			id.into(),
			Arc::new(callbacks),
			factory,
			AdapterConfig::from_json(config),
		)
	}

	/// Adapter backed by the default `notify` session, must be called within a tokio runtime
	pub fn with_notify(
		id: impl Into<AdapterId>,
		callbacks: impl MonitorCallbacks,
		config: AdapterConfig,
	) -> Self {
		Self::new(id, callbacks, &NotifySessionFactory::new(), config)
	}

	#[instrument(name = "fs_monitor_adapter", skip_all, fields(%id))]
	fn build<F>(
		id: AdapterId,
		callbacks: Arc<dyn MonitorCallbacks>,
		factory: &F,
		config: Result<AdapterConfig>,
	) -> Self
	where
		F: WatchSessionFactory + ?Sized,
	{
		let router = Arc::new(Router::new(&id, callbacks));

		match config.and_then(|config| Self::open_session(&router, factory, &config)) {
			Ok(session) => {
				debug!("Monitor adapter active");
				Self {
					id,
					router,
					session: Some(session),
					state: AdapterState::Active,
				}
			}
			Err(e) => {
				router.construction_failed(e);
				Self {
					id,
					router,
					session: None,
					state: AdapterState::ConstructionFailed,
				}
			}
		}
	}

	fn open_session<F>(
		router: &Arc<Router>,
		factory: &F,
		config: &AdapterConfig,
	) -> Result<Box<dyn WatchSession>>
	where
		F: WatchSessionFactory + ?Sized,
	{
		let mut session = factory.create(&config.paths, &config.options)?;

		if let Err(e) = Self::subscribe(router, &mut *session).and_then(|()| session.start()) {
			if let Err(close_err) = session.close() {
				warn!(?close_err, "Failed to close half-initialized watch session;");
			}
			return Err(e);
		}

		Ok(session)
	}

	fn subscribe(router: &Arc<Router>, session: &mut dyn WatchSession) -> Result<()> {
		for kind in RawKind::ALL {
			let router = Arc::clone(router);
			session.on_change(
				kind,
				Box::new(move |path: &Path, stats: Option<&FileStats>| {
					router.react_to_event(kind, path, stats);
				}),
			)?;
		}

		session.on_ready(Box::new({
			let router = Arc::clone(router);
			move || router.deliver(NotificationEvent::Ready)
		}))?;

		session.on_error(Box::new({
			let router = Arc::clone(router);
			move |e: Arc<Error>| router.deliver(NotificationEvent::Error(e))
		}))?;

		Ok(())
	}

	#[must_use]
	pub const fn id(&self) -> &AdapterId {
		&self.id
	}

	#[must_use]
	pub const fn state(&self) -> AdapterState {
		self.state
	}

	/// Whether the host's ready callback already fired
	#[must_use]
	pub fn is_ready(&self) -> bool {
		self.router.ready.load(Ordering::Acquire)
	}

	/// Tears the watch session down. Notifications arriving after this call are dropped, a
	/// callback already running on the session's task is left to finish.
	pub fn close(&mut self) {
		let Some(mut session) = self.session.take() else {
			return;
		};

		self.router.closed.store(true, Ordering::Release);

		if let Err(e) = session.close() {
			self.router
				.log(Severity::Warn, &format!("failed to close watch session: {e}"));
		}

		self.state = AdapterState::Closed;
	}
}

impl Drop for MonitorAdapter {
	fn drop(&mut self) {
		self.close();
	}
}

impl std::fmt::Debug for MonitorAdapter {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MonitorAdapter")
			.field("id", &self.id)
			.field("state", &self.state)
			.field("ready", &self.is_ready())
			.finish_non_exhaustive()
	}
}
