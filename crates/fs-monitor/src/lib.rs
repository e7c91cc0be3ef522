//!
//! # Filesystem Monitor Adapter
//!
//! Plugs a filesystem watch session into a host reactor's callback protocol. The adapter owns
//! a single [`WatchSession`], subscribes to every raw change kind it offers and translates
//! each notification into one of five event types (`add`, `addDir`, `change`, `unlink` and
//! `unlinkDir`) before handing it to the host's [`MonitorCallbacks`]. Readiness is forwarded
//! once, after the session enumerated everything it watches.
//!
//! Nothing ever escapes the adapter as an error or panic: a session that can't be created or
//! that fails later on is reported through [`MonitorCallbacks::error`], with a log line
//! preceding it.
//!
//! The underlying watch mechanism is injected through [`WatchSessionFactory`]. The crate ships
//! [`NotifySessionFactory`], built on `notify`, that understands chokidar style options.
//!
//! ## Basic example
//!
//! ```no_run
//! use sd_fs_monitor::{AdapterConfig, ChannelCallbacks, HostMessage, MonitorAdapter, WatchOptions};
//!
//! #[tokio::main]
//! async fn main() {
//!     let (callbacks, messages) = ChannelCallbacks::new();
//!
//!     let _adapter = MonitorAdapter::with_notify(
//!         "reactor-1",
//!         callbacks,
//!         AdapterConfig::new("/tmp/watched", WatchOptions::default()),
//!     );
//!
//!     while let Ok(msg) = messages.recv().await {
//!         if let HostMessage::Event { event_type, path, .. } = msg {
//!             println!("{event_type} {}", path.display());
//!         }
//!     }
//! }
//! ```

#![warn(
	clippy::all,
	clippy::pedantic,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::nursery,
	clippy::unwrap_used,
	unused_qualifications,
	rust_2018_idioms,
	trivial_casts,
	trivial_numeric_casts,
	unused_allocation,
	clippy::unnecessary_cast,
	clippy::cast_lossless,
	clippy::cast_possible_truncation,
	clippy::cast_possible_wrap,
	clippy::cast_precision_loss,
	clippy::cast_sign_loss,
	clippy::dbg_macro,
	clippy::deprecated_cfg_attr,
	clippy::separated_literal_suffix,
	deprecated
)]
#![forbid(deprecated_in_future)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

mod adapter;
mod backend;
mod callbacks;
mod config;
mod error;
mod event;
mod session;

pub use adapter::{AdapterId, AdapterState, MonitorAdapter, COMPONENT_NAME};
pub use backend::{NotifySession, NotifySessionFactory};
pub use callbacks::{CallbackSet, ChannelCallbacks, HostMessage, MonitorCallbacks, Severity};
pub use config::{AdapterConfig, WatchOptions, WatchPaths, DEFAULT_POLL_INTERVAL_MS};
pub use error::{Error, ErrorClass, FileIOError, Result};
pub use event::{EventDetails, EventType, FileStats, NotificationEvent, RawKind};
pub use session::{
	ChangeListener, ErrorListener, Listeners, ReadyListener, WatchSession, WatchSessionFactory,
};
