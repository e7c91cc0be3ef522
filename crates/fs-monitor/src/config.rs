use crate::{Error, Result};

use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Interval used by the polling backend when none is configured
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Paths, directories or glob patterns to watch.
///
/// Accepts either a single string or an ordered list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WatchPaths {
	One(String),
	Many(Vec<String>),
}

impl WatchPaths {
	#[must_use]
	pub fn to_vec(&self) -> Vec<String> {
		match self {
			Self::One(path) => vec![path.clone()],
			Self::Many(paths) => paths.clone(),
		}
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		match self {
			Self::One(path) => path.is_empty(),
			Self::Many(paths) => paths.is_empty(),
		}
	}
}

impl From<&str> for WatchPaths {
	fn from(path: &str) -> Self {
		Self::One(path.to_string())
	}
}

impl From<String> for WatchPaths {
	fn from(path: String) -> Self {
		Self::One(path)
	}
}

impl From<Vec<String>> for WatchPaths {
	fn from(paths: Vec<String>) -> Self {
		Self::Many(paths)
	}
}

impl From<Vec<&str>> for WatchPaths {
	fn from(paths: Vec<&str>) -> Self {
		Self::Many(paths.into_iter().map(ToString::to_string).collect())
	}
}

/// Options handed verbatim to the watch session factory.
///
/// Field names follow chokidar's camelCase spelling so hosts can forward their existing
/// plugin configuration untouched. Keys the backend doesn't know about end up in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WatchOptions {
	/// Glob patterns of paths that must never be reported
	#[serde(deserialize_with = "one_or_many")]
	pub ignored: Vec<String>,
	/// Don't emit add/addDir for entries found during the initial scan
	pub ignore_initial: bool,
	pub follow_symlinks: bool,
	/// Base directory for relative paths, emitted paths are relative to it as well
	pub cwd: Option<PathBuf>,
	/// Treat every configured path literally, even if it looks like a glob
	pub disable_globbing: bool,
	pub use_polling: bool,
	/// Polling interval in milliseconds
	pub interval: u64,
	/// How many directory levels below each watched root are traversed
	pub depth: Option<usize>,
	/// Attach stats to live add/addDir/change events, not only to the initial scan
	pub always_stat: bool,
	pub ignore_permission_errors: bool,

	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

impl Default for WatchOptions {
	fn default() -> Self {
		Self {
			ignored: vec![],
			ignore_initial: false,
			follow_symlinks: true,
			cwd: None,
			disable_globbing: false,
			use_polling: false,
			interval: DEFAULT_POLL_INTERVAL_MS,
			depth: None,
			always_stat: false,
			ignore_permission_errors: false,
			extra: Map::new(),
		}
	}
}

fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(match Option::<WatchPaths>::deserialize(deserializer)? {
		Some(paths) => paths.to_vec(),
		None => vec![],
	})
}

/// Monitor configuration, immutable once handed to the adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterConfig {
	pub paths: WatchPaths,
	pub options: WatchOptions,
}

impl AdapterConfig {
	pub fn new(paths: impl Into<WatchPaths>, options: WatchOptions) -> Self {
		Self {
			paths: paths.into(),
			options,
		}
	}

	/// Parse a host supplied JSON object, both `paths` and `options` are required
	pub fn from_json(value: Value) -> Result<Self> {
		let Value::Object(ref object) = value else {
			return Err(Error::Config(
				"configuration must be a JSON object".to_string(),
			));
		};

		for key in ["paths", "options"] {
			if object.get(key).map_or(true, Value::is_null) {
				return Err(Error::Config(format!("missing required `{key}`")));
			}
		}

		let config = serde_json::from_value::<Self>(value)?;
		config.validate()?;

		Ok(config)
	}

	pub fn validate(&self) -> Result<()> {
		if self.paths.is_empty() {
			return Err(Error::Config("`paths` must not be empty".to_string()));
		}

		if self.paths.to_vec().iter().any(String::is_empty) {
			return Err(Error::Config(
				"`paths` must not contain empty entries".to_string(),
			));
		}

		Ok(())
	}
}
