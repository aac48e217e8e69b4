//! Router error types.

use std::fmt;
use std::sync::Arc;

use reinhardt_url_tree::{CommandError, UrlTreeError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::guards::RedirectCommand;

/// Stable, machine-readable reason a navigation was canceled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NavigationCancellationCode {
	/// A guard or resolver redirected; a new navigation replaces this one.
	Redirect,
	/// A newer navigation was scheduled before this one finished.
	SupersededByNewNavigation,
	/// A resolver completed without producing a value.
	NoDataFromResolver,
	/// A guard returned `false`.
	GuardRejected,
}

impl fmt::Display for NavigationCancellationCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Self::Redirect => "Redirect",
			Self::SupersededByNewNavigation => "SupersededByNewNavigation",
			Self::NoDataFromResolver => "NoDataFromResolver",
			Self::GuardRejected => "GuardRejected",
		};
		f.write_str(name)
	}
}

/// Stable reason a navigation was skipped without running the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NavigationSkippedCode {
	/// Same URL as the current one under the `ignore` policy.
	IgnoredSameUrlNavigation,
	/// The URL handling strategy claimed neither the current nor the target URL.
	IgnoredByUrlHandlingStrategy,
}

/// A cancellation raised from inside the pipeline.
///
/// Carries a redirect target when the cancellation should be followed by a
/// new navigation.
#[derive(Debug, Clone)]
pub struct NavigationCanceling {
	pub code: NavigationCancellationCode,
	/// Human-readable reason. Do not match on it.
	pub reason: String,
	pub redirect: Option<RedirectCommand>,
}

impl NavigationCanceling {
	pub fn new(code: NavigationCancellationCode, reason: impl Into<String>) -> Self {
		Self {
			code,
			reason: reason.into(),
			redirect: None,
		}
	}

	pub fn redirect(target: RedirectCommand) -> Self {
		Self {
			code: NavigationCancellationCode::Redirect,
			reason: format!("Redirecting to \"{}\"", target.url),
			redirect: Some(target),
		}
	}

	pub fn is_redirect(&self) -> bool {
		self.redirect.is_some()
	}
}

impl fmt::Display for NavigationCanceling {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.reason.is_empty() {
			write!(f, "Navigation canceled ({})", self.code)
		} else {
			write!(f, "{} ({})", self.reason, self.code)
		}
	}
}

/// Errors produced by the router.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum RouterError {
	/// No route configuration matched a required segment.
	#[error("Cannot match any routes. URL Segment: '{url}'")]
	NoMatch { url: String },

	/// Redirects kept producing new redirects.
	#[error("Detected possible infinite redirect: more than {limit} redirects were applied")]
	RedirectLoop { limit: usize },

	/// A redirect template or function produced an unusable target.
	#[error("Invalid redirect: {0}")]
	InvalidRedirect(String),

	/// The route configuration violates a structural rule.
	#[error("Invalid configuration of route '{path}': {reason}")]
	InvalidConfig { path: String, reason: String },

	/// Two sibling routes resolved to the same outlet.
	#[error("Two segments cannot have the same outlet name: '{first}' and '{second}'")]
	DuplicateOutlet { first: String, second: String },

	/// The navigation was canceled or redirected.
	#[error("{0}")]
	Canceled(NavigationCanceling),

	/// A guard failed.
	#[error("Guard failed: {0}")]
	Guard(Arc<anyhow::Error>),

	/// A resolver failed.
	#[error("Resolver '{key}' failed: {error}")]
	Resolver { key: String, error: Arc<anyhow::Error> },

	/// Lazy child configuration could not be loaded.
	#[error("Failed to load children of route '{path}': {error}")]
	LoadChildren { path: String, error: Arc<anyhow::Error> },

	/// Navigation commands could not be applied.
	#[error(transparent)]
	Command(#[from] CommandError),

	/// A URL could not be parsed.
	#[error(transparent)]
	Parse(#[from] UrlTreeError),

	/// Router options could not be loaded.
	#[error("Invalid router options: {0}")]
	Options(String),

	/// The error handler converted a failure into a custom error.
	#[error("{0}")]
	Custom(Arc<anyhow::Error>),
}

impl RouterError {
	pub fn canceled(code: NavigationCancellationCode, reason: impl Into<String>) -> Self {
		Self::Canceled(NavigationCanceling::new(code, reason))
	}

	pub fn guard(error: anyhow::Error) -> Self {
		Self::Guard(Arc::new(error))
	}

	/// Returns the cancellation, if this error is one.
	pub fn as_canceling(&self) -> Option<&NavigationCanceling> {
		match self {
			Self::Canceled(canceling) => Some(canceling),
			_ => None,
		}
	}
}

/// Result type for router operations.
pub type RouterResult<T> = Result<T, RouterError>;
