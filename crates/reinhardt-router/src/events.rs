//! Router lifecycle events.
//!
//! Every navigation emits, in order: `NavigationStart`, `RoutesRecognized`,
//! `GuardsCheckStart`, `ChildActivationStart`/`ActivationStart` per checked
//! route, `GuardsCheckEnd`, `ResolveStart`, `ResolveEnd`,
//! `ActivationEnd`/`ChildActivationEnd` per activated route, and one of
//! `NavigationEnd`, `NavigationCancel`, `NavigationError` or
//! `NavigationSkipped`. `RouteConfigLoadStart`/`RouteConfigLoadEnd` wrap lazy
//! configuration loads.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::config::Route;
use crate::error::{NavigationCancellationCode, NavigationSkippedCode, RouterError};
use crate::navigation::{NavigationTrigger, RestoredState};
use crate::snapshot::{RouteSnapshotRef, RouterStateSnapshot};

/// An event on the router's event stream.
#[derive(Debug, Clone)]
pub enum RouterEvent {
	NavigationStart {
		id: u64,
		url: String,
		trigger: NavigationTrigger,
		restored_state: Option<RestoredState>,
	},
	RouteConfigLoadStart {
		route: Arc<Route>,
	},
	RouteConfigLoadEnd {
		route: Arc<Route>,
	},
	RoutesRecognized {
		id: u64,
		url: String,
		url_after_redirects: String,
		state: Arc<RouterStateSnapshot>,
	},
	GuardsCheckStart {
		id: u64,
		url: String,
		url_after_redirects: String,
		state: Arc<RouterStateSnapshot>,
	},
	ChildActivationStart {
		snapshot: RouteSnapshotRef,
	},
	ActivationStart {
		snapshot: RouteSnapshotRef,
	},
	GuardsCheckEnd {
		id: u64,
		url: String,
		url_after_redirects: String,
		state: Arc<RouterStateSnapshot>,
		should_activate: bool,
	},
	ResolveStart {
		id: u64,
		url: String,
		url_after_redirects: String,
		state: Arc<RouterStateSnapshot>,
	},
	ResolveEnd {
		id: u64,
		url: String,
		url_after_redirects: String,
		state: Arc<RouterStateSnapshot>,
	},
	ActivationEnd {
		snapshot: RouteSnapshotRef,
	},
	ChildActivationEnd {
		snapshot: RouteSnapshotRef,
	},
	NavigationEnd {
		id: u64,
		url: String,
		url_after_redirects: String,
	},
	NavigationCancel {
		id: u64,
		url: String,
		reason: String,
		code: NavigationCancellationCode,
	},
	NavigationError {
		id: u64,
		url: String,
		error: RouterError,
		target: Option<Arc<RouterStateSnapshot>>,
	},
	NavigationSkipped {
		id: u64,
		url: String,
		reason: String,
		code: NavigationSkippedCode,
	},
}

impl RouterEvent {
	/// Stable event name, e.g. `"NavigationStart"`.
	pub fn name(&self) -> &'static str {
		match self {
			Self::NavigationStart { .. } => "NavigationStart",
			Self::RouteConfigLoadStart { .. } => "RouteConfigLoadStart",
			Self::RouteConfigLoadEnd { .. } => "RouteConfigLoadEnd",
			Self::RoutesRecognized { .. } => "RoutesRecognized",
			Self::GuardsCheckStart { .. } => "GuardsCheckStart",
			Self::ChildActivationStart { .. } => "ChildActivationStart",
			Self::ActivationStart { .. } => "ActivationStart",
			Self::GuardsCheckEnd { .. } => "GuardsCheckEnd",
			Self::ResolveStart { .. } => "ResolveStart",
			Self::ResolveEnd { .. } => "ResolveEnd",
			Self::ActivationEnd { .. } => "ActivationEnd",
			Self::ChildActivationEnd { .. } => "ChildActivationEnd",
			Self::NavigationEnd { .. } => "NavigationEnd",
			Self::NavigationCancel { .. } => "NavigationCancel",
			Self::NavigationError { .. } => "NavigationError",
			Self::NavigationSkipped { .. } => "NavigationSkipped",
		}
	}

	/// Id of the navigation the event belongs to, for navigation-level events.
	pub fn navigation_id(&self) -> Option<u64> {
		match self {
			Self::NavigationStart { id, .. }
			| Self::RoutesRecognized { id, .. }
			| Self::GuardsCheckStart { id, .. }
			| Self::GuardsCheckEnd { id, .. }
			| Self::ResolveStart { id, .. }
			| Self::ResolveEnd { id, .. }
			| Self::NavigationEnd { id, .. }
			| Self::NavigationCancel { id, .. }
			| Self::NavigationError { id, .. }
			| Self::NavigationSkipped { id, .. } => Some(*id),
			_ => None,
		}
	}

	/// True for `NavigationEnd`, `NavigationCancel`, `NavigationError` and
	/// `NavigationSkipped`.
	pub fn is_terminal(&self) -> bool {
		matches!(
			self,
			Self::NavigationEnd { .. }
				| Self::NavigationCancel { .. }
				| Self::NavigationError { .. }
				| Self::NavigationSkipped { .. }
		)
	}
}

/// Fan-out of router events to any number of subscribers.
#[derive(Debug, Clone)]
pub struct EventBus {
	sender: broadcast::Sender<RouterEvent>,
}

impl EventBus {
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity.max(1));
		Self { sender }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<RouterEvent> {
		self.sender.subscribe()
	}

	pub fn emit(&self, event: RouterEvent) {
		tracing::trace!(event = event.name(), navigation_id = ?event.navigation_id(), "router event");
		// No receivers is fine
		let _ = self.sender.send(event);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_names_and_ids() {
		let event = RouterEvent::NavigationSkipped {
			id: 4,
			url: "/x".into(),
			reason: String::new(),
			code: NavigationSkippedCode::IgnoredSameUrlNavigation,
		};

		assert_eq!(event.name(), "NavigationSkipped");
		assert_eq!(event.navigation_id(), Some(4));
		assert!(event.is_terminal());
	}

	#[rstest]
	fn test_emit_reaches_subscribers() {
		let bus = EventBus::new(4);
		let mut receiver = bus.subscribe();

		bus.emit(RouterEvent::NavigationEnd {
			id: 1,
			url: "/".into(),
			url_after_redirects: "/".into(),
		});

		assert_eq!(receiver.try_recv().unwrap().name(), "NavigationEnd");
	}

	#[rstest]
	fn test_emit_without_subscribers_is_silent() {
		let bus = EventBus::new(4);

		bus.emit(RouterEvent::NavigationEnd {
			id: 1,
			url: "/".into(),
			url_after_redirects: "/".into(),
		});
	}
}
