//! Navigation requests and their outcome.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use reinhardt_url_tree::{QueryParams, UrlTree};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;

use crate::activated_route::ActivatedRoute;
use crate::error::RouterResult;
use crate::options::OnSameUrlNavigation;

/// What started a navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NavigationTrigger {
	/// `navigate` / `navigate_by_url`, including redirects.
	Imperative,
	/// Browser back/forward.
	Popstate,
	Hashchange,
}

/// History state restored by a back/forward navigation.
#[derive(Debug, Clone, PartialEq)]
pub struct RestoredState {
	/// Id of the navigation that created the history entry.
	pub navigation_id: u64,
	/// The full state stored with the entry.
	pub state: Value,
}

/// How query parameters of the current URL carry over to the new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QueryParamsHandling {
	/// Use only the query params given with the navigation.
	#[default]
	Replace,
	/// Current params overlaid with the given ones.
	Merge,
	/// Keep the current params, ignoring the given ones.
	Preserve,
}

/// Options that affect how a navigation is carried out, not where it goes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NavigationBehaviorOptions {
	/// Navigate without touching the location.
	pub skip_location_change: bool,
	/// Replace the current history entry instead of pushing one.
	pub replace_url: bool,
	/// Extra history state stored with the new entry.
	pub state: Option<Value>,
	/// Transient information, never persisted in history.
	pub info: Option<Value>,
	/// Overrides the router-wide same-URL policy for this navigation.
	pub on_same_url_navigation: Option<OnSameUrlNavigation>,
}

impl NavigationBehaviorOptions {
	pub fn replace_url(mut self) -> Self {
		self.replace_url = true;
		self
	}

	pub fn skip_location_change(mut self) -> Self {
		self.skip_location_change = true;
		self
	}

	pub fn with_state(mut self, state: Value) -> Self {
		self.state = Some(state);
		self
	}

	pub fn with_info(mut self, info: Value) -> Self {
		self.info = Some(info);
		self
	}

	pub fn on_same_url_navigation(mut self, policy: OnSameUrlNavigation) -> Self {
		self.on_same_url_navigation = Some(policy);
		self
	}
}

/// Options for building the target URL from commands, plus behavior.
#[derive(Debug, Clone, Default)]
pub struct NavigationExtras {
	/// Commands are applied relative to this route instead of the root.
	pub relative_to: Option<ActivatedRoute>,
	pub query_params: Option<QueryParams>,
	pub fragment: Option<String>,
	pub query_params_handling: Option<QueryParamsHandling>,
	/// Keep the current fragment.
	pub preserve_fragment: bool,
	pub behavior: NavigationBehaviorOptions,
}

impl NavigationExtras {
	pub fn relative_to(mut self, route: ActivatedRoute) -> Self {
		self.relative_to = Some(route);
		self
	}

	pub fn query_params(mut self, query_params: QueryParams) -> Self {
		self.query_params = Some(query_params);
		self
	}

	pub fn fragment(mut self, fragment: impl Into<String>) -> Self {
		self.fragment = Some(fragment.into());
		self
	}

	pub fn query_params_handling(mut self, handling: QueryParamsHandling) -> Self {
		self.query_params_handling = Some(handling);
		self
	}

	pub fn preserve_fragment(mut self) -> Self {
		self.preserve_fragment = true;
		self
	}

	pub fn behavior(mut self, behavior: NavigationBehaviorOptions) -> Self {
		self.behavior = behavior;
		self
	}
}

/// Public view of a navigation attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationInfo {
	pub id: u64,
	/// The URL as requested.
	pub initial_url: UrlTree,
	/// The part of the requested URL this router processes.
	pub extracted_url: UrlTree,
	/// The URL after redirects, once known.
	pub final_url: Option<UrlTree>,
	pub trigger: NavigationTrigger,
	pub extras: NavigationBehaviorOptions,
	/// The navigation before this one, without its own predecessor.
	pub previous_navigation: Option<Box<NavigationInfo>>,
}

/// The single settle channel of a navigation promise.
///
/// Shared so a redirect can hand the caller's promise to the follow-up
/// navigation.
#[derive(Debug, Clone)]
pub(crate) struct Settle(Arc<Mutex<Option<oneshot::Sender<RouterResult<bool>>>>>);

impl Settle {
	pub(crate) fn new() -> (Self, PendingNavigation) {
		let (sender, receiver) = oneshot::channel();
		(Self(Arc::new(Mutex::new(Some(sender)))), PendingNavigation { receiver })
	}

	/// Settles the promise. Later calls are no-ops.
	pub(crate) fn resolve(&self, result: RouterResult<bool>) {
		if let Some(sender) = self.0.lock().take() {
			let _ = sender.send(result);
		}
	}

	pub(crate) fn is_settled(&self) -> bool {
		self.0.lock().is_none()
	}
}

/// Resolves when a navigation finishes.
///
/// `Ok(true)` when the navigation committed, `Ok(false)` when it was
/// canceled, superseded or skipped, `Err` when it failed and the error
/// handler rethrew.
#[derive(Debug)]
#[must_use = "a navigation runs whether or not its outcome is awaited"]
pub struct PendingNavigation {
	receiver: oneshot::Receiver<RouterResult<bool>>,
}

impl Future for PendingNavigation {
	type Output = RouterResult<bool>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		Pin::new(&mut self.receiver).poll(cx).map(|result| result.unwrap_or(Ok(false)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[tokio::test]
	async fn test_settle_resolves_once() {
		let (settle, pending) = Settle::new();

		settle.resolve(Ok(true));
		settle.resolve(Ok(false));

		assert!(settle.is_settled());
		assert!(pending.await.unwrap());
	}

	#[rstest]
	#[tokio::test]
	async fn test_dropped_settle_reads_as_false() {
		let (settle, pending) = Settle::new();

		drop(settle);

		assert!(!pending.await.unwrap());
	}

	#[rstest]
	fn test_behavior_builders() {
		let behavior = NavigationBehaviorOptions::default()
			.replace_url()
			.on_same_url_navigation(OnSameUrlNavigation::Reload);

		assert!(behavior.replace_url);
		assert!(!behavior.skip_location_change);
		assert_eq!(behavior.on_same_url_navigation, Some(OnSameUrlNavigation::Reload));
	}
}
