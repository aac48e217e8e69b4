//! Guard and resolver contracts.
//!
//! Every guard is an async callable returning a [`GuardResult`]; resolvers
//! return a [`ResolveResult`]. Closures with the matching signature implement
//! the traits directly; named types implement them by hand:
//!
//! ```
//! use std::sync::Arc;
//! use reinhardt_router::{GuardResult, Route, RouteSnapshotRef, RouterStateSnapshot};
//!
//! let route = Route::new("admin")
//! 	.component("AdminPage")
//! 	.can_activate(|_route, _state| async { Ok(GuardResult::Deny) });
//!
//! struct SignedIn;
//!
//! #[async_trait::async_trait]
//! impl reinhardt_router::CanActivate for SignedIn {
//! 	async fn can_activate(
//! 		&self,
//! 		_route: RouteSnapshotRef,
//! 		_state: Arc<RouterStateSnapshot>,
//! 	) -> anyhow::Result<GuardResult> {
//! 		Ok(GuardResult::Allow)
//! 	}
//! }
//!
//! let profile = Route::new("profile").component("Profile").can_activate_guard(SignedIn);
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use reinhardt_url_tree::{UrlSegment, UrlTree};
use serde_json::Value;

use crate::config::Route;
use crate::host::ComponentHandle;
use crate::navigation::NavigationBehaviorOptions;
use crate::snapshot::{RouteSnapshotRef, RouterStateSnapshot};

/// A redirect target with the behavior options of the follow-up navigation.
#[derive(Debug, Clone, PartialEq)]
pub struct RedirectCommand {
	pub url: UrlTree,
	pub behavior: NavigationBehaviorOptions,
}

impl RedirectCommand {
	pub fn new(url: UrlTree) -> Self {
		Self {
			url,
			behavior: NavigationBehaviorOptions::default(),
		}
	}

	pub fn with_behavior(mut self, behavior: NavigationBehaviorOptions) -> Self {
		self.behavior = behavior;
		self
	}
}

/// Outcome of a guard.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardResult {
	Allow,
	Deny,
	/// Cancel this navigation and start a new one to the target.
	Redirect(RedirectCommand),
}

impl GuardResult {
	pub fn is_allow(&self) -> bool {
		matches!(self, Self::Allow)
	}

	/// Shorthand for redirecting to a tree with default behavior.
	pub fn redirect_to(url: UrlTree) -> Self {
		Self::Redirect(RedirectCommand::new(url))
	}
}

impl From<bool> for GuardResult {
	fn from(allow: bool) -> Self {
		if allow { Self::Allow } else { Self::Deny }
	}
}

impl From<UrlTree> for GuardResult {
	fn from(url: UrlTree) -> Self {
		Self::redirect_to(url)
	}
}

impl From<RedirectCommand> for GuardResult {
	fn from(command: RedirectCommand) -> Self {
		Self::Redirect(command)
	}
}

/// Outcome of a resolver.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolveResult {
	/// Resolved data for the resolver's key.
	Value(Value),
	/// Cancel this navigation and start a new one to the target.
	Redirect(RedirectCommand),
	/// Completed without a value; cancels the navigation.
	Empty,
}

impl ResolveResult {
	pub fn value(value: impl Into<Value>) -> Self {
		Self::Value(value.into())
	}
}

/// Gates activation of a route.
#[async_trait]
pub trait CanActivate: Send + Sync {
	async fn can_activate(
		&self,
		route: RouteSnapshotRef,
		state: Arc<RouterStateSnapshot>,
	) -> anyhow::Result<GuardResult>;
}

/// Gates activation of any child of a route.
#[async_trait]
pub trait CanActivateChild: Send + Sync {
	async fn can_activate_child(
		&self,
		child: RouteSnapshotRef,
		state: Arc<RouterStateSnapshot>,
	) -> anyhow::Result<GuardResult>;
}

/// Gates leaving a route.
#[async_trait]
pub trait CanDeactivate: Send + Sync {
	async fn can_deactivate(
		&self,
		component: Option<ComponentHandle>,
		current: RouteSnapshotRef,
		current_state: Arc<RouterStateSnapshot>,
		next_state: Arc<RouterStateSnapshot>,
	) -> anyhow::Result<GuardResult>;
}

/// Decides whether a structurally matching route may match at all.
///
/// `Deny` makes the matcher move on to the next sibling route.
#[async_trait]
pub trait CanMatch: Send + Sync {
	async fn can_match(&self, route: Arc<Route>, segments: Vec<UrlSegment>) -> anyhow::Result<GuardResult>;
}

/// Decides whether lazy children may be loaded.
#[async_trait]
pub trait CanLoad: Send + Sync {
	async fn can_load(&self, route: Arc<Route>, segments: Vec<UrlSegment>) -> anyhow::Result<GuardResult>;
}

/// Produces data for a route before activation.
#[async_trait]
pub trait Resolve: Send + Sync {
	async fn resolve(
		&self,
		route: RouteSnapshotRef,
		state: Arc<RouterStateSnapshot>,
	) -> anyhow::Result<ResolveResult>;
}

#[async_trait]
impl<F, Fut> CanActivate for F
where
	F: Fn(RouteSnapshotRef, Arc<RouterStateSnapshot>) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = anyhow::Result<GuardResult>> + Send + 'static,
{
	async fn can_activate(
		&self,
		route: RouteSnapshotRef,
		state: Arc<RouterStateSnapshot>,
	) -> anyhow::Result<GuardResult> {
		self(route, state).await
	}
}

#[async_trait]
impl<F, Fut> CanActivateChild for F
where
	F: Fn(RouteSnapshotRef, Arc<RouterStateSnapshot>) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = anyhow::Result<GuardResult>> + Send + 'static,
{
	async fn can_activate_child(
		&self,
		child: RouteSnapshotRef,
		state: Arc<RouterStateSnapshot>,
	) -> anyhow::Result<GuardResult> {
		self(child, state).await
	}
}

#[async_trait]
impl<F, Fut> CanDeactivate for F
where
	F: Fn(Option<ComponentHandle>, RouteSnapshotRef, Arc<RouterStateSnapshot>, Arc<RouterStateSnapshot>) -> Fut
		+ Send
		+ Sync
		+ 'static,
	Fut: Future<Output = anyhow::Result<GuardResult>> + Send + 'static,
{
	async fn can_deactivate(
		&self,
		component: Option<ComponentHandle>,
		current: RouteSnapshotRef,
		current_state: Arc<RouterStateSnapshot>,
		next_state: Arc<RouterStateSnapshot>,
	) -> anyhow::Result<GuardResult> {
		self(component, current, current_state, next_state).await
	}
}

#[async_trait]
impl<F, Fut> CanMatch for F
where
	F: Fn(Arc<Route>, Vec<UrlSegment>) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = anyhow::Result<GuardResult>> + Send + 'static,
{
	async fn can_match(&self, route: Arc<Route>, segments: Vec<UrlSegment>) -> anyhow::Result<GuardResult> {
		self(route, segments).await
	}
}

#[async_trait]
impl<F, Fut> CanLoad for F
where
	F: Fn(Arc<Route>, Vec<UrlSegment>) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = anyhow::Result<GuardResult>> + Send + 'static,
{
	async fn can_load(&self, route: Arc<Route>, segments: Vec<UrlSegment>) -> anyhow::Result<GuardResult> {
		self(route, segments).await
	}
}

#[async_trait]
impl<F, Fut> Resolve for F
where
	F: Fn(RouteSnapshotRef, Arc<RouterStateSnapshot>) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = anyhow::Result<ResolveResult>> + Send + 'static,
{
	async fn resolve(
		&self,
		route: RouteSnapshotRef,
		state: Arc<RouterStateSnapshot>,
	) -> anyhow::Result<ResolveResult> {
		self(route, state).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	fn test_guard_result_from_bool() {
		assert_eq!(GuardResult::from(true), GuardResult::Allow);
		assert_eq!(GuardResult::from(false), GuardResult::Deny);
	}

	#[rstest]
	fn test_guard_result_from_tree_is_redirect() {
		let url = UrlTree::parse("/login").unwrap();

		let result = GuardResult::from(url.clone());

		assert_eq!(result, GuardResult::Redirect(RedirectCommand::new(url)));
		assert!(!result.is_allow());
	}

	#[rstest]
	fn test_resolve_result_from_value() {
		assert_eq!(ResolveResult::value(json!({"a": 1})), ResolveResult::Value(json!({"a": 1})));
		assert_eq!(ResolveResult::value("x"), ResolveResult::Value(json!("x")));
	}
}
