//! Guard collection and execution.
//!
//! [`get_all_route_guards`] diffs the current and target snapshot trees into
//! the routes that must pass `canDeactivate` and those that must pass
//! `canActivate`. [`check_guards`] then runs every `canDeactivate` check,
//! deepest routes first, before any `canActivate` check. Checks at the same
//! depth run concurrently and the first check that does not allow the
//! navigation wins; the rest are dropped.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use reinhardt_url_tree::UrlSegment;

use crate::activated_route::RouterState;
use crate::config::{Route, RunGuardsAndResolvers};
use crate::error::{NavigationCanceling, NavigationCancellationCode, RouterError, RouterResult};
use crate::events::{EventBus, RouterEvent};
use crate::guards::GuardResult;
use crate::host::OutletHost;
use crate::snapshot::{ActivatedRouteSnapshot, RouterStateSnapshot};
use crate::tree::{NodeId, Tree};

/// A target route that must pass `canActivate`, with its path from the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CanActivateCheck {
	pub path: Vec<NodeId>,
}

impl CanActivateCheck {
	pub(crate) fn node(&self) -> NodeId {
		self.path.last().copied().unwrap_or(NodeId::ROOT)
	}
}

/// A current route that must pass `canDeactivate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CanDeactivateCheck {
	pub node: NodeId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Checks {
	pub can_activate: Vec<CanActivateCheck>,
	pub can_deactivate: Vec<CanDeactivateCheck>,
}

impl Checks {
	pub(crate) fn is_empty(&self) -> bool {
		self.can_activate.is_empty() && self.can_deactivate.is_empty()
	}
}

/// Collects the guard checks needed to move from `current` to `future`.
///
/// Reused routes that do not re-run their guards keep the data resolved for
/// them last time, which is copied into `future` here.
pub(crate) fn get_all_route_guards(future: &mut RouterStateSnapshot, current: &RouterStateSnapshot) -> Checks {
	let mut checks = Checks::default();
	let root = NodeId::ROOT;
	child_route_guards(future, root, Some(current.tree()), Some(root), &[root], &mut checks);
	checks
}

fn child_route_guards(
	future: &mut RouterStateSnapshot,
	future_node: NodeId,
	current: Option<&Tree<ActivatedRouteSnapshot>>,
	current_node: Option<NodeId>,
	future_path: &[NodeId],
	checks: &mut Checks,
) {
	let mut previous: Vec<NodeId> = match (current, current_node) {
		(Some(tree), Some(node)) => tree.children(node).to_vec(),
		_ => Vec::new(),
	};

	let future_children = future.tree.children(future_node).to_vec();
	for child in future_children {
		let outlet = future.tree[child].outlet.clone();
		let matching = current.and_then(|tree| {
			let index = previous.iter().position(|id| tree[*id].outlet == outlet)?;
			Some(previous.remove(index))
		});
		let mut path = future_path.to_vec();
		path.push(child);
		route_guards(future, child, current, matching, &path, checks);
	}

	if let Some(tree) = current {
		for leftover in previous {
			deactivate_route_and_children(tree, leftover, checks);
		}
	}
}

fn route_guards(
	future: &mut RouterStateSnapshot,
	future_node: NodeId,
	current: Option<&Tree<ActivatedRouteSnapshot>>,
	current_node: Option<NodeId>,
	future_path: &[NodeId],
	checks: &mut Checks,
) {
	let reused = match (current, current_node) {
		(Some(tree), Some(node)) if tree[node].same_config(&future.tree[future_node]) => Some((tree, node)),
		_ => None,
	};

	match reused {
		Some((tree, node)) => {
			let should_run = should_run_guards_and_resolvers(tree, node, &future.tree, future_node);
			if should_run {
				checks.can_activate.push(CanActivateCheck {
					path: future_path.to_vec(),
				});
			} else {
				let previous = &tree[node];
				let target = &mut future.tree[future_node];
				target.data = previous.data.clone();
				target.resolved_data = previous.resolved_data.clone();
			}
			child_route_guards(future, future_node, Some(tree), Some(node), future_path, checks);
			if should_run && tree[node].component.is_some() {
				checks.can_deactivate.push(CanDeactivateCheck { node });
			}
		}
		None => {
			if let (Some(tree), Some(node)) = (current, current_node) {
				deactivate_route_and_children(tree, node, checks);
			}
			checks.can_activate.push(CanActivateCheck {
				path: future_path.to_vec(),
			});
			child_route_guards(future, future_node, None, None, future_path, checks);
		}
	}
}

/// Queues `node` and its whole subtree for `canDeactivate`, children first.
fn deactivate_route_and_children(tree: &Tree<ActivatedRouteSnapshot>, node: NodeId, checks: &mut Checks) {
	for child in tree.children(node) {
		deactivate_route_and_children(tree, *child, checks);
	}
	checks.can_deactivate.push(CanDeactivateCheck { node });
}

fn should_run_guards_and_resolvers(
	current: &Tree<ActivatedRouteSnapshot>,
	current_node: NodeId,
	future: &Tree<ActivatedRouteSnapshot>,
	future_node: NodeId,
) -> bool {
	let curr = &current[current_node];
	let next = &future[future_node];
	let mode = next
		.route_config()
		.map(|config| config.guards_and_resolvers_mode().clone())
		.unwrap_or_default();
	match mode {
		RunGuardsAndResolvers::Custom(predicate) => predicate(curr, next),
		RunGuardsAndResolvers::Always => true,
		RunGuardsAndResolvers::PathParamsChange => !equal_path(&curr.url, &next.url),
		RunGuardsAndResolvers::PathParamsOrQueryParamsChange => {
			!equal_path(&curr.url, &next.url) || curr.query_params != next.query_params
		}
		RunGuardsAndResolvers::ParamsOrQueryParamsChange => {
			!equal_params_and_url_segments(current, current_node, future, future_node)
				|| curr.query_params != next.query_params
		}
		RunGuardsAndResolvers::ParamsChange => !equal_params_and_url_segments(current, current_node, future, future_node),
	}
}

/// Segment paths equal, matrix params ignored.
fn equal_path(a: &[UrlSegment], b: &[UrlSegment]) -> bool {
	a.len() == b.len() && a.iter().zip(b).all(|(a, b)| a.path == b.path)
}

/// Params and segments equal here and on every ancestor.
fn equal_params_and_url_segments(
	a_tree: &Tree<ActivatedRouteSnapshot>,
	a: NodeId,
	b_tree: &Tree<ActivatedRouteSnapshot>,
	b: NodeId,
) -> bool {
	let equal_here = a_tree[a].params == b_tree[b].params && a_tree[a].url == b_tree[b].url;
	if !equal_here {
		return false;
	}
	match (a_tree.parent(a), b_tree.parent(b)) {
		(None, None) => true,
		(Some(a_parent), Some(b_parent)) => equal_params_and_url_segments(a_tree, a_parent, b_tree, b_parent),
		_ => false,
	}
}

/// Runs every check. Returns the first result that is not [`GuardResult::Allow`].
pub(crate) async fn check_guards(
	checks: &Checks,
	future: &Arc<RouterStateSnapshot>,
	current: &RouterState,
	host: &dyn OutletHost,
	events: &EventBus,
) -> RouterResult<GuardResult> {
	if checks.is_empty() {
		return Ok(GuardResult::Allow);
	}
	let result = run_can_deactivate_checks(checks, future, current, host).await?;
	if !result.is_allow() {
		return Ok(result);
	}
	run_can_activate_checks(checks, future, events).await
}

async fn run_can_deactivate_checks(
	checks: &Checks,
	future: &Arc<RouterStateSnapshot>,
	current: &RouterState,
	host: &dyn OutletHost,
) -> RouterResult<GuardResult> {
	let current_state = current.snapshot();
	let depths: BTreeSet<usize> = checks
		.can_deactivate
		.iter()
		.map(|check| current_state.tree().depth(check.node))
		.collect();

	for depth in depths.into_iter().rev() {
		let group = checks
			.can_deactivate
			.iter()
			.filter(|check| current_state.tree().depth(check.node) == depth)
			.map(|check| {
				let component = current.get(check.node).and_then(|route| host.component_instance(route));
				run_can_deactivate(check.node, component, current_state, future)
			});
		let result = first_rejection(group).await?;
		if !result.is_allow() {
			return Ok(result);
		}
	}
	Ok(GuardResult::Allow)
}

async fn run_can_deactivate(
	node: NodeId,
	component: Option<crate::host::ComponentHandle>,
	current: &Arc<RouterStateSnapshot>,
	future: &Arc<RouterStateSnapshot>,
) -> RouterResult<GuardResult> {
	let Some(config) = current.tree()[node].route_config() else {
		return Ok(GuardResult::Allow);
	};
	for guard in config.can_deactivate_guards() {
		let result = guard
			.can_deactivate(component.clone(), current.node(node), Arc::clone(current), Arc::clone(future))
			.await
			.map_err(RouterError::guard)?;
		if !result.is_allow() {
			tracing::debug!(path = config.path(), ?result, "canDeactivate did not allow");
			return Ok(result);
		}
	}
	Ok(GuardResult::Allow)
}

async fn run_can_activate_checks(
	checks: &Checks,
	future: &Arc<RouterStateSnapshot>,
	events: &EventBus,
) -> RouterResult<GuardResult> {
	let depths: BTreeSet<usize> = checks.can_activate.iter().map(|check| check.path.len()).collect();

	for depth in depths {
		let group: Vec<&CanActivateCheck> = checks.can_activate.iter().filter(|check| check.path.len() == depth).collect();
		for check in &group {
			let route = future.node(check.node());
			if let Some(parent) = route.parent() {
				events.emit(RouterEvent::ChildActivationStart { snapshot: parent });
			}
			events.emit(RouterEvent::ActivationStart { snapshot: route });
		}
		let result = first_rejection(group.into_iter().map(|check| run_can_activate(check, future))).await?;
		if !result.is_allow() {
			return Ok(result);
		}
	}
	Ok(GuardResult::Allow)
}

/// Ancestors' `canActivateChild`, closest first, then the route's own `canActivate`.
async fn run_can_activate(check: &CanActivateCheck, future: &Arc<RouterStateSnapshot>) -> RouterResult<GuardResult> {
	let node = check.node();
	let ancestors = &check.path[..check.path.len().saturating_sub(1)];
	for ancestor in ancestors.iter().rev() {
		let Some(config) = future.tree()[*ancestor].route_config() else {
			continue;
		};
		for guard in config.can_activate_child_guards() {
			let result = guard
				.can_activate_child(future.node(node), Arc::clone(future))
				.await
				.map_err(RouterError::guard)?;
			if !result.is_allow() {
				tracing::debug!(path = config.path(), ?result, "canActivateChild did not allow");
				return Ok(result);
			}
		}
	}

	let Some(config) = future.tree()[node].route_config() else {
		return Ok(GuardResult::Allow);
	};
	for guard in config.can_activate_guards() {
		let result = guard
			.can_activate(future.node(node), Arc::clone(future))
			.await
			.map_err(RouterError::guard)?;
		if !result.is_allow() {
			tracing::debug!(path = config.path(), ?result, "canActivate did not allow");
			return Ok(result);
		}
	}
	Ok(GuardResult::Allow)
}

/// Drives `checks` concurrently until one does not allow; the rest are dropped.
async fn first_rejection<F>(checks: impl IntoIterator<Item = F>) -> RouterResult<GuardResult>
where
	F: Future<Output = RouterResult<GuardResult>>,
{
	let mut pending: FuturesUnordered<F> = checks.into_iter().collect();
	while let Some(result) = pending.next().await {
		let result = result?;
		if !result.is_allow() {
			return Ok(result);
		}
	}
	Ok(GuardResult::Allow)
}

/// Runs `canMatch` guards in order. `Ok(false)` rejects the route without
/// failing the navigation.
pub(crate) async fn run_can_match_guards(route: &Arc<Route>, segments: &[UrlSegment]) -> RouterResult<bool> {
	for guard in route.can_match_guards() {
		match guard
			.can_match(Arc::clone(route), segments.to_vec())
			.await
			.map_err(RouterError::guard)?
		{
			GuardResult::Allow => {}
			GuardResult::Deny => return Ok(false),
			GuardResult::Redirect(command) => {
				return Err(RouterError::Canceled(NavigationCanceling::redirect(command)));
			}
		}
	}
	Ok(true)
}

/// Runs `canLoad` guards in order. Any rejection cancels the navigation.
pub(crate) async fn run_can_load_guards(route: &Arc<Route>, segments: &[UrlSegment]) -> RouterResult<()> {
	for guard in route.can_load_guards() {
		match guard
			.can_load(Arc::clone(route), segments.to_vec())
			.await
			.map_err(RouterError::guard)?
		{
			GuardResult::Allow => {}
			GuardResult::Deny => {
				return Err(RouterError::canceled(
					NavigationCancellationCode::GuardRejected,
					format!(
						"Cannot load children because the guard of the route \"path: '{}'\" returned false",
						route.path()
					),
				));
			}
			GuardResult::Redirect(command) => {
				return Err(RouterError::Canceled(NavigationCanceling::redirect(command)));
			}
		}
	}
	Ok(())
}
