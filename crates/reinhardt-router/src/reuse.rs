//! Route reuse.
//!
//! A [`RouteReuseStrategy`] decides which live [`ActivatedRoute`]s survive a
//! navigation and which component trees are detached for later reattachment.
//! [`create_router_state`] applies it to build the next live tree.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::activated_route::{ActivatedRoute, RouterState};
use crate::config::RouteId;
use crate::host::ComponentHandle;
use crate::snapshot::{ActivatedRouteSnapshot, RouterStateSnapshot};
use crate::tree::{NodeId, Tree};

/// A detached component together with the route it was rendered for.
///
/// `outlets` is the live route subtree rooted at `route`. Child components
/// stay inside the detached component and are restored with it.
#[derive(Debug, Clone)]
pub struct DetachedRouteHandle {
	pub component: ComponentHandle,
	pub route: ActivatedRoute,
	pub outlets: Tree<ActivatedRoute>,
}

/// Decides reuse, detachment and reattachment of routes.
pub trait RouteReuseStrategy: Send + Sync {
	/// Whether the component of `route` should be detached instead of destroyed.
	fn should_detach(&self, route: &ActivatedRouteSnapshot) -> bool;

	/// Stores a detached handle, or clears the stored one when `handle` is `None`.
	fn store(&self, route: &ActivatedRouteSnapshot, handle: Option<DetachedRouteHandle>);

	/// Whether a stored handle should be reattached for `route`.
	fn should_attach(&self, route: &ActivatedRouteSnapshot) -> bool;

	fn retrieve(&self, route: &ActivatedRouteSnapshot) -> Option<DetachedRouteHandle>;

	/// Whether the live route currently showing `current` can show `future`.
	fn should_reuse_route(&self, future: &ActivatedRouteSnapshot, current: &ActivatedRouteSnapshot) -> bool;
}

/// Reuses routes matched by the same configuration and never detaches.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRouteReuseStrategy;

impl RouteReuseStrategy for DefaultRouteReuseStrategy {
	fn should_detach(&self, _route: &ActivatedRouteSnapshot) -> bool {
		false
	}

	fn store(&self, _route: &ActivatedRouteSnapshot, _handle: Option<DetachedRouteHandle>) {}

	fn should_attach(&self, _route: &ActivatedRouteSnapshot) -> bool {
		false
	}

	fn retrieve(&self, _route: &ActivatedRouteSnapshot) -> Option<DetachedRouteHandle> {
		None
	}

	fn should_reuse_route(&self, future: &ActivatedRouteSnapshot, current: &ActivatedRouteSnapshot) -> bool {
		future.same_config(current)
	}
}

type DetachPredicate = Arc<dyn Fn(&ActivatedRouteSnapshot) -> bool + Send + Sync>;

/// Detaches the components of selected routes and reattaches them when the
/// same route configuration is visited again.
///
/// # Examples
///
/// ```
/// use reinhardt_router::StoredRouteReuseStrategy;
///
/// let strategy = StoredRouteReuseStrategy::new(|route| {
///     route.route_config().is_some_and(|config| config.path() == "list")
/// });
/// assert_eq!(strategy.stored_len(), 0);
/// ```
pub struct StoredRouteReuseStrategy {
	predicate: DetachPredicate,
	stored: Mutex<HashMap<RouteId, DetachedRouteHandle>>,
}

impl fmt::Debug for StoredRouteReuseStrategy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("StoredRouteReuseStrategy")
			.field("stored", &self.stored.lock().len())
			.finish()
	}
}

impl StoredRouteReuseStrategy {
	pub fn new<F>(predicate: F) -> Self
	where
		F: Fn(&ActivatedRouteSnapshot) -> bool + Send + Sync + 'static,
	{
		Self {
			predicate: Arc::new(predicate),
			stored: Mutex::new(HashMap::new()),
		}
	}

	pub fn stored_len(&self) -> usize {
		self.stored.lock().len()
	}

	/// Drops every stored handle.
	pub fn clear(&self) {
		self.stored.lock().clear();
	}
}

impl RouteReuseStrategy for StoredRouteReuseStrategy {
	fn should_detach(&self, route: &ActivatedRouteSnapshot) -> bool {
		route.route_config().is_some() && (self.predicate)(route)
	}

	fn store(&self, route: &ActivatedRouteSnapshot, handle: Option<DetachedRouteHandle>) {
		let Some(config) = route.route_config() else {
			return;
		};
		let mut stored = self.stored.lock();
		match handle {
			Some(handle) => {
				tracing::debug!(path = config.path(), "storing detached route");
				stored.insert(config.id(), handle);
			}
			None => {
				stored.remove(&config.id());
			}
		}
	}

	fn should_attach(&self, route: &ActivatedRouteSnapshot) -> bool {
		route
			.route_config()
			.is_some_and(|config| self.stored.lock().contains_key(&config.id()))
	}

	fn retrieve(&self, route: &ActivatedRouteSnapshot) -> Option<DetachedRouteHandle> {
		let config = route.route_config()?;
		self.stored.lock().get(&config.id()).cloned()
	}

	fn should_reuse_route(&self, future: &ActivatedRouteSnapshot, current: &ActivatedRouteSnapshot) -> bool {
		future.same_config(current)
	}
}

/// Builds the live tree for `future`, reusing routes of `previous` where the
/// strategy allows it.
///
/// Reused and reattached routes get `future` as their pending snapshot; they
/// are advanced at activation.
pub(crate) fn create_router_state(
	strategy: &dyn RouteReuseStrategy,
	future: &Arc<RouterStateSnapshot>,
	previous: &RouterState,
) -> RouterState {
	let mut routes: Vec<Option<ActivatedRoute>> = vec![None; future.tree().len()];
	create_node(strategy, future, NodeId::ROOT, &previous.tree, Some(NodeId::ROOT), &mut routes);
	let tree = future
		.tree()
		.map(|id, _| routes[id.index()].take().unwrap_or_else(|| ActivatedRoute::new(future.node(id))));
	RouterState::new(tree, Arc::clone(future))
}

fn create_node(
	strategy: &dyn RouteReuseStrategy,
	future: &Arc<RouterStateSnapshot>,
	node: NodeId,
	previous: &Tree<ActivatedRoute>,
	previous_node: Option<NodeId>,
	routes: &mut [Option<ActivatedRoute>],
) {
	let snapshot = &future.tree()[node];

	if let Some(previous_node) = previous_node {
		let existing = &previous[previous_node];
		if strategy.should_reuse_route(snapshot, &existing.snapshot()) {
			existing.set_future_snapshot(future.node(node));
			routes[node.index()] = Some(existing.clone());
			create_children(strategy, future, node, previous, previous_node, routes);
			return;
		}
	}

	match strategy.should_attach(snapshot).then(|| strategy.retrieve(snapshot)).flatten() {
		Some(handle) => {
			handle.route.set_future_snapshot(future.node(node));
			routes[node.index()] = Some(handle.route);
			create_children(strategy, future, node, &handle.outlets, NodeId::ROOT, routes);
		}
		None => {
			routes[node.index()] = Some(ActivatedRoute::new(future.node(node)));
			for child in future.tree().children(node) {
				create_node(strategy, future, *child, previous, None, routes);
			}
		}
	}
}

/// Pairs the future children of `node` with reusable routes under `previous_node`.
fn create_children(
	strategy: &dyn RouteReuseStrategy,
	future: &Arc<RouterStateSnapshot>,
	node: NodeId,
	previous: &Tree<ActivatedRoute>,
	previous_node: NodeId,
	routes: &mut [Option<ActivatedRoute>],
) {
	for child in future.tree().children(node) {
		let matching = previous
			.children(previous_node)
			.iter()
			.copied()
			.find(|candidate| strategy.should_reuse_route(&future.tree()[*child], &previous[*candidate].snapshot()));
		create_node(strategy, future, *child, previous, matching, routes);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::activated_route::create_empty_state;
	use crate::config::Route;
	use reinhardt_url_tree::{Params, QueryParams, UrlSegment, UrlTree};
	use rstest::*;

	fn chain(routes: &[(&Arc<Route>, &str)]) -> Arc<RouterStateSnapshot> {
		let mut tree = Tree::new(ActivatedRouteSnapshot::root(QueryParams::new(), None, None));
		let mut parent = NodeId::ROOT;
		for (route, segment) in routes {
			let mut params = Params::new();
			params.insert("id".into(), segment.to_string());
			let snapshot = ActivatedRouteSnapshot::for_route(
				route,
				vec![UrlSegment::path(*segment)],
				params,
				QueryParams::new(),
				None,
				None,
			);
			parent = tree.push_child(parent, snapshot);
		}
		Arc::new(RouterStateSnapshot::new(String::new(), tree))
	}

	#[fixture]
	fn empty() -> RouterState {
		create_empty_state(&UrlTree::default(), None)
	}

	fn child_of_root(state: &RouterState) -> ActivatedRoute {
		state.tree[state.tree.first_child(NodeId::ROOT).unwrap()].clone()
	}

	#[rstest]
	fn test_same_config_keeps_activated_route(empty: RouterState) {
		let list = Arc::new(Route::new("list/:id").component("List"));
		let first = create_router_state(&DefaultRouteReuseStrategy, &chain(&[(&list, "1")]), &empty);
		first.tree.preorder().into_iter().for_each(|id| first.tree[id].advance());

		let second = create_router_state(&DefaultRouteReuseStrategy, &chain(&[(&list, "2")]), &first);

		assert_eq!(second.root(), first.root());
		assert_eq!(child_of_root(&second), child_of_root(&first));
		assert_eq!(child_of_root(&second).future_snapshot().param("id"), Some("2"));
	}

	#[rstest]
	fn test_different_config_creates_new_route(empty: RouterState) {
		let (a, b) = (Arc::new(Route::new("a").component("A")), Arc::new(Route::new("b").component("B")));
		let first = create_router_state(&DefaultRouteReuseStrategy, &chain(&[(&a, "a")]), &empty);

		let second = create_router_state(&DefaultRouteReuseStrategy, &chain(&[(&b, "b")]), &first);

		assert_eq!(second.root(), first.root());
		assert_ne!(child_of_root(&second), child_of_root(&first));
	}

	#[rstest]
	fn test_children_of_new_route_are_new(empty: RouterState) {
		let (a, b, x) = (
			Arc::new(Route::new("a").component("A")),
			Arc::new(Route::new("b").component("B")),
			Arc::new(Route::new("x").component("X")),
		);
		let first = create_router_state(&DefaultRouteReuseStrategy, &chain(&[(&a, "a"), (&x, "x")]), &empty);

		let second = create_router_state(&DefaultRouteReuseStrategy, &chain(&[(&b, "b"), (&x, "x")]), &first);

		let first_leaf = first.leaf().clone();
		assert_ne!(second.leaf(), &first_leaf);
	}

	#[rstest]
	fn test_stored_strategy_reattaches_detached_route(empty: RouterState) {
		let list = Arc::new(Route::new("list").component("List"));
		let other = Arc::new(Route::new("other").component("Other"));
		let strategy = StoredRouteReuseStrategy::new(|route| route.route_config().is_some_and(|c| c.path() == "list"));
		let first = create_router_state(&strategy, &chain(&[(&list, "list")]), &empty);
		let detached = child_of_root(&first);
		let snapshot = detached.snapshot();
		assert!(strategy.should_detach(&snapshot));
		strategy.store(&snapshot, Some(DetachedRouteHandle {
			component: ComponentHandle::new("list-component"),
			route: detached.clone(),
			outlets: Tree::new(detached.clone()),
		}));
		let middle = create_router_state(&strategy, &chain(&[(&other, "other")]), &first);

		let back = create_router_state(&strategy, &chain(&[(&list, "list")]), &middle);

		assert_eq!(child_of_root(&back), detached);
		assert_eq!(strategy.stored_len(), 1);
		strategy.store(&snapshot, None);
		assert_eq!(strategy.stored_len(), 0);
	}
}
