//! Immutable route snapshots.
//!
//! A [`RouterStateSnapshot`] is the tree of [`ActivatedRouteSnapshot`]s a
//! navigation targets (or the one that was last committed). Nodes live in an
//! arena and never reference each other; [`RouteSnapshotRef`] pairs the
//! owning tree with a [`NodeId`] to walk parents and children.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use reinhardt_url_tree::{PRIMARY_OUTLET, Params, QueryParams, UrlSegment};
use serde_json::Value;

use crate::config::{ComponentType, Data, ROUTE_TITLE_KEY, Route, RouteTitle};
use crate::guards::Resolve;
use crate::host::InjectionContext;
use crate::options::ParamsInheritanceStrategy;
use crate::tree::{NodeId, Tree};

/// One matched route at one navigation instant.
#[derive(Clone)]
pub struct ActivatedRouteSnapshot {
	pub(crate) url: Vec<UrlSegment>,
	pub(crate) params: Params,
	pub(crate) query_params: QueryParams,
	pub(crate) fragment: Option<String>,
	pub(crate) data: Data,
	pub(crate) outlet: String,
	pub(crate) component: Option<ComponentType>,
	pub(crate) route_config: Option<Arc<Route>>,
	/// Resolvers staged for this node, run by the resolve phase.
	pub(crate) resolve: BTreeMap<String, Arc<dyn Resolve>>,
	pub(crate) resolved_data: Data,
	/// Context of the lazily loaded configuration this route came from.
	pub(crate) context: Option<InjectionContext>,
}

impl fmt::Debug for ActivatedRouteSnapshot {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ActivatedRouteSnapshot")
			.field("url", &self.url)
			.field("params", &self.params)
			.field("outlet", &self.outlet)
			.field("component", &self.component)
			.field("path", &self.route_config.as_ref().map(|route| route.path()))
			.field("data", &self.data)
			.finish()
	}
}

impl ActivatedRouteSnapshot {
	/// Snapshot for a matched route before inheritance is applied.
	pub(crate) fn for_route(
		route: &Arc<Route>,
		url: Vec<UrlSegment>,
		params: Params,
		query_params: QueryParams,
		fragment: Option<String>,
		context: Option<InjectionContext>,
	) -> Self {
		let mut resolve = route.resolvers().clone();
		if let Some(RouteTitle::Resolved(resolver)) = route.route_title() {
			resolve.insert(ROUTE_TITLE_KEY.to_string(), Arc::clone(resolver));
		}
		Self {
			url,
			params,
			query_params,
			fragment,
			data: route.static_data().clone(),
			outlet: route.outlet_name().to_string(),
			component: route.component_type().cloned(),
			route_config: Some(Arc::clone(route)),
			resolve,
			resolved_data: Data::new(),
			context,
		}
	}

	/// Snapshot of the router root.
	pub(crate) fn root(query_params: QueryParams, fragment: Option<String>, component: Option<ComponentType>) -> Self {
		Self {
			url: Vec::new(),
			params: Params::new(),
			query_params,
			fragment,
			data: Data::new(),
			outlet: PRIMARY_OUTLET.to_string(),
			component,
			route_config: None,
			resolve: BTreeMap::new(),
			resolved_data: Data::new(),
			context: None,
		}
	}

	/// Segments consumed by this route.
	pub fn url(&self) -> &[UrlSegment] {
		&self.url
	}

	pub fn params(&self) -> &Params {
		&self.params
	}

	pub fn param(&self, name: &str) -> Option<&str> {
		self.params.get(name).map(String::as_str)
	}

	pub fn query_params(&self) -> &QueryParams {
		&self.query_params
	}

	pub fn fragment(&self) -> Option<&str> {
		self.fragment.as_deref()
	}

	/// Static data merged with resolved data.
	pub fn data(&self) -> &Data {
		&self.data
	}

	pub fn outlet(&self) -> &str {
		&self.outlet
	}

	pub fn component(&self) -> Option<&ComponentType> {
		self.component.as_ref()
	}

	pub fn route_config(&self) -> Option<&Arc<Route>> {
		self.route_config.as_ref()
	}

	pub fn context(&self) -> Option<&InjectionContext> {
		self.context.as_ref()
	}

	/// Resolved or static title of this route.
	pub fn title(&self) -> Option<&str> {
		self.data.get(ROUTE_TITLE_KEY).and_then(Value::as_str)
	}

	/// True when both snapshots were matched by the same configured route.
	pub fn same_config(&self, other: &ActivatedRouteSnapshot) -> bool {
		match (&self.route_config, &other.route_config) {
			(Some(a), Some(b)) => a.same_config(b),
			(None, None) => true,
			_ => false,
		}
	}

	pub(crate) fn has_empty_path_config(&self) -> bool {
		self.route_config.as_ref().is_some_and(|route| route.path().is_empty() && route.matcher().is_none())
	}
}

/// A frozen tree of route snapshots plus the URL it was built for.
#[derive(Debug, Clone)]
pub struct RouterStateSnapshot {
	pub(crate) url: String,
	pub(crate) tree: Tree<ActivatedRouteSnapshot>,
}

impl RouterStateSnapshot {
	pub(crate) fn new(url: String, tree: Tree<ActivatedRouteSnapshot>) -> Self {
		Self { url, tree }
	}

	pub fn url(&self) -> &str {
		&self.url
	}

	pub fn tree(&self) -> &Tree<ActivatedRouteSnapshot> {
		&self.tree
	}

	pub fn node(self: &Arc<Self>, id: NodeId) -> RouteSnapshotRef {
		RouteSnapshotRef {
			state: Arc::clone(self),
			node: id,
		}
	}

	pub fn root(self: &Arc<Self>) -> RouteSnapshotRef {
		self.node(self.tree.root())
	}

	/// Every snapshot in pre-order.
	pub fn routes(self: &Arc<Self>) -> Vec<RouteSnapshotRef> {
		self.tree.preorder().into_iter().map(|id| self.node(id)).collect()
	}
}

/// A snapshot node together with the tree that owns it.
#[derive(Clone)]
pub struct RouteSnapshotRef {
	state: Arc<RouterStateSnapshot>,
	node: NodeId,
}

impl fmt::Debug for RouteSnapshotRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RouteSnapshotRef")
			.field("node", &self.node)
			.field("snapshot", &**self)
			.finish()
	}
}

impl Deref for RouteSnapshotRef {
	type Target = ActivatedRouteSnapshot;

	fn deref(&self) -> &ActivatedRouteSnapshot {
		&self.state.tree[self.node]
	}
}

impl RouteSnapshotRef {
	pub fn id(&self) -> NodeId {
		self.node
	}

	pub fn state(&self) -> &Arc<RouterStateSnapshot> {
		&self.state
	}

	pub fn parent(&self) -> Option<RouteSnapshotRef> {
		self.state.tree.parent(self.node).map(|id| self.state.node(id))
	}

	pub fn children(&self) -> Vec<RouteSnapshotRef> {
		self.state.tree.children(self.node).iter().map(|id| self.state.node(*id)).collect()
	}

	pub fn first_child(&self) -> Option<RouteSnapshotRef> {
		self.state.tree.first_child(self.node).map(|id| self.state.node(id))
	}

	pub fn child(&self, outlet: &str) -> Option<RouteSnapshotRef> {
		self.children().into_iter().find(|child| child.outlet == outlet)
	}

	pub fn root(&self) -> RouteSnapshotRef {
		self.state.root()
	}

	/// Snapshots from the root down to this one, inclusive.
	pub fn path_from_root(&self) -> Vec<RouteSnapshotRef> {
		self.state
			.tree
			.path_from_root(self.node)
			.into_iter()
			.map(|id| self.state.node(id))
			.collect()
	}
}

/// Params, data and resolve map a snapshot ends up with after inheriting
/// from its parent.
#[derive(Debug, Clone, Default)]
pub(crate) struct Inherited {
	pub params: Params,
	pub data: Data,
	pub resolve: Data,
}

/// Computes what `route` inherits from `parent`.
///
/// With [`ParamsInheritanceStrategy::EmptyOnly`] a route inherits only when
/// its own path is empty or its parent has no component.
pub(crate) fn inherited(
	route: &ActivatedRouteSnapshot,
	parent: Option<&ActivatedRouteSnapshot>,
	strategy: ParamsInheritanceStrategy,
) -> Inherited {
	let config = route.route_config.as_deref();
	let inherits = parent.is_some_and(|parent| {
		strategy == ParamsInheritanceStrategy::Always
			|| config.is_some_and(|config| config.path().is_empty() && config.matcher().is_none())
			|| parent.component.is_none()
	});

	let mut result = match parent {
		Some(parent) if inherits => Inherited {
			params: merged(&parent.params, &route.params),
			data: merged(&parent.data, &route.data),
			resolve: merged_all([
				&route.data,
				&parent.data,
				config.map(Route::static_data).unwrap_or(&Data::new()),
				&route.resolved_data,
			]),
		},
		_ => Inherited {
			params: route.params.clone(),
			data: route.data.clone(),
			resolve: merged(&route.data, &route.resolved_data),
		},
	};
	if let Some(title) = config.and_then(Route::static_title) {
		result.resolve.insert(ROUTE_TITLE_KEY.to_string(), Value::String(title.to_string()));
	}
	result
}

fn merged<V: Clone>(base: &BTreeMap<String, V>, overrides: &BTreeMap<String, V>) -> BTreeMap<String, V> {
	let mut out = base.clone();
	out.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
	out
}

fn merged_all<const N: usize>(layers: [&Data; N]) -> Data {
	let mut out = Data::new();
	for layer in layers {
		out.extend(layer.iter().map(|(k, v)| (k.clone(), v.clone())));
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	fn snapshot(route: Route, params: &[(&str, &str)]) -> ActivatedRouteSnapshot {
		ActivatedRouteSnapshot::for_route(
			&Arc::new(route),
			Vec::new(),
			params.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
			QueryParams::new(),
			None,
			None,
		)
	}

	#[rstest]
	fn test_empty_path_child_inherits_params_and_data() {
		let parent = snapshot(Route::new("team/:id").component("Team").data("section", "teams"), &[("id", "33")]);
		let child = snapshot(Route::new("").component("Overview"), &[]);

		let inherited = inherited(&child, Some(&parent), ParamsInheritanceStrategy::EmptyOnly);

		assert_eq!(inherited.params.get("id").map(String::as_str), Some("33"));
		assert_eq!(inherited.data.get("section"), Some(&json!("teams")));
	}

	#[rstest]
	fn test_child_of_component_route_does_not_inherit() {
		let parent = snapshot(Route::new("team/:id").component("Team"), &[("id", "33")]);
		let child = snapshot(Route::new("user/:name").component("User"), &[("name", "bob")]);

		let inherited = inherited(&child, Some(&parent), ParamsInheritanceStrategy::EmptyOnly);

		assert_eq!(inherited.params.len(), 1);
		assert_eq!(inherited.params.get("name").map(String::as_str), Some("bob"));
	}

	#[rstest]
	fn test_always_strategy_inherits_and_child_wins() {
		let parent = snapshot(Route::new("a/:id").component("A"), &[("id", "1"), ("mode", "x")]);
		let child = snapshot(Route::new("b/:id").component("B"), &[("id", "2")]);

		let inherited = inherited(&child, Some(&parent), ParamsInheritanceStrategy::Always);

		assert_eq!(inherited.params.get("id").map(String::as_str), Some("2"));
		assert_eq!(inherited.params.get("mode").map(String::as_str), Some("x"));
	}

	#[rstest]
	fn test_static_title_lands_in_resolve_map() {
		let route = snapshot(Route::new("home").component("Home").title("Home"), &[]);

		let inherited = inherited(&route, None, ParamsInheritanceStrategy::EmptyOnly);

		assert_eq!(inherited.resolve.get(ROUTE_TITLE_KEY), Some(&json!("Home")));
		assert!(!inherited.data.contains_key(ROUTE_TITLE_KEY));
	}

	#[rstest]
	fn test_snapshot_ref_walks_tree() {
		let mut tree = Tree::new(ActivatedRouteSnapshot::root(QueryParams::new(), None, None));
		let team = tree.push_child(tree.root(), snapshot(Route::new("team").component("Team"), &[]));
		let state = Arc::new(RouterStateSnapshot::new("/team".into(), tree));

		let child = state.node(team);

		assert_eq!(child.parent().map(|p| p.id()), Some(state.root().id()));
		assert_eq!(state.root().first_child().map(|c| c.id()), Some(team));
		assert_eq!(child.path_from_root().len(), 2);
		assert_eq!(child.outlet(), PRIMARY_OUTLET);
	}
}
