//! Live router state.
//!
//! An [`ActivatedRoute`] wraps the latest committed snapshot for one position
//! of the route tree. Its streams re-emit only when a committed snapshot
//! changes the corresponding field.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use reinhardt_url_tree::{Params, QueryParams, UrlSegment, UrlTree};
use tokio::sync::watch;

use crate::config::{ComponentType, Data, Route};
use crate::snapshot::{ActivatedRouteSnapshot, RouteSnapshotRef, RouterStateSnapshot};
use crate::tree::{NodeId, Tree};

struct Inner {
	outlet: String,
	component: Option<ComponentType>,
	route_config: Option<Arc<Route>>,
	snapshot: RwLock<Option<RouteSnapshotRef>>,
	future_snapshot: RwLock<RouteSnapshotRef>,
	url: watch::Sender<Vec<UrlSegment>>,
	params: watch::Sender<Params>,
	query_params: watch::Sender<QueryParams>,
	fragment: watch::Sender<Option<String>>,
	data: watch::Sender<Data>,
}

/// The live wrapper around one route of the committed router state.
///
/// Cloning is cheap and clones share identity.
#[derive(Clone)]
pub struct ActivatedRoute {
	inner: Arc<Inner>,
}

impl fmt::Debug for ActivatedRoute {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ActivatedRoute")
			.field("outlet", &self.inner.outlet)
			.field("component", &self.inner.component)
			.field("url", &*self.inner.url.borrow())
			.field("params", &*self.inner.params.borrow())
			.finish()
	}
}

impl PartialEq for ActivatedRoute {
	fn eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.inner, &other.inner)
	}
}

impl Eq for ActivatedRoute {}

impl ActivatedRoute {
	/// Creates a route whose streams start from `future`.
	///
	/// The committed snapshot stays unset until the first [`advance`](Self::advance).
	pub(crate) fn new(future: RouteSnapshotRef) -> Self {
		let inner = Inner {
			outlet: future.outlet().to_string(),
			component: future.component().cloned(),
			route_config: future.route_config().cloned(),
			url: watch::Sender::new(future.url().to_vec()),
			params: watch::Sender::new(future.params().clone()),
			query_params: watch::Sender::new(future.query_params().clone()),
			fragment: watch::Sender::new(future.fragment().map(str::to_string)),
			data: watch::Sender::new(future.data().clone()),
			snapshot: RwLock::new(None),
			future_snapshot: RwLock::new(future),
		};
		Self { inner: Arc::new(inner) }
	}

	pub fn outlet(&self) -> &str {
		&self.inner.outlet
	}

	pub fn component(&self) -> Option<&ComponentType> {
		self.inner.component.as_ref()
	}

	pub fn route_config(&self) -> Option<&Arc<Route>> {
		self.inner.route_config.as_ref()
	}

	/// The committed snapshot, or the pending one before first activation.
	pub fn snapshot(&self) -> RouteSnapshotRef {
		match &*self.inner.snapshot.read() {
			Some(snapshot) => snapshot.clone(),
			None => self.future_snapshot(),
		}
	}

	pub(crate) fn future_snapshot(&self) -> RouteSnapshotRef {
		self.inner.future_snapshot.read().clone()
	}

	pub(crate) fn set_future_snapshot(&self, future: RouteSnapshotRef) {
		*self.inner.future_snapshot.write() = future;
	}

	pub fn url(&self) -> watch::Receiver<Vec<UrlSegment>> {
		self.inner.url.subscribe()
	}

	pub fn params(&self) -> watch::Receiver<Params> {
		self.inner.params.subscribe()
	}

	pub fn query_params(&self) -> watch::Receiver<QueryParams> {
		self.inner.query_params.subscribe()
	}

	pub fn fragment(&self) -> watch::Receiver<Option<String>> {
		self.inner.fragment.subscribe()
	}

	pub fn data(&self) -> watch::Receiver<Data> {
		self.inner.data.subscribe()
	}

	pub fn ptr_eq(&self, other: &ActivatedRoute) -> bool {
		self == other
	}

	/// Promotes the future snapshot to the committed one and notifies the
	/// streams whose field changed.
	pub(crate) fn advance(&self) {
		let next = self.future_snapshot();
		let previous = self.inner.snapshot.write().replace(next.clone());
		let Some(previous) = previous else {
			publish(&self.inner.data, next.data().clone());
			return;
		};
		publish(&self.inner.query_params, next.query_params().clone());
		publish(&self.inner.fragment, next.fragment().map(str::to_string));
		publish(&self.inner.params, next.params().clone());
		if previous.url() != next.url() {
			publish(&self.inner.url, next.url().to_vec());
		}
		publish(&self.inner.data, next.data().clone());
	}
}

/// Sends `value` only if it differs from what subscribers last saw.
fn publish<T: PartialEq>(sender: &watch::Sender<T>, value: T) {
	sender.send_if_modified(|current| {
		if *current == value {
			false
		} else {
			*current = value;
			true
		}
	});
}

/// The committed tree of [`ActivatedRoute`]s and its snapshot.
///
/// Node ids of [`RouterState::tree`] match those of the snapshot tree.
#[derive(Debug, Clone)]
pub struct RouterState {
	pub(crate) tree: Tree<ActivatedRoute>,
	pub(crate) snapshot: Arc<RouterStateSnapshot>,
}

impl RouterState {
	pub(crate) fn new(tree: Tree<ActivatedRoute>, snapshot: Arc<RouterStateSnapshot>) -> Self {
		Self { tree, snapshot }
	}

	pub fn root(&self) -> &ActivatedRoute {
		&self.tree[self.tree.root()]
	}

	pub fn tree(&self) -> &Tree<ActivatedRoute> {
		&self.tree
	}

	pub fn snapshot(&self) -> &Arc<RouterStateSnapshot> {
		&self.snapshot
	}

	pub fn get(&self, id: NodeId) -> Option<&ActivatedRoute> {
		self.tree.get(id)
	}

	pub fn find(&self, route: &ActivatedRoute) -> Option<NodeId> {
		self.tree.preorder().into_iter().find(|id| &self.tree[*id] == route)
	}

	pub fn children(&self, route: &ActivatedRoute) -> Vec<ActivatedRoute> {
		self.find(route)
			.map(|id| self.tree.children(id).iter().map(|child| self.tree[*child].clone()).collect())
			.unwrap_or_default()
	}

	pub fn parent(&self, route: &ActivatedRoute) -> Option<ActivatedRoute> {
		let id = self.find(route)?;
		self.tree.parent(id).map(|parent| self.tree[parent].clone())
	}

	/// The deepest route reached by following primary children from the root.
	pub fn leaf(&self) -> &ActivatedRoute {
		let mut current = self.tree.root();
		while let Some(child) = self.tree.first_child(current) {
			current = child;
		}
		&self.tree[current]
	}
}

/// Router state before any navigation: a lone, already committed root.
pub(crate) fn create_empty_state(url_tree: &UrlTree, root_component: Option<ComponentType>) -> RouterState {
	let snapshot = create_empty_state_snapshot(url_tree, root_component);
	let root = ActivatedRoute::new(snapshot.root());
	root.advance();
	RouterState::new(Tree::new(root), snapshot)
}

pub(crate) fn create_empty_state_snapshot(
	url_tree: &UrlTree,
	root_component: Option<ComponentType>,
) -> Arc<RouterStateSnapshot> {
	let root = ActivatedRouteSnapshot::root(url_tree.query_params.clone(), url_tree.fragment.clone(), root_component);
	Arc::new(RouterStateSnapshot::new(String::new(), Tree::new(root)))
}
