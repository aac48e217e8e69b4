//! Activation of a new router state.
//!
//! [`ActivationPlan::build`] diffs the committed tree against the next one and
//! orders the host calls: every teardown (deepest routes first) comes before
//! any activation (root first). Executing the plan advances the live routes,
//! which is what makes their streams emit.

use crate::activated_route::{ActivatedRoute, RouterState};
use crate::events::{EventBus, RouterEvent};
use crate::host::{InjectionContext, OutletHost};
use crate::reuse::{DetachedRouteHandle, RouteReuseStrategy};
use crate::snapshot::RouteSnapshotRef;
use crate::tree::{NodeId, Tree};

/// One host call or event of an activation.
#[derive(Debug, Clone)]
pub enum ActivationStep {
	/// Destroy the component of a route that is no longer shown.
	Deactivate(ActivatedRoute),
	/// Detach the component, with the routes rendered inside it, and hand it
	/// to the reuse strategy.
	Detach {
		route: ActivatedRoute,
		outlets: Tree<ActivatedRoute>,
	},
	/// Commit the route's pending snapshot.
	Advance(ActivatedRoute),
	Activate {
		route: ActivatedRoute,
		context: Option<InjectionContext>,
	},
	/// Reattach a previously detached component.
	Attach {
		route: ActivatedRoute,
		handle: DetachedRouteHandle,
	},
	ActivationEnd(RouteSnapshotRef),
	ChildActivationEnd(RouteSnapshotRef),
}

/// Ordered steps that move the host from one router state to the next.
#[derive(Debug, Clone, Default)]
pub struct ActivationPlan {
	steps: Vec<ActivationStep>,
}

impl ActivationPlan {
	pub fn steps(&self) -> &[ActivationStep] {
		&self.steps
	}

	pub(crate) fn build(strategy: &dyn RouteReuseStrategy, future: &RouterState, current: &RouterState) -> Self {
		let mut builder = PlanBuilder {
			strategy,
			future,
			steps: Vec::new(),
		};
		builder.deactivate_child_routes(NodeId::ROOT, &current.tree, Some(NodeId::ROOT));
		builder.steps.push(ActivationStep::Advance(future.root().clone()));
		builder.activate_child_routes(NodeId::ROOT, &current.tree, Some(NodeId::ROOT));
		Self { steps: builder.steps }
	}

	pub(crate) fn execute(self, host: &dyn OutletHost, strategy: &dyn RouteReuseStrategy, events: &EventBus) {
		for step in self.steps {
			match step {
				ActivationStep::Deactivate(route) => {
					tracing::trace!(outlet = route.outlet(), component = ?route.component(), "deactivating");
					host.deactivate(&route);
				}
				ActivationStep::Detach { route, outlets } => {
					tracing::trace!(outlet = route.outlet(), component = ?route.component(), "detaching");
					let component = host.detach(&route);
					strategy.store(&route.snapshot(), Some(DetachedRouteHandle {
						component,
						route,
						outlets,
					}));
				}
				ActivationStep::Advance(route) => route.advance(),
				ActivationStep::Activate { route, context } => {
					tracing::trace!(outlet = route.outlet(), component = ?route.component(), "activating");
					host.activate(&route, context.as_ref());
				}
				ActivationStep::Attach { route, handle } => {
					tracing::trace!(outlet = route.outlet(), component = ?route.component(), "reattaching");
					strategy.store(&route.snapshot(), None);
					host.attach(&route, handle.component);
				}
				ActivationStep::ActivationEnd(snapshot) => events.emit(RouterEvent::ActivationEnd { snapshot }),
				ActivationStep::ChildActivationEnd(snapshot) => {
					events.emit(RouterEvent::ChildActivationEnd { snapshot });
				}
			}
		}
	}
}

struct PlanBuilder<'a> {
	strategy: &'a dyn RouteReuseStrategy,
	future: &'a RouterState,
	steps: Vec<ActivationStep>,
}

impl PlanBuilder<'_> {
	/// Pairs each future child of `future_node` with the current child in the
	/// same outlet.
	fn pair_children(
		&self,
		future_node: NodeId,
		current: &Tree<ActivatedRoute>,
		current_node: Option<NodeId>,
	) -> (Vec<(NodeId, Option<NodeId>)>, Vec<NodeId>) {
		let future = self.future;
		let mut remaining: Vec<NodeId> = current_node.map(|node| current.children(node).to_vec()).unwrap_or_default();
		let pairs = future
			.tree
			.children(future_node)
			.iter()
			.map(|child| {
				let outlet = future.tree[*child].outlet();
				let matching = remaining
					.iter()
					.position(|id| current[*id].outlet() == outlet)
					.map(|index| remaining.remove(index));
				(*child, matching)
			})
			.collect();
		(pairs, remaining)
	}

	fn deactivate_child_routes(&mut self, future_node: NodeId, current: &Tree<ActivatedRoute>, current_node: Option<NodeId>) {
		let (pairs, leftovers) = self.pair_children(future_node, current, current_node);
		for (future_child, current_child) in pairs {
			match current_child {
				Some(current_child) if self.future.tree[future_child] == current[current_child] => {
					self.deactivate_child_routes(future_child, current, Some(current_child));
				}
				Some(current_child) => self.deactivate_route_and_children(current, current_child),
				None => {}
			}
		}
		for leftover in leftovers {
			self.deactivate_route_and_children(current, leftover);
		}
	}

	/// A detached route keeps its children; otherwise they are torn down
	/// before the route itself.
	fn deactivate_route_and_children(&mut self, current: &Tree<ActivatedRoute>, node: NodeId) {
		let route = &current[node];
		if route.component().is_some() && self.strategy.should_detach(&route.snapshot()) {
			self.steps.push(ActivationStep::Detach {
				route: route.clone(),
				outlets: current.subtree(node),
			});
			return;
		}
		for child in current.children(node) {
			self.deactivate_route_and_children(current, *child);
		}
		if route.component().is_some() {
			self.steps.push(ActivationStep::Deactivate(route.clone()));
		}
	}

	fn activate_child_routes(&mut self, future_node: NodeId, current: &Tree<ActivatedRoute>, current_node: Option<NodeId>) {
		let (pairs, _) = self.pair_children(future_node, current, current_node);
		let snapshot = self.future.snapshot();
		let has_children = !pairs.is_empty();
		for (future_child, current_child) in pairs {
			self.activate_routes(future_child, current, current_child);
			self.steps.push(ActivationStep::ActivationEnd(snapshot.node(future_child)));
		}
		if has_children {
			self.steps.push(ActivationStep::ChildActivationEnd(snapshot.node(future_node)));
		}
	}

	fn activate_routes(&mut self, future_node: NodeId, current: &Tree<ActivatedRoute>, current_node: Option<NodeId>) {
		let route = self.future.tree[future_node].clone();
		self.steps.push(ActivationStep::Advance(route.clone()));

		if let Some(current_node) = current_node
			&& route == current[current_node]
		{
			self.activate_child_routes(future_node, current, Some(current_node));
			return;
		}

		if route.component().is_some() {
			let snapshot = self.future.snapshot().node(future_node);
			let stored = self
				.strategy
				.should_attach(&snapshot)
				.then(|| self.strategy.retrieve(&snapshot))
				.flatten()
				.filter(|handle| handle.route == route);
			match stored {
				Some(handle) => {
					// Stored children are diffed like a current subtree.
					let outlets = handle.outlets.clone();
					self.deactivate_child_routes(future_node, &outlets, Some(NodeId::ROOT));
					self.steps.push(ActivationStep::Attach { route, handle });
					self.activate_child_routes(future_node, &outlets, Some(NodeId::ROOT));
					return;
				}
				None => {
					let context = self.closest_context(future_node);
					self.steps.push(ActivationStep::Activate { route, context });
				}
			}
		}
		self.activate_child_routes(future_node, current, None);
	}

	/// Injection context of the route or its closest ancestor that has one.
	fn closest_context(&self, node: NodeId) -> Option<InjectionContext> {
		let tree = self.future.snapshot().tree();
		tree.path_from_root(node)
			.into_iter()
			.rev()
			.find_map(|id| tree[id].context().cloned())
	}
}
