//! Resolver execution.
//!
//! Resolvers run for every route that passed `canActivate`. Routes are
//! visited parent first; the resolvers of one route run concurrently. Routes
//! below a resolved route only refresh their inherited data.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::future::try_join_all;

use crate::check_guards::Checks;
use crate::config::Data;
use crate::error::{NavigationCanceling, NavigationCancellationCode, RouterError, RouterResult};
use crate::guards::ResolveResult;
use crate::options::ParamsInheritanceStrategy;
use crate::snapshot::{RouterStateSnapshot, inherited};
use crate::tree::NodeId;

/// Runs resolvers for the routes in `checks` and stores the results in
/// `state`.
pub(crate) async fn resolve_data(
	checks: &Checks,
	state: &mut Arc<RouterStateSnapshot>,
	strategy: ParamsInheritanceStrategy,
) -> RouterResult<()> {
	if checks.can_activate.is_empty() {
		return Ok(());
	}
	let to_run: BTreeSet<NodeId> = checks.can_activate.iter().map(|check| check.node()).collect();
	let needing_update: Vec<NodeId> = state
		.tree()
		.preorder()
		.into_iter()
		.filter(|id| state.tree().path_from_root(*id).iter().any(|ancestor| to_run.contains(ancestor)))
		.collect();

	for node in needing_update {
		if to_run.contains(&node) {
			let resolved = resolve_node(state, node).await?;
			let snapshot = Arc::make_mut(state);
			snapshot.tree[node].resolved_data = resolved;
			refresh_data(snapshot, node, strategy);
		} else {
			refresh_data(Arc::make_mut(state), node, strategy);
		}
	}
	Ok(())
}

fn refresh_data(state: &mut RouterStateSnapshot, node: NodeId, strategy: ParamsInheritanceStrategy) {
	let parent = state.tree.parent(node).map(|parent| &state.tree[parent]);
	let data = inherited(&state.tree[node], parent, strategy).resolve;
	state.tree[node].data = data;
}

async fn resolve_node(state: &Arc<RouterStateSnapshot>, node: NodeId) -> RouterResult<Data> {
	let resolvers = state.tree()[node].resolve.clone();
	if resolvers.is_empty() {
		return Ok(Data::new());
	}
	tracing::trace!(keys = ?resolvers.keys().collect::<Vec<_>>(), "running resolvers");

	let pending = resolvers.into_iter().map(|(key, resolver)| {
		let route = state.node(node);
		let state = Arc::clone(state);
		async move {
			match resolver.resolve(route, state).await {
				Ok(ResolveResult::Value(value)) => Ok((key, value)),
				Ok(ResolveResult::Redirect(command)) => Err(RouterError::Canceled(NavigationCanceling::redirect(command))),
				Ok(ResolveResult::Empty) => Err(RouterError::canceled(
					NavigationCancellationCode::NoDataFromResolver,
					"At least one route resolver didn't emit any value.",
				)),
				Err(error) => Err(RouterError::Resolver {
					key,
					error: Arc::new(error),
				}),
			}
		}
	});
	Ok(try_join_all(pending).await?.into_iter().collect())
}
