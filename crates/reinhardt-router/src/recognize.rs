//! Route recognition.
//!
//! Walks a URL tree against the route configuration and builds the target
//! [`RouterStateSnapshot`]. Redirects are applied while matching; an absolute
//! redirect restarts recognition on the new URL. Sibling routes are tried in
//! declaration order and a route whose subtree fails to match is rejected as
//! a whole.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use reinhardt_url_tree::{
	PRIMARY_OUTLET, Params, UrlSegment, UrlSegmentGroup, UrlSerializer, UrlTree, create_url_tree,
};

use crate::check_guards::{run_can_load_guards, run_can_match_guards};
use crate::config::{ComponentType, RedirectContext, Route};
use crate::error::{RouterError, RouterResult};
use crate::host::InjectionContext;
use crate::loader::RouterConfigLoader;
use crate::matcher::{MatchResult, is_immediate_match, match_route, no_leftovers, split};
use crate::options::ParamsInheritanceStrategy;
use crate::redirects::{ApplyRedirects, Redirected};
use crate::snapshot::{ActivatedRouteSnapshot, RouterStateSnapshot, inherited};
use crate::tree::{NodeId, Tree};

/// Outcome of recognizing a URL.
#[derive(Debug, Clone)]
pub(crate) struct Recognition {
	pub url_after_redirects: UrlTree,
	pub state: RouterStateSnapshot,
}

enum RecognizeError {
	NoMatch(UrlSegmentGroup),
	AbsoluteRedirect(UrlTree),
	Router(RouterError),
}

impl From<RouterError> for RecognizeError {
	fn from(error: RouterError) -> Self {
		Self::Router(error)
	}
}

type Step<'s, T> = BoxFuture<'s, Result<T, RecognizeError>>;

struct SnapshotNode {
	value: ActivatedRouteSnapshot,
	children: Vec<SnapshotNode>,
}

impl SnapshotNode {
	fn leaf(value: ActivatedRouteSnapshot) -> Self {
		Self {
			value,
			children: Vec::new(),
		}
	}
}

pub(crate) struct Recognizer<'r> {
	config: &'r [Arc<Route>],
	loader: &'r RouterConfigLoader,
	serializer: &'r dyn UrlSerializer,
	inheritance: ParamsInheritanceStrategy,
	root_component: Option<ComponentType>,
	redirects: ApplyRedirects,
	url_tree: UrlTree,
}

impl<'r> Recognizer<'r> {
	pub(crate) fn new(
		config: &'r [Arc<Route>],
		loader: &'r RouterConfigLoader,
		serializer: &'r dyn UrlSerializer,
		url_tree: UrlTree,
	) -> Self {
		Self {
			config,
			loader,
			serializer,
			inheritance: ParamsInheritanceStrategy::default(),
			root_component: None,
			redirects: ApplyRedirects::new(usize::MAX),
			url_tree,
		}
	}

	pub(crate) fn inheritance(mut self, strategy: ParamsInheritanceStrategy) -> Self {
		self.inheritance = strategy;
		self
	}

	pub(crate) fn root_component(mut self, component: Option<ComponentType>) -> Self {
		self.root_component = component;
		self
	}

	pub(crate) fn max_redirects(mut self, limit: usize) -> Self {
		self.redirects = ApplyRedirects::new(limit);
		self
	}

	pub(crate) async fn recognize(mut self) -> RouterResult<Recognition> {
		let mut root_group = split(&self.url_tree.root, &[], &[], self.config).0;
		let children = loop {
			let root = self.root_snapshot();
			let attempt = self.process_segment_group(self.config, &root_group, PRIMARY_OUTLET, &root, None).await;
			match attempt {
				Ok(children) => break children,
				Err(RecognizeError::AbsoluteRedirect(tree)) => {
					tracing::debug!(url = %tree, "restarting recognition after absolute redirect");
					root_group = split(&tree.root, &[], &[], self.config).0;
					self.url_tree = tree;
				}
				Err(RecognizeError::NoMatch(group)) => {
					return Err(RouterError::NoMatch { url: group.to_string() });
				}
				Err(RecognizeError::Router(error)) => return Err(error),
			}
		};

		let mut tree = Tree::new(self.root_snapshot());
		attach(&mut tree, NodeId::ROOT, children);

		let url_after_redirects = create_url_tree(
			&segment_group_of(&tree, NodeId::ROOT),
			&[],
			&[],
			self.url_tree.query_params.clone(),
			self.url_tree.fragment.clone(),
		)?;
		let url = self.serializer.serialize(&url_after_redirects);
		tracing::debug!(%url, redirects = self.redirects.applied(), "recognized");
		Ok(Recognition {
			url_after_redirects,
			state: RouterStateSnapshot::new(url, tree),
		})
	}

	fn root_snapshot(&self) -> ActivatedRouteSnapshot {
		ActivatedRouteSnapshot::root(
			self.url_tree.query_params.clone(),
			self.url_tree.fragment.clone(),
			self.root_component.clone(),
		)
	}

	fn create_snapshot(
		&self,
		route: &Arc<Route>,
		url: Vec<UrlSegment>,
		params: Params,
		parent: &ActivatedRouteSnapshot,
		context: Option<InjectionContext>,
	) -> ActivatedRouteSnapshot {
		let mut snapshot = ActivatedRouteSnapshot::for_route(
			route,
			url,
			params,
			self.url_tree.query_params.clone(),
			self.url_tree.fragment.clone(),
			context,
		);
		let inherited = inherited(&snapshot, Some(parent), self.inheritance);
		snapshot.params = inherited.params;
		snapshot.data = inherited.data;
		snapshot
	}

	fn process_segment_group<'s>(
		&'s self,
		routes: &'s [Arc<Route>],
		group: &'s UrlSegmentGroup,
		outlet: &'s str,
		parent: &'s ActivatedRouteSnapshot,
		context: Option<InjectionContext>,
	) -> Step<'s, Vec<SnapshotNode>> {
		async move {
			if group.segments.is_empty() && group.has_children() {
				return self.process_children(routes, group, parent, context).await;
			}
			let child = self
				.process_segment(routes, group, &group.segments, outlet, true, parent, context)
				.await?;
			Ok(child.into_iter().collect())
		}
		.boxed()
	}

	fn process_children<'s>(
		&'s self,
		routes: &'s [Arc<Route>],
		group: &'s UrlSegmentGroup,
		parent: &'s ActivatedRouteSnapshot,
		context: Option<InjectionContext>,
	) -> Step<'s, Vec<SnapshotNode>> {
		async move {
			let mut children = Vec::new();
			for (outlet, child) in group.ordered_children() {
				let sorted = sort_by_matching_outlets(routes, outlet);
				children.extend(
					self.process_segment_group(&sorted, child, outlet, parent, context.clone())
						.await?,
				);
			}
			let mut merged = merge_empty_path_matches(children);
			check_outlet_name_uniqueness(&merged)?;
			merged.sort_by(|a, b| outlet_order(&a.value, &b.value));
			Ok(merged)
		}
		.boxed()
	}

	/// Tries each route in order. `Ok(None)` means nothing is left to match.
	#[allow(clippy::too_many_arguments)]
	fn process_segment<'s>(
		&'s self,
		routes: &'s [Arc<Route>],
		group: &'s UrlSegmentGroup,
		segments: &'s [UrlSegment],
		outlet: &'s str,
		allow_redirects: bool,
		parent: &'s ActivatedRouteSnapshot,
		context: Option<InjectionContext>,
	) -> Step<'s, Option<SnapshotNode>> {
		async move {
			for route in routes {
				let attempt = self.process_segment_against_route(
					routes,
					route,
					group,
					segments,
					outlet,
					allow_redirects,
					parent,
					context.clone(),
				);
				match attempt.await {
					Ok(node) => return Ok(node),
					Err(RecognizeError::NoMatch(_)) => continue,
					Err(error) => return Err(error),
				}
			}
			if no_leftovers(group, segments, outlet) {
				Ok(None)
			} else {
				Err(RecognizeError::NoMatch(group.clone()))
			}
		}
		.boxed()
	}

	#[allow(clippy::too_many_arguments)]
	fn process_segment_against_route<'s>(
		&'s self,
		routes: &'s [Arc<Route>],
		route: &'s Arc<Route>,
		group: &'s UrlSegmentGroup,
		segments: &'s [UrlSegment],
		outlet: &'s str,
		allow_redirects: bool,
		parent: &'s ActivatedRouteSnapshot,
		context: Option<InjectionContext>,
	) -> Step<'s, Option<SnapshotNode>> {
		async move {
			if !is_immediate_match(route, group, segments, outlet) {
				return Err(RecognizeError::NoMatch(group.clone()));
			}
			match route.redirect() {
				None => self
					.match_segment_against_route(route, group, segments, outlet, parent, context)
					.await
					.map(Some),
				Some(_) if allow_redirects => {
					self.expand_using_redirect(routes, route, group, segments, outlet, parent, context)
						.await
				}
				Some(_) => Err(RecognizeError::NoMatch(group.clone())),
			}
		}
		.boxed()
	}

	#[allow(clippy::too_many_arguments)]
	fn expand_using_redirect<'s>(
		&'s self,
		routes: &'s [Arc<Route>],
		route: &'s Arc<Route>,
		group: &'s UrlSegmentGroup,
		segments: &'s [UrlSegment],
		outlet: &'s str,
		parent: &'s ActivatedRouteSnapshot,
		context: Option<InjectionContext>,
	) -> Step<'s, Option<SnapshotNode>> {
		async move {
			let Some(result) = match_route(group, route, segments) else {
				return Err(RecognizeError::NoMatch(group.clone()));
			};
			let current = self.create_snapshot(
				route,
				result.consumed.clone(),
				result.parameters.clone(),
				parent,
				context.clone(),
			);
			let redirect_context = RedirectContext {
				params: current.params.clone(),
				data: current.data.clone(),
				query_params: self.url_tree.query_params.clone(),
				fragment: self.url_tree.fragment.clone(),
				url: result.consumed.clone(),
				outlet: route.outlet_name().to_string(),
			};

			let redirected = self
				.redirects
				.apply(
					route,
					&result.consumed,
					&result.pos_params,
					&self.url_tree,
					self.serializer,
					redirect_context,
				)
				.await?;
			match redirected {
				Redirected::Absolute(tree) => Err(RecognizeError::AbsoluteRedirect(tree)),
				Redirected::Relative(mut rewritten) => {
					rewritten.extend(result.remaining);
					self.process_segment(routes, group, &rewritten, outlet, false, parent, context)
						.await
				}
			}
		}
		.boxed()
	}

	fn match_segment_against_route<'s>(
		&'s self,
		route: &'s Arc<Route>,
		group: &'s UrlSegmentGroup,
		segments: &'s [UrlSegment],
		outlet: &'s str,
		parent: &'s ActivatedRouteSnapshot,
		context: Option<InjectionContext>,
	) -> Step<'s, SnapshotNode> {
		async move {
			let wildcard = route.matcher().is_none() && route.path() == "**";
			let (snapshot, consumed, remaining) = if wildcard {
				let params = segments.last().map(|s| s.parameters.clone()).unwrap_or_default();
				let snapshot = self.create_snapshot(route, segments.to_vec(), params, parent, context.clone());
				(snapshot, Vec::new(), Vec::new())
			} else {
				let Some(result) = self.match_with_checks(group, route, segments).await? else {
					return Err(RecognizeError::NoMatch(group.clone()));
				};
				let snapshot = self.create_snapshot(
					route,
					result.consumed.clone(),
					result.parameters,
					parent,
					context.clone(),
				);
				(snapshot, result.consumed, result.remaining)
			};

			let (child_config, child_context) = self.child_config(route, segments, context).await?;
			// a wildcard swallows named outlets of its group too
			let raw = if wildcard {
				Cow::Owned(UrlSegmentGroup::leaf(group.segments.clone()))
			} else {
				Cow::Borrowed(group)
			};
			let (segment_group, sliced) = split(&raw, &consumed, &remaining, &child_config);

			if sliced.is_empty() && segment_group.has_children() {
				let children = self
					.process_children(&child_config, &segment_group, &snapshot, child_context)
					.await?;
				return Ok(SnapshotNode {
					value: snapshot,
					children,
				});
			}
			if child_config.is_empty() && sliced.is_empty() {
				return Ok(SnapshotNode::leaf(snapshot));
			}

			let child_outlet = if route.outlet_name() == outlet { PRIMARY_OUTLET } else { outlet };
			let child = self
				.process_segment(&child_config, &segment_group, &sliced, child_outlet, true, &snapshot, child_context)
				.await?;
			Ok(SnapshotNode {
				value: snapshot,
				children: child.into_iter().collect(),
			})
		}
		.boxed()
	}

	/// Structural match followed by the route's `canMatch` guards.
	async fn match_with_checks(
		&self,
		group: &UrlSegmentGroup,
		route: &Arc<Route>,
		segments: &[UrlSegment],
	) -> RouterResult<Option<MatchResult>> {
		let Some(result) = match_route(group, route, segments) else {
			return Ok(None);
		};
		if run_can_match_guards(route, segments).await? {
			Ok(Some(result))
		} else {
			tracing::debug!(path = route.path(), "canMatch rejected route");
			Ok(None)
		}
	}

	/// Child routes of `route`, loading them lazily when needed.
	async fn child_config(
		&self,
		route: &Arc<Route>,
		segments: &[UrlSegment],
		context: Option<InjectionContext>,
	) -> RouterResult<(Vec<Arc<Route>>, Option<InjectionContext>)> {
		if let Some(children) = route.child_routes() {
			return Ok((children.to_vec(), context));
		}
		if !route.has_load_children() {
			return Ok((Vec::new(), context));
		}
		if let Some(loaded) = self.loader.cached(route) {
			return Ok((loaded.routes, loaded.context.or(context)));
		}
		run_can_load_guards(route, segments).await?;
		let loaded = self.loader.load_children(context.clone(), Arc::clone(route)).await?;
		Ok((loaded.routes, loaded.context.or(context)))
	}
}

fn attach(tree: &mut Tree<ActivatedRouteSnapshot>, parent: NodeId, children: Vec<SnapshotNode>) {
	for child in children {
		let id = tree.push_child(parent, child.value);
		attach(tree, id, child.children);
	}
}

/// The URL a snapshot tree stands for, as a segment group.
pub(crate) fn segment_group_of(tree: &Tree<ActivatedRouteSnapshot>, node: NodeId) -> UrlSegmentGroup {
	let children = tree
		.children(node)
		.iter()
		.map(|child| (tree[*child].outlet.clone(), segment_group_of(tree, *child)))
		.collect();
	UrlSegmentGroup::new(tree[node].url.clone(), children)
}

/// Routes for `outlet` first, the rest after, each in declaration order.
fn sort_by_matching_outlets(routes: &[Arc<Route>], outlet: &str) -> Vec<Arc<Route>> {
	let (mut matching, rest): (Vec<_>, Vec<_>) = routes.iter().cloned().partition(|r| r.outlet_name() == outlet);
	matching.extend(rest);
	matching
}

/// Merges sibling matches of the same empty-path route, which happen when an
/// empty-path parent matched once per outlet.
fn merge_empty_path_matches(nodes: Vec<SnapshotNode>) -> Vec<SnapshotNode> {
	let mut result: Vec<SnapshotNode> = Vec::new();
	let mut merged = Vec::new();
	for node in nodes {
		if node.value.has_empty_path_config() {
			let same = result.iter().position(|existing| same_route(&existing.value, &node.value));
			if let Some(index) = same {
				result[index].children.extend(node.children);
				if !merged.contains(&index) {
					merged.push(index);
				}
				continue;
			}
		}
		result.push(node);
	}
	for index in merged {
		let children = std::mem::take(&mut result[index].children);
		result[index].children = merge_empty_path_matches(children);
	}
	result
}

fn same_route(a: &ActivatedRouteSnapshot, b: &ActivatedRouteSnapshot) -> bool {
	match (a.route_config(), b.route_config()) {
		(Some(a), Some(b)) => a.same_config(b),
		_ => false,
	}
}

fn check_outlet_name_uniqueness(nodes: &[SnapshotNode]) -> RouterResult<()> {
	let mut seen: HashMap<&str, &ActivatedRouteSnapshot> = HashMap::new();
	for node in nodes {
		if let Some(previous) = seen.insert(node.value.outlet(), &node.value) {
			return Err(RouterError::DuplicateOutlet {
				first: join_segments(previous.url()),
				second: join_segments(node.value.url()),
			});
		}
	}
	Ok(())
}

fn join_segments(segments: &[UrlSegment]) -> String {
	segments.iter().map(ToString::to_string).collect::<Vec<_>>().join("/")
}

fn outlet_order(a: &ActivatedRouteSnapshot, b: &ActivatedRouteSnapshot) -> Ordering {
	match (a.outlet() == PRIMARY_OUTLET, b.outlet() == PRIMARY_OUTLET) {
		(true, false) => Ordering::Less,
		(false, true) => Ordering::Greater,
		_ => a.outlet().cmp(b.outlet()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::LoadedRoutes;
	use crate::events::EventBus;
	use crate::guards::GuardResult;
	use crate::loader::DefaultConfigLoader;
	use reinhardt_url_tree::DefaultUrlSerializer;
	use rstest::*;
	use serde_json::json;

	#[fixture]
	fn loader() -> RouterConfigLoader {
		RouterConfigLoader::new(Arc::new(DefaultConfigLoader), EventBus::new(16))
	}

	async fn recognize(config: Vec<Route>, url: &str, loader: &RouterConfigLoader) -> RouterResult<Recognition> {
		let config: Vec<Arc<Route>> = config.into_iter().map(Arc::new).collect();
		Recognizer::new(&config, loader, &DefaultUrlSerializer, UrlTree::parse(url).unwrap())
			.max_redirects(31)
			.recognize()
			.await
	}

	fn paths(recognition: &Recognition) -> Vec<String> {
		let state = &recognition.state;
		state
			.tree()
			.preorder()
			.into_iter()
			.skip(1)
			.map(|id| {
				let node = &state.tree()[id];
				format!("{}:{}", node.outlet(), node.route_config().map(|r| r.path()).unwrap_or(""))
			})
			.collect()
	}

	#[rstest]
	#[tokio::test]
	async fn test_param_route(loader: RouterConfigLoader) {
		let result = recognize(vec![Route::new("team/:id").component("Team")], "/team/33", &loader)
			.await
			.unwrap();

		let team = &result.state.tree()[result.state.tree().first_child(NodeId::ROOT).unwrap()];
		assert_eq!(team.param("id"), Some("33"));
		assert_eq!(team.url(), &[UrlSegment::path("team"), UrlSegment::path("33")]);
		assert_eq!(result.state.url(), "/team/33");
	}

	#[rstest]
	#[tokio::test]
	async fn test_empty_path_redirect(loader: RouterConfigLoader) {
		let config = vec![Route::new("").redirect_to("/home"), Route::new("home").component("Home")];

		let result = recognize(config, "/", &loader).await.unwrap();

		assert_eq!(result.url_after_redirects, UrlTree::parse("/home").unwrap());
		assert_eq!(paths(&result), vec!["primary:home"]);
	}

	#[rstest]
	#[tokio::test]
	async fn test_relative_redirect_keeps_position(loader: RouterConfigLoader) {
		let config = vec![Route::new("team/:id").component("Team").children(vec![
			Route::new("legacy/:name").redirect_to("user/:name"),
			Route::new("user/:name").component("User"),
		])];

		let result = recognize(config, "/team/1/legacy/bob", &loader).await.unwrap();

		assert_eq!(result.url_after_redirects.to_string(), "/team/1/user/bob");
		assert_eq!(paths(&result), vec!["primary:team/:id", "primary:user/:name"]);
	}

	#[rstest]
	#[tokio::test]
	async fn test_nested_and_named_outlets(loader: RouterConfigLoader) {
		let config = vec![
			Route::new("team/:id").component("Team").children(vec![Route::new("user/:name").component("User")]),
			Route::new("chat").component("Chat").outlet("aux"),
		];

		let result = recognize(config, "/team/33/user/bob(aux:chat)", &loader).await.unwrap();

		assert_eq!(paths(&result), vec!["primary:team/:id", "primary:user/:name", "aux:chat"]);
		assert_eq!(result.state.url(), "/team/33/user/bob(aux:chat)");
	}

	#[rstest]
	#[tokio::test]
	async fn test_sibling_rejected_when_subtree_fails(loader: RouterConfigLoader) {
		let config = vec![
			Route::new("a").component("First").children(vec![Route::new("x").component("X")]),
			Route::new("a/y").component("Second"),
		];

		let result = recognize(config, "/a/y", &loader).await.unwrap();

		assert_eq!(paths(&result), vec!["primary:a/y"]);
	}

	#[rstest]
	#[tokio::test]
	async fn test_no_match_reports_segment(loader: RouterConfigLoader) {
		let err = recognize(vec![Route::new("home").component("Home")], "/missing", &loader)
			.await
			.unwrap_err();

		assert_eq!(err.to_string(), "Cannot match any routes. URL Segment: 'missing'");
	}

	#[rstest]
	#[tokio::test]
	async fn test_wildcard_catches_rest(loader: RouterConfigLoader) {
		let config = vec![Route::new("home").component("Home"), Route::new("**").component("NotFound")];

		let result = recognize(config, "/nope/deeper", &loader).await.unwrap();

		assert_eq!(paths(&result), vec!["primary:**"]);
	}

	#[rstest]
	#[tokio::test]
	async fn test_empty_path_parent_inherits_into_children(loader: RouterConfigLoader) {
		let config = vec![Route::new("team/:id").component("Team").data("section", "teams").children(vec![
			Route::new("").component("Overview"),
		])];

		let result = recognize(config, "/team/9", &loader).await.unwrap();

		let leaf = result.state.tree().preorder().into_iter().last().unwrap();
		let overview = &result.state.tree()[leaf];
		assert_eq!(overview.param("id"), Some("9"));
		assert_eq!(overview.data().get("section"), Some(&json!("teams")));
	}

	#[rstest]
	#[tokio::test]
	async fn test_can_match_falls_through_to_next_route(loader: RouterConfigLoader) {
		let config = vec![
			Route::new("dashboard")
				.component("Admin")
				.can_match(|_, _| async { Ok(GuardResult::Deny) }),
			Route::new("dashboard").component("User"),
		];

		let result = recognize(config, "/dashboard", &loader).await.unwrap();

		let leaf = &result.state.tree()[result.state.tree().first_child(NodeId::ROOT).unwrap()];
		assert_eq!(leaf.component().map(ComponentType::name), Some("User"));
	}

	#[rstest]
	#[tokio::test]
	async fn test_redirect_loop_is_detected(loader: RouterConfigLoader) {
		let config = vec![Route::new("a").redirect_to("/b"), Route::new("b").redirect_to("/a")];

		let err = recognize(config, "/a", &loader).await.unwrap_err();

		assert!(matches!(err, RouterError::RedirectLoop { limit: 31 }));
	}

	#[rstest]
	#[tokio::test]
	async fn test_lazy_children_are_loaded(loader: RouterConfigLoader) {
		let config = vec![Route::new("admin").load_children(|| async {
			Ok(LoadedRoutes::from(vec![Route::new("users").component("Users")]))
		})];

		let result = recognize(config, "/admin/users", &loader).await.unwrap();

		assert_eq!(paths(&result), vec!["primary:admin", "primary:users"]);
	}

	#[rstest]
	#[tokio::test]
	async fn test_can_load_rejection_cancels(loader: RouterConfigLoader) {
		let config = vec![
			Route::new("admin")
				.can_load(|_, _| async { Ok(GuardResult::Deny) })
				.load_children(|| async { Ok(LoadedRoutes::default()) }),
		];

		let err = recognize(config, "/admin", &loader).await.unwrap_err();

		assert_eq!(
			err.as_canceling().map(|c| c.code),
			Some(crate::error::NavigationCancellationCode::GuardRejected)
		);
	}

	#[rstest]
	#[tokio::test]
	async fn test_empty_path_named_outlet_is_activated(loader: RouterConfigLoader) {
		let config = vec![
			Route::new("").component("Sidebar").outlet("side"),
			Route::new("home").component("Home"),
		];

		let result = recognize(config, "/home", &loader).await.unwrap();

		assert_eq!(paths(&result), vec!["primary:home", "side:"]);
	}
}
