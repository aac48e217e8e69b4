//! Route configuration.
//!
//! A [`Route`] is static, user-supplied data. It is built once with the
//! builder methods below and shared behind `Arc` for the lifetime of the
//! router. Identity (for reuse decisions and the lazy-load cache) is the
//! route's [`RouteId`], never structural equality.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use futures::future::BoxFuture;
use reinhardt_url_tree::{PRIMARY_OUTLET, Params, QueryParams, UrlSegment, UrlSegmentGroup, UrlTree};
use serde_json::Value;

use crate::error::{RouterError, RouterResult};
use crate::guards::{
	CanActivate, CanActivateChild, CanDeactivate, CanLoad, CanMatch, GuardResult, RedirectCommand, Resolve,
	ResolveResult,
};
use crate::host::{ComponentHandle, InjectionContext};
use crate::snapshot::{ActivatedRouteSnapshot, RouteSnapshotRef, RouterStateSnapshot};

/// Data key under which a route title is surfaced.
pub const ROUTE_TITLE_KEY: &str = "_routeTitle";

/// Static or resolved route data keyed by name.
pub type Data = BTreeMap<String, Value>;

static NEXT_ROUTE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`Route`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteId(u64);

impl RouteId {
	fn next() -> Self {
		Self(NEXT_ROUTE_ID.fetch_add(1, Ordering::Relaxed))
	}
}

/// Opaque reference to a view component type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentType(Arc<str>);

impl ComponentType {
	pub fn new(name: impl AsRef<str>) -> Self {
		Self(Arc::from(name.as_ref()))
	}

	pub fn name(&self) -> &str {
		&self.0
	}
}

impl From<&str> for ComponentType {
	fn from(name: &str) -> Self {
		Self::new(name)
	}
}

impl From<String> for ComponentType {
	fn from(name: String) -> Self {
		Self::new(name)
	}
}

impl fmt::Display for ComponentType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// How a route's path is matched against the remaining segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathMatch {
	/// The path must be a prefix of the remaining segments.
	#[default]
	Prefix,
	/// The path must consume every remaining segment.
	Full,
}

/// Result of a custom [`UrlMatcher`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UrlMatchResult {
	/// Segments consumed by the match, from the start of the input.
	pub consumed: Vec<UrlSegment>,
	/// Named segments extracted by the match.
	pub pos_params: BTreeMap<String, UrlSegment>,
}

/// Custom matcher: `(remaining segments, containing group, route)`.
pub type UrlMatcher = Arc<dyn Fn(&[UrlSegment], &UrlSegmentGroup, &Route) -> Option<UrlMatchResult> + Send + Sync>;

/// What a redirect function sees of the route being redirected.
#[derive(Debug, Clone)]
pub struct RedirectContext {
	pub params: Params,
	pub data: Data,
	pub query_params: QueryParams,
	pub fragment: Option<String>,
	pub url: Vec<UrlSegment>,
	pub outlet: String,
}

/// The value a redirect function produces.
#[derive(Debug, Clone, PartialEq)]
pub enum RedirectTarget {
	/// A redirect template, relative or absolute.
	Path(String),
	/// An absolute target tree.
	Tree(UrlTree),
	/// Cancel the navigation and re-navigate with the command's behavior.
	Command(RedirectCommand),
}

impl From<&str> for RedirectTarget {
	fn from(path: &str) -> Self {
		Self::Path(path.to_string())
	}
}

impl From<String> for RedirectTarget {
	fn from(path: String) -> Self {
		Self::Path(path)
	}
}

impl From<UrlTree> for RedirectTarget {
	fn from(tree: UrlTree) -> Self {
		Self::Tree(tree)
	}
}

impl From<RedirectCommand> for RedirectTarget {
	fn from(command: RedirectCommand) -> Self {
		Self::Command(command)
	}
}

pub type RedirectFn = Arc<dyn Fn(RedirectContext) -> BoxFuture<'static, anyhow::Result<RedirectTarget>> + Send + Sync>;

/// Where a matched route redirects to.
#[derive(Clone)]
pub enum RedirectTo {
	/// A path template such as `/user/:id` or `../list`.
	Template(String),
	/// A function computing the target at match time.
	Function(RedirectFn),
}

impl fmt::Debug for RedirectTo {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Template(template) => f.debug_tuple("Template").field(template).finish(),
			Self::Function(_) => f.write_str("Function(..)"),
		}
	}
}

/// Routes returned by a lazy child loader.
#[derive(Debug, Default)]
pub struct LoadedRoutes {
	pub routes: Vec<Route>,
	pub context: Option<InjectionContext>,
}

impl From<Vec<Route>> for LoadedRoutes {
	fn from(routes: Vec<Route>) -> Self {
		Self { routes, context: None }
	}
}

pub type LoadChildrenFn = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<LoadedRoutes>> + Send + Sync>;

/// Custom predicate deciding whether guards and resolvers re-run on a
/// reused route: `(current, future)`.
pub type RunGuardsFn = Arc<dyn Fn(&ActivatedRouteSnapshot, &ActivatedRouteSnapshot) -> bool + Send + Sync>;

/// When guards and resolvers re-run for a route that is being reused.
#[derive(Clone, Default)]
pub enum RunGuardsAndResolvers {
	/// Path or matrix parameters changed.
	#[default]
	ParamsChange,
	/// Path segments changed, ignoring matrix parameters.
	PathParamsChange,
	PathParamsOrQueryParamsChange,
	ParamsOrQueryParamsChange,
	Always,
	Custom(RunGuardsFn),
}

impl fmt::Debug for RunGuardsAndResolvers {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Self::ParamsChange => "ParamsChange",
			Self::PathParamsChange => "PathParamsChange",
			Self::PathParamsOrQueryParamsChange => "PathParamsOrQueryParamsChange",
			Self::ParamsOrQueryParamsChange => "ParamsOrQueryParamsChange",
			Self::Always => "Always",
			Self::Custom(_) => "Custom(..)",
		};
		f.write_str(name)
	}
}

/// A route title.
#[derive(Clone)]
pub enum RouteTitle {
	Static(String),
	/// Resolved like any other resolver and stored under [`ROUTE_TITLE_KEY`].
	Resolved(Arc<dyn Resolve>),
}

impl fmt::Debug for RouteTitle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Static(title) => f.debug_tuple("Static").field(title).finish(),
			Self::Resolved(_) => f.write_str("Resolved(..)"),
		}
	}
}

/// A single route definition.
#[derive(Clone)]
pub struct Route {
	id: RouteId,
	path: String,
	path_match: Option<PathMatch>,
	matcher: Option<UrlMatcher>,
	component: Option<ComponentType>,
	redirect_to: Option<RedirectTo>,
	outlet: Option<String>,
	children: Option<Vec<Arc<Route>>>,
	load_children: Option<LoadChildrenFn>,
	data: Data,
	resolve: BTreeMap<String, Arc<dyn Resolve>>,
	title: Option<RouteTitle>,
	can_activate: Vec<Arc<dyn CanActivate>>,
	can_activate_child: Vec<Arc<dyn CanActivateChild>>,
	can_deactivate: Vec<Arc<dyn CanDeactivate>>,
	can_match: Vec<Arc<dyn CanMatch>>,
	can_load: Vec<Arc<dyn CanLoad>>,
	run_guards_and_resolvers: RunGuardsAndResolvers,
}

impl fmt::Debug for Route {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Route")
			.field("id", &self.id)
			.field("path", &self.path)
			.field("path_match", &self.path_match)
			.field("component", &self.component)
			.field("redirect_to", &self.redirect_to)
			.field("outlet", &self.outlet)
			.field("children", &self.children)
			.field("has_load_children", &self.load_children.is_some())
			.field("data", &self.data)
			.field("resolve", &self.resolve.keys().collect::<Vec<_>>())
			.field("title", &self.title)
			.field("can_activate", &self.can_activate.len())
			.field("can_activate_child", &self.can_activate_child.len())
			.field("can_deactivate", &self.can_deactivate.len())
			.field("can_match", &self.can_match.len())
			.field("can_load", &self.can_load.len())
			.finish()
	}
}

impl Route {
	/// Creates a route matching `path`, e.g. `team/:id`, `""` or `**`.
	pub fn new(path: impl Into<String>) -> Self {
		Self {
			id: RouteId::next(),
			path: path.into(),
			path_match: None,
			matcher: None,
			component: None,
			redirect_to: None,
			outlet: None,
			children: None,
			load_children: None,
			data: Data::new(),
			resolve: BTreeMap::new(),
			title: None,
			can_activate: Vec::new(),
			can_activate_child: Vec::new(),
			can_deactivate: Vec::new(),
			can_match: Vec::new(),
			can_load: Vec::new(),
			run_guards_and_resolvers: RunGuardsAndResolvers::default(),
		}
	}

	/// Creates a route matched by a custom matcher instead of a path.
	pub fn with_matcher<F>(matcher: F) -> Self
	where
		F: Fn(&[UrlSegment], &UrlSegmentGroup, &Route) -> Option<UrlMatchResult> + Send + Sync + 'static,
	{
		let mut route = Self::new("");
		route.matcher = Some(Arc::new(matcher));
		route
	}

	pub fn path_match(mut self, path_match: PathMatch) -> Self {
		self.path_match = Some(path_match);
		self
	}

	pub fn component(mut self, component: impl Into<ComponentType>) -> Self {
		self.component = Some(component.into());
		self
	}

	/// Redirects to a path template. Templates starting with `/` are absolute.
	pub fn redirect_to(mut self, template: impl Into<String>) -> Self {
		self.redirect_to = Some(RedirectTo::Template(template.into()));
		self
	}

	/// Redirects to whatever `redirect` computes when the route matches.
	pub fn redirect_to_fn<F, Fut>(mut self, redirect: F) -> Self
	where
		F: Fn(RedirectContext) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = anyhow::Result<RedirectTarget>> + Send + 'static,
	{
		self.redirect_to = Some(RedirectTo::Function(Arc::new(move |context| redirect(context).boxed())));
		self
	}

	pub fn outlet(mut self, outlet: impl Into<String>) -> Self {
		self.outlet = Some(outlet.into());
		self
	}

	pub fn children(mut self, children: Vec<Route>) -> Self {
		self.children = Some(children.into_iter().map(Arc::new).collect());
		self
	}

	/// Loads the child configuration lazily the first time it is needed.
	pub fn load_children<F, Fut>(mut self, loader: F) -> Self
	where
		F: Fn() -> Fut + Send + Sync + 'static,
		Fut: Future<Output = anyhow::Result<LoadedRoutes>> + Send + 'static,
	{
		self.load_children = Some(Arc::new(move || loader().boxed()));
		self
	}

	pub fn data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		self.data.insert(key.into(), value.into());
		self
	}

	pub fn title(mut self, title: impl Into<String>) -> Self {
		self.title = Some(RouteTitle::Static(title.into()));
		self
	}

	pub fn title_resolver(mut self, resolver: impl Resolve + 'static) -> Self {
		self.title = Some(RouteTitle::Resolved(Arc::new(resolver)));
		self
	}

	pub fn can_activate<F, Fut>(self, guard: F) -> Self
	where
		F: Fn(RouteSnapshotRef, Arc<RouterStateSnapshot>) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = anyhow::Result<GuardResult>> + Send + 'static,
	{
		self.can_activate_guard(guard)
	}

	pub fn can_activate_guard(mut self, guard: impl CanActivate + 'static) -> Self {
		self.can_activate.push(Arc::new(guard));
		self
	}

	pub fn can_activate_child<F, Fut>(self, guard: F) -> Self
	where
		F: Fn(RouteSnapshotRef, Arc<RouterStateSnapshot>) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = anyhow::Result<GuardResult>> + Send + 'static,
	{
		self.can_activate_child_guard(guard)
	}

	pub fn can_activate_child_guard(mut self, guard: impl CanActivateChild + 'static) -> Self {
		self.can_activate_child.push(Arc::new(guard));
		self
	}

	pub fn can_deactivate<F, Fut>(self, guard: F) -> Self
	where
		F: Fn(Option<ComponentHandle>, RouteSnapshotRef, Arc<RouterStateSnapshot>, Arc<RouterStateSnapshot>) -> Fut
			+ Send
			+ Sync
			+ 'static,
		Fut: Future<Output = anyhow::Result<GuardResult>> + Send + 'static,
	{
		self.can_deactivate_guard(guard)
	}

	pub fn can_deactivate_guard(mut self, guard: impl CanDeactivate + 'static) -> Self {
		self.can_deactivate.push(Arc::new(guard));
		self
	}

	pub fn can_match<F, Fut>(self, guard: F) -> Self
	where
		F: Fn(Arc<Route>, Vec<UrlSegment>) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = anyhow::Result<GuardResult>> + Send + 'static,
	{
		self.can_match_guard(guard)
	}

	pub fn can_match_guard(mut self, guard: impl CanMatch + 'static) -> Self {
		self.can_match.push(Arc::new(guard));
		self
	}

	pub fn can_load<F, Fut>(self, guard: F) -> Self
	where
		F: Fn(Arc<Route>, Vec<UrlSegment>) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = anyhow::Result<GuardResult>> + Send + 'static,
	{
		self.can_load_guard(guard)
	}

	pub fn can_load_guard(mut self, guard: impl CanLoad + 'static) -> Self {
		self.can_load.push(Arc::new(guard));
		self
	}

	/// Registers a resolver whose value lands in `data[key]`.
	pub fn resolve<F, Fut>(self, key: impl Into<String>, resolver: F) -> Self
	where
		F: Fn(RouteSnapshotRef, Arc<RouterStateSnapshot>) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = anyhow::Result<ResolveResult>> + Send + 'static,
	{
		self.resolve_with(key, resolver)
	}

	pub fn resolve_with(mut self, key: impl Into<String>, resolver: impl Resolve + 'static) -> Self {
		self.resolve.insert(key.into(), Arc::new(resolver));
		self
	}

	pub fn run_guards_and_resolvers(mut self, mode: RunGuardsAndResolvers) -> Self {
		self.run_guards_and_resolvers = mode;
		self
	}

	pub fn id(&self) -> RouteId {
		self.id
	}

	pub fn path(&self) -> &str {
		&self.path
	}

	/// Effective match mode. Empty-path redirects match in full unless set
	/// explicitly, so `{path: "", redirectTo: ...}` does not swallow every URL.
	pub fn effective_path_match(&self) -> PathMatch {
		match self.path_match {
			Some(path_match) => path_match,
			None if self.path.is_empty() && self.redirect_to.is_some() => PathMatch::Full,
			None => PathMatch::Prefix,
		}
	}

	pub fn matcher(&self) -> Option<&UrlMatcher> {
		self.matcher.as_ref()
	}

	pub fn component_type(&self) -> Option<&ComponentType> {
		self.component.as_ref()
	}

	pub fn redirect(&self) -> Option<&RedirectTo> {
		self.redirect_to.as_ref()
	}

	/// Outlet name, `primary` when unset.
	pub fn outlet_name(&self) -> &str {
		self.outlet.as_deref().unwrap_or(PRIMARY_OUTLET)
	}

	pub fn child_routes(&self) -> Option<&[Arc<Route>]> {
		self.children.as_deref()
	}

	pub fn loader(&self) -> Option<&LoadChildrenFn> {
		self.load_children.as_ref()
	}

	pub fn has_load_children(&self) -> bool {
		self.load_children.is_some()
	}

	pub fn static_data(&self) -> &Data {
		&self.data
	}

	pub fn resolvers(&self) -> &BTreeMap<String, Arc<dyn Resolve>> {
		&self.resolve
	}

	pub fn route_title(&self) -> Option<&RouteTitle> {
		self.title.as_ref()
	}

	pub fn static_title(&self) -> Option<&str> {
		match &self.title {
			Some(RouteTitle::Static(title)) => Some(title),
			_ => None,
		}
	}

	pub fn can_activate_guards(&self) -> &[Arc<dyn CanActivate>] {
		&self.can_activate
	}

	pub fn can_activate_child_guards(&self) -> &[Arc<dyn CanActivateChild>] {
		&self.can_activate_child
	}

	pub fn can_deactivate_guards(&self) -> &[Arc<dyn CanDeactivate>] {
		&self.can_deactivate
	}

	pub fn can_match_guards(&self) -> &[Arc<dyn CanMatch>] {
		&self.can_match
	}

	pub fn can_load_guards(&self) -> &[Arc<dyn CanLoad>] {
		&self.can_load
	}

	pub fn guards_and_resolvers_mode(&self) -> &RunGuardsAndResolvers {
		&self.run_guards_and_resolvers
	}

	/// True when both values are the same configured route.
	pub fn same_config(&self, other: &Route) -> bool {
		self.id == other.id
	}
}

/// Checks a route configuration for structural mistakes.
///
/// Runs once when the router is built or reconfigured, and on every lazily
/// loaded child configuration.
pub fn validate_config(routes: &[Arc<Route>], parent_path: &str) -> RouterResult<()> {
	for route in routes {
		let full_path = full_path(parent_path, route);
		validate_node(route, &full_path)?;
		if let Some(children) = route.child_routes() {
			validate_config(children, &full_path)?;
		}
	}
	Ok(())
}

fn validate_node(route: &Route, full_path: &str) -> RouterResult<()> {
	let invalid = |reason: &str| RouterError::InvalidConfig {
		path: full_path.to_string(),
		reason: reason.to_string(),
	};

	if route.path.starts_with('/') {
		return Err(invalid("path cannot start with a slash"));
	}
	if route.redirect_to.is_some() {
		if route.children.is_some() {
			return Err(invalid("redirectTo and children cannot be used together"));
		}
		if route.load_children.is_some() {
			return Err(invalid("redirectTo and loadChildren cannot be used together"));
		}
		if route.component.is_some() {
			return Err(invalid("redirectTo and component cannot be used together"));
		}
		if !route.can_activate.is_empty() {
			return Err(invalid("redirectTo and canActivate cannot be used together"));
		}
	}
	if route.children.is_some() && route.load_children.is_some() {
		return Err(invalid("children and loadChildren cannot be used together"));
	}
	if route.redirect_to.is_none()
		&& route.component.is_none()
		&& route.children.is_none()
		&& route.load_children.is_none()
	{
		return Err(invalid(
			"one of the following must be provided: component, redirectTo, children or loadChildren",
		));
	}
	if route.component.is_none()
		&& route.outlet_name() != PRIMARY_OUTLET
		&& route.children.is_none()
		&& route.load_children.is_none()
		&& route.redirect_to.is_none()
	{
		return Err(invalid("a componentless route in a named outlet must have children"));
	}
	Ok(())
}

fn full_path(parent_path: &str, route: &Route) -> String {
	if parent_path.is_empty() {
		route.path.clone()
	} else if route.path.is_empty() {
		parent_path.to_string()
	} else {
		format!("{}/{}", parent_path, route.path)
	}
}
