//! The router facade.
//!
//! [`Router`] ties the collaborators together: it owns the route
//! configuration, the committed state and the event stream, and turns
//! `navigate` calls into navigations run by the transition pipeline.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};
use reinhardt_url_tree::{
	Command, DefaultUrlSerializer, IsActiveMatchOptions, UrlSerializer, UrlTree, UrlTreeError, contains_tree,
	create_url_tree,
};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::activated_route::{RouterState, create_empty_state};
use crate::config::{ComponentType, Route, validate_config};
use crate::error::{RouterError, RouterResult};
use crate::events::{EventBus, RouterEvent};
use crate::guards::RedirectCommand;
use crate::host::{NoopOutletHost, OutletHost};
use crate::loader::{ConfigLoader, DefaultConfigLoader, RouterConfigLoader};
use crate::location::{Location, MemoryLocation, PopStateEvent};
use crate::navigation::{
	NavigationBehaviorOptions, NavigationExtras, NavigationInfo, NavigationTrigger, PendingNavigation,
	QueryParamsHandling, RestoredState,
};
use crate::options::RouterOptions;
use crate::recognize::segment_group_of;
use crate::reuse::{DefaultRouteReuseStrategy, RouteReuseStrategy};
use crate::state_manager::{NAVIGATION_ID_KEY, StateManager};
use crate::transition::{NavigationRequest, Transitions, schedule_navigation};
use crate::tree::NodeId;
use crate::url_handling::{DefaultUrlHandlingStrategy, UrlHandlingStrategy};

/// What a failed navigation turns into.
#[derive(Debug, Clone)]
pub enum NavigationErrorResolution {
	/// Emit `NavigationError` and reject the navigation promise.
	Rethrow,
	/// Emit `NavigationError` and resolve the promise with the value.
	Resolve(bool),
	/// Cancel with code `Redirect` and navigate to the command's URL instead.
	Redirect(RedirectCommand),
}

/// Decides how an unexpected navigation failure is surfaced.
pub type NavigationErrorHandler = Arc<dyn Fn(&RouterError, &NavigationInfo) -> NavigationErrorResolution + Send + Sync>;

/// Produces the tree used when a URL string cannot be parsed.
pub type MalformedUriHandler = Arc<dyn Fn(&UrlTreeError, &dyn UrlSerializer, &str) -> UrlTree + Send + Sync>;

pub(crate) struct RouterInner {
	pub(crate) options: RouterOptions,
	pub(crate) config: RwLock<Arc<[Arc<Route>]>>,
	pub(crate) host: Arc<dyn OutletHost>,
	pub(crate) location: Arc<dyn Location>,
	pub(crate) reuse: Arc<dyn RouteReuseStrategy>,
	pub(crate) url_handling: Arc<dyn UrlHandlingStrategy>,
	pub(crate) serializer: Arc<dyn UrlSerializer>,
	pub(crate) loader: RouterConfigLoader,
	pub(crate) error_handler: Option<NavigationErrorHandler>,
	pub(crate) malformed_uri_handler: MalformedUriHandler,
	pub(crate) root_component: Option<ComponentType>,
	pub(crate) events: EventBus,
	pub(crate) state: Mutex<StateManager>,
	pub(crate) transitions: Mutex<Transitions>,
	listening: AtomicBool,
}

impl RouterInner {
	fn parse_url(&self, url: &str) -> UrlTree {
		self.serializer.parse(url).unwrap_or_else(|error| {
			tracing::warn!(url, error = %error, "malformed URL");
			(self.malformed_uri_handler)(&error, self.serializer.as_ref(), url)
		})
	}
}

fn root_url(_error: &UrlTreeError, _serializer: &dyn UrlSerializer, _url: &str) -> UrlTree {
	UrlTree::default()
}

/// Builder for [`Router`].
pub struct RouterBuilder {
	routes: Vec<Route>,
	options: RouterOptions,
	host: Arc<dyn OutletHost>,
	location: Option<Arc<dyn Location>>,
	reuse: Arc<dyn RouteReuseStrategy>,
	url_handling: Arc<dyn UrlHandlingStrategy>,
	serializer: Arc<dyn UrlSerializer>,
	config_loader: Arc<dyn ConfigLoader>,
	error_handler: Option<NavigationErrorHandler>,
	malformed_uri_handler: Option<MalformedUriHandler>,
	root_component: Option<ComponentType>,
}

impl fmt::Debug for RouterBuilder {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RouterBuilder")
			.field("routes", &self.routes.len())
			.field("options", &self.options)
			.field("has_location", &self.location.is_some())
			.field("has_error_handler", &self.error_handler.is_some())
			.field("root_component", &self.root_component)
			.finish()
	}
}

impl RouterBuilder {
	fn new(routes: Vec<Route>) -> Self {
		Self {
			routes,
			options: RouterOptions::default(),
			host: Arc::new(NoopOutletHost),
			location: None,
			reuse: Arc::new(DefaultRouteReuseStrategy),
			url_handling: Arc::new(DefaultUrlHandlingStrategy),
			serializer: Arc::new(DefaultUrlSerializer),
			config_loader: Arc::new(DefaultConfigLoader),
			error_handler: None,
			malformed_uri_handler: None,
			root_component: None,
		}
	}

	pub fn options(mut self, options: RouterOptions) -> Self {
		self.options = options;
		self
	}

	pub fn outlet_host(mut self, host: Arc<dyn OutletHost>) -> Self {
		self.host = host;
		self
	}

	/// Defaults to a fresh [`MemoryLocation`] at `/`.
	pub fn location(mut self, location: Arc<dyn Location>) -> Self {
		self.location = Some(location);
		self
	}

	pub fn reuse_strategy(mut self, strategy: Arc<dyn RouteReuseStrategy>) -> Self {
		self.reuse = strategy;
		self
	}

	pub fn url_handling_strategy(mut self, strategy: Arc<dyn UrlHandlingStrategy>) -> Self {
		self.url_handling = strategy;
		self
	}

	pub fn serializer(mut self, serializer: Arc<dyn UrlSerializer>) -> Self {
		self.serializer = serializer;
		self
	}

	pub fn config_loader(mut self, loader: Arc<dyn ConfigLoader>) -> Self {
		self.config_loader = loader;
		self
	}

	pub fn error_handler<F>(mut self, handler: F) -> Self
	where
		F: Fn(&RouterError, &NavigationInfo) -> NavigationErrorResolution + Send + Sync + 'static,
	{
		self.error_handler = Some(Arc::new(handler));
		self
	}

	/// Defaults to the root URL `/`.
	pub fn malformed_uri_handler<F>(mut self, handler: F) -> Self
	where
		F: Fn(&UrlTreeError, &dyn UrlSerializer, &str) -> UrlTree + Send + Sync + 'static,
	{
		self.malformed_uri_handler = Some(Arc::new(handler));
		self
	}

	/// Overrides [`RouterOptions::root_component`].
	pub fn root_component(mut self, component: impl Into<ComponentType>) -> Self {
		self.root_component = Some(component.into());
		self
	}

	/// Validates the route configuration and creates the router.
	pub fn build(self) -> RouterResult<Router> {
		let config: Arc<[Arc<Route>]> = self.routes.into_iter().map(Arc::new).collect();
		validate_config(&config, "")?;

		let root_component = self
			.root_component
			.or_else(|| self.options.root_component.as_deref().map(ComponentType::new));
		let events = EventBus::new(self.options.event_buffer);
		let url_tree = UrlTree::default();
		let state = StateManager::new(url_tree.clone(), create_empty_state(&url_tree, root_component.clone()));

		let inner = RouterInner {
			loader: RouterConfigLoader::new(self.config_loader, events.clone()),
			options: self.options,
			config: RwLock::new(config),
			host: self.host,
			location: self.location.unwrap_or_else(|| Arc::new(MemoryLocation::new("/"))),
			reuse: self.reuse,
			url_handling: self.url_handling,
			serializer: self.serializer,
			error_handler: self.error_handler,
			malformed_uri_handler: self.malformed_uri_handler.unwrap_or_else(|| Arc::new(root_url)),
			root_component,
			events,
			state: Mutex::new(state),
			transitions: Mutex::new(Transitions::default()),
			listening: AtomicBool::new(false),
		};
		Ok(Router { inner: Arc::new(inner) })
	}
}

/// A client-side navigation router.
///
/// Cloning is cheap; clones drive the same router.
///
/// # Examples
///
/// ```
/// use reinhardt_router::{NavigationBehaviorOptions, Route, Router};
///
/// # tokio_test::block_on(async {
/// let router = Router::builder(vec![Route::new("team/:id").component("Team")])
/// 	.build()
/// 	.unwrap();
///
/// let committed = router
/// 	.navigate_by_url("/team/33", NavigationBehaviorOptions::default())
/// 	.await
/// 	.unwrap();
///
/// assert!(committed);
/// assert_eq!(router.url(), "/team/33");
/// # });
/// ```
#[derive(Clone)]
pub struct Router {
	inner: Arc<RouterInner>,
}

impl fmt::Debug for Router {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Router")
			.field("url", &self.url())
			.field("navigated", &self.navigated())
			.field("routes", &self.inner.config.read().len())
			.finish()
	}
}

impl Router {
	pub fn builder(routes: Vec<Route>) -> RouterBuilder {
		RouterBuilder::new(routes)
	}

	pub fn options(&self) -> &RouterOptions {
		&self.inner.options
	}

	/// Subscribes to router events.
	pub fn events(&self) -> broadcast::Receiver<RouterEvent> {
		self.inner.events.subscribe()
	}

	pub fn config(&self) -> Arc<[Arc<Route>]> {
		Arc::clone(&self.inner.config.read())
	}

	/// Replaces the route configuration used by later navigations.
	pub fn reset_config(&self, routes: Vec<Route>) -> RouterResult<()> {
		let config: Arc<[Arc<Route>]> = routes.into_iter().map(Arc::new).collect();
		validate_config(&config, "")?;
		*self.inner.config.write() = config;
		Ok(())
	}

	/// The committed URL, serialized.
	pub fn url(&self) -> String {
		self.inner.serializer.serialize(self.inner.state.lock().current_url_tree())
	}

	pub fn url_tree(&self) -> UrlTree {
		self.inner.state.lock().current_url_tree().clone()
	}

	pub fn router_state(&self) -> RouterState {
		self.inner.state.lock().router_state().clone()
	}

	/// Whether at least one navigation has committed.
	pub fn navigated(&self) -> bool {
		self.inner.state.lock().navigated()
	}

	/// The navigation that is running right now, if any.
	pub fn current_navigation(&self) -> Option<NavigationInfo> {
		self.inner.transitions.lock().current_navigation()
	}

	pub fn last_successful_navigation(&self) -> Option<NavigationInfo> {
		self.inner.state.lock().last_successful_navigation().cloned()
	}

	/// Parses a URL, falling back to the malformed-URI handler on bad input.
	pub fn parse_url(&self, url: &str) -> UrlTree {
		self.inner.parse_url(url)
	}

	pub fn serialize_url(&self, url: &UrlTree) -> String {
		self.inner.serializer.serialize(url)
	}

	/// Whether `url` is active in the committed URL.
	pub fn is_active(&self, url: &UrlTree, options: &IsActiveMatchOptions) -> bool {
		contains_tree(self.inner.state.lock().current_url_tree(), url, options)
	}

	/// Applies navigation commands to the committed URL.
	///
	/// Commands are applied relative to `extras.relative_to` when set, else
	/// to the root.
	pub fn create_url_tree(&self, commands: &[Command], extras: &NavigationExtras) -> RouterResult<UrlTree> {
		let current = self.url_tree();
		let query_params = match extras.query_params_handling.unwrap_or_default() {
			QueryParamsHandling::Replace => extras.query_params.clone().unwrap_or_default(),
			QueryParamsHandling::Preserve => current.query_params.clone(),
			QueryParamsHandling::Merge => {
				let mut merged = current.query_params.clone();
				merged.extend(extras.query_params.clone().unwrap_or_default());
				merged
			}
		};
		let fragment = if extras.preserve_fragment {
			current.fragment.clone()
		} else {
			extras.fragment.clone()
		};

		let tree = match &extras.relative_to {
			None => create_url_tree(&current.root, &[], commands, query_params, fragment)?,
			Some(route) => {
				let snapshot = route.snapshot();
				let outlets: Vec<String> = snapshot
					.path_from_root()
					.iter()
					.skip(1)
					.map(|node| node.outlet().to_string())
					.collect();
				let root = segment_group_of(snapshot.state().tree(), NodeId::ROOT);
				create_url_tree(&root, &outlets, commands, query_params, fragment)?
			}
		};
		Ok(tree)
	}

	/// Navigates with dynamic commands such as `["team", 33, {"details": true}]`.
	///
	/// Fails without starting a navigation when a command is `null` or
	/// cannot be applied to the current URL.
	pub fn navigate(&self, commands: &[Value], extras: NavigationExtras) -> RouterResult<PendingNavigation> {
		let commands = Command::from_values(commands)?;
		self.navigate_commands(&commands, extras)
	}

	pub fn navigate_commands(&self, commands: &[Command], extras: NavigationExtras) -> RouterResult<PendingNavigation> {
		let url = self.create_url_tree(commands, &extras)?;
		Ok(self.navigate_by_tree(url, extras.behavior))
	}

	pub fn navigate_by_url(&self, url: &str, behavior: NavigationBehaviorOptions) -> PendingNavigation {
		let url = self.parse_url(url);
		self.navigate_by_tree(url, behavior)
	}

	pub fn navigate_by_tree(&self, url: UrlTree, behavior: NavigationBehaviorOptions) -> PendingNavigation {
		let raw_url = {
			let state = self.inner.state.lock();
			self.inner.url_handling.merge(&url, state.raw_url_tree())
		};
		schedule_navigation(
			&self.inner,
			NavigationRequest {
				raw_url,
				trigger: NavigationTrigger::Imperative,
				restored_state: None,
				behavior,
			},
		)
	}

	/// Starts listening to location changes and navigates to the location's
	/// current path.
	///
	/// # Panics
	///
	/// Panics if called outside a Tokio runtime, since navigations run as
	/// spawned tasks.
	pub fn initial_navigation(&self) -> PendingNavigation {
		self.listen_to_location();
		let path = self.inner.location.path();
		self.navigate_by_url(&path, NavigationBehaviorOptions::default().replace_url())
	}

	fn listen_to_location(&self) {
		if self.inner.listening.swap(true, Ordering::SeqCst) {
			return;
		}
		let weak = Arc::downgrade(&self.inner);
		self.inner.location.subscribe(Arc::new(move |event: PopStateEvent| {
			let Some(inner) = weak.upgrade() else {
				return;
			};
			tracing::debug!(url = %event.url, "popstate");
			let raw_url = inner.parse_url(&event.url);
			let restored_state = event
				.state
				.get(NAVIGATION_ID_KEY)
				.and_then(Value::as_u64)
				.map(|navigation_id| RestoredState {
					navigation_id,
					state: event.state.clone(),
				});
			let mut behavior = NavigationBehaviorOptions::default().replace_url();
			if let Value::Object(mut state) = event.state {
				state.remove(NAVIGATION_ID_KEY);
				if !state.is_empty() {
					behavior = behavior.with_state(Value::Object(state));
				}
			}
			let _ = schedule_navigation(
				&inner,
				NavigationRequest {
					raw_url,
					trigger: NavigationTrigger::Popstate,
					restored_state,
					behavior,
				},
			);
		}));
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use reinhardt_url_tree::QueryValue;
	use rstest::*;
	use serde_json::json;

	#[fixture]
	fn router() -> Router {
		Router::builder(vec![Route::new("team/:id").component("Team")]).build().unwrap()
	}

	#[rstest]
	fn test_build_rejects_invalid_config() {
		let result = Router::builder(vec![Route::new("/team").component("Team")]).build();

		assert!(matches!(result, Err(RouterError::InvalidConfig { .. })));
	}

	#[rstest]
	fn test_parse_url_falls_back_to_root(router: Router) {
		let tree = router.parse_url("/team(aux:chat");

		assert_eq!(tree, UrlTree::default());
	}

	#[rstest]
	fn test_custom_malformed_uri_handler_is_used() {
		let router = Router::builder(Vec::new())
			.malformed_uri_handler(|_, serializer, _| serializer.parse("/error").unwrap_or_default())
			.build()
			.unwrap();

		assert_eq!(router.serialize_url(&router.parse_url("/a?q=%zz")), "/error");
	}

	#[rstest]
	fn test_navigate_fails_fast_on_null_command(router: Router) {
		let result = router.navigate(&[json!("team"), Value::Null], NavigationExtras::default());

		assert!(matches!(result, Err(RouterError::Command(_))));
	}

	#[rstest]
	fn test_create_url_tree_handles_query_params(router: Router) {
		let mut query_params = reinhardt_url_tree::QueryParams::new();
		query_params.insert("page".into(), QueryValue::Single("2".into()));
		let extras = NavigationExtras::default()
			.query_params(query_params)
			.fragment("top");

		let tree = router
			.create_url_tree(&Command::from_values(&[json!("/team"), json!(33)]).unwrap(), &extras)
			.unwrap();

		assert_eq!(router.serialize_url(&tree), "/team/33?page=2#top");
	}

	#[rstest]
	fn test_reset_config_validates(router: Router) {
		assert!(router.reset_config(vec![Route::new("x").redirect_to("/y").component("X")]).is_err());
		assert_eq!(router.config().len(), 1);

		router
			.reset_config(vec![Route::new("a").component("A"), Route::new("b").component("B")])
			.unwrap();

		assert_eq!(router.config().len(), 2);
	}
}
