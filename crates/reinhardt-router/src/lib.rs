//! Client-side navigation router for Reinhardt.
//!
//! Maps URLs onto a tree of routed components. A navigation parses the
//! target URL, applies redirects, matches it against the [`Route`]
//! configuration, runs guards and resolvers, reconciles the result with the
//! routes already on screen, and finally activates the new state through an
//! [`OutletHost`].
//!
//! ## Pipeline
//!
//! ```text
//! NavigationStart -> RoutesRecognized -> GuardsCheckStart -> GuardsCheckEnd
//!   -> ResolveStart -> ResolveEnd -> (activation) -> NavigationEnd
//! ```
//!
//! A navigation ends with exactly one of `NavigationEnd`, `NavigationCancel`,
//! `NavigationError` or `NavigationSkipped` on the [`Router::events`] stream.
//! Starting a new navigation cancels the one in flight.
//!
//! ## Example
//!
//! ```
//! use reinhardt_router::{NavigationExtras, Route, Router};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let router = Router::builder(vec![
//! 	Route::new("").redirect_to("/home"),
//! 	Route::new("home").component("Home"),
//! 	Route::new("team/:id").component("Team"),
//! ])
//! .build()
//! .unwrap();
//!
//! assert!(router.navigate(&[json!("/")], NavigationExtras::default()).unwrap().await.unwrap());
//! assert_eq!(router.url(), "/home");
//!
//! router.navigate(&[json!("/team"), json!(33)], NavigationExtras::default()).unwrap().await.unwrap();
//! let team = router.router_state().leaf().snapshot();
//! assert_eq!(team.param("id"), Some("33"));
//! # });
//! ```

pub mod activate;
pub mod activated_route;
mod check_guards;
pub mod config;
pub mod error;
pub mod events;
pub mod guards;
pub mod host;
pub mod loader;
pub mod location;
pub mod matcher;
pub mod navigation;
pub mod options;
mod recognize;
mod redirects;
mod resolve;
pub mod reuse;
pub mod router;
pub mod snapshot;
mod state_manager;
mod transition;
pub mod tree;
pub mod url_handling;

pub use activate::{ActivationPlan, ActivationStep};
pub use activated_route::{ActivatedRoute, RouterState};
pub use config::{
	ComponentType, Data, LoadChildrenFn, LoadedRoutes, PathMatch, ROUTE_TITLE_KEY, RedirectContext, RedirectFn,
	RedirectTarget, RedirectTo, Route, RouteId, RouteTitle, RunGuardsAndResolvers, RunGuardsFn, UrlMatchResult,
	UrlMatcher, validate_config,
};
pub use error::{NavigationCanceling, NavigationCancellationCode, NavigationSkippedCode, RouterError, RouterResult};
pub use events::{EventBus, RouterEvent};
pub use guards::{
	CanActivate, CanActivateChild, CanDeactivate, CanLoad, CanMatch, GuardResult, RedirectCommand, Resolve,
	ResolveResult,
};
pub use host::{ComponentHandle, InjectionContext, NoopOutletHost, OutletHost};
pub use loader::{ConfigLoader, DefaultConfigLoader};
pub use location::{Location, MemoryLocation, PopStateEvent, PopStateListener};
pub use matcher::default_url_matcher;
pub use navigation::{
	NavigationBehaviorOptions, NavigationExtras, NavigationInfo, NavigationTrigger, PendingNavigation,
	QueryParamsHandling, RestoredState,
};
pub use options::{OnSameUrlNavigation, ParamsInheritanceStrategy, RouterOptions, UrlUpdateStrategy};
pub use reuse::{DefaultRouteReuseStrategy, DetachedRouteHandle, RouteReuseStrategy, StoredRouteReuseStrategy};
pub use router::{MalformedUriHandler, NavigationErrorHandler, NavigationErrorResolution, Router, RouterBuilder};
pub use snapshot::{ActivatedRouteSnapshot, RouteSnapshotRef, RouterStateSnapshot};
pub use tree::{NodeId, Tree};
pub use url_handling::{DefaultUrlHandlingStrategy, UrlHandlingStrategy};

pub use reinhardt_url_tree as url_tree;
