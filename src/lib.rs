//! # Reinhardt Navigation
//!
//! Client-side navigation for component-tree UI frameworks. A URL such as
//! `/team/33/(user/victor//aux:chat)?debug=true#top` is parsed into a tree of
//! segment groups, matched against a nested route configuration, checked by
//! guards, enriched by resolvers, and activated into outlets.
//!
//! ## Feature Flags
//!
//! - `url-tree` - URL segment trees, serializer, commands and `is_active` checks
//! - `router` (default) - The full navigation pipeline (implies `url-tree`)
//!
//! ## Quick Example
//!
//! ```
//! use reinhardt_navigation::prelude::*;
//!
//! # tokio_test::block_on(async {
//! let router = Router::builder(vec![
//! 	Route::new("").redirect_to("/home"),
//! 	Route::new("home").component("Home"),
//! ])
//! .build()
//! .unwrap();
//!
//! let mut events = router.events();
//! assert!(router.navigate_by_url("/", NavigationBehaviorOptions::default()).await.unwrap());
//! assert_eq!(router.url(), "/home");
//! assert_eq!(events.recv().await.unwrap().name(), "NavigationStart");
//! # });
//! ```

#[cfg(feature = "url-tree")]
pub use reinhardt_url_tree as url_tree;

#[cfg(feature = "router")]
pub use reinhardt_router as router;

#[cfg(feature = "url-tree")]
pub use reinhardt_url_tree::{
	Command, DefaultUrlSerializer, IsActiveMatchOptions, PRIMARY_OUTLET, UrlSegment, UrlSegmentGroup, UrlSerializer,
	UrlTree, UrlTreeError,
};

#[cfg(feature = "router")]
pub use reinhardt_router::{
	ActivatedRoute, ActivatedRouteSnapshot, GuardResult, Location, MemoryLocation, NavigationBehaviorOptions,
	NavigationExtras, OutletHost, RedirectCommand, Route, RouteReuseStrategy, Router, RouterBuilder, RouterError,
	RouterEvent, RouterOptions, RouterResult, RouterState, RouterStateSnapshot,
};

/// Commonly used types, re-exported for glob import.
pub mod prelude {
	#[cfg(feature = "url-tree")]
	pub use crate::url_tree::{
		Command, DefaultUrlSerializer, IsActiveMatchOptions, PRIMARY_OUTLET, UrlSegment, UrlSegmentGroup,
		UrlSerializer, UrlTree,
	};

	#[cfg(feature = "router")]
	pub use crate::router::{
		ActivatedRoute, ActivatedRouteSnapshot, CanActivate, CanActivateChild, CanDeactivate, CanLoad, CanMatch,
		ComponentHandle, GuardResult, Location, MemoryLocation, NavigationBehaviorOptions, NavigationExtras,
		OutletHost, PathMatch, RedirectCommand, Resolve, Route, RouteReuseStrategy, Router, RouterError, RouterEvent,
		RouterOptions, RouterResult, RouterState, RouterStateSnapshot,
	};

	// External
	#[cfg(feature = "router")]
	pub use async_trait::async_trait;
}
