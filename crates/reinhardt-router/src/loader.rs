//! Lazy loading of child route configurations.
//!
//! Loads are keyed by [`RouteId`]: a route's children are loaded at most once,
//! and concurrent navigations that need the same children share one in-flight
//! load.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;

use crate::config::{LoadedRoutes, Route, RouteId, validate_config};
use crate::error::{RouterError, RouterResult};
use crate::events::{EventBus, RouterEvent};
use crate::host::InjectionContext;

/// Produces the children of a route configured with `load_children`.
#[async_trait]
pub trait ConfigLoader: Send + Sync {
	/// Loads the children of `route`. `parent` is the context the route
	/// itself was loaded in, if any.
	async fn load(&self, parent: Option<InjectionContext>, route: Arc<Route>) -> anyhow::Result<LoadedRoutes>;
}

/// Calls the route's own `load_children` function.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultConfigLoader;

#[async_trait]
impl ConfigLoader for DefaultConfigLoader {
	async fn load(&self, parent: Option<InjectionContext>, route: Arc<Route>) -> anyhow::Result<LoadedRoutes> {
		let Some(loader) = route.loader() else {
			return Ok(LoadedRoutes::default());
		};
		let mut loaded = loader().await?;
		if loaded.context.is_none() {
			loaded.context = parent;
		}
		Ok(loaded)
	}
}

/// A loaded child configuration.
#[derive(Debug, Clone)]
pub(crate) struct LoadedRouterConfig {
	pub routes: Vec<Arc<Route>>,
	pub context: Option<InjectionContext>,
}

type InFlight = Shared<BoxFuture<'static, RouterResult<LoadedRouterConfig>>>;

struct LoaderInner {
	loader: Arc<dyn ConfigLoader>,
	events: EventBus,
	loaded: Mutex<HashMap<RouteId, LoadedRouterConfig>>,
	in_flight: Mutex<HashMap<RouteId, InFlight>>,
}

/// Caching, de-duplicating front of a [`ConfigLoader`].
#[derive(Clone)]
pub(crate) struct RouterConfigLoader {
	inner: Arc<LoaderInner>,
}

impl fmt::Debug for RouterConfigLoader {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RouterConfigLoader")
			.field("loaded", &self.inner.loaded.lock().len())
			.field("in_flight", &self.inner.in_flight.lock().len())
			.finish()
	}
}

impl RouterConfigLoader {
	pub(crate) fn new(loader: Arc<dyn ConfigLoader>, events: EventBus) -> Self {
		Self {
			inner: Arc::new(LoaderInner {
				loader,
				events,
				loaded: Mutex::new(HashMap::new()),
				in_flight: Mutex::new(HashMap::new()),
			}),
		}
	}

	/// Children already loaded for `route`.
	pub(crate) fn cached(&self, route: &Route) -> Option<LoadedRouterConfig> {
		self.inner.loaded.lock().get(&route.id()).cloned()
	}

	/// Loads the children of `route`, joining an in-flight load if there is one.
	pub(crate) async fn load_children(
		&self,
		parent: Option<InjectionContext>,
		route: Arc<Route>,
	) -> RouterResult<LoadedRouterConfig> {
		let shared = {
			// Lock order is `in_flight` then `loaded`.
			let mut in_flight = self.inner.in_flight.lock();
			if let Some(loaded) = self.cached(&route) {
				return Ok(loaded);
			}
			match in_flight.get(&route.id()) {
				Some(shared) => shared.clone(),
				None => {
					self.inner.events.emit(RouterEvent::RouteConfigLoadStart {
						route: Arc::clone(&route),
					});
					let shared = self.start(parent, Arc::clone(&route)).shared();
					in_flight.insert(route.id(), shared.clone());
					shared
				}
			}
		};
		shared.await
	}

	fn start(&self, parent: Option<InjectionContext>, route: Arc<Route>) -> BoxFuture<'static, RouterResult<LoadedRouterConfig>> {
		let inner = Arc::clone(&self.inner);
		async move {
			tracing::debug!(path = route.path(), "loading child routes");
			let result = inner
				.loader
				.load(parent, Arc::clone(&route))
				.await
				.map_err(|error| RouterError::LoadChildren {
					path: route.path().to_string(),
					error: Arc::new(error),
				})
				.and_then(|loaded| {
					let routes: Vec<Arc<Route>> = loaded.routes.into_iter().map(Arc::new).collect();
					validate_config(&routes, route.path())?;
					Ok(LoadedRouterConfig {
						routes,
						context: loaded.context,
					})
				});

			{
				// The cache entry must exist before the in-flight entry goes away.
				let mut in_flight = inner.in_flight.lock();
				if let Ok(config) = &result {
					inner.loaded.lock().insert(route.id(), config.clone());
				}
				in_flight.remove(&route.id());
			}

			let config = result?;
			inner.events.emit(RouterEvent::RouteConfigLoadEnd { route });
			Ok(config)
		}
		.boxed()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::*;
	use std::sync::atomic::{AtomicUsize, Ordering};

	fn lazy_route(calls: Arc<AtomicUsize>) -> Arc<Route> {
		Arc::new(Route::new("admin").load_children(move || {
			let calls = Arc::clone(&calls);
			async move {
				calls.fetch_add(1, Ordering::SeqCst);
				tokio::task::yield_now().await;
				Ok(LoadedRoutes::from(vec![Route::new("users").component("Users")]))
			}
		}))
	}

	#[fixture]
	fn loader() -> RouterConfigLoader {
		RouterConfigLoader::new(Arc::new(DefaultConfigLoader), EventBus::new(16))
	}

	#[rstest]
	#[tokio::test]
	async fn test_concurrent_loads_share_one_call(loader: RouterConfigLoader) {
		let calls = Arc::new(AtomicUsize::new(0));
		let route = lazy_route(Arc::clone(&calls));

		let (a, b) = tokio::join!(
			loader.load_children(None, Arc::clone(&route)),
			loader.load_children(None, Arc::clone(&route))
		);

		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert_eq!(a.unwrap().routes[0].path(), "users");
		assert_eq!(b.unwrap().routes.len(), 1);
	}

	#[rstest]
	#[tokio::test]
	async fn test_loaded_config_is_cached(loader: RouterConfigLoader) {
		let calls = Arc::new(AtomicUsize::new(0));
		let route = lazy_route(Arc::clone(&calls));

		loader.load_children(None, Arc::clone(&route)).await.unwrap();
		loader.load_children(None, Arc::clone(&route)).await.unwrap();

		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert!(loader.cached(&route).is_some());
	}

	#[rstest]
	#[tokio::test]
	async fn test_emits_load_events() {
		let events = EventBus::new(16);
		let mut receiver = events.subscribe();
		let loader = RouterConfigLoader::new(Arc::new(DefaultConfigLoader), events);

		loader
			.load_children(None, lazy_route(Arc::new(AtomicUsize::new(0))))
			.await
			.unwrap();

		assert_eq!(receiver.try_recv().unwrap().name(), "RouteConfigLoadStart");
		assert_eq!(receiver.try_recv().unwrap().name(), "RouteConfigLoadEnd");
	}

	#[rstest]
	#[tokio::test]
	async fn test_failed_load_is_retried(loader: RouterConfigLoader) {
		let calls = Arc::new(AtomicUsize::new(0));
		let counter = Arc::clone(&calls);
		let route = Arc::new(Route::new("broken").load_children(move || {
			let counter = Arc::clone(&counter);
			async move {
				counter.fetch_add(1, Ordering::SeqCst);
				Err(anyhow::anyhow!("chunk missing"))
			}
		}));

		let first = loader.load_children(None, Arc::clone(&route)).await;
		let second = loader.load_children(None, Arc::clone(&route)).await;

		assert!(matches!(first, Err(RouterError::LoadChildren { .. })));
		assert!(second.is_err());
		assert_eq!(calls.load(Ordering::SeqCst), 2);
	}

	#[rstest]
	#[tokio::test]
	async fn test_invalid_loaded_config_is_rejected(loader: RouterConfigLoader) {
		let route = Arc::new(
			Route::new("bad").load_children(|| async { Ok(LoadedRoutes::from(vec![Route::new("/abs").component("A")])) }),
		);

		let result = loader.load_children(None, route).await;

		assert!(matches!(result, Err(RouterError::InvalidConfig { .. })));
	}
}
