//! Committed router state and its history entry.
//!
//! The manager owns the URL the router considers current, the raw URL that
//! includes parts owned by other routers, and the committed [`RouterState`].
//! A memento taken when a navigation starts lets a failed navigation roll
//! back to what was committed before it.

use reinhardt_url_tree::{UrlSerializer, UrlTree};
use serde_json::{Map, Value};

use crate::activated_route::RouterState;
use crate::location::Location;
use crate::navigation::{NavigationBehaviorOptions, NavigationInfo};
use crate::url_handling::UrlHandlingStrategy;

/// Key of the navigation id inside history state.
pub(crate) const NAVIGATION_ID_KEY: &str = "navigationId";

#[derive(Debug, Clone)]
struct StateMemento {
	router_state: RouterState,
	current_url_tree: UrlTree,
	raw_url_tree: UrlTree,
}

#[derive(Debug)]
pub(crate) struct StateManager {
	current_url_tree: UrlTree,
	raw_url_tree: UrlTree,
	router_state: RouterState,
	memento: Option<StateMemento>,
	navigated: bool,
	last_successful_id: Option<u64>,
	last_successful_navigation: Option<NavigationInfo>,
}

impl StateManager {
	pub(crate) fn new(url_tree: UrlTree, router_state: RouterState) -> Self {
		Self {
			raw_url_tree: url_tree.clone(),
			current_url_tree: url_tree,
			router_state,
			memento: None,
			navigated: false,
			last_successful_id: None,
			last_successful_navigation: None,
		}
	}

	pub(crate) fn current_url_tree(&self) -> &UrlTree {
		&self.current_url_tree
	}

	pub(crate) fn raw_url_tree(&self) -> &UrlTree {
		&self.raw_url_tree
	}

	pub(crate) fn set_raw_url_tree(&mut self, url: UrlTree) {
		self.raw_url_tree = url;
	}

	pub(crate) fn router_state(&self) -> &RouterState {
		&self.router_state
	}

	pub(crate) fn navigated(&self) -> bool {
		self.navigated
	}

	pub(crate) fn last_successful_navigation(&self) -> Option<&NavigationInfo> {
		self.last_successful_navigation.as_ref()
	}

	/// Remembers what is committed now, for [`reset_internal_state`](Self::reset_internal_state).
	pub(crate) fn begin_navigation(&mut self) {
		self.memento = Some(StateMemento {
			router_state: self.router_state.clone(),
			current_url_tree: self.current_url_tree.clone(),
			raw_url_tree: self.raw_url_tree.clone(),
		});
	}

	/// Makes a navigation's result the current state.
	pub(crate) fn commit(
		&mut self,
		final_url: UrlTree,
		raw_url: &UrlTree,
		router_state: RouterState,
		url_handling: &dyn UrlHandlingStrategy,
	) {
		self.raw_url_tree = url_handling.merge(&final_url, raw_url);
		self.current_url_tree = final_url;
		self.router_state = router_state;
	}

	pub(crate) fn complete(&mut self, navigation: NavigationInfo) {
		self.navigated = true;
		self.last_successful_id = Some(navigation.id);
		self.last_successful_navigation = Some(navigation);
	}

	/// Rolls back to the memento taken when the failed navigation started.
	pub(crate) fn reset_internal_state(&mut self, final_url: Option<&UrlTree>, url_handling: &dyn UrlHandlingStrategy) {
		let Some(memento) = self.memento.take() else {
			return;
		};
		self.router_state = memento.router_state;
		self.current_url_tree = memento.current_url_tree;
		let raw = final_url.unwrap_or(&memento.raw_url_tree);
		self.raw_url_tree = url_handling.merge(&self.current_url_tree, raw);
	}

	/// Writes `url` to the location, pushing unless the path is unchanged or
	/// `replace_url` is set.
	pub(crate) fn set_browser_url(
		&self,
		location: &dyn Location,
		serializer: &dyn UrlSerializer,
		url: &UrlTree,
		behavior: &NavigationBehaviorOptions,
		navigation_id: u64,
	) {
		let path = serializer.serialize(url);
		let state = history_state(behavior.state.as_ref(), navigation_id);
		if location.is_current_path_equal_to(&path) || behavior.replace_url {
			location.replace_state(&path, state);
		} else {
			location.go(&path, state);
		}
	}

	/// Points the location back at the committed raw URL if it moved away.
	pub(crate) fn reset_url_to_current(&self, location: &dyn Location, serializer: &dyn UrlSerializer) {
		let path = serializer.serialize(&self.raw_url_tree);
		if location.is_current_path_equal_to(&path) {
			return;
		}
		tracing::debug!(url = %path, "restoring location");
		let state = history_state(None, self.last_successful_id.unwrap_or_default());
		location.replace_state(&path, state);
	}
}

/// History state stored with an entry: user state plus the navigation id.
pub(crate) fn history_state(extra: Option<&Value>, navigation_id: u64) -> Value {
	let mut state = match extra {
		Some(Value::Object(map)) => map.clone(),
		_ => Map::new(),
	};
	state.insert(NAVIGATION_ID_KEY.to_string(), Value::from(navigation_id));
	Value::Object(state)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::activated_route::create_empty_state;
	use crate::location::MemoryLocation;
	use crate::url_handling::DefaultUrlHandlingStrategy;
	use reinhardt_url_tree::DefaultUrlSerializer;
	use rstest::*;
	use serde_json::json;

	#[fixture]
	fn manager() -> StateManager {
		let url = UrlTree::default();
		StateManager::new(url.clone(), create_empty_state(&url, None))
	}

	fn url(s: &str) -> UrlTree {
		UrlTree::parse(s).unwrap()
	}

	#[rstest]
	fn test_commit_then_reset_restores_memento(mut manager: StateManager) {
		manager.begin_navigation();
		let next = create_empty_state(&url("/a"), None);

		manager.commit(url("/a"), &url("/a"), next, &DefaultUrlHandlingStrategy);
		assert_eq!(manager.current_url_tree(), &url("/a"));
		manager.reset_internal_state(None, &DefaultUrlHandlingStrategy);

		assert_eq!(manager.current_url_tree(), &UrlTree::default());
		assert_eq!(manager.raw_url_tree(), &UrlTree::default());
	}

	#[rstest]
	fn test_set_browser_url_pushes_or_replaces(manager: StateManager) {
		let location = MemoryLocation::new("/");
		let behavior = NavigationBehaviorOptions::default().with_state(json!({"from": "test"}));

		manager.set_browser_url(&location, &DefaultUrlSerializer, &url("/a"), &behavior, 1);
		manager.set_browser_url(&location, &DefaultUrlSerializer, &url("/a"), &behavior, 2);
		manager.set_browser_url(&location, &DefaultUrlSerializer, &url("/b"), &behavior.clone().replace_url(), 3);

		assert_eq!(location.entries(), vec!["/".to_string(), "/b".to_string()]);
		assert_eq!(location.state(), json!({"from": "test", "navigationId": 3}));
	}

	#[rstest]
	fn test_reset_url_only_touches_location_when_it_differs(mut manager: StateManager) {
		let location = MemoryLocation::new("/elsewhere");
		manager.complete(NavigationInfo {
			id: 4,
			initial_url: UrlTree::default(),
			extracted_url: UrlTree::default(),
			final_url: Some(UrlTree::default()),
			trigger: crate::navigation::NavigationTrigger::Imperative,
			extras: NavigationBehaviorOptions::default(),
			previous_navigation: None,
		});

		manager.reset_url_to_current(&location, &DefaultUrlSerializer);

		assert_eq!(location.path(), "/");
		assert_eq!(location.state(), json!({"navigationId": 4}));
		assert!(manager.navigated());
	}
}
