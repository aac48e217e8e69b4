//! Router options.
//!
//! Options are plain data and can be loaded from the `[router]` fragment of
//! a settings file:
//!
//! ```
//! use reinhardt_router::{OnSameUrlNavigation, RouterOptions};
//!
//! let options = RouterOptions::from_toml_str(r#"
//! onSameUrlNavigation = "reload"
//! maxRedirects = 8
//! "#).unwrap();
//!
//! assert_eq!(options.on_same_url_navigation, OnSameUrlNavigation::Reload);
//! assert_eq!(options.max_redirects, 8);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{RouterError, RouterResult};

/// What to do when navigating to the URL that is already active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OnSameUrlNavigation {
	/// Skip the navigation and emit `NavigationSkipped`.
	#[default]
	Ignore,
	/// Run the full pipeline again.
	Reload,
}

/// How route params and data flow from parent to child snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParamsInheritanceStrategy {
	/// Inherit only into empty-path routes and children of componentless routes.
	#[default]
	EmptyOnly,
	/// Always inherit.
	Always,
}

/// When the browser location is updated during a navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UrlUpdateStrategy {
	/// At commit, right before activation.
	#[default]
	Deferred,
	/// Right after the URL is recognized.
	Eager,
}

/// Configuration of a [`Router`](crate::Router).
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RouterOptions {
	pub on_same_url_navigation: OnSameUrlNavigation,
	pub params_inheritance_strategy: ParamsInheritanceStrategy,
	pub url_update_strategy: UrlUpdateStrategy,
	/// Redirects applied in one navigation before it fails with
	/// [`RouterError::RedirectLoop`].
	pub max_redirects: usize,
	/// Capacity of the router event channel.
	pub event_buffer: usize,
	/// Component rendered at the root of every router state.
	pub root_component: Option<String>,
}

impl Default for RouterOptions {
	fn default() -> Self {
		Self {
			on_same_url_navigation: OnSameUrlNavigation::default(),
			params_inheritance_strategy: ParamsInheritanceStrategy::default(),
			url_update_strategy: UrlUpdateStrategy::default(),
			max_redirects: 31,
			event_buffer: 256,
			root_component: None,
		}
	}
}

impl RouterOptions {
	/// Parses options from TOML. Missing keys keep their defaults.
	pub fn from_toml_str(content: &str) -> RouterResult<Self> {
		toml::from_str(content).map_err(|e| RouterError::Options(e.to_string()))
	}

	pub fn with_on_same_url_navigation(mut self, policy: OnSameUrlNavigation) -> Self {
		self.on_same_url_navigation = policy;
		self
	}

	pub fn with_params_inheritance_strategy(mut self, strategy: ParamsInheritanceStrategy) -> Self {
		self.params_inheritance_strategy = strategy;
		self
	}

	pub fn with_url_update_strategy(mut self, strategy: UrlUpdateStrategy) -> Self {
		self.url_update_strategy = strategy;
		self
	}

	pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
		self.max_redirects = max_redirects;
		self
	}

	pub fn with_root_component(mut self, component: impl Into<String>) -> Self {
		self.root_component = Some(component.into());
		self
	}
}
