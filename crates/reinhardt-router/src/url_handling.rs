//! Partial URL ownership.
//!
//! When several routers share one browser URL, each one only processes the
//! part it owns. A [`UrlHandlingStrategy`] extracts that part before routing
//! and merges the result back into the full URL afterwards.

use reinhardt_url_tree::UrlTree;

pub trait UrlHandlingStrategy: Send + Sync {
	/// Whether this router processes `url` at all.
	fn should_process_url(&self, url: &UrlTree) -> bool;

	/// The part of `url` this router routes on.
	fn extract(&self, url: &UrlTree) -> UrlTree;

	/// Combines the routed part with the full URL it came from.
	fn merge(&self, new_url_part: &UrlTree, raw_url: &UrlTree) -> UrlTree;
}

/// Owns the entire URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultUrlHandlingStrategy;

impl UrlHandlingStrategy for DefaultUrlHandlingStrategy {
	fn should_process_url(&self, _url: &UrlTree) -> bool {
		true
	}

	fn extract(&self, url: &UrlTree) -> UrlTree {
		url.clone()
	}

	fn merge(&self, new_url_part: &UrlTree, _raw_url: &UrlTree) -> UrlTree {
		new_url_part.clone()
	}
}
