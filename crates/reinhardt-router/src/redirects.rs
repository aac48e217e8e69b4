//! Redirect application.
//!
//! A redirect either rewrites the segments it matched in place (relative
//! templates) or replaces the whole URL (absolute templates and trees), in
//! which case recognition restarts from the root. Every applied redirect
//! counts against a budget so a loop fails instead of spinning forever.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use reinhardt_url_tree::{QueryParams, QueryValue, UrlSegment, UrlSegmentGroup, UrlSerializer, UrlTree};

use crate::config::{RedirectContext, RedirectTarget, RedirectTo, Route};
use crate::error::{NavigationCanceling, RouterError, RouterResult};

/// Result of applying one redirect.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Redirected {
	/// Segments that replace the consumed ones at the same position.
	Relative(Vec<UrlSegment>),
	/// A new URL; matching starts over.
	Absolute(UrlTree),
}

/// Applies redirects and counts them.
#[derive(Debug)]
pub(crate) struct ApplyRedirects {
	limit: usize,
	/// Bumped through `&self`: the recognizer's recursive steps are `Send`
	/// boxed futures that only borrow it shared.
	applied: AtomicUsize,
}

impl ApplyRedirects {
	pub(crate) fn new(limit: usize) -> Self {
		Self {
			limit,
			applied: AtomicUsize::new(0),
		}
	}

	pub(crate) fn applied(&self) -> usize {
		self.applied.load(Ordering::Relaxed)
	}

	/// Applies the redirect of `route`, which consumed `consumed` and bound
	/// `pos_params`. `current` is the URL being recognized.
	pub(crate) async fn apply(
		&self,
		route: &Route,
		consumed: &[UrlSegment],
		pos_params: &BTreeMap<String, UrlSegment>,
		current: &UrlTree,
		serializer: &dyn UrlSerializer,
		context: RedirectContext,
	) -> RouterResult<Redirected> {
		let applied = self.applied.fetch_add(1, Ordering::Relaxed) + 1;
		if applied > self.limit {
			tracing::warn!(limit = self.limit, path = route.path(), "redirect limit exceeded");
			return Err(RouterError::RedirectLoop { limit: self.limit });
		}

		let template = match route.redirect() {
			Some(RedirectTo::Template(template)) => template.clone(),
			Some(RedirectTo::Function(redirect)) => match redirect(context).await.map_err(|error| RouterError::Custom(error.into()))? {
				RedirectTarget::Path(path) => path,
				RedirectTarget::Tree(tree) => return Ok(Redirected::Absolute(tree)),
				RedirectTarget::Command(command) => {
					return Err(RouterError::Canceled(NavigationCanceling::redirect(command)));
				}
			},
			None => return Err(RouterError::InvalidRedirect(format!("route '{}' has no redirect", route.path()))),
		};
		tracing::debug!(from = route.path(), to = %template, "applying redirect");

		let parsed = serializer.parse(&template)?;
		let mut actual = consumed.to_vec();
		let root = create_segment_group(&template, &parsed.root, &mut actual, pos_params)?;
		let tree = UrlTree::new(
			root,
			create_query_params(&parsed.query_params, &current.query_params),
			parsed.fragment,
		);

		if template.starts_with('/') {
			Ok(Redirected::Absolute(tree))
		} else {
			lineralize(&template, &tree).map(Redirected::Relative)
		}
	}
}

fn create_segment_group(
	template: &str,
	group: &UrlSegmentGroup,
	actual: &mut Vec<UrlSegment>,
	pos_params: &BTreeMap<String, UrlSegment>,
) -> RouterResult<UrlSegmentGroup> {
	let segments = create_segments(template, &group.segments, actual, pos_params)?;
	let mut children = BTreeMap::new();
	for (outlet, child) in &group.children {
		children.insert(outlet.clone(), create_segment_group(template, child, actual, pos_params)?);
	}
	Ok(UrlSegmentGroup::new(segments, children))
}

fn create_segments(
	template: &str,
	redirect_segments: &[UrlSegment],
	actual: &mut Vec<UrlSegment>,
	pos_params: &BTreeMap<String, UrlSegment>,
) -> RouterResult<Vec<UrlSegment>> {
	redirect_segments
		.iter()
		.map(|segment| match segment.path.strip_prefix(':') {
			Some(name) => pos_params.get(name).cloned().ok_or_else(|| {
				RouterError::InvalidRedirect(format!(
					"Cannot redirect to '{}'. Cannot find '{}'.",
					template, segment.path
				))
			}),
			None => Ok(find_or_return(segment, actual)),
		})
		.collect()
}

/// Reuses a matched segment with the same path, keeping its matrix params.
fn find_or_return(segment: &UrlSegment, actual: &mut Vec<UrlSegment>) -> UrlSegment {
	match actual.iter().position(|s| s.path == segment.path) {
		Some(index) => {
			let found = actual[index].clone();
			actual.truncate(index);
			found
		}
		None => segment.clone(),
	}
}

/// Template query params, with `:name` values copied from the current URL.
fn create_query_params(template: &QueryParams, actual: &QueryParams) -> QueryParams {
	let mut params = QueryParams::new();
	for (key, value) in template {
		match value {
			QueryValue::Single(source) if source.starts_with(':') => {
				if let Some(copied) = actual.get(&source[1..]) {
					params.insert(key.clone(), copied.clone());
				}
			}
			_ => {
				params.insert(key.clone(), value.clone());
			}
		}
	}
	params
}

/// Flattens a relative redirect target into a segment list.
fn lineralize(template: &str, tree: &UrlTree) -> RouterResult<Vec<UrlSegment>> {
	let mut segments = Vec::new();
	let mut current = &tree.root;
	loop {
		segments.extend(current.segments.iter().cloned());
		if !current.has_children() {
			return Ok(segments);
		}
		match current.primary() {
			Some(primary) if current.number_of_children() == 1 => current = primary,
			_ => {
				return Err(RouterError::InvalidRedirect(format!(
					"Only absolute redirects can have named outlets. redirectTo: '{}'",
					template
				)));
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use reinhardt_url_tree::{DefaultUrlSerializer, PRIMARY_OUTLET, Params};
	use rstest::*;

	fn context() -> RedirectContext {
		RedirectContext {
			params: Params::new(),
			data: Default::default(),
			query_params: QueryParams::new(),
			fragment: None,
			url: Vec::new(),
			outlet: PRIMARY_OUTLET.to_string(),
		}
	}

	fn pos(name: &str, value: &str) -> BTreeMap<String, UrlSegment> {
		BTreeMap::from([(name.to_string(), UrlSegment::path(value))])
	}

	#[fixture]
	fn redirects() -> ApplyRedirects {
		ApplyRedirects::new(31)
	}

	#[rstest]
	#[tokio::test]
	async fn test_relative_template_substitutes_params(redirects: ApplyRedirects) {
		let route = Route::new("old/:id").redirect_to("new/:id");
		let consumed = vec![UrlSegment::path("old"), UrlSegment::path("7")];

		let result = redirects
			.apply(&route, &consumed, &pos("id", "7"), &UrlTree::default(), &DefaultUrlSerializer, context())
			.await
			.unwrap();

		assert_eq!(result, Redirected::Relative(vec![UrlSegment::path("new"), UrlSegment::path("7")]));
	}

	#[rstest]
	#[tokio::test]
	async fn test_absolute_template_copies_referenced_query_params(redirects: ApplyRedirects) {
		let route = Route::new("").redirect_to("/home?ref=:source");
		let current = UrlTree::parse("/?source=mail&other=x").unwrap();

		let result = redirects
			.apply(&route, &[], &BTreeMap::new(), &current, &DefaultUrlSerializer, context())
			.await
			.unwrap();

		let Redirected::Absolute(tree) = result else {
			panic!("expected an absolute redirect");
		};
		assert_eq!(tree.to_string(), "/home?ref=mail");
	}

	#[rstest]
	#[tokio::test]
	async fn test_missing_param_is_invalid(redirects: ApplyRedirects) {
		let route = Route::new("old").redirect_to("new/:id");

		let err = redirects
			.apply(&route, &[UrlSegment::path("old")], &BTreeMap::new(), &UrlTree::default(), &DefaultUrlSerializer, context())
			.await
			.unwrap_err();

		assert_eq!(err.to_string(), "Invalid redirect: Cannot redirect to 'new/:id'. Cannot find ':id'.");
	}

	#[rstest]
	#[tokio::test]
	async fn test_relative_redirect_with_named_outlet_is_rejected(redirects: ApplyRedirects) {
		let route = Route::new("a").redirect_to("b(aux:c)");

		let err = redirects
			.apply(&route, &[UrlSegment::path("a")], &BTreeMap::new(), &UrlTree::default(), &DefaultUrlSerializer, context())
			.await
			.unwrap_err();

		assert!(matches!(err, RouterError::InvalidRedirect(_)));
	}

	#[rstest]
	#[tokio::test]
	async fn test_function_redirect_to_command_cancels() {
		let redirects = ApplyRedirects::new(31);
		let route = Route::new("legacy").redirect_to_fn(|_| async {
			Ok(RedirectTarget::Command(crate::guards::RedirectCommand::new(UrlTree::parse("/modern").unwrap())))
		});

		let err = redirects
			.apply(&route, &[], &BTreeMap::new(), &UrlTree::default(), &DefaultUrlSerializer, context())
			.await
			.unwrap_err();

		assert!(err.as_canceling().is_some_and(NavigationCanceling::is_redirect));
	}

	#[rstest]
	#[tokio::test]
	async fn test_budget_is_enforced() {
		let redirects = ApplyRedirects::new(1);
		let route = Route::new("a").redirect_to("b");
		let consumed = [UrlSegment::path("a")];

		redirects
			.apply(&route, &consumed, &BTreeMap::new(), &UrlTree::default(), &DefaultUrlSerializer, context())
			.await
			.unwrap();
		let err = redirects
			.apply(&route, &consumed, &BTreeMap::new(), &UrlTree::default(), &DefaultUrlSerializer, context())
			.await
			.unwrap_err();

		assert!(matches!(err, RouterError::RedirectLoop { limit: 1 }));
		assert_eq!(redirects.applied(), 2);
	}
}
