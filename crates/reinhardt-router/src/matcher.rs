//! Matching one route configuration against URL segments.
//!
//! Everything here is synchronous and stateless. `canMatch` guards are run by
//! the recognizer on top of a structural match.

use std::collections::BTreeMap;
use std::sync::Arc;

use reinhardt_url_tree::{PRIMARY_OUTLET, Params, UrlSegment, UrlSegmentGroup};

use crate::config::{PathMatch, Route, UrlMatchResult};

/// Outcome of matching a route against the remaining segments.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct MatchResult {
	pub consumed: Vec<UrlSegment>,
	pub remaining: Vec<UrlSegment>,
	/// Positional params followed by matrix params of consumed segments.
	pub parameters: Params,
	pub pos_params: BTreeMap<String, UrlSegment>,
}

/// Default path matcher: literal parts, `:name` parameters, and a trailing
/// `**` that consumes whatever is left.
pub fn default_url_matcher(segments: &[UrlSegment], group: &UrlSegmentGroup, route: &Route) -> Option<UrlMatchResult> {
	let mut parts: Vec<&str> = route.path().split('/').collect();
	let rest_wildcard = parts.len() > 1 && parts.last() == Some(&"**");
	if rest_wildcard {
		parts.pop();
	}
	if parts.len() > segments.len() {
		return None;
	}
	let full = route.effective_path_match() == PathMatch::Full;
	if full && (group.has_children() || (!rest_wildcard && parts.len() < segments.len())) {
		return None;
	}

	let mut pos_params = BTreeMap::new();
	for (part, segment) in parts.iter().zip(segments) {
		if let Some(name) = part.strip_prefix(':') {
			pos_params.insert(name.to_string(), segment.clone());
		} else if *part != segment.path {
			return None;
		}
	}
	let consumed = if rest_wildcard { segments.len() } else { parts.len() };
	Some(UrlMatchResult {
		consumed: segments[..consumed].to_vec(),
		pos_params,
	})
}

/// Structurally matches `route` against `segments` of `group`.
pub(crate) fn match_route(group: &UrlSegmentGroup, route: &Route, segments: &[UrlSegment]) -> Option<MatchResult> {
	if route.matcher().is_none() && route.path() == "**" {
		return Some(wildcard_match(segments));
	}
	if route.matcher().is_none() && route.path().is_empty() {
		if route.effective_path_match() == PathMatch::Full && (group.has_children() || !segments.is_empty()) {
			return None;
		}
		return Some(MatchResult {
			remaining: segments.to_vec(),
			..MatchResult::default()
		});
	}

	let result = match route.matcher() {
		Some(matcher) => matcher(segments, group, route),
		None => default_url_matcher(segments, group, route),
	}?;

	let mut parameters: Params = result
		.pos_params
		.iter()
		.map(|(name, segment)| (name.clone(), segment.path.clone()))
		.collect();
	for segment in &result.consumed {
		for (key, value) in &segment.parameters {
			parameters.entry(key.clone()).or_insert_with(|| value.clone());
		}
	}

	Some(MatchResult {
		remaining: segments[result.consumed.len().min(segments.len())..].to_vec(),
		consumed: result.consumed,
		parameters,
		pos_params: result.pos_params,
	})
}

fn wildcard_match(segments: &[UrlSegment]) -> MatchResult {
	MatchResult {
		consumed: segments.to_vec(),
		remaining: Vec::new(),
		parameters: segments.last().map(|s| s.parameters.clone()).unwrap_or_default(),
		pos_params: BTreeMap::new(),
	}
}

/// Whether `route` would match an empty path here.
pub(crate) fn empty_path_match(group: &UrlSegmentGroup, sliced: &[UrlSegment], route: &Route) -> bool {
	if (group.has_children() || !sliced.is_empty()) && route.effective_path_match() == PathMatch::Full {
		return false;
	}
	route.path().is_empty() && route.matcher().is_none()
}

/// Quick check run before a route is expanded: outlet compatibility plus a
/// structural match.
pub(crate) fn is_immediate_match(route: &Route, raw: &UrlSegmentGroup, segments: &[UrlSegment], outlet: &str) -> bool {
	if route.outlet_name() != outlet && (outlet == PRIMARY_OUTLET || !empty_path_match(raw, segments, route)) {
		return false;
	}
	match_route(raw, route, segments).is_some()
}

/// True when nothing of `outlet` is left to match.
pub(crate) fn no_leftovers(group: &UrlSegmentGroup, segments: &[UrlSegment], outlet: &str) -> bool {
	segments.is_empty() && !group.children.contains_key(outlet)
}

/// Regroups segments so empty-path routes in named outlets get their own
/// (empty) group to match against.
pub(crate) fn split(
	group: &UrlSegmentGroup,
	consumed: &[UrlSegment],
	sliced: &[UrlSegment],
	routes: &[Arc<Route>],
) -> (UrlSegmentGroup, Vec<UrlSegment>) {
	let named_empty = routes
		.iter()
		.any(|r| empty_path_match(group, sliced, r) && r.outlet_name() != PRIMARY_OUTLET);

	if !sliced.is_empty() && named_empty {
		let mut children = BTreeMap::new();
		children.insert(
			PRIMARY_OUTLET.to_string(),
			UrlSegmentGroup::new(sliced.to_vec(), group.children.clone()),
		);
		for route in routes {
			if route.path().is_empty() && route.matcher().is_none() && route.outlet_name() != PRIMARY_OUTLET {
				children.insert(route.outlet_name().to_string(), UrlSegmentGroup::default());
			}
		}
		return (UrlSegmentGroup::new(consumed.to_vec(), children), Vec::new());
	}

	if sliced.is_empty() && routes.iter().any(|r| empty_path_match(group, sliced, r)) {
		let mut children = group.children.clone();
		for route in routes {
			if empty_path_match(group, sliced, route) && !children.contains_key(route.outlet_name()) {
				children.insert(route.outlet_name().to_string(), UrlSegmentGroup::default());
			}
		}
		return (UrlSegmentGroup::new(group.segments.clone(), children), sliced.to_vec());
	}

	(group.clone(), sliced.to_vec())
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn segments(paths: &[&str]) -> Vec<UrlSegment> {
		paths.iter().map(|p| UrlSegment::path(*p)).collect()
	}

	fn group(paths: &[&str]) -> UrlSegmentGroup {
		UrlSegmentGroup::leaf(segments(paths))
	}

	#[rstest]
	fn test_param_route_binds_segment() {
		let route = Route::new("team/:id").component("Team");
		let input = segments(&["team", "33", "user"]);

		let result = match_route(&group(&["team", "33", "user"]), &route, &input).unwrap();

		assert_eq!(result.consumed, segments(&["team", "33"]));
		assert_eq!(result.remaining, segments(&["user"]));
		assert_eq!(result.parameters.get("id").map(String::as_str), Some("33"));
	}

	#[rstest]
	#[case(&["team"], false)]
	#[case(&["team", "33"], true)]
	#[case(&["team", "33", "x"], false)]
	#[case(&["club", "33"], false)]
	fn test_full_match(#[case] paths: &[&str], #[case] matched: bool) {
		let route = Route::new("team/:id").component("Team").path_match(PathMatch::Full);
		let input = segments(paths);

		assert_eq!(match_route(&group(paths), &route, &input).is_some(), matched);
	}

	#[rstest]
	fn test_matrix_params_first_occurrence_wins() {
		let route = Route::new("a/:id").component("A");
		let mut first = Params::new();
		first.insert("mode".into(), "first".into());
		first.insert("id".into(), "matrix".into());
		let mut second = Params::new();
		second.insert("mode".into(), "second".into());
		let input = vec![UrlSegment::new("a", first), UrlSegment::new("7", second)];

		let result = match_route(&UrlSegmentGroup::leaf(input.clone()), &route, &input).unwrap();

		assert_eq!(result.parameters.get("mode").map(String::as_str), Some("first"));
		assert_eq!(result.parameters.get("id").map(String::as_str), Some("7"));
	}

	#[rstest]
	fn test_wildcard_consumes_everything() {
		let route = Route::new("**").component("NotFound");
		let input = segments(&["x", "y"]);

		let result = match_route(&group(&["x", "y"]), &route, &input).unwrap();

		assert_eq!(result.consumed.len(), 2);
		assert!(result.remaining.is_empty());
	}

	#[rstest]
	fn test_trailing_wildcard_consumes_rest() {
		let route = Route::new("docs/**").component("Docs").path_match(PathMatch::Full);
		let input = segments(&["docs", "guide", "intro"]);

		let result = match_route(&group(&["docs", "guide", "intro"]), &route, &input).unwrap();

		assert_eq!(result.consumed.len(), 3);
		assert!(result.remaining.is_empty());
	}

	#[rstest]
	fn test_empty_path_full_rejects_leftovers() {
		let route = Route::new("").redirect_to("/home");

		assert!(match_route(&group(&[]), &route, &[]).is_some());
		assert!(match_route(&group(&["x"]), &route, &segments(&["x"])).is_none());
	}

	#[rstest]
	fn test_custom_matcher() {
		let route = Route::with_matcher(|segments, _, _| {
			let first = segments.first()?;
			first.path.ends_with(".html").then(|| UrlMatchResult {
				consumed: vec![first.clone()],
				pos_params: [("page".to_string(), first.clone())].into_iter().collect(),
			})
		})
		.component("Page");
		let input = segments(&["about.html"]);

		let result = match_route(&group(&["about.html"]), &route, &input).unwrap();

		assert_eq!(result.parameters.get("page").map(String::as_str), Some("about.html"));
	}

	#[rstest]
	fn test_named_outlet_route_only_matches_its_outlet() {
		let route = Route::new("chat").component("Chat").outlet("aux");
		let input = segments(&["chat"]);

		assert!(!is_immediate_match(&route, &group(&["chat"]), &input, PRIMARY_OUTLET));
		assert!(is_immediate_match(&route, &group(&["chat"]), &input, "aux"));
	}

	#[rstest]
	fn test_split_adds_named_empty_path_outlets() {
		let routes = vec![
			Arc::new(Route::new("").component("Side").outlet("side")),
			Arc::new(Route::new("main").component("Main")),
		];
		let raw = group(&["team", "main"]);

		let (split_group, sliced) = split(&raw, &segments(&["team"]), &segments(&["main"]), &routes);

		assert!(sliced.is_empty());
		assert_eq!(split_group.segments, segments(&["team"]));
		assert_eq!(split_group.primary().unwrap().segments, segments(&["main"]));
		assert!(split_group.child("side").unwrap().segments.is_empty());
	}
}
