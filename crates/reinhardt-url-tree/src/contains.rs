//! "Is this URL active" checks between two trees.

use serde::{Deserialize, Serialize};

use crate::tree::{PRIMARY_OUTLET, Params, QueryParams, UrlSegment, UrlSegmentGroup, UrlTree};

/// How the path part of two trees is compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PathMatchMode {
	/// Identical segment trees.
	Exact,
	/// The contained tree is a prefix of the container.
	Subset,
}

/// How a parameter map is compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParamsMatchMode {
	Exact,
	Subset,
	Ignored,
}

/// How fragments are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FragmentMatchMode {
	Exact,
	Ignored,
}

/// Per-field options for [`contains_tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IsActiveMatchOptions {
	pub paths: PathMatchMode,
	pub query_params: ParamsMatchMode,
	pub matrix_params: ParamsMatchMode,
	pub fragment: FragmentMatchMode,
}

impl IsActiveMatchOptions {
	/// Exact paths and query params; matrix params and fragment ignored.
	pub const fn exact() -> Self {
		Self {
			paths: PathMatchMode::Exact,
			query_params: ParamsMatchMode::Exact,
			matrix_params: ParamsMatchMode::Ignored,
			fragment: FragmentMatchMode::Ignored,
		}
	}

	/// Subset paths and query params; matrix params and fragment ignored.
	pub const fn subset() -> Self {
		Self {
			paths: PathMatchMode::Subset,
			query_params: ParamsMatchMode::Subset,
			matrix_params: ParamsMatchMode::Ignored,
			fragment: FragmentMatchMode::Ignored,
		}
	}
}

/// Returns whether `container` contains `contained` under `options`.
pub fn contains_tree(container: &UrlTree, contained: &UrlTree, options: &IsActiveMatchOptions) -> bool {
	let paths = match options.paths {
		PathMatchMode::Exact => equal_segment_groups(&container.root, &contained.root, options.matrix_params),
		PathMatchMode::Subset => contains_segment_group(&container.root, &contained.root, options.matrix_params),
	};
	paths
		&& compare_query_params(options.query_params, &container.query_params, &contained.query_params)
		&& !(options.fragment == FragmentMatchMode::Exact && container.fragment != contained.fragment)
}

fn compare_query_params(mode: ParamsMatchMode, container: &QueryParams, contained: &QueryParams) -> bool {
	match mode {
		ParamsMatchMode::Exact => container == contained,
		ParamsMatchMode::Subset => {
			contained.len() <= container.len()
				&& contained
					.iter()
					.all(|(key, value)| container.get(key) == Some(value))
		}
		ParamsMatchMode::Ignored => true,
	}
}

fn compare_matrix_params(mode: ParamsMatchMode, container: &Params, contained: &Params) -> bool {
	match mode {
		ParamsMatchMode::Exact => container == contained,
		ParamsMatchMode::Subset => {
			contained.len() <= container.len()
				&& contained
					.iter()
					.all(|(key, value)| container.get(key) == Some(value))
		}
		ParamsMatchMode::Ignored => true,
	}
}

fn equal_path(a: &[UrlSegment], b: &[UrlSegment]) -> bool {
	a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.path == y.path)
}

fn matrix_params_match(container: &[UrlSegment], contained: &[UrlSegment], mode: ParamsMatchMode) -> bool {
	contained
		.iter()
		.zip(container)
		.all(|(inner, outer)| compare_matrix_params(mode, &outer.parameters, &inner.parameters))
}

fn equal_segment_groups(container: &UrlSegmentGroup, contained: &UrlSegmentGroup, mode: ParamsMatchMode) -> bool {
	if !equal_path(&container.segments, &contained.segments) {
		return false;
	}
	if !matrix_params_match(&container.segments, &contained.segments, mode) {
		return false;
	}
	if container.number_of_children() != contained.number_of_children() {
		return false;
	}
	contained.children.iter().all(|(outlet, child)| {
		container
			.children
			.get(outlet)
			.is_some_and(|other| equal_segment_groups(other, child, mode))
	})
}

fn contains_segment_group(container: &UrlSegmentGroup, contained: &UrlSegmentGroup, mode: ParamsMatchMode) -> bool {
	contains_segment_group_helper(container, contained, &contained.segments, mode)
}

fn contains_segment_group_helper(
	container: &UrlSegmentGroup,
	contained: &UrlSegmentGroup,
	contained_paths: &[UrlSegment],
	mode: ParamsMatchMode,
) -> bool {
	let container_len = container.segments.len();
	if container_len > contained_paths.len() {
		let current = &container.segments[..contained_paths.len()];
		equal_path(current, contained_paths)
			&& !contained.has_children()
			&& matrix_params_match(current, contained_paths, mode)
	} else if container_len == contained_paths.len() {
		if !equal_path(&container.segments, contained_paths)
			|| !matrix_params_match(&container.segments, contained_paths, mode)
		{
			return false;
		}
		contained.children.iter().all(|(outlet, child)| {
			container
				.children
				.get(outlet)
				.is_some_and(|other| contains_segment_group(other, child, mode))
		})
	} else {
		let (current, next) = contained_paths.split_at(container_len);
		if !equal_path(&container.segments, current)
			|| !matrix_params_match(&container.segments, current, mode)
		{
			return false;
		}
		match container.children.get(PRIMARY_OUTLET) {
			Some(primary) => contains_segment_group_helper(primary, contained, next, mode),
			None => false,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn tree(url: &str) -> UrlTree {
		UrlTree::parse(url).unwrap()
	}

	#[rstest]
	#[case("/team/33", "/team/33", true)]
	#[case("/team/33", "/team", false)]
	#[case("/team/33(aux:chat)", "/team/33", false)]
	#[case("/team/33?a=1", "/team/33?a=1", true)]
	#[case("/team/33?a=1", "/team/33", false)]
	#[case("/team/33;m=1", "/team/33", true)]
	fn test_exact(#[case] container: &str, #[case] contained: &str, #[case] expected: bool) {
		assert_eq!(
			contains_tree(&tree(container), &tree(contained), &IsActiveMatchOptions::exact()),
			expected
		);
	}

	#[rstest]
	#[case("/team/33/user", "/team", true)]
	#[case("/team/33/user", "/team/33", true)]
	#[case("/team/33", "/team/33/user", false)]
	#[case("/team/33(aux:chat)", "/team/33", true)]
	#[case("/team/33(aux:chat)", "/(aux:chat)", true)]
	#[case("/team/33?a=1&b=2", "/team?a=1", true)]
	#[case("/team/33?a=1", "/team?a=2", false)]
	#[case("/other", "/team", false)]
	fn test_subset(#[case] container: &str, #[case] contained: &str, #[case] expected: bool) {
		assert_eq!(
			contains_tree(&tree(container), &tree(contained), &IsActiveMatchOptions::subset()),
			expected
		);
	}

	#[rstest]
	fn test_matrix_params_participate_when_requested() {
		let options = IsActiveMatchOptions {
			matrix_params: ParamsMatchMode::Exact,
			..IsActiveMatchOptions::subset()
		};

		assert!(contains_tree(&tree("/a;x=1/b"), &tree("/a;x=1"), &options));
		assert!(!contains_tree(&tree("/a;x=1/b"), &tree("/a;x=2"), &options));
	}

	#[rstest]
	fn test_fragment_exact() {
		let options = IsActiveMatchOptions {
			fragment: FragmentMatchMode::Exact,
			..IsActiveMatchOptions::exact()
		};

		assert!(contains_tree(&tree("/a#top"), &tree("/a#top"), &options));
		assert!(!contains_tree(&tree("/a#top"), &tree("/a#bottom"), &options));
	}
}
