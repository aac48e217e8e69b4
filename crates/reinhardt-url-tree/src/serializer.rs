//! Conversion between URL strings and [`UrlTree`]s.

use crate::encoding::{encode_uri_fragment, encode_uri_query, encode_uri_segment};
use crate::error::UrlTreeResult;
use crate::parser::UrlParser;
use crate::tree::{PRIMARY_OUTLET, Params, QueryParams, QueryValue, UrlSegment, UrlSegmentGroup, UrlTree};

/// Converts between URL strings and trees.
///
/// Implementations must keep `parse(serialize(t)) == t` for every tree the
/// router builds.
pub trait UrlSerializer: Send + Sync {
	/// Parses a URL string.
	fn parse(&self, url: &str) -> UrlTreeResult<UrlTree>;

	/// Serializes a tree back into a URL string.
	fn serialize(&self, tree: &UrlTree) -> String;
}

/// The standard serializer.
///
/// ```text
/// /inbox/33;open=true(popup:compose)?debug=true#top
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultUrlSerializer;

impl UrlSerializer for DefaultUrlSerializer {
	fn parse(&self, url: &str) -> UrlTreeResult<UrlTree> {
		UrlParser::new(url).parse()
	}

	fn serialize(&self, tree: &UrlTree) -> String {
		let segment = format!("/{}", serialize_segment(&tree.root, true));
		let query = serialize_query_params(&tree.query_params);
		let fragment = tree
			.fragment
			.as_deref()
			.map(|f| format!("#{}", encode_uri_fragment(f)))
			.unwrap_or_default();
		format!("{segment}{query}{fragment}")
	}
}

fn serialize_segment(group: &UrlSegmentGroup, root: bool) -> String {
	if !group.has_children() {
		return serialize_paths(group);
	}

	if root {
		let primary = group
			.primary()
			.map(|p| serialize_segment(p, false))
			.unwrap_or_default();
		let named: Vec<String> = group
			.ordered_children()
			.into_iter()
			.filter(|(name, _)| *name != PRIMARY_OUTLET)
			.map(|(name, child)| format!("{name}:{}", serialize_segment(child, false)))
			.collect();
		if named.is_empty() {
			primary
		} else {
			format!("{primary}({})", named.join("//"))
		}
	} else {
		let children: Vec<String> = group
			.ordered_children()
			.into_iter()
			.map(|(name, child)| {
				if name == PRIMARY_OUTLET {
					serialize_segment(child, false)
				} else {
					format!("{name}:{}", serialize_segment(child, false))
				}
			})
			.collect();
		// a lone primary child needs no parentheses
		if group.number_of_children() == 1 && group.primary().is_some() {
			format!("{}/{}", serialize_paths(group), children[0])
		} else {
			format!("{}/({})", serialize_paths(group), children.join("//"))
		}
	}
}

pub(crate) fn serialize_paths(group: &UrlSegmentGroup) -> String {
	group
		.segments
		.iter()
		.map(serialize_path)
		.collect::<Vec<_>>()
		.join("/")
}

pub(crate) fn serialize_path(segment: &UrlSegment) -> String {
	format!(
		"{}{}",
		encode_uri_segment(&segment.path),
		serialize_matrix_params(&segment.parameters)
	)
}

fn serialize_matrix_params(params: &Params) -> String {
	params
		.iter()
		.map(|(key, value)| format!(";{}={}", encode_uri_segment(key), encode_uri_segment(value)))
		.collect()
}

fn serialize_query_params(params: &QueryParams) -> String {
	let parts: Vec<String> = params
		.iter()
		.map(|(name, value)| {
			let name = encode_uri_query(name);
			match value {
				QueryValue::Single(v) => format!("{name}={}", encode_uri_query(v)),
				QueryValue::Multiple(values) => values
					.iter()
					.map(|v| format!("{name}={}", encode_uri_query(v)))
					.collect::<Vec<_>>()
					.join("&"),
			}
		})
		.filter(|part| !part.is_empty())
		.collect();
	if parts.is_empty() {
		String::new()
	} else {
		format!("?{}", parts.join("&"))
	}
}
