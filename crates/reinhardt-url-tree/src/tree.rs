//! Core URL tree types.
//!
//! A [`UrlTree`] owns one root [`UrlSegmentGroup`]. Each group holds the
//! segments consumed together plus child groups keyed by outlet name, so
//! `/team/33(aux:chat)` becomes a root with a `primary` child `team/33` and
//! an `aux` child `chat`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::UrlTreeError;
use crate::serializer::{DefaultUrlSerializer, UrlSerializer, serialize_path, serialize_paths};

/// Name of the default outlet.
pub const PRIMARY_OUTLET: &str = "primary";

/// Matrix or route parameters keyed by name.
pub type Params = BTreeMap<String, String>;

/// Query parameters keyed by name.
pub type QueryParams = BTreeMap<String, QueryValue>;

/// A query parameter value, either a single string or a repeated key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
	/// `?key=value`
	Single(String),
	/// `?key=a&key=b`
	Multiple(Vec<String>),
}

impl QueryValue {
	/// Returns the first value.
	pub fn first(&self) -> Option<&str> {
		match self {
			Self::Single(value) => Some(value),
			Self::Multiple(values) => values.first().map(String::as_str),
		}
	}

	/// Returns every value in order.
	pub fn all(&self) -> Vec<&str> {
		match self {
			Self::Single(value) => vec![value.as_str()],
			Self::Multiple(values) => values.iter().map(String::as_str).collect(),
		}
	}

	pub(crate) fn push(&mut self, value: String) {
		match self {
			Self::Single(existing) => {
				*self = Self::Multiple(vec![std::mem::take(existing), value]);
			}
			Self::Multiple(values) => values.push(value),
		}
	}
}

impl From<&str> for QueryValue {
	fn from(value: &str) -> Self {
		Self::Single(value.to_string())
	}
}

impl From<String> for QueryValue {
	fn from(value: String) -> Self {
		Self::Single(value)
	}
}

impl From<Vec<String>> for QueryValue {
	fn from(values: Vec<String>) -> Self {
		Self::Multiple(values)
	}
}

/// One `/`-delimited path component with its matrix parameters.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UrlSegment {
	/// Decoded path text.
	pub path: String,
	/// Decoded matrix parameters (`;key=value`).
	pub parameters: Params,
}

impl UrlSegment {
	/// Creates a segment with the given matrix parameters.
	pub fn new(path: impl Into<String>, parameters: Params) -> Self {
		Self {
			path: path.into(),
			parameters,
		}
	}

	/// Creates a segment without matrix parameters.
	pub fn path(path: impl Into<String>) -> Self {
		Self::new(path, Params::new())
	}
}

impl fmt::Display for UrlSegment {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&serialize_path(self))
	}
}

/// A node in the URL tree.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UrlSegmentGroup {
	/// Segments consumed together by this group.
	pub segments: Vec<UrlSegment>,
	/// Child groups keyed by outlet name.
	pub children: BTreeMap<String, UrlSegmentGroup>,
}

impl UrlSegmentGroup {
	pub fn new(segments: Vec<UrlSegment>, children: BTreeMap<String, UrlSegmentGroup>) -> Self {
		Self { segments, children }
	}

	/// A group with segments and no children.
	pub fn leaf(segments: Vec<UrlSegment>) -> Self {
		Self::new(segments, BTreeMap::new())
	}

	pub fn has_children(&self) -> bool {
		!self.children.is_empty()
	}

	pub fn number_of_children(&self) -> usize {
		self.children.len()
	}

	pub fn child(&self, outlet: &str) -> Option<&UrlSegmentGroup> {
		self.children.get(outlet)
	}

	pub fn primary(&self) -> Option<&UrlSegmentGroup> {
		self.child(PRIMARY_OUTLET)
	}

	/// Children with the primary outlet first, then named outlets by name.
	pub fn ordered_children(&self) -> Vec<(&str, &UrlSegmentGroup)> {
		let mut ordered = Vec::with_capacity(self.children.len());
		if let Some(primary) = self.primary() {
			ordered.push((PRIMARY_OUTLET, primary));
		}
		ordered.extend(
			self.children
				.iter()
				.filter(|(name, _)| name.as_str() != PRIMARY_OUTLET)
				.map(|(name, group)| (name.as_str(), group)),
		);
		ordered
	}

	/// Looks up a descendant by the outlet names leading to it.
	pub fn descendant(&self, outlet_path: &[String]) -> Option<&UrlSegmentGroup> {
		outlet_path
			.iter()
			.try_fold(self, |group, outlet| group.children.get(outlet))
	}
}

impl fmt::Display for UrlSegmentGroup {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&serialize_paths(self))
	}
}

/// A parsed URL: root group, query parameters, and fragment.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UrlTree {
	pub root: UrlSegmentGroup,
	pub query_params: QueryParams,
	pub fragment: Option<String>,
}

impl UrlTree {
	pub fn new(root: UrlSegmentGroup, query_params: QueryParams, fragment: Option<String>) -> Self {
		Self {
			root,
			query_params,
			fragment,
		}
	}

	/// Parses `url` with the [`DefaultUrlSerializer`].
	pub fn parse(url: &str) -> Result<Self, UrlTreeError> {
		DefaultUrlSerializer.parse(url)
	}

	/// Returns the first value of a query parameter.
	pub fn query_param(&self, name: &str) -> Option<&str> {
		self.query_params.get(name).and_then(QueryValue::first)
	}

	/// Flattens the primary outlet chain into a segment list.
	pub fn primary_segments(&self) -> Vec<&UrlSegment> {
		let mut segments: Vec<&UrlSegment> = self.root.segments.iter().collect();
		let mut current = self.root.primary();
		while let Some(group) = current {
			segments.extend(group.segments.iter());
			current = group.primary();
		}
		segments
	}
}

impl fmt::Display for UrlTree {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&DefaultUrlSerializer.serialize(self))
	}
}

impl FromStr for UrlTree {
	type Err = UrlTreeError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::parse(s)
	}
}
