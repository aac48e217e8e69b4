//! Recursive-descent URL parser.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::encoding::{decode, decode_query};
use crate::error::{UrlTreeError, UrlTreeResult};
use crate::tree::{PRIMARY_OUTLET, Params, QueryParams, QueryValue, UrlSegment, UrlSegmentGroup, UrlTree};

static SEGMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[^/()?;#]+").unwrap());
static MATRIX_PARAM_SEGMENT_RE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^[^/()?;=#]+").unwrap());
static QUERY_PARAM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[^=?&#]+").unwrap());
static QUERY_PARAM_VALUE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[^&#]+").unwrap());

fn leading<'a>(re: &Regex, input: &'a str) -> &'a str {
	re.find(input).map(|m| m.as_str()).unwrap_or("")
}

pub(crate) struct UrlParser<'a> {
	url: &'a str,
	remaining: &'a str,
}

impl<'a> UrlParser<'a> {
	pub(crate) fn new(url: &'a str) -> Self {
		Self {
			url,
			remaining: url,
		}
	}

	pub(crate) fn parse(mut self) -> UrlTreeResult<UrlTree> {
		let root = self.parse_root_segment()?;
		let query_params = self.parse_query_params()?;
		let fragment = self.parse_fragment()?;
		if fragment.is_none() && !self.remaining.is_empty() {
			return Err(UrlTreeError::TrailingInput {
				url: self.url.to_string(),
				remaining: self.remaining.to_string(),
			});
		}
		Ok(UrlTree::new(root, query_params, fragment))
	}

	fn parse_root_segment(&mut self) -> UrlTreeResult<UrlSegmentGroup> {
		self.consume_optional("/");
		if self.remaining.is_empty() || self.peek_starts_with("?") || self.peek_starts_with("#") {
			return Ok(UrlSegmentGroup::default());
		}
		// the root group never carries segments itself
		Ok(UrlSegmentGroup::new(Vec::new(), self.parse_children()?))
	}

	fn parse_query_params(&mut self) -> UrlTreeResult<QueryParams> {
		let mut params = QueryParams::new();
		if self.consume_optional("?") {
			loop {
				self.parse_query_param(&mut params)?;
				if !self.consume_optional("&") {
					break;
				}
			}
		}
		Ok(params)
	}

	fn parse_fragment(&mut self) -> UrlTreeResult<Option<String>> {
		if self.consume_optional("#") {
			let fragment = decode(self.remaining)?;
			self.remaining = "";
			Ok(Some(fragment))
		} else {
			Ok(None)
		}
	}

	fn parse_children(&mut self) -> UrlTreeResult<BTreeMap<String, UrlSegmentGroup>> {
		if self.remaining.is_empty() {
			return Ok(BTreeMap::new());
		}

		self.consume_optional("/");

		let mut segments = Vec::new();
		if !self.peek_starts_with("(") {
			segments.push(self.parse_segment()?);
		}

		while self.peek_starts_with("/") && !self.peek_starts_with("//") && !self.peek_starts_with("/(") {
			self.capture("/")?;
			segments.push(self.parse_segment()?);
		}

		let mut children = BTreeMap::new();
		if self.peek_starts_with("/(") {
			self.capture("/")?;
			children = self.parse_parens(true)?;
		}

		let mut res = BTreeMap::new();
		if self.peek_starts_with("(") {
			res = self.parse_parens(false)?;
		}

		if !segments.is_empty() || !children.is_empty() {
			res.insert(PRIMARY_OUTLET.to_string(), UrlSegmentGroup::new(segments, children));
		}

		Ok(res)
	}

	fn parse_segment(&mut self) -> UrlTreeResult<UrlSegment> {
		let path = leading(&SEGMENT_RE, self.remaining);
		if path.is_empty() && self.peek_starts_with(";") {
			return Err(UrlTreeError::EmptySegmentWithParameters {
				remaining: self.remaining.to_string(),
			});
		}
		self.capture(path)?;
		let path = decode(path)?;
		Ok(UrlSegment::new(path, self.parse_matrix_params()?))
	}

	fn parse_matrix_params(&mut self) -> UrlTreeResult<Params> {
		let mut params = Params::new();
		while self.consume_optional(";") {
			self.parse_param(&mut params)?;
		}
		Ok(params)
	}

	fn parse_param(&mut self, params: &mut Params) -> UrlTreeResult<()> {
		let key = leading(&MATRIX_PARAM_SEGMENT_RE, self.remaining);
		if key.is_empty() {
			return Ok(());
		}
		self.capture(key)?;

		let mut value = "";
		if self.consume_optional("=") {
			value = leading(&SEGMENT_RE, self.remaining);
			if !value.is_empty() {
				self.capture(value)?;
			}
		}

		params.insert(decode(key)?, decode(value)?);
		Ok(())
	}

	fn parse_query_param(&mut self, params: &mut QueryParams) -> UrlTreeResult<()> {
		let key = leading(&QUERY_PARAM_RE, self.remaining);
		if key.is_empty() {
			return Ok(());
		}
		self.capture(key)?;

		let mut value = "";
		if self.consume_optional("=") {
			value = leading(&QUERY_PARAM_VALUE_RE, self.remaining);
			if !value.is_empty() {
				self.capture(value)?;
			}
		}

		let key = decode_query(key)?;
		let value = decode_query(value)?;
		match params.get_mut(&key) {
			Some(existing) => existing.push(value),
			None => {
				params.insert(key, QueryValue::Single(value));
			}
		}
		Ok(())
	}

	/// Parses `(outlet:path//other:path)`. With `allow_primary`, an unnamed
	/// entry belongs to the primary outlet.
	fn parse_parens(&mut self, allow_primary: bool) -> UrlTreeResult<BTreeMap<String, UrlSegmentGroup>> {
		let mut segments = BTreeMap::new();
		self.capture("(")?;

		let mut closed = false;
		while !self.remaining.is_empty() {
			if self.consume_optional(")") {
				closed = true;
				break;
			}

			let path = leading(&SEGMENT_RE, self.remaining);
			match self.remaining[path.len()..].chars().next() {
				Some('/') | Some(')') | Some(';') => {}
				_ => {
					return Err(UrlTreeError::Expected {
						url: self.url.to_string(),
						expected: ")".to_string(),
						remaining: self.remaining.to_string(),
					});
				}
			}

			let outlet_name = match path.find(':') {
				Some(idx) => {
					let name = &path[..idx];
					self.capture(name)?;
					self.capture(":")?;
					name.to_string()
				}
				None if allow_primary => PRIMARY_OUTLET.to_string(),
				None => {
					return Err(UrlTreeError::Expected {
						url: self.url.to_string(),
						expected: "outlet:".to_string(),
						remaining: self.remaining.to_string(),
					});
				}
			};

			let mut children = self.parse_children()?;
			let group = if children.len() == 1 && children.contains_key(PRIMARY_OUTLET) {
				children.remove(PRIMARY_OUTLET).unwrap_or_default()
			} else {
				UrlSegmentGroup::new(Vec::new(), children)
			};
			segments.insert(outlet_name, group);
			self.consume_optional("//");
		}

		if !closed {
			return Err(UrlTreeError::Expected {
				url: self.url.to_string(),
				expected: ")".to_string(),
				remaining: self.remaining.to_string(),
			});
		}
		Ok(segments)
	}

	fn peek_starts_with(&self, s: &str) -> bool {
		self.remaining.starts_with(s)
	}

	fn consume_optional(&mut self, s: &str) -> bool {
		if self.peek_starts_with(s) {
			self.remaining = &self.remaining[s.len()..];
			true
		} else {
			false
		}
	}

	fn capture(&mut self, s: &str) -> UrlTreeResult<()> {
		if self.consume_optional(s) {
			Ok(())
		} else {
			Err(UrlTreeError::Expected {
				url: self.url.to_string(),
				expected: s.to_string(),
				remaining: self.remaining.to_string(),
			})
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn parse(url: &str) -> UrlTreeResult<UrlTree> {
		UrlParser::new(url).parse()
	}

	#[rstest]
	fn test_parse_root() {
		let tree = parse("/").unwrap();

		assert!(tree.root.segments.is_empty());
		assert!(!tree.root.has_children());
		assert!(tree.query_params.is_empty());
		assert_eq!(tree.fragment, None);
	}

	#[rstest]
	fn test_parse_segments_and_matrix_params() {
		// Act
		let tree = parse("/team/33;open=true;flag").unwrap();

		// Assert
		let primary = tree.root.primary().unwrap();
		assert_eq!(primary.segments.len(), 2);
		assert_eq!(primary.segments[0], UrlSegment::path("team"));
		assert_eq!(primary.segments[1].path, "33");
		assert_eq!(primary.segments[1].parameters.get("open"), Some(&"true".to_string()));
		assert_eq!(primary.segments[1].parameters.get("flag"), Some(&String::new()));
	}

	#[rstest]
	fn test_parse_secondary_outlets() {
		let tree = parse("/inbox/33(popup:compose//sidebar:help/topics)").unwrap();

		let popup = tree.root.child("popup").unwrap();
		let sidebar = tree.root.child("sidebar").unwrap();
		assert_eq!(popup.segments, vec![UrlSegment::path("compose")]);
		assert_eq!(
			sidebar.segments,
			vec![UrlSegment::path("help"), UrlSegment::path("topics")]
		);
		assert_eq!(tree.root.primary().unwrap().segments.len(), 2);
	}

	#[rstest]
	fn test_parse_nested_outlets_below_primary() {
		let tree = parse("/team/33/(user/victor//aux:chat)").unwrap();

		let team = tree.root.primary().unwrap();
		assert_eq!(team.primary().unwrap().segments[1].path, "victor");
		assert_eq!(team.child("aux").unwrap().segments[0].path, "chat");
	}

	#[rstest]
	fn test_parse_query_params_and_fragment() {
		let tree = parse("/a?x=1&y=hello+world&x=2&empty#sec%20tion").unwrap();

		assert_eq!(
			tree.query_params.get("x"),
			Some(&QueryValue::Multiple(vec!["1".into(), "2".into()]))
		);
		assert_eq!(tree.query_param("y"), Some("hello world"));
		assert_eq!(tree.query_param("empty"), Some(""));
		assert_eq!(tree.fragment.as_deref(), Some("sec tion"));
	}

	#[rstest]
	#[case("/a(b:c")]
	#[case("/a(b:c//d:e")]
	#[case("/a)b")]
	#[case("/a/;x=1")]
	#[case("/a%2")]
	#[case("/a?q=%zz")]
	#[case("/a(b)")]
	fn test_parse_malformed_input_fails(#[case] url: &str) {
		assert!(parse(url).is_err());
	}

	#[rstest]
	fn test_empty_fragment_is_present() {
		let tree = parse("/a#").unwrap();

		assert_eq!(tree.fragment.as_deref(), Some(""));
	}
}
