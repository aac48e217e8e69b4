//! Navigation commands and their application to a segment-group tree.
//!
//! Commands are what `navigate(["team", 33, "user", 11])` receives: a mix of
//! path strings, matrix-parameter maps, and `{outlets: ...}` objects. They are
//! applied relative to a position in an existing [`UrlSegmentGroup`] tree,
//! identified by the outlet names leading from the root to that group.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::{CommandError, CommandResult};
use crate::tree::{PRIMARY_OUTLET, Params, QueryParams, UrlSegment, UrlSegmentGroup, UrlTree};

/// A single navigation command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
	/// A path string. Only the first command is split on `/`.
	Path(String),
	/// Matrix parameters for the preceding (or current) segment.
	Matrix(Params),
	/// Per-outlet commands. `None` removes the outlet.
	Outlets(BTreeMap<String, Option<Vec<Command>>>),
	/// A path string taken verbatim, never split.
	SegmentPath(String),
}

impl Command {
	/// Converts a dynamic command value.
	///
	/// Strings and numbers become paths, `{outlets: {...}}` becomes
	/// [`Command::Outlets`], `{segmentPath: "..."}` becomes
	/// [`Command::SegmentPath`], and any other object is a matrix-parameter map.
	pub fn from_value(index: usize, value: &Value) -> CommandResult<Self> {
		match value {
			Value::Null => Err(CommandError::NullishCommand { index }),
			Value::String(s) => Ok(Self::Path(s.clone())),
			Value::Number(n) => Ok(Self::Path(n.to_string())),
			Value::Bool(b) => Ok(Self::Path(b.to_string())),
			Value::Object(map) => {
				if let Some(outlets) = map.get("outlets") {
					let Value::Object(outlets) = outlets else {
						return Err(unsupported(index, value));
					};
					let mut parsed = BTreeMap::new();
					for (name, commands) in outlets {
						let commands = match commands {
							Value::Null => None,
							Value::String(s) => Some(s.split('/').map(|p| Self::Path(p.to_string())).collect()),
							Value::Array(items) => Some(Self::from_values(items)?),
							_ => return Err(unsupported(index, value)),
						};
						parsed.insert(name.clone(), commands);
					}
					return Ok(Self::Outlets(parsed));
				}
				if let Some(Value::String(path)) = map.get("segmentPath") {
					return Ok(Self::SegmentPath(path.clone()));
				}
				Ok(Self::Matrix(
					map.iter()
						.map(|(key, value)| (key.clone(), stringify(value)))
						.collect(),
				))
			}
			Value::Array(_) => Err(unsupported(index, value)),
		}
	}

	/// Converts a command array, failing fast on the first `null`.
	pub fn from_values(values: &[Value]) -> CommandResult<Vec<Self>> {
		if let Some(index) = values.iter().position(Value::is_null) {
			return Err(CommandError::NullishCommand { index });
		}
		values
			.iter()
			.enumerate()
			.map(|(index, value)| Self::from_value(index, value))
			.collect()
	}

	fn is_matrix(&self) -> bool {
		matches!(self, Self::Matrix(_))
	}

	fn is_outlets(&self) -> bool {
		matches!(self, Self::Outlets(_))
	}

	/// The path text, if this command names a segment.
	fn as_path(&self) -> Option<&str> {
		match self {
			Self::Path(p) | Self::SegmentPath(p) => Some(p),
			_ => None,
		}
	}
}

impl From<&str> for Command {
	fn from(path: &str) -> Self {
		Self::Path(path.to_string())
	}
}

fn stringify(value: &Value) -> String {
	match value {
		Value::String(s) => s.clone(),
		other => other.to_string(),
	}
}

fn unsupported(index: usize, value: &Value) -> CommandError {
	CommandError::Unsupported {
		index,
		value: value.to_string(),
	}
}

/// Normalized command list with its absolute/climbing prefix extracted.
#[derive(Debug)]
struct Navigation {
	is_absolute: bool,
	number_of_double_dots: usize,
	commands: Vec<Command>,
}

impl Navigation {
	fn new(is_absolute: bool, number_of_double_dots: usize, commands: Vec<Command>) -> CommandResult<Self> {
		if is_absolute && commands.first().is_some_and(Command::is_matrix) {
			return Err(CommandError::RootMatrixParams);
		}
		if let Some(position) = commands.iter().position(Command::is_outlets)
			&& position != commands.len() - 1
		{
			return Err(CommandError::OutletsNotLast);
		}
		Ok(Self {
			is_absolute,
			number_of_double_dots,
			commands,
		})
	}

	fn to_root(&self) -> bool {
		self.is_absolute && self.commands.len() == 1 && self.commands[0].as_path() == Some("/")
	}
}

fn compute_navigation(commands: &[Command]) -> CommandResult<Navigation> {
	if let [Command::Path(p)] = commands
		&& p == "/"
	{
		return Navigation::new(true, 0, commands.to_vec());
	}

	let mut number_of_double_dots = 0;
	let mut is_absolute = false;
	let mut res = Vec::with_capacity(commands.len());

	for (index, command) in commands.iter().enumerate() {
		match command {
			Command::SegmentPath(path) => res.push(Command::Path(path.clone())),
			Command::Path(path) if index == 0 => {
				for (part_index, part) in path.split('/').enumerate() {
					if part_index == 0 && part == "." {
						// current position
					} else if part_index == 0 && part.is_empty() {
						is_absolute = true;
					} else if part == ".." {
						number_of_double_dots += 1;
					} else if !part.is_empty() {
						res.push(Command::Path(part.to_string()));
					}
				}
			}
			other => res.push(other.clone()),
		}
	}

	Navigation::new(is_absolute, number_of_double_dots, res)
}

/// Where commands get applied: a group (by outlet path), whether its children
/// are processed, and the segment index to start at.
#[derive(Debug)]
struct Position {
	group_path: Vec<String>,
	process_children: bool,
	index: usize,
}

fn group_at<'a>(root: &'a UrlSegmentGroup, path: &[String]) -> CommandResult<&'a UrlSegmentGroup> {
	root.descendant(path).ok_or(CommandError::MissingTarget)
}

fn find_starting_position(
	nav: &Navigation,
	root: &UrlSegmentGroup,
	target_path: &[String],
) -> CommandResult<Position> {
	if nav.is_absolute || target_path.is_empty() {
		return Ok(Position {
			group_path: Vec::new(),
			process_children: true,
			index: 0,
		});
	}

	let target = group_at(root, target_path)?;
	let modifier = if nav.commands.first().is_some_and(Command::is_matrix) {
		0
	} else {
		1
	};
	let index = target.segments.len() as isize - 1 + modifier;
	position_applying_double_dots(root, target_path, index, nav.number_of_double_dots as isize)
}

fn position_applying_double_dots(
	root: &UrlSegmentGroup,
	target_path: &[String],
	index: isize,
	double_dots: isize,
) -> CommandResult<Position> {
	let mut path = target_path.to_vec();
	let mut ci = index;
	let mut dd = double_dots;
	while dd > ci {
		dd -= ci;
		if path.pop().is_none() {
			return Err(CommandError::InvalidDoubleDots);
		}
		ci = group_at(root, &path)?.segments.len() as isize;
	}
	Ok(Position {
		group_path: path,
		process_children: false,
		index: (ci - dd).max(0) as usize,
	})
}

fn outlets_of(commands: &[Command]) -> BTreeMap<String, Option<Vec<Command>>> {
	match commands.first() {
		Some(Command::Outlets(outlets)) => outlets.clone(),
		_ => BTreeMap::from([(PRIMARY_OUTLET.to_string(), Some(commands.to_vec()))]),
	}
}

fn update_segment_group(
	group: Option<&UrlSegmentGroup>,
	start_index: usize,
	commands: &[Command],
) -> CommandResult<UrlSegmentGroup> {
	let empty = UrlSegmentGroup::default();
	let group = group.unwrap_or(&empty);

	if group.segments.is_empty() && group.has_children() {
		return update_segment_group_children(group, start_index, commands);
	}

	let m = prefixed_with(group, start_index, commands);
	let sliced = &commands[m.command_index.min(commands.len())..];

	if m.matched && m.path_index < group.segments.len() {
		let primary = UrlSegmentGroup::new(group.segments[m.path_index..].to_vec(), group.children.clone());
		let g = UrlSegmentGroup::new(
			group.segments[..m.path_index].to_vec(),
			BTreeMap::from([(PRIMARY_OUTLET.to_string(), primary)]),
		);
		update_segment_group_children(&g, 0, sliced)
	} else if m.matched && sliced.is_empty() {
		Ok(UrlSegmentGroup::leaf(group.segments.clone()))
	} else if m.matched && !group.has_children() {
		create_new_segment_group(group, start_index, commands)
	} else if m.matched {
		update_segment_group_children(group, 0, sliced)
	} else {
		create_new_segment_group(group, start_index, commands)
	}
}

fn update_segment_group_children(
	group: &UrlSegmentGroup,
	start_index: usize,
	commands: &[Command],
) -> CommandResult<UrlSegmentGroup> {
	if commands.is_empty() {
		return Ok(UrlSegmentGroup::leaf(group.segments.clone()));
	}

	let outlets = outlets_of(commands);

	// named-outlet commands aimed at a group whose only child is an empty
	// primary apply to that child
	if outlets.keys().any(|o| o != PRIMARY_OUTLET)
		&& group.number_of_children() == 1
		&& group.primary().is_some_and(|p| p.segments.is_empty())
		&& let Some(primary) = group.primary()
	{
		let updated = update_segment_group_children(primary, start_index, commands)?;
		return Ok(UrlSegmentGroup::new(group.segments.clone(), updated.children));
	}

	let mut children = BTreeMap::new();
	for (outlet, outlet_commands) in &outlets {
		if let Some(outlet_commands) = outlet_commands {
			children.insert(
				outlet.clone(),
				update_segment_group(group.children.get(outlet), start_index, outlet_commands)?,
			);
		}
	}
	for (outlet, child) in &group.children {
		if !outlets.contains_key(outlet) {
			children.insert(outlet.clone(), child.clone());
		}
	}
	Ok(UrlSegmentGroup::new(group.segments.clone(), children))
}

struct PrefixMatch {
	matched: bool,
	path_index: usize,
	command_index: usize,
}

fn prefixed_with(group: &UrlSegmentGroup, start_index: usize, commands: &[Command]) -> PrefixMatch {
	let no_match = PrefixMatch {
		matched: false,
		path_index: 0,
		command_index: 0,
	};
	let mut command_index = 0;
	let mut path_index = start_index;

	while path_index < group.segments.len() {
		if command_index >= commands.len() {
			return no_match;
		}
		let segment = &group.segments[path_index];
		let command = &commands[command_index];
		// an outlets command may address other outlets too
		if command.is_outlets() {
			break;
		}
		let Some(curr) = command.as_path() else {
			return no_match;
		};
		match commands.get(command_index + 1) {
			Some(Command::Matrix(params)) => {
				if !compare(curr, params, segment) {
					return no_match;
				}
				command_index += 2;
			}
			_ => {
				if !compare(curr, &Params::new(), segment) {
					return no_match;
				}
				command_index += 1;
			}
		}
		path_index += 1;
	}

	PrefixMatch {
		matched: true,
		path_index,
		command_index,
	}
}

fn compare(path: &str, params: &Params, segment: &UrlSegment) -> bool {
	path == segment.path && params == &segment.parameters
}

fn create_new_segment_group(
	group: &UrlSegmentGroup,
	start_index: usize,
	commands: &[Command],
) -> CommandResult<UrlSegmentGroup> {
	let mut paths: Vec<UrlSegment> = group.segments[..start_index.min(group.segments.len())].to_vec();
	let mut i = 0;
	while i < commands.len() {
		match &commands[i] {
			Command::Outlets(outlets) => {
				return Ok(UrlSegmentGroup::new(paths, create_new_segment_children(outlets)?));
			}
			Command::Matrix(params) if i == 0 => {
				// a leading matrix map re-targets the segment at the start index
				let existing = group.segments.get(start_index).ok_or(CommandError::MissingTarget)?;
				paths.push(UrlSegment::new(existing.path.clone(), params.clone()));
				i += 1;
			}
			Command::Matrix(params) => {
				return Err(CommandError::Unsupported {
					index: i,
					value: format!("{params:?}"),
				});
			}
			command => {
				let curr = command.as_path().unwrap_or_default().to_string();
				match commands.get(i + 1) {
					Some(Command::Matrix(params)) if !curr.is_empty() => {
						paths.push(UrlSegment::new(curr, params.clone()));
						i += 2;
					}
					_ => {
						paths.push(UrlSegment::path(curr));
						i += 1;
					}
				}
			}
		}
	}
	Ok(UrlSegmentGroup::leaf(paths))
}

fn create_new_segment_children(
	outlets: &BTreeMap<String, Option<Vec<Command>>>,
) -> CommandResult<BTreeMap<String, UrlSegmentGroup>> {
	let mut children = BTreeMap::new();
	for (outlet, commands) in outlets {
		if let Some(commands) = commands {
			children.insert(
				outlet.clone(),
				create_new_segment_group(&UrlSegmentGroup::default(), 0, commands)?,
			);
		}
	}
	Ok(children)
}

fn replace_at(root: &UrlSegmentGroup, path: &[String], replacement: UrlSegmentGroup) -> UrlSegmentGroup {
	match path.split_first() {
		None => replacement,
		Some((outlet, rest)) => {
			let mut children = root.children.clone();
			if let Some(child) = root.children.get(outlet) {
				children.insert(outlet.clone(), replace_at(child, rest, replacement));
			}
			UrlSegmentGroup::new(root.segments.clone(), children)
		}
	}
}

/// Wraps a group that carries segments under a fresh root's primary outlet.
pub fn create_root(candidate: UrlSegmentGroup) -> UrlSegmentGroup {
	if candidate.segments.is_empty() {
		candidate
	} else {
		UrlSegmentGroup::new(
			Vec::new(),
			BTreeMap::from([(PRIMARY_OUTLET.to_string(), candidate)]),
		)
	}
}

/// Drops empty children and merges a lone primary child into its parent.
pub fn squash_segment_group(group: &UrlSegmentGroup) -> UrlSegmentGroup {
	let mut children = BTreeMap::new();
	for (outlet, child) in &group.children {
		let candidate = squash_segment_group(child);
		if !candidate.segments.is_empty() || candidate.has_children() {
			children.insert(outlet.clone(), candidate);
		}
	}
	merge_trivial_children(UrlSegmentGroup::new(group.segments.clone(), children))
}

fn merge_trivial_children(group: UrlSegmentGroup) -> UrlSegmentGroup {
	if group.number_of_children() == 1
		&& let Some(primary) = group.children.get(PRIMARY_OUTLET)
	{
		let mut segments = group.segments.clone();
		segments.extend(primary.segments.iter().cloned());
		return UrlSegmentGroup::new(segments, primary.children.clone());
	}
	group
}

fn finish(root_candidate: UrlSegmentGroup, query_params: QueryParams, fragment: Option<String>) -> UrlTree {
	UrlTree::new(create_root(squash_segment_group(&root_candidate)), query_params, fragment)
}

/// Applies `commands` relative to the group reached from `root` by
/// `relative_to` (outlet names; empty means the root itself).
///
/// ```
/// use reinhardt_url_tree::{Command, UrlTree, create_url_tree};
///
/// let current = UrlTree::parse("/team/33/user/11").unwrap();
/// let next = create_url_tree(
/// 	&current.root,
/// 	&["primary".to_string()],
/// 	&[Command::from("../22")],
/// 	Default::default(),
/// 	None,
/// )
/// .unwrap();
/// assert_eq!(next.to_string(), "/team/33/user/22");
/// ```
pub fn create_url_tree(
	root: &UrlSegmentGroup,
	relative_to: &[String],
	commands: &[Command],
	query_params: QueryParams,
	fragment: Option<String>,
) -> CommandResult<UrlTree> {
	if commands.is_empty() {
		return Ok(finish(root.clone(), query_params, fragment));
	}

	let nav = compute_navigation(commands)?;
	if nav.to_root() {
		return Ok(finish(UrlSegmentGroup::default(), query_params, fragment));
	}

	let position = find_starting_position(&nav, root, relative_to)?;
	let target = group_at(root, &position.group_path)?;
	let updated = if position.process_children {
		update_segment_group_children(target, position.index, &nav.commands)?
	} else {
		update_segment_group(Some(target), position.index, &nav.commands)?
	};

	Ok(finish(replace_at(root, &position.group_path, updated), query_params, fragment))
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	fn apply(current: &str, relative_to: &[&str], commands: Value) -> CommandResult<String> {
		let tree = UrlTree::parse(current).unwrap();
		let Value::Array(values) = commands else {
			panic!("commands must be an array");
		};
		let commands = Command::from_values(&values)?;
		let relative_to: Vec<String> = relative_to.iter().map(|s| s.to_string()).collect();
		create_url_tree(&tree.root, &relative_to, &commands, QueryParams::new(), None)
			.map(|t| t.to_string())
	}

	#[rstest]
	#[case(json!(["/"]), "/")]
	#[case(json!(["/team", 33]), "/team/33")]
	#[case(json!(["/team/33/user", 11]), "/team/33/user/11")]
	#[case(json!(["/team", {"open": true}]), "/team;open=true")]
	#[case(json!(["/", {"outlets": {"primary": "a", "aux": "chat"}}]), "/a(aux:chat)")]
	fn test_absolute(#[case] commands: Value, #[case] expected: &str) {
		assert_eq!(apply("/some/where", &[], commands).unwrap(), expected);
	}

	#[rstest]
	#[case(json!(["user", 22]), "/team/33/user/11/user/22")]
	#[case(json!(["../22"]), "/team/33/user/22")]
	#[case(json!(["../../44"]), "/team/33/44")]
	#[case(json!(["./details"]), "/team/33/user/11/details")]
	#[case(json!([{"tab": "2"}]), "/team/33/user/11;tab=2")]
	fn test_relative_to_primary(#[case] commands: Value, #[case] expected: &str) {
		assert_eq!(apply("/team/33/user/11", &["primary"], commands).unwrap(), expected);
	}

	#[rstest]
	fn test_relative_at_root_appends() {
		assert_eq!(apply("/team/33", &[], json!(["x"])).unwrap(), "/x");
	}

	#[rstest]
	fn test_outlets_update_keeps_other_outlets() {
		let url = apply(
			"/inbox/33(popup:compose)",
			&[],
			json!([{"outlets": {"popup": "help"}}]),
		)
		.unwrap();

		assert_eq!(url, "/inbox/33(popup:help)");
	}

	#[rstest]
	fn test_outlets_null_removes_outlet() {
		let url = apply(
			"/inbox/33(popup:compose)",
			&[],
			json!([{"outlets": {"popup": null}}]),
		)
		.unwrap();

		assert_eq!(url, "/inbox/33");
	}

	#[rstest]
	fn test_segment_path_is_not_split() {
		let url = apply("/", &[], json!(["/a", {"segmentPath": "b/c"}])).unwrap();

		assert_eq!(url, "/a/b%2Fc");
	}

	#[rstest]
	fn test_null_command_fails_fast() {
		assert_eq!(
			apply("/", &[], json!(["a", null])).unwrap_err(),
			CommandError::NullishCommand { index: 1 }
		);
	}

	#[rstest]
	fn test_too_many_double_dots() {
		assert_eq!(
			apply("/a", &["primary"], json!(["../../../b"])).unwrap_err(),
			CommandError::InvalidDoubleDots
		);
	}

	#[rstest]
	fn test_root_matrix_params_rejected() {
		assert_eq!(
			apply("/a", &[], json!(["/", {"x": 1}])).unwrap_err(),
			CommandError::RootMatrixParams
		);
	}

	#[rstest]
	fn test_outlets_must_be_last() {
		assert_eq!(
			apply("/a", &[], json!(["/", {"outlets": {"aux": "b"}}, "c"])).unwrap_err(),
			CommandError::OutletsNotLast
		);
	}

	#[rstest]
	fn test_no_commands_keeps_path_and_replaces_query() {
		let tree = UrlTree::parse("/a/b?x=1").unwrap();
		let mut query = QueryParams::new();
		query.insert("y".into(), "2".into());

		let next = create_url_tree(&tree.root, &[], &[], query, Some("f".into())).unwrap();

		assert_eq!(next.to_string(), "/a/b?y=2#f");
	}
}
