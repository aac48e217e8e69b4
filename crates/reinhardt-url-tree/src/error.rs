//! Error types for URL tree parsing and command application.

use thiserror::Error;

/// Errors raised while parsing a URL string into a [`UrlTree`](crate::UrlTree).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum UrlTreeError {
	/// The parser expected a specific token at the current position.
	#[error("Cannot parse url '{url}': expected '{expected}' at '{remaining}'")]
	Expected {
		/// The full input being parsed.
		url: String,
		/// The token that was expected.
		expected: String,
		/// Unconsumed input at the failure point.
		remaining: String,
	},

	/// A matrix parameter was attached to an empty path segment.
	#[error("Empty path url segment cannot have parameters: '{remaining}'")]
	EmptySegmentWithParameters {
		/// Unconsumed input at the failure point.
		remaining: String,
	},

	/// Input remained after the fragment-free URL was fully consumed.
	#[error("Cannot parse url '{url}': unexpected input '{remaining}'")]
	TrailingInput {
		/// The full input being parsed.
		url: String,
		/// Unconsumed input.
		remaining: String,
	},

	/// A `%` escape was not followed by two hexadecimal digits or decoded to invalid UTF-8.
	#[error("Invalid percent-encoding in '{0}'")]
	InvalidEncoding(String),
}

/// Errors raised while turning navigation commands into a new tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum CommandError {
	/// A command array contained `null`.
	#[error("The requested path contains null segment at index {index}")]
	NullishCommand {
		/// Position of the offending command.
		index: usize,
	},

	/// A command value had a shape that cannot be interpreted.
	#[error("Unsupported navigation command at index {index}: {value}")]
	Unsupported {
		/// Position of the offending command.
		index: usize,
		/// The rejected value, serialized.
		value: String,
	},

	/// The root segment cannot carry matrix parameters.
	#[error("Root segment cannot have matrix parameters")]
	RootMatrixParams,

	/// An `{outlets: ...}` command was not the final command.
	#[error("{{outlets:{{}}}} has to be the last command")]
	OutletsNotLast,

	/// `..` climbed above the root group.
	#[error("Invalid number of '../'")]
	InvalidDoubleDots,

	/// The relative position no longer exists in the tree.
	#[error("Cannot find the segment group to navigate relative to")]
	MissingTarget,
}

/// Result alias for parse operations.
pub type UrlTreeResult<T> = Result<T, UrlTreeError>;

/// Result alias for command application.
pub type CommandResult<T> = Result<T, CommandError>;
