//! URL segment trees for Reinhardt navigation.
//!
//! Parses URL strings such as `/team/33;open=true(aux:chat)?q=1#top` into a
//! [`UrlTree`], serializes trees back, applies navigation [`Command`]s, and
//! answers "is this URL active" via [`contains_tree`].
//!
//! ## Example
//!
//! ```
//! use reinhardt_url_tree::{DefaultUrlSerializer, UrlSerializer};
//!
//! let serializer = DefaultUrlSerializer;
//! let tree = serializer.parse("/inbox/33(popup:compose)").unwrap();
//! assert_eq!(tree.root.child("popup").unwrap().segments[0].path, "compose");
//! assert_eq!(serializer.serialize(&tree), "/inbox/33(popup:compose)");
//! ```

pub mod commands;
pub mod contains;
pub mod encoding;
pub mod error;
mod parser;
pub mod serializer;
pub mod tree;

pub use commands::{Command, create_root, create_url_tree, squash_segment_group};
pub use contains::{FragmentMatchMode, IsActiveMatchOptions, ParamsMatchMode, PathMatchMode, contains_tree};
pub use error::{CommandError, CommandResult, UrlTreeError, UrlTreeResult};
pub use serializer::{DefaultUrlSerializer, UrlSerializer};
pub use tree::{PRIMARY_OUTLET, Params, QueryParams, QueryValue, UrlSegment, UrlSegmentGroup, UrlTree};
