//! # confmix - combined configuration
//!
//! Merge many configuration sources (files, environment, in-memory trees) into one read-only view.
//!
//! ## Introduction for developers
//!
//! Read this to understand how `confmix` works internally.
//!
//! ### Trees
//!
//! Every source is a tree of [node::Node]s. A node has a name, an optional value, ordered children
//! and named attributes. Repeated children with the same name form a list.
//!
//! ```text
//! root
//! ├── db
//! │   ├── host = "alpha"
//! │   └── port = 5432
//! └── server [@id = "a"]
//!     └── port = 8080
//! ```
//!
//! Values are addressed with [key::Key]s such as `db.host`, `server(0).port` or `server[@id]`.
//!
//! ### Sources
//!
//! Anything implementing [source::ConfigSource] can take part: it hands out a snapshot of its
//! tree and an [event::EventSource] listeners can subscribe to.
//!
//! - [hierarchical::HierarchicalConfig]: in-memory, edited through keys
//! - [sources::FileSource]: `properties`, `json`, `yaml` or `hcl` file
//! - [sources::EnvSource]: environment variables
//! - [combined::CombinedView]: itself a source, so views nest
//!
//! ### Combining
//!
//! A [combined::CombinedView] holds an ordered list of sources and a [combiner::NodeCombiner].
//! On the first read after a change it folds all source trees with the combiner:
//!
//! ```text
//! merged = combine(combine(local, source_0), source_1) ...
//! ```
//!
//! - [combiner::OverrideCombiner]: earlier sources shadow later ones
//! - [combiner::UnionCombiner]: everything from both sides is kept
//!
//! Node names registered as list nodes are never merged, their occurrences are concatenated.
//!
//! Every node of the merged tree remembers which registration it came from. That is how
//! [combined::CombinedView::get_source] answers "which source defines this key".
//!
//! ### Invalidation
//!
//! The view subscribes to every registered source. An after-update event of a source (or any
//! change to the view itself) drops the merged tree and fires an `Invalidate` event, which in turn
//! invalidates views that contain this one.
//!
//! ### Definitions
//!
//! A [definition::Definition] is an HCL document declaring sources. [provider::ConfigBuilder]
//! looks up a [provider::SourceProvider] per declaration tag and assembles the resulting view.
pub mod combined;
pub mod combiner;
pub mod definition;
pub mod error;
pub mod event;
pub mod hierarchical;
pub mod key;
pub mod node;
pub mod provider;
pub mod source;
pub mod sources;
mod util;
pub mod value;

pub use error::{Error, Result};
