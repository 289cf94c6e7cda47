//! Core types for the halconfig staging engine.
//!
//! This crate defines what the engine and the storage backends share:
//! - `StorageBackend`: byte-stream read and text write of a named object
//! - `ConfigTree`: the parsed document as a linked node arena
//! - `Schema`: declared node shapes, including which fields hold local files
//! - `link`: parent linking of freshly built or mutated trees
//! - `collect`: discovery of local files referenced by a tree

pub mod collect;
mod error;
pub mod link;
mod schema;
mod storage;
mod tree;

pub use collect::collect_local_files;
pub use error::{CollectError, SchemaError, StorageError, TreeError};
pub use schema::{halconfig_schema, FieldKind, Schema, SchemaBuilder, Shape, ShapeDef, ShapeId};
pub use storage::{ObjectStream, StorageBackend};
pub use tree::{Children, ConfigTree, Node, NodeId, NodeValue, Scalar, Walk};
