//! Local filesystem storage backend for the halconfig staging engine.

mod local;

pub use local::LocalStorage;
