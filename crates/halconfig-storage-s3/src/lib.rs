//! S3-compatible object store backend for the halconfig staging engine.
//!
//! Works against AWS S3 and any service speaking its API (R2, MinIO, GCS
//! interoperability endpoints) through a custom endpoint.

mod credentials;
mod object_store;

pub use credentials::KeyFile;
pub use object_store::{ObjectStoreSettings, ObjectStoreStorage, CONTENT_TYPE};
