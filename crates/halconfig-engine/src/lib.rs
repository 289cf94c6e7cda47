//! Staged configuration engine.
//!
//! A [`ConfigContext`] holds at most one parsed config tree between an
//! explicit load and an explicit save, targets either the primary or the
//! backup storage location, and garbage-collects staging directories against
//! the files the staged tree references.

mod cleaner;
mod context;
mod error;
mod layout;
mod switch;

pub use cleaner::CleanupReport;
pub use context::{default_document, ConfigContext, EngineOptions};
pub use error::{ConfigError, Severity};
pub use layout::ConfigLayout;
pub use switch::{BackupSwitch, Slot};
