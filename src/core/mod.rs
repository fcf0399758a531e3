//! Page pipeline internals

pub mod builder;
pub mod compression;
pub mod encoding;
pub mod encryption;
pub mod error;
pub mod options;
pub mod payload;
pub mod restore;
pub mod script;
pub mod template;

pub use builder::{build_page_with_rng, PageBuilder};
pub use restore::{restore_document, RestoreState, Restorer};
