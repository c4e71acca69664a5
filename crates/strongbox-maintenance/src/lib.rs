//! Background maintenance: garbage collection, integrity scan/repair, and
//! cross-origin migration, run on demand by the admin surface.
//!
//! Every pass in this crate walks the same two stores the rest of Strongbox
//! writes through — [`strongbox_metadata::MetadataStore`] and
//! [`strongbox_store::FileStore`] — and never bypasses their own
//! consistency rules; a GC delete goes through [`strongbox_store::FileStore::delete_object`]
//! like any other delete, not a raw `std::fs::remove_file`.
//!
//! # Modules
//!
//! - [`gc`] - orphan file and abandoned upload cleanup
//! - [`integrity`] - row/file cross-reference scan and repair
//! - [`migration`] - [`migration::MigrationEngine`], pulling objects from a remote S3 endpoint
//! - [`error`] - [`MaintenanceError`]

pub mod error;
pub mod gc;
pub mod integrity;
pub mod migration;

pub use error::MaintenanceError;
pub use migration::MigrationEngine;
