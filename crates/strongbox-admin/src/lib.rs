//! Admin surface: sessions, login rate limiting, and bucket/api-key/audit
//! operations for the Strongbox admin UI.
//!
//! This crate calls through to [`strongbox_metadata::MetadataStore`] and
//! [`strongbox_store::FileStore`] via the stable, method-level contract
//! described in [`AdminCore`]; the admin UI's own HTTP/JSON shape is out of
//! scope here, same as the S3 wire surface is out of scope for
//! `strongbox-http`'s [`strongbox_http::dispatch::S3Handler`] trait.
//!
//! # Modules
//!
//! - [`core`] - [`AdminCore`], the method-level contract the admin UI calls
//! - [`session`] - [`session::SessionStore`], server-side session tokens
//! - [`ratelimit`] - [`ratelimit::LoginRateLimiter`], per-IP login throttling
//! - [`error`] - [`AdminError`]

pub mod core;
pub mod error;
pub mod ratelimit;
pub mod session;

pub use core::AdminCore;
pub use error::AdminError;
