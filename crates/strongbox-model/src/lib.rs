//! Typed request/response shapes and error codes for the S3 wire
//! protocol operations Strongbox implements.

pub mod error;
pub mod input;
pub mod operations;
pub mod output;
pub mod request;
pub mod types;

pub use error::{S3Error, S3ErrorCode};
pub use operations::S3Operation;
pub use request::{Credentials, S3Request, StreamingBlob};
