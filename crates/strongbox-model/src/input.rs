//! Typed request inputs, one module per resource.

mod bucket;
mod list;
mod multipart;
mod object;

pub use bucket::{CreateBucketInput, DeleteBucketInput, HeadBucketInput, ListBucketsInput};
pub use list::{ListObjectsInput, ListObjectsV2Input};
pub use multipart::{
    AbortMultipartUploadInput, CompleteMultipartUploadInput, CreateMultipartUploadInput,
    ListPartsInput, UploadPartInput,
};
pub use object::{
    CopyObjectInput, DeleteObjectInput, GetObjectInput, HeadObjectInput, PutObjectInput,
};
