//! Typed response outputs, one module per resource.

mod bucket;
mod list;
mod multipart;
mod object;

pub use bucket::{CreateBucketOutput, HeadBucketOutput, ListBucketsOutput};
pub use list::{ListObjectsOutput, ListObjectsV2Output};
pub use multipart::{
    AbortMultipartUploadOutput, CompleteMultipartUploadOutput, CreateMultipartUploadOutput,
    ListPartsOutput, UploadPartOutput,
};
pub use object::{
    CopyObjectOutput, DeleteObjectOutput, GetObjectOutput, HeadObjectOutput, PutObjectOutput,
};
