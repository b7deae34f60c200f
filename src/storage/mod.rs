pub mod engine;
pub mod object;
pub mod local;
pub mod s3;

pub use engine::*;
pub use object::*;
pub use local::LocalClient;
pub use s3::S3Client;
