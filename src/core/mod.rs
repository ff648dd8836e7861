pub mod adapter;

pub use crate::core::adapter::{ArchiveMode, PerpetualAdapter};
pub use crate::domain::ports::{ArchiveService, FilesystemAdapter};
pub use crate::utils::error::Result;
