mod gallery;
mod imagegen;
mod provider;
mod storage;

pub use gallery::GalleryError;
pub use imagegen::ImagegenError;
pub use provider::ProviderError;
pub use storage::StorageError;
