pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod gallery;
pub mod provider;
pub mod realtime;
pub mod server;
pub mod service;
pub mod storage;
pub(crate) mod utils;

pub use error::{GalleryError, ImagegenError, ProviderError, StorageError};
