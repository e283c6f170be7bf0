//! Client-side view state for the gallery and profile pages.
//!
//! [`GalleryView`] holds the locally displayed snapshot and drives a [`GalleryBackend`].
//! Mutations are applied to the snapshot first and rolled back if the backend call fails.

mod backend;
mod http;
mod optimistic;
mod view;

pub use backend::GalleryBackend;
pub use http::HttpGalleryBackend;
pub use optimistic::apply_optimistic;
pub use view::GalleryView;
