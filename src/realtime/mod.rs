//! In-process profile change feed.
//!
//! Subscribers register interest in one profile key and receive every change published for that
//! key until the subscription is dropped.

mod feed;

pub use feed::{ChangeFeed, ProfileSubscription};
