mod admin;
mod error;
mod generate;
mod image;
mod profile;

pub use admin::{AdminProfileCreate, CreditTopUp, SessionIssue, SessionToken};
pub use error::ErrorBody;
pub use generate::{GenerateRequest, GenerateResponse};
pub use image::{ImageRecord, LikeRequest};
pub use profile::{AvatarPreset, AvatarSelection, Profile, ProfileChange, ProfileWithStats};
