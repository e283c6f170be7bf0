pub mod api;
pub mod provider;

pub use api::{
    AdminProfileCreate, AvatarPreset, AvatarSelection, CreditTopUp, ErrorBody, GenerateRequest,
    GenerateResponse, ImageRecord, LikeRequest, Profile, ProfileChange, ProfileWithStats,
    SessionIssue, SessionToken,
};
pub use provider::{ChatImageRequest, ChatImageResponse, ProviderJob, ProviderJobStatus};
