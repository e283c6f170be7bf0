mod sessions;
mod token;

pub use sessions::{AuthUser, SessionResolver};
pub use token::{generate_request_id, generate_session_token};
