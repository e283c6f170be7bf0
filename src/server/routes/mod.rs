pub mod admin;
pub mod generate;
pub mod images;
pub mod profile;
