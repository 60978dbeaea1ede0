//! Application services layer.

pub mod admin;
pub mod albums;
pub mod error;
pub mod media;
pub mod photos;
pub mod profile;
pub mod repos;
