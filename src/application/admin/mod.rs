//! Application services for the administrative surface.

pub mod albums;
pub mod photos;
pub mod profile;

pub use albums::{AdminAlbumService, CreateAlbumCommand};
pub use photos::{AdminPhotoService, PhotoUpload};
pub use profile::{AdminProfileService, UploadTicket};
