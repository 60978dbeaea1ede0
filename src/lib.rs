//! Vitrine: a self-hosted photo gallery.
//!
//! The public listener serves the profile, photo pages and albums; the admin listener
//! edits them. Profile and image reads go through the in-process caches in [`cache`], and
//! profile writes fan out to live observers through [`live`].

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod live;
