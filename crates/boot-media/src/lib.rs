//! Boot media
//!
//! Decides how the remote controller fetches an installation image:
//!
//! - `ImageReference`: a URL the controller can fetch directly, or a path on
//!   this host
//! - `EphemeralImageServer`: serves a local image's directory over HTTP for
//!   as long as the guard is alive
//! - `ResolvedImageAddress`: the URL handed to the controller either way

pub mod error;
pub mod http;
pub mod image;

pub use error::BootMediaError;
pub use http::EphemeralImageServer;
pub use image::{ImageReference, LocalImage, ResolvedImageAddress};
pub use reqwest::Url;
