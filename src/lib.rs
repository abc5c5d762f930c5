#![allow(clippy::uninlined_format_args)]

pub mod app;
pub mod auth;
pub mod classify;
pub mod config;
pub mod error;
pub mod media;
pub mod reddit;
pub mod sanitize;

pub use app::Pipeline;
pub use error::FetchError;
pub use media::{MediaPost, MediaType};
