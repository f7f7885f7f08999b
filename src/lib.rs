#![allow(clippy::uninlined_format_args)]

pub mod api;
pub mod config;
pub mod data;
pub mod feed;
pub mod media;
pub mod model;
pub mod saves;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
