//! The core module holds the error type, the allocator settings and initialization helpers.

pub mod app_info;
pub mod error;
pub mod init;
