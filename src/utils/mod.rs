//! Utility modules for the preview server.

pub mod exec;
pub mod hash;
pub mod html;
pub mod mime;
