//! Business services: authentication, uploads, email, design generation and caching.

pub mod auth;
pub mod blog_cache;
pub mod design;
pub mod email;
pub mod uploads;
