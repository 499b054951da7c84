//! # Middleware
//!
//! - `auth`: rejects requests without a valid session token
//! - `rate_limit`: global token-bucket limit on the protocol endpoints

pub mod auth;
pub mod rate_limit;
