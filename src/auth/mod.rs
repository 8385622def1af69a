//! Token authentication
//!
//! Handles:
//! - Signed bearer tokens
//! - Caller identity extractors

mod middleware;
pub mod token;

pub use middleware::{CurrentUser, MaybeUser};
pub use token::{TokenClaims, TokenCodec};
