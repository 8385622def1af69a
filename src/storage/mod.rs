//! Object storage module
//!
//! Handles avatar image upload and removal.

mod avatar;

pub use avatar::{AvatarFormat, AvatarStore, LocalAvatarStore, MAX_AVATAR_BYTES};
