//! Hardware drivers
//!
//! The LiteSDCard controller driver and the block-device contract it
//! implements for the filesystem layer.

pub mod block;
pub mod sdcard;
