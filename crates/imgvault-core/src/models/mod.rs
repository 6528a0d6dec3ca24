//! Data models for the upload lifecycle
//!
//! - `upload`: upload requests and the session that remembers issued URLs
//! - `asset`: what the hosting service reports and what the document store keeps
//! - `grant`: authorization relation tuples

mod asset;
mod grant;
mod upload;

pub use asset::*;
pub use grant::*;
pub use upload::*;
