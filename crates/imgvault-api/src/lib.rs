//! imgvault API library
//!
//! HTTP handlers, the upload lifecycle services and application setup.

mod api_doc;
pub mod constants;
pub mod error;
pub mod extractors;
mod handlers;
pub mod services;
pub mod setup;
pub mod state;

pub use api_doc::ApiDoc;
pub use error::{ErrorResponse, HttpAppError};
