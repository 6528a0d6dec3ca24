//! imgvault hosting library
//!
//! Abstraction over the external image hosting service and its Cloudflare
//! Images implementation.
//!
//! The service issues pre-signed direct upload URLs, reports what was uploaded
//! and deletes images. Requests authenticate with a bearer token obtained from
//! a [`CredentialProvider`]: either the static account API token, or a
//! short-lived batch token that is cached until it expires.

pub mod cloudflare;
pub mod credentials;
pub mod factory;
pub mod traits;

pub use cloudflare::CloudflareImages;
pub use credentials::{
    CachedCredential, CloudflareBatchTokenIssuer, CredentialProvider, IssuedToken,
    StaticCredential, TokenIssuer,
};
pub use factory::create_hosting_service;
pub use traits::{HostingError, HostingResult, HostingService};
