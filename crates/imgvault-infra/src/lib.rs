//! imgvault infrastructure library
//!
//! Shared infrastructure components:
//! - Session and counter caches (Redis, in-process)
//! - Relation service client (authorization grants)
//! - Middleware (request ID)
//! - Telemetry initialization

pub mod cache;
pub mod middleware;
pub mod relation;
pub mod telemetry;

pub use cache::{
    create_cache, CacheError, CacheResult, Caches, CounterCache, MemoryCache, RedisCache,
    SessionCache,
};
pub use middleware::{get_request_id, request_id_middleware, RequestId};
pub use relation::{KetoRelationClient, RelationError, RelationResult, RelationService};
pub use telemetry::{init_telemetry, shutdown_telemetry};
