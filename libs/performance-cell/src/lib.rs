// =====================================================================================
// PERFORMANCE CELL - RESPONSE CACHING
// =====================================================================================

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::*;
pub use router::performance_routes;
pub use services::{response_cache_middleware, CacheService, ResponseCache};
