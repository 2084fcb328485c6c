pub mod cache;
pub mod middleware;

pub use cache::CacheService;
pub use middleware::{response_cache_middleware, ResponseCache};
