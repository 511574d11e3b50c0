pub mod delivery;
pub mod event_bus;
pub mod rate_limiter;
pub mod result_cache;
