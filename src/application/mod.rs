// Application layer - Store contract, query cache and use cases
pub mod cached_store;
pub mod control_service;
pub mod dashboard_service;
pub mod reading_store;
pub mod streaming_service;

#[cfg(test)]
pub(crate) mod testing;
