// Infrastructure layer - External dependencies and adapters
pub mod chunked_json;
pub mod config;
pub mod firebase_repository;
pub mod http_response;
