// Domain layer - Plain data shared by the engine and the services
pub mod dashboard;
pub mod events;
pub mod tank;
pub mod telemetry;
