pub mod context_service;
pub mod insight_service;
pub mod metrics_service;
pub mod rotation_service;
