pub mod traits;

// Data service implementations
pub mod http;
