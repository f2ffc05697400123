pub mod analytics;
pub mod holding;
pub mod insight;
pub mod news;
pub mod settings;
