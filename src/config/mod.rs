/// Database configuration and connection management
pub mod database;

/// Engine behavior switches loaded from a TOML file
pub mod engine;
