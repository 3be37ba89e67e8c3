// Domain-driven module structure for buildlog.

// Core infrastructure
pub mod conf;
pub mod source;
pub mod store;

// Domain modules
pub mod candidate;
pub mod parser;
pub mod runtime;
