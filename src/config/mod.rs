pub mod loader;
pub mod schema;

pub use loader::{load_from_path, load_from_str, ConfigError};
pub use schema::{
    ConfigFile, PatcherOptions, PatcherSection, ValidationError, ValidationIssue, MAX_VERBOSITY,
};
