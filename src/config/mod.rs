pub mod schema;

pub use schema::{
    Config, DEFAULT_KILL_MESSAGE, EnforcementConfig, FallbackMode, LoggingConfig, NotifyLevel,
    PlexConfig, PolicyConfig, RetryConfig, TautulliConfig,
};
