//! # System Constants
//!
//! Defaults, well-known property names and route names shared across the pipeline.

/// Default delay between two poll iterations
pub const DEFAULT_POLLING_INTERVAL_MS: u64 = 1000;

/// Default capacity of a push source's ingress channel
pub const DEFAULT_PUSH_BUFFER_SIZE: usize = 1024;

/// Directory searched for configuration files when none is given
pub const DEFAULT_CONFIG_DIRECTORY: &str = "config";

/// File stem of the configuration files (`pipeline.yaml`, `pipeline.<env>.yaml`)
pub const CONFIG_FILE_STEM: &str = "pipeline";

/// Prefix of environment variable overrides
pub const ENV_PREFIX: &str = "PIPELINE";

/// Property names stamped on messages by built-in sources
pub mod properties {
    /// Timestamp at which a push source accepted the payload
    pub const RECEIVED_AT: &str = "received_at";
    /// Size in bytes of the raw payload accepted by a push source
    pub const CONTENT_LENGTH: &str = "content_length";
}

/// Names of host dispatch routes, used in logs and errors
pub mod routes {
    pub const START: &str = "start";
    pub const STOP: &str = "stop";
    pub const FORWARD: &str = "forward";
}

/// Names of notification channels, used in logs and errors
pub mod channels {
    pub const MESSAGE_RECEIVED: &str = "message_received";
    pub const ERROR: &str = "error";
}
