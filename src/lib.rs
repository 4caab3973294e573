//! OpenOCD monitor - main library
//!
//! ## Architecture
//!
//! - **bin_common**: configuration, logging and CLI helpers for the binary
//! - **ocdlink**: Tcl RPC client (re-exported from workspace)
//!
//! ## Usage in Binaries
//!
//! ```rust
//! use ocd_monitor::bin_common::{load_config_from_env, ConfigType};
//! use ocd_monitor::ocdlink::OcdClient;
//! ```

// Re-export workspace libraries for convenience
pub use ocdlink;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;
    pub mod config;
    pub mod logging;

    pub use cli::{load_config_from_env, parse_args, ConfigType};
    pub use config::{ConfigError, MonitorConfig, ReconnectConfig, ServerConfig, WatchedRegion};
    pub use logging::init_logging_with_level;
}
