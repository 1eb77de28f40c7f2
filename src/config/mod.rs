//! Configuration loading and validation
//!
//! Settings are loaded from a TOML file, validated, and hashed so a run can
//! detect configuration drift between invocations.

mod parser;
mod types;
mod validation;

pub use parser::{compute_config_hash, load_settings, load_settings_with_hash};
pub use types::{
    DispatchSettings, FilterSettings, RedirectSettings, RetrySettings, Settings, UserAgentConfig,
};
pub use validation::validate;
