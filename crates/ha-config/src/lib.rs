//! hapair config
//!
//! Settings loading, heat user-data properties and template rendering.

pub mod settings;
pub mod template;
pub mod user_data;

pub use settings::{
    DaemonSettings, HaConfig, SelfAddress, ServiceManagerKind, TemplatePaths,
    DEFAULT_CONFIG_PATH,
};
pub use template::{variables, TemplateRenderer};
pub use user_data::{apply_properties, load_properties, parse_properties, UserProperties};
