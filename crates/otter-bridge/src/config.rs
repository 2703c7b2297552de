//! Conversion settings.
//!
//! Settings can be built in code or loaded from TOML:
//!
//! ```toml
//! cycle_detection = "ancestors"
//! max_depth = 64            # 0 disables the limit
//! unit_class_names = ["kotlin.Unit"]
//! map_constructor = "Map"
//! set_constructor = "Set"
//! ```

use std::path::Path;

use serde::{Deserialize, Deserializer};

use crate::error::{BridgeError, BridgeResult};

/// Default nesting limit
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// How far up the container chain an element is compared for identity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleDetection {
    /// Only the immediately enclosing container
    #[default]
    Shallow,
    /// Every enclosing container
    Ancestors,
}

/// Conversion configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// Circular reference detection mode
    pub cycle_detection: CycleDetection,

    /// Maximum container nesting, `None` for unlimited
    #[serde(deserialize_with = "depth_limit")]
    pub max_depth: Option<usize>,

    /// Class names converted to `undefined`
    pub unit_class_names: Vec<String>,

    /// Global constructor used for host maps
    pub map_constructor: String,

    /// Global constructor used for host sets
    pub set_constructor: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            cycle_detection: CycleDetection::Shallow,
            max_depth: Some(DEFAULT_MAX_DEPTH),
            unit_class_names: vec!["kotlin.Unit".to_string()],
            map_constructor: "Map".to_string(),
            set_constructor: "Set".to_string(),
        }
    }
}

fn depth_limit<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<usize>, D::Error> {
    let depth = usize::deserialize(deserializer)?;
    Ok((depth > 0).then_some(depth))
}

impl BridgeConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cycle detection mode
    pub fn cycle_detection(mut self, mode: CycleDetection) -> Self {
        self.cycle_detection = mode;
        self
    }

    /// Set the nesting limit, `Some(0)` meaning unlimited as in TOML
    pub fn max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth.filter(|&depth| depth > 0);
        self
    }

    /// Add a class name converted to `undefined`
    pub fn unit_class(mut self, class_name: impl Into<String>) -> Self {
        self.unit_class_names.push(class_name.into());
        self
    }

    /// Set the global constructor used for host maps
    pub fn map_constructor(mut self, name: impl Into<String>) -> Self {
        self.map_constructor = name.into();
        self
    }

    /// Set the global constructor used for host sets
    pub fn set_constructor(mut self, name: impl Into<String>) -> Self {
        self.set_constructor = name.into();
        self
    }

    /// Parse and validate TOML text
    pub fn from_toml_str(text: &str) -> BridgeResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> BridgeResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| BridgeError::config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text).map_err(|e| match e {
            BridgeError::Config(message) => {
                BridgeError::config(format!("{}: {}", path.display(), message))
            }
            other => other,
        })
    }

    pub fn validate(&self) -> BridgeResult<()> {
        if self.max_depth == Some(0) {
            return Err(BridgeError::config("max_depth must be positive"));
        }
        if self.map_constructor.is_empty() || self.set_constructor.is_empty() {
            return Err(BridgeError::config("constructor names must not be empty"));
        }
        Ok(())
    }

    /// Returns `true` if values of `class_name` convert to `undefined`
    pub fn is_unit_class(&self, class_name: &str) -> bool {
        self.unit_class_names.iter().any(|name| name == class_name)
    }
}
