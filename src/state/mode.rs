//! Mutation mode flags and their per-call overrides.

use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};

/// Instance-level mutation modes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Modes {
    /// Index every committed state.
    pub index: bool,
    /// Expect mutators to return pending mutations.
    pub asynchronous: bool,
}

impl Modes {
    /// Apply per-call overrides. `None` inherits, `Some` wins in either
    /// direction.
    pub fn resolve(self, config: SetConfig) -> Modes {
        Modes {
            index: config.index.unwrap_or(self.index),
            asynchronous: config.asynchronous.unwrap_or(self.asynchronous),
        }
    }
}

/// Per-call overrides for `set`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetConfig {
    #[serde(default)]
    pub index: Option<bool>,
    #[serde(default)]
    pub asynchronous: Option<bool>,
}

impl SetConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn indexed() -> Self {
        Self::default().with_index(true)
    }

    pub fn unindexed() -> Self {
        Self::default().with_index(false)
    }

    pub fn asynchronous() -> Self {
        Self::default().with_asynchronous(true)
    }

    pub fn synchronous() -> Self {
        Self::default().with_asynchronous(false)
    }

    pub fn with_index(mut self, index: bool) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_asynchronous(mut self, asynchronous: bool) -> Self {
        self.asynchronous = Some(asynchronous);
        self
    }

    /// Parse overrides from a dynamic configuration value.
    ///
    /// `null` means no overrides. Anything else must be an object whose
    /// `index`/`asynchronous` keys, when present and non-null, are booleans.
    /// Other keys are ignored.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Null => Ok(Self::default()),
            serde_json::Value::Object(_) => Ok(Self::deserialize(value)?),
            other => Err(StoreError::InvalidArgument(format!(
                "config must be an object, got {}",
                other
            ))),
        }
    }
}
