//! Stack parameter merging
//!
//! Builds the parameter set submitted with a create or update from the
//! parameters a stack already has plus operator overrides.

use crate::error::{CloudError, Result};
use crate::model::{PARAM_USER_DATA, Parameter, REQUIRED_PARAMETERS};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Systemd drop-in that older bastion user data carried and that breaks the
/// current container runtime. Removed when user data is refreshed.
pub const DEFAULT_USER_DATA_STRIP: &str = r#"        - name: "10-cgroupfs.conf"
          content: |
            [Service]
            Environment="DOCKER_OPTS=--exec-opt=native.cgroupdriver=cgroupfs"
"#;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterValue {
    Value(String),
    /// Keep whatever the stack currently has
    UsePrevious,
}

impl std::fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParameterValue::Value(v) => f.write_str(v),
            ParameterValue::UsePrevious => f.write_str("(use previous value)"),
        }
    }
}

/// Parameters keyed by name, each key at most once
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet(BTreeMap<String, ParameterValue>);

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: ParameterValue) {
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&ParameterValue> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Keys marked to keep their previous value
    pub fn retained(&self) -> Vec<&str> {
        self.iter()
            .filter(|(_, v)| **v == ParameterValue::UsePrevious)
            .map(|(k, _)| k)
            .collect()
    }

    /// Required keys that have no explicit value
    pub fn missing_required(&self) -> Vec<&'static str> {
        REQUIRED_PARAMETERS
            .iter()
            .copied()
            .filter(|key| !matches!(self.0.get(*key), Some(ParameterValue::Value(_))))
            .collect()
    }
}

/// Operator supplied changes to a stack's parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterOverrides {
    pub values: BTreeMap<String, String>,
    /// Re-submit the current user data with the strip fragment removed
    pub refresh_user_data: bool,
    pub strip_fragment: String,
}

impl Default for ParameterOverrides {
    fn default() -> Self {
        Self {
            values: BTreeMap::new(),
            refresh_user_data: false,
            strip_fragment: DEFAULT_USER_DATA_STRIP.to_string(),
        }
    }
}

impl ParameterOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn with_user_data_refresh(mut self, fragment: impl Into<String>) -> Self {
        self.refresh_user_data = true;
        self.strip_fragment = fragment.into();
        self
    }
}

/// Merge a stack's current parameters with overrides
///
/// For an existing stack every current key is retained unless overridden.
/// For a new stack (`existing == None`) every required key needs a value.
pub fn merge(
    existing: Option<&[Parameter]>,
    overrides: &ParameterOverrides,
) -> Result<ParameterSet> {
    let mut set = ParameterSet::new();

    match existing {
        Some(current) => {
            for param in current {
                set.insert(param.key.clone(), ParameterValue::UsePrevious);
            }
            for (key, value) in &overrides.values {
                set.insert(key.clone(), ParameterValue::Value(value.clone()));
            }

            if overrides.refresh_user_data {
                let previous = current
                    .iter()
                    .find(|p| p.key == PARAM_USER_DATA)
                    .ok_or_else(|| {
                        CloudError::user_input("stack has no UserData parameter to refresh")
                    })?;
                let refreshed = refresh_user_data(&previous.value, &overrides.strip_fragment)?;
                set.insert(PARAM_USER_DATA, ParameterValue::Value(refreshed));
            }
        }
        None => {
            if overrides.refresh_user_data {
                return Err(CloudError::user_input(
                    "cannot refresh user data of a stack that does not exist",
                ));
            }
            for (key, value) in &overrides.values {
                set.insert(key.clone(), ParameterValue::Value(value.clone()));
            }

            let missing = set.missing_required();
            if !missing.is_empty() {
                return Err(CloudError::user_input(format!(
                    "missing required stack parameters: {}",
                    missing.join(", ")
                )));
            }
        }
    }

    Ok(set)
}

/// Decode base64 user data, strip the fragment, re-encode
pub fn refresh_user_data(encoded: &str, fragment: &str) -> Result<String> {
    let decoded = decode_user_data(encoded)?;
    Ok(STANDARD.encode(strip_known_fragment(&decoded, fragment)))
}

pub fn decode_user_data(encoded: &str) -> Result<String> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| CloudError::user_input(format!("UserData is not valid base64: {}", e)))?;
    String::from_utf8(bytes)
        .map_err(|e| CloudError::user_input(format!("UserData is not valid UTF-8: {}", e)))
}

/// Remove every occurrence of `fragment`, including ones formed by a removal
pub fn strip_known_fragment(payload: &str, fragment: &str) -> String {
    if fragment.is_empty() {
        return payload.to_string();
    }
    let mut out = payload.to_string();
    while out.contains(fragment) {
        out = out.replace(fragment, "");
    }
    out
}
