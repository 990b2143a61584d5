//! Operator configuration
//!
//! Options come from a key/value store (a JSON object on disk, plus
//! `KEY=VALUE` overrides) and are read once, before rendering starts.
//! The settings panel describes which options an operator can edit.

use crate::profile::bandit::DEFAULT_Z_ZERO;
use crate::profile::ProfileOptions;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

pub const Z_ZERO_OPTION: &str = "BanditZZero";
pub const FAST_DRILL_OPTION: &str = "BanditFastDrill";

#[derive(Error, Debug)]
pub enum OptionError {
    #[error("invalid value {value:?} for option '{name}': {reason}")]
    Invalid {
        name: String,
        value: String,
        reason: String,
    },

    #[error("malformed override {0:?}, expected KEY=VALUE")]
    Override(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, OptionError>;

/// A stored option. Line edits hand over text, checkboxes booleans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl std::fmt::Display for OptionValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionValue::Bool(b) => write!(f, "{}", b),
            OptionValue::Number(n) => write!(f, "{}", n),
            OptionValue::Text(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionStore {
    values: BTreeMap<String, OptionValue>,
}

impl OptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load options from a JSON object file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let store: OptionStore = serde_json::from_str(&content)?;
        Ok(store)
    }

    pub fn set(&mut self, name: &str, value: OptionValue) {
        self.values.insert(name.to_string(), value);
    }

    /// Apply a `KEY=VALUE` override; the value is kept as text
    pub fn apply_override(&mut self, assignment: &str) -> Result<()> {
        match assignment.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                self.set(key.trim(), OptionValue::Text(value.trim().to_string()));
                Ok(())
            }
            _ => Err(OptionError::Override(assignment.to_string())),
        }
    }

    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.values.get(name)
    }

    pub fn get_float(&self, name: &str, default: f64) -> Result<f64> {
        let invalid = |value: &OptionValue, reason: &str| OptionError::Invalid {
            name: name.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        };

        match self.values.get(name) {
            None => Ok(default),
            Some(OptionValue::Number(n)) => Ok(*n),
            Some(v @ OptionValue::Text(s)) => {
                let s = s.trim();
                if s.is_empty() {
                    return Ok(default);
                }
                match s.parse::<f64>() {
                    Ok(n) if n.is_finite() => Ok(n),
                    _ => Err(invalid(v, "not a number")),
                }
            }
            Some(v @ OptionValue::Bool(_)) => Err(invalid(v, "expected a number")),
        }
    }

    pub fn get_bool(&self, name: &str, default: bool) -> Result<bool> {
        let invalid = |value: &OptionValue| OptionError::Invalid {
            name: name.to_string(),
            value: value.to_string(),
            reason: "expected true/false or 1/0".to_string(),
        };

        match self.values.get(name) {
            None => Ok(default),
            Some(OptionValue::Bool(b)) => Ok(*b),
            Some(OptionValue::Number(n)) if *n == 0.0 => Ok(false),
            Some(OptionValue::Number(n)) if *n == 1.0 => Ok(true),
            Some(v @ OptionValue::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "" => Ok(default),
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(invalid(v)),
            },
            Some(v) => Err(invalid(v)),
        }
    }
}

/// Options resolved for one export, with the problems that fell back to
/// a default
#[derive(Debug)]
pub struct Resolved {
    pub options: ProfileOptions,
    pub warnings: Vec<OptionError>,
}

/// Read the operator options into profile options. A bad Z zero falls back
/// to 100 and is reported; a bad fast-drill flag aborts.
pub fn resolve(store: &OptionStore, base: ProfileOptions) -> Result<Resolved> {
    let mut options = base;
    let mut warnings = Vec::new();

    options.z_zero_offset = match store.get_float(Z_ZERO_OPTION, DEFAULT_Z_ZERO) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("{}, using {}", e, DEFAULT_Z_ZERO);
            warnings.push(e);
            DEFAULT_Z_ZERO
        }
    };
    options.fast_drill = store.get_bool(FAST_DRILL_OPTION, false)?;

    tracing::debug!(
        z_zero = options.z_zero_offset,
        fast_drill = options.fast_drill,
        "options resolved"
    );

    Ok(Resolved { options, warnings })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PanelField {
    Numeric {
        name: String,
        label: String,
        default: String,
    },
    Checkbox {
        name: String,
        label: String,
        default: bool,
    },
}

impl PanelField {
    pub fn name(&self) -> &str {
        match self {
            PanelField::Numeric { name, .. } | PanelField::Checkbox { name, .. } => name,
        }
    }
}

/// Controls a host shows for this post-processor, bound by name to the
/// option store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettingsPanel {
    pub title: String,
    pub fields: Vec<PanelField>,
}

impl SettingsPanel {
    pub fn bandit() -> Self {
        Self {
            title: "BANDIT Controller".to_string(),
            fields: vec![
                PanelField::Numeric {
                    name: Z_ZERO_OPTION.to_string(),
                    label: "Z zero position".to_string(),
                    default: "100".to_string(),
                },
                PanelField::Checkbox {
                    name: FAST_DRILL_OPTION.to_string(),
                    label: "Enable fast drilling".to_string(),
                    default: false,
                },
            ],
        }
    }

    /// Store holding every field's default
    pub fn defaults(&self) -> OptionStore {
        let mut store = OptionStore::new();
        for field in &self.fields {
            let value = match field {
                PanelField::Numeric { default, .. } => OptionValue::Text(default.clone()),
                PanelField::Checkbox { default, .. } => OptionValue::Bool(*default),
            };
            store.set(field.name(), value);
        }
        store
    }
}

impl std::fmt::Display for SettingsPanel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.title)?;
        for field in &self.fields {
            match field {
                PanelField::Numeric { name, label, default } => {
                    writeln!(f, "  {} ({}): number, default {}", label, name, default)?
                }
                PanelField::Checkbox { name, label, default } => {
                    writeln!(f, "  {} ({}): checkbox, default {}", label, name, default)?
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_z_zero_default_and_override() {
        let store = OptionStore::new();
        assert_eq!(store.get_float(Z_ZERO_OPTION, 100.0).unwrap(), 100.0);

        let mut store = OptionStore::new();
        store.set(Z_ZERO_OPTION, OptionValue::Text("250".into()));
        assert_eq!(store.get_float(Z_ZERO_OPTION, 100.0).unwrap(), 250.0);

        store.set(Z_ZERO_OPTION, OptionValue::Number(87.5));
        assert_eq!(store.get_float(Z_ZERO_OPTION, 100.0).unwrap(), 87.5);
    }

    #[test]
    fn test_invalid_float() {
        let mut store = OptionStore::new();
        store.set(Z_ZERO_OPTION, OptionValue::Text("12mm".into()));
        let err = store.get_float(Z_ZERO_OPTION, 100.0).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid value \"12mm\" for option 'BanditZZero': not a number"
        );
    }

    #[test]
    fn test_bool_parsing() {
        let mut store = OptionStore::new();
        assert!(!store.get_bool(FAST_DRILL_OPTION, false).unwrap());

        for (text, expected) in [("1", true), ("0", false), ("true", true), ("False", false)] {
            store.set(FAST_DRILL_OPTION, OptionValue::Text(text.into()));
            assert_eq!(store.get_bool(FAST_DRILL_OPTION, false).unwrap(), expected);
        }

        store.set(FAST_DRILL_OPTION, OptionValue::Text("maybe".into()));
        assert!(matches!(
            store.get_bool(FAST_DRILL_OPTION, false),
            Err(OptionError::Invalid { .. })
        ));
    }

    #[test]
    fn test_resolve_falls_back_for_z_zero() {
        let mut store = OptionStore::new();
        store.set(Z_ZERO_OPTION, OptionValue::Text("abc".into()));
        store.set(FAST_DRILL_OPTION, OptionValue::Bool(true));

        let resolved = resolve(&store, ProfileOptions::default()).unwrap();
        assert_eq!(resolved.options.z_zero_offset, 100.0);
        assert!(resolved.options.fast_drill);
        assert_eq!(resolved.warnings.len(), 1);
    }

    #[test]
    fn test_resolve_rejects_bad_fast_drill() {
        let mut store = OptionStore::new();
        store.set(FAST_DRILL_OPTION, OptionValue::Text("sometimes".into()));
        assert!(resolve(&store, ProfileOptions::default()).is_err());
    }

    #[test]
    fn test_store_from_json_and_overrides() {
        let mut store: OptionStore =
            serde_json::from_str(r#"{ "BanditZZero": "180", "BanditFastDrill": true }"#).unwrap();
        assert_eq!(store.get_float(Z_ZERO_OPTION, 100.0).unwrap(), 180.0);
        assert!(store.get_bool(FAST_DRILL_OPTION, false).unwrap());

        store.apply_override("BanditZZero = 95.5").unwrap();
        assert_eq!(store.get_float(Z_ZERO_OPTION, 100.0).unwrap(), 95.5);
        assert!(matches!(
            store.apply_override("nonsense"),
            Err(OptionError::Override(_))
        ));
    }

    #[test]
    fn test_panel_defaults_resolve() {
        let panel = SettingsPanel::bandit();
        assert_eq!(panel.title, "BANDIT Controller");
        assert_eq!(panel.fields[0].name(), "BanditZZero");
        assert_eq!(panel.fields[1].name(), "BanditFastDrill");

        let resolved = resolve(&panel.defaults(), ProfileOptions::default()).unwrap();
        assert_eq!(resolved.options.z_zero_offset, 100.0);
        assert!(!resolved.options.fast_drill);
        assert!(resolved.warnings.is_empty());
    }

    #[test]
    fn test_panel_display() {
        let text = SettingsPanel::bandit().to_string();
        assert!(text.starts_with("BANDIT Controller\n"));
        assert!(text.contains("Z zero position (BanditZZero): number, default 100"));
        assert!(text.contains("Enable fast drilling (BanditFastDrill): checkbox, default false"));
    }
}
