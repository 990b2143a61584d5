//! Placeholder registry
//!
//! Maps template tokens (`X`, `Z_ZERO`, ...) to the machine state field
//! they read and the way the value is written out.

use crate::state::{Field, MachineState};
use crate::template::{Template, LINE_NUMBER};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("token [{token}] already reads '{existing}', cannot register it for '{requested}'")]
    DuplicateToken {
        token: String,
        existing: String,
        requested: String,
    },

    #[error("unknown token [{token}] in template {template:?}")]
    UnknownToken { token: String, template: String },

    #[error("token [{0}] is reserved for line numbers")]
    Reserved(String),
}

pub type Result<T> = std::result::Result<T, RegistryError>;

/// Decimal places for a placeholder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Decimals {
    /// Use the profile setting
    #[default]
    Default,
    Fixed(u8),
}

/// Zero handling for a placeholder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NumberStyle {
    /// Use the profile setting
    #[default]
    Default,
    TrailingZeroes,
    StripZeroes,
}

/// Profile-wide number formatting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberFormat {
    pub decimals: u8,
    pub trailing_zeroes: bool,
}

impl NumberFormat {
    /// Smallest distance that still changes the written value
    pub fn resolution(&self) -> f64 {
        0.5 * 10f64.powi(-i32::from(self.decimals))
    }
}

impl Default for NumberFormat {
    fn default() -> Self {
        Self {
            decimals: 3,
            trailing_zeroes: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Placeholder {
    pub field: Field,
    pub token: String,
    /// Write the value even when it did not change (or is missing)
    pub always_emit: bool,
    pub prefix: String,
    pub decimals: Decimals,
    pub style: NumberStyle,
}

impl Placeholder {
    pub fn new(field: Field, token: &str, always_emit: bool, prefix: &str) -> Self {
        Self {
            field,
            token: token.to_string(),
            always_emit,
            prefix: prefix.to_string(),
            decimals: Decimals::Default,
            style: NumberStyle::Default,
        }
    }

    pub fn with_decimals(mut self, decimals: Decimals) -> Self {
        self.decimals = decimals;
        self
    }

    pub fn with_style(mut self, style: NumberStyle) -> Self {
        self.style = style;
        self
    }

    /// Value text without prefix, `None` when there is nothing to write
    pub fn value_text(&self, state: &MachineState, defaults: &NumberFormat) -> Option<String> {
        let value = match state.get(&self.field) {
            Some(v) => v,
            None if self.always_emit => 0.0,
            None => return None,
        };

        let decimals = match self.decimals {
            Decimals::Default => defaults.decimals,
            Decimals::Fixed(n) => n,
        };
        let trailing_zeroes = match self.style {
            NumberStyle::Default => defaults.trailing_zeroes,
            NumberStyle::TrailingZeroes => true,
            NumberStyle::StripZeroes => false,
        };

        Some(format_number(value, decimals, trailing_zeroes))
    }
}

/// Fixed-point formatting. Trailing zeroes matter on controllers that read
/// a bare integer as thousandths, so they are only stripped on request.
pub fn format_number(value: f64, decimals: u8, trailing_zeroes: bool) -> String {
    let mut s = format!("{:.*}", decimals as usize, value);

    // -0.000
    if s.starts_with('-') && s[1..].chars().all(|c| c == '0' || c == '.') {
        s.remove(0);
    }

    if !trailing_zeroes && s.contains('.') {
        let trimmed = s.trim_end_matches('0').trim_end_matches('.');
        s = trimmed.to_string();
    }

    s
}

#[derive(Debug, Clone, Default)]
pub struct Registry {
    placeholders: BTreeMap<String, Placeholder>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the motion placeholders every profile gets
    pub fn standard() -> Self {
        let mut registry = Self::new();
        let defs = [
            Placeholder::new(Field::X, "X", false, "X"),
            Placeholder::new(Field::Y, "Y", false, "Y"),
            Placeholder::new(Field::Z, "Z", false, "Z"),
            Placeholder::new(Field::Feed, "F", true, "F"),
            Placeholder::new(Field::I, "I", true, "I"),
            Placeholder::new(Field::J, "J", true, "J"),
            Placeholder::new(Field::CenterX, "IA", true, "I"),
            Placeholder::new(Field::CenterY, "JA", true, "J"),
            Placeholder::new(Field::FirstX, "X1", true, "X"),
            Placeholder::new(Field::FirstY, "Y1", true, "Y"),
            Placeholder::new(Field::Tool, "T", true, "T").with_decimals(Decimals::Fixed(0)),
        ];
        for def in defs {
            registry.placeholders.insert(def.token.clone(), def);
        }
        registry
    }

    /// Add a placeholder. Re-registering a token for the same field
    /// updates it; a different field is an error (use `replace`).
    pub fn register(&mut self, def: Placeholder) -> Result<()> {
        if def.token == LINE_NUMBER {
            return Err(RegistryError::Reserved(def.token));
        }
        if let Some(existing) = self.placeholders.get(&def.token) {
            if existing.field != def.field {
                return Err(RegistryError::DuplicateToken {
                    token: def.token.clone(),
                    existing: existing.field.to_string(),
                    requested: def.field.to_string(),
                });
            }
        }
        self.placeholders.insert(def.token.clone(), def);
        Ok(())
    }

    pub fn replace(&mut self, def: Placeholder) -> Result<Option<Placeholder>> {
        if def.token == LINE_NUMBER {
            return Err(RegistryError::Reserved(def.token));
        }
        Ok(self.placeholders.insert(def.token.clone(), def))
    }

    pub fn get(&self, token: &str) -> Option<&Placeholder> {
        self.placeholders.get(token)
    }

    pub fn contains(&self, token: &str) -> bool {
        token == LINE_NUMBER || self.placeholders.contains_key(token)
    }

    /// Check every token of a template resolves
    pub fn validate(&self, template: &Template) -> Result<()> {
        match template.tokens().find(|t| !self.contains(t)) {
            Some(token) => Err(RegistryError::UnknownToken {
                token: token.to_string(),
                template: template.source().to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Definition and value text (without prefix) for `token`, `None` when
    /// there is nothing to write. The renderer builds its words from this.
    pub fn word(
        &self,
        token: &str,
        state: &MachineState,
        defaults: &NumberFormat,
    ) -> Result<Option<(&Placeholder, String)>> {
        let def = self.get(token).ok_or_else(|| RegistryError::UnknownToken {
            token: token.to_string(),
            template: format!("[{}]", token),
        })?;
        Ok(def.value_text(state, defaults).map(|text| (def, text)))
    }

    /// Prefix + formatted value, or an empty string when absent. Unlike
    /// rendering, this has no modal memory.
    pub fn format(&self, token: &str, state: &MachineState, defaults: &NumberFormat) -> Result<String> {
        Ok(self
            .word(token, state, defaults)?
            .map(|(def, text)| format!("{}{}", def.prefix, text))
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_keeps_trailing_zeroes() {
        assert_eq!(format_number(1.5, 3, true), "1.500");
        assert_eq!(format_number(100.0, 3, true), "100.000");
        assert_eq!(format_number(-5.25, 3, true), "-5.250");
    }

    #[test]
    fn test_format_strips_zeroes_on_request() {
        assert_eq!(format_number(1.5, 3, false), "1.5");
        assert_eq!(format_number(2.0, 3, false), "2");
        assert_eq!(format_number(0.0004, 3, false), "0");
    }

    #[test]
    fn test_format_rounds_and_drops_negative_zero() {
        assert_eq!(format_number(1.23456, 3, true), "1.235");
        assert_eq!(format_number(-0.0001, 3, true), "0.000");
        assert_eq!(format_number(-0.0, 0, true), "0");
    }

    #[test]
    fn test_format_with_prefix() {
        let registry = Registry::standard();
        let mut state = MachineState::new();
        state.x = Some(12.5);
        let fmt = NumberFormat::default();

        assert_eq!(registry.format("X", &state, &fmt).unwrap(), "X12.500");
        // absent and not always emitted
        assert_eq!(registry.format("Y", &state, &fmt).unwrap(), "");
        // absent but always emitted
        assert_eq!(registry.format("X1", &state, &fmt).unwrap(), "X0.000");
    }

    #[test]
    fn test_placeholder_overrides() {
        let def = Placeholder::new(Field::Feed, "F", true, "F")
            .with_decimals(Decimals::Fixed(1))
            .with_style(NumberStyle::StripZeroes);
        let mut state = MachineState::new();
        state.feed = Some(800.0);
        assert_eq!(
            def.value_text(&state, &NumberFormat::default()).as_deref(),
            Some("800")
        );
    }

    #[test]
    fn test_tool_number_has_no_decimals() {
        let registry = Registry::standard();
        let mut state = MachineState::new();
        state.tool = Some(3);
        assert_eq!(
            registry.format("T", &state, &NumberFormat::default()).unwrap(),
            "T3"
        );
    }

    #[test]
    fn test_register_duplicate_token() {
        let mut registry = Registry::standard();
        let clash = Placeholder::new(Field::Custom("z_zero".into()), "Z", false, "Z");
        assert!(matches!(
            registry.register(clash.clone()),
            Err(RegistryError::DuplicateToken { .. })
        ));

        // same field just updates the definition
        let same = Placeholder::new(Field::Z, "Z", true, "K");
        registry.register(same).unwrap();
        assert_eq!(registry.get("Z").unwrap().prefix, "K");

        // explicit replacement is allowed
        let previous = registry.replace(clash).unwrap();
        assert_eq!(previous.map(|p| p.field), Some(Field::Z));
    }

    #[test]
    fn test_line_number_is_reserved() {
        let mut registry = Registry::new();
        let def = Placeholder::new(Field::Custom("n".into()), "N", false, "N");
        assert_eq!(
            registry.register(def),
            Err(RegistryError::Reserved("N".into()))
        );
        assert!(registry.contains("N"));
    }

    #[test]
    fn test_validate_unknown_token() {
        let registry = Registry::standard();
        let ok = Template::parse("[N] [X][Y]").unwrap();
        assert!(registry.validate(&ok).is_ok());

        let bad = Template::parse("[N] [Z_ZERO]").unwrap();
        assert_eq!(
            registry.validate(&bad),
            Err(RegistryError::UnknownToken {
                token: "Z_ZERO".into(),
                template: "[N] [Z_ZERO]".into(),
            })
        );
    }

    #[test]
    fn test_word_splits_prefix_from_text() {
        let registry = Registry::standard();
        let mut state = MachineState::new();
        state.center_x = Some(-2.0);
        let fmt = NumberFormat::default();

        let (def, text) = registry.word("IA", &state, &fmt).unwrap().unwrap();
        assert_eq!((def.field.clone(), def.prefix.as_str(), text.as_str()), (Field::CenterX, "I", "-2.000"));
        assert_eq!(registry.word("Z", &state, &fmt).unwrap(), None);
        assert!(registry.word("Q", &state, &fmt).is_err());
    }

    #[test]
    fn test_resolution_follows_decimals() {
        let three = NumberFormat::default();
        assert!((three.resolution() - 0.0005).abs() < 1e-12);
        let one = NumberFormat { decimals: 1, trailing_zeroes: true };
        assert!((one.resolution() - 0.05).abs() < 1e-12);
    }
}
