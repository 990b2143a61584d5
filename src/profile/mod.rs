//! Machine profiles
//!
//! A profile is an immutable value: one template block per event category,
//! the placeholder registry the templates are checked against, and the
//! numeric options the session needs. Machine-specific behaviour comes
//! entirely from this data.

use crate::registry::{NumberFormat, Placeholder, Registry, RegistryError};
use crate::state::MachineState;
use crate::template::{parse_block, Template, TemplateBlock, TemplateError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

pub mod bandit;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProfileError {
    #[error("{category}: {source}")]
    Template {
        category: Category,
        #[source]
        source: TemplateError,
    },

    #[error("{category}: {source}")]
    Registry {
        category: Category,
        #[source]
        source: RegistryError,
    },

    #[error("placeholder: {0}")]
    Placeholder(#[from] RegistryError),
}

/// Toolpath event categories that have a template block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Header,
    Footer,
    ToolHeader,
    ToolFooter,
    ToolpathHeader,
    ToolpathFooter,
    ContourHeader,
    ContourFooter,
    SingleZPassHeader,
    SingleZPassFooter,
    MultiZPassHeader,
    MultiZPassFooter,
    ZPassFirstHeader,
    ZPassFirstFooter,
    ZPassHeader,
    ZPassFooter,
    ZPassLastFooter,
    RapidMove,
    RapidMoveZ,
    FirstLinearMove,
    LinearMove,
    LinearLeadIn,
    LinearLeadOut,
    FirstLinearMoveZ,
    LinearMoveZ,
    FirstPointMoveZ,
    PointMoveZ,
    FirstArcCwMove,
    ArcCwMove,
    FirstArcCcwMove,
    ArcCcwMove,
}

impl Category {
    pub const ALL: [Category; 31] = [
        Category::Header,
        Category::Footer,
        Category::ToolHeader,
        Category::ToolFooter,
        Category::ToolpathHeader,
        Category::ToolpathFooter,
        Category::ContourHeader,
        Category::ContourFooter,
        Category::SingleZPassHeader,
        Category::SingleZPassFooter,
        Category::MultiZPassHeader,
        Category::MultiZPassFooter,
        Category::ZPassFirstHeader,
        Category::ZPassFirstFooter,
        Category::ZPassHeader,
        Category::ZPassFooter,
        Category::ZPassLastFooter,
        Category::RapidMove,
        Category::RapidMoveZ,
        Category::FirstLinearMove,
        Category::LinearMove,
        Category::LinearLeadIn,
        Category::LinearLeadOut,
        Category::FirstLinearMoveZ,
        Category::LinearMoveZ,
        Category::FirstPointMoveZ,
        Category::PointMoveZ,
        Category::FirstArcCwMove,
        Category::ArcCwMove,
        Category::FirstArcCcwMove,
        Category::ArcCcwMove,
    ];

    /// Category whose block is used when this one is not given
    fn fallback(self) -> Option<Category> {
        match self {
            Category::LinearLeadIn | Category::LinearLeadOut => Some(Category::LinearMove),
            _ => None,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    #[default]
    Millimeter,
    Inch,
}

impl Unit {
    /// Convert a millimetre value into this unit
    pub fn from_mm(self, value: f64) -> f64 {
        match self {
            Unit::Millimeter => value,
            Unit::Inch => value / 25.4,
        }
    }
}

/// Axis letters used for rapid moves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RapidAxes {
    /// I/J/K for X/Y/Z rapids
    #[default]
    Alternate,
    /// I/J for XY rapids, plain Z for Z rapids
    AlternateXy,
    /// Plain X/Y/Z
    Direct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileOptions {
    pub decimals: u8,
    pub trailing_zeroes: bool,
    pub unit: Unit,
    pub line_number_start: u32,
    pub line_number_increment: u32,
    pub z_zero_offset: f64,
    pub fast_drill: bool,
    pub split_arcs_at_quadrant_lines: bool,
    /// Geometry arrives already offset; no controller-side compensation
    pub output_offset_path: bool,
    pub rapid_axes: RapidAxes,
    pub line_ending: LineEnding,
}

impl Default for ProfileOptions {
    fn default() -> Self {
        Self {
            decimals: 3,
            trailing_zeroes: true,
            unit: Unit::Millimeter,
            line_number_start: 1,
            line_number_increment: 1,
            z_zero_offset: bandit::DEFAULT_Z_ZERO,
            fast_drill: false,
            split_arcs_at_quadrant_lines: true,
            output_offset_path: true,
            rapid_axes: RapidAxes::Alternate,
            line_ending: LineEnding::Lf,
        }
    }
}

impl ProfileOptions {
    /// Load options from a JSON file; missing keys keep their defaults
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, crate::Error> {
        let content = std::fs::read_to_string(path)?;
        let options: ProfileOptions = serde_json::from_str(&content)?;
        Ok(options)
    }

    pub fn number_format(&self) -> NumberFormat {
        NumberFormat {
            decimals: self.decimals,
            trailing_zeroes: self.trailing_zeroes,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MachineProfile {
    name: String,
    options: ProfileOptions,
    registry: Registry,
    blocks: BTreeMap<Category, TemplateBlock>,
    values: BTreeMap<String, f64>,
}

impl MachineProfile {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &ProfileOptions {
        &self.options
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn block(&self, category: Category) -> &[Template] {
        self.blocks
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Load the profile's own values (e.g. the Z zero offset) into a
    /// fresh session state
    pub fn prepare_state(&self, state: &mut MachineState) {
        for (name, value) in &self.values {
            state.set_custom(name.clone(), *value);
        }
    }
}

pub struct ProfileBuilder {
    name: String,
    options: ProfileOptions,
    placeholders: Vec<Placeholder>,
    blocks: BTreeMap<Category, Vec<String>>,
    values: BTreeMap<String, f64>,
}

impl ProfileBuilder {
    pub fn new(name: &str, options: ProfileOptions) -> Self {
        Self {
            name: name.to_string(),
            options,
            placeholders: Vec::new(),
            blocks: BTreeMap::new(),
            values: BTreeMap::new(),
        }
    }

    pub fn block<S: AsRef<str>>(mut self, category: Category, lines: &[S]) -> Self {
        let lines = lines.iter().map(|l| l.as_ref().to_string()).collect();
        self.blocks.insert(category, lines);
        self
    }

    pub fn line(self, category: Category, line: &str) -> Self {
        self.block(category, &[line])
    }

    pub fn placeholder(mut self, def: Placeholder) -> Self {
        self.placeholders.push(def);
        self
    }

    /// Named value placed in the state before the header renders
    pub fn value(mut self, name: &str, value: f64) -> Self {
        self.values.insert(name.to_string(), value);
        self
    }

    /// Parse and check every template. Categories left out resolve to their
    /// fallback category or to an empty block.
    pub fn build(self) -> Result<MachineProfile, ProfileError> {
        let mut registry = Registry::standard();
        for def in self.placeholders {
            registry.register(def)?;
        }

        let mut blocks = BTreeMap::new();
        for category in Category::ALL {
            let lines = self
                .blocks
                .get(&category)
                .or_else(|| category.fallback().and_then(|f| self.blocks.get(&f)))
                .map(Vec::as_slice)
                .unwrap_or_default();

            let block = parse_block(lines)
                .map_err(|source| ProfileError::Template { category, source })?;
            for template in &block {
                registry
                    .validate(template)
                    .map_err(|source| ProfileError::Registry { category, source })?;
            }
            blocks.insert(category, block);
        }

        tracing::debug!(profile = %self.name, values = ?self.values, "profile built");

        Ok(MachineProfile {
            name: self.name,
            options: self.options,
            registry,
            blocks,
            values: self.values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Field;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_every_category_resolves() {
        let profile = ProfileBuilder::new("empty", ProfileOptions::default())
            .build()
            .unwrap();
        for category in Category::ALL {
            assert!(profile.block(category).is_empty());
        }
    }

    #[test]
    fn test_lead_in_falls_back_to_linear_move() {
        let profile = ProfileBuilder::new("test", ProfileOptions::default())
            .line(Category::LinearMove, "[N] G1 [X][Y]")
            .line(Category::LinearLeadOut, "[N] G1 [X][Y] (out)")
            .build()
            .unwrap();
        assert_eq!(profile.block(Category::LinearLeadIn)[0].source(), "[N] G1 [X][Y]");
        assert_eq!(
            profile.block(Category::LinearLeadOut)[0].source(),
            "[N] G1 [X][Y] (out)"
        );
    }

    #[test]
    fn test_unknown_token_reported_at_build() {
        let err = ProfileBuilder::new("test", ProfileOptions::default())
            .line(Category::Header, "[N] [Q]")
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            ProfileError::Registry {
                category: Category::Header,
                source: RegistryError::UnknownToken { .. }
            }
        ));
    }

    #[test]
    fn test_syntax_error_reported_at_build() {
        let err = ProfileBuilder::new("test", ProfileOptions::default())
            .line(Category::Footer, "[N] M2]")
            .build()
            .unwrap_err();
        assert!(matches!(err, ProfileError::Template { category: Category::Footer, .. }));
    }

    #[test]
    fn test_custom_placeholder_and_value() {
        let profile = ProfileBuilder::new("test", ProfileOptions::default())
            .placeholder(Placeholder::new(Field::Custom("park".into()), "PARK", false, "Z"))
            .value("park", 40.0)
            .line(Category::Footer, "[N] [PARK] M2")
            .build()
            .unwrap();

        let mut state = MachineState::new();
        profile.prepare_state(&mut state);
        assert_eq!(state.get(&Field::Custom("park".into())), Some(40.0));
    }

    #[test]
    fn test_options_from_json_use_defaults() {
        let options: ProfileOptions =
            serde_json::from_str(r#"{ "fast_drill": true, "rapid_axes": "alternate_xy" }"#).unwrap();
        assert!(options.fast_drill);
        assert_eq!(options.rapid_axes, RapidAxes::AlternateXy);
        assert_eq!(options.decimals, 3);
        assert_eq!(options.z_zero_offset, 100.0);
    }

    #[test]
    fn test_inch_conversion() {
        assert_eq!(Unit::Inch.from_mm(25.4), 1.0);
        assert_eq!(Unit::Millimeter.from_mm(25.4), 25.4);
    }
}
