//! Live machine values available while a template is rendered

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A value a placeholder can read from the machine state
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    X,
    Y,
    Z,
    Feed,
    /// Arc centre relative to the arc start
    I,
    J,
    /// Absolute arc centre
    CenterX,
    CenterY,
    /// First XY target of the program
    FirstX,
    FirstY,
    Tool,
    /// Named value set up by the profile (e.g. the Z zero offset)
    Custom(String),
}

impl Field {
    pub fn name(&self) -> &str {
        match self {
            Field::X => "x",
            Field::Y => "y",
            Field::Z => "z",
            Field::Feed => "f",
            Field::I => "i",
            Field::J => "j",
            Field::CenterX => "ia",
            Field::CenterY => "ja",
            Field::FirstX => "x1",
            Field::FirstY => "y1",
            Field::Tool => "t",
            Field::Custom(name) => name,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Field {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "x" => Field::X,
            "y" => Field::Y,
            "z" => Field::Z,
            "f" => Field::Feed,
            "i" => Field::I,
            "j" => Field::J,
            "ia" => Field::CenterX,
            "ja" => Field::CenterY,
            "x1" => Field::FirstX,
            "y1" => Field::FirstY,
            "t" => Field::Tool,
            other => Field::Custom(other.to_string()),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MachineState {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
    pub feed: Option<f64>,
    pub i: Option<f64>,
    pub j: Option<f64>,
    pub center_x: Option<f64>,
    pub center_y: Option<f64>,
    pub first_x: Option<f64>,
    pub first_y: Option<f64>,
    pub tool: Option<u32>,
    custom: BTreeMap<String, f64>,
}

impl MachineState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &Field) -> Option<f64> {
        match field {
            Field::X => self.x,
            Field::Y => self.y,
            Field::Z => self.z,
            Field::Feed => self.feed,
            Field::I => self.i,
            Field::J => self.j,
            Field::CenterX => self.center_x,
            Field::CenterY => self.center_y,
            Field::FirstX => self.first_x,
            Field::FirstY => self.first_y,
            Field::Tool => self.tool.map(f64::from),
            Field::Custom(name) => self.custom.get(name).copied(),
        }
    }

    pub fn set_custom(&mut self, name: impl Into<String>, value: f64) {
        self.custom.insert(name.into(), value);
    }

    /// Set the arc centre, both absolute and relative to the current position
    pub fn set_arc_center(&mut self, cx: f64, cy: f64) {
        self.center_x = Some(cx);
        self.center_y = Some(cy);
        self.i = self.x.map(|x| cx - x);
        self.j = self.y.map(|y| cy - y);
    }

    pub fn clear_arc_center(&mut self) {
        self.center_x = None;
        self.center_y = None;
        self.i = None;
        self.j = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_names_round_trip() {
        for name in ["x", "y", "z", "f", "i", "j", "ia", "ja", "x1", "y1", "t"] {
            let field: Field = name.parse().unwrap();
            assert_eq!(field.name(), name);
            assert!(!matches!(field, Field::Custom(_)));
        }
        let custom: Field = "z_zero".parse().unwrap();
        assert_eq!(custom, Field::Custom("z_zero".into()));
    }

    #[test]
    fn test_get_custom_and_absent() {
        let mut state = MachineState::new();
        assert_eq!(state.get(&Field::X), None);
        state.set_custom("z_zero", 100.0);
        assert_eq!(state.get(&Field::Custom("z_zero".into())), Some(100.0));
        assert_eq!(state.get(&Field::Custom("other".into())), None);
    }

    #[test]
    fn test_arc_center_relative_offsets() {
        let mut state = MachineState::new();
        state.x = Some(10.0);
        state.y = Some(0.0);
        state.set_arc_center(0.0, 0.0);
        assert_eq!(state.get(&Field::CenterX), Some(0.0));
        assert_eq!(state.get(&Field::I), Some(-10.0));
        assert_eq!(state.get(&Field::J), Some(0.0));

        state.clear_arc_center();
        assert_eq!(state.get(&Field::I), None);
    }
}
