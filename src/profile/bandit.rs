//! BANDIT 8300 profile
//!
//! The BANDIT has no G0/G1: every plain X/Y/Z word is a feed move and
//! rapids go through the I/J/K letters. It has no cutter compensation,
//! cannot interpolate arcs across quadrant lines, and treats a line that
//! holds nothing but a line number as a jump target.

use super::{Category, MachineProfile, ProfileBuilder, ProfileError, ProfileOptions, RapidAxes};
use crate::registry::Placeholder;
use crate::state::Field;

pub const DISPLAY_NAME: &str = "G-Code (BANDIT) [mm]";

pub const DEFAULT_Z_ZERO: f64 = 100.0;
pub const Z_ZERO_TOKEN: &str = "Z_ZERO";
pub const Z_ZERO_FIELD: &str = "z_zero";

const ARC_MOVE: &str = "[N] [X][Y][IA][JA]";

pub fn profile(options: &ProfileOptions) -> Result<MachineProfile, ProfileError> {
    let (rapid, rapid_z) = match options.rapid_axes {
        RapidAxes::Alternate => ("[N] I[X#]J[Y#]", "[N] K[Z#]"),
        RapidAxes::AlternateXy => ("[N] I[X#]J[Y#]", "[N] [Z]"),
        RapidAxes::Direct => ("[N] [X][Y]", "[N] [Z]"),
    };

    // fast drilling: rapid down to the surface, feed to depth, rapid out
    let (first_point, point): (&[&str], &[&str]) = if options.fast_drill {
        (&["[N] K0.000", "[N] [Z]"], &["[N] K[Z#]"])
    } else {
        (&["[N] [Z]"], &["[N] [Z]"])
    };

    ProfileBuilder::new(DISPLAY_NAME, options.clone())
        .placeholder(Placeholder::new(
            Field::Custom(Z_ZERO_FIELD.to_string()),
            Z_ZERO_TOKEN,
            false,
            "Z",
        ))
        .value(Z_ZERO_FIELD, options.z_zero_offset)
        .block(
            Category::Header,
            &[
                "[N]&G99",                // drive to machine zero
                "[N] [Z_ZERO][Y1][X1]G92", // set workpiece zero
                "[N] G90",                // absolute
            ],
        )
        .line(Category::Footer, "[N] M2")
        .block(Category::ToolHeader, &["[N] M6", "[N] [F]"])
        .line(Category::RapidMove, rapid)
        .line(Category::RapidMoveZ, rapid_z)
        .line(Category::FirstLinearMove, "[N] [X][Y]")
        .line(Category::LinearMove, "[N] [X][Y]")
        .line(Category::FirstLinearMoveZ, "[N] [Z]")
        .line(Category::LinearMoveZ, "[N] [Z]")
        .block(Category::FirstPointMoveZ, first_point)
        .block(Category::PointMoveZ, point)
        // direction is unambiguous inside one quadrant
        .line(Category::FirstArcCwMove, ARC_MOVE)
        .line(Category::ArcCwMove, ARC_MOVE)
        .line(Category::FirstArcCcwMove, ARC_MOVE)
        .line(Category::ArcCcwMove, ARC_MOVE)
        .build()
}

impl MachineProfile {
    pub fn bandit(options: &ProfileOptions) -> Result<Self, ProfileError> {
        profile(options)
    }
}
