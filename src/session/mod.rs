//! Export session
//!
//! Walks a sequence of toolpath events in order, keeps the machine state,
//! picks the template block for each event and collects the rendered lines:
//!
//! header → { tool header → { contour header → passes of moves →
//! contour footer } → tool footer } → footer

use crate::arc::{split_at_quadrants, Arc};
use crate::profile::{Category, LineEnding, MachineProfile};
use crate::render::{RenderError, Renderer};
use crate::state::MachineState;
use cgmath::Point2;
use serde::{Deserialize, Serialize};
use std::io::Write;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("event {index} ({event}): {message}")]
    Sequence {
        index: usize,
        event: String,
        message: String,
    },

    #[error("event {index}: {side:?} cutter compensation requested, but this profile only outputs offset paths")]
    CompensationUnsupported { index: usize, side: Compensation },

    #[error("event {index}: {source}")]
    Render {
        index: usize,
        #[source]
        source: RenderError,
    },
}

pub type Result<T> = std::result::Result<T, SessionError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compensation {
    Left,
    Right,
}

/// Toolpath events, coordinates in millimetres
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    Begin,
    ToolChange {
        tool: u32,
        feed: f64,
    },
    ToolpathStart {
        #[serde(default)]
        name: Option<String>,
    },
    ToolpathEnd,
    ContourStart {
        #[serde(default)]
        compensation: Option<Compensation>,
    },
    ContourEnd,
    PassesStart {
        count: u32,
    },
    PassStart {
        index: u32,
    },
    PassEnd {
        index: u32,
    },
    PassesEnd,
    RapidMove {
        x: f64,
        y: f64,
    },
    RapidMoveZ {
        z: f64,
    },
    LinearMove {
        x: f64,
        y: f64,
        #[serde(default)]
        feed: Option<f64>,
    },
    LeadIn {
        x: f64,
        y: f64,
    },
    LeadOut {
        x: f64,
        y: f64,
    },
    LinearMoveZ {
        z: f64,
        #[serde(default)]
        feed: Option<f64>,
    },
    ArcMove {
        x: f64,
        y: f64,
        cx: f64,
        cy: f64,
        clockwise: bool,
        #[serde(default)]
        feed: Option<f64>,
    },
    PointMoveZ {
        z: f64,
    },
    End,
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::Begin => "begin",
            Event::ToolChange { .. } => "tool_change",
            Event::ToolpathStart { .. } => "toolpath_start",
            Event::ToolpathEnd => "toolpath_end",
            Event::ContourStart { .. } => "contour_start",
            Event::ContourEnd => "contour_end",
            Event::PassesStart { .. } => "passes_start",
            Event::PassStart { .. } => "pass_start",
            Event::PassEnd { .. } => "pass_end",
            Event::PassesEnd => "passes_end",
            Event::RapidMove { .. } => "rapid_move",
            Event::RapidMoveZ { .. } => "rapid_move_z",
            Event::LinearMove { .. } => "linear_move",
            Event::LeadIn { .. } => "lead_in",
            Event::LeadOut { .. } => "lead_out",
            Event::LinearMoveZ { .. } => "linear_move_z",
            Event::ArcMove { .. } => "arc_move",
            Event::PointMoveZ { .. } => "point_move_z",
            Event::End => "end",
        }
    }

    /// XY target of a move event
    fn xy_target(&self) -> Option<(f64, f64)> {
        match self {
            Event::RapidMove { x, y }
            | Event::LinearMove { x, y, .. }
            | Event::LeadIn { x, y }
            | Event::LeadOut { x, y }
            | Event::ArcMove { x, y, .. } => Some((*x, *y)),
            _ => None,
        }
    }
}

/// Rendered program
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    pub lines: Vec<String>,
    pub line_ending: LineEnding,
}

impl Output {
    pub fn write_to<W: Write>(&self, mut w: W) -> std::io::Result<()> {
        for line in &self.lines {
            w.write_all(line.as_bytes())?;
            w.write_all(self.line_ending.as_str().as_bytes())?;
        }
        w.flush()
    }
}

impl std::fmt::Display for Output {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for line in &self.lines {
            write!(f, "{}{}", line, self.line_ending.as_str())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Idle,
    Program,
    Done,
}

#[derive(Debug, Clone, Copy)]
struct Passes {
    count: u32,
    open: Option<u32>,
}

/// Which move kinds still use their "first" template
#[derive(Debug, Clone, Copy)]
struct FirstMoves {
    linear: bool,
    linear_z: bool,
    point_z: bool,
    arc_cw: bool,
    arc_ccw: bool,
}

impl FirstMoves {
    fn all() -> Self {
        Self {
            linear: true,
            linear_z: true,
            point_z: true,
            arc_cw: true,
            arc_ccw: true,
        }
    }
}

pub struct Session<'p> {
    profile: &'p MachineProfile,
    renderer: Renderer<'p>,
    state: MachineState,
    lines: Vec<String>,
    phase: Phase,
    tool_open: bool,
    toolpath_open: bool,
    contour_open: bool,
    passes: Option<Passes>,
    first: FirstMoves,
    index: usize,
}

impl<'p> Session<'p> {
    pub fn new(profile: &'p MachineProfile) -> Self {
        let options = profile.options();
        let renderer = Renderer::new(
            profile.registry(),
            options.number_format(),
            options.line_number_start,
            options.line_number_increment,
        );
        let mut state = MachineState::new();
        profile.prepare_state(&mut state);

        Self {
            profile,
            renderer,
            state,
            lines: Vec::new(),
            phase: Phase::Idle,
            tool_open: false,
            toolpath_open: false,
            contour_open: false,
            passes: None,
            first: FirstMoves::all(),
            index: 0,
        }
    }

    /// First XY target of the program, needed by the header (mm)
    pub fn set_first_target(&mut self, x: f64, y: f64) {
        let unit = self.profile.options().unit;
        self.state.first_x = Some(unit.from_mm(x));
        self.state.first_y = Some(unit.from_mm(y));
    }

    pub fn state(&self) -> &MachineState {
        &self.state
    }

    pub fn handle(&mut self, event: &Event) -> Result<()> {
        let result = self.dispatch(event);
        self.index += 1;
        result
    }

    pub fn finish(self) -> Result<Output> {
        if self.phase != Phase::Done {
            return Err(SessionError::Sequence {
                index: self.index,
                event: "<eof>".to_string(),
                message: "program has no end event".to_string(),
            });
        }
        Ok(Output {
            lines: self.lines,
            line_ending: self.profile.options().line_ending,
        })
    }

    fn sequence_error(&self, event: &Event, message: &str) -> SessionError {
        SessionError::Sequence {
            index: self.index,
            event: event.name().to_string(),
            message: message.to_string(),
        }
    }

    fn emit(&mut self, category: Category) -> Result<()> {
        let lines = self
            .renderer
            .render_block(self.profile.block(category), &self.state)
            .map_err(|source| SessionError::Render {
                index: self.index,
                source,
            })?;
        tracing::trace!(?category, ?lines, "rendered");
        self.lines.extend(lines);
        Ok(())
    }

    fn mm(&self, value: f64) -> f64 {
        self.profile.options().unit.from_mm(value)
    }

    fn set_feed(&mut self, feed: Option<f64>) {
        if let Some(f) = feed {
            self.state.feed = Some(self.mm(f));
        }
    }

    fn set_xy(&mut self, x: f64, y: f64) {
        self.state.x = Some(self.mm(x));
        self.state.y = Some(self.mm(y));
    }

    fn dispatch(&mut self, event: &Event) -> Result<()> {
        match (self.phase, event) {
            (Phase::Idle, Event::Begin) => {
                self.phase = Phase::Program;
                return self.emit(Category::Header);
            }
            (Phase::Idle, _) => return Err(self.sequence_error(event, "expected begin")),
            (Phase::Done, _) => return Err(self.sequence_error(event, "event after end")),
            (Phase::Program, Event::Begin) => {
                return Err(self.sequence_error(event, "program already started"))
            }
            (Phase::Program, _) => {}
        }

        match event {
            Event::Begin => Ok(()),

            Event::ToolChange { tool, feed } => {
                if self.toolpath_open || self.contour_open {
                    return Err(self.sequence_error(event, "tool change inside a toolpath"));
                }
                if self.tool_open {
                    self.emit(Category::ToolFooter)?;
                }
                tracing::debug!(tool, feed, "tool change");
                self.state.tool = Some(*tool);
                self.set_feed(Some(*feed));
                self.tool_open = true;
                self.emit(Category::ToolHeader)
            }

            Event::ToolpathStart { name } => {
                if self.toolpath_open {
                    return Err(self.sequence_error(event, "toolpath already open"));
                }
                tracing::debug!(?name, "toolpath");
                self.toolpath_open = true;
                self.emit(Category::ToolpathHeader)
            }

            Event::ToolpathEnd => {
                if !self.toolpath_open || self.contour_open {
                    return Err(self.sequence_error(event, "no open toolpath to close"));
                }
                self.toolpath_open = false;
                self.emit(Category::ToolpathFooter)
            }

            Event::ContourStart { compensation } => {
                if self.contour_open {
                    return Err(self.sequence_error(event, "contour already open"));
                }
                if let Some(side) = compensation {
                    if self.profile.options().output_offset_path {
                        return Err(SessionError::CompensationUnsupported {
                            index: self.index,
                            side: *side,
                        });
                    }
                }
                self.contour_open = true;
                self.first = FirstMoves::all();
                self.emit(Category::ContourHeader)
            }

            Event::ContourEnd => {
                if !self.contour_open || self.passes.is_some() {
                    return Err(self.sequence_error(event, "no open contour to close"));
                }
                self.contour_open = false;
                self.emit(Category::ContourFooter)
            }

            Event::PassesStart { count } => {
                if self.passes.is_some() || *count == 0 {
                    return Err(self.sequence_error(event, "passes already open or empty"));
                }
                self.passes = Some(Passes {
                    count: *count,
                    open: None,
                });
                if *count == 1 {
                    self.emit(Category::SingleZPassHeader)
                } else {
                    self.emit(Category::MultiZPassHeader)
                }
            }

            Event::PassStart { index } => {
                let Some(passes) = self.passes.filter(|p| p.open.is_none() && *index < p.count) else {
                    return Err(self.sequence_error(event, "pass outside of passes"));
                };
                self.passes = Some(Passes {
                    open: Some(*index),
                    ..passes
                });
                self.first = FirstMoves::all();
                match (passes.count, *index) {
                    (1, _) => Ok(()),
                    (_, 0) => self.emit(Category::ZPassFirstHeader),
                    _ => self.emit(Category::ZPassHeader),
                }
            }

            Event::PassEnd { index } => {
                let Some(passes) = self.passes.filter(|p| p.open == Some(*index)) else {
                    return Err(self.sequence_error(event, "no such pass open"));
                };
                self.passes = Some(Passes { open: None, ..passes });
                match (passes.count, *index) {
                    (1, _) => Ok(()),
                    (_, 0) => self.emit(Category::ZPassFirstFooter),
                    (count, i) if i + 1 == count => self.emit(Category::ZPassLastFooter),
                    _ => self.emit(Category::ZPassFooter),
                }
            }

            Event::PassesEnd => {
                let Some(passes) = self.passes.filter(|p| p.open.is_none()) else {
                    return Err(self.sequence_error(event, "no passes to close"));
                };
                self.passes = None;
                if passes.count == 1 {
                    self.emit(Category::SingleZPassFooter)
                } else {
                    self.emit(Category::MultiZPassFooter)
                }
            }

            Event::RapidMove { x, y } => {
                self.set_xy(*x, *y);
                self.first = FirstMoves::all();
                self.emit(Category::RapidMove)
            }

            Event::RapidMoveZ { z } => {
                self.state.z = Some(self.mm(*z));
                self.emit(Category::RapidMoveZ)
            }

            Event::LinearMove { x, y, feed } => {
                self.set_feed(*feed);
                self.set_xy(*x, *y);
                let category = if self.first.linear {
                    Category::FirstLinearMove
                } else {
                    Category::LinearMove
                };
                self.first.linear = false;
                self.emit(category)
            }

            Event::LeadIn { x, y } => {
                self.set_xy(*x, *y);
                self.emit(Category::LinearLeadIn)
            }

            Event::LeadOut { x, y } => {
                self.set_xy(*x, *y);
                self.emit(Category::LinearLeadOut)
            }

            Event::LinearMoveZ { z, feed } => {
                self.set_feed(*feed);
                self.state.z = Some(self.mm(*z));
                let category = if self.first.linear_z {
                    Category::FirstLinearMoveZ
                } else {
                    Category::LinearMoveZ
                };
                self.first.linear_z = false;
                self.emit(category)
            }

            Event::PointMoveZ { z } => {
                self.state.z = Some(self.mm(*z));
                let category = if self.first.point_z {
                    Category::FirstPointMoveZ
                } else {
                    Category::PointMoveZ
                };
                self.first.point_z = false;
                self.emit(category)
            }

            Event::ArcMove {
                x,
                y,
                cx,
                cy,
                clockwise,
                feed,
            } => {
                let (Some(sx), Some(sy)) = (self.state.x, self.state.y) else {
                    return Err(self.sequence_error(event, "arc without a start position"));
                };
                self.set_feed(*feed);
                let arc = Arc {
                    start: Point2::new(sx, sy),
                    end: Point2::new(self.mm(*x), self.mm(*y)),
                    center: Point2::new(self.mm(*cx), self.mm(*cy)),
                    clockwise: *clockwise,
                };
                let options = self.profile.options();
                let segments = if options.split_arcs_at_quadrant_lines {
                    split_at_quadrants(&arc, options.number_format().resolution())
                } else {
                    vec![arc]
                };
                if segments.len() > 1 {
                    tracing::debug!(segments = segments.len(), "arc split at quadrant lines");
                }

                for segment in segments {
                    self.state.x = Some(segment.start.x);
                    self.state.y = Some(segment.start.y);
                    self.state.set_arc_center(segment.center.x, segment.center.y);
                    self.state.x = Some(segment.end.x);
                    self.state.y = Some(segment.end.y);

                    let category = match (segment.clockwise, self.first.arc_cw, self.first.arc_ccw) {
                        (true, true, _) => Category::FirstArcCwMove,
                        (true, false, _) => Category::ArcCwMove,
                        (false, _, true) => Category::FirstArcCcwMove,
                        (false, _, false) => Category::ArcCcwMove,
                    };
                    if segment.clockwise {
                        self.first.arc_cw = false;
                    } else {
                        self.first.arc_ccw = false;
                    }
                    self.emit(category)?;
                }
                self.state.clear_arc_center();
                Ok(())
            }

            Event::End => {
                if self.toolpath_open || self.contour_open || self.passes.is_some() {
                    return Err(self.sequence_error(event, "end inside an open block"));
                }
                if self.tool_open {
                    self.tool_open = false;
                    self.emit(Category::ToolFooter)?;
                }
                self.phase = Phase::Done;
                self.emit(Category::Footer)
            }
        }
    }
}

/// Render a complete event list with a profile
pub fn run(profile: &MachineProfile, events: &[Event]) -> Result<Output> {
    tracing::info!(profile = profile.name(), events = events.len(), "rendering program");

    let mut session = Session::new(profile);
    if let Some((x, y)) = events.iter().find_map(Event::xy_target) {
        session.set_first_target(x, y);
    }
    for event in events {
        session.handle(event)?;
    }
    let output = session.finish()?;

    tracing::info!(lines = output.lines.len(), "program rendered");
    Ok(output)
}
