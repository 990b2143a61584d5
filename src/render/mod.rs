//! Line template renderer
//!
//! Expands parsed templates against the machine state, numbers the lines
//! and drops lines that would only carry a line number.

use crate::registry::{NumberFormat, Registry, RegistryError};
use crate::state::{Field, MachineState};
use crate::template::{Segment, Template, LINE_NUMBER};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("line number overflow: nothing follows N{last} with increment {increment}")]
    LineNumberOverflow { last: u32, increment: u32 },
}

pub type Result<T> = std::result::Result<T, RenderError>;

pub struct Renderer<'a> {
    registry: &'a Registry,
    format: NumberFormat,
    next_line: u32,
    increment: u32,
    /// Set once `next_line` was the last number a u32 can hold
    exhausted: bool,
    /// Last value text written per field, for modal output
    emitted: HashMap<Field, String>,
}

impl<'a> Renderer<'a> {
    pub fn new(registry: &'a Registry, format: NumberFormat, start: u32, increment: u32) -> Self {
        Self {
            registry,
            format,
            next_line: start,
            increment,
            exhausted: false,
            emitted: HashMap::new(),
        }
    }

    /// Number the next emitted line will get, `None` once numbers ran out
    pub fn line_number(&self) -> Option<u32> {
        (!self.exhausted).then_some(self.next_line)
    }

    /// Render one line. Returns `None` when the line is suppressed; in that
    /// case neither the line counter nor the modal memory move.
    pub fn render(&mut self, template: &Template, state: &MachineState) -> Result<Option<String>> {
        let mut line = String::new();
        let mut written: Vec<(Field, String)> = Vec::new();

        for segment in template.segments() {
            match segment {
                Segment::Literal(text) => line.push_str(text),
                Segment::Placeholder { token, bare } if token == LINE_NUMBER => {
                    let Some(number) = self.line_number() else {
                        return Err(RenderError::LineNumberOverflow {
                            last: self.next_line,
                            increment: self.increment,
                        });
                    };
                    if !bare {
                        line.push('N');
                    }
                    line.push_str(&number.to_string());
                }
                Segment::Placeholder { token, bare } => {
                    let (def, text) = match self.registry.word(token, state, &self.format) {
                        Ok(Some(word)) => word,
                        Ok(None) => continue,
                        Err(RegistryError::UnknownToken { token, .. }) => {
                            return Err(RegistryError::UnknownToken {
                                token,
                                template: template.source().to_string(),
                            }
                            .into())
                        }
                        Err(e) => return Err(e.into()),
                    };

                    let unchanged = self.emitted.get(&def.field) == Some(&text);
                    if unchanged && !def.always_emit && !bare {
                        continue;
                    }

                    if !bare {
                        line.push_str(&def.prefix);
                    }
                    line.push_str(&text);
                    written.push((def.field.clone(), text));
                }
            }
        }

        if is_suppressed(&line) {
            tracing::debug!(template = %template, line = %line, "suppressed line");
            return Ok(None);
        }

        self.emitted.extend(written);
        match self.next_line.checked_add(self.increment) {
            Some(next) => self.next_line = next,
            None => self.exhausted = true,
        }
        Ok(Some(line))
    }

    pub fn render_block(&mut self, block: &[Template], state: &MachineState) -> Result<Vec<String>> {
        let mut lines = Vec::with_capacity(block.len());
        for template in block {
            if let Some(line) = self.render(template, state)? {
                lines.push(line);
            }
        }
        Ok(lines)
    }
}

/// `N120`, `N120 ` and friends: a bare line number is a jump on the BANDIT
pub fn is_line_number_only(line: &str) -> bool {
    let Some(rest) = line.strip_prefix('N') else {
        return false;
    };
    let digits = rest.trim_start_matches(|c: char| c.is_ascii_digit());
    digits.len() < rest.len() && digits.chars().all(char::is_whitespace)
}

fn is_suppressed(line: &str) -> bool {
    line.trim().is_empty() || is_line_number_only(line)
}
