//! Line template parser
//! Turns a template string into literal/placeholder segments once, at load time

use crate::lexer::{self, Token};
use thiserror::Error;

/// Built-in line number placeholder
pub const LINE_NUMBER: &str = "N";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TemplateError {
    #[error("template syntax error in {template:?} at offset {offset}: {message}")]
    Syntax {
        template: String,
        offset: usize,
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, TemplateError>;

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Literal(String),
    Placeholder {
        token: String,
        /// `[X#]`: emit the value without its prefix
        bare: bool,
    },
}

/// A parsed line template
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self> {
        let mut segments = Vec::new();

        for (result, span) in lexer::lex(source) {
            match result {
                Ok(Token::Literal(text)) => segments.push(Segment::Literal(text.to_string())),
                Ok(Token::Placeholder(name)) => {
                    let (token, bare) = match name.strip_suffix('#') {
                        Some(stripped) => (stripped, true),
                        None => (name, false),
                    };
                    segments.push(Segment::Placeholder {
                        token: token.to_string(),
                        bare,
                    });
                }
                Err(_) => {
                    return Err(TemplateError::Syntax {
                        template: source.to_string(),
                        offset: span.start,
                        message: describe_error(source, span.start),
                    })
                }
            }
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Placeholder tokens referenced by this template, in order
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Placeholder { token, .. } => Some(token.as_str()),
            Segment::Literal(_) => None,
        })
    }
}

impl std::fmt::Display for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)
    }
}

fn describe_error(source: &str, offset: usize) -> String {
    let rest = &source[offset..];
    if rest.starts_with(']') {
        return "unmatched ']'".to_string();
    }
    match rest[1..].find(|c| c == '[' || c == ']') {
        Some(i) if rest[1..].as_bytes()[i] == b']' => {
            format!("invalid placeholder name {:?}", &rest[1..1 + i])
        }
        _ => "unclosed '['".to_string(),
    }
}

/// Ordered lines written for one event category
pub type TemplateBlock = Vec<Template>;

pub fn parse_block<S: AsRef<str>>(lines: &[S]) -> Result<TemplateBlock> {
    lines.iter().map(|l| Template::parse(l.as_ref())).collect()
}
