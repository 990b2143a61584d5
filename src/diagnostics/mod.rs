//! Source-annotated reports for template problems

use crate::profile::ProfileError;
use crate::registry::RegistryError;
use crate::template::TemplateError;
use ariadne::{Config, Label, Report, ReportKind, Source};
use std::ops::Range;

const SOURCE_ID: &str = "template";

fn render(template: &str, span: Range<usize>, title: &str, label: &str) -> String {
    let mut buf = Vec::new();
    let written = Report::build(ReportKind::Error, SOURCE_ID, span.start)
        .with_message(title)
        .with_label(Label::new((SOURCE_ID, span)).with_message(label))
        .with_config(Config::default().with_color(false))
        .finish()
        .write((SOURCE_ID, Source::from(template)), &mut buf);

    match written {
        Ok(()) => String::from_utf8_lossy(&buf).into_owned(),
        Err(_) => format!("{}: {}", title, label),
    }
}

pub fn template_report(err: &TemplateError) -> String {
    match err {
        TemplateError::Syntax {
            template,
            offset,
            message,
        } => {
            let end = (*offset + 1).min(template.len()).max(*offset);
            render(template, *offset..end, "template syntax error", message)
        }
    }
}

/// Report for an unknown token, pointing at its brackets
pub fn registry_report(err: &RegistryError) -> String {
    match err {
        RegistryError::UnknownToken { token, template } => {
            let needle = format!("[{}", token);
            match template.find(&needle) {
                Some(start) => {
                    let end = template[start..]
                        .find(']')
                        .map(|i| start + i + 1)
                        .unwrap_or(template.len());
                    render(
                        template,
                        start..end,
                        "unknown placeholder",
                        &format!("no placeholder is registered for '{}'", token),
                    )
                }
                None => err.to_string(),
            }
        }
        other => other.to_string(),
    }
}

pub fn profile_report(err: &ProfileError) -> String {
    match err {
        ProfileError::Template { category, source } => {
            format!("in {} block:\n{}", category, template_report(source))
        }
        ProfileError::Registry { category, source } => {
            format!("in {} block:\n{}", category, registry_report(source))
        }
        ProfileError::Placeholder(source) => registry_report(source),
    }
}
