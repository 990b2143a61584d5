//! G-code post-processor for the BANDIT 8300 controller
//!
//! Toolpath events go in, G-code lines come out. What the lines look like is
//! decided by a [`MachineProfile`]: line templates per event category, the
//! placeholders they may use and a handful of numeric options.

pub mod arc;
pub mod config;
pub mod diagnostics;
pub mod lexer;
pub mod profile;
pub mod registry;
pub mod render;
pub mod session;
pub mod state;
pub mod template;

pub use config::{resolve, OptionStore, OptionValue, SettingsPanel};
pub use profile::{Category, MachineProfile, ProfileBuilder, ProfileOptions};
pub use registry::{Placeholder, Registry};
pub use render::Renderer;
pub use session::{run, Event, Output, Session};
pub use state::{Field, MachineState};
pub use template::Template;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("profile error: {0}")]
    Profile(#[from] profile::ProfileError),

    #[error("option error: {0}")]
    Option(#[from] config::OptionError),

    #[error("export failed: {0}")]
    Session(#[from] session::SessionError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("logging: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Install the log subscriber. `RUST_LOG` refines the default `info` level;
/// logs go to stderr so G-code can be piped from stdout.
pub fn init_logging() -> Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

/// Build the BANDIT profile from operator options and render `events`
pub fn export(store: &OptionStore, base: ProfileOptions, events: &[Event]) -> Result<Output> {
    let resolved = resolve(store, base)?;
    let profile = MachineProfile::bandit(&resolved.options)?;
    Ok(run(&profile, events)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_export_with_operator_options() {
        let mut store = SettingsPanel::bandit().defaults();
        store.apply_override("BanditZZero=120").unwrap();

        let output = export(&store, ProfileOptions::default(), &[Event::Begin, Event::End]).unwrap();
        assert_eq!(
            output.to_string(),
            "N1&G99\nN2 Z120.000Y0.000X0.000G92\nN3 G90\nN4 M2\n"
        );
    }

    #[test]
    fn test_export_rejects_bad_fast_drill() {
        let mut store = OptionStore::new();
        store.set("BanditFastDrill", OptionValue::Text("perhaps".into()));
        let err = export(&store, ProfileOptions::default(), &[]).unwrap_err();
        assert!(matches!(err, Error::Option(_)));
    }
}
