use bandit_post::config::{resolve, OptionStore, SettingsPanel};
use bandit_post::diagnostics;
use bandit_post::profile::{MachineProfile, ProfileOptions};
use bandit_post::session::{self, Event};
use bandit_post::Error;
use std::fs;

const USAGE: &str = "\
Usage: bandit-post <events.json> [output.nc] [options]

Options:
  --options <file.json>   operator options (BanditZZero, BanditFastDrill)
  --set <KEY=VALUE>       override one operator option
  --profile <file.json>   profile options (decimals, unit, rapid_axes, ...)
  --describe-options      print the settings panel and exit

Example:
  bandit-post part.json part.nc --set BanditZZero=120";

#[derive(Debug, Default, PartialEq)]
struct Args {
    events: Option<String>,
    output: Option<String>,
    options: Option<String>,
    overrides: Vec<String>,
    profile: Option<String>,
    describe: bool,
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let mut parsed = Args::default();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| {
            iter.next()
                .cloned()
                .ok_or_else(|| format!("{} needs a value", flag))
        };
        match arg.as_str() {
            "--options" => parsed.options = Some(value(arg)?),
            "--set" => parsed.overrides.push(value(arg)?),
            "--profile" => parsed.profile = Some(value(arg)?),
            "--describe-options" => parsed.describe = true,
            flag if flag.starts_with("--") => return Err(format!("unknown option {}", flag)),
            _ if parsed.events.is_none() => parsed.events = Some(arg.clone()),
            _ if parsed.output.is_none() => parsed.output = Some(arg.clone()),
            _ => return Err(format!("unexpected argument {}", arg)),
        }
    }

    if parsed.events.is_none() && !parsed.describe {
        return Err("no events file given".to_string());
    }
    Ok(parsed)
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let args = match parse_args(&args) {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{}", message);
            eprintln!();
            eprintln!("{}", USAGE);
            std::process::exit(1);
        }
    };

    if let Err(e) = bandit_post::init_logging() {
        eprintln!("{}", e);
    }

    if let Err(e) = run(&args) {
        match &e {
            Error::Profile(err) => eprintln!("{}", diagnostics::profile_report(err)),
            other => eprintln!("error: {}", other),
        }
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Error> {
    let panel = SettingsPanel::bandit();
    if args.describe {
        print!("{}", panel);
        return Ok(());
    }

    let mut store = panel.defaults();
    if let Some(path) = &args.options {
        let file = OptionStore::from_file(path)?;
        for field in &panel.fields {
            if let Some(value) = file.get(field.name()) {
                store.set(field.name(), value.clone());
            }
        }
    }
    for assignment in &args.overrides {
        store.apply_override(assignment)?;
    }

    let base = match &args.profile {
        Some(path) => ProfileOptions::from_file(path)?,
        None => ProfileOptions::default(),
    };
    let resolved = resolve(&store, base)?;
    for warning in &resolved.warnings {
        eprintln!("warning: {}", warning);
    }

    let profile = MachineProfile::bandit(&resolved.options)?;

    let Some(events_path) = &args.events else {
        return Ok(());
    };
    let events: Vec<Event> = serde_json::from_str(&fs::read_to_string(events_path)?)?;
    let output = session::run(&profile, &events)?;

    match &args.output {
        Some(path) => {
            output.write_to(fs::File::create(path)?)?;
            tracing::info!(path = %path, lines = output.lines.len(), "written");
        }
        None => output.write_to(std::io::stdout().lock())?,
    }

    Ok(())
}
