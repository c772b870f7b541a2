//! Command-line front end for the action engine.
//!
//! Loads a TOML schema, links the built-in functions and drives the engine
//! with stimuli given on the command line.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;

use engine::core::types::{DispatchSummary, FireOutcome};
use engine::dispatch::Engine;
use engine::exit_codes;
use engine::io::config::{load_preference_overrides, load_schema};
use engine::plugins::builtin_functions;

#[derive(Parser)]
#[command(
    name = "engine",
    version,
    about = "Run declared actions against typed hot variables"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load a schema and check every cross-reference.
    Validate { schema: PathBuf },
    /// Print the action queue an active action would run, one tag per line.
    Queue { schema: PathBuf, tag: String },
    /// Fire stimuli in order and print the resulting hot variables as JSON.
    Fire {
        schema: PathBuf,
        /// Action tags, or key sequences with `--key`.
        #[arg(required = true)]
        stimuli: Vec<String>,
        /// Treat stimuli as key sequences.
        #[arg(long)]
        key: bool,
        /// Preference overrides (`tag = value` TOML).
        #[arg(long)]
        prefs: Option<PathBuf>,
    },
    /// Start a timed action, let it run for a while, then print hot variables.
    Stroll {
        schema: PathBuf,
        tag: String,
        /// How long to keep the timer running.
        #[arg(long, default_value_t = 1.0)]
        secs: f64,
    },
}

fn main() {
    engine::logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Validate { schema } => cmd_validate(&schema),
        Command::Queue { schema, tag } => cmd_queue(&schema, &tag),
        Command::Fire {
            schema,
            stimuli,
            key,
            prefs,
        } => cmd_fire(&schema, &stimuli, key, prefs.as_deref()),
        Command::Stroll { schema, tag, secs } => cmd_stroll(&schema, &tag, secs),
    }
}

fn build_engine(path: &Path) -> Result<(Engine, Duration)> {
    let schema = load_schema(path)?;
    let poll = schema.engine.poll_interval();
    let engine = Engine::from_schema(schema, &builtin_functions())
        .with_context(|| format!("build engine from {}", path.display()))?;
    Ok((engine, poll))
}

fn cmd_validate(path: &Path) -> Result<i32> {
    let (engine, _) = build_engine(path)?;
    let registry = engine.registry();
    let unbound: Vec<&str> = registry
        .iter()
        .filter(|a| !a.is_bound())
        .map(|a| a.tag())
        .collect();
    println!(
        "ok: {} actions, {} passive ordered",
        registry.iter().count(),
        registry.passive_order().len()
    );
    if !unbound.is_empty() {
        println!("unbound: {}", unbound.join(", "));
    }
    Ok(exit_codes::OK)
}

fn cmd_queue(path: &Path, tag: &str) -> Result<i32> {
    let (engine, _) = build_engine(path)?;
    for action in engine.collect_queue(tag)? {
        println!("{}", action.tag());
    }
    Ok(exit_codes::OK)
}

fn cmd_fire(path: &Path, stimuli: &[String], key: bool, prefs: Option<&Path>) -> Result<i32> {
    let (engine, _) = build_engine(path)?;
    if let Some(prefs) = prefs {
        let rejected = engine.apply_preference_overrides(load_preference_overrides(prefs)?);
        if !rejected.is_empty() {
            bail!(
                "{} preference override(s) rejected, first: {}",
                rejected.len(),
                rejected[0]
            );
        }
    }

    let mut clean = true;
    for stimulus in stimuli {
        let outcomes = if key {
            engine.fire_key(stimulus)?
        } else {
            vec![(stimulus.clone(), engine.fire(stimulus)?)]
        };
        for (tag, outcome) in outcomes {
            clean &= report(&tag, &outcome);
        }
    }

    print_hot_values(&engine)?;
    Ok(if clean {
        exit_codes::OK
    } else {
        exit_codes::REJECTED
    })
}

fn cmd_stroll(path: &Path, tag: &str, secs: f64) -> Result<i32> {
    let run_for =
        Duration::try_from_secs_f64(secs).context("--secs must be a non-negative number")?;
    let (engine, poll) = build_engine(path)?;
    if !engine.registry().lookup(tag)?.spec.timer {
        bail!("action '{tag}' is not timed");
    }
    report(tag, &engine.fire(tag)?);

    let until = Instant::now()
        .checked_add(run_for)
        .context("--secs is too large")?;
    let mut clean = true;
    let mut ticks = 0usize;
    while engine.list_active_timers().contains(tag) {
        let Some(deadline) = engine.next_timer_deadline() else {
            break;
        };
        if deadline > until {
            break;
        }
        let now = Instant::now();
        if deadline > now {
            std::thread::sleep((deadline - now).min(poll));
        }
        for summary in engine.tick(Instant::now())? {
            ticks += 1;
            clean &= summary_is_clean(&summary);
        }
    }
    info!(action = %tag, ticks, "stroll finished");

    print_hot_values(&engine)?;
    Ok(if clean {
        exit_codes::OK
    } else {
        exit_codes::REJECTED
    })
}

/// Print a one-line verdict per stimulus to stderr. Returns whether the
/// dispatch ran without violations.
fn report(tag: &str, outcome: &FireOutcome) -> bool {
    match outcome {
        FireOutcome::TimerStarted => {
            eprintln!("{tag}: timer started");
            true
        }
        FireOutcome::TimerStopped => {
            eprintln!("{tag}: timer stopped");
            true
        }
        FireOutcome::Dispatched(summary) => {
            eprintln!("{tag}: ran {}", summary.queue().join(" -> "));
            summary_is_clean(summary)
        }
    }
}

fn summary_is_clean(summary: &DispatchSummary) -> bool {
    let violations = summary.violations();
    for violation in &violations {
        eprintln!("  {violation}");
    }
    violations.is_empty()
}

fn print_hot_values(engine: &Engine) -> Result<()> {
    let payload =
        serde_json::to_string_pretty(&engine.hot_values()).context("serialize hot variables")?;
    println!("{payload}");
    Ok(())
}
