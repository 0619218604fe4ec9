mod cli;
mod error_fmt;
mod run;

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::WrapErr;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use cli::{Cli, Commands, FILE_GUARD, JSON_MODE, RoutineAction};
use error_fmt::{exit_code_for_error, format_error_json, humanize};
use liftctl_config::{Config, FsRoutineStore, Logging, load_routine_toml, load_toml};
use liftctl_traits::{Routine, RoutineStore, SessionRecord};
use run::SimKnobs;

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(err) = try_main(&cli) {
        if cli.json {
            eprintln!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
        }
        std::process::exit(exit_code_for_error(&err));
    }
}

fn try_main(cli: &Cli) -> eyre::Result<()> {
    let cfg = load_config(&cli.config)?;
    init_logging(&cfg.logging, cli)?;
    color_eyre::install().ok();

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || shutdown.store(true, Ordering::SeqCst))
            .wrap_err("installing Ctrl-C handler")?;
    }

    match &cli.cmd {
        Commands::Run {
            routine,
            rep_ms,
            amrap_reps,
            print_sets,
        } => {
            let routine = load_routine(routine, &cli.routines)?;
            let knobs = SimKnobs {
                rep_ms: *rep_ms,
                amrap_reps: *amrap_reps,
            };
            let events = run::script_for_routine(&routine, &cfg, &knobs);
            tracing::info!(routine = %routine.name, events = events.len(), "starting routine run");
            let (state, records) = run::run_scripted(cfg, events, Some(routine), shutdown)?;
            report(cli, &records, state, *print_sets);
        }
        Commands::JustLift {
            weight,
            reps,
            rep_ms,
        } => {
            let events = run::script_for_just_lift(&cfg, *weight, *reps, *rep_ms);
            tracing::info!(weight, "starting just-lift block");
            let (state, records) = run::run_scripted(cfg, events, None, shutdown)?;
            report(cli, &records, state, true);
        }
        Commands::Routines { action } => routines_cmd(cli, action)?,
        Commands::Check => check_cmd(cli, &cfg)?,
    }
    Ok(())
}

/// Missing config file means defaults; a present but broken one is an error.
fn load_config(path: &Path) -> eyre::Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let text = fs::read_to_string(path)
        .wrap_err_with(|| format!("reading config {}", path.display()))?;
    let cfg = load_toml(&text).wrap_err_with(|| format!("parsing config {}", path.display()))?;
    cfg.validate()
        .wrap_err_with(|| format!("validating config {}", path.display()))?;
    Ok(cfg)
}

fn init_logging(logging: &Logging, cli: &Cli) -> eyre::Result<()> {
    use tracing_subscriber::{EnvFilter, Registry, fmt};

    let level = logging.level.as_deref().unwrap_or(&cli.log_level);
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;
    let mut layers: Vec<BoxedLayer> = Vec::new();

    if cli.json {
        layers.push(fmt::layer().json().with_writer(std::io::stderr).boxed());
    } else {
        layers.push(fmt::layer().with_writer(std::io::stderr).boxed());
    }

    if let Some(file) = &logging.file {
        let path = Path::new(file);
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let name = path.file_name().map(|n| n.to_owned()).unwrap_or_default();
        let appender = match logging.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .boxed(),
        );
    }

    tracing_subscriber::registry().with(layers).with(filter).init();
    Ok(())
}

/// Resolve a `--routine` value: an existing path loads directly, anything
/// else is looked up by name in the routine library.
fn load_routine(value: &str, dir: &Path) -> eyre::Result<Routine> {
    let path = Path::new(value);
    if path.exists() {
        let text = fs::read_to_string(path)
            .wrap_err_with(|| format!("reading routine {}", path.display()))?;
        return load_routine_toml(&text)
            .wrap_err_with(|| format!("parsing routine {}", path.display()));
    }
    let mut store = FsRoutineStore::open(dir)?;
    let routines = store
        .all_routines()
        .map_err(|e| eyre::eyre!("listing routines: {e}"))?;
    routines
        .into_iter()
        .find(|r| r.name == value)
        .ok_or_else(|| eyre::eyre!("no routine named '{value}' in {}", dir.display()))
}

fn routines_cmd(cli: &Cli, action: &RoutineAction) -> eyre::Result<()> {
    let mut store = FsRoutineStore::open(&cli.routines)?;
    match action {
        RoutineAction::List => {
            let routines = store
                .all_routines()
                .map_err(|e| eyre::eyre!("listing routines: {e}"))?;
            if cli.json {
                for r in &routines {
                    let sets: usize = r.exercises.iter().map(|e| e.set_count()).sum();
                    println!(
                        "{}",
                        serde_json::json!({
                            "name": r.name,
                            "exercises": r.exercises.len(),
                            "sets": sets,
                        })
                    );
                }
            } else if routines.is_empty() {
                println!("no routines in {}", cli.routines.display());
            } else {
                for r in &routines {
                    let sets: usize = r.exercises.iter().map(|e| e.set_count()).sum();
                    println!("{}  ({} exercises, {} sets)", r.name, r.exercises.len(), sets);
                }
            }
        }
        RoutineAction::Add { file } => {
            let text = fs::read_to_string(file)
                .wrap_err_with(|| format!("reading routine {}", file.display()))?;
            let routine = load_routine_toml(&text)
                .wrap_err_with(|| format!("parsing routine {}", file.display()))?;
            store
                .save_routine(&routine)
                .map_err(|e| eyre::eyre!("saving routine: {e}"))?;
            println!("added '{}'", routine.name);
        }
        RoutineAction::Remove { name } => {
            store
                .delete_routine(name)
                .map_err(|e| eyre::eyre!("removing routine '{name}': {e}"))?;
            println!("removed '{name}'");
        }
    }
    Ok(())
}

/// Validate the config plus every routine file in the library, failing on
/// the first broken file instead of silently skipping it.
fn check_cmd(cli: &Cli, cfg: &Config) -> eyre::Result<()> {
    cfg.validate().wrap_err("config check failed")?;

    let mut checked = 0usize;
    if cli.routines.is_dir() {
        for entry in fs::read_dir(&cli.routines)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("toml") {
                continue;
            }
            let text = fs::read_to_string(&path)?;
            load_routine_toml(&text)
                .wrap_err_with(|| format!("routine {} is invalid", path.display()))?;
            checked += 1;
        }
    }

    if cli.json {
        println!(
            "{}",
            serde_json::json!({ "event": "check", "ok": true, "routines": checked })
        );
    } else {
        println!("ok: config valid, {checked} routine file(s) valid");
    }
    Ok(())
}

fn report(
    cli: &Cli,
    records: &[SessionRecord],
    state: liftctl_core::WorkoutState,
    print_sets: bool,
) {
    if cli.json {
        for r in records {
            println!(
                "{}",
                serde_json::json!({
                    "event": "set",
                    "exercise": r.exercise,
                    "working_reps": r.working_reps,
                    "warmup_reps": r.warmup_reps,
                    "weight_per_cable_kg": r.weight_per_cable_kg,
                    "duration_ms": r.duration_ms,
                    "total_volume_kg": r.total_volume_kg,
                    "estimated_kcal": r.estimated_kcal,
                })
            );
        }
        println!(
            "{}",
            serde_json::json!({
                "event": "session",
                "sets": records.len(),
                "state": format!("{state:?}"),
            })
        );
        return;
    }

    if print_sets {
        for (i, r) in records.iter().enumerate() {
            println!(
                "set {}: {} with {} working reps ({} warmup) @ {:.1} kg/cable, {:.0} kg volume",
                i + 1,
                r.exercise,
                r.working_reps,
                r.warmup_reps,
                r.weight_per_cable_kg,
                r.total_volume_kg,
            );
        }
    }
    println!("session complete: {} set(s) saved ({state:?})", records.len());
}
