use seqplay::cli::Args;
use seqplay::config::{self, CONFIG_FILE, PathConfig, ReplayConfig};
use seqplay::{Emission, EventBus, ReplayFinishedEvent, ReplayScheduler, RunOutcome, downcast_event};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{debug, info, warn};
use serde_json::Value;
use std::io::{self, Read, Write};
use std::path::Path;

fn main() -> Result<()> {
    let args = Args::parse();
    let path_config = PathConfig::from_env_and_cli(args.config_dir.clone());

    init_logging(&args, &path_config)?;
    debug!("Command-line args: {:?}", args);

    let config_path = config::config_file(CONFIG_FILE, &path_config);
    info!("Config path: {}", config_path.display());
    let mut replay_config = ReplayConfig::load_or_default(&config_path)?;
    args.apply(&mut replay_config);

    let items = read_items(args.input_path().map(|p| p.as_path()))?;
    info!(
        "Replaying {} items ({:?} per item)",
        items.len(),
        replay_config.pacing().per_item_delay(items.len())
    );

    let bus = EventBus::new();
    let scheduler = ReplayScheduler::with_config(replay_config).with_events(bus.emitter());
    let (consumer, rx) = seqplay::channel();
    let handle = scheduler.start_configured(items, consumer)?;

    // Items arrive here, on the main thread; the loop ends when the worker drops the consumer
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut received = 0usize;
    for emission in rx.iter() {
        print_emission(&mut out, &emission, args.json)?;
        received += 1;
        if args.cancel_after == Some(received) {
            info!("Cancelling after {} items", received);
            handle.cancel();
        }
    }
    out.flush()?;

    let outcome = handle.wait();
    for event in bus.poll() {
        if let Some(finished) = downcast_event::<ReplayFinishedEvent>(&event) {
            debug!("Run {} finished: {:?}", finished.run_id, finished.outcome);
        }
    }

    match outcome {
        RunOutcome::Completed { emitted } => info!("Done: {} items", emitted),
        RunOutcome::Cancelled { emitted } => warn!("Cancelled after {} items", emitted),
        RunOutcome::Failed { emitted, error } => bail!("Replay failed after {} items: {}", emitted, error),
    }
    Ok(())
}

/// Same scheme as the rest of the toolchain: -v levels, RUST_LOG, optional file
fn init_logging(args: &Args, path_config: &PathConfig) -> Result<()> {
    let log_level = args.log_level();

    if let Some(log_path_opt) = &args.log_file {
        let log_path = match log_path_opt {
            Some(path) => path.clone(),
            None => {
                config::ensure_dirs(path_config)?;
                config::config_file("seqplay.log", path_config)
            }
        };
        let file = std::fs::File::create(&log_path)
            .with_context(|| format!("Failed to create log file: {}", log_path.display()))?;

        env_logger::Builder::new()
            .filter_level(log_level)
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();

        info!("Logging to file: {} (level: {:?})", log_path.display(), log_level);
    } else {
        // Console logging (respects RUST_LOG if set)
        let default_level = log_level.to_string().to_lowercase();
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .format_timestamp_millis()
            .init();
    }
    Ok(())
}

fn read_items(path: Option<&Path>) -> Result<Vec<Value>> {
    let raw = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read input: {}", path.display()))?,
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };

    match serde_json::from_str::<Value>(&raw).context("Input is not valid JSON")? {
        Value::Array(items) => Ok(items),
        other => bail!("Expected a JSON array, got {}", json_kind(&other)),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn print_emission(out: &mut impl Write, emission: &Emission<Value>, json: bool) -> Result<()> {
    if json {
        let line = serde_json::json!({
            "index": emission.index,
            "role": emission.role,
            "item": emission.item,
        });
        writeln!(out, "{}", line)?;
    } else {
        writeln!(out, "{}\t{}\t{}", emission.index, emission.role, emission.item)?;
    }
    Ok(())
}
