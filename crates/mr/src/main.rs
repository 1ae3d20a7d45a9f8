//! mr - macro recorder CLI
//!
//! Record mouse clicks and key presses, then replay them with the same timing.

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use macro_recorder::platform::{self, virtual_input::VirtualSink, InputSink};
use macro_recorder::prelude::*;

#[derive(Parser)]
#[command(name = "mr")]
#[command(about = "Record mouse clicks and key presses, replay them with the same timing")]
#[command(version)]
struct Cli {
    /// Directory where named macros are kept
    #[arg(long, global = true, env = "MACRO_RECORDER_DIR")]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record until Ctrl+C, then save the macro
    Record {
        #[arg(short, long, default_value = "macro")]
        name: String,
        /// Write to this file instead of the storage directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Replay a saved macro (file name in the storage dir, or a path)
    Play {
        file: String,
        #[arg(short, long, default_value = "1.0")]
        speed: f64,
        /// Seconds to wait before the first action
        #[arg(long, default_value = "2")]
        delay: u64,
        /// Stop at the first action that cannot be synthesized
        #[arg(long)]
        abort_on_error: bool,
        /// Print the actions instead of synthesizing them
        #[arg(long)]
        dry_run: bool,
    },
    /// List saved macros
    List,
    /// Show macro info
    Show {
        file: String,
        #[arg(long)]
        all: bool,
        #[arg(long)]
        json: bool,
    },
    /// Delete a saved macro
    Delete { file: String },
}

#[derive(Serialize)]
struct Output<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<Error>,
}

impl<T: Serialize> Output<T> {
    fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), error: None }
    }
    fn err(e: Error) -> Output<()> {
        Output { success: false, data: None, error: Some(e) }
    }
}

fn print_json<T: Serialize>(output: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(output)?);
    Ok(())
}

#[derive(Serialize)]
struct MacroInfo<'a> {
    file: &'a str,
    actions: usize,
    duration_secs: f64,
    summary: Summary,
    #[serde(skip_serializing_if = "Option::is_none")]
    events: Option<&'a [Action]>,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    let storage = match cli.dir {
        Some(dir) => MacroStorage::with_dir(dir),
        None => MacroStorage::new(),
    };

    let result: Result<()> = storage.map_err(anyhow::Error::from).and_then(|storage| match cli.command {
        Commands::Record { name, output } => record(&storage, &name, output),
        Commands::Play { file, speed, delay, abort_on_error, dry_run } => {
            play(&storage, &file, speed, delay, abort_on_error, dry_run)
        }
        Commands::List => list(&storage),
        Commands::Show { file, all, json } => show(&storage, &file, all, json),
        Commands::Delete { file } => delete(&storage, &file),
    });

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        if let Some(err) = e.downcast_ref::<Error>() {
            for s in &err.suggestions {
                eprintln!("  hint: {}", s);
            }
        }
        std::process::exit(1);
    }
}

/// Flag cleared by Ctrl+C
fn interrupt_flag() -> Result<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || r.store(false, Ordering::SeqCst))?;
    Ok(running)
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}

// ── Recording ───────────────────────────────────────────────────────────────

fn record(storage: &MacroStorage, name: &str, output: Option<PathBuf>) -> Result<()> {
    let source = platform::default_source()?;
    let mut session = Session::new(source);
    session.start_recording()?;

    let running = interrupt_flag()?;
    println!("Recording: {} (Ctrl+C to stop)", name);

    let mut count = 0;
    while running.load(Ordering::SeqCst) {
        if let Some(rec) = session.recording() {
            let n = rec.len();
            if n != count {
                count = n;
                print!("\r{} action{}", n, plural(n));
                io::stdout().flush()?;
            }
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    let n = session.stop_recording()?.len();
    println!();
    if n == 0 {
        println!("No actions recorded");
        return Ok(());
    }
    println!("Recorded {} action{}", n, plural(n));

    let path = match output {
        Some(path) => {
            session.save(&path)?;
            path
        }
        None => storage.save(session.actions(), name)?,
    };
    println!("Saved: {}", path.display());
    Ok(())
}

// ── Playback ────────────────────────────────────────────────────────────────

fn play(
    storage: &MacroStorage,
    file: &str,
    speed: f64,
    delay: u64,
    abort_on_error: bool,
    dry_run: bool,
) -> Result<()> {
    let config = PlayerConfig {
        speed,
        on_error: if abort_on_error { FailurePolicy::Abort } else { FailurePolicy::Skip },
    };
    let mut session = Session::playback_only(config)?;
    let n = session.load(storage.resolve(file))?.len();
    if n == 0 {
        println!("No actions to play");
        return Ok(());
    }

    let sink: Box<dyn InputSink> = if dry_run {
        Box::new(VirtualSink::new().echo(true))
    } else {
        platform::default_sink()?
    };

    println!("Replaying {} ({} action{}) at {}x speed...", file, n, plural(n), speed);
    let running = interrupt_flag()?;
    if delay > 0 && !dry_run {
        println!("Starting in {} seconds...", delay);
        std::thread::sleep(Duration::from_secs(delay));
    }

    session.start_playback(sink)?;
    let report = wait_for_playback(&mut session, &running, |p| {
        if !dry_run {
            print!("\r{}% ({}/{})", p.percent(), p.completed, p.total);
            let _ = io::stdout().flush();
        }
    })?;

    println!();
    if report.stopped {
        println!("Stopped after {} of {} actions", report.executed + report.failed, report.total);
    } else {
        println!("Playback finished: {} of {} actions", report.executed, report.total);
    }
    if report.failed > 0 {
        println!("{} action{} could not be synthesized", report.failed, plural(report.failed));
    }
    Ok(())
}

/// Poll a running playback until it finishes or `running` is cleared.
/// Progress sent before the player thread exits is always delivered.
fn wait_for_playback(
    session: &mut Session,
    running: &AtomicBool,
    mut on_progress: impl FnMut(Progress),
) -> Result<PlaybackReport> {
    let progress = session.progress().cloned();
    loop {
        if !running.load(Ordering::SeqCst) {
            return Ok(session.stop_playback()?);
        }
        let finished = session.poll_playback();
        if let Some(rx) = &progress {
            rx.try_iter().for_each(&mut on_progress);
        }
        if let Some(report) = finished {
            return Ok(report?);
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}

// ── Storage ─────────────────────────────────────────────────────────────────

fn list(storage: &MacroStorage) -> Result<()> {
    let files = storage.list()?;
    if files.is_empty() {
        println!("No macros saved in {}", storage.path().display());
    } else {
        for f in files {
            println!("{}", f);
        }
    }
    Ok(())
}

fn show(storage: &MacroStorage, file: &str, all: bool, json: bool) -> Result<()> {
    let loaded = match storage.load(file) {
        Ok(m) => m,
        Err(e) if json => return print_json(&Output::<()>::err(e)),
        Err(e) => return Err(e.into()),
    };
    let summary = loaded.summary();

    if json {
        return print_json(&Output::ok(MacroInfo {
            file,
            actions: loaded.len(),
            duration_secs: loaded.duration(),
            summary,
            events: all.then_some(loaded.actions.as_slice()),
        }));
    }

    println!("File: {}", file);
    println!("Actions: {}", loaded.len());
    println!("Duration: {:.3}s", loaded.duration());
    println!(
        "\nSummary: {} mouse down, {} mouse up, {} key down, {} key up",
        summary.mouse_down, summary.mouse_up, summary.key_down, summary.key_up
    );
    if all {
        for (i, a) in loaded.iter().enumerate() {
            println!("{:>5}: {}", i, a);
        }
    }
    Ok(())
}

fn delete(storage: &MacroStorage, file: &str) -> Result<()> {
    storage.delete(file)?;
    println!("Deleted: {}", file);
    Ok(())
}
