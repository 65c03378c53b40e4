// SPDX-License-Identifier: MIT
#![deny(warnings)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]

mod tui;

use std::fs::File;
use std::io::{self, BufWriter, Stdout, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use crossterm::event::{self, Event, KeyEventKind};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use num_format::{Locale, ToFormattedString};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tracing_subscriber::EnvFilter;

use camimu::config::{
    DEFAULT_FRAME_INDEX_WIDTH, DEFAULT_INDEX_WIDTH, DEFAULT_INERTIAL_CAPACITY,
    DEFAULT_JPEG_QUALITY, DEFAULT_RATE_WINDOW, DEFAULT_WRITER_THREADS,
};
use camimu::recording::reader::SessionReader;
use camimu::source::{Producers, SourceConfig};
use camimu::{
    CaptureConfig, CaptureSession, Channel, InertialFormat, InertialSample, PixelFormat,
    StopOutcome,
};

use crate::tui::app::App;
use crate::tui::input::handle_key;

const EVENT_POLL_TIMEOUT: Duration = Duration::from_millis(50);
const RECORD_POLL_INTERVAL: Duration = Duration::from_millis(100);
const HEADLESS_STATUS_INTERVAL: Duration = Duration::from_secs(5);
const LOG_FILE: &str = "camimu.log";
const DEFAULT_LOG_DIRECTIVE: &str = "camimu=info";

#[derive(Parser)]
#[command(
    name = "camimu",
    version,
    about = "camimu: camera frame and IMU capture recorder"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record from the sensor sources without TUI (headless)
    Record {
        #[command(flatten)]
        capture: CaptureArgs,
        /// Stop after this many seconds (0 runs until interrupted)
        #[arg(long, default_value = "0")]
        duration: u64,
    },
    /// Live sensor view; `c` starts and stops capturing
    Live {
        #[command(flatten)]
        capture: CaptureArgs,
    },
    /// Summarize a recorded session directory
    Inspect { session: PathBuf },
    /// Export one inertial channel of a session to CSV
    Export {
        session: PathBuf,
        #[arg(short, long, default_value = "gyro")]
        channel: Channel,
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Args)]
struct CaptureArgs {
    /// Directory under which session directories are created
    #[arg(short, long)]
    output: PathBuf,
    /// Samples per inertial sequence file
    #[arg(long, default_value_t = DEFAULT_INERTIAL_CAPACITY)]
    capacity: usize,
    /// Inertial file encoding: text or binary
    #[arg(long, default_value = "text")]
    format: InertialFormat,
    /// Observe camera frames without writing them
    #[arg(long)]
    no_frames: bool,
    #[arg(long, default_value_t = DEFAULT_WRITER_THREADS)]
    writers: usize,
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY)]
    jpeg_quality: u8,
    #[arg(long, default_value_t = 200.0)]
    gyro_hz: f64,
    #[arg(long, default_value_t = 200.0)]
    acce_hz: f64,
    #[arg(long, default_value_t = 30.0)]
    fps: f64,
    #[arg(long, default_value_t = 320)]
    width: u32,
    #[arg(long, default_value_t = 240)]
    height: u32,
}

impl CaptureArgs {
    fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            inertial_capacity: self.capacity,
            rate_window: DEFAULT_RATE_WINDOW,
            writer_threads: self.writers,
            inertial_format: self.format,
            jpeg_quality: self.jpeg_quality,
            record_frames: !self.no_frames,
            index_width: DEFAULT_INDEX_WIDTH,
            frame_index_width: DEFAULT_FRAME_INDEX_WIDTH,
        }
    }

    fn source_config(&self) -> SourceConfig {
        SourceConfig {
            gyro_hz: self.gyro_hz,
            acce_hz: self.acce_hz,
            fps: self.fps,
            width: self.width,
            height: self.height,
            format: PixelFormat::Nv21,
        }
    }

    fn open_session(&self) -> Result<Arc<CaptureSession>> {
        let session =
            CaptureSession::new(self.capture_config()).context("invalid capture settings")?;
        Ok(Arc::new(session))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Record { capture, duration } => cmd_record(&capture, duration),
        Commands::Live { capture } => cmd_live(&capture),
        Commands::Inspect { session } => cmd_inspect(&session),
        Commands::Export {
            session,
            channel,
            output,
        } => cmd_export(&session, channel, &output),
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Logs go to stderr, or to `log_file` while the terminal is in raw mode.
fn init_tracing(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVE));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(io::stderr).init(),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Signal handling
// ---------------------------------------------------------------------------

fn install_signal_handler() -> Result<Arc<AtomicBool>> {
    let shutdown = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&shutdown))
        .context("failed to register SIGINT handler")?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&shutdown))
        .context("failed to register SIGTERM handler")?;
    Ok(shutdown)
}

// ---------------------------------------------------------------------------
// Terminal setup / teardown
// ---------------------------------------------------------------------------

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, EnterAlternateScreen)
        .context("failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).context("failed to create terminal")
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    crossterm::execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to show cursor")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Shared: session directories and shutdown
// ---------------------------------------------------------------------------

/// A fresh `session-<unix millis>` directory under `root`. A numeric suffix
/// is added if that name is already taken.
pub(crate) fn new_session_dir(root: &Path) -> PathBuf {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis());
    let base = root.join(format!("session-{millis}"));
    if !base.exists() {
        return base;
    }
    (1u32..)
        .map(|n| root.join(format!("session-{millis}-{n}")))
        .find(|p| !p.exists())
        .unwrap_or(base)
}

/// Stops producers, seals what is left and waits for every pending write.
fn finish_capture(producers: &mut Producers, session: &CaptureSession) {
    producers.shutdown();
    let outcome = session.stop();
    session.drain();

    let stats = session.writer_stats();
    if let StopOutcome::Stopped { dir, sequences } = outcome {
        eprintln!(
            "Finished: {} sequences written to {}",
            sequences.to_formatted_string(&Locale::en),
            dir.display()
        );
    }
    if stats.failed > 0 {
        eprintln!(
            "warning: {} sequence writes failed (last: {})",
            stats.failed,
            stats.last_error.as_deref().unwrap_or("unknown")
        );
    }
    let rejected = session.rejected();
    if rejected > 0 {
        eprintln!("warning: {rejected} samples rejected");
    }
}

// ---------------------------------------------------------------------------
// Live subcommand
// ---------------------------------------------------------------------------

fn cmd_live(args: &CaptureArgs) -> Result<()> {
    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("failed to create {}", args.output.display()))?;
    init_tracing(Some(&args.output.join(LOG_FILE)))?;
    let shutdown = install_signal_handler()?;

    let session = args.open_session()?;
    let mut producers = Producers::spawn(&session, &args.source_config(), Instant::now())
        .context("failed to start sensor sources")?;

    let mut app = App::new(Arc::clone(&session), args.output.clone());
    let mut terminal = setup_terminal()?;
    let result = run_live_loop(&shutdown, &mut app, &mut terminal);
    restore_terminal(&mut terminal)?;

    finish_capture(&mut producers, &session);
    result
}

fn run_live_loop(
    shutdown: &Arc<AtomicBool>,
    app: &mut App,
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
) -> Result<()> {
    loop {
        if shutdown.load(Ordering::Relaxed) || app.should_quit {
            break;
        }

        if event::poll(EVENT_POLL_TIMEOUT).context("failed to poll events")?
            && let Event::Key(key) = event::read().context("failed to read event")?
            && key.kind == KeyEventKind::Press
        {
            app.handle_action(&handle_key(key.code));
        }

        terminal
            .draw(|f| app.render(f))
            .context("failed to draw frame")?;
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Record subcommand
// ---------------------------------------------------------------------------

fn cmd_record(args: &CaptureArgs, duration_secs: u64) -> Result<()> {
    init_tracing(None)?;
    let shutdown = install_signal_handler()?;
    let session = args.open_session()?;

    let dir = new_session_dir(&args.output);
    session
        .start(&dir)
        .with_context(|| format!("failed to start capture in {}", dir.display()))?;
    let mut producers = Producers::spawn(&session, &args.source_config(), Instant::now())
        .context("failed to start sensor sources")?;

    let max_duration = if duration_secs > 0 {
        Some(Duration::from_secs(duration_secs))
    } else {
        None
    };

    let start = Instant::now();
    let mut last_status = Instant::now();

    eprintln!("Recording to {} ...", dir.display());

    loop {
        if shutdown.load(Ordering::Relaxed) {
            eprintln!("\nInterrupted.");
            break;
        }
        if let Some(max) = max_duration
            && start.elapsed() >= max
        {
            eprintln!("\nDuration limit reached.");
            break;
        }

        std::thread::sleep(RECORD_POLL_INTERVAL);

        if last_status.elapsed() >= HEADLESS_STATUS_INTERVAL {
            print_recording_status(start.elapsed(), &session);
            last_status = Instant::now();
        }
    }

    finish_capture(&mut producers, &session);
    Ok(())
}

fn print_recording_status(elapsed: Duration, session: &CaptureSession) {
    let secs = elapsed.as_secs();
    let stats = session.writer_stats();
    eprintln!(
        "  [{secs}s] gyro {:.1} Hz, acce {:.1} Hz, {:.1} fps | {} sequences written, {} pending",
        session.rate(Channel::Gyro),
        session.rate(Channel::Acce),
        session.rate(Channel::Frame),
        stats.completed.to_formatted_string(&Locale::en),
        stats.pending,
    );
}

// ---------------------------------------------------------------------------
// Inspect subcommand
// ---------------------------------------------------------------------------

fn cmd_inspect(path: &Path) -> Result<()> {
    let reader = SessionReader::open(path)?;

    println!("Session {}", reader.dir().display());
    match reader.metadata() {
        Some(meta) => {
            let started = meta
                .started_at
                .duration_since(UNIX_EPOCH)
                .map_or(0, |d| d.as_secs());
            println!(
                "  started {started} (unix), capacity {}, format {:?}, frames {}",
                meta.config.inertial_capacity,
                meta.config.inertial_format,
                if meta.config.record_frames {
                    "recorded"
                } else {
                    "not recorded"
                },
            );
        }
        None => println!("  no session metadata"),
    }

    for channel in Channel::INERTIAL {
        let files = reader.sequence_files(channel).len();
        let samples = reader.read_inertial(channel)?;
        println!("  {}", summarize_channel(channel, files, &samples));
    }
    println!(
        "  {}: {} frames",
        Channel::Frame,
        reader.frame_count().to_formatted_string(&Locale::en)
    );
    Ok(())
}

fn summarize_channel(channel: Channel, files: usize, samples: &[InertialSample]) -> String {
    let count = samples.len().to_formatted_string(&Locale::en);
    match (samples.first(), samples.last()) {
        (Some(first), Some(last)) if last.timestamp_ns > first.timestamp_ns => {
            let span_ns = last.timestamp_ns - first.timestamp_ns;
            #[allow(clippy::cast_precision_loss)]
            let rate = (samples.len() - 1) as f64 * 1e9 / span_ns as f64;
            #[allow(clippy::cast_precision_loss)]
            let span_s = span_ns as f64 / 1e9;
            format!("{channel}: {files} files, {count} samples over {span_s:.3} s ({rate:.1} Hz)")
        }
        _ => format!("{channel}: {files} files, {count} samples"),
    }
}

// ---------------------------------------------------------------------------
// Export subcommand
// ---------------------------------------------------------------------------

fn cmd_export(input: &Path, channel: Channel, output: &Path) -> Result<()> {
    if !channel.is_inertial() {
        bail!("only gyro and acce can be exported, not {channel}");
    }

    let reader = SessionReader::open(input)?;
    let samples = reader.read_inertial(channel)?;

    let file = File::create(output)
        .with_context(|| format!("failed to create {}", output.display()))?;
    let mut out = BufWriter::new(file);

    write_csv_header(&mut out)?;
    for (i, sample) in samples.iter().enumerate() {
        write_csv_row(&mut out, i, sample)?;
    }
    out.flush().context("failed to flush CSV")?;

    eprintln!(
        "Exported {} {channel} samples from {} to {}",
        samples.len(),
        input.display(),
        output.display()
    );
    Ok(())
}

fn write_csv_header(out: &mut impl Write) -> Result<()> {
    writeln!(out, "index,timestamp_ns,x,y,z").context("failed to write CSV header")
}

fn write_csv_row(out: &mut impl Write, index: usize, s: &InertialSample) -> Result<()> {
    writeln!(
        out,
        "{index},{},{:.6},{:.6},{:.6}",
        s.timestamp_ns, s.x, s.y, s.z
    )
    .context("failed to write CSV row")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_dirs_do_not_collide() {
        let tmp = tempfile::tempdir().unwrap();
        let first = new_session_dir(tmp.path());
        std::fs::create_dir_all(&first).unwrap();
        let second = new_session_dir(tmp.path());
        assert_ne!(first, second);
        assert!(second.starts_with(tmp.path()));
    }

    #[test]
    fn channel_summary_reports_mean_rate() {
        let samples: Vec<_> = (0..5)
            .map(|i| InertialSample::new(i * 10_000_000, 0.0, 0.0, 0.0))
            .collect();
        let line = summarize_channel(Channel::Gyro, 2, &samples);
        assert_eq!(line, "gyro: 2 files, 5 samples over 0.040 s (100.0 Hz)");

        let line = summarize_channel(Channel::Acce, 0, &[]);
        assert_eq!(line, "acce: 0 files, 0 samples");
    }

    #[test]
    fn csv_rows() {
        let mut out = Vec::new();
        write_csv_header(&mut out).unwrap();
        write_csv_row(&mut out, 0, &InertialSample::new(42, 1.0, -0.5, 0.25)).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "index,timestamp_ns,x,y,z\n0,42,1.000000,-0.500000,0.250000\n"
        );
    }
}
