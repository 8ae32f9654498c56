//! Nmeamon - NMEA instrument monitor
//!
//! Command-line front end for:
//! - Parsing captured sentence logs into telemetry
//! - Live monitoring of serial and TCP instruments
//! - Checksum generation and verification

use anyhow::anyhow;
use clap::{Parser, Subcommand};
use nmeamon_core::cli::{
    open_input, print_exit_codes, CliResult, DriverReport, ExitCodes, OutputFormat, ParseReport,
    StdoutSink, StreamFormat,
};
use nmeamon_core::config::{data_dir, AppConfig, LoggingConfig};
use nmeamon_core::core::bridge::{StreamBridge, TerminalSink};
use nmeamon_core::core::device::{DataHandler, DeviceDescriptor};
use nmeamon_core::core::driver::catalog;
use nmeamon_core::core::logger::{generate_capture_filename, CaptureFormat, CaptureLog};
use nmeamon_core::core::protocol::{checksum, ChecksumStatus};
use nmeamon_core::core::session::{Session, SessionState};
use nmeamon_core::core::telemetry::TelemetryState;
use nmeamon_core::core::transport::{
    create_transport, list_ports, SerialConfig, SerialParity, TcpConfig, Transport,
};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Nmeamon CLI
#[derive(Parser, Debug)]
#[command(
    name = "nmeamon",
    version,
    about = "NMEA sentence ingest and raw port monitor",
    long_about = None
)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(short, long, env = "NMEAMON_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose logging (debug level)
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode (errors only)
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List available serial ports
    ListPorts,

    /// List built-in drivers and the sentences they handle
    Drivers {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Append a checksum to a sentence, or verify one
    Checksum {
        /// Sentence, e.g. '$PDKEY,5'
        sentence: String,

        /// Verify the existing checksum instead of appending one
        #[arg(long)]
        verify: bool,
    },

    /// Dispatch sentences from a file (or stdin) and print the resulting state
    Parse {
        /// Input file; '-' or omitted reads stdin
        file: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Drivers to use, in order (overrides config)
        #[arg(short, long = "driver")]
        drivers: Vec<String>,
    },

    /// Connect to an instrument and show the raw stream
    Monitor {
        /// TCP source as host:port
        #[arg(long, conflicts_with = "serial", required_unless_present = "serial")]
        tcp: Option<String>,

        /// Serial port name (e.g., COM3, /dev/ttyUSB0)
        #[arg(long)]
        serial: Option<String>,

        /// Baud rate
        #[arg(short, long, default_value = "4800")]
        baud: u32,

        /// Parity (none, odd, even)
        #[arg(long, default_value = "none")]
        parity: SerialParity,

        /// Stream display format
        #[arg(long, value_enum, default_value_t = StreamFormat::Raw)]
        display: StreamFormat,

        /// Prefix output with timestamps
        #[arg(long)]
        timestamps: bool,

        /// Do not print the raw stream (keys and summary only)
        #[arg(long)]
        no_raw: bool,

        /// Capture the raw stream to a file or directory; without a value,
        /// into the data directory
        #[arg(short, long, num_args = 0..=1)]
        log: Option<Option<PathBuf>>,

        /// Capture format (raw, text, hex)
        #[arg(long, default_value = "raw")]
        log_format: CaptureFormat,

        /// Drivers to use, in order (overrides config)
        #[arg(short, long = "driver")]
        drivers: Vec<String>,
    },

    /// Print the exit code table
    ExitCodes,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };
    let mut config = match config {
        Ok(config) => config,
        Err(e) => return report(&cli, CliResult::from(e)),
    };
    if cli.verbose {
        config.logging.level = "debug".to_string();
    } else if cli.quiet {
        config.logging.level = "error".to_string();
    }

    let _guard = match init_logging(&config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            return report(&cli, CliResult::error(ExitCodes::CONFIG_ERROR, format!("Logging setup failed: {e}")))
        }
    };

    tracing::debug!("Starting nmeamon v{}", nmeamon_core::VERSION);

    let result = match &cli.command {
        Commands::ListPorts => cmd_list_ports(),
        Commands::Drivers { format } => cmd_drivers(*format),
        Commands::Checksum { sentence, verify } => cmd_checksum(sentence, *verify),
        Commands::Parse { file, format, drivers } => {
            cmd_parse(&config, file.as_deref(), *format, drivers)
        }
        Commands::Monitor { .. } => cmd_monitor(&cli, &config).await,
        Commands::ExitCodes => {
            print_exit_codes();
            CliResult::success()
        }
    };

    report(&cli, result)
}

fn report(cli: &Cli, result: CliResult) -> ExitCode {
    match &result {
        CliResult::Success(Some(msg)) => println!("{msg}"),
        CliResult::Success(None) => {}
        CliResult::Error(_, msg) => {
            if !cli.quiet || result.code() != ExitCodes::VALIDATION_FAILED {
                eprintln!("Error: {msg}");
            }
        }
    }
    result.to_exit_code()
}

fn init_logging(config: &LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;

    let stderr = if config.json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer().with_writer(std::io::stderr).boxed()
    };

    let (file_layer, guard) = match &config.file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| anyhow!("invalid log file path: {}", path.display()))?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}

fn cmd_list_ports() -> CliResult {
    let ports = match list_ports() {
        Ok(ports) => ports,
        Err(e) => return CliResult::from(e),
    };

    if ports.is_empty() {
        return CliResult::success_with_message("No serial ports found.");
    }
    for port in &ports {
        println!("{}  [{:?}]", port.port_name, port.port_type);
    }
    CliResult::success()
}

fn cmd_drivers(format: OutputFormat) -> CliResult {
    let mut drivers = Vec::new();
    for descriptor in catalog::builtin() {
        let registry = match descriptor.create() {
            Ok(registry) => registry,
            Err(e) => return CliResult::error(ExitCodes::INTERNAL_ERROR, e.to_string()),
        };
        let sentences: Vec<(String, &'static str)> = registry
            .prefixes()
            .filter_map(|p| registry.lookup(p).map(|e| (p.to_string(), e.policy().name())))
            .collect();
        drivers.push((descriptor.name, descriptor.display_name, sentences));
    }

    match format {
        OutputFormat::Json => {
            let json: Vec<serde_json::Value> = drivers
                .iter()
                .map(|(name, display_name, sentences)| {
                    serde_json::json!({
                        "name": name,
                        "display_name": display_name,
                        "sentences": sentences
                            .iter()
                            .map(|(prefix, policy)| serde_json::json!({ "prefix": prefix, "checksum": policy }))
                            .collect::<Vec<_>>(),
                    })
                })
                .collect();
            match serde_json::to_string_pretty(&json) {
                Ok(text) => CliResult::success_with_message(text),
                Err(e) => CliResult::error(ExitCodes::INTERNAL_ERROR, e.to_string()),
            }
        }
        OutputFormat::Text => {
            for (name, display_name, sentences) in &drivers {
                println!("{name} ({display_name})");
                for (prefix, policy) in sentences {
                    println!("  {prefix:<10} checksum: {policy}");
                }
            }
            CliResult::success()
        }
    }
}

fn cmd_checksum(sentence: &str, verify: bool) -> CliResult {
    let sentence = sentence.trim();
    if !verify {
        return CliResult::success_with_message(checksum::append(sentence));
    }

    match checksum::verify(sentence) {
        ChecksumStatus::Valid => CliResult::success_with_message("valid"),
        ChecksumStatus::Missing => CliResult::validation_failed("no checksum present"),
        ChecksumStatus::Invalid => CliResult::validation_failed(format!(
            "invalid checksum, expected {}",
            checksum::append(sentence)
        )),
    }
}

fn cmd_parse(
    config: &AppConfig,
    file: Option<&Path>,
    format: OutputFormat,
    drivers: &[String],
) -> CliResult {
    let mut ingest = config.ingest.clone();
    if !drivers.is_empty() {
        ingest.drivers = drivers.to_vec();
    }
    let mut chain = match ingest.build_chain() {
        Ok(chain) => chain,
        Err(e) => return CliResult::invalid_args(e.to_string()),
    };
    let mut splitter = ingest.splitter();

    let mut input = match open_input(file) {
        Ok(input) => input,
        Err(e) => return CliResult::from(e),
    };

    let mut state = TelemetryState::default();
    let mut lines = 0u64;
    let mut handled = 0u64;
    let mut buf = [0u8; 4096];

    loop {
        let n = match input.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return CliResult::from(e),
        };
        splitter.push(&buf[..n], |line| {
            lines += 1;
            if chain.parse_line(line, &mut state) {
                handled += 1;
            }
        });
    }
    // unterminated last line
    if splitter.pending() > 0 {
        splitter.push(b"\n", |line| {
            lines += 1;
            if chain.parse_line(line, &mut state) {
                handled += 1;
            }
        });
    }

    let report = ParseReport {
        lines,
        handled,
        drivers: chain
            .stats()
            .into_iter()
            .map(|(driver, stats)| DriverReport { driver, stats })
            .collect(),
        state,
    };
    print!("{}", report.render(format));
    if format == OutputFormat::Json {
        println!();
    }
    CliResult::success()
}

/// Resolve `--log`: a file is used as is, a directory (or none) gets a
/// timestamped file name
fn capture_path(target: Option<&Path>, format: CaptureFormat) -> anyhow::Result<PathBuf> {
    let dir = match target {
        Some(path) if !path.is_dir() => return Ok(path.to_path_buf()),
        Some(dir) => dir.to_path_buf(),
        None => data_dir().ok_or_else(|| anyhow!("no data directory on this platform"))?,
    };
    std::fs::create_dir_all(&dir)?;
    Ok(dir.join(generate_capture_filename("nmeamon", format)))
}

async fn cmd_monitor(cli: &Cli, config: &AppConfig) -> CliResult {
    let Commands::Monitor {
        tcp,
        serial,
        baud,
        parity,
        display,
        timestamps,
        no_raw,
        log,
        log_format,
        drivers,
    } = &cli.command
    else {
        return CliResult::error(ExitCodes::INTERNAL_ERROR, "not a monitor command");
    };

    let transport = match (tcp, serial) {
        (Some(addr), _) => match TcpConfig::parse(addr) {
            Some(cfg) => Transport::Tcp(cfg),
            None => return CliResult::invalid_args(format!("expected host:port, got {addr}")),
        },
        (None, Some(port)) => Transport::Serial(SerialConfig::new(port, *baud).parity(*parity)),
        (None, None) => return CliResult::invalid_args("either --tcp or --serial is required"),
    };

    let mut ingest = config.ingest.clone();
    if !drivers.is_empty() {
        ingest.drivers.clone_from(drivers);
    }
    let chain = match ingest.build_chain() {
        Ok(chain) => chain,
        Err(e) => return CliResult::invalid_args(e.to_string()),
    };

    let mut capture = match log {
        Some(target) => {
            let path = match capture_path(target.as_deref(), *log_format) {
                Ok(path) => path,
                Err(e) => return CliResult::error(ExitCodes::FILE_NOT_FOUND, e.to_string()),
            };
            match CaptureLog::create(&path, *log_format) {
                Ok(capture) => {
                    tracing::info!(path = %path.display(), "capturing raw stream");
                    Some(capture)
                }
                Err(e) => return CliResult::error(ExitCodes::PERMISSION_DENIED, e.to_string()),
            }
        }
        None => None,
    };

    let transport = create_transport(transport);
    let device = Arc::new(DeviceDescriptor::new(
        transport.connection_info(),
        ingest.splitter(),
        chain,
    ));

    // Raw stream: I/O task -> bridge -> consumer thread -> stdout/capture
    let (bridge, consumer) = StreamBridge::new(&config.monitor);
    let bridge = Arc::new(bridge);
    let show_raw = !*no_raw && !cli.quiet;
    if show_raw || capture.is_some() {
        device.set_monitor(Some(bridge.clone() as Arc<dyn DataHandler>));
    }

    let mut stdout = StdoutSink::new(*display, *timestamps);
    let consumer_thread = std::thread::spawn(move || {
        consumer.run(move |chunk: &[u8]| {
            if show_raw {
                stdout.write(chunk);
            }
            if let Some(capture) = capture.as_mut() {
                capture.write(chunk);
            }
        })
    });

    let mut session = match Session::open(transport, device.clone(), config.session.clone()).await {
        Ok(session) => session,
        Err(e) => {
            device.set_monitor(None);
            drop(bridge);
            let _ = consumer_thread.join();
            return CliResult::from(e);
        }
    };
    if !cli.quiet {
        eprintln!("Connected to {}. Press Ctrl+C to exit.", session.connection_info());
    }

    let interrupted = Arc::new(tokio::sync::Notify::new());
    let on_ctrlc = interrupted.clone();
    if let Err(e) = ctrlc::set_handler(move || on_ctrlc.notify_one()) {
        tracing::warn!(error = %e, "failed to install Ctrl+C handler");
    }

    let key_device = device.clone();
    let key_watch = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(200));
        loop {
            ticker.tick().await;
            let pressed: Vec<usize> = key_device.with_telemetry(|t| {
                let raised: Vec<usize> = t.keys.raised().collect();
                for key in &raised {
                    t.keys.take(*key);
                }
                raised
            });
            for key in pressed {
                tracing::info!(key, "remote key pressed");
            }
        }
    });

    tokio::select! {
        _ = interrupted.notified() => {
            tracing::debug!("interrupted");
        }
        _ = session.join() => {}
    }
    let final_state = session.state();
    session.close().await;
    key_watch.abort();

    device.set_monitor(None);
    drop(bridge);
    let bridge_stats = consumer_thread.join().unwrap_or_default();

    if !cli.quiet {
        eprintln!(
            "\nReceived {} bytes, shown {} bytes, dropped {} bytes",
            bridge_stats.bytes_received, bridge_stats.bytes_delivered, bridge_stats.bytes_dropped
        );
        for (driver, stats) in device.dispatch_stats() {
            eprintln!(
                "  {:<10} handled={} unhandled={} checksum_rejected={}",
                driver, stats.handled, stats.unhandled, stats.checksum_rejected
            );
        }
    }

    match final_state {
        SessionState::Error => {
            CliResult::error(ExitCodes::CONNECTION_FAILED, "connection lost")
        }
        _ => CliResult::success(),
    }
}
