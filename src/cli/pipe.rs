//! CLI Pipe Support
//!
//! Input from files or stdin, raw stream rendering on stdout, and parse
//! reports for automation and scripting.

use crate::core::bridge::TerminalSink;
use crate::core::dispatch::DispatchStats;
use crate::core::telemetry::TelemetryState;
use chrono::Local;
use serde::Serialize;
use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

/// Open a file for line reading; `None` or `-` reads stdin
pub fn open_input(path: Option<&Path>) -> io::Result<Box<dyn BufRead>> {
    match path {
        Some(p) if p != Path::new("-") => Ok(Box::new(BufReader::new(File::open(p)?))),
        _ => Ok(Box::new(BufReader::new(io::stdin()))),
    }
}

/// How the raw stream is shown on stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum StreamFormat {
    /// Bytes as received
    #[default]
    Raw,
    /// Hex dump, one line per chunk
    Hex,
    /// Text with control bytes escaped, one line per chunk
    Escaped,
}

/// Format a chunk for display
pub fn format_output(data: &[u8], format: StreamFormat) -> String {
    match format {
        StreamFormat::Raw => String::from_utf8_lossy(data).to_string(),
        StreamFormat::Hex => hex_format(data),
        StreamFormat::Escaped => escaped_format(data),
    }
}

fn hex_format(data: &[u8]) -> String {
    data.iter()
        .map(|b| hex::encode([*b]))
        .collect::<Vec<_>>()
        .join(" ")
}

fn escaped_format(data: &[u8]) -> String {
    data.iter()
        .map(|&b| match b {
            0x00 => "\\0".to_string(),
            0x09 => "\\t".to_string(),
            0x0a => "\\n".to_string(),
            0x0d => "\\r".to_string(),
            0x1b => "\\e".to_string(),
            0x20..=0x7e => (b as char).to_string(),
            _ => format!("\\x{:02x}", b),
        })
        .collect()
}

/// Bridge sink that prints to stdout
pub struct StdoutSink<W: Write = io::Stdout> {
    out: W,
    format: StreamFormat,
    timestamps: bool,
    line_start: bool,
}

impl StdoutSink {
    /// Print to the process stdout
    pub fn new(format: StreamFormat, timestamps: bool) -> Self {
        Self::with_writer(io::stdout(), format, timestamps)
    }
}

impl<W: Write> StdoutSink<W> {
    /// Print to any writer
    pub fn with_writer(out: W, format: StreamFormat, timestamps: bool) -> Self {
        Self {
            out,
            format,
            timestamps,
            line_start: true,
        }
    }

    /// Consume the sink, returning the writer
    pub fn into_inner(self) -> W {
        self.out
    }

    fn timestamp() -> String {
        format!("[{}] ", Local::now().format("%H:%M:%S%.3f"))
    }

    fn render(&mut self, data: &[u8]) -> io::Result<()> {
        match self.format {
            StreamFormat::Raw if !self.timestamps => self.out.write_all(data)?,
            StreamFormat::Raw => {
                // prefix every line, including one continued from the last chunk
                for piece in data.split_inclusive(|&b| b == b'\n') {
                    if self.line_start {
                        self.out.write_all(Self::timestamp().as_bytes())?;
                    }
                    self.out.write_all(piece)?;
                    self.line_start = piece.ends_with(b"\n");
                }
            }
            StreamFormat::Hex | StreamFormat::Escaped => {
                let prefix = if self.timestamps { Self::timestamp() } else { String::new() };
                writeln!(self.out, "{}{}", prefix, format_output(data, self.format))?;
            }
        }
        self.out.flush()
    }
}

impl<W: Write> TerminalSink for StdoutSink<W> {
    fn write(&mut self, data: &[u8]) {
        if let Err(e) = self.render(data) {
            tracing::debug!(error = %e, "stdout write failed");
        }
    }
}

/// Output format for parse reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary
    #[default]
    Text,
    /// JSON document
    Json,
}

/// Per-driver counters in a report
#[derive(Debug, Clone, Serialize)]
pub struct DriverReport {
    /// Driver name
    pub driver: String,
    /// Counters
    #[serde(flatten)]
    pub stats: DispatchStats,
}

/// Result of dispatching a batch of lines
#[derive(Debug, Clone, Serialize)]
pub struct ParseReport {
    /// Lines read
    pub lines: u64,
    /// Lines some handler consumed
    pub handled: u64,
    /// Per-driver counters
    pub drivers: Vec<DriverReport>,
    /// Final telemetry
    pub state: TelemetryState,
}

impl ParseReport {
    /// Render in the requested format
    pub fn render(&self, format: OutputFormat) -> String {
        match format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("{{\"error\":\"{}\"}}", e))
            }
            OutputFormat::Text => self.render_text(),
        }
    }

    fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Lines:     {} ({} handled)", self.lines, self.handled);
        for d in &self.drivers {
            let _ = writeln!(
                out,
                "  {:<10} handled={} unhandled={} checksum_rejected={}",
                d.driver, d.stats.handled, d.stats.unhandled, d.stats.checksum_rejected
            );
        }

        let s = &self.state;
        let keys: Vec<String> = s.keys.raised().map(|k| k.to_string()).collect();
        if !keys.is_empty() {
            let _ = writeln!(out, "Keys:      {}", keys.join(" "));
        }
        if let Some(location) = s.location {
            let _ = writeln!(out, "Position:  {}", location.format());
        }
        if let Some(quality) = s.fix_quality {
            let _ = writeln!(
                out,
                "Fix:       {:?} ({} satellites)",
                quality,
                s.satellites_used.unwrap_or(0)
            );
        }
        if let Some(hdop) = s.hdop {
            let _ = writeln!(out, "HDOP:      {:.1}", hdop);
        }
        if let Some(alt) = s.gps_altitude {
            let _ = writeln!(out, "Altitude:  {:.1} m", alt);
        }
        if let Some(time) = s.time {
            let _ = writeln!(out, "Time:      {} UTC", time.format("%H:%M:%S%.3f"));
        }
        if let Some(speed) = s.ground_speed_knots {
            let _ = writeln!(out, "Speed:     {:.1} kn", speed);
        }
        if let Some(track) = s.track {
            let _ = writeln!(out, "Track:     {:.1}°", track);
        }
        if let Some(heading) = s.heading {
            let _ = writeln!(out, "Heading:   {:.1}°", heading);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_hex() {
        let data = &[0x48, 0x65, 0x6c, 0x6c, 0x6f];
        assert_eq!(format_output(data, StreamFormat::Hex), "48 65 6c 6c 6f");
    }

    #[test]
    fn test_output_format_hex_padding() {
        assert_eq!(format_output(&[0x00, 0x0a, 0xff], StreamFormat::Hex), "00 0a ff");
        assert_eq!(format_output(&[], StreamFormat::Hex), "");
    }

    #[test]
    fn test_output_format_escaped() {
        let data = b"$PDKEY,1\r\n";
        assert_eq!(format_output(data, StreamFormat::Escaped), "$PDKEY,1\\r\\n");
    }

    #[test]
    fn test_raw_sink_passthrough() {
        let mut sink = StdoutSink::with_writer(Vec::new(), StreamFormat::Raw, false);
        sink.write(b"$GP");
        sink.write(b"GGA\r\n");
        assert_eq!(sink.into_inner(), b"$GPGGA\r\n");
    }

    #[test]
    fn test_raw_sink_timestamps_once_per_line() {
        let mut sink = StdoutSink::with_writer(Vec::new(), StreamFormat::Raw, true);
        sink.write(b"$A,1\n$B");
        sink.write(b",2\n");
        let text = String::from_utf8(sink.into_inner()).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('[') && lines[0].ends_with("] $A,1"));
        assert!(lines[1].ends_with("] $B,2"));
        assert_eq!(text.matches('[').count(), 2);
    }

    #[test]
    fn test_hex_sink() {
        let mut sink = StdoutSink::with_writer(Vec::new(), StreamFormat::Hex, false);
        sink.write(&[0x24, 0x0a]);
        assert_eq!(sink.into_inner(), b"24 0a\n");
    }

    #[test]
    fn test_report_text() {
        let mut state = TelemetryState::default();
        state.keys.set(5);
        state.heading = Some(90.0);
        let report = ParseReport {
            lines: 3,
            handled: 2,
            drivers: vec![DriverReport {
                driver: "nmea-key".into(),
                stats: DispatchStats { handled: 2, unhandled: 1, checksum_rejected: 0 },
            }],
            state,
        };

        let text = report.render(OutputFormat::Text);
        assert!(text.contains("Lines:     3 (2 handled)"));
        assert!(text.contains("Keys:      5"));
        assert!(text.contains("Heading:   90.0°"));

        let json: serde_json::Value = serde_json::from_str(&report.render(OutputFormat::Json)).unwrap();
        assert_eq!(json["drivers"][0]["driver"], "nmea-key");
        assert_eq!(json["drivers"][0]["unhandled"], 1);
        assert_eq!(json["state"]["heading"], 90.0);
    }

    #[test]
    fn test_open_missing_file() {
        let err = open_input(Some(Path::new("/nonexistent/nmeamon.log"))).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
