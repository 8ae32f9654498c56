//! CLI Module
//!
//! Provides command-line interface functionality including:
//! - Exit codes for automation
//! - Pipe support for stdin/stdout

pub mod exit_codes;
pub mod pipe;

pub use exit_codes::{exit_code_description, print_exit_codes, CliResult, ExitCodes};
pub use pipe::{
    format_output, open_input, DriverReport, OutputFormat, ParseReport, StdoutSink, StreamFormat,
};
