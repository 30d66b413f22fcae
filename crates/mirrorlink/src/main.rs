mod cmd;
mod console;
mod exit;
mod logging;
mod output;
mod pattern;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "mirrorlink",
    version,
    about = "Mirroring-side command channel and shared frame publisher"
)]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    /// Per-crate log filter (`target=level,...`). Overrides --log-level.
    #[arg(long, value_name = "DIRECTIVES", env = "MIRRORLINK_LOG", global = true)]
    log_filter: Option<String>,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level, cli.log_filter.as_deref());

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    match cmd::run(cli.command, format) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_subcommand() {
        let cli = Cli::try_parse_from([
            "mirrorlink",
            "run",
            "--host",
            "127.0.0.1",
            "--port",
            "27183",
            "--shm-name",
            "scene",
            "--frames-enabled",
        ])
        .expect("run args should parse");

        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.port, 27183);
                assert_eq!(args.shm_name, "scene");
                assert!(args.frames_enabled);
                assert!(!args.console);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_zero_fps() {
        let err = Cli::try_parse_from(["mirrorlink", "run", "--port", "1", "--fps", "0"])
            .expect_err("fps of zero should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn parses_listen_send_pairs() {
        let cli = Cli::try_parse_from([
            "mirrorlink",
            "listen",
            "--port",
            "0",
            "--send",
            "ping",
            "--send",
            "enable_frames=now",
        ])
        .expect("listen args should parse");

        match cli.command {
            Command::Listen(args) => {
                assert_eq!(
                    args.send,
                    vec![
                        ("ping".to_string(), String::new()),
                        ("enable_frames".to_string(), "now".to_string()),
                    ]
                );
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_mapping_kind() {
        let err = Cli::try_parse_from([
            "mirrorlink",
            "read-frame",
            "--shm-name",
            "scene",
            "--kind",
            "pipe",
        ])
        .expect_err("unknown kind should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }

    #[test]
    fn global_format_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["mirrorlink", "version", "--format", "json"])
            .expect("global flag should parse");
        assert!(matches!(cli.format, Some(OutputFormat::Json)));
    }
}
