pub mod listen;
pub mod read_frame;
pub mod run;
pub mod version;

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};
use mirrorlink_shm::{BackingKind, MappingConfig};
use mirrorlink_transmit::DEFAULT_MAX_FRAME_SIZE;

use crate::exit::{CliError, CliResult, INTERNAL};
use crate::output::OutputFormat;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect to a controller, answer commands and publish frames.
    Run(RunArgs),
    /// Accept one mirroring connection and print the frames it sends.
    Listen(ListenArgs),
    /// Read the current frame out of a shared frame channel.
    ReadFrame(ReadFrameArgs),
    /// Show version information.
    Version(VersionArgs),
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum MappingKind {
    /// Memory-mapped file under the temp directory.
    File,
    /// Named shared memory object.
    Shm,
}

impl From<MappingKind> for BackingKind {
    fn from(kind: MappingKind) -> Self {
        match kind {
            MappingKind::File => BackingKind::File,
            MappingKind::Shm => BackingKind::SharedMemory,
        }
    }
}

/// Build the mapping config shared by the publishing and reading commands.
fn mapping_config(kind: MappingKind, dir: Option<&PathBuf>) -> MappingConfig {
    let config = MappingConfig::default().with_kind(kind.into());
    match dir {
        Some(dir) => config.with_dir(dir),
        None => config,
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Controller host.
    #[arg(long, env = "MIRRORLINK_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Controller port.
    #[arg(long, env = "MIRRORLINK_PORT")]
    pub port: u16,

    /// Shared frame channel name.
    #[arg(long, value_name = "NAME", default_value = "mirrorlink")]
    pub shm_name: String,

    /// Shared frame channel backing.
    #[arg(long, value_enum, default_value = "file")]
    pub shm_kind: MappingKind,

    /// Directory for file-backed channels (defaults to the temp directory).
    #[arg(long, value_name = "DIR")]
    pub shm_dir: Option<PathBuf>,

    /// Largest frame payload in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_FRAME_SIZE)]
    pub max_frame_size: usize,

    /// Width of the generated test pattern.
    #[arg(long, default_value_t = 640)]
    pub width: u32,

    /// Height of the generated test pattern.
    #[arg(long, default_value_t = 480)]
    pub height: u32,

    /// Frames per second offered to the transmitter.
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u32).range(1..=240))]
    pub fps: u32,

    /// Publish frames from the start instead of waiting for `enable_frames`.
    #[arg(long)]
    pub frames_enabled: bool,

    /// Do not create a shared frame channel at all.
    #[arg(long, conflicts_with = "frames_enabled")]
    pub no_frames: bool,

    /// Read interactive commands from stdin.
    #[arg(long)]
    pub console: bool,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Port to accept the mirroring connection on (0 picks a free port).
    #[arg(long)]
    pub port: u16,

    /// Address to bind.
    #[arg(long, default_value = "127.0.0.1")]
    pub bind: String,

    /// Exit after printing this many frames.
    #[arg(long)]
    pub count: Option<usize>,

    /// Request to send once connected, as COMMAND or COMMAND=CONTENT. Repeatable.
    #[arg(long, value_name = "COMMAND[=CONTENT]", value_parser = parse_send)]
    pub send: Vec<(String, String)>,

    /// Answer incoming requests with a failed response instead of success.
    #[arg(long)]
    pub reject: bool,
}

fn parse_send(value: &str) -> Result<(String, String), String> {
    let (command, content) = value.split_once('=').unwrap_or((value, ""));
    if command.is_empty() {
        return Err("command name must not be empty".to_string());
    }
    Ok((command.to_string(), content.to_string()))
}

#[derive(Args, Debug)]
pub struct ReadFrameArgs {
    /// Shared frame channel name.
    #[arg(long, value_name = "NAME", default_value = "mirrorlink")]
    pub shm_name: String,

    /// Largest frame payload the publisher was configured with.
    #[arg(long, default_value_t = DEFAULT_MAX_FRAME_SIZE)]
    pub max_frame_size: usize,

    /// Shared frame channel backing.
    #[arg(long, value_enum, default_value = "file")]
    pub kind: MappingKind,

    /// Directory for file-backed channels (defaults to the temp directory).
    #[arg(long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Write the frame payload to this file.
    #[arg(long, value_name = "PATH")]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended version information.
    #[arg(long)]
    pub extended: bool,
}

/// Route Ctrl-C to `handler`. Can only be installed once per process.
fn on_interrupt<F>(handler: F) -> CliResult<()>
where
    F: FnMut() + Send + 'static,
{
    ctrlc::set_handler(handler).map_err(|err| {
        CliError::new(INTERNAL, format!("signal handler setup failed: {err}"))
    })
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::ReadFrame(args) => read_frame::run(args, format),
        Command::Version(args) => version::run(args, format),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_spec_splits_on_first_equals() {
        assert_eq!(
            parse_send("note=a=b").unwrap(),
            ("note".to_string(), "a=b".to_string())
        );
        assert_eq!(
            parse_send("ping").unwrap(),
            ("ping".to_string(), String::new())
        );
        assert!(parse_send("=x").is_err());
    }
}
