//! Interactive stdin console for `mirrorlink run --console`.
//!
//! A background thread reads lines from stdin and queues them; the event
//! loop drains the queue between passes, so commands always execute on the
//! thread that owns the command channel.

use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

const WAIT_INTERVAL: Duration = Duration::from_millis(100);
const READ_CHUNK: usize = 8 * 1024;

pub struct ConsoleReader {
    running: Arc<AtomicBool>,
    lines: Arc<Mutex<Vec<String>>>,
    handle: Option<JoinHandle<()>>,
}

impl ConsoleReader {
    pub fn start() -> io::Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let lines = Arc::new(Mutex::new(Vec::new()));

        let handle = thread::Builder::new().name("console".into()).spawn({
            let running = running.clone();
            let lines = lines.clone();
            move || read_loop(&running, &lines)
        })?;

        Ok(Self {
            running,
            lines,
            handle: Some(handle),
        })
    }

    /// Take every line queued since the last call.
    pub fn drain(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(mut queued) => std::mem::take(&mut *queued),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    /// Ask the reader thread to finish and wait for it. The thread notices
    /// within one wait interval.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("console thread panicked");
            }
        }
    }
}

impl Drop for ConsoleReader {
    fn drop(&mut self) {
        self.stop();
    }
}

fn read_loop(running: &AtomicBool, lines: &Mutex<Vec<String>>) {
    let stdin = io::stdin();
    // At least the size of stdin's internal buffer, so reads bypass it and
    // readiness reported by the wait always matches what read() returns.
    let mut chunk = vec![0u8; READ_CHUNK];
    let mut partial = Vec::new();

    while running.load(Ordering::SeqCst) {
        match wait_readable(WAIT_INTERVAL) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(err) => {
                warn!(error = %err, "console wait failed");
                break;
            }
        }

        match stdin.lock().read(&mut chunk) {
            Ok(0) => {
                debug!("console input closed");
                break;
            }
            Ok(n) => {
                partial.extend_from_slice(&chunk[..n]);
                let complete = take_complete_lines(&mut partial);
                if complete.is_empty() {
                    continue;
                }
                match lines.lock() {
                    Ok(mut queued) => queued.extend(complete),
                    Err(poisoned) => poisoned.into_inner().extend(complete),
                }
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => {
                warn!(error = %err, "console read failed");
                break;
            }
        }
    }
}

/// Remove every newline-terminated line from `partial`, leaving any trailing
/// unterminated text in place. Blank lines are dropped.
fn take_complete_lines(partial: &mut Vec<u8>) -> Vec<String> {
    let Some(end) = partial.iter().rposition(|b| *b == b'\n') else {
        return Vec::new();
    };
    let complete: Vec<u8> = partial.drain(..=end).collect();
    String::from_utf8_lossy(&complete)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(unix)]
fn wait_readable(timeout: Duration) -> io::Result<bool> {
    let mut fd = libc::pollfd {
        fd: libc::STDIN_FILENO,
        events: libc::POLLIN,
        revents: 0,
    };
    let millis = libc::c_int::try_from(timeout.as_millis()).unwrap_or(libc::c_int::MAX);

    // SAFETY: `fd` is a valid pollfd for the duration of the call and the
    // count passed matches the single entry.
    let rc = unsafe { libc::poll(&mut fd, 1, millis) };
    if rc < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(false);
        }
        return Err(err);
    }
    // POLLHUP without POLLIN still means read() will return EOF.
    Ok(rc > 0 && fd.revents & (libc::POLLIN | libc::POLLHUP) != 0)
}

#[cfg(windows)]
fn wait_readable(timeout: Duration) -> io::Result<bool> {
    use windows_sys::Win32::Foundation::{INVALID_HANDLE_VALUE, WAIT_FAILED, WAIT_OBJECT_0};
    use windows_sys::Win32::System::Console::{GetStdHandle, STD_INPUT_HANDLE};
    use windows_sys::Win32::System::Threading::WaitForSingleObject;

    let millis = u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX);

    // SAFETY: GetStdHandle has no preconditions; the returned handle is
    // owned by the process and must not be closed here.
    let handle = unsafe { GetStdHandle(STD_INPUT_HANDLE) };
    if handle.is_null() || handle == INVALID_HANDLE_VALUE {
        return Err(io::Error::last_os_error());
    }

    // SAFETY: `handle` is the process stdin handle checked above.
    match unsafe { WaitForSingleObject(handle, millis) } {
        WAIT_OBJECT_0 => Ok(true),
        WAIT_FAILED => Err(io::Error::last_os_error()),
        _ => Ok(false),
    }
}

#[cfg(not(any(unix, windows)))]
fn wait_readable(_timeout: Duration) -> io::Result<bool> {
    Ok(true)
}

/// A parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Issue a request to the controller.
    Send { command: String, content: String },
    /// Toggle frame publishing.
    Frames(bool),
    /// Stop the event loop.
    Quit,
    Help,
}

type ArgParser = fn(&str) -> Result<ConsoleCommand, String>;

/// Console verbs, their usage text and their argument parsers.
pub const CONSOLE_COMMANDS: &[(&str, &str, ArgParser)] = &[
    ("send", "send <command> [content]", parse_send),
    ("frames", "frames on|off", parse_frames),
    ("quit", "quit", parse_quit),
    ("help", "help", parse_help),
];

/// Parse `<verb> [rest]`.
pub fn parse_line(line: &str) -> Result<ConsoleCommand, String> {
    let line = line.trim();
    let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));

    CONSOLE_COMMANDS
        .iter()
        .find(|(name, _, _)| *name == verb)
        .ok_or_else(|| format!("unknown console command `{verb}` (try `help`)"))
        .and_then(|(_, _, parse)| parse(rest.trim()))
}

pub fn usage() -> String {
    CONSOLE_COMMANDS
        .iter()
        .map(|(_, usage, _)| format!("  {usage}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn parse_send(rest: &str) -> Result<ConsoleCommand, String> {
    let (command, content) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    if command.is_empty() {
        return Err("usage: send <command> [content]".to_string());
    }
    Ok(ConsoleCommand::Send {
        command: command.to_string(),
        content: content.trim_start().to_string(),
    })
}

fn parse_quit(_: &str) -> Result<ConsoleCommand, String> {
    Ok(ConsoleCommand::Quit)
}

fn parse_help(_: &str) -> Result<ConsoleCommand, String> {
    Ok(ConsoleCommand::Help)
}

fn parse_frames(rest: &str) -> Result<ConsoleCommand, String> {
    match rest {
        "on" => Ok(ConsoleCommand::Frames(true)),
        "off" => Ok(ConsoleCommand::Frames(false)),
        _ => Err("usage: frames on|off".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_keeps_content_spacing() {
        assert_eq!(
            parse_line("send note  hello  world").unwrap(),
            ConsoleCommand::Send {
                command: "note".to_string(),
                content: "hello  world".to_string(),
            }
        );
        assert_eq!(
            parse_line("send ping").unwrap(),
            ConsoleCommand::Send {
                command: "ping".to_string(),
                content: String::new(),
            }
        );
    }

    #[test]
    fn frames_requires_on_or_off() {
        assert_eq!(parse_line("frames on").unwrap(), ConsoleCommand::Frames(true));
        assert_eq!(parse_line(" frames off ").unwrap(), ConsoleCommand::Frames(false));
        assert!(parse_line("frames maybe").is_err());
    }

    #[test]
    fn unknown_verbs_are_rejected() {
        let err = parse_line("reboot now").unwrap_err();
        assert!(err.contains("reboot"));
        assert!(parse_line("send").is_err());
        assert_eq!(parse_line("quit").unwrap(), ConsoleCommand::Quit);
    }

    #[test]
    fn only_terminated_lines_are_taken() {
        let mut partial = b"send ping\r\n\nframes on\nqu".to_vec();
        assert_eq!(
            take_complete_lines(&mut partial),
            vec!["send ping".to_string(), "frames on".to_string()]
        );
        assert_eq!(partial, b"qu");

        partial.extend_from_slice(b"it\n");
        assert_eq!(take_complete_lines(&mut partial), vec!["quit".to_string()]);
        assert!(partial.is_empty());
        assert!(take_complete_lines(&mut partial).is_empty());
    }

    #[test]
    fn usage_lists_every_verb() {
        let text = usage();
        for (name, _, _) in CONSOLE_COMMANDS {
            assert!(text.contains(name));
        }
    }
}
