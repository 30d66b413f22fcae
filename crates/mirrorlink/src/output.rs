use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use mirrorlink_shm::{BackingIdentity, FrameHeader, PixelFormat};
use mirrorlink_wire::commands::command_label;
use mirrorlink_wire::{Frame, MessageType};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

const PREVIEW_LIMIT: usize = 96;

#[derive(Serialize)]
struct FrameOutput<'a> {
    kind: &'static str,
    id: u16,
    flag: u8,
    command: &'a str,
    label: &'static str,
    content_size: usize,
    content: String,
    timestamp: String,
}

/// Print one frame seen on the command channel.
pub fn print_frame(frame: &Frame, format: OutputFormat) {
    let command = frame.command_str();
    let kind = kind_name(frame.kind);
    let label = command_label(&command);

    match format {
        OutputFormat::Json => {
            let out = FrameOutput {
                kind,
                id: frame.id,
                flag: frame.flag,
                command: &command,
                label,
                content_size: frame.content.len(),
                content: content_preview(frame.content.as_ref()),
                timestamp: now_unix_seconds(),
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["KIND", "ID", "FLAG", "COMMAND", "SIZE", "CONTENT"])
                .add_row(vec![
                    kind.to_string(),
                    frame.id.to_string(),
                    frame.flag.to_string(),
                    format!("{command} ({label})"),
                    frame.content.len().to_string(),
                    content_preview(frame.content.as_ref()),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "{kind} id={} flag={} command={command} ({label}) size={} content={}",
                frame.id,
                frame.flag,
                frame.content.len(),
                content_preview(frame.content.as_ref())
            );
        }
        OutputFormat::Raw => print_raw(frame.content.as_ref()),
    }
}

#[derive(Serialize)]
struct HeaderOutput<'a> {
    backing: String,
    width: u32,
    height: u32,
    format: u32,
    format_name: &'a str,
    frame_size: u32,
    sequence: u32,
    timestamp: u64,
}

/// Print the header of the frame currently held by a shared frame channel.
///
/// `payload` is only written in raw mode.
pub fn print_frame_header(
    header: &FrameHeader,
    identity: &BackingIdentity,
    payload: &[u8],
    format: OutputFormat,
) {
    let format_name = header
        .pixel_format()
        .map(PixelFormat::as_str)
        .unwrap_or("unknown");

    match format {
        OutputFormat::Json => {
            let out = HeaderOutput {
                backing: identity.to_string(),
                width: header.width,
                height: header.height,
                format: header.format,
                format_name,
                frame_size: header.frame_size,
                sequence: header.sequence,
                timestamp: header.timestamp,
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SEQUENCE", "SIZE", "FORMAT", "BYTES", "TIMESTAMP"])
                .add_row(vec![
                    header.sequence.to_string(),
                    format!("{}x{}", header.width, header.height),
                    format_name.to_string(),
                    header.frame_size.to_string(),
                    header.timestamp.to_string(),
                ]);
            println!("{identity}");
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "{identity}: sequence={} {}x{} {format_name} bytes={} timestamp={}",
                header.sequence, header.width, header.height, header.frame_size, header.timestamp
            );
        }
        OutputFormat::Raw => print_raw(payload),
    }
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub status: &'static str,
    pub frames_published: u64,
    pub last_sequence: u32,
    pub requests_outstanding: usize,
}

pub fn print_run_summary(summary: &RunSummary, format: OutputFormat) {
    match format {
        OutputFormat::Json | OutputFormat::Raw => print_json(summary),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_header(vec!["STATUS", "FRAMES", "SEQUENCE", "OUTSTANDING"])
                .add_row(vec![
                    summary.status.to_string(),
                    summary.frames_published.to_string(),
                    summary.last_sequence.to_string(),
                    summary.requests_outstanding.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "{}: frames={} sequence={} outstanding={}",
                summary.status,
                summary.frames_published,
                summary.last_sequence,
                summary.requests_outstanding
            );
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn kind_name(kind: MessageType) -> &'static str {
    match kind {
        MessageType::Request => "request",
        MessageType::Response => "response",
    }
}

fn content_preview(content: &[u8]) -> String {
    match std::str::from_utf8(content) {
        Ok(text) if text.len() <= PREVIEW_LIMIT => text.to_string(),
        Ok(text) => {
            let mut end = PREVIEW_LIMIT;
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... ({} bytes)", &text[..end], content.len())
        }
        Err(_) => format!("<binary {} bytes>", content.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
