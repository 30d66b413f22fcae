use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use mirrorlink_wire::{decode_frame, encode_request, encode_response, WireConfig};
use tracing::{debug, info};

use crate::cmd::{on_interrupt, ListenArgs};
use crate::exit::{io_error, wire_error, CliResult, SUCCESS};
use crate::output::{print_frame, OutputFormat};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const READ_CHUNK: usize = 8 * 1024;

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let listener = TcpListener::bind((args.bind.as_str(), args.port))
        .map_err(|err| io_error("bind failed", err))?;
    let local = listener
        .local_addr()
        .map_err(|err| io_error("bind failed", err))?;
    info!(addr = %local, "listening");

    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();
    on_interrupt(move || flag.store(false, Ordering::SeqCst))?;

    let Some(mut stream) = accept(&listener, &running)? else {
        return Ok(SUCCESS);
    };

    let mut out = BytesMut::new();
    for (index, (command, content)) in args.send.iter().enumerate() {
        let id = u16::try_from(index + 1).unwrap_or(u16::MAX);
        encode_request(id, command.as_bytes(), content.as_bytes(), &mut out)
            .map_err(|err| wire_error("encode failed", err))?;
        debug!(id, command = %command, "request queued");
    }
    if !out.is_empty() {
        stream
            .write_all(&out)
            .map_err(|err| io_error("send failed", err))?;
    }

    let config = WireConfig::default();
    let mut inbound = BytesMut::with_capacity(READ_CHUNK);
    let mut chunk = [0u8; READ_CHUNK];
    let mut printed = 0usize;

    while running.load(Ordering::SeqCst) {
        match stream.read(&mut chunk) {
            Ok(0) => {
                info!("mirroring side disconnected");
                break;
            }
            Ok(n) => inbound.extend_from_slice(&chunk[..n]),
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                ) =>
            {
                continue
            }
            Err(err) => return Err(io_error("receive failed", err)),
        }

        while let Some(frame) =
            decode_frame(&mut inbound, &config).map_err(|err| wire_error("decode failed", err))?
        {
            print_frame(&frame, format);

            if frame.is_request() {
                out.clear();
                encode_response(frame.id, !args.reject, &frame.command, b"", &mut out)
                    .map_err(|err| wire_error("encode failed", err))?;
                stream
                    .write_all(&out)
                    .map_err(|err| io_error("send failed", err))?;
            }

            printed = printed.saturating_add(1);
            if args.count.is_some_and(|count| printed >= count) {
                return Ok(SUCCESS);
            }
        }
    }

    Ok(SUCCESS)
}

/// Wait for the mirroring side, checking `running` between attempts.
fn accept(listener: &TcpListener, running: &AtomicBool) -> CliResult<Option<TcpStream>> {
    listener
        .set_nonblocking(true)
        .map_err(|err| io_error("listen failed", err))?;

    while running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer)) => {
                info!(peer = %peer, "mirroring side connected");
                stream
                    .set_nonblocking(false)
                    .and_then(|()| stream.set_read_timeout(Some(POLL_INTERVAL)))
                    .map_err(|err| io_error("accept failed", err))?;
                return Ok(Some(stream));
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(io_error("accept failed", err)),
        }
    }
    Ok(None)
}
