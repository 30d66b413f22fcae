use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Instant;

use bytes::BytesMut;
use mirrorlink_wire::{decode_frame, Frame};
use tracing::{debug, error, info};

use crate::config::{FatalPolicy, TransportConfig, FATAL_EXIT_CODE};
use crate::error::{Result, TransportError};
use crate::outbound::Outbound;
use crate::socket;
use crate::state::{ConnectionState, StopHandle};

/// Receives every decoded inbound frame.
///
/// Anything pushed onto `outbound` is flushed later in the same pass.
pub trait FrameSink {
    fn on_frame(&mut self, frame: Frame, outbound: &mut Outbound);
}

impl<F> FrameSink for F
where
    F: FnMut(Frame, &mut Outbound),
{
    fn on_frame(&mut self, frame: Frame, outbound: &mut Outbound) {
        self(frame, outbound)
    }
}

/// A single outbound command connection driven by the host loop.
#[derive(Debug)]
pub struct Transport {
    config: TransportConfig,
    stream: Option<TcpStream>,
    peer: Option<SocketAddr>,
    state: ConnectionState,
    connect_started: Option<Instant>,
    inbound: BytesMut,
    outbound: Outbound,
    read_buf: Vec<u8>,
    stop: StopHandle,
    running: bool,
}

impl Default for Transport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport {
    /// Create a transport with default configuration.
    pub fn new() -> Self {
        Self::with_config(TransportConfig::default())
    }

    pub fn with_config(config: TransportConfig) -> Self {
        let read_buf = vec![0u8; config.read_chunk_size.max(1)];
        Self {
            config,
            stream: None,
            peer: None,
            state: ConnectionState::Disconnected,
            connect_started: None,
            inbound: BytesMut::new(),
            outbound: Outbound::new(),
            read_buf,
            stop: StopHandle::new(),
            running: true,
        }
    }

    /// Resolve `host:port` and start a non-blocking connect.
    ///
    /// Completion is observed by later calls to [`step`](Self::step). Each
    /// resolved address is tried in order until one accepts the attempt.
    pub fn connect(&mut self, host: &str, port: u16) -> Result<()> {
        if self.state.is_open() {
            return Err(TransportError::AlreadyConnected(self.state.as_str()));
        }

        let addrs: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|source| TransportError::Resolve {
                host: host.to_string(),
                port,
                source,
            })?
            .collect();
        if addrs.is_empty() {
            return Err(TransportError::Resolve {
                host: host.to_string(),
                port,
                source: io::Error::new(io::ErrorKind::NotFound, "no addresses found"),
            });
        }

        let mut last_err = None;
        for addr in addrs {
            match socket::start_connect(addr) {
                Ok((stream, connected)) => {
                    self.stream = Some(stream);
                    self.peer = Some(addr);
                    self.inbound.clear();
                    self.outbound.clear();
                    self.state = if connected {
                        ConnectionState::Connected
                    } else {
                        ConnectionState::Connecting
                    };
                    self.connect_started = Some(Instant::now());
                    info!(peer = %addr, state = %self.state, "command connection started");
                    return Ok(());
                }
                Err(source) => {
                    debug!(peer = %addr, error = %source, "connect attempt failed");
                    last_err = Some(TransportError::Connect { addr, source });
                }
            }
        }

        Err(last_err.unwrap_or(TransportError::NotConnected))
    }

    /// Run one non-blocking pass over the connection.
    ///
    /// Completes a pending connect, then reads until the socket would block,
    /// handing complete frames to `sink` after every chunk, and writes queued
    /// bytes until the socket would block. Returns `true` when more work is pending: the
    /// connect is still in progress, data was read, or outbound bytes remain.
    ///
    /// Fatal connection errors follow the configured [`FatalPolicy`].
    pub fn step<S>(&mut self, sink: &mut S) -> Result<bool>
    where
        S: FrameSink + ?Sized,
    {
        if self.stop.is_requested() {
            if self.running {
                info!("stop requested, leaving command loop");
                self.running = false;
            }
            return Ok(false);
        }
        if !self.state.is_open() {
            return Ok(false);
        }

        match self.pass(sink) {
            Ok(pending) => Ok(pending),
            Err(err) => self.fail(err),
        }
    }

    /// Buffer for frames to send. Available once a connect has been initiated.
    pub fn outbound_mut(&mut self) -> Result<&mut Outbound> {
        if self.state.is_open() {
            Ok(&mut self.outbound)
        } else {
            Err(TransportError::NotConnected)
        }
    }

    /// Request a cooperative stop, observed at the next `step()`.
    pub fn stop(&self) {
        self.stop.request();
    }

    /// A handle that can request the stop from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// False once a requested stop has been observed by `step()`.
    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Close the connection locally, discarding unsent bytes.
    pub fn close(&mut self) {
        if self.state.is_open() {
            info!(peer = ?self.peer, "closing command connection");
            self.teardown(ConnectionState::Closed);
        }
    }

    fn pass<S>(&mut self, sink: &mut S) -> Result<bool>
    where
        S: FrameSink + ?Sized,
    {
        if self.state == ConnectionState::Connecting {
            let stream = self.stream.as_ref().ok_or(TransportError::NotConnected)?;
            match socket::poll_connect(stream) {
                Ok(true) => {
                    self.state = ConnectionState::Connected;
                    info!(peer = ?self.peer, "command connection established");
                }
                Ok(false) => {
                    let waited = self.connect_started.map(|t| t.elapsed()).unwrap_or_default();
                    if waited >= self.config.connect_timeout {
                        return Err(TransportError::ConnectionLost(io::Error::new(
                            io::ErrorKind::TimedOut,
                            format!("connect did not complete within {waited:?}"),
                        )));
                    }
                    return Ok(true);
                }
                Err(err) => return Err(TransportError::ConnectionLost(err)),
            }
        }

        self.flush()?;

        let mut read_any = false;
        while self.read_chunk()? {
            read_any = true;
            // Limits are checked as soon as a header is buffered, so an
            // oversized announcement fails before its payload is read.
            self.dispatch(sink)?;
        }

        self.flush()?;
        Ok(read_any || !self.outbound.is_empty())
    }

    /// Read at most one chunk. Returns false once the socket would block.
    fn read_chunk(&mut self) -> Result<bool> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(false);
        };

        loop {
            match stream.read(&mut self.read_buf) {
                Ok(0) => {
                    return Err(TransportError::ConnectionLost(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "peer closed the connection",
                    )))
                }
                Ok(n) => {
                    self.inbound.extend_from_slice(&self.read_buf[..n]);
                    return Ok(true);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(false),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(TransportError::ConnectionLost(e)),
            }
        }
    }

    /// Hand every complete buffered frame to `sink`.
    fn dispatch<S>(&mut self, sink: &mut S) -> Result<()>
    where
        S: FrameSink + ?Sized,
    {
        while let Some(frame) = decode_frame(&mut self.inbound, &self.config.wire)? {
            debug!(
                kind = ?frame.kind,
                id = frame.id,
                command = %frame.command_str(),
                content_len = frame.content.len(),
                "frame received"
            );
            sink.on_frame(frame, &mut self.outbound);
        }
        Ok(())
    }

    /// Write queued bytes until the socket would block.
    fn flush(&mut self) -> Result<()> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(());
        };

        while !self.outbound.is_empty() {
            match stream.write(self.outbound.as_bytes()) {
                Ok(0) => {
                    return Err(TransportError::ConnectionLost(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "peer stopped accepting data",
                    )))
                }
                Ok(n) => self.outbound.consume(n),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(TransportError::ConnectionLost(e)),
            }
        }
        Ok(())
    }

    fn fail(&mut self, err: TransportError) -> Result<bool> {
        error!(peer = ?self.peer, error = %err, "command connection failed");
        self.teardown(ConnectionState::Failed);
        match self.config.fatal_policy {
            FatalPolicy::ExitProcess => std::process::exit(FATAL_EXIT_CODE),
            FatalPolicy::Propagate => Err(err),
        }
    }

    fn teardown(&mut self, state: ConnectionState) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        self.inbound.clear();
        self.outbound.clear();
        self.connect_started = None;
        self.state = state;
    }
}
