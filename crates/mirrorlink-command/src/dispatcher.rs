use std::collections::HashMap;

use bytes::Bytes;
use mirrorlink_transport::{FrameSink, Outbound};
use mirrorlink_wire::{commands, Frame, MessageType};
use tracing::{debug, warn};

use crate::error::Result;
use crate::handler::{CommandContext, CommandHandler, PendingResult};
use crate::issuer::RequestIssuer;
use crate::registry::CommandRegistry;

/// Callback for responses the peer sends to our requests. Receives the frame
/// and the command the request was issued for, if it is still known.
pub type ResponseObserver = Box<dyn FnMut(&Frame, Option<&str>)>;

/// Routes inbound frames: requests to registered handlers, responses to the
/// outstanding-request table.
#[derive(Default)]
pub struct Dispatcher {
    registry: CommandRegistry,
    pending: HashMap<u16, PendingResult>,
    issuer: RequestIssuer,
    observer: Option<ResponseObserver>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("issuer", &self.issuer)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl Dispatcher {
    /// An empty dispatcher with no commands registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// A dispatcher with the built-in `ping` command installed.
    pub fn with_builtins() -> Self {
        let mut dispatcher = Self::new();
        // Registering into an empty registry cannot collide.
        let _ = dispatcher.register(
            commands::PING,
            |ctx: &mut CommandContext<'_>| ctx.succeed(commands::PONG),
            true,
        );
        dispatcher
    }

    /// Register a closure handler.
    ///
    /// When `needs_response` is false the handler still runs but no reply
    /// frame is sent.
    pub fn register<F>(&mut self, name: &str, handler: F, needs_response: bool) -> Result<()>
    where
        F: FnMut(&mut CommandContext<'_>) + 'static,
    {
        self.registry.register(name, Box::new(handler), needs_response)
    }

    /// Register a [`CommandHandler`] implementation.
    pub fn register_handler<H>(&mut self, name: &str, handler: H, needs_response: bool) -> Result<()>
    where
        H: CommandHandler + 'static,
    {
        self.registry.register(name, Box::new(handler), needs_response)
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// Install the callback that receives responses from the peer.
    pub fn set_response_observer<F>(&mut self, observer: F)
    where
        F: FnMut(&Frame, Option<&str>) + 'static,
    {
        self.observer = Some(Box::new(observer));
    }

    /// Queue a request to the peer under a fresh id.
    pub fn send_request(
        &mut self,
        outbound: &mut Outbound,
        command: &str,
        content: &[u8],
    ) -> Result<u16> {
        self.issuer.issue(outbound, command, content)
    }

    pub fn issuer(&self) -> &RequestIssuer {
        &self.issuer
    }

    /// Run the handler for one inbound request and queue its reply.
    ///
    /// The pending result starts as success with an empty message for a
    /// registered command, or failure with `"unknown"` otherwise, and the
    /// handler may overwrite it.
    pub fn dispatch(&mut self, id: u16, command: Bytes, content: &[u8], outbound: &mut Outbound) {
        let Self {
            registry,
            pending,
            issuer,
            ..
        } = self;

        let name = String::from_utf8_lossy(&command).into_owned();
        let found = registry.lookup(&name);

        let initial = if found.is_some() {
            PendingResult::success(id, command)
        } else {
            warn!(id, command = %name, "unknown command");
            PendingResult::unknown(id, command)
        };
        let result = pending
            .entry(id)
            .and_modify(|slot| *slot = initial.clone())
            .or_insert(initial);

        let needs_response = match found {
            Some((handler, needs_response)) => {
                let mut ctx = CommandContext {
                    id,
                    command: &name,
                    content,
                    result,
                    issuer: &mut *issuer,
                    outbound: &mut *outbound,
                };
                handler.handle(&mut ctx);
                needs_response
            }
            None => true,
        };

        let Some(result) = pending.remove(&id) else {
            return;
        };
        if !needs_response {
            debug!(id, command = %name, "result discarded for notification command");
            return;
        }

        debug!(
            id,
            command = %name,
            success = result.success,
            "sending command result"
        );
        if let Err(err) =
            outbound.push_response(result.id, result.success, &result.command, &result.message)
        {
            warn!(id, command = %name, error = %err, "failed to queue command result");
        }
    }

    fn on_response(&mut self, frame: &Frame) {
        let command = self.issuer.take_outstanding(frame.id);
        match command.as_deref() {
            Some(name) => debug!(
                id = frame.id,
                command = name,
                success = frame.is_success(),
                "response received"
            ),
            None => warn!(id = frame.id, "response for unknown request"),
        }

        if let Some(observer) = self.observer.as_mut() {
            observer(frame, command.as_deref());
        }
    }
}

impl FrameSink for Dispatcher {
    fn on_frame(&mut self, frame: Frame, outbound: &mut Outbound) {
        match frame.kind {
            MessageType::Request => {
                let Frame {
                    id,
                    command,
                    content,
                    ..
                } = frame;
                self.dispatch(id, command, &content, outbound);
            }
            MessageType::Response => self.on_response(&frame),
        }
    }
}
