use std::borrow::Cow;

use bytes::Bytes;
use mirrorlink_transport::Outbound;

use crate::error::Result;
use crate::issuer::RequestIssuer;

/// The reply that will be sent for one inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingResult {
    pub id: u16,
    pub command: Bytes,
    pub success: bool,
    pub message: Bytes,
}

impl PendingResult {
    /// Default result for a registered command: success with empty message.
    pub fn success(id: u16, command: Bytes) -> Self {
        Self {
            id,
            command,
            success: true,
            message: Bytes::new(),
        }
    }

    /// Result for a command with no registered handler.
    pub fn unknown(id: u16, command: Bytes) -> Self {
        Self {
            id,
            command,
            success: false,
            message: Bytes::from_static(mirrorlink_wire::commands::UNKNOWN_COMMAND.as_bytes()),
        }
    }
}

/// Everything a handler can see and do while servicing one request.
pub struct CommandContext<'a> {
    pub(crate) id: u16,
    pub(crate) command: &'a str,
    pub(crate) content: &'a [u8],
    pub(crate) result: &'a mut PendingResult,
    pub(crate) issuer: &'a mut RequestIssuer,
    pub(crate) outbound: &'a mut Outbound,
}

impl CommandContext<'_> {
    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn command(&self) -> &str {
        self.command
    }

    pub fn content(&self) -> &[u8] {
        self.content
    }

    pub fn content_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.content)
    }

    /// Reply with success and `message`.
    pub fn succeed(&mut self, message: impl Into<Bytes>) {
        self.set_result(true, message);
    }

    /// Reply with failure and `message`.
    pub fn fail(&mut self, message: impl Into<Bytes>) {
        self.set_result(false, message);
    }

    pub fn set_result(&mut self, success: bool, message: impl Into<Bytes>) {
        self.result.success = success;
        self.result.message = message.into();
    }

    pub fn result(&self) -> &PendingResult {
        self.result
    }

    /// Issue a separate request to the peer. The reply to the current
    /// request is unaffected.
    pub fn send_request(&mut self, command: &str, content: &[u8]) -> Result<u16> {
        self.issuer.issue(self.outbound, command, content)
    }
}

/// A command implementation.
///
/// Handlers run synchronously inside the transport's `step()`.
pub trait CommandHandler {
    fn handle(&mut self, ctx: &mut CommandContext<'_>);
}

impl<F> CommandHandler for F
where
    F: FnMut(&mut CommandContext<'_>),
{
    fn handle(&mut self, ctx: &mut CommandContext<'_>) {
        self(ctx)
    }
}
