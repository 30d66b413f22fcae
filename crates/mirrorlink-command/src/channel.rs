use mirrorlink_transport::{ConnectionState, StopHandle, Transport, TransportConfig};
use mirrorlink_wire::{commands, Frame};
use tracing::info;

use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::handler::CommandContext;

/// A command connection: one [`Transport`] plus the [`Dispatcher`] that
/// services it.
#[derive(Debug)]
pub struct CommandChannel {
    transport: Transport,
    dispatcher: Dispatcher,
}

impl Default for CommandChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandChannel {
    /// Default transport configuration with the built-in commands installed.
    pub fn new() -> Self {
        Self::with_config(TransportConfig::default())
    }

    pub fn with_config(config: TransportConfig) -> Self {
        Self::from_parts(Transport::with_config(config), Dispatcher::with_builtins())
    }

    pub fn from_parts(transport: Transport, dispatcher: Dispatcher) -> Self {
        Self {
            transport,
            dispatcher,
        }
    }

    /// Start connecting to the controller.
    pub fn connect(&mut self, host: &str, port: u16) -> Result<()> {
        self.transport.connect(host, port)?;
        Ok(())
    }

    /// One non-blocking pass of the transport, dispatching inbound frames.
    ///
    /// Returns whether more work is pending.
    pub fn step(&mut self) -> Result<bool> {
        Ok(self.transport.step(&mut self.dispatcher)?)
    }

    /// Register a command that is answered with a reply frame.
    pub fn register_command<F>(&mut self, name: &str, handler: F) -> Result<()>
    where
        F: FnMut(&mut CommandContext<'_>) + 'static,
    {
        self.dispatcher.register(name, handler, true)
    }

    /// Register a command whose result is never sent back.
    pub fn register_notification<F>(&mut self, name: &str, handler: F) -> Result<()>
    where
        F: FnMut(&mut CommandContext<'_>) + 'static,
    {
        self.dispatcher.register(name, handler, false)
    }

    /// Queue a request to the controller. Returns the id it was sent under.
    pub fn send_request(&mut self, command: &str, content: &[u8]) -> Result<u16> {
        let outbound = self.transport.outbound_mut()?;
        self.dispatcher.send_request(outbound, command, content)
    }

    /// Announce that this process is ready to work.
    pub fn send_start_work_notify(&mut self) -> Result<u16> {
        let id = self.send_request(commands::START_WORK_NOTIFY, b"")?;
        info!(id, "start_work_notify queued");
        Ok(id)
    }

    /// Install the callback that receives responses to our requests.
    pub fn set_response_observer<F>(&mut self, observer: F)
    where
        F: FnMut(&Frame, Option<&str>) + 'static,
    {
        self.dispatcher.set_response_observer(observer);
    }

    pub fn stop(&self) {
        self.transport.stop();
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.transport.stop_handle()
    }

    pub fn is_running(&self) -> bool {
        self.transport.is_running()
    }

    pub fn state(&self) -> ConnectionState {
        self.transport.state()
    }

    pub fn close(&mut self) {
        self.transport.close();
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher {
        &mut self.dispatcher
    }
}
