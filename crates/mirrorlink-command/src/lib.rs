//! Named command handling for the mirrorlink command channel.
//!
//! The [`Dispatcher`] owns the command registry, the per-id pending results
//! and the request id counter. [`CommandChannel`] pairs it with a
//! [`Transport`](mirrorlink_transport::Transport) so the host only has to
//! call `step()`.

pub mod channel;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod issuer;
pub mod registry;

pub use channel::CommandChannel;
pub use dispatcher::{Dispatcher, ResponseObserver};
pub use error::{CommandError, Result};
pub use handler::{CommandContext, CommandHandler, PendingResult};
pub use issuer::{RequestIssuer, MAX_OUTSTANDING_REQUESTS};
pub use registry::CommandRegistry;
