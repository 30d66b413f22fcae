use std::collections::HashMap;

use mirrorlink_wire::DEFAULT_MAX_COMMAND_LEN;
use tracing::debug;

use crate::error::{CommandError, Result};
use crate::handler::CommandHandler;

struct Registration {
    handler: Box<dyn CommandHandler>,
    needs_response: bool,
}

/// Command handlers keyed by name.
///
/// The first registration of a name wins; later ones are rejected.
#[derive(Default)]
pub struct CommandRegistry {
    entries: HashMap<String, Registration>,
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.names())
            .finish()
    }
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: &str,
        handler: Box<dyn CommandHandler>,
        needs_response: bool,
    ) -> Result<()> {
        validate_name(name)?;
        if self.entries.contains_key(name) {
            return Err(CommandError::AlreadyRegistered(name.to_string()));
        }

        self.entries.insert(
            name.to_string(),
            Registration {
                handler,
                needs_response,
            },
        );
        debug!(command = name, needs_response, "command registered");
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Whether replies are sent for `name`. `None` if unregistered.
    pub fn needs_response(&self, name: &str) -> Option<bool> {
        self.entries.get(name).map(|entry| entry.needs_response)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub(crate) fn lookup(
        &mut self,
        name: &str,
    ) -> Option<(&mut (dyn CommandHandler + 'static), bool)> {
        self.entries
            .get_mut(name)
            .map(|entry| (entry.handler.as_mut(), entry.needs_response))
    }
}

fn validate_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        "name is empty"
    } else if name.len() > DEFAULT_MAX_COMMAND_LEN {
        "name exceeds the maximum command length"
    } else {
        return Ok(());
    };

    Err(CommandError::InvalidName {
        name: name.to_string(),
        reason,
    })
}
