use std::collections::VecDeque;

use mirrorlink_transport::Outbound;
use tracing::debug;

use crate::error::Result;

/// Upper bound on remembered outstanding requests. The oldest entry is
/// forgotten once the table is full.
pub const MAX_OUTSTANDING_REQUESTS: usize = 256;

/// Allocates request ids and remembers which command each id was issued for.
///
/// Ids come from a wrapping 16-bit counter: the first id is 1 and 65535 is
/// followed by 0. Ids still outstanding are not skipped on wrap.
#[derive(Debug, Default)]
pub struct RequestIssuer {
    last_id: u16,
    outstanding: VecDeque<(u16, String)>,
}

impl RequestIssuer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next id.
    pub fn next_id(&mut self) -> u16 {
        self.last_id = self.last_id.wrapping_add(1);
        self.last_id
    }

    /// Encode a request onto `outbound` under a fresh id and record it as
    /// outstanding.
    pub fn issue(&mut self, outbound: &mut Outbound, command: &str, content: &[u8]) -> Result<u16> {
        let id = self.next_id();
        outbound.push_request(id, command.as_bytes(), content)?;

        if self.outstanding.len() == MAX_OUTSTANDING_REQUESTS {
            self.outstanding.pop_front();
        }
        self.outstanding.push_back((id, command.to_string()));

        debug!(id, command, content_len = content.len(), "request queued");
        Ok(id)
    }

    /// Forget the oldest outstanding request with `id`, returning its command.
    pub fn take_outstanding(&mut self, id: u16) -> Option<String> {
        let index = self.outstanding.iter().position(|(pending, _)| *pending == id)?;
        self.outstanding.remove(index).map(|(_, command)| command)
    }

    pub fn outstanding_len(&self) -> usize {
        self.outstanding.len()
    }

    #[cfg(test)]
    pub(crate) fn set_last_id(&mut self, id: u16) {
        self.last_id = id;
    }
}
