use mirrorlink_command::CommandChannel;
use mirrorlink_shm::FrameHeader;
use mirrorlink_wire::commands::NEW_FRAME;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Content of a `new_frame` request: frame metadata only, the pixels stay in
/// the shared frame channel.
///
/// Serialized as compact JSON with keys in declaration order, e.g.
/// `{"width":640,"height":480,"sequence":3,"timestamp":1700000000000000}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameNotice {
    pub width: u32,
    pub height: u32,
    pub sequence: u32,
    /// Microseconds since the Unix epoch.
    pub timestamp: u64,
}

impl FrameNotice {
    pub fn to_content(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_content(content: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(content)
    }
}

impl From<&FrameHeader> for FrameNotice {
    fn from(header: &FrameHeader) -> Self {
        Self {
            width: header.width,
            height: header.height,
            sequence: header.sequence,
            timestamp: header.timestamp,
        }
    }
}

/// Announces published frames to whoever consumes them.
pub trait FrameNotifier {
    fn notify_frame(&mut self, notice: &FrameNotice) -> Result<()>;
}

impl FrameNotifier for CommandChannel {
    fn notify_frame(&mut self, notice: &FrameNotice) -> Result<()> {
        let content = notice.to_content()?;
        self.send_request(NEW_FRAME, content.as_bytes())?;
        Ok(())
    }
}
