#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! USB serial console: byte-to-line assembly and the controller-side transport.

use core::str;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use heapless::Vec;
use shutter_core::control::{CommandLine, ControlTransport, Inbound, MAX_LINE_LEN, Reply};

/// Lines waiting for the controller loop.
pub const LINE_QUEUE_DEPTH: usize = 4;
/// Replies waiting for the console writer.
pub const REPLY_QUEUE_DEPTH: usize = 4;

pub type LineQueue = Channel<CriticalSectionRawMutex, CommandLine, LINE_QUEUE_DEPTH>;
pub type ReplyQueue = Channel<CriticalSectionRawMutex, Reply, REPLY_QUEUE_DEPTH>;

pub static CONSOLE_LINES: LineQueue = Channel::new();
pub static CONSOLE_REPLIES: ReplyQueue = Channel::new();

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConsoleError {
    /// Input exceeded [`MAX_LINE_LEN`]; the rest of the line is discarded.
    LineOverflow,
    /// The assembled line was not UTF-8.
    InvalidUtf8,
}

/// Collects console bytes into command lines.
#[derive(Debug, Default)]
pub struct LineAssembler {
    buffer: Vec<u8, MAX_LINE_LEN>,
    discarding: bool,
}

impl LineAssembler {
    pub const fn new() -> Self {
        Self {
            buffer: Vec::new(),
            discarding: false,
        }
    }

    /// Feeds one byte. A CR or LF completes the pending line.
    pub fn ingest(&mut self, byte: u8) -> Result<Option<CommandLine>, ConsoleError> {
        match byte {
            b'\r' | b'\n' => {
                let discarded = core::mem::replace(&mut self.discarding, false);
                if discarded {
                    self.buffer.clear();
                    return Ok(None);
                }
                self.take_line()
            }
            0x08 | 0x7f => {
                self.buffer.pop();
                Ok(None)
            }
            _ if self.discarding => Ok(None),
            value => {
                if self.buffer.push(value).is_err() {
                    self.discarding = true;
                    self.buffer.clear();
                    return Err(ConsoleError::LineOverflow);
                }
                Ok(None)
            }
        }
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.discarding = false;
    }

    fn take_line(&mut self) -> Result<Option<CommandLine>, ConsoleError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }

        let result = str::from_utf8(&self.buffer)
            .map_err(|_| ConsoleError::InvalidUtf8)
            .and_then(|text| {
                let text = text.trim();
                if text.is_empty() {
                    return Ok(None);
                }
                CommandLine::try_from(text)
                    .map(Some)
                    .map_err(|_| ConsoleError::LineOverflow)
            });
        self.buffer.clear();
        result
    }
}

/// [`ControlTransport`] used by the controller loop; never blocks.
pub struct ConsoleTransport {
    lines: Receiver<'static, CriticalSectionRawMutex, CommandLine, LINE_QUEUE_DEPTH>,
    replies: Sender<'static, CriticalSectionRawMutex, Reply, REPLY_QUEUE_DEPTH>,
}

impl ConsoleTransport {
    pub fn new(
        lines: Receiver<'static, CriticalSectionRawMutex, CommandLine, LINE_QUEUE_DEPTH>,
        replies: Sender<'static, CriticalSectionRawMutex, Reply, REPLY_QUEUE_DEPTH>,
    ) -> Self {
        Self { lines, replies }
    }
}

impl ControlTransport for ConsoleTransport {
    fn poll(&mut self) -> Option<Inbound> {
        self.lines.try_receive().ok().map(Inbound::Line)
    }

    fn reply(&mut self, reply: Reply) {
        // A full queue means nobody is reading the console.
        let _ = self.replies.try_send(reply);
    }
}
