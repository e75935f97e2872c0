//! Protocol Module
//!
//! Wire codec for the line protocol: framing, command parsing and reply
//! serialization.

mod codec;
mod command;

pub use codec::{FrameDecoder, Reply};
pub use command::{parse_command, Command};
