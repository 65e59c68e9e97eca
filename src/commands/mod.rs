pub mod command;
pub mod echo;
pub mod executable;
pub mod ping;

use bytes::Bytes;
use std::vec;
use thiserror::Error as ThisError;

use crate::commands::executable::Executable;
use crate::frame::Frame;
use crate::reply::{InvalidText, Reply};

use command::Command as Command_;
use echo::Echo;
use ping::Ping;

#[derive(Debug, PartialEq)]
pub enum Command {
    Command(Command_),
    Echo(Echo),
    Ping(Ping),
}

impl Executable for Command {
    fn exec(self) -> Result<Reply, Error> {
        match self {
            Command::Command(cmd) => cmd.exec(),
            Command::Echo(cmd) => cmd.exec(),
            Command::Ping(cmd) => cmd.exec(),
        }
    }
}

impl TryFrom<Frame> for Command {
    type Error = Error;

    fn try_from(frame: Frame) -> Result<Self, Self::Error> {
        let parser = &mut CommandParser {
            parts: frame.into_args().into_iter(),
        };

        let command_name = parser.parse_command_name()?;

        // Only the name is case-insensitive, arguments are used as sent.
        match &command_name[..] {
            "command" => Command_::try_from(parser).map(Command::Command),
            "echo" => Echo::try_from(parser).map(Command::Echo),
            "ping" => Ping::try_from(parser).map(Command::Ping),
            _ => Err(Error::UnknownCommand {
                command: command_name,
            }),
        }
    }
}

/// Looks up the command named by the first argument of `frame` and runs it.
///
/// Every failure is returned as a value, `Error::reply` turns it into the error reply to send.
pub fn dispatch(frame: Frame) -> Result<Reply, Error> {
    Command::try_from(frame)?.exec()
}

pub struct CommandParser {
    parts: vec::IntoIter<Bytes>,
}

impl CommandParser {
    fn parse_command_name(&mut self) -> Result<String, Error> {
        let command_name = self.parts.next().ok_or(Error::EmptyCommand)?;

        Ok(String::from_utf8_lossy(&command_name).to_lowercase())
    }

    fn remaining(&mut self) -> Vec<Bytes> {
        self.parts.by_ref().collect()
    }
}

#[derive(Debug, ThisError, PartialEq)]
pub enum Error {
    #[error("empty command")]
    EmptyCommand,
    #[error("unknown command '{command}'")]
    UnknownCommand { command: String },
    #[error("invalid reply; {0}")]
    InvalidReply(#[from] InvalidText),
}

impl Error {
    pub fn reply(&self) -> Reply {
        Reply::error(format!("ERR {}", self))
    }
}
