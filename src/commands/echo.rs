use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::{CommandParser, Error};
use crate::reply::Reply;

/// Returns the arguments joined by a single space, as a simple string.
///
/// Ref: <https://redis.io/docs/latest/commands/echo>
#[derive(Debug, PartialEq)]
pub struct Echo {
    pub messages: Vec<Bytes>,
}

impl Executable for Echo {
    fn exec(self) -> Result<Reply, Error> {
        let text = self.messages.join(&b' ');
        Ok(Reply::simple(text)?)
    }
}

impl TryFrom<&mut CommandParser> for Echo {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let messages = parser.remaining();
        Ok(Self { messages })
    }
}
