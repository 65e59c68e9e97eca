use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::{CommandParser, Error};
use crate::reply::Reply;

/// Replies with an empty simple string. Clients such as `redis-cli` send it on connect to fetch
/// command docs; the arguments are ignored.
///
/// Ref: <https://redis.io/docs/latest/commands/command>
#[derive(Debug, PartialEq)]
pub struct Command {}

impl Executable for Command {
    fn exec(self) -> Result<Reply, Error> {
        Ok(Reply::simple(Bytes::new())?)
    }
}

impl TryFrom<&mut CommandParser> for Command {
    type Error = Error;

    fn try_from(_parser: &mut CommandParser) -> Result<Self, Self::Error> {
        Ok(Self {})
    }
}
