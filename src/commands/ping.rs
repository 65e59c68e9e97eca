use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::{CommandParser, Error};
use crate::reply::Reply;

/// Returns PONG. Arguments, if any, are ignored.
///
/// Ref: <https://redis.io/docs/latest/commands/ping>
#[derive(Debug, PartialEq)]
pub struct Ping;

impl Executable for Ping {
    fn exec(self) -> Result<Reply, Error> {
        Ok(Reply::simple(Bytes::from_static(b"PONG"))?)
    }
}

impl TryFrom<&mut CommandParser> for Ping {
    type Error = Error;

    fn try_from(_parser: &mut CommandParser) -> Result<Self, Self::Error> {
        Ok(Self)
    }
}
