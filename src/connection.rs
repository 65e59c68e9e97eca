use std::io;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use thiserror::Error as ThisError;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use uuid::Uuid;

use crate::codec::{self, FrameCodec};
use crate::frame::{self, Frame};
use crate::reply::Reply;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("read command: {0}")]
    Read(#[source] io::Error),
    #[error("parse command (pos {offset}): {source}")]
    Parse {
        offset: usize,
        #[source]
        source: frame::Error,
    },
    #[error("read command: frame size {size} exceeds limit {limit}")]
    FrameTooLarge { size: usize, limit: usize },
    #[error("write response: {0}")]
    Write(#[source] io::Error),
    #[error("read command: no request within {0:?}")]
    IdleTimeout(Duration),
}

impl Error {
    /// The error reply owed to the client before the connection is dropped, if any.
    pub fn reply(&self) -> Option<Reply> {
        match self {
            Error::Parse { .. } | Error::FrameTooLarge { .. } => {
                Some(Reply::error(format!("ERR Protocol error: {}", self)))
            }
            _ => None,
        }
    }
}

impl From<codec::Error> for Error {
    fn from(err: codec::Error) -> Self {
        match err {
            codec::Error::Frame(source) => Error::Parse {
                offset: source.offset(),
                source,
            },
            codec::Error::FrameTooLarge { size, limit } => Error::FrameTooLarge { size, limit },
            codec::Error::Io(err) => Error::Read(err),
        }
    }
}

pub struct Connection {
    pub id: Uuid,
    // Data is read from the socket into the codec's read buffer. When a frame is parsed, the
    // corresponding data is removed from the buffer.
    framed: Framed<TcpStream, FrameCodec>,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Connection {
        Connection::with_codec(stream, FrameCodec::default())
    }

    pub fn with_codec(stream: TcpStream, codec: FrameCodec) -> Connection {
        Connection {
            id: Uuid::new_v4(),
            framed: Framed::new(stream, codec),
        }
    }

    /// Reads the next request. `None` means the client closed the connection between requests.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>, Error> {
        match self.framed.next().await {
            Some(Ok(frame)) => Ok(Some(frame)),
            Some(Err(err)) => Err(err.into()),
            None => Ok(None),
        }
    }

    /// Same as `read_frame`, giving up after `timeout` when one is set.
    pub async fn read_frame_within(
        &mut self,
        timeout: Option<Duration>,
    ) -> Result<Option<Frame>, Error> {
        match timeout {
            Some(duration) => tokio::time::timeout(duration, self.read_frame())
                .await
                .map_err(|_| Error::IdleTimeout(duration))?,
            None => self.read_frame().await,
        }
    }

    /// Encodes `reply` and flushes it to the socket.
    pub async fn write_reply(&mut self, reply: Reply) -> Result<(), Error> {
        self.framed.send(reply).await.map_err(|err| match err {
            codec::Error::Io(err) => Error::Write(err),
            err => Error::Write(io::Error::new(io::ErrorKind::Other, err)),
        })
    }
}
