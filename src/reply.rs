use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error as ThisError;

static CRLF: &[u8; 2] = b"\r\n";

const SIMPLE_STRING: u8 = b'+';
const SIMPLE_ERROR: u8 = b'-';

#[derive(Debug, ThisError, Clone, PartialEq, Eq)]
#[error("simple string contains a line break at byte {offset}")]
pub struct InvalidText {
    pub offset: usize,
}

/// Text that can be framed as a simple string, that is, text without `\r` or `\n`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimpleString(Bytes);

impl SimpleString {
    pub fn new(text: impl Into<Bytes>) -> Result<SimpleString, InvalidText> {
        let text = text.into();

        match text.iter().position(|b| *b == b'\r' || *b == b'\n') {
            Some(offset) => Err(InvalidText { offset }),
            None => Ok(SimpleString(text)),
        }
    }

    /// Replaces every `\r` and `\n` with a space.
    pub fn escaped(text: impl AsRef<[u8]>) -> SimpleString {
        let text = text
            .as_ref()
            .iter()
            .map(|b| match b {
                b'\r' | b'\n' => b' ',
                b => *b,
            })
            .collect::<Vec<u8>>();

        SimpleString(Bytes::from(text))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    Simple(SimpleString),
    Error(SimpleString),
}

impl Reply {
    pub fn simple(text: impl Into<Bytes>) -> Result<Reply, InvalidText> {
        SimpleString::new(text).map(Reply::Simple)
    }

    pub fn error(text: impl AsRef<[u8]>) -> Reply {
        Reply::Error(SimpleString::escaped(text))
    }

    pub fn encode_into(&self, dst: &mut BytesMut) {
        let (data_type, text) = match self {
            Reply::Simple(s) => (SIMPLE_STRING, s),
            Reply::Error(s) => (SIMPLE_ERROR, s),
        };

        dst.reserve(1 + text.as_bytes().len() + CRLF.len());
        dst.put_u8(data_type);
        dst.extend_from_slice(text.as_bytes());
        dst.extend_from_slice(CRLF);
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = BytesMut::new();
        self.encode_into(&mut bytes);
        bytes.to_vec()
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Simple(s) => write!(f, "+{}", String::from_utf8_lossy(s.as_bytes())),
            Reply::Error(s) => write!(f, "-{}", String::from_utf8_lossy(s.as_bytes())),
        }
    }
}
