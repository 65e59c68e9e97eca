use std::io;

use bytes::BytesMut;
use thiserror::Error as ThisError;
use tokio_util::codec::{Decoder, Encoder};

use crate::frame::{self, Frame, PartialFrame};
use crate::reply::Reply;

pub const DEFAULT_MAX_FRAME_SIZE: usize = 512 * 1024 * 1024;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error(transparent)]
    Frame(#[from] frame::Error),
    #[error("frame size {size} exceeds limit {limit}")]
    FrameTooLarge { size: usize, limit: usize },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Splits a byte stream into request frames and writes replies back.
///
/// Bytes are accumulated until a whole frame is available, so a frame may arrive over any number
/// of reads, and one read may carry several frames. The progress through an incomplete frame is
/// kept between calls, so each read only parses what was not parsed before.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_size: usize,
    partial: PartialFrame,
}

impl FrameCodec {
    pub fn new(max_frame_size: usize) -> FrameCodec {
        FrameCodec {
            max_frame_size,
            partial: PartialFrame::default(),
        }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        FrameCodec::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let (ranges, consumed) = match self.partial.resume(&src[..]) {
            Ok(decoded) => decoded,
            Err(err) if err.is_incomplete() => {
                // Not enough data to parse an entire frame. Refuse to keep buffering past the
                // limit, a client could otherwise grow the buffer without bound.
                if src.len() > self.max_frame_size {
                    return Err(Error::FrameTooLarge {
                        size: src.len(),
                        limit: self.max_frame_size,
                    });
                }
                return Ok(None);
            }
            Err(err) => {
                self.partial = PartialFrame::default();
                return Err(err.into());
            }
        };

        // Remove the parsed frame from the buffer, its arguments point into it.
        let buf = src.split_to(consumed).freeze();

        Ok(Some(Frame::from_ranges(&buf, ranges)))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => Err(frame::Error::UnexpectedEof { offset: src.len() }.into()),
        }
    }
}

impl Encoder<Reply> for FrameCodec {
    type Error = Error;

    fn encode(&mut self, reply: Reply, dst: &mut BytesMut) -> Result<(), Self::Error> {
        reply.encode_into(dst);
        Ok(())
    }
}
