// https://redis.io/docs/reference/protocol-spec
//
// Requests are RESP arrays of bulk strings:
//
//     *<argc>\r\n
//     $<len>\r\n<len bytes>\r\n    (argc times)

use std::fmt;
use std::io::Cursor;
use std::ops::Range;

use bytes::Buf;
use bytes::Bytes;
use thiserror::Error as ThisError;

static CRLF: &[u8; 2] = b"\r\n";

const ARRAY: u8 = b'*';
const BULK_STRING: u8 = b'$';

// Upper bound for the argument vector allocated up front, whatever the declared length says.
const MAX_PREALLOCATED_ARGS: usize = 1024;

#[derive(Debug, ThisError, Clone, PartialEq, Eq)]
pub enum Error {
    /// The buffer ends before the frame does.
    #[error("unexpected EOF")]
    UnexpectedEof { offset: usize },
    #[error("{expected} expected")]
    TypeMismatch {
        expected: &'static str,
        offset: usize,
    },
    #[error("expected: \"\\r\\n\"")]
    InvalidTerminator { offset: usize },
    #[error("partial read; trailing data")]
    TrailingData { offset: usize },
    #[error("length overflow")]
    LengthOverflow { offset: usize },
}

impl Error {
    /// Byte offset, relative to the start of the frame, where decoding failed.
    pub fn offset(&self) -> usize {
        match self {
            Error::UnexpectedEof { offset }
            | Error::TypeMismatch { offset, .. }
            | Error::InvalidTerminator { offset }
            | Error::TrailingData { offset }
            | Error::LengthOverflow { offset } => *offset,
        }
    }

    pub fn is_incomplete(&self) -> bool {
        matches!(self, Error::UnexpectedEof { .. })
    }
}

/// A decoded request: the command name followed by its arguments, in order.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    args: Vec<Bytes>,
}

impl Frame {
    pub fn new(args: Vec<Bytes>) -> Frame {
        Frame { args }
    }

    /// Builds a frame whose arguments are slices of `buf`, without copying.
    pub fn from_ranges(buf: &Bytes, ranges: Vec<Range<usize>>) -> Frame {
        let args = ranges.into_iter().map(|range| buf.slice(range)).collect();
        Frame { args }
    }

    pub fn args(&self) -> &[Bytes] {
        &self.args
    }

    pub fn into_args(self) -> Vec<Bytes> {
        self.args
    }

    pub fn serialize(&self) -> Vec<u8> {
        let length_str = self.args.len().to_string();
        let mut bytes = Vec::with_capacity(1 + length_str.len() + CRLF.len());
        bytes.push(ARRAY);
        bytes.extend_from_slice(length_str.as_bytes());
        bytes.extend_from_slice(CRLF);
        for arg in &self.args {
            bytes.push(BULK_STRING);
            bytes.extend_from_slice(arg.len().to_string().as_bytes());
            bytes.extend_from_slice(CRLF);
            bytes.extend_from_slice(arg);
            bytes.extend_from_slice(CRLF);
        }
        bytes
    }
}

// Arguments are shown space separated, the way a user would type the command.
impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", String::from_utf8_lossy(arg))?;
        }
        Ok(())
    }
}

/// Decodes exactly one frame that must span the whole of `src`.
///
/// Returns the arguments, borrowed from `src`, and the number of bytes consumed, which is always
/// `src.len()` on success.
pub fn decode(src: &[u8]) -> Result<(Vec<&[u8]>, usize), Error> {
    let (ranges, consumed) = decode_prefix(src)?;

    if consumed != src.len() {
        return Err(Error::TrailingData { offset: consumed });
    }

    let args = ranges.into_iter().map(|range| &src[range]).collect();
    Ok((args, consumed))
}

/// Decodes the frame at the start of `src`, ignoring whatever follows it.
///
/// Returns the position of every argument payload within `src` and the number of bytes the frame
/// occupies. `Error::UnexpectedEof` means `src` holds a valid but incomplete prefix of a frame.
pub fn decode_prefix(src: &[u8]) -> Result<(Vec<Range<usize>>, usize), Error> {
    PartialFrame::default().resume(src)
}

/// Progress through a frame that has not fully arrived yet.
///
/// Holds the declared argument count and every argument parsed so far, so that a later call with
/// more bytes appended to the same buffer starts at the first unfinished argument instead of at
/// byte 0.
#[derive(Debug, Default, Clone)]
pub struct PartialFrame {
    argc: Option<usize>,
    args: Vec<Range<usize>>,
    pos: usize,
}

impl PartialFrame {
    /// Continues decoding the frame at the start of `src`, which must begin with the bytes seen by
    /// the previous calls.
    ///
    /// Same results as `decode_prefix`. On success the state is reset for the next frame; on
    /// `Error::UnexpectedEof` it keeps what was parsed so far.
    pub fn resume(&mut self, src: &[u8]) -> Result<(Vec<Range<usize>>, usize), Error> {
        let mut cursor = Cursor::new(src);
        cursor.set_position(self.pos as u64);

        let argc = match self.argc {
            Some(argc) => argc,
            None => {
                expect_type(&mut cursor, ARRAY, "array")?;
                let argc = parse_length(&mut cursor)?;
                self.args.reserve(argc.min(MAX_PREALLOCATED_ARGS));
                self.argc = Some(argc);
                self.pos = cursor.position() as usize;
                argc
            }
        };

        while self.args.len() < argc {
            let arg = parse_bulk_string(&mut cursor)?;
            self.args.push(arg);
            self.pos = cursor.position() as usize;
        }

        let consumed = self.pos;
        let args = std::mem::take(self).args;
        Ok((args, consumed))
    }

    /// Offset within the frame where the next call starts parsing.
    pub fn resume_offset(&self) -> usize {
        self.pos
    }
}

// $<length>\r\n<data>\r\n
fn parse_bulk_string(src: &mut Cursor<&[u8]>) -> Result<Range<usize>, Error> {
    let element = src.position() as usize;
    expect_type(src, BULK_STRING, "string")?;
    let length = parse_length(src)?;

    let start = src.position() as usize;
    if src.remaining() < length {
        return Err(Error::UnexpectedEof { offset: element });
    }

    let end = start + length;
    src.advance(length);
    expect_crlf(src)?;

    Ok(start..end)
}

fn expect_type(src: &mut Cursor<&[u8]>, data_type: u8, name: &'static str) -> Result<(), Error> {
    let offset = src.position() as usize;
    let byte = get_byte(src)?;

    if byte != data_type {
        return Err(Error::TypeMismatch {
            expected: name,
            offset,
        });
    }

    Ok(())
}

// Digits only: no sign, and no digits at all reads as zero.
fn parse_length(src: &mut Cursor<&[u8]>) -> Result<usize, Error> {
    let mut length: usize = 0;

    while src.has_remaining() && src.chunk()[0].is_ascii_digit() {
        let offset = src.position() as usize;
        let digit = usize::from(src.get_u8() - b'0');

        length = length
            .checked_mul(10)
            .and_then(|n| n.checked_add(digit))
            .ok_or(Error::LengthOverflow { offset })?;
    }

    expect_crlf(src)?;

    Ok(length)
}

fn expect_crlf(src: &mut Cursor<&[u8]>) -> Result<(), Error> {
    let offset = src.position() as usize;
    let rest = src.chunk();

    if rest.len() >= CRLF.len() {
        if &rest[..CRLF.len()] != CRLF {
            return Err(Error::InvalidTerminator { offset });
        }
        src.advance(CRLF.len());
        return Ok(());
    }

    // A lone '\r' may still be followed by '\n' in a later read.
    if CRLF.starts_with(rest) {
        Err(Error::UnexpectedEof {
            offset: offset + rest.len(),
        })
    } else {
        Err(Error::InvalidTerminator { offset })
    }
}

fn get_byte(src: &mut Cursor<&[u8]>) -> Result<u8, Error> {
    if !src.has_remaining() {
        return Err(Error::UnexpectedEof {
            offset: src.position() as usize,
        });
    }
    Ok(src.get_u8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn decode_ping() {
        let data = b"*1\r\n$4\r\nPING\r\n";

        let (args, consumed) = decode(data).unwrap();

        assert_eq!(args, vec![&b"PING"[..]]);
        assert_eq!(consumed, data.len());
    }

    #[test]
    fn decode_echo_with_arguments() {
        let data = b"*3\r\n$4\r\nECHO\r\n$2\r\nhi\r\n$3\r\nfoo\r\n";

        let (args, consumed) = decode(data).unwrap();

        assert_eq!(args, vec![&b"ECHO"[..], &b"hi"[..], &b"foo"[..]]);
        assert_eq!(consumed, data.len());
    }

    #[test]
    fn decode_empty_array() {
        let (args, consumed) = decode(b"*0\r\n").unwrap();

        assert!(args.is_empty());
        assert_eq!(consumed, 4);
    }

    #[test]
    fn decode_binary_payload() {
        let data = b"*1\r\n$4\r\n\r\n\0\xff\r\n";

        let (args, _) = decode(data).unwrap();

        assert_eq!(args, vec![&b"\r\n\0\xff"[..]]);
    }

    #[test]
    fn decode_missing_digits_reads_as_zero() {
        let (args, _) = decode(b"*1\r\n$\r\n\r\n").unwrap();

        assert_eq!(args, vec![&b""[..]]);
    }

    #[test]
    fn decode_missing_trailing_terminator() {
        let err = decode(b"*1\r\n$4\r\nPING").unwrap_err();

        assert_eq!(err, Error::UnexpectedEof { offset: 12 });
    }

    #[test]
    fn decode_empty_buffer() {
        let err = decode(b"").unwrap_err();

        assert_eq!(err, Error::UnexpectedEof { offset: 0 });
    }

    #[test]
    fn decode_trailing_data() {
        let err = decode(b"*1\r\n$4\r\nPING\r\n*1\r\n").unwrap_err();

        assert_eq!(err, Error::TrailingData { offset: 14 });
        assert_eq!(err.to_string(), "partial read; trailing data");
    }

    #[test]
    fn decode_length_beyond_buffer() {
        let err = decode(b"*1\r\n$100\r\nPING\r\n").unwrap_err();

        // Reported at the '$' of the element that runs past the buffer.
        assert_eq!(err, Error::UnexpectedEof { offset: 4 });
    }

    #[test]
    fn decode_not_an_array() {
        let err = decode(b"+PING\r\n").unwrap_err();

        assert_eq!(
            err,
            Error::TypeMismatch {
                expected: "array",
                offset: 0
            }
        );
        assert_eq!(err.to_string(), "array expected");
    }

    #[test]
    fn decode_element_not_a_bulk_string() {
        let err = decode(b"*1\r\n:4\r\n").unwrap_err();

        assert_eq!(
            err,
            Error::TypeMismatch {
                expected: "string",
                offset: 4
            }
        );
    }

    #[test]
    fn decode_signed_length() {
        let err = decode(b"*-1\r\n").unwrap_err();

        assert_eq!(err, Error::InvalidTerminator { offset: 1 });
    }

    #[test]
    fn decode_bad_terminator_after_length() {
        let err = decode(b"*1\n$4\r\nPING\r\n").unwrap_err();

        assert_eq!(err, Error::InvalidTerminator { offset: 2 });
    }

    #[test]
    fn decode_bad_terminator_after_payload() {
        let err = decode(b"*1\r\n$4\r\nPINGXX").unwrap_err();

        assert_eq!(err, Error::InvalidTerminator { offset: 12 });
    }

    #[test]
    fn decode_payload_shorter_than_declared() {
        // The declared length swallows the terminator, so the next bytes are not "\r\n".
        let err = decode(b"*1\r\n$5\r\nPING\r\n\r\n").unwrap_err();

        assert_eq!(err, Error::InvalidTerminator { offset: 13 });
    }

    #[test]
    fn decode_partial_terminator_is_incomplete() {
        let err = decode(b"*1\r").unwrap_err();

        assert!(err.is_incomplete());
        assert_eq!(err.offset(), 3);
    }

    #[test]
    fn decode_length_overflow() {
        let err = decode(b"*99999999999999999999999\r\n").unwrap_err();

        assert!(matches!(err, Error::LengthOverflow { .. }));
    }

    #[test]
    fn decode_prefix_stops_after_first_frame() {
        let data = b"*1\r\n$4\r\nPING\r\n*1\r\n$4\r\nPI";

        let (args, consumed) = decode_prefix(data).unwrap();

        assert_eq!(args, vec![8..12]);
        assert_eq!(consumed, 14);
    }

    #[test]
    fn every_prefix_of_a_frame_is_incomplete() {
        let data = b"*2\r\n$4\r\necho\r\n$5\r\nhello\r\n";

        for end in 0..data.len() {
            let err = decode_prefix(&data[..end]).unwrap_err();
            assert!(err.is_incomplete(), "prefix of {end} bytes: {err}");
        }
    }

    #[test]
    fn resume_matches_decode_prefix_for_every_split() {
        let data = b"*3\r\n$4\r\nECHO\r\n$2\r\nhi\r\n$3\r\nfoo\r\n*1\r\n";
        let expected = decode_prefix(data).unwrap();

        for split in 0..data.len() {
            let mut partial = PartialFrame::default();

            if let Err(err) = partial.resume(&data[..split]) {
                assert!(err.is_incomplete(), "split at {split}: {err}");
                assert!(partial.resume_offset() <= split);
            }
            assert_eq!(partial.resume(data).unwrap(), expected, "split at {split}");
            assert_eq!(partial.resume_offset(), 0);
        }
    }

    #[test]
    fn resume_starts_at_the_unfinished_argument() {
        let mut partial = PartialFrame::default();

        let err = partial.resume(b"*2\r\n$4\r\necho\r\n$5\r\nhel").unwrap_err();
        assert_eq!(err, Error::UnexpectedEof { offset: 14 });
        assert_eq!(partial.resume_offset(), 14);

        let (args, consumed) = partial
            .resume(b"*2\r\n$4\r\necho\r\n$5\r\nhello\r\n")
            .unwrap();
        assert_eq!(args, vec![8..12, 18..23]);
        assert_eq!(consumed, 25);
    }

    #[test]
    fn resume_reports_malformed_input_past_the_parsed_arguments() {
        let mut partial = PartialFrame::default();

        assert!(partial.resume(b"*2\r\n$4\r\necho\r\n").is_err());
        let err = partial.resume(b"*2\r\n$4\r\necho\r\n:1\r\n").unwrap_err();

        assert_eq!(
            err,
            Error::TypeMismatch {
                expected: "string",
                offset: 14
            }
        );
    }

    #[test]
    fn serialized_frames_decode_to_the_same_arguments() {
        let mut rng = rand::thread_rng();

        for _ in 0..100 {
            let argc = rng.gen_range(0..8);
            let args: Vec<Bytes> = (0..argc)
                .map(|_| {
                    let len = rng.gen_range(0..64);
                    Bytes::from((0..len).map(|_| rng.gen::<u8>()).collect::<Vec<u8>>())
                })
                .collect();
            let data = Frame::new(args.clone()).serialize();

            let (decoded, consumed) = decode(&data).unwrap();

            assert_eq!(decoded, args.iter().map(|a| &a[..]).collect::<Vec<_>>());
            assert_eq!(consumed, data.len());
        }
    }

    #[test]
    fn frame_from_ranges_shares_the_buffer() {
        let buf = Bytes::from_static(b"*2\r\n$4\r\necho\r\n$2\r\nhi\r\n");
        let (ranges, _) = decode_prefix(&buf).unwrap();

        let frame = Frame::from_ranges(&buf, ranges);

        assert_eq!(
            frame.args(),
            &[Bytes::from_static(b"echo"), Bytes::from_static(b"hi")]
        );
        assert_eq!(frame.to_string(), "echo hi");
    }
}
