//! Change records and their wire format
//!
//! Every mutation the store publishes travels as one frame:
//!
//! ```text
//! [op:u8][path_len:u16 LE][path][data_len:u16 LE][data]
//! ```
//!
//! Path and data are UTF-8. A frame with trailing bytes is malformed.

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{RunStateError, RunStateResult};

/// Minimum frame size (op + two empty length-prefixed fields)
pub const MIN_RECORD_SIZE: usize = 1 + 2 + 2;

/// Store operation carried by a change record
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Operation {
    Assign = 0x01,
    Mkdir = 0x02,
    Rmdir = 0x03,
}

impl Operation {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Operation::Assign),
            0x02 => Some(Operation::Mkdir),
            0x03 => Some(Operation::Rmdir),
            _ => None,
        }
    }

    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Assign => "ASSIGN",
            Operation::Mkdir => "MKDIR",
            Operation::Rmdir => "RMDIR",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One raw change from the store's feed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeRecord {
    pub operation: Operation,
    /// Variable path (ASSIGN) or containing directory (MKDIR/RMDIR)
    pub path: String,
    /// New value (ASSIGN) or directory name (MKDIR/RMDIR)
    pub data: String,
}

impl ChangeRecord {
    pub fn new(operation: Operation, path: impl Into<String>, data: impl Into<String>) -> Self {
        ChangeRecord {
            operation,
            path: path.into(),
            data: data.into(),
        }
    }

    pub fn assign(path: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(Operation::Assign, path, value)
    }

    pub fn mkdir(parent: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(Operation::Mkdir, parent, name)
    }

    pub fn rmdir(parent: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(Operation::Rmdir, parent, name)
    }

    /// Encode into a wire frame
    pub fn encode(&self) -> RunStateResult<Bytes> {
        let path = self.path.as_bytes();
        let data = self.data.as_bytes();
        let path_len = field_len(path, "path")?;
        let data_len = field_len(data, "data")?;

        let mut buf = BytesMut::with_capacity(MIN_RECORD_SIZE + path.len() + data.len());
        buf.put_u8(self.operation.to_byte());
        buf.put_u16_le(path_len);
        buf.put_slice(path);
        buf.put_u16_le(data_len);
        buf.put_slice(data);
        Ok(buf.freeze())
    }

    /// Decode a wire frame
    pub fn decode(frame: &[u8]) -> RunStateResult<Self> {
        if frame.len() < MIN_RECORD_SIZE {
            return Err(RunStateError::ProtocolError(format!(
                "record too short: expected at least {}, got {}",
                MIN_RECORD_SIZE,
                frame.len()
            )));
        }

        let mut buf = frame;
        let op = buf.get_u8();
        let operation = Operation::from_byte(op)
            .ok_or_else(|| RunStateError::ProtocolError(format!("unknown operation 0x{:02x}", op)))?;

        let path = read_field(&mut buf, "path")?;
        let data = read_field(&mut buf, "data")?;

        if buf.has_remaining() {
            return Err(RunStateError::ProtocolError(format!(
                "{} trailing bytes after record",
                buf.remaining()
            )));
        }

        Ok(ChangeRecord {
            operation,
            path,
            data,
        })
    }
}

impl fmt::Display for ChangeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.operation, self.path, self.data)
    }
}

fn field_len(field: &[u8], what: &str) -> RunStateResult<u16> {
    u16::try_from(field.len()).map_err(|_| {
        RunStateError::InvalidArgument(format!("{} too long for record: {} bytes", what, field.len()))
    })
}

fn read_field(buf: &mut &[u8], what: &str) -> RunStateResult<String> {
    if buf.remaining() < 2 {
        return Err(RunStateError::ProtocolError(format!("missing {} length", what)));
    }
    let len = buf.get_u16_le() as usize;
    if buf.remaining() < len {
        return Err(RunStateError::ProtocolError(format!(
            "{} truncated: expected {}, got {}",
            what,
            len,
            buf.remaining()
        )));
    }
    let raw = buf[..len].to_vec();
    buf.advance(len);
    String::from_utf8(raw)
        .map_err(|_| RunStateError::ProtocolError(format!("{} is not valid UTF-8", what)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_record_roundtrip() {
        let record = ChangeRecord::assign("/RunState/State", "NotReady");
        let frame = record.encode().unwrap();
        assert_eq!(frame[0], Operation::Assign.to_byte());
        assert_eq!(ChangeRecord::decode(&frame).unwrap(), record);
    }

    #[test]
    fn test_decode_rejects_unknown_op() {
        let mut frame = ChangeRecord::mkdir("/RunState", "evb").encode().unwrap().to_vec();
        frame[0] = 0x7f;
        assert!(matches!(
            ChangeRecord::decode(&frame),
            Err(RunStateError::ProtocolError(_))
        ));
    }

    #[test]
    fn test_decode_rejects_truncated() {
        let frame = ChangeRecord::assign("/RunState/State", "Ready").encode().unwrap();
        let short = &frame[..frame.len() - 2];
        assert!(matches!(
            ChangeRecord::decode(short),
            Err(RunStateError::ProtocolError(_))
        ));
        assert!(ChangeRecord::decode(&[0x01, 0x00]).is_err());
    }

    #[test]
    fn test_decode_rejects_trailing_bytes() {
        let mut frame = ChangeRecord::rmdir("/RunState", "evb").encode().unwrap().to_vec();
        frame.push(0);
        assert!(ChangeRecord::decode(&frame).is_err());
    }

    #[test]
    fn test_decode_rejects_invalid_utf8() {
        let frame = [0x01, 0x01, 0x00, 0xff, 0x00, 0x00];
        assert!(matches!(
            ChangeRecord::decode(&frame),
            Err(RunStateError::ProtocolError(_))
        ));
    }

    proptest! {
        // Garbage off the feed must surface as an error, never a panic
        #[test]
        fn prop_decode_never_panics(frame in proptest::collection::vec(any::<u8>(), 0..64)) {
            if let Err(e) = ChangeRecord::decode(&frame) {
                prop_assert!(matches!(e, RunStateError::ProtocolError(_)));
            }
        }
    }
}
