use crate::rpc_code::RpcCode;
use thiserror::Error as ThisError;

/// The number of bytes in a serialized message header
pub const HEADER_SIZE: usize = 24;

/// Marks the start of every frame: `SWYD` in ASCII
const MAGIC: u32 = u32::from_le_bytes(*b"SWYD");

/// Whether a message opens an exchange or answers one.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MessageKind {
    #[default]
    Request = 0,
    Reply = 1,
}

impl TryFrom<u8> for MessageKind {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Request),
            1 => Ok(Self::Reply),
            other => Err(FrameError::UnknownKind(other)),
        }
    }
}

/// The fixed-size header that precedes every message body on the wire.
///
/// Layout, all fields little-endian:
///
/// ```text
/// [magic:4][id:8][rpc_code:4][body_length:4][kind:1][reserved:3]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MessageHeader {
    /// Unique identifier, shared by a request and its reply
    pub id: u64,
    /// The operation being invoked
    pub rpc_code: RpcCode,
    /// The number of body bytes following the header
    pub body_length: u32,
    /// Request or reply
    pub kind: MessageKind,
}

impl MessageHeader {
    /// The number of bytes the header occupies on the wire.
    pub const fn serialized_size() -> usize {
        HEADER_SIZE
    }

    /// Reads the declared body length out of a buffered header without
    /// validating anything else.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is shorter than a header.
    pub fn body_length_of(bytes: &[u8]) -> u32 {
        u32::from_le_bytes([bytes[16], bytes[17], bytes[18], bytes[19]])
    }

    /// Parses a header from the start of `bytes`, rejecting anything that is
    /// not a well-formed header or that declares more than `max_body_length`
    /// body bytes.
    pub fn parse(bytes: &[u8], max_body_length: u32) -> Result<Self, FrameError> {
        if bytes.len() < HEADER_SIZE {
            Err(FrameError::HeaderTooShort(bytes.len()))?
        }

        let magic = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if magic != MAGIC {
            Err(FrameError::BadMagic(magic))?
        }

        let mut id = [0u8; 8];
        id.copy_from_slice(&bytes[4..12]);
        let rpc_code = u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);

        let body_length = Self::body_length_of(bytes);
        if body_length > max_body_length {
            Err(FrameError::BodyTooLarge {
                declared: body_length,
                max: max_body_length,
            })?
        }

        Ok(Self {
            id: u64::from_le_bytes(id),
            rpc_code: rpc_code.into(),
            body_length,
            kind: bytes[20].try_into()?,
        })
    }

    /// Serializes the header into the first [`HEADER_SIZE`] bytes of `buf`.
    ///
    /// # Panics
    ///
    /// Panics if `buf` is shorter than a header.
    pub fn write_to(&self, buf: &mut [u8]) {
        buf[0..4].copy_from_slice(&MAGIC.to_le_bytes());
        buf[4..12].copy_from_slice(&self.id.to_le_bytes());
        buf[12..16].copy_from_slice(&u32::from(self.rpc_code).to_le_bytes());
        buf[16..20].copy_from_slice(&self.body_length.to_le_bytes());
        buf[20] = self.kind as u8;
        buf[21..24].fill(0);
    }

    /// Serializes the header into a new array.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        self.write_to(&mut buf);
        buf
    }
}

/// Framing and header protocol violations.
#[derive(Debug, ThisError, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    #[error("Too few bytes to constitute a message header: {0}")]
    HeaderTooShort(usize),
    #[error("The header does not start with the frame marker: {0:#010x}")]
    BadMagic(u32),
    #[error("The header declares a body of {declared} bytes, more than the maximum of {max}")]
    BodyTooLarge { declared: u32, max: u32 },
    #[error("Unknown message kind {0}")]
    UnknownKind(u8),
    #[error("The frame holds {actual} bytes but its header declares {declared}")]
    LengthMismatch { declared: usize, actual: usize },
}
