//! RFC 6455 frame codec.
//!
//! Every frame is sent with FIN set; fragmented messages are not produced,
//! and continuation frames from the peer are skipped.

use bytes::{Buf, Bytes, BytesMut};

/// Default largest accepted frame payload (16 MiB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("unknown opcode 0x{0:X}")]
    UnknownOpcode(u8),

    #[error("frame payload of {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: u64, limit: usize },

    #[error("text frame is not valid UTF-8")]
    InvalidUtf8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
}

impl Opcode {
    pub fn is_control(self) -> bool {
        matches!(self, Self::Close | Self::Ping | Self::Pong)
    }
}

impl TryFrom<u8> for Opcode {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self, FrameError> {
        match value & 0x0F {
            0x0 => Ok(Self::Continuation),
            0x1 => Ok(Self::Text),
            0x2 => Ok(Self::Binary),
            0x8 => Ok(Self::Close),
            0x9 => Ok(Self::Ping),
            0xA => Ok(Self::Pong),
            other => Err(FrameError::UnknownOpcode(other)),
        }
    }
}

impl From<Opcode> for u8 {
    fn from(opcode: Opcode) -> u8 {
        match opcode {
            Opcode::Continuation => 0x0,
            Opcode::Text => 0x1,
            Opcode::Binary => 0x2,
            Opcode::Close => 0x8,
            Opcode::Ping => 0x9,
            Opcode::Pong => 0xA,
        }
    }
}

/// One frame. `payload` is always stored unmasked; `mask` only says whether
/// the wire form is masked, and with which key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub opcode: Opcode,
    pub mask: Option<[u8; 4]>,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(opcode: Opcode, payload: impl Into<Bytes>) -> Self {
        Self { opcode, mask: None, payload: payload.into() }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(Opcode::Text, text.into())
    }

    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self::new(Opcode::Binary, data)
    }

    /// Masks the wire form with `key`. Clients must mask; servers must not.
    pub fn masked(mut self, key: [u8; 4]) -> Self {
        self.mask = Some(key);
        self
    }

    /// Serializes the frame: FIN + opcode, mask bit + length, optional key,
    /// payload (XORed with the key when masked).
    pub fn encode(&self) -> Vec<u8> {
        let len = self.payload.len();
        let mut out = Vec::with_capacity(14 + len);
        out.push(0x80 | u8::from(self.opcode));

        let mask_bit = if self.mask.is_some() { 0x80 } else { 0x00 };
        if len < 126 {
            out.push(mask_bit | len as u8);
        } else if len <= usize::from(u16::MAX) {
            out.push(mask_bit | 126);
            out.extend_from_slice(&(len as u16).to_be_bytes());
        } else {
            out.push(mask_bit | 127);
            out.extend_from_slice(&(len as u64).to_be_bytes());
        }

        match self.mask {
            Some(key) => {
                out.extend_from_slice(&key);
                out.extend(self.payload.iter().enumerate().map(|(i, b)| b ^ key[i % 4]));
            }
            None => out.extend_from_slice(&self.payload),
        }
        out
    }
}

/// Takes one complete frame off the front of `buf`.
///
/// `Ok(None)` means more bytes are needed and nothing was consumed. An
/// unknown opcode is reported only after the frame's bytes are consumed, so
/// the caller can skip it and carry on. `TooLarge` consumes nothing: the
/// stream cannot be resynchronized past a frame that is never buffered.
pub fn decode(buf: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>, FrameError> {
    if buf.len() < 2 {
        return Ok(None);
    }
    let first = buf[0];
    let masked = buf[1] & 0x80 != 0;

    let (len, mut header_len) = match buf[1] & 0x7F {
        126 => {
            if buf.len() < 4 {
                return Ok(None);
            }
            (u64::from(u16::from_be_bytes([buf[2], buf[3]])), 4)
        }
        127 => {
            if buf.len() < 10 {
                return Ok(None);
            }
            let mut be = [0u8; 8];
            be.copy_from_slice(&buf[2..10]);
            (u64::from_be_bytes(be), 10)
        }
        n => (u64::from(n), 2),
    };

    let len = match usize::try_from(len) {
        Ok(len) if len <= max_payload => len,
        _ => return Err(FrameError::TooLarge { size: len, limit: max_payload }),
    };

    let mask = if masked {
        if buf.len() < header_len + 4 {
            return Ok(None);
        }
        let key = [buf[header_len], buf[header_len + 1], buf[header_len + 2], buf[header_len + 3]];
        header_len += 4;
        Some(key)
    } else {
        None
    };

    if buf.len() < header_len + len {
        return Ok(None);
    }
    buf.advance(header_len);
    let mut payload = buf.split_to(len);
    let opcode = Opcode::try_from(first)?;

    if let Some(key) = mask {
        for (i, byte) in payload.iter_mut().enumerate() {
            *byte ^= key[i % 4];
        }
    }

    Ok(Some(Frame { opcode, mask, payload: payload.freeze() }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; 4] = [0x37, 0xfa, 0x21, 0x3d];

    fn decode_all(bytes: &[u8]) -> Result<Option<Frame>, FrameError> {
        decode(&mut BytesMut::from(bytes), DEFAULT_MAX_FRAME_SIZE)
    }

    #[test]
    fn text_hello_survives_encode_then_decode() {
        let wire = Frame::text("hello").encode();
        assert_eq!(wire, b"\x81\x05hello");

        let frame = decode_all(&wire).unwrap().unwrap();
        assert_eq!(frame.opcode, Opcode::Text);
        assert_eq!(frame.payload, "hello");
    }

    #[test]
    fn masked_frame_from_rfc_is_unmasked() {
        // RFC 6455 §5.7: a masked "Hello".
        let wire = [0x81, 0x85, 0x37, 0xfa, 0x21, 0x3d, 0x7f, 0x9f, 0x4d, 0x51, 0x58];
        let frame = decode_all(&wire).unwrap().unwrap();
        assert_eq!(frame.payload, "Hello");
        assert_eq!(frame.mask, Some(KEY));
        assert_eq!(Frame::text("Hello").masked(KEY).encode(), wire);
    }

    #[test]
    fn extended_lengths_use_16_and_64_bits() {
        let medium = Frame::binary(vec![7u8; 300]).encode();
        assert_eq!(&medium[..4], &[0x82, 126, 0x01, 0x2c]);
        assert_eq!(decode_all(&medium).unwrap().unwrap().payload.len(), 300);

        let large = Frame::binary(vec![1u8; 70_000]).encode();
        assert_eq!(large[1], 127);
        assert_eq!(&large[2..10], &70_000u64.to_be_bytes());
        assert_eq!(decode_all(&large).unwrap().unwrap().payload.len(), 70_000);
    }

    #[test]
    fn partial_frame_consumes_nothing() {
        let wire = Frame::text("hello").masked(KEY).encode();
        for cut in 0..wire.len() {
            let mut buf = BytesMut::from(&wire[..cut]);
            assert!(decode(&mut buf, DEFAULT_MAX_FRAME_SIZE).unwrap().is_none());
            assert_eq!(buf.len(), cut);
        }
    }

    #[test]
    fn back_to_back_frames_decode_in_order() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&Frame::text("one").encode());
        buf.extend_from_slice(&Frame::new(Opcode::Ping, "two").encode());

        let first = decode(&mut buf, 1024).unwrap().unwrap();
        let second = decode(&mut buf, 1024).unwrap().unwrap();
        assert_eq!((first.opcode, &first.payload[..]), (Opcode::Text, &b"one"[..]));
        assert_eq!((second.opcode, &second.payload[..]), (Opcode::Ping, &b"two"[..]));
        assert!(buf.is_empty());
    }

    #[test]
    fn unknown_opcode_is_consumed_then_reported() {
        let mut buf = BytesMut::from(&[0x83, 0x01, b'x', 0x81, 0x01, b'y'][..]);
        assert!(matches!(decode(&mut buf, 1024), Err(FrameError::UnknownOpcode(3))));
        let next = decode(&mut buf, 1024).unwrap().unwrap();
        assert_eq!(next.payload, "y");
    }

    #[test]
    fn oversized_frame_is_rejected_before_buffering() {
        let mut buf = BytesMut::from(&[0x82, 126, 0x04, 0x00][..]);
        let err = decode(&mut buf, 512).unwrap_err();
        assert!(matches!(err, FrameError::TooLarge { size: 1024, limit: 512 }));
    }
}
