//! Binary codec for netput frames and event envelopes.
//!
//! Wire format:
//! ```text
//! [version:1][msg_type:1][flags:1][reserved:1][payload_len:4][call_id:8][payload:N]
//! ```
//! Total header size: 16 bytes. All multi-byte integers are big-endian.
//!
//! Event union layout (inside a `Push` payload, after the session id):
//! ```text
//! [kind:1][timestamp:8][window_id:4][kind-specific fields]
//! ```
//! `f32` fields travel as their IEEE-754 bit pattern, so every field is
//! reproduced bit-for-bit on decode.

use thiserror::Error;

use crate::protocol::events::{
    Event, EventInfo, EventKind, InputState, KeyboardEvent, MouseButton, MouseButtonEvent,
    MouseButtonStateMask, MouseMotionEvent, MouseWheelEvent, SessionId, WindowEvent,
    WindowEventType,
};
use crate::protocol::messages::{
    ConnectRequest, ConnectResponse, DisconnectRequest, DisconnectResponse, Frame, MessageType,
    PushAck, RpcMessage, HEADER_SIZE, PROTOCOL_VERSION,
};

/// Largest payload accepted by [`decode_frame`].
pub const MAX_PAYLOAD_LEN: usize = 1024 * 1024;

/// Errors that can occur during frame encoding or decoding.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProtocolError {
    /// The byte slice is shorter than the minimum required length.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The message type byte in the header is not a recognized value.
    #[error("unknown message type: 0x{0:02X}")]
    UnknownMessageType(u8),

    /// The protocol version in the header is not supported.
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// The payload could not be parsed (field value out of range, UTF-8 error, etc.).
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// An event envelope arrived with no variant populated.
    #[error("event union has no variant populated")]
    EmptyEventUnion,

    /// The event kind tag is not one of the five known kinds.
    #[error("unknown event kind: 0x{0:02X}")]
    UnknownEventKind(u8),

    /// The header declares a payload larger than [`MAX_PAYLOAD_LEN`].
    #[error("payload too large: {0} bytes")]
    PayloadTooLarge(usize),

    /// A string or byte field does not fit its length prefix.
    #[error("field {field} too long: {len} bytes")]
    FieldTooLong { field: &'static str, len: usize },
}

/// The fixed-size frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub message_type: MessageType,
    pub flags: u8,
    pub payload_len: usize,
    pub call_id: u64,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a [`Frame`] into a byte vector including the 16-byte header.
///
/// # Errors
///
/// Returns [`ProtocolError::FieldTooLong`] if a string exceeds its `u16`
/// length prefix or the credential exceeds [`MAX_PAYLOAD_LEN`].
///
/// # Examples
///
/// ```rust
/// use netput_core::protocol::codec::{decode_frame, encode_frame};
/// use netput_core::protocol::messages::{DisconnectResponse, Frame, RpcMessage};
///
/// let frame = Frame::new(7, RpcMessage::DisconnectResponse(DisconnectResponse::ok()));
/// let bytes = encode_frame(&frame).unwrap();
/// let (decoded, consumed) = decode_frame(&bytes).unwrap();
/// assert_eq!(decoded, frame);
/// assert_eq!(consumed, bytes.len());
/// ```
pub fn encode_frame(frame: &Frame) -> Result<Vec<u8>, ProtocolError> {
    let payload = encode_payload(&frame.message)?;
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(ProtocolError::PayloadTooLarge(payload.len()));
    }

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());

    // Header: version (1) + msg_type (1) + flags (1) + reserved (1) +
    //         payload_len (4) + call_id (8) = 16 bytes
    buf.push(PROTOCOL_VERSION);
    buf.push(frame.message.message_type() as u8);
    buf.push(frame.flags);
    buf.push(0x00); // reserved
    buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buf.extend_from_slice(&frame.call_id.to_be_bytes());

    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Decodes only the header at the start of `bytes`.
///
/// Servers use this to learn the call id and message type of a frame whose
/// payload turns out to be malformed, so they can still answer the caller.
///
/// # Errors
///
/// Returns [`ProtocolError`] if fewer than 16 bytes are available or the
/// version, type, or length fields are invalid.
pub fn decode_header(bytes: &[u8]) -> Result<FrameHeader, ProtocolError> {
    if bytes.len() < HEADER_SIZE {
        return Err(ProtocolError::InsufficientData {
            needed: HEADER_SIZE,
            available: bytes.len(),
        });
    }

    let version = bytes[0];
    if version != PROTOCOL_VERSION {
        return Err(ProtocolError::UnsupportedVersion(version));
    }

    let type_byte = bytes[1];
    let message_type =
        MessageType::try_from(type_byte).map_err(|_| ProtocolError::UnknownMessageType(type_byte))?;
    let flags = bytes[2];
    // bytes[3] is reserved – ignored on decode

    let payload_len = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
    if payload_len > MAX_PAYLOAD_LEN {
        return Err(ProtocolError::PayloadTooLarge(payload_len));
    }

    let mut id = [0u8; 8];
    id.copy_from_slice(&bytes[8..16]);

    Ok(FrameHeader {
        message_type,
        flags,
        payload_len,
        call_id: u64::from_be_bytes(id),
    })
}

/// Decodes one [`Frame`] from the beginning of `bytes`.
///
/// Returns the frame and the total number of bytes consumed (header +
/// payload), so stream readers can advance their cursor.
/// [`ProtocolError::InsufficientData`] means the caller should read more.
///
/// # Errors
///
/// Returns [`ProtocolError`] if the bytes are malformed.
pub fn decode_frame(bytes: &[u8]) -> Result<(Frame, usize), ProtocolError> {
    let header = decode_header(bytes)?;

    let total_needed = HEADER_SIZE + header.payload_len;
    if bytes.len() < total_needed {
        return Err(ProtocolError::InsufficientData {
            needed: total_needed,
            available: bytes.len(),
        });
    }

    let payload = &bytes[HEADER_SIZE..total_needed];
    let message = decode_payload(header.message_type, payload)?;
    Ok((
        Frame {
            call_id: header.call_id,
            flags: header.flags,
            message,
        },
        total_needed,
    ))
}

/// Appends the wire form of an event union to `buf`.
pub fn encode_event_info(buf: &mut Vec<u8>, info: &EventInfo) {
    buf.push(info.kind() as u8);
    buf.extend_from_slice(&info.timestamp().to_be_bytes());
    buf.extend_from_slice(&info.window_id().to_be_bytes());
    match info {
        EventInfo::Keyboard(e) => {
            buf.push(e.state as u8);
            write_bool(buf, e.repeat);
            buf.extend_from_slice(&e.key_code.to_be_bytes());
        }
        EventInfo::MouseMotion(e) => {
            buf.push(e.state_mask.to_bits());
            buf.extend_from_slice(&e.x.to_be_bytes());
            buf.extend_from_slice(&e.y.to_be_bytes());
            buf.extend_from_slice(&e.relative_x.to_be_bytes());
            buf.extend_from_slice(&e.relative_y.to_be_bytes());
        }
        EventInfo::MouseButton(e) => {
            buf.push(e.button as u8);
            buf.push(e.state as u8);
            write_bool(buf, e.double_click);
            buf.extend_from_slice(&e.x.to_be_bytes());
            buf.extend_from_slice(&e.y.to_be_bytes());
        }
        EventInfo::MouseWheel(e) => {
            buf.extend_from_slice(&e.x.to_be_bytes());
            buf.extend_from_slice(&e.y.to_be_bytes());
            buf.extend_from_slice(&e.precise_x.to_bits().to_be_bytes());
            buf.extend_from_slice(&e.precise_y.to_bits().to_be_bytes());
        }
        EventInfo::Window(e) => {
            buf.push(e.event_type as u8);
            buf.extend_from_slice(&e.arg1.to_be_bytes());
            buf.extend_from_slice(&e.arg2.to_be_bytes());
        }
    }
}

/// Decodes an event union from the start of `bytes`.
///
/// Returns the event and the number of bytes consumed.  A zero kind tag is
/// rejected with [`ProtocolError::EmptyEventUnion`] so that no handler ever
/// sees an envelope without a populated variant.
///
/// # Errors
///
/// Returns [`ProtocolError`] for an empty union, unknown kind, truncated
/// fields, or out-of-range enum values.
pub fn decode_event_info(bytes: &[u8]) -> Result<(EventInfo, usize), ProtocolError> {
    let mut r = Reader::new(bytes, "Event");
    let info = read_event_info(&mut r)?;
    Ok((info, r.pos))
}

// ── Payload encoding ──────────────────────────────────────────────────────────

fn encode_payload(msg: &RpcMessage) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = Vec::new();
    match msg {
        RpcMessage::ConnectRequest(m) => encode_connect_request(&mut buf, m)?,
        RpcMessage::ConnectResponse(m) => match m {
            ConnectResponse::SessionId(id) => {
                buf.push(0x00);
                write_length_prefixed_string(&mut buf, id.as_str(), "session_id")?;
            }
            ConnectResponse::Error(e) => {
                buf.push(0x01);
                write_length_prefixed_string(&mut buf, e, "error")?;
            }
        },
        RpcMessage::Push(event) => {
            write_length_prefixed_string(&mut buf, event.session_id.as_str(), "session_id")?;
            encode_event_info(&mut buf, &event.info);
        }
        RpcMessage::PushAck(m) => write_optional_error(&mut buf, m.error.as_deref())?,
        RpcMessage::DisconnectRequest(m) => match &m.session_id {
            Some(id) => {
                buf.push(0x01);
                write_length_prefixed_string(&mut buf, id.as_str(), "session_id")?;
            }
            None => buf.push(0x00),
        },
        RpcMessage::DisconnectResponse(m) => write_optional_error(&mut buf, m.error.as_deref())?,
    }
    Ok(buf)
}

fn encode_connect_request(buf: &mut Vec<u8>, m: &ConnectRequest) -> Result<(), ProtocolError> {
    match &m.user_data {
        Some(data) => {
            if data.len() > MAX_PAYLOAD_LEN {
                return Err(ProtocolError::FieldTooLong {
                    field: "user_data",
                    len: data.len(),
                });
            }
            buf.push(0x01);
            buf.extend_from_slice(&(data.len() as u32).to_be_bytes());
            buf.extend_from_slice(data);
        }
        None => buf.push(0x00),
    }
    Ok(())
}

fn write_optional_error(buf: &mut Vec<u8>, error: Option<&str>) -> Result<(), ProtocolError> {
    match error {
        None => buf.push(0x00),
        Some(e) => {
            buf.push(0x01);
            write_length_prefixed_string(buf, e, "error")?;
        }
    }
    Ok(())
}

// ── Payload decoding ──────────────────────────────────────────────────────────

fn decode_payload(msg_type: MessageType, payload: &[u8]) -> Result<RpcMessage, ProtocolError> {
    let mut r = Reader::new(payload, msg_name(msg_type));
    let msg = match msg_type {
        MessageType::ConnectRequest => {
            let user_data = if r.read_presence()? {
                let len = r.read_u32()? as usize;
                Some(r.take(len)?.to_vec())
            } else {
                None
            };
            RpcMessage::ConnectRequest(ConnectRequest { user_data })
        }
        MessageType::ConnectResponse => {
            let tag = r.read_u8()?;
            let text = r.read_string()?;
            match tag {
                0x00 => RpcMessage::ConnectResponse(ConnectResponse::SessionId(SessionId::new(text))),
                0x01 => RpcMessage::ConnectResponse(ConnectResponse::Error(text)),
                other => {
                    return Err(ProtocolError::MalformedPayload(format!(
                        "unknown connect response tag: {other}"
                    )))
                }
            }
        }
        MessageType::Push => {
            let session_id = SessionId::new(r.read_string()?);
            let info = read_event_info(&mut r)?;
            RpcMessage::Push(Event { session_id, info })
        }
        MessageType::PushAck => RpcMessage::PushAck(PushAck {
            error: r.read_optional_error()?,
        }),
        MessageType::DisconnectRequest => {
            let session_id = if r.read_presence()? {
                Some(SessionId::new(r.read_string()?))
            } else {
                None
            };
            RpcMessage::DisconnectRequest(DisconnectRequest { session_id })
        }
        MessageType::DisconnectResponse => RpcMessage::DisconnectResponse(DisconnectResponse {
            error: r.read_optional_error()?,
        }),
    };
    r.finish()?;
    Ok(msg)
}

fn read_event_info(r: &mut Reader<'_>) -> Result<EventInfo, ProtocolError> {
    let tag = r.read_u8()?;
    if tag == 0x00 {
        return Err(ProtocolError::EmptyEventUnion);
    }
    let kind = EventKind::try_from(tag).map_err(|_| ProtocolError::UnknownEventKind(tag))?;
    let timestamp = r.read_u64()?;
    let window_id = r.read_u32()?;

    let info = match kind {
        EventKind::Keyboard => EventInfo::Keyboard(KeyboardEvent {
            timestamp,
            window_id,
            state: r.read_input_state()?,
            repeat: r.read_bool()?,
            key_code: r.read_u32()?,
        }),
        EventKind::MouseMotion => {
            let bits = r.read_u8()?;
            let state_mask = MouseButtonStateMask::from_bits(bits).ok_or_else(|| {
                ProtocolError::MalformedPayload(format!("reserved button mask bits set: 0x{bits:02X}"))
            })?;
            EventInfo::MouseMotion(MouseMotionEvent {
                timestamp,
                window_id,
                state_mask,
                x: r.read_i32()?,
                y: r.read_i32()?,
                relative_x: r.read_i32()?,
                relative_y: r.read_i32()?,
            })
        }
        EventKind::MouseButton => {
            let b = r.read_u8()?;
            let button = MouseButton::try_from(b)
                .map_err(|_| ProtocolError::MalformedPayload(format!("unknown mouse button: {b}")))?;
            EventInfo::MouseButton(MouseButtonEvent {
                timestamp,
                window_id,
                button,
                state: r.read_input_state()?,
                double_click: r.read_bool()?,
                x: r.read_i32()?,
                y: r.read_i32()?,
            })
        }
        EventKind::MouseWheel => EventInfo::MouseWheel(MouseWheelEvent {
            timestamp,
            window_id,
            x: r.read_i32()?,
            y: r.read_i32()?,
            precise_x: f32::from_bits(r.read_u32()?),
            precise_y: f32::from_bits(r.read_u32()?),
        }),
        EventKind::Window => {
            let t = r.read_u8()?;
            let event_type = WindowEventType::try_from(t)
                .map_err(|_| ProtocolError::MalformedPayload(format!("unknown window event: {t}")))?;
            EventInfo::Window(WindowEvent {
                timestamp,
                window_id,
                event_type,
                arg1: r.read_i32()?,
                arg2: r.read_i32()?,
            })
        }
    };
    Ok(info)
}

fn msg_name(msg_type: MessageType) -> &'static str {
    match msg_type {
        MessageType::ConnectRequest => "ConnectRequest",
        MessageType::ConnectResponse => "ConnectResponse",
        MessageType::Push => "Push",
        MessageType::PushAck => "PushAck",
        MessageType::DisconnectRequest => "DisconnectRequest",
        MessageType::DisconnectResponse => "DisconnectResponse",
    }
}

// ── Primitive helpers ─────────────────────────────────────────────────────────

fn write_bool(buf: &mut Vec<u8>, value: bool) {
    buf.push(if value { 0x01 } else { 0x00 });
}

fn write_length_prefixed_string(
    buf: &mut Vec<u8>,
    s: &str,
    field: &'static str,
) -> Result<(), ProtocolError> {
    let bytes = s.as_bytes();
    let len = u16::try_from(bytes.len()).map_err(|_| ProtocolError::FieldTooLong {
        field,
        len: bytes.len(),
    })?;
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(bytes);
    Ok(())
}

/// Bounds-checked cursor over a payload.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
    context: &'static str,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8], context: &'static str) -> Self {
        Self {
            buf,
            pos: 0,
            context,
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        let end = self.pos.checked_add(n).filter(|end| *end <= self.buf.len());
        match end {
            Some(end) => {
                let slice = &self.buf[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            None => Err(ProtocolError::MalformedPayload(format!(
                "{}: need {} more bytes at offset {}, have {}",
                self.context,
                n,
                self.pos,
                self.buf.len() - self.pos
            ))),
        }
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.take(1)?[0])
    }

    fn read_u32(&mut self) -> Result<u32, ProtocolError> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    fn read_i32(&mut self) -> Result<i32, ProtocolError> {
        Ok(i32::from_be_bytes(self.read_array()?))
    }

    fn read_u64(&mut self) -> Result<u64, ProtocolError> {
        Ok(u64::from_be_bytes(self.read_array()?))
    }

    fn read_bool(&mut self) -> Result<bool, ProtocolError> {
        match self.read_u8()? {
            0x00 => Ok(false),
            0x01 => Ok(true),
            other => Err(ProtocolError::MalformedPayload(format!(
                "{}: invalid bool byte {other}",
                self.context
            ))),
        }
    }

    /// Presence bytes use the same encoding as booleans.
    fn read_presence(&mut self) -> Result<bool, ProtocolError> {
        self.read_bool()
    }

    fn read_input_state(&mut self) -> Result<InputState, ProtocolError> {
        let b = self.read_u8()?;
        InputState::try_from(b).map_err(|_| {
            ProtocolError::MalformedPayload(format!("{}: unknown input state {b}", self.context))
        })
    }

    fn read_string(&mut self) -> Result<String, ProtocolError> {
        let len = u16::from_be_bytes(self.read_array()?) as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| {
            ProtocolError::MalformedPayload(format!("{}: invalid UTF-8: {e}", self.context))
        })
    }

    fn read_optional_error(&mut self) -> Result<Option<String>, ProtocolError> {
        match self.read_u8()? {
            0x00 => Ok(None),
            0x01 => Ok(Some(self.read_string()?)),
            other => Err(ProtocolError::MalformedPayload(format!(
                "{}: unknown status tag {other}",
                self.context
            ))),
        }
    }

    fn finish(&self) -> Result<(), ProtocolError> {
        if self.pos != self.buf.len() {
            return Err(ProtocolError::MalformedPayload(format!(
                "{}: {} trailing bytes",
                self.context,
                self.buf.len() - self.pos
            )));
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn keyboard_push() -> Frame {
        Frame::push(
            3,
            Event::new(
                SessionId::from("abc"),
                KeyboardEvent {
                    timestamp: 0x0102_0304_0506_0708,
                    window_id: 0xAABB_CCDD,
                    state: InputState::Pressed,
                    repeat: true,
                    key_code: 0x41,
                },
            ),
            true,
        )
    }

    #[test]
    fn test_header_layout_is_sixteen_bytes_big_endian() {
        // Arrange
        let frame = Frame::new(0x0102_0304_0506_0708, RpcMessage::PushAck(PushAck::ok()));

        // Act
        let bytes = encode_frame(&frame).unwrap();

        // Assert
        assert_eq!(bytes[0], PROTOCOL_VERSION);
        assert_eq!(bytes[1], MessageType::PushAck as u8);
        assert_eq!(bytes[2], 0x00, "no flags");
        assert_eq!(bytes[3], 0x00, "reserved");
        assert_eq!(&bytes[4..8], &1u32.to_be_bytes());
        assert_eq!(&bytes[8..16], &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(bytes.len(), HEADER_SIZE + 1);
    }

    #[test]
    fn test_keyboard_push_payload_layout() {
        // Arrange
        let bytes = encode_frame(&keyboard_push()).unwrap();
        let payload = &bytes[HEADER_SIZE..];

        // Assert – [len:2]["abc"][kind:1][ts:8][win:4][state:1][repeat:1][key:4]
        assert_eq!(&payload[0..2], &[0x00, 0x03]);
        assert_eq!(&payload[2..5], b"abc");
        assert_eq!(payload[5], EventKind::Keyboard as u8);
        assert_eq!(&payload[6..14], &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(&payload[14..18], &[0xAA, 0xBB, 0xCC, 0xDD]);
        assert_eq!(payload[18], InputState::Pressed as u8);
        assert_eq!(payload[19], 0x01);
        assert_eq!(&payload[20..24], &0x41u32.to_be_bytes());
        assert_eq!(payload.len(), 24);
    }

    #[test]
    fn test_decode_rejects_empty_event_union() {
        // Arrange – a push whose kind tag is zero
        let mut bytes = encode_frame(&keyboard_push()).unwrap();
        bytes[HEADER_SIZE + 5] = 0x00;

        // Act
        let result = decode_frame(&bytes);

        // Assert
        assert_eq!(result, Err(ProtocolError::EmptyEventUnion));
    }

    #[test]
    fn test_decode_rejects_unknown_event_kind() {
        let mut bytes = encode_frame(&keyboard_push()).unwrap();
        bytes[HEADER_SIZE + 5] = 0x09;
        assert_eq!(decode_frame(&bytes), Err(ProtocolError::UnknownEventKind(0x09)));
    }

    #[test]
    fn test_decode_reports_insufficient_data_for_partial_frame() {
        let bytes = encode_frame(&keyboard_push()).unwrap();
        let result = decode_frame(&bytes[..bytes.len() - 1]);
        assert!(matches!(result, Err(ProtocolError::InsufficientData { .. })));
    }

    #[test]
    fn test_decode_reports_insufficient_data_for_partial_header() {
        let result = decode_frame(&[PROTOCOL_VERSION, 0x01]);
        assert_eq!(
            result,
            Err(ProtocolError::InsufficientData {
                needed: HEADER_SIZE,
                available: 2
            })
        );
    }

    #[test]
    fn test_decode_rejects_unsupported_version() {
        let mut bytes = encode_frame(&keyboard_push()).unwrap();
        bytes[0] = 0x7F;
        assert_eq!(decode_frame(&bytes), Err(ProtocolError::UnsupportedVersion(0x7F)));
    }

    #[test]
    fn test_decode_rejects_unknown_message_type() {
        let mut bytes = encode_frame(&keyboard_push()).unwrap();
        bytes[1] = 0x55;
        assert_eq!(decode_frame(&bytes), Err(ProtocolError::UnknownMessageType(0x55)));
    }

    #[test]
    fn test_decode_rejects_oversized_payload_declaration() {
        let mut bytes = encode_frame(&keyboard_push()).unwrap();
        bytes[4..8].copy_from_slice(&u32::MAX.to_be_bytes());
        assert!(matches!(
            decode_frame(&bytes),
            Err(ProtocolError::PayloadTooLarge(_))
        ));
    }

    #[test]
    fn test_decode_rejects_trailing_payload_bytes() {
        // Arrange – append a byte to the payload and bump the declared length
        let mut bytes = encode_frame(&keyboard_push()).unwrap();
        bytes.push(0xFF);
        let len = (bytes.len() - HEADER_SIZE) as u32;
        bytes[4..8].copy_from_slice(&len.to_be_bytes());

        // Act / Assert
        assert!(matches!(
            decode_frame(&bytes),
            Err(ProtocolError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_decode_rejects_invalid_bool_byte() {
        let mut bytes = encode_frame(&keyboard_push()).unwrap();
        bytes[HEADER_SIZE + 19] = 0x02; // repeat flag
        assert!(matches!(
            decode_frame(&bytes),
            Err(ProtocolError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_decode_header_exposes_call_id_of_malformed_frame() {
        // Arrange
        let mut bytes = encode_frame(&keyboard_push()).unwrap();
        bytes[HEADER_SIZE + 5] = 0x00;

        // Act
        let header = decode_header(&bytes).unwrap();

        // Assert
        assert_eq!(header.call_id, 3);
        assert_eq!(header.message_type, MessageType::Push);
        assert!(decode_frame(&bytes).is_err());
    }

    #[test]
    fn test_encode_rejects_overlong_session_id() {
        let long = "x".repeat(u16::MAX as usize + 1);
        let frame = Frame::new(
            1,
            RpcMessage::ConnectResponse(ConnectResponse::SessionId(SessionId::new(long))),
        );
        assert!(matches!(
            encode_frame(&frame),
            Err(ProtocolError::FieldTooLong { field: "session_id", .. })
        ));
    }

    #[test]
    fn test_connect_request_absent_and_empty_credentials_encode_differently() {
        let absent = encode_frame(&Frame::new(
            1,
            RpcMessage::ConnectRequest(ConnectRequest::anonymous()),
        ))
        .unwrap();
        let empty = encode_frame(&Frame::new(
            1,
            RpcMessage::ConnectRequest(ConnectRequest::with_credential(&[])),
        ))
        .unwrap();

        assert_eq!(&absent[HEADER_SIZE..], &[0x00]);
        assert_eq!(&empty[HEADER_SIZE..], &[0x01, 0, 0, 0, 0]);
    }

    #[test]
    fn test_decode_event_info_reports_consumed_length() {
        // Arrange
        let info = EventInfo::MouseWheel(MouseWheelEvent::from_steps(1, 2, 3, 4));
        let mut buf = Vec::new();
        encode_event_info(&mut buf, &info);
        buf.extend_from_slice(&[0xEE, 0xEE]);

        // Act
        let (decoded, consumed) = decode_event_info(&buf).unwrap();

        // Assert – kind(1) + ts(8) + win(4) + x,y(8) + precise(8)
        assert_eq!(decoded, info);
        assert_eq!(consumed, 29);
    }
}
