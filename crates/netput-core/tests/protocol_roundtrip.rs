//! Integration tests for the netput-core codec.
//!
//! Each event kind is pushed through the public frame codec with edge values
//! (zero, extremes, negative coordinates, non-finite floats) and must come
//! back field-for-field identical.

use netput_core::{
    decode_frame, encode_frame,
    protocol::{
        messages::{
            ConnectRequest, ConnectResponse, DisconnectRequest, DisconnectResponse, PushAck,
        },
        CallIdCounter, Credential, Event, EventInfo, Frame, InputState, KeyboardEvent,
        MouseButton, MouseButtonEvent, MouseButtonStateMask, MouseMotionEvent, MouseWheelEvent,
        RpcMessage, SessionId, Usage, WindowEvent, WindowEventType,
    },
};

/// Encodes a frame and decodes it back, asserting every byte was consumed.
fn roundtrip(frame: Frame) -> Frame {
    let bytes = encode_frame(&frame).expect("encode must succeed");
    let (decoded, consumed) = decode_frame(&bytes).expect("decode must succeed");
    assert_eq!(consumed, bytes.len(), "all bytes must be consumed");
    decoded
}

fn push(info: impl Into<EventInfo>) -> Frame {
    Frame::push(
        9,
        Event::new(SessionId::from("6f1d2c3e-session"), info),
        false,
    )
}

#[test]
fn test_roundtrip_keyboard_event_with_extreme_values() {
    let original = push(KeyboardEvent {
        timestamp: u64::MAX,
        window_id: u32::MAX,
        state: InputState::Released,
        repeat: true,
        key_code: u32::MAX,
    });

    assert_eq!(original, roundtrip(original.clone()));
}

#[test]
fn test_roundtrip_mouse_motion_event_with_negative_coordinates() {
    let original = push(MouseMotionEvent {
        timestamp: 1,
        window_id: 0,
        state_mask: MouseButtonStateMask {
            left: InputState::Pressed,
            middle: InputState::Released,
            right: InputState::Pressed,
            x1: InputState::Released,
            x2: InputState::Pressed,
        },
        x: i32::MIN,
        y: i32::MAX,
        relative_x: -1,
        relative_y: -32_768,
    });

    assert_eq!(original, roundtrip(original.clone()));
}

#[test]
fn test_roundtrip_mouse_button_event_for_every_button() {
    for button in [
        MouseButton::Left,
        MouseButton::Middle,
        MouseButton::Right,
        MouseButton::X1,
        MouseButton::X2,
    ] {
        let original = push(MouseButtonEvent {
            timestamp: 1_700_000_000_000,
            window_id: 7,
            button,
            state: InputState::Pressed,
            double_click: button == MouseButton::Left,
            x: -5,
            y: 5,
        });

        assert_eq!(original, roundtrip(original.clone()), "button {button:?}");
    }
}

#[test]
fn test_roundtrip_mouse_wheel_preserves_float_bit_patterns() {
    // Arrange – NaN is never equal to itself, so compare bit patterns
    let original = MouseWheelEvent {
        timestamp: 42,
        window_id: 3,
        x: 0,
        y: -1,
        precise_x: f32::NAN,
        precise_y: -0.0,
    };

    // Act
    let decoded = roundtrip(push(original));

    // Assert
    match decoded.message {
        RpcMessage::Push(Event {
            info: EventInfo::MouseWheel(w),
            ..
        }) => {
            assert_eq!(w.precise_x.to_bits(), original.precise_x.to_bits());
            assert_eq!(w.precise_y.to_bits(), original.precise_y.to_bits());
            assert_eq!((w.x, w.y), (0, -1));
        }
        other => panic!("expected a mouse wheel push, got {other:?}"),
    }
}

#[test]
fn test_roundtrip_window_event_for_every_window_event_type() {
    for event_type in WindowEventType::ALL {
        let original = push(WindowEvent {
            timestamp: 5,
            window_id: 6,
            event_type,
            arg1: 1920,
            arg2: -1080,
        });

        assert_eq!(original, roundtrip(original.clone()), "{event_type:?}");
    }
}

#[test]
fn test_roundtrip_handshake_messages() {
    let credential = Credential::new(Usage::Ping, "valid-netput-password").encode();
    let frames = [
        Frame::new(1, RpcMessage::ConnectRequest(ConnectRequest::with_credential(&credential))),
        Frame::new(2, RpcMessage::ConnectRequest(ConnectRequest::anonymous())),
        Frame::new(
            3,
            RpcMessage::ConnectResponse(ConnectResponse::SessionId(SessionId::generate())),
        ),
        Frame::new(
            4,
            RpcMessage::ConnectResponse(ConnectResponse::Error("invalid password".into())),
        ),
        Frame::new(
            5,
            RpcMessage::DisconnectRequest(DisconnectRequest::new(SessionId::from("ping-session-id"))),
        ),
        Frame::new(6, RpcMessage::DisconnectRequest(DisconnectRequest::default())),
        Frame::new(7, RpcMessage::DisconnectResponse(DisconnectResponse::error("unknown session"))),
        Frame::new(8, RpcMessage::PushAck(PushAck::error("no handler for keyboard events"))),
    ];

    for original in frames {
        assert_eq!(original, roundtrip(original.clone()));
    }
}

#[test]
fn test_stream_of_frames_decodes_in_sequence() {
    // Arrange – three frames back to back, as a TCP reader would see them
    let ids = CallIdCounter::new();
    let frames: Vec<Frame> = vec![
        Frame::new(ids.next(), RpcMessage::ConnectRequest(ConnectRequest::anonymous())),
        Frame::push(
            ids.next(),
            Event::new(SessionId::from("s"), MouseWheelEvent::from_steps(1, 2, 0, 3)),
            true,
        ),
        Frame::new(ids.next(), RpcMessage::DisconnectRequest(DisconnectRequest::default())),
    ];
    let mut stream = Vec::new();
    for f in &frames {
        stream.extend(encode_frame(f).unwrap());
    }

    // Act
    let mut decoded = Vec::new();
    let mut offset = 0;
    while offset < stream.len() {
        let (frame, consumed) = decode_frame(&stream[offset..]).unwrap();
        decoded.push(frame);
        offset += consumed;
    }

    // Assert
    assert_eq!(decoded, frames);
    assert_eq!(decoded.iter().map(|f| f.call_id).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert!(decoded[1].ack_requested());
}
