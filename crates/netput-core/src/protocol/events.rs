//! Input event types carried inside a `Push` envelope.
//!
//! Field types are fixed by the wire format: timestamps are `u64`, window ids
//! and key codes are `u32`, coordinates are `i32`, and precise wheel deltas
//! are `f32`.  They are passed through the codec without any conversion.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Session identifier ────────────────────────────────────────────────────────

/// Opaque, server-issued session identifier.
///
/// The server generates these as hyphenated UUID v4 strings, but an
/// authenticator may also name a session explicitly, so the type does not
/// assume any particular format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Wraps an existing identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().hyphenated().to_string())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the identifier is the empty string.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consumes the identifier and returns the inner string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// ── Shared enumerations ───────────────────────────────────────────────────────

/// Pressed/released state of a key or button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum InputState {
    Pressed = 0x01,
    #[default]
    Released = 0x02,
}

impl InputState {
    /// Returns `true` for [`InputState::Pressed`].
    pub fn is_pressed(self) -> bool {
        matches!(self, InputState::Pressed)
    }
}

impl From<bool> for InputState {
    fn from(pressed: bool) -> Self {
        if pressed {
            InputState::Pressed
        } else {
            InputState::Released
        }
    }
}

impl TryFrom<u8> for InputState {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(InputState::Pressed),
            0x02 => Ok(InputState::Released),
            _ => Err(()),
        }
    }
}

/// Mouse button identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MouseButton {
    Left = 0x01,
    Middle = 0x02,
    Right = 0x03,
    X1 = 0x04,
    X2 = 0x05,
}

impl TryFrom<u8> for MouseButton {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(MouseButton::Left),
            0x02 => Ok(MouseButton::Middle),
            0x03 => Ok(MouseButton::Right),
            0x04 => Ok(MouseButton::X1),
            0x05 => Ok(MouseButton::X2),
            _ => Err(()),
        }
    }
}

/// State of all five mouse buttons at the time of a motion event.
///
/// On the wire this is a single byte: bit 0 = left, bit 1 = middle,
/// bit 2 = right, bit 3 = x1, bit 4 = x2.  A set bit means pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MouseButtonStateMask {
    pub left: InputState,
    pub middle: InputState,
    pub right: InputState,
    pub x1: InputState,
    pub x2: InputState,
}

impl MouseButtonStateMask {
    pub const LEFT: u8 = 1 << 0;
    pub const MIDDLE: u8 = 1 << 1;
    pub const RIGHT: u8 = 1 << 2;
    pub const X1: u8 = 1 << 3;
    pub const X2: u8 = 1 << 4;

    /// Bits that must be zero in a valid mask byte.
    pub const RESERVED: u8 = !(Self::LEFT | Self::MIDDLE | Self::RIGHT | Self::X1 | Self::X2);

    /// Packs the mask into its wire byte.
    pub fn to_bits(self) -> u8 {
        let mut bits = 0;
        for (state, bit) in [
            (self.left, Self::LEFT),
            (self.middle, Self::MIDDLE),
            (self.right, Self::RIGHT),
            (self.x1, Self::X1),
            (self.x2, Self::X2),
        ] {
            if state.is_pressed() {
                bits |= bit;
            }
        }
        bits
    }

    /// Unpacks a wire byte, returning `None` if any reserved bit is set.
    pub fn from_bits(bits: u8) -> Option<Self> {
        if bits & Self::RESERVED != 0 {
            return None;
        }
        Some(Self {
            left: (bits & Self::LEFT != 0).into(),
            middle: (bits & Self::MIDDLE != 0).into(),
            right: (bits & Self::RIGHT != 0).into(),
            x1: (bits & Self::X1 != 0).into(),
            x2: (bits & Self::X2 != 0).into(),
        })
    }

    /// Returns the state of a single button.
    pub fn get(&self, button: MouseButton) -> InputState {
        match button {
            MouseButton::Left => self.left,
            MouseButton::Middle => self.middle,
            MouseButton::Right => self.right,
            MouseButton::X1 => self.x1,
            MouseButton::X2 => self.x2,
        }
    }
}

/// Window state change reported by a [`WindowEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum WindowEventType {
    Shown = 0x01,
    Hidden = 0x02,
    Exposed = 0x03,
    Moved = 0x04,
    Resized = 0x05,
    Minimized = 0x06,
    Maximized = 0x07,
    Restored = 0x08,
    MouseEnter = 0x09,
    MouseLeave = 0x0A,
    FocusGained = 0x0B,
    FocusLost = 0x0C,
}

impl WindowEventType {
    /// All window event types in wire order.
    pub const ALL: [WindowEventType; 12] = [
        WindowEventType::Shown,
        WindowEventType::Hidden,
        WindowEventType::Exposed,
        WindowEventType::Moved,
        WindowEventType::Resized,
        WindowEventType::Minimized,
        WindowEventType::Maximized,
        WindowEventType::Restored,
        WindowEventType::MouseEnter,
        WindowEventType::MouseLeave,
        WindowEventType::FocusGained,
        WindowEventType::FocusLost,
    ];
}

impl TryFrom<u8> for WindowEventType {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01..=0x0C => Ok(Self::ALL[usize::from(value - 1)]),
            _ => Err(()),
        }
    }
}

// ── Per-kind payloads ─────────────────────────────────────────────────────────

/// Key press or release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyboardEvent {
    pub timestamp: u64,
    pub window_id: u32,
    pub state: InputState,
    /// Set when the event was generated by key auto-repeat.
    pub repeat: bool,
    pub key_code: u32,
}

/// Cursor motion with the button state at the time of the move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MouseMotionEvent {
    pub timestamp: u64,
    pub window_id: u32,
    pub state_mask: MouseButtonStateMask,
    pub x: i32,
    pub y: i32,
    pub relative_x: i32,
    pub relative_y: i32,
}

/// Mouse button press or release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MouseButtonEvent {
    pub timestamp: u64,
    pub window_id: u32,
    pub button: MouseButton,
    pub state: InputState,
    pub double_click: bool,
    pub x: i32,
    pub y: i32,
}

/// Mouse wheel scroll.
///
/// `PartialEq` compares the precise deltas by bit pattern so that a decoded
/// event always equals the event that was encoded, NaN included.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MouseWheelEvent {
    pub timestamp: u64,
    pub window_id: u32,
    pub x: i32,
    pub y: i32,
    pub precise_x: f32,
    pub precise_y: f32,
}

impl MouseWheelEvent {
    /// Builds a wheel event for devices that only report whole steps.
    ///
    /// The precise deltas are cast from the integer ones so both
    /// representations agree.
    pub fn from_steps(timestamp: u64, window_id: u32, x: i32, y: i32) -> Self {
        Self {
            timestamp,
            window_id,
            x,
            y,
            precise_x: x as f32,
            precise_y: y as f32,
        }
    }
}

impl PartialEq for MouseWheelEvent {
    fn eq(&self, other: &Self) -> bool {
        self.timestamp == other.timestamp
            && self.window_id == other.window_id
            && self.x == other.x
            && self.y == other.y
            && self.precise_x.to_bits() == other.precise_x.to_bits()
            && self.precise_y.to_bits() == other.precise_y.to_bits()
    }
}

/// Window state change.  The meaning of `arg1`/`arg2` depends on `event_type`
/// (position for `Moved`, size for `Resized`, unused otherwise).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowEvent {
    pub timestamp: u64,
    pub window_id: u32,
    pub event_type: WindowEventType,
    pub arg1: i32,
    pub arg2: i32,
}

// ── Tagged union ──────────────────────────────────────────────────────────────

/// Discriminant of [`EventInfo`], also used as the wire tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventKind {
    Keyboard = 0x01,
    MouseMotion = 0x02,
    MouseButton = 0x03,
    MouseWheel = 0x04,
    Window = 0x05,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::Keyboard,
        EventKind::MouseMotion,
        EventKind::MouseButton,
        EventKind::MouseWheel,
        EventKind::Window,
    ];
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Keyboard => "keyboard",
            EventKind::MouseMotion => "mouse-motion",
            EventKind::MouseButton => "mouse-button",
            EventKind::MouseWheel => "mouse-wheel",
            EventKind::Window => "window",
        };
        f.write_str(name)
    }
}

impl TryFrom<u8> for EventKind {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01..=0x05 => Ok(Self::ALL[usize::from(value - 1)]),
            _ => Err(()),
        }
    }
}

/// One input event of exactly one kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EventInfo {
    Keyboard(KeyboardEvent),
    MouseMotion(MouseMotionEvent),
    MouseButton(MouseButtonEvent),
    MouseWheel(MouseWheelEvent),
    Window(WindowEvent),
}

impl EventInfo {
    /// Returns the kind discriminant.
    pub fn kind(&self) -> EventKind {
        match self {
            EventInfo::Keyboard(_) => EventKind::Keyboard,
            EventInfo::MouseMotion(_) => EventKind::MouseMotion,
            EventInfo::MouseButton(_) => EventKind::MouseButton,
            EventInfo::MouseWheel(_) => EventKind::MouseWheel,
            EventInfo::Window(_) => EventKind::Window,
        }
    }

    /// Timestamp shared by every kind.
    pub fn timestamp(&self) -> u64 {
        match self {
            EventInfo::Keyboard(e) => e.timestamp,
            EventInfo::MouseMotion(e) => e.timestamp,
            EventInfo::MouseButton(e) => e.timestamp,
            EventInfo::MouseWheel(e) => e.timestamp,
            EventInfo::Window(e) => e.timestamp,
        }
    }

    /// Window id shared by every kind.
    pub fn window_id(&self) -> u32 {
        match self {
            EventInfo::Keyboard(e) => e.window_id,
            EventInfo::MouseMotion(e) => e.window_id,
            EventInfo::MouseButton(e) => e.window_id,
            EventInfo::MouseWheel(e) => e.window_id,
            EventInfo::Window(e) => e.window_id,
        }
    }
}

impl From<KeyboardEvent> for EventInfo {
    fn from(e: KeyboardEvent) -> Self {
        EventInfo::Keyboard(e)
    }
}

impl From<MouseMotionEvent> for EventInfo {
    fn from(e: MouseMotionEvent) -> Self {
        EventInfo::MouseMotion(e)
    }
}

impl From<MouseButtonEvent> for EventInfo {
    fn from(e: MouseButtonEvent) -> Self {
        EventInfo::MouseButton(e)
    }
}

impl From<MouseWheelEvent> for EventInfo {
    fn from(e: MouseWheelEvent) -> Self {
        EventInfo::MouseWheel(e)
    }
}

impl From<WindowEvent> for EventInfo {
    fn from(e: WindowEvent) -> Self {
        EventInfo::Window(e)
    }
}

/// An event envelope: one event plus the session it was sent under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub session_id: SessionId,
    pub info: EventInfo,
}

impl Event {
    pub fn new(session_id: SessionId, info: impl Into<EventInfo>) -> Self {
        Self {
            session_id,
            info: info.into(),
        }
    }

    pub fn kind(&self) -> EventKind {
        self.info.kind()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_session_ids_are_distinct_uuids() {
        // Arrange / Act
        let a = SessionId::generate();
        let b = SessionId::generate();

        // Assert
        assert_ne!(a, b);
        assert!(Uuid::parse_str(a.as_str()).is_ok());
        assert_eq!(a.as_str().len(), 36, "hyphenated UUID is 36 characters");
    }

    #[test]
    fn test_state_mask_bits_match_each_button() {
        for (button, bit) in [
            (MouseButton::Left, MouseButtonStateMask::LEFT),
            (MouseButton::Middle, MouseButtonStateMask::MIDDLE),
            (MouseButton::Right, MouseButtonStateMask::RIGHT),
            (MouseButton::X1, MouseButtonStateMask::X1),
            (MouseButton::X2, MouseButtonStateMask::X2),
        ] {
            let mask = MouseButtonStateMask::from_bits(bit).unwrap();
            assert_eq!(mask.get(button), InputState::Pressed);
            assert_eq!(mask.to_bits(), bit);
        }
    }

    #[test]
    fn test_state_mask_rejects_reserved_bits() {
        assert!(MouseButtonStateMask::from_bits(0b0010_0000).is_none());
        assert!(MouseButtonStateMask::from_bits(0xFF).is_none());
    }

    #[test]
    fn test_default_state_mask_is_all_released() {
        let mask = MouseButtonStateMask::default();
        assert_eq!(mask.to_bits(), 0);
    }

    #[test]
    fn test_window_event_type_covers_twelve_values() {
        for (i, ty) in WindowEventType::ALL.iter().enumerate() {
            assert_eq!(*ty as u8, (i + 1) as u8);
            assert_eq!(WindowEventType::try_from(*ty as u8), Ok(*ty));
        }
        assert!(WindowEventType::try_from(0x00).is_err());
        assert!(WindowEventType::try_from(0x0D).is_err());
    }

    #[test]
    fn test_wheel_from_steps_casts_precise_from_integer() {
        // Arrange / Act
        let wheel = MouseWheelEvent::from_steps(10, 2, -3, 7);

        // Assert
        assert_eq!(wheel.precise_x, -3.0);
        assert_eq!(wheel.precise_y, 7.0);
    }

    #[test]
    fn test_wheel_equality_is_bitwise_for_nan() {
        let mut a = MouseWheelEvent::from_steps(0, 0, 0, 0);
        a.precise_x = f32::NAN;
        let b = a;
        assert_eq!(a, b);
    }

    #[test]
    fn test_event_kind_matches_variant() {
        let info = EventInfo::from(WindowEvent {
            timestamp: 1,
            window_id: 9,
            event_type: WindowEventType::Moved,
            arg1: 10,
            arg2: 20,
        });
        assert_eq!(info.kind(), EventKind::Window);
        assert_eq!(info.window_id(), 9);
        assert_eq!(info.timestamp(), 1);
    }
}
