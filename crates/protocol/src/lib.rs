//! livelink-protocol – WebSocket-Protokoll (RFC 6455)
//!
//! Dieses Crate enthaelt alles, was ohne Server-Zustand auskommt:
//! Frame-Format und Codec, den HTTP-Upgrade-Handshake und das Zusammensetzen
//! fragmentierter Nachrichten.

pub mod error;
pub mod frame;
pub mod handshake;
pub mod message;
pub mod wire;

pub use error::FrameError;
pub use frame::{close_code, Frame, Opcode};
pub use handshake::{HandshakeError, HandshakeRequest};
pub use message::{Incoming, MessageAssembler};
pub use wire::{read_frame, write_frame, WebSocketCodec, DEFAULT_MAX_FRAME_SIZE};
