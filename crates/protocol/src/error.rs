//! Fehlertypen fuer Frame-Kodierung und Nachrichten-Verarbeitung

use std::io;
use thiserror::Error;

use crate::frame::{close_code, Opcode};

/// Fehler beim Lesen, Schreiben oder Zusammensetzen von Frames
///
/// Jeder Fehler ausser `Io` beendet die Verbindung mit einem Close-Frame;
/// den passenden Status-Code liefert [`FrameError::close_code`].
#[derive(Debug, Error)]
pub enum FrameError {
    /// IO-Fehler (Socket, unvollstaendiger Frame bei EOF)
    #[error("IO-Fehler: {0}")]
    Io(#[from] io::Error),

    /// Frame oder zusammengesetzte Nachricht ueberschreitet das Limit
    #[error("Frame zu gross: {laenge} Bytes (Maximum: {maximum} Bytes)")]
    TooLarge { laenge: u64, maximum: usize },

    /// Protokollverletzung (falsche Fragmentierung, ungueltiger Kontroll-Frame)
    #[error("Protokollfehler: {0}")]
    Protocol(String),

    /// Datentyp wird nicht unterstuetzt
    #[error("Nicht unterstuetzter Opcode: {0:?}")]
    Unsupported(Opcode),

    /// Text-Nachricht ist kein gueltiges UTF-8
    #[error("Text-Nachricht ist kein gueltiges UTF-8")]
    InvalidUtf8,
}

impl FrameError {
    /// Erstellt einen Protokollfehler
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Close-Code fuer die Antwort an den Peer
    ///
    /// `None` bei IO-Fehlern: der Socket ist dann nicht mehr benutzbar.
    pub fn close_code(&self) -> Option<u16> {
        match self {
            FrameError::Io(_) => None,
            FrameError::TooLarge { .. } => Some(close_code::MESSAGE_TOO_BIG),
            FrameError::Protocol(_) => Some(close_code::PROTOCOL_ERROR),
            FrameError::Unsupported(_) => Some(close_code::UNSUPPORTED_DATA),
            FrameError::InvalidUtf8 => Some(close_code::INVALID_PAYLOAD),
        }
    }
}
