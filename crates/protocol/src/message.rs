//! Zusammensetzen fragmentierter Nachrichten
//!
//! Eine Text-Nachricht kann ueber mehrere Frames verteilt sein: der erste
//! Frame traegt Opcode `Text`, alle weiteren `Continuation`, der letzte hat
//! FIN gesetzt. Kontroll-Frames duerfen dazwischen liegen und werden sofort
//! ausgeliefert, ohne die laufende Nachricht zu stoeren.

use bytes::{Bytes, BytesMut};

use crate::error::FrameError;
use crate::frame::{close_code, Frame, Opcode, MAX_CONTROL_PAYLOAD};

/// Ergebnis eines verarbeiteten Frames
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// Vollstaendige Text-Nachricht
    Text(String),
    /// Ping mit Payload (muss mit Pong beantwortet werden)
    Ping(Bytes),
    /// Pong mit Payload
    Pong(Bytes),
    /// Close-Frame mit optionalem Status-Code
    Close(Option<u16>),
}

/// Setzt Frames eines Clients zu Nachrichten zusammen
///
/// Ein Assembler gehoert genau einer Verbindung.
#[derive(Debug)]
pub struct MessageAssembler {
    max_message_size: usize,
    puffer: BytesMut,
    aktiv: bool,
}

impl MessageAssembler {
    pub fn new(max_message_size: usize) -> Self {
        Self {
            max_message_size,
            puffer: BytesMut::new(),
            aktiv: false,
        }
    }

    /// Laeuft gerade eine fragmentierte Nachricht?
    pub fn in_progress(&self) -> bool {
        self.aktiv
    }

    /// Verarbeitet einen dekodierten Frame
    ///
    /// Gibt `Ok(None)` zurueck solange eine fragmentierte Nachricht noch
    /// nicht vollstaendig ist.
    pub fn push(&mut self, frame: Frame) -> Result<Option<Incoming>, FrameError> {
        if frame.opcode.is_control() {
            return self.kontroll_frame(frame).map(Some);
        }

        match frame.opcode {
            // Ein weiterer Text-Frame waehrend einer laufenden Nachricht
            // wird wie eine Fortsetzung behandelt
            Opcode::Text => self.aktiv = true,
            Opcode::Continuation if !self.aktiv => {
                return Err(FrameError::protocol(
                    "Continuation-Frame ohne begonnene Nachricht",
                ));
            }
            Opcode::Continuation => {}
            Opcode::Binary => return Err(FrameError::Unsupported(Opcode::Binary)),
            andere => {
                return Err(FrameError::protocol(format!(
                    "reservierter Opcode {:#x}",
                    andere.bits()
                )));
            }
        }

        let neue_laenge = self.puffer.len() + frame.payload.len();
        if neue_laenge > self.max_message_size {
            self.zuruecksetzen();
            return Err(FrameError::TooLarge {
                laenge: neue_laenge as u64,
                maximum: self.max_message_size,
            });
        }
        self.puffer.extend_from_slice(&frame.payload);

        if !frame.fin {
            return Ok(None);
        }

        let daten = self.puffer.split().freeze();
        self.aktiv = false;
        let text = String::from_utf8(daten.to_vec()).map_err(|_| FrameError::InvalidUtf8)?;
        Ok(Some(Incoming::Text(text)))
    }

    fn kontroll_frame(&self, frame: Frame) -> Result<Incoming, FrameError> {
        if !frame.fin {
            return Err(FrameError::protocol("fragmentierter Kontroll-Frame"));
        }
        if frame.payload.len() > MAX_CONTROL_PAYLOAD {
            return Err(FrameError::protocol(format!(
                "Kontroll-Frame mit {} Bytes Payload",
                frame.payload.len()
            )));
        }

        match frame.opcode {
            Opcode::Close => close_pruefen(&frame).map(Incoming::Close),
            Opcode::Ping => Ok(Incoming::Ping(frame.payload)),
            Opcode::Pong => Ok(Incoming::Pong(frame.payload)),
            andere => Err(FrameError::protocol(format!(
                "reservierter Kontroll-Opcode {:#x}",
                andere.bits()
            ))),
        }
    }

    fn zuruecksetzen(&mut self) {
        self.puffer.clear();
        self.aktiv = false;
    }
}

/// Prueft die Payload eines Close-Frames: leer, oder Code plus UTF-8-Grund
fn close_pruefen(frame: &Frame) -> Result<Option<u16>, FrameError> {
    match frame.payload.len() {
        0 => Ok(None),
        1 => Err(FrameError::protocol("Close-Frame mit 1 Byte Payload")),
        _ => {
            let code = frame.close_code().filter(|c| close_code::ist_gueltig(*c));
            let Some(code) = code else {
                return Err(FrameError::protocol(format!(
                    "ungueltiger Close-Code {:?}",
                    frame.close_code()
                )));
            };
            std::str::from_utf8(&frame.payload[2..]).map_err(|_| FrameError::InvalidUtf8)?;
            Ok(Some(code))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
