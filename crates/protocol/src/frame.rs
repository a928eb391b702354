//! WebSocket-Frames (RFC 6455, Abschnitt 5.2)
//!
//! ## Frame-Format
//!
//! ```text
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| Opcode|M| Laenge (7)  | Erweiterte Laenge (16/64 BE)  |
//! |I|S|S|S|  (4)  |A|             | nur bei Laenge == 126/127     |
//! |N|V|V|V|       |S|             |                               |
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! | Masken-Schluessel (4 Bytes, nur bei MASK = 1)                 |
//! +---------------------------------------------------------------+
//! | Payload                                                       |
//! +---------------------------------------------------------------+
//! ```
//!
//! Frames vom Client sind maskiert, Frames vom Server nie.

use bytes::Bytes;

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// FIN-Bit im ersten Header-Byte
pub const FIN_BIT: u8 = 0x80;

/// Opcode-Bits im ersten Header-Byte
pub const OPCODE_MASK: u8 = 0x0F;

/// MASK-Bit im zweiten Header-Byte
pub const MASK_BIT: u8 = 0x80;

/// 7-Bit-Laengenfeld im zweiten Header-Byte
pub const LENGTH_MASK: u8 = 0x7F;

/// Marker fuer eine 16-Bit-Laenge
pub const LENGTH_16_MARKER: u8 = 126;

/// Marker fuer eine 64-Bit-Laenge
pub const LENGTH_64_MARKER: u8 = 127;

/// Maximale Payload eines Kontroll-Frames (Close, Ping, Pong)
pub const MAX_CONTROL_PAYLOAD: usize = 125;

/// Close-Status-Codes (RFC 6455, Abschnitt 7.4.1)
pub mod close_code {
    /// Normale Beendigung
    pub const NORMAL: u16 = 1000;
    /// Endpunkt geht weg (Server-Stopp)
    pub const GOING_AWAY: u16 = 1001;
    /// Protokollverletzung
    pub const PROTOCOL_ERROR: u16 = 1002;
    /// Datentyp wird nicht unterstuetzt (z.B. Binaer-Frames)
    pub const UNSUPPORTED_DATA: u16 = 1003;
    /// Payload passt nicht zum Nachrichtentyp (kein gueltiges UTF-8)
    pub const INVALID_PAYLOAD: u16 = 1007;
    /// Nachricht zu gross
    pub const MESSAGE_TOO_BIG: u16 = 1009;

    /// Darf dieser Code in einem empfangenen Close-Frame stehen?
    ///
    /// 1004 ist reserviert, 1005, 1006 und 1015 sind nur fuer lokale
    /// Meldungen und duerfen nie auf der Leitung stehen.
    pub fn ist_gueltig(code: u16) -> bool {
        matches!(code, 1000..=1003 | 1007..=1014 | 3000..=4999)
    }
}

// ---------------------------------------------------------------------------
// Opcode
// ---------------------------------------------------------------------------

/// Frame-Opcode
///
/// Der Decoder akzeptiert jeden 4-Bit-Wert; unbekannte Werte landen in
/// `Reserved` und werden erst bei der Nachrichten-Verarbeitung bewertet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// 0x0 – Fortsetzung einer fragmentierten Nachricht
    Continuation,
    /// 0x1 – Text (UTF-8)
    Text,
    /// 0x2 – Binaerdaten
    Binary,
    /// 0x8 – Verbindung schliessen
    Close,
    /// 0x9 – Ping
    Ping,
    /// 0xA – Pong
    Pong,
    /// 0x3–0x7, 0xB–0xF
    Reserved(u8),
}

impl Opcode {
    /// Liest den Opcode aus den unteren 4 Bits
    pub fn from_bits(bits: u8) -> Self {
        match bits & OPCODE_MASK {
            0x0 => Opcode::Continuation,
            0x1 => Opcode::Text,
            0x2 => Opcode::Binary,
            0x8 => Opcode::Close,
            0x9 => Opcode::Ping,
            0xA => Opcode::Pong,
            andere => Opcode::Reserved(andere),
        }
    }

    /// Gibt den 4-Bit-Wert zurueck
    pub fn bits(self) -> u8 {
        match self {
            Opcode::Continuation => 0x0,
            Opcode::Text => 0x1,
            Opcode::Binary => 0x2,
            Opcode::Close => 0x8,
            Opcode::Ping => 0x9,
            Opcode::Pong => 0xA,
            Opcode::Reserved(bits) => bits & OPCODE_MASK,
        }
    }

    /// Kontroll-Frames haben das hoechste Opcode-Bit gesetzt
    pub fn is_control(self) -> bool {
        self.bits() & 0x08 != 0
    }
}

// ---------------------------------------------------------------------------
// Laengenfeld
// ---------------------------------------------------------------------------

/// Kodierung der Payload-Laenge
///
/// Es wird immer die kleinste Form gewaehlt, die die Laenge darstellen kann.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthField {
    /// 0–125: Laenge direkt im 7-Bit-Feld
    Short(u8),
    /// 126–65535: Marker 126 + 2 Bytes
    Extended16(u16),
    /// ab 65536: Marker 127 + 8 Bytes
    Extended64(u64),
}

impl LengthField {
    /// Waehlt die Kodierung fuer eine Payload-Laenge
    pub fn for_len(len: usize) -> Self {
        if len < LENGTH_16_MARKER as usize {
            LengthField::Short(len as u8)
        } else if len <= u16::MAX as usize {
            LengthField::Extended16(len as u16)
        } else {
            LengthField::Extended64(len as u64)
        }
    }

    /// Wert des 7-Bit-Felds im zweiten Header-Byte
    pub fn marker(self) -> u8 {
        match self {
            LengthField::Short(n) => n,
            LengthField::Extended16(_) => LENGTH_16_MARKER,
            LengthField::Extended64(_) => LENGTH_64_MARKER,
        }
    }

    /// Anzahl der Bytes nach dem 2-Byte-Header
    pub fn extra_bytes(self) -> usize {
        match self {
            LengthField::Short(_) => 0,
            LengthField::Extended16(_) => 2,
            LengthField::Extended64(_) => 8,
        }
    }
}

// ---------------------------------------------------------------------------
// Maskierung
// ---------------------------------------------------------------------------

/// XOR-Maskierung mit zyklischem 4-Byte-Schluessel
///
/// Die Operation ist ihre eigene Umkehrung: zweimal angewendet ergibt sie
/// wieder die Originaldaten.
pub fn apply_mask(payload: &mut [u8], key: [u8; 4]) {
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte ^= key[i % 4];
    }
}

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// Ein einzelner WebSocket-Frame
///
/// `payload` ist immer unmaskiert. `mask` haelt den Schluessel, mit dem der
/// Frame auf der Leitung maskiert war bzw. beim Kodieren maskiert wird.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub fin: bool,
    pub opcode: Opcode,
    pub mask: Option<[u8; 4]>,
    pub payload: Bytes,
}

impl Frame {
    /// Erstellt einen unfragmentierten, unmaskierten Frame
    pub fn new(opcode: Opcode, payload: impl Into<Bytes>) -> Self {
        Self {
            fin: true,
            opcode,
            mask: None,
            payload: payload.into(),
        }
    }

    /// Text-Frame (FIN=1, Opcode 0x1)
    pub fn text(text: &str) -> Self {
        Self::new(Opcode::Text, Bytes::copy_from_slice(text.as_bytes()))
    }

    /// Close-Frame mit Status-Code und optionalem Grund
    pub fn close(code: u16, grund: &str) -> Self {
        let mut payload = Vec::with_capacity(2 + grund.len());
        payload.extend_from_slice(&code.to_be_bytes());
        payload.extend_from_slice(grund.as_bytes());
        // Kontroll-Frames duerfen hoechstens 125 Bytes tragen
        payload.truncate(MAX_CONTROL_PAYLOAD);
        Self::new(Opcode::Close, payload)
    }

    /// Ping-Frame
    pub fn ping(payload: impl Into<Bytes>) -> Self {
        Self::new(Opcode::Ping, payload)
    }

    /// Pong-Frame (Antwort auf Ping mit identischer Payload)
    pub fn pong(payload: impl Into<Bytes>) -> Self {
        Self::new(Opcode::Pong, payload)
    }

    /// Setzt das FIN-Bit
    pub fn with_fin(mut self, fin: bool) -> Self {
        self.fin = fin;
        self
    }

    /// Maskiert den Frame beim Kodieren (Client-Richtung)
    pub fn with_mask(mut self, key: [u8; 4]) -> Self {
        self.mask = Some(key);
        self
    }

    /// Status-Code eines Close-Frames, falls vorhanden
    pub fn close_code(&self) -> Option<u16> {
        if self.opcode != Opcode::Close || self.payload.len() < 2 {
            return None;
        }
        Some(u16::from_be_bytes([self.payload[0], self.payload[1]]))
    }

    /// Laenge des kodierten Frames in Bytes
    pub fn encoded_len(&self) -> usize {
        let laenge = LengthField::for_len(self.payload.len());
        let maske = if self.mask.is_some() { 4 } else { 0 };
        2 + laenge.extra_bytes() + maske + self.payload.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
