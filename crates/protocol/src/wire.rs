//! Wire-Format fuer WebSocket-Verbindungen
//!
//! `WebSocketCodec` zerlegt den Byte-Strom eines Sockets in [`Frame`]s und
//! kodiert ausgehende Frames. Eingehende Payloads werden beim Dekodieren
//! demaskiert, ausgehende nur maskiert wenn `Frame::mask` gesetzt ist.
//!
//! Maximale Frame-Groesse ist konfigurierbar (Standard: 16 MB). Ein zu
//! grosses Laengenfeld wird abgelehnt bevor Payload-Speicher belegt wird.

use bytes::{Buf, BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::FrameError;
use crate::frame::{
    apply_mask, Frame, LengthField, Opcode, FIN_BIT, LENGTH_16_MARKER, LENGTH_64_MARKER,
    LENGTH_MASK, MASK_BIT, OPCODE_MASK,
};

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Standard-maximale Frame-Groesse (16 MB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Groesse des festen Headers in Bytes
pub const HEADER_SIZE: usize = 2;

/// Groesse des Masken-Schluessels in Bytes
pub const MASK_KEY_SIZE: usize = 4;

// ---------------------------------------------------------------------------
// WebSocketCodec
// ---------------------------------------------------------------------------

/// tokio-util Codec fuer WebSocket-Frames
///
/// Implementiert `Encoder<Frame>` und `Decoder` fuer die Verwendung mit
/// `tokio_util::codec::{FramedRead, FramedWrite}`.
///
/// # Beispiel
///
/// ```rust,no_run
/// use tokio_util::codec::FramedRead;
/// use livelink_protocol::wire::WebSocketCodec;
///
/// // let (lesen, _schreiben) = stream.into_split();
/// // let frames = FramedRead::new(lesen, WebSocketCodec::new());
/// ```
#[derive(Debug, Clone)]
pub struct WebSocketCodec {
    /// Maximale Payload-Groesse eingehender Frames in Bytes
    max_frame_size: usize,
}

impl WebSocketCodec {
    /// Erstellt einen neuen `WebSocketCodec` mit Standard-Limits
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Erstellt einen `WebSocketCodec` mit benutzerdefinierter maximaler Frame-Groesse
    pub fn with_max_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    /// Gibt die konfigurierte maximale Frame-Groesse zurueck
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Default for WebSocketCodec {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Decoder-Implementierung
// ---------------------------------------------------------------------------

impl Decoder for WebSocketCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < HEADER_SIZE {
            return Ok(None);
        }

        let fin = src[0] & FIN_BIT != 0;
        let opcode = Opcode::from_bits(src[0] & OPCODE_MASK);
        let maskiert = src[1] & MASK_BIT != 0;

        // Laengenfeld lesen ohne den Buffer zu veraendern
        let (laenge, header_laenge) = match src[1] & LENGTH_MASK {
            LENGTH_16_MARKER => {
                if src.len() < HEADER_SIZE + 2 {
                    return Ok(None);
                }
                (u16::from_be_bytes([src[2], src[3]]) as u64, HEADER_SIZE + 2)
            }
            LENGTH_64_MARKER => {
                if src.len() < HEADER_SIZE + 8 {
                    return Ok(None);
                }
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(&src[2..10]);
                (u64::from_be_bytes(bytes), HEADER_SIZE + 8)
            }
            kurz => (kurz as u64, HEADER_SIZE),
        };

        if laenge > self.max_frame_size as u64 {
            return Err(FrameError::TooLarge {
                laenge,
                maximum: self.max_frame_size,
            });
        }
        let laenge = laenge as usize;

        let masken_laenge = if maskiert { MASK_KEY_SIZE } else { 0 };
        let gesamt = header_laenge + masken_laenge + laenge;
        if src.len() < gesamt {
            // Speicher vorbelegen um Reallocations zu vermeiden
            src.reserve(gesamt - src.len());
            return Ok(None);
        }

        src.advance(header_laenge);
        let mask = if maskiert {
            let key = [src[0], src[1], src[2], src[3]];
            src.advance(MASK_KEY_SIZE);
            Some(key)
        } else {
            None
        };

        let mut payload = src.split_to(laenge);
        if let Some(key) = mask {
            apply_mask(&mut payload, key);
        }

        Ok(Some(Frame {
            fin,
            opcode,
            mask,
            payload: payload.freeze(),
        }))
    }
}

// ---------------------------------------------------------------------------
// Encoder-Implementierung
// ---------------------------------------------------------------------------

impl Encoder<Frame> for WebSocketCodec {
    type Error = FrameError;

    /// Die Groessengrenze gilt nur fuer eingehende Frames.
    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_frame(&item, dst);
        Ok(())
    }
}

/// Schreibt einen Frame in einen Buffer
///
/// Header-Byte aus FIN und Opcode, Laengenfeld in der kleinsten passenden
/// Form, optional Masken-Schluessel, danach die Payload.
pub fn encode_frame(frame: &Frame, dst: &mut BytesMut) {
    dst.reserve(frame.encoded_len());

    let fin = if frame.fin { FIN_BIT } else { 0 };
    dst.put_u8(fin | frame.opcode.bits());

    let mask_bit = if frame.mask.is_some() { MASK_BIT } else { 0 };
    let laenge = LengthField::for_len(frame.payload.len());
    dst.put_u8(mask_bit | laenge.marker());
    match laenge {
        LengthField::Short(_) => {}
        LengthField::Extended16(n) => dst.put_u16(n),
        LengthField::Extended64(n) => dst.put_u64(n),
    }

    match frame.mask {
        Some(key) => {
            dst.put_slice(&key);
            let start = dst.len();
            dst.put_slice(&frame.payload);
            apply_mask(&mut dst[start..], key);
        }
        None => dst.put_slice(&frame.payload),
    }
}

// ---------------------------------------------------------------------------
// Hilfsfunktionen fuer direktes async Lesen/Schreiben
// ---------------------------------------------------------------------------

/// Liest einen einzelnen Frame aus einem `AsyncRead`
///
/// Liest exakt 2 Header-Bytes, die erweiterte Laenge, den Masken-Schluessel
/// und die Payload.
///
/// # Fehler
/// - `UnexpectedEof` wenn die Verbindung vor Abschluss des Frames getrennt wird
/// - `TooLarge` wenn das Laengenfeld `max_frame_size` ueberschreitet
pub async fn read_frame<R>(reader: &mut R, max_frame_size: usize) -> Result<Frame, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header).await?;

    let fin = header[0] & FIN_BIT != 0;
    let opcode = Opcode::from_bits(header[0] & OPCODE_MASK);
    let maskiert = header[1] & MASK_BIT != 0;

    let laenge = match header[1] & LENGTH_MASK {
        LENGTH_16_MARKER => reader.read_u16().await? as u64,
        LENGTH_64_MARKER => reader.read_u64().await?,
        kurz => kurz as u64,
    };

    if laenge > max_frame_size as u64 {
        return Err(FrameError::TooLarge {
            laenge,
            maximum: max_frame_size,
        });
    }

    let mask = if maskiert {
        let mut key = [0u8; MASK_KEY_SIZE];
        reader.read_exact(&mut key).await?;
        Some(key)
    } else {
        None
    };

    let mut payload = vec![0u8; laenge as usize];
    reader.read_exact(&mut payload).await?;
    if let Some(key) = mask {
        apply_mask(&mut payload, key);
    }

    Ok(Frame {
        fin,
        opcode,
        mask,
        payload: payload.into(),
    })
}

/// Schreibt einen einzelnen Frame in einen `AsyncWrite`
///
/// # Fehler
/// - IO-Fehler beim Schreiben
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = BytesMut::with_capacity(frame.encoded_len());
    encode_frame(frame, &mut buf);
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
