//! WebSocket-Handshake (RFC 6455, Abschnitt 4)
//!
//! Der Client schickt einen HTTP-Upgrade-Request:
//!
//! ```http
//! GET /livelink HTTP/1.1
//! Host: localhost:8080
//! Upgrade: websocket
//! Connection: Upgrade
//! Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==
//! Sec-WebSocket-Version: 13
//! ```
//!
//! Der Server antwortet mit `101 Switching Protocols` und dem aus dem Key
//! berechneten `Sec-WebSocket-Accept`. Ausser dem Key wird nichts geprueft;
//! Erweiterungen und Sub-Protokolle werden nicht ausgehandelt.

use base64::Engine;
use bytes::BytesMut;
use sha1::{Digest, Sha1};
use std::io;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Fester GUID aus RFC 6455 fuer die Accept-Berechnung
pub const WEBSOCKET_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Maximale Groesse des HTTP-Request-Headers
pub const MAX_HEADER_SIZE: usize = 8 * 1024;

const KEY_HEADER: &str = "Sec-WebSocket-Key";

// ---------------------------------------------------------------------------
// Fehler
// ---------------------------------------------------------------------------

/// Fehler waehrend des Handshakes
///
/// Jeder Fehler bedeutet: Verbindung schliessen, nichts registrieren.
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("IO-Fehler: {0}")]
    Io(#[from] io::Error),

    #[error("Verbindung vor Ende des Headers geschlossen")]
    ConnectionClosed,

    #[error("Request-Header zu gross (Maximum: {0} Bytes)")]
    HeaderTooLarge(usize),

    #[error("Ungueltiger Request: {0}")]
    InvalidRequest(String),

    #[error("Header Sec-WebSocket-Key fehlt")]
    MissingKey,
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Die fuer den Handshake relevanten Teile des Upgrade-Requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRequest {
    /// Request-Pfad (nur fuer Logging, es gibt kein Routing)
    pub path: String,
    /// Wert des `Sec-WebSocket-Key`-Headers, getrimmt
    pub key: String,
}

impl HandshakeRequest {
    /// Parst einen HTTP-Request-Header
    pub fn parse(raw: &str) -> Result<Self, HandshakeError> {
        let mut zeilen = raw.lines();
        let request_zeile = zeilen
            .next()
            .map(str::trim)
            .filter(|z| !z.is_empty())
            .ok_or_else(|| HandshakeError::InvalidRequest("leere Request-Zeile".into()))?;

        let path = request_zeile
            .split_whitespace()
            .nth(1)
            .unwrap_or("/")
            .to_string();

        let key = extract_key(raw).ok_or(HandshakeError::MissingKey)?;

        Ok(Self {
            path,
            key: key.to_string(),
        })
    }

    /// Berechnet den Accept-Wert fuer diesen Request
    pub fn accept_key(&self) -> String {
        accept_key(&self.key)
    }
}

/// Sucht den `Sec-WebSocket-Key`-Header (Name ohne Gross-/Kleinschreibung)
///
/// Gibt `None` zurueck wenn der Header fehlt oder leer ist.
pub fn extract_key(raw: &str) -> Option<&str> {
    raw.lines()
        .filter_map(|zeile| zeile.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case(KEY_HEADER))
        .map(|(_, wert)| wert.trim())
        .filter(|wert| !wert.is_empty())
}

// ---------------------------------------------------------------------------
// Accept-Berechnung und Antwort
// ---------------------------------------------------------------------------

/// Berechnet `Sec-WebSocket-Accept` aus dem Client-Key
///
/// `base64(sha1(key + GUID))`
pub fn accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.as_bytes());
    hasher.update(WEBSOCKET_GUID.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(hasher.finalize())
}

/// Baut die `101 Switching Protocols`-Antwort
pub fn response(accept: &str) -> String {
    format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {accept}\r\n\r\n"
    )
}

/// Position direkt hinter der Leerzeile, die den Header abschliesst
pub fn header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4)
        .position(|fenster| fenster == b"\r\n\r\n")
        .map(|pos| pos + 4)
}

// ---------------------------------------------------------------------------
// Async Handshake
// ---------------------------------------------------------------------------

/// Liest den Upgrade-Request bis zum Header-Ende
///
/// Bytes, die nach dem Header bereits gelesen wurden (z.B. ein sofort
/// gesendeter erster Frame), bleiben in `buf` und gehoeren dem Frame-Decoder.
pub async fn read_request<R>(reader: &mut R, buf: &mut BytesMut) -> Result<HandshakeRequest, HandshakeError>
where
    R: AsyncRead + Unpin,
{
    loop {
        if let Some(ende) = header_end(buf) {
            let header = buf.split_to(ende);
            return HandshakeRequest::parse(&String::from_utf8_lossy(&header));
        }
        if buf.len() >= MAX_HEADER_SIZE {
            return Err(HandshakeError::HeaderTooLarge(MAX_HEADER_SIZE));
        }

        buf.reserve(1024);
        if reader.read_buf(buf).await? == 0 {
            return Err(HandshakeError::ConnectionClosed);
        }
    }
}

/// Fuehrt den serverseitigen Handshake auf einem Stream aus
///
/// Gibt den Request und die nach dem Header bereits gelesenen Bytes zurueck.
/// Erst wenn die Antwort vollstaendig geschrieben ist, gilt der Handshake
/// als erfolgreich.
pub async fn accept<S>(stream: &mut S) -> Result<(HandshakeRequest, BytesMut), HandshakeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = BytesMut::with_capacity(1024);
    let request = read_request(stream, &mut buf).await?;

    let antwort = response(&request.accept_key());
    stream.write_all(antwort.as_bytes()).await?;
    stream.flush().await?;

    Ok((request, buf))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const BEISPIEL_REQUEST: &str = "GET /livelink HTTP/1.1\r\n\
        Host: localhost:8080\r\n\
        Upgrade: websocket\r\n\
        Connection: Upgrade\r\n\
        Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
        Sec-WebSocket-Version: 13\r\n\r\n";

    #[test]
    fn accept_key_rfc_beispiel() {
        assert_eq!(
            accept_key("dGhlIHNhbXBsZSBub25jZQ=="),
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
    }

    #[test]
    fn request_parsen() {
        let request = HandshakeRequest::parse(BEISPIEL_REQUEST).unwrap();
        assert_eq!(request.path, "/livelink");
        assert_eq!(request.key, "dGhlIHNhbXBsZSBub25jZQ==");
        assert_eq!(request.accept_key(), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn key_header_ohne_gross_kleinschreibung_und_getrimmt() {
        let raw = "GET / HTTP/1.1\r\nsec-websocket-key:    abc==   \r\n\r\n";
        assert_eq!(extract_key(raw), Some("abc=="));
    }

    #[test]
    fn fehlender_key() {
        let raw = "GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";
        assert!(matches!(
            HandshakeRequest::parse(raw),
            Err(HandshakeError::MissingKey)
        ));
    }

    #[test]
    fn leerer_key_zaehlt_als_fehlend() {
        assert_eq!(extract_key("GET / HTTP/1.1\r\nSec-WebSocket-Key:   \r\n\r\n"), None);
    }

    #[test]
    fn leerer_request() {
        assert!(matches!(
            HandshakeRequest::parse("\r\n\r\n"),
            Err(HandshakeError::InvalidRequest(_))
        ));
    }

    #[test]
    fn antwort_enthaelt_accept() {
        let antwort = response("s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
        assert!(antwort.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
        assert!(antwort.contains("\r\nUpgrade: websocket\r\n"));
        assert!(antwort.contains("\r\nConnection: Upgrade\r\n"));
        assert!(antwort.ends_with("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n\r\n"));
    }

    #[test]
    fn header_ende_finden() {
        assert_eq!(header_end(b"GET / HTTP/1.1\r\n\r\nrest"), Some(18));
        assert_eq!(header_end(b"GET / HTTP/1.1\r\n"), None);
    }

    #[tokio::test]
    async fn handshake_behaelt_bytes_nach_dem_header() {
        let (mut client, mut server) = tokio::io::duplex(4096);

        let mut eingabe = BEISPIEL_REQUEST.as_bytes().to_vec();
        eingabe.extend_from_slice(&[0x81, 0x80]);
        client.write_all(&eingabe).await.unwrap();

        let (request, rest) = accept(&mut server).await.unwrap();
        assert_eq!(request.path, "/livelink");
        assert_eq!(&rest[..], &[0x81, 0x80]);

        let mut antwort = vec![0u8; 256];
        let n = client.read(&mut antwort).await.unwrap();
        let antwort = String::from_utf8_lossy(&antwort[..n]);
        assert!(antwort.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo="));
    }

    #[tokio::test]
    async fn verbindung_vor_header_ende_geschlossen() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        client.write_all(b"GET / HTTP/1.1\r\nHost: x\r\n").await.unwrap();
        drop(client);

        let result = accept(&mut server).await;
        assert!(matches!(result, Err(HandshakeError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn zu_grosser_header() {
        let (mut client, mut server) = tokio::io::duplex(64 * 1024);
        let mut eingabe = b"GET / HTTP/1.1\r\nX-Fueller: ".to_vec();
        eingabe.extend(std::iter::repeat(b'a').take(MAX_HEADER_SIZE + 10));
        client.write_all(&eingabe).await.unwrap();

        let result = accept(&mut server).await;
        assert!(matches!(result, Err(HandshakeError::HeaderTooLarge(_))));
    }
}
