//! Gemeinsame Hilfen fuer die Integrationstests

#![allow(dead_code)]

use livelink_protocol::handshake;
use livelink_protocol::{read_frame, write_frame, Frame, DEFAULT_MAX_FRAME_SIZE};
use livelink_websocket::{ClientHandle, Dispatcher, ServerCallbacks, WebSocketKonfig, WebSocketServer};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

pub const TIMEOUT: Duration = Duration::from_secs(5);

/// Maske fuer Client-Frames
pub const MASKE: [u8; 4] = [0x37, 0xfa, 0x21, 0x3d];

/// Was der Dispatcher an die Callbacks geliefert hat
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Aufgezeichnet {
    Verbunden(String),
    Getrennt(String),
    Nachricht(String, String),
    Fehler(String),
}

#[derive(Debug, Clone, Default)]
pub struct Aufzeichnung(Arc<Mutex<Vec<Aufgezeichnet>>>);

impl Aufzeichnung {
    pub fn alle(&self) -> Vec<Aufgezeichnet> {
        self.0.lock().clone()
    }

    pub fn nachrichten(&self) -> Vec<(String, String)> {
        self.alle()
            .into_iter()
            .filter_map(|e| match e {
                Aufgezeichnet::Nachricht(id, text) => Some((id, text)),
                _ => None,
            })
            .collect()
    }

    pub fn verbunden(&self) -> Vec<String> {
        self.alle()
            .into_iter()
            .filter_map(|e| match e {
                Aufgezeichnet::Verbunden(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn getrennt(&self) -> Vec<String> {
        self.alle()
            .into_iter()
            .filter_map(|e| match e {
                Aufgezeichnet::Getrennt(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    fn callbacks(&self) -> ServerCallbacks {
        let nachricht = self.clone();
        let verbunden = self.clone();
        let getrennt = self.clone();
        let fehler = self.clone();
        ServerCallbacks::neu(move |text, client: &ClientHandle| {
            nachricht
                .0
                .lock()
                .push(Aufgezeichnet::Nachricht(client.id().to_string(), text.to_string()));
        })
        .bei_verbindung(move |client| {
            verbunden
                .0
                .lock()
                .push(Aufgezeichnet::Verbunden(client.id().to_string()));
        })
        .bei_trennung(move |client| {
            getrennt
                .0
                .lock()
                .push(Aufgezeichnet::Getrennt(client.id().to_string()));
        })
        .bei_fehler(move |beschreibung| {
            fehler
                .0
                .lock()
                .push(Aufgezeichnet::Fehler(beschreibung.to_string()));
        })
    }
}

pub struct TestServer {
    pub server: WebSocketServer,
    pub adresse: SocketAddr,
    pub dispatcher: Dispatcher,
    pub aufzeichnung: Aufzeichnung,
}

impl TestServer {
    pub async fn starten() -> Self {
        Self::mit_konfig(WebSocketKonfig::default()).await
    }

    /// Startet auf 127.0.0.1 mit freiem Port
    pub async fn mit_konfig(konfig: WebSocketKonfig) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("livelink=debug")
            .with_test_writer()
            .try_init();

        let server = WebSocketServer::neu(WebSocketKonfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..konfig
        });
        let aufzeichnung = Aufzeichnung::default();
        let dispatcher = Dispatcher::neu(&server, aufzeichnung.callbacks());
        let adresse = server.starten().await.unwrap();

        Self {
            server,
            adresse,
            dispatcher,
            aufzeichnung,
        }
    }

    /// Tickt den Dispatcher bis `bedingung` erfuellt ist
    pub async fn warten_bis<F>(&mut self, beschreibung: &str, mut bedingung: F)
    where
        F: FnMut(&Aufzeichnung, &WebSocketServer) -> bool,
    {
        let ende = tokio::time::Instant::now() + TIMEOUT;
        loop {
            self.dispatcher.tick();
            if bedingung(&self.aufzeichnung, &self.server) {
                return;
            }
            if tokio::time::Instant::now() > ende {
                panic!(
                    "Zeitlimit: {beschreibung} (aufgezeichnet: {:?})",
                    self.aufzeichnung.alle()
                );
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}/livelink", self.adresse)
    }
}

// ---------------------------------------------------------------------------
// Roher Client auf Frame-Ebene
// ---------------------------------------------------------------------------

/// Fuehrt den Handshake mit dem gegebenen Key-Header aus
pub async fn roher_client(adresse: SocketAddr) -> TcpStream {
    let mut stream = TcpStream::connect(adresse).await.unwrap();
    let request = format!(
        "GET /livelink HTTP/1.1\r\n\
         Host: {adresse}\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
         Sec-WebSocket-Version: 13\r\n\r\n"
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    // Antwort bis zur Leerzeile lesen, byteweise damit kein Frame verloren geht
    let mut antwort = Vec::new();
    while handshake::header_end(&antwort).is_none() {
        let byte = tokio::time::timeout(TIMEOUT, stream.read_u8())
            .await
            .expect("Handshake-Antwort")
            .unwrap();
        antwort.push(byte);
    }
    let antwort = String::from_utf8(antwort).unwrap();
    assert!(antwort.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
    assert!(antwort.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n"));

    stream
}

/// Sendet einen maskierten Frame (Client-Richtung)
pub async fn senden(stream: &mut TcpStream, frame: Frame) {
    write_frame(stream, &frame.with_mask(MASKE)).await.unwrap();
}

/// Liest den naechsten Frame vom Server
pub async fn empfangen(stream: &mut TcpStream) -> Frame {
    tokio::time::timeout(TIMEOUT, read_frame(stream, DEFAULT_MAX_FRAME_SIZE))
        .await
        .expect("Frame vom Server")
        .unwrap()
}

/// Wartet bis der Server die Verbindung schliesst
pub async fn auf_eof_warten(stream: &mut TcpStream) {
    let mut rest = Vec::new();
    tokio::time::timeout(TIMEOUT, stream.read_to_end(&mut rest))
        .await
        .expect("Server muss die Verbindung schliessen")
        .ok();
}
