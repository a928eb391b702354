//! Verbindungs-Tasks – Empfangen und Schreiben fuer einen Client
//!
//! Nach dem Handshake wird der Socket geteilt:
//!
//! ```text
//! TcpStream ── Framed<WebSocketCodec> ──┬── SplitStream ── Empfangs-Loop (dieser Task)
//!                                       └── SplitSink   ── Schreib-Task  <── mpsc<Frame>
//! ```
//!
//! ## Keepalive
//! - Server sendet alle `keepalive_intervall` einen Ping
//! - Kommt innerhalb von `verbindungs_timeout` nichts an, wird getrennt

use bytes::BytesMut;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use livelink_protocol::{Frame, FrameError, Incoming, MessageAssembler, Opcode, WebSocketCodec};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::codec::{Framed, FramedParts};

use crate::client::ClientHandle;
use crate::event::NachrichtEreignis;
use crate::state::{ServerZustand, TrennGrund};

type FrameSink = SplitSink<Framed<TcpStream, WebSocketCodec>, Frame>;
type FrameStream = SplitStream<Framed<TcpStream, WebSocketCodec>>;

/// Startet den Schreib-Task und laeuft dann als Empfangs-Loop
///
/// `rest` sind Bytes, die beim Handshake schon hinter dem Header gelesen
/// wurden.
pub(crate) async fn verarbeiten(
    zustand: Arc<ServerZustand>,
    client: ClientHandle,
    stream: TcpStream,
    rest: BytesMut,
    sende_rx: mpsc::Receiver<Frame>,
) {
    let codec = WebSocketCodec::with_max_size(zustand.konfig.max_frame_groesse);
    let mut teile = FramedParts::new::<Frame>(stream, codec);
    teile.read_buf = rest;
    let (sink, stream) = Framed::from_parts(teile).split();

    tokio::spawn(schreiben(
        Arc::clone(&zustand),
        Arc::clone(&client),
        sink,
        sende_rx,
    ));

    empfangen(zustand, client, stream).await;
}

// ---------------------------------------------------------------------------
// Empfangen
// ---------------------------------------------------------------------------

async fn empfangen(zustand: Arc<ServerZustand>, client: ClientHandle, mut stream: FrameStream) {
    let konfig = &zustand.konfig;
    let mut assembler = MessageAssembler::new(konfig.max_frame_groesse);
    let mut ping_takt = konfig.keepalive_intervall.map(ping_takt_erstellen);
    let mut letzter_empfang = Instant::now();

    let grund = loop {
        tokio::select! {
            // Abbau wurde von anderer Stelle eingeleitet
            _ = client.abbruch().cancelled() => return,

            frame = stream.next() => {
                let frame = match frame {
                    Some(Ok(frame)) => frame,
                    Some(Err(e)) => break TrennGrund::Frame(e),
                    None => break TrennGrund::Geschlossen,
                };
                letzter_empfang = Instant::now();
                tracing::trace!(
                    client = %client.id(),
                    opcode = ?frame.opcode,
                    fin = frame.fin,
                    laenge = frame.payload.len(),
                    "Frame empfangen"
                );

                match assembler.push(frame) {
                    Ok(None) => {}
                    Ok(Some(Incoming::Text(text))) => {
                        tracing::debug!(client = %client.id(), laenge = text.len(), "Nachricht empfangen");
                        zustand.nachrichten.einreihen(NachrichtEreignis {
                            client: Arc::clone(&client),
                            text,
                        });
                    }
                    Ok(Some(Incoming::Ping(payload))) => {
                        if let Err(e) = client.frame_einreihen(Frame::pong(payload)) {
                            tracing::debug!(client = %client.id(), fehler = %e, "Pong nicht gesendet");
                        }
                    }
                    Ok(Some(Incoming::Pong(_))) => {
                        tracing::trace!(client = %client.id(), "Pong empfangen");
                    }
                    Ok(Some(Incoming::Close(code))) => break TrennGrund::ClientClose(code),
                    Err(e) => break TrennGrund::Frame(e),
                }
            }

            _ = naechster_ping(&mut ping_takt) => {
                if let Err(e) = client.frame_einreihen(Frame::ping(bytes::Bytes::new())) {
                    tracing::debug!(client = %client.id(), fehler = %e, "Keepalive-Ping nicht gesendet");
                }
            }

            _ = zeitlimit(letzter_empfang, konfig.verbindungs_timeout) => {
                break TrennGrund::Timeout;
            }
        }
    };

    // Ein Lesefehler nach Verbindungsabbruch ist kein Protokollfehler
    let grund = match grund {
        TrennGrund::Frame(FrameError::Io(e)) => {
            tracing::debug!(client = %client.id(), fehler = %e, "Lesefehler");
            TrennGrund::Geschlossen
        }
        anderer => anderer,
    };
    zustand.client_trennen(&client, grund);
}

fn ping_takt_erstellen(intervall: Duration) -> Interval {
    let mut takt = tokio::time::interval_at(Instant::now() + intervall, intervall);
    takt.set_missed_tick_behavior(MissedTickBehavior::Delay);
    takt
}

async fn naechster_ping(takt: &mut Option<Interval>) {
    match takt {
        Some(takt) => {
            takt.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn zeitlimit(letzter_empfang: Instant, timeout: Option<Duration>) {
    match timeout {
        Some(timeout) => tokio::time::sleep_until(letzter_empfang + timeout).await,
        None => std::future::pending().await,
    }
}

// ---------------------------------------------------------------------------
// Schreiben
// ---------------------------------------------------------------------------

/// Einziger Schreiber auf den Socket eines Clients
///
/// Arbeitet die Queue ab bis ein Close-Frame geschrieben ist, der Client
/// abgebrochen wird oder ein Schreibfehler auftritt. Bereits eingereihte
/// Frames haben Vorrang vor dem Abbruch, damit ein Close-Frame noch
/// rausgeht.
async fn schreiben(
    zustand: Arc<ServerZustand>,
    client: ClientHandle,
    mut sink: FrameSink,
    mut sende_rx: mpsc::Receiver<Frame>,
) {
    let schreib_timeout = zustand.konfig.schreib_timeout;

    loop {
        let frame = tokio::select! {
            biased;
            frame = sende_rx.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
            _ = client.abbruch().cancelled() => break,
        };

        let ist_close = frame.opcode == Opcode::Close;
        match tokio::time::timeout(schreib_timeout, sink.send(frame)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(client = %client.id(), fehler = %e, "Senden fehlgeschlagen");
                zustand.client_trennen(&client, TrennGrund::SchreibFehler);
                break;
            }
            Err(_) => {
                tracing::warn!(
                    client = %client.id(),
                    timeout_ms = schreib_timeout.as_millis() as u64,
                    "Senden: Zeitlimit ueberschritten"
                );
                zustand.client_trennen(&client, TrennGrund::SchreibFehler);
                break;
            }
        }

        if ist_close {
            break;
        }
    }

    // Flush und TCP-Shutdown; Fehler hier aendern nichts mehr
    if let Ok(Err(e)) = tokio::time::timeout(schreib_timeout, sink.close()).await {
        tracing::debug!(client = %client.id(), fehler = %e, "Socket-Shutdown fehlgeschlagen");
    }
    tracing::debug!(client = %client.id(), "Schreib-Task beendet");
}
