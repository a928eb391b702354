//! Event-Queue – Uebergabe von Netzwerk-Tasks an den Dispatcher
//!
//! Beliebig viele Tasks reihen ein, genau ein Konsument entnimmt. Entnommen
//! wird immer der komplette Inhalt auf einmal (swap), die Sperre ist also nur
//! fuer einen Pointer-Tausch gehalten.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Notify;

/// Thread-sichere FIFO-Queue mit Wecksignal
#[derive(Debug)]
pub struct EreignisQueue<T> {
    eintraege: Mutex<VecDeque<T>>,
    signal: Arc<Notify>,
}

impl<T> EreignisQueue<T> {
    /// Erstellt eine leere Queue
    ///
    /// Mehrere Queues koennen sich ein Signal teilen; der Konsument wartet
    /// dann auf alle gleichzeitig.
    pub fn neu(signal: Arc<Notify>) -> Self {
        Self {
            eintraege: Mutex::new(VecDeque::new()),
            signal,
        }
    }

    /// Haengt einen Eintrag an und weckt den Konsumenten
    pub fn einreihen(&self, eintrag: T) {
        self.eintraege.lock().push_back(eintrag);
        self.signal.notify_one();
    }

    /// Entnimmt alle Eintraege in Einfuege-Reihenfolge
    pub fn entnehmen(&self) -> VecDeque<T> {
        std::mem::take(&mut *self.eintraege.lock())
    }

    pub fn laenge(&self) -> usize {
        self.eintraege.lock().len()
    }

    pub fn ist_leer(&self) -> bool {
        self.eintraege.lock().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn fifo_reihenfolge() {
        let queue = EreignisQueue::neu(Arc::new(Notify::new()));
        queue.einreihen(1);
        queue.einreihen(2);
        queue.einreihen(3);
        assert_eq!(queue.laenge(), 3);

        let inhalt: Vec<_> = queue.entnehmen().into_iter().collect();
        assert_eq!(inhalt, vec![1, 2, 3]);
        assert!(queue.ist_leer());
    }

    #[test]
    fn entnehmen_leerer_queue() {
        let queue: EreignisQueue<String> = EreignisQueue::neu(Arc::new(Notify::new()));
        assert!(queue.entnehmen().is_empty());
    }

    #[test]
    fn viele_produzenten() {
        let queue = Arc::new(EreignisQueue::neu(Arc::new(Notify::new())));

        let threads: Vec<_> = (0..4)
            .map(|t| {
                let queue = Arc::clone(&queue);
                std::thread::spawn(move || {
                    for i in 0..250 {
                        queue.einreihen((t, i));
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        let inhalt = queue.entnehmen();
        assert_eq!(inhalt.len(), 1000);
        // Reihenfolge pro Produzent bleibt erhalten
        for t in 0..4 {
            let eigene: Vec<_> = inhalt.iter().filter(|(p, _)| *p == t).map(|(_, i)| *i).collect();
            assert_eq!(eigene, (0..250).collect::<Vec<_>>());
        }
    }

    #[tokio::test]
    async fn einreihen_weckt_konsumenten() {
        let signal = Arc::new(Notify::new());
        let queue = Arc::new(EreignisQueue::neu(Arc::clone(&signal)));

        let produzent = Arc::clone(&queue);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            produzent.einreihen("hallo");
        });

        tokio::time::timeout(Duration::from_secs(2), signal.notified())
            .await
            .expect("Signal muss ankommen");
        assert_eq!(queue.entnehmen().pop_front(), Some("hallo"));
    }

    #[tokio::test]
    async fn signal_geht_ohne_wartenden_nicht_verloren() {
        let signal = Arc::new(Notify::new());
        let queue = EreignisQueue::neu(Arc::clone(&signal));
        queue.einreihen(42);

        tokio::time::timeout(Duration::from_millis(100), signal.notified())
            .await
            .expect("gespeichertes Signal");
    }
}
