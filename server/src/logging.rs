//! Structured Logging Setup via tracing-subscriber
//!
//! Die Konfigurationsdatei kennt nur die fuenf Log-Level. Umgebungsvariablen
//! ueberschreiben sie:
//! - `LIVELINK_LOG_LEVEL`: Log-Level oder Filter-Direktive
//!   (z.B. `livelink_websocket=debug`), Standard: Level aus der Datei
//! - `LIVELINK_LOG_FORMAT`: Format (text/json), Standard: Format aus der Datei

use tracing_subscriber::{fmt, EnvFilter};

/// Umgebungsvariable fuer den Log-Level
pub const LOG_LEVEL_ENV: &str = "LIVELINK_LOG_LEVEL";

/// Umgebungsvariable fuer das Log-Format
pub const LOG_FORMAT_ENV: &str = "LIVELINK_LOG_FORMAT";

/// Initialisiert das Logging-System.
///
/// `level` ist ein Level wie von [`log_level_gueltig`] geprueft. Faellt auf
/// `info` zurueck falls weder Umgebung noch `level` einen gueltigen Filter
/// ergeben.
pub fn logging_initialisieren(level: &str, format: &str) {
    let filter = EnvFilter::try_from_env(LOG_LEVEL_ENV)
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let format = std::env::var(LOG_FORMAT_ENV).unwrap_or_else(|_| format.to_string());

    match format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt().with_env_filter(filter).with_target(true).init();
        }
    }
}

/// Validiert einen Log-Level aus der Konfigurationsdatei.
///
/// Filter-Direktiven sind nur ueber `LIVELINK_LOG_LEVEL` moeglich.
pub fn log_level_gueltig(level: &str) -> bool {
    matches!(level, "trace" | "debug" | "info" | "warn" | "error")
}

/// Validiert ob ein Log-Format-String gueltig ist.
pub fn log_format_gueltig(format: &str) -> bool {
    matches!(format, "text" | "json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_gueltige_werte() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            assert!(log_level_gueltig(level), "{level}");
        }
    }

    #[test]
    fn log_level_ungueltige_werte() {
        assert!(!log_level_gueltig("verbose"));
        assert!(!log_level_gueltig("INFO")); // Gross-/Kleinschreibung
        assert!(!log_level_gueltig(""));
    }

    #[test]
    fn direktiven_nur_per_umgebung() {
        assert!(!log_level_gueltig("livelink_websocket=debug"));
        assert!(!log_level_gueltig("info,livelink=trace"));
        assert!(EnvFilter::try_new("livelink_websocket=debug").is_ok());
    }

    #[test]
    fn log_format_werte() {
        assert!(log_format_gueltig("text"));
        assert!(log_format_gueltig("json"));
        assert!(!log_format_gueltig("xml"));
        assert!(!log_format_gueltig("JSON"));
    }
}
