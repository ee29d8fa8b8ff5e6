//! Murmel Simulator – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und startet die
//! Simulation.

use anyhow::Result;
use murmel_observability::logging_initialisieren;
use murmel_sim::{config::SimConfig, Simulation};

#[tokio::main]
async fn main() -> Result<()> {
    // Konfigurationsdatei-Pfad aus Umgebungsvariable oder Standard
    let config_pfad = std::env::var("MURMEL_CONFIG").unwrap_or_else(|_| "murmel.toml".into());

    // Konfiguration laden (Standardwerte falls Datei fehlt)
    let config = SimConfig::laden(&config_pfad)?;

    logging_initialisieren(&config.logging.level, &config.logging.format);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        "Murmel Simulator wird initialisiert"
    );

    let ergebnis = Simulation::neu(config).starten().await?;

    tracing::info!(
        gesendet = ergebnis.gesendet,
        im_netz_verloren = ergebnis.im_netz_verloren,
        vertauscht = ergebnis.vertauscht,
        ticks = ergebnis.ausgabe_ticks,
        "Ergebnis"
    );
    if let Some(t) = &ergebnis.telemetrie {
        tracing::info!("Letzte Telemetrie: {}", t.zusammenfassung());
    }

    Ok(())
}
