//! Text exports of EQ settings.

use clap::ValueEnum;
use log::info;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;

use crate::error::{ModalEqError, Result};
use crate::filter_bank::EqSettings;

/// Output format for EQ settings
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Human-readable table
    #[default]
    Text,
    /// Room EQ Wizard filter list
    Rew,
    /// JSON serialization of the settings
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Text | ExportFormat::Rew => "txt",
            ExportFormat::Json => "json",
        }
    }
}

/// Tabular listing of the bands
pub fn format_text(settings: &EqSettings) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "EQ {} | {} bands | max boost {:.1} dB | max cut {:.1} dB | smoothing {:.2}",
        if settings.enabled { "enabled" } else { "disabled" },
        settings.bands.len(),
        settings.max_boost,
        settings.max_cut,
        settings.smoothing
    );
    let _ = writeln!(
        out,
        "{:>4}  {:>10}  {:>9}  {:>6}  Type",
        "#", "Freq (Hz)", "Gain (dB)", "Q"
    );
    for (i, band) in settings.bands.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:>4}  {:>10.1}  {:>+9.2}  {:>6.2}  {}",
            i + 1,
            band.frequency,
            band.gain,
            band.q,
            band.band_type.short_name()
        );
    }
    out
}

/// Room EQ Wizard filter lines, one per band
pub fn format_rew(settings: &EqSettings) -> String {
    settings
        .bands
        .iter()
        .enumerate()
        .map(|(i, band)| {
            format!(
                "Filter {}: ON {} Fc {:.1} Hz Gain {:.1} dB Q {:.2}\n",
                i + 1,
                band.band_type.short_name(),
                band.frequency,
                band.gain,
                band.q
            )
        })
        .collect()
}

/// Render `settings` in `format`
pub fn format_settings(settings: &EqSettings, format: ExportFormat) -> Result<String> {
    Ok(match format {
        ExportFormat::Text => format_text(settings),
        ExportFormat::Rew => format_rew(settings),
        ExportFormat::Json => serde_json::to_string_pretty(settings)?,
    })
}

/// Write `settings` to `path`, creating parent directories
///
/// Text formats start with a comment header carrying the generation time.
pub fn save(settings: &EqSettings, path: &Path, format: ExportFormat) -> Result<()> {
    let body = format_settings(settings, format)?;
    let content = match format {
        ExportFormat::Json => body,
        ExportFormat::Text | ExportFormat::Rew => format!(
            "# Modal EQ settings\n# Bands: {}\n# Generated: {}\n{}",
            settings.bands.len(),
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            body
        ),
    };

    let file_error = |e: std::io::Error| ModalEqError::FileOperation {
        path: path.display().to_string(),
        message: e.to_string(),
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(file_error)?;
    }
    std::fs::write(path, content).map_err(file_error)?;
    info!("EQ settings saved to: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter_bank::EqBand;

    fn settings() -> EqSettings {
        EqSettings {
            bands: vec![EqBand::peak(42.5, -7.34, 4.5), EqBand::peak(118.0, 2.0, 6.0)],
            enabled: true,
            max_boost: 6.0,
            max_cut: 12.0,
            smoothing: 0.1,
        }
    }

    #[test]
    fn test_rew_lines() {
        let rew = format_rew(&settings());
        let lines: Vec<&str> = rew.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "Filter 1: ON PK Fc 42.5 Hz Gain -7.3 dB Q 4.50");
        assert_eq!(lines[1], "Filter 2: ON PK Fc 118.0 Hz Gain 2.0 dB Q 6.00");
    }

    #[test]
    fn test_text_lists_every_band() {
        let text = format_text(&settings());
        assert!(text.starts_with("EQ enabled | 2 bands"));
        assert_eq!(text.lines().count(), 4);
        assert!(text.contains("-7.34"));
        assert!(text.contains("+2.00"));
    }

    #[test]
    fn test_save_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("eq.txt");
        save(&settings(), &path, ExportFormat::Rew).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# Modal EQ settings\n# Bands: 2\n# Generated: "));
        assert!(content.contains("Filter 2: ON PK Fc 118.0 Hz"));
    }

    #[test]
    fn test_save_json_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eq.json");
        save(&settings(), &path, ExportFormat::Json).unwrap();
        let loaded: EqSettings =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded, settings());
    }
}
