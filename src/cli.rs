//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;
use log::warn;

use crate::theme::ThemeMode;
use crate::viz::VisualizationMode;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "SonicSphere")]
#[command(about = "Audio player with a reactive 3D visualization", long_about = None)]
pub struct Args {
    /// Audio files to queue on startup
    #[arg(value_name = "FILES")]
    pub files: Vec<PathBuf>,

    /// Queue a remote stream URL
    #[arg(long, value_name = "URL")]
    pub url: Option<String>,

    /// Visualization mode: orb (default), bars, cube, vinyl, tunnel, matrix
    #[arg(long, value_name = "MODE", default_value = "orb")]
    pub mode: String,

    /// Color theme: dynamic (default), nebula, sunset, emerald, mono
    #[arg(long, value_name = "THEME", default_value = "dynamic")]
    pub theme: String,

    /// Initial playback volume (0.0 to 1.0)
    #[arg(long, value_name = "LEVEL", default_value = "0.8")]
    pub volume: f32,
}

impl Args {
    /// Parse visualization mode from command-line arguments
    pub fn parse_mode(&self) -> VisualizationMode {
        VisualizationMode::parse(&self.mode).unwrap_or_else(|| {
            warn!("unknown visualization mode '{}', using orb", self.mode);
            VisualizationMode::Orb
        })
    }

    /// Parse theme mode from command-line arguments
    pub fn parse_theme(&self) -> ThemeMode {
        ThemeMode::parse(&self.theme).unwrap_or_else(|| {
            warn!("unknown theme '{}', using dynamic", self.theme);
            ThemeMode::Dynamic
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["sonicsphere"]);
        assert!(args.files.is_empty());
        assert_eq!(args.parse_mode(), VisualizationMode::Orb);
        assert_eq!(args.parse_theme(), ThemeMode::Dynamic);
        assert_eq!(args.volume, 0.8);
    }

    #[test]
    fn test_files_and_mode() {
        let args = Args::parse_from([
            "sonicsphere",
            "--mode",
            "tunnel",
            "--theme",
            "sunset",
            "a.mp3",
            "b.flac",
        ]);
        assert_eq!(args.files.len(), 2);
        assert_eq!(args.parse_mode(), VisualizationMode::Tunnel);
        assert_eq!(args.parse_theme(), ThemeMode::Sunset);
    }

    #[test]
    fn test_unknown_values_fall_back() {
        let args = Args::parse_from(["sonicsphere", "--mode", "plasma", "--theme", "vapor"]);
        assert_eq!(args.parse_mode(), VisualizationMode::Orb);
        assert_eq!(args.parse_theme(), ThemeMode::Dynamic);
    }
}
