//! Color themes and the per-track theme resolution pipeline.
//!
//! Each track may receive an AI-derived theme from its cover art. The
//! resolver merges that per-track theme, the user-selected theme mode, and
//! the default fallback into one current theme, smoothed frame to frame so
//! hard switches never pop visually.
//!
//! Classification runs on worker threads; results flow back over a channel
//! tagged with the track id and a request generation, and anything stale or
//! orphaned is discarded silently.

use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use glam::Vec3;
use log::debug;

use crate::params::frame_lerp;
use crate::player::{Track, TrackId};

fn rgb8(r: u8, g: u8, b: u8) -> Vec3 {
    Vec3::new(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0)
}

/// A color theme: three colors plus a short mood label.
///
/// Themes are immutable values; a new theme replaces an old one.
#[derive(Debug, Clone, PartialEq)]
pub struct Theme {
    pub primary: Vec3,
    pub secondary: Vec3,
    pub accent: Vec3,
    pub mood: String,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary: rgb8(0x4f, 0x46, 0xe5),   // indigo
            secondary: rgb8(0xa8, 0x55, 0xf7), // purple
            accent: rgb8(0xec, 0x48, 0x99),    // pink
            mood: "Default".to_string(),
        }
    }
}

/// User-selected theme mode: Dynamic follows the classified per-track
/// theme, everything else is a fixed preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeMode {
    Dynamic,
    Nebula,
    Sunset,
    Emerald,
    Mono,
}

impl ThemeMode {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "dynamic" => Some(Self::Dynamic),
            "nebula" => Some(Self::Nebula),
            "sunset" => Some(Self::Sunset),
            "emerald" => Some(Self::Emerald),
            "mono" => Some(Self::Mono),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Dynamic => "Dynamic",
            Self::Nebula => "Nebula",
            Self::Sunset => "Sunset",
            Self::Emerald => "Emerald",
            Self::Mono => "Mono",
        }
    }

    pub fn cycle(self) -> Self {
        match self {
            Self::Dynamic => Self::Nebula,
            Self::Nebula => Self::Sunset,
            Self::Sunset => Self::Emerald,
            Self::Emerald => Self::Mono,
            Self::Mono => Self::Dynamic,
        }
    }

    /// Fixed preset theme for non-dynamic modes.
    fn preset(&self) -> Option<Theme> {
        let theme = match self {
            Self::Dynamic => return None,
            Self::Nebula => Theme {
                primary: rgb8(0x22, 0xd3, 0xee),
                secondary: rgb8(0x63, 0x66, 0xf1),
                accent: rgb8(0xf4, 0x72, 0xb6),
                mood: "Nebula".to_string(),
            },
            Self::Sunset => Theme {
                primary: rgb8(0xf9, 0x73, 0x16),
                secondary: rgb8(0xef, 0x44, 0x44),
                accent: rgb8(0xfb, 0xbf, 0x24),
                mood: "Sunset".to_string(),
            },
            Self::Emerald => Theme {
                primary: rgb8(0x10, 0xb9, 0x81),
                secondary: rgb8(0x06, 0x5f, 0x46),
                accent: rgb8(0xa7, 0xf3, 0xd0),
                mood: "Emerald".to_string(),
            },
            Self::Mono => Theme {
                primary: rgb8(0xe5, 0xe5, 0xe5),
                secondary: rgb8(0x73, 0x73, 0x73),
                accent: rgb8(0xff, 0xff, 0xff),
                mood: "Mono".to_string(),
            },
        };
        Some(theme)
    }
}

/// The external classifier seam: turns cover-art bytes into a theme.
///
/// May fail or be unavailable; both simply yield `None` and are never
/// retried automatically.
pub trait ThemeClassifier: Send + Sync {
    fn classify(&self, image: &[u8]) -> Option<Theme>;
}

/// Classifier standing in for a missing credential or unreachable service.
pub struct NullClassifier;

impl ThemeClassifier for NullClassifier {
    fn classify(&self, _image: &[u8]) -> Option<Theme> {
        None
    }
}

/// Built-in classifier deriving a palette from a coarse color histogram of
/// the art, with a heuristic one-word mood label.
pub struct PaletteClassifier;

fn saturation(c: Vec3) -> f32 {
    let max = c.max_element();
    let min = c.min_element();
    if max <= f32::EPSILON {
        0.0
    } else {
        (max - min) / max
    }
}

fn luminance(c: Vec3) -> f32 {
    0.299 * c.x + 0.587 * c.y + 0.114 * c.z
}

fn mood_label(colors: &[Vec3]) -> String {
    let n = colors.len().max(1) as f32;
    let sat: f32 = colors.iter().map(|&c| saturation(c)).sum::<f32>() / n;
    let lum: f32 = colors.iter().map(|&c| luminance(c)).sum::<f32>() / n;

    let mood = if sat > 0.5 && lum > 0.5 {
        "Energetic"
    } else if sat > 0.5 {
        "Moody"
    } else if lum > 0.6 {
        "Serene"
    } else if lum < 0.25 {
        "Somber"
    } else {
        "Mellow"
    };
    mood.to_string()
}

impl ThemeClassifier for PaletteClassifier {
    fn classify(&self, image: &[u8]) -> Option<Theme> {
        let decoded = image::load_from_memory(image).ok()?;
        let small = decoded.thumbnail(64, 64).to_rgba8();

        // Histogram over 4-bit-per-channel buckets
        let mut counts: HashMap<(u8, u8, u8), u32> = HashMap::new();
        for pixel in small.pixels() {
            let [r, g, b, a] = pixel.0;
            if a < 16 {
                continue;
            }
            *counts.entry((r >> 4, g >> 4, b >> 4)).or_insert(0) += 1;
        }
        if counts.is_empty() {
            return None;
        }

        // Score buckets by population weighted toward saturated colors so
        // black borders and gray gradients do not dominate the palette.
        let mut scored: Vec<(Vec3, f32)> = counts
            .into_iter()
            .map(|((r, g, b), count)| {
                let color = Vec3::new(
                    (r as f32 * 16.0 + 8.0) / 255.0,
                    (g as f32 * 16.0 + 8.0) / 255.0,
                    (b as f32 * 16.0 + 8.0) / 255.0,
                );
                let weight = count as f32 * (0.25 + 0.75 * saturation(color));
                (color, weight)
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        let mut picks: Vec<Vec3> = Vec::new();
        for (color, _) in &scored {
            if picks.iter().all(|p| p.distance(*color) > 0.22) {
                picks.push(*color);
            }
            if picks.len() == 3 {
                break;
            }
        }

        let primary = picks[0];
        let secondary = picks
            .get(1)
            .copied()
            .unwrap_or(primary * 0.55 + Vec3::splat(0.2));
        let accent = picks
            .get(2)
            .copied()
            .unwrap_or((Vec3::ONE - primary).clamp(Vec3::ZERO, Vec3::ONE));

        Some(Theme {
            primary,
            secondary,
            accent,
            mood: mood_label(&picks),
        })
    }
}

struct ClassificationOutcome {
    id: TrackId,
    generation: u64,
    theme: Option<Theme>,
}

/// Merges per-track classified themes, the theme-mode override, and the
/// default fallback into one smoothed current theme.
pub struct ThemeResolver {
    classifier: Arc<dyn ThemeClassifier>,
    tx: mpsc::Sender<ClassificationOutcome>,
    rx: mpsc::Receiver<ClassificationOutcome>,
    /// Latest request generation per track with a classification in flight
    in_flight: HashMap<TrackId, u64>,
    next_generation: u64,
    mode: ThemeMode,
    displayed: Theme,
    /// Per-frame color interpolation factor toward the target theme
    smoothing: f32,
}

impl ThemeResolver {
    pub fn new(classifier: Arc<dyn ThemeClassifier>, mode: ThemeMode) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            classifier,
            tx,
            rx,
            in_flight: HashMap::new(),
            next_generation: 0,
            mode,
            displayed: Theme::default(),
            smoothing: 0.05,
        }
    }

    pub fn mode(&self) -> ThemeMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ThemeMode) {
        self.mode = mode;
    }

    pub fn cycle_mode(&mut self) -> ThemeMode {
        self.mode = self.mode.cycle();
        self.mode
    }

    /// Kick off classification for a track, if it needs one.
    ///
    /// No-op when the track already has a theme or a request in flight.
    /// Without cover art there is nothing to classify and the default theme
    /// is stored immediately.
    pub fn request(&mut self, track: &mut Track) {
        if track.theme.is_some() || self.in_flight.contains_key(&track.id) {
            return;
        }

        let Some(art) = &track.cover_art else {
            debug!("track {:?} has no art; using default theme", track.id);
            track.theme = Some(Theme::default());
            return;
        };

        self.next_generation += 1;
        let generation = self.next_generation;
        self.in_flight.insert(track.id, generation);

        let classifier = Arc::clone(&self.classifier);
        let tx = self.tx.clone();
        let id = track.id;
        let image = art.bytes.clone();
        thread::spawn(move || {
            let theme = classifier.classify(&image);
            // Receiver may be gone on shutdown; nothing to do about it.
            let _ = tx.send(ClassificationOutcome {
                id,
                generation,
                theme,
            });
        });
    }

    /// Apply finished classification results to the playlist.
    ///
    /// Results that are stale (superseded generation) or whose track has
    /// been removed are discarded without effect. Classification failure
    /// stores the default theme; there is no automatic retry.
    pub fn drain(&mut self, playlist: &mut [Track]) {
        while let Ok(outcome) = self.rx.try_recv() {
            match self.in_flight.get(&outcome.id) {
                Some(&generation) if generation == outcome.generation => {
                    self.in_flight.remove(&outcome.id);
                }
                _ => {
                    debug!("discarding stale classification for {:?}", outcome.id);
                    continue;
                }
            }

            let Some(track) = playlist.iter_mut().find(|t| t.id == outcome.id) else {
                debug!(
                    "classification finished for removed track {:?}; discarding",
                    outcome.id
                );
                continue;
            };
            if track.theme.is_none() {
                track.theme = Some(outcome.theme.unwrap_or_default());
            }
        }
    }

    /// Resolve the target theme for the current mode and track.
    ///
    /// Always returns a usable theme: tracks still classifying (or whose
    /// classification never resolves) fall back to the default.
    pub fn target(&self, current: Option<&Track>) -> Theme {
        match self.mode.preset() {
            Some(preset) => preset,
            None => current
                .and_then(|t| t.theme.clone())
                .unwrap_or_default(),
        }
    }

    /// Move the displayed theme toward the target; exponential smoothing so
    /// even hard theme switches shift gradually.
    pub fn advance(&mut self, target: &Theme, dt: f32) {
        let k = frame_lerp(self.smoothing, dt);
        self.displayed.primary = self.displayed.primary.lerp(target.primary, k);
        self.displayed.secondary = self.displayed.secondary.lerp(target.secondary, k);
        self.displayed.accent = self.displayed.accent.lerp(target.accent, k);
        if self.displayed.mood != target.mood {
            self.displayed.mood = target.mood.clone();
        }
    }

    /// The smoothed theme fed to the renderer this frame.
    pub fn current(&self) -> &Theme {
        &self.displayed
    }

    #[cfg(test)]
    fn inject_outcome(&self, id: TrackId, generation: u64, theme: Option<Theme>) {
        let _ = self.tx.send(ClassificationOutcome {
            id,
            generation,
            theme,
        });
    }
}
