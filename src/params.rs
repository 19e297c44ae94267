//! Parameter definitions with documented semantics and defaults.
//!
//! Every tuning constant lives here rather than inline at the use site:
//! spectrum analysis configuration, per-mode visual mappings, and render
//! settings.

use std::ops::Range;

/// Spectrum snapshot configuration.
///
/// Models a Web-Audio-style analyser: a 2048-point transform producing a
/// 1024-bin byte magnitude array, with exponential smoothing across
/// snapshots and a dB window mapped onto 0..=255.
#[derive(Debug, Clone)]
pub struct SpectrumConfig {
    /// FFT window size in samples (must be a power of 2)
    pub fft_size: usize,

    /// Smoothing time constant applied to linear magnitudes between
    /// consecutive snapshots (0 = none, 1 = frozen)
    pub smoothing: f32,

    /// Magnitudes at or below this level map to byte 0
    pub min_decibels: f32,

    /// Magnitudes at or above this level map to byte 255
    pub max_decibels: f32,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            smoothing: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
        }
    }
}

impl SpectrumConfig {
    /// Number of magnitude bins in a snapshot (half the FFT size)
    pub fn bins(&self) -> usize {
        self.fft_size / 2
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.fft_size.is_power_of_two() {
            return Err(format!(
                "FFT size must be a power of 2, got {}",
                self.fft_size
            ));
        }
        if !(0.0..1.0).contains(&self.smoothing) {
            return Err(format!("smoothing must be in [0, 1), got {}", self.smoothing));
        }
        if self.min_decibels >= self.max_decibels {
            return Err("min_decibels must be below max_decibels".to_string());
        }
        Ok(())
    }
}

/// Frequency band extraction ranges, stored as ratios of the snapshot
/// length so a different FFT resolution rescales proportionally.
///
/// Reference values were tuned against a 1024-bin snapshot:
/// bass = bins 0..50, mid = 50..100, treble = 100..200.
#[derive(Debug, Clone)]
pub struct BandRanges {
    pub bass: (f32, f32),
    pub mid: (f32, f32),
    pub treble: (f32, f32),
}

impl Default for BandRanges {
    fn default() -> Self {
        Self {
            bass: (0.0, 50.0 / 1024.0),
            mid: (50.0 / 1024.0, 100.0 / 1024.0),
            treble: (100.0 / 1024.0, 200.0 / 1024.0),
        }
    }
}

impl BandRanges {
    /// Resolve a ratio pair to a concrete bin range for `bins` total bins
    pub fn resolve(&self, ratio: (f32, f32), bins: usize) -> Range<usize> {
        let start = (ratio.0 * bins as f32) as usize;
        let end = ((ratio.1 * bins as f32) as usize).min(bins);
        start..end.max(start)
    }
}

/// Orb mode tuning (deformable sphere)
#[derive(Debug, Clone)]
pub struct OrbTuning {
    /// Uniform scale range driven by bass energy
    pub scale_range: (f32, f32),

    /// Surface distortion intensity range driven by the treble band
    pub distort_range: (f32, f32),

    /// Spatial frequency of the Perlin surface displacement
    pub distort_frequency: f32,

    /// Constant rotation rates (radians per second, x and y axes)
    pub spin: (f32, f32),

    /// Per-frame (at 60 fps) interpolation factor toward targets
    pub smoothing: f32,

    /// Per-frame color interpolation toward the primary theme color
    pub color_smoothing: f32,
}

impl Default for OrbTuning {
    fn default() -> Self {
        Self {
            scale_range: (1.0, 2.5),
            distort_range: (0.3, 1.1),
            distort_frequency: 2.2,
            spin: (0.06, 0.12),
            smoothing: 0.1,
            color_smoothing: 0.05,
        }
    }
}

/// Bars mode tuning (circular ring of instanced bars)
#[derive(Debug, Clone)]
pub struct BarsTuning {
    /// Number of bars in the ring
    pub count: usize,

    /// Bars sample the first this-many bins of the snapshot
    pub bin_span: usize,

    /// Ring radius in world units
    pub radius: f32,

    /// Height floor and audio-driven height range
    pub floor_height: f32,
    pub height_range: f32,

    /// Bar cross-section (x/z scale)
    pub thickness: f32,

    /// Per-frame height smoothing factor
    pub smoothing: f32,
}

impl Default for BarsTuning {
    fn default() -> Self {
        Self {
            count: 64,
            bin_span: 200,
            radius: 5.0,
            floor_height: 0.15,
            height_range: 3.5,
            thickness: 0.28,
            smoothing: 0.35,
        }
    }
}

/// Cube mode tuning
#[derive(Debug, Clone)]
pub struct CubeTuning {
    /// Bins averaged to drive scale and wobble
    pub bin_span: usize,

    /// Uniform scale added per unit of averaged energy
    pub scale_gain: f32,

    /// Wobble distortion factor per unit of averaged energy
    pub wobble_gain: f32,

    /// Wobble oscillation rate (radians per second)
    pub wobble_rate: f32,

    /// Rotation rates (radians per second, x and y axes)
    pub spin: (f32, f32),

    pub smoothing: f32,
    pub color_smoothing: f32,
}

impl Default for CubeTuning {
    fn default() -> Self {
        Self {
            bin_span: 100,
            scale_gain: 1.4,
            wobble_gain: 0.35,
            wobble_rate: 3.0,
            spin: (0.25, 0.4),
            smoothing: 0.12,
            color_smoothing: 0.05,
        }
    }
}

/// Vinyl mode tuning (spinning disc with an art label)
#[derive(Debug, Clone)]
pub struct VinylTuning {
    /// Bins averaged for the bass pulse
    pub bin_span: usize,

    /// Base spin rate (radians per second) and bass-driven extra spin
    pub base_spin: f32,
    pub bass_spin_gain: f32,

    /// Pulsing scale added per unit of bass
    pub pulse_gain: f32,

    /// Disc tilt oscillation (amplitude radians, rate radians per second)
    pub tilt_amplitude: f32,
    pub tilt_rate: f32,

    /// Disc and label radii
    pub disc_radius: f32,
    pub label_radius: f32,
}

impl Default for VinylTuning {
    fn default() -> Self {
        Self {
            bin_span: 20,
            base_spin: 0.9,
            bass_spin_gain: 3.0,
            pulse_gain: 0.08,
            tilt_amplitude: 0.12,
            tilt_rate: 0.5,
            disc_radius: 3.2,
            label_radius: 1.2,
        }
    }
}

/// Tunnel mode tuning (rings scrolling along a looping depth axis)
#[derive(Debug, Clone)]
pub struct TunnelTuning {
    /// Number of ring segments
    pub ring_count: usize,

    /// Cubes arranged around each ring
    pub segments_per_ring: usize,

    /// Bins averaged for the travel-speed bass signal
    pub bin_span: usize,

    /// Total loop length along the depth axis (world units)
    pub length: f32,

    /// Travel speed = base + bass * gain (world units per second)
    pub base_speed: f32,
    pub speed_gain: f32,

    /// Ring radius, grown by bass squared times this gain
    pub radius: f32,
    pub radius_gain: f32,

    /// Bass level above which the accent beat-flash kicks in
    pub flash_threshold: f32,
}

impl Default for TunnelTuning {
    fn default() -> Self {
        Self {
            ring_count: 24,
            segments_per_ring: 16,
            bin_span: 20,
            length: 48.0,
            base_speed: 4.0,
            speed_gain: 16.0,
            radius: 3.0,
            radius_gain: 0.8,
            flash_threshold: 0.5,
        }
    }
}

/// Matrix mode tuning (reactive instanced floor)
#[derive(Debug, Clone)]
pub struct MatrixTuning {
    /// Grid side length (cells per side)
    pub grid_size: usize,

    /// Cell spacing in world units
    pub spacing: f32,

    /// Normalized center distance maps onto the first this-many bins
    pub bin_span: usize,

    /// Cell height floor and audio-driven range
    pub floor_height: f32,
    pub height_range: f32,

    /// Vertical offset of the floor below the origin
    pub floor_y: f32,
}

impl Default for MatrixTuning {
    fn default() -> Self {
        Self {
            grid_size: 24,
            spacing: 0.55,
            bin_span: 50,
            floor_height: 0.08,
            height_range: 2.6,
            floor_y: -2.5,
        }
    }
}

/// Ambient particle field tuning
#[derive(Debug, Clone)]
pub struct ParticleTuning {
    /// Number of particles
    pub count: usize,

    /// Seed for per-particle phase/speed/radius constants
    pub seed: u64,

    /// Extra time advance per unit of field excitement
    pub excitement_gain: f32,

    /// Base scale and audio-driven scale range per particle
    pub base_scale: f32,
    pub scale_gain: f32,

    /// Per-frame color interpolation toward the secondary theme color
    pub color_smoothing: f32,
}

impl Default for ParticleTuning {
    fn default() -> Self {
        Self {
            count: 800,
            seed: 42,
            excitement_gain: 0.6,
            base_scale: 0.04,
            scale_gain: 0.22,
            color_smoothing: 0.1,
        }
    }
}

/// All per-mode visual tuning bundled for the renderer
#[derive(Debug, Clone, Default)]
pub struct VisualTuning {
    pub orb: OrbTuning,
    pub bars: BarsTuning,
    pub cube: CubeTuning,
    pub vinyl: VinylTuning,
    pub tunnel: TunnelTuning,
    pub matrix: MatrixTuning,
    pub particles: ParticleTuning,
}

/// Convert a per-frame interpolation factor (tuned at a 60 fps reference)
/// into a time-step-correct factor, so smoothing speed does not depend on
/// the display refresh rate.
pub fn frame_lerp(per_frame: f32, dt: f32) -> f32 {
    1.0 - (1.0 - per_frame).powf(dt * 60.0)
}

/// Camera orbit parameters (slow auto-rotation around the scene)
#[derive(Debug, Clone)]
pub struct CameraOrbit {
    /// Orbit radius (world units)
    pub radius: f32,

    /// Eye height above the origin
    pub height: f32,

    /// Orbit angular rate (radians per second)
    pub rate: f32,
}

impl Default for CameraOrbit {
    fn default() -> Self {
        Self {
            radius: 9.0,
            height: 1.8,
            rate: 0.05,
        }
    }
}

/// Rendering configuration
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Window width (pixels)
    pub window_width: u32,

    /// Window height (pixels)
    pub window_height: u32,

    /// Field of view (degrees)
    pub fov_degrees: f32,

    /// Near clipping plane
    pub near_plane: f32,

    /// Far clipping plane
    pub far_plane: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            window_width: 1280,
            window_height: 720,
            fov_degrees: 45.0,
            near_plane: 0.1,
            far_plane: 200.0,
        }
    }
}

impl RenderConfig {
    pub fn aspect_ratio(&self) -> f32 {
        self.window_width as f32 / self.window_height as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spectrum_config_validation() {
        assert!(SpectrumConfig::default().validate().is_ok());

        let bad_size = SpectrumConfig {
            fft_size: 1000,
            ..Default::default()
        };
        assert!(bad_size.validate().is_err());

        let bad_db = SpectrumConfig {
            min_decibels: -10.0,
            max_decibels: -30.0,
            ..Default::default()
        };
        assert!(bad_db.validate().is_err());
    }

    #[test]
    fn test_band_ranges_rescale_proportionally() {
        let ranges = BandRanges::default();

        // Reference resolution: 1024 bins
        assert_eq!(ranges.resolve(ranges.bass, 1024), 0..50);
        assert_eq!(ranges.resolve(ranges.treble, 1024), 100..200);

        // Half resolution halves the bin indices
        assert_eq!(ranges.resolve(ranges.bass, 512), 0..25);
        assert_eq!(ranges.resolve(ranges.treble, 512), 50..100);
    }

    #[test]
    fn test_band_ranges_clamp_to_snapshot() {
        let ranges = BandRanges::default();
        let r = ranges.resolve((0.5, 2.0), 100);
        assert_eq!(r, 50..100);
    }
}
