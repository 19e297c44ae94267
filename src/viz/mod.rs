//! Mode-switchable 3D scene driven by spectrum snapshots and the active
//! color theme.
//!
//! Each mode owns persistent animation state (rotation angles, smoothed
//! heights, travel distance) that keeps evolving only while the mode is
//! active and is never reset by a mode switch. The ambient particle field
//! runs underneath every mode.

pub mod geometry;
pub mod modes;
pub mod particles;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use crate::params::VisualTuning;
use crate::spectrum::FrequencyBands;
use crate::theme::Theme;
use geometry::Vertex;
use modes::{BarsState, CubeState, MatrixState, OrbState, TunnelState, VinylState};
use particles::ParticleField;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisualizationMode {
    Orb,
    Bars,
    Cube,
    Vinyl,
    Tunnel,
    Matrix,
}

impl VisualizationMode {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "orb" => Some(Self::Orb),
            "bars" => Some(Self::Bars),
            "cube" => Some(Self::Cube),
            "vinyl" => Some(Self::Vinyl),
            "tunnel" => Some(Self::Tunnel),
            "matrix" => Some(Self::Matrix),
            _ => None,
        }
    }

    /// Keyboard shortcut mapping (keys 1 through 6).
    pub fn from_digit(digit: u8) -> Option<Self> {
        match digit {
            1 => Some(Self::Orb),
            2 => Some(Self::Bars),
            3 => Some(Self::Cube),
            4 => Some(Self::Vinyl),
            5 => Some(Self::Tunnel),
            6 => Some(Self::Matrix),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Orb => "Orb",
            Self::Bars => "Bars",
            Self::Cube => "Cube",
            Self::Vinyl => "Vinyl",
            Self::Tunnel => "Tunnel",
            Self::Matrix => "Matrix",
        }
    }
}

/// Per-instance GPU data: model matrix, solid color, and a textured flag
/// (x > 0.5 samples the label texture instead of the color).
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Instance {
    pub model: [[f32; 4]; 4],
    pub color: [f32; 4],
    pub textured: [f32; 4],
}

impl Instance {
    pub fn solid(model: Mat4, color: Vec3) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            color: [color.x, color.y, color.z, 1.0],
            textured: [0.0; 4],
        }
    }

    pub fn textured(model: Mat4) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            color: [1.0, 1.0, 1.0, 1.0],
            textured: [1.0, 0.0, 0.0, 0.0],
        }
    }
}

/// Everything a frame needs from outside the visualization: the raw
/// snapshot, its band reduction, the displayed theme, and timing.
pub struct FrameInput<'a> {
    pub spectrum: &'a [u8],
    pub bands: FrequencyBands,
    pub theme: &'a Theme,
    pub time: f32,
    pub dt: f32,
}

/// One frame's instance batches, grouped by mesh.
#[derive(Default)]
pub struct SceneFrame {
    /// Deformable hi-res sphere (orb mode)
    pub sphere_instances: Vec<Instance>,
    /// Low-res sphere shared by the particle field
    pub bauble_instances: Vec<Instance>,
    pub cube_instances: Vec<Instance>,
    pub disc_instances: Vec<Instance>,
}

impl SceneFrame {
    fn clear(&mut self) {
        self.sphere_instances.clear();
        self.bauble_instances.clear();
        self.cube_instances.clear();
        self.disc_instances.clear();
    }
}

/// Owns all mode states plus the particle field, and assembles the scene
/// for whichever mode is active.
pub struct VisualizationRenderer {
    mode: VisualizationMode,
    tuning: VisualTuning,
    orb: OrbState,
    bars: BarsState,
    cube: CubeState,
    vinyl: VinylState,
    tunnel: TunnelState,
    matrix: MatrixState,
    particles: ParticleField,
    frame: SceneFrame,
}

impl VisualizationRenderer {
    pub fn new(mode: VisualizationMode, tuning: VisualTuning) -> Self {
        Self {
            mode,
            orb: OrbState::new(&tuning.orb),
            bars: BarsState::new(&tuning.bars),
            cube: CubeState::new(),
            vinyl: VinylState::new(),
            tunnel: TunnelState::new(),
            matrix: MatrixState::new(&tuning.matrix),
            particles: ParticleField::new(&tuning.particles),
            frame: SceneFrame::default(),
            tuning,
        }
    }

    pub fn mode(&self) -> VisualizationMode {
        self.mode
    }

    /// Switch the active mode. All other mode states are left untouched,
    /// so switching away and back resumes where the mode left off.
    pub fn set_mode(&mut self, mode: VisualizationMode) {
        self.mode = mode;
    }

    /// Advance the active mode and the particle field, producing this
    /// frame's instance batches.
    pub fn update(&mut self, input: &FrameInput) -> &SceneFrame {
        self.frame.clear();

        match self.mode {
            VisualizationMode::Orb => self.orb.update(input, &self.tuning.orb, &mut self.frame),
            VisualizationMode::Bars => self.bars.update(input, &self.tuning.bars, &mut self.frame),
            VisualizationMode::Cube => self.cube.update(input, &self.tuning.cube, &mut self.frame),
            VisualizationMode::Vinyl => {
                self.vinyl.update(input, &self.tuning.vinyl, &mut self.frame)
            }
            VisualizationMode::Tunnel => {
                self.tunnel
                    .update(input, &self.tuning.tunnel, &mut self.frame)
            }
            VisualizationMode::Matrix => {
                self.matrix
                    .update(input, &self.tuning.matrix, &mut self.frame)
            }
        }

        self.particles
            .update(input, &self.tuning.particles, &mut self.frame);

        &self.frame
    }

    /// Current deformed orb surface, for vertex-buffer upload when the
    /// orb mode is active.
    pub fn orb_vertices(&self) -> &[Vertex] {
        self.orb.vertices()
    }

    pub fn scene(&self) -> &SceneFrame {
        &self.frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ParticleTuning, VisualTuning};

    fn test_tuning() -> VisualTuning {
        VisualTuning {
            particles: ParticleTuning {
                count: 16,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn quiet_input<'a>(spectrum: &'a [u8], theme: &'a Theme) -> FrameInput<'a> {
        FrameInput {
            spectrum,
            bands: FrequencyBands::default(),
            theme,
            time: 0.5,
            dt: 1.0 / 60.0,
        }
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!(VisualizationMode::parse("orb"), Some(VisualizationMode::Orb));
        assert_eq!(
            VisualizationMode::parse("TUNNEL"),
            Some(VisualizationMode::Tunnel)
        );
        assert_eq!(VisualizationMode::parse("waveform"), None);
        assert_eq!(VisualizationMode::from_digit(6), Some(VisualizationMode::Matrix));
        assert_eq!(VisualizationMode::from_digit(0), None);
        assert_eq!(VisualizationMode::from_digit(7), None);
    }

    #[test]
    fn test_each_mode_fills_its_batch() {
        let tuning = test_tuning();
        let spectrum = [128u8; 1024];
        let theme = Theme::default();
        let mut viz = VisualizationRenderer::new(VisualizationMode::Orb, tuning.clone());

        let frame = viz.update(&quiet_input(&spectrum, &theme));
        assert_eq!(frame.sphere_instances.len(), 1);
        assert_eq!(frame.bauble_instances.len(), tuning.particles.count);

        viz.set_mode(VisualizationMode::Bars);
        let frame = viz.update(&quiet_input(&spectrum, &theme));
        assert_eq!(frame.cube_instances.len(), tuning.bars.count);
        assert!(frame.sphere_instances.is_empty());

        viz.set_mode(VisualizationMode::Vinyl);
        let frame = viz.update(&quiet_input(&spectrum, &theme));
        // Platter plus label.
        assert_eq!(frame.disc_instances.len(), 2);

        viz.set_mode(VisualizationMode::Tunnel);
        let frame = viz.update(&quiet_input(&spectrum, &theme));
        assert_eq!(
            frame.cube_instances.len(),
            tuning.tunnel.ring_count * tuning.tunnel.segments_per_ring
        );

        viz.set_mode(VisualizationMode::Matrix);
        let frame = viz.update(&quiet_input(&spectrum, &theme));
        assert_eq!(
            frame.cube_instances.len(),
            tuning.matrix.grid_size * tuning.matrix.grid_size
        );
    }

    #[test]
    fn test_mode_switch_preserves_inactive_state() {
        let spectrum = [200u8; 1024];
        let theme = Theme::default();
        let mut viz = VisualizationRenderer::new(VisualizationMode::Tunnel, test_tuning());

        // Let the tunnel travel for a while.
        for _ in 0..30 {
            viz.update(&quiet_input(&spectrum, &theme));
        }
        let traveled = viz.tunnel.distance();
        assert!(traveled > 0.0);

        // Other modes running must not touch the tunnel's distance.
        viz.set_mode(VisualizationMode::Orb);
        for _ in 0..30 {
            viz.update(&quiet_input(&spectrum, &theme));
        }
        assert_eq!(viz.tunnel.distance(), traveled);

        viz.set_mode(VisualizationMode::Tunnel);
        viz.update(&quiet_input(&spectrum, &theme));
        assert!(viz.tunnel.distance() > traveled);
    }

    #[test]
    fn test_particles_run_under_every_mode() {
        let spectrum = [0u8; 1024];
        let theme = Theme::default();
        let tuning = test_tuning();
        let count = tuning.particles.count;
        let mut viz = VisualizationRenderer::new(VisualizationMode::Orb, tuning);

        for mode in [
            VisualizationMode::Orb,
            VisualizationMode::Bars,
            VisualizationMode::Cube,
            VisualizationMode::Vinyl,
            VisualizationMode::Tunnel,
            VisualizationMode::Matrix,
        ] {
            viz.set_mode(mode);
            let frame = viz.update(&quiet_input(&spectrum, &theme));
            assert_eq!(frame.bauble_instances.len(), count, "{mode:?}");
        }
    }
}
