//! Per-mode animation state and scene assembly.
//!
//! Every state struct persists across mode switches; `update` is only
//! called while its mode is active, so rotation angles, smoothed levels,
//! and travel distances freeze in place when the user switches away.

use std::f32::consts::TAU;

use glam::{Mat4, Quat, Vec3};
use noise::{NoiseFn, Perlin};

use crate::params::{
    frame_lerp, BarsTuning, CubeTuning, MatrixTuning, OrbTuning, TunnelTuning, VinylTuning,
};
use crate::viz::geometry::{self, Vertex};
use crate::viz::{FrameInput, Instance, SceneFrame};

pub const ORB_RINGS: usize = 48;
pub const ORB_SEGMENTS: usize = 64;

/// Keeps surface displacement visually proportional without letting high
/// distortion tear the sphere apart.
const ORB_DISPLACE: f32 = 0.35;

/// Mean level of the first `span` bins, normalized to [0, 1].
fn span_level(spectrum: &[u8], span: usize) -> f32 {
    let take = span.min(spectrum.len());
    if take == 0 {
        return 0.0;
    }
    let sum: u32 = spectrum[..take].iter().map(|&b| b as u32).sum();
    sum as f32 / take as f32 / 255.0
}

/// Deformable sphere: bass drives scale, treble drives Perlin surface
/// distortion, color eases toward the theme primary.
pub struct OrbState {
    scale: f32,
    distort: f32,
    color: Vec3,
    rot_x: f32,
    rot_y: f32,
    perlin: Perlin,
    base: Vec<Vertex>,
    deformed: Vec<Vertex>,
}

impl OrbState {
    pub fn new(tuning: &OrbTuning) -> Self {
        let mesh = geometry::uv_sphere(ORB_RINGS, ORB_SEGMENTS);
        Self {
            scale: tuning.scale_range.0,
            distort: tuning.distort_range.0,
            color: crate::theme::Theme::default().primary,
            rot_x: 0.0,
            rot_y: 0.0,
            perlin: Perlin::new(7),
            deformed: mesh.vertices.clone(),
            base: mesh.vertices,
        }
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.deformed
    }

    pub fn update(&mut self, input: &FrameInput, tuning: &OrbTuning, frame: &mut SceneFrame) {
        let target_scale =
            tuning.scale_range.0 + input.bands.bass * (tuning.scale_range.1 - tuning.scale_range.0);
        let target_distort = tuning.distort_range.0
            + input.bands.treble * (tuning.distort_range.1 - tuning.distort_range.0);

        let k = frame_lerp(tuning.smoothing, input.dt);
        self.scale += (target_scale - self.scale) * k;
        self.distort += (target_distort - self.distort) * k;

        let ck = frame_lerp(tuning.color_smoothing, input.dt);
        self.color = self.color.lerp(input.theme.primary, ck);

        self.rot_x += tuning.spin.0 * input.dt;
        self.rot_y += tuning.spin.1 * input.dt;

        // Radial Perlin displacement along each vertex normal; the noise
        // field drifts over time so the surface boils rather than
        // freezes.
        let f = tuning.distort_frequency;
        let t = input.time * 0.6;
        for (out, base) in self.deformed.iter_mut().zip(&self.base) {
            let dir = Vec3::from_array(base.position);
            let noise = self.perlin.get([
                (dir.x * f + t) as f64,
                (dir.y * f) as f64,
                (dir.z * f - t * 0.7) as f64,
            ]) as f32;
            let radius = 1.0 + noise * self.distort * ORB_DISPLACE;
            out.position = (dir * radius).to_array();
            out.normal = base.normal;
        }

        let model = Mat4::from_rotation_y(self.rot_y)
            * Mat4::from_rotation_x(self.rot_x)
            * Mat4::from_scale(Vec3::splat(self.scale));
        frame.sphere_instances.push(Instance::solid(model, self.color));
    }
}

/// Circular ring of bars; each bar tracks one spectrum bin with smoothed
/// height and a primary-to-secondary color sweep around the ring.
pub struct BarsState {
    heights: Vec<f32>,
}

impl BarsState {
    pub fn new(tuning: &BarsTuning) -> Self {
        Self {
            heights: vec![tuning.floor_height; tuning.count],
        }
    }

    pub fn update(&mut self, input: &FrameInput, tuning: &BarsTuning, frame: &mut SceneFrame) {
        let k = frame_lerp(tuning.smoothing, input.dt);

        for (i, height) in self.heights.iter_mut().enumerate() {
            let bin = i * tuning.bin_span / tuning.count;
            let level = input
                .spectrum
                .get(bin)
                .map(|&b| b as f32 / 255.0)
                .unwrap_or(0.0);
            let target = tuning.floor_height + level * tuning.height_range;
            *height += (target - *height) * k;

            let angle = i as f32 / tuning.count as f32 * TAU;
            let position = Vec3::new(
                angle.cos() * tuning.radius,
                *height * 0.5 - 1.5,
                angle.sin() * tuning.radius,
            );
            let color = input
                .theme
                .primary
                .lerp(input.theme.secondary, i as f32 / tuning.count as f32);

            let model = Mat4::from_translation(position)
                * Mat4::from_rotation_y(-angle)
                * Mat4::from_scale(Vec3::new(tuning.thickness, *height, tuning.thickness));
            frame.cube_instances.push(Instance::solid(model, color));
        }
    }
}

/// Single cube: averaged low-spectrum energy drives scale and a wobble
/// that squashes and stretches it on the beat.
pub struct CubeState {
    scale: f32,
    color: Vec3,
    rot_x: f32,
    rot_y: f32,
}

impl CubeState {
    pub fn new() -> Self {
        Self {
            scale: 1.0,
            color: crate::theme::Theme::default().accent,
            rot_x: 0.0,
            rot_y: 0.0,
        }
    }

    pub fn update(&mut self, input: &FrameInput, tuning: &CubeTuning, frame: &mut SceneFrame) {
        let energy = span_level(input.spectrum, tuning.bin_span);

        let target = 1.0 + energy * tuning.scale_gain;
        self.scale += (target - self.scale) * frame_lerp(tuning.smoothing, input.dt);
        self.color = self.color.lerp(
            input.theme.accent,
            frame_lerp(tuning.color_smoothing, input.dt),
        );

        self.rot_x += tuning.spin.0 * input.dt;
        self.rot_y += tuning.spin.1 * input.dt;

        let wobble = (input.time * tuning.wobble_rate).sin() * energy * tuning.wobble_gain;
        let scale = Vec3::new(
            self.scale * (1.0 + wobble),
            self.scale * (1.0 - wobble),
            self.scale * (1.0 + wobble * 0.5),
        );

        let model = Mat4::from_rotation_y(self.rot_y)
            * Mat4::from_rotation_x(self.rot_x)
            * Mat4::from_scale(scale);
        frame.cube_instances.push(Instance::solid(model, self.color));
    }
}

/// Spinning record: spin rate rides the bass, the platter pulses, and the
/// label disc carries the current track's cover art texture.
pub struct VinylState {
    angle: f32,
    pulse: f32,
}

impl VinylState {
    pub fn new() -> Self {
        Self {
            angle: 0.0,
            pulse: 1.0,
        }
    }

    pub fn update(&mut self, input: &FrameInput, tuning: &VinylTuning, frame: &mut SceneFrame) {
        let bass = span_level(input.spectrum, tuning.bin_span);

        self.angle += (tuning.base_spin + bass * tuning.bass_spin_gain) * input.dt;
        let target = 1.0 + bass * tuning.pulse_gain;
        self.pulse += (target - self.pulse) * frame_lerp(0.25, input.dt);

        let tilt = (input.time * tuning.tilt_rate).sin() * tuning.tilt_amplitude;
        let orient = Mat4::from_quat(
            Quat::from_rotation_x(tilt) * Quat::from_rotation_y(self.angle),
        );

        let platter_scale = tuning.disc_radius * self.pulse;
        let platter = orient * Mat4::from_scale(Vec3::new(platter_scale, 1.0, platter_scale));
        frame
            .disc_instances
            .push(Instance::solid(platter, Vec3::splat(0.05)));

        // Label floats a hair above the platter to avoid z-fighting.
        let label = orient
            * Mat4::from_translation(Vec3::new(0.0, 0.01, 0.0))
            * Mat4::from_scale(Vec3::new(tuning.label_radius, 1.0, tuning.label_radius));
        frame.disc_instances.push(Instance::textured(label));
    }
}

/// Rings of cubes scrolling toward the viewer along a looping depth axis;
/// travel speed rides the bass and strong beats flash the accent color.
pub struct TunnelState {
    distance: f32,
}

impl TunnelState {
    pub fn new() -> Self {
        Self { distance: 0.0 }
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn update(&mut self, input: &FrameInput, tuning: &TunnelTuning, frame: &mut SceneFrame) {
        let bass = span_level(input.spectrum, tuning.bin_span);

        self.distance += (tuning.base_speed + bass * tuning.speed_gain) * input.dt;
        let radius = tuning.radius + bass * bass * tuning.radius_gain;
        let segment_scale = 0.25 + bass * 0.35;

        let flash = if bass > tuning.flash_threshold {
            (bass - tuning.flash_threshold) / (1.0 - tuning.flash_threshold)
        } else {
            0.0
        };

        let spacing = tuning.length / tuning.ring_count as f32;
        for ring in 0..tuning.ring_count {
            let depth =
                (ring as f32 * spacing + self.distance).rem_euclid(tuning.length);
            let depth_norm = depth / tuning.length;
            let z = depth - tuning.length * 0.5;

            // Rings twist slightly with depth and time.
            let twist = depth_norm * TAU * 0.5 + input.time * 0.2;

            let mut color = input.theme.secondary.lerp(input.theme.primary, depth_norm);
            color = color.lerp(input.theme.accent, flash);

            for segment in 0..tuning.segments_per_ring {
                let angle = segment as f32 / tuning.segments_per_ring as f32 * TAU + twist;
                let position = Vec3::new(angle.cos() * radius, angle.sin() * radius, z);

                let model = Mat4::from_translation(position)
                    * Mat4::from_rotation_z(angle)
                    * Mat4::from_scale(Vec3::splat(segment_scale));
                frame.cube_instances.push(Instance::solid(model, color));
            }
        }
    }
}

/// Flat grid of pillars below the scene; center distance maps each cell
/// onto a low-spectrum bin, so energy ripples outward from the middle.
pub struct MatrixState {
    heights: Vec<f32>,
}

impl MatrixState {
    pub fn new(tuning: &MatrixTuning) -> Self {
        Self {
            heights: vec![tuning.floor_height; tuning.grid_size * tuning.grid_size],
        }
    }

    pub fn update(&mut self, input: &FrameInput, tuning: &MatrixTuning, frame: &mut SceneFrame) {
        let n = tuning.grid_size;
        let half = (n as f32 - 1.0) * 0.5;
        let max_dist = (half * half * 2.0).sqrt().max(1.0);
        let k = frame_lerp(0.3, input.dt);

        for gz in 0..n {
            for gx in 0..n {
                let cx = gx as f32 - half;
                let cz = gz as f32 - half;
                let dist_norm = (cx * cx + cz * cz).sqrt() / max_dist;

                let bin = ((dist_norm * (tuning.bin_span.saturating_sub(1)) as f32) as usize)
                    .min(tuning.bin_span.saturating_sub(1));
                let level = input
                    .spectrum
                    .get(bin)
                    .map(|&b| b as f32 / 255.0)
                    .unwrap_or(0.0);

                let idx = gz * n + gx;
                let target = tuning.floor_height + level * tuning.height_range;
                self.heights[idx] += (target - self.heights[idx]) * k;
                let height = self.heights[idx];

                let position = Vec3::new(
                    cx * tuning.spacing,
                    tuning.floor_y + height * 0.5,
                    cz * tuning.spacing,
                );
                let color = input.theme.primary.lerp(input.theme.accent, level);

                let model = Mat4::from_translation(position)
                    * Mat4::from_scale(Vec3::new(
                        tuning.spacing * 0.8,
                        height,
                        tuning.spacing * 0.8,
                    ));
                frame.cube_instances.push(Instance::solid(model, color));
            }
        }
    }
}
