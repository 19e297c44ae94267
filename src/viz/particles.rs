//! Ambient particle field rendered underneath every mode.
//!
//! Each particle follows a closed Lissajous-style orbit parameterized by
//! its own phase `t`; overall field excitement (the spectrum average)
//! speeds every orbit up, and each particle's size tracks one bin.

use glam::{Mat4, Vec3};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::params::{frame_lerp, ParticleTuning};
use crate::viz::{FrameInput, Instance, SceneFrame};

/// Maps the raw orbit coordinates (tuned in a roughly ±60 space) into
/// scene units.
const WORLD_SCALE: f32 = 0.1;

struct Particle {
    t: f32,
    factor: f32,
    speed: f32,
    x_factor: f32,
    y_factor: f32,
    z_factor: f32,
    color: Vec3,
}

pub struct ParticleField {
    particles: Vec<Particle>,
}

impl ParticleField {
    pub fn new(tuning: &ParticleTuning) -> Self {
        let mut rng = StdRng::seed_from_u64(tuning.seed);
        let particles = (0..tuning.count)
            .map(|_| Particle {
                t: rng.gen::<f32>() * 100.0,
                factor: 20.0 + rng.gen::<f32>() * 100.0,
                speed: 0.01 + rng.gen::<f32>() / 200.0,
                x_factor: rng.gen_range(-50.0..50.0),
                y_factor: rng.gen_range(-50.0..50.0),
                z_factor: rng.gen_range(-50.0..50.0),
                color: crate::theme::Theme::default().secondary,
            })
            .collect();
        Self { particles }
    }

    pub fn update(&mut self, input: &FrameInput, tuning: &ParticleTuning, frame: &mut SceneFrame) {
        let excitement = input.bands.average;
        // Phase advance is tuned per 60 fps frame; scale by dt to stay
        // framerate independent.
        let steps = input.dt * 60.0;
        let ck = frame_lerp(tuning.color_smoothing, input.dt);

        let bins = input.spectrum.len().max(1);
        let count = self.particles.len().max(1);

        for (i, p) in self.particles.iter_mut().enumerate() {
            p.t += (p.speed * 0.5 + excitement * 0.01 * tuning.excitement_gain) * steps;
            let t = p.t;

            let x = p.x_factor + (t / 10.0 * p.factor).cos() + (t).sin() * p.factor / 10.0;
            let y = p.y_factor + (t / 10.0 * p.factor).sin() + (t * 2.0).cos() * p.factor / 10.0;
            let z = p.z_factor + (t / 10.0 * p.factor).cos() + (t * 3.0).sin() * p.factor / 10.0;
            let position = Vec3::new(x, y, z) * WORLD_SCALE;

            let bin = i * bins / count;
            let level = input
                .spectrum
                .get(bin)
                .map(|&b| b as f32 / 255.0)
                .unwrap_or(0.0);
            // Each orbit breathes with its own phase on top of the
            // audio-driven size.
            let pulse = 0.75 + 0.25 * t.cos().abs();
            let scale = (tuning.base_scale + level * tuning.scale_gain) * pulse;

            p.color = p.color.lerp(input.theme.secondary, ck);

            let model = Mat4::from_translation(position) * Mat4::from_scale(Vec3::splat(scale));
            frame.bauble_instances.push(Instance::solid(model, p.color));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectrum::FrequencyBands;
    use crate::theme::Theme;

    fn tuning(count: usize) -> ParticleTuning {
        ParticleTuning {
            count,
            ..Default::default()
        }
    }

    fn input<'a>(
        spectrum: &'a [u8],
        average: f32,
        theme: &'a Theme,
    ) -> FrameInput<'a> {
        FrameInput {
            spectrum,
            bands: FrequencyBands {
                average,
                ..Default::default()
            },
            theme,
            time: 0.0,
            dt: 1.0 / 60.0,
        }
    }

    #[test]
    fn test_seeded_fields_are_identical() {
        let t = tuning(32);
        let a = ParticleField::new(&t);
        let b = ParticleField::new(&t);
        for (pa, pb) in a.particles.iter().zip(&b.particles) {
            assert_eq!(pa.t, pb.t);
            assert_eq!(pa.factor, pb.factor);
            assert_eq!(pa.x_factor, pb.x_factor);
        }
    }

    #[test]
    fn test_excitement_speeds_up_orbits() {
        let t = tuning(8);
        let theme = Theme::default();
        let spectrum = [0u8; 1024];

        let mut calm = ParticleField::new(&t);
        let mut excited = ParticleField::new(&t);
        let mut frame = SceneFrame::default();

        for _ in 0..60 {
            frame.clear();
            calm.update(&input(&spectrum, 0.0, &theme), &t, &mut frame);
            frame.clear();
            excited.update(&input(&spectrum, 1.0, &theme), &t, &mut frame);
        }

        for (c, e) in calm.particles.iter().zip(&excited.particles) {
            assert!(e.t > c.t);
        }
    }

    #[test]
    fn test_loud_bins_enlarge_particles() {
        let t = tuning(4);
        let theme = Theme::default();
        let mut field = ParticleField::new(&t);
        let mut frame = SceneFrame::default();

        let silent = [0u8; 1024];
        field.update(&input(&silent, 0.0, &theme), &t, &mut frame);
        let small: Vec<f32> = frame
            .bauble_instances
            .iter()
            .map(|i| i.model[0][0])
            .collect();

        frame.clear();
        let loud = [255u8; 1024];
        field.update(&input(&loud, 0.0, &theme), &t, &mut frame);
        for (inst, base) in frame.bauble_instances.iter().zip(&small) {
            assert!(inst.model[0][0] > *base);
        }
    }
}
