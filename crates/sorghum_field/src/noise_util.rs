use glam::Vec2;
use noise::{NoiseFn, Perlin};
use serde::{Deserialize, Serialize};

/// Octave layout of the ground roughness
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FbmSettings {
    pub octaves: u32,
    pub lacunarity: f32,
    pub persistence: f32,
    /// Base frequency in cycles per metre
    pub frequency: f32,
    pub seed: u32,
}

impl Default for FbmSettings {
    fn default() -> Self {
        Self {
            octaves: 4,
            lacunarity: 2.0,
            persistence: 0.5,
            frequency: 2.0,
            seed: 0,
        }
    }
}

/// Fractional Brownian Motion over Perlin noise, normalized to [-1, 1]
pub fn fbm(point: Vec2, settings: &FbmSettings) -> f32 {
    let noise = Perlin::new(settings.seed);
    let mut value = 0.0;
    let mut amplitude = 1.0;
    let mut frequency = settings.frequency;
    let mut max_value = 0.0;

    for _ in 0..settings.octaves {
        let sample = [point.x as f64 * frequency as f64, point.y as f64 * frequency as f64];
        value += noise.get(sample) as f32 * amplitude;
        max_value += amplitude;

        amplitude *= settings.persistence;
        frequency *= settings.lacunarity;
    }

    if max_value > 0.0 {
        value / max_value
    } else {
        0.0
    }
}
