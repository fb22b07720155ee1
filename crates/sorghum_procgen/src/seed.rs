/// Seed derivation for per-sample and per-plant randomness.
/// Deterministic: the same base seed and indices always give the same seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlantSeed {
    pub value: u32,
}

impl PlantSeed {
    pub fn new(seed: u32) -> Self {
        Self { value: seed }
    }

    /// Boost-style hash combine:
    /// seed ^ (value + 0x9e3779b9 + (seed << 6) + (seed >> 2))
    pub fn hash_combine(&self, value: u32) -> u32 {
        let seed = self.value;
        seed ^ (value
            .wrapping_add(0x9e3779b9)
            .wrapping_add(seed << 6)
            .wrapping_add(seed >> 2))
    }

    pub fn combine(&self, value: u32) -> PlantSeed {
        PlantSeed::new(self.hash_combine(value))
    }

    pub fn combine_multiple(&self, values: &[u32]) -> PlantSeed {
        values.iter().fold(*self, |seed, &value| seed.combine(value))
    }

    /// Seed of the `sample`-th dataset sample
    pub fn for_sample(&self, sample: u32) -> PlantSeed {
        self.combine(sample)
    }

    /// Seed of plant `plant` inside sample `sample`
    pub fn for_plant(&self, sample: u32, plant: u32) -> PlantSeed {
        self.combine_multiple(&[sample, plant])
    }

    /// Widened for `SeedableRng::seed_from_u64`
    pub fn as_u64(&self) -> u64 {
        u64::from(self.value)
    }
}

impl From<u32> for PlantSeed {
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}
