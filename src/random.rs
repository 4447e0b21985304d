use rand::{rngs::StdRng, Rng, SeedableRng};

/// Source of random integers for throttling and A/B sampling
/// Injected into the components that draw, so tests can force outcomes
pub trait RandomSourceTrait {
    /// Draw one integer in the inclusive range [low, high]
    fn next_in_range(&mut self, low: i64, high: i64) -> i64;
}

/// Random source backed by a seeded StdRng
pub struct RandomSourceStd {
    rng: StdRng,
}

impl RandomSourceStd {
    /// Create a source with a fixed seed (reproducible draws)
    pub fn new(seed: u64) -> Box<Self> {
        Box::new(Self { rng: StdRng::seed_from_u64(seed) })
    }
}

impl RandomSourceTrait for RandomSourceStd {
    fn next_in_range(&mut self, low: i64, high: i64) -> i64 {
        if high <= low {
            return low;
        }
        self.rng.gen_range(low..=high)
    }
}

/// Random source that always returns the same value, regardless of the requested range
pub struct RandomSourceFixed {
    pub value: i64,
}

impl RandomSourceFixed {
    pub fn new(value: i64) -> Box<Self> {
        Box::new(Self { value })
    }
}

impl RandomSourceTrait for RandomSourceFixed {
    fn next_in_range(&mut self, _low: i64, _high: i64) -> i64 {
        self.value
    }
}

/// Random source replaying a list of values, starting over when exhausted
pub struct RandomSourceSequence {
    values: Vec<i64>,
    position: usize,
}

impl RandomSourceSequence {
    pub fn new(values: Vec<i64>) -> Box<Self> {
        Box::new(Self { values, position: 0 })
    }

    /// Number of values handed out so far
    pub fn draws(&self) -> usize {
        self.position
    }
}

impl RandomSourceTrait for RandomSourceSequence {
    fn next_in_range(&mut self, low: i64, _high: i64) -> i64 {
        if self.values.is_empty() {
            return low;
        }
        let value = self.values[self.position % self.values.len()];
        self.position += 1;
        value
    }
}
