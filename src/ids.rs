use uuid::Uuid;

/// Generator of unique ids for synthesized placeholder bids
pub trait IdGeneratorTrait {
    fn generate(&mut self) -> String;
}

/// Random (v4) UUIDs
pub struct IdGeneratorUuid;

impl IdGeneratorUuid {
    pub fn new() -> Box<Self> {
        Box::new(Self)
    }
}

impl IdGeneratorTrait for IdGeneratorUuid {
    fn generate(&mut self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Predictable ids of the form `<prefix>-1`, `<prefix>-2`, ...
pub struct IdGeneratorSequence {
    prefix: String,
    next: u64,
}

impl IdGeneratorSequence {
    pub fn new(prefix: &str) -> Box<Self> {
        Box::new(Self { prefix: prefix.to_string(), next: 1 })
    }
}

impl IdGeneratorTrait for IdGeneratorSequence {
    fn generate(&mut self) -> String {
        let id = format!("{}-{}", self.prefix, self.next);
        self.next += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_uuid_ids_are_unique() {
        let mut generator = IdGeneratorUuid::new();
        let ids: BTreeSet<String> = (0..100).map(|_| generator.generate()).collect();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn test_sequence_ids() {
        let mut generator = IdGeneratorSequence::new("default");
        assert_eq!(generator.generate(), "default-1");
        assert_eq!(generator.generate(), "default-2");
    }
}
