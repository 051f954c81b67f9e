//! Additive payload checksum
//!
//! The checksum is the two's-complement negation of the byte sum, so that
//! `sum(payload) + checksum == 0 (mod 2^32)`. It catches accidental
//! corruption such as a torn write or a single flipped byte. Reordered bytes
//! and flips that cancel each other out go undetected.

/// Streaming additive checksum
#[derive(Debug, Clone, Copy, Default)]
pub struct Checksum {
    sum: u32,
}

impl Checksum {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add bytes to the running sum
    pub fn update(&mut self, bytes: &[u8]) {
        self.sum = bytes
            .iter()
            .fold(self.sum, |acc, &b| acc.wrapping_add(u32::from(b)));
    }

    /// Negated sum of everything fed so far
    pub fn finalize(self) -> u32 {
        self.sum.wrapping_neg()
    }
}

/// Compute the checksum of a whole payload
pub fn compute(payload: &[u8]) -> u32 {
    let mut checksum = Checksum::new();
    checksum.update(payload);
    checksum.finalize()
}

/// Check a payload against a stored checksum
pub fn verify(payload: &[u8], stored: u32) -> bool {
    compute(payload) == stored
}
