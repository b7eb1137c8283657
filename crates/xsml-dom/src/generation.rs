//! DOM Generation IDs
//!
//! Each node carries a version counter that increments whenever the node or
//! anything below it changes shape or attributes. Live collections compare a
//! stored generation against their anchor's current one to decide whether a
//! cached result is still valid.

/// Generation counter - incremented on every mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Generation(u64);

impl Generation {
    /// Initial generation (never mutated)
    pub const INITIAL: Self = Generation(0);

    /// Create a new generation
    #[inline]
    pub const fn new(value: u64) -> Self {
        Generation(value)
    }

    /// Get the raw value
    #[inline]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Get the next generation
    #[inline]
    pub const fn next(self) -> Self {
        Generation(self.0 + 1)
    }

    /// Check if this generation is newer than another
    #[inline]
    pub fn is_newer_than(self, other: Self) -> bool {
        self.0 > other.0
    }
}

/// Cached value with generation tracking
#[derive(Debug, Clone)]
pub struct Cached<T> {
    value: T,
    generation: Option<Generation>,
}

impl<T> Cached<T> {
    /// Create a cache that is stale until its first update
    pub fn stale(value: T) -> Self {
        Self { value, generation: None }
    }

    /// Get the value if still valid
    pub fn get_if_valid(&self, current: Generation) -> Option<&T> {
        if self.is_valid(current) {
            Some(&self.value)
        } else {
            None
        }
    }

    /// Get the value (even if stale)
    pub fn get(&self) -> &T {
        &self.value
    }

    /// Check if valid
    pub fn is_valid(&self, current: Generation) -> bool {
        self.generation == Some(current)
    }

    /// Replace the cached value and stamp it in one step
    pub fn update(&mut self, value: T, generation: Generation) {
        self.value = value;
        self.generation = Some(generation);
    }
}
