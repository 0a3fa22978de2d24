//! Deterministic name hashing.
//!
//! Provides [`NameHash`], a 64-bit hash computed from symbol names with
//! xxhash. Hashes are deterministic across processes, which makes them
//! usable both as stable native-binding identifiers and as the ordering
//! key for functions placed into generated buckets (emission order must
//! not depend on declaration order).

use std::fmt;
use xxhash_rust::xxh64::xxh64;

/// Domain-specific mixing constants.
///
/// Distinct seeds keep function and binding hashes from colliding even
/// when the underlying names are equal.
mod seeds {
    /// Seed for function name hashes.
    pub const FUNCTION: u64 = 0x5ea7_7ffb_cdf5_f302;

    /// Seed for native binding identifiers.
    pub const NATIVE: u64 = 0x2fac_10b6_3a6c_c57c;
}

/// A deterministic 64-bit hash of a symbol name.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NameHash(pub u64);

impl NameHash {
    /// Hash a function name.
    pub fn of_function(name: &str) -> Self {
        Self(xxh64(name.as_bytes(), seeds::FUNCTION))
    }

    /// Hash a native binding name.
    pub fn of_native(name: &str) -> Self {
        Self(xxh64(name.as_bytes(), seeds::NATIVE))
    }

    /// The raw hash value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for NameHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NameHash({:#018x})", self.0)
    }
}

impl fmt::Display for NameHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}
