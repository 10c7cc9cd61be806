//! Opaque identifier generation for synthesized `atom:id` values.
//!
//! Feeds and entries written without an identifier get one generated through
//! an injected [`IdGenerator`], so the policy is configurable per formatter
//! instead of living in a process-wide global.

use rand::RngExt;

/// Produces opaque, sufficiently unique identifier values.
///
/// Implementations must be safe to call from multiple threads; generators
/// are shared by reference inside a formatter.
pub trait IdGenerator: Send + Sync {
    /// Returns a fresh opaque identifier.
    fn next_id(&self) -> String;
}

/// Default generator: a `uuid:`-prefixed random 128-bit value.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIdGenerator;

impl IdGenerator for RandomIdGenerator {
    fn next_id(&self) -> String {
        let value: u128 = rand::rng().random();
        format!("uuid:{value:032x}")
    }
}
