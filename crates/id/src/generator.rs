//! Identifier type and collision-checked generator.

use crate::{IdError, IdResult};
use chrono::Utc;
use rand::rngs::OsRng;
use rand::RngCore;
use std::borrow::Borrow;
use std::collections::HashSet;
use std::{fmt, str::FromStr};

/// Length of a randomly generated identifier.
pub const ID_LENGTH: usize = 8;

/// Random tokens tried before falling back to the timestamp form.
pub const MAX_ATTEMPTS: usize = 1000;

const FALLBACK_SUFFIX_LENGTH: usize = 3;

const ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// A user identifier: a non-empty run of uppercase base-36 characters.
///
/// Once constructed the contained string is guaranteed to match `[A-Z0-9]+`, so it can be used
/// directly in paths and log lines.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(String);

impl UserId {
    /// Validates an externally supplied identifier.
    ///
    /// Lowercase input is rejected rather than normalised; identifiers are compared exactly.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::InvalidInput`] if `input` is empty or contains anything other than
    /// `0-9` and `A-Z`.
    pub fn parse(input: &str) -> IdResult<Self> {
        if Self::is_canonical(input) {
            return Ok(Self(input.to_owned()));
        }
        Err(IdError::InvalidInput(format!(
            "user id must be non-empty and contain only 0-9 and A-Z, got: '{}'",
            input
        )))
    }

    /// Returns true if `input` is a syntactically valid identifier.
    pub fn is_canonical(input: &str) -> bool {
        !input.is_empty()
            && input
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'A'..=b'Z'))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for UserId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UserId::parse(s)
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for UserId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for UserId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for UserId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        UserId::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Generates identifiers that are unique against the set of identifiers in use.
///
/// The generator owns the issued-ID set. Identifiers loaded from storage must be registered with
/// [`IdGenerator::reserve`], and identifiers of removed records handed back with
/// [`IdGenerator::release`], so the set always mirrors the live records.
///
/// The random source defaults to the operating system RNG. Any [`RngCore`] can be supplied with
/// [`IdGenerator::with_rng`], which is how tests force collisions.
pub struct IdGenerator<R = OsRng> {
    issued: HashSet<UserId>,
    rng: R,
    max_attempts: usize,
}

impl IdGenerator<OsRng> {
    pub fn new() -> Self {
        Self::with_rng(OsRng)
    }
}

impl Default for IdGenerator<OsRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> fmt::Debug for IdGenerator<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdGenerator")
            .field("issued", &self.issued.len())
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

impl<R: RngCore> IdGenerator<R> {
    /// Creates an empty generator drawing randomness from `rng`.
    pub fn with_rng(rng: R) -> Self {
        Self {
            issued: HashSet::new(),
            rng,
            max_attempts: MAX_ATTEMPTS,
        }
    }

    /// Overrides the number of random tokens tried before the timestamp fallback.
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Generates a fresh identifier and reserves it.
    ///
    /// Draws up to `max_attempts` random 8-character tokens, returning the first one not already
    /// issued. If every attempt collides, returns a timestamp-based identifier instead; when even
    /// that is taken the timestamp is advanced one millisecond at a time until a free value is
    /// found, so this always terminates while the issued set is finite.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::RandomSource`] if the random source fails.
    pub fn generate(&mut self) -> IdResult<UserId> {
        for _attempt in 0..self.max_attempts {
            let candidate = UserId(self.random_token(ID_LENGTH)?);
            if !self.issued.contains(&candidate) {
                self.issued.insert(candidate.clone());
                return Ok(candidate);
            }
        }

        let id = self.fallback()?;
        tracing::warn!(
            "no free random id after {} attempts, issued timestamp id {}",
            self.max_attempts,
            id
        );
        Ok(id)
    }

    /// Registers an identifier that is already in use.
    ///
    /// Returns `false` if it was already reserved.
    pub fn reserve(&mut self, id: UserId) -> bool {
        self.issued.insert(id)
    }

    /// Removes an identifier from the issued set so it no longer counts as live.
    ///
    /// Returns `false` if it was not reserved.
    pub fn release(&mut self, id: &str) -> bool {
        self.issued.remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.issued.contains(id)
    }

    pub fn len(&self) -> usize {
        self.issued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issued.is_empty()
    }

    pub fn clear(&mut self) {
        self.issued.clear();
    }

    fn fallback(&mut self) -> IdResult<UserId> {
        let suffix = self.random_token(FALLBACK_SUFFIX_LENGTH)?;
        let mut millis = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);

        loop {
            let candidate = UserId(format!("{}{}", encode_base36(millis), suffix));
            if !self.issued.contains(&candidate) {
                self.issued.insert(candidate.clone());
                return Ok(candidate);
            }
            millis = millis.wrapping_add(1);
        }
    }

    fn random_token(&mut self, len: usize) -> IdResult<String> {
        let mut bytes = [0u8; 8];
        self.rng
            .try_fill_bytes(&mut bytes)
            .map_err(IdError::RandomSource)?;

        let modulus = 36u64.pow(len as u32);
        let value = u64::from_le_bytes(bytes) % modulus;
        Ok(format!("{:0>len$}", encode_base36(value), len = len))
    }
}

/// Uppercase base-36 rendering without padding.
fn encode_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_owned();
    }

    let mut digits = Vec::new();
    while value > 0 {
        digits.push(char::from(ALPHABET[(value % 36) as usize]));
        value /= 36;
    }
    digits.iter().rev().collect()
}
