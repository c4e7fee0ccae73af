//! Fractal (Sierpinski) wallet addressing.
//!
//! A position `(level, index)` names one triangle of a recursive subdivision:
//! level 0 is the whole triangle and every triangle at level `l` splits into
//! `branching_factor` corner triangles at level `l + 1`. The index, written in
//! base `branching_factor` and padded to `level` digits, is the path of corner
//! choices from the root down to that triangle.
//!
//! Addresses have the form `SPK-{level}-{path}-{check}`, where the root uses
//! the path `R` and `check` is 8 hex chars of SHA-256 over the level and path.

use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

pub const ADDRESS_PREFIX: &str = "SPK";
pub const ROOT_PATH: &str = "R";
pub const DEFAULT_BRANCHING_FACTOR: u8 = 3;
pub const DEFAULT_MAX_DEPTH: u32 = 8;
/// Digits are single decimal characters.
pub const MAX_BRANCHING_FACTOR: u8 = 10;

const CHECK_LEN: usize = 8;

/// A triangle in the subdivision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FractalPosition {
    pub level: u32,
    pub index: u64,
}

impl FractalPosition {
    pub const ROOT: FractalPosition = FractalPosition { level: 0, index: 0 };

    pub fn new(level: u32, index: u64) -> Self {
        FractalPosition { level, index }
    }

    pub fn is_root(&self) -> bool {
        self.level == 0
    }
}

impl fmt::Display for FractalPosition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {})", self.level, self.index)
    }
}

/// Shape of the address space: how many children each triangle has and how
/// deep the hierarchy may grow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FractalAddressing {
    pub branching_factor: u8,
    pub max_depth: u32,
}

impl Default for FractalAddressing {
    fn default() -> Self {
        FractalAddressing {
            branching_factor: DEFAULT_BRANCHING_FACTOR,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl FractalAddressing {
    pub fn new(branching_factor: u8, max_depth: u32) -> Result<Self> {
        let addressing = FractalAddressing {
            branching_factor,
            max_depth,
        };
        addressing.validate()?;
        Ok(addressing)
    }

    pub fn validate(&self) -> Result<()> {
        if self.branching_factor < 2 || self.branching_factor > MAX_BRANCHING_FACTOR {
            return Err(LedgerError::Config(format!(
                "branching_factor must be between 2 and {}, got {}",
                MAX_BRANCHING_FACTOR, self.branching_factor
            )));
        }
        if self.max_depth == 0 {
            return Err(LedgerError::Config(
                "max_depth must be at least 1".to_string(),
            ));
        }
        if (self.branching_factor as u64)
            .checked_pow(self.max_depth)
            .is_none()
        {
            return Err(LedgerError::Config(format!(
                "branching_factor^max_depth ({}^{}) overflows the index space",
                self.branching_factor, self.max_depth
            )));
        }
        Ok(())
    }

    /// Number of addressable positions at `level`, or `None` past the depth bound.
    pub fn capacity(&self, level: u32) -> Option<u64> {
        if level > self.max_depth {
            return None;
        }
        (self.branching_factor as u64).checked_pow(level)
    }

    pub fn contains(&self, position: FractalPosition) -> bool {
        self.capacity(position.level)
            .is_some_and(|cap| position.index < cap)
    }

    /// Parent triangle, `None` for the root.
    pub fn parent(&self, position: FractalPosition) -> Option<FractalPosition> {
        if position.is_root() {
            return None;
        }
        Some(FractalPosition::new(
            position.level - 1,
            position.index / self.branching_factor as u64,
        ))
    }

    pub fn encode(&self, level: u32, index: u64) -> Result<String> {
        let position = FractalPosition::new(level, index);
        if !self.contains(position) {
            return Err(LedgerError::InvalidPosition(format!(
                "index {} out of range for level {} (branching factor {}, max depth {})",
                index, level, self.branching_factor, self.max_depth
            )));
        }
        let path = self.path_digits(position);
        Ok(format!(
            "{}-{}-{}-{}",
            ADDRESS_PREFIX,
            level,
            path,
            checksum(level, &path)
        ))
    }

    pub fn encode_position(&self, position: FractalPosition) -> Result<String> {
        self.encode(position.level, position.index)
    }

    pub fn decode(&self, address: &str) -> Result<(u32, u64)> {
        let position = self.decode_position(address)?;
        Ok((position.level, position.index))
    }

    pub fn decode_position(&self, address: &str) -> Result<FractalPosition> {
        let malformed = |reason: &str| {
            LedgerError::MalformedAddress(format!("'{}': {}", address, reason))
        };

        let mut parts = address.split('-');
        let (prefix, level, path, check) =
            match (parts.next(), parts.next(), parts.next(), parts.next(), parts.next()) {
                (Some(p), Some(l), Some(path), Some(c), None) => (p, l, path, c),
                _ => return Err(malformed("expected SPK-<level>-<path>-<check>")),
            };

        if prefix != ADDRESS_PREFIX {
            return Err(malformed("unknown prefix"));
        }
        // Reject signs, leading zeros and other non-canonical spellings.
        if level.is_empty()
            || !level.bytes().all(|b| b.is_ascii_digit())
            || (level.len() > 1 && level.starts_with('0'))
        {
            return Err(malformed("level is not a canonical number"));
        }
        let level: u32 = level.parse().map_err(|_| malformed("level out of range"))?;
        if level > self.max_depth {
            return Err(malformed("level exceeds the configured depth"));
        }

        let index = if level == 0 {
            if path != ROOT_PATH {
                return Err(malformed("root path must be R"));
            }
            0
        } else {
            if path.len() != level as usize {
                return Err(malformed("path length does not match level"));
            }
            let base = self.branching_factor as u64;
            let mut index: u64 = 0;
            for c in path.chars() {
                let digit = c
                    .to_digit(10)
                    .map(u64::from)
                    .filter(|d| *d < base)
                    .ok_or_else(|| malformed("path digit out of range"))?;
                index = index
                    .checked_mul(base)
                    .and_then(|i| i.checked_add(digit))
                    .ok_or_else(|| malformed("path overflows the index space"))?;
            }
            index
        };

        if check.len() != CHECK_LEN || check != checksum(level, path) {
            return Err(malformed("checksum mismatch"));
        }

        Ok(FractalPosition::new(level, index))
    }

    pub fn is_valid_address(&self, address: &str) -> bool {
        self.decode_position(address).is_ok()
    }

    fn path_digits(&self, position: FractalPosition) -> String {
        if position.is_root() {
            return ROOT_PATH.to_string();
        }
        let base = self.branching_factor as u64;
        let mut digits = vec![b'0'; position.level as usize];
        let mut rest = position.index;
        for slot in digits.iter_mut().rev() {
            *slot = b'0' + (rest % base) as u8;
            rest /= base;
        }
        String::from_utf8_lossy(&digits).into_owned()
    }
}

fn checksum(level: u32, path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}|{}|{}", ADDRESS_PREFIX, level, path).as_bytes());
    let digest: [u8; 32] = hasher.finalize().into();
    hex::encode(&digest[..CHECK_LEN / 2])
}
