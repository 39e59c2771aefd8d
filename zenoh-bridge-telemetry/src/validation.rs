//! Plausibility filtering with last-known-good fallback.
//!
//! For each decoded value of a known parameter:
//!
//! 1. No rule: forward as-is, nothing is cached.
//! 2. Rule and in range: cache as last known good, forward.
//! 3. Rule and out of range: forward the last known good value if there is
//!    one, otherwise suppress the frame.
//!
//! The cache is only written in case 2, so the same out-of-range reading is
//! forwarded or suppressed depending on what came before it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::codec::RawValue;
use crate::registry::ParameterDescriptor;

/// Inclusive plausibility range. A missing bound is unbounded on that side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidRange {
    /// Lowest plausible value (inclusive).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    /// Highest plausible value (inclusive).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl ValidRange {
    /// Range with both bounds.
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    /// Range with only an upper bound.
    pub fn at_most(max: f64) -> Self {
        Self {
            min: None,
            max: Some(max),
        }
    }

    /// Range with only a lower bound.
    pub fn at_least(min: f64) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    /// Whether `value` lies within the bounds.
    pub fn contains(&self, value: f64) -> bool {
        self.min.is_none_or(|min| value >= min) && self.max.is_none_or(|max| value <= max)
    }

    /// Check the bounds themselves are usable.
    pub fn check(&self) -> Result<(), String> {
        for bound in [self.min, self.max].into_iter().flatten() {
            if !bound.is_finite() {
                return Err(format!("bound {} is not finite", bound));
            }
        }
        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min > max {
                return Err(format!("min {} is greater than max {}", min, max));
            }
        }
        Ok(())
    }
}

/// What validation decided for one reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    /// Parameter has no rule; forwarded unchecked and not cached.
    Unchecked(RawValue),
    /// Passed its rule; cached and forwarded.
    Accepted(RawValue),
    /// Failed its rule; the last known good value is forwarded instead.
    Fallback {
        rejected: RawValue,
        substitute: RawValue,
    },
    /// Failed its rule with nothing to fall back to; nothing is forwarded.
    Suppressed { rejected: RawValue },
}

impl Verdict {
    /// The value to forward, if any.
    pub fn forwarded(&self) -> Option<RawValue> {
        match self {
            Verdict::Unchecked(v) | Verdict::Accepted(v) => Some(*v),
            Verdict::Fallback { substitute, .. } => Some(*substitute),
            Verdict::Suppressed { .. } => None,
        }
    }

    /// True when the forwarded value is a substitute.
    pub fn is_fallback(&self) -> bool {
        matches!(self, Verdict::Fallback { .. })
    }
}

/// Last-known-good store, keyed by parameter name.
#[derive(Debug, Default)]
pub struct FallbackCache {
    last_good: HashMap<String, RawValue>,
}

impl FallbackCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `value` for `descriptor`, updating the cache on acceptance.
    pub fn evaluate(&mut self, descriptor: &ParameterDescriptor, value: RawValue) -> Verdict {
        let Some(rule) = descriptor.rule else {
            return Verdict::Unchecked(value);
        };

        if rule.contains(value.as_f64()) {
            self.last_good.insert(descriptor.name.clone(), value);
            return Verdict::Accepted(value);
        }

        match self.last_good.get(&descriptor.name) {
            Some(substitute) => Verdict::Fallback {
                rejected: value,
                substitute: *substitute,
            },
            None => Verdict::Suppressed { rejected: value },
        }
    }

    /// Most recent accepted value for a parameter.
    pub fn last_known_good(&self, parameter: &str) -> Option<RawValue> {
        self.last_good.get(parameter).copied()
    }

    /// Number of parameters with a cached value.
    pub fn len(&self) -> usize {
        self.last_good.len()
    }

    /// True when no value has been accepted yet.
    pub fn is_empty(&self) -> bool {
        self.last_good.is_empty()
    }
}

/// Cache shared by every source of the bridge; one writer at a time.
#[derive(Debug, Clone, Default)]
pub struct SharedCache(Arc<Mutex<FallbackCache>>);

impl SharedCache {
    /// Create an empty shared cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the cache. A panic in another holder does not invalidate the map.
    pub fn lock(&self) -> MutexGuard<'_, FallbackCache> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Validate under the lock.
    pub fn evaluate(&self, descriptor: &ParameterDescriptor, value: RawValue) -> Verdict {
        self.lock().evaluate(descriptor, value)
    }
}
