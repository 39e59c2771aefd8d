//! Parameter registry: identifier to name, topic and rule.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::{ParameterId, ValueEncoding};
use crate::validation::ValidRange;

/// A known parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParameterDescriptor {
    /// Wire identifier.
    pub id: ParameterId,

    /// Name used as the cache key and in published records.
    pub name: String,

    /// Bus topic, used verbatim.
    pub topic: String,

    /// Plausibility rule. Parameters without one are forwarded unchecked.
    #[serde(rename = "range", default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<ValidRange>,

    /// Encoding override for this identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<ValueEncoding>,
}

impl ParameterDescriptor {
    pub fn new(id: ParameterId, name: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            topic: topic.into(),
            rule: None,
            encoding: None,
        }
    }

    /// Attach a plausibility rule.
    pub fn with_rule(mut self, rule: ValidRange) -> Self {
        self.rule = Some(rule);
        self
    }

    /// Decode this identifier with a specific encoding.
    pub fn with_encoding(mut self, encoding: ValueEncoding) -> Self {
        self.encoding = Some(encoding);
        self
    }
}

/// Registry construction errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    #[error("identifier {0} is registered more than once")]
    DuplicateId(ParameterId),

    #[error("parameter name '{0}' is registered more than once")]
    DuplicateName(String),

    #[error("parameter {0} has an empty name")]
    EmptyName(ParameterId),

    #[error("parameter '{name}' has an invalid topic: {reason}")]
    InvalidTopic { name: String, reason: String },

    #[error("parameter '{name}' has an invalid range: {reason}")]
    InvalidRange { name: String, reason: String },
}

/// Result of looking up an identifier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution<'a> {
    Known(&'a ParameterDescriptor),
    Unknown(ParameterId),
}

/// Immutable identifier table, shared read-only across sources.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: HashMap<ParameterId, ParameterDescriptor>,
}

impl Registry {
    /// Build a registry, rejecting duplicate or malformed entries.
    pub fn new(descriptors: Vec<ParameterDescriptor>) -> Result<Self, RegistryError> {
        let mut entries = HashMap::with_capacity(descriptors.len());
        let mut names = HashSet::with_capacity(descriptors.len());

        for descriptor in descriptors {
            if descriptor.name.trim().is_empty() {
                return Err(RegistryError::EmptyName(descriptor.id));
            }
            if let Err(e) = hmi_common::validate_topic(&descriptor.topic) {
                return Err(RegistryError::InvalidTopic {
                    name: descriptor.name,
                    reason: e.to_string(),
                });
            }
            if let Some(rule) = &descriptor.rule {
                if let Err(reason) = rule.check() {
                    return Err(RegistryError::InvalidRange {
                        name: descriptor.name,
                        reason,
                    });
                }
            }
            if !names.insert(descriptor.name.clone()) {
                return Err(RegistryError::DuplicateName(descriptor.name));
            }
            if entries.contains_key(&descriptor.id) {
                return Err(RegistryError::DuplicateId(descriptor.id));
            }
            entries.insert(descriptor.id, descriptor);
        }

        Ok(Self { entries })
    }

    /// The stock vehicle table. Carries no rules; bounds come from configuration.
    pub fn reference() -> Self {
        let table = [
            (0x01, "battery_soc", "hmi/pcm/battery_soc"),
            (0x02, "temperature", "hmi/pcm/hv_battery_pack_temp"),
            (0x03, "front_motor_temp", "hmi/pcm/front_edu_reported_temp"),
            (0x04, "rear_motor_temp", "hmi/pcm/back_edu_reported_temp"),
            (0x05, "drive_mode", "hmi/pcm/drive_mode_active"),
        ];

        let entries = table
            .into_iter()
            .map(|(id, name, topic)| {
                let id = ParameterId(id);
                (id, ParameterDescriptor::new(id, name, topic))
            })
            .collect();

        Self { entries }
    }

    /// Descriptor for `id`, if registered.
    pub fn lookup(&self, id: ParameterId) -> Option<&ParameterDescriptor> {
        self.entries.get(&id)
    }

    /// Classify `id` as known or unknown.
    pub fn resolve(&self, id: ParameterId) -> Resolution<'_> {
        match self.entries.get(&id) {
            Some(descriptor) => Resolution::Known(descriptor),
            None => Resolution::Unknown(id),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Descriptors ordered by identifier.
    pub fn iter(&self) -> impl Iterator<Item = &ParameterDescriptor> {
        let mut descriptors: Vec<_> = self.entries.values().collect();
        descriptors.sort_by_key(|d| d.id);
        descriptors.into_iter()
    }
}
