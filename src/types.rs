//! Shared primitive IDs and feature-layer enums.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Remote error code meaning the submission was already applied earlier.
pub const REQUEST_ALREADY_PROCESSED: i64 = 5701;

/// Owner of a persisted queue.
pub type UserId = String;

/// Stable identifier of a queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(Uuid);

impl EntryId {
    /// Generates a fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing uuid.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Underlying uuid.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::generate()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Remote feature layer an edit targets. Serialized as its integer id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum FeatureLayer {
    /// Directly observed animals.
    DirectlyObservedAnimalsObservation = 1,
    /// Signs of animal presence.
    SignsOfPresenceObservation = 2,
    /// Dead animal found.
    DeadObservation = 3,
    /// Damage to agricultural land.
    AgriculturalLandDamage = 4,
    /// Damage to forest.
    ForestDamage = 5,
    /// Damage to infrastructure.
    InfrastructureDamage = 6,
    /// Hunt report without a permit.
    UnlimitedHuntReport = 7,
    /// Hunt report that consumes a permit.
    LimitedHuntReport = 8,
}

/// Coarse category of a [`FeatureLayer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LayerGroup {
    /// Layers 1..=3.
    Observations,
    /// Layers 4..=6.
    Damage,
    /// Layers 7..=8.
    Hunt,
}

impl FeatureLayer {
    /// All layers in id order.
    pub const ALL: [FeatureLayer; 8] = [
        FeatureLayer::DirectlyObservedAnimalsObservation,
        FeatureLayer::SignsOfPresenceObservation,
        FeatureLayer::DeadObservation,
        FeatureLayer::AgriculturalLandDamage,
        FeatureLayer::ForestDamage,
        FeatureLayer::InfrastructureDamage,
        FeatureLayer::UnlimitedHuntReport,
        FeatureLayer::LimitedHuntReport,
    ];

    /// Numeric id used on the wire.
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Group the layer belongs to.
    pub fn group(self) -> LayerGroup {
        match self {
            FeatureLayer::DirectlyObservedAnimalsObservation
            | FeatureLayer::SignsOfPresenceObservation
            | FeatureLayer::DeadObservation => LayerGroup::Observations,
            FeatureLayer::AgriculturalLandDamage
            | FeatureLayer::ForestDamage
            | FeatureLayer::InfrastructureDamage => LayerGroup::Damage,
            FeatureLayer::UnlimitedHuntReport | FeatureLayer::LimitedHuntReport => LayerGroup::Hunt,
        }
    }
}

impl From<FeatureLayer> for u8 {
    fn from(value: FeatureLayer) -> Self {
        value.id()
    }
}

impl TryFrom<u8> for FeatureLayer {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        FeatureLayer::ALL
            .into_iter()
            .find(|layer| layer.id() == value)
            .ok_or_else(|| format!("unknown feature layer id: {value}"))
    }
}
