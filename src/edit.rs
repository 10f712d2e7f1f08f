//! Edit payloads, feature records, photo references and submission responses.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::FeatureLayer;

/// Point geometry of a feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    /// Longitude.
    pub x: f64,
    /// Latitude.
    pub y: f64,
}

/// Attributes every feature carries, plus layer-specific fields kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attributes {
    /// Client-generated feature guid.
    pub guid: String,
    /// ISO-8601 creation time of the report.
    #[serde(rename = "reportCreated")]
    pub report_created: String,
    /// Remaining layer-specific attributes.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Attributes {
    /// Builds attributes with a fresh guid stamped at `report_created`.
    pub fn new(report_created: impl Into<String>) -> Self {
        Self {
            guid: uuid::Uuid::new_v4().to_string(),
            report_created: report_created.into(),
            extra: Map::new(),
        }
    }

    /// Sets one layer-specific attribute.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Geometry plus attribute record inside an [`Edit`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Optional point geometry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Geometry>,
    /// Feature attributes.
    pub attributes: Attributes,
}

/// One intended mutation against a single remote feature layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edit {
    /// Target layer.
    pub id: FeatureLayer,
    /// Features to create.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adds: Option<Vec<Feature>>,
    /// Features to update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updates: Option<Vec<Feature>>,
}

impl Edit {
    /// Edit that adds `features` to `layer`.
    pub fn adds(layer: FeatureLayer, features: Vec<Feature>) -> Self {
        Self {
            id: layer,
            adds: Some(features),
            updates: None,
        }
    }

    /// Edit that updates `features` on `layer`.
    pub fn updates(layer: FeatureLayer, features: Vec<Feature>) -> Self {
        Self {
            id: layer,
            adds: None,
            updates: Some(features),
        }
    }

    /// Attributes of the first added feature, else the first updated one.
    ///
    /// A present but empty `adds` list yields `None` without looking at
    /// `updates`.
    pub fn first_attributes(&self) -> Option<&Attributes> {
        match (&self.adds, &self.updates) {
            (Some(adds), _) => adds.first().map(|f| &f.attributes),
            (None, Some(updates)) => updates.first().map(|f| &f.attributes),
            (None, None) => None,
        }
    }
}

/// Photo attached to a queue entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PhotoReference {
    /// Base64 content, optionally as a `data:` URL.
    Embedded(String),
    /// File on the device.
    File {
        /// Filesystem path.
        path: String,
        /// Path usable as an image source by a UI layer.
        #[serde(rename = "webPath")]
        web_path: String,
    },
}

/// Per-edit result returned by the remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditResponse {
    /// Layer id the result refers to.
    pub id: i64,
    /// Present when the edit was rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<EditResponseError>,
}

/// Rejection detail inside an [`EditResponse`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditResponseError {
    /// Numeric error code.
    pub code: i64,
    /// JSON-encoded object with template variables and a `placeholder` text.
    pub description: String,
}
