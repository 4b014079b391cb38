//! Domain models for the profile import pipeline.
//!
//! This module contains the core data structures used throughout the pipeline:
//!
//! - [`ProfileToImport`] - Typed, mergeable profile update produced per line
//! - [`PropertyValue`] - Coerced value of a single profile property
//! - [`PropertyType`] - Schema entry for a profile property
//! - [`ValueType`] - Declared value type of a property
//! - [`Profile`], [`Session`], [`Event`] - Types used by the event collector

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Scope stamped on every imported profile.
pub const SYSTEM_SCOPE: &str = "systemscope";

/// Item type of imported profiles.
pub const PROFILE_ITEM_TYPE: &str = "profile";

/// Target under which profile property types are registered.
pub const PROFILES_TARGET: &str = "profiles";

// =============================================================================
// Property Values
// =============================================================================

/// A coerced profile property value.
///
/// The variant is fully determined by the property's declared [`ValueType`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Boolean(bool),
    Integer(i32),
    String(String),
    Strings(Vec<String>),
}

// =============================================================================
// Property Types (schema)
// =============================================================================

/// Declared value type of a profile property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueType {
    String,
    Email,
    Boolean,
    Integer,
    /// Any type the importer does not coerce (date, long, geopoint...).
    Other(String),
}

impl ValueType {
    pub fn from_id(id: &str) -> Self {
        match id {
            "string" => ValueType::String,
            "email" => ValueType::Email,
            "boolean" => ValueType::Boolean,
            "integer" => ValueType::Integer,
            other => ValueType::Other(other.to_string()),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            ValueType::String => "string",
            ValueType::Email => "email",
            ValueType::Boolean => "boolean",
            ValueType::Integer => "integer",
            ValueType::Other(id) => id,
        }
    }

    /// String and email values share the same text handling.
    pub fn is_textual(&self) -> bool {
        matches!(self, ValueType::String | ValueType::Email)
    }
}

/// Schema entry describing one profile property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyType {
    /// Property identifier, as used in import mappings.
    pub item_id: String,

    /// Declared value type id (`string`, `email`, `boolean`, `integer`, ...).
    pub value_type_id: String,

    /// Whether the property holds several values. Absent means single-valued.
    #[serde(default)]
    pub multivalued: Option<bool>,

    /// Item type the property belongs to (`profiles`, `sessions`, ...).
    #[serde(default)]
    pub target: Option<String>,
}

impl PropertyType {
    pub fn new(item_id: impl Into<String>, value_type_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            value_type_id: value_type_id.into(),
            multivalued: None,
            target: Some(PROFILES_TARGET.to_string()),
        }
    }

    pub fn multivalued(mut self) -> Self {
        self.multivalued = Some(true);
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn value_type(&self) -> ValueType {
        ValueType::from_id(&self.value_type_id)
    }

    pub fn is_multivalued(&self) -> bool {
        self.multivalued == Some(true)
    }
}

// =============================================================================
// Profile Update Command
// =============================================================================

/// A typed profile update produced from one import line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileToImport {
    /// Freshly generated identifier.
    pub item_id: String,
    pub item_type: String,
    pub scope: String,
    pub properties: BTreeMap<String, PropertyValue>,
    /// Property used to find an existing profile to merge into.
    pub merging_property: Option<String>,
    pub properties_to_overwrite: Vec<String>,
    pub overwrite_existing_profiles: bool,
    /// Set when the line's delete column holds `true`.
    #[serde(default)]
    pub profile_to_delete: bool,
}

impl ProfileToImport {
    pub fn new(properties: BTreeMap<String, PropertyValue>) -> Self {
        Self {
            item_id: Uuid::new_v4().to_string(),
            item_type: PROFILE_ITEM_TYPE.to_string(),
            scope: SYSTEM_SCOPE.to_string(),
            properties,
            merging_property: None,
            properties_to_overwrite: Vec::new(),
            overwrite_existing_profiles: false,
            profile_to_delete: false,
        }
    }

    /// Equality ignoring the generated item id.
    pub fn same_update_as(&self, other: &ProfileToImport) -> bool {
        self.item_type == other.item_type
            && self.scope == other.scope
            && self.properties == other.properties
            && self.merging_property == other.merging_property
            && self.properties_to_overwrite == other.properties_to_overwrite
            && self.overwrite_existing_profiles == other.overwrite_existing_profiles
            && self.profile_to_delete == other.profile_to_delete
    }
}

// =============================================================================
// Event Collector Types
// =============================================================================

/// A stored visitor profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub item_id: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
    /// Personas are synthetic profiles and never receive collected events.
    #[serde(default)]
    pub persona: bool,
}

impl Profile {
    pub fn new(item_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            ..Self::default()
        }
    }
}

/// A visitor session bound to a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub item_id: String,
    pub profile_id: Option<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// One event as posted by a client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingEvent {
    pub event_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub source: Option<Value>,
    #[serde(default)]
    pub target: Option<Value>,
    #[serde(default)]
    pub properties: Option<Map<String, Value>>,
}

/// Body of an event collector request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventsCollectorRequest {
    pub events: Option<Vec<IncomingEvent>>,
}

/// An event bound to its session and profile, ready for the event service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub event_type: String,
    pub session_id: String,
    pub profile_id: String,
    pub scope: Option<String>,
    pub source: Option<Value>,
    pub target: Option<Value>,
    pub properties: Map<String, Value>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl Event {
    pub fn bind(
        incoming: IncomingEvent,
        event_type: String,
        session: &Session,
        profile: &Profile,
        timestamp: chrono::DateTime<chrono::Utc>,
    ) -> Self {
        Self {
            event_type,
            session_id: session.item_id.clone(),
            profile_id: profile.item_id.clone(),
            scope: incoming.scope,
            source: incoming.source,
            target: incoming.target,
            properties: incoming.properties.unwrap_or_default(),
            timestamp,
        }
    }
}
