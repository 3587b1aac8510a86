use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// Shared context of every event in a batch
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateHeader {
    pub config_name: String,
    pub group: String,
    pub application: String,
    pub pre_version: String,
    pub updated_version: String,
    pub transaction_id: String,
    pub timestamp: DateTime<Utc>,
    /// User recorded as `updated_by` once the batch is applied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    Add,
    Update,
    Delete,
}

/// Payload of an event; the shape decides the kind of node an `Add` creates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventValue {
    Scalar(String),
    List(Vec<String>),
}

impl EventValue {
    pub fn label(&self) -> &'static str {
        match self {
            EventValue::Scalar(_) => "scalar",
            EventValue::List(_) => "list",
        }
    }
}

impl From<&str> for EventValue {
    fn from(value: &str) -> Self {
        EventValue::Scalar(value.to_string())
    }
}

impl From<String> for EventValue {
    fn from(value: String) -> Self {
        EventValue::Scalar(value)
    }
}

impl From<Vec<String>> for EventValue {
    fn from(values: Vec<String>) -> Self {
        EventValue::List(values)
    }
}

/// One change inside a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEvent {
    pub event_type: EventType,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub application: String,
    #[serde(default)]
    pub config_name: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<EventValue>,
    #[serde(default)]
    pub pre_version: String,
    /// For `Add`: name of the new node; `path` then addresses its parent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub sequence: u64,
}

impl UpdateEvent {
    /// Event carrying the header's routing fields
    pub fn new(header: &UpdateHeader, event_type: EventType, path: impl Into<String>) -> Self {
        Self {
            event_type,
            group: header.group.clone(),
            application: header.application.clone(),
            config_name: header.config_name.clone(),
            path: path.into(),
            value: None,
            pre_version: header.pre_version.clone(),
            name: None,
            description: None,
            sequence: 0,
        }
    }

    pub fn with_value(mut self, value: impl Into<EventValue>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    /// Path of the node the event acts on: `path`, plus `name` for an `Add`
    pub fn target_path(&self) -> String {
        match (&self.event_type, &self.name) {
            (EventType::Add, Some(name)) => format!("{}.{}", self.path, name),
            _ => self.path.clone(),
        }
    }
}

/// Ordered set of events sharing one configuration and version context
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UpdateBatch {
    #[serde(default)]
    pub header: Option<UpdateHeader>,
    #[serde(default)]
    pub events: Vec<UpdateEvent>,
}

impl UpdateBatch {
    pub fn new(header: UpdateHeader, events: Vec<UpdateEvent>) -> Self {
        Self {
            header: Some(header),
            events,
        }
    }

    /// Decode the wire form
    ///
    /// # Errors
    ///
    /// `Serialization` for malformed JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// # Errors
    ///
    /// `Serialization` if encoding fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape_decodes() {
        let json = r#"{
            "header": {
                "configName": "cfg", "group": "G", "application": "A",
                "preVersion": "1.0", "updatedVersion": "1.1",
                "transactionId": "tx-1", "timestamp": "2024-01-01T00:00:00Z"
            },
            "events": [
                {"eventType": "Update", "group": "G", "application": "A",
                 "configName": "cfg", "path": "cfg.db$host", "value": "h2",
                 "preVersion": "1.0", "sequence": 1},
                {"eventType": "Add", "group": "G", "application": "A",
                 "configName": "cfg", "path": "cfg.db", "name": "ports",
                 "value": ["80", "443"], "preVersion": "1.0", "sequence": 2}
            ]
        }"#;

        let batch = UpdateBatch::from_json(json).unwrap();
        let header = batch.header.as_ref().unwrap();
        assert_eq!(header.transaction_id, "tx-1");
        assert_eq!(header.owner, None);
        assert_eq!(batch.events.len(), 2);
        assert_eq!(batch.events[0].value, Some(EventValue::Scalar("h2".to_string())));
        assert_eq!(
            batch.events[1].value,
            Some(EventValue::List(vec!["80".to_string(), "443".to_string()]))
        );
        assert_eq!(batch.events[1].target_path(), "cfg.db.ports");
    }

    #[test]
    fn test_missing_header_decodes_as_none() {
        let batch = UpdateBatch::from_json(r#"{"events": []}"#).unwrap();
        assert!(batch.header.is_none());
    }

    #[test]
    fn test_malformed_json_is_serialization_error() {
        let err = UpdateBatch::from_json("{not json").unwrap_err();
        assert!(matches!(err, crate::errors::ConfigError::Serialization { .. }));
    }

    #[test]
    fn test_event_builder_copies_routing_fields() {
        let header = UpdateHeader {
            config_name: "cfg".to_string(),
            group: "G".to_string(),
            application: "A".to_string(),
            pre_version: "1.0".to_string(),
            ..Default::default()
        };
        let event = UpdateEvent::new(&header, EventType::Delete, "cfg.db.host");
        assert_eq!(event.group, "G");
        assert_eq!(event.pre_version, "1.0");
        assert_eq!(event.target_path(), "cfg.db.host");
    }
}
