//! JSON interchange for header trees.
//!
//! Trees serialize to nested records of `type`, `key`, `value` and
//! `children` fields. Reconstruction applies the same kind and child
//! rules as live parsing, with sanitizing value ingestion.

use serde::{Deserialize, Serialize};

use crate::tree::{Header, NodeId, NodeKind};
use crate::{Error, Result};

/// Serialized form of one node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    /// The node kind name: `header`, `authservid`, `entry`, `subentry`,
    /// `comment` or `version`.
    #[serde(rename = "type")]
    pub node_type: String,
    /// Key, on entry and subentry records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Scalar value, or the nested identifier record on a header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<RecordValue>,
    /// Ordered child records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<NodeRecord>>,
}

/// A record value: scalar text, or the AuthServId subtree on a header.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordValue {
    /// Scalar value text.
    Text(String),
    /// Nested AuthServId record. Only valid on header records.
    Node(Box<NodeRecord>),
}

impl Header {
    /// Serializes the tree into its interchange record.
    #[must_use]
    pub fn to_record(&self) -> NodeRecord {
        self.record_for(self.root())
    }

    /// Serializes the tree as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if encoding fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_record())?)
    }

    /// Serializes the tree as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if encoding fails.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_record())?)
    }

    /// Reconstructs a tree from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] for malformed JSON, and any record error
    /// described on [`Header::from_record`].
    pub fn from_json(text: &str) -> Result<Self> {
        let record: NodeRecord = serde_json::from_str(text)?;
        Self::from_record(&record)
    }

    /// Reconstructs a tree from an interchange record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownType`] for unrecognized `type` fields,
    /// [`Error::UndefinedValue`] for version or comment records without
    /// a value, and the usual mutation errors when the record violates
    /// key, value or child rules.
    pub fn from_record(record: &NodeRecord) -> Result<Self> {
        let kind = record_kind(record)?;
        if kind != NodeKind::Header {
            return Err(Error::InvalidChildRelation(format!(
                "a {kind} record cannot be a header root"
            )));
        }

        let mut header = Self::new();

        if let Some(key) = &record.key {
            // Headers hold no key; surface the capability error.
            header.set_key(header.root(), key)?;
        }

        match &record.value {
            Some(RecordValue::Node(authserv_record)) => {
                let authserv = header.build_node(authserv_record)?;
                header.set_authserv(authserv)?;
            }
            Some(RecordValue::Text(_)) => {
                return Err(Error::InvalidChildRelation(
                    "a header value must be an authservid record".to_string(),
                ));
            }
            None => {}
        }

        for child_record in record.children.iter().flatten() {
            let child = header.build_node(child_record)?;
            header.add_child(header.root(), child)?;
        }

        Ok(header)
    }

    fn record_for(&self, id: NodeId) -> NodeRecord {
        let kind = self.kind(id);

        let value = if kind == NodeKind::Header {
            self.authserv()
                .map(|authserv| RecordValue::Node(Box::new(self.record_for(authserv))))
        } else {
            self.raw_value(id)
                .map(|value| RecordValue::Text(value.to_string()))
        };

        let children = self
            .children(id)
            .ok()
            .filter(|children| !children.is_empty())
            .map(|children| {
                children
                    .iter()
                    .map(|&child| self.record_for(child))
                    .collect()
            });

        NodeRecord {
            node_type: kind.name().to_string(),
            key: self.raw_key(id).map(ToString::to_string),
            value,
            children,
        }
    }

    /// Builds a detached subtree from a record.
    fn build_node(&mut self, record: &NodeRecord) -> Result<NodeId> {
        let kind = record_kind(record)?;
        let id = self.create_node(kind);

        if let Some(key) = &record.key {
            self.set_key(id, key)?;
        }

        match &record.value {
            Some(RecordValue::Text(value)) => self.safe_set_value(id, value)?,
            Some(RecordValue::Node(_)) => {
                return Err(Error::InvalidChildRelation(format!(
                    "a {kind} record cannot hold a subtree value"
                )));
            }
            None => {
                if matches!(kind, NodeKind::Comment | NodeKind::Version) {
                    return Err(Error::UndefinedValue);
                }
            }
        }

        for child_record in record.children.iter().flatten() {
            let child = self.build_node(child_record)?;
            self.add_child(id, child)?;
        }

        Ok(id)
    }
}

fn record_kind(record: &NodeRecord) -> Result<NodeKind> {
    NodeKind::from_name(&record.node_type)
        .ok_or_else(|| Error::UnknownType(record.node_type.clone()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn test_round_trip_preserves_tree() {
        let header =
            parse("example.org 1; spf=pass smtp.mailfrom=example.net (checked)").unwrap();
        let json = header.to_json().unwrap();
        let rebuilt = Header::from_json(&json).unwrap();
        assert_eq!(header, rebuilt);
    }

    #[test]
    fn test_record_shape() {
        let header = parse("example.org; dkim=pass").unwrap();
        let record = header.to_record();
        assert_eq!(record.node_type, "header");
        assert!(record.key.is_none());
        assert!(matches!(record.value, Some(RecordValue::Node(_))));

        let children = record.children.unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].node_type, "entry");
        assert_eq!(children[0].key.as_deref(), Some("dkim"));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let json = r#"{"type":"header","children":[{"type":"widget","key":"x"}]}"#;
        assert!(matches!(
            Header::from_json(json),
            Err(Error::UnknownType(name)) if name == "widget"
        ));
    }

    #[test]
    fn test_reconstruction_sanitizes_values() {
        let json = r#"{"type":"header","children":[{"type":"entry","key":"spf","value":"pa\"ss"}]}"#;
        let header = Header::from_json(json).unwrap();
        let entry = header.entries()[0];
        assert_eq!(header.value(entry).unwrap(), "pa ss");
    }

    #[test]
    fn test_reconstruction_enforces_child_rules() {
        // A version cannot sit directly under the header.
        let json = r#"{"type":"header","children":[{"type":"version","value":"1"}]}"#;
        assert!(matches!(
            Header::from_json(json),
            Err(Error::InvalidChildRelation(_))
        ));
    }

    #[test]
    fn test_version_record_requires_value() {
        let json = r#"{"type":"header","children":[{"type":"entry","key":"spf","children":[{"type":"subentry","key":"k","children":[{"type":"version"}]}]}]}"#;
        assert!(matches!(
            Header::from_json(json),
            Err(Error::UndefinedValue)
        ));
    }

    #[test]
    fn test_non_header_root_rejected() {
        let json = r#"{"type":"entry","key":"spf","value":"pass"}"#;
        assert!(matches!(
            Header::from_json(json),
            Err(Error::InvalidChildRelation(_))
        ));
    }
}
