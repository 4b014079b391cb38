//! Destinations for produced profile updates.
//!
//! Every update leaves the pipeline wrapped in a [`RoutedProfile`]. Partition
//! aware transports get a fixed partition and key so that all records of a job
//! stay ordered on one partition.

use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::config::SinkKind;
use crate::error::SinkError;
use crate::models::ProfileToImport;

/// Partition used for every record of a partitioned job.
pub const PARTITION_KEY: i32 = 0;

/// Message key used for every record of a partitioned job.
pub const MESSAGE_KEY: &str = "1";

/// A profile update plus transport routing metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutedProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub profile: ProfileToImport,
}

impl RoutedProfile {
    pub fn for_sink(profile: ProfileToImport, kind: SinkKind) -> Self {
        match kind {
            SinkKind::Direct => Self {
                partition: None,
                key: None,
                profile,
            },
            SinkKind::Partitioned => Self {
                partition: Some(PARTITION_KEY),
                key: Some(MESSAGE_KEY.to_string()),
                profile,
            },
        }
    }
}

/// Consumer of routed profile updates. Ownership passes to the sink.
pub trait ProfileSink {
    fn accept(&mut self, envelope: RoutedProfile) -> Result<(), SinkError>;

    /// Called once after the last record of a job.
    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Keeps every envelope in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub envelopes: Vec<RoutedProfile>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn profiles(&self) -> impl Iterator<Item = &ProfileToImport> {
        self.envelopes.iter().map(|e| &e.profile)
    }
}

impl ProfileSink for MemorySink {
    fn accept(&mut self, envelope: RoutedProfile) -> Result<(), SinkError> {
        self.envelopes.push(envelope);
        Ok(())
    }
}

/// Writes one JSON envelope per line.
pub struct JsonLinesSink<W: Write> {
    writer: W,
    written: usize,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ProfileSink for JsonLinesSink<W> {
    fn accept(&mut self, envelope: RoutedProfile) -> Result<(), SinkError> {
        serde_json::to_writer(&mut self.writer, &envelope)?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_partitioned_envelope() {
        let envelope =
            RoutedProfile::for_sink(ProfileToImport::new(BTreeMap::new()), SinkKind::Partitioned);
        assert_eq!(envelope.partition, Some(0));
        assert_eq!(envelope.key.as_deref(), Some("1"));
    }

    #[test]
    fn test_direct_envelope_has_no_routing() {
        let envelope =
            RoutedProfile::for_sink(ProfileToImport::new(BTreeMap::new()), SinkKind::Direct);
        let json = serde_json::to_value(&envelope).unwrap();
        assert!(json.get("partition").is_none());
        assert!(json.get("key").is_none());
        assert_eq!(json["profile"]["itemType"], "profile");
    }

    #[test]
    fn test_json_lines_sink() {
        let mut sink = JsonLinesSink::new(Vec::new());
        for _ in 0..2 {
            sink.accept(RoutedProfile::for_sink(
                ProfileToImport::new(BTreeMap::new()),
                SinkKind::Partitioned,
            ))
            .unwrap();
        }
        sink.flush().unwrap();
        assert_eq!(sink.written(), 2);

        let output = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: RoutedProfile = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.partition, Some(0));
    }
}
