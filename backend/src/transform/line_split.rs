//! Line transformer: one raw import line in, one profile update out.
//!
//! ```text
//! raw line ─▶ header check ─▶ RFC 4180 split ─▶ empty / column guards
//!          ─▶ per mapped property: schema lookup, trim, coerce
//!          ─▶ delete flag ─▶ ProfileToImport
//! ```
//!
//! The processor holds only borrowed, read-only job state, so one instance can
//! be shared by every worker of a job.

use std::collections::BTreeMap;

use crate::config::ImportConfiguration;
use crate::error::{ConfigResult, ImportResult, RecordError, RecordResult};
use crate::models::ProfileToImport;
use crate::parser::split_line;
use crate::schema::SchemaSnapshot;

use super::coerce::{coerce, parse_boolean};

/// Outcome of a line that was not rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    /// Header row; not data and not an error.
    Skipped,
    Profile(ProfileToImport),
}

impl LineOutcome {
    pub fn into_profile(self) -> Option<ProfileToImport> {
        match self {
            LineOutcome::Profile(profile) => Some(profile),
            LineOutcome::Skipped => None,
        }
    }
}

/// Transforms lines of one import job.
#[derive(Debug, Clone, Copy)]
pub struct LineSplitProcessor<'a> {
    config: &'a ImportConfiguration,
    schema: &'a SchemaSnapshot,
    separator: u8,
}

impl<'a> LineSplitProcessor<'a> {
    /// Validates the configuration once for the whole job.
    pub fn new(config: &'a ImportConfiguration, schema: &'a SchemaSnapshot) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            schema,
            separator: config.separator_byte()?,
        })
    }

    /// Transform the line at zero-based `index` of its file.
    pub fn process(&self, line: &str, index: usize) -> RecordResult<LineOutcome> {
        if index == 0 && self.config.has_header {
            return Ok(LineOutcome::Skipped);
        }
        let line_number = index + 1;

        let columns = split_line(line, self.separator).map_err(|e| RecordError::MalformedLine {
            line: line_number,
            message: e.to_string(),
        })?;

        match columns.first() {
            Some(first) if !first.trim().is_empty() => {}
            _ => return Err(RecordError::EmptyLine { line: line_number }),
        }

        let mapping = self.config.mapping();
        if self.config.has_delete_column && mapping.len() > columns.len() - 1 {
            return Err(RecordError::MappingColumnMismatch { line: line_number });
        }

        let mut properties = BTreeMap::new();
        for (field, &column) in mapping {
            let property_type =
                self.schema
                    .get(field)
                    .ok_or_else(|| RecordError::SchemaResolutionFailure {
                        line: line_number,
                        field: field.clone(),
                    })?;

            // Lines may be shorter than the mapping.
            let Some(cell) = columns.get(column) else {
                continue;
            };
            let raw = cell.trim();

            let value = coerce(raw, property_type, self.config).map_err(|e| {
                RecordError::DataTypeMismatch {
                    line: line_number,
                    field: field.clone(),
                    value: raw.to_string(),
                    expected: e.expected,
                }
            })?;
            if let Some(value) = value {
                properties.insert(field.clone(), value);
            }
        }

        let mut profile = ProfileToImport::new(properties);
        profile.merging_property = self.config.merging_property.clone();
        profile.properties_to_overwrite = self.config.properties_to_overwrite.clone();
        profile.overwrite_existing_profiles = self.config.overwrite_existing_profiles;
        if self.config.has_delete_column {
            profile.profile_to_delete = columns
                .last()
                .and_then(|flag| parse_boolean(flag.trim()))
                .unwrap_or(false);
        }

        Ok(LineOutcome::Profile(profile))
    }
}

/// Transform a single line without setting up a job.
///
/// Convenience for one-off calls; jobs should build one [`LineSplitProcessor`].
pub fn transform_line(
    line: &str,
    index: usize,
    config: &ImportConfiguration,
    schema: &SchemaSnapshot,
) -> ImportResult<LineOutcome> {
    let processor = LineSplitProcessor::new(config, schema)?;
    Ok(processor.process(line, index)?)
}
