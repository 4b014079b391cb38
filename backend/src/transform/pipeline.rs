//! Import job runner.
//!
//! Feeds every line of an import file to a [`LineSplitProcessor`] and routes
//! the outcomes: profiles go to a [`ProfileSink`], header rows are counted,
//! rejected lines are handled according to an [`ErrorPolicy`].
//!
//! # Example
//!
//! ```rust,ignore
//! use profile_router::{run_import, ErrorPolicy, ImportConfiguration, InMemoryPropertyTypes, MemorySink};
//!
//! let config = ImportConfiguration::load("crm.json")?;
//! let mut sink = MemorySink::new();
//! let report = run_import(csv, &config, &provider, &mut sink, ErrorPolicy::Collect)?;
//! println!("{} imported, {} rejected", report.imported, report.rejected);
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::line_split::{LineOutcome, LineSplitProcessor};
use crate::api::logs::{log_error, log_info, log_success, log_warning, log_warning_indent};
use crate::config::ImportConfiguration;
use crate::error::{FailureKind, ImportResult, RecordError};
use crate::models::PROFILES_TARGET;
use crate::parser::{decode_content, detect_encoding, strip_bom};
use crate::schema::{PropertyTypeProvider, SchemaSnapshot};
use crate::sink::{ProfileSink, RoutedProfile};

/// Rejected lines logged individually before the runner only counts them.
const MAX_LOGGED_REJECTIONS: usize = 10;

/// What to do with a rejected line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Log and count the rejection, keep going.
    SkipAndLog,
    /// Stop the job at the first rejection.
    Abort,
    /// Keep going and keep every rejection in the report.
    #[default]
    Collect,
}

/// One rejected line, as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordFailure {
    /// 1-based line number.
    pub line: usize,
    pub kind: FailureKind,
    pub message: String,
}

impl From<&RecordError> for RecordFailure {
    fn from(err: &RecordError) -> Self {
        Self {
            line: err.line(),
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Summary of an import job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub total_lines: usize,
    pub imported: usize,
    pub headers_skipped: usize,
    /// Lines rejected for data reasons.
    pub rejected: usize,
    /// Lines rejected because the configuration references unknown properties.
    pub config_faults: usize,
    pub errors: Vec<RecordFailure>,
}

impl ImportReport {
    pub fn is_clean(&self) -> bool {
        self.rejected == 0 && self.config_faults == 0
    }

    pub fn summary(&self) -> String {
        format!(
            "{} lines: {} imported, {} header, {} rejected, {} configuration faults",
            self.total_lines, self.imported, self.headers_skipped, self.rejected, self.config_faults
        )
    }
}

/// Run an import job over in-memory text.
///
/// The configuration is validated and the schema resolved once, before the
/// first line.
pub fn run_import(
    content: &str,
    config: &ImportConfiguration,
    provider: &dyn PropertyTypeProvider,
    sink: &mut dyn ProfileSink,
    policy: ErrorPolicy,
) -> ImportResult<ImportReport> {
    let name = if config.name.is_empty() { &config.item_id } else { &config.name };
    log_info(format!("📥 Import job \"{}\"", name));

    let schema = SchemaSnapshot::resolve(provider, PROFILES_TARGET)?;
    log_success(format!("Resolved {} profile property types", schema.len()));

    let processor = LineSplitProcessor::new(config, &schema)?;
    log_info(format!(
        "Mapping {} properties, separator '{}'",
        config.mapping().len(),
        format_separator(config.column_separator)
    ));

    let mut report = ImportReport::default();
    for (index, line) in strip_bom(content).lines().enumerate() {
        report.total_lines += 1;

        match processor.process(line, index) {
            Ok(LineOutcome::Skipped) => report.headers_skipped += 1,
            Ok(LineOutcome::Profile(profile)) => {
                sink.accept(RoutedProfile::for_sink(profile, config.sink_kind))?;
                report.imported += 1;
            }
            Err(err) => {
                if policy == ErrorPolicy::Abort {
                    log_error(format!("Import aborted: {}", err));
                    sink.flush()?;
                    return Err(err.into());
                }
                record_rejection(&mut report, &err, policy);
            }
        }
    }
    sink.flush()?;

    let hidden = (report.rejected + report.config_faults).saturating_sub(MAX_LOGGED_REJECTIONS);
    if policy == ErrorPolicy::SkipAndLog && hidden > 0 {
        log_warning_indent(format!("... {} more rejected lines", hidden), 1);
    }
    if report.is_clean() {
        log_success(report.summary());
    } else {
        log_warning(report.summary());
    }
    Ok(report)
}

fn record_rejection(report: &mut ImportReport, err: &RecordError, policy: ErrorPolicy) {
    if err.kind().is_config_fault() {
        report.config_faults += 1;
    } else {
        report.rejected += 1;
    }

    let seen = report.rejected + report.config_faults;
    if seen <= MAX_LOGGED_REJECTIONS {
        log_warning_indent(err.to_string(), 1);
    }

    // Configuration faults are always kept so callers can fix the job definition.
    if policy == ErrorPolicy::Collect || err.kind().is_config_fault() {
        report.errors.push(RecordFailure::from(err));
    }
}

/// Decode raw upload bytes and run an import job over them.
pub fn run_import_bytes(
    bytes: &[u8],
    config: &ImportConfiguration,
    provider: &dyn PropertyTypeProvider,
    sink: &mut dyn ProfileSink,
    policy: ErrorPolicy,
) -> ImportResult<ImportReport> {
    let encoding = detect_encoding(bytes);
    log_success(format!("Detected encoding: {}", encoding));
    let content = decode_content(bytes, &encoding);
    run_import(&content, config, provider, sink, policy)
}

/// Read an import file and run an import job over it.
pub fn import_file(
    path: &Path,
    config: &ImportConfiguration,
    provider: &dyn PropertyTypeProvider,
    sink: &mut dyn ProfileSink,
    policy: ErrorPolicy,
) -> ImportResult<ImportReport> {
    log_info(format!("📖 Reading {}", path.display()));
    let bytes = std::fs::read(path)?;
    run_import_bytes(&bytes, config, provider, sink, policy)
}

/// Format separator for display
fn format_separator(c: char) -> String {
    match c {
        '\t' => "TAB".to_string(),
        c => c.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SinkKind;
    use crate::error::ImportError;
    use crate::models::{PropertyType, PropertyValue};
    use crate::schema::InMemoryPropertyTypes;
    use crate::sink::MemorySink;
    use tempfile::tempdir;

    fn provider() -> InMemoryPropertyTypes {
        InMemoryPropertyTypes::new(vec![
            PropertyType::new("firstName", "string"),
            PropertyType::new("lastName", "string"),
            PropertyType::new("age", "integer"),
        ])
    }

    fn config() -> ImportConfiguration {
        let mut config = ImportConfiguration::from_pairs([("firstName", 0), ("lastName", 1)]);
        config.has_header = true;
        config
    }

    #[test]
    fn test_header_is_not_a_rejection() {
        let mut sink = MemorySink::new();
        let report = run_import(
            "firstName,lastName\nJane,Doe\nJohn,Smith\n",
            &config(),
            &provider(),
            &mut sink,
            ErrorPolicy::Collect,
        )
        .unwrap();

        assert_eq!(report.total_lines, 3);
        assert_eq!(report.headers_skipped, 1);
        assert_eq!(report.imported, 2);
        assert!(report.is_clean());
        assert!(report.errors.is_empty());

        let names: Vec<_> = sink
            .profiles()
            .map(|p| p.properties["firstName"].clone())
            .collect();
        assert_eq!(
            names,
            vec![PropertyValue::String("Jane".into()), PropertyValue::String("John".into())]
        );
    }

    #[test]
    fn test_collect_keeps_every_rejection() {
        let mut config = ImportConfiguration::from_pairs([("firstName", 0), ("age", 1)]);
        config.has_header = true;
        let mut sink = MemorySink::new();

        let report = run_import(
            "name,age\nJane,41\n\nJohn,old\nAnn,7",
            &config,
            &provider(),
            &mut sink,
            ErrorPolicy::Collect,
        )
        .unwrap();

        assert_eq!(report.imported, 2);
        assert_eq!(report.rejected, 2);
        assert_eq!(report.errors[0].line, 3);
        assert_eq!(report.errors[0].kind, FailureKind::EmptyLine);
        assert_eq!(report.errors[1].line, 4);
        assert_eq!(report.errors[1].kind, FailureKind::DataTypeMismatch);
        assert!(report.errors[1].message.contains("'old'"));
    }

    #[test]
    fn test_skip_and_log_only_counts_data_faults() {
        let mut sink = MemorySink::new();
        let report = run_import(
            "firstName,lastName\n\nJane,Doe",
            &config(),
            &provider(),
            &mut sink,
            ErrorPolicy::SkipAndLog,
        )
        .unwrap();

        assert_eq!(report.rejected, 1);
        assert!(report.errors.is_empty());
        assert_eq!(sink.envelopes.len(), 1);
    }

    #[test]
    fn test_abort_stops_at_first_rejection() {
        let mut sink = MemorySink::new();
        let result = run_import(
            "firstName,lastName\nJane,Doe\n\nJohn,Smith",
            &config(),
            &provider(),
            &mut sink,
            ErrorPolicy::Abort,
        );

        match result {
            Err(ImportError::Record(RecordError::EmptyLine { line })) => assert_eq!(line, 3),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(sink.envelopes.len(), 1);
    }

    /// Counts flushes and the envelopes accepted before each one.
    #[derive(Default)]
    struct FlushRecorder {
        accepted: usize,
        flushed_after: Vec<usize>,
    }

    impl ProfileSink for FlushRecorder {
        fn accept(&mut self, _envelope: RoutedProfile) -> Result<(), crate::error::SinkError> {
            self.accepted += 1;
            Ok(())
        }

        fn flush(&mut self) -> Result<(), crate::error::SinkError> {
            self.flushed_after.push(self.accepted);
            Ok(())
        }
    }

    #[test]
    fn test_abort_flushes_accepted_records() {
        let mut sink = FlushRecorder::default();
        let result = run_import(
            "firstName,lastName\nJane,Doe\nJohn,Smith\n\nAnn,Lee",
            &config(),
            &provider(),
            &mut sink,
            ErrorPolicy::Abort,
        );

        assert!(matches!(result, Err(ImportError::Record(_))));
        assert_eq!(sink.flushed_after, vec![2]);
    }

    #[test]
    fn test_unknown_property_is_a_config_fault() {
        let config = ImportConfiguration::from_pairs([("firstName", 0), ("loyaltyTier", 1)]);
        let mut sink = MemorySink::new();
        let report = run_import(
            "Jane,gold",
            &config,
            &provider(),
            &mut sink,
            ErrorPolicy::SkipAndLog,
        )
        .unwrap();

        assert_eq!(report.config_faults, 1);
        assert_eq!(report.rejected, 0);
        assert_eq!(report.errors[0].kind, FailureKind::SchemaResolution);
        assert!(sink.envelopes.is_empty());
    }

    #[test]
    fn test_partitioned_sink_kind() {
        let mut config = config();
        config.sink_kind = SinkKind::Partitioned;
        let mut sink = MemorySink::new();
        run_import("h,h\nJane,Doe", &config, &provider(), &mut sink, ErrorPolicy::Collect)
            .unwrap();

        assert_eq!(sink.envelopes[0].partition, Some(0));
        assert_eq!(sink.envelopes[0].key.as_deref(), Some("1"));
    }

    #[test]
    fn test_invalid_config_fails_before_first_line() {
        let mut config = config();
        config.column_separator = '"';
        let mut sink = MemorySink::new();
        let result =
            run_import("a,b\nJane,Doe", &config, &provider(), &mut sink, ErrorPolicy::Collect);
        assert!(matches!(result, Err(ImportError::Config(_))));
    }

    #[test]
    fn test_import_file_with_bom_and_crlf() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("people.csv");
        std::fs::write(&path, "\u{feff}firstName,lastName\r\nJane,Doe\r\n").unwrap();

        let mut sink = MemorySink::new();
        let report =
            import_file(&path, &config(), &provider(), &mut sink, ErrorPolicy::Collect).unwrap();

        assert_eq!(report.imported, 1);
        let jane = sink.profiles().next().unwrap();
        assert_eq!(jane.properties["lastName"], PropertyValue::String("Doe".into()));
    }
}
