//! Freshness monitoring
//!
//! Compares how long ago each table was built, and how old its newest data
//! is, against the table's SLA.

use chrono::{DateTime, Duration, Utc};
use keel_core::{FeatureTable, Severity};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::registry::BuildRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FreshnessStatus {
    Fresh,
    Warn,
    Error,
    /// Never built
    Unknown,
}

impl From<Severity> for FreshnessStatus {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Warn => FreshnessStatus::Warn,
            Severity::Error => FreshnessStatus::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableFreshness {
    pub table_name: String,
    pub last_build_at: Option<DateTime<Utc>>,
    pub data_timestamp_max: Option<DateTime<Utc>>,
    pub build_staleness: Option<Duration>,
    pub data_staleness: Option<Duration>,
    pub max_staleness: Option<Duration>,
    pub status: FreshnessStatus,
    pub severity: Severity,
    pub row_count: Option<usize>,
    pub min_row_count: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FreshnessResult {
    pub tables: Vec<TableFreshness>,
    /// Some table breached its SLA
    pub has_stale: bool,
    /// Some table has never been built
    pub has_unknown: bool,
}

/// Check every table against its SLA. `latest_builds` maps table names to
/// their latest build record; absent entries count as never built.
pub fn check_freshness(
    tables: &[FeatureTable],
    latest_builds: &HashMap<String, BuildRecord>,
    now: DateTime<Utc>,
) -> FreshnessResult {
    let mut results = Vec::with_capacity(tables.len());
    let mut has_stale = false;
    let mut has_unknown = false;

    for table in tables {
        let sla = table.sla.as_ref();
        let max_staleness = sla.and_then(|s| s.max_staleness);
        let severity = sla.map(|s| s.severity).unwrap_or(Severity::Warn);
        let min_row_count = sla.and_then(|s| s.min_row_count);

        let Some(record) = latest_builds.get(&table.name) else {
            has_unknown = true;
            results.push(TableFreshness {
                table_name: table.name.clone(),
                last_build_at: None,
                data_timestamp_max: None,
                build_staleness: None,
                data_staleness: None,
                max_staleness,
                status: FreshnessStatus::Unknown,
                severity,
                row_count: None,
                min_row_count,
            });
            continue;
        };

        let build_staleness = now - record.timestamp;
        let data_staleness = record.data_timestamp_max.map(|ts| now - ts);

        let mut status = FreshnessStatus::Fresh;
        if let Some(max) = max_staleness {
            let effective = data_staleness.map_or(build_staleness, |d| d.max(build_staleness));
            if effective > max {
                status = severity.into();
                has_stale = true;
            }
        }
        if let (Some(min), Some(rows)) = (min_row_count, record.row_count) {
            if rows < min && status == FreshnessStatus::Fresh {
                status = severity.into();
                has_stale = true;
            }
        }

        results.push(TableFreshness {
            table_name: table.name.clone(),
            last_build_at: Some(record.timestamp),
            data_timestamp_max: record.data_timestamp_max,
            build_staleness: Some(build_staleness),
            data_staleness,
            max_staleness,
            status,
            severity,
            row_count: record.row_count,
            min_row_count,
        });
    }

    FreshnessResult {
        tables: results,
        has_stale,
        has_unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::BuildStatus;
    use chrono::TimeZone;
    use keel_core::{Entity, Sla, SourceConfig, SourceKind, TableSource};
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn table(name: &str, sla: Option<Sla>) -> FeatureTable {
        let mut t = FeatureTable::new(
            name,
            TableSource::External(SourceKind::batch(
                "src",
                SourceConfig::Table {
                    name: "src".to_string(),
                },
            )),
            Entity::new("user", vec!["user_id"]).unwrap(),
        );
        t.sla = sla;
        t
    }

    fn record(name: &str, built_hours_ago: i64, data_hours_ago: Option<i64>, rows: usize) -> BuildRecord {
        BuildRecord {
            run_id: Uuid::new_v4(),
            timestamp: now() - Duration::hours(built_hours_ago),
            table_name: name.to_string(),
            status: BuildStatus::Success,
            row_count: Some(rows),
            duration_ms: Some(1.0),
            data_timestamp_max: data_hours_ago.map(|h| now() - Duration::hours(h)),
        }
    }

    #[test]
    fn test_fresh_and_unknown() {
        let tables = vec![
            table("built", Some(Sla::new().with_max_staleness(Duration::hours(6)))),
            table("never", None),
        ];
        let records = HashMap::from([("built".to_string(), record("built", 1, Some(2), 10))]);
        let result = check_freshness(&tables, &records, now());

        assert_eq!(result.tables[0].status, FreshnessStatus::Fresh);
        assert_eq!(result.tables[1].status, FreshnessStatus::Unknown);
        assert!(!result.has_stale);
        assert!(result.has_unknown);
    }

    #[test]
    fn test_stale_data_uses_sla_severity() {
        let sla = Sla::new()
            .with_max_staleness(Duration::hours(6))
            .with_severity(Severity::Error);
        let tables = vec![table("t", Some(sla))];
        // built recently but the newest row is old
        let records = HashMap::from([("t".to_string(), record("t", 1, Some(12), 10))]);
        let result = check_freshness(&tables, &records, now());

        assert_eq!(result.tables[0].status, FreshnessStatus::Error);
        assert_eq!(result.tables[0].data_staleness, Some(Duration::hours(12)));
        assert!(result.has_stale);
    }

    #[test]
    fn test_min_row_count() {
        let tables = vec![table("t", Some(Sla::new().with_min_row_count(100)))];
        let records = HashMap::from([("t".to_string(), record("t", 1, None, 5))]);
        let result = check_freshness(&tables, &records, now());
        assert_eq!(result.tables[0].status, FreshnessStatus::Warn);
        assert!(result.has_stale);
    }
}
