use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Handle recorded when a failing entity has no stored snapshot to name it.
pub const UNKNOWN_HANDLE: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The upstream call for this entity failed or returned a non-success status.
    FetchError,
    /// The entity was fetched but could not be persisted.
    SaveError,
    /// The whole batch call this entity belonged to failed.
    BatchError,
    /// A successful batch response omitted this entity.
    ApiMissing,
}

impl FailureKind {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            FailureKind::FetchError => "fetch_error",
            FailureKind::SaveError => "save_error",
            FailureKind::BatchError => "batch_error",
            FailureKind::ApiMissing => "api_missing",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    pub entity_id: String,
    pub handle: String,
    pub reason: String,
    pub error: Option<String>,
    pub kind: FailureKind,
}

/// Run-scoped failure accumulator.
///
/// Created at the start of a cycle and passed by `&mut` to every stage that
/// can fail per entity. Recording never affects control flow.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FailureReport {
    records: Vec<FailureRecord>,
}

impl FailureReport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        kind: FailureKind,
        entity_id: impl Into<String>,
        handle: impl Into<String>,
        reason: impl Into<String>,
        error: Option<String>,
    ) {
        self.records.push(FailureRecord {
            entity_id: entity_id.into(),
            handle: handle.into(),
            reason: reason.into(),
            error,
            kind,
        });
    }

    /// Fold another report into this one, keeping record order.
    pub fn merge(&mut self, other: FailureReport) {
        self.records.extend(other.records);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn records(&self) -> &[FailureRecord] {
        &self.records
    }

    /// Failure count per kind. Kinds with no failures are absent.
    #[must_use]
    pub fn counts(&self) -> BTreeMap<FailureKind, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            *counts.entry(record.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Records grouped by kind, each group in the order it was recorded.
    #[must_use]
    pub fn by_kind(&self) -> BTreeMap<FailureKind, Vec<&FailureRecord>> {
        let mut groups: BTreeMap<FailureKind, Vec<&FailureRecord>> = BTreeMap::new();
        for record in &self.records {
            groups.entry(record.kind).or_default().push(record);
        }
        groups
    }
}

impl fmt::Display for FailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.records.is_empty() {
            return writeln!(f, "no failures");
        }

        writeln!(f, "failures: {}", self.records.len())?;
        for (kind, count) in self.counts() {
            writeln!(f, "  {kind}: {count}")?;
        }

        for (kind, records) in self.by_kind() {
            writeln!(f)?;
            writeln!(f, "[{kind}]")?;
            for record in records {
                write!(
                    f,
                    "  - {} (@{}): {}",
                    record.entity_id, record.handle, record.reason
                )?;
                if let Some(error) = &record.error {
                    write!(f, " ({error})")?;
                }
                writeln!(f)?;
            }
        }
        Ok(())
    }
}
