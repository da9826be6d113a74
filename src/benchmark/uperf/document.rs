//! Result document assembled from one uperf transcript

use super::stats::{
    AveragesStat, DetailsFormat, DetailsStat, NetstatStat, RunStat, RunStatDiff, SectionKind,
    StatRecord,
};
use serde::Serialize;
use std::collections::BTreeMap;

/// Every statistics record from a transcript, in the order it was printed,
/// plus the lines that were not statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultDocument {
    records: Vec<StatRecord>,
    extra_output: String,
}

impl ResultDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, record: impl Into<StatRecord>) {
        self.records.push(record.into());
    }

    /// Keep an unrecognised line verbatim
    pub(crate) fn push_extra(&mut self, line: &str) {
        self.extra_output.push_str(line);
        self.extra_output.push('\n');
    }

    pub fn records(&self) -> &[StatRecord] {
        &self.records
    }

    /// Unrecognised lines, each terminated by a newline
    pub fn extra_output(&self) -> &str {
        &self.extra_output
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.extra_output.is_empty()
    }

    /// Records tagged with `kind`, in transcript order
    pub fn section(&self, kind: SectionKind) -> impl Iterator<Item = &StatRecord> + '_ {
        self.records.iter().filter(move |r| r.section() == kind)
    }

    pub fn details(&self, kind: SectionKind) -> impl Iterator<Item = &DetailsStat> + '_ {
        self.section(kind).filter_map(|r| match r {
            StatRecord::Details(stat) => Some(stat),
            _ => None,
        })
    }

    /// Averages of one section keyed by flowop or transaction name
    ///
    /// If a name repeats, the last row printed wins.
    pub fn averages_by_name(&self, kind: SectionKind) -> BTreeMap<&str, &AveragesStat> {
        self.section(kind)
            .filter_map(|r| match r {
                StatRecord::Averages(stat) => Some((stat.name.as_str(), stat)),
                _ => None,
            })
            .collect()
    }

    pub fn netstat(&self) -> impl Iterator<Item = &NetstatStat> + '_ {
        self.records.iter().filter_map(|r| match r {
            StatRecord::Netstat(stat) => Some(stat),
            _ => None,
        })
    }

    /// Raw transaction samples across all transactions, as one timeline
    pub fn raw_timeline(&self) -> impl Iterator<Item = &DetailsStat> + '_ {
        self.details(SectionKind::Transaction)
            .filter(|stat| stat.format() == DetailsFormat::Raw)
    }

    pub fn run_stats(&self) -> impl Iterator<Item = &RunStat> + '_ {
        self.records.iter().filter_map(|r| match r {
            StatRecord::Run(stat) => Some(stat),
            _ => None,
        })
    }

    pub fn run_diff(&self) -> Option<&RunStatDiff> {
        self.records.iter().find_map(|r| match r {
            StatRecord::RunDiff(stat) => Some(stat),
            _ => None,
        })
    }
}
