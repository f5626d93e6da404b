use crate::advisory::{Advisory, Criticality};
use crate::version::Version;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScanResult {
    InsecureSource {
        uri: String,
    },
    UnpatchedDependency {
        name: String,
        version: Version,
        advisory: Box<Advisory>,
    },
}

impl ScanResult {
    pub fn is_insecure_source(&self) -> bool {
        matches!(self, ScanResult::InsecureSource { .. })
    }

    pub fn is_unpatched_dependency(&self) -> bool {
        matches!(self, ScanResult::UnpatchedDependency { .. })
    }
}

#[derive(Debug, Clone, Serialize, Default, PartialEq, Eq)]
pub struct ReportSummary {
    pub insecure_sources: usize,
    pub unpatched_dependencies: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub unknown: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub timestamp: DateTime<Utc>,

    pub summary: ReportSummary,

    pub results: Vec<ScanResult>,
}

impl Report {
    pub fn new() -> Self {
        Self {
            timestamp: Utc::now(),
            summary: ReportSummary::default(),
            results: Vec::new(),
        }
    }

    pub fn push(&mut self, result: ScanResult) {
        match &result {
            ScanResult::InsecureSource { .. } => self.summary.insecure_sources += 1,
            ScanResult::UnpatchedDependency { advisory, .. } => {
                self.summary.unpatched_dependencies += 1;
                match advisory.criticality() {
                    Criticality::High => self.summary.high += 1,
                    Criticality::Medium => self.summary.medium += 1,
                    Criticality::Low => self.summary.low += 1,
                    Criticality::Unknown => self.summary.unknown += 1,
                }
            }
        }

        self.results.push(result);
    }

    /// True when the scan found anything at all, insecure sources included.
    pub fn has_vulnerabilities(&self) -> bool {
        !self.results.is_empty()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn insecure_sources(&self) -> impl Iterator<Item = &str> {
        self.results.iter().filter_map(|result| match result {
            ScanResult::InsecureSource { uri } => Some(uri.as_str()),
            ScanResult::UnpatchedDependency { .. } => None,
        })
    }

    pub fn unpatched_dependencies(&self) -> impl Iterator<Item = (&str, &Version, &Advisory)> {
        self.results.iter().filter_map(|result| match result {
            ScanResult::UnpatchedDependency {
                name,
                version,
                advisory,
            } => Some((name.as_str(), version, advisory.as_ref())),
            ScanResult::InsecureSource { .. } => None,
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl Default for Report {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<ScanResult> for Report {
    fn from_iter<I: IntoIterator<Item = ScanResult>>(iter: I) -> Self {
        let mut report = Report::new();
        for result in iter {
            report.push(result);
        }
        report
    }
}

impl Extend<ScanResult> for Report {
    fn extend<I: IntoIterator<Item = ScanResult>>(&mut self, iter: I) {
        for result in iter {
            self.push(result);
        }
    }
}
