//! Per-bucket tallies over a stream of verdicts.

use crate::types::{ArchitectureVerdict, Classification};
use serde::{Deserialize, Serialize};

/// How verdicts are folded into summary buckets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryPolicy {
    /// Count AnyCPUPrefer32Bit separately instead of as AnyCPU
    pub split_prefer32: bool,
}

/// Summary bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    /// Runs in 32-bit and 64-bit processes
    AnyCpu,
    /// AnyCPU with the 32-bit preference, when counted apart
    AnyCpuPrefer32Bit,
    /// 64-bit processes only
    X64Only,
    /// 32-bit processes only
    X86Only,
    /// Unknown, invalid, or failed
    Other,
}

/// Running counts per bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub any_cpu: usize,
    /// `None` unless the policy splits the 32-bit preference out
    #[serde(skip_serializing_if = "Option::is_none")]
    pub any_cpu_prefer32: Option<usize>,
    pub x64_only: usize,
    pub x86_only: usize,
    /// Everything that is not one of the bitness verdicts
    pub other: usize,
}

impl Summary {
    /// Empty summary for `policy`.
    pub fn new(policy: SummaryPolicy) -> Self {
        Self {
            any_cpu_prefer32: policy.split_prefer32.then_some(0),
            ..Self::default()
        }
    }

    /// Tally every classification in `items`.
    pub fn from_classifications<'a, I>(items: I, policy: SummaryPolicy) -> Self
    where
        I: IntoIterator<Item = &'a Classification>,
    {
        let mut summary = Self::new(policy);
        for item in items {
            summary.add(&item.verdict);
        }
        summary
    }

    /// Bucket a verdict lands in under this summary's policy.
    pub fn bucket_for(&self, verdict: &ArchitectureVerdict) -> Bucket {
        match verdict {
            ArchitectureVerdict::AnyCpu => Bucket::AnyCpu,
            ArchitectureVerdict::AnyCpuPrefer32Bit if self.any_cpu_prefer32.is_some() => {
                Bucket::AnyCpuPrefer32Bit
            }
            ArchitectureVerdict::AnyCpuPrefer32Bit => Bucket::AnyCpu,
            ArchitectureVerdict::X64Only => Bucket::X64Only,
            ArchitectureVerdict::X86Only => Bucket::X86Only,
            _ => Bucket::Other,
        }
    }

    /// Count one verdict.
    pub fn add(&mut self, verdict: &ArchitectureVerdict) {
        match self.bucket_for(verdict) {
            Bucket::AnyCpu => self.any_cpu += 1,
            Bucket::AnyCpuPrefer32Bit => {
                if let Some(count) = self.any_cpu_prefer32.as_mut() {
                    *count += 1;
                }
            }
            Bucket::X64Only => self.x64_only += 1,
            Bucket::X86Only => self.x86_only += 1,
            Bucket::Other => self.other += 1,
        }
    }

    /// Files counted across all buckets.
    pub fn total(&self) -> usize {
        self.any_cpu
            + self.any_cpu_prefer32.unwrap_or(0)
            + self.x64_only
            + self.x86_only
            + self.other
    }

    /// Labelled counts in display order. Other is listed only when nonzero.
    pub fn lines(&self) -> Vec<(&'static str, usize)> {
        let mut lines = vec![("AnyCPU", self.any_cpu)];
        if let Some(count) = self.any_cpu_prefer32 {
            lines.push(("AnyCPU (32-bit preferred)", count));
        }
        lines.push(("64-bit only", self.x64_only));
        lines.push(("32-bit only", self.x86_only));
        if self.other > 0 {
            lines.push(("Other", self.other));
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdicts() -> Vec<ArchitectureVerdict> {
        vec![
            ArchitectureVerdict::AnyCpu,
            ArchitectureVerdict::AnyCpuPrefer32Bit,
            ArchitectureVerdict::X64Only,
            ArchitectureVerdict::X86Only,
            ArchitectureVerdict::X86Only,
            ArchitectureVerdict::InvalidFile,
            ArchitectureVerdict::DetectionFailed("denied".into()),
        ]
    }

    #[test]
    fn test_default_folds_prefer32_into_anycpu() {
        let mut summary = Summary::new(SummaryPolicy::default());
        for v in &verdicts() {
            summary.add(v);
        }
        assert_eq!(summary.any_cpu, 2);
        assert_eq!(summary.any_cpu_prefer32, None);
        assert_eq!(summary.x64_only, 1);
        assert_eq!(summary.x86_only, 2);
        assert_eq!(summary.other, 2);
        assert_eq!(summary.total(), 7);
    }

    #[test]
    fn test_split_prefer32() {
        let mut summary = Summary::new(SummaryPolicy {
            split_prefer32: true,
        });
        for v in &verdicts() {
            summary.add(v);
        }
        assert_eq!(summary.any_cpu, 1);
        assert_eq!(summary.any_cpu_prefer32, Some(1));
        assert_eq!(summary.total(), 7);
        assert_eq!(summary.lines()[1], ("AnyCPU (32-bit preferred)", 1));
    }

    #[test]
    fn test_other_hidden_when_zero() {
        let mut summary = Summary::new(SummaryPolicy::default());
        summary.add(&ArchitectureVerdict::X64Only);
        let labels: Vec<_> = summary.lines().iter().map(|(l, _)| *l).collect();
        assert_eq!(labels, ["AnyCPU", "64-bit only", "32-bit only"]);
    }
}
