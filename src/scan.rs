//! Directory scanning.
//!
//! Finds `.dll` and `.exe` files under a root and classifies them in
//! parallel. Classification of one file never affects another; records
//! come back in discovery order whatever order the workers finish in.

use crate::classifier::classify_file;
use crate::error::{ClassifierError, Result};
use crate::types::{Category, ScanRecord};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Options for directory scans.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanOptions {
    /// Follow symbolic links while walking
    pub follow_links: bool,
    /// Worker threads; 0 uses the rayon default
    pub jobs: usize,
}

/// A file waiting to be classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Path the file is opened from
    pub path: PathBuf,
    /// Path shown in reports
    pub relative_path: PathBuf,
    /// DLL or EXE, from the extension
    pub category: Category,
}

impl Candidate {
    /// Candidate for an explicitly named file. Anything that is not a
    /// `.dll` is treated as an executable.
    pub fn from_file(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            relative_path: path.to_path_buf(),
            category: Category::from_path(path).unwrap_or(Category::Executable),
        }
    }
}

/// Recursively collect candidates under `root`.
///
/// Libraries come first, then executables, each sorted by relative path.
/// Entries that cannot be read are logged and skipped.
pub fn discover(root: &Path, options: &ScanOptions) -> Result<Vec<Candidate>> {
    if !root.is_dir() {
        return Err(ClassifierError::NotFound {
            path: root.display().to_string(),
        });
    }

    let mut candidates: Vec<Candidate> = WalkDir::new(root)
        .follow_links(options.follow_links)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let category = Category::from_path(entry.path())?;
            let relative_path = entry
                .path()
                .strip_prefix(root)
                .unwrap_or(entry.path())
                .to_path_buf();
            Some(Candidate {
                path: entry.into_path(),
                relative_path,
                category,
            })
        })
        .collect();

    sort_candidates(&mut candidates);
    debug!(root = %root.display(), count = candidates.len(), "discovered candidates");
    Ok(candidates)
}

/// Order candidates for reporting: libraries, then executables.
pub fn sort_candidates(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        a.category
            .cmp(&b.category)
            .then_with(|| a.relative_path.cmp(&b.relative_path))
    });
}

/// Discover and classify everything under `root`.
pub fn scan(root: &Path, options: &ScanOptions) -> Result<Vec<ScanRecord>> {
    let candidates = discover(root, options)?;
    Ok(classify_candidates(candidates, options))
}

/// Classify explicitly named files, keeping their order.
pub fn classify_paths(paths: &[PathBuf], options: &ScanOptions) -> Vec<ScanRecord> {
    let candidates = paths.iter().map(|p| Candidate::from_file(p)).collect();
    classify_candidates(candidates, options)
}

/// Classify candidates in parallel; `index` follows input order, from 1.
pub fn classify_candidates(candidates: Vec<Candidate>, options: &ScanOptions) -> Vec<ScanRecord> {
    let run = move || {
        candidates
            .into_par_iter()
            .enumerate()
            .map(|(i, candidate)| ScanRecord {
                index: i + 1,
                relative_path: candidate.relative_path.display().to_string(),
                category: candidate.category,
                classification: classify_file(&candidate.path),
            })
            .collect::<Vec<_>>()
    };

    if options.jobs == 0 {
        return run();
    }
    match rayon::ThreadPoolBuilder::new()
        .num_threads(options.jobs)
        .build()
    {
        Ok(pool) => pool.install(run),
        Err(e) => {
            warn!(error = %e, "cannot build thread pool, using global pool");
            run()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pe::machine;
    use crate::testutil::PeBuilder;
    use crate::types::ArchitectureVerdict;
    use std::fs;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("plugins/x64")).unwrap();
        fs::write(
            root.join("app.exe"),
            PeBuilder::native(machine::AMD64).pe32_plus().build(),
        )
        .unwrap();
        fs::write(
            root.join("Core.DLL"),
            PeBuilder::native(machine::I386).managed(0x1).dll().build(),
        )
        .unwrap();
        fs::write(
            root.join("plugins/x64/native.dll"),
            PeBuilder::native(machine::I386).dll().build(),
        )
        .unwrap();
        fs::write(root.join("plugins/readme.txt"), b"not a binary").unwrap();
        fs::write(root.join("broken.exe"), b"\0\0\0\0").unwrap();
        dir
    }

    #[test]
    fn test_discover_filters_and_orders() {
        let dir = fixture();
        let candidates = discover(dir.path(), &ScanOptions::default()).unwrap();
        let listed: Vec<_> = candidates
            .iter()
            .map(|c| (c.category, c.relative_path.clone()))
            .collect();
        assert_eq!(
            listed,
            vec![
                (Category::Library, PathBuf::from("Core.DLL")),
                (Category::Library, Path::new("plugins").join("x64").join("native.dll")),
                (Category::Executable, PathBuf::from("app.exe")),
                (Category::Executable, PathBuf::from("broken.exe")),
            ]
        );
    }

    #[test]
    fn test_scan_verdicts_in_order() {
        let dir = fixture();
        let options = ScanOptions {
            jobs: 2,
            ..ScanOptions::default()
        };
        let records = scan(dir.path(), &options).unwrap();
        let verdicts: Vec<_> = records
            .iter()
            .map(|r| (r.index, r.classification.verdict.clone()))
            .collect();
        assert_eq!(
            verdicts,
            vec![
                (1, ArchitectureVerdict::AnyCpu),
                (2, ArchitectureVerdict::X86Only),
                (3, ArchitectureVerdict::X64Only),
                (4, ArchitectureVerdict::InvalidFile),
            ]
        );
    }

    #[test]
    fn test_scan_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let err = scan(&dir.path().join("nope"), &ScanOptions::default()).unwrap_err();
        assert!(matches!(err, ClassifierError::NotFound { .. }));
    }

    #[test]
    fn test_classify_paths_keeps_order() {
        let dir = fixture();
        let paths = vec![dir.path().join("app.exe"), dir.path().join("Core.DLL")];
        let records = classify_paths(&paths, &ScanOptions::default());
        assert_eq!(records[0].category, Category::Executable);
        assert_eq!(records[1].category, Category::Library);
        assert_eq!(records[1].classification.verdict, ArchitectureVerdict::AnyCpu);
    }
}
