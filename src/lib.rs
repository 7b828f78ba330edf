//! DLL Checker - AnyCPU / 32-bit / 64-bit audit for PE binaries
//!
//! This library classifies Windows libraries and executables by the
//! processes that can load them, telling managed (.NET) assemblies apart
//! from native images. It is meant for auditing a deployment folder for
//! accidental mixes of 32-bit-only and 64-bit-only binaries.
//!
//! # Features
//!
//! - **Native images**: reads the COFF machine field (x86, x64, others)
//! - **Managed assemblies**: decodes the CLR runtime header flags
//!   (IL-only, 32-bit required, 32-bit preferred) without loading a runtime
//! - **Never panics on bad input**: every file yields one verdict and two
//!   diagnostic lines
//! - **Batch scanning** (feature `batch`): recursive, parallel folder scans
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use dll_checker::{classify_file, ArchitectureVerdict};
//!
//! let result = classify_file("bin/Contoso.Core.dll");
//! println!("{}", result.diagnostic_line1);
//! println!("{}", result.diagnostic_line2);
//! println!("Result: {}", result.result_text());
//! assert!(!matches!(result.verdict, ArchitectureVerdict::InvalidFile));
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

pub mod classifier;
pub mod clr;
pub mod error;
pub mod formatter;
pub mod pe;
pub mod reader;
#[cfg(feature = "batch")]
pub mod scan;
pub mod summary;
pub mod types;

#[cfg(test)]
mod testutil;

pub use classifier::{classify_bytes, classify_file, classify_reader};
pub use error::{ClassifierError, Result};
pub use summary::{Summary, SummaryPolicy};
pub use types::{
    ArchitectureVerdict, Category, Classification, ImageKind, ProcessorArchitecture, ScanRecord,
};

/// Get version information for this library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }

    #[test]
    fn test_garbage_never_panics() {
        let inputs: [&[u8]; 4] = [b"", b"MZ", b"\x7FELF\x02\x01\x01", &[0xFF; 512]];
        for data in inputs {
            let result = classify_bytes(data);
            assert_eq!(result.diagnostics().len(), 2);
        }
    }
}
