//! Core types for the DLL checker.
//!
//! [`Classification`] is the per-file outcome: an [`ArchitectureVerdict`]
//! plus the two diagnostic lines shown under it. [`ScanRecord`] pairs a
//! classification with the file it came from.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Which processes can load a binary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "verdict", content = "reason")]
pub enum ArchitectureVerdict {
    /// Platform-neutral IL, loadable by 32-bit and 64-bit hosts
    #[serde(rename = "AnyCPU")]
    AnyCpu,
    /// Platform-neutral IL that asks for a 32-bit process when possible
    #[serde(rename = "AnyCPUPrefer32Bit")]
    AnyCpuPrefer32Bit,
    /// Loadable only by 32-bit x86 processes
    X86Only,
    /// Loadable only by 64-bit x64 processes
    X64Only,
    /// Managed image whose runtime header could not be read
    UnknownManaged,
    /// Native image for a machine other than x86 or x64
    UnknownNative,
    /// Not a PE image
    InvalidFile,
    /// IO failure; carries the underlying message
    DetectionFailed(String),
}

impl ArchitectureVerdict {
    /// Whether the verdict restricts the binary to one bitness.
    pub fn is_bitness_restricted(&self) -> bool {
        matches!(self, ArchitectureVerdict::X86Only | ArchitectureVerdict::X64Only)
    }
}

impl fmt::Display for ArchitectureVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchitectureVerdict::AnyCpu => write!(f, "AnyCPU"),
            ArchitectureVerdict::AnyCpuPrefer32Bit => write!(f, "AnyCPUPrefer32Bit"),
            ArchitectureVerdict::X86Only => write!(f, "X86Only"),
            ArchitectureVerdict::X64Only => write!(f, "X64Only"),
            ArchitectureVerdict::UnknownManaged => write!(f, "UnknownManaged"),
            ArchitectureVerdict::UnknownNative => write!(f, "UnknownNative"),
            ArchitectureVerdict::InvalidFile => write!(f, "InvalidFile"),
            ArchitectureVerdict::DetectionFailed(_) => write!(f, "DetectionFailed"),
        }
    }
}

/// What kind of image the verdict was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    /// Carries a CLR runtime header
    Managed,
    /// Plain machine code
    Native,
    /// Never got far enough to tell
    Unrecognized,
}

/// Processor architecture name reported for managed images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessorArchitecture {
    None,
    #[serde(rename = "MSIL")]
    Msil,
    X86,
    #[serde(rename = "IA64")]
    Ia64,
    Amd64,
    Arm,
    Arm64,
}

impl fmt::Display for ProcessorArchitecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessorArchitecture::None => write!(f, "None"),
            ProcessorArchitecture::Msil => write!(f, "MSIL"),
            ProcessorArchitecture::X86 => write!(f, "X86"),
            ProcessorArchitecture::Ia64 => write!(f, "IA64"),
            ProcessorArchitecture::Amd64 => write!(f, "Amd64"),
            ProcessorArchitecture::Arm => write!(f, "Arm"),
            ProcessorArchitecture::Arm64 => write!(f, "Arm64"),
        }
    }
}

/// Outcome of classifying one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    #[serde(flatten)]
    pub verdict: ArchitectureVerdict,
    pub image_kind: ImageKind,
    /// Raw COFF machine field, when the header got that far
    pub machine: Option<u16>,
    /// Reported for managed images only
    pub processor_architecture: Option<ProcessorArchitecture>,
    pub diagnostic_line1: String,
    pub diagnostic_line2: String,
}

impl Classification {
    /// Both diagnostic lines, in display order.
    pub fn diagnostics(&self) -> [&str; 2] {
        [&self.diagnostic_line1, &self.diagnostic_line2]
    }

    /// One-line, human-readable result.
    pub fn result_text(&self) -> String {
        let native = self.image_kind == ImageKind::Native;
        match &self.verdict {
            ArchitectureVerdict::AnyCpu => {
                "AnyCPU (runs on both 32-bit and 64-bit EXEs)".to_string()
            }
            ArchitectureVerdict::AnyCpuPrefer32Bit => {
                "AnyCPU, 32-bit preferred (runs on both 32-bit and 64-bit EXEs)".to_string()
            }
            ArchitectureVerdict::X86Only if native => "32-bit only (native)".to_string(),
            ArchitectureVerdict::X86Only => "32-bit only (runs only on 32-bit EXEs)".to_string(),
            ArchitectureVerdict::X64Only if native => "64-bit only (native)".to_string(),
            ArchitectureVerdict::X64Only => "64-bit only (runs only on 64-bit EXEs)".to_string(),
            ArchitectureVerdict::UnknownManaged => "Unknown Managed Architecture".to_string(),
            ArchitectureVerdict::UnknownNative => "Unknown native architecture".to_string(),
            ArchitectureVerdict::InvalidFile => "Invalid PE file".to_string(),
            ArchitectureVerdict::DetectionFailed(message) => {
                format!("Detection failed: {message}")
            }
        }
    }
}

/// File category, decided by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// `.dll`
    Library,
    /// `.exe`
    Executable,
}

impl Category {
    /// Category for a path with a `.dll` or `.exe` extension (any case).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        if ext.eq_ignore_ascii_case("dll") {
            Some(Category::Library)
        } else if ext.eq_ignore_ascii_case("exe") {
            Some(Category::Executable)
        } else {
            None
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Library => write!(f, "DLL"),
            Category::Executable => write!(f, "EXE"),
        }
    }
}

/// One classified file within a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRecord {
    /// 1-based position in report order
    pub index: usize,
    pub relative_path: String,
    pub category: Category,
    #[serde(flatten)]
    pub classification: Classification,
}
