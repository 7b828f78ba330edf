//! Architecture classification.
//!
//! Composes the PE header parser and the runtime header detector into a
//! single pass over one file. Every outcome, including IO failure, ends
//! in a [`Classification`]; nothing is cached between calls.

use crate::clr::{self, RuntimeDescriptor};
use crate::error::ClassifierError;
use crate::pe::{self, machine};
use crate::reader::BinaryReader;
use crate::types::{ArchitectureVerdict, Classification, ImageKind, ProcessorArchitecture};
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use tracing::{debug, warn};

/// Classify a file on disk.
///
/// The file handle lives only for the duration of this call.
///
/// # Example
///
/// ```rust,no_run
/// use dll_checker::{classify_file, ArchitectureVerdict};
///
/// let result = classify_file("bin/Contoso.Core.dll");
/// if result.verdict == ArchitectureVerdict::X86Only {
///     println!("{}", result.result_text());
/// }
/// ```
pub fn classify_file<P: AsRef<Path>>(path: P) -> Classification {
    let path = path.as_ref();
    match BinaryReader::open(path) {
        Ok(mut reader) => {
            let result = classify_reader(&mut reader);
            if let ArchitectureVerdict::DetectionFailed(message) = &result.verdict {
                warn!(path = %path.display(), %message, "detection failed");
            }
            result
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot open file");
            detection_failed(&e)
        }
    }
}

/// Classify an in-memory image.
pub fn classify_bytes(data: &[u8]) -> Classification {
    match BinaryReader::new(Cursor::new(data)) {
        Ok(mut reader) => classify_reader(&mut reader),
        Err(e) => detection_failed(&e),
    }
}

/// Classify whatever `reader` holds, starting from offset 0.
pub fn classify_reader<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Classification {
    let header = match pe::parse(reader) {
        Ok(header) => header,
        Err(ClassifierError::InvalidFile { reason }) => return invalid_file(&reason),
        Err(e) => return detection_failed(&e),
    };

    let Some(directory) = header.runtime_directory else {
        return native(header.machine);
    };

    match clr::read_descriptor(reader, &header, directory) {
        Ok(descriptor) => managed(header.machine, &descriptor),
        Err(e) if e.is_format_error() => {
            debug!(error = %e, "runtime header unreadable");
            unknown_managed(header.machine)
        }
        Err(e) => detection_failed(&e),
    }
}

/// Verdict for native code of the given machine type.
pub fn native_verdict(machine: u16) -> ArchitectureVerdict {
    match machine {
        machine::I386 => ArchitectureVerdict::X86Only,
        machine::AMD64 => ArchitectureVerdict::X64Only,
        _ => ArchitectureVerdict::UnknownNative,
    }
}

/// Verdict for a managed image.
///
/// Mixed-mode images (IL-only clear) carry native code, so their machine
/// type decides exactly as for a native image.
pub fn managed_verdict(machine: u16, descriptor: &RuntimeDescriptor) -> ArchitectureVerdict {
    if !descriptor.il_only() {
        return native_verdict(machine);
    }
    match (descriptor.requires_32bit(), descriptor.prefers_32bit()) {
        (false, _) => ArchitectureVerdict::AnyCpu,
        (true, true) => ArchitectureVerdict::AnyCpuPrefer32Bit,
        (true, false) => ArchitectureVerdict::X86Only,
    }
}

fn processor_architecture(machine: u16, descriptor: &RuntimeDescriptor) -> ProcessorArchitecture {
    if descriptor.il_only() {
        return if descriptor.requires_32bit() && !descriptor.prefers_32bit() {
            ProcessorArchitecture::X86
        } else {
            ProcessorArchitecture::Msil
        };
    }
    match machine {
        machine::I386 => ProcessorArchitecture::X86,
        machine::AMD64 => ProcessorArchitecture::Amd64,
        machine::IA64 => ProcessorArchitecture::Ia64,
        machine::ARM | machine::THUMB | machine::ARMNT => ProcessorArchitecture::Arm,
        machine::ARM64 => ProcessorArchitecture::Arm64,
        _ => ProcessorArchitecture::None,
    }
}

fn native(machine: u16) -> Classification {
    Classification {
        verdict: native_verdict(machine),
        image_kind: ImageKind::Native,
        machine: Some(machine),
        processor_architecture: None,
        diagnostic_line1: format!("Machine type = 0x{machine:04X}."),
        diagnostic_line2: "Type: Native image".to_string(),
    }
}

fn managed(machine: u16, descriptor: &RuntimeDescriptor) -> Classification {
    managed_with(
        machine,
        managed_verdict(machine, descriptor),
        processor_architecture(machine, descriptor),
    )
}

fn unknown_managed(machine: u16) -> Classification {
    managed_with(
        machine,
        ArchitectureVerdict::UnknownManaged,
        ProcessorArchitecture::None,
    )
}

fn managed_with(
    machine: u16,
    verdict: ArchitectureVerdict,
    arch: ProcessorArchitecture,
) -> Classification {
    Classification {
        verdict,
        image_kind: ImageKind::Managed,
        machine: Some(machine),
        processor_architecture: Some(arch),
        diagnostic_line1: format!("ProcessorArchitecture = {arch}."),
        diagnostic_line2: "Type: Managed assembly".to_string(),
    }
}

fn invalid_file(reason: &str) -> Classification {
    Classification {
        verdict: ArchitectureVerdict::InvalidFile,
        image_kind: ImageKind::Unrecognized,
        machine: None,
        processor_architecture: None,
        diagnostic_line1: format!("Invalid PE file: {reason}."),
        diagnostic_line2: String::new(),
    }
}

fn detection_failed(error: &ClassifierError) -> Classification {
    let message = error.to_string();
    Classification {
        diagnostic_line1: format!("Detection failed: {message}"),
        verdict: ArchitectureVerdict::DetectionFailed(message),
        image_kind: ImageKind::Unrecognized,
        machine: None,
        processor_architecture: None,
        diagnostic_line2: String::new(),
    }
}
