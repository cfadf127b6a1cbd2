//! Document conversion through external programs (LibreOffice, pdf2docx)
//! and the dependency probe used by `check_system` and failure diagnostics

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

pub const SOFFICE_HINT: &str =
    "Install LibreOffice and make sure `soffice` is on PATH, or set MEDIA_TOOLKIT_SOFFICE";
pub const PDF2DOCX_HINT: &str =
    "Install pdf2docx (`pip install pdf2docx`), or install LibreOffice as a fallback";
pub const PDFIUM_HINT: &str =
    "Place the PDFium library next to the binary, in /opt/pdfium/lib, or on the system library path";

fn run_converter(command: &Path, args: &[OsString]) -> Result<Output> {
    let output = Command::new(command).args(args).output().map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            Error::operation(format!("Converter not found: {}", command.display()))
        } else {
            Error::operation(format!(
                "Could not run {}: {}",
                command.display(),
                e
            ))
        }
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::operation(format!(
            "{} exited with {}: {}",
            command.display(),
            output.status,
            stderr.trim()
        )));
    }
    Ok(output)
}

fn ensure_nonempty(path: &Path) -> Result<()> {
    match std::fs::metadata(path) {
        Ok(m) if m.len() > 0 => Ok(()),
        Ok(_) => Err(Error::operation(format!(
            "Conversion produced an empty file: {}",
            path.display()
        ))),
        Err(_) => Err(Error::operation(format!(
            "Conversion produced no output at {}",
            path.display()
        ))),
    }
}

/// Move a file, copying across filesystems when rename is not possible.
pub fn move_file(from: &Path, to: &Path) -> Result<()> {
    if std::fs::rename(from, to).is_ok() {
        return Ok(());
    }
    std::fs::copy(from, to)?;
    std::fs::remove_file(from)?;
    Ok(())
}

/// Path LibreOffice writes for `input` converted to `ext` inside `outdir`.
fn soffice_output(input: &Path, outdir: &Path, ext: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    outdir.join(format!("{}.{}", stem, ext))
}

fn soffice_args(scratch: &Path, filter: Option<&str>, target: &str, input: &Path) -> Vec<OsString> {
    // Private profile so concurrent conversions do not fight over one lock.
    let profile = format!(
        "-env:UserInstallation=file://{}",
        scratch.join("lo_profile").display()
    );
    let mut args: Vec<OsString> = vec![profile.into(), "--headless".into()];
    if let Some(filter) = filter {
        args.push(format!("--infilter={}", filter).into());
    }
    let tail: [OsString; 5] = [
        "--convert-to".into(),
        target.into(),
        "--outdir".into(),
        scratch.as_os_str().to_owned(),
        input.as_os_str().to_owned(),
    ];
    args.extend(tail);
    args
}

/// Convert a Word document to PDF with headless LibreOffice.
///
/// LibreOffice writes into `scratch`; the result is then moved to `output`.
pub fn word_to_pdf(config: &ServerConfig, input: &Path, scratch: &Path, output: &Path) -> Result<()> {
    let soffice = config.soffice_command();
    tracing::debug!(input = %input.display(), "converting word to pdf");

    run_converter(&soffice, &soffice_args(scratch, None, "pdf", input))?;
    let produced = soffice_output(input, scratch, "pdf");
    ensure_nonempty(&produced)?;
    move_file(&produced, output)
}

/// Convert a PDF to DOCX with pdf2docx, falling back to LibreOffice's
/// PDF import filter.
pub fn pdf_to_word(config: &ServerConfig, input: &Path, scratch: &Path, output: &Path) -> Result<()> {
    let pdf2docx = config.pdf2docx_command();
    let primary = run_converter(
        &pdf2docx,
        &[
            "convert".into(),
            input.as_os_str().to_owned(),
            output.as_os_str().to_owned(),
        ],
    )
    .and_then(|_| ensure_nonempty(output));

    let primary_err = match primary {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };
    tracing::warn!(error = %primary_err, "pdf2docx failed, trying LibreOffice");
    let _ = std::fs::remove_file(output);

    let soffice = config.soffice_command();
    let fallback = run_converter(
        &soffice,
        &soffice_args(
            scratch,
            Some("writer_pdf_import"),
            "docx:MS Word 2007 XML",
            input,
        ),
    )
    .and_then(|_| {
        let produced = soffice_output(input, scratch, "docx");
        ensure_nonempty(&produced)?;
        move_file(&produced, output)
    });

    fallback.map_err(|e| {
        Error::operation(format!(
            "pdf2docx: {}; LibreOffice: {}",
            primary_err.client_message(),
            e.client_message()
        ))
    })
}

/// First line of a program's `--version` output, if it runs at all.
pub fn probe(command: &Path) -> Option<String> {
    let output = Command::new(command).arg("--version").output().ok()?;
    let text = if output.stdout.is_empty() {
        String::from_utf8_lossy(&output.stderr).into_owned()
    } else {
        String::from_utf8_lossy(&output.stdout).into_owned()
    };
    let first = text.lines().next().unwrap_or_default().trim().to_string();
    if first.is_empty() {
        Some("installed".to_string())
    } else {
        Some(first)
    }
}

/// Presence of each external collaborator.
#[derive(Debug, Clone)]
pub struct DependencyReport {
    pub soffice: Option<String>,
    pub pdf2docx: Option<String>,
    pub pdfium: bool,
}

impl DependencyReport {
    pub fn collect(config: &ServerConfig) -> Self {
        Self {
            soffice: probe(&config.soffice_command()),
            pdf2docx: probe(&config.pdf2docx_command()),
            pdfium: crate::media::pdf::pdfium_available(),
        }
    }

    /// Diagnostic block appended to conversion failures.
    pub fn render(&self) -> String {
        let status = |found: &Option<String>| match found {
            Some(version) => format!("✅ {}", version),
            None => "❌ not found".to_string(),
        };
        let mut lines = vec![
            "--- Diagnostics ---".to_string(),
            format!("OS: {}", platform()),
            format!("LibreOffice (soffice): {}", status(&self.soffice)),
            format!("pdf2docx: {}", status(&self.pdf2docx)),
            format!(
                "PDFium: {}",
                if self.pdfium { "✅ available" } else { "❌ not found" }
            ),
        ];
        let hints = self.hints();
        if !hints.is_empty() {
            lines.push("Suggestions:".to_string());
            lines.extend(hints.into_iter().map(|h| format!("  - {}", h)));
        }
        lines.join("\n")
    }

    pub fn hints(&self) -> Vec<&'static str> {
        let mut hints = Vec::new();
        if self.soffice.is_none() {
            hints.push(SOFFICE_HINT);
        }
        if self.pdf2docx.is_none() {
            hints.push(PDF2DOCX_HINT);
        }
        if !self.pdfium {
            hints.push(PDFIUM_HINT);
        }
        hints
    }
}

/// `linux (x86_64)` style platform string.
pub fn platform() -> String {
    format!("{} ({})", std::env::consts::OS, std::env::consts::ARCH)
}
