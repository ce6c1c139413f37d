use std::path::Path;
use std::process::Command;

use crate::error::Error;
use crate::require_extension;

/// Convert a DOCX file to PDF next to the source file.
///
/// The conversion itself is delegated to the headless LibreOffice converter;
/// the output name (same base name, `.pdf` extension) and any overwrite
/// behavior are owned by that collaborator. When `keep` is false the source
/// DOCX is deleted after a successful conversion.
///
/// A converter failure propagates as [`Error::Conversion`]; there is no
/// retry.
pub fn convert_docx_pdf(docx_path: &Path, keep: bool) -> Result<(), Error> {
    require_extension(docx_path, "docx")?;

    let outdir = docx_path.parent().filter(|p| !p.as_os_str().is_empty());
    let output = Command::new(soffice_binary())
        .arg("--headless")
        .arg("--convert-to")
        .arg("pdf")
        .arg("--outdir")
        .arg(outdir.unwrap_or(Path::new(".")))
        .arg(docx_path)
        .output()?;

    if !output.status.success() {
        return Err(Error::Conversion(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }

    if keep {
        log::info!(
            "PDF generated (original DOCX kept): {}",
            docx_path.display()
        );
    } else {
        std::fs::remove_file(docx_path)?;
        log::info!(
            "PDF generated (original DOCX removed): {}",
            docx_path.display()
        );
    }
    Ok(())
}

fn soffice_binary() -> &'static str {
    if cfg!(windows) { "soffice.exe" } else { "soffice" }
}
