mod convert;
mod docx;
mod email;
mod error;
mod pdf;
mod sheets;
mod xlsx;

pub use convert::convert_docx_pdf;
pub use docx::{populate_docx_paragraph, populate_docx_table};
pub use email::{MailClient, OutgoingMail, Recipients, format_valid_emails, send_mail, validate_email};
#[cfg(windows)]
pub use email::OutlookClient;
pub use error::Error;
pub use pdf::{MergeInput, merge_pdfs};
pub use sheets::{CellValue, UploadTable, gsheet_upload};
pub use xlsx::{ColumnFormatRule, ColumnGroupRule, adjust_xlsx_columns};

use std::path::Path;

/// Reject a path that does not carry the required extension.
///
/// Every path-bearing operation calls this before touching the filesystem,
/// so a wrong extension always surfaces as [`Error::Extension`] rather than
/// a not-found error.
pub(crate) fn require_extension(path: &Path, expected: &'static str) -> Result<(), Error> {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext == expected => Ok(()),
        _ => Err(Error::Extension {
            path: path.to_path_buf(),
            expected,
        }),
    }
}
