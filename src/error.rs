use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum Error {
    /// A path argument is missing the extension the operation requires.
    /// Raised before any filesystem access.
    Extension { path: PathBuf, expected: &'static str },
    /// The substitution pairs are not a genuine mapping.
    DuplicateKey(String),
    /// The template cannot be opened as a valid DOCX file.
    InvalidDocx(String),
    /// A merge input cannot be loaded as a valid PDF file.
    InvalidPdf { path: PathBuf, source: lopdf::Error },
    /// A merge input is neither a file list nor an existing folder.
    MergeInput(PathBuf),
    /// The resolved merge list contains no PDF files.
    NothingToMerge,
    /// A column identifier is not a valid spreadsheet column letter.
    InvalidColumn(String),
    /// Workbook open, worksheet selection or rewrite failure.
    Xlsx(String),
    /// The external DOCX to PDF converter reported failure.
    Conversion(String),
    /// An address failed the validation pattern.
    InvalidEmail(String),
    /// A named attachment does not exist at send time.
    AttachmentMissing(PathBuf),
    /// The mail client rejected or failed to transmit the message.
    Mail(String),
    /// The service-account key file is unreadable or the JWT cannot be signed.
    Credentials(String),
    /// The spreadsheet id is unknown or not accessible.
    SpreadsheetNotFound(String),
    /// The named worksheet tab does not exist in the spreadsheet.
    WorksheetNotFound(String),
    /// An upload cell holds a value JSON cannot represent.
    NonSerializable { row: usize, col: usize },
    /// Any other Sheets API failure.
    Api(String),
    Pdf(lopdf::Error),
    Zip(zip::result::ZipError),
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Extension { path, expected } => {
                write!(f, "{} should be a .{expected} file", path.display())
            }
            Error::DuplicateKey(key) => write!(f, "duplicate substitution key: {key:?}"),
            Error::InvalidDocx(reason) => {
                write!(f, "template file not found or is not a valid DOCX file: {reason}")
            }
            Error::InvalidPdf { path, source } => {
                write!(f, "{} is not a valid PDF file: {source}", path.display())
            }
            Error::MergeInput(path) => write!(
                f,
                "{} should be a list of PDF files or a valid folder path",
                path.display()
            ),
            Error::NothingToMerge => write!(f, "there is no PDF file in the file list"),
            Error::InvalidColumn(col) => write!(f, "invalid column identifier: {col:?}"),
            Error::Xlsx(reason) => write!(f, "XLSX error: {reason}"),
            Error::Conversion(reason) => write!(f, "DOCX to PDF conversion failed: {reason}"),
            Error::InvalidEmail(addr) => write!(f, "invalid email format: {addr}"),
            Error::AttachmentMissing(path) => {
                write!(f, "attachment not found: {}", path.display())
            }
            Error::Mail(reason) => write!(f, "mail client error: {reason}"),
            Error::Credentials(reason) => write!(f, "service account credentials: {reason}"),
            Error::SpreadsheetNotFound(id) => {
                write!(f, "spreadsheet <{id}> invalid or no permission")
            }
            Error::WorksheetNotFound(name) => write!(f, "worksheet tab <{name}> not found"),
            Error::NonSerializable { row, col } => {
                write!(f, "cell at row {row}, column {col} is not JSON-serializable")
            }
            Error::Api(reason) => write!(f, "Sheets API error: {reason}"),
            Error::Pdf(e) => write!(f, "PDF error: {e}"),
            Error::Zip(e) => write!(f, "ZIP error: {e}"),
            Error::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<zip::result::ZipError> for Error {
    fn from(e: zip::result::ZipError) -> Self {
        Error::Zip(e)
    }
}

impl From<lopdf::Error> for Error {
    fn from(e: lopdf::Error) -> Self {
        Error::Pdf(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}
