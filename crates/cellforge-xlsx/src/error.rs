//! Errors from opening an XLSX package

use thiserror::Error;

pub type XlsxResult<T> = std::result::Result<T, XlsxError>;

#[derive(Debug, Error)]
pub enum XlsxError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The file is not a readable ZIP archive
    #[error("not a ZIP package: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Package is readable but its workbook is unusable
    #[error("not a usable workbook: {0}")]
    InvalidFormat(String),

    /// A part the relationships point at is absent from the archive
    #[error("package has no part '{0}'")]
    MissingPart(String),

    /// A cell or shared string entry with bad content
    #[error("{0}")]
    Parse(String),

    #[error(transparent)]
    Core(#[from] cellforge_core::Error),
}
