//! Spreadsheet input and output.

mod reader;
mod writer;

use std::path::Path;

pub use reader::read_table;
pub use writer::{write_table, WriteOptions};

/// On-disk format, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Excel,
}

impl FileFormat {
    /// `.csv` is CSV; everything else goes through the workbook reader/writer
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("csv") => FileFormat::Csv,
            _ => FileFormat::Excel,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(FileFormat::from_path(Path::new("a.CSV")), FileFormat::Csv);
        assert_eq!(FileFormat::from_path(Path::new("a.xlsx")), FileFormat::Excel);
        assert_eq!(FileFormat::from_path(Path::new("a.ods")), FileFormat::Excel);
        assert_eq!(FileFormat::from_path(Path::new("noext")), FileFormat::Excel);
    }
}
