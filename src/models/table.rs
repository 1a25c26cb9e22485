//! In-memory spreadsheet table shared by readers, writers and the pipelines.

use hashbrown::HashMap;
use std::fmt;
use tracing::warn;

/// A single spreadsheet cell
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl CellValue {
    /// True for empty cells and text cells holding only whitespace
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Number(n) => n.is_nan(),
            CellValue::Bool(_) => false,
        }
    }

    /// Text form used when building addresses and writing CSV.
    ///
    /// Integral numbers print without a decimal part so that house numbers
    /// and postal codes read back as they were typed.
    pub fn display(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => format_number(*n),
            CellValue::Bool(b) => b.to_string(),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        String::new()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Header row plus data rows.
///
/// Rows are kept rectangular: shorter rows read from disk are padded with
/// `CellValue::Empty` up to the header width, and cells past the last header
/// get `Unnamed: N` columns of their own.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
    index: HashMap<String, usize>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        let mut table = Self {
            headers,
            rows,
            index: HashMap::new(),
        };
        table.widen_headers();
        table.reindex();
        table.pad_rows();
        table
    }

    fn widen_headers(&mut self) {
        let width = self.rows.iter().map(Vec::len).max().unwrap_or(0);
        if width <= self.headers.len() {
            return;
        }
        warn!(
            "Some rows have {} cells but the header only {}; adding unnamed columns",
            width,
            self.headers.len()
        );
        for i in self.headers.len()..width {
            self.headers.push(format!("Unnamed: {}", i));
        }
    }

    fn reindex(&mut self) {
        self.index.clear();
        for (i, h) in self.headers.iter().enumerate() {
            // First occurrence wins for duplicate headers
            self.index.entry(h.trim().to_string()).or_insert(i);
        }
    }

    fn pad_rows(&mut self) {
        let width = self.headers.len();
        for row in &mut self.rows {
            if row.len() < width {
                row.resize(width, CellValue::Empty);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column position by header name (surrounding whitespace ignored)
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.index.get(name.trim()).copied()
    }

    /// Resolve a column given either a header name or a zero-based
    /// position written as `#N`.
    pub fn resolve_column(&self, spec: &str) -> Option<usize> {
        if let Some(pos) = spec.strip_prefix('#') {
            return pos
                .parse::<usize>()
                .ok()
                .filter(|i| *i < self.headers.len());
        }
        self.column_index(spec)
    }

    pub fn cell(&self, row: usize, col: usize) -> &CellValue {
        static EMPTY: CellValue = CellValue::Empty;
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY)
    }

    /// Append a column, or overwrite the column with the same header.
    ///
    /// Missing trailing values are filled with `CellValue::Empty`.
    pub fn push_column(&mut self, name: &str, values: Vec<CellValue>) -> usize {
        let col = match self.column_index(name) {
            Some(col) => col,
            None => {
                self.headers.push(name.to_string());
                self.reindex();
                self.pad_rows();
                self.headers.len() - 1
            }
        };

        let mut values = values.into_iter();
        for row in &mut self.rows {
            row[col] = values.next().unwrap_or_default();
        }
        col
    }

    /// Keep only the rows for which `keep(row_index)` is true
    pub fn retain_rows<F>(&mut self, mut keep: F)
    where
        F: FnMut(usize) -> bool,
    {
        let mut i = 0;
        self.rows.retain(|_| {
            let k = keep(i);
            i += 1;
            k
        });
    }

    /// Copy of the table restricted to the given row positions
    pub fn select_rows(&self, rows: &[usize]) -> Table {
        Table::new(
            self.headers.clone(),
            rows.iter()
                .filter_map(|r| self.rows.get(*r).cloned())
                .collect(),
        )
    }
}
