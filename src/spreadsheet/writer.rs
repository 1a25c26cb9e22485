//! Write a [`Table`] to `.xlsx` (formatted header) or `.csv`.

use anyhow::{Context, Result};
use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Workbook, Worksheet};
use std::path::Path;
use tracing::info;

use super::FileFormat;
use crate::models::{CellValue, Table};

#[derive(Debug, Clone)]
pub struct WriteOptions {
    pub sheet_name: String,
    /// Column widths by header name
    pub column_widths: Vec<(String, f64)>,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            sheet_name: "Results".to_string(),
            column_widths: Vec::new(),
        }
    }
}

impl WriteOptions {
    pub fn new(sheet_name: impl Into<String>) -> Self {
        Self {
            sheet_name: sheet_name.into(),
            column_widths: Vec::new(),
        }
    }

    pub fn with_width(mut self, column: impl Into<String>, width: f64) -> Self {
        self.column_widths.push((column.into(), width));
        self
    }
}

pub fn write_table<P: AsRef<Path>>(path: P, table: &Table, options: &WriteOptions) -> Result<()> {
    let path = path.as_ref();
    info!("Saving {} rows to '{}'...", table.len(), path.display());

    match FileFormat::from_path(path) {
        FileFormat::Csv => write_csv(path, table),
        FileFormat::Excel => write_xlsx(path, table, options),
    }
}

fn write_xlsx(path: &Path, table: &Table, options: &WriteOptions) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(&options.sheet_name)?;

    let header_format = Format::new()
        .set_bold()
        .set_border(FormatBorder::Thin)
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter);

    for (col, name) in table.headers.iter().enumerate() {
        worksheet.write_string_with_format(0, column(col)?, name, &header_format)?;
    }

    for (row_idx, row) in table.rows.iter().enumerate() {
        let xl_row = u32::try_from(row_idx + 1).context("Too many rows for a worksheet")?;
        for (col, value) in row.iter().enumerate() {
            write_value(worksheet, xl_row, column(col)?, value)?;
        }
    }

    for (name, width) in &options.column_widths {
        if let Some(col) = table.column_index(name) {
            worksheet.set_column_width(column(col)?, *width)?;
        }
    }

    workbook
        .save(path)
        .with_context(|| format!("Failed to save Excel file: {}", path.display()))?;
    Ok(())
}

fn column(col: usize) -> Result<u16> {
    u16::try_from(col).context("Too many columns for a worksheet")
}

fn write_value(ws: &mut Worksheet, row: u32, col: u16, value: &CellValue) -> Result<()> {
    match value {
        CellValue::Empty => {}
        CellValue::Number(n) if n.is_nan() => {}
        CellValue::Text(s) => {
            ws.write_string(row, col, s)?;
        }
        CellValue::Number(n) => {
            ws.write_number(row, col, *n)?;
        }
        CellValue::Bool(b) => {
            ws.write_boolean(row, col, *b)?;
        }
    }
    Ok(())
}

fn write_csv(path: &Path, table: &Table) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;

    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row.iter().map(CellValue::display))?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::read_table;

    fn results() -> Table {
        Table::new(
            vec!["Rua".into(), "Address".into(), "Latitude".into(), "Longitude".into()],
            vec![
                vec![
                    "Rua A".into(),
                    "Rua A, Guarujá, SP, Brazil".into(),
                    CellValue::Number(-23.99),
                    CellValue::Number(-46.25),
                ],
                vec![
                    "Rua Z".into(),
                    "Rua Z, Guarujá, SP, Brazil".into(),
                    "Not found".into(),
                    "Not found".into(),
                ],
                vec![CellValue::Empty, CellValue::Empty, CellValue::Empty, CellValue::Empty],
            ],
        )
    }

    #[test]
    fn test_xlsx_output_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resultado.xlsx");
        let options = WriteOptions::default()
            .with_width("Address", 60.0)
            .with_width("Latitude", 18.0);

        write_table(&path, &results(), &options).unwrap();

        let table = read_table(&path, Some("Results")).unwrap();
        assert_eq!(table.headers, results().headers);
        // the trailing empty row is not materialized
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(0, 2), &CellValue::Number(-23.99));
        assert_eq!(table.cell(1, 3).display(), "Not found");
    }

    #[test]
    fn test_csv_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resultado.csv");
        write_table(&path, &results(), &WriteOptions::default()).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("Rua,Address,Latitude,Longitude"));
        assert_eq!(
            lines.next(),
            Some("Rua A,\"Rua A, Guarujá, SP, Brazil\",-23.99,-46.25")
        );
    }
}
