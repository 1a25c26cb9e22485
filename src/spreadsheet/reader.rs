//! Read the first (or a named) sheet of a workbook, or a CSV file, into a [`Table`].

use anyhow::{bail, Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;
use tracing::{debug, info};

use super::FileFormat;
use crate::models::{CellValue, Table};

/// Read a table whose first row is the header.
///
/// `sheet` selects a worksheet by name; it is ignored for CSV input.
pub fn read_table<P: AsRef<Path>>(path: P, sheet: Option<&str>) -> Result<Table> {
    let path = path.as_ref();
    if !path.exists() {
        bail!("Input file not found: {}", path.display());
    }

    info!("Reading '{}' (first row as header)...", path.display());

    let table = match FileFormat::from_path(path) {
        FileFormat::Csv => read_csv(path)?,
        FileFormat::Excel => read_excel(path, sheet)?,
    };

    info!(
        "Loaded {} rows, columns: {}",
        table.len(),
        table.headers.join(", ")
    );
    Ok(table)
}

fn read_excel(path: &Path, sheet: Option<&str>) -> Result<Table> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("Failed to open workbook: {}", path.display()))?;

    let sheet_name = match sheet {
        Some(name) => name.to_string(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .context("Workbook has no sheets")?,
    };
    debug!("Using sheet '{}'", sheet_name);

    let range = workbook
        .worksheet_range(&sheet_name)
        .with_context(|| format!("Failed to read sheet: {}", sheet_name))?;

    // The range starts at the first used cell; keep positions sheet-relative
    let offset = range.start().map(|(_, col)| col as usize).unwrap_or(0);
    if offset > 0 {
        debug!("Sheet starts at column {}, padding {} empty column(s)", offset, offset);
    }
    let leading = || std::iter::repeat(CellValue::Empty).take(offset);

    let mut rows = range.rows();
    let headers = match rows.next() {
        Some(header_row) => leading()
            .chain(header_row.iter().map(cell_from_data))
            .enumerate()
            .map(|(i, c)| header_name(i, &c))
            .collect::<Vec<_>>(),
        None => return Ok(Table::default()),
    };

    let data: Vec<Vec<CellValue>> = rows
        .map(|r| leading().chain(r.iter().map(cell_from_data)).collect())
        .collect();

    Ok(Table::new(headers, trim_trailing_blank_rows(data)))
}

fn read_csv(path: &Path) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open CSV file: {}", path.display()))?;

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, h)| header_name(i, &CellValue::from(h.trim_start_matches('\u{feff}'))))
        .collect();

    let mut data = Vec::new();
    for result in reader.records() {
        let record = result?;
        data.push(
            record
                .iter()
                .map(|field| {
                    if field.is_empty() {
                        CellValue::Empty
                    } else {
                        CellValue::Text(field.to_string())
                    }
                })
                .collect(),
        );
    }

    Ok(Table::new(headers, trim_trailing_blank_rows(data)))
}

/// Convert a calamine cell
fn cell_from_data(cell: &Data) -> CellValue {
    match cell {
        Data::Empty | Data::Error(_) => CellValue::Empty,
        Data::String(s) if s.is_empty() => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => CellValue::Text(dt.to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
    }
}

/// Unnamed header cells get a positional name
fn header_name(index: usize, cell: &CellValue) -> String {
    let name = cell.display().trim().to_string();
    if name.is_empty() {
        format!("Unnamed: {}", index)
    } else {
        name
    }
}

fn trim_trailing_blank_rows(mut rows: Vec<Vec<CellValue>>) -> Vec<Vec<CellValue>> {
    while rows
        .last()
        .map(|r| r.iter().all(CellValue::is_blank))
        .unwrap_or(false)
    {
        rows.pop();
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_read_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("enderecos.csv");
        fs::write(
            &path,
            "\u{feff}Rua,Municipio,,Estado\nRua A,Guarujá,,SP\n,Santos\n,,,\n",
        )
        .unwrap();

        let table = read_table(&path, None).unwrap();
        assert_eq!(table.headers, vec!["Rua", "Municipio", "Unnamed: 2", "Estado"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(0, 1).display(), "Guarujá");
        assert!(table.cell(1, 0).is_blank());
        assert!(table.cell(1, 3).is_blank());
    }

    #[test]
    fn test_ragged_csv_keeps_extra_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("enderecos.csv");
        fs::write(&path, "Rua,Municipio\nRua A,Guarujá,nota,x\nRua B,Santos\n").unwrap();

        let mut table = read_table(&path, None).unwrap();
        assert_eq!(table.headers, vec!["Rua", "Municipio", "Unnamed: 2", "Unnamed: 3"]);

        table.push_column("Latitude", vec![CellValue::Number(-23.9)]);
        assert_eq!(table.cell(0, 2).display(), "nota");

        let out = dir.path().join("saida.csv");
        crate::spreadsheet::write_table(&out, &table, &Default::default()).unwrap();
        let written = fs::read_to_string(&out).unwrap();
        assert!(written.contains("Rua A,Guarujá,nota,x,-23.9"), "{}", written);
        assert!(written.contains("Rua B,Santos,,,"), "{}", written);
    }

    #[test]
    fn test_leading_empty_columns_keep_positions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("planilha.xlsx");
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 1, "Matricula").unwrap();
        sheet.write_string(0, 2, "Latitude").unwrap();
        sheet.write_string(1, 1, "A1").unwrap();
        sheet.write_number(1, 2, -23.98).unwrap();
        workbook.save(&path).unwrap();

        let table = read_table(&path, None).unwrap();
        assert_eq!(table.headers, vec!["Unnamed: 0", "Matricula", "Latitude"]);
        assert_eq!(table.resolve_column("#2"), Some(2));
        assert_eq!(table.cell(0, 2), &CellValue::Number(-23.98));
        assert!(table.cell(0, 0).is_blank());
    }

    #[test]
    fn test_missing_file() {
        let err = read_table("does/not/exist.xlsx", None).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_cell_conversion() {
        assert_eq!(cell_from_data(&Data::Int(7)), CellValue::Number(7.0));
        assert_eq!(cell_from_data(&Data::String(String::new())), CellValue::Empty);
        assert_eq!(
            cell_from_data(&Data::String("SP".into())),
            CellValue::Text("SP".into())
        );
    }
}
