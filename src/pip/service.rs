//! Tagging spreadsheet rows as inside or outside a boundary.

use tracing::{debug, info};

use super::{Boundary, BoundaryIndex};
use crate::models::{extract_points, CellValue, LatLng, Table};

/// Point-in-area filter for one boundary
pub struct AreaFilter {
    name: String,
    index: BoundaryIndex,
}

/// Row positions grouped by containment
#[derive(Debug, Default, Clone, PartialEq)]
pub struct AreaReport {
    pub inside_rows: Vec<usize>,
    pub outside_rows: Vec<usize>,
    /// Rows without a usable coordinate pair
    pub invalid_rows: Vec<usize>,
}

impl AreaFilter {
    pub fn new(boundary: &Boundary) -> Self {
        Self {
            name: boundary.name.clone(),
            index: BoundaryIndex::build(boundary),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contains(&self, location: LatLng) -> bool {
        self.index.contains(location)
    }

    pub fn classify(&self, locations: &[LatLng]) -> Vec<bool> {
        locations.iter().map(|l| self.contains(*l)).collect()
    }

    /// Check every row's coordinates and record the result in `flag_column`.
    ///
    /// Rows with missing or invalid coordinates get an empty flag.
    pub fn tag_table(
        &self,
        table: &mut Table,
        lat_col: usize,
        lon_col: usize,
        flag_column: &str,
    ) -> AreaReport {
        let (points, _) = extract_points(table, lat_col, lon_col);

        let mut flags = vec![CellValue::Empty; table.len()];
        let mut report = AreaReport::default();
        let mut valid = vec![false; table.len()];

        for (row, location) in points {
            valid[row] = true;
            let inside = self.contains(location);
            debug!("Row {}: ({}, {}) inside={}", row, location.lat, location.lon, inside);
            flags[row] = CellValue::Bool(inside);
            if inside {
                report.inside_rows.push(row);
            } else {
                report.outside_rows.push(row);
            }
        }
        report.invalid_rows = (0..table.len()).filter(|r| !valid[*r]).collect();

        table.push_column(flag_column, flags);

        info!(
            "{}: {} inside, {} outside, {} without valid coordinates",
            self.name,
            report.inside_rows.len(),
            report.outside_rows.len(),
            report.invalid_rows.len()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> AreaFilter {
        let boundary = Boundary::from_geojson_str(
            "square",
            r#"{"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]]}"#,
        )
        .unwrap();
        AreaFilter::new(&boundary)
    }

    #[test]
    fn test_classify() {
        let f = filter();
        assert_eq!(f.name(), "square");
        assert_eq!(
            f.classify(&[LatLng::new(0.5, 0.5), LatLng::new(2.0, 2.0)]),
            vec![true, false]
        );
    }

    #[test]
    fn test_tag_table() {
        let mut table = Table::new(
            vec!["Matricula".into(), "Lat".into(), "Lon".into()],
            vec![
                vec!["1".into(), "0,5".into(), "0,5".into()],
                vec!["2".into(), "nan".into(), "0.5".into()],
                vec!["3".into(), CellValue::Number(3.0), CellValue::Number(3.0)],
            ],
        );

        let report = filter().tag_table(&mut table, 1, 2, "Inside_Area");

        assert_eq!(report.inside_rows, vec![0]);
        assert_eq!(report.outside_rows, vec![2]);
        assert_eq!(report.invalid_rows, vec![1]);

        let col = table.column_index("Inside_Area").unwrap();
        assert_eq!(table.cell(0, col), &CellValue::Bool(true));
        assert_eq!(table.cell(1, col), &CellValue::Empty);
        assert_eq!(table.cell(2, col), &CellValue::Bool(false));
    }
}
