//! minimal header-addressed csv table, loaded whole into memory

use std::collections::HashMap;
use std::path::Path;

use crate::error::{Result, StratError};

/// a csv table: header row plus raw string cells
#[derive(Debug, Clone)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// read a whole csv file (header row required)
    pub fn read_csv(path: &Path) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new().from_path(path)?;
        let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            rows.push(record.iter().map(|cell| cell.to_string()).collect());
        }

        Ok(Self { headers, rows })
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut wtr = csv::WriterBuilder::new().from_path(path)?;
        wtr.write_record(&self.headers)?;
        for row in &self.rows {
            wtr.write_record(row)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// column index or a configuration error naming the offending source
    pub fn require_column(&self, name: &str, source_name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| StratError::missing_column(name, source_name))
    }

    /// strict numeric column: every cell must parse as f64
    pub fn numeric_column(&self, index: usize) -> Result<Vec<f64>> {
        let name = &self.headers[index];
        let mut values = Vec::with_capacity(self.rows.len());
        for (i, row) in self.rows.iter().enumerate() {
            let cell = row[index].trim();
            let value = cell.parse::<f64>().map_err(|_| {
                StratError::numerical_error(format!(
                    "column '{}' row {}: cannot parse '{}' as a number",
                    name, i, cell
                ))
            })?;
            values.push(value);
        }
        Ok(values)
    }

    /// inner join keyed on `on`: self's columns first, then `other`'s minus
    /// the key, in left row order. repeated key values multiply rows, the
    /// same way a dataframe merge would.
    pub fn inner_join(&self, other: &Table, on: &str) -> Result<Table> {
        let left_key = self.require_column(on, "left join input")?;
        let right_key = other.require_column(on, "right join input")?;

        let mut right_by_key: HashMap<&str, Vec<usize>> = HashMap::new();
        for (i, row) in other.rows.iter().enumerate() {
            right_by_key.entry(row[right_key].as_str()).or_default().push(i);
        }

        let mut headers = self.headers.clone();
        for (j, header) in other.headers.iter().enumerate() {
            if j != right_key {
                headers.push(header.clone());
            }
        }

        let mut rows = Vec::new();
        for left_row in &self.rows {
            let Some(matches) = right_by_key.get(left_row[left_key].as_str()) else {
                continue;
            };
            for &r in matches {
                let mut row = left_row.clone();
                for (j, cell) in other.rows[r].iter().enumerate() {
                    if j != right_key {
                        row.push(cell.clone());
                    }
                }
                rows.push(row);
            }
        }

        Ok(Table { headers, rows })
    }
}
