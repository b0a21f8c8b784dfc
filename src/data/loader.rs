// ============================================================
// Data — CSV Loader
// ============================================================
// Reads a numeric CSV file into samples. One column is the
// label (by header name or by index); every other column is a
// feature. Blank lines and lines starting with '#' are skipped.
//
// For classification the label becomes y = [class]; for
// regression it becomes y = [value]. Parsing is strict: a
// non-numeric cell is an error that names the line and column.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::Sample;
use crate::error::{ExecError, Result};

/// Which column holds the label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LabelColumn {
    Index(usize),
    Name(String),
}

#[derive(Debug, Clone)]
pub struct CsvOptions {
    pub path: PathBuf,
    /// `None` means the last column.
    pub label: Option<LabelColumn>,
    pub has_header: bool,
    pub delimiter: char,
}

impl CsvOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            label: None,
            has_header: true,
            delimiter: ',',
        }
    }
}

/// Load every row of the file as a sample.
pub fn read_csv(options: &CsvOptions) -> Result<Vec<Sample>> {
    let text = fs::read_to_string(&options.path)?;
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty() && !l.starts_with('#'));

    let header: Option<Vec<String>> = if options.has_header {
        lines
            .next()
            .map(|(_, l)| l.split(options.delimiter).map(|c| c.trim().to_string()).collect())
    } else {
        None
    };

    let mut samples = Vec::new();
    let mut width = None;

    for (line_no, line) in lines {
        let cells: Vec<&str> = line.split(options.delimiter).map(str::trim).collect();
        let expected = *width.get_or_insert(cells.len());
        if cells.len() != expected {
            return Err(ExecError::Shape(format!(
                "{}:{line_no}: expected {expected} columns, found {}",
                options.path.display(),
                cells.len()
            )));
        }

        let label_at = label_index(options, header.as_deref(), cells.len())?;
        let mut x = Vec::with_capacity(cells.len().saturating_sub(1));
        let mut y = 0.0f32;
        for (col, cell) in cells.iter().enumerate() {
            let value: f32 = cell.parse().map_err(|_| {
                ExecError::invalid(
                    format!("{}:{line_no}:{}", options.path.display(), col + 1),
                    format!("'{cell}' is not a number"),
                )
            })?;
            if col == label_at {
                y = value;
            } else {
                x.push(value);
            }
        }
        samples.push(Sample::new(x, vec![y]));
    }

    tracing::info!(
        "Loaded {} rows from '{}'",
        samples.len(),
        options.path.display()
    );
    Ok(samples)
}

fn label_index(options: &CsvOptions, header: Option<&[String]>, columns: usize) -> Result<usize> {
    let index = match &options.label {
        None => columns.saturating_sub(1),
        Some(LabelColumn::Index(i)) => *i,
        Some(LabelColumn::Name(name)) => header
            .and_then(|h| h.iter().position(|c| c == name))
            .ok_or_else(|| ExecError::invalid("label", format!("no column named '{name}'")))?,
    };
    if index >= columns {
        return Err(ExecError::invalid(
            "label",
            format!("column {index} is out of range for {columns} columns"),
        ));
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("data.csv");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_last_column_is_label_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "a,b,class\n1,2,0\n\n# comment\n3,4,1\n");

        let samples = read_csv(&CsvOptions::new(&path)).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].x, vec![3.0, 4.0]);
        assert_eq!(samples[1].label(), 1);
    }

    #[test]
    fn test_named_label_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "class;a;b\n2;0.5;1.5\n");

        let mut options = CsvOptions::new(&path);
        options.delimiter = ';';
        options.label = Some(LabelColumn::Name("class".into()));

        let samples = read_csv(&options).unwrap();
        assert_eq!(samples[0].x, vec![0.5, 1.5]);
        assert_eq!(samples[0].label(), 2);
    }

    #[test]
    fn test_bad_cells_and_ragged_rows() {
        let dir = tempfile::tempdir().unwrap();

        let path = write(&dir, "1,x,0\n");
        let mut options = CsvOptions::new(&path);
        options.has_header = false;
        assert!(matches!(read_csv(&options), Err(ExecError::InvalidValue { .. })));

        let path = write(&dir, "1,2,0\n1,0\n");
        let mut options = CsvOptions::new(&path);
        options.has_header = false;
        assert!(matches!(read_csv(&options), Err(ExecError::Shape(_))));
    }
}
