//! Reading and writing flat parameter vectors.
//!
//! Text files hold whitespace-separated numbers, any number per line; blank
//! lines and lines starting with `#` or `;` are skipped. Files ending in
//! `.json` hold a single JSON array.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::{RefineError, RefineResult};

pub fn read_vector(path: &Path) -> RefineResult<Vec<f64>> {
    let is_json = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let file = File::open(path).map_err(|err| {
        RefineError::Invalid(format!(
            "failed to open vector file {}: {err}",
            path.display()
        ))
    })?;
    if is_json {
        return serde_json::from_reader(BufReader::new(file)).map_err(|err| {
            RefineError::Parse(format!("invalid JSON vector in {}: {err}", path.display()))
        });
    }
    parse_vector(BufReader::new(file), &path.display().to_string())
}

pub fn parse_vector<R: BufRead>(reader: R, source: &str) -> RefineResult<Vec<f64>> {
    let mut values = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.map_err(|err| {
            RefineError::Invalid(format!("failed to read vector from {source}: {err}"))
        })?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        for token in line.split_whitespace() {
            let value: f64 = token.parse().map_err(|_| {
                RefineError::Parse(format!(
                    "invalid number '{token}' in {source} on line {}",
                    line_no + 1
                ))
            })?;
            values.push(value);
        }
    }
    Ok(values)
}

pub fn write_vector(path: &Path, values: &[f64]) -> RefineResult<()> {
    let file = File::create(path).map_err(|err| {
        RefineError::Invalid(format!(
            "failed to write vector file {}: {err}",
            path.display()
        ))
    })?;
    let mut out = BufWriter::new(file);
    for value in values {
        writeln!(out, "{:>23.16e}", value)?;
    }
    out.flush()?;
    Ok(())
}
