use super::value::{infer_kind, to_value};
use super::{Dataset, DatasetError, Row};
use csv::{ReaderBuilder, StringRecord};
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Loads a CSV file into a [`Dataset`].
pub struct DatasetLoader;

impl DatasetLoader {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Dataset, DatasetError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| DatasetError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let dataset = Self::from_reader(file)?;
        tracing::info!(
            "📊 Loaded {} rows x {} columns from {}",
            dataset.rows().len(),
            dataset.columns().len(),
            path.display()
        );
        Ok(dataset)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Dataset, DatasetError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(reader);

        let header = reader.headers()?.clone();
        if header.is_empty() {
            return Err(DatasetError::MissingHeader);
        }
        let columns = dedupe_columns(&header);

        let records = reader
            .records()
            .collect::<Result<Vec<StringRecord>, csv::Error>>()?;

        let kinds: Vec<_> = (0..columns.len())
            .map(|idx| infer_kind(records.iter().map(|record| &record[idx])))
            .collect();
        tracing::debug!("Inferred column kinds: {:?}", kinds);

        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .zip(record.iter())
                    .zip(kinds.iter())
                    .map(|((name, cell), kind)| (name.clone(), to_value(cell, *kind)))
                    .collect::<Row>()
            })
            .collect();

        Ok(Dataset::new(columns, rows))
    }
}

/// Repeated header names get `.1`, `.2`, ... suffixes so no column is lost.
fn dedupe_columns(header: &StringRecord) -> Vec<String> {
    let mut seen = HashSet::new();
    header
        .iter()
        .map(|name| {
            let mut candidate = name.to_string();
            let mut suffix = 1;
            while !seen.insert(candidate.clone()) {
                candidate = format!("{name}.{suffix}");
                suffix += 1;
            }
            candidate
        })
        .collect()
}
