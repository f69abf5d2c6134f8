use crate::error::{ColumnRole, Error, Result};
use crate::myio;
use itertools::Itertools;
use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

/// Which columns to join on and what to put in empty cells.
#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Physical lines to skip at the top of every file.
    pub skip: usize,
    pub index: usize,
    pub target: usize,
    pub default: String,
}

impl Default for MergeOptions {
    fn default() -> Self {
        MergeOptions {
            skip: 0,
            index: 0,
            target: 1,
            default: "NA".to_string(),
        }
    }
}

/// Keys in first-seen order, each with one value per input file.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct MergedTable {
    pub rows: Vec<(String, Vec<String>)>,
}

/// Sample ID of a file: its name without directory or last extension.
/// ```
/// use std::path::Path;
/// assert_eq!(rustyconvert::merge::sample_id(Path::new("runs/Sample1.counts.tsv")), "Sample1.counts");
/// ```
pub fn sample_id(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Join the target column of every file on the index column.
pub fn merge_files(inputs: &[PathBuf], opts: &MergeOptions) -> Result<MergedTable> {
    let mut table = MergedTable::default();
    let mut keys: HashMap<String, usize> = HashMap::new();
    for (file_idx, input) in inputs.iter().enumerate() {
        for (line_idx, line) in myio::reader(input)?.lines().enumerate() {
            let line = line?;
            if line_idx < opts.skip {
                continue;
            }
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let tokens: Vec<&str> = line.split('\t').collect();
            let out_of_range = |role, column| Error::ColumnIndexOutOfRange {
                role,
                column,
                path: input.clone(),
                line: line_idx + 1,
            };
            let key = *tokens
                .get(opts.index)
                .ok_or_else(|| out_of_range(ColumnRole::Index, opts.index))?;
            let value = *tokens
                .get(opts.target)
                .ok_or_else(|| out_of_range(ColumnRole::Target, opts.target))?;

            let row = match keys.get(key).copied() {
                Some(row) => {
                    let cell = &table.rows[row].1[file_idx];
                    if *cell != opts.default && cell != value {
                        log::warn!(
                            "Index (Column {}) is not unique. Duplicate values find: {}.",
                            opts.index,
                            key
                        );
                    }
                    row
                }
                None => {
                    keys.insert(key.to_string(), table.rows.len());
                    table
                        .rows
                        .push((key.to_string(), vec![opts.default.clone(); inputs.len()]));
                    table.rows.len() - 1
                }
            };
            table.rows[row].1[file_idx] = value.to_string();
        }
    }
    Ok(table)
}

/// Write the `#Index` header and one row per key.
pub fn write_table<W: Write>(table: &MergedTable, sample_ids: &[String], out: &mut W) -> std::io::Result<()> {
    writeln!(out, "#Index\t{}", sample_ids.iter().join("\t"))?;
    for (key, values) in &table.rows {
        writeln!(out, "{}\t{}", key, values.iter().join("\t"))?;
    }
    Ok(())
}

pub fn run_merge(
    inputs: &[PathBuf],
    sample_ids: Option<&[String]>,
    opts: &MergeOptions,
    output: &Path,
) -> Result<()> {
    let sample_ids: Vec<String> = match sample_ids {
        Some(ids) if ids.len() != inputs.len() => {
            return Err(Error::SampleIdMismatch {
                files: inputs.len(),
                samples: ids.len(),
            })
        }
        Some(ids) => ids.to_vec(),
        None => inputs.iter().map(|p| sample_id(p)).collect(),
    };
    let table = merge_files(inputs, opts)?;
    let mut out = myio::writer(output)?;
    write_table(&table, &sample_ids, &mut out)?;
    out.flush()?;
    log::info!(
        "Merged {} keys from {} files into {}",
        table.rows.len(),
        inputs.len(),
        output.display()
    );
    Ok(())
}
