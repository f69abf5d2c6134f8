use crate::error::Result;
use crate::fasta::IdPolicy;
use crate::myio;
use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::path::Path;

/// Replacement letter for a digit, `None` for anything else.
fn digit_letter(c: char) -> Option<char> {
    match c {
        '0' => Some('K'),
        '1' => Some('A'),
        '2' => Some('B'),
        '3' => Some('C'),
        '4' => Some('D'),
        '5' => Some('E'),
        '6' => Some('F'),
        '7' => Some('G'),
        '8' => Some('I'),
        '9' => Some('J'),
        _ => None,
    }
}

/// Replace every digit of an ID with a letter.
/// ```
/// use rustyconvert::rename::remap_digits;
/// assert_eq!(remap_digits("G1234"), "GABCD");
/// assert_eq!(remap_digits("scaffold_0098"), "scaffold_KKJI");
/// ```
pub fn remap_digits(id: &str) -> String {
    id.chars().map(|c| digit_letter(c).unwrap_or(c)).collect()
}

/// Rewrite the headers of a FASTA stream, returning `(old, new)` pairs in order of first appearance.
///
/// Lines are stripped; header descriptions are dropped and everything else is copied.
pub fn rename_headers<R: BufRead, W: Write>(reader: R, out: &mut W) -> Result<Vec<(String, String)>> {
    let mut order: Vec<(String, String)> = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.starts_with('>') {
            let old_id = IdPolicy::FirstToken.header_id(line);
            let new_id = remap_digits(old_id);
            writeln!(out, ">{}", new_id)?;
            match seen.get(old_id).copied() {
                Some(i) => order[i].1 = new_id,
                None => {
                    seen.insert(old_id.to_string(), order.len());
                    order.push((old_id.to_string(), new_id));
                }
            }
        } else {
            writeln!(out, "{}", line)?;
        }
    }
    Ok(order)
}

/// Remap the IDs of `input` into `output` and write the `old<TAB>new` table to `summary`.
pub fn run_rename(input: &Path, output: &Path, summary: &Path) -> Result<()> {
    let reader = myio::reader(input)?;
    let mut out = myio::writer(output)?;
    let pairs = rename_headers(reader, &mut out)?;
    out.flush()?;

    let mut summary_out = myio::writer(summary)?;
    for (old_id, new_id) in &pairs {
        writeln!(summary_out, "{}\t{}", old_id, new_id)?;
    }
    summary_out.flush()?;
    log::info!("Renamed {} IDs", pairs.len());
    Ok(())
}
