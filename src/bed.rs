use super::myio;
use crate::error::{Error, Result};
use bio::io::bed;
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

lazy_static! {
    static ref RGN_RE: Regex = Regex::new(r"^([^\s:]+):([0-9]+)-([0-9]+)$").unwrap();
}

/// A region handed to `bigWigToBedGraph`; without coordinates it covers the whole sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Region {
    pub name: String,
    pub st: Option<u64>,
    pub en: Option<u64>,
}

impl Region {
    pub fn whole(name: &str) -> Region {
        Region {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Region flags in the form the UCSC tools expect.
    /// ```
    /// let rgn = rustyconvert::bed::parse_region("chr1:100-200").unwrap();
    /// assert_eq!(rgn.tool_args(), vec!["-chrom=chr1", "-start=100", "-end=200"]);
    /// ```
    pub fn tool_args(&self) -> Vec<String> {
        let mut args = vec![format!("-chrom={}", self.name)];
        if let Some(st) = self.st {
            args.push(format!("-start={}", st));
        }
        if let Some(en) = self.en {
            args.push(format!("-end={}", en));
        }
        args
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (self.st, self.en) {
            (Some(st), Some(en)) => write!(f, "{}:{}-{}", self.name, st, en),
            _ => write!(f, "{}", self.name),
        }
    }
}

/// parse region strings, `NAME:START-END` or a bare `NAME`
/// # Example
/// ```
/// let rgn = rustyconvert::bed::parse_region("chr1:1-1000").unwrap();
/// assert_eq!("chr1", rgn.name);
/// assert_eq!(Some(1), rgn.st);
/// assert_eq!(Some(1000), rgn.en);
///
/// let rgn2 = rustyconvert::bed::parse_region("scaffold_12").unwrap();
/// assert_eq!(None, rgn2.st);
///
/// assert!(rustyconvert::bed::parse_region("chr1:1000").is_none());
/// ```
pub fn parse_region(region: &str) -> Option<Region> {
    let region = region.trim();
    if let Some(caps) = RGN_RE.captures(region) {
        return Some(Region {
            name: caps[1].to_string(),
            st: Some(caps[2].parse().ok()?),
            en: Some(caps[3].parse().ok()?),
        });
    }
    if region.is_empty() || region.contains(':') || region.contains(char::is_whitespace) {
        return None;
    }
    Some(Region::whole(region))
}

/// Read one region per line, skipping blank lines and warning about lines that are not regions.
pub fn read_regions(path: &Path) -> Result<Vec<Region>> {
    let mut rgns = Vec::new();
    for line in myio::reader(path)?.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_region(line) {
            Some(rgn) => rgns.push(rgn),
            None => log::warn!("Failed to recognize the region: {}", line),
        }
    }
    Ok(rgns)
}

/// Read one sequence name per line.
pub fn read_names(path: &Path) -> Result<Vec<Region>> {
    let mut rgns = Vec::new();
    for line in myio::reader(path)?.lines() {
        let line = line?;
        let line = line.trim();
        if !line.is_empty() {
            rgns.push(Region::whole(line));
        }
    }
    Ok(rgns)
}

/// Concatenate bedGraph files and sort the records by chromosome, then start.
/// Returns the number of records written.
pub fn merge_bedgraphs(inputs: &[PathBuf], output: &Path) -> Result<usize> {
    let mut records: Vec<bed::Record> = Vec::new();
    for input in inputs {
        let mut reader = bed::Reader::new(myio::reader(input)?);
        for (idx, rec) in reader.records().enumerate() {
            let rec = rec.map_err(|e| Error::Bedgraph {
                path: input.clone(),
                msg: format!("line {}: {}", idx + 1, e),
            })?;
            records.push(rec);
        }
    }
    records.sort_by(|a, b| a.chrom().cmp(b.chrom()).then(a.start().cmp(&b.start())));

    let mut out = myio::writer(output)?;
    for rec in &records {
        // bedGraph keeps the data value in the name column
        match rec.name() {
            Some(value) => writeln!(out, "{}\t{}\t{}\t{}", rec.chrom(), rec.start(), rec.end(), value)?,
            None => writeln!(out, "{}\t{}\t{}", rec.chrom(), rec.start(), rec.end())?,
        }
    }
    out.flush()?;
    log::debug!("Merged {} bedGraph records into {}", records.len(), output.display());
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_parse_region() {
        assert_eq!(
            parse_region(" chr2:5-20 "),
            Some(Region {
                name: "chr2".to_string(),
                st: Some(5),
                en: Some(20)
            })
        );
        assert_eq!(parse_region("chrX"), Some(Region::whole("chrX")));
        assert_eq!(
            parse_region("HLA-A:1-2"),
            Some(Region {
                name: "HLA-A".to_string(),
                st: Some(1),
                en: Some(2)
            })
        );
        let acc = parse_region("NC_000001.11:100-200").unwrap();
        assert_eq!(acc.name, "NC_000001.11");
        assert_eq!(acc.tool_args(), vec!["-chrom=NC_000001.11", "-start=100", "-end=200"]);
        assert_eq!(parse_region("chr1:1:2-3"), None);
        assert_eq!(parse_region("chr1 2 3"), None);
        assert_eq!(parse_region(""), None);
        assert_eq!(format!("{}", parse_region("c:1-2").unwrap()), "c:1-2");
        assert_eq!(Region::whole("c").tool_args(), vec!["-chrom=c"]);
    }

    #[test]
    fn test_read_regions_skips_bad_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("regions.txt");
        fs::write(&path, "chr1:1-10\n\nbad:line\nchr2\n").unwrap();
        let rgns = read_regions(&path).unwrap();
        assert_eq!(rgns.len(), 2);
        assert_eq!(rgns[1].name, "chr2");
    }

    #[test]
    fn test_merge_bedgraphs_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.bedgraph");
        let b = dir.path().join("b.bedgraph");
        fs::write(&a, "chr2\t100\t200\t1.5\nchr1\t50\t60\t2\n").unwrap();
        fs::write(&b, "chr1\t5\t10\t0.25\n").unwrap();
        let out = dir.path().join("merged.bedgraph");

        assert_eq!(merge_bedgraphs(&[a, b], &out).unwrap(), 3);
        let text = fs::read_to_string(&out).unwrap();
        let rows: Vec<Vec<&str>> = text.lines().map(|l| l.split('\t').collect()).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0][..2], ["chr1", "5"]);
        assert_eq!(rows[1][..2], ["chr1", "50"]);
        assert_eq!(rows[2][..2], ["chr2", "100"]);
        assert_eq!(rows[0][3], "0.25");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_merge_bedgraphs_reports_write_errors() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.bedgraph");
        fs::write(&a, "chr1\t5\t10\t0.25\n").unwrap();
        // every write to /dev/full fails with ENOSPC once the buffer is flushed
        let err = merge_bedgraphs(&[a], Path::new("/dev/full")).err().unwrap();
        assert!(matches!(err, Error::Io(_)));
    }
}
