use crate::error::{Error, Result};
use crate::myio;
use clap::ValueEnum;
use num_format::{Locale, ToFormattedString};
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::path::Path;

/// How the identifier is taken from a `>` header line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdPolicy {
    /// Everything after `>`, internal whitespace included.
    FullLine,
    /// Text after `>` up to the first space character.
    FirstToken,
}

impl IdPolicy {
    /// Identifier of a header line, with or without its leading `>`.
    /// ```
    /// use rustyconvert::fasta::IdPolicy;
    /// assert_eq!(IdPolicy::FullLine.header_id(">seq1 desc"), "seq1 desc");
    /// assert_eq!(IdPolicy::FirstToken.header_id(">seq1 desc"), "seq1");
    /// assert_eq!(IdPolicy::FirstToken.header_id("seq1\tdesc"), "seq1\tdesc");
    /// ```
    pub fn header_id<'a>(&self, header: &'a str) -> &'a str {
        let id = header.strip_prefix('>').unwrap_or(header);
        match self {
            IdPolicy::FullLine => id,
            IdPolicy::FirstToken => id.split(' ').next().unwrap_or(id),
        }
    }
}

/// What to do when a header names an identifier that is already in the store.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Abort with [`Error::DuplicateIdentifier`].
    Fail,
    /// Warn and keep adding to the earlier record (lengths are summed).
    Merge,
    /// Warn and start the record over (last one wins).
    Replace,
}

#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    pub id_policy: IdPolicy,
    pub on_duplicate: DuplicatePolicy,
}

/// Per-record state collected while reading sequence lines.
pub trait SeqAccumulator: Default {
    /// Add one stripped, non-empty sequence line.
    fn push_line(&mut self, line: &str);
    /// Fold another record with the same identifier into this one.
    fn absorb(&mut self, other: Self);
    /// Number of residues seen so far.
    fn seq_len(&self) -> usize;
}

/// Full record: the lines as they were wrapped in the input and the joined residues.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeqLines {
    pub lines: Vec<String>,
    pub seq: String,
}

impl SeqAccumulator for SeqLines {
    fn push_line(&mut self, line: &str) {
        self.lines.push(line.to_string());
        self.seq.push_str(line);
    }

    fn absorb(&mut self, other: Self) {
        self.lines.extend(other.lines);
        self.seq.push_str(&other.seq);
    }

    fn seq_len(&self) -> usize {
        self.seq.len()
    }
}

/// Length-only record.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeqLength(pub usize);

impl SeqAccumulator for SeqLength {
    fn push_line(&mut self, line: &str) {
        self.0 += line.len();
    }

    fn absorb(&mut self, other: Self) {
        self.0 += other.0;
    }

    fn seq_len(&self) -> usize {
        self.0
    }
}

impl SeqAccumulator for String {
    fn push_line(&mut self, line: &str) {
        self.push_str(line);
    }

    fn absorb(&mut self, other: Self) {
        self.push_str(&other);
    }

    fn seq_len(&self) -> usize {
        self.len()
    }
}

/// Insertion ordered map from identifier to record.
/// A duplicate that is merged or replaced keeps the slot of its first appearance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastaStore<A> {
    records: Vec<(String, A)>,
    index: HashMap<String, usize>,
}

impl<A> Default for FastaStore<A> {
    fn default() -> Self {
        FastaStore {
            records: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<A: SeqAccumulator> FastaStore<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&A> {
        self.index.get(id).map(|&i| &self.records[i].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &A)> {
        self.records.iter().map(|(id, rec)| (id.as_str(), rec))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|(id, _)| id.as_str())
    }

    /// Open the record for `id` and return its slot, applying `policy` if it already exists.
    fn begin(&mut self, id: &str, policy: DuplicatePolicy) -> Result<usize> {
        match self.index.get(id) {
            None => {
                let slot = self.records.len();
                self.records.push((id.to_string(), A::default()));
                self.index.insert(id.to_string(), slot);
                Ok(slot)
            }
            Some(&slot) => match policy {
                DuplicatePolicy::Fail => Err(Error::DuplicateIdentifier { id: id.to_string() }),
                DuplicatePolicy::Merge => {
                    log::warn!("Duplicate ID found! {} (adding to the earlier record)", id);
                    Ok(slot)
                }
                DuplicatePolicy::Replace => {
                    log::warn!("Duplicate ID found! {} (replacing the earlier record)", id);
                    self.records[slot].1 = A::default();
                    Ok(slot)
                }
            },
        }
    }

    /// Add a complete record.
    pub fn insert(&mut self, id: &str, record: A, policy: DuplicatePolicy) -> Result<()> {
        let slot = self.begin(id, policy)?;
        self.records[slot].1.absorb(record);
        Ok(())
    }
}

impl<A: SeqAccumulator> IntoIterator for FastaStore<A> {
    type Item = (String, A);
    type IntoIter = std::vec::IntoIter<(String, A)>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

/// Build a store from FASTA text.
///
/// Lines are stripped and blank lines ignored. A `>` line opens a record,
/// every other line is added to the open record. Sequence data before the
/// first header is an error.
pub fn parse<A: SeqAccumulator, R: BufRead>(reader: R, opts: &ParseOptions) -> Result<FastaStore<A>> {
    let mut store: FastaStore<A> = FastaStore::new();
    let mut current: Option<usize> = None;
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with('>') {
            let id = opts.id_policy.header_id(line);
            current = Some(store.begin(id, opts.on_duplicate)?);
        } else {
            match current {
                Some(slot) => store.records[slot].1.push_line(line),
                None => return Err(Error::SequenceBeforeHeader { line: idx + 1 }),
            }
        }
    }
    Ok(store)
}

fn parse_path<A: SeqAccumulator>(path: &Path, opts: &ParseOptions) -> Result<FastaStore<A>> {
    let store = parse(myio::reader(path)?, opts)?;
    log::info!(
        "Read {} sequences from {}",
        store.len().to_formatted_string(&Locale::en),
        path.display()
    );
    Ok(store)
}

/// Read full records (plain or gzipped) from a file.
pub fn parse_records(path: &Path, opts: &ParseOptions) -> Result<FastaStore<SeqLines>> {
    parse_path(path, opts)
}

/// Read only sequence lengths (plain or gzipped) from a file.
pub fn parse_lengths(path: &Path, opts: &ParseOptions) -> Result<FastaStore<SeqLength>> {
    parse_path(path, opts)
}

/// Write a `chrom.sizes` style table: `id<TAB>length`.
pub fn write_lengths<W: Write>(store: &FastaStore<SeqLength>, out: &mut W) -> io::Result<()> {
    for (id, len) in store.iter() {
        writeln!(out, "{}\t{}", id, len.0)?;
    }
    Ok(())
}

/// Write one record with its sequence wrapped at `width` columns.
pub fn write_wrapped<W: Write>(out: &mut W, id: &str, seq: &str, width: usize) -> io::Result<()> {
    writeln!(out, ">{}", id)?;
    for chunk in seq.as_bytes().chunks(width.max(1)) {
        out.write_all(chunk)?;
        out.write_all(b"\n")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: ParseOptions = ParseOptions {
        id_policy: IdPolicy::FullLine,
        on_duplicate: DuplicatePolicy::Replace,
    };

    fn lengths(text: &str, on_duplicate: DuplicatePolicy) -> Result<FastaStore<SeqLength>> {
        let opts = ParseOptions {
            id_policy: IdPolicy::FirstToken,
            on_duplicate,
        };
        parse(text.as_bytes(), &opts)
    }

    #[test]
    fn test_multi_line_records() {
        let text = ">seq1 desc\nACGT\n  AC  \n\n>seq2\nA\n";
        let store: FastaStore<SeqLines> = parse(text.as_bytes(), &FULL).unwrap();
        assert_eq!(store.len(), 2);
        let seq1 = store.get("seq1 desc").unwrap();
        assert_eq!(seq1.lines, vec!["ACGT", "AC"]);
        assert_eq!(seq1.seq, "ACGTAC");
        assert_eq!(store.get("seq2").unwrap().seq_len(), 1);
        assert_eq!(store.ids().collect::<Vec<_>>(), vec!["seq1 desc", "seq2"]);
    }

    #[test]
    fn test_length_is_sum_of_lines() {
        let text = ">a\nAC\nGTA\r\nT\n>b\n\n>c\nNNNN\n";
        let store = lengths(text, DuplicatePolicy::Fail).unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.get("a"), Some(&SeqLength(6)));
        assert_eq!(store.get("b"), Some(&SeqLength(0)));
        assert_eq!(store.get("c"), Some(&SeqLength(4)));
    }

    #[test]
    fn test_sequence_before_header() {
        let err = lengths("\nACGT\n>a\nA\n", DuplicatePolicy::Merge).err().unwrap();
        assert!(matches!(err, Error::SequenceBeforeHeader { line: 2 }));
    }

    #[test]
    fn test_duplicate_policies() {
        let text = ">a x\nAAAA\n>b\nCC\n>a y\nGG\n";
        let merged = lengths(text, DuplicatePolicy::Merge).unwrap();
        assert_eq!(merged.get("a"), Some(&SeqLength(6)));
        assert_eq!(merged.len(), 2);

        let replaced = lengths(text, DuplicatePolicy::Replace).unwrap();
        assert_eq!(replaced.get("a"), Some(&SeqLength(2)));
        // the replaced record keeps its first position
        assert_eq!(replaced.ids().collect::<Vec<_>>(), vec!["a", "b"]);

        let failed = lengths(text, DuplicatePolicy::Fail).err().unwrap();
        assert!(matches!(failed, Error::DuplicateIdentifier { id } if id == "a"));
    }

    #[test]
    fn test_full_line_ids_are_distinct() {
        let text = ">a x\nAAAA\n>a y\nGG\n";
        let store: FastaStore<SeqLines> = parse(text.as_bytes(), &FULL).unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_insert_fail_on_duplicate() {
        let mut store: FastaStore<String> = FastaStore::new();
        store
            .insert("trace1", "ACGT".to_string(), DuplicatePolicy::Fail)
            .unwrap();
        let err = store
            .insert("trace1", "TT".to_string(), DuplicatePolicy::Fail)
            .err()
            .unwrap();
        assert!(matches!(err, Error::DuplicateIdentifier { .. }));
        assert_eq!(store.get("trace1").unwrap(), "ACGT");
    }

    #[test]
    fn test_write_wrapped() {
        let seq = "A".repeat(170);
        let mut out = Vec::new();
        write_wrapped(&mut out, "x", &seq, 80).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], ">x");
        assert_eq!(lines[1].len(), 80);
        assert_eq!(lines[3].len(), 10);
    }

    #[test]
    fn test_write_lengths() {
        let store = lengths(">chr1 x\nACGT\n>chr2\nAC\n", DuplicatePolicy::Fail).unwrap();
        let mut out = Vec::new();
        write_lengths(&store, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "chr1\t4\nchr2\t2\n");
    }
}
