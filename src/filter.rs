use crate::error::Result;
use crate::fasta::{self, DuplicatePolicy, IdPolicy, ParseOptions, SeqAccumulator};
use crate::myio;
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Characters that are awkward in file names on Linux.
pub const RESERVED_CHARS: [char; 8] = ['/', '>', '<', ':', '&', '\'', '"', '\\'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Remain,
    Remove,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Remain => "remain",
            Status::Remove => "remove",
        }
    }
}

/// One row of the filtering report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub old_id: String,
    pub new_id: Option<String>,
    pub length: usize,
    pub status: Status,
}

impl ReportRow {
    fn write<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        writeln!(
            out,
            "{}\t{}\t{}\t{}",
            self.old_id,
            self.new_id.as_deref().unwrap_or("NA"),
            self.length,
            self.status.as_str()
        )
    }
}

/// Keep the first space delimited token of an ID and replace reserved characters with `_`.
/// ```
/// use rustyconvert::filter::sanitize_id;
/// assert_eq!(sanitize_id("chr1:1-100 some desc"), "chr1_1-100");
/// assert_eq!(sanitize_id("a/b\\c"), "a_b_c");
/// assert_eq!(sanitize_id(&sanitize_id("x<y>&z")), sanitize_id("x<y>&z"));
/// ```
pub fn sanitize_id(id: &str) -> String {
    id.split(' ')
        .next()
        .unwrap_or(id)
        .chars()
        .map(|c| if RESERVED_CHARS.contains(&c) { '_' } else { c })
        .collect()
}

/// `dir/name.ext` becomes `dir/name<postfix>.ext`; only the last extension is considered.
/// ```
/// use std::path::{Path, PathBuf};
/// use rustyconvert::filter::output_path;
/// assert_eq!(output_path(Path::new("data/prot.fasta"), "_filtered"), PathBuf::from("data/prot_filtered.fasta"));
/// assert_eq!(output_path(Path::new("a.fa.gz"), "_f"), PathBuf::from("a.fa_f.gz"));
/// assert_eq!(output_path(Path::new("genome"), "_f"), PathBuf::from("genome_f"));
/// ```
pub fn output_path(input: &Path, postfix: &str) -> PathBuf {
    let mut name = OsString::from(input.file_stem().unwrap_or_default());
    name.push(postfix);
    if let Some(ext) = input.extension() {
        name.push(".");
        name.push(ext);
    }
    input.with_file_name(name)
}

/// Filter one FASTA file, writing the kept records to `output` and returning a report row per record.
pub fn filter_fasta(input: &Path, output: &Path, min_len: usize) -> Result<Vec<ReportRow>> {
    let opts = ParseOptions {
        id_policy: IdPolicy::FullLine,
        on_duplicate: DuplicatePolicy::Replace,
    };
    let store = fasta::parse_records(input, &opts)?;

    let mut out = myio::writer(output)?;
    let mut rows = Vec::with_capacity(store.len());
    for (id, rec) in store.iter() {
        let length = rec.seq_len();
        if length < min_len {
            log::debug!("Removing {} with length {}", id, length);
            rows.push(ReportRow {
                old_id: id.to_string(),
                new_id: None,
                length,
                status: Status::Remove,
            });
            continue;
        }
        let new_id = sanitize_id(id);
        writeln!(out, ">{}", new_id)?;
        for line in &rec.lines {
            writeln!(out, "{}", line)?;
        }
        rows.push(ReportRow {
            old_id: id.to_string(),
            new_id: Some(new_id),
            length,
            status: Status::Remain,
        });
    }
    out.flush()?;
    Ok(rows)
}

/// Filter every input and write one report block per input file.
pub fn run_filter(inputs: &[PathBuf], min_len: usize, postfix: &str, report: &Path) -> Result<()> {
    let mut report_out = myio::writer(report)?;
    for input in inputs {
        writeln!(report_out, "#filename: {}", input.display())?;
        writeln!(report_out, "#Old_Fasta_ID\tNew_Fasta_ID\tLength\tStatus")?;

        let output = output_path(input, postfix);
        let rows = filter_fasta(input, &output, min_len)?;
        let kept = rows.iter().filter(|r| r.status == Status::Remain).count();
        log::info!(
            "Kept {} of {} sequences from {} in {}",
            kept,
            rows.len(),
            input.display(),
            output.display()
        );
        for row in &rows {
            row.write(&mut report_out)?;
        }
    }
    report_out.flush()?;
    Ok(())
}
