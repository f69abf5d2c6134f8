use crate::fasta::DuplicatePolicy;
use clap::IntoApp;
use clap::{AppSettings, Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    author,
    version,
    about,
    propagate_version = true,
    subcommand_required = true,
    infer_subcommands = true,
    arg_required_else_help = true,
    help_expected = true
)]
#[clap(global_setting(AppSettings::DeriveDisplayOrder))]
pub struct Cli {
    /// Logging level [-v: Info, -vv: Debug, -vvv: Trace].
    #[clap(short, long, parse(from_occurrences), help_heading = "DEBUG")]
    pub verbose: usize,

    #[clap(subcommand)]
    pub command: Option<Commands>,
}

/// Locations of the UCSC converters used by the BigWig subcommands.
#[derive(Args, Debug, Clone)]
pub struct ToolPaths {
    /// Name or path of bigWigToBedGraph.
    #[clap(
        long,
        env = "BIGWIG_TO_BEDGRAPH",
        default_value = "bigWigToBedGraph",
        help_heading = "TOOLS"
    )]
    pub bigwig_to_bedgraph: String,
    /// Name or path of bedGraphToBigWig.
    #[clap(
        long,
        env = "BEDGRAPH_TO_BIGWIG",
        default_value = "bedGraphToBigWig",
        help_heading = "TOOLS"
    )]
    pub bedgraph_to_bigwig: String,
}

///
/// This structure contains all the subcommands for rustyconvert and their help descriptions.
///
/// Because of naming conventions for rust enums the commands names have
/// different capitalization than on the command line.
/// For example, the `FilterFasta` enum is invoked using `rcv filter-fasta`
/// and the `SavToTsv` command with `rcv sav-to-tsv`.
///
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Drop FASTA records shorter than a threshold.
    ///
    /// Each input is written next to itself as `<stem><postfix>.<ext>` with
    /// cleaned identifiers, and every decision is listed in the report.
    #[clap(visible_aliases = &["filter-by-length", "ffl"])]
    FilterFasta {
        /// Input FASTA files (plain or gzipped).
        #[clap(required = true)]
        fasta: Vec<PathBuf>,
        /// Minimum sequence length to keep.
        #[clap(short, long, default_value_t = 50)]
        length: usize,
        /// Appended to the file stem of each output.
        #[clap(short, long, default_value = "_filtered")]
        postfix: String,
        /// Tab separated report of old IDs, new IDs, lengths and status.
        #[clap(short, long, default_value = "report.txt")]
        report: PathBuf,
    },
    /// Replace the digits of FASTA identifiers with letters (0→K, 1→A ... 9→J).
    #[clap(visible_aliases = &["modify-id", "rename"])]
    RenameFasta {
        /// Input FASTA file.
        #[clap(short, long)]
        input: PathBuf,
        /// Renamed FASTA file.
        #[clap(short, long)]
        output: PathBuf,
        /// Two column table of old and new identifiers.
        #[clap(short, long)]
        summary: PathBuf,
    },
    /// Convert ABI sequencing traces into one FASTA file.
    #[clap(visible_aliases = &["abi2fasta", "ab1"])]
    AbiToFasta {
        /// Input .ab1/.abi files.
        #[clap(required = true)]
        inputs: Vec<PathBuf>,
        /// The FASTA is written to <OUTPUT_PREFIX>.fasta.
        #[clap(short, long, default_value = "output")]
        output_prefix: String,
    },
    /// Write the sequence lengths of a FASTA in chrom.sizes format.
    #[clap(visible_aliases = &["sizes"])]
    ChromSizes {
        /// Input FASTA file (plain or gzipped).
        fasta: PathBuf,
        /// What to do with a repeated sequence name.
        #[clap(long, value_enum, default_value_t = DuplicatePolicy::Merge)]
        on_duplicate: DuplicatePolicy,
        /// Output file.
        #[clap(short, long, default_value = "-")]
        output: PathBuf,
    },
    /// Extract NAME:START-END regions of a BigWig into a new BigWig.
    ///
    /// Requires bigWigToBedGraph and bedGraphToBigWig.
    #[clap(visible_aliases = &["bw-extract"])]
    BigwigExtract {
        /// Input BigWig.
        #[clap(short, long)]
        input_bigwig: PathBuf,
        /// File with one region per line, NAME:START-END or NAME.
        #[clap(short, long)]
        regions: PathBuf,
        /// FASTA of the genome the BigWig was built on.
        #[clap(short, long)]
        fasta: PathBuf,
        /// Output BigWig.
        #[clap(short, long)]
        output_bigwig: PathBuf,
        /// What to do with a repeated sequence name in the FASTA.
        #[clap(long, value_enum, default_value_t = DuplicatePolicy::Merge)]
        on_duplicate: DuplicatePolicy,
        #[clap(flatten)]
        tools: ToolPaths,
    },
    /// Extract whole scaffolds of a BigWig, keeping the intermediate files.
    ///
    /// Requires bigWigToBedGraph and bedGraphToBigWig.
    #[clap(visible_aliases = &["bw-subset"])]
    BigwigSubset {
        /// Input BigWig.
        #[clap(short, long)]
        bigwig: PathBuf,
        /// File with one scaffold name per line.
        #[clap(short, long)]
        scaffolds: PathBuf,
        /// FASTA of the genome the BigWig was built on.
        #[clap(short, long)]
        fasta: PathBuf,
        /// Directory for chrom.size, the bedGraphs and output.bigwig.
        #[clap(short, long)]
        out_dir: PathBuf,
        /// What to do with a repeated sequence name in the FASTA.
        #[clap(long, value_enum, default_value_t = DuplicatePolicy::Merge)]
        on_duplicate: DuplicatePolicy,
        #[clap(flatten)]
        tools: ToolPaths,
    },
    /// Join one column of many tab separated files on a shared key column.
    #[clap(visible_aliases = &["merge"])]
    MergeTable {
        /// Input tables.
        #[clap(required = true)]
        inputs: Vec<PathBuf>,
        /// Comma separated sample IDs, one per input [default: file stems].
        #[clap(short, long, value_delimiter = ',')]
        sample_ids: Option<Vec<String>>,
        /// Lines to skip at the top of every file.
        #[clap(long, default_value_t = 0)]
        skip: usize,
        /// Key column (0-based).
        #[clap(long, default_value_t = 0)]
        index: usize,
        /// Value column (0-based).
        #[clap(long, default_value_t = 1)]
        target: usize,
        /// Fill for keys missing from a file.
        #[clap(long, default_value = "NA")]
        default: String,
        /// Output table.
        #[clap(short, long, default_value = "merge.tsv")]
        output: PathBuf,
    },
    /// Convert an SPSS .sav file to TSV with a row of variable labels.
    #[clap(visible_aliases = &["sav2tsv"])]
    SavToTsv {
        /// Input .sav file.
        #[clap(short, long)]
        input: PathBuf,
        /// Output TSV.
        #[clap(short, long, default_value = "output.tsv")]
        output: PathBuf,
    },
}

impl Commands {
    /// Name of the subcommand as typed on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            Commands::FilterFasta { .. } => "filter-fasta",
            Commands::RenameFasta { .. } => "rename-fasta",
            Commands::AbiToFasta { .. } => "abi-to-fasta",
            Commands::ChromSizes { .. } => "chrom-sizes",
            Commands::BigwigExtract { .. } => "bigwig-extract",
            Commands::BigwigSubset { .. } => "bigwig-subset",
            Commands::MergeTable { .. } => "merge-table",
            Commands::SavToTsv { .. } => "sav-to-tsv",
        }
    }
}

pub fn make_cli_parse() -> Cli {
    Cli::parse()
}

pub fn make_cli_app() -> clap::Command<'static> {
    Cli::command()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_consistent() {
        make_cli_app().debug_assert();
    }

    #[test]
    fn test_defaults_and_aliases() {
        let cli = Cli::try_parse_from(["rcv", "-vv", "filter-by-length", "a.fa", "b.fa"]).unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Some(Commands::FilterFasta {
                fasta,
                length,
                postfix,
                report,
            }) => {
                assert_eq!(fasta.len(), 2);
                assert_eq!(length, 50);
                assert_eq!(postfix, "_filtered");
                assert_eq!(report, PathBuf::from("report.txt"));
            }
            c => panic!("unexpected command {:?}", c),
        }

        let cli = Cli::try_parse_from(["rcv", "merge-table", "-s", "a,b", "x.tsv", "y.tsv"]).unwrap();
        match cli.command {
            Some(Commands::MergeTable {
                sample_ids, target, ..
            }) => {
                assert_eq!(sample_ids, Some(vec!["a".to_string(), "b".to_string()]));
                assert_eq!(target, 1);
            }
            c => panic!("unexpected command {:?}", c),
        }

        let cli = Cli::try_parse_from(["rcv", "chrom-sizes", "--on-duplicate", "fail", "g.fa"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::ChromSizes {
                on_duplicate: DuplicatePolicy::Fail,
                ..
            })
        ));
        assert!(Cli::try_parse_from(["rcv", "sav-to-tsv"]).is_err());
    }
}
