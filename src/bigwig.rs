use crate::bed::{self, Region};
use crate::error::{Error, Result};
use crate::fasta::{self, DuplicatePolicy, IdPolicy, ParseOptions};
use crate::myio;
use crate::tools::{self, ExternalTool};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const CHROM_SIZES_NAME: &str = "chrom.size";

/// The pair of UCSC converters the BigWig commands shell out to.
#[derive(Debug, Clone)]
pub struct BigwigTools {
    pub to_bedgraph: ExternalTool,
    pub to_bigwig: ExternalTool,
}

impl Default for BigwigTools {
    fn default() -> Self {
        BigwigTools {
            to_bedgraph: ExternalTool::new(tools::DEFAULT_BIGWIG_TO_BEDGRAPH),
            to_bigwig: ExternalTool::new(tools::DEFAULT_BEDGRAPH_TO_BIGWIG),
        }
    }
}

impl BigwigTools {
    pub fn new(to_bedgraph: &str, to_bigwig: &str) -> BigwigTools {
        BigwigTools {
            to_bedgraph: ExternalTool::new(to_bedgraph),
            to_bigwig: ExternalTool::new(to_bigwig),
        }
    }

    pub fn ensure_available(&self) -> Result<()> {
        tools::ensure_available(&[&self.to_bedgraph, &self.to_bigwig])
    }

    /// `bigWigToBedGraph in.bw out.bedgraph -chrom=.. [-start=.. -end=..]`
    pub fn extract(&self, bigwig: &Path, bedgraph: &Path, rgn: &Region) -> Result<()> {
        self.to_bedgraph
            .command()
            .arg(bigwig)
            .arg(bedgraph)
            .args(rgn.tool_args())
            .run()
    }

    /// `bedGraphToBigWig in.bedgraph chrom.sizes out.bw`
    pub fn convert_to_bigwig(&self, bedgraph: &Path, chrom_sizes: &Path, bigwig: &Path) -> Result<()> {
        self.to_bigwig
            .command()
            .arg(bedgraph)
            .arg(chrom_sizes)
            .arg(bigwig)
            .run()
    }
}

/// Write the sequence lengths of a FASTA as a `chrom.sizes` table.
pub fn write_chrom_sizes(fasta: &Path, on_duplicate: DuplicatePolicy, output: &Path) -> Result<usize> {
    let opts = ParseOptions {
        id_policy: IdPolicy::FirstToken,
        on_duplicate,
    };
    let store = fasta::parse_lengths(fasta, &opts)?;
    let mut out = myio::writer(output)?;
    fasta::write_lengths(&store, &mut out)?;
    out.flush()?;
    Ok(store.len())
}

/// Extract every region into its own bedGraph, merge them and convert back to a BigWig.
fn extract_and_convert(
    tools: &BigwigTools,
    bigwig: &Path,
    rgns: &[(Region, PathBuf)],
    chrom_sizes: &Path,
    merged: &Path,
    output: &Path,
) -> Result<()> {
    for (rgn, bedgraph) in rgns {
        log::debug!("Extracting {} into {}", rgn, bedgraph.display());
        tools.extract(bigwig, bedgraph, rgn)?;
    }
    let bedgraphs: Vec<PathBuf> = rgns.iter().map(|(_, p)| p.clone()).collect();
    let n = bed::merge_bedgraphs(&bedgraphs, merged)?;
    log::info!("{} bedGraph records across {} regions", n, rgns.len());
    tools.convert_to_bigwig(merged, chrom_sizes, output)
}

/// Extract `NAME:START-END` regions of a BigWig into a new BigWig.
///
/// Intermediate files live in a temporary directory next to the input, removed on return.
pub fn run_bigwig_extract(
    input: &Path,
    regions: &Path,
    fasta: &Path,
    output: &Path,
    on_duplicate: DuplicatePolicy,
    tools: &BigwigTools,
) -> Result<()> {
    tools.ensure_available()?;
    myio::open(input)?;

    let parent = match input.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let tmp = tempfile::Builder::new()
        .prefix(".rcv-bigwig-extract")
        .tempdir_in(parent)?;
    log::debug!("Temporary files in {}", tmp.path().display());

    let chrom_sizes = tmp.path().join(CHROM_SIZES_NAME);
    write_chrom_sizes(fasta, on_duplicate, &chrom_sizes)?;

    let rgns: Vec<(Region, PathBuf)> = bed::read_regions(regions)?
        .into_iter()
        .enumerate()
        .map(|(i, rgn)| (rgn, tmp.path().join(format!("region_{}.bedgraph", i))))
        .collect();
    if rgns.is_empty() {
        return Err(Error::NoRegions {
            path: regions.to_path_buf(),
        });
    }

    let merged = tmp.path().join("merge.bedgraph");
    extract_and_convert(tools, input, &rgns, &chrom_sizes, &merged, output)?;
    tmp.close()?;
    Ok(())
}

/// Extract whole scaffolds of a BigWig, keeping every intermediate file in `out_dir`.
pub fn run_bigwig_subset(
    input: &Path,
    scaffolds: &Path,
    fasta: &Path,
    out_dir: &Path,
    on_duplicate: DuplicatePolicy,
    tools: &BigwigTools,
) -> Result<PathBuf> {
    tools.ensure_available()?;
    myio::open(input)?;
    fs::create_dir_all(out_dir)?;

    let chrom_sizes = out_dir.join(CHROM_SIZES_NAME);
    write_chrom_sizes(fasta, on_duplicate, &chrom_sizes)?;

    let rgns: Vec<(Region, PathBuf)> = bed::read_names(scaffolds)?
        .into_iter()
        .map(|rgn| {
            let path = out_dir.join(format!("{}.bedgraph", rgn.name));
            (rgn, path)
        })
        .collect();
    if rgns.is_empty() {
        return Err(Error::NoRegions {
            path: scaffolds.to_path_buf(),
        });
    }

    let output = out_dir.join("output.bigwig");
    extract_and_convert(
        tools,
        input,
        &rgns,
        &chrom_sizes,
        &out_dir.join("output.bedgraph"),
        &output,
    )?;
    Ok(output)
}
