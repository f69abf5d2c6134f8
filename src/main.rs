use anyhow::Context;
use colored::Colorize;
use env_logger::{Builder, Target};
use log::LevelFilter;
use rustyconvert::bigwig::BigwigTools;
use rustyconvert::cli::{Commands, ToolPaths};
use rustyconvert::merge::MergeOptions;
use rustyconvert::*;
use std::io::Write;
use std::time::Instant;

fn main() {
    parse_cli();
}

fn bigwig_tools(tools: &ToolPaths) -> BigwigTools {
    BigwigTools::new(&tools.bigwig_to_bedgraph, &tools.bedgraph_to_bigwig)
}

fn run(command: &Commands) -> anyhow::Result<()> {
    match command {
        //
        // Run FilterFasta
        //
        Commands::FilterFasta {
            fasta,
            length,
            postfix,
            report,
        } => filter::run_filter(fasta, *length, postfix, report)
            .context("failed to filter FASTA by length")?,
        //
        // Run RenameFasta
        //
        Commands::RenameFasta {
            input,
            output,
            summary,
        } => rename::run_rename(input, output, summary)
            .with_context(|| format!("failed to rename the identifiers of {}", input.display()))?,
        //
        // Run AbiToFasta
        //
        Commands::AbiToFasta {
            inputs,
            output_prefix,
        } => {
            let out = abi::run_abi_to_fasta(inputs, output_prefix)
                .context("failed to convert ABI files")?;
            log::info!("Wrote {}", out.display());
        }
        //
        // Run ChromSizes
        //
        Commands::ChromSizes {
            fasta,
            on_duplicate,
            output,
        } => {
            bigwig::write_chrom_sizes(fasta, *on_duplicate, output)
                .with_context(|| format!("failed to measure {}", fasta.display()))?;
        }
        //
        // Run BigwigExtract
        //
        Commands::BigwigExtract {
            input_bigwig,
            regions,
            fasta,
            output_bigwig,
            on_duplicate,
            tools,
        } => bigwig::run_bigwig_extract(
            input_bigwig,
            regions,
            fasta,
            output_bigwig,
            *on_duplicate,
            &bigwig_tools(tools),
        )
        .with_context(|| format!("failed to extract regions of {}", input_bigwig.display()))?,
        //
        // Run BigwigSubset
        //
        Commands::BigwigSubset {
            bigwig,
            scaffolds,
            fasta,
            out_dir,
            on_duplicate,
            tools,
        } => {
            let out = bigwig::run_bigwig_subset(
                bigwig,
                scaffolds,
                fasta,
                out_dir,
                *on_duplicate,
                &bigwig_tools(tools),
            )
            .with_context(|| format!("failed to subset {}", bigwig.display()))?;
            log::info!("Wrote {}", out.display());
        }
        //
        // Run MergeTable
        //
        Commands::MergeTable {
            inputs,
            sample_ids,
            skip,
            index,
            target,
            default,
            output,
        } => {
            let opts = MergeOptions {
                skip: *skip,
                index: *index,
                target: *target,
                default: default.clone(),
            };
            merge::run_merge(inputs, sample_ids.as_deref(), &opts, output)
                .context("failed to merge tables")?;
        }
        //
        // Run SavToTsv
        //
        Commands::SavToTsv { input, output } => sav::run_sav_to_tsv(input, output)
            .with_context(|| format!("failed to convert {}", input.display()))?,
    };
    Ok(())
}

pub fn parse_cli() {
    let pg_start = Instant::now();
    let args = cli::make_cli_parse();

    // set the logging level
    let min_log_level = match args.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    Builder::new()
        .target(Target::Stderr)
        .filter(None, min_log_level)
        .format(|buf, record| writeln!(buf, "{:<8} {}", record.level(), record.args()))
        .init();

    log::debug!("DEBUG logging enabled");
    log::trace!("TRACE logging enabled");

    let command = match &args.command {
        Some(command) => command,
        None => return,
    };
    if let Err(e) = run(command) {
        log::error!("{:#}", e);
        std::process::exit(1);
    }

    let duration = pg_start.elapsed();
    log::info!(
        "{} done! Time elapsed: {}",
        command.name().bright_green().bold(),
        format!("{:.2?}", duration).bright_yellow().bold()
    );
}
