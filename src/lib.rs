//! # Command line interface for rustyconvert
//! [rustyconvert command line interface, subcommands, and options.](cli::Commands)
//! # README for rustyconvert
#![doc = include_str!("../README.md")]
/// Read ABI sequencing traces.
pub mod abi;
/// Region files and bedGraph merging.
pub mod bed;
/// Subset BigWig files with the UCSC tools.
pub mod bigwig;
/// Command line interface for rustyconvert.
pub mod cli;
/// Error type shared by every subcommand.
pub mod error;
/// The FASTA store builder.
pub mod fasta;
/// Filter FASTA records by length.
pub mod filter;
/// Join columns of tab separated files.
pub mod merge;
/// Module for automatically reading a writing compressed or uncompressed files.
pub mod myio;
/// Remap digits in FASTA identifiers.
pub mod rename;
/// Convert SPSS system files.
pub mod sav;
/// Running external programs.
pub mod tools;
