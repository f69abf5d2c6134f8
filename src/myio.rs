use crate::error::{Error, Result};
use flate2::read::MultiGzDecoder;
use flate2::write;
use flate2::Compression;
use std::ffi::OsStr;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// First bytes of every gzip member (magic number + deflate method).
pub const GZIP_MAGIC: [u8; 3] = [0x1f, 0x8b, 0x08];

const BUFFER_SIZE: usize = 128 * 1024;

/// Open a file for reading, failing with [`Error::MissingFile`] if it does not exist.
pub fn open(path: &Path) -> Result<File> {
    if !path.exists() {
        return Err(Error::MissingFile {
            path: path.to_path_buf(),
        });
    }
    Ok(File::open(path)?)
}

/// Check whether a file starts with the gzip magic number.
pub fn is_gzipped(path: &Path) -> Result<bool> {
    let mut start = Vec::with_capacity(GZIP_MAGIC.len());
    open(path)?
        .take(GZIP_MAGIC.len() as u64)
        .read_to_end(&mut start)?;
    Ok(start == GZIP_MAGIC)
}

/// Read normal or compressed files seamlessly.
/// Compression is detected from the first bytes of the file, not its name.
pub fn reader(path: &Path) -> Result<Box<dyn BufRead>> {
    let gzipped = is_gzipped(path)?;
    let file = open(path)?;
    if gzipped {
        log::debug!("Reading {} as gzip", path.display());
        Ok(Box::new(BufReader::with_capacity(
            BUFFER_SIZE,
            MultiGzDecoder::new(file),
        )))
    } else {
        Ok(Box::new(BufReader::with_capacity(BUFFER_SIZE, file)))
    }
}

/// Write normal or compressed files seamlessly.
/// Uses the presence of a `.gz` extension to decide, and `-` for stdout.
pub fn writer(path: &Path) -> Result<Box<dyn Write>> {
    if path == Path::new("-") {
        return Ok(Box::new(BufWriter::with_capacity(BUFFER_SIZE, io::stdout())));
    }
    let file = File::create(path)?;
    if path.extension() == Some(OsStr::new("gz")) {
        Ok(Box::new(BufWriter::with_capacity(
            BUFFER_SIZE,
            write::GzEncoder::new(file, Compression::default()),
        )))
    } else {
        Ok(Box::new(BufWriter::with_capacity(BUFFER_SIZE, file)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniffs_gzip_regardless_of_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seqs.fa");
        let mut enc = write::GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        enc.write_all(b">a\nACGT\n").unwrap();
        enc.finish().unwrap();

        assert!(is_gzipped(&path).unwrap());
        let mut text = String::new();
        reader(&path).unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, ">a\nACGT\n");
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = reader(&dir.path().join("nope.fa")).err().unwrap();
        assert!(matches!(err, Error::MissingFile { .. }));
    }

    #[test]
    fn test_gz_writer_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt.gz");
        {
            let mut out = writer(&path).unwrap();
            out.write_all(b"hello\n").unwrap();
            out.flush().unwrap();
        }
        assert!(is_gzipped(&path).unwrap());
        let mut text = String::new();
        reader(&path).unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, "hello\n");
    }
}
