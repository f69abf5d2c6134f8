use crate::error::{Error, Result};
use crate::fasta::{self, DuplicatePolicy, FastaStore};
use crate::myio;
use byteordered::ByteOrdered;
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

static ABIF_MAGIC: &[u8; 4] = b"ABIF";
/// Offset of the root directory entry, right after the magic and version.
const ROOT_ENTRY_OFFSET: usize = 6;
const DIR_ENTRY_SIZE: usize = 28;
/// Entries with at most this many bytes store their data in the offset field.
const INLINE_DATA_SIZE: usize = 4;
const INLINE_DATA_OFFSET: usize = 20;

const TYPE_CHAR: i16 = 2;
const TYPE_PSTRING: i16 = 18;
const TYPE_CSTRING: i16 = 19;

pub const FASTA_WIDTH: usize = 80;
pub const UNKNOWN_ID: &str = "<unknown id>";

/// Basecalls of one capillary trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbiTrace {
    pub sample_id: String,
    pub sequence: String,
}

#[derive(Debug, Clone, Copy)]
struct DirEntry {
    name: [u8; 4],
    number: i32,
    element_type: i16,
    num_elements: usize,
    data_size: usize,
    /// Absolute position of the data, inline data already resolved.
    data_start: usize,
}

fn read_entry(bytes: &[u8], at: usize) -> io::Result<DirEntry> {
    let raw = bytes
        .get(at..at + DIR_ENTRY_SIZE)
        .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "truncated directory"))?;
    let mut rdr = ByteOrdered::be(raw);
    let mut name = [0u8; 4];
    rdr.read_exact(&mut name)?;
    let number = rdr.read_i32()?;
    let element_type = rdr.read_i16()?;
    let _element_size = rdr.read_i16()?;
    let num_elements = rdr.read_i32()?.max(0) as usize;
    let data_size = rdr.read_i32()?.max(0) as usize;
    let data_offset = rdr.read_i32()?.max(0) as usize;
    let data_start = if data_size <= INLINE_DATA_SIZE {
        at + INLINE_DATA_OFFSET
    } else {
        data_offset
    };
    Ok(DirEntry {
        name,
        number,
        element_type,
        num_elements,
        data_size,
        data_start,
    })
}

/// Parsed ABIF directory over the raw file bytes.
pub struct AbifFile {
    bytes: Vec<u8>,
    entries: HashMap<([u8; 4], i32), DirEntry>,
}

impl AbifFile {
    pub fn from_bytes(bytes: Vec<u8>) -> std::result::Result<AbifFile, String> {
        if !bytes.starts_with(ABIF_MAGIC) {
            return Err("missing ABIF magic".to_string());
        }
        // the root entry points at the directory and counts its entries
        let root = read_entry(&bytes, ROOT_ENTRY_OFFSET).map_err(|e| e.to_string())?;
        let n_entries = root.num_elements;
        let dir_offset = root.data_start;
        let dir_end = n_entries
            .checked_mul(DIR_ENTRY_SIZE)
            .and_then(|size| size.checked_add(dir_offset));
        match dir_end {
            Some(end) if end <= bytes.len() => {}
            _ => {
                return Err(format!(
                    "directory of {} entries at offset {} runs past the end of the file ({} bytes)",
                    n_entries,
                    dir_offset,
                    bytes.len()
                ))
            }
        }

        let mut entries = HashMap::with_capacity(n_entries);
        for i in 0..n_entries {
            let entry = read_entry(&bytes, dir_offset + i * DIR_ENTRY_SIZE)
                .map_err(|e| format!("directory entry {}: {}", i, e))?;
            entries.insert((entry.name, entry.number), entry);
        }
        log::trace!("ABIF directory with {} entries", entries.len());
        Ok(AbifFile { bytes, entries })
    }

    /// Raw bytes of a tag such as `PBAS2`.
    pub fn tag_bytes(&self, name: &[u8; 4], number: i32) -> Option<&[u8]> {
        let entry = self.entries.get(&(*name, number))?;
        self.bytes
            .get(entry.data_start..entry.data_start + entry.data_size)
    }

    /// String value of a tag, decoding char arrays and Pascal/C strings.
    pub fn tag_string(&self, name: &[u8; 4], number: i32) -> Option<String> {
        let entry = self.entries.get(&(*name, number))?;
        let data = self.tag_bytes(name, number)?;
        let text = match entry.element_type {
            TYPE_PSTRING => {
                let len = *data.first()? as usize;
                data.get(1..1 + len).unwrap_or(&data[1..])
            }
            TYPE_CSTRING => data.split(|&b| b == 0).next().unwrap_or(data),
            TYPE_CHAR => data,
            _ => return None,
        };
        Some(String::from_utf8_lossy(text).to_string())
    }
}

/// Read the sample name and basecalls from an ABI trace file.
pub fn read_abi(path: &Path) -> Result<AbiTrace> {
    let mut bytes = Vec::new();
    myio::open(path)?.read_to_end(&mut bytes)?;
    let invalid = |msg: String| Error::InvalidAbif {
        path: path.to_path_buf(),
        msg,
    };
    let abif = AbifFile::from_bytes(bytes).map_err(invalid)?;

    let sequence = abif
        .tag_string(b"PBAS", 2)
        .or_else(|| abif.tag_string(b"PBAS", 1))
        .ok_or_else(|| invalid("no basecalls (PBAS) tag".to_string()))?;
    let sample_id = abif
        .tag_string(b"SMPL", 1)
        .unwrap_or_else(|| UNKNOWN_ID.to_string());
    log::debug!(
        "{}: sample {} with {} bases",
        path.display(),
        sample_id,
        sequence.len()
    );
    Ok(AbiTrace {
        sample_id,
        sequence,
    })
}

/// Convert ABI traces into one FASTA file `<prefix>.fasta`; duplicate sample names are fatal.
pub fn run_abi_to_fasta(inputs: &[PathBuf], output_prefix: &str) -> Result<PathBuf> {
    let mut store: FastaStore<String> = FastaStore::new();
    for input in inputs {
        let trace = read_abi(input)?;
        store.insert(&trace.sample_id, trace.sequence, DuplicatePolicy::Fail)?;
    }

    let output = PathBuf::from(format!("{}.fasta", output_prefix));
    let mut out = myio::writer(&output)?;
    for (id, seq) in store.iter() {
        fasta::write_wrapped(&mut out, id, seq, FASTA_WIDTH)?;
    }
    out.flush()?;
    log::info!("Wrote {} sequences to {}", store.len(), output.display());
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER_LEN: usize = ROOT_ENTRY_OFFSET + DIR_ENTRY_SIZE;

    fn push_entry(buf: &mut Vec<u8>, name: &[u8; 4], number: i32, etype: i16, payload: &[u8], offset: usize) {
        buf.extend_from_slice(name);
        buf.extend_from_slice(&number.to_be_bytes());
        buf.extend_from_slice(&etype.to_be_bytes());
        buf.extend_from_slice(&1i16.to_be_bytes());
        buf.extend_from_slice(&(payload.len() as i32).to_be_bytes());
        buf.extend_from_slice(&(payload.len() as i32).to_be_bytes());
        if payload.len() <= INLINE_DATA_SIZE {
            let mut inline = [0u8; 4];
            inline[..payload.len()].copy_from_slice(payload);
            buf.extend_from_slice(&inline);
        } else {
            buf.extend_from_slice(&(offset as i32).to_be_bytes());
        }
        buf.extend_from_slice(&0i32.to_be_bytes());
    }

    /// Minimal ABIF image: header, data blobs, then the directory.
    fn make_abif(tags: &[(&[u8; 4], i32, i16, Vec<u8>)]) -> Vec<u8> {
        let mut blob = Vec::new();
        let mut offsets = Vec::new();
        for (_, _, _, payload) in tags {
            offsets.push(HEADER_LEN + blob.len());
            if payload.len() > INLINE_DATA_SIZE {
                blob.extend_from_slice(payload);
            }
        }
        let dir_offset = HEADER_LEN + blob.len();

        let mut out = Vec::new();
        out.extend_from_slice(ABIF_MAGIC);
        out.extend_from_slice(&101u16.to_be_bytes());
        out.extend_from_slice(b"tdir");
        out.extend_from_slice(&1i32.to_be_bytes());
        out.extend_from_slice(&1023i16.to_be_bytes());
        out.extend_from_slice(&(DIR_ENTRY_SIZE as i16).to_be_bytes());
        out.extend_from_slice(&(tags.len() as i32).to_be_bytes());
        out.extend_from_slice(&((tags.len() * DIR_ENTRY_SIZE) as i32).to_be_bytes());
        out.extend_from_slice(&(dir_offset as i32).to_be_bytes());
        out.extend_from_slice(&0i32.to_be_bytes());
        assert_eq!(out.len(), HEADER_LEN);
        out.extend_from_slice(&blob);
        for ((name, number, etype, payload), offset) in tags.iter().zip(offsets) {
            push_entry(&mut out, name, *number, *etype, payload, offset);
        }
        out
    }

    fn pstring(s: &str) -> Vec<u8> {
        let mut v = vec![s.len() as u8];
        v.extend_from_slice(s.as_bytes());
        v
    }

    #[test]
    fn test_read_tags() {
        let bytes = make_abif(&[
            (b"SMPL", 1, TYPE_PSTRING, pstring("sample_A")),
            (b"PBAS", 2, TYPE_CHAR, b"ACGTNACGTT".to_vec()),
            (b"PBAS", 1, TYPE_CHAR, b"ACG".to_vec()),
            (b"MODL", 1, TYPE_CSTRING, b"3730\0".to_vec()),
        ]);
        let abif = AbifFile::from_bytes(bytes).unwrap();
        assert_eq!(abif.tag_string(b"SMPL", 1).unwrap(), "sample_A");
        assert_eq!(abif.tag_string(b"PBAS", 2).unwrap(), "ACGTNACGTT");
        assert_eq!(abif.tag_string(b"PBAS", 1).unwrap(), "ACG");
        assert_eq!(abif.tag_string(b"MODL", 1).unwrap(), "3730");
        assert!(abif.tag_string(b"NOPE", 1).is_none());
    }

    #[test]
    fn test_not_abif() {
        assert!(AbifFile::from_bytes(b"GIF89a and more bytes".to_vec()).is_err());
    }

    #[test]
    fn test_directory_larger_than_file() {
        let mut bytes = make_abif(&[(b"PBAS", 2, TYPE_CHAR, b"ACGTACGT".to_vec())]);
        // root entry element count
        let count_at = ROOT_ENTRY_OFFSET + 12;
        bytes[count_at..count_at + 4].copy_from_slice(&i32::MAX.to_be_bytes());
        assert!(AbifFile::from_bytes(bytes).is_err());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.ab1");
        let mut header = make_abif(&[]);
        header[count_at..count_at + 4].copy_from_slice(&i32::MAX.to_be_bytes());
        std::fs::write(&path, header).unwrap();
        let err = read_abi(&path).err().unwrap();
        assert!(matches!(err, Error::InvalidAbif { .. }));
    }

    #[test]
    fn test_abi_to_fasta() {
        let dir = tempfile::tempdir().unwrap();
        let seq: String = "ACGT".repeat(25);
        let a = dir.path().join("a.ab1");
        std::fs::write(
            &a,
            make_abif(&[
                (b"SMPL", 1, TYPE_PSTRING, pstring("s1")),
                (b"PBAS", 2, TYPE_CHAR, seq.as_bytes().to_vec()),
            ]),
        )
        .unwrap();
        let b = dir.path().join("b.ab1");
        std::fs::write(&b, make_abif(&[(b"PBAS", 2, TYPE_CHAR, b"GGGGG".to_vec())])).unwrap();

        let prefix = dir.path().join("traces");
        let output = run_abi_to_fasta(&[a.clone(), b], prefix.to_str().unwrap()).unwrap();
        let text = std::fs::read_to_string(output).unwrap();
        let expected = format!(">s1\n{}\n{}\n>{}\nGGGGG\n", &seq[..80], &seq[80..], UNKNOWN_ID);
        assert_eq!(text, expected);

        let err = run_abi_to_fasta(&[a.clone(), a], prefix.to_str().unwrap())
            .err()
            .unwrap();
        assert!(matches!(err, Error::DuplicateIdentifier { id } if id == "s1"));
    }
}
