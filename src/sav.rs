//! Reader for SPSS system files (`.sav`) and conversion to TSV.
//!
//! Supports `$FL2` files, uncompressed or bytecode compressed, in either byte
//! order. User-missing and system-missing numbers are read as empty cells.
use crate::error::{Error, Result};
use crate::myio;
use byteordered::{ByteOrdered, Endianness};
use std::collections::HashMap;
use std::fmt;
use std::io::{self, Read, Write};
use std::path::Path;

static SAV_MAGIC: &[u8; 4] = b"$FL2";
static ZSAV_MAGIC: &[u8; 4] = b"$FL3";
const HEADER_SIZE: usize = 176;
const LAYOUT_CODE_OFFSET: usize = 64;
const SLOT_SIZE: usize = 8;
/// The system-missing value, `-DBL_MAX`.
pub const SYSMIS: f64 = -f64::MAX;

const REC_VARIABLE: i32 = 2;
const REC_VALUE_LABELS: i32 = 3;
const REC_VALUE_LABEL_VARS: i32 = 4;
const REC_DOCUMENT: i32 = 6;
const REC_EXTENSION: i32 = 7;
const REC_DICT_END: i32 = 999;
const EXT_LONG_NAMES: i32 = 13;

type Slot = [u8; SLOT_SIZE];

#[derive(Debug, Clone, Copy, PartialEq)]
enum Missing {
    Value(f64),
    Range(f64, f64),
}

impl Missing {
    fn matches(&self, v: f64) -> bool {
        match *self {
            Missing::Value(m) => v == m,
            Missing::Range(lo, hi) => lo <= v && v <= hi,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub label: Option<String>,
    /// 0 for numeric variables, the width in bytes for strings.
    pub width: usize,
    missing: Vec<Missing>,
    first_slot: usize,
}

impl Variable {
    fn n_slots(&self) -> usize {
        if self.width == 0 {
            1
        } else {
            (self.width + SLOT_SIZE - 1) / SLOT_SIZE
        }
    }

    fn decode(&self, slots: &[Slot], endianness: Endianness) -> Value {
        let end = (self.first_slot + self.n_slots()).min(slots.len());
        let mine = slots.get(self.first_slot..end).unwrap_or(&[]);
        if self.width == 0 {
            let v = match mine.first() {
                Some(slot) => slot_to_f64(*slot, endianness),
                None => SYSMIS,
            };
            if v == SYSMIS || v.is_nan() || self.missing.iter().any(|m| m.matches(v)) {
                Value::Number(None)
            } else {
                Value::Number(Some(v))
            }
        } else {
            let raw: Vec<u8> = mine.iter().flatten().copied().collect();
            Value::Text(trimmed_text(&raw[..self.width.min(raw.len())]))
        }
    }
}

/// One cell of the data table.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(Option<f64>),
    Text(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Number(None) => Ok(()),
            Value::Number(Some(v)) => write!(f, "{}", format_number(*v)),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Integral numbers keep one decimal, the way they read back as floats.
/// ```
/// use rustyconvert::sav::format_number;
/// assert_eq!(format_number(3.0), "3.0");
/// assert_eq!(format_number(-0.25), "-0.25");
/// ```
pub fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e16 {
        format!("{:.1}", v)
    } else {
        format!("{}", v)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SavFile {
    pub variables: Vec<Variable>,
    pub cases: Vec<Vec<Value>>,
}

fn invalid(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

fn trimmed_text(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).trim_end().to_string()
}

fn round_up(n: usize, to: usize) -> usize {
    (n + to - 1) / to * to
}

fn slot_to_f64(slot: Slot, endianness: Endianness) -> f64 {
    match endianness {
        Endianness::Little => f64::from_le_bytes(slot),
        Endianness::Big => f64::from_be_bytes(slot),
    }
}

fn f64_to_slot(v: f64, endianness: Endianness) -> Slot {
    match endianness {
        Endianness::Little => v.to_le_bytes(),
        Endianness::Big => v.to_be_bytes(),
    }
}

/// Read exactly `n` bytes, or `None` at a clean end of file.
fn read_block<R: Read>(rdr: &mut R, n: usize) -> io::Result<Option<Vec<u8>>> {
    let mut buf = Vec::new();
    io::Read::take(&mut *rdr, n as u64).read_to_end(&mut buf)?;
    match buf.len() {
        0 if n > 0 => Ok(None),
        len if len < n => Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "unexpected end of file",
        )),
        _ => Ok(Some(buf)),
    }
}

fn read_bytes<R: Read>(rdr: &mut R, n: usize) -> io::Result<Vec<u8>> {
    read_block(rdr, n)?
        .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "unexpected end of file"))
}

fn read_count(rdr: &mut ByteOrdered<&[u8], Endianness>) -> io::Result<usize> {
    Ok(rdr.read_i32()?.max(0) as usize)
}

/// Source of the 8-byte slots that make up the cases.
enum Slots {
    Raw,
    Bytecode {
        commands: [u8; SLOT_SIZE],
        pos: usize,
        bias: f64,
        done: bool,
    },
}

impl Slots {
    fn next(&mut self, rdr: &mut ByteOrdered<&[u8], Endianness>) -> io::Result<Option<Slot>> {
        let endianness = rdr.endianness();
        match self {
            Slots::Raw => Ok(read_block(rdr, SLOT_SIZE)?.map(|b| to_slot(&b))),
            Slots::Bytecode {
                commands,
                pos,
                bias,
                done,
            } => loop {
                if *done {
                    return Ok(None);
                }
                if *pos == SLOT_SIZE {
                    match read_block(rdr, SLOT_SIZE)? {
                        Some(block) => commands.copy_from_slice(&block),
                        None => {
                            *done = true;
                            return Ok(None);
                        }
                    }
                    *pos = 0;
                }
                let code = commands[*pos];
                *pos += 1;
                match code {
                    0 => continue,
                    252 => {
                        *done = true;
                        return Ok(None);
                    }
                    253 => return Ok(Some(to_slot(&read_bytes(rdr, SLOT_SIZE)?))),
                    254 => return Ok(Some(*b"        ")),
                    255 => return Ok(Some(f64_to_slot(SYSMIS, endianness))),
                    n => return Ok(Some(f64_to_slot(n as f64 - *bias, endianness))),
                }
            },
        }
    }
}

fn to_slot(bytes: &[u8]) -> Slot {
    let mut slot = [0u8; SLOT_SIZE];
    slot.copy_from_slice(&bytes[..SLOT_SIZE]);
    slot
}

/// Parse a complete system file held in memory.
pub fn parse_sav(bytes: &[u8]) -> io::Result<SavFile> {
    if bytes.len() < HEADER_SIZE {
        return Err(invalid("file is shorter than the header"));
    }
    if bytes.starts_with(ZSAV_MAGIC) {
        return Err(invalid("zlib compressed (.zsav) files are not supported"));
    }
    if !bytes.starts_with(SAV_MAGIC) {
        return Err(invalid("missing $FL2 magic"));
    }
    let layout = &bytes[LAYOUT_CODE_OFFSET..LAYOUT_CODE_OFFSET + 4];
    let endianness = match i32::from_le_bytes([layout[0], layout[1], layout[2], layout[3]]) {
        2 | 3 => Endianness::Little,
        _ => Endianness::Big,
    };

    let mut rdr = ByteOrdered::runtime(bytes, endianness);
    read_bytes(&mut rdr, 4 + 60)?; // magic and product name
    let _layout = rdr.read_i32()?;
    let _nominal_case_size = rdr.read_i32()?;
    let compression = rdr.read_i32()?;
    let _weight_index = rdr.read_i32()?;
    let n_cases = rdr.read_i32()?;
    let bias = rdr.read_f64()?;
    read_bytes(&mut rdr, 9 + 8 + 64 + 3)?; // date, time, file label, padding

    let mut variables: Vec<Variable> = Vec::new();
    let mut n_slots = 0;
    let mut long_names = HashMap::new();
    loop {
        match rdr.read_i32()? {
            REC_VARIABLE => {
                let var_type = rdr.read_i32()?;
                let has_label = rdr.read_i32()?;
                let n_missing = rdr.read_i32()?;
                let _print = rdr.read_i32()?;
                let _write = rdr.read_i32()?;
                let name = trimmed_text(&read_bytes(&mut rdr, 8)?);
                let label = if has_label == 1 {
                    let len = read_count(&mut rdr)?;
                    let raw = read_bytes(&mut rdr, round_up(len, 4))?;
                    Some(trimmed_text(&raw[..len]))
                } else {
                    None
                };
                let values = (0..n_missing.unsigned_abs())
                    .map(|_| rdr.read_f64())
                    .collect::<io::Result<Vec<f64>>>()?;
                let missing = if n_missing < 0 && values.len() >= 2 {
                    let mut missing = vec![Missing::Range(values[0], values[1])];
                    missing.extend(values[2..].iter().map(|&v| Missing::Value(v)));
                    missing
                } else {
                    values.into_iter().map(Missing::Value).collect()
                };

                // -1 marks the continuation slots of a long string
                if var_type >= 0 {
                    variables.push(Variable {
                        name,
                        label,
                        width: var_type as usize,
                        missing,
                        first_slot: n_slots,
                    });
                }
                n_slots += 1;
            }
            REC_VALUE_LABELS => {
                for _ in 0..read_count(&mut rdr)? {
                    read_bytes(&mut rdr, SLOT_SIZE)?;
                    let len = rdr.read_u8()? as usize;
                    read_bytes(&mut rdr, round_up(len + 1, SLOT_SIZE) - 1)?;
                }
            }
            REC_VALUE_LABEL_VARS => {
                let n = read_count(&mut rdr)?;
                read_bytes(&mut rdr, n * 4)?;
            }
            REC_DOCUMENT => {
                let n = read_count(&mut rdr)?;
                read_bytes(&mut rdr, n * 80)?;
            }
            REC_EXTENSION => {
                let subtype = rdr.read_i32()?;
                let size = read_count(&mut rdr)?;
                let count = read_count(&mut rdr)?;
                let data = read_bytes(&mut rdr, size * count)?;
                if subtype == EXT_LONG_NAMES {
                    for pair in String::from_utf8_lossy(&data).split('\t') {
                        if let Some((short, long)) = pair.split_once('=') {
                            long_names.insert(short.to_string(), long.trim_end().to_string());
                        }
                    }
                }
            }
            REC_DICT_END => {
                let _filler = rdr.read_i32()?;
                break;
            }
            other => return Err(invalid(format!("unknown record type {}", other))),
        }
    }
    for var in variables.iter_mut() {
        if let Some(long) = long_names.get(&var.name) {
            var.name = long.clone();
        }
    }
    log::debug!(
        "{} variables in {} slots, compression {}",
        variables.len(),
        n_slots,
        compression
    );

    let mut source = match compression {
        0 => Slots::Raw,
        1 => Slots::Bytecode {
            commands: [0; SLOT_SIZE],
            pos: SLOT_SIZE,
            bias,
            done: false,
        },
        other => return Err(invalid(format!("unsupported compression {}", other))),
    };
    let expected = usize::try_from(n_cases).ok();
    let mut cases = Vec::new();
    let mut slots: Vec<Slot> = Vec::with_capacity(n_slots);
    'cases: while expected.map_or(true, |n| cases.len() < n) {
        slots.clear();
        for i in 0..n_slots {
            match source.next(&mut rdr)? {
                Some(slot) => slots.push(slot),
                None if i == 0 => break 'cases,
                None => return Err(invalid("file ends in the middle of a case")),
            }
        }
        if n_slots == 0 {
            break;
        }
        cases.push(
            variables
                .iter()
                .map(|v| v.decode(&slots, endianness))
                .collect(),
        );
    }
    Ok(SavFile { variables, cases })
}

/// Read a `.sav` file from disk.
pub fn read_sav(path: &Path) -> Result<SavFile> {
    let mut bytes = Vec::new();
    myio::open(path)?.read_to_end(&mut bytes)?;
    parse_sav(&bytes).map_err(|e| Error::InvalidSav {
        path: path.to_path_buf(),
        msg: e.to_string(),
    })
}

/// Write names, then labels, then the cases as tab separated text.
pub fn write_tsv<W: Write>(sav: &SavFile, out: W) -> io::Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(out);
    writer
        .write_record(sav.variables.iter().map(|v| v.name.as_str()))
        .map_err(io::Error::from)?;
    writer
        .write_record(
            sav.variables
                .iter()
                .map(|v| v.label.as_deref().unwrap_or("")),
        )
        .map_err(io::Error::from)?;
    for case in &sav.cases {
        writer
            .write_record(case.iter().map(|v| v.to_string()))
            .map_err(io::Error::from)?;
    }
    writer.flush()
}

pub fn run_sav_to_tsv(input: &Path, output: &Path) -> Result<()> {
    let sav = read_sav(input)?;
    log::info!(
        "{}: {} variables, {} cases",
        input.display(),
        sav.variables.len(),
        sav.cases.len()
    );
    write_tsv(&sav, myio::writer(output)?)?;
    Ok(())
}
