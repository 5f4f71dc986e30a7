//! Reader for `.npz` motion archives.
//!
//! An `.npz` file is a ZIP archive whose entries are `<name>.npy` files.  Each
//! `.npy` entry starts with a fixed preamble (magic, version, header length)
//! followed by a Python-dict header describing `descr`, `fortran_order` and
//! `shape`, then the raw little-endian element data.
//!
//! Only dense C-order floating point arrays (`<f4`, `<f8`) are accepted; `f8`
//! data is narrowed to `f32` on read.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use mimic_types::LoadError;
use zip::ZipArchive;
use zip::result::ZipError;

const NPY_MAGIC: &[u8; 6] = b"\x93NUMPY";
const MAX_PREALLOC: u64 = 64 << 20;

// ────────────────────────────────────────────────────────────────────────────
// NpyArray
// ────────────────────────────────────────────────────────────────────────────

/// A dense row-major `f32` array with an explicit shape.
#[derive(Debug, Clone, PartialEq)]
pub struct NpyArray {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl NpyArray {
    /// Build an array, checking that `data` holds exactly `prod(shape)`
    /// elements.
    pub fn new(name: &str, shape: Vec<usize>, data: Vec<f32>) -> Result<Self, LoadError> {
        // The row stride is checked on its own: a zero leading dimension
        // hides an overflowing tail from the total.
        let (Some(expected), Some(_)) = (
            element_count(&shape),
            element_count(shape.get(1..).unwrap_or(&[])),
        ) else {
            return Err(LoadError::InvalidArray {
                name: name.to_string(),
                reason: format!("shape {shape:?} overflows the address space"),
            });
        };
        if expected != data.len() {
            return Err(LoadError::InvalidArray {
                name: name.to_string(),
                reason: format!(
                    "shape {shape:?} needs {expected} elements, got {}",
                    data.len()
                ),
            });
        }
        Ok(Self { shape, data })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Size of the leading (frame) dimension, `0` for a rank-0 array.
    pub fn len(&self) -> usize {
        self.shape.first().copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of elements in one leading-dimension slice.
    pub fn row_stride(&self) -> usize {
        self.shape.iter().skip(1).fold(1, |acc, &d| acc.saturating_mul(d))
    }
}

/// `prod(shape)`, or `None` if it does not fit in a `usize`.
fn element_count(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
}

// ────────────────────────────────────────────────────────────────────────────
// NpzArchive
// ────────────────────────────────────────────────────────────────────────────

/// An opened `.npz` archive from which named arrays can be read on demand.
pub struct NpzArchive<R: Read + Seek> {
    zip: ZipArchive<R>,
}

impl NpzArchive<BufReader<File>> {
    /// Open the archive at `path`.
    ///
    /// # Errors
    ///
    /// [`LoadError::NotFound`] when the file cannot be opened and
    /// [`LoadError::InvalidArchive`] when it is not a ZIP container.
    pub fn open(path: &Path) -> Result<Self, LoadError> {
        let file = File::open(path).map_err(|_| LoadError::NotFound {
            path: path.to_path_buf(),
        })?;
        Self::from_reader(BufReader::new(file))
    }
}

impl<R: Read + Seek> NpzArchive<R> {
    pub fn from_reader(reader: R) -> Result<Self, LoadError> {
        let zip = ZipArchive::new(reader)
            .map_err(|e| LoadError::InvalidArchive(format!("invalid ZIP container: {e}")))?;
        Ok(Self { zip })
    }

    /// Names of all arrays in the archive (without the `.npy` suffix).
    pub fn names(&self) -> Vec<String> {
        self.zip
            .file_names()
            .map(|n| n.strip_suffix(".npy").unwrap_or(n).to_string())
            .collect()
    }

    /// Read and decode the array stored under `name`.
    ///
    /// # Errors
    ///
    /// [`LoadError::MissingField`] when the archive has no such entry and
    /// [`LoadError::InvalidArray`] when the entry is not a supported `.npy`.
    pub fn read_f32(&mut self, name: &str) -> Result<NpyArray, LoadError> {
        let entry_name = format!("{name}.npy");
        let mut entry = match self.zip.by_name(&entry_name) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => return Err(LoadError::MissingField(name.to_string())),
            Err(e) => {
                return Err(LoadError::InvalidArchive(format!(
                    "cannot read entry '{entry_name}': {e}"
                )));
            }
        };
        // The declared size is untrusted; cap the up-front reservation.
        let mut bytes = Vec::with_capacity(entry.size().min(MAX_PREALLOC) as usize);
        entry
            .read_to_end(&mut bytes)
            .map_err(|e| LoadError::InvalidArchive(format!("cannot read entry '{entry_name}': {e}")))?;
        parse_npy(name, &bytes)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// .npy decoding
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
enum Dtype {
    F32,
    F64,
}

impl Dtype {
    fn size(self) -> usize {
        match self {
            Dtype::F32 => 4,
            Dtype::F64 => 8,
        }
    }
}

/// Decode a complete `.npy` byte buffer.
pub fn parse_npy(name: &str, bytes: &[u8]) -> Result<NpyArray, LoadError> {
    let invalid = |reason: String| LoadError::InvalidArray {
        name: name.to_string(),
        reason,
    };

    if bytes.len() < 10 || &bytes[..6] != NPY_MAGIC {
        return Err(invalid("missing NUMPY magic".to_string()));
    }
    let major = bytes[6];
    let (header_len, header_start) = match major {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        2 | 3 => {
            if bytes.len() < 12 {
                return Err(invalid("truncated header length".to_string()));
            }
            (
                u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize,
                12,
            )
        }
        v => return Err(invalid(format!("unsupported npy version {v}"))),
    };
    let data_start = header_start + header_len;
    if bytes.len() < data_start {
        return Err(invalid("truncated header".to_string()));
    }
    let header = std::str::from_utf8(&bytes[header_start..data_start])
        .map_err(|e| invalid(format!("header is not text: {e}")))?;

    let descr = dict_value(header, "descr")
        .and_then(quoted)
        .ok_or_else(|| invalid("no 'descr' key".to_string()))?;
    let dtype = match descr {
        "<f4" => Dtype::F32,
        "<f8" => Dtype::F64,
        other => return Err(invalid(format!("unsupported dtype {other}, expected <f4"))),
    };

    let fortran = dict_value(header, "fortran_order")
        .ok_or_else(|| invalid("no 'fortran_order' key".to_string()))?;
    if fortran.starts_with("True") {
        return Err(invalid("fortran-ordered arrays are not supported".to_string()));
    }

    let shape = parse_shape(header).ok_or_else(|| invalid("malformed 'shape'".to_string()))?;
    let needed = element_count(&shape)
        .and_then(|count| count.checked_mul(dtype.size()))
        .ok_or_else(|| invalid(format!("shape {shape:?} overflows the address space")))?;
    let payload = &bytes[data_start..];
    if payload.len() != needed {
        return Err(invalid(format!(
            "shape {shape:?} needs {needed} bytes, entry holds {}",
            payload.len()
        )));
    }

    let data = match dtype {
        Dtype::F32 => payload
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
        Dtype::F64 => payload
            .chunks_exact(8)
            .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]) as f32)
            .collect(),
    };
    NpyArray::new(name, shape, data)
}

/// Return the raw text following `'key':` in a Python dict literal.
fn dict_value<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let needle = format!("'{key}':");
    let start = header.find(&needle)? + needle.len();
    Some(header[start..].trim_start())
}

/// The contents of a leading single- or double-quoted literal.
fn quoted(text: &str) -> Option<&str> {
    let quote = text.chars().next().filter(|c| *c == '\'' || *c == '"')?;
    let body = &text[1..];
    body.find(quote).map(|end| &body[..end])
}

fn parse_shape(header: &str) -> Option<Vec<usize>> {
    let rest = dict_value(header, "shape")?;
    let open = rest.find('(')?;
    let close = rest.find(')')?;
    rest[open + 1..close]
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<usize>().ok())
        .collect()
}
