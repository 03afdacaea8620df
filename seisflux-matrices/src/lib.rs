//! Loader for the per-order matrix databases used by `seisflux`.
//!
//! A matrix database file is a JSON array of matrices, each formatted as
//!
//! ```text
//! { "name": "V3mTo2n(0,1)", "rows": 16, "columns": 10, "entries": [[1, 1, 0.5], [2, 3, "0.25"]] }
//! ```
//!
//! Row and column indices in `entries` are 1-based. An entry with only two elements marks a
//! structural nonzero without a numeric value. A parenthesized suffix on the name is a group
//! index, so that a whole family of matrices (one per face and orientation, say) can share one
//! base name.
//!
//! The crate does not interpret the matrices in any way. Transposition, stride alignment flags
//! and name cloning are applied at load time according to [`LoadOptions`] and [`Clones`].

use core::fmt;
use core::fmt::{Display, Formatter};
use nalgebra::DMatrix;
use nalgebra_sparse::CooMatrix;
use serde::Deserialize;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Library-wide error type.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// The file is not valid JSON, or does not have the expected layout.
    Json(serde_json::Error),
    /// A matrix name could not be split into a base name and a group index.
    MalformedName { name: String },
    /// An entry could not be interpreted.
    MalformedEntry { matrix: String, reason: String },
    /// An entry lies outside the declared matrix dimensions.
    EntryOutOfBounds {
        matrix: String,
        row: usize,
        column: usize,
        rows: usize,
        columns: usize,
    },
    /// The same matrix (name and group index) occurs more than once.
    DuplicateMatrix { key: MatrixKey },
    /// A requested matrix is not present in the database.
    MissingMatrix { key: MatrixKey },
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(err) => write!(f, "failed to deserialize matrix file: {}", err),
            Self::MalformedName { name } => write!(f, "malformed matrix name \"{}\"", name),
            Self::MalformedEntry { matrix, reason } => {
                write!(f, "malformed entry in matrix {}: {}", matrix, reason)
            }
            Self::EntryOutOfBounds {
                matrix,
                row,
                column,
                rows,
                columns,
            } => write!(
                f,
                "entry ({}, {}) is out of bounds for matrix {} of size {}x{}",
                row, column, matrix, rows, columns
            ),
            Self::DuplicateMatrix { key } => write!(f, "matrix {} is defined more than once", key),
            Self::MissingMatrix { key } => write!(f, "matrix {} is not present in the database", key),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

/// A stored nonzero of a sparse matrix or tensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Nonzero {
    /// A nonzero with a known numeric value.
    Value(f64),
    /// A nonzero whose position is known, but whose value is only available at runtime.
    Structural,
}

impl Nonzero {
    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Value(value) => Some(*value),
            Self::Structural => None,
        }
    }
}

/// Identifies a matrix by base name and (possibly empty) group index.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MatrixKey {
    pub name: String,
    pub group: Vec<usize>,
}

impl MatrixKey {
    pub fn new(name: impl Into<String>, group: &[usize]) -> Self {
        Self {
            name: name.into(),
            group: group.to_vec(),
        }
    }

    /// Parses names like `V3mTo2n(0,1)`, `star(2)` or `kDivM`.
    pub fn parse(name: &str) -> Result<Self, Error> {
        let malformed = || Error::MalformedName { name: name.to_string() };
        let (base, group) = match name.find('(') {
            Some(open) => {
                let inner = name[open + 1..].strip_suffix(')').ok_or_else(malformed)?;
                let group = inner
                    .split(',')
                    .map(|entry| entry.trim().parse::<usize>())
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|_| malformed())?;
                (&name[..open], group)
            }
            None => (name, Vec::new()),
        };

        if is_identifier(base) {
            Ok(Self::new(base, &group))
        } else {
            Err(malformed())
        }
    }
}

impl Display for MatrixKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.group.is_empty() {
            let group: Vec<_> = self.group.iter().map(usize::to_string).collect();
            write!(f, "({})", group.join(","))?;
        }
        Ok(())
    }
}

/// Checks whether `name` is a C-like identifier.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// A named sparse matrix with 0-based entries sorted by (row, column).
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    key: MatrixKey,
    rows: usize,
    columns: usize,
    entries: Vec<(usize, usize, Nonzero)>,
    align_stride: bool,
}

impl Matrix {
    /// Creates a matrix from 0-based entries.
    pub fn try_from_entries(
        key: MatrixKey,
        rows: usize,
        columns: usize,
        mut entries: Vec<(usize, usize, Nonzero)>,
    ) -> Result<Self, Error> {
        for &(row, column, _) in &entries {
            if row >= rows || column >= columns {
                return Err(Error::EntryOutOfBounds {
                    matrix: key.to_string(),
                    row,
                    column,
                    rows,
                    columns,
                });
            }
        }
        entries.sort_by_key(|&(row, column, _)| (row, column));
        if entries
            .windows(2)
            .any(|pair| (pair[0].0, pair[0].1) == (pair[1].0, pair[1].1))
        {
            return Err(Error::MalformedEntry {
                matrix: key.to_string(),
                reason: "repeated entry".to_string(),
            });
        }
        Ok(Self {
            key,
            rows,
            columns,
            entries,
            align_stride: false,
        })
    }

    /// Creates a matrix holding the nonzero values of a dense matrix.
    pub fn from_dense(key: MatrixKey, matrix: &DMatrix<f64>) -> Self {
        let mut entries = Vec::new();
        for i in 0..matrix.nrows() {
            for j in 0..matrix.ncols() {
                let value = matrix[(i, j)];
                if value != 0.0 {
                    entries.push((i, j, Nonzero::Value(value)));
                }
            }
        }
        Self {
            key,
            rows: matrix.nrows(),
            columns: matrix.ncols(),
            entries,
            align_stride: false,
        }
    }

    pub fn key(&self) -> &MatrixKey {
        &self.key
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn entries(&self) -> &[(usize, usize, Nonzero)] {
        &self.entries
    }

    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    pub fn align_stride(&self) -> bool {
        self.align_stride
    }

    pub fn with_align_stride(mut self, align_stride: bool) -> Self {
        self.align_stride = align_stride;
        self
    }

    pub fn with_key(mut self, key: MatrixKey) -> Self {
        self.key = key;
        self
    }

    pub fn transpose(&self) -> Self {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .map(|&(row, column, value)| (column, row, value))
            .collect();
        entries.sort_by_key(|&(row, column, _)| (row, column));
        Self {
            key: self.key.clone(),
            rows: self.columns,
            columns: self.rows,
            entries,
            align_stride: self.align_stride,
        }
    }

    /// Returns the matrix in COO format, or `None` if it has structural nonzeros.
    pub fn to_coo(&self) -> Option<CooMatrix<f64>> {
        let mut coo = CooMatrix::new(self.rows, self.columns);
        for &(row, column, value) in &self.entries {
            coo.push(row, column, value.value()?);
        }
        Some(coo)
    }

    /// Returns the dense matrix, or `None` if it has structural nonzeros.
    pub fn to_dense(&self) -> Option<DMatrix<f64>> {
        self.to_coo().map(|coo| DMatrix::from(&coo))
    }
}

/// Maps the base name of a matrix to the names it should be registered under.
///
/// A name with no entry is registered under itself only. The table is meant to be created for
/// a single generation run and handed to each load call by reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Clones {
    clones: BTreeMap<String, Vec<String>>,
}

impl Clones {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, base: impl Into<String>, names: impl IntoIterator<Item = impl Into<String>>) {
        self.clones
            .insert(base.into(), names.into_iter().map(Into::into).collect());
    }

    pub fn names_for<'a>(&'a self, base: &'a str) -> Vec<&'a str> {
        match self.clones.get(base) {
            Some(names) => names.iter().map(String::as_str).collect(),
            None => vec![base],
        }
    }
}

/// Options applied to every matrix while loading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Store the transpose of each matrix instead of the matrix itself.
    pub transpose: bool,
    /// Flag each matrix for stride alignment of its leading dimension.
    pub align_stride: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawValue {
    Number(f64),
    Text(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawEntry {
    Valued(usize, usize, RawValue),
    Pattern(usize, usize),
}

#[derive(Deserialize)]
struct RawMatrix {
    name: String,
    rows: usize,
    columns: usize,
    entries: Vec<RawEntry>,
}

fn convert_entry(name: &str, entry: RawEntry) -> Result<(usize, usize, Nonzero), Error> {
    let (row, column, value) = match entry {
        RawEntry::Valued(row, column, RawValue::Number(value)) => (row, column, Nonzero::Value(value)),
        RawEntry::Valued(row, column, RawValue::Text(text)) => {
            let value = text.trim().parse::<f64>().map_err(|err| Error::MalformedEntry {
                matrix: name.to_string(),
                reason: format!("failed to parse \"{}\" as f64: {}", text, err),
            })?;
            (row, column, Nonzero::Value(value))
        }
        RawEntry::Pattern(row, column) => (row, column, Nonzero::Structural),
    };

    if row == 0 || column == 0 {
        return Err(Error::MalformedEntry {
            matrix: name.to_string(),
            reason: format!("entry ({}, {}) is not 1-based", row, column),
        });
    }
    Ok((row - 1, column - 1, value))
}

/// A collection of matrices keyed by base name and group index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatrixDatabase {
    matrices: BTreeMap<MatrixKey, Matrix>,
}

impl MatrixDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts to build a database from the contents of a matrix file.
    pub fn from_json_str(data: &str, clones: &Clones, options: LoadOptions) -> Result<Self, Error> {
        let raw_matrices: Vec<RawMatrix> = serde_json::from_str(data)?;
        let mut database = Self::new();
        for raw in raw_matrices {
            let key = MatrixKey::parse(&raw.name)?;
            let entries = raw
                .entries
                .into_iter()
                .map(|entry| convert_entry(&raw.name, entry))
                .collect::<Result<Vec<_>, _>>()?;
            let mut matrix =
                Matrix::try_from_entries(key.clone(), raw.rows, raw.columns, entries)?.with_align_stride(options.align_stride);
            if options.transpose {
                matrix = matrix.transpose();
            }

            for name in clones.names_for(&key.name) {
                let clone_key = MatrixKey::new(name, &key.group);
                database.insert(matrix.clone().with_key(clone_key))?;
            }
        }
        Ok(database)
    }

    pub fn insert(&mut self, matrix: Matrix) -> Result<(), Error> {
        match self.matrices.entry(matrix.key().clone()) {
            Entry::Occupied(occupied) => Err(Error::DuplicateMatrix {
                key: occupied.key().clone(),
            }),
            Entry::Vacant(vacant) => {
                vacant.insert(matrix);
                Ok(())
            }
        }
    }

    /// Looks up the matrix with the given base name and group index.
    pub fn get(&self, name: &str, group: &[usize]) -> Result<&Matrix, Error> {
        let key = MatrixKey::new(name, group);
        match self.matrices.get(&key) {
            Some(matrix) => Ok(matrix),
            None => Err(Error::MissingMatrix { key }),
        }
    }

    pub fn contains(&self, name: &str, group: &[usize]) -> bool {
        self.matrices.contains_key(&MatrixKey::new(name, group))
    }

    /// Returns the group indices available for the given base name, in ascending order.
    pub fn groups<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a [usize]> + 'a {
        self.matrices
            .keys()
            .filter(move |key| key.name == name)
            .map(|key| key.group.as_slice())
    }

    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Matrix> {
        self.matrices.values()
    }
}

/// File name of the dynamic rupture matrix database for the given method and order.
pub fn rupture_matrix_file_name(method: &str, order: usize) -> String {
    format!("dr_{}_matrices_{}.json", method, order)
}
