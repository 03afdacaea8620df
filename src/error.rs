//! Errors raised while declaring, validating or interpreting kernels.
//!
//! Every error is a generation-time error: nothing here is recoverable at solver runtime, and
//! a failing kernel unit does not leave partial declarations behind.
use std::fmt;
use std::fmt::{Display, Formatter};

/// Library-wide error type.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// A tensor, scalar or kernel name is not a valid identifier.
    InvalidName { name: String },
    /// A tensor shape has no dimensions or a zero-sized dimension.
    InvalidShape { name: String, shape: Vec<usize> },
    /// A sparsity pattern entry does not fit the tensor shape.
    SparsityOutOfBounds { tensor: String, index: Vec<usize> },
    /// An index label string does not satisfy the label grammar.
    InvalidIndices { indices: String, reason: &'static str },
    /// The number of index labels does not match the tensor rank.
    IndexCountMismatch { tensor: String, indices: String, rank: usize },
    /// The same index label is bound to dimensions of different sizes.
    DimensionMismatch {
        label: char,
        tensor: String,
        expected: usize,
        found: usize,
    },
    /// An index that is not free occurs a number of times other than two in one product.
    UnbalancedIndex { label: char, occurrences: usize },
    /// A left-hand side index does not occur on the right-hand side.
    MissingLhsIndex { label: char },
    /// An equation has no right-hand side terms.
    EmptyExpression,
    /// A tensor name is declared with two different definitions.
    ConflictingTensor { name: String },
    /// A kernel or family name is already in use.
    DuplicateKernel { name: String },
    /// A parameter space with no dimensions or an empty dimension.
    InvalidParameterSpace { extents: Vec<usize> },
    /// The dynamic rupture discretization method is not known.
    UnknownRuptureMethod { method: String },
    /// The polynomial order is not supported.
    InvalidOrder { order: usize },
    /// The vector width is zero or not a whole number of reals.
    InvalidAlignment { vector_bytes: usize, real_bytes: usize },
    /// A matrix required by a kernel is missing from the matrix database.
    MissingMatrix { name: String, group: Vec<usize> },
    /// A matrix database error other than a missing matrix.
    Matrices(seisflux_matrices::Error),
    /// No buffer is bound to a tensor or scalar used by an equation.
    MissingBinding { name: String },
    /// A bound buffer does not have the declared shape of its tensor.
    BindingShapeMismatch {
        name: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },
    /// A family has no member with the given parameter index.
    UnknownFamilyMember { family: String, index: Vec<usize> },
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidName { name } => write!(f, "\"{}\" is not a valid identifier", name),
            Self::InvalidShape { name, shape } => write!(f, "tensor {} has invalid shape {:?}", name, shape),
            Self::SparsityOutOfBounds { tensor, index } => {
                write!(f, "sparsity pattern entry {:?} does not fit tensor {}", index, tensor)
            }
            Self::InvalidIndices { indices, reason } => write!(f, "invalid indices \"{}\": {}", indices, reason),
            Self::IndexCountMismatch { tensor, indices, rank } => write!(
                f,
                "indices \"{}\" do not match tensor {} of rank {}",
                indices, tensor, rank
            ),
            Self::DimensionMismatch {
                label,
                tensor,
                expected,
                found,
            } => write!(
                f,
                "index {} has size {} in tensor {}, but size {} elsewhere in the equation",
                label, found, tensor, expected
            ),
            Self::UnbalancedIndex { label, occurrences } => write!(
                f,
                "index {} occurs {} time(s) on the right-hand side, but is not a free index",
                label, occurrences
            ),
            Self::MissingLhsIndex { label } => {
                write!(f, "left-hand side index {} does not occur on the right-hand side", label)
            }
            Self::EmptyExpression => write!(f, "equation has an empty right-hand side"),
            Self::ConflictingTensor { name } => write!(f, "tensor {} is declared with conflicting definitions", name),
            Self::DuplicateKernel { name } => write!(f, "kernel {} is declared more than once", name),
            Self::InvalidParameterSpace { extents } => write!(f, "invalid parameter space {:?}", extents),
            Self::UnknownRuptureMethod { method } => write!(f, "unknown dynamic rupture method \"{}\"", method),
            Self::InvalidOrder { order } => write!(f, "unsupported polynomial order {}", order),
            Self::InvalidAlignment {
                vector_bytes,
                real_bytes,
            } => write!(
                f,
                "vector width of {} bytes is not a positive multiple of the real size of {} bytes",
                vector_bytes, real_bytes
            ),
            Self::MissingMatrix { name, group } => {
                write!(f, "matrix {}{:?} is missing from the matrix database", name, group)
            }
            Self::Matrices(err) => write!(f, "matrix database error: {}", err),
            Self::MissingBinding { name } => write!(f, "no buffer is bound to {}", name),
            Self::BindingShapeMismatch { name, expected, found } => write!(
                f,
                "buffer bound to {} has shape {:?}, expected {:?}",
                name, found, expected
            ),
            Self::UnknownFamilyMember { family, index } => {
                write!(f, "family {} has no member {:?}", family, index)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Matrices(err) => Some(err),
            _ => None,
        }
    }
}

impl From<seisflux_matrices::Error> for Error {
    fn from(err: seisflux_matrices::Error) -> Self {
        match err {
            seisflux_matrices::Error::MissingMatrix { key } => Self::MissingMatrix {
                name: key.name,
                group: key.group,
            },
            other => Self::Matrices(other),
        }
    }
}
