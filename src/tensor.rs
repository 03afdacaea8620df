//! Tensor declarations.
//!
//! A [`Tensor`] only describes a buffer: its name, shape and (optionally) which entries are
//! nonzero. Values are bound to tensors when equations are interpreted, see
//! [`interpret`](crate::interpret).
use crate::basis::Alignment;
use crate::error::Error;
use crate::expr::IndexedTensor;
use crate::index::Indices;
use seisflux_matrices::{is_identifier, Matrix, MatrixKey};
use std::collections::BTreeMap;
use std::fmt;
use std::fmt::{Display, Formatter};

pub use seisflux_matrices::Nonzero;

/// Multi-index to nonzero marker.
pub type SparsityPattern = BTreeMap<Vec<usize>, Nonzero>;

/// Base name plus an optional group index, displayed as e.g. `V3mTo2n(0,1)` or `star(0)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TensorName {
    base: String,
    group: Vec<usize>,
}

impl TensorName {
    pub fn new(base: &str) -> Result<Self, Error> {
        Self::with_group(base, &[])
    }

    pub fn with_group(base: &str, group: &[usize]) -> Result<Self, Error> {
        if is_identifier(base) {
            Ok(Self {
                base: base.to_string(),
                group: group.to_vec(),
            })
        } else {
            Err(Error::InvalidName { name: base.to_string() })
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn group(&self) -> &[usize] {
        &self.group
    }
}

impl Display for TensorName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", MatrixKey::new(self.base.as_str(), &self.group))
    }
}

/// A named, possibly sparse, dense-shaped tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    name: TensorName,
    shape: Vec<usize>,
    sparsity: Option<SparsityPattern>,
    align_stride: bool,
}

fn check_shape(name: &TensorName, shape: &[usize]) -> Result<(), Error> {
    if shape.is_empty() || shape.contains(&0) {
        Err(Error::InvalidShape {
            name: name.to_string(),
            shape: shape.to_vec(),
        })
    } else {
        Ok(())
    }
}

impl Tensor {
    pub fn new(name: &str, shape: &[usize]) -> Result<Self, Error> {
        Self::from_name(TensorName::new(name)?, shape)
    }

    pub fn with_group(name: &str, group: &[usize], shape: &[usize]) -> Result<Self, Error> {
        Self::from_name(TensorName::with_group(name, group)?, shape)
    }

    pub fn from_name(name: TensorName, shape: &[usize]) -> Result<Self, Error> {
        check_shape(&name, shape)?;
        Ok(Self {
            name,
            shape: shape.to_vec(),
            sparsity: None,
            align_stride: false,
        })
    }

    /// Declares a tensor for a matrix database entry, keeping its nonzero pattern.
    pub fn from_matrix(matrix: &Matrix) -> Result<Self, Error> {
        let key = matrix.key();
        let pattern = matrix
            .entries()
            .iter()
            .map(|&(row, column, value)| (vec![row, column], value))
            .collect();
        Ok(Self::with_group(&key.name, &key.group, &[matrix.rows(), matrix.columns()])?
            .with_sparsity(pattern)?
            .with_align_stride(matrix.align_stride()))
    }

    pub fn with_sparsity(mut self, pattern: SparsityPattern) -> Result<Self, Error> {
        for index in pattern.keys() {
            let fits = index.len() == self.rank() && index.iter().zip(&self.shape).all(|(i, n)| i < n);
            if !fits {
                return Err(Error::SparsityOutOfBounds {
                    tensor: self.name.to_string(),
                    index: index.clone(),
                });
            }
        }
        self.sparsity = Some(pattern);
        Ok(self)
    }

    pub fn with_align_stride(mut self, align_stride: bool) -> Self {
        self.align_stride = align_stride;
        self
    }

    pub fn name(&self) -> &TensorName {
        &self.name
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn sparsity(&self) -> Option<&SparsityPattern> {
        self.sparsity.as_ref()
    }

    pub fn align_stride(&self) -> bool {
        self.align_stride
    }

    /// Shape of the backing buffer, with the leading dimension padded when stride alignment
    /// is requested.
    pub fn aligned_shape(&self, alignment: &Alignment) -> Vec<usize> {
        let mut shape = self.shape.clone();
        if self.align_stride {
            shape[0] = alignment.aligned_reals(shape[0]);
        }
        shape
    }

    /// References this tensor with the given index labels.
    pub fn at(&self, indices: &str) -> Result<IndexedTensor, Error> {
        IndexedTensor::new(self.clone(), Indices::parse(indices)?)
    }
}

/// A named scalar factor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scalar {
    name: String,
}

impl Scalar {
    pub fn new(name: &str) -> Result<Self, Error> {
        if is_identifier(name) {
            Ok(Self { name: name.to_string() })
        } else {
            Err(Error::InvalidName { name: name.to_string() })
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Display for Scalar {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A tensor that may carry an additional simulation dimension.
///
/// Several independent simulations can be vectorized by stacking their state along an extra
/// dimension. The dimension only exists when more than one simulation is requested. When it
/// exists, every reference to the tensor gets the batch label inserted at the batch position,
/// so equations are written once for both cases.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchedTensor {
    tensor: Tensor,
    opt_name: char,
    opt_size: usize,
    opt_pos: usize,
}

impl BatchedTensor {
    pub fn new(name: &str, opt_name: char, opt_size: usize, opt_pos: usize, shape: &[usize]) -> Result<Self, Error> {
        if !opt_name.is_ascii_alphabetic() {
            return Err(Error::InvalidIndices {
                indices: opt_name.to_string(),
                reason: "index labels must be ASCII letters",
            });
        }
        let tensor_name = TensorName::new(name)?;
        if opt_size == 0 || opt_pos > shape.len() {
            return Err(Error::InvalidShape {
                name: tensor_name.to_string(),
                shape: shape.to_vec(),
            });
        }

        let mut full_shape = shape.to_vec();
        if opt_size > 1 {
            full_shape.insert(opt_pos, opt_size);
        }
        Ok(Self {
            tensor: Tensor::from_name(tensor_name, &full_shape)?,
            opt_name,
            opt_size,
            opt_pos,
        })
    }

    pub fn with_align_stride(mut self, align_stride: bool) -> Self {
        self.tensor = self.tensor.with_align_stride(align_stride);
        self
    }

    pub fn has_opt_dim(&self) -> bool {
        self.opt_size > 1
    }

    pub fn opt_name(&self) -> char {
        self.opt_name
    }

    pub fn opt_size(&self) -> usize {
        self.opt_size
    }

    pub fn opt_pos(&self) -> usize {
        self.opt_pos
    }

    pub fn tensor(&self) -> &Tensor {
        &self.tensor
    }

    pub fn name(&self) -> &TensorName {
        self.tensor.name()
    }

    /// References the tensor, inserting the batch label when the batch dimension exists.
    pub fn at(&self, indices: &str) -> Result<IndexedTensor, Error> {
        let mut indices = Indices::parse(indices)?;
        if self.has_opt_dim() {
            if self.opt_pos > indices.len() {
                return Err(Error::IndexCountMismatch {
                    tensor: self.name().to_string(),
                    indices: indices.to_string(),
                    rank: self.tensor.rank(),
                });
            }
            indices = indices.inserted(self.opt_pos, self.opt_name)?;
        }
        IndexedTensor::new(self.tensor.clone(), indices)
    }
}
