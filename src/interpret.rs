//! Reference interpreter for declared equations.
//!
//! Executes an [`Equation`] by direct summation over all free and contracted indices. This is
//! the numerical contract that optimized kernels must reproduce; it makes no attempt to be fast.
use crate::error::Error;
use crate::expr::{Equation, Mode, Product};
use crate::generator::{Kernel, KernelFamily};
use crate::tensor::Tensor;
use nalgebra::DMatrix;
use rayon::prelude::*;
use std::collections::BTreeMap;

/// A dense row-major tensor (the last index varies fastest).
#[derive(Debug, Clone, PartialEq)]
pub struct DenseTensor {
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl DenseTensor {
    pub fn zeros(shape: &[usize]) -> Self {
        Self {
            shape: shape.to_vec(),
            data: vec![0.0; shape.iter().product()],
        }
    }

    /// # Panics
    ///
    /// Panics if the length of `data` does not match the shape.
    pub fn from_vec(shape: &[usize], data: Vec<f64>) -> Self {
        assert_eq!(
            shape.iter().product::<usize>(),
            data.len(),
            "Data length must match the number of entries of the shape."
        );
        Self {
            shape: shape.to_vec(),
            data,
        }
    }

    pub fn from_fn(shape: &[usize], mut f: impl FnMut(&[usize]) -> f64) -> Self {
        let mut tensor = Self::zeros(shape);
        let mut index = vec![0; shape.len()];
        for value in &mut tensor.data {
            *value = f(&index);
            advance(&mut index, shape);
        }
        tensor
    }

    pub fn from_matrix(matrix: &DMatrix<f64>) -> Self {
        Self::from_fn(&[matrix.nrows(), matrix.ncols()], |index| matrix[(index[0], index[1])])
    }

    /// Materializes the constant values of a sparse tensor.
    ///
    /// Returns `None` if the tensor has no sparsity pattern or if any nonzero is structural.
    pub fn from_sparsity(tensor: &Tensor) -> Option<Self> {
        let pattern = tensor.sparsity()?;
        let mut dense = Self::zeros(tensor.shape());
        for (index, nonzero) in pattern {
            *dense.get_mut(index) = nonzero.value()?;
        }
        Some(dense)
    }

    /// # Panics
    ///
    /// Panics if the tensor is not of rank 2.
    pub fn to_matrix(&self) -> DMatrix<f64> {
        assert_eq!(self.shape.len(), 2, "Only rank 2 tensors can be converted to matrices.");
        DMatrix::from_fn(self.shape[0], self.shape[1], |i, j| self.get(&[i, j]))
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    fn offset(&self, index: &[usize]) -> usize {
        assert_eq!(index.len(), self.shape.len(), "Index rank must match tensor rank.");
        index.iter().zip(&self.shape).fold(0, |offset, (&i, &n)| {
            assert!(i < n, "Index out of bounds.");
            offset * n + i
        })
    }

    pub fn get(&self, index: &[usize]) -> f64 {
        self.data[self.offset(index)]
    }

    pub fn get_mut(&mut self, index: &[usize]) -> &mut f64 {
        let offset = self.offset(index);
        &mut self.data[offset]
    }
}

/// Advances a row-major multi-index. Returns `false` once the index wraps around.
fn advance(index: &mut [usize], shape: &[usize]) -> bool {
    for (i, &n) in index.iter_mut().zip(shape).rev() {
        *i += 1;
        if *i < n {
            return true;
        }
        *i = 0;
    }
    false
}

/// Buffers bound to tensor and scalar names for one element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    tensors: BTreeMap<String, DenseTensor>,
    scalars: BTreeMap<String, f64>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a buffer to a tensor name, as displayed (e.g. `V3mTo2n(0,1)`).
    pub fn insert(&mut self, name: impl ToString, value: DenseTensor) {
        self.tensors.insert(name.to_string(), value);
    }

    pub fn insert_scalar(&mut self, name: impl ToString, value: f64) {
        self.scalars.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&DenseTensor> {
        self.tensors.get(name)
    }

    pub fn scalar(&self, name: &str) -> Option<f64> {
        self.scalars.get(name).copied()
    }

    pub fn remove(&mut self, name: &str) -> Option<DenseTensor> {
        self.tensors.remove(name)
    }

    /// Looks up the buffer for `tensor`, falling back to the constant values of its sparsity
    /// pattern.
    fn resolve(&self, tensor: &Tensor) -> Result<DenseTensor, Error> {
        let name = tensor.name().to_string();
        let value = match self.tensors.get(&name) {
            Some(value) => value.clone(),
            None => DenseTensor::from_sparsity(tensor).ok_or(Error::MissingBinding { name: name.clone() })?,
        };
        check_shape(&name, tensor, &value)?;
        Ok(value)
    }
}

fn check_shape(name: &str, tensor: &Tensor, value: &DenseTensor) -> Result<(), Error> {
    if value.shape() != tensor.shape() {
        Err(Error::BindingShapeMismatch {
            name: name.to_string(),
            expected: tensor.shape().to_vec(),
            found: value.shape().to_vec(),
        })
    } else {
        Ok(())
    }
}

fn evaluate_term(term: &Product, equation: &Equation, bindings: &Bindings, output: &mut DenseTensor) -> Result<(), Error> {
    let scale = match term.scalar() {
        Some(scalar) => bindings.scalar(scalar.name()).ok_or_else(|| Error::MissingBinding {
            name: scalar.name().to_string(),
        })?,
        None => 1.0,
    };

    let free = equation.lhs().indices();
    let labels: Vec<char> = free.iter().chain(term.contracted_labels(free)).collect();
    let mut sizes = vec![0; labels.len()];
    for factor in term.factors() {
        for (label, size) in factor.label_sizes() {
            if let Some(position) = labels.iter().position(|&l| l == label) {
                sizes[position] = size;
            }
        }
    }

    // For every factor, the positions of its indices within `labels`
    let mut factors = Vec::with_capacity(term.factors().len());
    for factor in term.factors() {
        let positions: Vec<usize> = factor
            .indices()
            .iter()
            .filter_map(|label| labels.iter().position(|&l| l == label))
            .collect();
        factors.push((bindings.resolve(factor.tensor())?, positions));
    }

    let mut assignment = vec![0; labels.len()];
    let mut factor_index = Vec::new();
    loop {
        let mut product = scale;
        for (value, positions) in &factors {
            factor_index.clear();
            factor_index.extend(positions.iter().map(|&p| assignment[p]));
            product *= value.get(&factor_index);
        }
        *output.get_mut(&assignment[..free.len()]) += product;

        if !advance(&mut assignment, &sizes) {
            break;
        }
    }
    Ok(())
}

/// Executes `equation` on the buffers in `bindings`, writing the left-hand side buffer.
///
/// The right-hand side is evaluated completely before the left-hand side is written, so the
/// left-hand side tensor may also appear on the right.
pub fn execute(equation: &Equation, bindings: &mut Bindings) -> Result<(), Error> {
    let lhs = equation.lhs().tensor();
    let lhs_name = lhs.name().to_string();

    let mut result = DenseTensor::zeros(lhs.shape());
    for term in equation.terms() {
        evaluate_term(term, equation, bindings, &mut result)?;
    }

    match equation.mode() {
        Mode::Assign => bindings.insert(lhs_name, result),
        Mode::Accumulate => {
            let target = bindings
                .tensors
                .get_mut(&lhs_name)
                .ok_or_else(|| Error::MissingBinding { name: lhs_name.clone() })?;
            check_shape(&lhs_name, lhs, target)?;
            for (t, r) in target.data.iter_mut().zip(&result.data) {
                *t += r;
            }
        }
    }
    Ok(())
}

pub fn execute_kernel(kernel: &Kernel, bindings: &mut Bindings) -> Result<(), Error> {
    execute(kernel.equation(), bindings)
}

pub fn execute_family_member(family: &KernelFamily, index: &[usize], bindings: &mut Bindings) -> Result<(), Error> {
    execute(family.member(index)?.equation(), bindings)
}

/// Executes `equation` independently for every element, in parallel.
pub fn execute_par(equation: &Equation, elements: &mut [Bindings]) -> Result<(), Error> {
    elements
        .par_iter_mut()
        .try_for_each(|bindings| execute(equation, bindings))
}
