//! Typed tensor equations in Einstein notation.
//!
//! An [`Equation`] is built from explicit parts: a left-hand side reference, a list of
//! [`Product`] terms and a [`Mode`] telling whether the result overwrites or accumulates into
//! the left-hand side. Construction validates the index structure, so a successfully
//! constructed equation is always balanced.
use crate::error::Error;
use crate::index::Indices;
use crate::tensor::{Scalar, Tensor};
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::fmt;
use std::fmt::{Display, Formatter};

/// A tensor together with the index labels it is referenced with.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedTensor {
    tensor: Tensor,
    indices: Indices,
}

impl IndexedTensor {
    pub fn new(tensor: Tensor, indices: Indices) -> Result<Self, Error> {
        if tensor.rank() != indices.len() {
            return Err(Error::IndexCountMismatch {
                tensor: tensor.name().to_string(),
                indices: indices.to_string(),
                rank: tensor.rank(),
            });
        }
        Ok(Self { tensor, indices })
    }

    pub fn tensor(&self) -> &Tensor {
        &self.tensor
    }

    pub fn indices(&self) -> &Indices {
        &self.indices
    }

    /// Pairs of (label, dimension size).
    pub fn label_sizes(&self) -> impl Iterator<Item = (char, usize)> + '_ {
        self.indices.iter().zip(self.tensor.shape().iter().copied())
    }
}

impl Display for IndexedTensor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}['{}']", self.tensor.name(), self.indices)
    }
}

/// An optionally scaled product of indexed tensors.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    scalar: Option<Scalar>,
    factors: Vec<IndexedTensor>,
}

impl Product {
    pub fn new(first: IndexedTensor) -> Self {
        Self {
            scalar: None,
            factors: vec![first],
        }
    }

    pub fn scaled(scalar: &Scalar, first: IndexedTensor) -> Self {
        Self {
            scalar: Some(scalar.clone()),
            factors: vec![first],
        }
    }

    pub fn times(mut self, factor: IndexedTensor) -> Self {
        self.factors.push(factor);
        self
    }

    pub fn scalar(&self) -> Option<&Scalar> {
        self.scalar.as_ref()
    }

    pub fn factors(&self) -> &[IndexedTensor] {
        &self.factors
    }

    /// Labels that occur on the right-hand side but not in `free`, in order of first occurrence.
    pub fn contracted_labels(&self, free: &Indices) -> Vec<char> {
        let mut labels = Vec::new();
        for label in self.factors.iter().flat_map(|factor| factor.indices().iter()) {
            if !free.contains(label) && !labels.contains(&label) {
                labels.push(label);
            }
        }
        labels
    }

    fn validate(&self, lhs: &IndexedTensor) -> Result<(), Error> {
        // label -> (size, number of occurrences)
        let mut labels: FxHashMap<char, (usize, usize)> = FxHashMap::default();
        for factor in &self.factors {
            for (label, size) in factor.label_sizes() {
                let entry = labels.entry(label).or_insert((size, 0));
                if entry.0 != size {
                    return Err(Error::DimensionMismatch {
                        label,
                        tensor: factor.tensor().name().to_string(),
                        expected: entry.0,
                        found: size,
                    });
                }
                entry.1 += 1;
            }
        }

        for (label, size) in lhs.label_sizes() {
            match labels.get(&label) {
                None => return Err(Error::MissingLhsIndex { label }),
                Some(&(rhs_size, _)) if rhs_size != size => {
                    return Err(Error::DimensionMismatch {
                        label,
                        tensor: lhs.tensor().name().to_string(),
                        expected: rhs_size,
                        found: size,
                    })
                }
                Some(_) => {}
            }
        }

        for label in self.contracted_labels(lhs.indices()) {
            let (_, occurrences) = labels[&label];
            if occurrences != 2 {
                return Err(Error::UnbalancedIndex { label, occurrences });
            }
        }
        Ok(())
    }
}

impl Display for Product {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut first = true;
        if let Some(scalar) = &self.scalar {
            write!(f, "{}", scalar)?;
            first = false;
        }
        for factor in &self.factors {
            if !first {
                write!(f, " * ")?;
            }
            write!(f, "{}", factor)?;
            first = false;
        }
        Ok(())
    }
}

/// Whether an equation overwrites or accumulates into its left-hand side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Assign,
    Accumulate,
}

impl Mode {
    pub fn operator(&self) -> &'static str {
        match self {
            Self::Assign => "=",
            Self::Accumulate => "+=",
        }
    }
}

/// A validated tensor equation `lhs (=|+=) term + term + ...`.
#[derive(Debug, Clone, PartialEq)]
pub struct Equation {
    lhs: IndexedTensor,
    terms: Vec<Product>,
    mode: Mode,
}

impl Equation {
    pub fn new(lhs: IndexedTensor, mode: Mode, terms: Vec<Product>) -> Result<Self, Error> {
        if terms.is_empty() {
            return Err(Error::EmptyExpression);
        }
        for term in &terms {
            term.validate(&lhs)?;
        }
        Ok(Self { lhs, terms, mode })
    }

    pub fn assign(lhs: IndexedTensor, term: Product) -> Result<Self, Error> {
        Self::new(lhs, Mode::Assign, vec![term])
    }

    pub fn accumulate(lhs: IndexedTensor, term: Product) -> Result<Self, Error> {
        Self::new(lhs, Mode::Accumulate, vec![term])
    }

    pub fn lhs(&self) -> &IndexedTensor {
        &self.lhs
    }

    pub fn terms(&self) -> &[Product] {
        &self.terms
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// All tensors referenced by the equation, left-hand side first.
    pub fn tensors(&self) -> impl Iterator<Item = &Tensor> {
        std::iter::once(self.lhs.tensor()).chain(
            self.terms
                .iter()
                .flat_map(|term| term.factors().iter().map(IndexedTensor::tensor)),
        )
    }

    /// All scalars referenced by the equation.
    pub fn scalars(&self) -> impl Iterator<Item = &Scalar> {
        self.terms.iter().filter_map(Product::scalar)
    }
}

impl Display for Equation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ", self.lhs, self.mode.operator())?;
        for (i, term) in self.terms.iter().enumerate() {
            if i > 0 {
                write!(f, " + ")?;
            }
            write!(f, "{}", term)?;
        }
        Ok(())
    }
}
