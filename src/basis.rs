//! Basis sizes and memory alignment for modal DG bases on simplices.
use crate::error::Error;
use serde::{Deserialize, Deserializer, Serialize};

/// Number of basis functions of a tetrahedral basis of the given convergence order,
/// $N = \frac{o(o+1)(o+2)}{6}$.
pub fn number_of_basis_functions(order: usize) -> Result<usize, Error> {
    check_order(order)?;
    order
        .checked_add(1)
        .and_then(|o1| o1.checked_mul(order))
        .and_then(|n| n.checked_mul(order.checked_add(2)?))
        .map(|n| n / 6)
        .ok_or(Error::InvalidOrder { order })
}

/// Number of basis functions of a triangular basis of the given convergence order,
/// $N = \frac{o(o+1)}{2}$.
pub fn number_of_2d_basis_functions(order: usize) -> Result<usize, Error> {
    check_order(order)?;
    order
        .checked_add(1)
        .and_then(|o1| o1.checked_mul(order))
        .map(|n| n / 2)
        .ok_or(Error::InvalidOrder { order })
}

pub(crate) fn check_order(order: usize) -> Result<(), Error> {
    if order == 0 {
        Err(Error::InvalidOrder { order })
    } else {
        Ok(())
    }
}

#[derive(Deserialize)]
struct RawAlignment {
    vector_bytes: usize,
    real_bytes: usize,
}

/// Vector alignment of dense buffers.
///
/// The vector width is always a positive multiple of the size of a real.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Alignment {
    vector_bytes: usize,
    real_bytes: usize,
}

impl Default for Alignment {
    fn default() -> Self {
        Self {
            vector_bytes: 64,
            real_bytes: 8,
        }
    }
}

impl<'de> Deserialize<'de> for Alignment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawAlignment::deserialize(deserializer)?;
        Self::new(raw.vector_bytes, raw.real_bytes).map_err(serde::de::Error::custom)
    }
}

impl Alignment {
    pub fn new(vector_bytes: usize, real_bytes: usize) -> Result<Self, Error> {
        if vector_bytes == 0 || real_bytes == 0 || vector_bytes % real_bytes != 0 {
            Err(Error::InvalidAlignment {
                vector_bytes,
                real_bytes,
            })
        } else {
            Ok(Self {
                vector_bytes,
                real_bytes,
            })
        }
    }

    /// Alignment of the vector registers in bytes.
    pub fn vector_bytes(&self) -> usize {
        self.vector_bytes
    }

    /// Size of one real number in bytes.
    pub fn real_bytes(&self) -> usize {
        self.real_bytes
    }

    /// Smallest number of reals that can hold `n` reals and spans a multiple of the vector width.
    pub fn aligned_reals(&self, n: usize) -> usize {
        let reals_per_vector = self.vector_bytes / self.real_bytes;
        n.div_ceil(reals_per_vector) * reals_per_vector
    }

    /// Number of basis functions padded to the vector width.
    pub fn aligned_basis_functions(&self, order: usize) -> Result<usize, Error> {
        Ok(self.aligned_reals(number_of_basis_functions(order)?))
    }
}
