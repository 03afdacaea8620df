//! Tensor-equation definitions for discontinuous Galerkin flux and dynamic rupture kernels.
//!
//! Kernels are declared as typed Einstein-summation equations on a [`Generator`](generator::Generator),
//! which validates them and collects them into a deterministic declaration set. The
//! [`interpret`] module executes declared equations directly, which defines the numerical
//! result any generated kernel has to reproduce.
pub mod basis;
pub mod config;
pub mod error;
pub mod expr;
pub mod generator;
pub mod index;
pub mod interpret;
pub mod kernels;
pub mod manifest;
pub mod tensor;

pub use error::Error;

pub extern crate nalgebra;
pub extern crate seisflux_matrices as matrices;
