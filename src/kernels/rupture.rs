//! Dynamic rupture flux kernels.
//!
//! On a fault, the volume solution of each adjacent element is projected onto the quadrature
//! points of the fault face and rotated into the fault-aligned Godunov state. After the friction
//! law has updated that state, the resulting flux is integrated back into the element.
//!
//! Both projections depend on the local face of the element (0 to 3) and on the orientation of
//! the neighboring face relative to it (0 to 3), so they are declared as families over the 4x4
//! grid of (face, orientation) pairs.
use crate::basis::{check_order, number_of_2d_basis_functions};
use crate::error::Error;
use crate::expr::{Equation, Product};
use crate::generator::{Generator, ParameterSpace, Prefetch};
use crate::index::Indices;
use crate::kernels::flux::FluxTensors;
use crate::tensor::{BatchedTensor, Tensor};
use eyre::WrapErr;
use log::{debug, info};
use seisflux_matrices::{rupture_matrix_file_name, Clones, LoadOptions, MatrixDatabase};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::str::FromStr;

/// Number of local faces of a tetrahedron, and of relative orientations of two faces.
pub const NUMBER_OF_FACES: usize = 4;

/// Discretization of the fault face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuptureMethod {
    /// Gauss-type quadrature with $(o+1)^2$ points.
    Quadrature,
    /// Piecewise constant values on a regular subdivision of the face.
    CellAverage,
}

impl RuptureMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quadrature => "quadrature",
            Self::CellAverage => "cellaverage",
        }
    }

    /// Number of points on a fault face for the given convergence order.
    ///
    /// For cell averages this is the smallest power of four that is at least the number of
    /// triangular basis functions $o(o+1)/2$.
    pub fn number_of_points(&self, order: usize) -> Result<usize, Error> {
        let too_large = || Error::InvalidOrder { order };
        match self {
            Self::Quadrature => {
                check_order(order)?;
                let n = order.checked_add(1).ok_or_else(too_large)?;
                n.checked_mul(n).ok_or_else(too_large)
            }
            Self::CellAverage => {
                let triangular = number_of_2d_basis_functions(order)?;
                let mut points: usize = 1;
                while points < triangular {
                    points = points.checked_mul(4).ok_or_else(too_large)?;
                }
                Ok(points)
            }
        }
    }
}

impl FromStr for RuptureMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "quadrature" => Ok(Self::Quadrature),
            "cellaverage" => Ok(Self::CellAverage),
            _ => Err(Error::UnknownRuptureMethod { method: s.to_string() }),
        }
    }
}

impl Display for RuptureMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Sizes for the rupture kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuptureParameters {
    pub order: usize,
    pub method: RuptureMethod,
    pub number_of_elastic_quantities: usize,
    /// Elastic plus anelastic quantities.
    pub number_of_quantities: usize,
}

/// Tensors the rupture kernels are declared on.
#[derive(Debug, Clone, Copy)]
pub struct RuptureInputs<'a> {
    pub flux: &'a FluxTensors,
    /// First material coefficient matrix, elastic quantities x quantities.
    pub star: &'a Tensor,
    /// Element solution, basis functions x elastic quantities.
    pub q: &'a BatchedTensor,
    /// Extended element state receiving the fault flux, basis functions x quantities.
    pub qext: &'a BatchedTensor,
    /// Tensor prefetched by the nodal flux kernels.
    pub i: &'a BatchedTensor,
}

/// Tensors declared by [`add_kernels`].
#[derive(Debug, Clone, PartialEq)]
pub struct RuptureTensors {
    pub godunov_matrix: Tensor,
    pub flux_solver: Tensor,
    pub godunov_state: BatchedTensor,
}

/// Loads the rupture matrix database `dr_{method}_matrices_{order}.json` from `matrices_dir`.
pub fn load_matrices(
    matrices_dir: &Path,
    method: RuptureMethod,
    order: usize,
    clones: &Clones,
    options: LoadOptions,
) -> eyre::Result<MatrixDatabase> {
    let path = matrices_dir.join(rupture_matrix_file_name(method.as_str(), order));
    let data = std::fs::read_to_string(&path)
        .wrap_err_with(|| format!("failed to read matrix file {}", path.display()))?;
    let database = MatrixDatabase::from_json_str(&data, clones, options)
        .wrap_err_with(|| format!("failed to load matrix database from {}", path.display()))?;
    debug!("Loaded {} matrices from {}", database.len(), path.display());
    Ok(database)
}

/// Declares the dynamic rupture kernels.
///
/// The database matrices `V3mTo2n(i,h)` (points x basis functions) and
/// `V3mTo2nTWDivM(i,h)` (basis functions x points) must be present for every face `i` and
/// orientation `h`. If `q` is batched, the database is expected to hold the transposed matrices
/// and their index labels are reversed accordingly.
///
/// Declared kernels:
///
/// - `rotateGodunovStateLocal`: `godunovMatrix[q,p] = Tinv[k,q] QgodLocal[k,p]`
/// - `rotateGodunovStateNeighbor`: `godunovMatrix[q,p] = Tinv[k,q] QgodNeighbor[k,p]`
/// - `rotateFluxMatrix`: `fluxSolver[q,p] = fluxScale star[q,k] T[p,k]`
/// - family `godunovState(i,h)`: `godunovState[k,p] = V3mTo2n(i,h)[k,l] Q[l,q] godunovMatrix[q,p]`,
///   accumulating for `h > 0`
/// - family `nodalFlux(i,h)`: `Qext[k,p] += V3mTo2nTWDivM(i,h)[k,l] godunovState[l,q] fluxSolver[q,p]`
///
/// Nothing is declared if any kernel fails to validate or a matrix is missing.
pub fn add_kernels(
    generator: &mut Generator,
    inputs: RuptureInputs,
    matrices: &MatrixDatabase,
    parameters: &RuptureParameters,
) -> Result<RuptureTensors, Error> {
    let RuptureParameters {
        order,
        method,
        number_of_elastic_quantities: n_elastic,
        number_of_quantities: n_q,
    } = *parameters;
    let number_of_points = method.number_of_points(order)?;

    let transpose = inputs.q.has_opt_dim();
    let t = |labels: &str| -> Result<String, Error> {
        let indices = Indices::parse(labels)?;
        let indices = if transpose { indices.reversed() } else { indices };
        Ok(indices.to_string())
    };
    let matrix = |name: &str, index: &[usize]| -> Result<Tensor, Error> { Tensor::from_matrix(matrices.get(name, index)?) };

    let q = inputs.q;
    let flux = inputs.flux;
    let tensors = RuptureTensors {
        godunov_matrix: Tensor::new("godunovMatrix", &[n_elastic, n_elastic])?,
        flux_solver: Tensor::new("fluxSolver", &[n_elastic, n_q])?,
        godunov_state: BatchedTensor::new(
            "godunovState",
            q.opt_name(),
            q.opt_size(),
            q.opt_pos(),
            &[number_of_points, n_elastic],
        )?
        .with_align_stride(true),
    };

    let mut staged = Generator::new();
    let rotate = |qgod: &Tensor| -> Result<Equation, Error> {
        Equation::assign(
            tensors.godunov_matrix.at("qp")?,
            Product::new(flux.tinv.at("kq")?).times(qgod.at("kp")?),
        )
    };
    staged.add("rotateGodunovStateLocal", rotate(&flux.qgod_local)?)?;
    staged.add("rotateGodunovStateNeighbor", rotate(&flux.qgod_neighbor)?)?;
    staged.add(
        "rotateFluxMatrix",
        Equation::assign(
            tensors.flux_solver.at("qp")?,
            Product::scaled(&flux.flux_scale, inputs.star.at("qk")?).times(flux.t.at("pk")?),
        )?,
    )?;

    let faces = ParameterSpace::new(&[NUMBER_OF_FACES, NUMBER_OF_FACES])?;

    let godunov_state = &tensors.godunov_state;
    staged.add_family(
        "godunovState",
        faces.clone(),
        |index| {
            let target = godunov_state.at("kp")?;
            let term = Product::new(matrix("V3mTo2n", index)?.at(&t("kl")?)?)
                .times(q.at("lq")?)
                .times(tensors.godunov_matrix.at("qp")?);
            // Each face is assembled from all orientations; the first one starts the sum
            if index[1] == 0 {
                Equation::assign(target, term)
            } else {
                Equation::accumulate(target, term)
            }
        },
        |_| Prefetch::Tensor(godunov_state.name().clone()),
    )?;

    staged.add_family(
        "nodalFlux",
        faces,
        |index| {
            let term = Product::new(matrix("V3mTo2nTWDivM", index)?.at(&t("kl")?)?)
                .times(godunov_state.at("lq")?)
                .times(tensors.flux_solver.at("qp")?);
            Equation::accumulate(inputs.qext.at("kp")?, term)
        },
        |_| Prefetch::Tensor(inputs.i.name().clone()),
    )?;

    generator.merge(staged)?;
    info!(
        "Declared dynamic rupture kernels (order {}, method {}, {} points per face, {} simulation(s))",
        order,
        method,
        number_of_points,
        q.opt_size()
    );
    Ok(tensors)
}

/// Parses `method`, loads the matching matrix database and declares the rupture kernels.
///
/// An unknown method is reported before any file is read or any kernel is declared.
#[allow(clippy::too_many_arguments)]
pub fn add_kernels_from_dir(
    generator: &mut Generator,
    inputs: RuptureInputs,
    matrices_dir: &Path,
    method: &str,
    order: usize,
    number_of_elastic_quantities: usize,
    number_of_quantities: usize,
    align_stride: bool,
) -> eyre::Result<RuptureTensors> {
    let method: RuptureMethod = method.parse()?;
    let options = LoadOptions {
        transpose: inputs.q.has_opt_dim(),
        align_stride,
    };
    // Clones are scoped to this unit
    let clones = Clones::new();
    let matrices = load_matrices(matrices_dir, method, order, &clones, options)?;
    let parameters = RuptureParameters {
        order,
        method,
        number_of_elastic_quantities,
        number_of_quantities,
    };
    Ok(add_kernels(generator, inputs, &matrices, &parameters)?)
}
