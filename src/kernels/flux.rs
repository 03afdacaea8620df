//! Flux solver construction and solution export kernels.
use crate::basis::number_of_basis_functions;
use crate::error::Error;
use crate::expr::{Equation, Product};
use crate::generator::Generator;
use crate::tensor::{BatchedTensor, Nonzero, Scalar, SparsityPattern, Tensor};
use log::info;

/// Sizes for the flux kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FluxParameters {
    pub order: usize,
    pub number_of_quantities: usize,
    pub number_of_extended_quantities: usize,
}

/// Tensors declared by [`add_kernels`] that are shared with other kernel units.
#[derive(Debug, Clone, PartialEq)]
pub struct FluxTensors {
    pub aplus_t: Tensor,
    pub aminus_t: Tensor,
    pub t: Tensor,
    pub tinv: Tensor,
    pub qgod_local: Tensor,
    pub qgod_neighbor: Tensor,
    pub flux_scale: Scalar,
    /// Broadcasts a single simulation to every simulation of a batch.
    pub one_sim_to_mult_sim: Tensor,
}

fn one_hot(name: &str, size: usize, positions: impl IntoIterator<Item = usize>) -> Result<Tensor, Error> {
    let pattern: SparsityPattern = positions
        .into_iter()
        .map(|i| (vec![i], Nonzero::Value(1.0)))
        .collect();
    Tensor::new(name, &[size])?.with_sparsity(pattern)
}

/// Declares the flux solver kernels and the copy of the solution into the export layout.
///
/// `star` is the first material coefficient matrix (`star(0)`, of size
/// quantities x extended quantities) and `q` the element solution of size
/// basis functions x quantities, possibly batched.
///
/// Declared kernels:
///
/// - `computeFluxSolverLocal`: `AplusT[i,j] = fluxScale Tinv[k,i] QgodLocal[k,q] star[q,l] T[j,l]`
/// - `computeFluxSolverNeighbor`: as above with `AminusT` and `QgodNeighbor`
/// - `copyQToQFortran`: `QFortran[k,p] = Q[k,p]`, restricted to the first simulation if `q` is
///   batched.
pub fn add_kernels(
    generator: &mut Generator,
    star: &Tensor,
    q: &BatchedTensor,
    parameters: &FluxParameters,
) -> Result<FluxTensors, Error> {
    let FluxParameters {
        order,
        number_of_quantities: n_q,
        number_of_extended_quantities: n_ext,
    } = *parameters;
    let number_of_basis_functions = number_of_basis_functions(order)?;

    let tensors = FluxTensors {
        aplus_t: Tensor::new("AplusT", &[n_q, n_ext])?,
        aminus_t: Tensor::new("AminusT", &[n_q, n_ext])?,
        t: Tensor::new("T", &[n_ext, n_ext])?,
        tinv: Tensor::new("Tinv", &[n_q, n_q])?,
        qgod_local: Tensor::new("QgodLocal", &[n_q, n_q])?,
        qgod_neighbor: Tensor::new("QgodNeighbor", &[n_q, n_q])?,
        flux_scale: Scalar::new("fluxScale")?,
        one_sim_to_mult_sim: one_hot("oneSimToMultSim", q.opt_size(), 0..q.opt_size())?,
    };
    let q_fortran = Tensor::new("QFortran", &[number_of_basis_functions, n_q])?;
    let mult_sim_to_first_sim = one_hot("multSimToFirstSim", q.opt_size(), [0])?;

    let flux_solver = |target: &Tensor, qgod: &Tensor| -> Result<Equation, Error> {
        let term = Product::scaled(&tensors.flux_scale, tensors.tinv.at("ki")?)
            .times(qgod.at("kq")?)
            .times(star.at("ql")?)
            .times(tensors.t.at("jl")?);
        Equation::assign(target.at("ij")?, term)
    };

    let copy_q = if q.has_opt_dim() {
        let batch_label = q.opt_name().to_string();
        Equation::assign(
            q_fortran.at("kp")?,
            Product::new(q.at("kp")?).times(mult_sim_to_first_sim.at(&batch_label)?),
        )?
    } else {
        Equation::assign(q_fortran.at("kp")?, Product::new(q.at("kp")?))?
    };

    let mut staged = Generator::new();
    staged.add(
        "computeFluxSolverLocal",
        flux_solver(&tensors.aplus_t, &tensors.qgod_local)?,
    )?;
    staged.add(
        "computeFluxSolverNeighbor",
        flux_solver(&tensors.aminus_t, &tensors.qgod_neighbor)?,
    )?;
    staged.add("copyQToQFortran", copy_q)?;
    generator.merge(staged)?;

    info!(
        "Declared flux kernels (order {}, {} quantities, {} extended quantities, {} simulation(s))",
        order,
        n_q,
        n_ext,
        q.opt_size()
    );
    Ok(tensors)
}
