//! Generation configuration and the driver declaring every kernel unit.
use crate::basis::{number_of_basis_functions, Alignment};
use crate::generator::Generator;
use crate::kernels::rupture::{RuptureInputs, RuptureMethod};
use crate::kernels::{flux, rupture};
use crate::manifest::Manifest;
use crate::tensor::{BatchedTensor, Tensor};
use eyre::{eyre, WrapErr};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Label of the simulation dimension of batched tensors.
pub const SIMULATION_LABEL: char = 's';

fn default_elastic_quantities() -> usize {
    9
}

fn default_quantities_per_mechanism() -> usize {
    6
}

fn default_multiple_simulations() -> usize {
    1
}

/// Everything needed to declare the flux and dynamic rupture kernels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Convergence order of the modal basis.
    pub order: usize,
    /// Directory holding the `dr_{method}_matrices_{order}.json` files.
    pub matrices_dir: PathBuf,
    /// Either `"quadrature"` or `"cellaverage"`.
    pub dynamic_rupture_method: String,
    #[serde(default = "default_elastic_quantities")]
    pub elastic_quantities: usize,
    /// Number of attenuation mechanisms, zero for purely elastic media.
    #[serde(default)]
    pub anelastic_mechanisms: usize,
    #[serde(default = "default_quantities_per_mechanism")]
    pub quantities_per_mechanism: usize,
    /// Number of simulations vectorized together.
    #[serde(default = "default_multiple_simulations")]
    pub multiple_simulations: usize,
    #[serde(default)]
    pub alignment: Alignment,
}

impl GeneratorConfig {
    pub fn from_json_str(data: &str) -> eyre::Result<Self> {
        serde_json::from_str(data).wrap_err("failed to parse generator configuration")
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read configuration file {}", path.display()))?;
        Self::from_json_str(&data)
    }

    pub fn extended_quantities(&self) -> usize {
        self.elastic_quantities + self.anelastic_mechanisms * self.quantities_per_mechanism
    }
}

/// Declares the flux kernels and the dynamic rupture kernels for `config`.
///
/// The element solution `Q` and the prefetch target `I` hold the elastic quantities, the
/// extended state `Qext` holds all quantities.
pub fn generate(config: &GeneratorConfig) -> eyre::Result<Generator> {
    // Reject unknown methods before the flux kernels are declared
    config.dynamic_rupture_method.parse::<RuptureMethod>()?;
    if config.multiple_simulations == 0 {
        return Err(eyre!("the number of simulations must be positive"));
    }

    let n_basis = number_of_basis_functions(config.order)?;
    let n_elastic = config.elastic_quantities;
    let n_ext = config.extended_quantities();
    let sims = config.multiple_simulations;

    let batched = |name: &str, quantities: usize| {
        BatchedTensor::new(name, SIMULATION_LABEL, sims, 0, &[n_basis, quantities]).map(|t| t.with_align_stride(true))
    };
    let q = batched("Q", n_elastic)?;
    let qext = batched("Qext", n_ext)?;
    let i = batched("I", n_elastic)?;
    let star = Tensor::with_group("star", &[0], &[n_elastic, n_ext])?;

    let mut generator = Generator::new();
    let flux_parameters = flux::FluxParameters {
        order: config.order,
        number_of_quantities: n_elastic,
        number_of_extended_quantities: n_ext,
    };
    let flux_tensors = flux::add_kernels(&mut generator, &star, &q, &flux_parameters).wrap_err("failed to declare flux kernels")?;

    let inputs = RuptureInputs {
        flux: &flux_tensors,
        star: &star,
        q: &q,
        qext: &qext,
        i: &i,
    };
    rupture::add_kernels_from_dir(
        &mut generator,
        inputs,
        &config.matrices_dir,
        &config.dynamic_rupture_method,
        config.order,
        n_elastic,
        n_ext,
        true,
    )
    .wrap_err("failed to declare dynamic rupture kernels")?;

    info!(
        "Generated {} kernels in {} declarations",
        generator.num_kernels(),
        generator.len()
    );
    Ok(generator)
}

/// Writes `kernels.txt` (rendered declarations) and `manifest.json` into `output_dir`.
pub fn write_declarations(generator: &Generator, alignment: &Alignment, output_dir: impl AsRef<Path>) -> eyre::Result<()> {
    let output_dir = output_dir.as_ref();
    std::fs::create_dir_all(output_dir)
        .wrap_err_with(|| format!("failed to create output directory {}", output_dir.display()))?;

    let manifest = Manifest::from_generator(generator, alignment)
        .to_json()
        .wrap_err("failed to serialize manifest")?;
    std::fs::write(output_dir.join("kernels.txt"), generator.render()).wrap_err("failed to write kernels.txt")?;
    std::fs::write(output_dir.join("manifest.json"), manifest).wrap_err("failed to write manifest.json")?;
    Ok(())
}
