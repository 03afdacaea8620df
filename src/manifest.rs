//! Machine-readable summary of a declaration set, serialized as JSON.
use crate::basis::Alignment;
use crate::expr::Mode;
use crate::generator::{Declaration, Generator, Prefetch};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TensorEntry {
    pub name: String,
    pub shape: Vec<usize>,
    pub aligned_shape: Vec<usize>,
    /// Number of stored nonzeros, `None` for dense tensors.
    pub nonzeros: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KernelEntry {
    pub name: String,
    pub equation: String,
    pub mode: Mode,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberEntry {
    pub index: Vec<usize>,
    pub equation: String,
    pub mode: Mode,
    pub prefetch: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FamilyEntry {
    pub name: String,
    pub extents: Vec<usize>,
    pub members: Vec<MemberEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Manifest {
    pub alignment: Alignment,
    pub tensors: Vec<TensorEntry>,
    pub kernels: Vec<KernelEntry>,
    pub families: Vec<FamilyEntry>,
}

impl Manifest {
    pub fn from_generator(generator: &Generator, alignment: &Alignment) -> Self {
        let tensors = generator
            .tensors()
            .map(|tensor| TensorEntry {
                name: tensor.name().to_string(),
                shape: tensor.shape().to_vec(),
                aligned_shape: tensor.aligned_shape(alignment),
                nonzeros: tensor.sparsity().map(|pattern| pattern.len()),
            })
            .collect();

        let mut kernels = Vec::new();
        let mut families = Vec::new();
        for declaration in generator.declarations() {
            match declaration {
                Declaration::Kernel(kernel) => kernels.push(KernelEntry {
                    name: kernel.name().to_string(),
                    equation: kernel.equation().to_string(),
                    mode: kernel.equation().mode(),
                }),
                Declaration::Family(family) => families.push(FamilyEntry {
                    name: family.name().to_string(),
                    extents: family.space().extents().to_vec(),
                    members: family
                        .members()
                        .iter()
                        .map(|member| MemberEntry {
                            index: member.index().to_vec(),
                            equation: member.equation().to_string(),
                            mode: member.equation().mode(),
                            prefetch: match member.prefetch() {
                                Prefetch::None => None,
                                Prefetch::Tensor(name) => Some(name.to_string()),
                            },
                        })
                        .collect(),
                }),
            }
        }

        Self {
            alignment: *alignment,
            tensors,
            kernels,
            families,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
