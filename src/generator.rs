//! Collections of named kernels and kernel families.
//!
//! The [`Generator`] is the declaration set handed to a code generator: a list of named
//! equations and parameterized families, plus every tensor they reference. It rejects duplicate
//! names and tensors that are redeclared with a different shape or pattern.
use crate::error::Error;
use crate::expr::Equation;
use crate::tensor::{Tensor, TensorName};
use itertools::Itertools;
use log::debug;
use rustc_hash::FxHashMap;
use seisflux_matrices::is_identifier;
use std::collections::BTreeMap;
use std::fmt;
use std::fmt::{Display, Formatter, Write};

/// Prefetch annotation attached to each member of a kernel family.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Prefetch {
    None,
    Tensor(TensorName),
}

impl Display for Prefetch {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Tensor(name) => write!(f, "{}", name),
        }
    }
}

/// A finite, row-major enumerable parameter space such as the 4x4 grid of
/// (local face, neighbor orientation) pairs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParameterSpace {
    extents: Vec<usize>,
}

impl ParameterSpace {
    pub fn new(extents: &[usize]) -> Result<Self, Error> {
        if extents.is_empty() || extents.contains(&0) {
            Err(Error::InvalidParameterSpace {
                extents: extents.to_vec(),
            })
        } else {
            Ok(Self {
                extents: extents.to_vec(),
            })
        }
    }

    pub fn extents(&self) -> &[usize] {
        &self.extents
    }

    pub fn len(&self) -> usize {
        self.extents.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, index: &[usize]) -> bool {
        index.len() == self.extents.len() && index.iter().zip(&self.extents).all(|(i, n)| i < n)
    }

    /// All points, with the last coordinate varying fastest.
    pub fn iter(&self) -> impl Iterator<Item = Vec<usize>> + '_ {
        self.extents.iter().map(|&n| 0..n).multi_cartesian_product()
    }
}

/// A single named kernel.
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel {
    name: String,
    equation: Equation,
}

impl Kernel {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn equation(&self) -> &Equation {
        &self.equation
    }
}

/// One instance of a kernel family.
#[derive(Debug, Clone, PartialEq)]
pub struct FamilyMember {
    index: Vec<usize>,
    equation: Equation,
    prefetch: Prefetch,
}

impl FamilyMember {
    pub fn index(&self) -> &[usize] {
        &self.index
    }

    pub fn equation(&self) -> &Equation {
        &self.equation
    }

    pub fn prefetch(&self) -> &Prefetch {
        &self.prefetch
    }
}

/// A kernel template instantiated once per point of a parameter space.
#[derive(Debug, Clone, PartialEq)]
pub struct KernelFamily {
    name: String,
    space: ParameterSpace,
    members: Vec<FamilyMember>,
}

impl KernelFamily {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn space(&self) -> &ParameterSpace {
        &self.space
    }

    pub fn members(&self) -> &[FamilyMember] {
        &self.members
    }

    pub fn member(&self, index: &[usize]) -> Result<&FamilyMember, Error> {
        self.members
            .iter()
            .find(|member| member.index == index)
            .ok_or_else(|| Error::UnknownFamilyMember {
                family: self.name.clone(),
                index: index.to_vec(),
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    Kernel(Kernel),
    Family(KernelFamily),
}

impl Declaration {
    pub fn name(&self) -> &str {
        match self {
            Self::Kernel(kernel) => kernel.name(),
            Self::Family(family) => family.name(),
        }
    }

    fn equations(&self) -> Vec<&Equation> {
        match self {
            Self::Kernel(kernel) => vec![kernel.equation()],
            Self::Family(family) => family.members.iter().map(FamilyMember::equation).collect(),
        }
    }
}

/// An ordered set of kernel declarations.
#[derive(Debug, Clone, Default)]
pub struct Generator {
    declarations: Vec<Declaration>,
    names: FxHashMap<String, usize>,
    tensors: BTreeMap<TensorName, Tensor>,
}

impl Generator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a single kernel.
    pub fn add(&mut self, name: &str, equation: Equation) -> Result<(), Error> {
        let kernel = Kernel {
            name: name.to_string(),
            equation,
        };
        self.push(Declaration::Kernel(kernel))
    }

    /// Adds a kernel family by instantiating `equation` and `prefetch` for every point of `space`.
    ///
    /// Either the whole family is added, or nothing is.
    pub fn add_family<F, P>(&mut self, name: &str, space: ParameterSpace, mut equation: F, prefetch: P) -> Result<(), Error>
    where
        F: FnMut(&[usize]) -> Result<Equation, Error>,
        P: Fn(&[usize]) -> Prefetch,
    {
        let members = space
            .iter()
            .map(|index| {
                Ok(FamilyMember {
                    equation: equation(&index)?,
                    prefetch: prefetch(&index),
                    index,
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;
        let family = KernelFamily {
            name: name.to_string(),
            space,
            members,
        };
        self.push(Declaration::Family(family))
    }

    /// Moves every declaration of `other` into `self`.
    ///
    /// Fails without modifying `self` if a name is already taken or a tensor conflicts.
    pub fn merge(&mut self, other: Generator) -> Result<(), Error> {
        for declaration in &other.declarations {
            if self.names.contains_key(declaration.name()) {
                return Err(Error::DuplicateKernel {
                    name: declaration.name().to_string(),
                });
            }
        }
        for tensor in other.tensors.values() {
            self.check_tensor(tensor)?;
        }
        for declaration in other.declarations {
            self.push(declaration)?;
        }
        Ok(())
    }

    fn check_tensor(&self, tensor: &Tensor) -> Result<(), Error> {
        match self.tensors.get(tensor.name()) {
            Some(existing) if existing != tensor => Err(Error::ConflictingTensor {
                name: tensor.name().to_string(),
            }),
            _ => Ok(()),
        }
    }

    fn push(&mut self, declaration: Declaration) -> Result<(), Error> {
        let name = declaration.name();
        if !is_identifier(name) {
            return Err(Error::InvalidName { name: name.to_string() });
        }
        if self.names.contains_key(name) {
            return Err(Error::DuplicateKernel { name: name.to_string() });
        }

        // Tensors declared within the same declaration must agree with each other as well
        let mut new_tensors: BTreeMap<TensorName, Tensor> = BTreeMap::new();
        for equation in declaration.equations() {
            for tensor in equation.tensors() {
                self.check_tensor(tensor)?;
                match new_tensors.get(tensor.name()) {
                    Some(existing) if existing != tensor => {
                        return Err(Error::ConflictingTensor {
                            name: tensor.name().to_string(),
                        })
                    }
                    _ => {
                        new_tensors.insert(tensor.name().clone(), tensor.clone());
                    }
                }
            }
        }

        debug!("Declared kernel {}", name);
        self.names.insert(name.to_string(), self.declarations.len());
        self.tensors.extend(new_tensors);
        self.declarations.push(declaration);
        Ok(())
    }

    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }

    pub fn get(&self, name: &str) -> Option<&Declaration> {
        self.names.get(name).map(|&i| &self.declarations[i])
    }

    pub fn kernel(&self, name: &str) -> Option<&Kernel> {
        match self.get(name)? {
            Declaration::Kernel(kernel) => Some(kernel),
            Declaration::Family(_) => None,
        }
    }

    pub fn family(&self, name: &str) -> Option<&KernelFamily> {
        match self.get(name)? {
            Declaration::Family(family) => Some(family),
            Declaration::Kernel(_) => None,
        }
    }

    /// Number of declarations, counting a family once.
    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// Number of kernels that would be emitted, counting every family member.
    pub fn num_kernels(&self) -> usize {
        self.declarations
            .iter()
            .map(|declaration| match declaration {
                Declaration::Kernel(_) => 1,
                Declaration::Family(family) => family.members.len(),
            })
            .sum()
    }

    /// All referenced tensors, ordered by name.
    pub fn tensors(&self) -> impl Iterator<Item = &Tensor> {
        self.tensors.values()
    }

    pub fn tensor(&self, name: &TensorName) -> Option<&Tensor> {
        self.tensors.get(name)
    }

    /// Renders all declarations as text. The output only depends on the declarations.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl Display for Generator {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for declaration in &self.declarations {
            match declaration {
                Declaration::Kernel(kernel) => render_kernel(f, kernel)?,
                Declaration::Family(family) => render_family(f, family)?,
            }
        }
        Ok(())
    }
}

fn render_kernel(output: &mut impl Write, kernel: &Kernel) -> fmt::Result {
    writeln!(output, "kernel {}: {}", kernel.name, kernel.equation)
}

fn render_family(output: &mut impl Write, family: &KernelFamily) -> fmt::Result {
    let extents = family.space.extents().iter().join("x");
    writeln!(output, "family {} [{}]:", family.name, extents)?;
    for member in &family.members {
        writeln!(
            output,
            "  ({}) {} ; prefetch {}",
            member.index.iter().join(","),
            member.equation,
            member.prefetch
        )?;
    }
    Ok(())
}
