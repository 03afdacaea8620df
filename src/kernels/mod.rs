//! Kernel units. Each unit declares its tensors and equations on a [`Generator`](crate::generator::Generator)
//! and returns the tensors other units build on.
pub mod flux;
pub mod rupture;
