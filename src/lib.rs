//! Train a small fully-connected network on MNIST with [burn] and classify single images
//! with the trained parameters.

pub mod backend;
pub mod cli;
pub mod data;
pub mod error;
pub mod inference;
pub mod logger;
pub mod metric;
pub mod model;
pub mod training;

pub use error::{Error, Result};

#[cfg(test)]
pub(crate) type TestBackend = burn::backend::NdArray<f32>;

#[cfg(test)]
pub(crate) type TestAutodiffBackend = burn::backend::Autodiff<TestBackend>;
