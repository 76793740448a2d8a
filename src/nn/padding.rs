//! Explicit padding layers.
//!
//! One generic [`Pad`] backs every family; the per-family aliases only differ in the
//! [`PadKind`] they are built with, and the kind plus dimensionality determine the module name.

use super::{Module, check_input_rank, dim_name};
use crate::tensor::{PadMode, Result, Tensor};
use std::any::Any;

/// Boundary fill of a padding layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PadKind {
    Zero,
    Constant,
    Replication,
    Reflection,
}

impl PadKind {
    fn names(self) -> &'static [&'static str; 3] {
        match self {
            PadKind::Zero => &["ZeroPad1d", "ZeroPad2d", "ZeroPad3d"],
            PadKind::Constant => &["ConstantPad1d", "ConstantPad2d", "ConstantPad3d"],
            PadKind::Replication => &["ReplicationPad1d", "ReplicationPad2d", "ReplicationPad3d"],
            PadKind::Reflection => &["ReflectionPad1d", "ReflectionPad2d", "ReflectionPad3d"],
        }
    }

    fn mode(self) -> PadMode {
        match self {
            PadKind::Zero | PadKind::Constant => PadMode::Constant,
            PadKind::Replication => PadMode::Replicate,
            PadKind::Reflection => PadMode::Reflect,
        }
    }
}

/// Options for [`Pad`]: `(before, after)` widths per spatial axis. Negative widths crop.
#[derive(Clone, Debug, PartialEq)]
pub struct PadOptions<const D: usize> {
    pub padding: [(isize, isize); D],
    pub kind: PadKind,
    /// Fill value, only read by `PadKind::Constant`.
    pub value: f64,
}

impl<const D: usize> PadOptions<D> {
    pub fn new(kind: PadKind, padding: [(isize, isize); D]) -> Self {
        Self {
            padding,
            kind,
            value: 0.0,
        }
    }

    /// The same width on both sides of every axis.
    pub fn uniform(kind: PadKind, width: isize) -> Self {
        Self::new(kind, [(width, width); D])
    }

    pub fn value(mut self, value: f64) -> Self {
        self.value = value;
        self
    }
}

#[derive(Clone, Debug)]
pub struct Pad<const D: usize> {
    options: PadOptions<D>,
}

pub type ZeroPad2d = Pad<2>;
pub type ConstantPad1d = Pad<1>;
pub type ConstantPad2d = Pad<2>;
pub type ConstantPad3d = Pad<3>;
pub type ReplicationPad1d = Pad<1>;
pub type ReplicationPad2d = Pad<2>;
pub type ReplicationPad3d = Pad<3>;
pub type ReflectionPad1d = Pad<1>;
pub type ReflectionPad2d = Pad<2>;
pub type ReflectionPad3d = Pad<3>;

impl<const D: usize> Pad<D> {
    pub fn new(options: PadOptions<D>) -> Result<Self> {
        Ok(Self { options })
    }

    pub fn options(&self) -> &PadOptions<D> {
        &self.options
    }
}

impl<const D: usize> Module for Pad<D> {
    fn name(&self) -> &'static str {
        dim_name(self.options.kind.names(), D)
    }

    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        check_input_rank(self.name(), D, input)?;
        let value = match self.options.kind {
            PadKind::Constant => self.options.value as f32,
            _ => 0.0,
        };
        input.pad(&self.options.padding, self.options.kind.mode(), value)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
