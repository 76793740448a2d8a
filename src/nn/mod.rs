//! Neural network modules exposed through the C ABI.
//!
//! Each family is generic over its spatial dimensionality `D` and aliased per dimension
//! (`Conv2d = Conv<2>`, `MaxPool3d = MaxPool<3>`, ...). Modules are built from an options record
//! and accept either batched `[N, C, *spatial]` or unbatched `[C, *spatial]` input.

pub mod conv;
pub mod init;
pub mod module;
pub mod padding;
pub mod pool;

pub use conv::{
    Conv, Conv1d, Conv2d, Conv3d, ConvOptions, ConvTranspose, ConvTranspose1d, ConvTranspose2d,
    ConvTranspose3d, ConvTransposeOptions, Padding, PaddingMode,
};
pub use module::{Module, Parameterized, SharedModule, WithIndices, share};
pub use padding::{
    ConstantPad1d, ConstantPad2d, ConstantPad3d, Pad, PadKind, PadOptions, ReflectionPad1d,
    ReflectionPad2d, ReflectionPad3d, ReplicationPad1d, ReplicationPad2d, ReplicationPad3d,
    ZeroPad2d,
};
pub use pool::{
    AdaptiveAvgPool, AdaptiveAvgPool1d, AdaptiveAvgPool2d, AdaptiveAvgPool3d, AdaptiveMaxPool,
    AdaptiveMaxPool1d, AdaptiveMaxPool2d, AdaptiveMaxPool3d, AdaptivePoolOptions, AvgPool,
    AvgPool1d, AvgPool2d, AvgPool3d, AvgPoolOptions, MaxPool, MaxPool1d, MaxPool2d, MaxPool3d,
    MaxPoolOptions,
};

use crate::tensor::{Result, Tensor, TensorError};

/// Picks the per-dimension name for a module family, e.g. `dim_name(&CONV, 2) == "Conv2d"`.
pub(crate) fn dim_name(names: &[&'static str; 3], spatial: usize) -> &'static str {
    spatial
        .checked_sub(1)
        .and_then(|i| names.get(i))
        .copied()
        .unwrap_or("Module")
}

/// Checks that `input` is `[C, *spatial]` or `[N, C, *spatial]` and reports whether it is batched.
pub(crate) fn check_input_rank(name: &str, spatial: usize, input: &Tensor) -> Result<bool> {
    match input.ndim() {
        n if n == spatial + 2 => Ok(true),
        n if n == spatial + 1 => Ok(false),
        _ => Err(TensorError::InvalidArgument(format!(
            "Expected {}D (unbatched) or {}D (batched) input to {name}, but got input of size: {:?}",
            spatial + 1,
            spatial + 2,
            input.shape()
        ))),
    }
}

pub(crate) fn check_positive<const D: usize>(name: &str, values: &[usize; D]) -> Result<()> {
    if values.contains(&0) {
        return Err(TensorError::InvalidArgument(format!(
            "{name} must be greater than zero, got {values:?}"
        )));
    }
    Ok(())
}
