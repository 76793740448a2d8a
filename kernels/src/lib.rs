use num_traits::{FromPrimitive, Num, NumAssign, ToPrimitive};
use std::fmt::Debug;
use thiserror::Error;

pub mod cpu_conv;
pub mod cpu_pad;
pub mod cpu_pool;

pub use cpu_conv::{ConvGeometry, ConvTransposeGeometry, cpu_conv_nd, cpu_conv_transpose_nd};
pub use cpu_pad::{PadMode, cpu_pad_nd};
pub use cpu_pool::{
    AvgPoolGeometry, MaxPoolGeometry, check_window, cpu_adaptive_avg_pool_nd,
    cpu_adaptive_max_pool_nd, cpu_avg_pool_nd, cpu_max_pool_nd,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum KernelError {
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, KernelError>;

/// Trait bound for elements that can be processed by kernels.
/// This mirrors `TensorElem` in the main crate to avoid circular dependencies.
pub trait KernelElem:
    Num + NumAssign + Copy + Clone + Debug + Send + Sync + FromPrimitive + ToPrimitive + PartialOrd
{
}

impl<T> KernelElem for T where
    T: Num
        + NumAssign
        + Copy
        + Clone
        + Debug
        + Send
        + Sync
        + FromPrimitive
        + ToPrimitive
        + PartialOrd
{
}

/// Number of elements in a tensor of shape `dims`.
///
/// # Errors
///
/// Returns `KernelError::InvalidArgument` when the count does not fit in `usize`.
pub fn checked_numel(dims: &[usize]) -> Result<usize> {
    dims.iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| KernelError::InvalidArgument(format!("shape {dims:?} is too large")))
}

/// Allocates a buffer of `len` copies of `value`.
///
/// Allocation failure comes back as an error instead of aborting the process.
pub fn try_filled<T: Clone>(len: usize, value: T) -> Result<Vec<T>> {
    let mut buffer = Vec::new();
    buffer.try_reserve_exact(len).map_err(|_| {
        KernelError::InvalidArgument(format!("buffer of {len} elements is too large to allocate"))
    })?;
    buffer.resize(len, value);
    Ok(buffer)
}

/// Splits `shape` into the number of independent planes (product of the leading dims)
/// and the trailing `spatial` dims.
pub(crate) fn split_planes(shape: &[usize], spatial: usize) -> Result<(usize, &[usize])> {
    if shape.len() < spatial {
        return Err(KernelError::ShapeMismatch {
            expected: vec![spatial],
            got: vec![shape.len()],
        });
    }
    let (lead, rest) = shape.split_at(shape.len() - spatial);
    Ok((checked_numel(lead)?, rest))
}

/// Writes the row-major multi-index of `flat` within `dims` into `idx`.
#[inline]
pub(crate) fn unravel(mut flat: usize, dims: &[usize], idx: &mut [usize]) {
    for axis in (0..dims.len()).rev() {
        idx[axis] = flat % dims[axis];
        flat /= dims[axis];
    }
}

pub(crate) fn check_arity(name: &str, values: &[usize], spatial: usize) -> Result<()> {
    if values.len() != spatial {
        return Err(KernelError::InvalidArgument(format!(
            "{name} expects {spatial} values, got {}",
            values.len()
        )));
    }
    Ok(())
}

pub(crate) fn check_positive(name: &str, values: &[usize]) -> Result<()> {
    if values.contains(&0) {
        return Err(KernelError::InvalidArgument(format!(
            "{name} must be greater than zero, got {values:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unravel_row_major() {
        let mut idx = [0usize; 3];
        unravel(7, &[2, 2, 3], &mut idx);
        assert_eq!(idx, [1, 0, 1]);
    }

    #[test]
    fn test_checked_numel_overflow() {
        assert_eq!(checked_numel(&[2, 3, 4]).unwrap(), 24);
        assert_eq!(checked_numel(&[]).unwrap(), 1);
        let err = checked_numel(&[1 << 32, 1 << 32]);
        assert!(matches!(err, Err(KernelError::InvalidArgument(msg)) if msg.contains("too large")));
    }

    #[test]
    fn test_try_filled_reports_failure() {
        assert_eq!(try_filled(3, 7u8).unwrap(), vec![7, 7, 7]);
        // More bytes than `isize::MAX` can never be reserved.
        assert!(try_filled(usize::MAX / 2, 0u32).is_err());
    }

    #[test]
    fn test_split_planes() {
        let (planes, spatial) = split_planes(&[2, 3, 4, 5], 2).unwrap();
        assert_eq!(planes, 6);
        assert_eq!(spatial, &[4, 5]);
        assert!(split_planes(&[4], 2).is_err());
    }
}
