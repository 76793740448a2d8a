//! Core Tensor implementation.
//!
//! A `Tensor` here is a dense, row-major N-dimensional array whose rank is only known at
//! runtime, because shapes arrive from across the C ABI as `(pointer, length)` pairs.
//!
//! Storage is reference counted. Cloning a tensor is cheap and yields a second view of the
//! same buffer, which is how parameter getters hand out tensors that alias a module's
//! weights instead of copying them.
//!
//! ```rust
//! use nnbridge::tensor::Tensor;
//!
//! let t = Tensor::<f32>::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
//! assert_eq!(t.shape(), &[2, 3]);
//!
//! let alias = t.clone();
//! assert!(alias.shares_storage(&t));
//! ```

use num_traits::{FromPrimitive, Num, NumAssign, ToPrimitive};
use std::fmt::{self, Debug};
use std::sync::Arc;
use thiserror::Error;

pub mod ops;

pub use ops::{ConvGeometry, ConvTransposeGeometry, PadMode};

/// Error type for Tensor operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TensorError {
    /// The shape of the data does not match the expected shape.
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },
    /// An option or input is outside the domain of the operation.
    #[error("{0}")]
    InvalidArgument(String),
    /// The requested operation is not supported (e.g., for a specific rank or mode).
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

impl From<nnbridge_kernels::KernelError> for TensorError {
    fn from(err: nnbridge_kernels::KernelError) -> Self {
        match err {
            nnbridge_kernels::KernelError::ShapeMismatch { expected, got } => {
                TensorError::ShapeMismatch { expected, got }
            }
            nnbridge_kernels::KernelError::InvalidArgument(msg) => {
                TensorError::InvalidArgument(msg)
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, TensorError>;

/// Number of elements in a tensor of `shape`.
///
/// # Errors
///
/// Returns `TensorError::InvalidArgument` when the count overflows `usize`.
pub fn numel_of(shape: &[usize]) -> Result<usize> {
    Ok(nnbridge_kernels::checked_numel(shape)?)
}

/// Allocates `len` copies of `value`, reporting allocation failure as an error.
pub(crate) fn filled<T: Clone>(len: usize, value: T) -> Result<Vec<T>> {
    Ok(nnbridge_kernels::try_filled(len, value)?)
}

/// Trait bound for elements that can be stored in a Tensor.
///
/// # Requirements
/// - `Copy + Clone`: Essential for efficient storage in contiguous memory (e.g., `Vec<T>`) and fast element access.
/// - `Num + ...`: Provides necessary numeric operations for tensor math.
/// - `Send + Sync`: Required for parallel execution via `rayon`.
pub trait TensorElem:
    Num + NumAssign + Copy + Clone + Debug + Send + Sync + FromPrimitive + ToPrimitive + PartialOrd
{
}

impl<T> TensorElem for T where
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

/// The core Tensor struct.
///
/// `T` defaults to `f32`; pooling indices use `Tensor<i64>`.
#[derive(Clone)]
pub struct Tensor<T: TensorElem = f32> {
    shape: Vec<usize>,
    data: Arc<Vec<T>>,
}

impl<T: TensorElem> Tensor<T> {
    /// Creates a new Tensor from a vector of data and a shape.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::ShapeMismatch` if the length of `data` does not match the product of
    /// `shape`, or `TensorError::InvalidArgument` if that product overflows.
    pub fn new(data: Vec<T>, shape: &[usize]) -> Result<Self> {
        let size = numel_of(shape)?;
        if data.len() != size {
            return Err(TensorError::ShapeMismatch {
                expected: vec![size],
                got: vec![data.len()],
            });
        }
        Ok(Self {
            shape: shape.to_vec(),
            data: Arc::new(data),
        })
    }

    /// Creates a new Tensor filled with zeros.
    pub fn zeros(shape: &[usize]) -> Result<Self> {
        Self::full(shape, T::zero())
    }

    /// Creates a new Tensor filled with ones.
    pub fn ones(shape: &[usize]) -> Result<Self> {
        Self::full(shape, T::one())
    }

    /// Creates a new Tensor with every element set to `value`.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::InvalidArgument` if the shape is too large to allocate.
    pub fn full(shape: &[usize], value: T) -> Result<Self> {
        let data = filled(numel_of(shape)?, value)?;
        Ok(Self {
            shape: shape.to_vec(),
            data: Arc::new(data),
        })
    }

    /// Returns the shape of the tensor.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Returns the number of dimensions.
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Returns the total number of elements in the tensor.
    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Returns a reference to the underlying data as a slice.
    pub fn data(&self) -> &[T] {
        self.data.as_slice()
    }

    /// Copies the data out into a new vector.
    pub fn to_vec(&self) -> Vec<T> {
        self.data.as_ref().clone()
    }

    /// Returns `true` when both tensors view the same storage buffer.
    pub fn shares_storage(&self, other: &Tensor<T>) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    /// Returns a view with a new shape over the same storage.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::ShapeMismatch` if the element counts differ.
    pub fn reshape(&self, new_shape: &[usize]) -> Result<Self> {
        let new_size = numel_of(new_shape)?;
        if new_size != self.numel() {
            return Err(TensorError::ShapeMismatch {
                expected: vec![self.numel()],
                got: vec![new_size],
            });
        }
        Ok(Self {
            shape: new_shape.to_vec(),
            data: Arc::clone(&self.data),
        })
    }

    /// Inserts a dimension of size one at `dim`.
    pub fn unsqueeze(&self, dim: usize) -> Result<Self> {
        if dim > self.ndim() {
            return Err(TensorError::InvalidArgument(format!(
                "unsqueeze dim {dim} out of range for a {}-d tensor",
                self.ndim()
            )));
        }
        let mut shape = self.shape.clone();
        shape.insert(dim, 1);
        self.reshape(&shape)
    }

    /// Removes the dimension at `dim`, which must have size one.
    pub fn squeeze(&self, dim: usize) -> Result<Self> {
        match self.shape.get(dim) {
            Some(1) => {
                let mut shape = self.shape.clone();
                shape.remove(dim);
                self.reshape(&shape)
            }
            _ => Err(TensorError::InvalidArgument(format!(
                "cannot squeeze dim {dim} of shape {:?}",
                self.shape
            ))),
        }
    }

    pub(crate) fn from_parts(data: Vec<T>, shape: Vec<usize>) -> Self {
        debug_assert_eq!(data.len(), shape.iter().product::<usize>());
        Self {
            shape,
            data: Arc::new(data),
        }
    }
}

impl<T: TensorElem> Debug for Tensor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const PREVIEW: usize = 8;
        let data = self.data();
        let head = &data[..data.len().min(PREVIEW)];
        f.debug_struct("Tensor")
            .field("shape", &self.shape)
            .field("data", &head)
            .field("truncated", &(data.len() > PREVIEW))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_wrong_length() {
        let err = Tensor::<f32>::new(vec![1.0, 2.0, 3.0], &[2, 2]);
        assert!(matches!(err, Err(TensorError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_clone_and_reshape_alias_storage() {
        let t = Tensor::<f32>::ones(&[2, 3]).unwrap();
        let r = t.reshape(&[3, 2]).unwrap();
        assert!(r.shares_storage(&t));
        assert_eq!(r.shape(), &[3, 2]);

        let copy = Tensor::new(t.to_vec(), t.shape()).unwrap();
        assert!(!copy.shares_storage(&t));
    }

    #[test]
    fn test_oversized_shapes_are_errors() {
        let huge = [1usize << 32, 1 << 32];
        assert!(matches!(
            Tensor::<f32>::new(vec![], &huge),
            Err(TensorError::InvalidArgument(msg)) if msg.contains("too large")
        ));
        assert!(Tensor::<f32>::zeros(&huge).is_err());
        assert!(Tensor::<f32>::full(&[usize::MAX / 2], 1.0).is_err());

        let t = Tensor::<f32>::ones(&[4]).unwrap();
        assert!(t.reshape(&huge).is_err());
    }

    #[test]
    fn test_unsqueeze_squeeze() {
        let t = Tensor::<i64>::zeros(&[3, 4]).unwrap();
        let u = t.unsqueeze(0).unwrap();
        assert_eq!(u.shape(), &[1, 3, 4]);
        assert_eq!(u.squeeze(0).unwrap().shape(), &[3, 4]);
        assert!(t.squeeze(0).is_err());
    }
}
