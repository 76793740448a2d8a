//! Tensor transit: building tensors from caller buffers, inspecting and copying them out.

use super::error::guard;
use super::{FfiError, FfiResult, NNTensor, TensorHandle, new_tensor, tensor_handle, to_usize};
use crate::tensor::{Tensor, TensorElem, TensorError, numel_of};
use std::ffi::c_int;
use std::{ptr, slice};

/// # Safety
///
/// `shape` must be valid for `ndim` reads and `data` for `product(shape)` reads.
unsafe fn read_tensor<T: TensorElem>(
    data: *const T,
    shape: *const i64,
    ndim: c_int,
) -> FfiResult<Tensor<T>> {
    let ndim = to_usize("ndim", i64::from(ndim))?;
    let dims = if ndim == 0 {
        Vec::new()
    } else if shape.is_null() {
        return Err(FfiError::NullPointer("shape"));
    } else {
        // SAFETY: `ndim` readable elements per the caller.
        unsafe { slice::from_raw_parts(shape, ndim) }
            .iter()
            .map(|&d| to_usize("shape", d))
            .collect::<FfiResult<Vec<_>>>()?
    };
    let numel = numel_of(&dims)?;
    let mut values = Vec::new();
    if numel > 0 {
        if data.is_null() {
            return Err(FfiError::NullPointer("data"));
        }
        values.try_reserve_exact(numel).map_err(|_| {
            TensorError::InvalidArgument(format!("shape {dims:?} is too large to allocate"))
        })?;
        // SAFETY: `numel` readable elements per the caller.
        values.extend_from_slice(unsafe { slice::from_raw_parts(data, numel) });
    }
    Ok(Tensor::new(values, &dims)?)
}

/// Copies `product(shape)` floats into a new tensor.
///
/// # Safety
///
/// `shape` must be valid for `ndim` reads and `data` for `product(shape)` reads.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nnb_tensor_from_f32(
    data: *const f32,
    shape: *const i64,
    ndim: c_int,
) -> NNTensor {
    guard("nnb_tensor_from_f32", ptr::null_mut(), || {
        Ok(new_tensor(unsafe { read_tensor(data, shape, ndim)? }))
    })
}

/// Copies `product(shape)` longs into a new tensor.
///
/// # Safety
///
/// `shape` must be valid for `ndim` reads and `data` for `product(shape)` reads.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nnb_tensor_from_i64(
    data: *const i64,
    shape: *const i64,
    ndim: c_int,
) -> NNTensor {
    guard("nnb_tensor_from_i64", ptr::null_mut(), || {
        Ok(new_tensor(unsafe { read_tensor(data, shape, ndim)? }))
    })
}

/// Releases a tensor handle. Null is ignored. Aliases of the storage stay valid.
///
/// # Safety
///
/// `tensor` must be null or a handle from this library not yet disposed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nnb_tensor_dispose(tensor: NNTensor) {
    if !tensor.is_null() {
        // SAFETY: ownership goes back to the box allocated by `new_tensor`.
        drop(unsafe { Box::from_raw(tensor) });
    }
}

/// Number of dimensions, or `-1` on failure.
///
/// # Safety
///
/// `tensor` must be null or live.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nnb_tensor_ndim(tensor: NNTensor) -> i64 {
    guard("nnb_tensor_ndim", -1, || {
        let handle = unsafe { tensor_handle(tensor, "tensor")? };
        Ok(handle.shape().len() as i64)
    })
}

/// Writes the shape into `out`, which must hold `ndim` values. Returns false on failure.
///
/// # Safety
///
/// `tensor` must be null or live; `out` null or valid for `ndim` writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nnb_tensor_shape(tensor: NNTensor, out: *mut i64) -> bool {
    guard("nnb_tensor_shape", false, || {
        let handle = unsafe { tensor_handle(tensor, "tensor")? };
        let shape = handle.shape();
        if shape.is_empty() {
            return Ok(true);
        }
        if out.is_null() {
            return Err(FfiError::NullPointer("out"));
        }
        // SAFETY: room for `ndim` values per the caller.
        let out = unsafe { slice::from_raw_parts_mut(out, shape.len()) };
        for (slot, &dim) in out.iter_mut().zip(shape) {
            *slot = dim as i64;
        }
        Ok(true)
    })
}

/// Number of elements, or `-1` on failure.
///
/// # Safety
///
/// `tensor` must be null or live.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nnb_tensor_numel(tensor: NNTensor) -> i64 {
    guard("nnb_tensor_numel", -1, || {
        let handle = unsafe { tensor_handle(tensor, "tensor")? };
        Ok(handle.shape().iter().product::<usize>() as i64)
    })
}

/// Whether the tensor holds `i64` values (pooling indices).
///
/// # Safety
///
/// `tensor` must be null or live.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nnb_tensor_is_long(tensor: NNTensor) -> bool {
    guard("nnb_tensor_is_long", false, || {
        let handle = unsafe { tensor_handle(tensor, "tensor")? };
        Ok(matches!(handle, TensorHandle::Long(_)))
    })
}

fn copy_out<T: Copy>(source: &[T], out: *mut T, len: usize) -> FfiResult<()> {
    if len != source.len() {
        return Err(FfiError::BufferLength {
            expected: source.len(),
            got: len,
        });
    }
    if source.is_empty() {
        return Ok(());
    }
    if out.is_null() {
        return Err(FfiError::NullPointer("out"));
    }
    // SAFETY: `out` holds `len == source.len()` elements per the exported contract.
    unsafe { ptr::copy_nonoverlapping(source.as_ptr(), out, len) };
    Ok(())
}

/// Copies a float tensor into `out`; `len` must equal the element count.
///
/// # Safety
///
/// `tensor` must be null or live; `out` null or valid for `len` writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nnb_tensor_copy_f32(tensor: NNTensor, out: *mut f32, len: usize) -> bool {
    guard("nnb_tensor_copy_f32", false, || {
        match unsafe { tensor_handle(tensor, "tensor")? } {
            TensorHandle::Float(t) => copy_out(t.data(), out, len)?,
            other => {
                return Err(FfiError::WrongDType {
                    expected: "float32",
                    found: other.dtype(),
                });
            }
        }
        Ok(true)
    })
}

/// Copies a long tensor into `out`; `len` must equal the element count.
///
/// # Safety
///
/// `tensor` must be null or live; `out` null or valid for `len` writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nnb_tensor_copy_i64(tensor: NNTensor, out: *mut i64, len: usize) -> bool {
    guard("nnb_tensor_copy_i64", false, || {
        match unsafe { tensor_handle(tensor, "tensor")? } {
            TensorHandle::Long(t) => copy_out(t.data(), out, len)?,
            other => {
                return Err(FfiError::WrongDType {
                    expected: "int64",
                    found: other.dtype(),
                });
            }
        }
        Ok(true)
    })
}

/// Whether two handles view the same storage.
///
/// # Safety
///
/// Both handles must be null or live.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nnb_tensor_same_storage(a: NNTensor, b: NNTensor) -> bool {
    guard("nnb_tensor_same_storage", false, || {
        let a = unsafe { tensor_handle(a, "a")? };
        let b = unsafe { tensor_handle(b, "b")? };
        Ok(match (a, b) {
            (TensorHandle::Float(x), TensorHandle::Float(y)) => x.shares_storage(y),
            (TensorHandle::Long(x), TensorHandle::Long(y)) => x.shares_storage(y),
            _ => false,
        })
    })
}
