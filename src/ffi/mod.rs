//! C ABI over the `nn` modules.
//!
//! Every export follows one call shape: flat primitive arguments in, an opaque handle (or
//! nothing) out, and an optional trailing `*mut NNAnyModule` that receives a type-erased
//! view of a freshly built module. Failures never cross the boundary as panics; they return
//! null (or a documented default) and leave a message in the thread-local slot read by
//! [`nnb_last_error`].
//!
//! Handles are heap boxes owned by the caller and released with the matching `*_dispose`.
//! Input handles are only borrowed.

use crate::nn::{Module, SharedModule, share};
use crate::tensor::Tensor;
use std::ffi::c_int;
use std::fmt::Debug;
use std::sync::Arc;

/// Exports `$fn_name(module, input) -> NNTensor` for module type `$module` named `$name`.
macro_rules! export_forward {
    ($fn_name:ident, $module:ty, $name:literal) => {
        /// Runs the module's forward pass. Returns null on failure.
        ///
        /// # Safety
        ///
        /// `module` and `input` must be null or live handles from this library.
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn $fn_name(
            module: $crate::ffi::NNModule,
            input: $crate::ffi::NNTensor,
        ) -> $crate::ffi::NNTensor {
            $crate::ffi::error::guard(stringify!($fn_name), std::ptr::null_mut(), || unsafe {
                let input = $crate::ffi::float_tensor(input, "input")?;
                $crate::ffi::with_module::<$module, _>(module, $name, |m| {
                    tracing::trace!(module = $name, shape = ?input.shape(), "forward");
                    let out = $crate::nn::Module::forward(m, input)?;
                    Ok($crate::ffi::new_tensor(out))
                })
            })
        }
    };
}

/// Exports `$fn_name(module, input, *mut indices) -> NNTensor` for a pool reporting indices.
macro_rules! export_forward_with_indices {
    ($fn_name:ident, $module:ty, $name:literal) => {
        /// Runs the forward pass and writes the `i64` index tensor through `indices`.
        ///
        /// Both outputs are produced on success; on failure null is returned and `indices` is
        /// left untouched.
        ///
        /// # Safety
        ///
        /// Handles must be null or live; `indices` must be null or valid for one write.
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn $fn_name(
            module: $crate::ffi::NNModule,
            input: $crate::ffi::NNTensor,
            indices: *mut $crate::ffi::NNTensor,
        ) -> $crate::ffi::NNTensor {
            $crate::ffi::error::guard(stringify!($fn_name), std::ptr::null_mut(), || unsafe {
                if indices.is_null() {
                    return Err($crate::ffi::FfiError::NullPointer("indices"));
                }
                let input = $crate::ffi::float_tensor(input, "input")?;
                let (values, positions) =
                    $crate::ffi::with_module::<$module, _>(module, $name, |m| {
                        tracing::trace!(
                            module = $name,
                            shape = ?input.shape(),
                            "forward_with_indices"
                        );
                        Ok($crate::nn::WithIndices::forward_with_indices(m, input)?)
                    })?;
                *indices = $crate::ffi::new_tensor(positions);
                Ok($crate::ffi::new_tensor(values))
            })
        }
    };
}

/// Exports weight/bias getters and setters for a parameterised module.
macro_rules! export_parameters {
    ($module:ty, $name:literal, $weight:ident, $set_weight:ident, $bias:ident, $set_bias:ident) => {
        /// Returns a handle aliasing the module's weight, or null on failure.
        ///
        /// # Safety
        ///
        /// `module` must be null or a live handle.
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn $weight(module: $crate::ffi::NNModule) -> $crate::ffi::NNTensor {
            $crate::ffi::error::guard(stringify!($weight), std::ptr::null_mut(), || unsafe {
                $crate::ffi::with_module::<$module, _>(module, $name, |m| {
                    let weight = $crate::nn::Parameterized::weight(m).clone();
                    Ok($crate::ffi::new_tensor(weight))
                })
            })
        }

        /// Replaces the weight with `weight`, sharing its storage. The shape must not change.
        ///
        /// # Safety
        ///
        /// Handles must be null or live.
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn $set_weight(
            module: $crate::ffi::NNModule,
            weight: $crate::ffi::NNTensor,
        ) {
            $crate::ffi::error::guard(stringify!($set_weight), (), || unsafe {
                let weight = $crate::ffi::float_tensor(weight, "weight")?.clone();
                $crate::ffi::with_module_mut::<$module, _>(module, $name, |m| {
                    Ok($crate::nn::Parameterized::set_weight(m, weight)?)
                })
            })
        }

        /// Returns a handle aliasing the bias. Null without an error when the module has none.
        ///
        /// # Safety
        ///
        /// `module` must be null or a live handle.
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn $bias(module: $crate::ffi::NNModule) -> $crate::ffi::NNTensor {
            $crate::ffi::error::guard(stringify!($bias), std::ptr::null_mut(), || unsafe {
                $crate::ffi::with_module::<$module, _>(module, $name, |m| {
                    Ok($crate::nn::Parameterized::bias(m)
                        .map_or(std::ptr::null_mut(), |b| $crate::ffi::new_tensor(b.clone())))
                })
            })
        }

        /// Replaces the bias with `bias`, or removes it when `bias` is null.
        ///
        /// # Safety
        ///
        /// Handles must be null or live.
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn $set_bias(
            module: $crate::ffi::NNModule,
            bias: $crate::ffi::NNTensor,
        ) {
            $crate::ffi::error::guard(stringify!($set_bias), (), || unsafe {
                let bias = if bias.is_null() {
                    None
                } else {
                    Some($crate::ffi::float_tensor(bias, "bias")?.clone())
                };
                $crate::ffi::with_module_mut::<$module, _>(module, $name, |m| {
                    Ok($crate::nn::Parameterized::set_bias(m, bias)?)
                })
            })
        }
    };
}

pub mod conv;
pub mod error;
pub mod padding;
pub mod pooling;
pub mod runtime;
pub mod tensor;

pub use conv::*;
pub use error::{
    FfiError, FfiResult, nnb_clear_last_error, nnb_last_error, nnb_last_error_length,
    nnb_last_error_message,
};
pub use padding::*;
pub use pooling::*;
pub use runtime::*;
pub use tensor::*;

/// Concrete module handle returned by every constructor.
pub struct ModuleHandle(pub(crate) SharedModule);

/// Type-erased view over the same module as a [`ModuleHandle`].
pub struct AnyModuleHandle(pub(crate) SharedModule);

/// A tensor crossing the boundary. Pooling indices are `Long`; everything else is `Float`.
#[derive(Clone, Debug)]
pub enum TensorHandle {
    Float(Tensor),
    Long(Tensor<i64>),
}

impl TensorHandle {
    pub fn shape(&self) -> &[usize] {
        match self {
            TensorHandle::Float(t) => t.shape(),
            TensorHandle::Long(t) => t.shape(),
        }
    }

    pub fn dtype(&self) -> &'static str {
        match self {
            TensorHandle::Float(_) => "float32",
            TensorHandle::Long(_) => "int64",
        }
    }
}

impl From<Tensor> for TensorHandle {
    fn from(t: Tensor) -> Self {
        TensorHandle::Float(t)
    }
}

impl From<Tensor<i64>> for TensorHandle {
    fn from(t: Tensor<i64>) -> Self {
        TensorHandle::Long(t)
    }
}

pub type NNModule = *mut ModuleHandle;
pub type NNAnyModule = *mut AnyModuleHandle;
pub type NNTensor = *mut TensorHandle;

pub(crate) fn new_tensor(tensor: impl Into<TensorHandle>) -> NNTensor {
    Box::into_raw(Box::new(tensor.into()))
}

/// Borrows the handle behind `handle`.
///
/// # Safety
///
/// `handle` must be null or point to a live `TensorHandle`.
pub(crate) unsafe fn tensor_handle<'a>(
    handle: NNTensor,
    label: &'static str,
) -> FfiResult<&'a TensorHandle> {
    if handle.is_null() {
        return Err(FfiError::NullPointer(label));
    }
    // SAFETY: non-null and live per the caller.
    Ok(unsafe { &*handle })
}

/// Borrows a float tensor, rejecting index tensors.
///
/// # Safety
///
/// Same as [`tensor_handle`].
pub(crate) unsafe fn float_tensor<'a>(
    handle: NNTensor,
    label: &'static str,
) -> FfiResult<&'a Tensor> {
    match unsafe { tensor_handle(handle, label)? } {
        TensorHandle::Float(t) => Ok(t),
        other => Err(FfiError::WrongDType {
            expected: "float32",
            found: other.dtype(),
        }),
    }
}

/// Logs `options` and builds a module from them.
pub(crate) fn build<O: Debug, M: Module>(
    options: O,
    new: impl FnOnce(O) -> crate::tensor::Result<M>,
) -> FfiResult<M> {
    tracing::debug!(?options, "building module");
    Ok(new(options)?)
}

/// Boxes `module` as a handle and, when `out_any` is non-null, writes an erased view of it.
///
/// # Safety
///
/// `out_any` must be null or valid for one write.
pub(crate) unsafe fn create_module<M: Module>(module: M, out_any: *mut NNAnyModule) -> NNModule {
    let name = module.name();
    let shared = share(module);
    if !out_any.is_null() {
        // SAFETY: non-null and writable per the caller.
        unsafe { *out_any = Box::into_raw(Box::new(AnyModuleHandle(Arc::clone(&shared)))) };
    }
    tracing::debug!(module = name, with_view = !out_any.is_null(), "constructed module");
    Box::into_raw(Box::new(ModuleHandle(shared)))
}

/// # Safety
///
/// `handle` must be null or point to a live `ModuleHandle`.
pub(crate) unsafe fn shared_module<'a>(handle: NNModule) -> FfiResult<&'a SharedModule> {
    if handle.is_null() {
        return Err(FfiError::NullPointer("module"));
    }
    // SAFETY: non-null and live per the caller.
    Ok(unsafe { &(*handle).0 })
}

/// Runs `f` on the module behind `handle` after checking it is an `expected`.
///
/// # Safety
///
/// Same as [`shared_module`].
pub(crate) unsafe fn with_module<M: Module, R>(
    handle: NNModule,
    expected: &'static str,
    f: impl FnOnce(&M) -> FfiResult<R>,
) -> FfiResult<R> {
    let shared = unsafe { shared_module(handle)? };
    let lock = shared.read().map_err(|_| FfiError::Poisoned)?;
    let found = lock.name();
    let module = if found == expected {
        lock.as_any().downcast_ref::<M>()
    } else {
        None
    };
    f(module.ok_or(FfiError::WrongModule { expected, found })?)
}

/// Mutable counterpart of [`with_module`]; takes the write lock.
///
/// # Safety
///
/// Same as [`shared_module`].
pub(crate) unsafe fn with_module_mut<M: Module, R>(
    handle: NNModule,
    expected: &'static str,
    f: impl FnOnce(&mut M) -> FfiResult<R>,
) -> FfiResult<R> {
    let shared = unsafe { shared_module(handle)? };
    let mut lock = shared.write().map_err(|_| FfiError::Poisoned)?;
    let found = lock.name();
    let module = if found == expected {
        lock.as_any_mut().downcast_mut::<M>()
    } else {
        None
    };
    f(module.ok_or(FfiError::WrongModule { expected, found })?)
}

pub(crate) fn to_usize(name: &'static str, value: i64) -> FfiResult<usize> {
    usize::try_from(value).map_err(|_| FfiError::Negative(name, value))
}

pub(crate) fn axes<const D: usize>(name: &'static str, values: [i64; D]) -> FfiResult<[usize; D]> {
    let mut out = [0; D];
    for (slot, value) in out.iter_mut().zip(values) {
        *slot = to_usize(name, value)?;
    }
    Ok(out)
}

/// Reads an optional `(pointer, length)` array option. Null means "use the default".
///
/// A single value is broadcast to every axis; otherwise exactly `D` values are required.
///
/// # Safety
///
/// `values` must be null or valid for `len` reads.
pub(crate) unsafe fn expand<const D: usize>(
    name: &'static str,
    values: *const i64,
    len: c_int,
) -> FfiResult<Option<[usize; D]>> {
    if values.is_null() {
        return Ok(None);
    }
    let arity = usize::try_from(len).ok().filter(|&n| n == 1 || n == D);
    let Some(n) = arity else {
        return Err(FfiError::Arity {
            name,
            expected: D,
            got: i64::from(len),
        });
    };
    // SAFETY: non-null with `n` readable elements per the caller.
    let slice = unsafe { std::slice::from_raw_parts(values, n) };
    let mut out = [0; D];
    for (axis, slot) in out.iter_mut().enumerate() {
        *slot = to_usize(name, slice[if n == 1 { 0 } else { axis }])?;
    }
    Ok(Some(out))
}

/// Like [`expand`] but the option is mandatory.
///
/// # Safety
///
/// Same as [`expand`].
pub(crate) unsafe fn expand_required<const D: usize>(
    name: &'static str,
    values: *const i64,
    len: c_int,
) -> FfiResult<[usize; D]> {
    unsafe { expand(name, values, len)? }.ok_or(FfiError::NullPointer(name))
}
