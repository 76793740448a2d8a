//! Pooling constructors and forwards.
//!
//! Array options arrive as `(pointer, length)` pairs where a null pointer keeps the default;
//! the 1D max/avg constructors take single-element pointers instead.

use super::error::guard;
use super::{FfiResult, NNAnyModule, NNModule, build, create_module, expand, expand_required};
use crate::nn::{
    AdaptiveAvgPool1d, AdaptiveAvgPool2d, AdaptiveAvgPool3d, AdaptiveMaxPool1d, AdaptiveMaxPool2d,
    AdaptiveMaxPool3d, AdaptivePoolOptions, AvgPool1d, AvgPool2d, AvgPool3d, AvgPoolOptions,
    MaxPool1d, MaxPool2d, MaxPool3d, MaxPoolOptions,
};
use std::ffi::c_int;
use std::ptr;

unsafe fn avg_pool_options<const D: usize>(
    kernel: *const i64,
    kernel_len: c_int,
    stride: *const i64,
    stride_len: c_int,
) -> FfiResult<AvgPoolOptions<D>> {
    let kernel_size = unsafe { expand_required("kernel_size", kernel, kernel_len)? };
    let mut options = AvgPoolOptions::new(kernel_size);
    if let Some(stride) = unsafe { expand("stride", stride, stride_len)? } {
        options = options.stride(stride);
    }
    Ok(options)
}

#[allow(clippy::too_many_arguments)]
unsafe fn max_pool_options<const D: usize>(
    kernel: *const i64,
    kernel_len: c_int,
    stride: *const i64,
    stride_len: c_int,
    padding: *const i64,
    padding_len: c_int,
    dilation: *const i64,
    dilation_len: c_int,
    ceil_mode: bool,
) -> FfiResult<MaxPoolOptions<D>> {
    let kernel_size = unsafe { expand_required("kernel_size", kernel, kernel_len)? };
    let mut options = MaxPoolOptions::new(kernel_size).ceil_mode(ceil_mode);
    if let Some(stride) = unsafe { expand("stride", stride, stride_len)? } {
        options = options.stride(stride);
    }
    if let Some(padding) = unsafe { expand("padding", padding, padding_len)? } {
        options = options.padding(padding);
    }
    if let Some(dilation) = unsafe { expand("dilation", dilation, dilation_len)? } {
        options = options.dilation(dilation);
    }
    Ok(options)
}

unsafe fn adaptive_options<const D: usize>(
    output_size: *const i64,
    output_size_len: c_int,
) -> FfiResult<AdaptivePoolOptions<D>> {
    Ok(AdaptivePoolOptions::new(unsafe {
        expand_required("output_size", output_size, output_size_len)?
    }))
}

/// # Safety
///
/// `kernel` must be valid for one read; `stride` null or valid for one read; `out_any` null
/// or valid for one write.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nnb_avgpool1d_ctor(
    kernel: *const i64,
    stride: *const i64,
    out_any: *mut NNAnyModule,
) -> NNModule {
    guard("nnb_avgpool1d_ctor", ptr::null_mut(), || unsafe {
        let options = avg_pool_options::<1>(kernel, 1, stride, 1)?;
        let module = build(options, AvgPool1d::new)?;
        Ok(create_module(module, out_any))
    })
}

/// # Safety
///
/// Each array pointer must be null or valid for its length; `out_any` null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nnb_avgpool2d_ctor(
    kernel: *const i64,
    kernel_len: c_int,
    stride: *const i64,
    stride_len: c_int,
    out_any: *mut NNAnyModule,
) -> NNModule {
    guard("nnb_avgpool2d_ctor", ptr::null_mut(), || unsafe {
        let options = avg_pool_options::<2>(kernel, kernel_len, stride, stride_len)?;
        let module = build(options, AvgPool2d::new)?;
        Ok(create_module(module, out_any))
    })
}

/// # Safety
///
/// Each array pointer must be null or valid for its length; `out_any` null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nnb_avgpool3d_ctor(
    kernel: *const i64,
    kernel_len: c_int,
    stride: *const i64,
    stride_len: c_int,
    out_any: *mut NNAnyModule,
) -> NNModule {
    guard("nnb_avgpool3d_ctor", ptr::null_mut(), || unsafe {
        let options = avg_pool_options::<3>(kernel, kernel_len, stride, stride_len)?;
        let module = build(options, AvgPool3d::new)?;
        Ok(create_module(module, out_any))
    })
}

export_forward!(nnb_avgpool1d_forward, AvgPool1d, "AvgPool1d");
export_forward!(nnb_avgpool2d_forward, AvgPool2d, "AvgPool2d");
export_forward!(nnb_avgpool3d_forward, AvgPool3d, "AvgPool3d");

/// # Safety
///
/// `output_size` must be valid for `output_size_len` reads; `out_any` null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nnb_adaptive_avgpool1d_ctor(
    output_size: *const i64,
    output_size_len: c_int,
    out_any: *mut NNAnyModule,
) -> NNModule {
    guard("nnb_adaptive_avgpool1d_ctor", ptr::null_mut(), || unsafe {
        let options = adaptive_options::<1>(output_size, output_size_len)?;
        let module = build(options, AdaptiveAvgPool1d::new)?;
        Ok(create_module(module, out_any))
    })
}

/// # Safety
///
/// `output_size` must be valid for `output_size_len` reads; `out_any` null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nnb_adaptive_avgpool2d_ctor(
    output_size: *const i64,
    output_size_len: c_int,
    out_any: *mut NNAnyModule,
) -> NNModule {
    guard("nnb_adaptive_avgpool2d_ctor", ptr::null_mut(), || unsafe {
        let options = adaptive_options::<2>(output_size, output_size_len)?;
        let module = build(options, AdaptiveAvgPool2d::new)?;
        Ok(create_module(module, out_any))
    })
}

/// # Safety
///
/// `output_size` must be valid for `output_size_len` reads; `out_any` null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nnb_adaptive_avgpool3d_ctor(
    output_size: *const i64,
    output_size_len: c_int,
    out_any: *mut NNAnyModule,
) -> NNModule {
    guard("nnb_adaptive_avgpool3d_ctor", ptr::null_mut(), || unsafe {
        let options = adaptive_options::<3>(output_size, output_size_len)?;
        let module = build(options, AdaptiveAvgPool3d::new)?;
        Ok(create_module(module, out_any))
    })
}

export_forward!(nnb_adaptive_avgpool1d_forward, AdaptiveAvgPool1d, "AdaptiveAvgPool1d");
export_forward!(nnb_adaptive_avgpool2d_forward, AdaptiveAvgPool2d, "AdaptiveAvgPool2d");
export_forward!(nnb_adaptive_avgpool3d_forward, AdaptiveAvgPool3d, "AdaptiveAvgPool3d");

/// # Safety
///
/// `output_size` must be valid for `output_size_len` reads; `out_any` null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nnb_adaptive_maxpool1d_ctor(
    output_size: *const i64,
    output_size_len: c_int,
    out_any: *mut NNAnyModule,
) -> NNModule {
    guard("nnb_adaptive_maxpool1d_ctor", ptr::null_mut(), || unsafe {
        let options = adaptive_options::<1>(output_size, output_size_len)?;
        let module = build(options, AdaptiveMaxPool1d::new)?;
        Ok(create_module(module, out_any))
    })
}

/// # Safety
///
/// `output_size` must be valid for `output_size_len` reads; `out_any` null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nnb_adaptive_maxpool2d_ctor(
    output_size: *const i64,
    output_size_len: c_int,
    out_any: *mut NNAnyModule,
) -> NNModule {
    guard("nnb_adaptive_maxpool2d_ctor", ptr::null_mut(), || unsafe {
        let options = adaptive_options::<2>(output_size, output_size_len)?;
        let module = build(options, AdaptiveMaxPool2d::new)?;
        Ok(create_module(module, out_any))
    })
}

/// # Safety
///
/// `output_size` must be valid for `output_size_len` reads; `out_any` null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nnb_adaptive_maxpool3d_ctor(
    output_size: *const i64,
    output_size_len: c_int,
    out_any: *mut NNAnyModule,
) -> NNModule {
    guard("nnb_adaptive_maxpool3d_ctor", ptr::null_mut(), || unsafe {
        let options = adaptive_options::<3>(output_size, output_size_len)?;
        let module = build(options, AdaptiveMaxPool3d::new)?;
        Ok(create_module(module, out_any))
    })
}

export_forward!(nnb_adaptive_maxpool1d_forward, AdaptiveMaxPool1d, "AdaptiveMaxPool1d");
export_forward!(nnb_adaptive_maxpool2d_forward, AdaptiveMaxPool2d, "AdaptiveMaxPool2d");
export_forward!(nnb_adaptive_maxpool3d_forward, AdaptiveMaxPool3d, "AdaptiveMaxPool3d");
export_forward_with_indices!(
    nnb_adaptive_maxpool1d_forward_with_indices,
    AdaptiveMaxPool1d,
    "AdaptiveMaxPool1d"
);
export_forward_with_indices!(
    nnb_adaptive_maxpool2d_forward_with_indices,
    AdaptiveMaxPool2d,
    "AdaptiveMaxPool2d"
);
export_forward_with_indices!(
    nnb_adaptive_maxpool3d_forward_with_indices,
    AdaptiveMaxPool3d,
    "AdaptiveMaxPool3d"
);

/// # Safety
///
/// `kernel` must be valid for one read; the optional pointers null or valid for one read;
/// `out_any` null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nnb_maxpool1d_ctor(
    kernel: *const i64,
    stride: *const i64,
    padding: *const i64,
    dilation: *const i64,
    ceil_mode: bool,
    out_any: *mut NNAnyModule,
) -> NNModule {
    guard("nnb_maxpool1d_ctor", ptr::null_mut(), || unsafe {
        let options =
            max_pool_options::<1>(kernel, 1, stride, 1, padding, 1, dilation, 1, ceil_mode)?;
        let module = build(options, MaxPool1d::new)?;
        Ok(create_module(module, out_any))
    })
}

/// # Safety
///
/// Each array pointer must be null or valid for its length; `out_any` null or writable.
#[unsafe(no_mangle)]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn nnb_maxpool2d_ctor(
    kernel: *const i64,
    kernel_len: c_int,
    stride: *const i64,
    stride_len: c_int,
    padding: *const i64,
    padding_len: c_int,
    dilation: *const i64,
    dilation_len: c_int,
    ceil_mode: bool,
    out_any: *mut NNAnyModule,
) -> NNModule {
    guard("nnb_maxpool2d_ctor", ptr::null_mut(), || unsafe {
        let options = max_pool_options::<2>(
            kernel,
            kernel_len,
            stride,
            stride_len,
            padding,
            padding_len,
            dilation,
            dilation_len,
            ceil_mode,
        )?;
        let module = build(options, MaxPool2d::new)?;
        Ok(create_module(module, out_any))
    })
}

/// # Safety
///
/// Each array pointer must be null or valid for its length; `out_any` null or writable.
#[unsafe(no_mangle)]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn nnb_maxpool3d_ctor(
    kernel: *const i64,
    kernel_len: c_int,
    stride: *const i64,
    stride_len: c_int,
    padding: *const i64,
    padding_len: c_int,
    dilation: *const i64,
    dilation_len: c_int,
    ceil_mode: bool,
    out_any: *mut NNAnyModule,
) -> NNModule {
    guard("nnb_maxpool3d_ctor", ptr::null_mut(), || unsafe {
        let options = max_pool_options::<3>(
            kernel,
            kernel_len,
            stride,
            stride_len,
            padding,
            padding_len,
            dilation,
            dilation_len,
            ceil_mode,
        )?;
        let module = build(options, MaxPool3d::new)?;
        Ok(create_module(module, out_any))
    })
}

export_forward!(nnb_maxpool1d_forward, MaxPool1d, "MaxPool1d");
export_forward!(nnb_maxpool2d_forward, MaxPool2d, "MaxPool2d");
export_forward!(nnb_maxpool3d_forward, MaxPool3d, "MaxPool3d");
export_forward_with_indices!(nnb_maxpool1d_forward_with_indices, MaxPool1d, "MaxPool1d");
export_forward_with_indices!(nnb_maxpool2d_forward_with_indices, MaxPool2d, "MaxPool2d");
export_forward_with_indices!(nnb_maxpool3d_forward_with_indices, MaxPool3d, "MaxPool3d");
