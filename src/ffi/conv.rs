//! Convolution and transposed-convolution exports.
//!
//! Padding keeps its wire sentinels: `-1` selects "same" for every variant, and `0` selects
//! "valid" for the 2D/3D variants. The padding mode is a separate integer
//! (`0` zeros, `1` reflect, `2` replicate, `3` circular); unknown codes keep zeros.

use super::error::guard;
use super::{FfiResult, NNAnyModule, NNModule, axes, build, create_module, to_usize};
use crate::nn::{
    Conv1d, Conv2d, Conv3d, ConvOptions, ConvTranspose1d, ConvTranspose2d, ConvTranspose3d,
    ConvTransposeOptions, Padding, PaddingMode,
};
use std::ptr;

pub const PADDING_SAME: i64 = -1;
pub const PADDING_VALID: i64 = 0;

fn padding_mode(code: i64) -> PaddingMode {
    match code {
        1 => PaddingMode::Reflect,
        2 => PaddingMode::Replicate,
        3 => PaddingMode::Circular,
        _ => PaddingMode::Zeros,
    }
}

/// Decodes conv padding. Only the first axis is checked for sentinels; `valid_sentinel` is
/// false for the 1D variant, where `0` is plain zero padding.
fn conv_padding<const D: usize>(values: [i64; D], valid_sentinel: bool) -> FfiResult<Padding<D>> {
    match values.first().copied() {
        Some(PADDING_SAME) => Ok(Padding::Same),
        Some(PADDING_VALID) if valid_sentinel => Ok(Padding::Valid),
        _ => Ok(Padding::Explicit(axes("padding", values)?)),
    }
}

/// Flat conv arguments, before decoding.
struct ConvArgs<const D: usize> {
    in_channels: i64,
    out_channels: i64,
    kernel: [i64; D],
    stride: [i64; D],
    padding: [i64; D],
    dilation: [i64; D],
    padding_mode: i64,
    groups: i64,
    bias: bool,
}

impl<const D: usize> ConvArgs<D> {
    fn into_options(self) -> FfiResult<ConvOptions<D>> {
        let padding = conv_padding(self.padding, D > 1)?;
        Ok(ConvOptions::new(
            to_usize("in_channels", self.in_channels)?,
            to_usize("out_channels", self.out_channels)?,
            axes("kernel_size", self.kernel)?,
        )
        .stride(axes("stride", self.stride)?)
        .padding(padding)
        .dilation(axes("dilation", self.dilation)?)
        .groups(to_usize("groups", self.groups)?)
        .bias(self.bias)
        .padding_mode(padding_mode(self.padding_mode)))
    }
}

/// Flat conv-transpose arguments; every size is one scalar broadcast to all axes.
struct ConvTransposeArgs {
    in_channels: i64,
    out_channels: i64,
    kernel: i64,
    stride: i64,
    padding: i64,
    output_padding: i64,
    dilation: i64,
    padding_mode: i64,
    groups: i64,
    bias: bool,
}

impl ConvTransposeArgs {
    fn into_options<const D: usize>(self) -> FfiResult<ConvTransposeOptions<D>> {
        Ok(ConvTransposeOptions::new(
            to_usize("in_channels", self.in_channels)?,
            to_usize("out_channels", self.out_channels)?,
            [to_usize("kernel_size", self.kernel)?; D],
        )
        .stride([to_usize("stride", self.stride)?; D])
        .padding([to_usize("padding", self.padding)?; D])
        .output_padding([to_usize("output_padding", self.output_padding)?; D])
        .dilation([to_usize("dilation", self.dilation)?; D])
        .groups(to_usize("groups", self.groups)?)
        .bias(self.bias)
        .padding_mode(padding_mode(self.padding_mode)))
    }
}

/// # Safety
///
/// `out_any` must be null or valid for one write.
#[unsafe(no_mangle)]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn nnb_conv1d_ctor(
    in_channels: i64,
    out_channels: i64,
    kernel: i64,
    stride: i64,
    padding: i64,
    dilation: i64,
    padding_mode: i64,
    groups: i64,
    bias: bool,
    out_any: *mut NNAnyModule,
) -> NNModule {
    guard("nnb_conv1d_ctor", ptr::null_mut(), || unsafe {
        let args = ConvArgs {
            in_channels,
            out_channels,
            kernel: [kernel],
            stride: [stride],
            padding: [padding],
            dilation: [dilation],
            padding_mode,
            groups,
            bias,
        };
        let module = build(args.into_options()?, Conv1d::new)?;
        Ok(create_module(module, out_any))
    })
}

/// # Safety
///
/// `out_any` must be null or valid for one write.
#[unsafe(no_mangle)]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn nnb_conv2d_ctor(
    in_channels: i64,
    out_channels: i64,
    kernel: i64,
    stride: i64,
    padding: i64,
    dilation: i64,
    padding_mode: i64,
    groups: i64,
    bias: bool,
    out_any: *mut NNAnyModule,
) -> NNModule {
    guard("nnb_conv2d_ctor", ptr::null_mut(), || unsafe {
        let args = ConvArgs {
            in_channels,
            out_channels,
            kernel: [kernel; 2],
            stride: [stride; 2],
            padding: [padding; 2],
            dilation: [dilation; 2],
            padding_mode,
            groups,
            bias,
        };
        let module = build(args.into_options()?, Conv2d::new)?;
        Ok(create_module(module, out_any))
    })
}

/// Per-axis form of [`nnb_conv2d_ctor`]. Sentinels are read from `padding_x` only.
///
/// # Safety
///
/// `out_any` must be null or valid for one write.
#[unsafe(no_mangle)]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn nnb_conv2d_ctor_per_axis(
    in_channels: i64,
    out_channels: i64,
    kernel_x: i64,
    kernel_y: i64,
    stride_x: i64,
    stride_y: i64,
    padding_x: i64,
    padding_y: i64,
    dilation_x: i64,
    dilation_y: i64,
    padding_mode: i64,
    groups: i64,
    bias: bool,
    out_any: *mut NNAnyModule,
) -> NNModule {
    guard("nnb_conv2d_ctor_per_axis", ptr::null_mut(), || unsafe {
        let args = ConvArgs {
            in_channels,
            out_channels,
            kernel: [kernel_x, kernel_y],
            stride: [stride_x, stride_y],
            padding: [padding_x, padding_y],
            dilation: [dilation_x, dilation_y],
            padding_mode,
            groups,
            bias,
        };
        let module = build(args.into_options()?, Conv2d::new)?;
        Ok(create_module(module, out_any))
    })
}

/// # Safety
///
/// `out_any` must be null or valid for one write.
#[unsafe(no_mangle)]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn nnb_conv3d_ctor(
    in_channels: i64,
    out_channels: i64,
    kernel: i64,
    stride: i64,
    padding: i64,
    dilation: i64,
    padding_mode: i64,
    groups: i64,
    bias: bool,
    out_any: *mut NNAnyModule,
) -> NNModule {
    guard("nnb_conv3d_ctor", ptr::null_mut(), || unsafe {
        let args = ConvArgs {
            in_channels,
            out_channels,
            kernel: [kernel; 3],
            stride: [stride; 3],
            padding: [padding; 3],
            dilation: [dilation; 3],
            padding_mode,
            groups,
            bias,
        };
        let module = build(args.into_options()?, Conv3d::new)?;
        Ok(create_module(module, out_any))
    })
}

/// Per-axis form of [`nnb_conv3d_ctor`]. Sentinels are read from `padding_x` only.
///
/// # Safety
///
/// `out_any` must be null or valid for one write.
#[unsafe(no_mangle)]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn nnb_conv3d_ctor_per_axis(
    in_channels: i64,
    out_channels: i64,
    kernel_x: i64,
    kernel_y: i64,
    kernel_z: i64,
    stride_x: i64,
    stride_y: i64,
    stride_z: i64,
    padding_x: i64,
    padding_y: i64,
    padding_z: i64,
    dilation_x: i64,
    dilation_y: i64,
    dilation_z: i64,
    padding_mode: i64,
    groups: i64,
    bias: bool,
    out_any: *mut NNAnyModule,
) -> NNModule {
    guard("nnb_conv3d_ctor_per_axis", ptr::null_mut(), || unsafe {
        let args = ConvArgs {
            in_channels,
            out_channels,
            kernel: [kernel_x, kernel_y, kernel_z],
            stride: [stride_x, stride_y, stride_z],
            padding: [padding_x, padding_y, padding_z],
            dilation: [dilation_x, dilation_y, dilation_z],
            padding_mode,
            groups,
            bias,
        };
        let module = build(args.into_options()?, Conv3d::new)?;
        Ok(create_module(module, out_any))
    })
}

export_forward!(nnb_conv1d_forward, Conv1d, "Conv1d");
export_forward!(nnb_conv2d_forward, Conv2d, "Conv2d");
export_forward!(nnb_conv3d_forward, Conv3d, "Conv3d");
export_parameters!(
    Conv1d,
    "Conv1d",
    nnb_conv1d_weight,
    nnb_conv1d_set_weight,
    nnb_conv1d_bias,
    nnb_conv1d_set_bias
);
export_parameters!(
    Conv2d,
    "Conv2d",
    nnb_conv2d_weight,
    nnb_conv2d_set_weight,
    nnb_conv2d_bias,
    nnb_conv2d_set_bias
);
export_parameters!(
    Conv3d,
    "Conv3d",
    nnb_conv3d_weight,
    nnb_conv3d_set_weight,
    nnb_conv3d_bias,
    nnb_conv3d_set_bias
);

/// Generates a conv-transpose constructor for `$dims` spatial dims.
macro_rules! export_conv_transpose_ctor {
    ($fn_name:ident, $module:ty, $dims:literal) => {
        /// Padding is numeric here; `-1` is not a sentinel and is rejected as negative.
        ///
        /// # Safety
        ///
        /// `out_any` must be null or valid for one write.
        #[unsafe(no_mangle)]
        #[allow(clippy::too_many_arguments)]
        pub unsafe extern "C" fn $fn_name(
            in_channels: i64,
            out_channels: i64,
            kernel: i64,
            stride: i64,
            padding: i64,
            output_padding: i64,
            dilation: i64,
            padding_mode: i64,
            groups: i64,
            bias: bool,
            out_any: *mut NNAnyModule,
        ) -> NNModule {
            guard(stringify!($fn_name), ptr::null_mut(), || unsafe {
                let args = ConvTransposeArgs {
                    in_channels,
                    out_channels,
                    kernel,
                    stride,
                    padding,
                    output_padding,
                    dilation,
                    padding_mode,
                    groups,
                    bias,
                };
                let module = build(args.into_options::<$dims>()?, <$module>::new)?;
                Ok(create_module(module, out_any))
            })
        }
    };
}

export_conv_transpose_ctor!(nnb_conv_transpose1d_ctor, ConvTranspose1d, 1);
export_conv_transpose_ctor!(nnb_conv_transpose2d_ctor, ConvTranspose2d, 2);
export_conv_transpose_ctor!(nnb_conv_transpose3d_ctor, ConvTranspose3d, 3);

export_forward!(nnb_conv_transpose1d_forward, ConvTranspose1d, "ConvTranspose1d");
export_forward!(nnb_conv_transpose2d_forward, ConvTranspose2d, "ConvTranspose2d");
export_forward!(nnb_conv_transpose3d_forward, ConvTranspose3d, "ConvTranspose3d");
export_parameters!(
    ConvTranspose1d,
    "ConvTranspose1d",
    nnb_conv_transpose1d_weight,
    nnb_conv_transpose1d_set_weight,
    nnb_conv_transpose1d_bias,
    nnb_conv_transpose1d_set_bias
);
export_parameters!(
    ConvTranspose2d,
    "ConvTranspose2d",
    nnb_conv_transpose2d_weight,
    nnb_conv_transpose2d_set_weight,
    nnb_conv_transpose2d_bias,
    nnb_conv_transpose2d_set_bias
);
export_parameters!(
    ConvTranspose3d,
    "ConvTranspose3d",
    nnb_conv_transpose3d_weight,
    nnb_conv_transpose3d_set_weight,
    nnb_conv_transpose3d_bias,
    nnb_conv_transpose3d_set_bias
);
