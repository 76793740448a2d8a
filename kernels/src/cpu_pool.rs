use crate::{
    KernelElem, KernelError, Result, check_arity, check_positive, checked_numel, split_planes,
    try_filled, unravel,
};
use num_traits::Float;
use rayon::prelude::*;

/// Window geometry for max pooling.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaxPoolGeometry {
    pub kernel: Vec<usize>,
    pub stride: Vec<usize>,
    pub padding: Vec<usize>,
    pub dilation: Vec<usize>,
    pub ceil_mode: bool,
}

/// Window geometry for average pooling.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AvgPoolGeometry {
    pub kernel: Vec<usize>,
    pub stride: Vec<usize>,
    pub padding: Vec<usize>,
    pub ceil_mode: bool,
    pub count_include_pad: bool,
}

/// Number of windows along one axis.
///
/// `out = floor_or_ceil((in + 2 * padding - dilation * (k - 1) - 1) / stride) + 1`, where a
/// ceil-mode window that would start entirely inside the right padding is dropped.
pub(crate) fn pooled_extent(
    input: usize,
    kernel: usize,
    stride: usize,
    padding: usize,
    dilation: usize,
    ceil_mode: bool,
) -> Result<usize> {
    if kernel == 0 || stride == 0 || dilation == 0 {
        return Err(KernelError::InvalidArgument(format!(
            "kernel_size, stride and dilation must be positive, got {kernel}, {stride}, {dilation}"
        )));
    }
    let too_large = || KernelError::InvalidArgument("pooling window is too large".into());
    let effective_k = effective_kernel(kernel, dilation).ok_or_else(too_large)?;
    let padded = padding
        .checked_mul(2)
        .and_then(|p| p.checked_add(input))
        .ok_or_else(too_large)?;
    if padded < effective_k {
        return Err(KernelError::ShapeMismatch {
            expected: vec![effective_k],
            got: vec![padded],
        });
    }
    let span = padded - effective_k;
    let mut out = if ceil_mode {
        span.div_ceil(stride) + 1
    } else {
        span / stride + 1
    };
    let last_start = (out - 1).checked_mul(stride);
    if ceil_mode && last_start.is_none_or(|start| start >= input + padding) {
        out -= 1;
    }
    Ok(out)
}

/// `dilation * (kernel - 1) + 1`, or `None` on overflow. `kernel` must be positive.
fn effective_kernel(kernel: usize, dilation: usize) -> Option<usize> {
    dilation.checked_mul(kernel - 1)?.checked_add(1)
}

/// Validates a pooling window: matching arities, positive sizes, and padding of at most half
/// the effective kernel on every axis.
pub fn check_window(
    kernel: &[usize],
    stride: &[usize],
    padding: &[usize],
    dilation: &[usize],
) -> Result<()> {
    let spatial = kernel.len();
    check_arity("stride", stride, spatial)?;
    check_arity("padding", padding, spatial)?;
    check_arity("dilation", dilation, spatial)?;
    check_positive("kernel_size", kernel)?;
    check_positive("stride", stride)?;
    check_positive("dilation", dilation)?;
    for axis in 0..spatial {
        let effective_k = effective_kernel(kernel[axis], dilation[axis]).ok_or_else(|| {
            KernelError::InvalidArgument(format!(
                "kernel_size={} with dilation={} is too large",
                kernel[axis], dilation[axis]
            ))
        })?;
        if padding[axis] > effective_k / 2 {
            return Err(KernelError::InvalidArgument(format!(
                "pad should be at most half of effective kernel size, but got pad={}, kernel_size={} and dilation={}",
                padding[axis], kernel[axis], dilation[axis]
            )));
        }
    }
    Ok(())
}

fn pooled_len(planes: usize, out_plane: usize) -> Result<usize> {
    planes
        .checked_mul(out_plane)
        .ok_or_else(|| KernelError::InvalidArgument("pooled output is too large".into()))
}

fn output_shape(input_shape: &[usize], out_dims: &[usize]) -> Vec<usize> {
    let mut shape = input_shape[..input_shape.len() - out_dims.len()].to_vec();
    shape.extend_from_slice(out_dims);
    shape
}

/// Performs N-dimensional max pooling on CPU.
///
/// Leading dims of `input_shape` are independent planes; the trailing `kernel.len()` dims are pooled.
///
/// # Returns
///
/// `(values, indices, shape)`. Each index is the flat position of the selected element within its
/// input plane. Padding never wins a window.
pub fn cpu_max_pool_nd<T: KernelElem + Float>(
    input: &[T],
    input_shape: &[usize],
    geometry: &MaxPoolGeometry,
) -> Result<(Vec<T>, Vec<i64>, Vec<usize>)> {
    let spatial = geometry.kernel.len();
    check_window(
        &geometry.kernel,
        &geometry.stride,
        &geometry.padding,
        &geometry.dilation,
    )?;
    let (planes, in_dims) = split_planes(input_shape, spatial)?;

    let out_dims = (0..spatial)
        .map(|axis| {
            pooled_extent(
                in_dims[axis],
                geometry.kernel[axis],
                geometry.stride[axis],
                geometry.padding[axis],
                geometry.dilation[axis],
                geometry.ceil_mode,
            )
        })
        .collect::<Result<Vec<_>>>()?;

    let in_plane: usize = in_dims.iter().product();
    let out_plane = checked_numel(&out_dims)?;
    let k_plane = checked_numel(&geometry.kernel)?;
    let total = pooled_len(planes, out_plane)?;

    let mut values = try_filled(total, T::neg_infinity())?;
    let mut indices = try_filled(total, -1i64)?;

    if out_plane > 0 {
        values
            .par_chunks_mut(out_plane)
            .zip(indices.par_chunks_mut(out_plane))
            .enumerate()
            .for_each(|(p, (plane_vals, plane_idx))| {
                let base = p * in_plane;
                let mut o_idx = vec![0usize; spatial];
                let mut k_idx = vec![0usize; spatial];

                for o in 0..out_plane {
                    unravel(o, &out_dims, &mut o_idx);
                    let mut best = T::neg_infinity();
                    let mut best_at = -1i64;

                    'kernel: for k in 0..k_plane {
                        unravel(k, &geometry.kernel, &mut k_idx);
                        let mut flat = 0usize;
                        for axis in 0..spatial {
                            let pos = (o_idx[axis] * geometry.stride[axis]
                                + k_idx[axis] * geometry.dilation[axis])
                                as isize
                                - geometry.padding[axis] as isize;
                            if pos < 0 || pos >= in_dims[axis] as isize {
                                continue 'kernel;
                            }
                            flat = flat * in_dims[axis] + pos as usize;
                        }
                        let val = input[base + flat];
                        // NaN propagates, matching the reference max-pool semantics.
                        if best_at < 0 || val > best || val.is_nan() {
                            best = val;
                            best_at = flat as i64;
                            if val.is_nan() {
                                break;
                            }
                        }
                    }

                    plane_vals[o] = best;
                    plane_idx[o] = best_at;
                }
            });
    }

    Ok((values, indices, output_shape(input_shape, &out_dims)))
}

/// Performs N-dimensional average pooling on CPU.
///
/// With `count_include_pad` the divisor is the window size clipped to the padded input; otherwise it
/// is the number of real input elements under the window.
pub fn cpu_avg_pool_nd<T: KernelElem + Float>(
    input: &[T],
    input_shape: &[usize],
    geometry: &AvgPoolGeometry,
) -> Result<(Vec<T>, Vec<usize>)> {
    let spatial = geometry.kernel.len();
    let dilation = vec![1; spatial];
    check_window(&geometry.kernel, &geometry.stride, &geometry.padding, &dilation)?;
    let (planes, in_dims) = split_planes(input_shape, spatial)?;

    let out_dims = (0..spatial)
        .map(|axis| {
            pooled_extent(
                in_dims[axis],
                geometry.kernel[axis],
                geometry.stride[axis],
                geometry.padding[axis],
                1,
                geometry.ceil_mode,
            )
        })
        .collect::<Result<Vec<_>>>()?;

    let in_plane: usize = in_dims.iter().product();
    let out_plane = checked_numel(&out_dims)?;
    let mut output = try_filled(pooled_len(planes, out_plane)?, T::zero())?;

    if out_plane > 0 {
        output
            .par_chunks_mut(out_plane)
            .enumerate()
            .for_each(|(p, plane_out)| {
                let base = p * in_plane;
                let mut o_idx = vec![0usize; spatial];
                let mut lo = vec![0usize; spatial];
                let mut extent = vec![0usize; spatial];
                let mut w_idx = vec![0usize; spatial];

                for (o, slot) in plane_out.iter_mut().enumerate() {
                    unravel(o, &out_dims, &mut o_idx);
                    let mut pool_size = 1usize;
                    let mut count = 1usize;

                    for axis in 0..spatial {
                        let start = (o_idx[axis] * geometry.stride[axis]) as isize
                            - geometry.padding[axis] as isize;
                        let end = (start + geometry.kernel[axis] as isize)
                            .min((in_dims[axis] + geometry.padding[axis]) as isize);
                        pool_size *= (end - start).max(0) as usize;
                        let start = start.max(0);
                        let end = end.min(in_dims[axis] as isize);
                        let len = (end - start).max(0) as usize;
                        lo[axis] = start as usize;
                        extent[axis] = len;
                        count *= len;
                    }

                    let mut sum = T::zero();
                    for w in 0..count {
                        unravel(w, &extent, &mut w_idx);
                        let mut flat = 0usize;
                        for axis in 0..spatial {
                            flat = flat * in_dims[axis] + lo[axis] + w_idx[axis];
                        }
                        sum += input[base + flat];
                    }

                    let divisor = if geometry.count_include_pad {
                        pool_size
                    } else {
                        count
                    };
                    *slot = if divisor == 0 {
                        T::zero()
                    } else {
                        sum / T::from_usize(divisor).unwrap_or_else(T::one)
                    };
                }
            });
    }

    Ok((output, output_shape(input_shape, &out_dims)))
}

fn adaptive_bounds(out: usize, out_size: usize, in_size: usize) -> (usize, usize) {
    let start = (out * in_size) / out_size;
    let end = ((out + 1) * in_size).div_ceil(out_size);
    (start, end)
}

fn check_output_size(output_size: &[usize]) -> Result<()> {
    check_positive("output_size", output_size)
}

/// Performs N-dimensional adaptive average pooling on CPU.
///
/// Output window `i` along an axis covers `[floor(i * in / out), ceil((i + 1) * in / out))`.
pub fn cpu_adaptive_avg_pool_nd<T: KernelElem + Float>(
    input: &[T],
    input_shape: &[usize],
    output_size: &[usize],
) -> Result<(Vec<T>, Vec<usize>)> {
    check_output_size(output_size)?;
    let spatial = output_size.len();
    let (planes, in_dims) = split_planes(input_shape, spatial)?;
    if in_dims.contains(&0) {
        return Err(KernelError::InvalidArgument(format!(
            "adaptive pooling requires non-empty spatial dims, got {in_dims:?}"
        )));
    }

    let in_plane: usize = in_dims.iter().product();
    let out_plane = checked_numel(output_size)?;
    let mut output = try_filled(pooled_len(planes, out_plane)?, T::zero())?;

    output
        .par_chunks_mut(out_plane)
        .enumerate()
        .for_each(|(p, plane_out)| {
            let base = p * in_plane;
            let mut o_idx = vec![0usize; spatial];
            let mut lo = vec![0usize; spatial];
            let mut extent = vec![0usize; spatial];
            let mut w_idx = vec![0usize; spatial];

            for (o, slot) in plane_out.iter_mut().enumerate() {
                unravel(o, output_size, &mut o_idx);
                let mut count = 1usize;
                for axis in 0..spatial {
                    let (start, end) =
                        adaptive_bounds(o_idx[axis], output_size[axis], in_dims[axis]);
                    lo[axis] = start;
                    extent[axis] = end - start;
                    count *= end - start;
                }

                let mut sum = T::zero();
                for w in 0..count {
                    unravel(w, &extent, &mut w_idx);
                    let mut flat = 0usize;
                    for axis in 0..spatial {
                        flat = flat * in_dims[axis] + lo[axis] + w_idx[axis];
                    }
                    sum += input[base + flat];
                }
                *slot = sum / T::from_usize(count).unwrap_or_else(T::one);
            }
        });

    Ok((output, output_shape(input_shape, output_size)))
}

/// Performs N-dimensional adaptive max pooling on CPU, returning values and flat plane indices.
pub fn cpu_adaptive_max_pool_nd<T: KernelElem + Float>(
    input: &[T],
    input_shape: &[usize],
    output_size: &[usize],
) -> Result<(Vec<T>, Vec<i64>, Vec<usize>)> {
    check_output_size(output_size)?;
    let spatial = output_size.len();
    let (planes, in_dims) = split_planes(input_shape, spatial)?;
    if in_dims.contains(&0) {
        return Err(KernelError::InvalidArgument(format!(
            "adaptive pooling requires non-empty spatial dims, got {in_dims:?}"
        )));
    }

    let in_plane: usize = in_dims.iter().product();
    let out_plane = checked_numel(output_size)?;
    let total = pooled_len(planes, out_plane)?;
    let mut values = try_filled(total, T::neg_infinity())?;
    let mut indices = try_filled(total, -1i64)?;

    values
        .par_chunks_mut(out_plane)
        .zip(indices.par_chunks_mut(out_plane))
        .enumerate()
        .for_each(|(p, (plane_vals, plane_idx))| {
            let base = p * in_plane;
            let mut o_idx = vec![0usize; spatial];
            let mut lo = vec![0usize; spatial];
            let mut extent = vec![0usize; spatial];
            let mut w_idx = vec![0usize; spatial];

            for o in 0..out_plane {
                unravel(o, output_size, &mut o_idx);
                let mut count = 1usize;
                for axis in 0..spatial {
                    let (start, end) =
                        adaptive_bounds(o_idx[axis], output_size[axis], in_dims[axis]);
                    lo[axis] = start;
                    extent[axis] = end - start;
                    count *= end - start;
                }

                let mut best = T::neg_infinity();
                let mut best_at = -1i64;
                for w in 0..count {
                    unravel(w, &extent, &mut w_idx);
                    let mut flat = 0usize;
                    for axis in 0..spatial {
                        flat = flat * in_dims[axis] + lo[axis] + w_idx[axis];
                    }
                    let val = input[base + flat];
                    if best_at < 0 || val > best || val.is_nan() {
                        best = val;
                        best_at = flat as i64;
                        if val.is_nan() {
                            break;
                        }
                    }
                }
                plane_vals[o] = best;
                plane_idx[o] = best_at;
            }
        });

    Ok((values, indices, output_shape(input_shape, output_size)))
}
