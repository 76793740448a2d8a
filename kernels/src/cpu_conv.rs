use crate::{
    KernelElem, KernelError, Result, check_arity, check_positive, checked_numel, try_filled,
    unravel,
};
use rayon::prelude::*;

/// Geometry of an N-dimensional convolution.
///
/// `padding` is `(before, after)` zero padding per spatial axis, so asymmetric
/// "same" padding for even kernels can be expressed directly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConvGeometry {
    pub stride: Vec<usize>,
    pub padding: Vec<(usize, usize)>,
    pub dilation: Vec<usize>,
    pub groups: usize,
}

/// Geometry of an N-dimensional transposed convolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConvTransposeGeometry {
    pub stride: Vec<usize>,
    pub padding: Vec<usize>,
    pub output_padding: Vec<usize>,
    pub dilation: Vec<usize>,
    pub groups: usize,
}

fn too_large(axis: usize) -> KernelError {
    KernelError::InvalidArgument(format!("convolution geometry on axis {axis} is too large"))
}

struct Channels {
    batch: usize,
    in_channels: usize,
    in_dims: Vec<usize>,
    k_dims: Vec<usize>,
}

fn check_shapes(
    input_shape: &[usize],
    weight_shape: &[usize],
    spatial: usize,
) -> Result<Channels> {
    if input_shape.len() != spatial + 2 {
        return Err(KernelError::ShapeMismatch {
            expected: vec![spatial + 2],
            got: vec![input_shape.len()],
        });
    }
    if weight_shape.len() != spatial + 2 {
        return Err(KernelError::ShapeMismatch {
            expected: vec![spatial + 2],
            got: vec![weight_shape.len()],
        });
    }
    Ok(Channels {
        batch: input_shape[0],
        in_channels: input_shape[1],
        in_dims: input_shape[2..].to_vec(),
        k_dims: weight_shape[2..].to_vec(),
    })
}

/// Performs N-dimensional convolution on CPU.
///
/// # Arguments
///
/// * `input` - Input tensor data (flattened). Shape: `[batch, in_channels, *spatial]`
/// * `input_shape` - Shape of the input tensor.
/// * `weight` - Weight tensor data (flattened). Shape: `[out_channels, in_channels / groups, *kernel]`
/// * `weight_shape` - Shape of the weight tensor.
/// * `bias` - Optional bias of length `out_channels`.
/// * `geometry` - Stride, zero padding, dilation and groups.
///
/// # Returns
///
/// The output data and its shape `[batch, out_channels, *out_spatial]`.
pub fn cpu_conv_nd<T: KernelElem>(
    input: &[T],
    input_shape: &[usize],
    weight: &[T],
    weight_shape: &[usize],
    bias: Option<&[T]>,
    geometry: &ConvGeometry,
) -> Result<(Vec<T>, Vec<usize>)> {
    let spatial = geometry.stride.len();
    if geometry.padding.len() != spatial {
        return Err(KernelError::InvalidArgument(format!(
            "padding expects {spatial} values, got {}",
            geometry.padding.len()
        )));
    }
    check_arity("dilation", &geometry.dilation, spatial)?;
    check_positive("stride", &geometry.stride)?;
    check_positive("dilation", &geometry.dilation)?;
    if geometry.groups == 0 {
        return Err(KernelError::InvalidArgument("groups must be positive".into()));
    }

    let Channels {
        batch,
        in_channels,
        in_dims,
        k_dims,
    } = check_shapes(input_shape, weight_shape, spatial)?;

    let out_channels = weight_shape[0];
    let in_per_group = weight_shape[1];
    let groups = geometry.groups;

    if in_per_group * groups != in_channels {
        return Err(KernelError::ShapeMismatch {
            expected: vec![in_per_group * groups],
            got: vec![in_channels],
        });
    }
    if out_channels % groups != 0 {
        return Err(KernelError::InvalidArgument(format!(
            "out_channels {out_channels} is not divisible by groups {groups}"
        )));
    }
    if let Some(b) = bias {
        if b.len() != out_channels {
            return Err(KernelError::ShapeMismatch {
                expected: vec![out_channels],
                got: vec![b.len()],
            });
        }
    }

    // out = floor((in + pad_before + pad_after - dilation * (k - 1) - 1) / stride) + 1
    let mut out_dims = Vec::with_capacity(spatial);
    for axis in 0..spatial {
        let (pb, pa) = geometry.padding[axis];
        let effective_k = geometry.dilation[axis]
            .checked_mul(k_dims[axis].max(1) - 1)
            .and_then(|v| v.checked_add(1))
            .ok_or_else(|| too_large(axis))?;
        let padded = in_dims[axis]
            .checked_add(pb)
            .and_then(|v| v.checked_add(pa))
            .ok_or_else(|| too_large(axis))?;
        if padded < effective_k {
            return Err(KernelError::ShapeMismatch {
                expected: vec![effective_k],
                got: vec![padded],
            });
        }
        out_dims.push((padded - effective_k) / geometry.stride[axis] + 1);
    }

    let in_plane: usize = in_dims.iter().product();
    let k_plane: usize = k_dims.iter().product();
    let out_plane = checked_numel(&out_dims)?;
    let out_per_group = out_channels / groups;

    let mut output = try_filled(checked_numel(&[batch, out_channels, out_plane])?, T::zero())?;
    if output.is_empty() {
        let mut shape = vec![batch, out_channels];
        shape.extend_from_slice(&out_dims);
        return Ok((output, shape));
    }

    // Parallelize over Batch and Out Channels
    output
        .par_chunks_mut(out_channels * out_plane)
        .enumerate()
        .for_each(|(b, batch_out)| {
            batch_out
                .par_chunks_mut(out_plane)
                .enumerate()
                .for_each(|(oc, channel_out)| {
                    let group = oc / out_per_group;
                    let w_base = oc * in_per_group * k_plane;
                    let init = bias.map_or(T::zero(), |b| b[oc]);

                    let mut o_idx = vec![0usize; spatial];
                    let mut k_idx = vec![0usize; spatial];

                    for (o, slot) in channel_out.iter_mut().enumerate() {
                        unravel(o, &out_dims, &mut o_idx);
                        let mut sum = init;

                        for icl in 0..in_per_group {
                            let ic = group * in_per_group + icl;
                            let in_base = (b * in_channels + ic) * in_plane;
                            let w_ic = w_base + icl * k_plane;

                            'kernel: for k in 0..k_plane {
                                unravel(k, &k_dims, &mut k_idx);
                                let mut flat = 0usize;
                                for axis in 0..spatial {
                                    let pos = (o_idx[axis] * geometry.stride[axis]
                                        + k_idx[axis] * geometry.dilation[axis])
                                        as isize
                                        - geometry.padding[axis].0 as isize;
                                    if pos < 0 || pos >= in_dims[axis] as isize {
                                        continue 'kernel;
                                    }
                                    flat = flat * in_dims[axis] + pos as usize;
                                }
                                sum += input[in_base + flat] * weight[w_ic + k];
                            }
                        }

                        *slot = sum;
                    }
                });
        });

    let mut shape = vec![batch, out_channels];
    shape.extend_from_slice(&out_dims);
    Ok((output, shape))
}

/// Performs N-dimensional transposed convolution on CPU.
///
/// The weight layout is `[in_channels, out_channels / groups, *kernel]`. Output extent per axis is
/// `(in - 1) * stride - 2 * padding + dilation * (k - 1) + output_padding + 1`.
pub fn cpu_conv_transpose_nd<T: KernelElem>(
    input: &[T],
    input_shape: &[usize],
    weight: &[T],
    weight_shape: &[usize],
    bias: Option<&[T]>,
    geometry: &ConvTransposeGeometry,
) -> Result<(Vec<T>, Vec<usize>)> {
    let spatial = geometry.stride.len();
    check_arity("padding", &geometry.padding, spatial)?;
    check_arity("output_padding", &geometry.output_padding, spatial)?;
    check_arity("dilation", &geometry.dilation, spatial)?;
    check_positive("stride", &geometry.stride)?;
    check_positive("dilation", &geometry.dilation)?;
    if geometry.groups == 0 {
        return Err(KernelError::InvalidArgument("groups must be positive".into()));
    }

    let Channels {
        batch,
        in_channels,
        in_dims,
        k_dims,
    } = check_shapes(input_shape, weight_shape, spatial)?;

    let groups = geometry.groups;
    if weight_shape[0] != in_channels {
        return Err(KernelError::ShapeMismatch {
            expected: vec![weight_shape[0]],
            got: vec![in_channels],
        });
    }
    if in_channels % groups != 0 {
        return Err(KernelError::InvalidArgument(format!(
            "in_channels {in_channels} is not divisible by groups {groups}"
        )));
    }
    let out_per_group = weight_shape[1];
    let out_channels = out_per_group * groups;
    let in_per_group = in_channels / groups;

    if let Some(b) = bias {
        if b.len() != out_channels {
            return Err(KernelError::ShapeMismatch {
                expected: vec![out_channels],
                got: vec![b.len()],
            });
        }
    }

    let mut out_dims = Vec::with_capacity(spatial);
    for axis in 0..spatial {
        let stride = geometry.stride[axis];
        let dilation = geometry.dilation[axis];
        let output_padding = geometry.output_padding[axis];
        if output_padding >= stride && output_padding >= dilation {
            return Err(KernelError::InvalidArgument(format!(
                "output padding must be smaller than either stride or dilation, got output_padding={output_padding}, stride={stride}, dilation={dilation}"
            )));
        }
        // (in - 1) * stride + dilation * (k - 1) + output_padding + 1, before cropping.
        let full = in_dims[axis]
            .saturating_sub(1)
            .checked_mul(stride)
            .and_then(|v| v.checked_add(dilation.checked_mul(k_dims[axis].max(1) - 1)?))
            .and_then(|v| v.checked_add(output_padding + 1))
            .ok_or_else(|| too_large(axis))?;
        let crop = geometry.padding[axis]
            .checked_mul(2)
            .ok_or_else(|| too_large(axis))?;
        if in_dims[axis] == 0 || full <= crop {
            return Err(KernelError::InvalidArgument(format!(
                "transposed convolution output extent is not positive on axis {axis}"
            )));
        }
        out_dims.push(full - crop);
    }

    let in_plane: usize = in_dims.iter().product();
    let k_plane: usize = k_dims.iter().product();
    let out_plane = checked_numel(&out_dims)?;

    let mut output = try_filled(checked_numel(&[batch, out_channels, out_plane])?, T::zero())?;
    if output.is_empty() {
        let mut shape = vec![batch, out_channels];
        shape.extend_from_slice(&out_dims);
        return Ok((output, shape));
    }

    output
        .par_chunks_mut(out_channels * out_plane)
        .enumerate()
        .for_each(|(b, batch_out)| {
            batch_out
                .par_chunks_mut(out_plane)
                .enumerate()
                .for_each(|(oc, channel_out)| {
                    let group = oc / out_per_group;
                    let ocl = oc % out_per_group;
                    let init = bias.map_or(T::zero(), |b| b[oc]);

                    let mut o_idx = vec![0usize; spatial];
                    let mut k_idx = vec![0usize; spatial];

                    for (o, slot) in channel_out.iter_mut().enumerate() {
                        unravel(o, &out_dims, &mut o_idx);
                        let mut sum = init;

                        for icl in 0..in_per_group {
                            let ic = group * in_per_group + icl;
                            let in_base = (b * in_channels + ic) * in_plane;
                            let w_base = (ic * out_per_group + ocl) * k_plane;

                            'kernel: for k in 0..k_plane {
                                unravel(k, &k_dims, &mut k_idx);
                                let mut flat = 0usize;
                                for axis in 0..spatial {
                                    let num = (o_idx[axis] + geometry.padding[axis]) as isize
                                        - (k_idx[axis] * geometry.dilation[axis]) as isize;
                                    let stride = geometry.stride[axis] as isize;
                                    if num < 0 || num % stride != 0 {
                                        continue 'kernel;
                                    }
                                    let pos = (num / stride) as usize;
                                    if pos >= in_dims[axis] {
                                        continue 'kernel;
                                    }
                                    flat = flat * in_dims[axis] + pos;
                                }
                                sum += input[in_base + flat] * weight[w_base + k];
                            }
                        }

                        *slot = sum;
                    }
                });
        });

    let mut shape = vec![batch, out_channels];
    shape.extend_from_slice(&out_dims);
    Ok((output, shape))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry(spatial: usize) -> ConvGeometry {
        ConvGeometry {
            stride: vec![1; spatial],
            padding: vec![(0, 0); spatial],
            dilation: vec![1; spatial],
            groups: 1,
        }
    }

    #[test]
    fn test_conv1d_valid() {
        let input = [1.0f32, 2.0, 3.0, 4.0];
        let weight = [1.0f32, 1.0];
        let (out, shape) =
            cpu_conv_nd(&input, &[1, 1, 4], &weight, &[1, 1, 2], None, &geometry(1)).unwrap();
        assert_eq!(shape, vec![1, 1, 3]);
        assert_eq!(out, vec![3.0, 5.0, 7.0]);
    }

    #[test]
    fn test_conv2d_padding_and_bias() {
        // 2x2 input of ones, 3x3 kernel of ones, padding 1 -> each output sees all four inputs.
        let input = [1.0f32; 4];
        let weight = [1.0f32; 9];
        let mut g = geometry(2);
        g.padding = vec![(1, 1), (1, 1)];
        let (out, shape) =
            cpu_conv_nd(&input, &[1, 1, 2, 2], &weight, &[1, 1, 3, 3], Some(&[0.5]), &g).unwrap();
        assert_eq!(shape, vec![1, 1, 2, 2]);
        assert_eq!(out, vec![4.5; 4]);
    }

    #[test]
    fn test_conv_groups_keep_channels_apart() {
        // Two channels, depthwise: each output channel sees only its own input channel.
        let input = [1.0f32, 1.0, 10.0, 10.0];
        let weight = [1.0f32, 1.0, 2.0, 2.0];
        let mut g = geometry(1);
        g.groups = 2;
        let (out, shape) =
            cpu_conv_nd(&input, &[1, 2, 2], &weight, &[2, 1, 2], None, &g).unwrap();
        assert_eq!(shape, vec![1, 2, 1]);
        assert_eq!(out, vec![2.0, 40.0]);
    }

    #[test]
    fn test_conv_channel_mismatch() {
        let err = cpu_conv_nd(&[0.0f32; 8], &[1, 2, 4], &[0.0; 6], &[2, 3, 1], None, &geometry(1));
        assert!(matches!(err, Err(KernelError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_conv_dilation_and_stride() {
        let input: Vec<f32> = (0..7).map(|v| v as f32).collect();
        let mut g = geometry(1);
        g.dilation = vec![2];
        g.stride = vec![2];
        let (out, shape) =
            cpu_conv_nd(&input, &[1, 1, 7], &[1.0, 1.0], &[1, 1, 2], None, &g).unwrap();
        // Windows start at 0, 2, 4 and read positions (0,2), (2,4), (4,6).
        assert_eq!(shape, vec![1, 1, 3]);
        assert_eq!(out, vec![2.0, 6.0, 10.0]);
    }

    #[test]
    fn test_conv_transpose_1d_stride() {
        let g = ConvTransposeGeometry {
            stride: vec![2],
            padding: vec![0],
            output_padding: vec![0],
            dilation: vec![1],
            groups: 1,
        };
        let (out, shape) = cpu_conv_transpose_nd(
            &[1.0f32, 2.0],
            &[1, 1, 2],
            &[1.0, 1.0, 1.0],
            &[1, 1, 3],
            None,
            &g,
        )
        .unwrap();
        assert_eq!(shape, vec![1, 1, 5]);
        assert_eq!(out, vec![1.0, 1.0, 3.0, 2.0, 2.0]);
    }

    #[test]
    fn test_conv_transpose_output_padding() {
        let g = ConvTransposeGeometry {
            stride: vec![2],
            padding: vec![1],
            output_padding: vec![1],
            dilation: vec![1],
            groups: 1,
        };
        let (_, shape) = cpu_conv_transpose_nd(
            &[0.0f32; 4],
            &[1, 1, 4],
            &[0.0; 3],
            &[1, 1, 3],
            None,
            &g,
        )
        .unwrap();
        // (4 - 1) * 2 - 2 + 2 + 1 + 1
        assert_eq!(shape, vec![1, 1, 8]);
    }

    #[test]
    fn test_conv_transpose_rejects_wide_output_padding() {
        let g = ConvTransposeGeometry {
            stride: vec![1],
            padding: vec![0],
            output_padding: vec![1],
            dilation: vec![1],
            groups: 1,
        };
        let err =
            cpu_conv_transpose_nd(&[0.0f32; 2], &[1, 1, 2], &[0.0; 3], &[1, 1, 3], None, &g);
        assert!(matches!(
            err,
            Err(KernelError::InvalidArgument(msg)) if msg.contains("output padding")
        ));
    }

    #[test]
    fn test_conv_oversized_geometry_is_an_error() {
        let mut g = geometry(1);
        g.padding = vec![(usize::MAX, 1)];
        let err = cpu_conv_nd(&[1.0f32], &[1, 1, 1], &[1.0], &[1, 1, 1], None, &g);
        assert!(matches!(err, Err(KernelError::InvalidArgument(msg)) if msg.contains("too large")));
    }
}
