use crate::{
    KernelElem, KernelError, Result, checked_numel, split_planes, try_filled, unravel,
};
use rayon::prelude::*;

/// Boundary fill policy used when padding extends past the input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PadMode {
    /// Fill with a constant value.
    Constant,
    /// Mirror the input around its edge, excluding the edge element.
    Reflect,
    /// Repeat the edge element.
    Replicate,
    /// Wrap around to the opposite edge.
    Circular,
}

/// Pads the trailing `pads.len()` dimensions of a tensor on CPU.
///
/// # Arguments
///
/// * `input` - Input tensor data (flattened).
/// * `input_shape` - Shape of the input tensor. Leading dims are treated as independent planes.
/// * `pads` - `(before, after)` per padded axis, in axis order. Negative values crop.
/// * `mode` - Boundary fill policy.
/// * `value` - Fill value for `PadMode::Constant`.
///
/// # Returns
///
/// The padded data and its shape.
pub fn cpu_pad_nd<T: KernelElem>(
    input: &[T],
    input_shape: &[usize],
    pads: &[(isize, isize)],
    mode: PadMode,
    value: T,
) -> Result<(Vec<T>, Vec<usize>)> {
    let (planes, in_dims) = split_planes(input_shape, pads.len())?;

    let mut out_dims = Vec::with_capacity(pads.len());
    for (&extent, &(before, after)) in in_dims.iter().zip(pads) {
        let n = isize::try_from(extent).map_err(|_| {
            KernelError::InvalidArgument(format!("axis of size {extent} is too large"))
        })?;
        let out = n
            .checked_add(before)
            .and_then(|v| v.checked_add(after))
            .ok_or_else(|| {
                KernelError::InvalidArgument(format!(
                    "padding ({before}, {after}) is too large for an axis of size {extent}"
                ))
            })?;
        if out <= 0 {
            return Err(KernelError::InvalidArgument(format!(
                "padding ({before}, {after}) leaves no elements of an axis of size {extent}"
            )));
        }
        match mode {
            PadMode::Constant => {}
            PadMode::Reflect => {
                if before >= n || after >= n {
                    return Err(KernelError::InvalidArgument(format!(
                        "reflect padding ({before}, {after}) must be less than the input extent {extent}"
                    )));
                }
            }
            PadMode::Replicate => {
                if n == 0 {
                    return Err(KernelError::InvalidArgument(
                        "replicate padding requires a non-empty axis".into(),
                    ));
                }
            }
            PadMode::Circular => {
                if before > n || after > n {
                    return Err(KernelError::InvalidArgument(format!(
                        "circular padding ({before}, {after}) must not exceed the input extent {extent}"
                    )));
                }
            }
        }
        out_dims.push(out as usize);
    }

    let in_plane: usize = in_dims.iter().product();
    let out_plane = checked_numel(&out_dims)?;
    let total = out_plane.checked_mul(planes).ok_or_else(|| {
        KernelError::InvalidArgument(format!("padded shape {out_dims:?} is too large"))
    })?;
    let mut output = try_filled(total, value)?;

    if out_plane > 0 {
        output
            .par_chunks_mut(out_plane)
            .enumerate()
            .for_each(|(p, plane_out)| {
                let base = p * in_plane;
                let mut idx = vec![0usize; out_dims.len()];
                for (o, slot) in plane_out.iter_mut().enumerate() {
                    unravel(o, &out_dims, &mut idx);
                    let mut flat = 0usize;
                    let mut inside = true;
                    for (axis, &i) in idx.iter().enumerate() {
                        let n = in_dims[axis] as isize;
                        match source_index(i as isize - pads[axis].0, n, mode) {
                            Some(src) => flat = flat * in_dims[axis] + src,
                            None => {
                                inside = false;
                                break;
                            }
                        }
                    }
                    if inside {
                        *slot = input[base + flat];
                    }
                }
            });
    }

    let mut out_shape = input_shape[..input_shape.len() - pads.len()].to_vec();
    out_shape.extend_from_slice(&out_dims);
    Ok((output, out_shape))
}

fn source_index(i: isize, n: isize, mode: PadMode) -> Option<usize> {
    if (0..n).contains(&i) {
        return Some(i as usize);
    }
    let mapped = match mode {
        PadMode::Constant => return None,
        PadMode::Reflect => {
            if i < 0 {
                -i
            } else {
                2 * (n - 1) - i
            }
        }
        PadMode::Replicate => i.clamp(0, n - 1),
        PadMode::Circular => i.rem_euclid(n),
    };
    Some(mapped as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_pad_1d() {
        let (out, shape) =
            cpu_pad_nd(&[1.0f32, 2.0, 3.0], &[1, 3], &[(1, 2)], PadMode::Constant, 9.0).unwrap();
        assert_eq!(shape, vec![1, 6]);
        assert_eq!(out, vec![9.0, 1.0, 2.0, 3.0, 9.0, 9.0]);
    }

    #[test]
    fn test_reflect_replicate_circular_1d() {
        let input = [1.0f32, 2.0, 3.0, 4.0];
        let (out, _) = cpu_pad_nd(&input, &[4], &[(2, 2)], PadMode::Reflect, 0.0).unwrap();
        assert_eq!(out, vec![3.0, 2.0, 1.0, 2.0, 3.0, 4.0, 3.0, 2.0]);

        let (out, _) = cpu_pad_nd(&input, &[4], &[(2, 2)], PadMode::Replicate, 0.0).unwrap();
        assert_eq!(out, vec![1.0, 1.0, 1.0, 2.0, 3.0, 4.0, 4.0, 4.0]);

        let (out, _) = cpu_pad_nd(&input, &[4], &[(2, 2)], PadMode::Circular, 0.0).unwrap();
        assert_eq!(out, vec![3.0, 4.0, 1.0, 2.0, 3.0, 4.0, 1.0, 2.0]);
    }

    #[test]
    fn test_reflect_rejects_wide_padding() {
        let err = cpu_pad_nd(&[1.0f32, 2.0], &[2], &[(2, 0)], PadMode::Reflect, 0.0);
        assert!(matches!(err, Err(KernelError::InvalidArgument(_))));
    }

    #[test]
    fn test_negative_padding_crops() {
        let (out, shape) =
            cpu_pad_nd(&[1.0f32, 2.0, 3.0, 4.0], &[4], &[(-1, -1)], PadMode::Constant, 0.0)
                .unwrap();
        assert_eq!(shape, vec![2]);
        assert_eq!(out, vec![2.0, 3.0]);
    }

    #[test]
    fn test_oversized_padding_is_an_error() {
        let err = cpu_pad_nd(&[1.0f32], &[1, 1], &[(1 << 30, 1 << 30); 2], PadMode::Constant, 0.0);
        assert!(matches!(err, Err(KernelError::InvalidArgument(msg)) if msg.contains("too large")));

        let err = cpu_pad_nd(&[1.0f32], &[1], &[(isize::MAX, 1)], PadMode::Constant, 0.0);
        assert!(matches!(err, Err(KernelError::InvalidArgument(msg)) if msg.contains("too large")));
    }

    #[test]
    fn test_pad_2d_planes_independent() {
        // Two planes of 1x1.
        let (out, shape) =
            cpu_pad_nd(&[1.0f32, 2.0], &[2, 1, 1], &[(1, 1), (0, 0)], PadMode::Replicate, 0.0)
                .unwrap();
        assert_eq!(shape, vec![2, 3, 1]);
        assert_eq!(out, vec![1.0, 1.0, 1.0, 2.0, 2.0, 2.0]);
    }
}
