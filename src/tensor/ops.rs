//! Tensor operations.
//!
//! Thin, shape-aware wrappers over the `nnbridge-kernels` CPU kernels. The kernels work on flat
//! slices; these methods pick the slices out of a `Tensor`, forward the geometry, and wrap the
//! result back up, mapping `KernelError` into `TensorError` on the way.

use super::{Result, Tensor, TensorElem};
use nnbridge_kernels::{AvgPoolGeometry, MaxPoolGeometry};
use num_traits::Float;

pub use nnbridge_kernels::{ConvGeometry, ConvTransposeGeometry, PadMode};

impl<T: TensorElem> Tensor<T> {
    /// Pads the trailing `pads.len()` dimensions.
    ///
    /// # Arguments
    ///
    /// * `pads` - `(before, after)` per padded axis, in axis order. Negative widths crop.
    /// * `mode` - Boundary fill policy.
    /// * `value` - Fill value used by `PadMode::Constant`.
    pub fn pad(&self, pads: &[(isize, isize)], mode: PadMode, value: T) -> Result<Tensor<T>> {
        let (data, shape) =
            nnbridge_kernels::cpu_pad_nd(self.data(), self.shape(), pads, mode, value)?;
        Ok(Tensor::from_parts(data, shape))
    }
}

impl<T: TensorElem + Float> Tensor<T> {
    /// Performs an N-dimensional convolution with `[batch, channels, *spatial]` input.
    ///
    /// # Arguments
    ///
    /// * `weight` - Weight tensor of shape `[out_channels, in_channels / groups, *kernel]`.
    /// * `bias` - Optional bias of shape `[out_channels]`.
    /// * `geometry` - Stride, `(before, after)` zero padding, dilation and groups.
    pub fn conv(
        &self,
        weight: &Tensor<T>,
        bias: Option<&Tensor<T>>,
        geometry: &ConvGeometry,
    ) -> Result<Tensor<T>> {
        let (data, shape) = nnbridge_kernels::cpu_conv_nd(
            self.data(),
            self.shape(),
            weight.data(),
            weight.shape(),
            bias.map(|b| b.data()),
            geometry,
        )?;
        Ok(Tensor::from_parts(data, shape))
    }

    /// Performs an N-dimensional transposed convolution with `[batch, channels, *spatial]` input.
    ///
    /// The weight is laid out `[in_channels, out_channels / groups, *kernel]`.
    pub fn conv_transpose(
        &self,
        weight: &Tensor<T>,
        bias: Option<&Tensor<T>>,
        geometry: &ConvTransposeGeometry,
    ) -> Result<Tensor<T>> {
        let (data, shape) = nnbridge_kernels::cpu_conv_transpose_nd(
            self.data(),
            self.shape(),
            weight.data(),
            weight.shape(),
            bias.map(|b| b.data()),
            geometry,
        )?;
        Ok(Tensor::from_parts(data, shape))
    }

    /// Performs max pooling over the trailing `kernel.len()` dimensions.
    ///
    /// Returns the pooled values and, for each, the flat index of the winner within its input plane.
    pub fn max_pool(
        &self,
        kernel: &[usize],
        stride: &[usize],
        padding: &[usize],
        dilation: &[usize],
        ceil_mode: bool,
    ) -> Result<(Tensor<T>, Tensor<i64>)> {
        let geometry = MaxPoolGeometry {
            kernel: kernel.to_vec(),
            stride: stride.to_vec(),
            padding: padding.to_vec(),
            dilation: dilation.to_vec(),
            ceil_mode,
        };
        let (values, indices, shape) =
            nnbridge_kernels::cpu_max_pool_nd(self.data(), self.shape(), &geometry)?;
        Ok((
            Tensor::from_parts(values, shape.clone()),
            Tensor::from_parts(indices, shape),
        ))
    }

    /// Performs average pooling over the trailing `kernel.len()` dimensions.
    pub fn avg_pool(
        &self,
        kernel: &[usize],
        stride: &[usize],
        padding: &[usize],
        ceil_mode: bool,
        count_include_pad: bool,
    ) -> Result<Tensor<T>> {
        let geometry = AvgPoolGeometry {
            kernel: kernel.to_vec(),
            stride: stride.to_vec(),
            padding: padding.to_vec(),
            ceil_mode,
            count_include_pad,
        };
        let (data, shape) =
            nnbridge_kernels::cpu_avg_pool_nd(self.data(), self.shape(), &geometry)?;
        Ok(Tensor::from_parts(data, shape))
    }

    /// Performs adaptive average pooling to `output_size` over the trailing dimensions.
    pub fn adaptive_avg_pool(&self, output_size: &[usize]) -> Result<Tensor<T>> {
        let (data, shape) =
            nnbridge_kernels::cpu_adaptive_avg_pool_nd(self.data(), self.shape(), output_size)?;
        Ok(Tensor::from_parts(data, shape))
    }

    /// Performs adaptive max pooling to `output_size`, returning values and plane indices.
    pub fn adaptive_max_pool(&self, output_size: &[usize]) -> Result<(Tensor<T>, Tensor<i64>)> {
        let (values, indices, shape) =
            nnbridge_kernels::cpu_adaptive_max_pool_nd(self.data(), self.shape(), output_size)?;
        Ok((
            Tensor::from_parts(values, shape.clone()),
            Tensor::from_parts(indices, shape),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::TensorError;

    #[test]
    fn test_conv_shapes() {
        let input = Tensor::<f32>::zeros(&[1, 3, 8, 8]).unwrap();
        let weight = Tensor::<f32>::zeros(&[4, 3, 3, 3]).unwrap();
        let geometry = ConvGeometry {
            stride: vec![2, 2],
            padding: vec![(1, 1), (1, 1)],
            dilation: vec![1, 1],
            groups: 1,
        };
        let out = input.conv(&weight, None, &geometry).unwrap();
        assert_eq!(out.shape(), &[1, 4, 4, 4]);
    }

    #[test]
    fn test_conv_kernel_error_maps_to_tensor_error() {
        let input = Tensor::<f32>::zeros(&[1, 2, 8]).unwrap();
        let weight = Tensor::<f32>::zeros(&[4, 3, 3]).unwrap();
        let geometry = ConvGeometry {
            stride: vec![1],
            padding: vec![(0, 0)],
            dilation: vec![1],
            groups: 1,
        };
        let err = input.conv(&weight, None, &geometry).unwrap_err();
        assert_eq!(
            err,
            TensorError::ShapeMismatch {
                expected: vec![3],
                got: vec![2]
            }
        );
    }

    #[test]
    fn test_max_pool_returns_matching_index_tensor() {
        let input = Tensor::new((0..8).map(|v| v as f32).collect(), &[2, 4]).unwrap();
        let (values, indices) = input.max_pool(&[2], &[2], &[0], &[1], false).unwrap();
        assert_eq!(values.shape(), &[2, 2]);
        assert_eq!(indices.shape(), &[2, 2]);
        assert_eq!(values.data(), &[1.0, 3.0, 5.0, 7.0]);
        assert_eq!(indices.data(), &[1, 3, 1, 3]);
    }

    #[test]
    fn test_pad_generic_over_long() {
        let t = Tensor::<i64>::new(vec![1, 2], &[2]).unwrap();
        let padded = t.pad(&[(1, 1)], PadMode::Replicate, 0).unwrap();
        assert_eq!(padded.data(), &[1, 1, 2, 2]);
    }
}
