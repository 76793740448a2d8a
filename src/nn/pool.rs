use super::{Module, WithIndices, check_input_rank, check_positive, dim_name};
use crate::tensor::{Result, Tensor};
use nnbridge_kernels::check_window;
use std::any::Any;

const MAX_POOL_NAMES: [&str; 3] = ["MaxPool1d", "MaxPool2d", "MaxPool3d"];
const AVG_POOL_NAMES: [&str; 3] = ["AvgPool1d", "AvgPool2d", "AvgPool3d"];
const ADAPTIVE_AVG_NAMES: [&str; 3] = [
    "AdaptiveAvgPool1d",
    "AdaptiveAvgPool2d",
    "AdaptiveAvgPool3d",
];
const ADAPTIVE_MAX_NAMES: [&str; 3] = [
    "AdaptiveMaxPool1d",
    "AdaptiveMaxPool2d",
    "AdaptiveMaxPool3d",
];

/// Options for [`MaxPool`]. `stride` defaults to the kernel size.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaxPoolOptions<const D: usize> {
    pub kernel_size: [usize; D],
    pub stride: [usize; D],
    pub padding: [usize; D],
    pub dilation: [usize; D],
    pub ceil_mode: bool,
}

impl<const D: usize> MaxPoolOptions<D> {
    pub fn new(kernel_size: [usize; D]) -> Self {
        Self {
            kernel_size,
            stride: kernel_size,
            padding: [0; D],
            dilation: [1; D],
            ceil_mode: false,
        }
    }

    pub fn stride(mut self, stride: [usize; D]) -> Self {
        self.stride = stride;
        self
    }

    pub fn padding(mut self, padding: [usize; D]) -> Self {
        self.padding = padding;
        self
    }

    pub fn dilation(mut self, dilation: [usize; D]) -> Self {
        self.dilation = dilation;
        self
    }

    pub fn ceil_mode(mut self, ceil_mode: bool) -> Self {
        self.ceil_mode = ceil_mode;
        self
    }
}

/// Max pooling over `D` spatial dims. Padding is treated as negative infinity.
#[derive(Clone, Debug)]
pub struct MaxPool<const D: usize> {
    options: MaxPoolOptions<D>,
}

pub type MaxPool1d = MaxPool<1>;
pub type MaxPool2d = MaxPool<2>;
pub type MaxPool3d = MaxPool<3>;

impl<const D: usize> MaxPool<D> {
    pub fn new(options: MaxPoolOptions<D>) -> Result<Self> {
        check_window(
            &options.kernel_size,
            &options.stride,
            &options.padding,
            &options.dilation,
        )?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &MaxPoolOptions<D> {
        &self.options
    }

    /// Pools `input` and returns the maxima with their flat indices within each input plane.
    pub fn forward_with_indices(&self, input: &Tensor) -> Result<(Tensor, Tensor<i64>)> {
        check_input_rank(self.name(), D, input)?;
        let o = &self.options;
        input.max_pool(&o.kernel_size, &o.stride, &o.padding, &o.dilation, o.ceil_mode)
    }
}

impl<const D: usize> Module for MaxPool<D> {
    fn name(&self) -> &'static str {
        dim_name(&MAX_POOL_NAMES, D)
    }

    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        self.forward_with_indices(input).map(|(values, _)| values)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl<const D: usize> WithIndices for MaxPool<D> {
    fn forward_with_indices(&self, input: &Tensor) -> Result<(Tensor, Tensor<i64>)> {
        MaxPool::forward_with_indices(self, input)
    }
}

/// Options for [`AvgPool`]. `stride` defaults to the kernel size.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AvgPoolOptions<const D: usize> {
    pub kernel_size: [usize; D],
    pub stride: [usize; D],
    pub padding: [usize; D],
    pub ceil_mode: bool,
    pub count_include_pad: bool,
}

impl<const D: usize> AvgPoolOptions<D> {
    pub fn new(kernel_size: [usize; D]) -> Self {
        Self {
            kernel_size,
            stride: kernel_size,
            padding: [0; D],
            ceil_mode: false,
            count_include_pad: true,
        }
    }

    pub fn stride(mut self, stride: [usize; D]) -> Self {
        self.stride = stride;
        self
    }

    pub fn padding(mut self, padding: [usize; D]) -> Self {
        self.padding = padding;
        self
    }

    pub fn ceil_mode(mut self, ceil_mode: bool) -> Self {
        self.ceil_mode = ceil_mode;
        self
    }

    pub fn count_include_pad(mut self, count_include_pad: bool) -> Self {
        self.count_include_pad = count_include_pad;
        self
    }
}

/// Average pooling over `D` spatial dims.
#[derive(Clone, Debug)]
pub struct AvgPool<const D: usize> {
    options: AvgPoolOptions<D>,
}

pub type AvgPool1d = AvgPool<1>;
pub type AvgPool2d = AvgPool<2>;
pub type AvgPool3d = AvgPool<3>;

impl<const D: usize> AvgPool<D> {
    pub fn new(options: AvgPoolOptions<D>) -> Result<Self> {
        check_window(&options.kernel_size, &options.stride, &options.padding, &[1; D])?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &AvgPoolOptions<D> {
        &self.options
    }
}

impl<const D: usize> Module for AvgPool<D> {
    fn name(&self) -> &'static str {
        dim_name(&AVG_POOL_NAMES, D)
    }

    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        check_input_rank(self.name(), D, input)?;
        let o = &self.options;
        input.avg_pool(
            &o.kernel_size,
            &o.stride,
            &o.padding,
            o.ceil_mode,
            o.count_include_pad,
        )
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Options shared by the adaptive pools: the target spatial size.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdaptivePoolOptions<const D: usize> {
    pub output_size: [usize; D],
}

impl<const D: usize> AdaptivePoolOptions<D> {
    pub fn new(output_size: [usize; D]) -> Self {
        Self { output_size }
    }
}

/// Average pooling to a fixed output size regardless of the input size.
#[derive(Clone, Debug)]
pub struct AdaptiveAvgPool<const D: usize> {
    options: AdaptivePoolOptions<D>,
}

pub type AdaptiveAvgPool1d = AdaptiveAvgPool<1>;
pub type AdaptiveAvgPool2d = AdaptiveAvgPool<2>;
pub type AdaptiveAvgPool3d = AdaptiveAvgPool<3>;

impl<const D: usize> AdaptiveAvgPool<D> {
    pub fn new(options: AdaptivePoolOptions<D>) -> Result<Self> {
        check_positive("output_size", &options.output_size)?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &AdaptivePoolOptions<D> {
        &self.options
    }
}

impl<const D: usize> Module for AdaptiveAvgPool<D> {
    fn name(&self) -> &'static str {
        dim_name(&ADAPTIVE_AVG_NAMES, D)
    }

    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        check_input_rank(self.name(), D, input)?;
        input.adaptive_avg_pool(&self.options.output_size)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Max pooling to a fixed output size regardless of the input size.
#[derive(Clone, Debug)]
pub struct AdaptiveMaxPool<const D: usize> {
    options: AdaptivePoolOptions<D>,
}

pub type AdaptiveMaxPool1d = AdaptiveMaxPool<1>;
pub type AdaptiveMaxPool2d = AdaptiveMaxPool<2>;
pub type AdaptiveMaxPool3d = AdaptiveMaxPool<3>;

impl<const D: usize> AdaptiveMaxPool<D> {
    pub fn new(options: AdaptivePoolOptions<D>) -> Result<Self> {
        check_positive("output_size", &options.output_size)?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &AdaptivePoolOptions<D> {
        &self.options
    }

    pub fn forward_with_indices(&self, input: &Tensor) -> Result<(Tensor, Tensor<i64>)> {
        check_input_rank(self.name(), D, input)?;
        input.adaptive_max_pool(&self.options.output_size)
    }
}

impl<const D: usize> Module for AdaptiveMaxPool<D> {
    fn name(&self) -> &'static str {
        dim_name(&ADAPTIVE_MAX_NAMES, D)
    }

    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        self.forward_with_indices(input).map(|(values, _)| values)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl<const D: usize> WithIndices for AdaptiveMaxPool<D> {
    fn forward_with_indices(&self, input: &Tensor) -> Result<(Tensor, Tensor<i64>)> {
        AdaptiveMaxPool::forward_with_indices(self, input)
    }
}
