use super::{Module, Parameterized, check_input_rank, check_positive, dim_name, init};
use crate::tensor::{
    ConvGeometry, ConvTransposeGeometry, PadMode, Result, Tensor, TensorError, numel_of,
};
use std::any::Any;

const CONV_NAMES: [&str; 3] = ["Conv1d", "Conv2d", "Conv3d"];
const CONV_TRANSPOSE_NAMES: [&str; 3] = ["ConvTranspose1d", "ConvTranspose2d", "ConvTranspose3d"];

/// How much implicit padding a convolution adds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Padding<const D: usize> {
    /// Pad so that the output has the input's spatial size (stride 1 only).
    Same,
    /// No padding.
    Valid,
    /// Symmetric padding per spatial axis.
    Explicit([usize; D]),
}

impl<const D: usize> Default for Padding<D> {
    fn default() -> Self {
        Padding::Explicit([0; D])
    }
}

impl<const D: usize> Padding<D> {
    /// Resolves to `(before, after)` widths per axis.
    ///
    /// For `Same`, the total `dilation * (k - 1)` is split with the extra element on the right.
    pub fn resolve(&self, kernel: &[usize; D], dilation: &[usize; D]) -> [(usize, usize); D] {
        let mut pads = [(0, 0); D];
        match self {
            Padding::Valid => {}
            Padding::Explicit(widths) => {
                for (pad, &w) in pads.iter_mut().zip(widths) {
                    *pad = (w, w);
                }
            }
            Padding::Same => {
                for axis in 0..D {
                    let total = dilation[axis] * kernel[axis].saturating_sub(1);
                    let left = total / 2;
                    pads[axis] = (left, total - left);
                }
            }
        }
        pads
    }
}

/// Boundary fill used for a convolution's implicit padding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PaddingMode {
    #[default]
    Zeros,
    Reflect,
    Replicate,
    Circular,
}

impl PaddingMode {
    /// Explicit pre-padding policy, or `None` when the kernel's zero padding suffices.
    fn fill(self) -> Option<PadMode> {
        match self {
            PaddingMode::Zeros => None,
            PaddingMode::Reflect => Some(PadMode::Reflect),
            PaddingMode::Replicate => Some(PadMode::Replicate),
            PaddingMode::Circular => Some(PadMode::Circular),
        }
    }
}

/// Options for [`Conv`].
#[derive(Clone, Debug, PartialEq)]
pub struct ConvOptions<const D: usize> {
    pub in_channels: usize,
    pub out_channels: usize,
    pub kernel_size: [usize; D],
    pub stride: [usize; D],
    pub padding: Padding<D>,
    pub dilation: [usize; D],
    pub groups: usize,
    pub bias: bool,
    pub padding_mode: PaddingMode,
}

impl<const D: usize> ConvOptions<D> {
    pub fn new(in_channels: usize, out_channels: usize, kernel_size: [usize; D]) -> Self {
        Self {
            in_channels,
            out_channels,
            kernel_size,
            stride: [1; D],
            padding: Padding::default(),
            dilation: [1; D],
            groups: 1,
            bias: true,
            padding_mode: PaddingMode::Zeros,
        }
    }

    pub fn stride(mut self, stride: [usize; D]) -> Self {
        self.stride = stride;
        self
    }

    pub fn padding(mut self, padding: Padding<D>) -> Self {
        self.padding = padding;
        self
    }

    pub fn dilation(mut self, dilation: [usize; D]) -> Self {
        self.dilation = dilation;
        self
    }

    pub fn groups(mut self, groups: usize) -> Self {
        self.groups = groups;
        self
    }

    pub fn bias(mut self, bias: bool) -> Self {
        self.bias = bias;
        self
    }

    pub fn padding_mode(mut self, padding_mode: PaddingMode) -> Self {
        self.padding_mode = padding_mode;
        self
    }
}

/// Options for [`ConvTranspose`]. Padding is always numeric.
#[derive(Clone, Debug, PartialEq)]
pub struct ConvTransposeOptions<const D: usize> {
    pub in_channels: usize,
    pub out_channels: usize,
    pub kernel_size: [usize; D],
    pub stride: [usize; D],
    pub padding: [usize; D],
    pub output_padding: [usize; D],
    pub dilation: [usize; D],
    pub groups: usize,
    pub bias: bool,
    pub padding_mode: PaddingMode,
}

impl<const D: usize> ConvTransposeOptions<D> {
    pub fn new(in_channels: usize, out_channels: usize, kernel_size: [usize; D]) -> Self {
        Self {
            in_channels,
            out_channels,
            kernel_size,
            stride: [1; D],
            padding: [0; D],
            output_padding: [0; D],
            dilation: [1; D],
            groups: 1,
            bias: true,
            padding_mode: PaddingMode::Zeros,
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

    pub fn output_padding(mut self, output_padding: [usize; D]) -> Self {
        self.output_padding = output_padding;
        self
    }

    pub fn dilation(mut self, dilation: [usize; D]) -> Self {
        self.dilation = dilation;
        self
    }

    pub fn groups(mut self, groups: usize) -> Self {
        self.groups = groups;
        self
    }

    pub fn bias(mut self, bias: bool) -> Self {
        self.bias = bias;
        self
    }

    pub fn padding_mode(mut self, padding_mode: PaddingMode) -> Self {
        self.padding_mode = padding_mode;
        self
    }
}

fn check_channels(in_channels: usize, out_channels: usize, groups: usize) -> Result<()> {
    if groups == 0 {
        return Err(TensorError::InvalidArgument(
            "groups must be a positive integer".into(),
        ));
    }
    if in_channels == 0 || out_channels == 0 {
        return Err(TensorError::InvalidArgument(format!(
            "channel counts must be positive, got in_channels={in_channels}, out_channels={out_channels}"
        )));
    }
    if in_channels % groups != 0 {
        return Err(TensorError::InvalidArgument(
            "in_channels must be divisible by groups".into(),
        ));
    }
    if out_channels % groups != 0 {
        return Err(TensorError::InvalidArgument(
            "out_channels must be divisible by groups".into(),
        ));
    }
    Ok(())
}

fn check_replacement(name: &str, current: &[usize], replacement: &Tensor) -> Result<()> {
    if replacement.shape() != current {
        return Err(TensorError::InvalidArgument(format!(
            "{name} must have shape {current:?}, got {:?}",
            replacement.shape()
        )));
    }
    Ok(())
}

/// N-dimensional convolution layer.
///
/// Weight shape is `[out_channels, in_channels / groups, *kernel_size]`.
#[derive(Clone, Debug)]
pub struct Conv<const D: usize> {
    options: ConvOptions<D>,
    weight: Tensor,
    bias: Option<Tensor>,
}

pub type Conv1d = Conv<1>;
pub type Conv2d = Conv<2>;
pub type Conv3d = Conv<3>;

impl<const D: usize> Conv<D> {
    /// Validates `options` and initialises the parameters.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::InvalidArgument` for non-positive sizes, channel counts not divisible
    /// by `groups`, or `Padding::Same` combined with a stride other than one.
    pub fn new(options: ConvOptions<D>) -> Result<Self> {
        check_channels(options.in_channels, options.out_channels, options.groups)?;
        check_positive("kernel_size", &options.kernel_size)?;
        check_positive("stride", &options.stride)?;
        check_positive("dilation", &options.dilation)?;
        if options.padding == Padding::Same && options.stride.iter().any(|&s| s != 1) {
            return Err(TensorError::InvalidArgument(
                "padding='same' is not supported for strided convolutions".into(),
            ));
        }

        let in_per_group = options.in_channels / options.groups;
        let mut weight_shape = vec![options.out_channels, in_per_group];
        weight_shape.extend_from_slice(&options.kernel_size);

        let fan_in = numel_of(&weight_shape[1..])?;
        let bound = init::fan_in_bound(fan_in);
        let weight = init::uniform(&weight_shape, bound)?;
        let bias = if options.bias {
            Some(init::uniform(&[options.out_channels], bound)?)
        } else {
            None
        };

        Ok(Self {
            options,
            weight,
            bias,
        })
    }

    pub fn options(&self) -> &ConvOptions<D> {
        &self.options
    }

    /// Performs the forward pass.
    pub fn forward(&self, input: &Tensor) -> Result<Tensor> {
        let batched = check_input_rank(self.name(), D, input)?;
        let x = if batched {
            input.clone()
        } else {
            input.unsqueeze(0)?
        };

        let pads = self
            .options
            .padding
            .resolve(&self.options.kernel_size, &self.options.dilation);

        // Non-zero fills are materialised up front, then the kernel runs unpadded.
        let (x, padding) = match self.options.padding_mode.fill() {
            None => (x, pads.to_vec()),
            Some(mode) => {
                let widths = pads
                    .iter()
                    .map(|&(before, after)| (before as isize, after as isize))
                    .collect::<Vec<_>>();
                (x.pad(&widths, mode, 0.0)?, vec![(0, 0); D])
            }
        };

        let geometry = ConvGeometry {
            stride: self.options.stride.to_vec(),
            padding,
            dilation: self.options.dilation.to_vec(),
            groups: self.options.groups,
        };
        let out = x.conv(&self.weight, self.bias.as_ref(), &geometry)?;
        if batched { Ok(out) } else { out.squeeze(0) }
    }
}

impl<const D: usize> Module for Conv<D> {
    fn name(&self) -> &'static str {
        dim_name(&CONV_NAMES, D)
    }

    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        Conv::forward(self, input)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl<const D: usize> Parameterized for Conv<D> {
    fn weight(&self) -> &Tensor {
        &self.weight
    }

    fn bias(&self) -> Option<&Tensor> {
        self.bias.as_ref()
    }

    fn set_weight(&mut self, weight: Tensor) -> Result<()> {
        check_replacement("weight", self.weight.shape(), &weight)?;
        self.weight = weight;
        Ok(())
    }

    fn set_bias(&mut self, bias: Option<Tensor>) -> Result<()> {
        if let Some(b) = &bias {
            check_replacement("bias", &[self.options.out_channels], b)?;
        }
        self.bias = bias;
        Ok(())
    }
}

/// N-dimensional transposed convolution layer.
///
/// Weight shape is `[in_channels, out_channels / groups, *kernel_size]`.
#[derive(Clone, Debug)]
pub struct ConvTranspose<const D: usize> {
    options: ConvTransposeOptions<D>,
    weight: Tensor,
    bias: Option<Tensor>,
}

pub type ConvTranspose1d = ConvTranspose<1>;
pub type ConvTranspose2d = ConvTranspose<2>;
pub type ConvTranspose3d = ConvTranspose<3>;

impl<const D: usize> ConvTranspose<D> {
    /// Validates `options` and initialises the parameters.
    ///
    /// A non-zeros `padding_mode`, or an `output_padding` that is not smaller than either stride
    /// or dilation, is accepted here but rejected by [`ConvTranspose::forward`].
    pub fn new(options: ConvTransposeOptions<D>) -> Result<Self> {
        check_channels(options.in_channels, options.out_channels, options.groups)?;
        check_positive("kernel_size", &options.kernel_size)?;
        check_positive("stride", &options.stride)?;
        check_positive("dilation", &options.dilation)?;
        let out_per_group = options.out_channels / options.groups;
        let mut weight_shape = vec![options.in_channels, out_per_group];
        weight_shape.extend_from_slice(&options.kernel_size);

        let fan_in = numel_of(&weight_shape[1..])?;
        let bound = init::fan_in_bound(fan_in);
        let weight = init::uniform(&weight_shape, bound)?;
        let bias = if options.bias {
            Some(init::uniform(&[options.out_channels], bound)?)
        } else {
            None
        };

        Ok(Self {
            options,
            weight,
            bias,
        })
    }

    pub fn options(&self) -> &ConvTransposeOptions<D> {
        &self.options
    }

    /// Performs the forward pass.
    pub fn forward(&self, input: &Tensor) -> Result<Tensor> {
        let name = self.name();
        if self.options.padding_mode != PaddingMode::Zeros {
            return Err(TensorError::Unsupported(format!(
                "only zeros padding mode is supported for {name}"
            )));
        }
        let batched = check_input_rank(name, D, input)?;
        let x = if batched {
            input.clone()
        } else {
            input.unsqueeze(0)?
        };

        let geometry = ConvTransposeGeometry {
            stride: self.options.stride.to_vec(),
            padding: self.options.padding.to_vec(),
            output_padding: self.options.output_padding.to_vec(),
            dilation: self.options.dilation.to_vec(),
            groups: self.options.groups,
        };
        let out = x.conv_transpose(&self.weight, self.bias.as_ref(), &geometry)?;
        if batched { Ok(out) } else { out.squeeze(0) }
    }
}

impl<const D: usize> Module for ConvTranspose<D> {
    fn name(&self) -> &'static str {
        dim_name(&CONV_TRANSPOSE_NAMES, D)
    }

    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        ConvTranspose::forward(self, input)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl<const D: usize> Parameterized for ConvTranspose<D> {
    fn weight(&self) -> &Tensor {
        &self.weight
    }

    fn bias(&self) -> Option<&Tensor> {
        self.bias.as_ref()
    }

    fn set_weight(&mut self, weight: Tensor) -> Result<()> {
        check_replacement("weight", self.weight.shape(), &weight)?;
        self.weight = weight;
        Ok(())
    }

    fn set_bias(&mut self, bias: Option<Tensor>) -> Result<()> {
        if let Some(b) = &bias {
            check_replacement("bias", &[self.options.out_channels], b)?;
        }
        self.bias = bias;
        Ok(())
    }
}
