//! # nnbridge
//!
//! `nnbridge` exposes convolution, pooling and padding modules to foreign callers through a
//! stable C ABI. The library underneath is a pure Rust CPU implementation.
//!
//! ## Modules
//!
//! - [`mod@tensor`]: Shared-storage N-dimensional tensor.
//! - [`nn`]: Conv, conv-transpose, pooling and padding modules with typed options.
//! - [`ffi`]: The `extern "C"` surface (`nnb_*`), handles and the last-error slot.
//! - [`config`] and [`logging`]: Environment configuration and `tracing` setup.
//!
//! ## Example
//!
//! ```rust
//! use nnbridge::nn::{Conv2d, ConvOptions, Padding};
//! use nnbridge::tensor::Tensor;
//!
//! let conv = Conv2d::new(ConvOptions::new(3, 8, [3, 3]).padding(Padding::Same)).unwrap();
//! let out = conv.forward(&Tensor::zeros(&[1, 3, 16, 16]).unwrap()).unwrap();
//! assert_eq!(out.shape(), &[1, 8, 16, 16]);
//! ```

pub mod config;
pub mod ffi;
pub mod logging;
pub mod nn;
pub mod tensor;

pub use config::BridgeConfig;
pub use tensor::{Tensor, TensorError};
