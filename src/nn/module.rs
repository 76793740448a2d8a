use crate::tensor::{Result, Tensor};
use std::any::Any;
use std::fmt::Debug;
use std::sync::{Arc, RwLock};

/// A Module trait for Neural Network layers.
///
/// Every layer exposed through the C ABI implements it, so a module can be stored and run
/// without knowing its concrete type. `as_any` recovers the concrete type where a caller
/// needs variant-specific operations such as parameter access.
pub trait Module: Debug + Send + Sync + 'static {
    /// Name of the concrete variant, e.g. `"Conv2d"`.
    fn name(&self) -> &'static str;

    /// Computes the module's output for `input`.
    fn forward(&self, input: &Tensor) -> Result<Tensor>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A module shared between a concrete handle and its type-erased view.
pub type SharedModule = Arc<RwLock<dyn Module>>;

/// Wraps `module` for shared ownership.
pub fn share<M: Module>(module: M) -> SharedModule {
    Arc::new(RwLock::new(module))
}

/// Modules that own learnable weight and bias tensors.
pub trait Parameterized: Module {
    fn weight(&self) -> &Tensor;

    fn bias(&self) -> Option<&Tensor>;

    /// Replaces the weight. The new tensor must have the current weight's shape.
    fn set_weight(&mut self, weight: Tensor) -> Result<()>;

    /// Replaces or removes the bias. A new bias must be `[out_channels]`.
    fn set_bias(&mut self, bias: Option<Tensor>) -> Result<()>;
}

/// Modules whose forward pass can also report where each output came from.
pub trait WithIndices: Module {
    fn forward_with_indices(&self, input: &Tensor) -> Result<(Tensor, Tensor<i64>)>;
}
