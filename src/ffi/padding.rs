//! Padding-layer constructors and forwards. Each takes one width applied to every side.

use super::error::guard;
use super::{FfiError, FfiResult, NNAnyModule, NNModule, build, create_module};
use crate::nn::{Pad, PadKind, PadOptions};
use std::ptr;

fn pad_options<const D: usize>(
    kind: PadKind,
    padding: i64,
    value: f64,
) -> FfiResult<PadOptions<D>> {
    let width = isize::try_from(padding).map_err(|_| FfiError::OutOfRange("padding", padding))?;
    Ok(PadOptions::uniform(kind, width).value(value))
}

/// Generates a padding constructor. The `value` form is for constant padding.
macro_rules! export_pad_ctor {
    ($fn_name:ident, $dims:literal, $kind:expr) => {
        /// # Safety
        ///
        /// `out_any` must be null or valid for one write.
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn $fn_name(padding: i64, out_any: *mut NNAnyModule) -> NNModule {
            guard(stringify!($fn_name), ptr::null_mut(), || unsafe {
                let options = pad_options::<$dims>($kind, padding, 0.0)?;
                let module = build(options, Pad::<$dims>::new)?;
                Ok(create_module(module, out_any))
            })
        }
    };
    ($fn_name:ident, $dims:literal, $kind:expr, value) => {
        /// # Safety
        ///
        /// `out_any` must be null or valid for one write.
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn $fn_name(
            value: f64,
            padding: i64,
            out_any: *mut NNAnyModule,
        ) -> NNModule {
            guard(stringify!($fn_name), ptr::null_mut(), || unsafe {
                let options = pad_options::<$dims>($kind, padding, value)?;
                let module = build(options, Pad::<$dims>::new)?;
                Ok(create_module(module, out_any))
            })
        }
    };
}

export_pad_ctor!(nnb_zeropad2d_ctor, 2, PadKind::Zero);
export_forward!(nnb_zeropad2d_forward, Pad<2>, "ZeroPad2d");

export_pad_ctor!(nnb_constantpad1d_ctor, 1, PadKind::Constant, value);
export_pad_ctor!(nnb_constantpad2d_ctor, 2, PadKind::Constant, value);
export_pad_ctor!(nnb_constantpad3d_ctor, 3, PadKind::Constant, value);
export_forward!(nnb_constantpad1d_forward, Pad<1>, "ConstantPad1d");
export_forward!(nnb_constantpad2d_forward, Pad<2>, "ConstantPad2d");
export_forward!(nnb_constantpad3d_forward, Pad<3>, "ConstantPad3d");

export_pad_ctor!(nnb_replicationpad1d_ctor, 1, PadKind::Replication);
export_pad_ctor!(nnb_replicationpad2d_ctor, 2, PadKind::Replication);
export_pad_ctor!(nnb_replicationpad3d_ctor, 3, PadKind::Replication);
export_forward!(nnb_replicationpad1d_forward, Pad<1>, "ReplicationPad1d");
export_forward!(nnb_replicationpad2d_forward, Pad<2>, "ReplicationPad2d");
export_forward!(nnb_replicationpad3d_forward, Pad<3>, "ReplicationPad3d");

export_pad_ctor!(nnb_reflectionpad1d_ctor, 1, PadKind::Reflection);
export_pad_ctor!(nnb_reflectionpad2d_ctor, 2, PadKind::Reflection);
export_pad_ctor!(nnb_reflectionpad3d_ctor, 3, PadKind::Reflection);
export_forward!(nnb_reflectionpad1d_forward, Pad<1>, "ReflectionPad1d");
export_forward!(nnb_reflectionpad2d_forward, Pad<2>, "ReflectionPad2d");
export_forward!(nnb_reflectionpad3d_forward, Pad<3>, "ReflectionPad3d");
