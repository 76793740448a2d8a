//! Library setup and type-erased module operations.

use super::error::guard;
use super::{
    AnyModuleHandle, FfiError, FfiResult, NNAnyModule, NNModule, NNTensor, float_tensor,
    new_tensor, shared_module,
};
use crate::config::BridgeConfig;
use crate::logging::init_tracing;
use crate::nn::{SharedModule, init};
use std::collections::HashMap;
use std::ffi::{CStr, CString, c_char};
use std::ptr;
use std::sync::{Mutex, OnceLock, PoisonError};

static CONFIG: OnceLock<BridgeConfig> = OnceLock::new();

/// Reads `NNBRIDGE_*` variables, installs logging and applies the seed.
///
/// Only the first call does anything; later calls return true without touching state.
#[unsafe(no_mangle)]
pub extern "C" fn nnb_init() -> bool {
    guard("nnb_init", false, || {
        CONFIG.get_or_init(|| {
            let config = BridgeConfig::from_env();
            let installed = init_tracing(&config.log_filter);
            if let Some(seed) = config.seed {
                init::manual_seed(seed);
            }
            tracing::debug!(?config, subscriber = installed, "initialised");
            config
        });
        Ok(true)
    })
}

/// Reseeds parameter initialisation so later constructors are reproducible.
#[unsafe(no_mangle)]
pub extern "C" fn nnb_manual_seed(seed: u64) {
    guard("nnb_manual_seed", (), || {
        init::manual_seed(seed);
        tracing::debug!(seed, "reseeded parameter generator");
        Ok(())
    })
}

/// Module names as NUL-terminated strings that live for the rest of the process.
fn c_name(name: &'static str) -> *const c_char {
    static NAMES: OnceLock<Mutex<HashMap<&'static str, &'static CStr>>> = OnceLock::new();
    let mut names = NAMES
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    names
        .entry(name)
        .or_insert_with(|| {
            let leaked: &'static CStr =
                Box::leak(CString::new(name).unwrap_or_default().into_boxed_c_str());
            leaked
        })
        .as_ptr()
}

fn module_name(shared: &SharedModule) -> FfiResult<*const c_char> {
    let lock = shared.read().map_err(|_| FfiError::Poisoned)?;
    Ok(c_name(lock.name()))
}

/// # Safety
///
/// `view` must be null or point to a live `AnyModuleHandle`.
unsafe fn any_module<'a>(view: NNAnyModule) -> FfiResult<&'a SharedModule> {
    if view.is_null() {
        return Err(FfiError::NullPointer("module"));
    }
    // SAFETY: non-null and live per the caller.
    Ok(unsafe { &(*view).0 })
}

/// Releases a module handle. The module itself lives on while an erased view holds it.
///
/// # Safety
///
/// `module` must be null or a handle from this library not yet disposed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nnb_module_dispose(module: NNModule) {
    if !module.is_null() {
        // SAFETY: ownership goes back to the box allocated by `create_module`.
        drop(unsafe { Box::from_raw(module) });
    }
}

/// Releases an erased view.
///
/// # Safety
///
/// `view` must be null or a view from this library not yet disposed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nnb_any_module_dispose(view: NNAnyModule) {
    if !view.is_null() {
        // SAFETY: ownership goes back to the box allocated by `create_module`.
        drop(unsafe { Box::<AnyModuleHandle>::from_raw(view) });
    }
}

/// Name of the module variant, e.g. `"Conv2d"`. The string must not be freed.
///
/// # Safety
///
/// `module` must be null or live.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nnb_module_name(module: NNModule) -> *const c_char {
    guard("nnb_module_name", ptr::null(), || {
        module_name(unsafe { shared_module(module)? })
    })
}

/// Name of the module behind an erased view.
///
/// # Safety
///
/// `view` must be null or live.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nnb_any_module_name(view: NNAnyModule) -> *const c_char {
    guard("nnb_any_module_name", ptr::null(), || {
        module_name(unsafe { any_module(view)? })
    })
}

/// Runs whichever module sits behind `view`.
///
/// # Safety
///
/// Handles must be null or live.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nnb_any_module_forward(view: NNAnyModule, input: NNTensor) -> NNTensor {
    guard("nnb_any_module_forward", ptr::null_mut(), || {
        let shared = unsafe { any_module(view)? };
        let input = unsafe { float_tensor(input, "input")? };
        let lock = shared.read().map_err(|_| FfiError::Poisoned)?;
        tracing::trace!(module = lock.name(), shape = ?input.shape(), "forward");
        Ok(new_tensor(lock.forward(input)?))
    })
}
