//! Fault boundary and the thread-local last-error slot.
//!
//! Every exported call runs inside [`guard`], which clears the slot, catches both `Err` and
//! panics, records the message and hands back a null/default value. The caller then asks for
//! the message through `nnb_last_error*`.

use crate::tensor::TensorError;
use std::any::Any;
use std::cell::RefCell;
use std::ffi::{CString, c_char};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use thiserror::Error;

/// Errors raised by the boundary layer itself, plus wrapped library errors.
#[derive(Error, Debug)]
pub enum FfiError {
    #[error("{0} pointer was null")]
    NullPointer(&'static str),
    #[error("handle refers to {found}, expected {expected}")]
    WrongModule {
        expected: &'static str,
        found: &'static str,
    },
    #[error("expected a {expected} tensor, got {found}")]
    WrongDType {
        expected: &'static str,
        found: &'static str,
    },
    #[error("{0} must be non-negative, got {1}")]
    Negative(&'static str, i64),
    #[error("{0} is out of range: {1}")]
    OutOfRange(&'static str, i64),
    #[error("{name} expects 1 or {expected} values, got {got}")]
    Arity {
        name: &'static str,
        expected: usize,
        got: i64,
    },
    #[error("buffer holds {got} elements, tensor has {expected}")]
    BufferLength { expected: usize, got: usize },
    #[error("module lock was poisoned")]
    Poisoned,
    #[error("panic: {0}")]
    Panic(String),
    #[error(transparent)]
    Tensor(#[from] TensorError),
}

pub type FfiResult<T> = std::result::Result<T, FfiError>;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

pub(crate) fn set_last_error(message: String) {
    let message = CString::new(message).unwrap_or_else(|e| {
        // Interior NULs would truncate the C string; drop them instead.
        let mut bytes = e.into_vec();
        bytes.retain(|&b| b != 0);
        CString::new(bytes).unwrap_or_default()
    });
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(message));
}

pub(crate) fn clear_last_error() {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = None);
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(s) => *s,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(s) => (*s).to_string(),
            Err(_) => "unknown panic payload".to_string(),
        },
    }
}

/// Runs `body` as the exported operation `op`.
///
/// On failure the error is logged, stored in the last-error slot and `fallback` is returned.
pub(crate) fn guard<T>(op: &'static str, fallback: T, body: impl FnOnce() -> FfiResult<T>) -> T {
    clear_last_error();
    let outcome = panic::catch_unwind(AssertUnwindSafe(body))
        .unwrap_or_else(|payload| Err(FfiError::Panic(panic_message(payload))));
    match outcome {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(op, error = %err, "call failed");
            set_last_error(err.to_string());
            fallback
        }
    }
}

/// Returns the last error raised on this thread, or null.
///
/// The string is owned by the library and stays valid until the next exported call on the
/// same thread.
#[unsafe(no_mangle)]
pub extern "C" fn nnb_last_error() -> *const c_char {
    LAST_ERROR.with(|slot| {
        slot.borrow()
            .as_ref()
            .map_or(ptr::null(), |message| message.as_ptr())
    })
}

/// Length in bytes of the last error message, excluding the terminator. Zero when none.
#[unsafe(no_mangle)]
pub extern "C" fn nnb_last_error_length() -> usize {
    LAST_ERROR.with(|slot| slot.borrow().as_ref().map_or(0, |m| m.as_bytes().len()))
}

/// Copies the last error into `buffer` (NUL-terminated, truncated to `capacity - 1` bytes).
///
/// Returns the number of bytes copied, excluding the terminator.
///
/// # Safety
///
/// `buffer` must be null or valid for `capacity` bytes of writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nnb_last_error_message(buffer: *mut c_char, capacity: usize) -> usize {
    if buffer.is_null() || capacity == 0 {
        return 0;
    }
    LAST_ERROR.with(|slot| {
        let slot = slot.borrow();
        let Some(message) = slot.as_ref() else {
            return 0;
        };
        let bytes = message.as_bytes();
        let to_copy = bytes.len().min(capacity - 1);
        // SAFETY: the caller guarantees `capacity` writable bytes and `to_copy < capacity`.
        unsafe {
            ptr::copy_nonoverlapping(bytes.as_ptr().cast::<c_char>(), buffer, to_copy);
            *buffer.add(to_copy) = 0;
        }
        to_copy
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn nnb_clear_last_error() {
    clear_last_error();
}
