#![allow(dead_code)]

use nnbridge::ffi::*;
use std::ffi::{CStr, c_int};
use std::ptr;

pub fn tensor(data: &[f32], shape: &[i64]) -> NNTensor {
    let t = unsafe { nnb_tensor_from_f32(data.as_ptr(), shape.as_ptr(), shape.len() as c_int) };
    assert!(!t.is_null(), "tensor creation failed: {:?}", last_error());
    t
}

pub fn ramp(shape: &[i64]) -> NNTensor {
    let n: i64 = shape.iter().product();
    let data: Vec<f32> = (0..n).map(|v| v as f32).collect();
    tensor(&data, shape)
}

pub fn ones(shape: &[i64]) -> NNTensor {
    let n: i64 = shape.iter().product();
    tensor(&vec![1.0; n as usize], shape)
}

pub fn values(t: NNTensor) -> Vec<f32> {
    let n = unsafe { nnb_tensor_numel(t) };
    assert!(n >= 0, "numel failed: {:?}", last_error());
    let mut out = vec![0.0; n as usize];
    assert!(unsafe { nnb_tensor_copy_f32(t, out.as_mut_ptr(), out.len()) });
    out
}

pub fn long_values(t: NNTensor) -> Vec<i64> {
    let n = unsafe { nnb_tensor_numel(t) };
    let mut out = vec![0; n as usize];
    assert!(unsafe { nnb_tensor_copy_i64(t, out.as_mut_ptr(), out.len()) });
    out
}

pub fn shape(t: NNTensor) -> Vec<i64> {
    let ndim = unsafe { nnb_tensor_ndim(t) };
    assert!(ndim >= 0, "ndim failed: {:?}", last_error());
    let mut out = vec![0; ndim as usize];
    assert!(unsafe { nnb_tensor_shape(t, out.as_mut_ptr()) });
    out
}

pub fn last_error() -> Option<String> {
    let message = nnb_last_error();
    if message.is_null() {
        return None;
    }
    Some(unsafe { CStr::from_ptr(message) }.to_string_lossy().into_owned())
}

pub fn expect_error(fragment: &str) {
    let message = last_error().expect("an error should have been recorded");
    assert!(
        message.contains(fragment),
        "error {message:?} does not mention {fragment:?}"
    );
}

pub fn module_name(module: NNModule) -> String {
    let name = unsafe { nnb_module_name(module) };
    assert!(!name.is_null());
    unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned()
}

pub fn dispose(tensors: &[NNTensor]) {
    for &t in tensors {
        unsafe { nnb_tensor_dispose(t) };
    }
}

pub fn no_view() -> *mut NNAnyModule {
    ptr::null_mut()
}
