mod common;

use common::*;
use nnbridge::ffi::*;
use std::ptr;

#[test]
fn test_tensor_round_trip_and_metadata() {
    let t = tensor(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]);
    assert_eq!(unsafe { nnb_tensor_ndim(t) }, 2);
    assert_eq!(unsafe { nnb_tensor_numel(t) }, 6);
    assert_eq!(shape(t), vec![2, 3]);
    assert!(!unsafe { nnb_tensor_is_long(t) });
    assert_eq!(values(t), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    dispose(&[t]);
}

#[test]
fn test_creation_errors() {
    let data = [1.0f32; 4];
    let shape = [2i64, 2];
    unsafe {
        assert!(nnb_tensor_from_f32(ptr::null(), shape.as_ptr(), 2).is_null());
        expect_error("data pointer was null");

        assert!(nnb_tensor_from_f32(data.as_ptr(), ptr::null(), 2).is_null());
        expect_error("shape pointer was null");

        assert!(nnb_tensor_from_f32(data.as_ptr(), shape.as_ptr(), -1).is_null());
        expect_error("ndim must be non-negative");

        // The element count overflows before any data is read.
        let huge = [1i64 << 32, 1 << 32];
        assert!(nnb_tensor_from_f32(data.as_ptr(), huge.as_ptr(), 2).is_null());
        assert!(nnb_last_error_length() > 0);
        expect_error("too large");

        // Empty tensors need no data.
        let empty_shape = [0i64, 3];
        let empty = nnb_tensor_from_f32(ptr::null(), empty_shape.as_ptr(), 2);
        assert!(!empty.is_null());
        assert_eq!(nnb_tensor_numel(empty), 0);
        nnb_tensor_dispose(empty);
    }
}

#[test]
fn test_same_storage_is_identity_not_equality() {
    let a = tensor(&[1.0, 2.0], &[2]);
    let b = tensor(&[1.0, 2.0], &[2]);
    unsafe {
        assert!(nnb_tensor_same_storage(a, a));
        assert!(!nnb_tensor_same_storage(a, b));
        assert!(!nnb_tensor_same_storage(a, ptr::null_mut()));
        expect_error("b pointer was null");
    }
    dispose(&[a, b]);
}

#[test]
fn test_long_tensors_are_rejected_as_module_input() {
    let data = [0i64; 8];
    let shape = [1i64, 2, 4];
    let long = unsafe { nnb_tensor_from_i64(data.as_ptr(), shape.as_ptr(), 3) };
    assert!(unsafe { nnb_tensor_is_long(long) });

    let kernel = [2i64];
    let pool = unsafe { nnb_avgpool1d_ctor(kernel.as_ptr(), ptr::null(), no_view()) };
    assert!(unsafe { nnb_avgpool1d_forward(pool, long) }.is_null());
    expect_error("expected a float32 tensor, got int64");

    let conv = unsafe { nnb_conv1d_ctor(2, 2, 1, 1, 0, 1, 0, 1, true, no_view()) };
    unsafe { nnb_conv1d_set_weight(conv, long) };
    expect_error("float32");
    dispose(&[long]);
}

#[test]
fn test_error_slot_buffer_api() {
    let kernel = [2i64];
    let pool = unsafe { nnb_avgpool1d_ctor(kernel.as_ptr(), ptr::null(), no_view()) };
    assert!(unsafe { nnb_avgpool1d_forward(pool, ptr::null_mut()) }.is_null());

    let len = nnb_last_error_length();
    assert_eq!(len, "input pointer was null".len());
    let mut buffer = vec![0 as std::ffi::c_char; len + 1];
    let written = unsafe { nnb_last_error_message(buffer.as_mut_ptr(), buffer.len()) };
    assert_eq!(written, len);
    let message = unsafe { std::ffi::CStr::from_ptr(buffer.as_ptr()) };
    assert_eq!(message.to_str().unwrap(), "input pointer was null");

    nnb_clear_last_error();
    assert!(last_error().is_none());
    assert_eq!(unsafe { nnb_last_error_message(buffer.as_mut_ptr(), buffer.len()) }, 0);
}

#[test]
fn test_null_module_handle() {
    let input = ramp(&[1, 1, 4]);
    assert!(unsafe { nnb_maxpool1d_forward(ptr::null_mut(), input) }.is_null());
    expect_error("module pointer was null");
    assert!(unsafe { nnb_module_name(ptr::null_mut()) }.is_null());
    unsafe {
        nnb_module_dispose(ptr::null_mut());
        nnb_tensor_dispose(ptr::null_mut());
    }
    dispose(&[input]);
}
