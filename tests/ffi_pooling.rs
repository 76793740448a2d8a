mod common;

use common::*;
use nnbridge::ffi::*;
use std::ptr::{self, NonNull};

fn maxpool2d(kernel: &[i64], stride: Option<&[i64]>, padding: Option<&[i64]>) -> NNModule {
    let (stride_ptr, stride_len) =
        stride.map_or((ptr::null(), 0), |s| (s.as_ptr(), s.len() as i32));
    let (padding_ptr, padding_len) =
        padding.map_or((ptr::null(), 0), |p| (p.as_ptr(), p.len() as i32));
    unsafe {
        nnb_maxpool2d_ctor(
            kernel.as_ptr(),
            kernel.len() as i32,
            stride_ptr,
            stride_len,
            padding_ptr,
            padding_len,
            ptr::null(),
            0,
            false,
            no_view(),
        )
    }
}

#[test]
fn test_null_arrays_select_defaults() {
    let input = ramp(&[1, 1, 4, 4]);
    let defaults = maxpool2d(&[2], None, None);
    let explicit = maxpool2d(&[2, 2], Some(&[2, 2]), Some(&[0]));
    assert!(!defaults.is_null() && !explicit.is_null(), "{:?}", last_error());

    let a = unsafe { nnb_maxpool2d_forward(defaults, input) };
    let b = unsafe { nnb_maxpool2d_forward(explicit, input) };
    assert_eq!(shape(a), vec![1, 1, 2, 2]);
    assert_eq!(values(a), vec![5.0, 7.0, 13.0, 15.0]);
    assert_eq!(values(a), values(b));

    let kernel = [2i64];
    let avg = unsafe { nnb_avgpool1d_ctor(kernel.as_ptr(), ptr::null(), no_view()) };
    let row = ramp(&[1, 4]);
    let out = unsafe { nnb_avgpool1d_forward(avg, row) };
    assert_eq!(values(out), vec![0.5, 2.5]);

    let avg2d = unsafe { nnb_avgpool2d_ctor(kernel.as_ptr(), 1, ptr::null(), 0, no_view()) };
    let out2 = unsafe { nnb_avgpool2d_forward(avg2d, input) };
    assert_eq!(values(out2), vec![2.5, 4.5, 10.5, 12.5]);

    dispose(&[input, a, b, row, out, out2]);
}

#[test]
fn test_avgpool_stride_and_3d() {
    let kernel = [2i64];
    let stride = [1i64];
    let avg = unsafe { nnb_avgpool1d_ctor(kernel.as_ptr(), stride.as_ptr(), no_view()) };
    let row = ramp(&[1, 4]);
    let out = unsafe { nnb_avgpool1d_forward(avg, row) };
    assert_eq!(values(out), vec![0.5, 1.5, 2.5]);

    let avg3d = unsafe { nnb_avgpool3d_ctor(kernel.as_ptr(), 1, ptr::null(), 0, no_view()) };
    assert_eq!(module_name(avg3d), "AvgPool3d");
    let cube = ones(&[1, 2, 4, 2]);
    let out3 = unsafe { nnb_avgpool3d_forward(avg3d, cube) };
    assert_eq!(shape(out3), vec![1, 1, 2, 1]);
    assert_eq!(values(out3), vec![1.0, 1.0]);
    dispose(&[row, out, cube, out3]);
}

#[test]
fn test_forward_with_indices_populates_both_outputs() {
    let pool = maxpool2d(&[2], None, None);
    let input = ramp(&[1, 1, 4, 4]);
    let mut indices = ptr::null_mut();
    let out = unsafe { nnb_maxpool2d_forward_with_indices(pool, input, &mut indices) };
    assert!(!out.is_null() && !indices.is_null());
    assert!(unsafe { nnb_tensor_is_long(indices) });
    assert_eq!(shape(indices), shape(out));
    assert_eq!(long_values(indices), vec![5, 7, 13, 15]);
    dispose(&[input, out, indices]);
}

#[test]
fn test_forward_with_indices_populates_neither_on_failure() {
    let pool = maxpool2d(&[2], None, None);
    let bad = ramp(&[4]);
    let sentinel = NonNull::<TensorHandle>::dangling().as_ptr();
    let mut indices = sentinel;
    let out = unsafe { nnb_maxpool2d_forward_with_indices(pool, bad, &mut indices) };
    assert!(out.is_null());
    assert_eq!(indices, sentinel, "indices slot must be untouched");
    expect_error("MaxPool2d");

    let good = ramp(&[1, 4, 4]);
    let out = unsafe { nnb_maxpool2d_forward_with_indices(pool, good, ptr::null_mut()) };
    assert!(out.is_null());
    expect_error("indices pointer was null");
    dispose(&[bad, good]);
}

#[test]
fn test_maxpool1d_single_pointers_and_ceil_mode() {
    let kernel = [2i64];
    let pool = unsafe {
        nnb_maxpool1d_ctor(kernel.as_ptr(), ptr::null(), ptr::null(), ptr::null(), true, no_view())
    };
    let row = ramp(&[1, 5]);
    let mut indices = ptr::null_mut();
    let out = unsafe { nnb_maxpool1d_forward_with_indices(pool, row, &mut indices) };
    assert_eq!(values(out), vec![1.0, 3.0, 4.0]);
    assert_eq!(long_values(indices), vec![1, 3, 4]);

    let floor = unsafe {
        nnb_maxpool1d_ctor(kernel.as_ptr(), ptr::null(), ptr::null(), ptr::null(), false, no_view())
    };
    let out2 = unsafe { nnb_maxpool1d_forward(floor, row) };
    assert_eq!(values(out2), vec![1.0, 3.0]);
    dispose(&[row, out, indices, out2]);
}

#[test]
fn test_maxpool3d_padding_and_dilation() {
    let kernel = [3i64];
    let padding = [1i64];
    let dilation = [1i64, 1, 1];
    let stride = [1i64];
    let pool = unsafe {
        nnb_maxpool3d_ctor(
            kernel.as_ptr(),
            1,
            stride.as_ptr(),
            1,
            padding.as_ptr(),
            1,
            dilation.as_ptr(),
            3,
            false,
            no_view(),
        )
    };
    assert!(!pool.is_null(), "{:?}", last_error());
    let cube = ramp(&[1, 2, 2, 2]);
    let out = unsafe { nnb_maxpool3d_forward(pool, cube) };
    assert_eq!(shape(out), vec![1, 2, 2, 2]);
    assert_eq!(values(out), vec![7.0; 8]);
    dispose(&[cube, out]);
}

#[test]
fn test_array_arity_and_sign_are_checked() {
    assert!(maxpool2d(&[2, 2, 2], None, None).is_null());
    expect_error("kernel_size expects 1 or 2 values, got 3");

    assert!(maxpool2d(&[2], Some(&[-1]), None).is_null());
    expect_error("stride must be non-negative");

    assert!(maxpool2d(&[2], None, Some(&[2])).is_null());
    expect_error("pad should be at most half of effective kernel size");

    let null_kernel =
        unsafe { nnb_avgpool2d_ctor(ptr::null(), 0, ptr::null(), 0, no_view()) };
    assert!(null_kernel.is_null());
    expect_error("kernel_size pointer was null");
}

#[test]
fn test_adaptive_pools() {
    let size = [1i64];
    let avg = unsafe { nnb_adaptive_avgpool2d_ctor(size.as_ptr(), 1, no_view()) };
    let planes = ramp(&[2, 3, 3]);
    let out = unsafe { nnb_adaptive_avgpool2d_forward(avg, planes) };
    assert_eq!(shape(out), vec![2, 1, 1]);
    assert_eq!(values(out), vec![4.0, 13.0]);

    let two = [2i64];
    let max = unsafe { nnb_adaptive_maxpool1d_ctor(two.as_ptr(), 1, no_view()) };
    let row = ramp(&[1, 5]);
    let mut indices = ptr::null_mut();
    let values_out = unsafe { nnb_adaptive_maxpool1d_forward_with_indices(max, row, &mut indices) };
    assert_eq!(values(values_out), vec![2.0, 4.0]);
    assert_eq!(long_values(indices), vec![2, 4]);

    let max3d = unsafe { nnb_adaptive_maxpool3d_ctor(size.as_ptr(), 1, no_view()) };
    let cube = ramp(&[1, 2, 2, 2]);
    let top = unsafe { nnb_adaptive_maxpool3d_forward(max3d, cube) };
    assert_eq!(values(top), vec![7.0]);

    let avg1d = unsafe { nnb_adaptive_avgpool1d_ctor(two.as_ptr(), 1, no_view()) };
    let halves = unsafe { nnb_adaptive_avgpool1d_forward(avg1d, row) };
    // Windows [0, 3) and [2, 5).
    assert_eq!(values(halves), vec![1.0, 3.0]);

    let zero = [0i64];
    assert!(unsafe { nnb_adaptive_avgpool3d_ctor(zero.as_ptr(), 1, no_view()) }.is_null());
    expect_error("output_size");

    dispose(&[planes, out, row, values_out, indices, cube, top, halves]);
}

#[test]
fn test_pool_view_runs_polymorphic_forward() {
    let kernel = [2i64];
    let mut view = ptr::null_mut();
    let pool = unsafe { nnb_adaptive_maxpool2d_ctor(kernel.as_ptr(), 1, &mut view) };
    let input = ramp(&[1, 4, 4]);
    unsafe {
        let direct = nnb_adaptive_maxpool2d_forward(pool, input);
        let erased = nnb_any_module_forward(view, input);
        assert_eq!(values(direct), values(erased));
        nnb_any_module_dispose(view);
        nnb_module_dispose(pool);
        dispose(&[input, direct, erased]);
    }
}
