mod common;

use common::*;
use nnbridge::ffi::*;

#[test]
fn test_zero_pad_2d() {
    let pad = unsafe { nnb_zeropad2d_ctor(1, no_view()) };
    assert_eq!(module_name(pad), "ZeroPad2d");
    let input = ones(&[1, 1, 2, 2]);
    let out = unsafe { nnb_zeropad2d_forward(pad, input) };
    assert_eq!(shape(out), vec![1, 1, 4, 4]);
    assert_eq!(values(out).iter().sum::<f32>(), 4.0);
    dispose(&[input, out]);
}

#[test]
fn test_constant_pad_uses_value() {
    let row = tensor(&[1.0, 2.0], &[1, 2]);
    let pad = unsafe { nnb_constantpad1d_ctor(-0.5, 2, no_view()) };
    let out = unsafe { nnb_constantpad1d_forward(pad, row) };
    assert_eq!(values(out), vec![-0.5, -0.5, 1.0, 2.0, -0.5, -0.5]);

    let pad3d = unsafe { nnb_constantpad3d_ctor(9.0, 1, no_view()) };
    let cube = ones(&[1, 1, 1, 1]);
    let out3 = unsafe { nnb_constantpad3d_forward(pad3d, cube) };
    assert_eq!(shape(out3), vec![1, 3, 3, 3]);
    assert_eq!(values(out3).iter().filter(|&&v| v == 9.0).count(), 26);
    dispose(&[row, out, cube, out3]);
}

#[test]
fn test_negative_padding_crops() {
    let pad = unsafe { nnb_constantpad2d_ctor(0.0, -1, no_view()) };
    let input = ramp(&[1, 4, 4]);
    let out = unsafe { nnb_constantpad2d_forward(pad, input) };
    assert_eq!(shape(out), vec![1, 2, 2]);
    assert_eq!(values(out), vec![5.0, 6.0, 9.0, 10.0]);
    dispose(&[input, out]);
}

#[test]
fn test_replication_and_reflection() {
    let row = tensor(&[1.0, 2.0, 3.0], &[1, 1, 3]);
    let replicate = unsafe { nnb_replicationpad1d_ctor(2, no_view()) };
    let reflect = unsafe { nnb_reflectionpad1d_ctor(2, no_view()) };

    let a = unsafe { nnb_replicationpad1d_forward(replicate, row) };
    let b = unsafe { nnb_reflectionpad1d_forward(reflect, row) };
    assert_eq!(values(a), vec![1.0, 1.0, 1.0, 2.0, 3.0, 3.0, 3.0]);
    assert_eq!(values(b), vec![3.0, 2.0, 1.0, 2.0, 3.0, 2.0, 1.0]);

    let grid = ramp(&[1, 2, 2]);
    let r2 = unsafe { nnb_replicationpad2d_ctor(1, no_view()) };
    let out = unsafe { nnb_replicationpad2d_forward(r2, grid) };
    assert_eq!(
        values(out),
        vec![
            0.0, 0.0, 1.0, 1.0, //
            0.0, 0.0, 1.0, 1.0, //
            2.0, 2.0, 3.0, 3.0, //
            2.0, 2.0, 3.0, 3.0,
        ]
    );

    let cube = ramp(&[1, 2, 2, 2]);
    let f3 = unsafe { nnb_reflectionpad3d_ctor(1, no_view()) };
    let out3 = unsafe { nnb_reflectionpad3d_forward(f3, cube) };
    assert_eq!(shape(out3), vec![1, 4, 4, 4]);
    dispose(&[row, a, b, grid, out, cube, out3]);
}

#[test]
fn test_reflection_wider_than_input_fails() {
    let pad = unsafe { nnb_reflectionpad2d_ctor(2, no_view()) };
    assert!(!pad.is_null());
    let input = ramp(&[1, 2, 2]);
    assert!(unsafe { nnb_reflectionpad2d_forward(pad, input) }.is_null());
    expect_error("reflect padding");
    dispose(&[input]);
}

#[test]
fn test_forward_checks_family_name() {
    // ZeroPad2d and ConstantPad2d share a Rust type; the name still has to match.
    let zero = unsafe { nnb_zeropad2d_ctor(1, no_view()) };
    let input = ramp(&[1, 2, 2]);
    assert!(unsafe { nnb_constantpad2d_forward(zero, input) }.is_null());
    expect_error("handle refers to ZeroPad2d, expected ConstantPad2d");

    let reflect = unsafe { nnb_reflectionpad1d_ctor(1, no_view()) };
    assert!(unsafe { nnb_replicationpad1d_forward(reflect, input) }.is_null());
    expect_error("ReflectionPad1d");
    dispose(&[input]);
}

#[test]
fn test_padding_rank_checked() {
    let pad = unsafe { nnb_replicationpad3d_ctor(1, no_view()) };
    let flat = ramp(&[3, 3]);
    assert!(unsafe { nnb_replicationpad3d_forward(pad, flat) }.is_null());
    expect_error("Expected 4D (unbatched) or 5D (batched) input to ReplicationPad3d");
    dispose(&[flat]);
}

#[test]
fn test_oversized_padding_fails_at_forward() {
    let input = ones(&[1, 1, 1]);
    unsafe {
        let pad = nnb_zeropad2d_ctor(1 << 30, no_view());
        assert!(!pad.is_null());
        assert!(nnb_zeropad2d_forward(pad, input).is_null());
        assert!(nnb_last_error_length() > 0);
        expect_error("too large");
        nnb_module_dispose(pad);

        let pad = nnb_constantpad1d_ctor(0.0, i64::MAX, no_view());
        assert!(nnb_constantpad1d_forward(pad, input).is_null());
        expect_error("too large");
        nnb_module_dispose(pad);
    }
    dispose(&[input]);
}
