//! Parameter initialisation is process-global, so everything touching the seed lives in one
//! test to keep it away from concurrently running constructors.

mod common;

use common::*;
use nnbridge::ffi::*;

fn weights(module: NNModule) -> Vec<f32> {
    let w = unsafe { nnb_conv2d_weight(module) };
    let out = values(w);
    dispose(&[w]);
    out
}

#[test]
fn test_manual_seed_makes_construction_reproducible() {
    assert!(nnb_init());

    nnb_manual_seed(1234);
    let a = unsafe { nnb_conv2d_ctor(3, 4, 3, 1, 1, 1, 0, 1, true, no_view()) };
    nnb_manual_seed(1234);
    let b = unsafe { nnb_conv2d_ctor(3, 4, 3, 1, 1, 1, 0, 1, true, no_view()) };
    nnb_manual_seed(1234);
    let c = unsafe {
        nnb_conv2d_ctor_per_axis(3, 4, 3, 3, 1, 1, 1, 1, 1, 1, 0, 1, true, no_view())
    };
    let d = unsafe { nnb_conv2d_ctor(3, 4, 3, 1, 1, 1, 0, 1, true, no_view()) };

    assert_eq!(weights(a), weights(b));
    assert_eq!(weights(a), weights(c));
    assert_ne!(weights(a), weights(d), "without reseeding the stream moves on");

    // Weights stay inside the fan-in bound.
    let bound = 1.0 / ((3 * 3 * 3) as f32).sqrt();
    assert!(weights(a).iter().all(|w| w.abs() <= bound));

    let input = ramp(&[1, 3, 5, 5]);
    let out_a = unsafe { nnb_conv2d_forward(a, input) };
    let out_c = unsafe { nnb_conv2d_forward(c, input) };
    let bits = |t| values(t).iter().map(|v| v.to_bits()).collect::<Vec<_>>();
    assert_eq!(bits(out_a), bits(out_c));

    dispose(&[input, out_a, out_c]);
    unsafe {
        for m in [a, b, c, d] {
            nnb_module_dispose(m);
        }
    }
}
