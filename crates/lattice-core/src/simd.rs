//! Lane-batched float arithmetic for the canvas animation path.
//!
//! The batch width is fixed at build time from the enabled target features;
//! the loop bodies operate on fixed-size arrays so the optimizer emits
//! vector instructions where available. Without vector features the width
//! collapses to one and every operation is scalar.

/// Widest supported batch, in f32 lanes.
pub const MAX_LANES: usize = if cfg!(target_feature = "avx") {
    8
} else if cfg!(target_feature = "sse2") {
    4
} else if cfg!(target_feature = "sse") {
    2
} else {
    1
};

#[inline]
fn div_lanes<const N: usize>(a: &[f32], b: &[f32], out: &mut [f32]) {
    let mut va = [0.0f32; N];
    let mut vb = [1.0f32; N];
    va.copy_from_slice(&a[..N]);
    vb.copy_from_slice(&b[..N]);
    let mut vo = [0.0f32; N];
    for i in 0..N {
        vo[i] = va[i] / vb[i];
    }
    out[..N].copy_from_slice(&vo);
}

/// Element-wise division `out[i] = a[i] / b[i]` over `len` lanes.
///
/// `len` must be 1, 2, 4, or 8 and no larger than [`MAX_LANES`]; other
/// lengths fall back to a scalar loop.
pub fn batch_div(a: &[f32], b: &[f32], out: &mut [f32], len: usize) {
    debug_assert!(a.len() >= len && b.len() >= len && out.len() >= len);
    match len {
        8 => div_lanes::<8>(a, b, out),
        4 => div_lanes::<4>(a, b, out),
        2 => div_lanes::<2>(a, b, out),
        _ => {
            for i in 0..len {
                out[i] = a[i] / b[i];
            }
        }
    }
}

/// Element-wise floored modulo `out[i] = a[i] - b[i] * floor(a[i] / b[i])`
/// over `len` lanes, built on top of [`batch_div`].
pub fn batch_modulo(a: &[f32], b: &[f32], out: &mut [f32], len: usize) {
    batch_div(a, b, out, len);
    for i in 0..len {
        out[i] = a[i] - b[i] * out[i].floor();
    }
}
