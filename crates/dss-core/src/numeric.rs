//! Helpers for the flat float arrays the engine hands back.

/// Scalar of every engine array: volts, amps, kW, kvar, degrees.
pub type Real = f64;

/// True when any entry of an engine array is NaN.
pub fn contains_nan(values: &[Real]) -> bool {
    values.iter().any(|v| v.is_nan())
}

/// Split a flat `[a0, b0, a1, b1, ...]` engine array into `(a, b)` pairs.
///
/// A trailing unpaired value is dropped.
pub fn deinterleave(flat: &[Real]) -> Vec<(Real, Real)> {
    flat.chunks_exact(2).map(|c| (c[0], c[1])).collect()
}

/// Rectangular `(re, im)` to polar `(magnitude, angle in degrees)`.
pub fn to_polar_deg(re: Real, im: Real) -> (Real, Real) {
    (re.hypot(im), im.atan2(re).to_degrees())
}

/// Polar `(magnitude, angle in degrees)` to rectangular `(re, im)`.
pub fn from_polar_deg(mag: Real, angle_deg: Real) -> (Real, Real) {
    let theta = angle_deg.to_radians();
    (mag * theta.cos(), mag * theta.sin())
}
