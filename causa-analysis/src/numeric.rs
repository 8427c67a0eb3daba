//! Numeric projection of store values and the small statistics the
//! detectors share.

use serde_json::Value;

/// Projects a JSON value onto one number.
///
/// Numbers map to themselves and booleans to 0/1. Objects and arrays map
/// to the mean of their directly contained numbers. Anything else has no
/// numeric value.
pub fn numeric_projection(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Array(items) => mean(&items.iter().filter_map(Value::as_f64).collect::<Vec<_>>()),
        Value::Object(map) => mean(&map.values().filter_map(Value::as_f64).collect::<Vec<_>>()),
        _ => None,
    }
}

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(xs: &[f64]) -> Option<f64> {
    if xs.is_empty() {
        None
    } else {
        Some(xs.iter().sum::<f64>() / xs.len() as f64)
    }
}

/// Population variance, `None` for an empty slice.
pub fn variance(xs: &[f64]) -> Option<f64> {
    let m = mean(xs)?;
    Some(xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / xs.len() as f64)
}

/// Least-squares fit of `ys` against their indices: `(slope, r_squared)`.
pub fn linear_trend(ys: &[f64]) -> Option<(f64, f64)> {
    if ys.len() < 2 {
        return None;
    }
    let n = ys.len() as f64;
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = mean(ys)?;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (i, y) in ys.iter().enumerate() {
        let dx = i as f64 - mean_x;
        let dy = y - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    let slope = sxy / sxx;
    let r_squared = if syy == 0.0 { 0.0 } else { (sxy * sxy) / (sxx * syy) };
    Some((slope, r_squared))
}

/// Autocorrelation of `xs` at `lag`, normalized by the full-series variance.
///
/// `None` for a constant series or a lag that leaves no overlap.
pub fn autocorrelation(xs: &[f64], lag: usize) -> Option<f64> {
    if lag == 0 || lag >= xs.len() {
        return None;
    }
    let m = mean(xs)?;
    let denom: f64 = xs.iter().map(|x| (x - m).powi(2)).sum();
    if denom == 0.0 {
        return None;
    }
    let num: f64 = xs
        .iter()
        .zip(&xs[lag..])
        .map(|(a, b)| (a - m) * (b - m))
        .sum();
    Some(num / denom)
}
