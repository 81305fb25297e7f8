//! Small numerical helpers shared by the analysis stages: transform sizes,
//! finite differences, reductions and array rotation.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

/// Returns the smallest length `>= n` whose prime factors are all in
/// {2, 3, 5, 7, 11}. Such lengths are handled by mixed-radix FFT kernels.
pub fn next_fast_len(n: usize) -> usize {
    if n <= 1 {
        return 1;
    }
    let mut candidate = n;
    loop {
        let mut rest = candidate;
        for p in [2, 3, 5, 7, 11] {
            while rest % p == 0 {
                rest /= p;
            }
        }
        if rest == 1 {
            return candidate;
        }
        candidate += 1;
    }
}

/// First-order gradient with central differences in the interior and
/// one-sided differences at the boundaries, as implemented by numpy (python).
pub fn gradient(x: &ArrayView1<f32>) -> Array1<f32> {
    let n = x.len();
    let mut grad = Array1::<f32>::zeros(n);
    if n < 2 {
        return grad;
    }
    grad[0] = x[1] - x[0];
    grad[n - 1] = x[n - 1] - x[n - 2];
    for i in 1..n - 1 {
        grad[i] = (x[i + 1] - x[i - 1]) / 2.0;
    }
    grad
}

/// Discrete second derivative obtained by applying [`gradient`] twice.
pub fn second_derivative(x: &ArrayView1<f32>) -> Array1<f32> {
    gradient(&gradient(x).view())
}

pub fn mean(x: &ArrayView1<f32>) -> f32 {
    x.mean().unwrap_or(0.0)
}

/// Population standard deviation of every row of `data`.
pub fn row_std(data: &ArrayView2<f32>) -> Array1<f32> {
    if data.ncols() == 0 {
        return Array1::zeros(data.nrows());
    }
    data.std_axis(Axis(1), 0.0)
}

/// Index of the first maximum. NaNs are never selected.
pub fn argmax(x: &ArrayView1<f32>) -> Option<usize> {
    x.iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .fold(None, |best: Option<(usize, f32)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// Index of the first minimum. NaNs are never selected.
pub fn argmin(x: &ArrayView1<f32>) -> Option<usize> {
    x.iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .fold(None, |best: Option<(usize, f32)>, (i, &v)| match best {
            Some((_, b)) if b <= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// Rotates an image by 90 degrees counter-clockwise (numpy's `rot90`).
pub fn rotate_90_ccw(data: &ArrayView2<f32>) -> Array2<f32> {
    let (rows, cols) = data.dim();
    Array2::from_shape_fn((cols, rows), |(i, j)| data[[j, cols - 1 - i]])
}
