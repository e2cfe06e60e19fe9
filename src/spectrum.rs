//! Hand-rolled radix-2 Cooley-Tukey FFT and magnitude spectrum (§4.12).
//!
//! Deliberately not backed by a library FFT: the spec calls out the
//! decimation-in-time algorithm, bit-reversal permutation, and butterfly
//! loop as testable structure, not just testable output.

const FFT_SIZE: usize = 1024;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpectrumBin {
    pub frequency: f64,
    pub magnitude_db: f64,
}

/// Largest power of two `<= min(len, FFT_SIZE)`, or 0 if `len < 64`.
fn fft_length(len: usize) -> usize {
    let bounded = len.min(FFT_SIZE);
    if bounded < 64 {
        return 0;
    }
    let mut n = 1usize;
    while n * 2 <= bounded {
        n *= 2;
    }
    n
}

fn hann_window(n: usize) -> Vec<f64> {
    if n <= 1 {
        return vec![1.0; n];
    }
    (0..n)
        .map(|i| 0.5 * (1.0 - (core::f64::consts::TAU * i as f64 / (n as f64 - 1.0)).cos()))
        .collect()
}

fn bit_reverse_permute(re: &mut [f64], im: &mut [f64]) {
    let n = re.len();
    let bits = n.trailing_zeros();
    for i in 0..n {
        let j = i.reverse_bits() >> (usize::BITS - bits);
        if j > i {
            re.swap(i, j);
            im.swap(i, j);
        }
    }
}

/// In-place iterative radix-2 DIT FFT. `n` must be a power of two.
fn fft_in_place(re: &mut [f64], im: &mut [f64]) {
    let n = re.len();
    if n <= 1 {
        return;
    }
    bit_reverse_permute(re, im);

    let mut size = 2;
    while size <= n {
        let half = size / 2;
        let angle_step = -core::f64::consts::TAU / size as f64;
        let mut start = 0;
        while start < n {
            for k in 0..half {
                let angle = angle_step * k as f64;
                let (wr, wi) = (angle.cos(), angle.sin());
                let even_idx = start + k;
                let odd_idx = start + k + half;
                let odd_re = re[odd_idx] * wr - im[odd_idx] * wi;
                let odd_im = re[odd_idx] * wi + im[odd_idx] * wr;
                re[odd_idx] = re[even_idx] - odd_re;
                im[odd_idx] = im[even_idx] - odd_im;
                re[even_idx] += odd_re;
                im[even_idx] += odd_im;
            }
            start += size;
        }
        size *= 2;
    }
}

/// Computes the magnitude spectrum of the last `N` samples of `input`, where
/// `N` is the largest power of two `<= min(input.len(), 1024)`. Returns an
/// empty spectrum when `input.len() < 64` (§4.12, §8 boundary behavior).
pub fn magnitude_spectrum(input: &[f64], sample_rate: f64) -> Vec<SpectrumBin> {
    let n = fft_length(input.len());
    if n == 0 {
        return Vec::new();
    }

    let window = hann_window(n);
    let tail = &input[input.len() - n..];
    let mut re: Vec<f64> = tail.iter().zip(window.iter()).map(|(&x, &w)| x * w).collect();
    let mut im = vec![0.0; n];

    fft_in_place(&mut re, &mut im);

    (0..n / 2)
        .map(|k| {
            let mag = (re[k] * re[k] + im[k] * im[k]).sqrt() / n as f64;
            SpectrumBin {
                frequency: k as f64 * sample_rate / n as f64,
                magnitude_db: 20.0 * mag.max(1e-10).log10(),
            }
        })
        .collect()
}
