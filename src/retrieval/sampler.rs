//! Random URL sampling without replacement.

use std::collections::HashSet;

use rand::Rng;

/// Draw `min(requested, urls.len())` distinct URLs, each with a trailing newline.
///
/// A single request from a longer list draws one index directly; otherwise
/// distinct indices are drawn by reject-and-retry. Output follows draw order.
pub fn sample<R: Rng + ?Sized>(urls: &[String], requested: usize, rng: &mut R) -> Vec<String> {
    let len = urls.len();
    let requested = requested.max(1);
    let k = requested.min(len);
    if k == 0 {
        return Vec::new();
    }

    if k == 1 && requested == 1 && k < len {
        let i = rng.gen_range(0..len);
        return vec![format!("{}\n", urls[i])];
    }

    let mut seen = HashSet::with_capacity(k);
    let mut picked = Vec::with_capacity(k);
    while picked.len() < k {
        let i = rng.gen_range(0..len);
        if seen.insert(i) {
            picked.push(format!("{}\n", urls[i]));
        }
    }
    picked
}
