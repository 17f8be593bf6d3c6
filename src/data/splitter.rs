// ============================================================
// Layer 4 — Train/Validation Splitter
// ============================================================
// Shuffles samples and splits them into a training set and a
// held-out evaluation set.
//
// The image-folder loader returns samples grouped by class, so
// splitting without a shuffle would leave whole identities out
// of training. The shuffle is seeded so that a resumed run sees
// the same split as the run that wrote the checkpoint.

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// Shuffle `samples` with `seed` and split into (train, validation).
///
/// `val_fraction` is the share held out for validation, e.g. 0.2.
/// The validation count is rounded; the rest goes to training.
pub fn split_train_val<T>(mut samples: Vec<T>, val_fraction: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    let mut rng = StdRng::seed_from_u64(seed);
    samples.shuffle(&mut rng);

    let total    = samples.len();
    let val_len  = ((total as f64) * val_fraction).round() as usize;
    let split_at = total - val_len.min(total);

    let val = samples.split_off(split_at);

    tracing::debug!(
        "Dataset split: {} training, {} validation ({}% / {}%)",
        samples.len(),
        val.len(),
        (samples.len() * 100) / total.max(1),
        (val.len()     * 100) / total.max(1),
    );

    (samples, val)
}
