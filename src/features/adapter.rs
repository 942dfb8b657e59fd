//! Flattening and shaping rules shared by the classifier and the detector.

use super::FeatureInput;

/// Flatten caller features into the canonical vector. `None` means the caller
/// sent nothing usable; downstream stages treat that as the no-signal case
/// rather than an error.
pub fn prepare(input: &FeatureInput) -> Option<Vec<f32>> {
    let values: Vec<f32> = match input {
        FeatureInput::Samples(v) => v.clone(),
        FeatureInput::Frames(frames) => frames.iter().flat_map(|f| f.to_values()).collect(),
    };
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}

/// Mean energy content: the `energy` field averaged across frames, or the
/// mean of the raw vector when the caller sent plain samples.
pub fn mean_energy(input: &FeatureInput) -> Option<f32> {
    match input {
        FeatureInput::Samples(v) if !v.is_empty() => {
            Some(v.iter().sum::<f32>() / v.len() as f32)
        }
        FeatureInput::Frames(frames) if !frames.is_empty() => {
            Some(frames.iter().map(|f| f.energy).sum::<f32>() / frames.len() as f32)
        }
        _ => None,
    }
}

/// Zero-pad or truncate to `dim`.
pub fn resize(raw: &[f32], dim: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; dim];
    let copy = raw.len().min(dim);
    out[..copy].copy_from_slice(&raw[..copy]);
    out
}
