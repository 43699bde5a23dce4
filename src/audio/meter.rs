/// Level reported for an empty or failed probe window. Matches the RMS
/// floor below (`20 * log10(1e-6)`), so a sentinel is indistinguishable
/// from a truly dead-quiet input.
pub const SILENCE_FLOOR_DB: f32 = -120.0;

/// Window loudness in dBFS.
pub fn rms_db(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return SILENCE_FLOOR_DB;
    }
    let energy: f32 = samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32;
    let rms = energy.sqrt().max(1e-6);
    20.0 * rms.log10()
}
