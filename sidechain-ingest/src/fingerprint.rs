//! Acoustic fingerprinting: Hann-windowed spectrogram, band-local peak
//! picking, anchor/target pairing, and the content-addressable primary
//! hash (spec §4.1 steps 2-5).
//!
//! FFT via `rustfft` — not part of the teacher's own stack, but the
//! ecosystem-idiomatic choice for spectral work (noted in DESIGN.md).

use crate::error::{IngestError, Result};
use rustfft::num_complex::Complex32;
use rustfft::FftPlanner;
use sha2::{Digest, Sha256};
use std::sync::Arc;

pub const FRAME_SIZE: usize = 1024;
pub const HOP_SIZE: usize = 256;
pub const BANDS: usize = 6;
pub const PEAKS_PER_BAND: usize = 3;
pub const TARGET_ZONE: usize = 5;

/// One spectral peak: which frequency bin, in which STFT frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    pub frame: usize,
    pub bin: usize,
    pub magnitude: f32,
}

/// A fully computed fingerprint, derived deterministically from PCM
/// samples (spec §3 Fingerprint invariants).
#[derive(Debug, Clone)]
pub struct Fingerprint {
    pub primary_hash: String,
    pub hashes: Vec<u32>,
    pub timestamps: Vec<u32>,
    pub duration_secs: f64,
}

/// Windows `pcm` into overlapping frames, applies a Hann window, and
/// returns the magnitude spectrum's lower half for each frame (spec §4.1
/// step 2).
pub fn spectrogram(pcm: &[f32], sample_rate: u32) -> Vec<Vec<f32>> {
    if pcm.len() < FRAME_SIZE {
        return Vec::new();
    }

    let hann: Vec<f32> = (0..FRAME_SIZE)
        .map(|n| {
            0.5 * (1.0
                - (2.0 * std::f32::consts::PI * n as f32 / (FRAME_SIZE as f32 - 1.0)).cos())
        })
        .collect();

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(FRAME_SIZE);

    let mut frames = Vec::new();
    let mut start = 0;
    while start + FRAME_SIZE <= pcm.len() {
        let mut buffer: Vec<Complex32> = pcm[start..start + FRAME_SIZE]
            .iter()
            .zip(&hann)
            .map(|(s, w)| Complex32::new(s * w, 0.0))
            .collect();
        fft.process(&mut buffer);

        let half = FRAME_SIZE / 2;
        let magnitudes: Vec<f32> = buffer[..half].iter().map(|c| c.norm()).collect();
        frames.push(magnitudes);

        start += HOP_SIZE;
    }

    let _ = sample_rate;
    frames
}

/// Partitions each frame's bins into `BANDS` equal bands and keeps the
/// top `PEAKS_PER_BAND` local maxima per band (spec §4.1 step 3). A
/// local maximum requires both in-band neighbors to be strictly
/// smaller.
pub fn pick_peaks(frames: &[Vec<f32>]) -> Vec<Peak> {
    let mut peaks = Vec::new();
    for (frame_idx, bins) in frames.iter().enumerate() {
        if bins.is_empty() {
            continue;
        }
        let band_size = (bins.len() / BANDS).max(1);

        for band in 0..BANDS {
            let band_start = band * band_size;
            let band_end = if band == BANDS - 1 {
                bins.len()
            } else {
                (band_start + band_size).min(bins.len())
            };
            if band_end <= band_start {
                continue;
            }

            let mut local_maxima: Vec<Peak> = Vec::new();
            for i in band_start..band_end {
                let is_local_max = (i == band_start || bins[i] > bins[i - 1])
                    && (i == band_end - 1 || bins[i] > bins[i + 1]);
                if is_local_max {
                    local_maxima.push(Peak {
                        frame: frame_idx,
                        bin: i,
                        magnitude: bins[i],
                    });
                }
            }

            local_maxima.sort_by(|a, b| b.magnitude.partial_cmp(&a.magnitude).unwrap());
            peaks.extend(local_maxima.into_iter().take(PEAKS_PER_BAND));
        }
    }
    peaks
}

/// Pairs each anchor peak with every subsequent peak within
/// `TARGET_ZONE` frames, encoding each pair into a 32-bit hash:
/// anchor-bin in bits [23..31], target-bin in bits [14..22], Δframe in
/// bits [0..13] (spec §4.1 step 4). Returns `(hash, anchor_frame)`
/// pairs, one per combinatorial anchor/target pairing.
pub fn hash_peaks(mut peaks: Vec<Peak>) -> Result<Vec<(u32, u32)>> {
    if peaks.len() < 2 {
        return Err(IngestError::InsufficientPeaks);
    }
    peaks.sort_by_key(|p| p.frame);

    let mut hashes = Vec::new();
    for (i, anchor) in peaks.iter().enumerate() {
        for target in peaks.iter().skip(i + 1) {
            let delta = target.frame.saturating_sub(anchor.frame);
            if delta == 0 || delta > TARGET_ZONE {
                continue;
            }
            let hash = ((anchor.bin as u32 & 0x1FF) << 23)
                | ((target.bin as u32 & 0x1FF) << 14)
                | (delta as u32 & 0x3FFF);
            hashes.push((hash, anchor.frame as u32));
        }
    }

    if hashes.is_empty() {
        return Err(IngestError::InsufficientPeaks);
    }
    Ok(hashes)
}

/// SHA-256 of the ascending-sorted, little-endian-serialized hash list,
/// truncated to 16 bytes and hex-encoded — the content-address of the
/// audio (spec §4.1 step 5). Deterministic regardless of the order
/// hashes were produced in, since they're sorted before hashing.
pub fn primary_hash(hashes: &[u32]) -> String {
    let mut sorted = hashes.to_vec();
    sorted.sort_unstable();

    let mut bytes = Vec::with_capacity(sorted.len() * 4);
    for h in &sorted {
        bytes.extend_from_slice(&h.to_le_bytes());
    }

    let digest = Sha256::digest(&bytes);
    hex::encode(&digest[..16])
}



/// Runs the full spec §4.1 steps 2-5 pipeline over decoded PCM.
pub fn fingerprint_pcm(pcm: Arc<Vec<f32>>, sample_rate: u32) -> Result<Fingerprint> {
    let frames = spectrogram(&pcm, sample_rate);
    let peaks = pick_peaks(&frames);
    let pairs = hash_peaks(peaks)?;

    let hashes: Vec<u32> = pairs.iter().map(|(h, _)| *h).collect();
    let timestamps: Vec<u32> = pairs.iter().map(|(_, t)| *t).collect();
    let hash = primary_hash(&hashes);

    Ok(Fingerprint {
        primary_hash: hash,
        hashes,
        timestamps,
        duration_secs: pcm.len() as f64 / sample_rate as f64,
    })
}

/// Jaccard similarity between two hash multisets, the documented
/// extension point for fuzzy matching beyond exact primary-hash
/// equality (spec §4.1 step 6, §9 Open Question (i)). Not wired into
/// the default match step.
pub fn jaccard_similarity(a: &[u32], b: &[u32]) -> f64 {
    use std::collections::HashSet;
    let set_a: HashSet<u32> = a.iter().copied().collect();
    let set_b: HashSet<u32> = b.iter().copied().collect();
    if set_a.is_empty() && set_b.is_empty() {
        return 1.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_wave(freq: f32, sample_rate: u32, seconds: f32) -> Vec<f32> {
        let n = (sample_rate as f32 * seconds) as usize;
        (0..n)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                (2.0 * std::f32::consts::PI * freq * t).sin()
            })
            .collect()
    }

    #[test]
    fn primary_hash_is_deterministic() {
        let hashes = vec![5u32, 1, 3, 2, 4];
        let h1 = primary_hash(&hashes);
        let mut permuted = hashes.clone();
        permuted.reverse();
        let h2 = primary_hash(&permuted);
        assert_eq!(h1, h2, "permuting the hash list before sorting must not change the primary hash");
    }

    #[test]
    fn primary_hash_differs_for_different_inputs() {
        let h1 = primary_hash(&[1, 2, 3]);
        let h2 = primary_hash(&[1, 2, 4]);
        assert_ne!(h1, h2);
    }

    #[test]
    fn fingerprint_of_sine_wave_is_deterministic_across_runs() {
        let pcm = Arc::new(sine_wave(440.0, 8000, 10.0));
        let fp1 = fingerprint_pcm(pcm.clone(), 8000).unwrap();
        let fp2 = fingerprint_pcm(pcm, 8000).unwrap();
        assert_eq!(fp1.primary_hash, fp2.primary_hash);
        assert_eq!(fp1.hashes.len(), fp1.timestamps.len());
    }

    #[test]
    fn silence_below_two_peaks_is_insufficient() {
        let pcm = Arc::new(vec![0.0f32; FRAME_SIZE * 2]);
        let result = fingerprint_pcm(pcm, 8000);
        assert!(matches!(result, Err(IngestError::InsufficientPeaks)));
    }

    #[test]
    fn jaccard_identical_sets_is_one() {
        assert_eq!(jaccard_similarity(&[1, 2, 3], &[1, 2, 3]), 1.0);
    }

    #[test]
    fn jaccard_disjoint_sets_is_zero() {
        assert_eq!(jaccard_similarity(&[1, 2], &[3, 4]), 0.0);
    }
}
