//! Fixed-length PCM frames and their wire encoding.
//!
//! A transmitted frame is the raw sample block with no header: `F` signed
//! 16-bit samples in little-endian order, exactly `F * 2` bytes. The receiver
//! knows `F` and the sample rate out of band.

/// Encoded size of a single sample.
pub const BYTES_PER_SAMPLE: usize = 2;

/// One block of mono PCM samples captured in a single read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    samples: Box<[i16]>,
}

impl Frame {
    /// An all-zero frame of `len` samples.
    pub fn silent(len: usize) -> Self {
        Self {
            samples: vec![0; len].into_boxed_slice(),
        }
    }

    pub fn from_samples(samples: Vec<i16>) -> Self {
        Self {
            samples: samples.into_boxed_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub(super) fn samples_mut(&mut self) -> &mut [i16] {
        &mut self.samples
    }
}

/// Number of bytes a frame of `samples` samples occupies on the wire.
pub fn encoded_len(samples: usize) -> usize {
    samples * BYTES_PER_SAMPLE
}

/// Encode `samples` into `out`, reusing its allocation across cycles.
pub fn encode_frame_into(samples: &[i16], out: &mut Vec<u8>) {
    out.clear();
    out.reserve(encoded_len(samples.len()));
    for sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
}

pub fn encode_frame(samples: &[i16]) -> Vec<u8> {
    let mut out = Vec::new();
    encode_frame_into(samples, &mut out);
    out
}

/// Decode a datagram back into samples. Returns `None` for odd-length input,
/// which cannot be a whole number of samples.
pub fn decode_frame(bytes: &[u8]) -> Option<Vec<i16>> {
    if bytes.len() % BYTES_PER_SAMPLE != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(BYTES_PER_SAMPLE)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect(),
    )
}
