use crossbeam_channel::{Sender, TrySendError};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

/// Downmix interleaved input to mono while converting each sample, so the
/// classifier always sees a single channel regardless of the microphone layout.
pub(super) fn append_downmixed_samples<T, F>(
    buf: &mut Vec<i16>,
    data: &[T],
    channels: usize,
    mut convert: F,
) where
    T: Copy,
    F: FnMut(T) -> i16,
{
    if channels <= 1 {
        buf.extend(data.iter().copied().map(&mut convert));
        return;
    }

    // Average each interleaved frame in a wider accumulator.
    let mut acc = 0i32;
    let mut count = 0i32;
    for sample in data.iter().copied() {
        acc += i32::from(convert(sample));
        count += 1;
        if count as usize == channels {
            buf.push((acc / count) as i16);
            acc = 0;
            count = 0;
        }
    }
    if count > 0 {
        buf.push((acc / count) as i16);
    }
}

/// Cuts the device callback stream into exact frames for the capture loop.
/// Frames that find the channel full are dropped and counted.
pub(super) struct FrameDispatcher {
    frame_samples: usize,
    pending: Vec<i16>,
    scratch: Vec<i16>,
    sender: Sender<Vec<i16>>,
    dropped: Arc<AtomicUsize>,
}

impl FrameDispatcher {
    pub(super) fn new(
        frame_samples: usize,
        sender: Sender<Vec<i16>>,
        dropped: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            frame_samples: frame_samples.max(1),
            pending: Vec::with_capacity(frame_samples),
            scratch: Vec::new(),
            sender,
            dropped,
        }
    }

    pub(super) fn push<T, F>(&mut self, data: &[T], channels: usize, convert: F)
    where
        T: Copy,
        F: FnMut(T) -> i16,
    {
        self.scratch.clear();
        append_downmixed_samples(&mut self.scratch, data, channels, convert);
        self.pending.extend_from_slice(&self.scratch);

        while self.pending.len() >= self.frame_samples {
            let frame: Vec<i16> = self.pending.drain(..self.frame_samples).collect();
            if let Err(err) = self.sender.try_send(frame) {
                match err {
                    TrySendError::Full(_) => {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                    TrySendError::Disconnected(_) => break,
                }
            }
        }
    }
}

/// Output frames covered by a callback buffer of `samples` interleaved
/// samples. A buffer shorter than a frame still counts as one.
pub(super) fn frames_spanned(samples: usize, channels: usize, frame_samples: usize) -> usize {
    (samples / channels.max(1) / frame_samples.max(1)).max(1)
}

pub(super) fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * 32_767.0) as i16
}

pub(super) fn u16_to_i16(sample: u16) -> i16 {
    (i32::from(sample) - 32_768) as i16
}
