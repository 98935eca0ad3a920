use anyhow::Result;
use voxstream::stream::StreamMetrics;

pub(crate) fn list_input_devices() -> Result<()> {
    // Support VOXSTREAM_TEST_DEVICES for testing
    let devices = if let Ok(raw) = std::env::var("VOXSTREAM_TEST_DEVICES") {
        parse_device_list(&raw)
    } else {
        system_input_devices()
    };

    if devices.is_empty() {
        println!("No audio input devices detected.");
    } else {
        println!("Available audio input devices:");
        for name in devices {
            println!("  - {name}");
        }
    }
    Ok(())
}

fn parse_device_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

#[cfg(feature = "mic-capture")]
fn system_input_devices() -> Vec<String> {
    voxstream::audio::Recorder::list_devices().unwrap_or_else(|err| {
        eprintln!("Failed to list audio input devices: {err}");
        Vec::new()
    })
}

#[cfg(not(feature = "mic-capture"))]
fn system_input_devices() -> Vec<String> {
    eprintln!("Failed to list audio input devices: built without mic-capture");
    Vec::new()
}

pub(crate) fn format_metrics(metrics: &StreamMetrics) -> String {
    format!(
        "frames captured: {} (speech {}), onsets: {}, frames sent: {} ({} lookback, {} duplicates skipped), send failures: {}, bytes sent: {}, capture timeouts: {}, frames dropped: {}",
        metrics.cycles,
        metrics.speech_frames,
        metrics.onsets,
        metrics.frames_transmitted,
        metrics.lookback_frames,
        metrics.duplicates_skipped,
        metrics.send_failures,
        metrics.bytes_sent,
        metrics.capture_timeouts,
        metrics.frames_dropped
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_device_list_skips_blank_entries() {
        assert!(parse_device_list("").is_empty());
        assert!(parse_device_list("  ,  ").is_empty());
        assert_eq!(
            parse_device_list("Built-in Mic, USB Mic ,"),
            vec!["Built-in Mic".to_string(), "USB Mic".to_string()]
        );
    }

    #[test]
    fn format_metrics_reports_counters() {
        let metrics = StreamMetrics {
            cycles: 10,
            onsets: 1,
            frames_transmitted: 6,
            frames_dropped: 3,
            ..StreamMetrics::default()
        };
        let text = format_metrics(&metrics);
        assert!(text.starts_with("frames captured: 10"));
        assert!(text.contains("onsets: 1"));
        assert!(text.contains("frames sent: 6"));
        assert!(text.ends_with("frames dropped: 3"));
    }
}
