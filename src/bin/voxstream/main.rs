//! VoxStream: capture microphone audio, pick out speech, and stream it to a
//! server over UDP with a short lookback before each utterance.

mod cli_utils;

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::panic;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use voxstream::{
    audio::{AudioSource, PcmSource, Thresholds},
    command::{spawn_command_listener, CommandHandler},
    config::{AppConfig, StreamConfig},
    indicator::{LedPanel, LogIndicator},
    init_logging, log_debug, log_file_path, log_panic,
    stream::{Clock, ExitReason, FrameClock, StreamPipeline},
    telemetry::init_tracing,
    transport::UdpSink,
};

use crate::cli_utils::{format_metrics, list_input_devices};

fn main() -> Result<()> {
    let config = AppConfig::parse();
    if config.list_input_devices {
        list_input_devices()?;
        return Ok(());
    }

    config.validate()?;
    init_logging(&config);
    init_tracing(&config);
    install_panic_hook();
    log_debug("=== VoxStream Started ===");
    log_debug(&format!("Log file: {:?}", log_file_path()));

    let stream_cfg = config.stream_config();
    let thresholds = Thresholds::from_config(&stream_cfg);
    let sink = UdpSink::connect(config.bind, config.server)?;
    log_debug(&format!(
        "streaming to {} from {}",
        sink.peer(),
        sink.local_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown".to_string())
    ));

    let stop = Arc::new(AtomicBool::new(false));
    let listener = if config.no_commands {
        None
    } else {
        let socket = sink
            .try_clone_socket()
            .context("failed to clone UDP socket for the command listener")?;
        let handler = CommandHandler::new(thresholds.clone(), LedPanel::new());
        Some(
            spawn_command_listener(socket, handler, stop.clone())
                .context("failed to start command listener")?,
        )
    };

    let result = match &config.input_file {
        Some(path) => {
            let source = PcmSource::from_file(path)?;
            run_stream(
                &stream_cfg,
                source,
                FrameClock::from_config(&stream_cfg),
                sink,
                thresholds,
                &stop,
            )
        }
        None => run_microphone(&config, &stream_cfg, sink, thresholds, &stop),
    };

    stop.store(true, Ordering::Relaxed);
    if let Some(handle) = listener {
        if handle.join().is_err() {
            log_debug("command listener panicked");
        }
    }
    result
}

#[cfg(feature = "mic-capture")]
fn run_microphone(
    config: &AppConfig,
    stream_cfg: &StreamConfig,
    sink: UdpSink,
    thresholds: Thresholds,
    stop: &AtomicBool,
) -> Result<()> {
    use voxstream::audio::Recorder;
    use voxstream::stream::MonotonicClock;

    let recorder = Recorder::new(config.input_device.as_deref())?;
    let source = recorder.open(stream_cfg)?;
    eprintln!("Listening on '{}'", recorder.device_name());
    run_stream(
        stream_cfg,
        source,
        MonotonicClock::new(),
        sink,
        thresholds,
        stop,
    )
}

#[cfg(not(feature = "mic-capture"))]
fn run_microphone(
    _config: &AppConfig,
    _stream_cfg: &StreamConfig,
    _sink: UdpSink,
    _thresholds: Thresholds,
    _stop: &AtomicBool,
) -> Result<()> {
    bail!("microphone capture is not available in this build; pass --input-file")
}

fn run_stream<S: AudioSource, C: Clock>(
    stream_cfg: &StreamConfig,
    source: S,
    clock: C,
    sink: UdpSink,
    thresholds: Thresholds,
    stop: &AtomicBool,
) -> Result<()> {
    log_debug(&format!("capturing from {}", source.name()));
    let mut pipeline = StreamPipeline::from_config(
        stream_cfg,
        source,
        thresholds,
        sink,
        LogIndicator::new(),
        clock,
    );
    let reason = pipeline.run(Some(stop), stream_cfg.max_consecutive_timeouts);
    let summary = format_metrics(pipeline.metrics());
    log_debug(&format!("{} | {summary}", reason.label()));
    eprintln!("{summary}");

    match reason {
        ExitReason::EndOfStream | ExitReason::Stopped => Ok(()),
        ExitReason::Failed(message) => bail!("stream stopped: {message}"),
    }
}

fn install_panic_hook() {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        log_panic(info);
        let location = info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        log_debug(&format!("panic at {location}"));
        previous(info);
    }));
}
