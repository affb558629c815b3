//! Streams a pattern to a V4L2 output device, e.g. one created with
//! `modprobe v4l2loopback`, until Ctrl-C is pressed.
//!
//! With `--pattern external`, a separate thread plays the part of an external
//! producer and pushes its own frames into the camera.
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Arg, Command};
use log::warn;

use vcam::framegen::FrameGenerator;
use vcam::{
    EmptyQueuePolicy, FrameBuffer, FrameGeometry, Pattern, StreamConfig, StreamState,
    VirtualCamera,
};

/// Push frames into `camera` at roughly its own frame rate until `lets_quit`
/// is set.
fn produce_frames(camera: Arc<VirtualCamera>, lets_quit: Arc<AtomicBool>) {
    let geometry = camera.geometry();
    let interval = camera.config().frame_interval;
    let generator = FrameGenerator::new(geometry, Pattern::VideoFilePlaceholder);
    let start = Instant::now();

    let mut frame_index = 0u64;
    while !lets_quit.load(Ordering::SeqCst) {
        let mut frame = FrameBuffer::new(geometry);
        if let Err(e) = generator.fill(&mut frame, frame_index, start.elapsed()) {
            warn!("Cannot generate frame: {}", e);
            break;
        }
        if let Err(e) = camera.push_frame(frame.into_vec()) {
            warn!("Frame {} rejected: {}", frame_index, e);
        }

        frame_index += 1;
        thread::sleep(interval);
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let matches = Command::new("Virtual camera streamer")
        .arg(
            Arg::new("device")
                .required(true)
                .help("Path to the V4L2 output device (e.g. a v4l2loopback node)"),
        )
        .arg(
            Arg::new("pattern")
                .long("pattern")
                .takes_value(true)
                .default_value("test")
                .help("Pattern to stream (test, bars, image, video or external)"),
        )
        .arg(
            Arg::new("frame_size")
                .long("frame_size")
                .takes_value(true)
                .default_value("640x480")
                .help("Size of the streamed frames (e.g. \"640x480\")"),
        )
        .arg(
            Arg::new("num_frames")
                .long("stop_after")
                .takes_value(true)
                .help("Stop after streaming this number of frames"),
        )
        .arg(
            Arg::new("placeholder")
                .long("placeholder")
                .help("With the external pattern, stream a placeholder when no frame is queued"),
        )
        .get_matches();

    let device_path = matches.value_of("device").unwrap_or("/dev/video0");
    let pattern: Pattern = matches
        .value_of("pattern")
        .unwrap_or("test")
        .parse()
        .context("Invalid value for pattern")?;
    let geometry: FrameGeometry = matches
        .value_of("frame_size")
        .unwrap_or("640x480")
        .parse()
        .context("Invalid value for frame_size")?;
    let stop_after = matches
        .value_of("num_frames")
        .map(|n| n.parse::<u64>())
        .transpose()
        .context("Invalid value for stop_after")?;
    let empty_queue_policy = if matches.is_present("placeholder") {
        EmptyQueuePolicy::Placeholder
    } else {
        EmptyQueuePolicy::Skip
    };

    let lets_quit = Arc::new(AtomicBool::new(false));
    // Setup the Ctrl+c handler.
    {
        let lets_quit_handler = lets_quit.clone();
        ctrlc::set_handler(move || {
            lets_quit_handler.store(true, Ordering::SeqCst);
        })
        .context("Failed to set Ctrl-C handler")?;
    }

    let config = StreamConfig::new()
        .geometry(geometry.width, geometry.height)
        .empty_queue_policy(empty_queue_policy);
    let camera = Arc::new(
        VirtualCamera::initialize(Path::new(device_path), config)
            .context("Failed to open device")?,
    );

    camera.start(pattern).context("Failed to start streaming")?;
    println!("Streaming {} frames to {}", geometry, device_path);

    let producer = if pattern == Pattern::ExternalSource {
        let camera = Arc::clone(&camera);
        let lets_quit = Arc::clone(&lets_quit);
        Some(thread::spawn(move || produce_frames(camera, lets_quit)))
    } else {
        None
    };

    while !lets_quit.load(Ordering::SeqCst) {
        if camera.state() != StreamState::Running {
            break;
        }
        if matches!(stop_after, Some(n) if camera.frame_count() >= n) {
            break;
        }

        let stats = camera.stats();
        print!(
            "\rFrame {}: {} written, {} skipped, {} dropped",
            stats.frame_count, stats.frames_written, stats.ticks_skipped, stats.frames_evicted
        );
        std::io::Write::flush(&mut std::io::stdout())?;
        thread::sleep(Duration::from_millis(100));
    }
    println!();

    lets_quit.store(true, Ordering::SeqCst);
    if let Some(producer) = producer {
        let _ = producer.join();
    }

    let res = camera.stop();
    let stats = camera.stats();
    println!(
        "{} frames streamed, {} written, {} partial writes",
        stats.frame_count, stats.frames_written, stats.partial_writes
    );
    camera.shutdown();

    res.context("Streaming interrupted")
}
