// crabcapture simulator
// Runs a CaptureFilter against the mock backend with a fixed host tick and
// prints per-second capture statistics.

use anyhow::{anyhow, bail, Context};
use crabcapture::testing::MockBackend;
use crabcapture::{
    CameraBackend, CaptureEvent, CaptureFilter, CaptureSettings, DeviceRegistry, MediaFilter,
    TickerClock, VideoSize, YuvFrame,
};
use std::collections::VecDeque;
use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct Options {
    device: Option<String>,
    size: VideoSize,
    fps: Option<f32>,
    feed_fps: f32,
    rotation: i32,
    seconds: u64,
    tick_ms: u64,
    json: bool,
    snapshot: Option<PathBuf>,
    config: Option<PathBuf>,
}

fn usage() -> ! {
    eprintln!(
        "Usage: crabcapture-sim [--device <id>] [--size WxH] [--fps F] [--feed-fps F] \
         [--rotation DEG] [--seconds N] [--tick-ms MS] [--json] [--snapshot out.png] [--config file.toml]"
    );
    std::process::exit(1);
}

fn parse_size(s: &str) -> anyhow::Result<VideoSize> {
    let (w, h) = s
        .split_once('x')
        .ok_or_else(|| anyhow!("size must look like 640x480, got {}", s))?;
    Ok(VideoSize::new(w.parse()?, h.parse()?))
}

fn parse_args() -> anyhow::Result<Options> {
    let args: Vec<String> = env::args().skip(1).collect();
    let mut options = Options {
        device: None,
        size: VideoSize::vga(),
        fps: None,
        feed_fps: 30.0,
        rotation: 0,
        seconds: 5,
        tick_ms: 10,
        json: false,
        snapshot: None,
        config: None,
    };

    let mut i = 0;
    while i < args.len() {
        let flag = args[i].as_str();
        let mut value = || {
            i += 1;
            args.get(i).cloned().ok_or_else(|| anyhow!("{} needs a value", flag))
        };
        match flag {
            "--device" => options.device = Some(value()?),
            "--size" => options.size = parse_size(&value()?)?,
            "--fps" => options.fps = Some(value()?.parse()?),
            "--feed-fps" => options.feed_fps = value()?.parse()?,
            "--rotation" => options.rotation = value()?.parse()?,
            "--seconds" => options.seconds = value()?.parse()?,
            "--tick-ms" => options.tick_ms = value()?.parse()?,
            "--snapshot" => options.snapshot = Some(PathBuf::from(value()?)),
            "--config" => options.config = Some(PathBuf::from(value()?)),
            "--json" => options.json = true,
            "--help" | "-h" => usage(),
            other => bail!("unknown argument {}", other),
        }
        i += 1;
    }
    if options.tick_ms == 0 {
        bail!("--tick-ms must be positive");
    }
    Ok(options)
}

fn save_snapshot(frame: &YuvFrame, path: &PathBuf) -> anyhow::Result<()> {
    let luma = image::GrayImage::from_raw(frame.width(), frame.height(), frame.y().to_vec())
        .ok_or_else(|| anyhow!("luma plane does not match {}", frame.size()))?;
    luma.save(path)
        .with_context(|| format!("writing snapshot to {}", path.display()))?;
    println!("Saved {} luma snapshot to {}", frame.size(), path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let options = parse_args()?;

    let settings = match &options.config {
        Some(path) => CaptureSettings::load_layered(path)?,
        None => CaptureSettings::default(),
    };
    crabcapture::init_logging_with_filter(&settings.logging.filter);

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))
            .context("installing Ctrl-C handler")?;
    }

    let mock = Arc::new(MockBackend::new());
    let backend: Arc<dyn CameraBackend> = mock.clone();
    let registry = DeviceRegistry::detect(backend.as_ref())?;
    let registry_id = match options.device.clone() {
        Some(id) => id,
        None => registry
            .default_device()
            .map(|d| d.registry_id())
            .ok_or_else(|| anyhow!("no camera registered"))?,
    };

    let ticker = TickerClock::new();
    let device = registry
        .get(&registry_id)
        .cloned()
        .ok_or_else(|| anyhow!("no registered device {}", registry_id))?;
    let filter = CaptureFilter::with_settings(backend, device, Arc::new(ticker.clone()), &settings);
    let mut events = filter.subscribe();

    if let Some(fps) = options.fps {
        filter.set_fps(fps)?;
    }
    filter.set_device_rotation(options.rotation)?;
    filter.set_video_size(options.size)?;
    while let Ok(CaptureEvent::PreviewSizeChanged(size)) = events.try_recv() {
        println!("Capturing {} as {} from {}", size, filter.get_video_size(), registry_id);
    }

    filter.preprocess();
    let feed = mock.start_feed(options.feed_fps);

    let mut out: VecDeque<YuvFrame> = VecDeque::new();
    let mut last: Option<YuvFrame> = None;
    let mut tick = tokio::time::interval(Duration::from_millis(options.tick_ms));
    let ticks_per_second = (1000 / options.tick_ms).max(1);
    let total_ticks = options.seconds * 1000 / options.tick_ms;

    for n in 1..=total_ticks {
        if !running.load(Ordering::SeqCst) {
            println!("Interrupted");
            break;
        }
        tick.tick().await;
        filter.process(&mut out);
        if let Some(frame) = out.drain(..).last() {
            last = Some(frame);
        }

        if n % ticks_per_second == 0 {
            let stats = filter.stats();
            if options.json {
                println!("{}", serde_json::to_string(&stats)?);
            } else {
                println!(
                    "t={}s fps={:.2} delivered={} rate_limited={} replaced={}",
                    n / ticks_per_second,
                    filter.get_fps(),
                    stats.delivered,
                    stats.rate_limited,
                    stats.replaced
                );
            }
        }
    }

    let fed = feed.stop();
    filter.postprocess();
    println!("Backend fed {} images", fed);

    if let (Some(path), Some(frame)) = (&options.snapshot, &last) {
        save_snapshot(frame, path)?;
    }

    filter.uninit();
    Ok(())
}
