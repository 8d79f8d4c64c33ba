use anyhow::{Context, Result};
use log::{info, warn};
use playback_engine::{
    CpalAudioDevice, EngineConfig, HeadlessSurface, MediaItem, OutputDevices, PlaybackController, PlaybackState,
};
use std::thread;
use std::time::{Duration, Instant};

fn main() -> Result<()> {
    // 初始化日志
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .filter_module("cpal", log::LevelFilter::Warn)
        .init();

    let mut args = std::env::args().skip(1);
    let Some(url) = args.next() else {
        eprintln!("用法: playback-engine <url-or-path> [config.json]");
        std::process::exit(2);
    };

    let config = match args.next() {
        Some(path) => EngineConfig::load(&path)?,
        None => EngineConfig::default(),
    };

    info!("🎬 Playback Engine 启动");

    ffmpeg_next::init().map_err(|e| anyhow::anyhow!("FFmpeg 初始化失败: {}", e))?;
    ffmpeg_next::util::log::set_level(ffmpeg_next::util::log::Level::Error);

    let audio = CpalAudioDevice::new().context("无法初始化音频输出")?;
    let devices = OutputDevices::new(Box::new(HeadlessSurface::new()), Box::new(audio));
    let mut controller = PlaybackController::with_config(devices, config)?;

    controller.load(&MediaItem::new(url))?;
    info!("⏱️  时长: {:.2}s", controller.duration());
    if let Some((width, height)) = controller.video_size() {
        info!("🖼️ 视频尺寸: {}x{}", width, height);
    }

    controller.play()?;

    let mut last_report = Instant::now();
    while controller.state() == PlaybackState::Playing && !controller.is_end_of_stream() {
        thread::sleep(Duration::from_millis(50));
        if last_report.elapsed() >= Duration::from_secs(1) {
            info!("▶️  位置: {:.2}s / {:.2}s", controller.position(), controller.duration());
            last_report = Instant::now();
        }
    }

    if controller.state() == PlaybackState::Error {
        warn!("❌ 播放出错: {}", controller.last_error_string());
    }

    controller.stop();
    info!("👋 播放结束");
    Ok(())
}
