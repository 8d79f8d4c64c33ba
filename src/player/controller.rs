use crate::core::{
    error_string, AudioSpec, EngineConfig, ErrorKind, PlaybackState, Playable, PlayerError, Result,
};
use crate::player::audio_pipeline::AudioPipeline;
use crate::player::decode_loop;
use crate::player::media_source::MediaSource;
use crate::player::output::OutputDevices;
use crate::player::video_pipeline::VideoPipeline;
use ffmpeg_next as ffmpeg;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::process;
use std::sync::Arc;
use std::thread;

fn log_ctx() -> String {
    format!("[pid:{}-tid:{:?}]", process::id(), thread::current().id())
}

/// 一次 `load()` 打开的全部源侧资源
pub(crate) struct LoadedMedia {
    pub(crate) source: MediaSource,
    pub(crate) video: Option<VideoPipeline>,
    pub(crate) audio: Option<AudioPipeline>,
    pub(crate) packet: ffmpeg::Packet,
}

impl LoadedMedia {
    /// 打开媒体源并建立需要的管线
    ///
    /// 任一步失败都会回滚本次已经打开的资源，不会留下半成品。
    pub(crate) fn open(url: &str, devices: &mut OutputDevices, config: &EngineConfig) -> Result<Self> {
        let source = MediaSource::open(url, config)?;

        let video = match source.video_stream() {
            Some(stream) => Some(VideoPipeline::open(&stream, devices.surface.as_mut(), config)?),
            None => None,
        };

        let audio = match source.audio_stream() {
            Some(stream) => match AudioPipeline::open(&stream, devices.audio.as_mut(), config) {
                Ok(pipeline) => Some(pipeline),
                Err(e) => {
                    // 视频侧已经配置了展示表面，先释放它，解码器和源随后按序释放
                    if video.is_some() {
                        devices.surface.release();
                    }
                    return Err(e);
                }
            },
            None => None,
        };

        info!(
            "{} 📂 {} (视频: {}, 音频: {}, 时长: {:.2}s)",
            log_ctx(),
            source.description(),
            video.is_some(),
            audio.is_some(),
            source.duration()
        );

        Ok(Self {
            source,
            video,
            audio,
            packet: ffmpeg::Packet::empty(),
        })
    }

    /// 清空两个解码器的内部缓冲
    fn flush_decoders(&mut self) {
        if let Some(video) = self.video.as_mut() {
            video.flush();
        }
        if let Some(audio) = self.audio.as_mut() {
            audio.flush();
        }
    }

    /// 按固定顺序释放：输出设备 → 展示资源 → 解码器 → 源 → 数据包
    fn teardown(self, devices: &mut OutputDevices) {
        let Self {
            source,
            video,
            audio,
            packet,
        } = self;

        if audio.is_some() {
            devices.halt_audio();
            devices.audio.close();
        }
        if video.is_some() {
            devices.surface.release();
        }
        drop(video);
        drop(audio);
        drop(source);
        drop(packet);
        debug!("{} 🧹 媒体资源已释放", log_ctx());
    }
}

/// 控制器和解码线程共享的全部状态（由同一把锁保护）
pub(crate) struct EngineState {
    pub(crate) state: PlaybackState,
    pub(crate) last_error: ErrorKind,
    pub(crate) current_time: f64,
    pub(crate) current_url: Option<String>,
    pub(crate) end_of_stream: bool,
    /// 连续读包失败次数
    pub(crate) read_failures: u32,
    /// 解码器在循环中失败过，只有重新 load 才能恢复
    pub(crate) needs_reload: bool,
    pub(crate) media: Option<LoadedMedia>,
    pub(crate) devices: OutputDevices,
}

impl EngineState {
    pub(crate) fn new(devices: OutputDevices) -> Self {
        Self {
            state: PlaybackState::Stopped,
            last_error: ErrorKind::None,
            current_time: 0.0,
            current_url: None,
            end_of_stream: false,
            read_failures: 0,
            needs_reload: false,
            media: None,
            devices,
        }
    }

    /// 解码循环内的致命错误
    pub(crate) fn fail(&mut self, kind: ErrorKind) {
        self.state = PlaybackState::Error;
        self.last_error = kind;
        self.needs_reload = true;
        self.devices.audio.set_paused(true);
    }

    /// 记录失败调用的错误类型；控制调用被拒绝（类型为 None）时不覆盖上一次错误
    fn record<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            let kind = e.kind();
            if kind != ErrorKind::None {
                self.last_error = kind;
            }
        }
        result
    }

    fn unload(&mut self) {
        if let Some(media) = self.media.take() {
            media.teardown(&mut self.devices);
        }
        self.current_url = None;
        self.current_time = 0.0;
        self.end_of_stream = false;
        self.read_failures = 0;
        self.needs_reload = false;
    }

    fn seek(&mut self, seconds: f64) -> Result<()> {
        let Some(media) = self.media.as_mut() else {
            return Err(PlayerError::NotLoaded);
        };

        media.source.seek(seconds)?;
        media.flush_decoders();
        self.devices.audio.clear();
        self.current_time = seconds;
        self.end_of_stream = false;
        self.read_failures = 0;
        Ok(())
    }

    /// 回到开头并清空解码器（stop 之后的 play 从头开始）
    fn rewind(&mut self) {
        if let Some(media) = self.media.as_mut() {
            if let Err(e) = media.source.seek(0.0) {
                warn!("{} ⚠️  回到开头失败: {}", log_ctx(), e);
            }
            media.flush_decoders();
        }
        self.end_of_stream = false;
        self.read_failures = 0;
    }
}

/// 播放控制器 - 对外的同步控制接口
///
/// 所有状态都在一把锁后面；每个控制调用和解码循环的每一步都持有整段临界区，
/// 因此控制调用最多等待一个数据包的处理时间。
///
/// `pause()` 会让解码线程在当前迭代后退出，`play()` 再启动一个新线程继续，
/// 源和解码器保持不变。
pub struct PlaybackController {
    shared: Arc<Mutex<EngineState>>,
    worker: Option<thread::JoinHandle<()>>,
    config: EngineConfig,
}

impl PlaybackController {
    /// 以默认配置创建控制器
    pub fn create(devices: OutputDevices) -> Result<Self> {
        Self::with_config(devices, EngineConfig::default())
    }

    pub fn with_config(devices: OutputDevices, config: EngineConfig) -> Result<Self> {
        info!("{} 🎮 创建播放控制器...", log_ctx());
        ffmpeg::init().map_err(|e| PlayerError::Memory(format!("FFmpeg 初始化失败: {}", e)))?;

        let controller = Self {
            shared: Arc::new(Mutex::new(EngineState::new(devices))),
            worker: None,
            config,
        };
        info!("{} ✅ 播放控制器创建完成", log_ctx());
        Ok(controller)
    }

    /// 加载一个条目；正在播放时先停止，上一个条目的资源先释放
    ///
    /// 成功后处于 Stopped（已加载），位置为 0。
    pub fn load<P: Playable + ?Sized>(&mut self, item: &P) -> Result<()> {
        let url = item.url().to_string();
        info!("{} 📂 加载: {}", log_ctx(), url);

        // 旧条目马上就要释放，不需要回到开头
        self.halt(false);

        let mut engine = self.shared.lock();
        engine.unload();
        engine.state = PlaybackState::Stopped;

        let opened = LoadedMedia::open(&url, &mut engine.devices, &self.config);
        let media = match engine.record(opened) {
            Ok(media) => media,
            Err(e) => {
                error!("{} ❌ 加载失败: {}", log_ctx(), e);
                return Err(e);
            }
        };

        engine.media = Some(media);
        engine.current_url = Some(url);
        engine.last_error = ErrorKind::None;
        Ok(())
    }

    /// 开始（或继续）播放，启动解码线程
    pub fn play(&mut self) -> Result<()> {
        {
            let mut engine = self.shared.lock();
            let rejected = if engine.state == PlaybackState::Playing {
                Some(PlayerError::AlreadyPlaying)
            } else if engine.needs_reload || engine.state == PlaybackState::Error {
                Some(PlayerError::NeedsReload)
            } else if engine.media.is_none() {
                Some(PlayerError::NotLoaded)
            } else {
                None
            };
            if let Some(e) = rejected {
                debug!("{} play 被拒绝: {}", log_ctx(), e);
                return engine.record(Err(e));
            }
        }

        // 暂停后旧线程已经（或即将）退出，先回收
        self.reap_worker();

        {
            let mut engine = self.shared.lock();
            engine.state = PlaybackState::Playing;
            if engine.media.as_ref().is_some_and(|m| m.audio.is_some()) {
                engine.devices.audio.set_paused(false);
            }
        }

        let shared = self.shared.clone();
        let interval = self.config.decode_interval();
        let spawned = thread::Builder::new()
            .name("decode-loop".to_string())
            .spawn(move || decode_loop::run(shared, interval));

        match spawned {
            Ok(handle) => {
                info!("{} ▶️  开始播放", log_ctx());
                self.worker = Some(handle);
                Ok(())
            }
            Err(e) => {
                error!("{} ❌ 无法创建解码线程: {}", log_ctx(), e);
                let mut engine = self.shared.lock();
                engine.state = PlaybackState::Error;
                engine.devices.audio.set_paused(true);
                engine.record(Err(PlayerError::Thread(e.to_string())))
            }
        }
    }

    /// 暂停：解码线程在当前迭代后退出，音频设备暂停
    pub fn pause(&self) -> Result<()> {
        let mut engine = self.shared.lock();
        if engine.state != PlaybackState::Playing {
            return engine.record(Err(PlayerError::NotPlaying));
        }
        engine.state = PlaybackState::Paused;
        engine.devices.audio.set_paused(true);
        info!("{} ⏸️  暂停", log_ctx());
        Ok(())
    }

    /// 停止并等待解码线程退出；总是成功
    pub fn stop(&mut self) {
        info!("{} ⏹️  停止播放", log_ctx());
        self.halt(true);
    }

    /// 让解码线程退出并回收；`rewind` 为 false 时源停在原处
    fn halt(&mut self, rewind: bool) {
        {
            let mut engine = self.shared.lock();
            engine.state = PlaybackState::Stopped;
            engine.current_time = 0.0;
        }

        self.reap_worker();

        let mut engine = self.shared.lock();
        engine.devices.halt_audio();
        if rewind {
            engine.rewind();
        }
        engine.current_time = 0.0;
    }

    /// 跳转到指定位置（秒）
    ///
    /// 成功后位置立即等于请求值（不做校验）；失败时位置不变。
    pub fn seek(&self, seconds: f64) -> Result<()> {
        let mut engine = self.shared.lock();
        let result = engine.seek(seconds);
        match &result {
            Ok(()) => info!("{} ⏩ 跳转到 {:.3}s", log_ctx(), seconds),
            Err(e) => warn!("{} ⚠️  跳转失败: {}", log_ctx(), e),
        }
        engine.record(result)
    }

    /// 总时长（秒）；未加载时为 0
    pub fn duration(&self) -> f64 {
        self.shared
            .lock()
            .media
            .as_ref()
            .map_or(0.0, |media| media.source.duration())
    }

    /// 当前位置（秒）
    pub fn position(&self) -> f64 {
        self.shared.lock().current_time
    }

    pub fn state(&self) -> PlaybackState {
        self.shared.lock().state
    }

    pub fn is_playing(&self) -> bool {
        self.state() == PlaybackState::Playing
    }

    pub fn last_error(&self) -> ErrorKind {
        self.shared.lock().last_error
    }

    pub fn last_error_string(&self) -> &'static str {
        error_string(self.last_error())
    }

    /// 当前解码尺寸（只有视频流时才有）
    pub fn video_size(&self) -> Option<(u32, u32)> {
        let engine = self.shared.lock();
        engine
            .media
            .as_ref()
            .and_then(|m| m.video.as_ref())
            .map(|v| (v.width(), v.height()))
    }

    pub fn has_video(&self) -> bool {
        self.shared.lock().media.as_ref().is_some_and(|m| m.video.is_some())
    }

    pub fn has_audio(&self) -> bool {
        self.shared.lock().media.as_ref().is_some_and(|m| m.audio.is_some())
    }

    /// 音频设备协商出的规格
    pub fn audio_spec(&self) -> Option<AudioSpec> {
        let engine = self.shared.lock();
        engine.media.as_ref().and_then(|m| m.audio.as_ref()).map(|a| a.spec())
    }

    pub fn is_end_of_stream(&self) -> bool {
        self.shared.lock().end_of_stream
    }

    pub fn current_url(&self) -> Option<String> {
        self.shared.lock().current_url.clone()
    }

    /// 回收已退出（或正在退出）的解码线程；调用时不能持有锁
    fn reap_worker(&mut self) {
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                error!("{} ❌ 解码线程异常退出", log_ctx());
            } else {
                debug!("{} 解码线程已回收", log_ctx());
            }
        }
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.halt(false);
        self.shared.lock().unload();
        info!("{} 👋 播放控制器已销毁", log_ctx());
    }
}
