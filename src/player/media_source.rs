use crate::core::{backend_duration_to_seconds, seconds_to_backend_timestamp, EngineConfig, PlayerError, Result};
use ffmpeg_next as ffmpeg;
use ffmpeg_next::{format, media};
use log::{debug, info};
use std::ffi::CString;
use std::ptr;

/// 判断地址是否为网络流
pub fn is_network_url(url: &str) -> bool {
    url.starts_with("http://")
        || url.starts_with("https://")
        || url.starts_with("rtsp://")
        || url.starts_with("rtmp://")
        || url.contains(".m3u8")
}

/// 释放数据包持有的缓冲区引用，包本身可以继续复用
pub fn release_packet(packet: &mut ffmpeg::Packet) {
    unsafe {
        ffmpeg::ffi::av_packet_unref(packet.as_mut_ptr());
    }
}

/// 网络流的打开/读取选项（超时单位为微秒）
pub(crate) fn network_options(config: &EngineConfig) -> ffmpeg::Dictionary<'static> {
    let timeout_us = config.network_timeout_ms.saturating_mul(1000).to_string();
    let mut options = ffmpeg::Dictionary::new();
    options.set("timeout", &timeout_us);
    options.set("rw_timeout", &timeout_us);
    options.set("reconnect", "1");
    options.set("reconnect_streamed", "1");
    options
}

/// 媒体源 - 打开地址、探测流信息、选出最佳音视频流
///
/// 只有打开、探测、选流全部成功才会返回实例；中途失败时已获取的
/// 解封装上下文随 `Input` 一起释放。
pub struct MediaSource {
    input_ctx: format::context::Input,
    video_stream_index: Option<usize>,
    audio_stream_index: Option<usize>,
    source_path: String,
}

impl MediaSource {
    /// 打开媒体地址（可能因网络探测而阻塞）
    pub fn open(path: &str, config: &EngineConfig) -> Result<Self> {
        info!("正在打开媒体: {}", path);

        let mut input_ctx = Self::open_input(path, config)?;

        // 完整探测流信息
        let ret = unsafe { ffmpeg::ffi::avformat_find_stream_info(input_ctx.as_mut_ptr(), ptr::null_mut()) };
        if ret < 0 {
            return Err(PlayerError::StreamInfo(format!(
                "{}: {}",
                path,
                ffmpeg::Error::from(ret)
            )));
        }

        // 选流完全交给后端的评分
        let video_stream_index = input_ctx
            .streams()
            .best(media::Type::Video)
            .map(|s| s.index());

        let audio_stream_index = input_ctx
            .streams()
            .best(media::Type::Audio)
            .map(|s| s.index());

        if video_stream_index.is_none() && audio_stream_index.is_none() {
            return Err(PlayerError::NoStreams);
        }

        debug!("视频流索引: {:?}", video_stream_index);
        debug!("音频流索引: {:?}", audio_stream_index);

        Ok(Self {
            input_ctx,
            video_stream_index,
            audio_stream_index,
            source_path: path.to_string(),
        })
    }

    /// 打开解封装上下文（不探测）
    fn open_input(path: &str, config: &EngineConfig) -> Result<format::context::Input> {
        let c_path = CString::new(path)
            .map_err(|e| PlayerError::OpenFile(format!("非法路径 {}: {}", path, e)))?;

        let options = if is_network_url(path) {
            info!("🌐 检测到网络流，应用网络选项");
            network_options(config)
        } else {
            ffmpeg::Dictionary::new()
        };

        unsafe {
            let mut ps = ptr::null_mut();
            let mut opts = options.disown();
            let ret = ffmpeg::ffi::avformat_open_input(&mut ps, c_path.as_ptr(), ptr::null(), &mut opts);
            // 未被消费的选项由 Dictionary 释放
            drop(ffmpeg::Dictionary::own(opts));

            if ret < 0 {
                return Err(PlayerError::OpenFile(format!(
                    "{}: {}",
                    path,
                    ffmpeg::Error::from(ret)
                )));
            }
            Ok(format::context::Input::wrap(ps))
        }
    }

    pub fn video_stream_index(&self) -> Option<usize> {
        self.video_stream_index
    }

    pub fn audio_stream_index(&self) -> Option<usize> {
        self.audio_stream_index
    }

    pub fn video_stream(&self) -> Option<format::stream::Stream<'_>> {
        self.video_stream_index
            .and_then(|idx| self.input_ctx.stream(idx))
    }

    pub fn audio_stream(&self) -> Option<format::stream::Stream<'_>> {
        self.audio_stream_index
            .and_then(|idx| self.input_ctx.stream(idx))
    }

    /// 总时长（秒），未知时为 0
    pub fn duration(&self) -> f64 {
        backend_duration_to_seconds(self.input_ctx.duration())
    }

    /// 读取下一个数据包到 `packet`
    ///
    /// 返回 `Ok(false)` 表示到达流末尾。
    pub fn read_packet(&mut self, packet: &mut ffmpeg::Packet) -> std::result::Result<bool, ffmpeg::Error> {
        release_packet(packet);
        match packet.read(&mut self.input_ctx) {
            Ok(()) => Ok(true),
            Err(ffmpeg::Error::Eof) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// 源级 seek（秒）
    pub fn seek(&mut self, seconds: f64) -> Result<()> {
        if !seconds.is_finite() {
            return Err(PlayerError::StreamInfo(format!("非法的跳转位置: {}", seconds)));
        }
        let timestamp = seconds_to_backend_timestamp(seconds);
        self.input_ctx
            .seek(timestamp, ..timestamp)
            .map_err(|e| PlayerError::StreamInfo(format!("Seek 到 {:.3}s 失败: {}", seconds, e)))
    }

    pub fn description(&self) -> String {
        format!("FFmpeg MediaSource: {}", self.source_path)
    }
}
