use serde::{Deserialize, Serialize};

/// 播放列表条目（引擎只关心其中的 URL / 路径）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
}

impl MediaItem {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// 可以交给播放引擎加载的条目
pub trait Playable {
    /// 媒体地址（本地路径或网络 URL）
    fn url(&self) -> &str;
}

impl Playable for MediaItem {
    fn url(&self) -> &str {
        &self.url
    }
}

impl Playable for str {
    fn url(&self) -> &str {
        self
    }
}

impl Playable for String {
    fn url(&self) -> &str {
        self.as_str()
    }
}

/// 像素格式（展示表面接收的格式）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    RGBA,
    RGB,
    YUV420P,
    NV12,
}

/// 音频采样格式（交错排列）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    F32,
    I16,
}

impl SampleFormat {
    /// 单个采样占用的字节数
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::F32 => 4,
            SampleFormat::I16 => 2,
        }
    }
}

/// 音频设备规格（请求值或协商结果）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSpec {
    pub sample_rate: u32,
    pub channels: u16,
    pub format: SampleFormat,
    /// 设备缓冲区大小（每声道采样数）
    pub buffer_samples: u32,
}

impl AudioSpec {
    /// 一个采样帧（所有声道）的字节数
    pub fn frame_bytes(&self) -> usize {
        self.channels as usize * self.format.bytes_per_sample()
    }
}

/// 视频帧的一个平面
#[derive(Debug, Clone, Copy)]
pub struct Plane<'a> {
    pub data: &'a [u8],
    pub stride: usize,
}

/// 已转换为展示格式的视频帧（借用解码器的缓冲区，不做拷贝）
#[derive(Debug, Clone)]
pub struct VideoFrame<'a> {
    /// 显示时间戳（秒）
    pub pts: Option<f64>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub planes: Vec<Plane<'a>>,
}

/// 播放状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
    Error,
}
