use serde::Serialize;
use thiserror::Error;

/// 对外暴露的错误种类（封闭集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ErrorKind {
    #[default]
    None,
    Memory,
    OpenFile,
    StreamInfo,
    NoStreams,
    VideoCodec,
    AudioCodec,
    PresentationBackend,
    Thread,
}

impl ErrorKind {
    /// 每种错误对应的可读描述
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::None => "No error",
            ErrorKind::Memory => "Memory allocation failed",
            ErrorKind::OpenFile => "Could not open media file",
            ErrorKind::StreamInfo => "Could not find stream information",
            ErrorKind::NoStreams => "No suitable streams found",
            ErrorKind::VideoCodec => "Could not initialize video codec",
            ErrorKind::AudioCodec => "Could not initialize audio codec",
            ErrorKind::PresentationBackend => "Presentation backend initialization failed",
            ErrorKind::Thread => "Thread creation failed",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 错误种类 -> 描述
pub fn error_string(kind: ErrorKind) -> &'static str {
    kind.as_str()
}

#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("内存/子系统初始化失败: {0}")]
    Memory(String),

    #[error("无法打开文件: {0}")]
    OpenFile(String),

    #[error("无法获取流信息: {0}")]
    StreamInfo(String),

    #[error("没有可用的音视频流")]
    NoStreams,

    #[error("视频解码器错误: {0}")]
    VideoCodec(String),

    #[error("音频解码器错误: {0}")]
    AudioCodec(String),

    #[error("展示/音频设备错误: {0}")]
    PresentationBackend(String),

    #[error("无法创建解码线程: {0}")]
    Thread(String),

    #[error("已经在播放中")]
    AlreadyPlaying,

    #[error("当前不在播放状态")]
    NotPlaying,

    #[error("没有加载任何媒体")]
    NotLoaded,

    #[error("播放已出错，需要重新加载")]
    NeedsReload,
}

impl PlayerError {
    /// 映射到对外的错误种类；控制调用被拒绝时为 `ErrorKind::None`
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlayerError::Memory(_) => ErrorKind::Memory,
            PlayerError::OpenFile(_) => ErrorKind::OpenFile,
            PlayerError::StreamInfo(_) => ErrorKind::StreamInfo,
            PlayerError::NoStreams => ErrorKind::NoStreams,
            PlayerError::VideoCodec(_) => ErrorKind::VideoCodec,
            PlayerError::AudioCodec(_) => ErrorKind::AudioCodec,
            PlayerError::PresentationBackend(_) => ErrorKind::PresentationBackend,
            PlayerError::Thread(_) => ErrorKind::Thread,
            PlayerError::AlreadyPlaying
            | PlayerError::NotPlaying
            | PlayerError::NotLoaded
            | PlayerError::NeedsReload => ErrorKind::None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PlayerError>;
