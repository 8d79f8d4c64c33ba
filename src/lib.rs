//! 单条目媒体播放引擎：FFmpeg 解封装/解码，后台解码线程，注入式视频表面和音频设备。

pub mod core;
pub mod player;

pub use crate::core::{
    error_string, AudioSpec, EngineConfig, ErrorKind, MediaItem, PixelFormat, Playable, PlaybackState,
    PlayerError, Result, SampleFormat, VideoFrame,
};
pub use crate::player::{
    AudioDevice, CpalAudioDevice, HeadlessSurface, OutputDevices, PlaybackController, PresentSurface,
};
