use crate::core::{AudioSpec, PixelFormat, Result, VideoFrame};
use log::{debug, info};

/// 视频展示表面（由调用方注入）
///
/// 引擎只负责把解码后的像素写进来并请求显示；尺寸由码流决定。
pub trait PresentSurface: Send {
    /// 表面接受的像素格式，解码帧会被转换成这个格式
    fn pixel_format(&self) -> PixelFormat {
        PixelFormat::RGBA
    }

    /// 按解码尺寸分配展示资源（纹理等）
    fn configure(&mut self, width: u32, height: u32) -> Result<()>;

    /// 写入一帧像素
    fn update(&mut self, frame: &VideoFrame<'_>) -> Result<()>;

    /// 显示最近写入的帧
    fn present(&mut self) -> Result<()>;

    /// 销毁展示资源；必须总是成功
    fn release(&mut self);
}

/// 推送式（队列）音频输出设备（由调用方注入）
pub trait AudioDevice: Send {
    /// 以请求的规格打开设备，返回实际协商出的规格。
    /// 打开后设备处于暂停状态。
    fn open(&mut self, requested: &AudioSpec) -> Result<AudioSpec>;

    /// 追加交错 PCM 数据到播放队列（格式为协商结果）
    fn queue(&mut self, pcm: &[u8]) -> Result<()>;

    /// 队列中尚未播放的字节数
    fn queued_bytes(&self) -> usize;

    fn set_paused(&mut self, paused: bool);

    /// 丢弃队列中尚未播放的数据
    fn clear(&mut self);

    /// 关闭设备；必须总是成功
    fn close(&mut self);
}

/// 设备侧资源（展示表面 + 音频设备）
pub struct OutputDevices {
    pub surface: Box<dyn PresentSurface>,
    pub audio: Box<dyn AudioDevice>,
}

impl OutputDevices {
    pub fn new(surface: Box<dyn PresentSurface>, audio: Box<dyn AudioDevice>) -> Self {
        Self { surface, audio }
    }

    /// 暂停并清空音频队列
    pub(crate) fn halt_audio(&mut self) {
        self.audio.set_paused(true);
        self.audio.clear();
    }
}

/// 无窗口的展示表面：只统计帧数，供命令行和测试使用
#[derive(Debug, Default)]
pub struct HeadlessSurface {
    width: u32,
    height: u32,
    frames_presented: u64,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl PresentSurface for HeadlessSurface {
    fn configure(&mut self, width: u32, height: u32) -> Result<()> {
        info!("🖼️ 无窗口展示表面: {}x{}", width, height);
        self.width = width;
        self.height = height;
        Ok(())
    }

    fn update(&mut self, _frame: &VideoFrame<'_>) -> Result<()> {
        Ok(())
    }

    fn present(&mut self) -> Result<()> {
        self.frames_presented += 1;
        if self.frames_presented % 250 == 0 {
            debug!("已显示 {} 帧", self.frames_presented);
        }
        Ok(())
    }

    fn release(&mut self) {
        self.width = 0;
        self.height = 0;
    }
}
