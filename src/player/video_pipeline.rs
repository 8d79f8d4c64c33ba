use crate::core::{timestamp_to_seconds, EngineConfig, PixelFormat, Plane, PlayerError, Result, ScalerQuality, VideoFrame};
use crate::player::output::PresentSurface;
use ffmpeg_next as ffmpeg;
use ffmpeg_next::{codec, format, software, util, Rational};
use log::{debug, info, warn};

/// 展示格式 -> 后端像素格式
pub(crate) fn backend_pixel(format: PixelFormat) -> format::Pixel {
    match format {
        PixelFormat::RGBA => format::Pixel::RGBA,
        PixelFormat::RGB => format::Pixel::RGB24,
        PixelFormat::YUV420P => format::Pixel::YUV420P,
        PixelFormat::NV12 => format::Pixel::NV12,
    }
}

fn scaler_flags(quality: ScalerQuality) -> software::scaling::Flags {
    match quality {
        ScalerQuality::FastBilinear => software::scaling::Flags::FAST_BILINEAR,
        ScalerQuality::Bilinear => software::scaling::Flags::BILINEAR,
        ScalerQuality::Bicubic => software::scaling::Flags::BICUBIC,
    }
}

/// 视频管线 - 解码器 + 像素转换 + 展示表面
pub struct VideoPipeline {
    decoder: codec::decoder::Video,
    scaler: Option<software::scaling::Context>,
    scaler_flags: software::scaling::Flags,
    target_format: PixelFormat,
    time_base: Rational,
    width: u32,
    height: u32,
    decoded: util::frame::Video,
    converted: util::frame::Video,
}

// SwsContext 本身不是 Send，但管线只在持有控制器锁时被访问
unsafe impl Send for VideoPipeline {}

impl VideoPipeline {
    /// 打开解码器并按解码尺寸配置展示表面
    ///
    /// 失败时已配置的展示资源会被释放，解码器随返回值一起关闭。
    pub fn open(
        stream: &format::stream::Stream<'_>,
        surface: &mut dyn PresentSurface,
        config: &EngineConfig,
    ) -> Result<Self> {
        let context = codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| PlayerError::VideoCodec(format!("无法读取视频流参数: {}", e)))?;
        let decoder = context
            .decoder()
            .video()
            .map_err(|e| PlayerError::VideoCodec(format!("无法打开视频解码器: {}", e)))?;

        let width = decoder.width();
        let height = decoder.height();
        let target_format = surface.pixel_format();

        info!(
            "视频解码器: {}x{}, 格式: {:?} → {:?}",
            width,
            height,
            decoder.format(),
            target_format
        );

        surface
            .configure(width, height)
            .map_err(|e| PlayerError::PresentationBackend(e.to_string()))?;

        let mut pipeline = Self {
            decoder,
            scaler: None,
            scaler_flags: scaler_flags(config.scaler),
            target_format,
            time_base: stream.time_base(),
            width,
            height,
            decoded: util::frame::Video::empty(),
            converted: util::frame::Video::empty(),
        };

        // 某些码流在收到第一帧前不知道像素格式，此时推迟到收帧时创建
        let source_format = pipeline.decoder.format();
        if source_format != format::Pixel::None {
            if let Err(e) = pipeline.ensure_scaler(source_format, width, height) {
                surface.release();
                return Err(e);
            }
        }

        Ok(pipeline)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// 输入/输出定义变化时重建像素转换器
    fn ensure_scaler(&mut self, source: format::Pixel, width: u32, height: u32) -> Result<()> {
        let needs_recreate = match &self.scaler {
            None => true,
            Some(scaler) => {
                let input = scaler.input();
                input.format != source || input.width != width || input.height != height
            }
        };

        if needs_recreate {
            debug!("🔧 初始化像素转换器: {:?} {}x{}", source, width, height);
            let scaler = software::scaling::Context::get(
                source,
                width,
                height,
                backend_pixel(self.target_format),
                width,
                height,
                self.scaler_flags,
            )
            .map_err(|e| PlayerError::VideoCodec(format!("无法创建像素转换器: {}", e)))?;
            self.scaler = Some(scaler);
            // 旧输出帧仍是上一个尺寸，sws 会拒绝写入
            self.converted = util::frame::Video::empty();
        }

        Ok(())
    }

    /// 送入一个数据包，把解出的每一帧转换、写入并显示
    ///
    /// 返回最后一帧的时间戳（秒）。只有送包失败会返回错误；单帧展示失败只记日志。
    pub fn decode(&mut self, packet: &ffmpeg::Packet, surface: &mut dyn PresentSurface) -> Result<Option<f64>> {
        self.decoder
            .send_packet(packet)
            .map_err(|e| PlayerError::VideoCodec(format!("送入视频包失败: {}", e)))?;
        Ok(self.receive_frames(surface))
    }

    /// 流结束时取出解码器内缓存的帧
    pub fn drain(&mut self, surface: &mut dyn PresentSurface) -> Option<f64> {
        if let Err(e) = self.decoder.send_eof() {
            debug!("视频解码器 send_eof: {}", e);
            return None;
        }
        self.receive_frames(surface)
    }

    /// 清空解码器内部缓冲（seek 之后）
    pub fn flush(&mut self) {
        self.decoder.flush();
    }

    fn receive_frames(&mut self, surface: &mut dyn PresentSurface) -> Option<f64> {
        let mut clock = None;
        loop {
            match self.decoder.receive_frame(&mut self.decoded) {
                Ok(()) => match self.present_frame(surface) {
                    Ok(pts) => clock = pts.or(clock),
                    Err(e) => warn!("视频帧展示失败（已跳过）: {}", e),
                },
                Err(ffmpeg::Error::Eof) | Err(ffmpeg::Error::Other { .. }) => break, // EAGAIN / 已取尽
                Err(e) => {
                    warn!("视频解码错误（已跳过）: {}", e);
                    break;
                }
            }
        }
        clock
    }

    fn present_frame(&mut self, surface: &mut dyn PresentSurface) -> Result<Option<f64>> {
        let width = self.decoded.width();
        let height = self.decoded.height();

        if width != self.width || height != self.height {
            info!("视频尺寸变化: {}x{} → {}x{}", self.width, self.height, width, height);
            surface
                .configure(width, height)
                .map_err(|e| PlayerError::PresentationBackend(e.to_string()))?;
            self.width = width;
            self.height = height;
        }

        self.ensure_scaler(self.decoded.format(), width, height)?;
        if let Some(scaler) = self.scaler.as_mut() {
            scaler
                .run(&self.decoded, &mut self.converted)
                .map_err(|e| PlayerError::VideoCodec(format!("像素转换失败: {}", e)))?;
        }

        let pts = self
            .decoded
            .timestamp()
            .or_else(|| self.decoded.pts())
            .map(|ts| timestamp_to_seconds(ts, self.time_base));

        let planes = (0..self.converted.planes())
            .map(|i| Plane {
                data: self.converted.data(i),
                stride: self.converted.stride(i),
            })
            .collect();

        let frame = VideoFrame {
            pts,
            width,
            height,
            format: self.target_format,
            planes,
        };

        surface.update(&frame)?;
        surface.present()?;

        Ok(pts)
    }
}
