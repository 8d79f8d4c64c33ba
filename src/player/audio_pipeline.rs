use crate::core::{AudioSpec, EngineConfig, PlayerError, Result, SampleFormat};
use crate::player::output::AudioDevice;
use ffmpeg_next as ffmpeg;
use ffmpeg_next::{codec, format, software, util, ChannelLayout};
use log::{debug, info, warn};

/// 交错 PCM 缓冲区大小（字节，无对齐填充）
pub fn packed_buffer_size(channels: u16, samples: usize, format: SampleFormat) -> usize {
    channels as usize * samples * format.bytes_per_sample()
}

/// 设备采样格式 -> 后端（交错）采样格式
pub(crate) fn backend_sample(format: SampleFormat) -> format::Sample {
    match format {
        SampleFormat::F32 => format::Sample::F32(format::sample::Type::Packed),
        SampleFormat::I16 => format::Sample::I16(format::sample::Type::Packed),
    }
}

/// 重采样一帧所需的输出容量（每声道采样数），留出余量给重采样器的内部延迟
pub(crate) fn output_capacity(input_samples: usize, input_rate: u32, output_rate: u32) -> usize {
    if input_rate == 0 {
        return input_samples + RESAMPLER_HEADROOM;
    }
    let scaled = (input_samples as u64 * output_rate as u64).div_ceil(input_rate as u64);
    scaled as usize + RESAMPLER_HEADROOM
}

const RESAMPLER_HEADROOM: usize = 256;

fn layout_or_default(layout: ChannelLayout, channels: u16) -> ChannelLayout {
    if layout.is_empty() {
        ChannelLayout::default(channels as i32)
    } else {
        layout
    }
}

/// 音频管线 - 解码器 + 重采样器 + 协商后的设备规格
pub struct AudioPipeline {
    decoder: codec::decoder::Audio,
    resampler: Option<software::resampling::Context>,
    target_layout: ChannelLayout,
    spec: AudioSpec,
    decoded: util::frame::Audio,
}

// SwrContext 只在持有控制器锁时被访问
unsafe impl Send for AudioPipeline {}

impl AudioPipeline {
    /// 打开解码器和音频设备，并按设备协商结果配置重采样器
    ///
    /// 设备打开后失败会先关闭设备再返回。
    pub fn open(
        stream: &format::stream::Stream<'_>,
        device: &mut dyn AudioDevice,
        config: &EngineConfig,
    ) -> Result<Self> {
        let context = codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| PlayerError::AudioCodec(format!("无法读取音频流参数: {}", e)))?;
        let decoder = context
            .decoder()
            .audio()
            .map_err(|e| PlayerError::AudioCodec(format!("无法打开音频解码器: {}", e)))?;

        let requested = AudioSpec {
            sample_rate: decoder.rate(),
            channels: decoder.channels(),
            format: config.audio_sample_format,
            buffer_samples: config.audio_buffer_samples,
        };

        let spec = device
            .open(&requested)
            .map_err(|e| PlayerError::PresentationBackend(e.to_string()))?;

        if spec != requested {
            info!(
                "音频设备协商结果: {} Hz / {} 声道 / {:?}（请求: {} Hz / {} 声道 / {:?}）",
                spec.sample_rate, spec.channels, spec.format,
                requested.sample_rate, requested.channels, requested.format
            );
        }

        let mut pipeline = Self {
            decoder,
            resampler: None,
            target_layout: ChannelLayout::default(spec.channels as i32),
            spec,
            decoded: util::frame::Audio::empty(),
        };

        let source_format = pipeline.decoder.format();
        let source_rate = pipeline.decoder.rate();
        let source_layout = layout_or_default(pipeline.decoder.channel_layout(), pipeline.decoder.channels());
        if let Err(e) = pipeline.ensure_resampler(source_format, source_layout, source_rate) {
            device.close();
            return Err(e);
        }

        Ok(pipeline)
    }

    /// 协商后的设备规格
    pub fn spec(&self) -> AudioSpec {
        self.spec
    }

    /// 输入定义变化时重建重采样器
    fn ensure_resampler(&mut self, format: format::Sample, layout: ChannelLayout, rate: u32) -> Result<()> {
        let needs_recreate = match &self.resampler {
            None => true,
            Some(resampler) => {
                let input = resampler.input();
                input.format != format || input.rate != rate || input.channel_layout != layout
            }
        };

        if needs_recreate {
            // 声道数一致时输入输出使用同一布局
            let target_layout = if layout.channels() == self.spec.channels as i32 {
                layout
            } else {
                ChannelLayout::default(self.spec.channels as i32)
            };

            debug!(
                "🔧 初始化音频重采样器: {}Hz/{}ch/{:?} → {}Hz/{}ch/{:?}",
                rate,
                layout.channels(),
                format,
                self.spec.sample_rate,
                self.spec.channels,
                self.spec.format
            );

            let resampler = software::resampling::Context::get(
                format,
                layout,
                rate,
                backend_sample(self.spec.format),
                target_layout,
                self.spec.sample_rate,
            )
            .map_err(|e| PlayerError::AudioCodec(format!("无法创建重采样器: {}", e)))?;
            self.resampler = Some(resampler);
            self.target_layout = target_layout;
        }

        Ok(())
    }

    /// 送入一个数据包，把解出的每一帧重采样后推入设备队列
    ///
    /// 返回本次入队的字节数。只有送包失败会返回错误。
    pub fn decode(&mut self, packet: &ffmpeg::Packet, device: &mut dyn AudioDevice) -> Result<usize> {
        self.decoder
            .send_packet(packet)
            .map_err(|e| PlayerError::AudioCodec(format!("送入音频包失败: {}", e)))?;
        Ok(self.receive_frames(device))
    }

    /// 流结束时取出解码器内缓存的帧，再冲出重采样器里剩余的样本
    pub fn drain(&mut self, device: &mut dyn AudioDevice) -> usize {
        let mut queued = match self.decoder.send_eof() {
            Ok(()) => self.receive_frames(device),
            Err(e) => {
                debug!("音频解码器 send_eof: {}", e);
                0
            }
        };
        match self.flush_resampler(device) {
            Ok(bytes) => queued += bytes,
            Err(e) => warn!("冲出重采样器缓冲失败: {}", e),
        }
        queued
    }

    fn flush_resampler(&mut self, device: &mut dyn AudioDevice) -> Result<usize> {
        let Some(resampler) = self.resampler.as_mut() else {
            return Ok(0);
        };

        let pending = resampler
            .delay()
            .map_or(0, |delay| delay.output.max(0) as usize);
        let mut tail = util::frame::Audio::new(
            backend_sample(self.spec.format),
            pending + RESAMPLER_HEADROOM,
            self.target_layout,
        );
        resampler
            .flush(&mut tail)
            .map_err(|e| PlayerError::AudioCodec(format!("重采样器冲刷失败: {}", e)))?;

        self.push_resampled(&tail, device)
    }

    /// 清空解码器内部缓冲（seek 之后）
    pub fn flush(&mut self) {
        self.decoder.flush();
    }

    fn receive_frames(&mut self, device: &mut dyn AudioDevice) -> usize {
        let mut queued = 0;
        loop {
            match self.decoder.receive_frame(&mut self.decoded) {
                Ok(()) => match self.queue_frame(device) {
                    Ok(bytes) => queued += bytes,
                    Err(e) => warn!("音频帧入队失败（已跳过）: {}", e),
                },
                Err(ffmpeg::Error::Eof) | Err(ffmpeg::Error::Other { .. }) => break, // EAGAIN / 已取尽
                Err(e) => {
                    warn!("音频解码错误（已跳过）: {}", e);
                    break;
                }
            }
        }
        queued
    }

    fn queue_frame(&mut self, device: &mut dyn AudioDevice) -> Result<usize> {
        let layout = layout_or_default(self.decoded.channel_layout(), self.decoded.channels());
        if self.decoded.channel_layout().is_empty() {
            self.decoded.set_channel_layout(layout);
        }

        self.ensure_resampler(self.decoded.format(), layout, self.decoded.rate())?;

        let Some(resampler) = self.resampler.as_mut() else {
            return Ok(0);
        };

        // 输出帧按本帧所需容量分配；swr 会把 nb_samples 改成实际转换数，不能跨帧复用
        let capacity = output_capacity(self.decoded.samples(), self.decoded.rate(), self.spec.sample_rate);
        let mut resampled = util::frame::Audio::new(backend_sample(self.spec.format), capacity, self.target_layout);

        resampler
            .run(&self.decoded, &mut resampled)
            .map_err(|e| PlayerError::AudioCodec(format!("重采样失败: {}", e)))?;

        self.push_resampled(&resampled, device)
    }

    /// 把一帧交错 PCM 推入设备队列
    fn push_resampled(&self, resampled: &util::frame::Audio, device: &mut dyn AudioDevice) -> Result<usize> {
        let samples = resampled.samples();
        if samples == 0 {
            // 重采样器还在缓冲
            return Ok(0);
        }

        let size = packed_buffer_size(self.spec.channels, samples, self.spec.format);
        let data = resampled.data(0);
        let size = size.min(data.len());
        device.queue(&data[..size])?;

        Ok(size)
    }
}
