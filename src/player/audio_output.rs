use crate::core::{AudioSpec, PlayerError, Result, SampleFormat};
use crate::player::output::AudioDevice;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig, SupportedStreamConfigRange};
use crossbeam::queue::SegQueue;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;

/// 请求规格不被支持时依次尝试的标准配置
pub(crate) fn fallback_candidates(requested: &AudioSpec) -> Vec<(u32, u16)> {
    let mut candidates = vec![
        (48000, 2),  // 最常见
        (44100, 2),  // CD 音质
        (48000, 1),
        (44100, 1),
        (requested.sample_rate, 2),
        (requested.sample_rate, 1),
    ];
    // 去掉与原请求相同的组合（已经试过）和重复项
    let mut seen = Vec::with_capacity(candidates.len());
    candidates.retain(|&candidate| {
        if candidate == (requested.sample_rate, requested.channels) || seen.contains(&candidate) {
            return false;
        }
        seen.push(candidate);
        true
    });
    candidates
}

/// 基于 cpal 的推送式音频输出
///
/// 样本以 f32 存入无锁队列，由 cpal 回调线程异步消费；队列深度不设上限。
pub struct CpalAudioDevice {
    device: Device,
    stream: Option<Stream>,
    buffer: Arc<SegQueue<f32>>,
    volume: Arc<Mutex<f32>>,
}

// cpal::Stream 本身不是 Send，但设备只在持有控制器锁时被访问
unsafe impl Send for CpalAudioDevice {}

impl CpalAudioDevice {
    /// 获取默认输出设备；音频子系统不可用时返回 `Memory`
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| PlayerError::Memory("无法找到音频输出设备".to_string()))?;

        debug!("使用音频设备: {}", device.name().unwrap_or_default());

        Ok(Self {
            device,
            stream: None,
            buffer: Arc::new(SegQueue::new()),
            volume: Arc::new(Mutex::new(1.0)),
        })
    }

    /// 检查配置是否兼容
    fn is_config_compatible(config: &StreamConfig, supported: &SupportedStreamConfigRange) -> bool {
        let rate_in_range = config.sample_rate.0 >= supported.min_sample_rate().0
            && config.sample_rate.0 <= supported.max_sample_rate().0;

        rate_in_range && config.channels == supported.channels()
    }

    fn is_supported(&self, config: &StreamConfig) -> Result<bool> {
        let supported_configs = self
            .device
            .supported_output_configs()
            .map_err(|e| PlayerError::PresentationBackend(format!("无法获取支持的音频配置: {}", e)))?;

        Ok(supported_configs
            .into_iter()
            .any(|supported| Self::is_config_compatible(config, &supported)))
    }

    /// 选出设备实际支持的配置：优先原请求，否则回退到标准配置
    fn negotiate(&self, requested: &AudioSpec) -> Result<StreamConfig> {
        let config = StreamConfig {
            channels: requested.channels,
            sample_rate: cpal::SampleRate(requested.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };
        if self.is_supported(&config)? {
            return Ok(config);
        }

        warn!(
            "⚠️  音频设备不支持 {} Hz, {} 声道配置，回退到标准配置",
            requested.sample_rate, requested.channels
        );

        for (rate, channels) in fallback_candidates(requested) {
            let fallback = StreamConfig {
                channels,
                sample_rate: cpal::SampleRate(rate),
                buffer_size: cpal::BufferSize::Default,
            };
            if self.is_supported(&fallback)? {
                info!("✅ 使用回退配置: {} Hz, {} 声道", rate, channels);
                return Ok(fallback);
            }
        }

        // 最后使用设备默认配置
        let default = self
            .device
            .default_output_config()
            .map_err(|e| PlayerError::PresentationBackend(format!("无法获取默认音频配置: {}", e)))?;
        Ok(default.config())
    }

    /// 设置音量 (0.0 - 1.0)
    pub fn set_volume(&self, volume: f32) {
        *self.volume.lock() = volume.clamp(0.0, 1.0);
    }

    pub fn volume(&self) -> f32 {
        *self.volume.lock()
    }
}

impl AudioDevice for CpalAudioDevice {
    fn open(&mut self, requested: &AudioSpec) -> Result<AudioSpec> {
        info!(
            "初始化音频输出: {} Hz, {} 声道",
            requested.sample_rate, requested.channels
        );
        self.close();

        let config = self.negotiate(requested)?;

        let buffer = self.buffer.clone();
        let volume = self.volume.clone();

        let stream = self
            .device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let vol = *volume.lock();
                    for sample in data.iter_mut() {
                        *sample = buffer.pop().map_or(0.0, |value| value * vol);
                    }
                },
                move |err| {
                    error!("音频流错误: {}", err);
                },
                None,
            )
            .map_err(|e| PlayerError::PresentationBackend(format!("创建音频流失败: {}", e)))?;

        // 与队列式设备一致：打开后保持暂停，等待 play
        if let Err(e) = stream.pause() {
            debug!("暂停新建音频流失败: {}", e);
        }

        let negotiated = AudioSpec {
            sample_rate: config.sample_rate.0,
            channels: config.channels,
            format: SampleFormat::F32,
            buffer_samples: requested.buffer_samples,
        };
        self.stream = Some(stream);

        Ok(negotiated)
    }

    fn queue(&mut self, pcm: &[u8]) -> Result<()> {
        if self.stream.is_none() {
            return Err(PlayerError::PresentationBackend("音频设备未打开".to_string()));
        }
        for chunk in pcm.chunks_exact(std::mem::size_of::<f32>()) {
            self.buffer.push(bytemuck::pod_read_unaligned::<f32>(chunk));
        }
        Ok(())
    }

    fn queued_bytes(&self) -> usize {
        self.buffer.len() * std::mem::size_of::<f32>()
    }

    fn set_paused(&mut self, paused: bool) {
        let Some(stream) = self.stream.as_ref() else {
            return;
        };
        let result = if paused { stream.pause() } else { stream.play() };
        if let Err(e) = result {
            warn!("切换音频流状态失败 (paused={}): {}", paused, e);
        }
    }

    fn clear(&mut self) {
        while self.buffer.pop().is_some() {}
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            info!("音频输出已停止");
        }
        self.clear();
    }
}

impl Drop for CpalAudioDevice {
    fn drop(&mut self) {
        self.close();
    }
}
