use crate::core::types::SampleFormat;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// 像素转换质量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalerQuality {
    FastBilinear,
    Bilinear,
    Bicubic,
}

/// 引擎配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 解码线程每轮之间的休眠（毫秒）
    pub decode_interval_ms: u64,
    /// 请求的音频设备缓冲区（每声道采样数）
    pub audio_buffer_samples: u32,
    /// 请求的音频采样格式（设备可能协商为其他格式）
    pub audio_sample_format: SampleFormat,
    pub scaler: ScalerQuality,
    /// 网络流打开/读取超时（毫秒）
    pub network_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            decode_interval_ms: 1,
            audio_buffer_samples: 4096,
            audio_sample_format: SampleFormat::I16,
            scaler: ScalerQuality::Bilinear,
            network_timeout_ms: 15_000,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    pub fn decode_interval(&self) -> Duration {
        Duration::from_millis(self.decode_interval_ms)
    }
}
