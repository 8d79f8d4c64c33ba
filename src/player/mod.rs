// 播放引擎模块

pub mod media_source;
pub mod video_pipeline;
pub mod audio_pipeline;
pub(crate) mod decode_loop;
pub mod controller;
pub mod output;
pub mod audio_output;

#[cfg(test)]
pub(crate) mod testing;

pub use media_source::{is_network_url, MediaSource};
pub use video_pipeline::VideoPipeline;
pub use audio_pipeline::{packed_buffer_size, AudioPipeline};
pub use controller::PlaybackController;
pub use output::{AudioDevice, HeadlessSurface, OutputDevices, PresentSurface};
pub use audio_output::CpalAudioDevice;
