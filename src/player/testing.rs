// 测试辅助：运行时生成的媒体夹具 + 记录型输出设备

use crate::core::{AudioSpec, PixelFormat, PlayerError, Result, VideoFrame};
use crate::player::output::{AudioDevice, PresentSurface};
use ffmpeg_next as ffmpeg;
use parking_lot::Mutex;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};

pub const Y4M_WIDTH: u32 = 32;
pub const Y4M_HEIGHT: u32 = 24;

static INIT: Once = Once::new();

pub fn init_backend() {
    INIT.call_once(|| {
        ffmpeg::init().unwrap();
        ffmpeg::util::log::set_level(ffmpeg::util::log::Level::Error);
    });
}

/// 写一个只有视频流的 YUV4MPEG2 片段（25fps，4:2:0）
pub fn write_y4m(dir: &Path, frames: usize) -> PathBuf {
    let path = dir.join(format!("clip_{}.y4m", frames));
    let mut file = fs::File::create(&path).unwrap();
    writeln!(file, "YUV4MPEG2 W{} H{} F25:1 Ip A1:1 C420jpeg", Y4M_WIDTH, Y4M_HEIGHT).unwrap();

    for i in 0..frames {
        file.write_all(b"FRAME\n").unwrap();
        file.write_all(&y4m_frame(i)).unwrap();
    }
    path
}

fn y4m_frame(index: usize) -> Vec<u8> {
    let luma = (Y4M_WIDTH * Y4M_HEIGHT) as usize;
    let chroma = luma / 4;
    let mut frame = Vec::with_capacity(luma + chroma * 2);
    frame.extend(std::iter::repeat((index * 7 % 220) as u8 + 16).take(luma));
    frame.extend(std::iter::repeat(128u8).take(chroma * 2));
    frame
}

/// y4m 解封装器每次最多读 80 字节找帧头，找不到就报 InvalidData
const Y4M_BAD_HEADER_BLOCK: usize = 80;

/// 在正常帧中间插入 `bad_blocks` 段无法解析的数据，每段都会让一次读包失败
pub fn write_y4m_with_gap(dir: &Path, before: usize, bad_blocks: usize, after: usize) -> PathBuf {
    let path = dir.join(format!("gap_{}_{}_{}.y4m", before, bad_blocks, after));
    let mut file = fs::File::create(&path).unwrap();
    writeln!(file, "YUV4MPEG2 W{} H{} F25:1 Ip A1:1 C420jpeg", Y4M_WIDTH, Y4M_HEIGHT).unwrap();
    for i in 0..before {
        file.write_all(b"FRAME\n").unwrap();
        file.write_all(&y4m_frame(i)).unwrap();
    }
    file.write_all(&vec![b'x'; Y4M_BAD_HEADER_BLOCK * bad_blocks]).unwrap();
    for i in 0..after {
        file.write_all(b"FRAME\n").unwrap();
        file.write_all(&y4m_frame(before + i)).unwrap();
    }
    path
}

fn riff_chunk(id: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut chunk = id.to_vec();
    chunk.extend_from_slice(&(body.len() as u32).to_le_bytes());
    chunk.extend_from_slice(body);
    if body.len() % 2 == 1 {
        chunk.push(0);
    }
    chunk
}

fn riff_list(kind: &[u8; 4], children: &[u8]) -> Vec<u8> {
    let mut body = kind.to_vec();
    body.extend_from_slice(children);
    riff_chunk(b"LIST", &body)
}

fn le_u32s(values: &[u32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// 写一个同时带视频（I420 原始帧，25fps）和音频（8kHz 单声道 PCM）的 AVI
pub fn write_avi(dir: &Path, frames: usize) -> PathBuf {
    const RATE: u32 = 8000;
    let samples_per_frame = RATE / 25;
    let frame_bytes = (Y4M_WIDTH * Y4M_HEIGHT * 3 / 2) as u32;

    let avih = le_u32s(&[40_000, 0, 0, 0, frames as u32, 0, 2, 0, Y4M_WIDTH, Y4M_HEIGHT, 0, 0, 0, 0]);

    let mut video_strh = b"vidsI420".to_vec();
    video_strh.extend(le_u32s(&[0, 0, 0, 1, 25, 0, frames as u32, frame_bytes, u32::MAX, 0]));
    video_strh.extend([0u16, 0, Y4M_WIDTH as u16, Y4M_HEIGHT as u16].iter().flat_map(|v| v.to_le_bytes()));
    let mut video_strf = le_u32s(&[40, Y4M_WIDTH, Y4M_HEIGHT]);
    video_strf.extend_from_slice(&1u16.to_le_bytes());
    video_strf.extend_from_slice(&12u16.to_le_bytes());
    video_strf.extend_from_slice(b"I420");
    video_strf.extend(le_u32s(&[frame_bytes, 0, 0, 0, 0]));

    let mut audio_strh = b"auds".to_vec();
    audio_strh.extend(le_u32s(&[0, 0, 0, 1, RATE, 0, samples_per_frame * frames as u32, 0, u32::MAX, 2]));
    audio_strh.extend([0u16; 4].iter().flat_map(|v| v.to_le_bytes()));
    let mut audio_strf = Vec::new();
    audio_strf.extend_from_slice(&1u16.to_le_bytes()); // PCM
    audio_strf.extend_from_slice(&1u16.to_le_bytes());
    audio_strf.extend(le_u32s(&[RATE, RATE * 2]));
    audio_strf.extend_from_slice(&2u16.to_le_bytes());
    audio_strf.extend_from_slice(&16u16.to_le_bytes());
    audio_strf.extend_from_slice(&0u16.to_le_bytes());

    let mut video_strl = riff_chunk(b"strh", &video_strh);
    video_strl.extend(riff_chunk(b"strf", &video_strf));
    let mut audio_strl = riff_chunk(b"strh", &audio_strh);
    audio_strl.extend(riff_chunk(b"strf", &audio_strf));

    let mut hdrl = riff_chunk(b"avih", &avih);
    hdrl.extend(riff_list(b"strl", &video_strl));
    hdrl.extend(riff_list(b"strl", &audio_strl));

    let mut movi = Vec::new();
    for i in 0..frames {
        movi.extend(riff_chunk(b"00dc", &y4m_frame(i)));
        let pcm: Vec<u8> = (0..samples_per_frame)
            .map(|n| (((n as f32 / RATE as f32) * 440.0 * std::f32::consts::TAU).sin() * 8000.0) as i16)
            .flat_map(|v| v.to_le_bytes())
            .collect();
        movi.extend(riff_chunk(b"01wb", &pcm));
    }

    let mut riff = b"AVI ".to_vec();
    riff.extend(riff_list(b"hdrl", &hdrl));
    riff.extend(riff_list(b"movi", &movi));

    let path = dir.join(format!("av_{}.avi", frames));
    fs::write(&path, riff_chunk(b"RIFF", &riff)).unwrap();
    path
}

/// 写一个只有音频流的 16 位 PCM WAV（440Hz 正弦）
pub fn write_wav(dir: &Path, sample_rate: u32, channels: u16, samples: u32) -> PathBuf {
    let path = dir.join(format!("tone_{}_{}.wav", sample_rate, channels));
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for n in 0..samples {
        let t = n as f32 / sample_rate as f32;
        let value = ((t * 440.0 * std::f32::consts::TAU).sin() * i16::MAX as f32 * 0.5) as i16;
        for _ in 0..channels {
            writer.write_sample(value).unwrap();
        }
    }
    writer.finalize().unwrap();
    path
}

/// 只有字幕流的文件
pub fn write_srt(dir: &Path) -> PathBuf {
    let path = dir.join("subtitles.srt");
    fs::write(
        &path,
        "1\n00:00:00,000 --> 00:00:01,000\nhello\n\n2\n00:00:01,500 --> 00:00:02,500\nworld\n",
    )
    .unwrap();
    path
}

#[derive(Debug, Default)]
pub struct SurfaceProbe {
    pub configured: Vec<(u32, u32)>,
    pub presented: usize,
    pub last_planes: usize,
    pub last_stride: usize,
    pub fail_configure: bool,
    pub released: usize,
}

pub struct FakeSurface {
    format: PixelFormat,
    probe: Arc<Mutex<SurfaceProbe>>,
}

impl FakeSurface {
    pub fn new(format: PixelFormat) -> (Self, Arc<Mutex<SurfaceProbe>>) {
        let probe = Arc::new(Mutex::new(SurfaceProbe::default()));
        (
            Self {
                format,
                probe: probe.clone(),
            },
            probe,
        )
    }
}

impl PresentSurface for FakeSurface {
    fn pixel_format(&self) -> PixelFormat {
        self.format
    }

    fn configure(&mut self, width: u32, height: u32) -> Result<()> {
        let mut probe = self.probe.lock();
        if probe.fail_configure {
            return Err(PlayerError::PresentationBackend("fake surface refused".to_string()));
        }
        probe.configured.push((width, height));
        Ok(())
    }

    fn update(&mut self, frame: &VideoFrame<'_>) -> Result<()> {
        let mut probe = self.probe.lock();
        probe.last_planes = frame.planes.len();
        probe.last_stride = frame.planes.first().map_or(0, |p| p.stride);
        Ok(())
    }

    fn present(&mut self) -> Result<()> {
        self.probe.lock().presented += 1;
        Ok(())
    }

    fn release(&mut self) {
        self.probe.lock().released += 1;
    }
}

#[derive(Debug, Default)]
pub struct AudioProbe {
    pub requested: Option<AudioSpec>,
    pub opened: usize,
    pub queued: Vec<u8>,
    /// 累计入队字节数（不受 clear 影响）
    pub total_queued: usize,
    pub paused: bool,
    pub cleared: usize,
    pub closed: usize,
    pub fail_open: bool,
}

pub struct FakeAudioDevice {
    negotiated: Option<AudioSpec>,
    probe: Arc<Mutex<AudioProbe>>,
}

impl FakeAudioDevice {
    /// 原样接受请求规格
    pub fn new() -> (Self, Arc<Mutex<AudioProbe>>) {
        Self::build(None)
    }

    /// 总是协商为给定规格
    pub fn negotiating(spec: AudioSpec) -> (Self, Arc<Mutex<AudioProbe>>) {
        Self::build(Some(spec))
    }

    fn build(negotiated: Option<AudioSpec>) -> (Self, Arc<Mutex<AudioProbe>>) {
        let probe = Arc::new(Mutex::new(AudioProbe::default()));
        (
            Self {
                negotiated,
                probe: probe.clone(),
            },
            probe,
        )
    }
}

impl AudioDevice for FakeAudioDevice {
    fn open(&mut self, requested: &AudioSpec) -> Result<AudioSpec> {
        let mut probe = self.probe.lock();
        if probe.fail_open {
            return Err(PlayerError::PresentationBackend("fake device refused".to_string()));
        }
        probe.requested = Some(*requested);
        probe.opened += 1;
        probe.paused = true;
        Ok(self.negotiated.unwrap_or(*requested))
    }

    fn queue(&mut self, pcm: &[u8]) -> Result<()> {
        let mut probe = self.probe.lock();
        probe.queued.extend_from_slice(pcm);
        probe.total_queued += pcm.len();
        Ok(())
    }

    fn queued_bytes(&self) -> usize {
        self.probe.lock().queued.len()
    }

    fn set_paused(&mut self, paused: bool) {
        self.probe.lock().paused = paused;
    }

    fn clear(&mut self) {
        let mut probe = self.probe.lock();
        probe.queued.clear();
        probe.cleared += 1;
    }

    fn close(&mut self) {
        self.probe.lock().closed += 1;
    }
}
