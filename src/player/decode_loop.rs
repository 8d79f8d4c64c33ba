use crate::core::{PlaybackState, Result};
use crate::player::controller::{EngineState, LoadedMedia};
use crate::player::media_source::release_packet;
use log::{debug, error, info, trace, warn};
use parking_lot::Mutex;
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn log_ctx() -> String {
    format!("[pid:{}-tid:{:?}]", process::id(), thread::current().id())
}

/// 解码线程主循环
///
/// 每次迭代持锁执行一步，然后释放锁休眠 `interval`。状态离开 `Playing`
/// 后在下一次迭代开头退出，取消延迟不超过一步处理加一次休眠。
pub(crate) fn run(shared: Arc<Mutex<EngineState>>, interval: Duration) {
    info!("{} 🎬 解码线程启动", log_ctx());
    let mut steps: u64 = 0;

    loop {
        {
            let mut engine = shared.lock();
            if engine.state != PlaybackState::Playing {
                debug!("{} 状态变为 {:?}，解码线程退出", log_ctx(), engine.state);
                break;
            }

            if let Err(e) = step(&mut engine) {
                error!("{} ❌ 解码失败: {}", log_ctx(), e);
                engine.fail(e.kind());
                break;
            }
        }

        steps += 1;
        thread::sleep(interval);
    }

    info!("{} ✅ 解码线程已结束（共 {} 步）", log_ctx(), steps);
}

/// 连续读包失败达到这个次数就按流末尾处理
pub(crate) const MAX_READ_FAILURES: u32 = 200;

/// 连续失败时每隔多少次才打一条 warn
const READ_FAILURE_LOG_EVERY: u32 = 50;

/// 读取一个数据包并交给对应的管线
///
/// 只有解码器拒收数据包才返回错误。读包失败（非 EOF）只记日志，下一步重试；
/// 连续失败 `MAX_READ_FAILURES` 次后视为流已结束。
/// 到达流末尾时排空解码器一次，之后的步骤什么都不做。
pub(crate) fn step(engine: &mut EngineState) -> Result<()> {
    if engine.end_of_stream {
        return Ok(());
    }
    let Some(media) = engine.media.as_mut() else {
        return Ok(());
    };
    let LoadedMedia {
        source,
        video,
        audio,
        packet,
    } = media;

    let reached_end = match source.read_packet(packet) {
        Ok(true) => {
            if engine.read_failures > 0 {
                debug!("{} 读包恢复（此前连续失败 {} 次）", log_ctx(), engine.read_failures);
                engine.read_failures = 0;
            }
            false
        }
        Ok(false) => true,
        Err(e) => {
            engine.read_failures += 1;
            let failures = engine.read_failures;
            if failures >= MAX_READ_FAILURES {
                warn!("{} ⚠️  连续 {} 次读取数据包失败，按流末尾处理: {}", log_ctx(), failures, e);
                true
            } else {
                if failures == 1 || failures % READ_FAILURE_LOG_EVERY == 0 {
                    warn!("{} ⚠️  读取数据包失败（第 {} 次，稍后重试）: {}", log_ctx(), failures, e);
                } else {
                    trace!("读取数据包失败（第 {} 次）: {}", failures, e);
                }
                return Ok(());
            }
        }
    };

    if reached_end {
        if let Some(video) = video.as_mut() {
            if let Some(pts) = video.drain(engine.devices.surface.as_mut()) {
                engine.current_time = pts;
            }
        }
        if let Some(audio) = audio.as_mut() {
            audio.drain(engine.devices.audio.as_mut());
        }
        engine.end_of_stream = true;
        info!("{} 🏁 到达流末尾，位置 {:.3}s", log_ctx(), engine.current_time);
        return Ok(());
    }

    let index = packet.stream();
    if Some(index) == source.video_stream_index() {
        if let Some(video) = video.as_mut() {
            if let Some(pts) = video.decode(packet, engine.devices.surface.as_mut())? {
                engine.current_time = pts;
            }
        }
    } else if Some(index) == source.audio_stream_index() {
        if let Some(audio) = audio.as_mut() {
            let queued = audio.decode(packet, engine.devices.audio.as_mut())?;
            trace!("音频入队 {} 字节", queued);
        }
    }

    release_packet(packet);
    Ok(())
}
