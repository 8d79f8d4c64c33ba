use ffmpeg_next as ffmpeg;
use ffmpeg_next::Rational;

/// 后端全局时间基（微秒）
pub const BACKEND_TIME_BASE: f64 = ffmpeg::ffi::AV_TIME_BASE as f64;

/// 流时间戳 -> 秒
pub fn timestamp_to_seconds(timestamp: i64, time_base: Rational) -> f64 {
    if time_base.denominator() == 0 {
        return 0.0;
    }
    timestamp as f64 * f64::from(time_base)
}

/// 秒 -> 后端全局时间基下的时间戳
pub fn seconds_to_backend_timestamp(seconds: f64) -> i64 {
    (seconds * BACKEND_TIME_BASE) as i64
}

/// 后端全局时长 -> 秒；未知时长（负值）视为 0
pub fn backend_duration_to_seconds(duration: i64) -> f64 {
    if duration <= 0 {
        return 0.0;
    }
    duration as f64 / BACKEND_TIME_BASE
}
