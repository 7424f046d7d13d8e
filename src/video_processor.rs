use ffmpeg_next as ffmpeg;
use image::RgbImage;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{AnalysisError, AnalysisResult};
use crate::frame_sampler::{FrameDecoder, FrameSource};
use crate::models::{Asset, MediaKind};

/// 单次 seek 后最多读取的数据包数量，避免无限读取
const MAX_PACKETS_PER_SEEK: usize = 120;

static FFMPEG_INIT: OnceLock<Result<(), String>> = OnceLock::new();

/// 初始化 FFmpeg，并把日志级别设置为 ERROR，抑制警告和信息消息
fn init_ffmpeg() -> AnalysisResult<()> {
    FFMPEG_INIT
        .get_or_init(|| {
            ffmpeg::init().map_err(|e| format!("初始化 FFmpeg 失败: {}", e))?;
            ffmpeg::util::log::set_level(ffmpeg::util::log::Level::Error);
            Ok(())
        })
        .clone()
        .map_err(AnalysisError::Decode)
}

fn decode_err(context: &str, asset: &Asset, err: impl std::fmt::Display) -> AnalysisError {
    AnalysisError::Decode(format!("{}: {}: {}", context, asset.file_name, err))
}

/// 基于 ffmpeg-next 的帧解码器
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegFrameDecoder;

impl FfmpegFrameDecoder {
    pub fn new() -> AnalysisResult<Self> {
        init_ffmpeg()?;
        Ok(Self)
    }
}

impl FrameDecoder for FfmpegFrameDecoder {
    fn open(&self, asset: &Asset) -> AnalysisResult<Box<dyn FrameSource>> {
        let input = ffmpeg::format::input(&asset.path).map_err(|e| decode_err("无法打开视频文件", asset, e))?;

        let stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| decode_err("未找到视频流", asset, "no video stream"))?;
        let stream_index = stream.index();
        let time_base = stream.time_base();

        let decoder = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| decode_err("无法创建解码器上下文", asset, e))?
            .decoder()
            .video()
            .map_err(|e| decode_err("无法创建视频解码器", asset, e))?;

        Ok(Box::new(FfmpegFrameSource {
            file_name: asset.file_name.clone(),
            input,
            decoder,
            stream_index,
            time_base: f64::from(time_base),
        }))
    }
}

/// 一个已打开的视频输入及其解码器
///
/// seek 会移动输入的读取位置，所以同一句柄上只能串行取帧。
struct FfmpegFrameSource {
    file_name: String,
    input: ffmpeg::format::context::Input,
    decoder: ffmpeg::decoder::Video,
    stream_index: usize,
    /// 流时间基（秒/单位）
    time_base: f64,
}

impl FrameSource for FfmpegFrameSource {
    fn seek_and_decode(&mut self, time_point: f64, max_dimension: u32) -> AnalysisResult<RgbImage> {
        let timestamp = (time_point * ffmpeg::ffi::AV_TIME_BASE as f64) as i64;

        // 向后查找最近的 keyframe，再向前解码到目标时间点
        self.input
            .seek(timestamp, ..timestamp)
            .map_err(|e| AnalysisError::Decode(format!("{} seek 到 {:.2}s 失败: {}", self.file_name, time_point, e)))?;
        self.decoder.flush();

        let mut decoded = ffmpeg::frame::Video::empty();
        let mut last: Option<ffmpeg::frame::Video> = None;
        let mut packets_read = 0;

        for (stream, packet) in self.input.packets() {
            if stream.index() != self.stream_index {
                continue;
            }
            packets_read += 1;
            if packets_read > MAX_PACKETS_PER_SEEK {
                break;
            }
            if self.decoder.send_packet(&packet).is_err() {
                continue;
            }

            while self.decoder.receive_frame(&mut decoded).is_ok() {
                let frame_time = decoded
                    .timestamp()
                    .map(|ts| ts as f64 * self.time_base)
                    .unwrap_or(time_point);
                if frame_time >= time_point {
                    return frame_to_image(&decoded, max_dimension);
                }
                last = Some(std::mem::replace(&mut decoded, ffmpeg::frame::Video::empty()));
            }
        }

        // 读到文件末尾：冲刷解码器中剩余的帧
        if self.decoder.send_eof().is_ok() {
            while self.decoder.receive_frame(&mut decoded).is_ok() {
                let frame_time = decoded
                    .timestamp()
                    .map(|ts| ts as f64 * self.time_base)
                    .unwrap_or(time_point);
                if frame_time >= time_point {
                    return frame_to_image(&decoded, max_dimension);
                }
                last = Some(std::mem::replace(&mut decoded, ffmpeg::frame::Video::empty()));
            }
        }

        match last {
            Some(frame) => frame_to_image(&frame, max_dimension),
            None => Err(AnalysisError::Decode(format!(
                "{} 在 {:.2}s 处没有可解码的帧",
                self.file_name, time_point
            ))),
        }
    }
}

/// 按最长边缩放后的尺寸，保持宽高比，最小为 1
pub fn scaled_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let longest = width.max(height);
    if max_dimension == 0 || longest <= max_dimension {
        return (width.max(1), height.max(1));
    }
    let ratio = max_dimension as f64 / longest as f64;
    let scale = |v: u32| ((v as f64 * ratio).round() as u32).max(1);
    (scale(width), scale(height))
}

/// 把解码帧缩放并转换为 RGB 图像
fn frame_to_image(frame: &ffmpeg::frame::Video, max_dimension: u32) -> AnalysisResult<RgbImage> {
    let (width, height) = scaled_dimensions(frame.width(), frame.height(), max_dimension);

    let mut scaler = ffmpeg::software::scaling::Context::get(
        frame.format(),
        frame.width(),
        frame.height(),
        ffmpeg::format::Pixel::RGB24,
        width,
        height,
        ffmpeg::software::scaling::Flags::BILINEAR,
    )
    .map_err(|e| AnalysisError::Decode(format!("无法创建缩放器: {}", e)))?;

    let mut rgb_frame = ffmpeg::frame::Video::empty();
    scaler
        .run(frame, &mut rgb_frame)
        .map_err(|e| AnalysisError::Decode(format!("帧缩放失败: {}", e)))?;

    // RGB24 格式：每个像素 3 字节，每行按 stride 对齐
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let row_bytes = width as usize * 3;
    let mut buffer = Vec::with_capacity(row_bytes * height as usize);
    for y in 0..height as usize {
        let start = y * stride;
        let row = data
            .get(start..start + row_bytes)
            .ok_or_else(|| AnalysisError::Decode("RGB 帧数据长度不足".to_string()))?;
        buffer.extend_from_slice(row);
    }

    RgbImage::from_raw(width, height, buffer)
        .ok_or_else(|| AnalysisError::Decode("RGB 帧数据长度不足".to_string()))
}

/// 根据扩展名判断 MIME 类型
pub fn guess_mime_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

fn media_kind(mime_type: &str) -> Option<MediaKind> {
    if mime_type.starts_with("video/") {
        Some(MediaKind::Video)
    } else if mime_type.starts_with("audio/") {
        Some(MediaKind::Audio)
    } else {
        None
    }
}

/// 递归扫描目录下的音视频文件（按路径排序）
pub fn scan_media_files(dir: &Path) -> AnalysisResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(AnalysisError::Validation(format!("输入目录不存在: {}", dir.display())));
    }

    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("⚠️  [素材导入] 跳过无法访问的路径: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| media_kind(&guess_mime_type(path)).is_some())
        .collect();

    files.sort();
    Ok(files)
}

/// 读取文件系统层面的素材信息（不打开媒体流）
pub fn describe_file(path: &Path) -> AnalysisResult<Asset> {
    let metadata = fs::metadata(path)?;
    let mime_type = guess_mime_type(path);
    let kind = media_kind(&mime_type)
        .ok_or_else(|| AnalysisError::Validation(format!("不支持的文件类型 {}: {}", mime_type, path.display())))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "asset".to_string());
    let suffix = uuid::Uuid::new_v4().simple().to_string();

    Ok(Asset {
        id: format!("{}-{}", stem, &suffix[..8]),
        path: path.to_path_buf(),
        file_name,
        kind,
        duration: 0.0,
        fps: 0.0,
        width: 0,
        height: 0,
        byte_size: metadata.len(),
        mime_type,
    })
}

/// 读取时长、帧率和分辨率
pub fn probe_media(asset: &mut Asset) -> AnalysisResult<()> {
    init_ffmpeg()?;
    let input = ffmpeg::format::input(&asset.path).map_err(|e| decode_err("无法打开媒体文件", asset, e))?;

    let duration = input.duration();
    if duration > 0 {
        asset.duration = duration as f64 / ffmpeg::ffi::AV_TIME_BASE as f64;
    }

    if let Some(stream) = input.streams().best(ffmpeg::media::Type::Video) {
        let fps = stream.avg_frame_rate();
        if fps.denominator() > 0 {
            asset.fps = fps.numerator() as f64 / fps.denominator() as f64;
        }
        let decoder = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .and_then(|ctx| ctx.decoder().video())
            .map_err(|e| decode_err("无法创建视频解码器", asset, e))?;
        asset.width = decoder.width();
        asset.height = decoder.height();
    }

    Ok(())
}

/// 导入单个素材：文件信息 + 媒体探测
///
/// 探测失败不视为导入失败，时长保持为 0，在分析阶段报告为解码错误。
pub fn load_asset(path: &Path) -> AnalysisResult<Asset> {
    let mut asset = describe_file(path)?;
    if let Err(e) = probe_media(&mut asset) {
        warn!("⚠️  [素材导入] 媒体探测失败: {}", e);
    }
    debug!(
        "📥 [素材导入] {} ({}, {:.2}s, {}x{}, {} 字节)",
        asset.file_name, asset.mime_type, asset.duration, asset.width, asset.height, asset.byte_size
    );
    Ok(asset)
}

/// 导入目录下的所有素材
pub fn ingest_directory(dir: &Path) -> AnalysisResult<Vec<Asset>> {
    let mut assets = Vec::new();
    for path in scan_media_files(dir)? {
        match load_asset(&path) {
            Ok(asset) => assets.push(asset),
            Err(e) => warn!("⚠️  [素材导入] 跳过 {}: {}", path.display(), e),
        }
    }
    Ok(assets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaled_dimensions_keep_aspect_ratio() {
        assert_eq!(scaled_dimensions(1920, 1080, 256), (256, 144));
        assert_eq!(scaled_dimensions(1080, 1920, 256), (144, 256));
        assert_eq!(scaled_dimensions(200, 100, 256), (200, 100));
        assert_eq!(scaled_dimensions(4000, 10, 100), (100, 1));
    }

    #[test]
    fn test_scan_filters_non_media_files() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("day1");
        fs::create_dir(&nested).unwrap();
        fs::write(dir.path().join("ceremony_01.mp4"), b"x").unwrap();
        fs::write(nested.join("speech.mov"), b"x").unwrap();
        fs::write(dir.path().join("song.mp3"), b"x").unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        let files = scan_media_files(dir.path()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["ceremony_01.mp4", "speech.mov", "song.mp3"]);
    }

    #[test]
    fn test_scan_missing_directory_is_rejected() {
        let result = scan_media_files(Path::new("/nonexistent/event"));
        assert!(matches!(result, Err(AnalysisError::Validation(_))));
    }

    #[test]
    fn test_describe_file_reads_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reception_dance.mkv");
        fs::write(&path, vec![0u8; 2048]).unwrap();

        let asset = describe_file(&path).unwrap();
        assert_eq!(asset.file_name, "reception_dance.mkv");
        assert_eq!(asset.kind, MediaKind::Video);
        assert_eq!(asset.mime_type, "video/x-matroska");
        assert_eq!(asset.byte_size, 2048);
        assert!(asset.id.starts_with("reception_dance-"));
        assert_eq!(asset.id.len(), "reception_dance-".len() + 8);
        assert_eq!(asset.duration, 0.0);
    }

    #[test]
    fn test_describe_file_rejects_unknown_types() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("readme.txt");
        fs::write(&path, b"hello").unwrap();
        assert!(matches!(describe_file(&path), Err(AnalysisError::Validation(_))));
    }
}
