use image::RgbImage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::error::{AnalysisError, AnalysisResult};
use crate::models::{Asset, SceneAnalysis};
use crate::scene_detector::SceneDetector;

/// 帧采样配置
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerConfig {
    /// 每个素材的采样点数量
    pub sample_count: usize,
    /// 解码帧的最长边（像素），用于控制分析开销
    pub frame_max_dimension: u32,
    /// 单像素显著变化阈值（0-255）
    pub significant_change_threshold: u8,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            sample_count: 12,
            frame_max_dimension: 256,
            significant_change_threshold: 30,
        }
    }
}

/// 协作式取消标志，在素材之间和采样点之间检查
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// 已打开的单个素材解码句柄
///
/// seek 依赖句柄内部状态，同一句柄上的调用必须串行。
pub trait FrameSource: Send {
    /// 跳转到指定时间点并解码一帧（最长边不超过 max_dimension）
    fn seek_and_decode(&mut self, time_point: f64, max_dimension: u32) -> AnalysisResult<RgbImage>;
}

/// 帧解码协作方：为素材打开解码句柄
pub trait FrameDecoder: Send + Sync {
    fn open(&self, asset: &Asset) -> AnalysisResult<Box<dyn FrameSource>>;
}

/// 单个采样帧
#[derive(Debug, Clone)]
pub struct SampledFrame {
    pub time_point: f64,
    pub image: RgbImage,
}

/// 单个素材的采样结果
#[derive(Debug, Clone, Default)]
pub struct SampledAsset {
    pub scenes: Vec<SceneAnalysis>,
    pub frames: Vec<SampledFrame>,
    /// 解码失败被跳过的时间点数量
    pub failed_points: usize,
    /// 采样过程中收到取消信号
    pub cancelled: bool,
}

/// 帧采样器
pub struct FrameSampler {
    config: SamplerConfig,
    detector: SceneDetector,
}

impl FrameSampler {
    pub fn new(config: SamplerConfig, detector: SceneDetector) -> Self {
        Self { config, detector }
    }

    /// 在 [0, duration) 上均匀分布的采样时间点
    pub fn sample_points(duration: f64, count: usize) -> Vec<f64> {
        if !(duration > 0.0) || count == 0 {
            return Vec::new();
        }
        let step = duration / count as f64;
        (0..count).map(|i| i as f64 * step).collect()
    }

    /// 按顺序逐个时间点 seek 并解码，计算相邻帧的运动分数
    ///
    /// 单个时间点解码失败只记录日志并跳过，下一帧与最近一次成功解码的帧比较。
    pub fn sample(
        &self,
        source: &mut dyn FrameSource,
        asset: &Asset,
        cancel: &CancelFlag,
    ) -> SampledAsset {
        let start = Instant::now();
        let points = Self::sample_points(asset.duration, self.config.sample_count);
        let mut result = SampledAsset::default();
        let mut scores: Vec<(f64, f64)> = Vec::with_capacity(points.len());

        for &time_point in &points {
            if cancel.is_cancelled() {
                debug!("⏹️  [帧采样] {} 在 {:.2}s 处收到取消信号", asset.id, time_point);
                result.cancelled = true;
                break;
            }

            let image = match source.seek_and_decode(time_point, self.config.frame_max_dimension) {
                Ok(image) => image,
                Err(e) => {
                    warn!("⚠️  [帧采样] {} 在 {:.2}s 解码失败，跳过: {}", asset.id, time_point, e);
                    result.failed_points += 1;
                    continue;
                }
            };

            if let Some(prev) = result.frames.last() {
                let score = self.detector.motion_score(&prev.image, &image);
                scores.push((time_point, score));
            }
            result.frames.push(SampledFrame { time_point, image });
        }

        result.scenes = self.detector.build_analyses(&asset.id, &scores);

        debug!(
            "✅ [帧采样] {}: {} 个采样点，成功 {} 帧，失败 {} 个，耗时 {:.0}ms",
            asset.id,
            points.len(),
            result.frames.len(),
            result.failed_points,
            start.elapsed().as_millis()
        );

        result
    }
}

/// 打开素材并完成采样（阻塞调用，应放在 spawn_blocking 中执行）
pub fn open_and_sample(
    decoder: &dyn FrameDecoder,
    sampler: &FrameSampler,
    asset: &Asset,
    cancel: &CancelFlag,
) -> AnalysisResult<SampledAsset> {
    if cancel.is_cancelled() {
        return Err(AnalysisError::Cancelled);
    }
    let mut source = decoder.open(asset)?;
    Ok(sampler.sample(source.as_mut(), asset, cancel))
}
