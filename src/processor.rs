use anyhow::Context;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::audio_analyzer::{AudioAnalyzer, AudioAnalyzerConfig};
use crate::audio_extractor::AudioDecoder;
use crate::category::CategoryClassifier;
use crate::config::EngineConfig;
use crate::error::{AnalysisError, AnalysisResult};
use crate::frame_sampler::{open_and_sample, CancelFlag, FrameDecoder, FrameSampler};
use crate::models::{
    Asset, AssetReport, AudioAnalysis, BatchStats, EditDecisionList, MediaKind, OrganizationResult,
};
use crate::oracle::ImageClassifier;
use crate::scene_detector::SceneDetector;
use crate::sequencer::{ClipPool, EditSequencer};

/// 批处理配置
#[derive(Debug, Clone, PartialEq)]
pub struct OrganizerConfig {
    /// 同时分析的素材数量上限（限制同时打开的解码器）
    pub max_concurrent_assets: usize,
    /// 单个素材的最大字节数
    pub max_file_size_bytes: u64,
    /// 支持的视频 MIME 类型（小写）
    pub supported_mime_types: Vec<String>,
    /// Webhook URL（批次完成后回调）
    pub webhook_url: Option<String>,
}

impl Default for OrganizerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_assets: 3,
            max_file_size_bytes: 4 * 1024 * 1024 * 1024,
            supported_mime_types: [
                "video/mp4",
                "video/quicktime",
                "video/x-matroska",
                "video/webm",
                "video/x-msvideo",
                "video/mpeg",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            webhook_url: None,
        }
    }
}

/// 分析开始前的素材校验
pub fn validate_asset(asset: &Asset, config: &OrganizerConfig) -> AnalysisResult<()> {
    if asset.kind != MediaKind::Video {
        return Err(AnalysisError::Validation(format!("{} 不是视频素材", asset.file_name)));
    }

    let mime = asset.mime_type.to_lowercase();
    if !config.supported_mime_types.iter().any(|m| *m == mime) {
        return Err(AnalysisError::Validation(format!(
            "{} 的类型 {} 不受支持",
            asset.file_name, asset.mime_type
        )));
    }

    if asset.byte_size > config.max_file_size_bytes {
        return Err(AnalysisError::Validation(format!(
            "{} 文件过大: {} 字节（上限 {} 字节）",
            asset.file_name, asset.byte_size, config.max_file_size_bytes
        )));
    }

    Ok(())
}

/// 完整工程的输出：素材整理结果 + 音乐分析 + 剪辑决策列表
#[derive(Debug, Clone, serde::Serialize)]
pub struct ProjectOutput {
    pub organization: OrganizationResult,
    /// 音乐解码失败且允许降级时为 None
    pub audio: Option<AudioAnalysis>,
    pub edit_list: EditDecisionList,
}

/// 批处理编排器，持有一次运行所需的全部协作方
pub struct Organizer {
    decoder: Arc<dyn FrameDecoder>,
    oracle: Arc<dyn ImageClassifier>,
    config: Arc<EngineConfig>,
    cancel: CancelFlag,
}

impl Organizer {
    pub fn new(
        decoder: Arc<dyn FrameDecoder>,
        oracle: Arc<dyn ImageClassifier>,
        config: EngineConfig,
        cancel: CancelFlag,
    ) -> AnalysisResult<Self> {
        config.validate()?;
        Ok(Self {
            decoder,
            oracle,
            config: Arc::new(config),
            cancel,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// 并发分析一批素材并按分类整理
    ///
    /// 单个素材的错误记录在其报告中，不会中断批次；取消时已完成的报告保留。
    pub async fn organize(&self, assets: Vec<Asset>) -> OrganizationResult {
        let start = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let total = assets.len();
        info!(
            "🎬 [素材整理] 开始处理 {} 个素材（并发上限 {}），run_id={}",
            total, self.config.organizer.max_concurrent_assets, run_id
        );

        let semaphore = Arc::new(Semaphore::new(self.config.organizer.max_concurrent_assets.max(1)));
        let sampler = Arc::new(FrameSampler::new(
            self.config.sampler.clone(),
            SceneDetector::new(self.config.scene, self.config.sampler.significant_change_threshold),
        ));
        let classifier = Arc::new(CategoryClassifier::new(self.config.fusion.clone()));

        let mut slots: Vec<Option<AssetReport>> = vec![None; total];
        let mut pending: Vec<Option<Asset>> = vec![None; total];
        let mut tasks = JoinSet::new();

        for (index, asset) in assets.into_iter().enumerate() {
            if let Err(e) = validate_asset(&asset, &self.config.organizer) {
                warn!("⚠️  [素材整理] 拒绝素材: {}", e);
                slots[index] = Some(AssetReport::rejected(asset, e.to_string()));
                continue;
            }

            pending[index] = Some(asset.clone());
            let ctx = AssetContext {
                decoder: Arc::clone(&self.decoder),
                oracle: Arc::clone(&self.oracle),
                sampler: Arc::clone(&sampler),
                classifier: Arc::clone(&classifier),
                cancel: self.cancel.clone(),
            };
            let semaphore = Arc::clone(&semaphore);

            tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (index, AssetReport::cancelled(asset)),
                };
                if ctx.cancel.is_cancelled() {
                    return (index, AssetReport::cancelled(asset));
                }
                (index, ctx.analyze(asset).await)
            });
        }

        // 单写者：任务完成后由编排器写入对应位置
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, report)) => {
                    log_report(&report);
                    slots[index] = Some(report);
                }
                Err(e) => error!("❌ [素材整理] 分析任务异常退出: {}", e),
            }
        }

        let reports: Vec<AssetReport> = slots
            .into_iter()
            .zip(pending)
            .filter_map(|(report, asset)| match (report, asset) {
                (Some(report), _) => Some(report),
                (None, Some(asset)) => Some(AssetReport::failed(asset, "分析任务异常退出")),
                (None, None) => None,
            })
            .collect();

        let result = summarize(run_id, reports, self.cancel.is_cancelled());
        info!(
            "✅ [素材整理] 完成：共 {} 个，已分类 {}，未分类 {}，出错 {}，拒绝 {}，耗时 {:.2}秒",
            result.stats.total_files,
            result.stats.categorized_count,
            result.stats.uncategorized_count,
            result.stats.errored_count,
            result.stats.rejected_count,
            start.elapsed().as_secs_f64()
        );

        if let Some(webhook_url) = &self.config.organizer.webhook_url {
            info!("⏳ [素材整理] 正在调用 Webhook 回调...");
            match call_webhook(webhook_url, &result).await {
                Ok(()) => info!("✅ [素材整理] Webhook 回调成功"),
                Err(e) => warn!("⚠️  [素材整理] Webhook 回调失败: {:#}", e),
            }
        }

        result
    }

    /// 素材整理与音乐分析并行执行，两者完成后生成剪辑决策列表
    ///
    /// 音乐无法解码时：allow_degraded 为 true 则以零节拍继续（片段保留自身采样时间点），否则返回错误。
    pub async fn process_project(
        &self,
        assets: Vec<Asset>,
        music: &Path,
        audio_decoder: Arc<dyn AudioDecoder>,
        target_duration: f64,
        allow_degraded: bool,
    ) -> AnalysisResult<ProjectOutput> {
        let start = Instant::now();
        let music_task = analyze_music(audio_decoder, music.to_path_buf(), self.config.audio.clone());

        let (organization, audio) = tokio::join!(self.organize(assets), music_task);

        let audio = match audio {
            Ok(audio) => Some(audio),
            Err(e) if allow_degraded => {
                warn!("⚠️  [剪辑工程] 音乐分析失败，降级为无节拍剪辑: {}", e);
                None
            }
            Err(e) => {
                error!("❌ [剪辑工程] 音乐分析失败: {}", e);
                return Err(e);
            }
        };

        let beats = audio.as_ref().map(|a| a.beats.as_slice()).unwrap_or(&[]);
        let pool = ClipPool::from_analyses(organization.scene_analyses());
        let edit_list = EditSequencer::new(self.config.sequence.clone())?.sequence(&pool, beats, target_duration);

        info!(
            "🎉 [剪辑工程] 处理完成！{} 条剪辑，总耗时: {:.2}秒",
            edit_list.entries.len(),
            start.elapsed().as_secs_f64()
        );

        Ok(ProjectOutput {
            organization,
            audio,
            edit_list,
        })
    }
}

/// 单个素材分析任务需要的协作方
struct AssetContext {
    decoder: Arc<dyn FrameDecoder>,
    oracle: Arc<dyn ImageClassifier>,
    sampler: Arc<FrameSampler>,
    classifier: Arc<CategoryClassifier>,
    cancel: CancelFlag,
}

impl AssetContext {
    async fn analyze(self, asset: Asset) -> AssetReport {
        let start = Instant::now();
        if !(asset.duration > 0.0) {
            return AssetReport::failed(asset, AnalysisError::Decode("无法获取素材时长".to_string()).to_string());
        }

        // 同一解码句柄上的 seek 只能串行，整个采样过程放在阻塞线程中
        let sampled = {
            let decoder = Arc::clone(&self.decoder);
            let sampler = Arc::clone(&self.sampler);
            let cancel = self.cancel.clone();
            let blocking_asset = asset.clone();
            tokio::task::spawn_blocking(move || {
                open_and_sample(decoder.as_ref(), &sampler, &blocking_asset, &cancel)
            })
            .await
        };

        let sampled = match sampled {
            Ok(Ok(sampled)) => sampled,
            Ok(Err(AnalysisError::Cancelled)) => return AssetReport::cancelled(asset),
            Ok(Err(e)) => return AssetReport::failed(asset, e.to_string()),
            Err(e) => return AssetReport::failed(asset, format!("采样任务异常退出: {}", e)),
        };
        if sampled.cancelled {
            return AssetReport::cancelled(asset);
        }

        let mut predictions = Vec::new();
        for frame in &sampled.frames {
            if self.cancel.is_cancelled() {
                return AssetReport::cancelled(asset);
            }
            match self.oracle.classify(&frame.image).await {
                Ok(frame_predictions) => predictions.extend(frame_predictions),
                Err(e) => warn!(
                    "⚠️  [素材分类] {} 在 {:.2}s 的帧标签获取失败: {}",
                    asset.id, frame.time_point, e
                ),
            }
        }

        let category = self.classifier.classify(&predictions, &asset.file_name);
        debug!(
            "🏷️  [素材分类] {} -> {} ({:.2})，{} 个预测，耗时 {:.0}ms",
            asset.id,
            category.category,
            category.confidence,
            predictions.len(),
            start.elapsed().as_millis()
        );

        AssetReport::completed(asset, category, sampled.scenes, sampled.failed_points)
    }
}

fn log_report(report: &AssetReport) {
    if let Some(e) = &report.error {
        warn!("⚠️  [素材整理] {} 处理失败: {}", report.asset.file_name, e);
    } else if report.cancelled {
        info!("⏹️  [素材整理] {} 已取消", report.asset.file_name);
    } else if let Some(category) = &report.category {
        info!(
            "✅ [素材整理] {} -> {} ({:.2})，{} 个镜头分析",
            report.asset.file_name,
            category.category,
            category.confidence,
            report.scenes.len()
        );
    }
}

/// 汇总报告为整理结果
fn summarize(run_id: String, reports: Vec<AssetReport>, cancelled: bool) -> OrganizationResult {
    let mut stats = BatchStats {
        total_files: reports.len(),
        ..Default::default()
    };
    let mut categorized_files: BTreeMap<String, Vec<Asset>> = BTreeMap::new();
    let mut unorganized_files = Vec::new();

    for report in &reports {
        if report.rejected {
            stats.rejected_count += 1;
            unorganized_files.push(report.asset.clone());
        } else if report.error.is_some() {
            stats.errored_count += 1;
            unorganized_files.push(report.asset.clone());
        } else if report.is_categorized() {
            stats.categorized_count += 1;
            if let Some(category) = &report.category {
                categorized_files
                    .entry(category.category.clone())
                    .or_default()
                    .push(report.asset.clone());
            }
        } else {
            stats.uncategorized_count += 1;
            unorganized_files.push(report.asset.clone());
        }
    }

    OrganizationResult {
        run_id,
        categorized_files,
        unorganized_files,
        reports,
        stats,
        cancelled,
        finished_at: chrono::Utc::now(),
    }
}

/// 解码并分析音乐（解码在阻塞线程中执行）
pub async fn analyze_music(
    decoder: Arc<dyn AudioDecoder>,
    path: PathBuf,
    config: AudioAnalyzerConfig,
) -> AnalysisResult<AudioAnalysis> {
    let start = Instant::now();
    info!("⏳ [音乐分析] 正在解码音乐: {}", path.display());

    let decoded = tokio::task::spawn_blocking(move || decoder.decode(&path))
        .await
        .map_err(|e| AnalysisError::Decode(format!("音频解码任务异常退出: {}", e)))??;
    debug!("✅ [音乐分析] 解码完成，耗时: {:.2}秒", start.elapsed().as_secs_f64());

    AudioAnalyzer::new(config).analyze(&decoded.samples, decoded.sample_rate)
}

/// Webhook 回调数据结构
#[derive(Debug, serde::Serialize)]
struct WebhookPayload<'a> {
    /// 批次状态
    status: &'static str,
    run_id: &'a str,
    stats: &'a BatchStats,
    /// 每个分类的素材数量
    categories: BTreeMap<&'a str, usize>,
    /// 处理时间戳
    timestamp: String,
}

fn webhook_payload(result: &OrganizationResult) -> WebhookPayload<'_> {
    WebhookPayload {
        status: if result.cancelled { "cancelled" } else { "success" },
        run_id: &result.run_id,
        stats: &result.stats,
        categories: result
            .categorized_files
            .iter()
            .map(|(name, assets)| (name.as_str(), assets.len()))
            .collect(),
        timestamp: result.finished_at.to_rfc3339(),
    }
}

/// 调用 webhook 回调
async fn call_webhook(webhook_url: &str, result: &OrganizationResult) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    let response = client
        .post(webhook_url)
        .json(&webhook_payload(result))
        .timeout(std::time::Duration::from_secs(30))
        .send()
        .await
        .context("Webhook 请求失败")?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        warn!("Webhook 回调返回错误状态: {} - {}", status, error_text);
        return Err(anyhow::anyhow!("Webhook 返回错误状态: {}", status));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_extractor::DecodedAudio;
    use crate::frame_sampler::tests::video_asset;
    use crate::frame_sampler::FrameSource;
    use crate::models::FramePrediction;
    use crate::oracle::NullClassifier;
    use async_trait::async_trait;
    use image::{ImageBuffer, Rgb, RgbImage};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 在整数秒处交替输出黑白帧，制造稳定的运动分数
    struct FlickerSource {
        active: Arc<AtomicUsize>,
    }

    impl FrameSource for FlickerSource {
        fn seek_and_decode(&mut self, time_point: f64, _max_dimension: u32) -> AnalysisResult<RgbImage> {
            std::thread::sleep(std::time::Duration::from_millis(2));
            let level = if (time_point as usize) % 4 < 2 { 0 } else { 255 };
            Ok(ImageBuffer::from_fn(8, 8, |_, _| Rgb([level, level, level])))
        }
    }

    impl Drop for FlickerSource {
        fn drop(&mut self) {
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct FakeDecoder {
        active: Arc<AtomicUsize>,
        peak: AtomicUsize,
        opened: AtomicUsize,
        broken: Vec<String>,
        cancel_on_open: Option<(usize, CancelFlag)>,
    }

    impl FrameDecoder for FakeDecoder {
        fn open(&self, asset: &Asset) -> AnalysisResult<Box<dyn FrameSource>> {
            let opened = self.opened.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some((n, cancel)) = &self.cancel_on_open {
                if opened == *n {
                    cancel.cancel();
                }
            }
            if self.broken.contains(&asset.id) {
                return Err(AnalysisError::Decode(format!("{} 已损坏", asset.id)));
            }
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            Ok(Box::new(FlickerSource {
                active: Arc::clone(&self.active),
            }))
        }
    }

    struct FixedOracle(Vec<FramePrediction>);

    #[async_trait]
    impl ImageClassifier for FixedOracle {
        async fn classify(&self, _frame: &RgbImage) -> AnalysisResult<Vec<FramePrediction>> {
            Ok(self.0.clone())
        }
    }

    struct DownOracle;

    #[async_trait]
    impl ImageClassifier for DownOracle {
        async fn classify(&self, _frame: &RgbImage) -> AnalysisResult<Vec<FramePrediction>> {
            Err(AnalysisError::Oracle("connection refused".to_string()))
        }
    }

    struct FakeAudio(Option<DecodedAudio>);

    impl AudioDecoder for FakeAudio {
        fn decode(&self, _path: &Path) -> AnalysisResult<DecodedAudio> {
            self.0
                .clone()
                .ok_or_else(|| AnalysisError::Decode("unsupported codec".to_string()))
        }
    }

    fn named(id: &str, file_name: &str) -> Asset {
        Asset {
            file_name: file_name.to_string(),
            ..video_asset(id, 12.0)
        }
    }

    fn organizer(decoder: Arc<dyn FrameDecoder>, oracle: Arc<dyn ImageClassifier>) -> Organizer {
        Organizer::new(decoder, oracle, EngineConfig::default(), CancelFlag::new()).unwrap()
    }

    #[test]
    fn test_validate_asset() {
        let config = OrganizerConfig::default();
        assert!(validate_asset(&video_asset("ok", 10.0), &config).is_ok());

        let mut big = video_asset("big", 10.0);
        big.byte_size = config.max_file_size_bytes + 1;
        assert!(matches!(validate_asset(&big, &config), Err(AnalysisError::Validation(_))));

        let mut gif = video_asset("gif", 10.0);
        gif.mime_type = "image/gif".to_string();
        assert!(validate_asset(&gif, &config).is_err());

        let mut song = video_asset("song", 10.0);
        song.kind = MediaKind::Audio;
        song.mime_type = "audio/mpeg".to_string();
        assert!(validate_asset(&song, &config).is_err());
    }

    #[tokio::test]
    async fn test_mixed_batch_continues_past_bad_assets() {
        let decoder = Arc::new(FakeDecoder {
            broken: vec!["broken".to_string()],
            ..Default::default()
        });
        let mut oversize = named("oversize", "huge.mp4");
        oversize.byte_size = u64::MAX;
        let assets = vec![
            named("vows", "ceremony_vows.mp4"),
            oversize,
            named("broken", "clip_0002.mp4"),
            named("mystery", "clip_0003.mp4"),
            named("party", "reception_dance.mp4"),
        ];

        let result = organizer(decoder, Arc::new(NullClassifier)).organize(assets).await;

        assert_eq!(
            result.stats,
            BatchStats {
                total_files: 5,
                categorized_count: 2,
                uncategorized_count: 1,
                errored_count: 1,
                rejected_count: 1,
            }
        );
        // 报告保持输入顺序
        let ids: Vec<&str> = result.reports.iter().map(|r| r.asset.id.as_str()).collect();
        assert_eq!(ids, vec!["vows", "oversize", "broken", "mystery", "party"]);

        assert!(result.reports[1].rejected);
        assert!(result.reports[2].error.as_deref().unwrap_or("").contains("已损坏"));

        let ceremony = result.reports[0].category.as_ref().unwrap();
        assert_eq!(ceremony.category, "ceremony");
        assert!(ceremony.confidence >= 0.4 && ceremony.confidence < 1.0);
        assert_eq!(result.reports[3].category.as_ref().unwrap().category, "untagged");

        assert_eq!(result.categorized_files["ceremony"].len(), 1);
        assert_eq!(result.categorized_files["reception"].len(), 1);
        assert_eq!(result.unorganized_files.len(), 3);
        assert!(!result.cancelled);
    }

    #[tokio::test]
    async fn test_visual_predictions_drive_category() {
        let oracle = Arc::new(FixedOracle(vec![
            FramePrediction::new("sky", 0.9),
            FramePrediction::new("mountain landscape", 0.8),
        ]));
        let result = organizer(Arc::new(FakeDecoder::default()), oracle)
            .organize(vec![named("drone", "DJI_0042.mp4")])
            .await;

        let report = &result.reports[0];
        assert_eq!(report.category.as_ref().unwrap().category, "aerial");
        // 12 个采样点产生 11 个镜头分析
        assert_eq!(report.scenes.len(), 11);
        assert_eq!(result.scene_analyses().len(), 11);
    }

    #[tokio::test]
    async fn test_oracle_failure_falls_back_to_filename() {
        let result = organizer(Arc::new(FakeDecoder::default()), Arc::new(DownOracle))
            .organize(vec![named("vows", "ceremony_vows.mp4")])
            .await;

        let report = &result.reports[0];
        assert!(report.error.is_none());
        assert_eq!(report.category.as_ref().unwrap().category, "ceremony");
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let decoder = Arc::new(FakeDecoder::default());
        let mut config = EngineConfig::default();
        config.organizer.max_concurrent_assets = 2;
        let organizer = Organizer::new(decoder.clone(), Arc::new(NullClassifier), config, CancelFlag::new()).unwrap();

        let assets: Vec<Asset> = (0..6).map(|i| named(&format!("a{}", i), "clip.mp4")).collect();
        let result = organizer.organize(assets).await;

        assert_eq!(result.reports.len(), 6);
        assert_eq!(decoder.opened.load(Ordering::SeqCst), 6);
        assert!(decoder.peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(decoder.active.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancellation_keeps_completed_reports() {
        let cancel = CancelFlag::new();
        let decoder = Arc::new(FakeDecoder {
            cancel_on_open: Some((2, cancel.clone())),
            ..Default::default()
        });
        let mut config = EngineConfig::default();
        config.organizer.max_concurrent_assets = 1;
        let organizer = Organizer::new(decoder, Arc::new(NullClassifier), config, cancel).unwrap();

        let assets = vec![
            named("a", "ceremony_a.mp4"),
            named("b", "ceremony_b.mp4"),
            named("c", "ceremony_c.mp4"),
        ];
        let result = organizer.organize(assets).await;

        assert!(result.cancelled);
        let completed: Vec<&AssetReport> = result.reports.iter().filter(|r| !r.cancelled).collect();
        assert_eq!(completed.len(), 1);
        assert!(completed[0].is_categorized());
        assert_eq!(completed[0].scenes.len(), 11);
        assert_eq!(result.reports.iter().filter(|r| r.cancelled).count(), 2);
        assert_eq!(result.stats.categorized_count, 1);
        assert_eq!(result.stats.uncategorized_count, 2);
    }

    #[tokio::test]
    async fn test_project_sequences_against_beats() {
        let mut samples = vec![0.0f32; 1000 * 20];
        for i in (0..samples.len()).step_by(500) {
            samples[i] = 0.8;
        }
        let audio = Arc::new(FakeAudio(Some(DecodedAudio {
            samples,
            sample_rate: 1000,
        })));

        let organizer = organizer(Arc::new(FakeDecoder::default()), Arc::new(NullClassifier));
        let assets = vec![named("vows", "ceremony_vows.mp4"), named("party", "reception.mp4")];
        let output = organizer
            .process_project(assets, Path::new("song.wav"), audio, 30.0, false)
            .await
            .unwrap();

        let audio = output.audio.as_ref().unwrap();
        assert_eq!(audio.beats.len(), 40);
        assert_eq!(audio.bpm, 120.0);

        let edl = &output.edit_list;
        assert!(!edl.entries.is_empty());
        assert!(edl.total_duration <= 30.0 + 1e-9);
        for entry in &edl.entries {
            // 每个切点都落在 0.5s 节拍网格上
            assert!(((entry.time_point * 2.0).round() - entry.time_point * 2.0).abs() < 1e-9);
        }
        for pair in edl.entries.windows(2) {
            assert!(pair[0].time_point + pair[0].duration <= pair[1].time_point + 1e-9);
        }
    }

    #[tokio::test]
    async fn test_undecodable_music() {
        let assets = || vec![named("vows", "ceremony_vows.mp4")];

        let organizer = organizer(Arc::new(FakeDecoder::default()), Arc::new(NullClassifier));
        let strict = organizer
            .process_project(assets(), Path::new("song.ogg"), Arc::new(FakeAudio(None)), 30.0, false)
            .await;
        assert!(matches!(strict, Err(AnalysisError::Decode(_))));

        let degraded = organizer
            .process_project(assets(), Path::new("song.ogg"), Arc::new(FakeAudio(None)), 30.0, true)
            .await
            .unwrap();
        assert!(degraded.audio.is_none());
        let sampled: Vec<f64> = degraded.organization.scene_analyses().iter().map(|s| s.time_point).collect();
        assert!(degraded
            .edit_list
            .entries
            .iter()
            .all(|e| sampled.contains(&e.time_point)));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = EngineConfig::default();
        config.sequence.ratios.emotional = 0.9;
        let result = Organizer::new(
            Arc::new(FakeDecoder::default()),
            Arc::new(NullClassifier),
            config,
            CancelFlag::new(),
        );
        assert!(matches!(result, Err(AnalysisError::Config(_))));
    }

    #[test]
    fn test_webhook_payload() {
        let mut categorized = BTreeMap::new();
        categorized.insert("ceremony".to_string(), vec![video_asset("a", 1.0), video_asset("b", 1.0)]);
        let result = OrganizationResult {
            run_id: "run-1".to_string(),
            categorized_files: categorized,
            unorganized_files: Vec::new(),
            reports: Vec::new(),
            stats: BatchStats {
                total_files: 2,
                categorized_count: 2,
                ..Default::default()
            },
            cancelled: false,
            finished_at: chrono::Utc::now(),
        };

        let json = serde_json::to_value(webhook_payload(&result)).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["run_id"], "run-1");
        assert_eq!(json["categories"]["ceremony"], 2);
        assert_eq!(json["stats"]["categorized_count"], 2);
    }
}
