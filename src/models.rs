use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// 未能归类素材使用的保留分类名
pub const UNTAGGED: &str = "untagged";

/// 素材媒体类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Video,
    Audio,
}

/// 单个已导入的音视频素材（导入后不可变）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    /// 素材标识
    pub id: String,
    /// 源文件路径
    pub path: PathBuf,
    /// 文件名（用于文件名关键字匹配）
    pub file_name: String,
    pub kind: MediaKind,
    /// 时长（秒）
    pub duration: f64,
    /// 帧率（音频素材为 0）
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    /// 文件大小（字节）
    pub byte_size: u64,
    pub mime_type: String,
}

/// 图像标签服务对单帧返回的一条预测
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FramePrediction {
    pub label: String,
    /// 置信度，0.0-1.0
    pub score: f64,
}

impl FramePrediction {
    pub fn new(label: impl Into<String>, score: f64) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// 基于运动强度的粗粒度镜头类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneType {
    Emotional,
    Default,
    Action,
}

impl SceneType {
    /// 剪辑时的固定编排顺序
    pub const EDITORIAL_ORDER: [SceneType; 3] =
        [SceneType::Emotional, SceneType::Default, SceneType::Action];

    pub fn as_str(&self) -> &'static str {
        match self {
            SceneType::Emotional => "emotional",
            SceneType::Default => "default",
            SceneType::Action => "action",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "emotional" => Some(SceneType::Emotional),
            "default" => Some(SceneType::Default),
            "action" => Some(SceneType::Action),
            _ => None,
        }
    }
}

impl fmt::Display for SceneType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单个采样点的运动分析结果
///
/// 每个素材的第一个采样点没有前一帧可比较，不会产生该记录。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneAnalysis {
    pub asset_id: String,
    /// 采样时间点（秒）
    pub time_point: f64,
    /// 与上一采样帧之间的运动分数（≥0，约 0-100）
    pub motion_score: f64,
    pub scene_type: SceneType,
    /// 整个素材中高于平均值的运动峰值时间点（秒）
    pub peaks: Vec<f64>,
    /// 整个素材的平均运动分数
    pub average_motion: f64,
}

/// 单个素材最终的分类结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub category: String,
    /// 置信度，0.0-1.0
    pub confidence: f64,
}

impl CategoryScore {
    pub fn untagged() -> Self {
        Self {
            category: UNTAGGED.to_string(),
            confidence: 0.1,
        }
    }

    pub fn is_untagged(&self) -> bool {
        self.category == UNTAGGED
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeatType {
    Strong,
    Weak,
}

/// 音乐中检测到的节拍
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beat {
    /// 时间戳（秒）
    pub timestamp: f64,
    /// 强度，0.0-1.0
    pub intensity: f64,
    pub beat_type: BeatType,
    /// 整首曲目的节奏（BPM）
    pub bpm: f64,
}

/// 能量曲线概要
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnergyProfile {
    /// 全曲平均能量（样本平方均值）
    pub average: f64,
    /// 最大窗口能量
    pub peak: f64,
    /// 局部峰值所在窗口下标
    pub peaks: Vec<usize>,
    /// 局部谷值所在窗口下标
    pub valleys: Vec<usize>,
    /// 能量窗口长度（秒）
    pub window_seconds: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Crescendo,
    Decrescendo,
    Steady,
}

/// 按节拍强度变化划分的音乐段落
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSegment {
    pub start: f64,
    pub end: f64,
    pub kind: SegmentKind,
}

/// 音乐分析结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioAnalysis {
    pub beats: Vec<Beat>,
    pub bpm: f64,
    pub energy_profile: EnergyProfile,
    pub segments: Vec<AudioSegment>,
    /// 音频时长（秒）
    pub duration: f64,
    pub sample_rate: u32,
}

/// 转场方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Cut,
    Dissolve,
    Crossfade,
    FadeToBlack,
}

impl Transition {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().replace('-', "_").as_str() {
            "cut" => Some(Transition::Cut),
            "dissolve" => Some(Transition::Dissolve),
            "crossfade" => Some(Transition::Crossfade),
            "fade_to_black" | "fade" => Some(Transition::FadeToBlack),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::Cut => "cut",
            Transition::Dissolve => "dissolve",
            Transition::Crossfade => "crossfade",
            Transition::FadeToBlack => "fade_to_black",
        }
    }
}

/// 每种镜头类型的剪辑规则（固定配置）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditingRule {
    /// 最短片段时长（秒）
    pub min_duration: f64,
    /// 最长片段时长（秒）
    pub max_duration: f64,
    pub preferred_transition: Transition,
    /// 该类型“典型”的运动分数，选片时优先接近该值的片段
    pub energy_threshold: f64,
}

/// 剪辑决策列表中的一条
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceEntry {
    /// 切入时间点（秒）
    pub time_point: f64,
    /// 持续时长（秒）
    pub duration: f64,
    pub transition: Transition,
    pub scene_type: SceneType,
    pub asset_id: String,
}

/// 单个镜头类型的时长预算与实际使用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetAllocation {
    pub scene_type: SceneType,
    pub budget: f64,
    pub used: f64,
    pub clip_count: usize,
}

/// 完整的剪辑决策列表，交给外部工程文件生成器
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditDecisionList {
    pub target_duration: f64,
    pub total_duration: f64,
    pub entries: Vec<SequenceEntry>,
    pub allocations: Vec<BudgetAllocation>,
}

/// 单个素材的处理报告
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetReport {
    pub asset: Asset,
    pub category: Option<CategoryScore>,
    pub scenes: Vec<SceneAnalysis>,
    /// 采样失败的时间点数量
    pub failed_samples: usize,
    /// 素材级错误（校验失败、解码失败等）
    pub error: Option<String>,
    /// 分析开始前被校验拒绝
    pub rejected: bool,
    pub cancelled: bool,
}

impl AssetReport {
    fn empty(asset: Asset) -> Self {
        Self {
            asset,
            category: None,
            scenes: Vec::new(),
            failed_samples: 0,
            error: None,
            rejected: false,
            cancelled: false,
        }
    }

    pub fn failed(asset: Asset, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::empty(asset)
        }
    }

    pub fn rejected(asset: Asset, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            rejected: true,
            ..Self::empty(asset)
        }
    }

    pub fn cancelled(asset: Asset) -> Self {
        Self {
            cancelled: true,
            ..Self::empty(asset)
        }
    }

    pub fn completed(asset: Asset, category: CategoryScore, scenes: Vec<SceneAnalysis>, failed_samples: usize) -> Self {
        Self {
            category: Some(category),
            scenes,
            failed_samples,
            ..Self::empty(asset)
        }
    }

    /// 是否得到了有效分类（非 untagged）
    pub fn is_categorized(&self) -> bool {
        self.category
            .as_ref()
            .map(|c| !c.is_untagged())
            .unwrap_or(false)
    }
}

/// 批次统计
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchStats {
    pub total_files: usize,
    pub categorized_count: usize,
    pub uncategorized_count: usize,
    pub errored_count: usize,
    pub rejected_count: usize,
}

/// 整个批次的整理结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationResult {
    pub run_id: String,
    pub categorized_files: BTreeMap<String, Vec<Asset>>,
    pub unorganized_files: Vec<Asset>,
    pub reports: Vec<AssetReport>,
    pub stats: BatchStats,
    pub cancelled: bool,
    pub finished_at: chrono::DateTime<chrono::Utc>,
}

impl OrganizationResult {
    /// 收集所有已完成素材的镜头分析，供剪辑序列使用
    pub fn scene_analyses(&self) -> Vec<SceneAnalysis> {
        self.reports
            .iter()
            .filter(|r| r.error.is_none() && !r.cancelled)
            .flat_map(|r| r.scenes.iter().cloned())
            .collect()
    }
}
