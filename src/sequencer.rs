use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{AnalysisError, AnalysisResult};
use crate::models::{
    Beat, BudgetAllocation, EditDecisionList, EditingRule, SceneAnalysis, SceneType, SequenceEntry, Transition,
};

const TIME_EPSILON: f64 = 1e-9;

/// 各镜头类型占目标时长的比例
#[derive(Debug, Clone, PartialEq)]
pub struct TimeBudgetRatios {
    pub emotional: f64,
    pub default: f64,
    pub action: f64,
}

impl Default for TimeBudgetRatios {
    fn default() -> Self {
        Self {
            emotional: 0.40,
            default: 0.35,
            action: 0.25,
        }
    }
}

impl TimeBudgetRatios {
    pub fn get(&self, scene_type: SceneType) -> f64 {
        match scene_type {
            SceneType::Emotional => self.emotional,
            SceneType::Default => self.default,
            SceneType::Action => self.action,
        }
    }

    pub fn total(&self) -> f64 {
        self.emotional + self.default + self.action
    }
}

/// 剪辑序列配置
#[derive(Debug, Clone)]
pub struct SequencerConfig {
    pub ratios: TimeBudgetRatios,
    pub rules: BTreeMap<SceneType, EditingRule>,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        let mut rules = BTreeMap::new();
        rules.insert(
            SceneType::Emotional,
            EditingRule {
                min_duration: 3.0,
                max_duration: 6.0,
                preferred_transition: Transition::Dissolve,
                energy_threshold: 10.0,
            },
        );
        rules.insert(
            SceneType::Default,
            EditingRule {
                min_duration: 2.0,
                max_duration: 4.0,
                preferred_transition: Transition::Crossfade,
                energy_threshold: 25.0,
            },
        );
        rules.insert(
            SceneType::Action,
            EditingRule {
                min_duration: 1.0,
                max_duration: 2.5,
                preferred_transition: Transition::Cut,
                energy_threshold: 45.0,
            },
        );

        Self {
            ratios: TimeBudgetRatios::default(),
            rules,
        }
    }
}

impl SequencerConfig {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        for scene_type in SceneType::EDITORIAL_ORDER {
            let ratio = self.ratios.get(scene_type);
            if !(0.0..=1.0).contains(&ratio) {
                return Err(AnalysisError::Config(format!("{} 的时长比例无效: {}", scene_type, ratio)));
            }
        }
        if self.ratios.total() > 1.0 + TIME_EPSILON {
            return Err(AnalysisError::Config(format!(
                "时长比例之和不能超过 1: {:.2}",
                self.ratios.total()
            )));
        }

        for (scene_type, rule) in &self.rules {
            if !(rule.min_duration > 0.0) || rule.min_duration > rule.max_duration {
                return Err(AnalysisError::Config(format!(
                    "{} 的片段时长范围无效: {} - {}",
                    scene_type, rule.min_duration, rule.max_duration
                )));
            }
        }

        Ok(())
    }
}

/// 按镜头类型分组的候选片段
#[derive(Debug, Clone, Default)]
pub struct ClipPool {
    groups: BTreeMap<SceneType, Vec<SceneAnalysis>>,
}

impl ClipPool {
    pub fn from_analyses(analyses: impl IntoIterator<Item = SceneAnalysis>) -> Self {
        let mut groups: BTreeMap<SceneType, Vec<SceneAnalysis>> = BTreeMap::new();
        for analysis in analyses {
            groups.entry(analysis.scene_type).or_default().push(analysis);
        }
        Self { groups }
    }

    pub fn clips(&self, scene_type: SceneType) -> &[SceneAnalysis] {
        self.groups.get(&scene_type).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.groups.values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 序列生成阶段，单次确定性流程，不做重试
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Idle,
    Budgeting,
    Selecting,
    Ordering,
    Snapping,
    Done,
}

struct StageTracker {
    stage: Stage,
    started: Instant,
}

impl StageTracker {
    fn new() -> Self {
        Self {
            stage: Stage::Idle,
            started: Instant::now(),
        }
    }

    fn advance(&mut self, next: Stage) {
        debug!(
            "🔄 [剪辑序列] {:?} -> {:?}（{:.2}ms）",
            self.stage,
            next,
            self.started.elapsed().as_secs_f64() * 1000.0
        );
        self.stage = next;
    }
}

/// 选中的片段及其分配时长
struct Take<'a> {
    clip: &'a SceneAnalysis,
    rule: &'a EditingRule,
    /// 踩点后的切点
    time_point: f64,
    allocated: f64,
}

/// 剪辑序列生成器
pub struct EditSequencer {
    config: SequencerConfig,
}

impl EditSequencer {
    /// 配置无效时返回 Config 错误
    pub fn new(config: SequencerConfig) -> AnalysisResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// 生成踩点剪辑决策列表
    ///
    /// 总时长不会超过 target_duration；某类片段不足时其预算空置，不转给其他类型。
    pub fn sequence(&self, clips: &ClipPool, beats: &[Beat], target_duration: f64) -> EditDecisionList {
        let mut tracker = StageTracker::new();
        let target = target_duration.max(0.0);

        tracker.advance(Stage::Budgeting);
        let budgets: Vec<(SceneType, f64)> = SceneType::EDITORIAL_ORDER
            .iter()
            .map(|&t| (t, target * self.config.ratios.get(t)))
            .collect();

        tracker.advance(Stage::Selecting);
        let mut remaining_global = target;
        let mut takes: Vec<Take> = Vec::new();
        let mut occupied: Vec<f64> = Vec::new();

        for &(scene_type, budget) in &budgets {
            let Some(rule) = self.config.rules.get(&scene_type) else {
                warn!("⚠️  [剪辑序列] 缺少 {} 的剪辑规则，跳过该类型", scene_type);
                continue;
            };

            let mut candidates: Vec<&SceneAnalysis> = clips.clips(scene_type).iter().collect();
            candidates.sort_by(|a, b| {
                let da = (a.motion_score - rule.energy_threshold).abs();
                let db = (b.motion_score - rule.energy_threshold).abs();
                da.total_cmp(&db)
            });

            let mut type_remaining = budget;
            let mut taken = 0;
            for clip in candidates {
                // 切点已被占用的片段不计入预算
                let time_point = nearest_beat(beats, clip.time_point).unwrap_or(clip.time_point);
                if occupied.iter().any(|t| (t - time_point).abs() < TIME_EPSILON) {
                    continue;
                }
                let duration = remaining_global
                    .max(rule.min_duration)
                    .min(rule.max_duration)
                    .min(type_remaining);
                if duration + TIME_EPSILON < rule.min_duration {
                    break;
                }
                occupied.push(time_point);
                takes.push(Take {
                    clip,
                    rule,
                    time_point,
                    allocated: duration,
                });
                type_remaining -= duration;
                remaining_global -= duration;
                taken += 1;
            }

            if taken == 0 {
                debug!("🎞️  [剪辑序列] {} 没有可用片段，预算 {:.2}s 空置", scene_type, budget);
            }
        }

        // 切点在选片时已确定，这里按时间点重排
        tracker.advance(Stage::Ordering);
        let mut snapped: Vec<(f64, &Take)> = takes.iter().map(|take| (take.time_point, take)).collect();
        snapped.sort_by(|a, b| a.0.total_cmp(&b.0));

        tracker.advance(Stage::Snapping);
        let mut entries: Vec<SequenceEntry> = Vec::with_capacity(snapped.len());
        for (i, &(time_point, take)) in snapped.iter().enumerate() {
            let mut duration = take.allocated;
            if let Some(&(next_time, _)) = snapped.get(i + 1) {
                let gap = next_time - time_point;
                let fitted = gap.max(take.rule.min_duration).min(take.rule.max_duration);
                duration = duration.min(fitted).min(gap);
            }

            let scene_type = take.clip.scene_type;
            let previous_is_action = entries
                .last()
                .map(|e| e.scene_type == SceneType::Action)
                .unwrap_or(false);
            let transition = if previous_is_action && scene_type == SceneType::Action {
                Transition::Cut
            } else {
                take.rule.preferred_transition
            };

            entries.push(SequenceEntry {
                time_point,
                duration,
                transition,
                scene_type,
                asset_id: take.clip.asset_id.clone(),
            });
        }

        let allocations: Vec<BudgetAllocation> = budgets
            .iter()
            .map(|&(scene_type, budget)| {
                let of_type = entries.iter().filter(|e| e.scene_type == scene_type);
                BudgetAllocation {
                    scene_type,
                    budget,
                    used: of_type.clone().map(|e| e.duration).sum(),
                    clip_count: of_type.count(),
                }
            })
            .collect();
        let total_duration = entries.iter().map(|e| e.duration).sum();

        tracker.advance(Stage::Done);
        info!(
            "✅ [剪辑序列] 候选片段 {} 个，生成 {} 条剪辑，总时长 {:.2}s / 目标 {:.2}s，节拍 {} 个",
            clips.len(),
            entries.len(),
            total_duration,
            target,
            beats.len()
        );

        EditDecisionList {
            target_duration: target,
            total_duration,
            entries,
            allocations,
        }
    }
}

/// 距离 time 最近的节拍时间戳，距离相同时取较早的节拍
pub fn nearest_beat(beats: &[Beat], time: f64) -> Option<f64> {
    beats
        .iter()
        .map(|b| b.timestamp)
        .min_by(|a, b| {
            let diff_a = (time - a).abs();
            let diff_b = (time - b).abs();
            match diff_a.total_cmp(&diff_b) {
                Ordering::Equal => a.total_cmp(b),
                other => other,
            }
        })
}
