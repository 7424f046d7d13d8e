use image::RgbImage;

use crate::models::{SceneAnalysis, SceneType};

/// 运动分数上限（完全不同的两帧）
pub const MAX_MOTION_SCORE: f64 = 100.0;

/// 运动分数到镜头类型的阈值
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneThresholds {
    /// 高于该值为 action
    pub action_above: f64,
    /// 低于该值为 emotional
    pub emotional_below: f64,
}

impl Default for SceneThresholds {
    fn default() -> Self {
        Self {
            action_above: 35.0,
            emotional_below: 15.0,
        }
    }
}

impl SceneThresholds {
    pub fn classify(&self, motion_score: f64) -> SceneType {
        if motion_score > self.action_above {
            SceneType::Action
        } else if motion_score < self.emotional_below {
            SceneType::Emotional
        } else {
            SceneType::Default
        }
    }
}

/// 镜头检测器：计算相邻采样帧之间的运动分数并划分镜头类型
pub struct SceneDetector {
    thresholds: SceneThresholds,
    /// 单像素“显著变化”阈值（三通道差之和）
    significant_change_threshold: u8,
}

impl SceneDetector {
    pub fn new(thresholds: SceneThresholds, significant_change_threshold: u8) -> Self {
        Self {
            thresholds,
            significant_change_threshold,
        }
    }

    /// 计算两帧之间的运动分数
    ///
    /// 分数 = (归一化像素差 + 显著变化像素占比) * 50，范围 0-100。
    /// 尺寸不一致的两帧视为完全不同。
    pub fn motion_score(&self, prev: &RgbImage, curr: &RgbImage) -> f64 {
        if prev.width() != curr.width() || prev.height() != curr.height() {
            return MAX_MOTION_SCORE;
        }

        let total_pixels = prev.width() as u64 * prev.height() as u64;
        if total_pixels == 0 {
            return 0.0;
        }

        let mut diff_sum = 0u64;
        let mut significant_pixels = 0u64;

        for (p1, p2) in prev.pixels().zip(curr.pixels()) {
            let delta: u32 = (0..3)
                .map(|c| (p1[c] as i32 - p2[c] as i32).unsigned_abs())
                .sum();
            diff_sum += delta as u64;
            if delta > self.significant_change_threshold as u32 {
                significant_pixels += 1;
            }
        }

        let normalized_diff = diff_sum as f64 / (total_pixels as f64 * 3.0 * 255.0);
        let change_ratio = significant_pixels as f64 / total_pixels as f64;

        ((normalized_diff + change_ratio) * 50.0).clamp(0.0, MAX_MOTION_SCORE)
    }

    pub fn classify(&self, motion_score: f64) -> SceneType {
        self.thresholds.classify(motion_score)
    }

    /// 根据 (时间点, 运动分数) 序列构建镜头分析结果
    pub fn build_analyses(&self, asset_id: &str, scores: &[(f64, f64)]) -> Vec<SceneAnalysis> {
        if scores.is_empty() {
            return Vec::new();
        }

        let average_motion = scores.iter().map(|(_, s)| s).sum::<f64>() / scores.len() as f64;
        let peaks = motion_peaks(scores, average_motion);

        scores
            .iter()
            .map(|&(time_point, motion_score)| SceneAnalysis {
                asset_id: asset_id.to_string(),
                time_point,
                motion_score,
                scene_type: self.classify(motion_score),
                peaks: peaks.clone(),
                average_motion,
            })
            .collect()
    }
}

/// 高于平均值的局部极大值所在时间点
fn motion_peaks(scores: &[(f64, f64)], average: f64) -> Vec<f64> {
    let mut peaks = Vec::new();
    for (i, &(time_point, score)) in scores.iter().enumerate() {
        if score <= average {
            continue;
        }
        let left = if i > 0 { scores[i - 1].1 } else { f64::MIN };
        let right = scores.get(i + 1).map(|s| s.1).unwrap_or(f64::MIN);
        if score >= left && score >= right {
            peaks.push(time_point);
        }
    }
    peaks
}
