use tracing::debug;

use crate::models::{CategoryScore, FramePrediction};

/// 竞争证据惩罚规则：命中 cues 的最高置信度超过 min_strength 时，
/// confidence *= (1 - strength * factor)
#[derive(Debug, Clone, PartialEq)]
pub struct PenaltyRule {
    pub cues: Vec<String>,
    pub factor: f64,
    pub min_strength: f64,
}

/// 单个分类的声明式配置
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryProfile {
    pub name: String,
    /// 视觉标签关键字（小写子串匹配）
    pub visual_cues: Vec<String>,
    /// 必需标签，命中标签中至少包含一个，否则该分类置信度为 0
    pub required_cues: Vec<String>,
    /// 环境标签，出现时按 boost_factor 放大置信度
    pub environmental_cues: Vec<String>,
    pub boost_factor: f64,
    pub penalties: Vec<PenaltyRule>,
    /// 文件名回退匹配的关键字
    pub filename_keywords: Vec<String>,
    /// 视觉判定的最低置信度
    pub confidence_threshold: f64,
}

impl CategoryProfile {
    pub fn empty(name: &str) -> Self {
        Self {
            name: name.to_string(),
            visual_cues: Vec::new(),
            required_cues: Vec::new(),
            environmental_cues: Vec::new(),
            boost_factor: 1.0,
            penalties: Vec::new(),
            filename_keywords: Vec::new(),
            confidence_threshold: 0.4,
        }
    }
}

/// 信号融合配置
#[derive(Debug, Clone, PartialEq)]
pub struct FusionConfig {
    pub profiles: Vec<CategoryProfile>,
    /// 视觉置信度低于该值时回退到文件名匹配
    pub fallback_floor: f64,
    /// 最佳单项匹配的权重
    pub max_weight: f64,
    /// 平均匹配的权重
    pub avg_weight: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            profiles: default_profiles(),
            fallback_floor: 0.3,
            max_weight: 0.7,
            avg_weight: 0.3,
        }
    }
}

/// 文件名回退的基础置信度与每个关键字的增量
const FILENAME_BASE_CONFIDENCE: f64 = 0.4;
const FILENAME_KEYWORD_STEP: f64 = 0.1;
const FILENAME_MAX_CONFIDENCE: f64 = 0.9;

fn cues(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// 内置的婚礼/活动素材分类
pub fn default_profiles() -> Vec<CategoryProfile> {
    vec![
        CategoryProfile {
            name: "preparation".to_string(),
            visual_cues: cues(&[
                "dress", "gown", "makeup", "cosmetic", "mirror", "suit", "bow tie", "shoe",
                "veil", "lipstick", "wardrobe", "perfume", "bride",
            ]),
            required_cues: cues(&[
                "dress", "gown", "makeup", "cosmetic", "mirror", "suit", "veil", "lipstick",
                "wardrobe", "perfume",
            ]),
            environmental_cues: cues(&["bedroom", "hotel room", "dressing room", "window"]),
            boost_factor: 1.2,
            penalties: Vec::new(),
            filename_keywords: cues(&["prep", "getting ready", "getting_ready", "makeup", "dress"]),
            confidence_threshold: 0.4,
        },
        CategoryProfile {
            name: "ceremony".to_string(),
            visual_cues: cues(&[
                "altar", "church", "aisle", "priest", "officiant", "pew", "vow", "bride", "groom",
                "chapel", "arch", "candle",
            ]),
            required_cues: cues(&["altar", "aisle", "church", "chapel", "officiant", "priest", "pew", "arch"]),
            environmental_cues: cues(&["altar", "church", "chapel", "cathedral"]),
            boost_factor: 1.2,
            penalties: vec![PenaltyRule {
                cues: cues(&["dance", "cake", "party", "banquet", "dj", "toast", "disco"]),
                factor: 0.5,
                min_strength: 0.0,
            }],
            filename_keywords: cues(&["ceremony", "vows", "church", "altar", "aisle"]),
            confidence_threshold: 0.45,
        },
        CategoryProfile {
            name: "reception".to_string(),
            visual_cues: cues(&[
                "dance", "cake", "banquet", "dinner", "toast", "champagne", "wine", "party", "dj",
                "stage", "microphone", "restaurant", "crowd",
            ]),
            required_cues: cues(&["dance", "cake", "banquet", "toast", "champagne", "party", "dj", "restaurant"]),
            environmental_cues: cues(&["venue", "ballroom", "hall", "restaurant"]),
            boost_factor: 1.2,
            penalties: Vec::new(),
            filename_keywords: cues(&["reception", "party", "dance", "dinner", "toast", "banquet"]),
            confidence_threshold: 0.4,
        },
        CategoryProfile {
            name: "aerial".to_string(),
            visual_cues: cues(&[
                "sky", "aerial", "landscape", "cloud", "mountain", "coast", "seashore", "lake",
                "valley", "skyline", "horizon", "field",
            ]),
            required_cues: cues(&["aerial", "sky", "landscape", "skyline", "horizon", "mountain", "coast", "valley"]),
            environmental_cues: cues(&["sky", "cloud", "horizon"]),
            boost_factor: 1.2,
            penalties: Vec::new(),
            filename_keywords: cues(&["drone", "aerial", "dji", "establishing", "overview"]),
            confidence_threshold: 0.5,
        },
        CategoryProfile {
            name: "decoration".to_string(),
            visual_cues: cues(&[
                "flower", "bouquet", "rose", "vase", "centerpiece", "table setting", "candle",
                "decoration", "ribbon", "lantern", "napkin", "tablecloth", "invitation",
            ]),
            required_cues: cues(&["flower", "bouquet", "centerpiece", "decoration", "vase", "table setting", "tablecloth"]),
            environmental_cues: Vec::new(),
            boost_factor: 1.0,
            penalties: vec![PenaltyRule {
                cues: cues(&["person", "people", "man", "woman", "face", "bride", "groom", "guest", "child"]),
                factor: 1.0,
                min_strength: 0.3,
            }],
            filename_keywords: cues(&["detail", "decor", "flower", "bouquet", "rings"]),
            confidence_threshold: 0.4,
        },
    ]
}

/// 单个分类的视觉打分明细
#[derive(Debug, Clone, PartialEq)]
pub struct VisualScore {
    pub category: String,
    pub confidence: f64,
    pub matched: usize,
}

/// 多信号分类器：视觉标签 + 必需标签门控 + 环境加成/惩罚 + 文件名回退
pub struct CategoryClassifier {
    config: FusionConfig,
}

impl CategoryClassifier {
    pub fn new(config: FusionConfig) -> Self {
        Self { config }
    }

    pub fn profiles(&self) -> &[CategoryProfile] {
        &self.config.profiles
    }

    /// 对一个素材的所有采样帧预测做融合分类，每个素材只产出一个结果
    pub fn classify(&self, predictions: &[FramePrediction], file_name: &str) -> CategoryScore {
        if predictions.is_empty() {
            debug!("🔤 [素材分类] {} 没有视觉预测，使用文件名匹配", file_name);
            return self.classify_by_filename(file_name);
        }

        let scores = self.visual_scores(predictions);
        let best = scores.iter().enumerate().fold(None::<(usize, &VisualScore)>, |best, (i, s)| {
            match best {
                Some((_, b)) if b.confidence >= s.confidence => best,
                _ => Some((i, s)),
            }
        });

        if let Some((index, best)) = best {
            let threshold = self.config.profiles[index].confidence_threshold;
            if best.confidence >= self.config.fallback_floor && best.confidence > threshold {
                return CategoryScore {
                    category: best.category.clone(),
                    confidence: best.confidence,
                };
            }
            debug!(
                "🔤 [素材分类] {} 视觉最佳 {}={:.3} 未达阈值，使用文件名匹配",
                file_name, best.category, best.confidence
            );
        }

        self.classify_by_filename(file_name)
    }

    /// 每个分类的视觉置信度（按配置顺序）
    pub fn visual_scores(&self, predictions: &[FramePrediction]) -> Vec<VisualScore> {
        self.config
            .profiles
            .iter()
            .map(|profile| self.score_profile(profile, predictions))
            .collect()
    }

    fn score_profile(&self, profile: &CategoryProfile, predictions: &[FramePrediction]) -> VisualScore {
        let matched: Vec<(String, f64)> = predictions
            .iter()
            .map(|p| (p.label.to_lowercase(), p.score.clamp(0.0, 1.0)))
            .filter(|(label, _)| contains_any(label, &profile.visual_cues))
            .collect();

        if matched.is_empty() {
            return VisualScore {
                category: profile.name.clone(),
                confidence: 0.0,
                matched: 0,
            };
        }

        let max_score = matched.iter().map(|(_, s)| *s).fold(0.0, f64::max);
        let avg_score = matched.iter().map(|(_, s)| *s).sum::<f64>() / matched.len() as f64;
        let mut confidence = max_score * self.config.max_weight + avg_score * self.config.avg_weight;

        // 必需标签门控
        if !profile.required_cues.is_empty()
            && !matched.iter().any(|(label, _)| contains_any(label, &profile.required_cues))
        {
            confidence = 0.0;
        }

        // 环境加成
        if confidence > 0.0
            && !profile.environmental_cues.is_empty()
            && predictions
                .iter()
                .any(|p| contains_any(&p.label.to_lowercase(), &profile.environmental_cues))
        {
            confidence *= profile.boost_factor;
        }

        // 竞争证据惩罚
        for penalty in &profile.penalties {
            let strength = cue_strength(predictions, &penalty.cues);
            if strength > penalty.min_strength {
                confidence *= (1.0 - strength * penalty.factor).max(0.0);
            }
        }

        VisualScore {
            category: profile.name.clone(),
            confidence: confidence.clamp(0.0, 1.0),
            matched: matched.len(),
        }
    }

    /// 文件名关键字回退：每个命中关键字在 0.4 的基础上加 0.1，全部未命中则为 untagged
    pub fn classify_by_filename(&self, file_name: &str) -> CategoryScore {
        let name = file_name.to_lowercase();
        let mut best: Option<(&CategoryProfile, usize)> = None;

        for profile in &self.config.profiles {
            let hits = profile
                .filename_keywords
                .iter()
                .filter(|k| name.contains(k.as_str()))
                .count();
            if hits > best.map(|(_, h)| h).unwrap_or(0) {
                best = Some((profile, hits));
            }
        }

        match best {
            Some((profile, hits)) => CategoryScore {
                category: profile.name.clone(),
                confidence: (FILENAME_BASE_CONFIDENCE + FILENAME_KEYWORD_STEP * hits as f64)
                    .min(FILENAME_MAX_CONFIDENCE),
            },
            None => CategoryScore::untagged(),
        }
    }
}

fn contains_any(label: &str, cues: &[String]) -> bool {
    cues.iter().any(|cue| label.contains(cue.as_str()))
}

/// 命中任一 cue 的预测中的最高置信度
fn cue_strength(predictions: &[FramePrediction], cues: &[String]) -> f64 {
    predictions
        .iter()
        .filter(|p| contains_any(&p.label.to_lowercase(), cues))
        .map(|p| p.score.clamp(0.0, 1.0))
        .fold(0.0, f64::max)
}
