use anyhow::{Context, Result};
use configparser::ini::Ini;
use std::env;
use std::path::{Path, PathBuf};

use crate::audio_analyzer::AudioAnalyzerConfig;
use crate::category::{default_profiles, CategoryProfile, FusionConfig, PenaltyRule};
use crate::error::AnalysisError;
use crate::frame_sampler::SamplerConfig;
use crate::models::{EditingRule, SceneType, Transition};
use crate::oracle::OracleConfig;
use crate::processor::OrganizerConfig;
use crate::scene_detector::SceneThresholds;
use crate::sequencer::SequencerConfig;

/// 默认配置文件名
const CONFIG_FILE_NAME: &str = "event-cut.ini";

/// 音频解码默认采样率
pub const DEFAULT_DECODE_SAMPLE_RATE: u32 = 22_050;

/// 引擎完整配置
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub organizer: OrganizerConfig,
    pub sampler: SamplerConfig,
    pub scene: SceneThresholds,
    pub fusion: FusionConfig,
    pub audio: AudioAnalyzerConfig,
    /// 音乐解码采样率（Hz）
    pub decode_sample_rate: u32,
    pub sequence: SequencerConfig,
    pub oracle: OracleConfig,
    /// 日志级别（trace, debug, info, warn, error）
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            organizer: OrganizerConfig::default(),
            sampler: SamplerConfig::default(),
            scene: SceneThresholds::default(),
            fusion: FusionConfig::default(),
            audio: AudioAnalyzerConfig::default(),
            decode_sample_rate: DEFAULT_DECODE_SAMPLE_RATE,
            sequence: SequencerConfig::default(),
            oracle: OracleConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl EngineConfig {
    /// 校验配置的取值范围
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.organizer.max_concurrent_assets == 0 {
            return Err(AnalysisError::Config("max_concurrent_assets 必须大于 0".into()));
        }
        if self.sampler.sample_count < 2 {
            return Err(AnalysisError::Config("sample_count 至少为 2".into()));
        }
        if self.scene.emotional_below > self.scene.action_above {
            return Err(AnalysisError::Config(format!(
                "emotional_below ({}) 不能大于 action_above ({})",
                self.scene.emotional_below, self.scene.action_above
            )));
        }
        if self.audio.beat_minimum_gap_seconds <= 0.0 {
            return Err(AnalysisError::Config("beat_minimum_gap_seconds 必须大于 0".into()));
        }
        if self.decode_sample_rate == 0 {
            return Err(AnalysisError::Config("decode_sample_rate 必须大于 0".into()));
        }
        if self.fusion.profiles.is_empty() {
            return Err(AnalysisError::Config("至少需要配置一个分类".into()));
        }
        self.sequence.validate()
    }
}

/// 命令行覆盖项（优先级最高）
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub max_concurrent_assets: Option<usize>,
    pub sample_count: Option<usize>,
    pub beat_threshold: Option<f32>,
    pub oracle_url: Option<String>,
    pub webhook_url: Option<String>,
    pub log_level: Option<String>,
}

/// 配置加载器
pub struct ConfigLoader;

impl ConfigLoader {
    /// 从多个源加载配置，优先级：命令行参数 > 环境变量 > 配置文件 > 默认值
    pub fn load_config(
        config_file: Option<&Path>,
        overrides: &ConfigOverrides,
    ) -> Result<EngineConfig> {
        let mut config = EngineConfig::default();

        // 1. 配置文件：显式指定的文件必须存在，默认位置找不到则忽略
        match config_file {
            Some(path) => {
                let ini = Self::read_ini(path)?;
                Self::apply_ini(&mut config, &ini)
                    .with_context(|| format!("解析配置文件失败: {}", path.display()))?;
            }
            None => {
                if let Some(path) = Self::find_default_location() {
                    let ini = Self::read_ini(&path)?;
                    Self::apply_ini(&mut config, &ini)
                        .with_context(|| format!("解析配置文件失败: {}", path.display()))?;
                }
            }
        }

        // 2. 环境变量
        Self::apply_env(&mut config);

        // 3. 命令行参数
        Self::apply_overrides(&mut config, overrides);

        config.validate().context("配置校验失败")?;
        Ok(config)
    }

    fn read_ini(config_path: &Path) -> Result<Ini> {
        if !config_path.exists() {
            return Err(anyhow::anyhow!("配置文件不存在: {}", config_path.display()));
        }

        let mut ini = Ini::new();
        ini.load(config_path)
            .map_err(|e| anyhow::anyhow!("读取配置文件失败: {}: {}", config_path.display(), e))?;
        Ok(ini)
    }

    /// 从默认位置查找配置文件
    fn find_default_location() -> Option<PathBuf> {
        let mut candidates = vec![
            PathBuf::from(CONFIG_FILE_NAME),
            PathBuf::from(format!(".{}", CONFIG_FILE_NAME)),
        ];
        if let Some(home) = env::var_os("HOME") {
            candidates.push(PathBuf::from(home).join(format!(".{}", CONFIG_FILE_NAME)));
        }
        candidates.push(PathBuf::from("/etc").join(CONFIG_FILE_NAME));

        candidates.into_iter().find(|p| p.exists())
    }

    /// 读取 section/key，找不到时回退到 [DEFAULT] 节
    fn get(ini: &Ini, section: &str, key: &str) -> Option<String> {
        ini.get(section, key)
            .or_else(|| ini.get("default", key))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T: std::str::FromStr>(ini: &Ini, section: &str, key: &str) -> Result<Option<T>> {
        match Self::get(ini, section, key) {
            Some(raw) => raw
                .parse::<T>()
                .map(Some)
                .map_err(|_| anyhow::anyhow!("[{}] {} 的值无效: {}", section, key, raw)),
            None => Ok(None),
        }
    }

    fn apply_ini(config: &mut EngineConfig, ini: &Ini) -> Result<()> {
        // [organizer]
        if let Some(v) = Self::parse(ini, "organizer", "max_concurrent_assets")? {
            config.organizer.max_concurrent_assets = v;
        }
        if let Some(v) = Self::parse(ini, "organizer", "max_file_size_bytes")? {
            config.organizer.max_file_size_bytes = v;
        }
        if let Some(v) = Self::get(ini, "organizer", "supported_mime_types") {
            config.organizer.supported_mime_types = split_list(&v);
        }
        if let Some(v) = Self::get(ini, "organizer", "webhook_url") {
            config.organizer.webhook_url = Some(v);
        }
        if let Some(v) = Self::parse(ini, "organizer", "sample_count")? {
            config.sampler.sample_count = v;
        }
        if let Some(v) = Self::parse(ini, "organizer", "frame_max_dimension")? {
            config.sampler.frame_max_dimension = v;
        }
        if let Some(v) = Self::parse(ini, "organizer", "significant_change_threshold")? {
            config.sampler.significant_change_threshold = v;
        }
        if let Some(v) = Self::parse(ini, "organizer", "fallback_floor")? {
            config.fusion.fallback_floor = v;
        }

        // [scene]
        if let Some(v) = Self::parse(ini, "scene", "action_above")? {
            config.scene.action_above = v;
        }
        if let Some(v) = Self::parse(ini, "scene", "emotional_below")? {
            config.scene.emotional_below = v;
        }

        // [audio]
        if let Some(v) = Self::parse(ini, "audio", "beat_threshold")? {
            config.audio.beat_threshold = v;
        }
        if let Some(v) = Self::parse(ini, "audio", "beat_minimum_gap_seconds")? {
            config.audio.beat_minimum_gap_seconds = v;
        }
        if let Some(v) = Self::parse(ini, "audio", "segment_delta_threshold")? {
            config.audio.segment_delta_threshold = v;
        }
        if let Some(v) = Self::parse(ini, "audio", "strong_beat_intensity")? {
            config.audio.strong_beat_intensity = v;
        }
        if let Some(v) = Self::parse(ini, "audio", "energy_window_seconds")? {
            config.audio.energy_window_seconds = v;
        }
        if let Some(v) = Self::parse(ini, "audio", "decode_sample_rate")? {
            config.decode_sample_rate = v;
        }

        // [sequence]
        if let Some(v) = Self::parse(ini, "sequence", "ratio_emotional")? {
            config.sequence.ratios.emotional = v;
        }
        if let Some(v) = Self::parse(ini, "sequence", "ratio_default")? {
            config.sequence.ratios.default = v;
        }
        if let Some(v) = Self::parse(ini, "sequence", "ratio_action")? {
            config.sequence.ratios.action = v;
        }

        // [rule.<scene type>]
        for scene_type in SceneType::EDITORIAL_ORDER {
            let section = format!("rule.{}", scene_type.as_str());
            let rule = config
                .sequence
                .rules
                .entry(scene_type)
                .or_insert_with(|| fallback_rule(scene_type));
            Self::apply_rule(ini, &section, rule)?;
        }

        // [category.<name>]
        let profiles = Self::load_profiles(ini)?;
        if !profiles.is_empty() {
            config.fusion.profiles = profiles;
        }

        // [oracle]
        if let Some(v) = Self::get(ini, "oracle", "url") {
            config.oracle.url = Some(v);
        }
        if let Some(v) = Self::parse(ini, "oracle", "timeout_seconds")? {
            config.oracle.timeout_seconds = v;
        }
        if let Some(v) = Self::parse(ini, "oracle", "max_retries")? {
            config.oracle.max_retries = v;
        }

        // [logging]
        if let Some(v) = Self::get(ini, "logging", "level") {
            config.log_level = v;
        }

        Ok(())
    }

    fn apply_rule(ini: &Ini, section: &str, rule: &mut EditingRule) -> Result<()> {
        if let Some(v) = Self::parse(ini, section, "min_duration")? {
            rule.min_duration = v;
        }
        if let Some(v) = Self::parse(ini, section, "max_duration")? {
            rule.max_duration = v;
        }
        if let Some(v) = Self::parse(ini, section, "energy_threshold")? {
            rule.energy_threshold = v;
        }
        if let Some(raw) = Self::get(ini, section, "preferred_transition") {
            rule.preferred_transition = Transition::parse(&raw)
                .ok_or_else(|| anyhow::anyhow!("[{}] 未知的转场方式: {}", section, raw))?;
        }
        Ok(())
    }

    /// 读取所有 [category.*] 节
    ///
    /// 顺序由 [organizer] categories 决定（平局时靠前者胜出），未指定时按名称排序。
    fn load_profiles(ini: &Ini) -> Result<Vec<CategoryProfile>> {
        let mut names: Vec<String> = ini
            .sections()
            .into_iter()
            .filter_map(|s| s.strip_prefix("category.").map(|n| n.to_string()))
            .collect();
        if names.is_empty() {
            return Ok(Vec::new());
        }

        match Self::get(ini, "organizer", "categories") {
            Some(order) => {
                let order = split_list(&order);
                if let Some(missing) = order.iter().find(|n| !names.contains(n)) {
                    anyhow::bail!("categories 中的分类 {} 没有对应的 [category.{}] 节", missing, missing);
                }
                names = order;
            }
            None => names.sort(),
        }

        let mut profiles = Vec::with_capacity(names.len());
        for name in names {
            let section = format!("category.{}", name);
            let template = default_profiles().into_iter().find(|p| p.name == name);
            let mut profile = template.unwrap_or_else(|| CategoryProfile::empty(&name));

            if let Some(v) = Self::get(ini, &section, "visual_cues") {
                profile.visual_cues = split_list(&v);
            }
            if let Some(v) = Self::get(ini, &section, "required_cues") {
                profile.required_cues = split_list(&v);
            }
            if let Some(v) = Self::get(ini, &section, "environmental_cues") {
                profile.environmental_cues = split_list(&v);
            }
            if let Some(v) = Self::get(ini, &section, "filename_keywords") {
                profile.filename_keywords = split_list(&v);
            }
            if let Some(v) = Self::parse(ini, &section, "boost_factor")? {
                profile.boost_factor = v;
            }
            if let Some(v) = Self::parse(ini, &section, "confidence_threshold")? {
                profile.confidence_threshold = v;
            }
            if let Some(cues) = Self::get(ini, &section, "penalty_cues") {
                let factor = Self::parse(ini, &section, "penalty_factor")?.unwrap_or(0.5);
                let min_strength = Self::parse(ini, &section, "penalty_min_strength")?.unwrap_or(0.0);
                profile.penalties = vec![PenaltyRule {
                    cues: split_list(&cues),
                    factor,
                    min_strength,
                }];
            }
            profiles.push(profile);
        }

        Ok(profiles)
    }

    /// 从环境变量覆盖配置
    fn apply_env(config: &mut EngineConfig) {
        if let Some(v) = env_parse("EVENT_CUT_MAX_CONCURRENT") {
            config.organizer.max_concurrent_assets = v;
        }
        if let Some(v) = env_parse("EVENT_CUT_MAX_FILE_SIZE") {
            config.organizer.max_file_size_bytes = v;
        }
        if let Some(v) = env_parse("EVENT_CUT_SAMPLE_COUNT") {
            config.sampler.sample_count = v;
        }
        if let Some(v) = env_parse("EVENT_CUT_BEAT_THRESHOLD") {
            config.audio.beat_threshold = v;
        }
        if let Some(v) = env_parse("EVENT_CUT_BEAT_GAP") {
            config.audio.beat_minimum_gap_seconds = v;
        }
        if let Some(v) = env_string("EVENT_CUT_ORACLE_URL") {
            config.oracle.url = Some(v);
        }
        if let Some(v) = env_string("EVENT_CUT_WEBHOOK_URL") {
            config.organizer.webhook_url = Some(v);
        }
        if let Some(v) = env_string("LOG_LEVEL") {
            config.log_level = v;
        }
    }

    fn apply_overrides(config: &mut EngineConfig, overrides: &ConfigOverrides) {
        if let Some(v) = overrides.max_concurrent_assets {
            config.organizer.max_concurrent_assets = v;
        }
        if let Some(v) = overrides.sample_count {
            config.sampler.sample_count = v;
        }
        if let Some(v) = overrides.beat_threshold {
            config.audio.beat_threshold = v;
        }
        if let Some(v) = &overrides.oracle_url {
            config.oracle.url = Some(v.clone());
        }
        if let Some(v) = &overrides.webhook_url {
            config.organizer.webhook_url = Some(v.clone());
        }
        if let Some(v) = &overrides.log_level {
            config.log_level = v.clone();
        }
    }

    /// 创建默认配置文件
    pub fn create_default_config(config_path: &Path) -> Result<()> {
        let defaults = EngineConfig::default();
        let mut ini = Ini::new();
        let set = |ini: &mut Ini, section: &str, key: &str, value: String| {
            ini.set(section, key, Some(value));
        };

        let organizer = &defaults.organizer;
        set(&mut ini, "organizer", "max_concurrent_assets", organizer.max_concurrent_assets.to_string());
        set(&mut ini, "organizer", "max_file_size_bytes", organizer.max_file_size_bytes.to_string());
        set(&mut ini, "organizer", "supported_mime_types", organizer.supported_mime_types.join(", "));
        set(&mut ini, "organizer", "webhook_url", String::new());
        set(&mut ini, "organizer", "sample_count", defaults.sampler.sample_count.to_string());
        set(&mut ini, "organizer", "frame_max_dimension", defaults.sampler.frame_max_dimension.to_string());
        set(
            &mut ini,
            "organizer",
            "significant_change_threshold",
            defaults.sampler.significant_change_threshold.to_string(),
        );
        set(&mut ini, "organizer", "fallback_floor", defaults.fusion.fallback_floor.to_string());
        let names: Vec<&str> = defaults.fusion.profiles.iter().map(|p| p.name.as_str()).collect();
        set(&mut ini, "organizer", "categories", names.join(", "));

        set(&mut ini, "scene", "action_above", defaults.scene.action_above.to_string());
        set(&mut ini, "scene", "emotional_below", defaults.scene.emotional_below.to_string());

        let audio = &defaults.audio;
        set(&mut ini, "audio", "beat_threshold", audio.beat_threshold.to_string());
        set(&mut ini, "audio", "beat_minimum_gap_seconds", audio.beat_minimum_gap_seconds.to_string());
        set(&mut ini, "audio", "segment_delta_threshold", audio.segment_delta_threshold.to_string());
        set(&mut ini, "audio", "strong_beat_intensity", audio.strong_beat_intensity.to_string());
        set(&mut ini, "audio", "energy_window_seconds", audio.energy_window_seconds.to_string());
        set(&mut ini, "audio", "decode_sample_rate", defaults.decode_sample_rate.to_string());

        let ratios = &defaults.sequence.ratios;
        set(&mut ini, "sequence", "ratio_emotional", ratios.emotional.to_string());
        set(&mut ini, "sequence", "ratio_default", ratios.default.to_string());
        set(&mut ini, "sequence", "ratio_action", ratios.action.to_string());

        for (scene_type, rule) in &defaults.sequence.rules {
            let section = format!("rule.{}", scene_type.as_str());
            set(&mut ini, &section, "min_duration", rule.min_duration.to_string());
            set(&mut ini, &section, "max_duration", rule.max_duration.to_string());
            set(&mut ini, &section, "preferred_transition", rule.preferred_transition.as_str().to_string());
            set(&mut ini, &section, "energy_threshold", rule.energy_threshold.to_string());
        }

        for profile in &defaults.fusion.profiles {
            let section = format!("category.{}", profile.name);
            set(&mut ini, &section, "visual_cues", profile.visual_cues.join(", "));
            set(&mut ini, &section, "required_cues", profile.required_cues.join(", "));
            set(&mut ini, &section, "environmental_cues", profile.environmental_cues.join(", "));
            set(&mut ini, &section, "filename_keywords", profile.filename_keywords.join(", "));
            set(&mut ini, &section, "boost_factor", profile.boost_factor.to_string());
            set(&mut ini, &section, "confidence_threshold", profile.confidence_threshold.to_string());
            if let Some(penalty) = profile.penalties.first() {
                set(&mut ini, &section, "penalty_cues", penalty.cues.join(", "));
                set(&mut ini, &section, "penalty_factor", penalty.factor.to_string());
                set(&mut ini, &section, "penalty_min_strength", penalty.min_strength.to_string());
            }
        }

        set(&mut ini, "oracle", "url", String::new());
        set(&mut ini, "oracle", "timeout_seconds", defaults.oracle.timeout_seconds.to_string());
        set(&mut ini, "oracle", "max_retries", defaults.oracle.max_retries.to_string());
        set(&mut ini, "logging", "level", defaults.log_level.clone());

        ini.write(config_path)
            .with_context(|| format!("写入配置文件失败: {}", config_path.display()))?;

        Ok(())
    }
}

/// 默认规则之外的镜头类型（配置缺失时的兜底）
fn fallback_rule(scene_type: SceneType) -> EditingRule {
    SequencerConfig::default()
        .rules
        .remove(&scene_type)
        .unwrap_or(EditingRule {
            min_duration: 2.0,
            max_duration: 4.0,
            preferred_transition: Transition::Cut,
            energy_threshold: 25.0,
        })
}

/// 逗号分隔的列表，统一小写
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn env_string(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_string(key).and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_ini(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.organizer.max_concurrent_assets, 3);
        assert_eq!(config.scene.action_above, 35.0);
        assert_eq!(config.scene.emotional_below, 15.0);
        assert_eq!(config.audio.beat_threshold, 0.15);
        assert_eq!(config.fusion.fallback_floor, 0.3);
    }

    #[test]
    fn test_load_from_file_and_overrides() {
        let file = write_ini(
            "[organizer]\n\
             max_concurrent_assets = 5\n\
             sample_count = 16\n\
             supported_mime_types = video/mp4, Video/QuickTime\n\
             [scene]\n\
             action_above = 40\n\
             [rule.action]\n\
             preferred_transition = dissolve\n\
             max_duration = 3.5\n",
        );

        let overrides = ConfigOverrides {
            sample_count: Some(8),
            ..Default::default()
        };
        let config = ConfigLoader::load_config(Some(file.path()), &overrides).unwrap();

        assert_eq!(config.organizer.max_concurrent_assets, 5);
        // 命令行优先于配置文件
        assert_eq!(config.sampler.sample_count, 8);
        assert_eq!(
            config.organizer.supported_mime_types,
            vec!["video/mp4".to_string(), "video/quicktime".to_string()]
        );
        assert_eq!(config.scene.action_above, 40.0);
        let action = &config.sequence.rules[&SceneType::Action];
        assert_eq!(action.preferred_transition, Transition::Dissolve);
        assert_eq!(action.max_duration, 3.5);
    }

    #[test]
    fn test_env_sits_between_file_and_cli() {
        // 其他测试不读取这两个变量
        std::env::set_var("EVENT_CUT_BEAT_GAP", "0.25");
        std::env::set_var("EVENT_CUT_WEBHOOK_URL", "http://env.local/hook");

        let file = write_ini(
            "[organizer]\n\
             webhook_url = http://file.local/hook\n\
             [audio]\n\
             beat_minimum_gap_seconds = 0.4\n",
        );
        let overrides = ConfigOverrides {
            webhook_url: Some("http://cli.local/hook".to_string()),
            ..Default::default()
        };
        let result = ConfigLoader::load_config(Some(file.path()), &overrides);

        std::env::remove_var("EVENT_CUT_BEAT_GAP");
        std::env::remove_var("EVENT_CUT_WEBHOOK_URL");

        let config = result.unwrap();
        // 环境变量优先于配置文件
        assert_eq!(config.audio.beat_minimum_gap_seconds, 0.25);
        // 命令行优先于环境变量
        assert_eq!(config.organizer.webhook_url.as_deref(), Some("http://cli.local/hook"));
    }

    #[test]
    fn test_category_sections_replace_defaults() {
        let file = write_ini(
            "[organizer]\n\
             categories = sunset, ceremony\n\
             [category.sunset]\n\
             visual_cues = sunset, dusk\n\
             required_cues = sunset\n\
             filename_keywords = golden\n\
             confidence_threshold = 0.35\n\
             [category.ceremony]\n\
             penalty_cues = dance\n\
             penalty_factor = 0.25\n",
        );

        let config = ConfigLoader::load_config(Some(file.path()), &ConfigOverrides::default()).unwrap();
        let names: Vec<&str> = config.fusion.profiles.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["sunset", "ceremony"]);

        let sunset = &config.fusion.profiles[0];
        assert_eq!(sunset.visual_cues, vec!["sunset".to_string(), "dusk".to_string()]);
        assert_eq!(sunset.confidence_threshold, 0.35);

        // 未覆盖的字段沿用内置模板
        let ceremony = &config.fusion.profiles[1];
        assert!(ceremony.visual_cues.contains(&"altar".to_string()));
        assert_eq!(ceremony.penalties[0].factor, 0.25);
    }

    #[test]
    fn test_invalid_value_is_reported() {
        let file = write_ini("[scene]\naction_above = fast\n");
        let result = ConfigLoader::load_config(Some(file.path()), &ConfigOverrides::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_ratios_fail_validation() {
        let file = write_ini("[sequence]\nratio_emotional = 0.9\nratio_default = 0.5\n");
        let result = ConfigLoader::load_config(Some(file.path()), &ConfigOverrides::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let result = ConfigLoader::load_config(
            Some(Path::new("/nonexistent/event-cut.ini")),
            &ConfigOverrides::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_default_config_round_trips_through_loader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("event-cut.ini");
        ConfigLoader::create_default_config(&path).unwrap();

        let loaded = ConfigLoader::load_config(Some(&path), &ConfigOverrides::default()).unwrap();
        let defaults = EngineConfig::default();
        assert_eq!(loaded.fusion.profiles.len(), defaults.fusion.profiles.len());
        assert_eq!(loaded.sequence.ratios, defaults.sequence.ratios);
        assert_eq!(loaded.sequence.rules, defaults.sequence.rules);
    }
}
