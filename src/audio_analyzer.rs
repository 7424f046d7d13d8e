use std::time::Instant;
use tracing::{debug, info};

use crate::error::{AnalysisError, AnalysisResult};
use crate::models::{AudioAnalysis, AudioSegment, Beat, BeatType, EnergyProfile, SegmentKind};

/// 音乐分析参数
#[derive(Debug, Clone, PartialEq)]
pub struct AudioAnalyzerConfig {
    /// 采样绝对值超过该阈值视为节拍候选
    pub beat_threshold: f32,
    /// 相邻节拍的最小间隔（秒）
    pub beat_minimum_gap_seconds: f64,
    /// 相邻节拍强度变化超过该值时开始新段落
    pub segment_delta_threshold: f64,
    /// 强度不低于该值的节拍记为强拍
    pub strong_beat_intensity: f64,
    /// 能量曲线窗口长度（秒）
    pub energy_window_seconds: f64,
}

impl Default for AudioAnalyzerConfig {
    fn default() -> Self {
        Self {
            beat_threshold: 0.15,
            beat_minimum_gap_seconds: 0.3,
            segment_delta_threshold: 0.15,
            strong_beat_intensity: 0.5,
            energy_window_seconds: 0.05,
        }
    }
}

/// 音乐分析器：节拍检测、节奏估计、能量曲线与段落划分
pub struct AudioAnalyzer {
    config: AudioAnalyzerConfig,
}

impl AudioAnalyzer {
    pub fn new(config: AudioAnalyzerConfig) -> Self {
        Self { config }
    }

    pub fn analyze(&self, samples: &[f32], sample_rate: u32) -> AnalysisResult<AudioAnalysis> {
        if sample_rate == 0 {
            return Err(AnalysisError::Decode("采样率为 0".to_string()));
        }
        if samples.is_empty() {
            return Err(AnalysisError::Decode("音频缓冲区为空".to_string()));
        }
        if let Some(i) = samples.iter().position(|s| !s.is_finite()) {
            return Err(AnalysisError::Decode(format!("第 {} 个采样不是有效数值", i)));
        }

        let start = Instant::now();
        let duration = samples.len() as f64 / sample_rate as f64;

        let mut beats = self.detect_beats(samples, sample_rate);
        let bpm = estimate_bpm(&beats);
        for beat in &mut beats {
            beat.bpm = bpm;
        }

        let energy_profile = self.energy_profile(samples, sample_rate);
        let segments = self.segments(&beats, duration);

        info!(
            "✅ [音乐分析] 时长 {:.2}s，检测到 {} 个节拍，BPM {}，{} 个段落，耗时 {:.0}ms",
            duration,
            beats.len(),
            bpm,
            segments.len(),
            start.elapsed().as_millis()
        );

        Ok(AudioAnalysis {
            beats,
            bpm,
            energy_profile,
            segments,
            duration,
            sample_rate,
        })
    }

    /// 阈值 + 最小间隔的节拍检测
    fn detect_beats(&self, samples: &[f32], sample_rate: u32) -> Vec<Beat> {
        // 向上取整到整数采样，容差吸收 0.3 * 100 这类浮点误差
        let min_gap = (self.config.beat_minimum_gap_seconds * sample_rate as f64 - 1e-9).ceil() as usize;
        let mut beats = Vec::new();
        let mut last: Option<usize> = None;

        for (i, sample) in samples.iter().enumerate() {
            let amplitude = sample.abs();
            if amplitude <= self.config.beat_threshold {
                continue;
            }
            if let Some(last) = last {
                if i - last < min_gap {
                    continue;
                }
            }

            let intensity = (amplitude as f64).min(1.0);
            let beat_type = if intensity >= self.config.strong_beat_intensity {
                BeatType::Strong
            } else {
                BeatType::Weak
            };
            beats.push(Beat {
                timestamp: i as f64 / sample_rate as f64,
                intensity,
                beat_type,
                bpm: 0.0,
            });
            last = Some(i);
        }

        beats
    }

    fn energy_profile(&self, samples: &[f32], sample_rate: u32) -> EnergyProfile {
        let average = samples.iter().map(|&s| (s as f64).powi(2)).sum::<f64>() / samples.len() as f64;

        let window_len = ((self.config.energy_window_seconds * sample_rate as f64).round() as usize).max(1);
        let windows: Vec<f64> = samples
            .chunks(window_len)
            .map(|w| w.iter().map(|&s| (s as f64).powi(2)).sum::<f64>() / w.len() as f64)
            .collect();

        let peak = windows.iter().cloned().fold(0.0, f64::max);
        let mut peaks = Vec::new();
        let mut valleys = Vec::new();

        for (i, &energy) in windows.iter().enumerate() {
            let left = if i > 0 { Some(windows[i - 1]) } else { None };
            let right = windows.get(i + 1).copied();

            let is_max = left.map_or(true, |l| energy >= l) && right.map_or(true, |r| energy >= r);
            let is_min = left.map_or(true, |l| energy <= l) && right.map_or(true, |r| energy <= r);

            if is_max && energy > average {
                peaks.push(i);
            } else if is_min && energy < average {
                valleys.push(i);
            }
        }

        debug!(
            "📈 [音乐分析] 能量窗口 {} 个，峰值 {} 个，谷值 {} 个",
            windows.len(),
            peaks.len(),
            valleys.len()
        );

        EnergyProfile {
            average,
            peak,
            peaks,
            valleys,
            window_seconds: window_len as f64 / sample_rate as f64,
        }
    }

    /// 按相邻节拍强度变化划分段落
    fn segments(&self, beats: &[Beat], duration: f64) -> Vec<AudioSegment> {
        let mut segments = Vec::new();
        let mut current_start = 0.0;
        let mut current_kind = SegmentKind::Steady;

        for pair in beats.windows(2) {
            let delta = pair[1].intensity - pair[0].intensity;
            if delta.abs() <= self.config.segment_delta_threshold {
                continue;
            }

            let boundary = pair[1].timestamp;
            segments.push(AudioSegment {
                start: current_start,
                end: boundary,
                kind: current_kind,
            });
            current_start = boundary;
            current_kind = if delta > 0.0 {
                SegmentKind::Crescendo
            } else {
                SegmentKind::Decrescendo
            };
        }

        segments.push(AudioSegment {
            start: current_start,
            end: duration,
            kind: current_kind,
        });
        segments
    }
}

/// bpm = round(60 / 平均节拍间隔)，少于两个节拍时为 0
pub fn estimate_bpm(beats: &[Beat]) -> f64 {
    if beats.len() < 2 {
        return 0.0;
    }

    let intervals: Vec<f64> = beats
        .windows(2)
        .map(|pair| pair[1].timestamp - pair[0].timestamp)
        .collect();
    let mean = intervals.iter().sum::<f64>() / intervals.len() as f64;
    if mean <= 0.0 {
        return 0.0;
    }

    (60.0 / mean).round()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer() -> AudioAnalyzer {
        AudioAnalyzer::new(AudioAnalyzerConfig::default())
    }

    /// 1000 Hz 采样、时长 1s，在 0.0/0.25/0.6/0.9s 处越过阈值
    fn crossing_buffer() -> Vec<f32> {
        let mut samples = vec![0.0f32; 1000];
        samples[0] = 0.8;
        samples[250] = 0.5;
        samples[600] = -0.9;
        samples[900] = 0.3;
        samples
    }

    #[test]
    fn test_minimum_gap_drops_close_crossing() {
        let analysis = analyzer().analyze(&crossing_buffer(), 1000).unwrap();

        let times: Vec<f64> = analysis.beats.iter().map(|b| b.timestamp).collect();
        assert_eq!(times, vec![0.0, 0.6, 0.9]);
        // 间隔 0.6 与 0.3，平均 0.45s
        assert_eq!(analysis.bpm, 133.0);
        assert!(analysis.beats.iter().all(|b| b.bpm == 133.0));

        let types: Vec<BeatType> = analysis.beats.iter().map(|b| b.beat_type).collect();
        assert_eq!(types, vec![BeatType::Strong, BeatType::Strong, BeatType::Weak]);
        assert_eq!(analysis.duration, 1.0);
    }

    #[test]
    fn test_beats_respect_minimum_gap() {
        // 每个采样都越过阈值
        let samples: Vec<f32> = (0..500).map(|i| if i % 2 == 0 { 0.5 } else { -0.5 }).collect();
        let analysis = analyzer().analyze(&samples, 100).unwrap();

        assert_eq!(analysis.beats.len(), 17);
        for pair in analysis.beats.windows(2) {
            assert!(pair[1].timestamp - pair[0].timestamp >= 0.3 - 1e-9);
        }
        assert_eq!(analysis.bpm, 200.0);
    }

    #[test]
    fn test_fractional_gap_rounds_up_to_whole_samples() {
        let analyzer = AudioAnalyzer::new(AudioAnalyzerConfig {
            beat_minimum_gap_seconds: 0.301,
            ..AudioAnalyzerConfig::default()
        });
        let samples = vec![0.5f32; 22050];
        let analysis = analyzer.analyze(&samples, 22050).unwrap();

        // 0.301 * 22050 = 6637.05 个采样，取 6638
        assert_eq!(analysis.beats.len(), 4);
        assert_eq!(analysis.beats[1].timestamp, 6638.0 / 22050.0);
        for pair in analysis.beats.windows(2) {
            assert!(pair[1].timestamp - pair[0].timestamp >= 0.301);
        }
    }

    #[test]
    fn test_bpm_recomputation_is_idempotent() {
        let analysis = analyzer().analyze(&crossing_buffer(), 1000).unwrap();
        assert_eq!(estimate_bpm(&analysis.beats), analysis.bpm);
        assert_eq!(estimate_bpm(&analysis.beats[..1]), 0.0);
        assert_eq!(estimate_bpm(&[]), 0.0);
    }

    #[test]
    fn test_segments_follow_intensity_changes() {
        let analysis = analyzer().analyze(&crossing_buffer(), 1000).unwrap();
        // 0.8 -> 0.9 变化不足，0.9 -> 0.3 下降
        assert_eq!(
            analysis.segments,
            vec![
                AudioSegment { start: 0.0, end: 0.9, kind: SegmentKind::Steady },
                AudioSegment { start: 0.9, end: 1.0, kind: SegmentKind::Decrescendo },
            ]
        );

        let mut rising = vec![0.0f32; 1000];
        rising[0] = 0.2;
        rising[500] = 0.7;
        let analysis = analyzer().analyze(&rising, 1000).unwrap();
        assert_eq!(analysis.segments.len(), 2);
        assert_eq!(analysis.segments[1].kind, SegmentKind::Crescendo);
        assert_eq!(analysis.segments[1].start, 0.5);
    }

    #[test]
    fn test_silence_has_no_beats() {
        let analysis = analyzer().analyze(&vec![0.01f32; 2000], 1000).unwrap();
        assert!(analysis.beats.is_empty());
        assert_eq!(analysis.bpm, 0.0);
        assert_eq!(
            analysis.segments,
            vec![AudioSegment { start: 0.0, end: 2.0, kind: SegmentKind::Steady }]
        );
    }

    #[test]
    fn test_energy_profile_windows() {
        // 100 Hz、窗口 0.05s = 5 个采样，窗口幅度交替
        let levels = [0.1f32, 0.5, 0.1, 0.5, 0.1];
        let samples: Vec<f32> = levels.iter().flat_map(|&l| std::iter::repeat(l).take(5)).collect();
        let profile = analyzer().analyze(&samples, 100).unwrap().energy_profile;

        assert!((profile.average - 0.106).abs() < 1e-6);
        assert!((profile.peak - 0.25).abs() < 1e-6);
        assert_eq!(profile.peaks, vec![1, 3]);
        assert_eq!(profile.valleys, vec![0, 2, 4]);
        assert!((profile.window_seconds - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_buffers_are_decode_errors() {
        let a = analyzer();
        assert!(matches!(a.analyze(&[0.1], 0), Err(AnalysisError::Decode(_))));
        assert!(matches!(a.analyze(&[], 44_100), Err(AnalysisError::Decode(_))));
        assert!(matches!(a.analyze(&[0.1, f32::NAN], 44_100), Err(AnalysisError::Decode(_))));
    }
}
