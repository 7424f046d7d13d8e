use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Instant;
use tracing::debug;

use crate::error::{AnalysisError, AnalysisResult};

/// 解码后的单声道音频
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// 音频解码协作方：把音乐文件解码为单声道采样
pub trait AudioDecoder: Send + Sync {
    fn decode(&self, path: &Path) -> AnalysisResult<DecodedAudio>;
}

/// 使用 ffmpeg 命令行把音频解码为单声道 f32le 采样
pub struct FfmpegAudioDecoder {
    sample_rate: u32,
}

impl FfmpegAudioDecoder {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }
}

impl AudioDecoder for FfmpegAudioDecoder {
    fn decode(&self, path: &Path) -> AnalysisResult<DecodedAudio> {
        if !path.exists() {
            return Err(AnalysisError::Decode(format!("音频文件不存在: {}", path.display())));
        }

        let start = Instant::now();
        let mut child = Command::new("ffmpeg")
            .arg("-loglevel")
            .arg("error") // 只显示错误信息
            .arg("-i")
            .arg(path)
            .arg("-vn") // 不包含视频
            .arg("-ac")
            .arg("1") // 单声道
            .arg("-ar")
            .arg(self.sample_rate.to_string())
            .arg("-f")
            .arg("f32le")
            .arg("pipe:1")
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| AnalysisError::Decode(format!("执行 ffmpeg 命令失败: {}", e)))?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| AnalysisError::Decode("无法读取 ffmpeg 输出".to_string()))?;

        let mut buffer = Vec::new();
        stdout.read_to_end(&mut buffer)?;

        let status = child.wait()?;
        if !status.success() {
            return Err(AnalysisError::Decode(format!(
                "ffmpeg 退出码 {:?}: {}",
                status.code(),
                path.display()
            )));
        }

        let samples = f32le_to_samples(&buffer);
        if samples.is_empty() {
            return Err(AnalysisError::Decode(format!("没有解码出音频采样: {}", path.display())));
        }

        let decoded = DecodedAudio {
            samples,
            sample_rate: self.sample_rate,
        };
        debug!(
            "🎵 [音频解码] {}: {} 个采样（{:.2}s），耗时 {:.0}ms",
            path.display(),
            decoded.samples.len(),
            decoded.duration(),
            start.elapsed().as_millis()
        );

        Ok(decoded)
    }
}

/// 小端 f32 字节流转采样，末尾不足 4 字节的部分丢弃
fn f32le_to_samples(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f32le_conversion_drops_partial_tail() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0.5f32.to_le_bytes());
        bytes.extend_from_slice(&(-1.0f32).to_le_bytes());
        bytes.extend_from_slice(&[0x00, 0x01]);

        assert_eq!(f32le_to_samples(&bytes), vec![0.5, -1.0]);
    }

    #[test]
    fn test_missing_file_is_decode_error() {
        let decoder = FfmpegAudioDecoder::new(22_050);
        let err = decoder.decode(Path::new("/nonexistent/track.mp3")).unwrap_err();
        assert!(matches!(err, AnalysisError::Decode(_)));
    }

    #[test]
    fn test_duration() {
        let audio = DecodedAudio {
            samples: vec![0.0; 44_100],
            sample_rate: 22_050,
        };
        assert_eq!(audio.duration(), 2.0);
    }
}
