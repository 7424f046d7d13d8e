use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{AnalysisError, AnalysisResult};
use crate::models::FramePrediction;

/// 图像标签服务配置
#[derive(Debug, Clone, PartialEq)]
pub struct OracleConfig {
    /// 服务地址；未配置时只使用文件名分类
    pub url: Option<String>,
    pub timeout_seconds: u64,
    pub max_retries: u32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_seconds: 30,
            max_retries: 2,
        }
    }
}

/// 图像标签协作方：对单帧返回标签预测
#[async_trait]
pub trait ImageClassifier: Send + Sync {
    async fn classify(&self, frame: &RgbImage) -> AnalysisResult<Vec<FramePrediction>>;
}

/// 不做任何预测，所有素材都走文件名回退
#[derive(Debug, Clone, Copy, Default)]
pub struct NullClassifier;

#[async_trait]
impl ImageClassifier for NullClassifier {
    async fn classify(&self, _frame: &RgbImage) -> AnalysisResult<Vec<FramePrediction>> {
        Ok(Vec::new())
    }
}

/// 服务返回格式，兼容裸数组和 {"predictions": [...]}
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClassifyResponse {
    Bare(Vec<FramePrediction>),
    Wrapped { predictions: Vec<FramePrediction> },
}

impl ClassifyResponse {
    fn into_predictions(self) -> Vec<FramePrediction> {
        match self {
            ClassifyResponse::Bare(p) => p,
            ClassifyResponse::Wrapped { predictions } => predictions,
        }
    }
}

/// 通过 HTTP 调用外部图像标签服务（POST {url}/classify，body 为 JPEG）
pub struct HttpImageClassifier {
    http: reqwest::Client,
    endpoint: String,
    max_retries: u32,
}

impl HttpImageClassifier {
    pub fn new(base_url: &str, config: &OracleConfig) -> AnalysisResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AnalysisError::Oracle(format!("创建 HTTP 客户端失败: {}", e)))?;

        Ok(Self {
            http,
            endpoint: format!("{}/classify", base_url.trim_end_matches('/')),
            max_retries: config.max_retries,
        })
    }

    async fn send_once(&self, body: Vec<u8>) -> AnalysisResult<Vec<FramePrediction>> {
        let response = self
            .http
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "image/jpeg")
            .body(body)
            .send()
            .await
            .map_err(|e| AnalysisError::Oracle(format!("请求失败: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Oracle(format!("服务返回 {}: {}", status, text)));
        }

        let parsed: ClassifyResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::Oracle(format!("响应解析失败: {}", e)))?;

        Ok(parsed.into_predictions())
    }
}

#[async_trait]
impl ImageClassifier for HttpImageClassifier {
    async fn classify(&self, frame: &RgbImage) -> AnalysisResult<Vec<FramePrediction>> {
        let body = encode_jpeg(frame)?;

        let mut attempt = 0;
        loop {
            match self.send_once(body.clone()).await {
                Ok(predictions) => {
                    debug!("🏷️  [标签服务] 返回 {} 个预测", predictions.len());
                    return Ok(predictions);
                }
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!("⚠️  [标签服务] 第 {} 次重试: {}", attempt, e);
                    tokio::time::sleep(Duration::from_millis(200 * attempt as u64)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// 将帧编码为 JPEG
pub fn encode_jpeg(frame: &RgbImage) -> AnalysisResult<Vec<u8>> {
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, 85)
        .encode(frame.as_raw(), frame.width(), frame.height(), image::ColorType::Rgb8)
        .map_err(|e| AnalysisError::Oracle(format!("JPEG 编码失败: {}", e)))?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    #[test]
    fn test_parse_bare_and_wrapped_responses() {
        let bare: ClassifyResponse =
            serde_json::from_str(r#"[{"label":"altar","score":0.9}]"#).unwrap();
        assert_eq!(bare.into_predictions(), vec![FramePrediction::new("altar", 0.9)]);

        let wrapped: ClassifyResponse =
            serde_json::from_str(r#"{"predictions":[{"label":"sky","score":0.4}]}"#).unwrap();
        assert_eq!(wrapped.into_predictions(), vec![FramePrediction::new("sky", 0.4)]);
    }

    #[test]
    fn test_endpoint_normalization() {
        let client = HttpImageClassifier::new("http://localhost:8080/", &OracleConfig::default()).unwrap();
        assert_eq!(client.endpoint, "http://localhost:8080/classify");
    }

    #[test]
    fn test_encode_jpeg_produces_jpeg_header() {
        let frame: RgbImage = ImageBuffer::from_fn(8, 8, |_, _| Rgb([10, 20, 30]));
        let bytes = encode_jpeg(&frame).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[tokio::test]
    async fn test_null_classifier_returns_nothing() {
        let frame: RgbImage = ImageBuffer::new(4, 4);
        assert!(NullClassifier.classify(&frame).await.unwrap().is_empty());
    }
}
