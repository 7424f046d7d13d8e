use thiserror::Error;

pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// 分析流水线错误类型
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// 素材校验失败（不支持的类型、文件过大等），在分析开始前拒绝
    #[error("素材校验失败: {0}")]
    Validation(String),

    /// 视频帧或音频解码失败
    #[error("解码失败: {0}")]
    Decode(String),

    /// 图像标签服务调用失败
    #[error("图像标签服务错误: {0}")]
    Oracle(String),

    #[error("配置无效: {0}")]
    Config(String),

    #[error("任务已取消")]
    Cancelled,

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),
}
