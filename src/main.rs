use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use event_cut::config::{ConfigLoader, ConfigOverrides, EngineConfig};
use event_cut::oracle::OracleConfig;
use event_cut::{
    analyze_music, ingest_directory, CancelFlag, FfmpegAudioDecoder, FfmpegFrameDecoder, HttpImageClassifier,
    ImageClassifier, NullClassifier, Organizer,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// 活动素材整理与踩点剪辑工具
#[derive(Parser, Debug)]
#[command(name = "event-cut")]
#[command(about = "活动素材自动分类，并根据音乐节拍生成剪辑决策列表", long_about = None)]
struct Args {
    /// 配置文件路径（可选，支持 .ini 格式）
    /// 优先级：命令行参数 > 环境变量 > 配置文件 > 默认值
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 日志级别（trace, debug, info, warn, error）
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 分析目录中的视频素材并按分类整理
    Organize {
        /// 素材目录
        #[arg(short, long)]
        input: PathBuf,

        /// 输出 JSON 文件（默认输出到标准输出）
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 同时分析的素材数量
        /// 可通过环境变量 EVENT_CUT_MAX_CONCURRENT 或配置文件设置
        #[arg(long)]
        max_concurrent: Option<usize>,

        /// 每个素材的采样点数量
        #[arg(long)]
        sample_count: Option<usize>,

        /// 图像标签服务地址（未配置时只使用文件名分类）
        #[arg(long)]
        oracle_url: Option<String>,
    },
    /// 检测音乐的节拍、节奏和能量曲线
    Beats {
        /// 音乐文件
        #[arg(short, long)]
        music: PathBuf,

        /// 输出 JSON 文件（默认输出到标准输出）
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 节拍检测阈值 (0.0-1.0)
        #[arg(long)]
        beat_threshold: Option<f32>,
    },
    /// 完整流程：素材整理 + 音乐分析 + 生成剪辑决策列表
    Sequence {
        /// 素材目录
        #[arg(short, long)]
        input: PathBuf,

        /// 音乐文件
        #[arg(short, long)]
        music: PathBuf,

        /// 目标时长（秒）
        #[arg(short, long)]
        target: f64,

        /// 输出 JSON 文件（默认输出到标准输出）
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 音乐无法解码时不报错，按素材自身时间点生成
        #[arg(long)]
        allow_degraded: bool,

        #[arg(long)]
        max_concurrent: Option<usize>,

        #[arg(long)]
        oracle_url: Option<String>,
    },
    /// 生成默认配置文件
    InitConfig {
        /// 配置文件路径
        #[arg(default_value = "event-cut.ini")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 生成配置文件不依赖已有配置
    if let Commands::InitConfig { path } = &args.command {
        tracing_subscriber::fmt::init();
        ConfigLoader::create_default_config(path)?;
        info!("✅ 已生成默认配置文件: {}", path.display());
        return Ok(());
    }

    let mut overrides = ConfigOverrides {
        log_level: args.log_level.clone(),
        ..Default::default()
    };
    match &args.command {
        Commands::Organize {
            max_concurrent,
            sample_count,
            oracle_url,
            ..
        } => {
            overrides.max_concurrent_assets = *max_concurrent;
            overrides.sample_count = *sample_count;
            overrides.oracle_url = oracle_url.clone();
        }
        Commands::Beats { beat_threshold, .. } => {
            overrides.beat_threshold = *beat_threshold;
        }
        Commands::Sequence {
            max_concurrent,
            oracle_url,
            ..
        } => {
            overrides.max_concurrent_assets = *max_concurrent;
            overrides.oracle_url = oracle_url.clone();
        }
        Commands::InitConfig { .. } => {}
    }

    let config = ConfigLoader::load_config(args.config.as_deref(), &overrides).context("加载配置失败")?;
    init_tracing(&config.log_level);

    match args.command {
        Commands::Organize { input, output, .. } => {
            let organizer = build_organizer(config)?;
            let assets = ingest_directory(&input).context("导入素材失败")?;
            let result = organizer.organize(assets).await;
            write_json(&result, output.as_deref())?;
        }
        Commands::Beats { music, output, .. } => {
            let decoder = Arc::new(FfmpegAudioDecoder::new(config.decode_sample_rate));
            let analysis = analyze_music(decoder, music.clone(), config.audio.clone())
                .await
                .with_context(|| format!("分析音乐失败: {}", music.display()))?;
            write_json(&analysis, output.as_deref())?;
        }
        Commands::Sequence {
            input,
            music,
            target,
            output,
            allow_degraded,
            ..
        } => {
            if !(target > 0.0) {
                anyhow::bail!("目标时长必须大于 0: {}", target);
            }
            let audio_decoder = Arc::new(FfmpegAudioDecoder::new(config.decode_sample_rate));
            let organizer = build_organizer(config)?;
            let assets = ingest_directory(&input).context("导入素材失败")?;
            let project = organizer
                .process_project(assets, &music, audio_decoder, target, allow_degraded)
                .await
                .context("生成剪辑决策列表失败")?;
            write_json(&project, output.as_deref())?;
        }
        Commands::InitConfig { .. } => {}
    }

    Ok(())
}

/// 初始化日志：RUST_LOG 优先，否则使用配置中的日志级别
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_oracle(config: &OracleConfig) -> Result<Arc<dyn ImageClassifier>> {
    match &config.url {
        Some(url) => {
            info!("🏷️  图像标签服务: {}", url);
            let client = HttpImageClassifier::new(url, config).context("创建图像标签服务客户端失败")?;
            Ok(Arc::new(client))
        }
        None => {
            info!("🏷️  未配置图像标签服务，仅使用文件名分类");
            Ok(Arc::new(NullClassifier))
        }
    }
}

/// 构建编排器，并在 Ctrl-C 时设置取消标志
fn build_organizer(config: EngineConfig) -> Result<Organizer> {
    let decoder = FfmpegFrameDecoder::new().context("初始化 FFmpeg 失败")?;
    let oracle = build_oracle(&config.oracle)?;
    let cancel = CancelFlag::new();

    let signal_flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("⏹️  收到中断信号，正在停止（已完成的素材会保留）...");
            signal_flag.cancel();
        }
    });

    Organizer::new(Arc::new(decoder), oracle, config, cancel).context("配置校验失败")
}

fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("序列化结果失败")?;
    match output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("写入结果文件失败: {}", path.display()))?;
            info!("📁 结果已写入: {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}
