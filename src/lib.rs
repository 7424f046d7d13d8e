pub mod models;
pub mod error;
pub mod config;
pub mod scene_detector;
pub mod frame_sampler;
pub mod video_processor;
pub mod oracle;
pub mod category;
pub mod audio_extractor;
pub mod audio_analyzer;
pub mod sequencer;
pub mod processor;

pub use models::{
    Asset, AssetReport, AudioAnalysis, Beat, CategoryScore, EditDecisionList, FramePrediction,
    OrganizationResult, SceneAnalysis, SceneType, SequenceEntry, Transition,
};
pub use error::{AnalysisError, AnalysisResult};
pub use config::{ConfigLoader, ConfigOverrides, EngineConfig};
pub use scene_detector::SceneDetector;
pub use frame_sampler::{CancelFlag, FrameDecoder, FrameSampler, FrameSource};
pub use video_processor::{ingest_directory, FfmpegFrameDecoder};
pub use oracle::{HttpImageClassifier, ImageClassifier, NullClassifier};
pub use category::CategoryClassifier;
pub use audio_extractor::{AudioDecoder, FfmpegAudioDecoder};
pub use audio_analyzer::AudioAnalyzer;
pub use sequencer::{ClipPool, EditSequencer};
pub use processor::{analyze_music, Organizer, ProjectOutput};
