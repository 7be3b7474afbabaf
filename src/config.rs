use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub encoder: EncoderConfig,
    #[serde(default)]
    pub transcription: TranscriptionConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    /// Default sample rate when a `start` message omits one
    pub sample_rate: u32,
    /// Default channel count when a `start` message omits one
    pub channels: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root directory for per-session chunk dirs and final artifacts
    pub base_dir: String,
    /// URL path prefix under which the base directory is served
    pub public_base: String,
    /// Age after which an abandoned session's chunks are reclaimed
    pub orphan_ttl_hours: u64,
    /// How often the orphan sweeper runs
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EncoderConfig {
    pub ffmpeg_path: String,
    pub bitrate: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptionConfig {
    pub api_url: String,
    pub model: String,
    /// Environment variable holding the API key (never stored in config files)
    pub api_key_env: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Maximum total wait for just-written chunks to become visible
    pub settle_wait_ms: u64,
    /// Poll interval within the settle-wait
    pub settle_poll_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "voice-capture".to_string(),
            http: HttpConfig {
                bind: "0.0.0.0".to_string(),
                port: 8080,
            },
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 1,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_dir: "data/voicecapture".to_string(),
            public_base: "/artifacts".to_string(),
            orphan_ttl_hours: 24,
            sweep_interval_secs: 3600,
        }
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            bitrate: "128k".to_string(),
        }
    }
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com/v1/audio/transcriptions".to_string(),
            model: "whisper-1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            settle_wait_ms: 3000,
            settle_poll_ms: 150,
        }
    }
}

impl Config {
    /// Load configuration from a file, falling back to defaults for anything
    /// absent (including the file itself).
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
