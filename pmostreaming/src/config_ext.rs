//! Extension pour intégrer les réglages de streaming dans pmoconfig
//!
//! Ce module fournit le trait [`StreamingConfigExt`] qui ajoute à
//! `pmoconfig::Config` les clés `streaming.*`, ainsi que
//! [`StreamingSettings`] qui les rassemble en une structure simple : le
//! cœur de la crate ne lit jamais l'état global de configuration.
//!
//! # Exemple
//!
//! ```no_run
//! use pmoconfig::get_config;
//! use pmostreaming::{StreamingConfigExt, StreamingSettings};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = get_config();
//! config.set_streaming_user_agent("MyPlayer/1.0")?;
//!
//! let settings = StreamingSettings::from_config(&config)?;
//! assert_eq!(settings.user_agent, "MyPlayer/1.0");
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use anyhow::Result;
use pmoconfig::Config;
use serde_yaml::Value;

/// Default User-Agent
pub const DEFAULT_USER_AGENT: &str = "pmostream/0.1 (pmostreaming)";

/// Default connection timeout (10 seconds)
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Fréquence de sortie du moteur de rendu
pub const DEFAULT_OUTPUT_SAMPLE_RATE: u64 = 44_100;

/// Nombre de paquets à partir duquel le débit mesuré est fiable
pub const DEFAULT_BITRATE_PREFERRED_PACKETS: u64 = 50;

/// Nombre minimal de paquets lorsque le format ne donne pas d'estimation
pub const DEFAULT_BITRATE_MINIMUM_PACKETS: u64 = 10;

/// Limite de bufferisation des en-têtes Ogg
pub const DEFAULT_OGG_MAX_HEADER_BYTES: u64 = 64 * 1024;

/// Taille des lectures des sources fichier
pub const DEFAULT_FILE_READ_CHUNK_SIZE: u64 = 16 * 1024;

const USER_AGENT_PATH: &[&str] = &["streaming", "user_agent"];
const CONNECT_TIMEOUT_PATH: &[&str] = &["streaming", "connect_timeout_secs"];
const OUTPUT_SAMPLE_RATE_PATH: &[&str] = &["streaming", "output_sample_rate"];
const PREFERRED_PACKETS_PATH: &[&str] = &["streaming", "bitrate", "preferred_packets"];
const MINIMUM_PACKETS_PATH: &[&str] = &["streaming", "bitrate", "minimum_packets"];
const OGG_MAX_HEADER_PATH: &[&str] = &["streaming", "ogg", "max_header_bytes"];
const FILE_CHUNK_PATH: &[&str] = &["streaming", "file", "read_chunk_size"];

/// Trait d'extension pour gérer la configuration du streaming dans pmoconfig
///
/// Les getters retournent la valeur par défaut lorsque la clé est absente.
pub trait StreamingConfigExt {
    /// User-Agent envoyé avec chaque requête
    fn get_streaming_user_agent(&self) -> Result<String>;
    fn set_streaming_user_agent(&self, user_agent: &str) -> Result<()>;

    /// Délai de connexion (secondes)
    fn get_streaming_connect_timeout_secs(&self) -> Result<u64>;
    fn set_streaming_connect_timeout_secs(&self, secs: u64) -> Result<()>;

    fn get_streaming_output_sample_rate(&self) -> Result<u64>;
    fn set_streaming_output_sample_rate(&self, rate: u64) -> Result<()>;

    /// Seuils d'estimation du débit : `(preferred, minimum)`
    fn get_streaming_bitrate_packets(&self) -> Result<(u64, u64)>;
    fn set_streaming_bitrate_packets(&self, preferred: u64, minimum: u64) -> Result<()>;

    fn get_streaming_ogg_max_header_bytes(&self) -> Result<u64>;
    fn set_streaming_ogg_max_header_bytes(&self, bytes: u64) -> Result<()>;

    fn get_streaming_file_read_chunk_size(&self) -> Result<u64>;
    fn set_streaming_file_read_chunk_size(&self, bytes: u64) -> Result<()>;
}

fn get_u64(config: &Config, path: &[&str], default: u64) -> Result<u64> {
    match config.get_value(path) {
        Ok(Value::Number(n)) => n
            .as_u64()
            .ok_or_else(|| anyhow::anyhow!("{} must be a positive integer", path.join("."))),
        Ok(Value::String(s)) => s
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{}: {}", path.join("."), e)),
        Ok(Value::Null) | Err(_) => Ok(default),
        Ok(_) => Err(anyhow::anyhow!("{} must be a number", path.join("."))),
    }
}

impl StreamingConfigExt for Config {
    fn get_streaming_user_agent(&self) -> Result<String> {
        Ok(self.get_string_or(USER_AGENT_PATH, DEFAULT_USER_AGENT))
    }

    fn set_streaming_user_agent(&self, user_agent: &str) -> Result<()> {
        self.set_value(USER_AGENT_PATH, Value::String(user_agent.to_string()))
    }

    fn get_streaming_connect_timeout_secs(&self) -> Result<u64> {
        get_u64(self, CONNECT_TIMEOUT_PATH, DEFAULT_CONNECT_TIMEOUT_SECS)
    }

    fn set_streaming_connect_timeout_secs(&self, secs: u64) -> Result<()> {
        self.set_u64(CONNECT_TIMEOUT_PATH, secs)
    }

    fn get_streaming_output_sample_rate(&self) -> Result<u64> {
        get_u64(self, OUTPUT_SAMPLE_RATE_PATH, DEFAULT_OUTPUT_SAMPLE_RATE)
    }

    fn set_streaming_output_sample_rate(&self, rate: u64) -> Result<()> {
        self.set_u64(OUTPUT_SAMPLE_RATE_PATH, rate)
    }

    fn get_streaming_bitrate_packets(&self) -> Result<(u64, u64)> {
        let preferred = get_u64(self, PREFERRED_PACKETS_PATH, DEFAULT_BITRATE_PREFERRED_PACKETS)?;
        let minimum = get_u64(self, MINIMUM_PACKETS_PATH, DEFAULT_BITRATE_MINIMUM_PACKETS)?;
        Ok((preferred, minimum))
    }

    fn set_streaming_bitrate_packets(&self, preferred: u64, minimum: u64) -> Result<()> {
        if minimum > preferred {
            anyhow::bail!("minimum packet count ({minimum}) exceeds preferred ({preferred})");
        }
        self.set_u64(PREFERRED_PACKETS_PATH, preferred)?;
        self.set_u64(MINIMUM_PACKETS_PATH, minimum)
    }

    fn get_streaming_ogg_max_header_bytes(&self) -> Result<u64> {
        get_u64(self, OGG_MAX_HEADER_PATH, DEFAULT_OGG_MAX_HEADER_BYTES)
    }

    fn set_streaming_ogg_max_header_bytes(&self, bytes: u64) -> Result<()> {
        self.set_u64(OGG_MAX_HEADER_PATH, bytes)
    }

    fn get_streaming_file_read_chunk_size(&self) -> Result<u64> {
        get_u64(self, FILE_CHUNK_PATH, DEFAULT_FILE_READ_CHUNK_SIZE)
    }

    fn set_streaming_file_read_chunk_size(&self, bytes: u64) -> Result<()> {
        if bytes == 0 {
            anyhow::bail!("read chunk size must be positive");
        }
        self.set_u64(FILE_CHUNK_PATH, bytes)
    }
}

/// Réglages de streaming figés au moment de la construction
#[derive(Debug, Clone, PartialEq)]
pub struct StreamingSettings {
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub output_sample_rate: f64,
    pub preferred_bitrate_packets: usize,
    pub minimum_bitrate_packets: usize,
    pub ogg_max_header_bytes: usize,
    pub file_read_chunk_size: usize,
}

impl Default for StreamingSettings {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            output_sample_rate: DEFAULT_OUTPUT_SAMPLE_RATE as f64,
            preferred_bitrate_packets: DEFAULT_BITRATE_PREFERRED_PACKETS as usize,
            minimum_bitrate_packets: DEFAULT_BITRATE_MINIMUM_PACKETS as usize,
            ogg_max_header_bytes: DEFAULT_OGG_MAX_HEADER_BYTES as usize,
            file_read_chunk_size: DEFAULT_FILE_READ_CHUNK_SIZE as usize,
        }
    }
}

impl StreamingSettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        let (preferred, minimum) = config.get_streaming_bitrate_packets()?;
        Ok(Self {
            user_agent: config.get_streaming_user_agent()?,
            connect_timeout: Duration::from_secs(config.get_streaming_connect_timeout_secs()?),
            output_sample_rate: config.get_streaming_output_sample_rate()? as f64,
            preferred_bitrate_packets: preferred as usize,
            minimum_bitrate_packets: minimum as usize,
            ogg_max_header_bytes: config.get_streaming_ogg_max_header_bytes()? as usize,
            file_read_chunk_size: config.get_streaming_file_read_chunk_size()?.max(1) as usize,
        })
    }
}
