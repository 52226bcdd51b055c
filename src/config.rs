use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{EtlError, Result};

pub const DEFAULT_ARTICLE_CAP: usize = 50;
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.9;
pub const DEFAULT_NOTIFY_TOPIC: &str = "article-data-processed";
pub const DEFAULT_INSTITUTION_KEYWORDS: [&str; 5] =
    ["university", "center", "centre", "laboratory", "hospital"];

/// Run configuration, built once at startup and passed by reference
#[derive(Debug, Clone)]
pub struct Config {
    pub input_bucket: String,
    pub output_bucket: String,
    pub input_prefix: String,
    pub output_prefix: String,
    /// Root directory of the filesystem-backed object store
    pub storage_root: PathBuf,
    /// Directory holding institutes.csv and aliases.csv
    pub grid_data_dir: PathBuf,
    pub world_countries_path: PathBuf,
    pub work_dir: PathBuf,
    pub ner_endpoint: Option<String>,
    pub notify_topic: String,
    pub notify_webhook_url: Option<String>,
    pub metrics_path: Option<PathBuf>,
    pub resolution: ResolutionSettings,
}

/// Tunables of the extraction and resolution stages
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionSettings {
    /// Maximum number of articles read from the document; `None` reads all
    pub article_cap: Option<usize>,
    pub similarity_threshold: f64,
    pub institution_keywords: Vec<String>,
}

impl Default for ResolutionSettings {
    fn default() -> Self {
        Self {
            article_cap: Some(DEFAULT_ARTICLE_CAP),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            institution_keywords: DEFAULT_INSTITUTION_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect(),
        }
    }
}

/// Optional TOML overrides for [`ResolutionSettings`]
#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    similarity_threshold: Option<f64>,
    article_cap: Option<usize>,
    institution_keywords: Option<Vec<String>>,
}

/// Reference data location and resolution tunables.
///
/// This is all an offline name lookup needs, so it loads without any bucket
/// settings.
#[derive(Debug, Clone)]
pub struct ReferenceConfig {
    /// Directory holding institutes.csv and aliases.csv
    pub grid_data_dir: PathBuf,
    pub resolution: ResolutionSettings,
}

impl ReferenceConfig {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut resolution = ResolutionSettings::default();
        if let Some(raw) = get("ARTICLE_CAP") {
            resolution.article_cap = parse_article_cap(&raw)?;
        }
        if let Some(raw) = get("SIMILARITY_THRESHOLD") {
            resolution.similarity_threshold = parse_threshold(&raw)?;
        }
        if let Some(path) = get("PIPELINE_SETTINGS") {
            apply_settings_file(&mut resolution, Path::new(&path))?;
        }

        Ok(Self {
            grid_data_dir: PathBuf::from(get("GRID_DATA_DIR").unwrap_or_else(|| "/GRID_Data".to_string())),
            resolution,
        })
    }

    pub fn institutes_path(&self) -> PathBuf {
        self.grid_data_dir.join("institutes.csv")
    }

    pub fn aliases_path(&self) -> PathBuf {
        self.grid_data_dir.join("aliases.csv")
    }
}

impl Config {
    /// Load configuration from the environment, reading a `.env` file first if present
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| {
            get(key).ok_or_else(|| {
                EtlError::Config(format!("Missing required environment variable '{}'", key))
            })
        };
        let reference = ReferenceConfig::from_lookup(&lookup)?;

        Ok(Self {
            input_bucket: required("INPUT_BUCKET_NAME")?,
            output_bucket: required("OUTPUT_BUCKET_NAME")?,
            input_prefix: get("INPUT_BUCKET_PREFIX").unwrap_or_default(),
            output_prefix: get("OUTPUT_BUCKET_PREFIX").unwrap_or_default(),
            storage_root: PathBuf::from(get("STORAGE_ROOT").unwrap_or_else(|| "storage".to_string())),
            grid_data_dir: reference.grid_data_dir,
            world_countries_path: PathBuf::from(
                get("WORLD_COUNTRIES_PATH").unwrap_or_else(|| "data/world_countries.txt".to_string()),
            ),
            work_dir: PathBuf::from(get("WORK_DIR").unwrap_or_else(|| "/tmp".to_string())),
            ner_endpoint: get("NER_ENDPOINT"),
            notify_topic: get("NOTIFY_TOPIC").unwrap_or_else(|| DEFAULT_NOTIFY_TOPIC.to_string()),
            notify_webhook_url: get("NOTIFY_WEBHOOK_URL"),
            metrics_path: get("METRICS_PATH").map(PathBuf::from),
            resolution: reference.resolution,
        })
    }

    /// The reference-data part of this configuration
    pub fn reference(&self) -> ReferenceConfig {
        ReferenceConfig {
            grid_data_dir: self.grid_data_dir.clone(),
            resolution: self.resolution.clone(),
        }
    }

    /// Local path the source document is downloaded to
    pub fn source_xml_path(&self) -> PathBuf {
        self.work_dir.join("pubmed_xml_file.xml")
    }

    /// Local path the output table is written to before upload
    pub fn processed_csv_path(&self) -> PathBuf {
        self.work_dir.join("processed_article_data.csv")
    }

    /// Object key of the uploaded output table for a run started at `timestamp`
    pub fn output_key(&self, timestamp: &str) -> String {
        format!("{}processed_article_data_{}.csv", self.output_prefix, timestamp)
    }

    pub fn ner_endpoint(&self) -> Result<&str> {
        self.ner_endpoint
            .as_deref()
            .ok_or_else(|| EtlError::Config("Missing required environment variable 'NER_ENDPOINT'".to_string()))
    }
}

fn parse_article_cap(raw: &str) -> Result<Option<usize>> {
    if raw.trim().eq_ignore_ascii_case("all") {
        return Ok(None);
    }
    raw.trim()
        .parse::<usize>()
        .map(Some)
        .map_err(|e| EtlError::Config(format!("Invalid ARTICLE_CAP '{}': {}", raw, e)))
}

fn parse_threshold(raw: &str) -> Result<f64> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|e| EtlError::Config(format!("Invalid SIMILARITY_THRESHOLD '{}': {}", raw, e)))?;
    validate_threshold(value)
}

fn validate_threshold(value: f64) -> Result<f64> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(EtlError::Config(format!(
            "Similarity threshold must be within [0, 1], got {}",
            value
        )))
    }
}

fn apply_settings_file(settings: &mut ResolutionSettings, path: &Path) -> Result<()> {
    let content = fs::read_to_string(path).map_err(|e| {
        EtlError::Config(format!("Failed to read settings file '{}': {}", path.display(), e))
    })?;
    let file: SettingsFile = toml::from_str(&content)?;

    if let Some(threshold) = file.similarity_threshold {
        settings.similarity_threshold = validate_threshold(threshold)?;
    }
    if let Some(cap) = file.article_cap {
        settings.article_cap = Some(cap);
    }
    if let Some(keywords) = file.institution_keywords {
        settings.institution_keywords = keywords.into_iter().map(|k| k.to_lowercase()).collect();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_lookup(lookup_from(&[
            ("INPUT_BUCKET_NAME", "in"),
            ("OUTPUT_BUCKET_NAME", "out"),
        ]))
        .unwrap();

        assert_eq!(config.resolution.article_cap, Some(50));
        assert_eq!(config.resolution.similarity_threshold, 0.9);
        assert_eq!(config.resolution.institution_keywords.len(), 5);
        assert_eq!(config.notify_topic, DEFAULT_NOTIFY_TOPIC);
        assert_eq!(config.source_xml_path(), PathBuf::from("/tmp/pubmed_xml_file.xml"));
        assert!(config.ner_endpoint().is_err());
    }

    #[test]
    fn test_missing_bucket_is_config_error() {
        let err = Config::from_lookup(lookup_from(&[("INPUT_BUCKET_NAME", "in")])).unwrap_err();
        assert!(matches!(err, EtlError::Config(msg) if msg.contains("OUTPUT_BUCKET_NAME")));
    }

    #[test]
    fn test_article_cap_all_and_threshold() {
        let config = Config::from_lookup(lookup_from(&[
            ("INPUT_BUCKET_NAME", "in"),
            ("OUTPUT_BUCKET_NAME", "out"),
            ("ARTICLE_CAP", "all"),
            ("SIMILARITY_THRESHOLD", "0.75"),
        ]))
        .unwrap();
        assert_eq!(config.resolution.article_cap, None);
        assert_eq!(config.resolution.similarity_threshold, 0.75);

        let err = Config::from_lookup(lookup_from(&[
            ("INPUT_BUCKET_NAME", "in"),
            ("OUTPUT_BUCKET_NAME", "out"),
            ("SIMILARITY_THRESHOLD", "1.5"),
        ]))
        .unwrap_err();
        assert!(matches!(err, EtlError::Config(_)));
    }

    #[test]
    fn test_reference_config_needs_no_buckets() {
        let reference = ReferenceConfig::from_lookup(lookup_from(&[
            ("GRID_DATA_DIR", "/data/grid"),
            ("SIMILARITY_THRESHOLD", "0.85"),
        ]))
        .unwrap();
        assert_eq!(reference.institutes_path(), PathBuf::from("/data/grid/institutes.csv"));
        assert_eq!(reference.aliases_path(), PathBuf::from("/data/grid/aliases.csv"));
        assert_eq!(reference.resolution.similarity_threshold, 0.85);

        let config = Config::from_lookup(lookup_from(&[
            ("INPUT_BUCKET_NAME", "in"),
            ("OUTPUT_BUCKET_NAME", "out"),
            ("GRID_DATA_DIR", "/data/grid"),
        ]))
        .unwrap();
        assert_eq!(
            config.reference().institutes_path(),
            PathBuf::from("/data/grid/institutes.csv")
        );
    }

    #[test]
    fn test_output_key_uses_prefix() {
        let config = Config::from_lookup(lookup_from(&[
            ("INPUT_BUCKET_NAME", "in"),
            ("OUTPUT_BUCKET_NAME", "out"),
            ("OUTPUT_BUCKET_PREFIX", "processed/"),
        ]))
        .unwrap();
        assert_eq!(
            config.output_key("2024-01-02_03-04-05"),
            "processed/processed_article_data_2024-01-02_03-04-05.csv"
        );
    }

    #[test]
    fn test_settings_file_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "similarity_threshold = 0.8\narticle_cap = 10\ninstitution_keywords = [\"Institute\"]"
        )
        .unwrap();

        let path = file.path().to_string_lossy().to_string();
        let config = Config::from_lookup(lookup_from(&[
            ("INPUT_BUCKET_NAME", "in"),
            ("OUTPUT_BUCKET_NAME", "out"),
            ("PIPELINE_SETTINGS", path.as_str()),
        ]))
        .unwrap();

        assert_eq!(config.resolution.similarity_threshold, 0.8);
        assert_eq!(config.resolution.article_cap, Some(10));
        assert_eq!(config.resolution.institution_keywords, vec!["institute".to_string()]);
    }
}
