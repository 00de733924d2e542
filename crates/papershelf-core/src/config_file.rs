use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub lookup: Option<LookupSection>,
    pub extraction: Option<ExtractionSection>,
    pub keywords: Option<KeywordsSection>,
    pub cache: Option<CacheSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LookupSection {
    pub crossref_mailto: Option<String>,
    pub idconv_tool: Option<String>,
    pub idconv_email: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionSection {
    /// Page limit for text extraction; unset means all pages.
    pub max_pages: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeywordsSection {
    /// Marker substrings overriding the built-in keyword markers.
    pub markers: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheSection {
    /// Path to the tabular bibliography cache database.
    pub db_path: Option<String>,
}

/// Platform config directory path: `<config_dir>/papershelf/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("papershelf").join("config.toml"))
}

/// Load config by cascading CWD `.papershelf.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(&PathBuf::from(".papershelf.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &PathBuf) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    toml::from_str(&content).ok()
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    ConfigFile {
        lookup: Some(LookupSection {
            crossref_mailto: overlay
                .lookup
                .as_ref()
                .and_then(|l| l.crossref_mailto.clone())
                .or_else(|| base.lookup.as_ref().and_then(|l| l.crossref_mailto.clone())),
            idconv_tool: overlay
                .lookup
                .as_ref()
                .and_then(|l| l.idconv_tool.clone())
                .or_else(|| base.lookup.as_ref().and_then(|l| l.idconv_tool.clone())),
            idconv_email: overlay
                .lookup
                .as_ref()
                .and_then(|l| l.idconv_email.clone())
                .or_else(|| base.lookup.as_ref().and_then(|l| l.idconv_email.clone())),
            timeout_secs: overlay
                .lookup
                .as_ref()
                .and_then(|l| l.timeout_secs)
                .or_else(|| base.lookup.as_ref().and_then(|l| l.timeout_secs)),
        }),
        extraction: Some(ExtractionSection {
            max_pages: overlay
                .extraction
                .as_ref()
                .and_then(|e| e.max_pages)
                .or_else(|| base.extraction.as_ref().and_then(|e| e.max_pages)),
        }),
        keywords: Some(KeywordsSection {
            markers: overlay
                .keywords
                .as_ref()
                .and_then(|k| k.markers.clone())
                .or_else(|| base.keywords.as_ref().and_then(|k| k.markers.clone())),
        }),
        cache: Some(CacheSection {
            db_path: overlay
                .cache
                .as_ref()
                .and_then(|c| c.db_path.clone())
                .or_else(|| base.cache.as_ref().and_then(|c| c.db_path.clone())),
        }),
    }
}

/// Save the current config to the platform config directory.
pub fn save_config(config: &ConfigFile) -> Result<PathBuf, String> {
    let path = config_path().ok_or_else(|| "Could not determine config directory".to_string())?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let content =
        toml::to_string_pretty(config).map_err(|e| format!("Failed to serialize config: {}", e))?;
    std::fs::write(&path, content).map_err(|e| format!("Failed to write config: {}", e))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_toml() {
        let config = ConfigFile {
            lookup: Some(LookupSection {
                crossref_mailto: Some("curator@example.org".to_string()),
                ..Default::default()
            }),
            extraction: Some(ExtractionSection {
                max_pages: Some(2),
            }),
            ..Default::default()
        };
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: ConfigFile = toml::from_str(&toml_str).unwrap();
        assert_eq!(
            parsed.lookup.unwrap().crossref_mailto.unwrap(),
            "curator@example.org"
        );
        assert_eq!(parsed.extraction.unwrap().max_pages.unwrap(), 2);
    }

    #[test]
    fn test_absent_section_deserializes_as_none() {
        let toml_str = "[lookup]\ncrossref_mailto = \"a@b.c\"\n";
        let parsed: ConfigFile = toml::from_str(toml_str).unwrap();
        assert!(parsed.cache.is_none());
        assert!(parsed.keywords.is_none());
    }

    #[test]
    fn test_merge_overlay_wins() {
        let base = ConfigFile {
            extraction: Some(ExtractionSection {
                max_pages: Some(1),
            }),
            ..Default::default()
        };
        let overlay = ConfigFile {
            extraction: Some(ExtractionSection {
                max_pages: Some(5),
            }),
            ..Default::default()
        };
        let merged = merge(base, overlay);
        assert_eq!(merged.extraction.unwrap().max_pages.unwrap(), 5);
    }

    #[test]
    fn test_merge_base_preserved_when_overlay_absent() {
        let base = ConfigFile {
            lookup: Some(LookupSection {
                idconv_email: Some("a@b.c".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let merged = merge(base, ConfigFile::default());
        assert_eq!(merged.lookup.unwrap().idconv_email.unwrap(), "a@b.c");
    }

    #[test]
    fn test_custom_markers_parse() {
        let toml_str = "[keywords]\nmarkers = [\"index terms\", \"keywords\"]\n";
        let parsed: ConfigFile = toml::from_str(toml_str).unwrap();
        assert_eq!(
            parsed.keywords.unwrap().markers.unwrap(),
            vec!["index terms", "keywords"]
        );
    }
}
