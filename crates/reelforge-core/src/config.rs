use serde::{Deserialize, Serialize};

/// Model endpoint settings for the intent router's decision call.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RouterConfig {
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "REELFORGE_ROUTER_API_KEY".to_string(),
        }
    }
}

/// Model endpoint settings for scene source synthesis.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
    /// Sampling temperature for code synthesis.
    pub temperature: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-4o".to_string(),
            api_key_env: "REELFORGE_GENERATOR_API_KEY".to_string(),
            temperature: 0.4,
        }
    }
}

/// Target output format class for generated scenes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FormatConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl FormatConfig {
    /// 9:16 vertical short-form at 30fps (the product default).
    pub fn vertical() -> Self {
        Self {
            width: 1080,
            height: 1920,
            fps: 30,
        }
    }

    /// 16:9 landscape at 30fps.
    pub fn landscape() -> Self {
        Self {
            width: 1920,
            height: 1080,
            fps: 30,
        }
    }

    /// 1:1 square at 30fps.
    pub fn square() -> Self {
        Self {
            width: 1080,
            height: 1080,
            fps: 30,
        }
    }

    /// Short aspect label used in generation constraints, e.g. "9:16".
    pub fn aspect_label(&self) -> String {
        if self.width == self.height {
            "1:1".to_string()
        } else if self.width < self.height {
            "9:16".to_string()
        } else {
            "16:9".to_string()
        }
    }
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self::vertical()
    }
}

/// Bounds on the request pipeline.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Deadline for any single network-backed call, in milliseconds.
    pub call_timeout_ms: u64,
    /// Total generation attempts per request (initial + retries).
    pub max_generation_attempts: u32,
    /// How many recent chat messages the context builder includes.
    pub context_message_window: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: 60_000,
            max_generation_attempts: 2,
            context_message_window: 10,
        }
    }
}

/// Top-level engine configuration, TOML-backed.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ForgeConfig {
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub format: FormatConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
}

impl ForgeConfig {
    pub fn load_from_file(path: &std::path::Path) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: ForgeConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), Box<dyn std::error::Error>> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ForgeConfig::default();
        assert_eq!(config.limits.max_generation_attempts, 2);
        assert_eq!(config.format.width, 1080);
        assert_eq!(config.format.height, 1920);
    }

    #[test]
    fn test_aspect_labels() {
        assert_eq!(FormatConfig::vertical().aspect_label(), "9:16");
        assert_eq!(FormatConfig::landscape().aspect_label(), "16:9");
        assert_eq!(FormatConfig::square().aspect_label(), "1:1");
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = ForgeConfig::default();
        let raw = toml::to_string_pretty(&config).unwrap();
        let back: ForgeConfig = toml::from_str(&raw).unwrap();
        assert_eq!(back.router.model, config.router.model);
        assert_eq!(back.limits.call_timeout_ms, config.limits.call_timeout_ms);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let back: ForgeConfig = toml::from_str("[limits]\ncall_timeout_ms = 5000\n").unwrap();
        assert_eq!(back.limits.call_timeout_ms, 5000);
        assert_eq!(back.generator.temperature, 0.4);
    }
}
