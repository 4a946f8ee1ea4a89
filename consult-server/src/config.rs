use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Server configuration loaded from YAML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ServerSettings,
    pub smart: SmartSettings,
    pub google: GoogleSettings,
    pub endpoints: EndpointSettings,
    pub environment: EnvironmentSettings,
    pub http: HttpSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// SMART-on-FHIR client registration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmartSettings {
    pub client_id: String,
    pub client_secret: Option<String>,
    /// FHIR base URL; also the `aud` of the authorization request
    pub api_base: String,
    pub redirect_uri: String,
    pub scope: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleSettings {
    pub maps_api_key: String,
    pub gemini_api_key: String,
    pub gemini_model: String,
}

/// Base URLs of the external services
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointSettings {
    pub geocoding: String,
    pub air_quality: String,
    pub weather: String,
    pub gemini: String,
}

/// Time windows of the environmental series
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentSettings {
    pub history_hours: u32,
    pub forecast_hours: i64,
    pub past_days: u32,
    pub forecast_days: u32,
    pub universal_aqi: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
    /// `text` or `json`
    pub format: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl Default for SmartSettings {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: None,
            api_base: String::new(),
            redirect_uri: "http://localhost:5000/redirect_uri".to_string(),
            scope: "launch patient/*.read openid fhirUser".to_string(),
        }
    }
}

impl Default for GoogleSettings {
    fn default() -> Self {
        Self {
            maps_api_key: String::new(),
            gemini_api_key: String::new(),
            gemini_model: "gemini-1.5-flash".to_string(),
        }
    }
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            geocoding: "https://maps.googleapis.com".to_string(),
            air_quality: "https://airquality.googleapis.com".to_string(),
            weather: "https://api.open-meteo.com".to_string(),
            gemini: "https://generativelanguage.googleapis.com".to_string(),
        }
    }
}

impl Default for EnvironmentSettings {
    fn default() -> Self {
        Self {
            history_hours: 720,
            forecast_hours: 96,
            past_days: 29,
            forecast_days: 5,
            universal_aqi: true,
        }
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self { timeout_secs: 60 }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: ServerConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<&str>) -> Result<Self, Box<dyn std::error::Error>> {
        let mut config = if let Some(path) = config_path {
            Self::load_from_file(path)?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Override settings from environment variables, looked up through `var`
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(port) = var("CONSULT_PORT")
            && let Ok(port_num) = port.parse()
        {
            self.server.port = port_num;
        }

        let overrides: [(&str, &mut String); 10] = [
            ("CONSULT_HOST", &mut self.server.host),
            ("APP_ID", &mut self.smart.client_id),
            ("API_BASE", &mut self.smart.api_base),
            ("REDIRECT_URI", &mut self.smart.redirect_uri),
            ("SCOPE", &mut self.smart.scope),
            ("GOOGLE_MAPS_API_KEY", &mut self.google.maps_api_key),
            ("GOOGLE_GEMINI_API_KEY", &mut self.google.gemini_api_key),
            ("GOOGLE_GEMINI_MODEL", &mut self.google.gemini_model),
            ("LOGGING_LEVEL", &mut self.log.level),
            ("LOGGING_FORMAT", &mut self.log.format),
        ];
        for (key, target) in overrides {
            if let Some(value) = var(key) {
                *target = value;
            }
        }

        if let Some(secret) = var("APP_SECRET").filter(|s| !s.is_empty()) {
            self.smart.client_secret = Some(secret);
        }

        self.log.level = self.log.level.to_lowercase();
    }

    /// Required settings that are still empty
    pub fn missing_settings(&self) -> Vec<&'static str> {
        [
            ("smart.client_id", &self.smart.client_id),
            ("smart.api_base", &self.smart.api_base),
            ("smart.redirect_uri", &self.smart.redirect_uri),
            ("google.maps_api_key", &self.google.maps_api_key),
            ("google.gemini_api_key", &self.google.gemini_api_key),
            ("google.gemini_model", &self.google.gemini_model),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
