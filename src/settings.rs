use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSettings {
    /// Delay before the first screenshot of a session.
    pub initial_delay_ms: u64,
    /// Recurring screenshot cadence.
    pub interval_ms: u64,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            initial_delay_ms: 30_000,
            interval_ms: 120_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    /// Cadence of the periodic distraction check.
    pub interval_ms: u64,
    /// How many recent screenshots each check sends to the model.
    pub recent_image_limit: usize,
    /// Overrides the built-in end-of-session narrative prompt when set.
    pub summary_prompt: Option<String>,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o-mini".into(),
            interval_ms: 300_000,
            recent_image_limit: 3,
            summary_prompt: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    /// Demo mode disables the periodic auto-analysis timer.
    pub demo_mode: bool,
    pub tasks_enabled: bool,
    pub capture: CaptureSettings,
    pub analysis: AnalysisSettings,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            demo_mode: false,
            tasks_enabled: true,
            capture: CaptureSettings::default(),
            analysis: AnalysisSettings::default(),
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn current(&self) -> UserSettings {
        self.data.read().unwrap().clone()
    }

    pub fn demo_mode(&self) -> bool {
        self.data.read().unwrap().demo_mode
    }

    pub fn capture(&self) -> CaptureSettings {
        self.data.read().unwrap().capture.clone()
    }

    pub fn analysis(&self) -> AnalysisSettings {
        self.data.read().unwrap().analysis.clone()
    }

    pub fn update(&self, settings: UserSettings) -> Result<()> {
        let mut guard = self.data.write().unwrap();
        *guard = settings;
        self.persist(&guard)
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)?;
        let data: UserSettings = serde_json::from_str(&contents)?;
        let mut guard = self.data.write().unwrap();
        *guard = data;
        Ok(())
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
