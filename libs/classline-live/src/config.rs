/// Live-class coordinator configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Token service origin (e.g. `https://api.classline.example`). Issues
    /// per-channel signaling/media credentials.
    pub token_service_url: String,
    /// Class service origin. Receives class status transitions.
    pub class_service_url: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Panics with a descriptive message if a required variable is missing.
    pub fn from_env() -> Self {
        Self {
            token_service_url: required_var("TOKEN_SERVICE_URL"),
            class_service_url: required_var("CLASS_SERVICE_URL"),
        }
    }

    /// Build a config directly. Used by embedding apps and tests that do
    /// not go through the environment.
    pub fn new(token_service_url: impl Into<String>, class_service_url: impl Into<String>) -> Self {
        Self {
            token_service_url: token_service_url.into(),
            class_service_url: class_service_url.into(),
        }
    }
}

fn required_var(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| panic!("{name} env var is required"))
}
