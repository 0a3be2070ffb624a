// src/config.rs - Runtime settings for the authentication engine
use std::env;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Default KEY=VALUE configuration file looked up in the working directory
const DEFAULT_CONFIG_FILE: &str = "smartsecure.conf";

/// Engine configuration
#[derive(Clone, Debug)]
pub struct Settings {
    pub log_level: String,
    /// Path of the typing classifier artifact
    pub model_path: PathBuf,
    /// Passphrase required to register an admin account
    pub admin_passphrase: String,
    /// Default enrollment and login target phrase
    pub target_phrase: String,
    /// Validity window for one-time codes, in seconds
    pub otp_window_secs: u64,
    /// Capture rounds required at registration
    pub enroll_samples: u32,
    /// Capture rounds required at login
    pub login_samples: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            log_level: "info".to_string(),
            model_path: PathBuf::from("typing_model.json"),
            admin_passphrase: "admin123".to_string(),
            target_phrase: "thequickbrownfox".to_string(),
            otp_window_secs: 300,
            enroll_samples: 5,
            login_samples: 3,
        }
    }
}

/// Load configuration: defaults, then an optional config file, then
/// environment-variable overrides
pub fn load_config(path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();

    match path {
        Some(path) => load_from_file(&mut settings, path)?,
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_FILE);
            if default_path.exists() {
                load_from_file(&mut settings, default_path)?;
            }
        }
    }

    load_from_env(&mut settings);
    Ok(settings)
}

fn load_from_env(settings: &mut Settings) {
    if let Ok(level) = env::var("LOG_LEVEL") {
        settings.log_level = level;
    }

    if let Ok(path) = env::var("MODEL_PATH") {
        settings.model_path = PathBuf::from(path);
    }

    if let Ok(passphrase) = env::var("ADMIN_PASSPHRASE") {
        settings.admin_passphrase = passphrase;
    }

    if let Ok(phrase) = env::var("TARGET_PHRASE") {
        settings.target_phrase = phrase;
    }

    if let Ok(secs) = env::var("OTP_WINDOW_SECS") {
        if let Ok(secs) = secs.parse() {
            settings.otp_window_secs = secs;
        }
    }

    if let Ok(samples) = env::var("ENROLL_SAMPLES") {
        if let Ok(samples) = samples.parse() {
            settings.enroll_samples = samples;
        }
    }

    if let Ok(samples) = env::var("LOGIN_SAMPLES") {
        if let Ok(samples) = samples.parse() {
            settings.login_samples = samples;
        }
    }
}

/// Load configuration from a file
fn load_from_file(settings: &mut Settings, path: &Path) -> Result<()> {
    let file = File::open(path).context("Failed to open configuration file")?;
    let reader = BufReader::new(file);

    for line in reader.lines() {
        let line = line.context("Failed to read line from configuration file")?;
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(index) = line.find('=') {
            let key = line[..index].trim();
            let value = line[index + 1..].trim();

            match key {
                "LOG_LEVEL" => settings.log_level = value.to_string(),
                "MODEL_PATH" => settings.model_path = PathBuf::from(value),
                "ADMIN_PASSPHRASE" => settings.admin_passphrase = value.to_string(),
                "TARGET_PHRASE" => settings.target_phrase = value.to_string(),
                "OTP_WINDOW_SECS" => {
                    if let Ok(secs) = value.parse() {
                        settings.otp_window_secs = secs;
                    }
                }
                "ENROLL_SAMPLES" => {
                    if let Ok(samples) = value.parse() {
                        settings.enroll_samples = samples;
                    }
                }
                "LOGIN_SAMPLES" => {
                    if let Ok(samples) = value.parse() {
                        settings.login_samples = samples;
                    }
                }
                _ => {}
            }
        }
    }

    Ok(())
}
