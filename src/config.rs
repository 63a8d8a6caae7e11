use std::collections::HashMap;
use std::fs;

use chrono_tz::Tz;

pub const DEFAULT_LEAD_MINUTES: i64 = 30;
pub const DEFAULT_TEMPERATURE: f32 = 20.0;
pub const DEFAULT_TIMEZONE: &str = "Europe/London";

#[derive(Debug, Default, Clone)]
pub struct AppConfig {
    values: HashMap<String, String>,
}

impl AppConfig {
    pub fn from_file(path: &str) -> Result<Self, String> {
        let content = fs::read_to_string(path).map_err(|e| e.to_string())?;
        Self::parse_str(&content)
    }

    pub fn parse_str(content: &str) -> Result<Self, String> {
        let mut values = HashMap::new();
        for (idx, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(format!("Invalid config line {}: {}", idx + 1, line));
            };
            let key = key.trim();
            let mut value = value.trim().to_string();
            if (value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\''))
            {
                value = value[1..value.len() - 1].to_string();
            }
            values.insert(key.to_string(), value);
        }
        Ok(Self { values })
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Settings the daemon needs, resolved once at startup. Nothing is re-read
/// after the loop starts.
#[derive(Debug, Clone)]
pub struct WarmerSettings {
    pub calendar_id: String,
    pub google_client_id: String,
    pub google_client_secret: String,
    pub tesla_email: String,
    pub tesla_password: String,
    pub lead_minutes: i64,
    pub temperature: f32,
    pub timezone: Tz,
}

impl WarmerSettings {
    pub fn load<F>(get_prop: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |key: &str| get_prop(key).ok_or_else(|| format!("{} must be set", key));

        let lead_minutes = match get_prop("MINS_BEFORE") {
            Some(raw) => raw
                .parse::<i64>()
                .map_err(|_| format!("Invalid MINS_BEFORE: {}", raw))?,
            None => DEFAULT_LEAD_MINUTES,
        };
        if lead_minutes < 0 {
            return Err(format!("MINS_BEFORE must not be negative: {}", lead_minutes));
        }

        let temperature = match get_prop("TEMPERATURE") {
            Some(raw) => raw
                .parse::<f32>()
                .map_err(|_| format!("Invalid TEMPERATURE: {}", raw))?,
            None => DEFAULT_TEMPERATURE,
        };

        let timezone_raw = get_prop("TIMEZONE").unwrap_or(DEFAULT_TIMEZONE.to_string());
        let timezone: Tz = timezone_raw
            .parse()
            .map_err(|_| format!("Invalid TIMEZONE: {}", timezone_raw))?;

        Ok(Self {
            calendar_id: require("CALENDAR_ID")?,
            google_client_id: require("GOOGLE_CLIENT_ID")?,
            google_client_secret: require("GOOGLE_CLIENT_SECRET")?,
            tesla_email: require("TESLA_EMAIL")?,
            tesla_password: require("TESLA_PASSWORD")?,
            lead_minutes,
            temperature,
            timezone,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_config(extra: &str) -> AppConfig {
        let content = format!(
            "CALENDAR_ID=primary\n\
             GOOGLE_CLIENT_ID=id\n\
             GOOGLE_CLIENT_SECRET=secret\n\
             TESLA_EMAIL=me@example.com\n\
             TESLA_PASSWORD=hunter2\n\
             {}",
            extra
        );
        AppConfig::parse_str(&content).expect("config should parse")
    }

    #[test]
    fn parses_quotes_comments_and_exports() {
        let config = AppConfig::parse_str(
            "# comment\n\
             \n\
             export CALENDAR_ID=\"family@group.calendar.google.com\"\n\
             TEMPERATURE='21.5'\n",
        )
        .unwrap();
        assert_eq!(
            config.get("CALENDAR_ID").as_deref(),
            Some("family@group.calendar.google.com")
        );
        assert_eq!(config.get("TEMPERATURE").as_deref(), Some("21.5"));
    }

    #[test]
    fn rejects_lines_without_equals() {
        let err = AppConfig::parse_str("CALENDAR_ID\n").unwrap_err();
        assert!(err.contains("line 1"));
    }

    #[test]
    fn settings_use_defaults_when_optional_keys_missing() {
        let config = full_config("");
        let settings = WarmerSettings::load(|key| config.get(key)).unwrap();
        assert_eq!(settings.lead_minutes, DEFAULT_LEAD_MINUTES);
        assert_eq!(settings.temperature, DEFAULT_TEMPERATURE);
        assert_eq!(settings.timezone, chrono_tz::Europe::London);
    }

    #[test]
    fn settings_parse_overrides() {
        let config = full_config("MINS_BEFORE=45\nTEMPERATURE=19.5\nTIMEZONE=America/New_York\n");
        let settings = WarmerSettings::load(|key| config.get(key)).unwrap();
        assert_eq!(settings.lead_minutes, 45);
        assert_eq!(settings.temperature, 19.5);
        assert_eq!(settings.timezone, chrono_tz::America::New_York);
    }

    #[test]
    fn settings_reject_bad_values() {
        let config = full_config("MINS_BEFORE=soon\n");
        assert!(WarmerSettings::load(|key| config.get(key)).is_err());

        let config = full_config("MINS_BEFORE=-5\n");
        assert!(WarmerSettings::load(|key| config.get(key)).is_err());

        let config = full_config("TIMEZONE=Mars/Olympus_Mons\n");
        assert!(WarmerSettings::load(|key| config.get(key)).is_err());
    }

    #[test]
    fn settings_require_credentials() {
        let config = AppConfig::parse_str("CALENDAR_ID=primary\n").unwrap();
        let err = WarmerSettings::load(|key| config.get(key)).unwrap_err();
        assert!(err.contains("GOOGLE_CLIENT_ID"));
    }
}
