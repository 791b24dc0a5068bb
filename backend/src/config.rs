use thiserror::Error;

pub const DEFAULT_TABLE: &str = "polls";
pub const DEFAULT_CREATE_POLL_LIMIT: u32 = 5;
pub const DEFAULT_CREATE_POLL_WINDOW_MINUTES: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid table name: {0}")]
    InvalidTableName(String),
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Process-wide settings, read once at startup and passed down explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub table: String,
    pub create_poll_limit: u32,
    pub create_poll_window_minutes: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            table: DEFAULT_TABLE.into(),
            create_poll_limit: DEFAULT_CREATE_POLL_LIMIT,
            create_poll_window_minutes: DEFAULT_CREATE_POLL_WINDOW_MINUTES,
        }
    }
}

impl AppConfig {
    /// Builds the config from a key lookup such as the Shuttle secret store.
    /// Missing keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(table) = lookup("POLLS_TABLE") {
            validate_table_name(&table)?;
            config.table = table;
        }
        if let Some(value) = lookup("CREATE_POLL_LIMIT") {
            config.create_poll_limit = parse_positive("CREATE_POLL_LIMIT", &value)?;
        }
        if let Some(value) = lookup("CREATE_POLL_WINDOW_MINUTES") {
            config.create_poll_window_minutes = parse_positive("CREATE_POLL_WINDOW_MINUTES", &value)?;
        }

        Ok(config)
    }
}

/// Table names are spliced into SQL text, so only plain identifiers pass.
pub fn validate_table_name(name: &str) -> Result<(), ConfigError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_') && name.len() <= 63
        }
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidTableName(name.to_string()))
    }
}

fn parse_positive<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    match value.trim().parse::<T>() {
        Ok(parsed) if parsed > T::default() => Ok(parsed),
        _ => Err(ConfigError::InvalidValue { key, value: value.to_string() }),
    }
}
