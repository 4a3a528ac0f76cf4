use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::CliError;

/// Environment variable manager that loads from system and .env files.
/// Used to resolve overrides such as `TMPDIR` before the pipeline opens
/// its staging files; actual credential storage is out of scope here —
/// this only reads whatever the process environment or `.env` already
/// hands it.
#[derive(Debug, Clone)]
pub struct EnvManager {
    vars: HashMap<String, String>,
    _sensitive_patterns: Vec<String>,
}

impl EnvManager {
    pub fn new() -> Self {
        let mut vars = HashMap::new();

        for (key, value) in std::env::vars() {
            vars.insert(key, value);
        }

        Self {
            vars,
            _sensitive_patterns: Self::default_sensitive_patterns(),
        }
    }

    /// Load variables from a .env file, overriding anything already set.
    pub fn load_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), CliError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            CliError::Config(format!("Failed to read env file {}: {}", path.display(), e))
        })?;

        self.parse_env_content(&content)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn all(&self) -> &HashMap<String, String> {
        &self.vars
    }

    fn parse_env_content(&mut self, content: &str) -> Result<(), CliError> {
        for (line_num, line) in content.lines().enumerate() {
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(eq_pos) = line.find('=') {
                let key = line[..eq_pos].trim();
                let value = line[eq_pos + 1..].trim();

                if key.is_empty() {
                    return Err(CliError::Config(format!(
                        "Invalid env file: empty key at line {}",
                        line_num + 1
                    )));
                }

                let value = Self::unquote_value(value);
                self.vars.insert(key.to_string(), value);
            } else {
                return Err(CliError::Config(format!(
                    "Invalid env file: malformed line {} (expected KEY=VALUE)",
                    line_num + 1
                )));
            }
        }

        Ok(())
    }

    fn unquote_value(value: &str) -> String {
        let value = value.trim();

        if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
            return value[1..value.len() - 1].to_string();
        }

        if value.starts_with('\'') && value.ends_with('\'') && value.len() >= 2 {
            return value[1..value.len() - 1].to_string();
        }

        value.to_string()
    }

    fn default_sensitive_patterns() -> Vec<String> {
        vec![
            "password".to_string(),
            "passwd".to_string(),
            "secret".to_string(),
            "token".to_string(),
            "key".to_string(),
            "api_key".to_string(),
            "apikey".to_string(),
            "auth".to_string(),
            "credential".to_string(),
            "private".to_string(),
        ]
    }
}

impl Default for EnvManager {
    fn default() -> Self {
        Self::new()
    }
}
