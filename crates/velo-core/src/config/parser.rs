//! TOML parser with helpful error messages

use super::schema::VeloConfig;
use anyhow::{Context, Result};
use std::path::Path;

/// Parse velo.toml with detailed error messages
pub fn parse_config_file(path: &Path) -> Result<VeloConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse velo.toml content from string
pub fn parse_config_str(content: &str) -> Result<VeloConfig> {
    let config: VeloConfig =
        toml::from_str(content).map_err(|e| enhance_toml_error(e, content))?;

    config.validate()?;

    Ok(config)
}

/// Enhance TOML parsing errors with the offending lines
fn enhance_toml_error(error: toml::de::Error, content: &str) -> anyhow::Error {
    let error_msg = error.message().to_string();

    let line_hint = error
        .span()
        .map(|span| content[..span.start.min(content.len())].matches('\n').count() + 1);

    match line_hint {
        Some(line_num) => {
            let context = get_line_context(content, line_num);
            anyhow::anyhow!(
                "TOML parsing error at line {}:\n{}\n\nError: {}",
                line_num,
                context,
                error_msg
            )
        }
        None => anyhow::anyhow!("TOML parsing error: {}", error_msg),
    }
}

/// Get context lines around an error
fn get_line_context(content: &str, line_num: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let start = line_num.saturating_sub(2);
    let end = (line_num + 2).min(lines.len());

    lines[start.min(end)..end]
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let num = start + i + 1;
            let marker = if num == line_num { ">>>" } else { "   " };
            format!("{} {:4} | {}", marker, num, line)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Serialize a configuration to TOML string
pub fn to_toml(config: &VeloConfig) -> Result<String> {
    toml::to_string_pretty(config).with_context(|| "Failed to serialize configuration to TOML")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
[server]
url = "https://octopus.example.com/"
api_key = "API-TEST"
"#;

        let config = parse_config_str(toml).unwrap();
        assert_eq!(config.server.url, "https://octopus.example.com/");
        assert_eq!(config.server.request_timeout_secs, 30);
        assert_eq!(config.polling.interval_ms, 1000);
        assert_eq!(config.packages.space_id, "Spaces-1");
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[server]
url = "https://octopus.example.com/"
api_key = "API-TEST"
request_timeout_secs = 5

[polling]
interval_ms = 250
success_states = ["Success"]
in_progress_states = ["Queued", "Executing"]

[packages]
space_id = "Spaces-2"
feed_id = "feeds-custom"
bootstrapper_package_id = "deploy-runner"
bootstrapper_action_name = "run deploy"
catalogue_size = 50
"#;

        let config = parse_config_str(toml).unwrap();
        assert_eq!(config.server.request_timeout_secs, 5);
        assert_eq!(config.polling.interval_ms, 250);
        assert_eq!(config.polling.in_progress_states.len(), 2);
        assert_eq!(config.packages.feed_id, "feeds-custom");
        assert_eq!(config.packages.catalogue_size, 50);
    }

    #[test]
    fn test_parse_missing_server_section() {
        let result = parse_config_str("[polling]\ninterval_ms = 10\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_invalid_toml_reports_line() {
        let toml = "[server\nurl = \"https://octopus/\"\n";
        let err = parse_config_str(toml).unwrap_err().to_string();
        assert!(err.contains("line ") || err.contains("TOML parsing error"));
    }

    #[test]
    fn test_validation_runs_after_parse() {
        let toml = r#"
[server]
url = "https://octopus.example.com/"
api_key = "API-TEST"

[polling]
interval_ms = 0
"#;
        let err = parse_config_str(toml).unwrap_err().to_string();
        assert!(err.contains("interval_ms"));
    }

    #[test]
    fn test_to_toml_roundtrip() {
        let toml = r#"
[server]
url = "https://octopus.example.com/"
api_key = "API-TEST"
"#;
        let original = parse_config_str(toml).unwrap();
        let serialized = to_toml(&original).unwrap();
        let parsed = parse_config_str(&serialized).unwrap();
        assert_eq!(parsed.server.url, original.server.url);
        assert_eq!(parsed.polling.in_progress_states, original.polling.in_progress_states);
    }

    #[test]
    fn test_parse_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[server]
url = "http://localhost:8065/"
api_key = "API-LOCAL"
"#
        )
        .unwrap();

        let config = parse_config_file(temp_file.path()).unwrap();
        assert_eq!(config.server.url, "http://localhost:8065/");
    }

    #[test]
    fn test_parse_nonexistent_file() {
        let result = parse_config_file(Path::new("/nonexistent/path/velo.toml"));
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Failed to read config file"));
    }
}
