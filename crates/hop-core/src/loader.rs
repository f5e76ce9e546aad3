//! Rule file loader.
//!
//! Rule files are plain text, one rule per line:
//!
//! ```text
//! # comment
//! ssh   10.0.0.5:22
//! db    {{ .DB_HOST }}:5432
//! ```
//!
//! Before parsing, the concatenated file contents are expanded as a
//! template: every `{{ .NAME }}` placeholder is replaced with the value
//! of environment variable `NAME`. Any failure here is fatal to startup.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::info;

use crate::error::{ConfigError, ConfigResult};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*\.([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("placeholder regex")
});

/// Read, expand and parse rule files into `(service, target)` pairs.
///
/// Pairs come back in file order; later duplicates win once they are
/// fed into a `RuleTable`.
pub fn load_rule_files(
    paths: &[PathBuf],
    env: &HashMap<String, String>,
) -> ConfigResult<Vec<(String, String)>> {
    if paths.is_empty() {
        return Err(ConfigError::NoRuleFiles);
    }

    let source = read_sources(paths)?;
    let expanded = expand_template(&source, env)?;
    let rules = parse_rules(&expanded)?;

    for (service, target) in &rules {
        info!(service = %service, target = %target, "added service");
    }

    Ok(rules)
}

/// Current process environment as a map, for `expand_template`.
///
/// Variables whose name or value is not valid UTF-8 are skipped.
pub fn process_env() -> HashMap<String, String> {
    std::env::vars_os()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
        .collect()
}

fn read_sources(paths: &[PathBuf]) -> ConfigResult<String> {
    let mut source = String::new();
    for path in paths {
        let content = read_file(path)?;
        source.push_str(&content);
        if !content.ends_with('\n') {
            source.push('\n');
        }
    }
    Ok(source)
}

fn read_file(path: &Path) -> ConfigResult<String> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Replace `{{ .NAME }}` placeholders with values from `env`.
///
/// Unset variables and any `{{` left over after substitution (an
/// unterminated or unsupported action) are errors.
pub fn expand_template(source: &str, env: &HashMap<String, String>) -> ConfigResult<String> {
    let mut out = String::with_capacity(source.len());
    let mut last = 0;

    for caps in PLACEHOLDER.captures_iter(source) {
        let whole = caps.get(0).expect("capture 0 always present");
        let name = &caps[1];
        let value = env
            .get(name)
            .ok_or_else(|| ConfigError::Template(format!("variable {name} is not set")))?;

        let literal = &source[last..whole.start()];
        check_literal(literal)?;
        out.push_str(literal);
        out.push_str(value);
        last = whole.end();
    }

    let tail = &source[last..];
    check_literal(tail)?;
    out.push_str(tail);

    Ok(out)
}

fn check_literal(text: &str) -> ConfigResult<()> {
    match text.find("{{") {
        Some(pos) => {
            let snippet: String = text[pos..].chars().take(32).collect();
            Err(ConfigError::Template(format!(
                "unsupported or unterminated action near {snippet:?}"
            )))
        }
        None => Ok(()),
    }
}

/// Parse expanded rule text.
///
/// Blank lines and `#` comments are skipped. Every other line must hold
/// a service name and a target separated by whitespace.
pub fn parse_rules(text: &str) -> ConfigResult<Vec<(String, String)>> {
    let mut rules = Vec::new();

    for (n, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((service, target)) = line.split_once(char::is_whitespace) else {
            return Err(ConfigError::BadLine {
                line: n + 1,
                content: line.to_string(),
            });
        };

        rules.push((service.trim().to_string(), target.trim().to_string()));
    }

    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parses_rules_skipping_comments_and_blanks() {
        let text = "\
# backends
ssh 10.0.0.5:22

   rdp    10.0.0.9:3389
\t# indented comment
";
        let rules = parse_rules(text).unwrap();
        assert_eq!(
            rules,
            vec![
                ("ssh".to_string(), "10.0.0.5:22".to_string()),
                ("rdp".to_string(), "10.0.0.9:3389".to_string()),
            ]
        );
    }

    #[test]
    fn tab_separator_is_accepted() {
        let rules = parse_rules("ssh\t10.0.0.5:22").unwrap();
        assert_eq!(rules[0].1, "10.0.0.5:22");
    }

    #[test]
    fn line_without_separator_is_fatal() {
        let err = parse_rules("ssh 10.0.0.5:22\nbroken\n").unwrap_err();
        match err {
            ConfigError::BadLine { line, content } => {
                assert_eq!(line, 2);
                assert_eq!(content, "broken");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn expands_environment_placeholders() {
        let vars = env(&[("DB_HOST", "10.1.1.1"), ("SSH_PORT", "2222")]);
        let out =
            expand_template("db {{ .DB_HOST }}:5432\nssh host:{{.SSH_PORT}}\n", &vars).unwrap();
        assert_eq!(out, "db 10.1.1.1:5432\nssh host:2222\n");
    }

    #[test]
    fn unset_variable_is_template_error() {
        let err = expand_template("db {{ .MISSING }}:5432", &env(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Template(msg) if msg.contains("MISSING")));
    }

    #[test]
    fn unterminated_action_is_template_error() {
        let err = expand_template("db {{ .DB_HOST :5432", &env(&[("DB_HOST", "x")])).unwrap_err();
        assert!(matches!(err, ConfigError::Template(_)));
    }

    #[test]
    fn text_without_placeholders_passes_through() {
        let text = "ssh 10.0.0.5:22\n";
        assert_eq!(expand_template(text, &env(&[])).unwrap(), text);
    }

    #[test]
    fn loads_and_concatenates_files() {
        let mut first = tempfile::NamedTempFile::new().unwrap();
        write!(first, "ssh {{{{ .SSH_TARGET }}}}").unwrap();
        let mut second = tempfile::NamedTempFile::new().unwrap();
        writeln!(second, "# second file\nssh 10.0.0.6:22\nrdp 10.0.0.9:3389").unwrap();

        let paths = vec![first.path().to_path_buf(), second.path().to_path_buf()];
        let rules = load_rule_files(&paths, &env(&[("SSH_TARGET", "10.0.0.5:22")])).unwrap();

        assert_eq!(
            rules,
            vec![
                ("ssh".to_string(), "10.0.0.5:22".to_string()),
                ("ssh".to_string(), "10.0.0.6:22".to_string()),
                ("rdp".to_string(), "10.0.0.9:3389".to_string()),
            ]
        );
    }

    #[test]
    fn missing_file_is_read_error() {
        let paths = vec![PathBuf::from("/nonexistent/hopgate/rules.conf")];
        let err = load_rule_files(&paths, &env(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn process_env_skips_non_utf8_variables() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        // SAFETY: these names are only touched by this test.
        unsafe {
            std::env::set_var("HOPGATE_LOADER_BAD_UTF8", OsStr::from_bytes(b"\xff\xfe"));
            std::env::set_var("HOPGATE_LOADER_GOOD", "10.0.0.5");
        }

        let vars = process_env();

        assert!(!vars.contains_key("HOPGATE_LOADER_BAD_UTF8"));
        assert_eq!(vars.get("HOPGATE_LOADER_GOOD").map(String::as_str), Some("10.0.0.5"));
    }

    #[test]
    fn no_files_is_an_error() {
        let err = load_rule_files(&[], &env(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::NoRuleFiles));
    }
}
