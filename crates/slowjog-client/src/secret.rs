//! Secret references in configuration values.
//!
//! `CLIENT_SECRET`, `SESSION_SECRET` and their `config.toml` counterparts
//! may point at a secret instead of holding it:
//!
//! - `pass::path/in/store` runs `pass show path/in/store` and keeps the first line
//! - `env::VAR_NAME` reads `$VAR_NAME`
//! - anything else is used verbatim

/// Expands a possibly-referenced secret value.
pub fn resolve(value: &str) -> Result<String, String> {
    if let Some(path) = value.strip_prefix("pass::") {
        resolve_pass(path)
    } else if let Some(var) = value.strip_prefix("env::") {
        resolve_env(var)
    } else {
        Ok(value.to_string())
    }
}

/// Like [`resolve`], passing `None` through.
pub fn resolve_opt(value: Option<&str>) -> Result<Option<String>, String> {
    value.map(resolve).transpose()
}

fn resolve_pass(path: &str) -> Result<String, String> {
    let output = std::process::Command::new("pass")
        .arg("show")
        .arg(path)
        .output()
        .map_err(|e| format!("failed to run `pass show {}`: {}", path, e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!(
            "`pass show {}` failed ({}): {}",
            path,
            output.status,
            stderr.trim()
        ));
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(str::to_string)
        .ok_or_else(|| format!("`pass show {}` printed nothing", path))
}

fn resolve_env(var: &str) -> Result<String, String> {
    std::env::var(var).map_err(|_| format!("environment variable `{}` is not set", var))
}
