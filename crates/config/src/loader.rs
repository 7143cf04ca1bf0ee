use std::{fmt::Write, path::Path, str::FromStr};

use anyhow::bail;
use indoc::formatdoc;
use serde::Deserialize;
use serde_dynamic_string::DynamicString;
use toml::Value;

use crate::{Config, GuardConfig, RateLimitQuota};

pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let path = path.as_ref().to_path_buf();
    let content = std::fs::read_to_string(&path)?;
    let mut raw_config: Value = toml::from_str(&content)?;

    expand_dynamic_strings(&mut Vec::new(), &mut raw_config)?;

    let config = Config::deserialize(raw_config)?;
    validate_guard(&config.guard)?;

    if config.guard.enabled && config.guard.operations.is_empty() && config.guard.default.is_none() {
        log::warn!("Guard is enabled but no quotas are configured, every admission check will be refused as unknown");
    }

    Ok(config)
}

pub(crate) fn validate_guard(config: &GuardConfig) -> anyhow::Result<()> {
    if config.store_timeout.is_zero() {
        bail!("guard.store_timeout must be greater than zero");
    }

    if let Some(quota) = &config.default {
        validate_quota("guard.default", quota)?;
    }

    for (name, quota) in &config.operations {
        validate_quota(&format!("guard.operations.{name}"), quota)?;
    }

    if let Some(header) = &config.principal_header
        && header.trim().is_empty()
    {
        bail!("guard.principal_header must not be empty");
    }

    Ok(())
}

fn validate_quota(path: &str, quota: &RateLimitQuota) -> anyhow::Result<()> {
    if quota.limit == 0 {
        bail!("{path}.limit must be a positive integer");
    }

    if quota.window.as_secs() == 0 || quota.window.subsec_nanos() != 0 {
        bail!(formatdoc! {r#"
            {path}.window must be a positive whole number of seconds, got {window:?}.

            Example:

              [guard.operations.createDebate]
              limit = 10
              window = "60s"
        "#, window = quota.window});
    }

    Ok(())
}

fn expand_dynamic_strings<'a>(path: &mut Vec<Result<&'a str, usize>>, value: &'a mut Value) -> anyhow::Result<()> {
    match value {
        Value::String(s) => match DynamicString::<String>::from_str(s) {
            Ok(out) => *s = out.into_inner(),
            Err(err) => {
                let mut p = String::new();
                for segment in path {
                    match segment {
                        Ok(s) => {
                            p.push_str(s);
                            p.push('.');
                        }
                        Err(i) => write!(p, "[{i}]")?,
                    }
                }
                if p.ends_with('.') {
                    p.pop();
                }

                bail!("Failed to expand dynamic string at path '{p}': {err}");
            }
        },
        Value::Array(values) => {
            for (i, value) in values.iter_mut().enumerate() {
                path.push(Err(i));
                expand_dynamic_strings(path, value)?;
                path.pop();
            }
        }
        Value::Table(map) => {
            for (key, value) in map {
                path.push(Ok(key.as_str()));
                expand_dynamic_strings(path, value)?;
                path.pop();
            }
        }
        Value::Integer(_) | Value::Float(_) | Value::Boolean(_) | Value::Datetime(_) => (),
    }

    Ok(())
}
