// src/config/validate.rs

use toml::{Table, Value};

use crate::config::model::{BuildOptions, CompilerView, KNOWN_OPTION_KEYS};
use crate::errors::ConfigError;

/// Schema validation for one source document.
///
/// This checks:
/// - every orchestrator option key is known
/// - every option has the expected type
/// - `debounce-ms` is at least 1
/// - extension lists do not carry a leading dot
/// - the compiler keys the orchestrator reads have the expected type
///
/// Unknown compiler keys are accepted; they belong to the compiler.
pub fn validate_document(
    origin: &str,
    options: &Table,
    compiler: Option<&Table>,
) -> Result<(), ConfigError> {
    validate_known_keys(origin, options)?;
    let typed = BuildOptions::from_table(options, origin).map_err(|e| schema(origin, e))?;
    validate_option_values(origin, &typed)?;
    if let Some(compiler) = compiler {
        validate_compiler(origin, compiler)?;
    }
    Ok(())
}

fn validate_known_keys(origin: &str, options: &Table) -> Result<(), ConfigError> {
    for key in options.keys() {
        if !KNOWN_OPTION_KEYS.contains(&key.as_str()) {
            return Err(ConfigError::Schema {
                origin: origin.to_string(),
                message: format!("unknown option '{key}'"),
            });
        }
    }
    Ok(())
}

fn validate_option_values(origin: &str, opts: &BuildOptions) -> Result<(), ConfigError> {
    if opts.debounce_ms == Some(0) {
        return Err(ConfigError::Schema {
            origin: origin.to_string(),
            message: "debounce-ms must be >= 1 (got 0)".to_string(),
        });
    }

    let lists = [
        ("compiled-extensions", &opts.compiled_extensions),
        ("support-extensions", &opts.support_extensions),
    ];
    for (key, list) in lists {
        if let Some(exts) = list {
            if let Some(bad) = exts.iter().find(|e| e.starts_with('.') || e.is_empty()) {
                return Err(ConfigError::Schema {
                    origin: origin.to_string(),
                    message: format!("{key}: invalid extension '{bad}' (write it without a dot)"),
                });
            }
        }
    }

    if let Some(ext) = &opts.artifact_extension {
        if ext.starts_with('.') || ext.is_empty() {
            return Err(ConfigError::Schema {
                origin: origin.to_string(),
                message: format!("artifact-extension: invalid extension '{ext}'"),
            });
        }
    }

    Ok(())
}

fn validate_compiler(origin: &str, compiler: &Table) -> Result<(), ConfigError> {
    CompilerView::from_table(compiler, origin).map_err(|e| schema(origin, e))?;

    if let Some(Value::String(main)) = compiler.get("main") {
        if main.trim().is_empty() {
            return Err(ConfigError::Schema {
                origin: origin.to_string(),
                message: "compiler main must not be empty".to_string(),
            });
        }
    }
    Ok(())
}

fn schema(origin: &str, err: ConfigError) -> ConfigError {
    match err {
        ConfigError::Invalid(message) => ConfigError::Schema {
            origin: origin.to_string(),
            message,
        },
        other => other,
    }
}
