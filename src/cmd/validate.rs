//! `gourmet validate`: check a configuration file for errors.
//!
//! Parses and validates the config file, then builds the dispatcher from
//! it so that anything `gourmet run` would reject at startup is reported
//! here too. Results are printed as human-readable text or JSON.

use crate::cli::{ValidateArgs, ValidateFormat};
use crate::config::sources::parse_config_str;
use crate::config::validation;
use crate::dispatch::Dispatcher;
use crate::error::GourmetError;

pub fn execute(args: &ValidateArgs) -> Result<(), GourmetError> {
    let path = &args.config;

    if !path.exists() {
        return Err(GourmetError::ConfigFileNotFound { path: path.clone() });
    }

    let content = std::fs::read_to_string(path)?;

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let config = parse_config_str(ext, &content, &path.display().to_string())?;

    if let Err(errors) = validation::validate(&config) {
        match args.format {
            ValidateFormat::Text => {
                eprintln!("\u{2717} {} has {} errors\n", path.display(), errors.len());
                for error in &errors {
                    eprintln!("{error}");
                }
            }
            ValidateFormat::Json => {
                let json_errors: Vec<serde_json::Value> = errors
                    .iter()
                    .map(|e| {
                        serde_json::json!({
                            "route": e.route,
                            "field": e.field,
                            "message": e.message,
                            "suggestion": e.suggestion,
                        })
                    })
                    .collect();
                println!(
                    "{}",
                    serde_json::json!({
                        "valid": false,
                        "errors": json_errors,
                    })
                );
            }
        }
        return Err(GourmetError::ConfigValidation { errors });
    }

    let dispatcher = Dispatcher::from_config(&config)?;

    match args.format {
        ValidateFormat::Text => {
            println!(
                "\u{2713} {}",
                validation::format_validation_report(&path.display().to_string(), &config)
            );
        }
        ValidateFormat::Json => {
            let routes: Vec<serde_json::Value> = dispatcher
                .router()
                .routes()
                .map(|(pattern, pool)| {
                    serde_json::json!({
                        "pattern": pattern,
                        "servers": pool
                            .servers()
                            .iter()
                            .map(|s| serde_json::json!({ "url": s.url().as_str(), "weight": s.weight() }))
                            .collect::<Vec<_>>(),
                    })
                })
                .collect();
            println!(
                "{}",
                serde_json::json!({
                    "valid": true,
                    "servers": config.total_servers(),
                    "routes": routes,
                })
            );
        }
    }

    Ok(())
}
