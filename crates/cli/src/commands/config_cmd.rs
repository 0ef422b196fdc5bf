//! `coursecraft config` — Configuration management commands.

use coursecraft_config::AppConfig;
use std::path::PathBuf;

fn config_path() -> PathBuf {
    std::env::var("COURSECRAFT_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("coursecraft.toml"))
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn init(force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path();

    if path.exists() && !force {
        println!(
            "⚠️  Config already exists at {}. Use --force to overwrite.",
            path.display()
        );
        return Ok(());
    }

    std::fs::write(&path, AppConfig::default_toml())?;
    println!("✅ Wrote {}", path.display());
    Ok(())
}

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let mut warnings = Vec::new();

            if config.gateway.host == "0.0.0.0" {
                warnings.push("Gateway bound to 0.0.0.0 (publicly reachable)".to_string());
            }

            if let Some(rules_file) = &config.guardrails.rules_file {
                if !rules_file.exists() {
                    warnings.push(format!(
                        "Guardrail rules file {} does not exist; built-ins will apply",
                        rules_file.display()
                    ));
                }
            }

            if config.orchestrator.recall_limit == 0 {
                warnings.push("recall_limit is 0: turns will assemble without memory".into());
            }

            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!(
                "   Gateway:      {}:{}",
                config.gateway.host, config.gateway.port
            );
            println!(
                "   Orchestrator: {}s timeout, {} retries, {} recent turns",
                config.orchestrator.invoke_timeout_secs,
                config.orchestrator.max_retries,
                config.orchestrator.recent_turns
            );
            println!(
                "   Drafting:     {} weeks, {} objectives",
                config.drafting.weeks, config.drafting.objective_count
            );
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}
