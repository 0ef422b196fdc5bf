//! `coursecraft serve` — Start the HTTP gateway.

use coursecraft_config::AppConfig;

pub async fn run(port_override: Option<u16>, verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    let filter = if verbose {
        "debug".to_string()
    } else {
        config.log_filter.clone()
    };
    crate::init_tracing(&filter);

    println!("🎓 CourseCraft Gateway");
    println!(
        "   Listening:  {}:{}",
        config.gateway.host, config.gateway.port
    );
    println!(
        "   Invoker:    timeout {}s, {} retries",
        config.orchestrator.invoke_timeout_secs, config.orchestrator.max_retries
    );
    println!(
        "   Guardrails: {}",
        config
            .guardrails
            .rules_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "built-in rules".into())
    );

    coursecraft_gateway::start(config).await?;

    Ok(())
}
