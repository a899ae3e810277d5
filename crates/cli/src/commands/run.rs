//! `opsassist run` — plan, execute, repair, and answer a task.

use opsassist_agent::{Orchestrator, SchemaIssue};
use opsassist_config::AppConfig;
use opsassist_core::plan::ExecutionResult;
use opsassist_core::provider::Provider;
use opsassist_core::usage::{NoopUsageSink, UsageSink};
use opsassist_telemetry::{CostSummary, CostTracker, FreeTierStatus, PricingTable};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

pub async fn run(
    task: Option<String>,
    save_report: bool,
    report_path: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Fail early with setup hints when no key is configured
    if !config.has_api_key() && config.default_provider != "ollama" {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    GOOGLE_API_KEY     = '...'      (Gemini, recommended)");
        eprintln!("    OPENAI_API_KEY     = 'sk-...'   (OpenAI direct)");
        eprintln!("    OPSASSIST_API_KEY  = '...'      (generic)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    println!("=== AI Operations Assistant ===");
    let task = match task {
        Some(task) => task,
        None => prompt_for_task()?,
    };
    if task.trim().is_empty() {
        return Err("Task must not be empty".into());
    }

    let router = opsassist_providers::build_from_config(&config);
    let provider = router.default().ok_or("No default provider configured")?;
    tracing::debug!(
        provider = provider.name(),
        model = %config.default_model,
        "Using LLM provider"
    );

    let cache = opsassist_tools::build_cache(&config);
    let tools = Arc::new(opsassist_tools::default_registry(&config, cache));

    let tracker = Arc::new(CostTracker::with_pricing(PricingTable::from_config(
        &config.telemetry,
    )));
    let usage: Arc<dyn UsageSink> = if config.telemetry.enabled {
        tracker.clone()
    } else {
        Arc::new(NoopUsageSink)
    };

    let orchestrator = Orchestrator::from_config(&config, provider, tools, usage);

    println!("\n[1] Planning...");
    let plan = orchestrator.plan(&task).await?;
    println!("\nPlan:");
    println!("{}", serde_json::to_string_pretty(&plan)?);

    println!("\n[2] Executing...");
    let results = orchestrator.execute(&plan).await;
    println!("\nExecution Results:");
    println!("{}", serde_json::to_string_pretty(&results)?);

    println!("\n[3] Verifying & Formatting...");
    let outcome = orchestrator.repair(&task, results).await;
    if !outcome.repaired.is_empty() {
        let ids: Vec<String> = outcome.repaired.iter().map(|id| id.to_string()).collect();
        println!("  Repaired steps: {}", ids.join(", "));
    }
    print!("{}", render_step_statuses(&outcome.results, &outcome.issues));
    let answer = orchestrator
        .answer(&task, &outcome.results, &outcome.issues)
        .await?;

    println!("\n=== FINAL ANSWER ===\n");
    println!("{answer}");

    if config.telemetry.enabled {
        let summary = tracker.summary();
        print!("{}", render_cost_summary(&summary));
        if let Some(status) = &summary.free_tier_status {
            print!("{}", render_free_tier(status));
        }

        if save_report {
            let path = report_path.unwrap_or_else(|| PathBuf::from(&config.telemetry.report_path));
            tracker.save_report(&path)?;
            println!("\nCost report saved to: {}", path.display());
        }
    }

    Ok(())
}

fn prompt_for_task() -> Result<String, Box<dyn std::error::Error>> {
    print!("\nEnter your task: ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// One status line per step, then the remaining schema issues.
pub(crate) fn render_step_statuses(results: &[ExecutionResult], issues: &[SchemaIssue]) -> String {
    let mut out = String::from("\nStep status:\n");
    for result in results {
        match result.error() {
            None => out.push_str(&format!(
                "  [success] step {} ({}): {}\n",
                result.step_id, result.category, result.action
            )),
            Some(error) => out.push_str(&format!(
                "  [failed]  step {} ({}): {} ({error})\n",
                result.step_id, result.category, result.action
            )),
        }
    }

    if issues.is_empty() {
        out.push_str("Schema issues: None\n");
    } else {
        out.push_str("Schema issues:\n");
        for issue in issues {
            out.push_str(&format!("- {issue}\n"));
        }
    }
    out
}

pub(crate) fn render_cost_summary(summary: &CostSummary) -> String {
    let mut out = String::new();
    out.push_str("\n=== COST SUMMARY ===\n");
    out.push_str(&format!("Total LLM calls: {}\n", summary.total_calls));
    out.push_str(&format!(
        "Total tokens used: {}\n",
        with_thousands(summary.total_tokens)
    ));
    out.push_str(&format!("Total cost: ${:.6}\n", summary.total_cost_usd));

    out.push_str("\nCost by agent:\n");
    for (caller, cost) in &summary.cost_by_caller {
        out.push_str(&format!("  {caller}: ${cost:.6}\n"));
    }

    out.push_str("\nCost by provider:\n");
    for (provider, cost) in &summary.cost_by_provider {
        out.push_str(&format!("  {provider}: ${cost:.6}\n"));
    }
    out
}

pub(crate) fn render_free_tier(status: &FreeTierStatus) -> String {
    let verdict = if status.within_free_tier {
        "WITHIN FREE TIER"
    } else {
        "EXCEEDS FREE TIER"
    };
    format!(
        "\n=== FREE TIER STATUS ===\n\
Provider: {}\n\
Model: {}\n\
Tokens used: {}\n\
Monthly limit: {}\n\
Usage: {:.2}%\n\
Status: {verdict}\n",
        status.provider,
        status.model,
        with_thousands(status.tokens_used),
        with_thousands(status.monthly_limit),
        status.monthly_usage_percent,
    )
}

fn with_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
