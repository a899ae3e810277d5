//! `opsassist pricing` — list model pricing.

use opsassist_config::AppConfig;
use opsassist_telemetry::PricingTable;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    let table = PricingTable::from_config(&config.telemetry);
    print!("{}", render(&table));
    Ok(())
}

fn render(table: &PricingTable) -> String {
    let mut out = String::new();
    out.push_str("Model Pricing (USD per 1M tokens)\n");
    out.push_str(&format!(
        "{:<40} {:>10} {:>10} {:>10} {:>14}\n",
        "Model", "Provider", "Input", "Output", "Free tier"
    ));

    let entries = table.entries();
    for (name, pricing) in &entries {
        let free = if pricing.free_tier {
            format!("{}/mo", pricing.monthly_limit)
        } else {
            "-".to_string()
        };
        out.push_str(&format!(
            "{:<40} {:>10} {:>10.3} {:>10.3} {:>14}\n",
            name,
            table.detect_provider(name),
            pricing.input_per_m,
            pricing.output_per_m,
            free
        ));
    }

    out.push_str(&format!("\n  {} models with pricing data\n", entries.len()));
    out
}
