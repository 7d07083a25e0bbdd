//! Show-config command implementation

use anyhow::Result;
use tracing::info;
use trend_signal_engine::strategies::{available_strategies, ut_trend};
use trend_signal_engine::Config;

pub fn run(config_path: String) -> Result<()> {
    let config = Config::from_file(&config_path)?;
    info!("Loaded configuration from: {}", config_path);

    let params = ut_trend::params_from_config(&config)?;

    println!("Symbol:      {}", config.symbol);
    println!("Strategy:    {}", config.strategy_name()?);
    println!("Available:   {}", available_strategies().join(", "));
    println!("Max history: {}", config.session.max_history);
    println!(
        "Execution:   tick {} x {} slippage ticks",
        config.execution.tick_size, config.execution.slippage_ticks
    );
    println!(
        "Journal:     {}",
        if config.journal.enabled {
            format!("{}/{}_trades_*.csv", config.journal.dir, config.journal.prefix)
        } else {
            "disabled".to_string()
        }
    );
    println!("\nStrategy parameters:");
    println!("{}", serde_json::to_string_pretty(&params)?);

    Ok(())
}
