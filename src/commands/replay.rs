//! Replay command implementation

use anyhow::Result;
use tracing::{info, warn};
use trend_signal_engine::execution::{Executor, PaperExecutor};
use trend_signal_engine::journal::TradeJournal;
use trend_signal_engine::strategies::ut_trend;
use trend_signal_engine::{data, Config, TradingSession};

pub fn run(config_path: String, data_path: String, status_every: usize) -> Result<()> {
    info!("Starting replay");

    let config = Config::from_file(&config_path)?;
    info!("Loaded configuration from: {}", config_path);

    let params = ut_trend::params_from_config(&config)?;
    let mut session = TradingSession::from_config(&config)?;
    let mut executor = PaperExecutor::from_config(&config.execution);
    let mut journal = if config.journal.enabled {
        let journal = TradeJournal::from_config(&config.journal, &config.symbol, params.vwap_tz()?)?;
        info!(session_id = journal.session_id(), "Trade journal enabled");
        Some(journal)
    } else {
        None
    };

    let bars = data::load_csv(&data_path)?;
    let total = bars.len();
    let mut rejected = 0usize;
    let mut fills = 0usize;

    for (i, bar) in bars.into_iter().enumerate() {
        let outcome = match session.on_bar(bar) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(row = i + 1, error = %e, "Skipping bar");
                rejected += 1;
                continue;
            }
        };

        if let Some(fill) = executor.execute(&outcome.signal) {
            let realized_before = session.realized().realized_pnl;
            if session.apply_fill(&fill) {
                fills += 1;
                let pnl = session.realized().realized_pnl - realized_before;
                if let Some(journal) = journal.as_mut() {
                    if let Err(e) = journal.record(&fill, pnl, session.position_summary().status) {
                        warn!(error = %e, "Failed to journal fill");
                    }
                }
            }
        }

        if status_every > 0 && (i + 1) % status_every == 0 {
            info!(bar = i + 1, status = %serde_json::to_string(&session.status())?, "Status");
        }
    }

    let status = session.status();
    println!("\n{}", "=".repeat(60));
    println!("REPLAY SUMMARY: {}", status.symbol);
    println!("{}", "=".repeat(60));
    println!("  Bars processed:   {}", total - rejected);
    println!("  Bars rejected:    {}", rejected);
    println!("  Signals:          {}", status.signal_count);
    println!("  Fills applied:    {}", fills);
    println!("  Closed trades:    {}", status.realized.closed_trades);
    println!("  Win rate:         {:.1}%", status.realized.win_rate() * 100.0);
    println!("  Realized P&L:     {:.2}", status.realized.realized_pnl);
    println!("  Position:         {:?}", status.position.status);
    println!("  Market:           {}", status.conditions);
    println!("{}", "-".repeat(60));

    Ok(())
}
