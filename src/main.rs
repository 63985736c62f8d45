use anyhow::{bail, Context, Result};
use time::format_description::well_known::Rfc3339;
use tracing::warn;
use tracing_subscriber::{fmt, EnvFilter};

use risk_journal::config::Config;
use risk_journal::storage::select_platform;
use risk_journal::trading::{
    read_import_file, write_export_file, PersistenceCoordinator, StartupOutcome,
};

const USAGE: &str = "usage: risk-journal <command> [args]

commands:
  status                                  risk status and statistics (default)
  add <amount>                            record a trade result
  configure <balance> <max-dd> <pct> [dynamic]
  max-dd <amount>                         change the drawdown ceiling
  loss-pct <percent>                      change the per-trade share
  dynamic on|off                          trailing ceiling on profits
  trades [n]                              list trades (n most recent)
  series                                  drawdown floor per trade
  clear                                   delete all trades
  reset                                   wipe settings, trades and backups
  recover | recover-merged                restore from backup tiers
  diagnose                                storage and backup tier report
  export <path> | import <path>";

fn arg<'a>(args: &'a [String], idx: usize, name: &str) -> Result<&'a str> {
    args.get(idx)
        .map(String::as_str)
        .with_context(|| format!("missing <{}>\n\n{}", name, USAGE))
}

fn num(args: &[String], idx: usize, name: &str) -> Result<f64> {
    let raw = arg(args, idx, name)?;
    raw.parse()
        .with_context(|| format!("<{}> must be a number, got '{}'", name, raw))
}

fn print_status(journal: &PersistenceCoordinator) {
    let s = journal.risk_status();
    let stats = journal.statistics();

    println!("┌─ Risk ─────────────────────────────────────────");
    println!("│ Account balance:   ${:.2}", s.account_balance);
    println!("│ Current balance:   ${:.2}", s.current_balance);
    println!(
        "│ Max drawdown:      ${:.2}{}",
        s.effective_max_drawdown,
        if s.is_dynamic { " (dynamic)" } else { "" }
    );
    println!(
        "│ Drawdown:          ${:.2} ({:.1}% used, {})",
        s.current_drawdown, s.drawdown_used_pct, s.level
    );
    println!("│ Remaining:         ${:.2}", s.remaining_capacity);
    println!("│ Max loss/trade:    ${:.2}", s.max_loss_per_trade);
    println!("├─ Trades ───────────────────────────────────────");
    println!(
        "│ {} total, {} wins, {} losses ({:.1}% win rate)",
        stats.total_trades, stats.winning_trades, stats.losing_trades, stats.win_rate
    );
    println!(
        "│ P&L ${:.2}  best ${:.2}  worst ${:.2}  PF {:.2}",
        stats.total_pnl, stats.best_trade, stats.worst_trade, stats.profit_factor
    );
    println!("└────────────────────────────────────────────────");

    if let Some(err) = journal.last_error() {
        println!("! {}", err);
    }
    if journal.has_unsaved_changes() {
        println!("! settings on disk may not match the last change");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.log_level.to_lowercase()));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(fmt::time::UtcTime::new(Rfc3339))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("status");

    let platform = select_platform(&cfg);
    let (mut journal, outcome) = PersistenceCoordinator::start(platform, &cfg).await?;
    match &outcome {
        StartupOutcome::Recovered { source, trades } => {
            println!("Recovered {} trades from {}", trades, source)
        }
        StartupOutcome::NoRecoverableData => {
            warn!("No saved data found; run `configure` to set up the account");
            journal.dismiss_error();
        }
        _ => {}
    }

    match command {
        "status" => print_status(&journal),
        "add" => {
            let trade = journal.add_trade_input(arg(&args, 1, "amount")?).await?;
            println!("Trade #{} recorded: {:+.2}", trade.id, trade.result);
            print_status(&journal);
        }
        "configure" => {
            let dynamic = matches!(args.get(4).map(String::as_str), Some("dynamic" | "on" | "true"));
            journal
                .configure_account(
                    num(&args, 1, "balance")?,
                    num(&args, 2, "max-dd")?,
                    num(&args, 3, "pct")?,
                    dynamic,
                )
                .await?;
            print_status(&journal);
        }
        "max-dd" => {
            journal.update_max_drawdown(num(&args, 1, "amount")?).await?;
            print_status(&journal);
        }
        "loss-pct" => {
            journal.update_loss_per_trade(num(&args, 1, "percent")?).await?;
            print_status(&journal);
        }
        "dynamic" => {
            let on = match arg(&args, 1, "on|off")? {
                "on" | "true" => true,
                "off" | "false" => false,
                other => bail!("expected on or off, got '{}'", other),
            };
            journal.set_dynamic_max_drawdown(on).await?;
            print_status(&journal);
        }
        "trades" => {
            let trades = match args.get(1) {
                Some(_) => journal.recent_trades(num(&args, 1, "limit")? as usize).await?,
                None => journal.trades().to_vec(),
            };
            for t in &trades {
                println!("#{:<5} {}  {:>+12.2}", t.id, t.timestamp.to_rfc3339(), t.result);
            }
        }
        "series" => {
            for p in journal.drawdown_series() {
                println!("{:>4}  pnl {:>+10.2}  floor {:>+10.2}", p.index, p.cumulative_pnl, p.floor);
            }
        }
        "clear" => {
            journal.clear_all_trades().await?;
            println!("All trades deleted");
        }
        "reset" => {
            journal.reset_to_defaults().await?;
            println!("Settings, trades and backups wiped");
        }
        "recover" => match journal.recover().await? {
            Some(source) => println!("Restored from {}", source),
            None => println!("No recoverable data found"),
        },
        "recover-merged" => match journal.recover_merged().await? {
            Some(n) => println!("Restored {} trades from merged backups", n),
            None => println!("No recoverable data found"),
        },
        "diagnose" => {
            let report = journal.check_startup_data().await;
            println!("platform: {}", journal.platform_name());
            println!("settings stored: {}", report.has_settings);
            println!("trades stored:   {}", report.trade_count);
            for tier in &report.tiers {
                println!(
                    "tier {:<8} available={} keys={} full_backup={}",
                    tier.name, tier.available, tier.key_count, tier.has_full_backup
                );
            }
        }
        "export" => {
            let path = arg(&args, 1, "path")?;
            let export = journal.export_data().await?;
            write_export_file(path, &export).await?;
            println!("Exported {} trades to {}", export.metadata.trade_count, path);
        }
        "import" => {
            let path = arg(&args, 1, "path")?;
            let snapshot = read_import_file(path).await?;
            journal.import_data(&snapshot).await?;
            println!("Imported {} trades", snapshot.trades.len());
            print_status(&journal);
        }
        "help" | "-h" | "--help" => println!("{}", USAGE),
        other => bail!("unknown command '{}'\n\n{}", other, USAGE),
    }

    journal.close().await?;
    Ok(())
}
