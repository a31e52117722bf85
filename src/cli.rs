use tracing_subscriber::EnvFilter;

use crate::commission::{OfferTable, Tier};
use crate::config::{self, SimulatorConfig};
use crate::optimizer::{
    estimate_candidates, search_on_pool, RankingStrategy, SearchParameters, SearchStatus, TierCaps,
};
use crate::report::{
    describe_mix, display_window, export_scenarios_csv, format_currency, format_multiplier,
};
use crate::server::{self, AppContext};

const USAGE: &str = "usage: tiermix <search|estimate|offers|export|serve>";
const SEARCH_USAGE: &str = "usage: tiermix search <goal_tpv> <goal_commission> [--caps 10k,30k,50k,100k] [--strategy tpv|clients] [--limit n] [--table]";
const EXPORT_USAGE: &str = "usage: tiermix export <path.csv> <goal_tpv> <goal_commission> [--caps 10k,30k,50k,100k] [--strategy tpv|clients] [--limit n]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Search,
    Estimate,
    Offers,
    Export,
    Serve,
}

pub fn parse_command(args: &[String]) -> Option<Command> {
    match args.get(1).map(String::as_str) {
        Some("search") => Some(Command::Search),
        Some("estimate") => Some(Command::Estimate),
        Some("offers") => Some(Command::Offers),
        Some("export") => Some(Command::Export),
        Some("serve") => Some(Command::Serve),
        _ => None,
    }
}

/// Log to stderr so stdout stays machine-readable. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tiermix=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn run_with_args(args: &[String]) -> i32 {
    let Some(command) = parse_command(args) else {
        eprintln!("{USAGE}");
        return 2;
    };

    let config = match config::load_from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("config error: {err}");
            return 1;
        }
    };
    let offers = match config.offer_table() {
        Ok(offers) => offers,
        Err(err) => {
            eprintln!("config error: {err}");
            return 1;
        }
    };

    match command {
        Command::Search => handle_search(args, &offers, &config),
        Command::Estimate => handle_estimate(args, &offers, &config),
        Command::Offers => handle_offers(&offers),
        Command::Export => handle_export(args, &offers, &config),
        Command::Serve => handle_serve(AppContext::new(offers, config)),
    }
}

fn handle_serve(ctx: AppContext) -> i32 {
    match server::run_server(&ctx) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("server error: {err}");
            1
        }
    }
}

fn handle_search(args: &[String], offers: &OfferTable, config: &SimulatorConfig) -> i32 {
    let (params, limit) = match parse_search_args(args, 2, config) {
        Ok(parsed) => parsed,
        Err(message) => {
            eprintln!("invalid parameters: {message}");
            eprintln!("{SEARCH_USAGE}");
            return 2;
        }
    };
    let as_table = args.iter().any(|arg| arg == "--table");

    let pool = config.worker_pool();
    let outcome = match search_on_pool(&pool, offers, &params, &config.search_budget()) {
        Ok(outcome) => outcome,
        Err(err) => {
            eprintln!("search failed: {err}");
            return 2;
        }
    };
    if outcome.status != SearchStatus::Complete {
        eprintln!(
            "search stopped early ({:?}) after {} of {} candidates; results are partial",
            outcome.status, outcome.evaluated, outcome.total_candidates
        );
    }

    let (best, alternatives) = display_window(&outcome.scenarios, limit);
    if as_table {
        if best.is_none() {
            eprintln!("no scenario found; raise the tier caps or lower the commission goal");
        }
        println!("rank\tclients\ttotal_tpv\tmultiplier\tfinal_commission\tmix");
        for (rank, scenario) in best.into_iter().chain(alternatives).enumerate() {
            println!(
                "{}\t{}\t{}\t{}\t{}\t{}",
                rank + 1,
                scenario.total_clients,
                format_currency(scenario.total_tpv),
                format_multiplier(scenario.multiplier),
                format_currency(scenario.final_commission),
                describe_mix(&scenario.mix)
            );
        }
        return 0;
    }

    let payload = serde_json::json!({
        "generated_at": chrono::Utc::now().to_rfc3339(),
        "status": outcome.status,
        "parameters": params,
        "total_candidates": outcome.total_candidates,
        "evaluated": outcome.evaluated,
        "qualifying": outcome.scenarios.len(),
        "best": best,
        "alternatives": alternatives,
    });
    match serde_json::to_string_pretty(&payload) {
        Ok(payload) => {
            println!("{payload}");
            0
        }
        Err(err) => {
            eprintln!("failed to serialize search result: {err}");
            1
        }
    }
}

fn handle_estimate(args: &[String], offers: &OfferTable, config: &SimulatorConfig) -> i32 {
    let caps = match parse_caps_flag(args, &config.cap_limits) {
        Ok(caps) => caps,
        Err(message) => {
            eprintln!("invalid parameters: {message}");
            return 2;
        }
    };
    let estimate = estimate_candidates(offers, &caps);
    match serde_json::to_string_pretty(&serde_json::json!({
        "caps": caps,
        "candidates": estimate.candidates,
        "naive_candidates": estimate.naive_candidates,
    })) {
        Ok(payload) => {
            println!("{payload}");
            0
        }
        Err(err) => {
            eprintln!("failed to serialize estimate: {err}");
            1
        }
    }
}

fn handle_offers(offers: &OfferTable) -> i32 {
    match serde_json::to_string_pretty(offers) {
        Ok(payload) => {
            println!("{payload}");
            0
        }
        Err(err) => {
            eprintln!("failed to serialize offers: {err}");
            1
        }
    }
}

fn handle_export(args: &[String], offers: &OfferTable, config: &SimulatorConfig) -> i32 {
    let Some(path) = args.get(2).filter(|path| !path.starts_with("--")) else {
        eprintln!("{EXPORT_USAGE}");
        return 2;
    };
    let (params, limit) = match parse_search_args(args, 3, config) {
        Ok(parsed) => parsed,
        Err(message) => {
            eprintln!("invalid parameters: {message}");
            eprintln!("{EXPORT_USAGE}");
            return 2;
        }
    };

    let pool = config.worker_pool();
    let outcome = match search_on_pool(&pool, offers, &params, &config.search_budget()) {
        Ok(outcome) => outcome,
        Err(err) => {
            eprintln!("search failed: {err}");
            return 2;
        }
    };

    match export_scenarios_csv(path, &outcome.scenarios, limit) {
        Ok(rows) => {
            println!("export complete: rows={rows}, path='{path}'");
            0
        }
        Err(err) => {
            eprintln!("export failed: {err}");
            1
        }
    }
}

/// Goals at `args[first]` and `args[first + 1]`, then optional flags.
/// Follows the simulator form: both goals must be positive.
fn parse_search_args(
    args: &[String],
    first: usize,
    config: &SimulatorConfig,
) -> Result<(SearchParameters, usize), String> {
    let goal_tpv = parse_positive(args.get(first), "goal_tpv")?;
    let goal_commission = parse_positive(args.get(first + 1), "goal_commission")?;
    let caps = parse_caps_flag(args, &config.cap_limits)?;
    let strategy = match flag_value(args, "--strategy") {
        Some(raw) => RankingStrategy::parse(raw)
            .ok_or_else(|| format!("unknown strategy '{raw}', expected tpv or clients"))?,
        None => RankingStrategy::default(),
    };
    let limit = match flag_value(args, "--limit") {
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| format!("limit '{raw}' is not a non-negative integer"))?,
        None => config.display_limit,
    };
    Ok((
        SearchParameters {
            goal_tpv,
            goal_commission,
            caps,
            strategy,
        },
        limit,
    ))
}

fn parse_positive(raw: Option<&String>, name: &str) -> Result<f64, String> {
    let raw = raw.ok_or_else(|| format!("missing {name}"))?;
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() && value > 0.0 => Ok(value),
        _ => Err(format!("{name} must be a number greater than zero, got '{raw}'")),
    }
}

/// `--caps 3,3,2,1` in tier order (10k, 30k, 50k, 100k). Defaults to the form caps,
/// lowered to `limits`.
fn parse_caps_flag(args: &[String], limits: &TierCaps) -> Result<TierCaps, String> {
    let Some(raw) = flag_value(args, "--caps") else {
        return Ok(TierCaps::FORM_DEFAULTS.clamped_to(limits));
    };
    let values: Vec<&str> = raw.split(',').map(str::trim).collect();
    if values.len() != Tier::ALL.len() {
        return Err(format!(
            "--caps expects {} comma-separated values, got '{raw}'",
            Tier::ALL.len()
        ));
    }

    let mut caps = TierCaps::default();
    for (tier, value) in Tier::ALL.into_iter().zip(values) {
        let parsed = value
            .parse::<i64>()
            .map_err(|_| format!("{tier} cap '{value}' is not an integer"))?;
        if parsed < 0 {
            return Err(format!("{tier} cap must not be negative"));
        }
        let cap = u32::try_from(parsed).map_err(|_| format!("{tier} cap {parsed} is too large"))?;
        if cap > limits.get(tier) {
            return Err(format!(
                "{tier} cap {cap} exceeds the limit of {}",
                limits.get(tier)
            ));
        }
        caps.set(tier, cap);
    }
    Ok(caps)
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|index| args.get(index + 1))
        .map(String::as_str)
}
