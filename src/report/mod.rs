//! Presentation helpers shared by the CLI and the HTTP API.

pub mod csv_export;

use serde::Serialize;

use crate::commission::CandidateMix;
use crate::optimizer::ScenarioResult;

pub use csv_export::{export_scenarios_csv, write_scenarios_csv, ExportError};

/// "2x 10k (more aggressive) | 1x 50k (less aggressive)". Empty mixes render as "-".
pub fn describe_mix(mix: &CandidateMix) -> String {
    let parts: Vec<String> = mix
        .nonzero()
        .map(|entry| format!("{}x {}", entry.count, entry.key()))
        .collect();
    if parts.is_empty() {
        "-".to_string()
    } else {
        parts.join(" | ")
    }
}

/// Format an amount as `R$ 12,345.67`.
pub fn format_currency(amount: f64) -> String {
    let sign = if amount < 0.0 { "-" } else { "" };
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    format!("{sign}R$ {grouped}.{:02}", cents % 100)
}

pub fn format_multiplier(multiplier: f64) -> String {
    format!("{multiplier:.1}x")
}

/// The best scenario and up to `limit` alternatives after it.
pub fn display_window(
    scenarios: &[ScenarioResult],
    limit: usize,
) -> (Option<&ScenarioResult>, &[ScenarioResult]) {
    match scenarios.split_first() {
        Some((best, rest)) => (Some(best), &rest[..rest.len().min(limit)]),
        None => (None, &[]),
    }
}

/// Flat, display-ready view of one scenario.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioRow {
    pub mix: String,
    pub clients: u32,
    pub total_tpv: f64,
    pub multiplier: f64,
    pub gross_commission: f64,
    pub final_commission: f64,
}

impl From<&ScenarioResult> for ScenarioRow {
    fn from(scenario: &ScenarioResult) -> Self {
        Self {
            mix: describe_mix(&scenario.mix),
            clients: scenario.total_clients,
            total_tpv: scenario.total_tpv,
            multiplier: scenario.multiplier,
            gross_commission: scenario.gross_commission,
            final_commission: scenario.final_commission,
        }
    }
}

/// Rows for the best scenario followed by up to `limit` alternatives.
pub fn window_rows(scenarios: &[ScenarioResult], limit: usize) -> Vec<ScenarioRow> {
    let (best, alternatives) = display_window(scenarios, limit);
    best.into_iter()
        .chain(alternatives)
        .map(ScenarioRow::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commission::{Aggressiveness, MixEntry, Tier};

    fn scenario(clients: u32) -> ScenarioResult {
        ScenarioResult {
            mix: CandidateMix::new(vec![MixEntry {
                tier: Tier::T1,
                aggressiveness: Aggressiveness::High,
                count: clients,
            }]),
            total_tpv: f64::from(clients) * 10_000.0,
            gross_commission: f64::from(clients) * 90.0,
            final_commission: f64::from(clients) * 90.0,
            multiplier: 1.0,
            total_clients: clients,
        }
    }

    #[test]
    fn describe_mix_skips_zero_counts() {
        let mix = CandidateMix::new(vec![
            MixEntry {
                tier: Tier::T1,
                aggressiveness: Aggressiveness::High,
                count: 2,
            },
            MixEntry {
                tier: Tier::T2,
                aggressiveness: Aggressiveness::High,
                count: 0,
            },
            MixEntry {
                tier: Tier::T4,
                aggressiveness: Aggressiveness::Low,
                count: 1,
            },
        ]);
        assert_eq!(
            describe_mix(&mix),
            "2x 10k (more aggressive) | 1x 100k (less aggressive)"
        );
        assert_eq!(describe_mix(&CandidateMix::default()), "-");
    }

    #[test]
    fn currency_groups_thousands() {
        assert_eq!(format_currency(0.0), "R$ 0.00");
        assert_eq!(format_currency(999.5), "R$ 999.50");
        assert_eq!(format_currency(1_824.0), "R$ 1,824.00");
        assert_eq!(format_currency(1_234_567.891), "R$ 1,234,567.89");
        assert_eq!(format_currency(-50.0), "-R$ 50.00");
    }

    #[test]
    fn multiplier_has_one_decimal() {
        assert_eq!(format_multiplier(1.2), "1.2x");
        assert_eq!(format_multiplier(2.0), "2.0x");
    }

    #[test]
    fn window_holds_best_plus_limit() {
        let scenarios: Vec<ScenarioResult> = (1..=60).map(scenario).collect();
        let (best, rest) = display_window(&scenarios, 50);
        assert_eq!(best.map(|s| s.total_clients), Some(1));
        assert_eq!(rest.len(), 50);
        assert_eq!(rest[0].total_clients, 2);
        assert_eq!(window_rows(&scenarios, 50).len(), 51);

        let (best, rest) = display_window(&scenarios[..3], 50);
        assert!(best.is_some());
        assert_eq!(rest.len(), 2);

        let (best, rest) = display_window(&[], 50);
        assert!(best.is_none());
        assert!(rest.is_empty());
    }
}
