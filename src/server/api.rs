use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::commission::{Offer, Tier};
use crate::optimizer::{
    estimate_candidates, search_on_pool, RankingStrategy, ScenarioResult, SearchError,
    SearchOutcome, SearchParameters, SearchStatus, TierCaps,
};
use crate::report::{describe_mix, display_window, write_scenarios_csv, ExportError};
use crate::server::AppContext;

/// Upper bound on alternatives a single request may ask for.
const MAX_LIMIT: usize = 1_000;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestCaps {
    #[serde(rename = "10k")]
    pub t1: Option<i64>,
    #[serde(rename = "30k")]
    pub t2: Option<i64>,
    #[serde(rename = "50k")]
    pub t3: Option<i64>,
    #[serde(rename = "100k")]
    pub t4: Option<i64>,
}

impl RequestCaps {
    fn get(&self, tier: Tier) -> Option<i64> {
        match tier {
            Tier::T1 => self.t1,
            Tier::T2 => self.t2,
            Tier::T3 => self.t3,
            Tier::T4 => self.t4,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    pub goal_tpv: f64,
    pub goal_commission: f64,
    #[serde(default)]
    pub caps: Option<RequestCaps>,
    pub strategy: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioView {
    pub summary: String,
    #[serde(flatten)]
    pub scenario: ScenarioResult,
}

impl From<&ScenarioResult> for ScenarioView {
    fn from(scenario: &ScenarioResult) -> Self {
        Self {
            summary: describe_mix(&scenario.mix),
            scenario: scenario.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub status: &'static str,
    pub engine: &'static str,
    pub generated_at: String,
    pub search_status: SearchStatus,
    pub parameters: SearchParameters,
    pub total_candidates: usize,
    pub evaluated: usize,
    pub qualifying: usize,
    pub duration_ms: u64,
    pub best: Option<ScenarioView>,
    pub alternatives: Vec<ScenarioView>,
    pub notes: Vec<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationIssue {
    pub field: &'static str,
    pub messages: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationErrorResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub errors: Vec<ValidationIssue>,
}

impl ValidationErrorResponse {
    fn from_issues(errors: Vec<ValidationIssue>) -> Self {
        Self {
            status: "error",
            message: "Validation failed",
            errors,
        }
    }
}

#[derive(Debug)]
pub enum SearchPayloadError {
    Parse(serde_json::Error),
    Validation(ValidationErrorResponse),
    Search(SearchError),
    Export(ExportError),
    Serialize(serde_json::Error),
}

impl fmt::Display for SearchPayloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "{err}"),
            Self::Validation(_) => write!(f, "invalid search request"),
            Self::Search(err) => write!(f, "{err}"),
            Self::Export(err) => write!(f, "{err}"),
            Self::Serialize(err) => write!(f, "failed to serialize response: {err}"),
        }
    }
}

impl std::error::Error for SearchPayloadError {}

pub fn health_payload() -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&serde_json::json!({
        "status": "ok",
        "service": "tiermix-api",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub fn offers_payload(ctx: &AppContext) -> Result<String, serde_json::Error> {
    let offers: &[Offer] = ctx.offers.offers();
    serde_json::to_string_pretty(&serde_json::json!({ "offers": offers }))
}

/// Turn a raw request into validated parameters plus the alternatives limit.
/// Collects every problem instead of stopping at the first.
pub fn validate_search_request(
    request: &SearchRequest,
    ctx: &AppContext,
) -> Result<(SearchParameters, usize), ValidationErrorResponse> {
    let mut errors = Vec::new();

    if !request.goal_tpv.is_finite() || request.goal_tpv <= 0.0 {
        errors.push(ValidationIssue {
            field: "goal_tpv",
            messages: vec!["goal_tpv must be greater than zero".to_string()],
        });
    }
    if !request.goal_commission.is_finite() || request.goal_commission <= 0.0 {
        errors.push(ValidationIssue {
            field: "goal_commission",
            messages: vec!["goal_commission must be greater than zero".to_string()],
        });
    }

    let (caps, cap_messages) = resolve_caps(request.caps.as_ref(), &ctx.config.cap_limits);
    if !cap_messages.is_empty() {
        errors.push(ValidationIssue {
            field: "caps",
            messages: cap_messages,
        });
    }

    let strategy = match request.strategy.as_deref() {
        None => RankingStrategy::default(),
        Some(raw) => RankingStrategy::parse(raw).unwrap_or_else(|| {
            errors.push(ValidationIssue {
                field: "strategy",
                messages: vec![format!(
                    "unknown strategy '{raw}', expected minimize_tpv or minimize_client_count"
                )],
            });
            RankingStrategy::default()
        }),
    };

    let limit = request.limit.unwrap_or(ctx.config.display_limit);
    if limit > MAX_LIMIT {
        errors.push(ValidationIssue {
            field: "limit",
            messages: vec![format!("limit must be at most {MAX_LIMIT}")],
        });
    }

    if !errors.is_empty() {
        return Err(ValidationErrorResponse::from_issues(errors));
    }

    Ok((
        SearchParameters {
            goal_tpv: request.goal_tpv,
            goal_commission: request.goal_commission,
            caps,
            strategy,
        },
        limit,
    ))
}

/// Missing tiers fall back to the form defaults, lowered to `limits`.
fn resolve_caps(raw: Option<&RequestCaps>, limits: &TierCaps) -> (TierCaps, Vec<String>) {
    let raw = raw.cloned().unwrap_or_default();
    let mut caps = TierCaps::FORM_DEFAULTS.clamped_to(limits);
    let mut messages = Vec::new();
    for tier in Tier::ALL {
        let Some(value) = raw.get(tier) else {
            continue;
        };
        match u32::try_from(value) {
            Ok(cap) if cap <= limits.get(tier) => caps.set(tier, cap),
            Ok(cap) => messages.push(format!(
                "{tier} cap {cap} exceeds the limit of {}",
                limits.get(tier)
            )),
            Err(_) if value < 0 => messages.push(format!("{tier} cap must not be negative")),
            Err(_) => messages.push(format!("{tier} cap {value} is too large")),
        }
    }
    (caps, messages)
}

fn run_search(
    body: &str,
    ctx: &AppContext,
) -> Result<(SearchParameters, usize, SearchOutcome, u64), SearchPayloadError> {
    let request: SearchRequest = serde_json::from_str(body).map_err(SearchPayloadError::Parse)?;
    let (params, limit) =
        validate_search_request(&request, ctx).map_err(SearchPayloadError::Validation)?;

    let started = Instant::now();
    let outcome = search_on_pool(
        &ctx.config.worker_pool(),
        &ctx.offers,
        &params,
        &ctx.config.search_budget(),
    )
    .map_err(SearchPayloadError::Search)?;
    let duration_ms = started.elapsed().as_millis() as u64;
    Ok((params, limit, outcome, duration_ms))
}

pub fn search_payload(body: &str, ctx: &AppContext) -> Result<String, SearchPayloadError> {
    let (params, limit, outcome, duration_ms) = run_search(body, ctx)?;
    let (best, alternatives) = display_window(&outcome.scenarios, limit);

    let mut notes = Vec::new();
    match outcome.status {
        SearchStatus::Complete if outcome.scenarios.is_empty() => {
            notes.push("No scenario reaches the commission goal; raise the tier caps or lower the goal.")
        }
        SearchStatus::TimedOut => {
            notes.push("Search hit its deadline; results cover part of the candidate space.")
        }
        SearchStatus::Cancelled => notes.push("Search was cancelled; results are partial."),
        SearchStatus::Complete => {}
    }

    let response = SearchResponse {
        status: "ok",
        engine: "tiermix_v1",
        generated_at: chrono::Utc::now().to_rfc3339(),
        search_status: outcome.status,
        parameters: params,
        total_candidates: outcome.total_candidates,
        evaluated: outcome.evaluated,
        qualifying: outcome.scenarios.len(),
        duration_ms,
        best: best.map(ScenarioView::from),
        alternatives: alternatives.iter().map(ScenarioView::from).collect(),
        notes,
    };
    serde_json::to_string_pretty(&response).map_err(SearchPayloadError::Serialize)
}

pub fn export_payload(body: &str, ctx: &AppContext) -> Result<String, SearchPayloadError> {
    let (_, limit, outcome, _) = run_search(body, ctx)?;
    let mut buffer = Vec::new();
    write_scenarios_csv(&mut buffer, &outcome.scenarios, limit)
        .map_err(SearchPayloadError::Export)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

#[derive(Debug, Clone, Serialize)]
pub struct EstimateResponse {
    pub caps: TierCaps,
    pub candidates: Option<u128>,
    pub naive_candidates: u128,
    pub within_limits: bool,
}

/// GET /api/search/estimate?10k=3&30k=3&50k=2&100k=1. Missing tiers use the form defaults.
pub fn estimate_payload(path: &str, ctx: &AppContext) -> Result<String, SearchPayloadError> {
    let query = path.split('?').nth(1).unwrap_or("");
    let mut caps = TierCaps::FORM_DEFAULTS;
    let mut messages = Vec::new();
    for pair in query.split('&').filter(|pair| !pair.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let Some(tier) = Tier::from_label(key) else {
            messages.push(format!("unknown tier '{key}', expected one of 10k, 30k, 50k, 100k"));
            continue;
        };
        match value.trim().parse::<u32>() {
            Ok(cap) => caps.set(tier, cap),
            Err(_) => messages.push(format!("{tier} cap '{value}' is not a non-negative integer")),
        }
    }
    if !messages.is_empty() {
        return Err(SearchPayloadError::Validation(
            ValidationErrorResponse::from_issues(vec![ValidationIssue {
                field: "caps",
                messages,
            }]),
        ));
    }

    let estimate = estimate_candidates(&ctx.offers, &caps);
    let response = EstimateResponse {
        caps,
        candidates: estimate.candidates,
        naive_candidates: estimate.naive_candidates,
        within_limits: caps.exceeding(&ctx.config.cap_limits).is_empty(),
    };
    serde_json::to_string_pretty(&response).map_err(SearchPayloadError::Serialize)
}
