//! Aave V3 subgraph client for liquidatable position discovery.

use std::time::Duration;

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

/// Public Aave V3 Polygon subgraph.
pub const DEFAULT_SUBGRAPH_URL: &str =
    "https://api.thegraph.com/subgraphs/name/aave/protocol-v3-polygon";

/// Error returned when the feed cannot produce a candidate list.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("subgraph unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("subgraph returned HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("subgraph query failed: {0}")]
    Query(String),

    #[error("malformed subgraph response: {0}")]
    Malformed(String),
}

/// A borrower position eligible for a flash-loan liquidation.
///
/// Only constructed from users that have at least one collateral reserve
/// and one variable debt entry, so every `Position` is a valid candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    /// Borrower account as reported by the indexer
    pub account_id: String,
    pub health_factor: f64,
    /// Reserve to seize (first collateral entry)
    pub collateral_asset_id: String,
    /// Reserve to repay (first variable debt entry)
    pub debt_asset_id: String,
    /// Outstanding debt in the debt asset's native units
    pub debt_amount: U256,
}

/// Subgraph client settings.
#[derive(Debug, Clone)]
pub struct SubgraphConfig {
    pub url: String,
    /// Users with a health factor strictly below this are requested
    pub health_factor_threshold: String,
    /// Optional `first:` argument; the indexer default applies when unset
    pub page_size: Option<u32>,
    pub timeout: Duration,
}

impl Default for SubgraphConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SUBGRAPH_URL.to_string(),
            health_factor_threshold: "1".to_string(),
            page_size: None,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Subgraph API client.
#[derive(Debug, Clone)]
pub struct SubgraphClient {
    client: reqwest::Client,
    config: SubgraphConfig,
}

impl SubgraphClient {
    /// Create a client with the given settings.
    pub fn new(config: SubgraphConfig) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    /// Create a client against a custom endpoint with default settings.
    pub fn with_url(url: impl Into<String>) -> Result<Self, FeedError> {
        Self::new(SubgraphConfig {
            url: url.into(),
            ..Default::default()
        })
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// GraphQL document selecting users below the health threshold.
    pub fn query(&self) -> String {
        let first = self
            .config
            .page_size
            .map(|n| format!("first: {n}, "))
            .unwrap_or_default();

        format!(
            r#"{{
    users({first}where: {{ healthFactor_lt: "{threshold}" }}) {{
        id
        healthFactor
        collateralReserve {{ reserve {{ id }} }}
        variableDebt {{ reserve {{ id }} currentTotalDebt }}
    }}
}}"#,
            threshold = self.config.health_factor_threshold
        )
    }

    /// Fetch positions that can be liquidated this cycle.
    ///
    /// Single request, no retry. Users without a collateral reserve or a
    /// variable debt entry are dropped here.
    #[instrument(skip(self), fields(url = %self.config.url))]
    pub async fn fetch_eligible_positions(&self) -> Result<Vec<Position>, FeedError> {
        let body = serde_json::json!({ "query": self.query() });

        let response = self.client.post(&self.config.url).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status(status));
        }

        let text = response.text().await?;
        let users = parse_users(&text)?;
        let fetched = users.len();

        let threshold: Option<f64> = self.config.health_factor_threshold.parse().ok();
        let positions = normalize_users(users, threshold);

        info!(
            fetched = fetched,
            eligible = positions.len(),
            excluded = fetched - positions.len(),
            "Fetched at-risk users from subgraph"
        );

        Ok(positions)
    }
}

/// Parse a GraphQL response body into raw users.
pub fn parse_users(body: &str) -> Result<Vec<SubgraphUser>, FeedError> {
    let response: GraphResponse =
        serde_json::from_str(body).map_err(|e| FeedError::Malformed(e.to_string()))?;

    if let Some(errors) = response.errors.filter(|e| !e.is_empty()) {
        let message = errors
            .into_iter()
            .map(|e| e.message)
            .collect::<Vec<_>>()
            .join("; ");
        return Err(FeedError::Query(message));
    }

    response
        .data
        .and_then(|d| d.users)
        .ok_or_else(|| FeedError::Malformed("missing data.users".to_string()))
}

/// Turn raw users into candidates, dropping ineligible ones.
pub fn normalize_users(users: Vec<SubgraphUser>, hf_threshold: Option<f64>) -> Vec<Position> {
    users
        .into_iter()
        .filter_map(|user| {
            let position = user.into_position()?;
            match hf_threshold {
                Some(max) if position.health_factor >= max => {
                    debug!(
                        user = %position.account_id,
                        hf = position.health_factor,
                        "Skipping user above health threshold"
                    );
                    None
                }
                _ => Some(position),
            }
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct GraphResponse {
    data: Option<GraphData>,
    errors: Option<Vec<GraphError>>,
}

#[derive(Debug, Deserialize)]
struct GraphData {
    users: Option<Vec<SubgraphUser>>,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    message: String,
}

/// User entity as returned by the subgraph.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubgraphUser {
    pub id: String,

    /// `None` when the indexer sent null or a non-numeric value
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub health_factor: Option<f64>,

    #[serde(default, deserialize_with = "deserialize_optional_vec")]
    pub collateral_reserve: Vec<CollateralEntry>,

    #[serde(default, deserialize_with = "deserialize_optional_vec")]
    pub variable_debt: Vec<DebtEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReserveRef {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollateralEntry {
    pub reserve: ReserveRef,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebtEntry {
    pub reserve: ReserveRef,
    pub current_total_debt: String,
}

impl SubgraphUser {
    /// Candidate view of this user, or `None` if it cannot be liquidated
    /// with a single flash loan.
    pub fn into_position(self) -> Option<Position> {
        let collateral = self.collateral_reserve.into_iter().next();
        let debt = self.variable_debt.into_iter().next();

        let (collateral, debt) = match (collateral, debt) {
            (Some(c), Some(d)) => (c, d),
            _ => {
                debug!(user = %self.id, "Skipping user without collateral or variable debt");
                return None;
            }
        };

        let Some(health_factor) = self.health_factor else {
            warn!(user = %self.id, "Skipping user with unreadable health factor");
            return None;
        };

        let debt_amount = match debt.current_total_debt.trim().parse::<U256>() {
            Ok(amount) => amount,
            Err(e) => {
                warn!(
                    user = %self.id,
                    amount = %debt.current_total_debt,
                    error = %e,
                    "Skipping user with unparseable debt amount"
                );
                return None;
            }
        };

        Some(Position {
            account_id: self.id,
            health_factor,
            collateral_asset_id: collateral.reserve.id,
            debt_asset_id: debt.reserve.id,
            debt_amount,
        })
    }
}

// Custom deserializers

/// Accepts a number or a numeric string. Anything else reads as `None`
/// so one bad entity cannot fail the whole response.
fn deserialize_lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Lenient {
        String(String),
        Number(f64),
        Other(serde::de::IgnoredAny),
    }

    Ok(match Option::<Lenient>::deserialize(deserializer)? {
        Some(Lenient::String(s)) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        Some(Lenient::Number(n)) => Some(n),
        Some(Lenient::Other(_)) | None => None,
    })
}

fn deserialize_optional_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
