use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::ledger::models::WinType;
use crate::settlement::applier::BatchReport;

/// Body for POST /api/v1/admin/matches/:id/settle
#[derive(Debug, Deserialize, Validate)]
pub struct ManualSettleRequest {
    /// Team name or the DRAW sentinel
    #[validate(length(min = 1, max = 100))]
    pub winner: String,
    pub win_type: Option<WinType>,
    #[validate(range(min = 0))]
    pub win_margin: Option<i32>,
}

/// Body for POST /api/v1/admin/matches/:id/void
#[derive(Debug, Deserialize, Validate)]
pub struct ManualVoidRequest {
    #[validate(length(min = 3, max = 200))]
    pub reason: String,
}

/// Body for POST /api/v1/admin/fancy/:id/settle
#[derive(Debug, Deserialize, Validate)]
pub struct FancySettleRequest {
    #[serde(with = "rust_decimal::serde::float")]
    pub result_value: Decimal,
}

/// Structured outcome of an administrative settlement call
#[derive(Debug, Serialize)]
pub struct SettlementResponse {
    pub resolved: usize,
    pub skipped: usize,
    pub failures: Vec<String>,
}

impl From<BatchReport> for SettlementResponse {
    fn from(report: BatchReport) -> Self {
        Self {
            resolved: report.resolved,
            skipped: report.skipped,
            failures: report.failure_messages(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settle_request_validation() {
        let ok = ManualSettleRequest {
            winner: "India".to_string(),
            win_type: Some(WinType::Wickets),
            win_margin: Some(7),
        };
        assert!(ok.validate().is_ok());

        let empty_winner = ManualSettleRequest {
            winner: String::new(),
            win_type: None,
            win_margin: None,
        };
        assert!(empty_winner.validate().is_err());

        let negative_margin = ManualSettleRequest {
            winner: "India".to_string(),
            win_type: Some(WinType::Runs),
            win_margin: Some(-3),
        };
        assert!(negative_margin.validate().is_err());
    }

    #[test]
    fn test_void_request_validation() {
        let ok = ManualVoidRequest {
            reason: "rained out".to_string(),
        };
        assert!(ok.validate().is_ok());

        let too_short = ManualVoidRequest {
            reason: "x".to_string(),
        };
        assert!(too_short.validate().is_err());
    }
}
