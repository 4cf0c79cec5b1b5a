//! Reservation policy: how much of this period's inflow goes to the reserve

use serde::{Deserialize, Serialize};

/// Whether (and how much) to move into the reserve account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ReservationDecision {
    NoAction { reason: String },
    /// `amount` is always positive
    ReserveAmount { amount: f64 },
}

impl ReservationDecision {
    /// Amount to reserve, if any
    pub fn amount(&self) -> Option<f64> {
        match self {
            ReservationDecision::NoAction { .. } => None,
            ReservationDecision::ReserveAmount { amount } => Some(*amount),
        }
    }

    pub fn is_reserve(&self) -> bool {
        matches!(self, ReservationDecision::ReserveAmount { .. })
    }
}

/// Decide whether the excess of actual inflow over the salary target is reserved
///
/// Only the current period's actual figure is used, never forecast values.
pub fn decide(current_inflow: f64, desired_salary: f64) -> ReservationDecision {
    let excess = current_inflow - desired_salary;
    if excess > 0.0 {
        ReservationDecision::ReserveAmount { amount: excess }
    } else {
        ReservationDecision::NoAction {
            reason: format!(
                "No excess: current inflow ({:.2}) is not above desired salary ({:.2})",
                current_inflow, desired_salary
            ),
        }
    }
}
