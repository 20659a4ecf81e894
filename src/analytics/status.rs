//! Status buckets for contracts and claims

/// Lifecycle bucket of a contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusBucket {
    Active,
    Pending,
    Cancelled,
}

impl StatusBucket {
    /// Case-insensitive; anything unrecognised (including blank) is cancelled
    pub fn classify(status: &str) -> Self {
        let s = status.trim().to_uppercase();
        if (s.contains("ACTIVE") && !s.contains("INACTIVE")) || s == "BOUND" || s == "SIGNED" {
            StatusBucket::Active
        } else if s.contains("PENDING") || s.contains("DRAFT") || s == "QUOTED" || s == "SENT" {
            StatusBucket::Pending
        } else {
            StatusBucket::Cancelled
        }
    }
}

/// Claim state used for the open / closed counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClaimState {
    Open,
    Closed,
    /// Counted in the total only
    Other,
}

impl ClaimState {
    pub fn classify(status: Option<&str>) -> Self {
        match status.map(|s| s.trim().to_lowercase()).as_deref() {
            Some("open") | Some("notified") => ClaimState::Open,
            Some("closed") | Some("settled") => ClaimState::Closed,
            _ => ClaimState::Other,
        }
    }
}
