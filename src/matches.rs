//! Match review: candidate lookup and accept/reject records.

use crate::error::{Result, SyncError};
use crate::remote::{RemoteStore, StoreEndpoint};
use crate::types::{MatchRecord, MatchStatus, Timestamp, UserProfile};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

const USERS_PATH: &str = "usuarios";
const MATCHES_PATH: &str = "matches";

/// Reads candidates and records review decisions in the store.
pub struct MatchService {
    store: Arc<dyn RemoteStore>,
}

impl MatchService {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }

    /// The next user `uid` has not reviewed yet, if any.
    pub fn next_candidate(&self, uid: &str, endpoint: &StoreEndpoint) -> Result<Option<UserProfile>> {
        require(&[("uidActual", uid)], endpoint)?;

        let reviewed: HashSet<String> = self
            .store
            .fetch_collection(endpoint, &format!("{MATCHES_PATH}/{uid}"))?
            .map(|records| records.keys().cloned().collect())
            .unwrap_or_default();

        let Some(users) = self.store.fetch_collection(endpoint, USERS_PATH)? else {
            return Ok(None);
        };

        let candidate = users
            .iter()
            .filter(|(id, record)| {
                id.as_str() != uid && !reviewed.contains(id.as_str()) && record.is_object()
            })
            .map(|(id, record)| UserProfile::from_record(id, record))
            .next();
        Ok(candidate)
    }

    /// Record `uid`'s decision about `other`, replacing any earlier one.
    pub fn mark(
        &self,
        uid: &str,
        other: &str,
        status: MatchStatus,
        endpoint: &StoreEndpoint,
    ) -> Result<MatchRecord> {
        require(&[("uidActual", uid), ("idUsuario", other)], endpoint)?;

        let record = MatchRecord {
            other_user_id: other.to_string(),
            status,
            timestamp_millis: Timestamp::now().millis(),
        };
        self.store.replace(
            endpoint,
            &format!("{MATCHES_PATH}/{uid}/{other}"),
            &record.to_payload(),
        )?;
        debug!(uid, other, status = %status, "match recorded");
        Ok(record)
    }

    pub fn accept(&self, uid: &str, other: &str, endpoint: &StoreEndpoint) -> Result<MatchRecord> {
        self.mark(uid, other, MatchStatus::Accepted, endpoint)
    }

    pub fn reject(&self, uid: &str, other: &str, endpoint: &StoreEndpoint) -> Result<MatchRecord> {
        self.mark(uid, other, MatchStatus::Rejected, endpoint)
    }

    /// Users `uid` has a non-rejected match record with.
    pub fn active_matches(&self, uid: &str, endpoint: &StoreEndpoint) -> Result<Vec<String>> {
        require(&[("uidActual", uid)], endpoint)?;

        let Some(records) = self
            .store
            .fetch_collection(endpoint, &format!("{MATCHES_PATH}/{uid}"))?
        else {
            return Ok(Vec::new());
        };
        Ok(records
            .iter()
            .filter_map(|(other, record)| MatchRecord::from_record(other, record))
            .filter(|record| record.status != MatchStatus::Rejected)
            .map(|record| record.other_user_id)
            .collect())
    }
}

fn require(fields: &[(&'static str, &str)], endpoint: &StoreEndpoint) -> Result<()> {
    let mut missing: Vec<&str> = fields
        .iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| *name)
        .collect();
    if endpoint.base_url.is_empty() {
        missing.push("databaseURL");
    }
    if endpoint.auth_token.is_empty() {
        missing.push("idToken");
    }
    if missing.is_empty() {
        Ok(())
    } else {
        Err(SyncError::Validation(format!(
            "missing required parameters: {}",
            missing.join(", ")
        )))
    }
}
