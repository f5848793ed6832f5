// Centralized logging for the sign-in flows so every path reports the same way
use crate::errors::{AuthFailure, ErrorClass};
use crate::models::{FlowKind, FlowOperation, OutcomeStatus, RedirectResult, SignInOutcome};
use log::{debug, info, warn};

pub struct LoggingHelper;

impl LoggingHelper {
    /// Log the start of a user-initiated popup flow
    pub fn log_popup_flow_started(operation: FlowOperation, provider_id: &str) {
        info!("🔐 Starting popup {} with {}", operation.as_str(), provider_id);
    }

    /// Log that the popup was blocked and the flow continues via redirect
    pub fn log_switch_to_redirect(operation: FlowOperation, provider_id: &str) {
        warn!(
            "🚫 Popup blocked; continuing {} with {} via full-page redirect",
            operation.as_str(),
            provider_id
        );
    }

    /// Log the merge toward a pre-existing account after a credential conflict
    pub fn log_conflict_merge(kind: FlowKind, anonymous_uid: Option<&str>) {
        info!(
            "🔀 Credential already bound to another account ({kind} flow); signing out {} and adopting it",
            anonymous_uid.unwrap_or("<none>")
        );
    }

    /// Log a provider failure together with its classification
    pub fn log_provider_failure(kind: FlowKind, code: &str, class: &ErrorClass) {
        match class {
            ErrorClass::Cancelled => info!("↩️  {kind} flow cancelled by user ({code})"),
            _ => warn!("⚠️  {kind} flow failed with {code} (classified {})", class.kind()),
        }
    }

    /// Log a redirect result handed back by the provider after a restart
    pub fn log_redirect_result(result: &RedirectResult) {
        info!(
            "↪️  Redirect {} returned for {} (credential: {})",
            result.operation.as_str(),
            result.identity.uid,
            result
                .credential
                .as_ref()
                .map_or("none", |credential| credential.provider_id.as_str())
        );
    }

    /// Log the outcome of redirect reconciliation
    pub fn log_reconcile_outcome(outcome: &SignInOutcome) {
        let uid = outcome.identity.as_ref().map_or("<none>", |identity| identity.uid.as_str());
        match outcome.status {
            OutcomeStatus::Success => {
                info!("✅ Redirect reconciliation established identity {uid}");
            }
            OutcomeStatus::Failed => warn!(
                "❌ Redirect reconciliation failed (flow pending: {}): {}",
                outcome.was_flow_pending,
                outcome
                    .error
                    .as_ref()
                    .map_or_else(String::new, ToString::to_string)
            ),
            OutcomeStatus::Neutral => {
                debug!("No redirect in flight; current identity {uid}");
            }
            OutcomeStatus::Cancelled | OutcomeStatus::RedirectStarted => {
                info!("Redirect reconciliation ended with {:?}", outcome.status);
            }
        }
    }

    /// Log the startup decision to create an anonymous identity
    pub fn log_anonymous_fallback() {
        info!("👤 No identity and no flow in progress; creating anonymous session");
    }

    /// Log that anonymous fallback was suppressed by an in-flight flow
    pub fn log_anonymous_suppressed(reason: &str) {
        info!("⏸️  Skipping anonymous sign-in: {reason}");
    }

    /// Log a surfaced failure
    pub fn log_surfaced_failure(failure: &AuthFailure, fatal: bool) {
        if fatal {
            warn!("💥 Fatal authentication error: {failure}");
        } else {
            warn!("⚠️  Sign-in failed (retryable: {}): {failure}", failure.is_retryable());
        }
    }

    /// Log removal of an abandoned intent record
    pub fn log_stale_intent_purged(kind: FlowKind, age_ms: i64) {
        info!("🧹 Purging stale {kind} intent record ({age_ms} ms old)");
    }

    /// Log the end of the startup sequence
    pub fn log_session_ready(uid: Option<&str>) {
        info!("🎯 Session ready (identity: {})", uid.unwrap_or("<none>"));
    }
}
