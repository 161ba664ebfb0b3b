//! Failure policy table
//!
//! One reconcile pass touches many clusters; a single broken cluster must
//! not block reconciliation of the rest, while scope-level failures must
//! retry the whole pass. The table makes that divergence explicit instead of
//! spreading it through control flow.

use crate::config::AuthFailurePolicy;

/// An operation performed during a reconcile pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ResolveScope,
    LoadCredentials,
    Authenticate,
    HeartbeatCheck,
    TeardownDeletingCluster,
    TeardownUnmatchedCluster,
    TeardownForIntegrationDeletion,
    ProvisionCluster,
    EnsureIntegrationFinalizer,
}

/// What a failed operation does to the pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureAction {
    /// Return the error; the framework retries the whole pass with backoff.
    AbortPass,
    /// Log and move on to the next cluster or step.
    SkipAndContinue,
}

/// Failure action for one operation under the configured authentication
/// policy.
pub fn failure_action(op: Operation, auth_policy: AuthFailurePolicy) -> FailureAction {
    match op {
        Operation::ResolveScope
        | Operation::EnsureIntegrationFinalizer
        | Operation::TeardownDeletingCluster
        | Operation::TeardownForIntegrationDeletion => FailureAction::AbortPass,

        Operation::HeartbeatCheck
        | Operation::TeardownUnmatchedCluster
        | Operation::ProvisionCluster => FailureAction::SkipAndContinue,

        Operation::LoadCredentials | Operation::Authenticate => match auth_policy {
            AuthFailurePolicy::Abort => FailureAction::AbortPass,
            AuthFailurePolicy::Degrade => FailureAction::SkipAndContinue,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_and_finalizer_failures_abort_the_pass() {
        for op in [
            Operation::ResolveScope,
            Operation::EnsureIntegrationFinalizer,
            Operation::TeardownDeletingCluster,
            Operation::TeardownForIntegrationDeletion,
        ] {
            assert_eq!(
                failure_action(op, AuthFailurePolicy::Abort),
                FailureAction::AbortPass
            );
        }
    }

    #[test]
    fn per_cluster_failures_are_isolated() {
        for op in [
            Operation::HeartbeatCheck,
            Operation::TeardownUnmatchedCluster,
            Operation::ProvisionCluster,
        ] {
            assert_eq!(
                failure_action(op, AuthFailurePolicy::Abort),
                FailureAction::SkipAndContinue
            );
        }
    }

    #[test]
    fn auth_failures_follow_the_configured_policy() {
        for op in [Operation::LoadCredentials, Operation::Authenticate] {
            assert_eq!(
                failure_action(op, AuthFailurePolicy::Abort),
                FailureAction::AbortPass
            );
            assert_eq!(
                failure_action(op, AuthFailurePolicy::Degrade),
                FailureAction::SkipAndContinue
            );
        }
    }
}
