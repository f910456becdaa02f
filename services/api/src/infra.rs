use metrics_exporter_prometheus::PrometheusHandle;
use placement_portal::config::AdminConfig;
use placement_portal::workflows::placement::{AdminTier, ConfiguredIdentityProvider};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::warn;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    /// Which repository backs this process: `sqlite` or `memory`.
    pub(crate) storage: &'static str,
}

/// Builds the identity provider, warning about tiers nobody can act for.
pub(crate) fn identity_from_config(admins: &AdminConfig) -> ConfiguredIdentityProvider {
    for (tier, account) in [
        (AdminTier::Tier1, &admins.tier1),
        (AdminTier::Tier2, &admins.tier2),
    ] {
        if account.is_none() {
            warn!(%tier, "no admin account configured; decisions for this tier will be refused");
        }
    }
    ConfiguredIdentityProvider::from_config(admins)
}

#[cfg(test)]
mod tests {
    use super::*;
    use placement_portal::workflows::placement::{
        AdminAccount, IdentityClaim, IdentityError, IdentityProvider, Role,
    };

    fn claim(role: Role, identity: &str, secret: &str) -> IdentityClaim {
        IdentityClaim {
            role,
            identity: identity.to_string(),
            secret: Some(secret.to_string()),
        }
    }

    #[test]
    fn configured_tier_resolves_and_missing_tier_is_refused() {
        let admins = AdminConfig {
            tier1: Some(AdminAccount {
                tier: AdminTier::Tier1,
                username: "recommender".to_string(),
                secret: "tier1-secret".to_string(),
            }),
            tier2: None,
        };
        let provider = identity_from_config(&admins);

        assert!(provider
            .resolve(&claim(Role::Tier1Admin, "recommender", "tier1-secret"))
            .is_ok());
        assert!(matches!(
            provider.resolve(&claim(Role::Tier2Admin, "approver", "anything")),
            Err(IdentityError::TierNotConfigured(AdminTier::Tier2))
        ));
    }
}
