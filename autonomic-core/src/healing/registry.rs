use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use super::RemediationAction;
use crate::anomaly::AnomalyKind;
use crate::error::RegistryError;

/// Read-only kind -> action table.
///
/// Built once; two actions claiming the same kind is a startup error.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    actions: BTreeMap<AnomalyKind, Arc<dyn RemediationAction>>,
}

impl ActionRegistry {
    pub fn build<I>(actions: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = Arc<dyn RemediationAction>>,
    {
        let mut table: BTreeMap<AnomalyKind, Arc<dyn RemediationAction>> = BTreeMap::new();

        for action in actions {
            let kind = action.kind();
            if let Some(existing) = table.get(&kind) {
                return Err(RegistryError::DuplicateKind {
                    kind,
                    first: existing.name().to_string(),
                    second: action.name().to_string(),
                });
            }
            table.insert(kind, action);
        }

        info!("Action registry initialized with {} remediation actions", table.len());
        for (kind, action) in &table {
            info!("- AnomalyKind: {}, Action: {}", kind, action.name());
        }

        Ok(Self { actions: table })
    }

    /// Action registered for `kind`, if any
    pub fn get(&self, kind: AnomalyKind) -> Option<&Arc<dyn RemediationAction>> {
        self.actions.get(&kind)
    }

    /// Registered kinds, in enum order
    pub fn kinds(&self) -> Vec<AnomalyKind> {
        self.actions.keys().copied().collect()
    }

    /// Kinds in `detectable` with no registered action
    pub fn missing(&self, detectable: &[AnomalyKind]) -> Vec<AnomalyKind> {
        detectable
            .iter()
            .copied()
            .filter(|kind| !self.actions.contains_key(kind))
            .collect()
    }

    /// Number of registered actions
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemediationError;
    use async_trait::async_trait;

    struct Named(AnomalyKind, &'static str);

    #[async_trait]
    impl RemediationAction for Named {
        fn kind(&self) -> AnomalyKind {
            self.0
        }
        fn name(&self) -> &str {
            self.1
        }
        async fn remediate(&self) -> Result<(), RemediationError> {
            Ok(())
        }
    }

    #[test]
    fn test_build_and_lookup() {
        let registry = ActionRegistry::build([
            Arc::new(Named(AnomalyKind::HighCpu, "cpu")) as Arc<dyn RemediationAction>,
            Arc::new(Named(AnomalyKind::SlowResponse, "latency")),
        ])
        .unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(AnomalyKind::HighCpu).unwrap().name(), "cpu");
        assert!(registry.get(AnomalyKind::HighMemory).is_none());
        assert_eq!(
            registry.missing(&AnomalyKind::ALL),
            vec![AnomalyKind::HighMemory]
        );
    }

    #[test]
    fn test_duplicate_kind_fails_fast() {
        let result = ActionRegistry::build([
            Arc::new(Named(AnomalyKind::HighCpu, "first")) as Arc<dyn RemediationAction>,
            Arc::new(Named(AnomalyKind::HighCpu, "second")),
        ]);

        match result {
            Err(RegistryError::DuplicateKind { kind, first, second }) => {
                assert_eq!(kind, AnomalyKind::HighCpu);
                assert_eq!(first, "first");
                assert_eq!(second, "second");
            }
            Ok(_) => panic!("duplicate kinds must be rejected"),
        }
    }
}
