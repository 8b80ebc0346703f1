use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;

use serde::Deserialize;

use txwatch_api::{Action, AuthError, Authorizer};

/// Reviewer roles known to the built-in authorizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    FraudAnalyst,
    RuleMaker,
}

impl Role {
    pub fn allows(self, action: Action) -> bool {
        match self {
            Role::Admin | Role::FraudAnalyst => true,
            Role::RuleMaker => matches!(action, Action::ViewTransactions | Action::ListIndices),
        }
    }
}

/// Principal entry of the static authorization table.
#[derive(Debug, Clone, Deserialize)]
pub struct PrincipalConfig {
    pub name: String,
    #[serde(default)]
    pub roles: Vec<Role>,
}

/// Authorization oracle backed by a fixed principal → roles table.
///
/// Unknown principals are denied everything.
#[derive(Debug, Default)]
pub struct StaticAuthorizer {
    principals: HashMap<String, HashSet<Role>>,
}

impl StaticAuthorizer {
    pub fn new(principals: &[PrincipalConfig]) -> Self {
        let mut map: HashMap<String, HashSet<Role>> = HashMap::new();
        for p in principals {
            map.entry(p.name.clone())
                .or_default()
                .extend(p.roles.iter().copied());
        }
        Self { principals: map }
    }

    pub fn grant(mut self, principal: &str, role: Role) -> Self {
        self.principals
            .entry(principal.to_string())
            .or_default()
            .insert(role);
        self
    }

    fn check(&self, principal: &str, action: Action) -> bool {
        self.principals
            .get(principal)
            .is_some_and(|roles| roles.iter().any(|r| r.allows(action)))
    }
}

impl Authorizer for StaticAuthorizer {
    fn is_authorized(
        &self,
        principal: &str,
        action: Action,
    ) -> Pin<Box<dyn Future<Output = Result<bool, AuthError>> + Send + '_>> {
        let allowed = self.check(principal, action);
        Box::pin(async move { Ok(allowed) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn roles_map_to_actions() {
        let auth = StaticAuthorizer::new(&[
            PrincipalConfig {
                name: "ana".into(),
                roles: vec![Role::FraudAnalyst],
            },
            PrincipalConfig {
                name: "rui".into(),
                roles: vec![Role::RuleMaker],
            },
        ])
        .grant("root", Role::Admin);

        for action in [
            Action::ViewTransactions,
            Action::ListIndices,
            Action::SetTickbox,
            Action::SetRemark,
        ] {
            assert!(auth.is_authorized("root", action).await.unwrap());
            assert!(auth.is_authorized("ana", action).await.unwrap());
            assert!(!auth.is_authorized("stranger", action).await.unwrap());
        }
        assert!(auth.is_authorized("rui", Action::ViewTransactions).await.unwrap());
        assert!(!auth.is_authorized("rui", Action::SetTickbox).await.unwrap());
        assert!(!auth.is_authorized("rui", Action::SetRemark).await.unwrap());
    }

    #[test]
    fn principal_table_parses() {
        let p: PrincipalConfig =
            serde_json::from_str(r#"{"name":"ana","roles":["fraud_analyst","rule_maker"]}"#)
                .unwrap();
        assert_eq!(p.roles, vec![Role::FraudAnalyst, Role::RuleMaker]);
    }
}
