use std::future::Future;
use std::pin::Pin;

use crate::AuthError;

/// Capability checked against the authorization oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    ViewTransactions,
    ListIndices,
    SetTickbox,
    SetRemark,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::ViewTransactions => "view_transactions",
            Action::ListIndices => "list_indices",
            Action::SetTickbox => "set_tickbox",
            Action::SetRemark => "set_remark",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// External authorization oracle.
///
/// The engine never inspects roles or credentials itself; it only asks
/// whether `principal` may perform `action`. An `Err` is treated as a
/// denial.
pub trait Authorizer: Send + Sync {
    fn is_authorized(
        &self,
        principal: &str,
        action: Action,
    ) -> Pin<Box<dyn Future<Output = Result<bool, AuthError>> + Send + '_>>;
}
