use serde::Serialize;

use super::domain::{ApplicationId, ApplicationStatus};

/// Where the presentation layer should go next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum NavigationTarget {
    /// Client-facing tracking page for a freshly finalized application.
    ApplicationStatus { id: ApplicationId },
    /// A decision (automatic or staff) settled the application.
    Decision {
        id: ApplicationId,
        status: ApplicationStatus,
    },
}

impl NavigationTarget {
    pub fn path(&self) -> String {
        match self {
            NavigationTarget::ApplicationStatus { id } => {
                format!("/application/status?id={id}")
            }
            NavigationTarget::Decision { id, status } => {
                format!("/application/status?id={id}&status={status}")
            }
        }
    }

    pub fn application_id(&self) -> &ApplicationId {
        match self {
            NavigationTarget::ApplicationStatus { id } | NavigationTarget::Decision { id, .. } => {
                id
            }
        }
    }
}

/// Outbound seam to whatever owns routing.
pub trait Navigator: Send + Sync {
    fn navigate(&self, target: NavigationTarget);
}

/// Navigator for headless contexts that have nowhere to go.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn navigate(&self, _target: NavigationTarget) {}
}
