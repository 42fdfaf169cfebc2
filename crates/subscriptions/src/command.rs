//! Structured commands produced by bot adapters.
//!
//! Adapters decode their transport into a [`RawCommand`], whose operation
//! fields are all optional, and convert it with `Command::try_from`. The
//! conversion is where "no operation" and "several operations" are rejected,
//! so the router only ever sees a well-formed [`Command`].

use serde::{Deserialize, Serialize};

use crate::{ResourceKind, ResourceName, SubscriptionError};

/// Where a subscribe/unsubscribe should be applied.
///
/// Empty strings mean "not given". When both `app` and `project` are set the
/// application wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSubscription {
    /// Application name.
    #[serde(default)]
    pub app: String,
    /// Project name.
    #[serde(default)]
    pub project: String,
    /// Trigger name; empty for the default subscription.
    #[serde(default)]
    pub trigger: String,
}

impl UpdateSubscription {
    /// Resolves which collection and resource the update targets.
    ///
    /// # Errors
    ///
    /// - [`SubscriptionError::MissingTarget`] if neither name is set.
    /// - [`SubscriptionError::InvalidResourceName`] if the chosen name is not a
    ///   valid resource name.
    pub fn target(&self) -> Result<Target, SubscriptionError> {
        let (kind, name) = if !self.app.is_empty() {
            (ResourceKind::Application, self.app.as_str())
        } else if !self.project.is_empty() {
            (ResourceKind::Project, self.project.as_str())
        } else {
            return Err(SubscriptionError::MissingTarget);
        };
        let name = ResourceName::parse(name).map_err(|reason| SubscriptionError::InvalidResourceName {
            kind,
            name: name.to_string(),
            reason,
        })?;
        Ok(Target { kind, name })
    }
}

/// A resolved subscription target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Collection holding the resource.
    pub kind: ResourceKind,
    /// Resource name within that collection.
    pub name: ResourceName,
}

/// Marker payload for the list operation in [`RawCommand`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListSubscriptions {}

/// Wire form of a command: one recipient plus at most one operation field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCommand {
    /// The recipient issuing the command (e.g. `"slack:ops"`).
    pub recipient: String,
    /// Present when the recipient asks for its subscriptions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_subscriptions: Option<ListSubscriptions>,
    /// Present when the recipient subscribes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscribe: Option<UpdateSubscription>,
    /// Present when the recipient unsubscribes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unsubscribe: Option<UpdateSubscription>,
}

/// A validated command with exactly one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Report what `recipient` is subscribed to.
    ListSubscriptions {
        /// Recipient to report on.
        recipient: String,
    },
    /// Subscribe `recipient` to one resource.
    Subscribe {
        /// Recipient to add.
        recipient: String,
        /// Target resource and trigger.
        update: UpdateSubscription,
    },
    /// Unsubscribe `recipient` from one resource.
    Unsubscribe {
        /// Recipient to remove.
        recipient: String,
        /// Target resource and trigger.
        update: UpdateSubscription,
    },
}

impl Command {
    /// The recipient the command acts for.
    pub fn recipient(&self) -> &str {
        match self {
            Self::ListSubscriptions { recipient }
            | Self::Subscribe { recipient, .. }
            | Self::Unsubscribe { recipient, .. } => recipient,
        }
    }

    /// Short operation name for logs.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::ListSubscriptions { .. } => "list",
            Self::Subscribe { .. } => "subscribe",
            Self::Unsubscribe { .. } => "unsubscribe",
        }
    }
}

impl TryFrom<RawCommand> for Command {
    type Error = SubscriptionError;

    fn try_from(raw: RawCommand) -> Result<Self, Self::Error> {
        let RawCommand {
            recipient,
            list_subscriptions,
            subscribe,
            unsubscribe,
        } = raw;
        match (list_subscriptions, subscribe, unsubscribe) {
            (Some(_), None, None) => Ok(Self::ListSubscriptions { recipient }),
            (None, Some(update), None) => Ok(Self::Subscribe { recipient, update }),
            (None, None, Some(update)) => Ok(Self::Unsubscribe { recipient, update }),
            (None, None, None) => Err(SubscriptionError::UnknownCommand),
            _ => Err(SubscriptionError::AmbiguousCommand),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_prefers_application() {
        let update = UpdateSubscription {
            app: "guestbook".into(),
            project: "default".into(),
            trigger: String::new(),
        };
        let target = update.target().unwrap();
        assert_eq!(target.kind, ResourceKind::Application);
        assert_eq!(target.name.as_str(), "guestbook");
    }

    #[test]
    fn test_target_falls_back_to_project() {
        let update = UpdateSubscription {
            project: "default".into(),
            ..Default::default()
        };
        assert_eq!(update.target().unwrap().kind, ResourceKind::Project);
    }

    #[test]
    fn test_target_rejects_invalid_names() {
        let update = UpdateSubscription {
            app: "guestbook?dryRun=All".into(),
            ..Default::default()
        };
        let err = update.target().unwrap_err();
        assert!(matches!(
            err,
            SubscriptionError::InvalidResourceName {
                kind: ResourceKind::Application,
                ..
            }
        ));

        let update = UpdateSubscription {
            project: "../default".into(),
            ..Default::default()
        };
        assert!(matches!(
            update.target(),
            Err(SubscriptionError::InvalidResourceName {
                kind: ResourceKind::Project,
                ..
            })
        ));
    }

    #[test]
    fn test_target_missing() {
        let update = UpdateSubscription::default();
        assert!(matches!(update.target(), Err(SubscriptionError::MissingTarget)));
    }

    #[test]
    fn test_raw_command_with_no_operation_is_unknown() {
        let raw = RawCommand {
            recipient: "slack:ops".into(),
            ..Default::default()
        };
        assert!(matches!(
            Command::try_from(raw),
            Err(SubscriptionError::UnknownCommand)
        ));
    }

    #[test]
    fn test_raw_command_with_two_operations_is_ambiguous() {
        let raw = RawCommand {
            recipient: "slack:ops".into(),
            subscribe: Some(UpdateSubscription::default()),
            unsubscribe: Some(UpdateSubscription::default()),
            ..Default::default()
        };
        assert!(matches!(
            Command::try_from(raw),
            Err(SubscriptionError::AmbiguousCommand)
        ));
    }

    #[test]
    fn test_raw_command_from_json() {
        let raw: RawCommand = serde_json::from_str(
            r#"{"recipient":"slack:ops","unsubscribe":{"project":"default","trigger":"on-deployed"}}"#,
        )
        .unwrap();
        let command = Command::try_from(raw).unwrap();
        assert_eq!(command.operation(), "unsubscribe");
        assert_eq!(command.recipient(), "slack:ops");
        match command {
            Command::Unsubscribe { update, .. } => {
                assert_eq!(update.project, "default");
                assert_eq!(update.trigger, "on-deployed");
                assert!(update.app.is_empty());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_list_command_from_json() {
        let raw: RawCommand =
            serde_json::from_str(r#"{"recipient":"slack:ops","list_subscriptions":{}}"#).unwrap();
        assert_eq!(
            Command::try_from(raw).unwrap(),
            Command::ListSubscriptions {
                recipient: "slack:ops".into()
            }
        );
    }
}
