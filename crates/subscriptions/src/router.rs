//! Dispatches validated commands to the application and project repositories.

use async_trait::async_trait;
use tracing::{info, instrument};

use crate::recipients::parse_destination_and_template;
use crate::{
    Command, CommandId, ResourceCollection, ResourceKind, SubscriptionError,
    SubscriptionRepository, UpdateSubscription,
};

/// Reply sent after any successful subscribe or unsubscribe, including no-ops.
pub const SUBSCRIPTION_UPDATED: &str = "subscription updated";

/// Executes a command and produces the plain-text reply.
///
/// Implemented by [`CommandRouter`]; the bot server depends only on this trait.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Runs `command` to completion.
    async fn execute(&self, command: Command) -> Result<String, SubscriptionError>;
}

/// Routes commands to one repository per resource kind.
#[derive(Debug)]
pub struct CommandRouter<A, P> {
    applications: SubscriptionRepository<A>,
    projects: SubscriptionRepository<P>,
}

impl<A, P> CommandRouter<A, P>
where
    A: ResourceCollection,
    P: ResourceCollection,
{
    /// Creates a router over an application and a project repository.
    pub fn new(applications: SubscriptionRepository<A>, projects: SubscriptionRepository<P>) -> Self {
        Self {
            applications,
            projects,
        }
    }

    #[instrument(
        name = "command",
        skip_all,
        fields(command_id = %CommandId::new_random(), operation = command.operation())
    )]
    async fn dispatch(&self, command: Command) -> Result<String, SubscriptionError> {
        match command {
            Command::ListSubscriptions { recipient } => self.list_subscriptions(&recipient).await,
            Command::Subscribe { recipient, update } => {
                self.update_subscription(&recipient, true, &update).await
            }
            Command::Unsubscribe { recipient, update } => {
                self.update_subscription(&recipient, false, &update).await
            }
        }
    }

    async fn update_subscription(
        &self,
        recipient: &str,
        subscribe: bool,
        update: &UpdateSubscription,
    ) -> Result<String, SubscriptionError> {
        let target = update.target()?;
        let outcome = match target.kind {
            ResourceKind::Application => {
                self.applications
                    .update_subscription(recipient, subscribe, &target.name, &update.trigger)
                    .await?
            }
            ResourceKind::Project => {
                self.projects
                    .update_subscription(recipient, subscribe, &target.name, &update.trigger)
                    .await?
            }
        };
        info!(kind = %target.kind, name = %target.name, ?outcome, "subscription command done");
        Ok(SUBSCRIPTION_UPDATED.to_string())
    }

    async fn list_subscriptions(&self, recipient: &str) -> Result<String, SubscriptionError> {
        let (destination, _) = parse_destination_and_template(recipient)?;
        let apps = self.applications.subscribed_resources(&destination).await?;
        let projects = self.projects.subscribed_resources(&destination).await?;
        Ok(format_subscriptions(recipient, &apps, &projects))
    }
}

#[async_trait]
impl<A, P> CommandExecutor for CommandRouter<A, P>
where
    A: ResourceCollection,
    P: ResourceCollection,
{
    async fn execute(&self, command: Command) -> Result<String, SubscriptionError> {
        self.dispatch(command).await
    }
}

/// Renders the reply to a list command.
pub fn format_subscriptions(recipient: &str, apps: &[String], projects: &[String]) -> String {
    if apps.is_empty() && projects.is_empty() {
        return format!("The {recipient} has no subscriptions.");
    }
    let mut response = format!(
        "The {recipient} is subscribed to {} applications and {} projects.",
        apps.len(),
        projects.len()
    );
    if !apps.is_empty() {
        response.push_str(&format!("\nApplications: {}.", apps.join(", ")));
    }
    if !projects.is_empty() {
        response.push_str(&format!("\nProjects: {}.", projects.join(", ")));
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_no_subscriptions() {
        assert_eq!(
            format_subscriptions("slack:ops", &[], &[]),
            "The slack:ops has no subscriptions."
        );
    }

    #[test]
    fn test_format_only_applications() {
        let apps = vec!["argocd/a".to_string(), "argocd/b".to_string()];
        assert_eq!(
            format_subscriptions("slack:ops", &apps, &[]),
            "The slack:ops is subscribed to 2 applications and 0 projects.\nApplications: argocd/a, argocd/b."
        );
    }

    #[test]
    fn test_format_both_categories() {
        let apps = vec!["argocd/a".to_string()];
        let projects = vec!["argocd/default".to_string()];
        assert_eq!(
            format_subscriptions("slack:ops", &apps, &projects),
            "The slack:ops is subscribed to 1 applications and 1 projects.\nApplications: argocd/a.\nProjects: argocd/default."
        );
    }
}
