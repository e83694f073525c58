//! Pending-reboot detection
//!
//! A NixOS switch activates the new generation immediately, but kernel,
//! initrd, kernel modules and systemd only change on the next boot. Comparing
//! what those links point to under `/run/booted-system` against the current
//! system profile tells us whether that boot is still owed.

use std::sync::Arc;

use tracing::{debug, error, instrument};

use nixfleet_exec::{CommandRunner, CommandSpec, ExecError};

/// Remote comparison of booted against activated generation
pub const REBOOT_CHECK_COMMAND: &str = "bash -c ':; diff \
<(readlink /run/booted-system/{initrd,kernel,kernel-modules,systemd}) \
<(readlink /nix/var/nix/profiles/system/{initrd,kernel,kernel-modules,systemd})'";

/// Exit status `diff` uses for "inputs differ"
pub const DIFFERS_STATUS: i32 = 1;

/// Delayed reboot issued when a node needs one
pub const REBOOT_COMMAND: &str = "sudo shutdown -r +1 'System will reboot in 1 minute.'";

/// What the comparison said
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebootCheck {
    /// Generations differ
    Required,
    /// Generations match
    NotRequired,
    /// The comparison itself failed; nothing is known
    Indeterminate(ExecError),
}

/// Decides whether a node has a reboot pending
#[derive(Clone)]
pub struct RebootOracle {
    runner: Arc<dyn CommandRunner>,
}

impl RebootOracle {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    #[must_use]
    pub fn check_command(node: &str) -> CommandSpec {
        CommandSpec::remote(node, REBOOT_CHECK_COMMAND)
    }

    /// Run the comparison and classify its exit status
    #[instrument(skip(self), level = "debug")]
    pub async fn check(&self, node: &str) -> RebootCheck {
        debug!(node, "checking if node needs to be rebooted");

        let result = self.runner.run(Self::check_command(node)).await;
        debug!(node, stdout = %result.stdout_lossy(), "reboot check output");

        match (result.status, result.error) {
            (Some(0), None) => {
                debug!(node, "node does not require a reboot");
                RebootCheck::NotRequired
            }
            (Some(DIFFERS_STATUS), _) => {
                debug!(node, "node requires a reboot to complete updates");
                RebootCheck::Required
            }
            (_, Some(error)) => {
                error!(
                    node,
                    command = %REBOOT_CHECK_COMMAND,
                    error = %error,
                    "reboot check failed"
                );
                RebootCheck::Indeterminate(error)
            }
            (status, None) => {
                let error =
                    ExecError::IoError(format!("unexpected exit status {status:?} without error"));
                error!(
                    node,
                    command = %REBOOT_CHECK_COMMAND,
                    error = %error,
                    "reboot check failed"
                );
                RebootCheck::Indeterminate(error)
            }
        }
    }

    /// Conservative boolean view of [`RebootOracle::check`]
    ///
    /// An indeterminate result counts as "no reboot needed" so the update flow
    /// is not blocked. This can under-report pending reboots.
    pub async fn reboot_required(&self, node: &str) -> bool {
        matches!(self.check(node).await, RebootCheck::Required)
    }
}

#[cfg(test)]
mod tests {
    use std::fmt;
    use std::sync::Mutex;

    use tracing::field::{Field, Visit};
    use tracing::instrument::WithSubscriber;
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::Registry;
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    use super::*;
    use crate::test_support::{Reply, ScriptedRunner};

    fn oracle(reply: Reply) -> RebootOracle {
        RebootOracle::new(Arc::new(ScriptedRunner::new(vec![("readlink", reply)])))
    }

    /// Records the `node` field of every ERROR event
    #[derive(Clone, Default)]
    struct ErrorNodes(Arc<Mutex<Vec<String>>>);

    struct NodeField(Option<String>);

    impl Visit for NodeField {
        fn record_str(&mut self, field: &Field, value: &str) {
            if field.name() == "node" {
                self.0 = Some(value.to_string());
            }
        }

        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            if field.name() == "node" {
                self.0 = Some(format!("{value:?}"));
            }
        }
    }

    impl<S: Subscriber> Layer<S> for ErrorNodes {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() != Level::ERROR {
                return;
            }
            let mut node = NodeField(None);
            event.record(&mut node);
            self.0.lock().unwrap().push(node.0.unwrap_or_default());
        }
    }

    async fn errors_logged_for(reply: Reply) -> Vec<String> {
        let errors = ErrorNodes::default();
        let subscriber = Registry::default().with(errors.clone());

        let oracle = oracle(reply);
        let required = oracle
            .reboot_required("web1")
            .with_subscriber(subscriber)
            .await;
        assert!(!required);

        errors.0.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn test_differs_means_required() {
        let oracle = oracle(Reply::Exit(1, "< /nix/store/abc-linux\n"));

        assert_eq!(oracle.check("web1").await, RebootCheck::Required);
        assert!(oracle.reboot_required("web1").await);
    }

    #[tokio::test]
    async fn test_identical_means_not_required() {
        let oracle = oracle(Reply::Exit(0, ""));
        assert!(!oracle.reboot_required("web1").await);
    }

    #[tokio::test]
    async fn test_anomalous_status_defaults_to_not_required() {
        let oracle = oracle(Reply::Exit(2, ""));

        assert!(matches!(
            oracle.check("web1").await,
            RebootCheck::Indeterminate(ExecError::CommandFailed { status: 2, .. })
        ));
        assert!(!oracle.reboot_required("web1").await);
    }

    #[tokio::test]
    async fn test_anomalous_status_is_logged_as_error() {
        assert_eq!(errors_logged_for(Reply::Exit(2, "")).await, vec!["web1"]);
    }

    #[tokio::test]
    async fn test_transport_error_is_logged_as_error() {
        assert_eq!(
            errors_logged_for(Reply::Spawn("ssh: not found")).await,
            vec!["web1"]
        );
    }

    #[tokio::test]
    async fn test_clean_check_logs_no_error() {
        assert!(errors_logged_for(Reply::Exit(0, "")).await.is_empty());
    }

    #[tokio::test]
    async fn test_transport_error_defaults_to_not_required() {
        let oracle = oracle(Reply::Spawn("ssh: not found"));
        assert!(!oracle.reboot_required("web1").await);
    }

    #[test]
    fn test_check_command_targets_node() {
        let spec = RebootOracle::check_command("db1");
        let argv = spec.argv();

        assert_eq!(argv[0], "ssh");
        assert_eq!(argv[1], "db1");
        assert!(argv[2].starts_with("bash -c ':; diff <(readlink /run/booted-system/"));
    }
}
