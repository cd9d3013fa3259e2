//! Resources: desired state bound to one provider
//!
//! A [`Resource`] owns its provider for its whole lifetime and wraps every
//! action in update tracking: it reads the provider's read-once `updated`
//! flag, fires the `on_update` callback, and applies the `ignore_failure`
//! policy.

use crate::context::DryRun;
use crate::error::{Error, Result};
use crate::provider::Provider;
use crate::types::Action;
use std::fmt;

/// Callback fired after an action that changed state
pub type UpdateCallback = Box<dyn FnMut() -> Result<()> + Send>;

/// Options common to every resource kind
#[derive(Default)]
pub struct ResourceOptions {
    /// Action run by [`Resource::run`]; the kind's default when unset
    pub action: Option<Action>,
    /// Log and swallow provider errors instead of propagating them
    pub ignore_failure: bool,
    pub on_update: Option<UpdateCallback>,
}

impl fmt::Debug for ResourceOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceOptions")
            .field("action", &self.action)
            .field("ignore_failure", &self.ignore_failure)
            .field("on_update", &self.on_update.is_some())
            .finish()
    }
}

impl ResourceOptions {
    pub fn action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    pub fn ignore_failure(mut self, ignore: bool) -> Self {
        self.ignore_failure = ignore;
        self
    }

    pub fn on_update(mut self, callback: impl FnMut() -> Result<()> + Send + 'static) -> Self {
        self.on_update = Some(Box::new(callback));
        self
    }
}

/// A desired-state descriptor for one OS entity
pub struct Resource {
    kind: &'static str,
    name: String,
    action: Action,
    ignore_failure: bool,
    on_update: Option<UpdateCallback>,
    provider: Option<Box<dyn Provider>>,
    dry_run: DryRun,
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("action", &self.action)
            .field("ignore_failure", &self.ignore_failure)
            .field("provider", &self.provider)
            .finish_non_exhaustive()
    }
}

impl Resource {
    /// Bind a resource to its provider
    ///
    /// `default_action` is used when `options.action` is unset. A `None`
    /// provider is accepted; every action on such a resource fails with
    /// [`Error::NoProvider`].
    pub fn new(
        kind: &'static str,
        name: impl Into<String>,
        default_action: Action,
        provider: Option<Box<dyn Provider>>,
        options: ResourceOptions,
        dry_run: DryRun,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            action: options.action.unwrap_or(default_action),
            ignore_failure: options.ignore_failure,
            on_update: options.on_update,
            provider,
            dry_run,
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The action [`Resource::run`] performs
    pub fn action(&self) -> Action {
        self.action
    }

    pub fn provider(&self) -> Option<&dyn Provider> {
        self.provider.as_deref()
    }

    pub fn create(&mut self) -> Result<bool> {
        self.perform(Action::Create)
    }

    pub fn remove(&mut self) -> Result<bool> {
        self.perform(Action::Remove)
    }

    pub fn install(&mut self) -> Result<bool> {
        self.perform(Action::Install)
    }

    /// Run the resource's configured action
    pub fn run(&mut self) -> Result<bool> {
        self.perform(self.action)
    }

    /// Whether `action` would currently be a no-op
    pub fn uptodate(&self, action: Action) -> Result<bool> {
        self.provider
            .as_deref()
            .ok_or_else(|| self.no_provider())?
            .uptodate(action)
    }

    fn no_provider(&self) -> Error {
        Error::NoProvider {
            kind: self.kind,
            name: self.name.clone(),
        }
    }

    /// Run `action` and report whether it changed state
    pub fn perform(&mut self, action: Action) -> Result<bool> {
        match self.tracked(action) {
            Ok(updated) => Ok(updated),
            Err(err @ Error::NoProvider { .. }) => Err(err),
            Err(err) if self.ignore_failure => {
                log::error!(
                    "{} '{}' failed to {}: {}",
                    self.kind,
                    self.name,
                    action,
                    err
                );
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    fn tracked(&mut self, action: Action) -> Result<bool> {
        let Some(provider) = self.provider.as_mut() else {
            return Err(Error::NoProvider {
                kind: self.kind,
                name: self.name.clone(),
            });
        };

        provider.run(action)?;
        let updated = provider.take_updated();

        if updated && let Some(callback) = self.on_update.as_mut() {
            if self.dry_run.is_active() {
                log::info!("(would) run update action for {} '{}'", self.kind, self.name);
            } else {
                log::debug!("running update action for {} '{}'", self.kind, self.name);
                callback()?;
            }
        }

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Reconciler;
    use crate::provider::tests::FakeMechanism;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn resource(mech: FakeMechanism, options: ResourceOptions, dry_run: DryRun) -> Resource {
        let provider = Reconciler::new(mech, dry_run.clone());
        Resource::new(
            "fake",
            "thing",
            Action::Create,
            Some(Box::new(provider)),
            options,
            dry_run,
        )
    }

    fn counter() -> (Arc<AtomicUsize>, impl FnMut() -> Result<()> + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        (count, move || {
            inner.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[test]
    fn create_reports_mutation_once() {
        let mut res = resource(
            FakeMechanism::new(Some(1)),
            ResourceOptions::default(),
            DryRun::new(),
        );
        assert!(res.create().unwrap());
        assert!(!res.create().unwrap());
    }

    #[test]
    fn on_update_fires_only_after_mutation() {
        let (count, callback) = counter();
        let mut res = resource(
            FakeMechanism::new(Some(1)),
            ResourceOptions::default().on_update(callback),
            DryRun::new(),
        );

        res.create().unwrap();
        res.create().unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn on_update_is_skipped_in_dry_run() {
        let (count, callback) = counter();
        let dry_run = DryRun::new();
        let mech = FakeMechanism::new(Some(1));
        let mut res = resource(
            mech.clone(),
            ResourceOptions::default().on_update(callback),
            dry_run.clone(),
        );

        let updated = dry_run.run(|| res.create()).unwrap();
        assert!(updated);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(mech.calls().is_empty());
    }

    #[test]
    fn run_uses_configured_action() {
        let mech = FakeMechanism::new(None);
        mech.state.lock().unwrap().present = true;
        let mut res = resource(
            mech.clone(),
            ResourceOptions::default().action(Action::Remove),
            DryRun::new(),
        );
        assert_eq!(res.action(), Action::Remove);
        assert!(res.run().unwrap());
        assert_eq!(mech.calls(), vec!["remove"]);
    }

    #[test]
    fn failures_propagate_by_default() {
        let mut res = resource(
            FakeMechanism::new(None),
            ResourceOptions::default(),
            DryRun::new(),
        );
        assert!(matches!(res.install(), Err(Error::InvalidAction { .. })));
    }

    #[test]
    fn ignore_failure_swallows_errors() {
        let mut res = resource(
            FakeMechanism::new(None),
            ResourceOptions::default().ignore_failure(true),
            DryRun::new(),
        );
        assert!(!res.install().unwrap());
    }

    #[test]
    fn callback_errors_follow_failure_policy() {
        let mut res = resource(
            FakeMechanism::new(None),
            ResourceOptions::default()
                .ignore_failure(true)
                .on_update(|| Err(Error::command_failed("reload failed", "nope"))),
            DryRun::new(),
        );
        assert!(!res.create().unwrap());
    }

    #[test]
    fn missing_provider_fails_clearly() {
        let mut res = Resource::new(
            "package",
            "htop",
            Action::Install,
            None,
            ResourceOptions::default().ignore_failure(true),
            DryRun::new(),
        );
        let err = res.run().unwrap_err();
        assert_eq!(err.to_string(), "no provider available for package 'htop'");
        assert!(res.uptodate(Action::Install).is_err());
    }
}
