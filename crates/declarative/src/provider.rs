//! Provider contract and the generic reconciliation state machine
//!
//! A [`Provider`] is what a resource talks to. Platform code never implements
//! it directly: it implements [`Mechanism`] (how to check, create, update and
//! remove one entity), and [`Reconciler`] supplies the shared control flow:
//! the up-to-date check, the dry-run gate, logging, and the read-once
//! `updated` flag.

use crate::context::DryRun;
use crate::error::{Error, Result};
use crate::types::Action;
use std::fmt;

/// Read-once record of whether the last action changed anything
#[derive(Debug, Default)]
pub struct UpdateFlag(bool);

impl UpdateFlag {
    pub fn mark(&mut self) {
        self.0 = true;
    }

    /// Return the flag and clear it
    pub fn take(&mut self) -> bool {
        std::mem::take(&mut self.0)
    }
}

/// Reconciliation engine bound to one resource
pub trait Provider: fmt::Debug + Send {
    /// Resource kind this provider manages ("directory", "user", ...)
    fn kind(&self) -> &'static str;

    /// Registry name of the provider ("posix", "gnu", "apt", ...)
    fn provider_name(&self) -> &'static str;

    /// The OS-level identifier being managed
    fn target(&self) -> String;

    /// Whether `action` would be a no-op right now
    ///
    /// Fails with [`Error::InvalidAction`] for actions the kind does not support.
    fn uptodate(&self, action: Action) -> Result<bool>;

    /// Perform `action`, changing state only when needed
    fn run(&mut self, action: Action) -> Result<()>;

    /// Whether the most recent action changed state.
    ///
    /// Reading clears the flag: a second call without an intervening action
    /// returns `false`.
    fn take_updated(&mut self) -> bool;
}

/// Platform-specific mechanism for one resource kind
///
/// Desired attributes left unset must count as in sync and must never be
/// touched by `update`.
pub trait Mechanism: fmt::Debug + Send {
    fn kind(&self) -> &'static str;

    fn provider_name(&self) -> &'static str;

    fn target(&self) -> String;

    /// The action that brings the entity into existence
    fn present_action(&self) -> Action {
        Action::Create
    }

    /// Whether the entity exists at all
    ///
    /// Fails with [`Error::Conflict`] when the wrong kind of entry is in the way.
    fn exists(&self) -> Result<bool>;

    /// Whether every desired attribute matches. Only called when the entity exists.
    fn in_sync(&self) -> Result<bool>;

    /// Create the entity from scratch
    fn create(&self) -> Result<()>;

    /// Apply only the attributes that differ on an existing entity
    fn update(&self) -> Result<()>;

    fn remove(&self) -> Result<()>;

    /// Describe a pending create/update in more detail during dry-run
    fn preview(&self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Absent,
    Stale,
    Current,
}

/// Generic [`Provider`] driving a [`Mechanism`]
#[derive(Debug)]
pub struct Reconciler<M> {
    mechanism: M,
    dry_run: DryRun,
    updated: UpdateFlag,
}

impl<M: Mechanism> Reconciler<M> {
    pub fn new(mechanism: M, dry_run: DryRun) -> Self {
        Self {
            mechanism,
            dry_run,
            updated: UpdateFlag::default(),
        }
    }

    pub fn mechanism(&self) -> &M {
        &self.mechanism
    }

    fn state(&self) -> Result<State> {
        if !self.mechanism.exists()? {
            return Ok(State::Absent);
        }
        if self.mechanism.in_sync()? {
            Ok(State::Current)
        } else {
            Ok(State::Stale)
        }
    }

    fn invalid(&self, action: Action) -> Error {
        Error::InvalidAction {
            kind: self.mechanism.kind(),
            action: action.to_string(),
        }
    }

    /// Log the intent and, unless dry-run is active, perform `op`
    fn gate(&mut self, verb: &str, op: fn(&M) -> Result<()>) -> Result<()> {
        let target = self.mechanism.target();
        if self.dry_run.is_active() {
            log::info!("(would) {verb}: '{target}'");
            self.mechanism.preview();
        } else {
            log::info!("{verb}: '{target}'");
            op(&self.mechanism)?;
        }
        self.updated.mark();
        Ok(())
    }

    fn converge(&mut self) -> Result<()> {
        let action = self.mechanism.present_action();
        match self.state()? {
            State::Current => {
                log::debug!("already {}: '{}'", action.done(), self.mechanism.target());
                Ok(())
            }
            State::Stale => self.gate("update", M::update),
            State::Absent => self.gate(action.as_str(), M::create),
        }
    }

    fn remove(&mut self) -> Result<()> {
        if !self.mechanism.exists()? {
            log::debug!("already removed: '{}'", self.mechanism.target());
            return Ok(());
        }
        self.gate("remove", M::remove)
    }
}

impl<M: Mechanism> Provider for Reconciler<M> {
    fn kind(&self) -> &'static str {
        self.mechanism.kind()
    }

    fn provider_name(&self) -> &'static str {
        self.mechanism.provider_name()
    }

    fn target(&self) -> String {
        self.mechanism.target()
    }

    fn uptodate(&self, action: Action) -> Result<bool> {
        if action == self.mechanism.present_action() {
            Ok(self.state()? == State::Current)
        } else if action == Action::Remove {
            Ok(!self.mechanism.exists()?)
        } else {
            Err(self.invalid(action))
        }
    }

    fn run(&mut self, action: Action) -> Result<()> {
        if action == self.mechanism.present_action() {
            self.converge()
        } else if action == Action::Remove {
            self.remove()
        } else {
            Err(self.invalid(action))
        }
    }

    fn take_updated(&mut self) -> bool {
        self.updated.take()
    }
}
