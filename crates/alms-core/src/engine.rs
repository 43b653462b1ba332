//! [`Engine`], the entry point for every domain operation.
//!
//! Operations are spread over the modules that own their rules
//! ([`crate::identity`], [`crate::workflow`], [`crate::review`],
//! [`crate::messaging`]); this module holds the shared plumbing: running a
//! mutation as one store transaction, queueing its events, and delivering
//! notifications once the mutation has committed.

use std::sync::Arc;

use crate::{
  Result,
  notification::Notification,
  notify::{self, WorkflowEvent},
  session::{Actor, CredentialHasher, Principal, SessionContext},
  store::{DonationStore, Tx},
};

/// Events raised by a mutation, queued in the outbox on commit.
pub type Events = Vec<WorkflowEvent>;

/// Cloning is cheap; the store and hasher are reference-counted.
pub struct Engine<S> {
  store:  Arc<S>,
  hasher: Arc<dyn CredentialHasher>,
}

impl<S> Clone for Engine<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), hasher: Arc::clone(&self.hasher) }
  }
}

impl<S: DonationStore> Engine<S> {
  pub fn new(store: Arc<S>, hasher: Arc<dyn CredentialHasher>) -> Self {
    Self { store, hasher }
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  pub(crate) fn hasher(&self) -> &dyn CredentialHasher { self.hasher.as_ref() }

  /// Run a read-only closure in a transaction.
  pub(crate) async fn read<T, F>(&self, f: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&dyn Tx) -> Result<T> + Send + 'static,
  {
    self.store.transact(move |tx| f(tx)).await
  }

  /// Run a mutation as one atomic unit, queue the events it raised, and
  /// deliver them after commit.
  pub(crate) async fn commit<T, F>(&self, f: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&mut dyn Tx, &mut Events) -> Result<T> + Send + 'static,
  {
    let (value, raised) = self
      .store
      .transact(move |tx| {
        let mut events = Events::new();
        let value = f(tx, &mut events)?;
        for event in &events {
          tx.enqueue_event(event)?;
        }
        Ok((value, !events.is_empty()))
      })
      .await?;

    if raised {
      self.deliver().await;
    }
    Ok(value)
  }

  /// Best-effort flush after a committed mutation. Failures are logged and
  /// the events stay queued for [`Engine::flush_notifications`].
  async fn deliver(&self) {
    if let Err(e) = self.flush_notifications().await {
      tracing::warn!(error = %e, "notification dispatch failed; events remain queued");
    }
  }

  /// Turn queued workflow events into notifications. Returns the
  /// notifications created by this flush.
  pub async fn flush_notifications(&self) -> Result<Vec<Notification>> {
    let created = self.store.transact(notify::flush).await?;
    if !created.is_empty() {
      tracing::debug!(count = created.len(), "notifications dispatched");
    }
    Ok(created)
  }

  /// Number of events still waiting for dispatch (up to one flush batch).
  pub async fn pending_events(&self) -> Result<usize> {
    self
      .read(|tx| Ok(tx.pending_events(notify::FLUSH_BATCH)?.len()))
      .await
  }

  /// Re-resolve the principal behind a session from the store.
  ///
  /// Missing context or a since-deleted user yields
  /// [`crate::Error::Unauthenticated`]. An association id that no longer
  /// belongs to the user is dropped and the user acts as themselves.
  pub async fn resolve_principal(
    &self,
    context: Option<SessionContext>,
  ) -> Result<Principal> {
    let Some(ctx) = context else {
      return Err(crate::Error::Unauthenticated);
    };
    self.read(move |tx| resolve_in(tx, ctx)).await
  }
}

pub(crate) fn resolve_in(tx: &dyn Tx, ctx: SessionContext) -> Result<Principal> {
  let user = tx.user(ctx.user_id)?.ok_or(crate::Error::Unauthenticated)?;

  let owned = match ctx.association_id {
    Some(id) => tx.association(id)?.filter(|a| a.owner_id == user.id),
    None => None,
  };
  let actor = match owned {
    Some(a) => Actor::Association { user_id: user.id, association_id: a.id },
    None => Actor::Individual { user_id: user.id },
  };

  Ok(Principal { user_id: user.id, role: user.role, actor })
}
