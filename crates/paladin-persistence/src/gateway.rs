use crate::errors::PersistenceError;
use sqlx::{PgPool, Postgres, Transaction};

/// A hook run once a unit of work has durably committed.
pub type PostCommitHook = Box<dyn FnOnce() + Send>;
/// A hook run once a unit of work has rolled back.
pub type PostRollbackHook = Box<dyn FnOnce() + Send>;

/// One unit of work: an open `sqlx` transaction plus the hooks that will
/// fire once its outcome (commit or rollback) is known.
pub struct Tx<'a> {
    inner: Transaction<'a, Postgres>,
    post_commit: Vec<PostCommitHook>,
    post_rollback: Vec<PostRollbackHook>,
}

impl<'a> Tx<'a> {
    /// Borrow the underlying `sqlx` executor for queries.
    pub fn conn(&mut self) -> &mut Transaction<'a, Postgres> {
        &mut self.inner
    }

    /// Register a hook to run after this unit of work commits. Used for
    /// cache fills: per §5, caches are populated only from PostCommit so
    /// a rolled-back write never pollutes them.
    pub fn on_commit(&mut self, hook: impl FnOnce() + Send + 'static) {
        self.post_commit.push(Box::new(hook));
    }

    /// Register a hook to run after this unit of work rolls back. Used
    /// for idempotency checks per §4.6: the insert runs with a
    /// do-nothing-on-conflict clause, and a PostRollback hook re-queries
    /// for the idempotency key to tell a genuine error apart from a
    /// known-idempotent duplicate.
    pub fn on_rollback(&mut self, hook: impl FnOnce() + Send + 'static) {
        self.post_rollback.push(Box::new(hook));
    }

    async fn commit(self) -> Result<(), PersistenceError> {
        self.inner.commit().await?;
        for hook in self.post_commit {
            hook();
        }
        Ok(())
    }

    async fn rollback(self) {
        let _ = self.inner.rollback().await;
        for hook in self.post_rollback {
            hook();
        }
    }
}

/// Transactional gateway to the relational store (C1).
#[derive(Clone)]
pub struct Gateway {
    pool: PgPool,
}

impl Gateway {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(dsn: &str) -> Result<Self, PersistenceError> {
        let pool = PgPool::connect(dsn).await?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<(), PersistenceError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs `body` inside a single DB transaction. `body` may register
    /// PostCommit/PostRollback hooks on the `Tx` it's handed; those fire
    /// exactly once, after the database has durably recorded the
    /// outcome.
    ///
    /// On `Ok`, the transaction commits and PostCommit hooks run. On
    /// `Err`, the transaction rolls back and PostRollback hooks run; the
    /// error is returned unchanged so the caller can distinguish a
    /// genuine error from an idempotency collision it detects in its own
    /// rollback hook.
    pub async fn transaction<F, Fut, T>(&self, body: F) -> Result<T, PersistenceError>
    where
        F: FnOnce(&mut Tx<'_>) -> Fut,
        Fut: std::future::Future<Output = Result<T, PersistenceError>>,
    {
        let inner = self.pool.begin().await?;
        let mut tx = Tx { inner, post_commit: Vec::new(), post_rollback: Vec::new() };
        match body(&mut tx).await {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                tx.rollback().await;
                Err(err)
            }
        }
    }
}
