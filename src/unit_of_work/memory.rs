use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::entity::{Entity, EntityModel};
use crate::error::DatabaseResult;
use crate::repository::InMemoryRepository;
use crate::session::InMemorySession;
use crate::unit_of_work::UnitOfWork;

type AnyRepository = Box<dyn Any + Send + Sync>;
type RepositoryMaker = fn(InMemorySession, EntityModel) -> DatabaseResult<AnyRepository>;

fn make_repository<T: Entity>(
    session: InMemorySession,
    model: EntityModel,
) -> DatabaseResult<AnyRepository> {
    let repository = InMemoryRepository::<T>::with_session(session, false).bound_to(model)?;
    Ok(Box::new(repository))
}

/// Configures an [`InMemoryUnitOfWork`].
#[derive(Default)]
pub struct InMemoryUnitOfWorkBuilder {
    session: Option<InMemorySession>,
    models: Vec<(EntityModel, RepositoryMaker)>,
}

impl InMemoryUnitOfWorkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a repository for `T`'s default model.
    pub fn register<T: Entity>(self) -> Self {
        self.register_model::<T>(EntityModel::of::<T>())
    }

    /// Add a repository bound to a named model of `T`.
    pub fn register_model<T: Entity>(mut self, model: EntityModel) -> Self {
        let make: RepositoryMaker = make_repository::<T>;
        self.models.push((model, make));
        self
    }

    /// Share an existing session instead of creating a fresh one.
    pub fn session(mut self, session: InMemorySession) -> Self {
        self.session = Some(session);
        self
    }

    /// Build the repositories and begin the first transaction.
    ///
    /// Fails if a registered model does not belong to its Rust type, or if
    /// the shared session already has an open transaction.
    pub async fn open(self) -> DatabaseResult<InMemoryUnitOfWork> {
        let session = self.session.unwrap_or_default();

        let mut repositories = HashMap::with_capacity(self.models.len());
        for (model, make) in self.models {
            repositories.insert(model, make(session.clone(), model)?);
        }

        session.begin().await?;
        debug!(models = repositories.len(), "unit of work opened");

        Ok(InMemoryUnitOfWork {
            session,
            repositories: Arc::new(repositories),
            closed: Arc::new(AtomicBool::new(false)),
        })
    }
}

/// Unit of work over an [`InMemorySession`].
///
/// A transaction is open from [`open`](InMemoryUnitOfWorkBuilder::open)
/// until [`close`](UnitOfWork::close). Each commit or rollback ends the
/// current transaction and begins the next one, unless the unit is closed.
/// Clones share the session, repositories and closed state.
#[derive(Clone)]
pub struct InMemoryUnitOfWork {
    session: InMemorySession,
    repositories: Arc<HashMap<EntityModel, AnyRepository>>,
    closed: Arc<AtomicBool>,
}

impl InMemoryUnitOfWork {
    pub fn builder() -> InMemoryUnitOfWorkBuilder {
        InMemoryUnitOfWorkBuilder::new()
    }

    pub fn session(&self) -> &InMemorySession {
        &self.session
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Repository for `T`'s default model, if registered.
    pub fn repository<T: Entity>(&self) -> Option<&InMemoryRepository<T>> {
        self.repository_for(EntityModel::of::<T>())
    }

    /// Repository for a named model, if registered.
    pub fn repository_for<T: Entity>(&self, model: EntityModel) -> Option<&InMemoryRepository<T>> {
        self.repositories.get(&model)?.downcast_ref()
    }

    /// Registered models, in no particular order.
    pub fn models(&self) -> impl Iterator<Item = EntityModel> + '_ {
        self.repositories.keys().copied()
    }

    /// Closed units stay closed: ending a transaction does not open another.
    async fn begin_next(&self) -> DatabaseResult<()> {
        if self.is_closed() {
            debug!("unit of work is closed; no new transaction");
            return Ok(());
        }
        self.session.begin().await
    }

    /// Run `f`, then roll back whatever it left uncommitted and close.
    ///
    /// Changes persist only if `f` commits them. If the returned future is
    /// dropped early, the open transaction is rolled back as well.
    pub async fn run<F, Fut, R>(self, f: F) -> R
    where
        F: FnOnce(InMemoryUnitOfWork) -> Fut,
        Fut: Future<Output = R>,
    {
        let _closing = CloseOnDrop(self.clone());
        f(self).await
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn commit(&self) -> DatabaseResult<()> {
        self.session.commit().await;
        self.begin_next().await
    }

    async fn rollback(&self) -> DatabaseResult<()> {
        self.session.rollback().await;
        self.begin_next().await
    }

    async fn close(&self) -> DatabaseResult<()> {
        self.closed.store(true, Ordering::Release);
        self.session.close().await;
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryUnitOfWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let models: Vec<&str> = self.repositories.keys().map(|m| m.name()).collect();
        f.debug_struct("InMemoryUnitOfWork")
            .field("session", &self.session)
            .field("models", &models)
            .field("closed", &self.is_closed())
            .finish()
    }
}

struct CloseOnDrop(InMemoryUnitOfWork);

impl Drop for CloseOnDrop {
    fn drop(&mut self) {
        self.0.closed.store(true, Ordering::Release);
        if self.0.session.rollback_now() {
            debug!("unit of work closed; uncommitted changes rolled back");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::init_tracing;
    use crate::error::DatabaseError;
    use crate::repository::Repository;

    #[derive(Debug, Clone, PartialEq)]
    struct User {
        id: String,
        name: String,
    }

    impl Entity for User {
        type Id = String;

        fn id(&self) -> &String {
            &self.id
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Company {
        id: u32,
        name: String,
    }

    impl Entity for Company {
        type Id = u32;

        fn id(&self) -> &u32 {
            &self.id
        }
    }

    fn user(id: &str, name: &str) -> User {
        User {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    fn company(id: u32, name: &str) -> Company {
        Company {
            id,
            name: name.to_string(),
        }
    }

    async fn open() -> InMemoryUnitOfWork {
        init_tracing();
        InMemoryUnitOfWork::builder()
            .register::<User>()
            .register::<Company>()
            .open()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_open_begins_transaction() {
        let uow = open().await;
        assert!(uow.session().in_transaction());
        assert_eq!(uow.models().count(), 2);
        assert!(!uow.repository::<User>().unwrap().auto_commit());
    }

    #[tokio::test]
    async fn test_commit_spans_repositories() {
        let uow = open().await;
        let users = uow.repository::<User>().unwrap();
        let companies = uow.repository::<Company>().unwrap();

        users.insert_one(user("u1", "Alice")).await.unwrap();
        companies.insert_one(company(1, "Acme")).await.unwrap();
        assert!(users.entities().unwrap().is_empty());
        assert!(companies.entities().unwrap().is_empty());

        uow.commit().await.unwrap();
        assert_eq!(users.entities().unwrap(), vec![user("u1", "Alice")]);
        assert_eq!(companies.entities().unwrap(), vec![company(1, "Acme")]);
        assert!(uow.session().in_transaction());
    }

    #[tokio::test]
    async fn test_rollback_discards_and_keeps_unit_usable() {
        let uow = open().await;
        let users = uow.repository::<User>().unwrap();

        users.insert_one(user("u1", "Alice")).await.unwrap();
        uow.rollback().await.unwrap();
        assert!(users.get_by_id(&"u1".to_string()).await.unwrap_err().is_not_found());

        users.insert_one(user("u2", "Bob")).await.unwrap();
        uow.commit().await.unwrap();
        assert_eq!(users.entities().unwrap(), vec![user("u2", "Bob")]);
    }

    #[tokio::test]
    async fn test_close_discards_uncommitted_changes() {
        let uow = open().await;
        let users = uow.repository::<User>().unwrap();
        users.insert_one(user("u1", "Alice")).await.unwrap();

        uow.close().await.unwrap();
        uow.close().await.unwrap();

        assert!(!uow.session().in_transaction());
        assert!(users.entities().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_commit_after_close_does_not_reopen() {
        let uow = open().await;
        uow.close().await.unwrap();

        uow.commit().await.unwrap();
        uow.rollback().await.unwrap();
        assert!(uow.is_closed());
        assert!(!uow.session().in_transaction());

        let users = uow.repository::<User>().unwrap();
        users.insert_one(user("u1", "Alice")).await.unwrap();
        assert_eq!(users.entities().unwrap(), vec![user("u1", "Alice")]);
    }

    #[tokio::test]
    async fn test_finished_run_closes_unit() {
        let uow = open().await;
        let outside = uow.clone();

        uow.run(|uow| async move { uow.commit().await }).await.unwrap();

        assert!(outside.is_closed());
        outside.rollback().await.unwrap();
        assert!(!outside.session().in_transaction());
    }

    #[tokio::test]
    async fn test_run_persists_only_committed_work() {
        let uow = open().await;
        let session = uow.session().clone();

        let result: DatabaseResult<()> = uow
            .run(|uow| async move {
                let users = uow.repository::<User>().unwrap();
                users.insert_one(user("u1", "Alice")).await?;
                uow.commit().await?;
                users.insert_one(user("u2", "Bob")).await?;
                Ok(())
            })
            .await;

        assert!(result.is_ok());
        assert!(!session.in_transaction());
        let names: Vec<String> = session
            .committed_entities::<User>(EntityModel::of::<User>())
            .unwrap()
            .into_iter()
            .map(|u| u.name)
            .collect();
        assert_eq!(names, vec!["Alice"]);
    }

    #[tokio::test]
    async fn test_run_rolls_back_on_error() {
        let uow = open().await;
        let session = uow.session().clone();

        let result: DatabaseResult<()> = uow
            .run(|uow| async move {
                let users = uow.repository::<User>().unwrap();
                users.insert_one(user("u1", "Alice")).await?;
                users.insert_one(user("u1", "Duplicate")).await?;
                uow.commit().await
            })
            .await;

        assert!(matches!(result, Err(DatabaseError::EntityAlreadyExists { .. })));
        assert!(session
            .committed_entities::<User>(EntityModel::of::<User>())
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_dropped_run_rolls_back() {
        let uow = open().await;
        let session = uow.session().clone();

        let pending = uow.run(|uow| async move {
            let users = uow.repository::<User>().unwrap();
            users.insert_one(user("u1", "Alice")).await.unwrap();
            std::future::pending::<()>().await
        });
        let _ = tokio::time::timeout(std::time::Duration::from_millis(10), pending).await;

        assert!(!session.in_transaction());
        assert!(session
            .committed_entities::<User>(EntityModel::of::<User>())
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_unregistered_repository_is_none() {
        let uow = InMemoryUnitOfWork::builder()
            .register::<User>()
            .open()
            .await
            .unwrap();
        assert!(uow.repository::<Company>().is_none());
    }

    #[tokio::test]
    async fn test_register_model_checks_type() {
        let err = InMemoryUnitOfWork::builder()
            .register_model::<User>(EntityModel::of::<Company>())
            .open()
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_shared_session_with_open_transaction_is_rejected() {
        let session = InMemorySession::new();
        session.begin().await.unwrap();

        let err = InMemoryUnitOfWork::builder()
            .register::<User>()
            .session(session)
            .open()
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::TransactionAlreadyActive { .. }));
    }

    #[tokio::test]
    async fn test_units_of_work_are_isolated() {
        let first = open().await;
        let second = open().await;

        first
            .repository::<User>()
            .unwrap()
            .insert_one(user("u1", "Alice"))
            .await
            .unwrap();
        first.commit().await.unwrap();

        assert_eq!(second.repository::<User>().unwrap().count().unwrap(), 0);
    }
}
