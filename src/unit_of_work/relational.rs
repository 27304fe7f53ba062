use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::backend::{BackendError, RelationalSession, SessionFactory};
use crate::entity::{Entity, EntityModel};
use crate::error::{DatabaseError, DatabaseResult};
use crate::mapping::{ErrorContext, ExceptionMapper, RelationalExceptionMapper};
use crate::repository::{CommitManager, RelationalRepository};
use crate::unit_of_work::UnitOfWork;

type AnyRepository = Box<dyn Any + Send + Sync>;
type RepositoryMaker<S> =
    fn(Arc<S>, Arc<dyn ExceptionMapper>, EntityModel) -> DatabaseResult<AnyRepository>;

fn make_repository<T: Entity, S: RelationalSession + 'static>(
    session: Arc<S>,
    mapper: Arc<dyn ExceptionMapper>,
    model: EntityModel,
) -> DatabaseResult<AnyRepository> {
    let repository =
        RelationalRepository::<T, S>::with_mapper(session, false, mapper).bound_to(model)?;
    Ok(Box::new(repository))
}

/// Configures a [`RelationalUnitOfWork`] around a session factory.
pub struct RelationalUnitOfWorkBuilder<F: SessionFactory> {
    factory: F,
    mapper: Arc<dyn ExceptionMapper>,
    models: Vec<(EntityModel, RepositoryMaker<F::Session>)>,
}

impl<F> RelationalUnitOfWorkBuilder<F>
where
    F: SessionFactory,
    F::Session: 'static,
{
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            mapper: Arc::new(RelationalExceptionMapper::new()),
            models: Vec::new(),
        }
    }

    pub fn register<T: Entity>(self) -> Self {
        self.register_model::<T>(EntityModel::of::<T>())
    }

    pub fn register_model<T: Entity>(mut self, model: EntityModel) -> Self {
        let make: RepositoryMaker<F::Session> = make_repository::<T, F::Session>;
        self.models.push((model, make));
        self
    }

    /// Replace the default relational exception mapper.
    pub fn mapper(mut self, mapper: Arc<dyn ExceptionMapper>) -> Self {
        self.mapper = mapper;
        self
    }

    /// Open one session from the factory and build the repositories on it.
    pub fn open(&self) -> DatabaseResult<RelationalUnitOfWork<F::Session>> {
        let session = Arc::new(self.factory.open());

        let mut repositories = HashMap::with_capacity(self.models.len());
        for (model, make) in &self.models {
            repositories.insert(*model, make(Arc::clone(&session), Arc::clone(&self.mapper), *model)?);
        }

        let entity_type = match self.models.as_slice() {
            [(model, _)] => model.name(),
            _ => "Entity",
        };

        debug!(models = repositories.len(), "relational unit of work opened");
        Ok(RelationalUnitOfWork {
            commits: CommitManager::new(Arc::clone(&session), Arc::clone(&self.mapper)),
            session,
            mapper: Arc::clone(&self.mapper),
            entity_type,
            repositories: Arc::new(repositories),
        })
    }
}

/// Unit of work over one session from a [`SessionFactory`].
///
/// The session buffers every change made through the repositories until
/// [`commit`](UnitOfWork::commit). Commit failures are rolled back and
/// mapped to domain errors. Clones share the session and repositories.
pub struct RelationalUnitOfWork<S> {
    session: Arc<S>,
    commits: CommitManager<S>,
    mapper: Arc<dyn ExceptionMapper>,
    /// Entity type reported when a commit fails.
    entity_type: &'static str,
    repositories: Arc<HashMap<EntityModel, AnyRepository>>,
}

impl<S: RelationalSession + 'static> RelationalUnitOfWork<S> {
    pub fn builder<F>(factory: F) -> RelationalUnitOfWorkBuilder<F>
    where
        F: SessionFactory<Session = S>,
    {
        RelationalUnitOfWorkBuilder::new(factory)
    }

    pub fn session(&self) -> &Arc<S> {
        &self.session
    }

    pub fn repository<T: Entity>(&self) -> Option<&RelationalRepository<T, S>> {
        self.repository_for(EntityModel::of::<T>())
    }

    pub fn repository_for<T: Entity>(&self, model: EntityModel) -> Option<&RelationalRepository<T, S>> {
        self.repositories.get(&model)?.downcast_ref()
    }

    /// Run `f`, then roll back whatever it left uncommitted and close the
    /// session.
    ///
    /// Rollback and close are awaited after `f` completes. If the returned
    /// future is dropped or cancelled first, neither runs here; cleanup is
    /// left to the session's own drop behaviour, or to an explicit
    /// [`close`](UnitOfWork::close) on a clone kept by the caller.
    pub async fn run<F, Fut, R>(self, f: F) -> R
    where
        F: FnOnce(RelationalUnitOfWork<S>) -> Fut,
        Fut: Future<Output = R>,
    {
        let closing = self.clone();
        let result = f(self).await;
        if let Err(err) = closing.close().await {
            warn!(error = %err, "failed to close relational unit of work");
        }
        result
    }

    fn map_error(&self, error: BackendError) -> DatabaseError {
        self.mapper
            .map(&error, &ErrorContext::for_type(self.entity_type))
            .caused_by(error)
    }
}

impl<S> Clone for RelationalUnitOfWork<S> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            commits: self.commits.clone(),
            mapper: Arc::clone(&self.mapper),
            entity_type: self.entity_type,
            repositories: Arc::clone(&self.repositories),
        }
    }
}

#[async_trait]
impl<S: RelationalSession + 'static> UnitOfWork for RelationalUnitOfWork<S> {
    async fn commit(&self) -> DatabaseResult<()> {
        self.commits.safe_commit(self.entity_type, None).await
    }

    async fn rollback(&self) -> DatabaseResult<()> {
        self.session.rollback().await.map_err(|e| self.map_error(e))
    }

    async fn close(&self) -> DatabaseResult<()> {
        let rolled_back = self.rollback().await;
        self.session.close().await.map_err(|e| self.map_error(e))?;
        rolled_back
    }
}
