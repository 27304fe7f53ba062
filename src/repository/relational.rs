use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::backend::{BackendError, RelationalSession, Statement};
use crate::entity::{Entity, EntityKey, EntityModel};
use crate::error::{DatabaseError, DatabaseResult};
use crate::mapping::{ErrorContext, ExceptionMapper, RelationalExceptionMapper};
use crate::repository::Repository;

/// Commits a relational session, turning failures into domain errors.
///
/// On failure the session is rolled back and the backend error is mapped
/// with the given entity context. The mapped error keeps the backend error
/// as its source.
pub struct CommitManager<S> {
    session: Arc<S>,
    mapper: Arc<dyn ExceptionMapper>,
}

impl<S: RelationalSession> CommitManager<S> {
    pub fn new(session: Arc<S>, mapper: Arc<dyn ExceptionMapper>) -> Self {
        Self { session, mapper }
    }

    /// Commit, or roll back and return the mapped error.
    ///
    /// `entity_id` defaults to `"unknown"` in the mapped error.
    pub async fn safe_commit(&self, entity_type: &str, entity_id: Option<&str>) -> DatabaseResult<()> {
        let error = match self.session.commit().await {
            Ok(()) => return Ok(()),
            Err(error) => error,
        };

        if let Err(rollback_error) = self.session.rollback().await {
            warn!(error = %rollback_error, "rollback after failed commit also failed");
        }

        let context = ErrorContext::for_type(entity_type).entity_id(entity_id.unwrap_or("unknown"));
        Err(self.mapper.map(&error, &context).caused_by(error))
    }
}

impl<S> Clone for CommitManager<S> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            mapper: Arc::clone(&self.mapper),
        }
    }
}

/// Repository over an external ORM-style [`RelationalSession`].
///
/// A thin pass-through: lookups become `fetch`/`select`, inserts `add`,
/// updates `merge`, deletes `delete` or a delete-all statement. Backend
/// errors are classified by the exception mapper. Duplicate ids are only
/// detected by the database, so with auto-commit off they surface when the
/// owning unit of work commits.
pub struct RelationalRepository<T, S> {
    session: Arc<S>,
    model: EntityModel,
    auto_commit: bool,
    mapper: Arc<dyn ExceptionMapper>,
    commits: CommitManager<S>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity, S: RelationalSession> RelationalRepository<T, S> {
    /// Repository using the default relational exception mapper.
    pub fn new(session: Arc<S>, auto_commit: bool) -> Self {
        Self::with_mapper(session, auto_commit, Arc::new(RelationalExceptionMapper::new()))
    }

    pub fn with_mapper(session: Arc<S>, auto_commit: bool, mapper: Arc<dyn ExceptionMapper>) -> Self {
        let commits = CommitManager::new(Arc::clone(&session), Arc::clone(&mapper));
        Self {
            session,
            model: EntityModel::of::<T>(),
            auto_commit,
            mapper,
            commits,
            _entity: PhantomData,
        }
    }

    /// Bind the repository to a named model of `T`.
    pub fn bound_to(mut self, model: EntityModel) -> DatabaseResult<Self> {
        if !model.is_type::<T>() {
            return Err(DatabaseError::model_mismatch(
                model.name(),
                EntityModel::of::<T>().name(),
            ));
        }
        self.model = model;
        Ok(self)
    }

    pub fn model(&self) -> EntityModel {
        self.model
    }

    pub fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    pub fn session(&self) -> &Arc<S> {
        &self.session
    }

    fn ensure_model(&self, entity: &T) -> DatabaseResult<()> {
        let actual = entity.model();
        if actual != self.model {
            return Err(DatabaseError::model_mismatch(self.model.name(), actual.name()));
        }
        Ok(())
    }

    fn map_error(&self, error: BackendError, entity_id: Option<&str>) -> DatabaseError {
        let mut context = ErrorContext::for_type(self.model.name());
        context.entity_id = entity_id.map(str::to_string);
        self.mapper.map(&error, &context).caused_by(error)
    }

    async fn commit_if_enabled(&self, entity_id: &str) -> DatabaseResult<()> {
        if self.auto_commit {
            self.commits.safe_commit(self.model.name(), Some(entity_id)).await?;
        }
        Ok(())
    }

    async fn fetch(&self, key: &EntityKey) -> DatabaseResult<T> {
        self.session
            .fetch(self.model, key)
            .await
            .map_err(|e| self.map_error(e, Some(key.as_str())))?
            .ok_or_else(|| DatabaseError::not_found(self.model.name(), key))
    }
}

impl<T, S> std::fmt::Debug for RelationalRepository<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationalRepository")
            .field("model", &self.model.name())
            .field("auto_commit", &self.auto_commit)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<T: Entity, S: RelationalSession> Repository<T> for RelationalRepository<T, S> {
    #[tracing::instrument(skip(self, id), fields(entity_type = %self.model, entity_id = %id))]
    async fn get_by_id(&self, id: &T::Id) -> DatabaseResult<T> {
        self.fetch(&EntityKey::from_id(id)).await
    }

    #[tracing::instrument(skip(self), fields(entity_type = %self.model))]
    async fn get_all(&self, limit: Option<i64>, offset: i64) -> DatabaseResult<Vec<T>> {
        self.session
            .select(self.model, limit, offset)
            .await
            .map_err(|e| self.map_error(e, None))
    }

    #[tracing::instrument(skip(self, entity), fields(entity_type = %self.model, entity_id = %entity.id()))]
    async fn insert_one(&self, entity: T) -> DatabaseResult<T> {
        self.ensure_model(&entity)?;
        let key = entity.key();

        self.session
            .add(self.model, entity.clone())
            .await
            .map_err(|e| self.map_error(e, Some(key.as_str())))?;

        self.commit_if_enabled(key.as_str()).await?;
        Ok(entity)
    }

    #[tracing::instrument(skip(self, entities), fields(entity_type = %self.model, count = entities.len()))]
    async fn insert_many(&self, entities: Vec<T>) -> DatabaseResult<Vec<T>> {
        if entities.is_empty() {
            return Ok(entities);
        }
        for entity in &entities {
            self.ensure_model(entity)?;
        }

        self.session
            .add_all(self.model, entities.clone())
            .await
            .map_err(|e| self.map_error(e, Some("multiple entities")))?;

        self.commit_if_enabled("multiple entities").await?;
        Ok(entities)
    }

    #[tracing::instrument(skip(self, entity), fields(entity_type = %self.model, entity_id = %entity.id()))]
    async fn update(&self, entity: T) -> DatabaseResult<T> {
        self.ensure_model(&entity)?;
        let key = entity.key();
        self.fetch(&key).await?;

        let merged = self
            .session
            .merge(self.model, entity)
            .await
            .map_err(|e| self.map_error(e, Some(key.as_str())))?;

        self.commit_if_enabled(key.as_str()).await?;
        Ok(merged)
    }

    #[tracing::instrument(skip(self, id), fields(entity_type = %self.model, entity_id = %id))]
    async fn delete_by_id(&self, id: &T::Id) -> DatabaseResult<()> {
        let key = EntityKey::from_id(id);
        let existing = self.fetch(&key).await?;

        self.session
            .delete(self.model, existing)
            .await
            .map_err(|e| self.map_error(e, Some(key.as_str())))?;

        self.commit_if_enabled(key.as_str()).await
    }

    #[tracing::instrument(skip(self), fields(entity_type = %self.model))]
    async fn delete_all(&self) -> DatabaseResult<()> {
        self.session
            .execute(Statement::DeleteAll(self.model))
            .await
            .map_err(|e| self.map_error(e, Some("all")))?;

        self.commit_if_enabled("all").await
    }
}
