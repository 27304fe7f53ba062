use std::collections::HashSet;
use std::marker::PhantomData;

use async_trait::async_trait;
use tracing::debug;

use crate::entity::{Entity, EntityKey, EntityModel};
use crate::error::{DatabaseError, DatabaseResult};
use crate::repository::{Pagination, Repository};
use crate::session::{InMemorySession, StorageMap};

/// Repository over an [`InMemorySession`].
///
/// Reads and writes go through the session's active storage view, so
/// inside a transaction they touch the staging area only. Entities are keyed
/// by the string form of their id and kept in insertion order.
pub struct InMemoryRepository<T> {
    session: InMemorySession,
    model: EntityModel,
    auto_commit: bool,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> InMemoryRepository<T> {
    /// Auto-commit repository over a private session.
    pub fn new() -> Self {
        Self::with_session(InMemorySession::new(), true)
    }

    /// Repository over a shared session.
    ///
    /// With `auto_commit` off, writes stay in the session until someone
    /// commits it, typically a unit of work.
    pub fn with_session(session: InMemorySession, auto_commit: bool) -> Self {
        Self {
            session,
            model: EntityModel::of::<T>(),
            auto_commit,
            _entity: PhantomData,
        }
    }

    /// Bind the repository to a named model of `T`.
    ///
    /// Only entities whose [`Entity::model`] equals `model` are accepted,
    /// and storage is kept apart from other models of the same Rust type.
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

    pub fn session(&self) -> &InMemorySession {
        &self.session
    }

    /// Committed entities, ignoring anything staged by an open transaction.
    pub fn entities(&self) -> DatabaseResult<Vec<T>> {
        self.session.committed_entities(self.model)
    }

    /// Number of entities in the active storage view.
    pub fn count(&self) -> DatabaseResult<usize> {
        self.with_storage(|map| Ok(map.len()))
    }

    pub fn exists(&self, id: &T::Id) -> DatabaseResult<bool> {
        let key = EntityKey::from_id(id);
        self.with_storage(|map| Ok(map.contains_key(key.as_str())))
    }

    fn with_storage<R>(
        &self,
        f: impl FnOnce(&mut StorageMap<T>) -> DatabaseResult<R>,
    ) -> DatabaseResult<R> {
        self.session.with_active_storage(self.model, f)?
    }

    fn ensure_model(&self, entity: &T) -> DatabaseResult<()> {
        let actual = entity.model();
        if actual != self.model {
            return Err(DatabaseError::model_mismatch(self.model.name(), actual.name()));
        }
        Ok(())
    }

    fn not_found(&self, key: &EntityKey) -> DatabaseError {
        DatabaseError::not_found(self.model.name(), key)
    }

    fn already_exists(&self, key: &EntityKey) -> DatabaseError {
        DatabaseError::already_exists(self.model.name(), key)
    }

    async fn commit_if_enabled(&self) {
        if self.auto_commit {
            self.session.commit().await;
        }
    }
}

impl<T: Entity> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for InMemoryRepository<T> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
            model: self.model,
            auto_commit: self.auto_commit,
            _entity: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for InMemoryRepository<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRepository")
            .field("model", &self.model.name())
            .field("auto_commit", &self.auto_commit)
            .field("session", &self.session)
            .finish()
    }
}

#[async_trait]
impl<T: Entity> Repository<T> for InMemoryRepository<T> {
    #[tracing::instrument(skip(self, id), fields(entity_type = %self.model, entity_id = %id))]
    async fn get_by_id(&self, id: &T::Id) -> DatabaseResult<T> {
        let key = EntityKey::from_id(id);
        self.with_storage(|map| {
            map.get(key.as_str())
                .cloned()
                .ok_or_else(|| self.not_found(&key))
        })
    }

    #[tracing::instrument(skip(self), fields(entity_type = %self.model))]
    async fn get_all(&self, limit: Option<i64>, offset: i64) -> DatabaseResult<Vec<T>> {
        let page = Pagination::new(limit, offset)?;
        self.with_storage(|map| Ok(page.apply(map.values()).cloned().collect()))
    }

    #[tracing::instrument(skip(self, entity), fields(entity_type = %self.model, entity_id = %entity.id()))]
    async fn insert_one(&self, entity: T) -> DatabaseResult<T> {
        self.ensure_model(&entity)?;
        let key = entity.key();

        self.with_storage(|map| {
            if map.contains_key(key.as_str()) {
                return Err(self.already_exists(&key));
            }
            map.insert(key.clone(), entity.clone());
            Ok(())
        })?;

        self.commit_if_enabled().await;
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

        self.with_storage(|map| {
            let mut batch = HashSet::with_capacity(entities.len());
            for entity in &entities {
                let key = entity.key();
                if map.contains_key(key.as_str()) || batch.contains(&key) {
                    return Err(self.already_exists(&key));
                }
                batch.insert(key);
            }

            map.extend(entities.iter().map(|entity| (entity.key(), entity.clone())));
            Ok(())
        })?;

        debug!(inserted = entities.len(), "batch stored");
        self.commit_if_enabled().await;
        Ok(entities)
    }

    #[tracing::instrument(skip(self, entity), fields(entity_type = %self.model, entity_id = %entity.id()))]
    async fn update(&self, entity: T) -> DatabaseResult<T> {
        self.ensure_model(&entity)?;
        let key = entity.key();

        self.with_storage(|map| match map.get_mut(key.as_str()) {
            Some(stored) => {
                *stored = entity.clone();
                Ok(())
            }
            None => Err(self.not_found(&key)),
        })?;

        self.commit_if_enabled().await;
        Ok(entity)
    }

    #[tracing::instrument(skip(self, id), fields(entity_type = %self.model, entity_id = %id))]
    async fn delete_by_id(&self, id: &T::Id) -> DatabaseResult<()> {
        let key = EntityKey::from_id(id);
        self.with_storage(|map| {
            map.remove(key.as_str())
                .map(|_| ())
                .ok_or_else(|| self.not_found(&key))
        })?;

        self.commit_if_enabled().await;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(entity_type = %self.model))]
    async fn delete_all(&self) -> DatabaseResult<()> {
        let removed = self.with_storage(|map| {
            let removed = map.len();
            map.clear();
            Ok(removed)
        })?;

        debug!(removed, "model storage cleared");
        self.commit_if_enabled().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

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
    struct Ticket {
        id: u64,
    }

    impl Entity for Ticket {
        type Id = u64;

        fn id(&self) -> &u64 {
            &self.id
        }
    }

    /// One Rust type carrying two logical models.
    #[derive(Debug, Clone, PartialEq)]
    enum Account {
        Admin { id: u32 },
        Member { id: u32 },
    }

    impl Entity for Account {
        type Id = u32;

        fn id(&self) -> &u32 {
            match self {
                Account::Admin { id } | Account::Member { id } => id,
            }
        }

        fn model(&self) -> EntityModel {
            match self {
                Account::Admin { .. } => EntityModel::named::<Account>("Admin"),
                Account::Member { .. } => EntityModel::named::<Account>("Member"),
            }
        }
    }

    fn user(id: &str, name: &str) -> User {
        User {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    fn id(value: &str) -> String {
        value.to_string()
    }

    #[tokio::test]
    async fn test_crud_lifecycle() {
        let repo = InMemoryRepository::<User>::new();

        repo.insert_one(user("u1", "Original")).await.unwrap();
        let updated = repo.update(user("u1", "Updated")).await.unwrap();
        assert_eq!(updated.name, "Updated");
        assert_eq!(repo.get_by_id(&id("u1")).await.unwrap().name, "Updated");

        repo.delete_by_id(&id("u1")).await.unwrap();
        let err = repo.get_by_id(&id("u1")).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "User with id 'u1' not found");
    }

    #[tokio::test]
    async fn test_insert_duplicate_fails() {
        let repo = InMemoryRepository::<User>::new();
        repo.insert_one(user("u1", "Alice")).await.unwrap();

        let err = repo.insert_one(user("u1", "Other")).await.unwrap_err();
        assert!(matches!(err, DatabaseError::EntityAlreadyExists { .. }));
        assert_eq!(repo.get_by_id(&id("u1")).await.unwrap().name, "Alice");
    }

    #[tokio::test]
    async fn test_ids_compare_by_string_form() {
        let repo = InMemoryRepository::<Ticket>::new();
        repo.insert_one(Ticket { id: 42 }).await.unwrap();

        assert!(repo.exists(&42).unwrap());
        assert!(repo.entities().unwrap().contains(&Ticket { id: 42 }));
        assert!(repo.get_by_id(&7).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_fail() {
        let repo = InMemoryRepository::<User>::new();

        let err = repo.update(user("ghost", "x")).await.unwrap_err();
        assert!(err.is_not_found());
        let err = repo.delete_by_id(&id("ghost")).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(repo.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_insert_many_empty_is_noop() {
        let repo = InMemoryRepository::<User>::new();
        assert!(repo.insert_many(Vec::new()).await.unwrap().is_empty());
        assert_eq!(repo.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_insert_many_rejects_duplicates_within_batch() {
        let repo = InMemoryRepository::<User>::new();
        let err = repo
            .insert_many(vec![user("a", "1"), user("b", "2"), user("a", "3")])
            .await
            .unwrap_err();

        assert_eq!(err.entity_id(), Some("a"));
        assert_eq!(repo.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_insert_many_rejects_existing_without_partial_insert() {
        let repo = InMemoryRepository::<User>::new();
        repo.insert_one(user("b", "existing")).await.unwrap();

        let err = repo
            .insert_many(vec![user("a", "1"), user("b", "2")])
            .await
            .unwrap_err();

        assert!(err.is_conflict());
        assert_eq!(repo.count().unwrap(), 1);
        assert!(!repo.exists(&id("a")).unwrap());
    }

    #[tokio::test]
    async fn test_get_all_keeps_insertion_order() {
        let repo = InMemoryRepository::<Ticket>::new();
        for id in [300, 100, 200] {
            repo.insert_one(Ticket { id }).await.unwrap();
        }

        let ids: Vec<u64> = repo
            .get_all(None, 0)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec![300, 100, 200]);
    }

    #[tokio::test]
    async fn test_update_keeps_position() {
        let repo = InMemoryRepository::<User>::new();
        repo.insert_many(vec![user("a", "1"), user("b", "2")])
            .await
            .unwrap();
        repo.update(user("a", "changed")).await.unwrap();

        let names: Vec<String> = repo
            .get_all(None, 0)
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.name)
            .collect();
        assert_eq!(names, vec!["changed", "2"]);
    }

    #[tokio::test]
    async fn test_get_all_pagination_edges() {
        let repo = InMemoryRepository::<Ticket>::new();
        repo.insert_many((1..=5).map(|id| Ticket { id }).collect())
            .await
            .unwrap();

        assert!(repo.get_all(Some(0), 0).await.unwrap().is_empty());
        assert!(repo.get_all(None, 5).await.unwrap().is_empty());
        assert_eq!(repo.get_all(Some(10), 3).await.unwrap().len(), 2);
        assert_eq!(repo.get_all(Some(2), 1).await.unwrap(), vec![Ticket { id: 2 }, Ticket { id: 3 }]);

        let err = repo.get_all(Some(-1), 0).await.unwrap_err();
        assert!(err.is_validation());
        let err = repo.get_all(None, -1).await.unwrap_err();
        assert_eq!(err.to_string(), "offset must be non-negative, got -1");
    }

    #[tokio::test]
    async fn test_delete_all() {
        let repo = InMemoryRepository::<User>::new();
        repo.delete_all().await.unwrap();

        repo.insert_many(vec![user("a", "1"), user("b", "2")])
            .await
            .unwrap();
        repo.delete_all().await.unwrap();
        assert!(repo.get_all(None, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stored_values_do_not_alias_caller_values() {
        let repo = InMemoryRepository::<User>::new();
        let mut alice = user("u1", "Alice");
        repo.insert_one(alice.clone()).await.unwrap();

        alice.name = "Changed".to_string();
        assert_eq!(repo.get_by_id(&id("u1")).await.unwrap().name, "Alice");

        let mut fetched = repo.get_by_id(&id("u1")).await.unwrap();
        fetched.name = "Mutated".to_string();
        assert_eq!(repo.entities().unwrap()[0].name, "Alice");
    }

    #[tokio::test]
    async fn test_model_mismatch_is_rejected() {
        let admins = InMemoryRepository::<Account>::new()
            .bound_to(EntityModel::named::<Account>("Admin"))
            .unwrap();

        admins.insert_one(Account::Admin { id: 1 }).await.unwrap();
        let err = admins.insert_one(Account::Member { id: 2 }).await.unwrap_err();
        assert!(matches!(err, DatabaseError::EntityModel { .. }));
        assert_eq!(err.to_string(), "entity must be of type Admin, got Member");

        let err = admins
            .insert_many(vec![Account::Admin { id: 3 }, Account::Member { id: 4 }])
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(admins.count().unwrap(), 1);

        let err = admins.update(Account::Member { id: 1 }).await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_default_model_rejects_named_variants() {
        let repo = InMemoryRepository::<Account>::new();
        let err = repo.insert_one(Account::Admin { id: 1 }).await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_bound_to_requires_matching_type() {
        let err = InMemoryRepository::<User>::new()
            .bound_to(EntityModel::of::<Ticket>())
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_shared_session_without_auto_commit_stages_writes() {
        let session = InMemorySession::new();
        session.begin().await.unwrap();
        let repo = InMemoryRepository::<User>::with_session(session.clone(), false);
        assert!(!repo.auto_commit());

        repo.insert_one(user("u1", "Alice")).await.unwrap();
        assert!(repo.get_by_id(&id("u1")).await.is_ok());
        assert!(repo.entities().unwrap().is_empty());

        session.commit().await;
        assert_eq!(repo.entities().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_auto_commit_commits_open_transaction() {
        let session = InMemorySession::new();
        let repo = InMemoryRepository::<User>::with_session(session.clone(), true);

        session.begin().await.unwrap();
        repo.insert_one(user("u1", "Alice")).await.unwrap();

        assert!(!session.in_transaction());
        assert_eq!(repo.entities().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_write_does_not_commit() {
        let session = InMemorySession::new();
        let repo = InMemoryRepository::<User>::with_session(session.clone(), true);
        repo.insert_one(user("u1", "Alice")).await.unwrap();

        session.begin().await.unwrap();
        repo.insert_one(user("u1", "Again")).await.unwrap_err();
        assert!(session.in_transaction());
    }

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime")
            .block_on(future)
    }

    proptest! {
        #[test]
        fn property_pagination_lengths(size in 0usize..20, limit in proptest::option::of(0i64..25), offset in 0i64..25) {
            let returned = block_on(async move {
                let repo = InMemoryRepository::<Ticket>::new();
                repo.insert_many((0..size as u64).map(|id| Ticket { id }).collect())
                    .await
                    .unwrap();
                repo.get_all(limit, offset).await.unwrap().len()
            });

            let remaining = size.saturating_sub(offset as usize);
            let expected = limit.map_or(remaining, |limit| (limit as usize).min(remaining));
            prop_assert_eq!(returned, expected);
        }

        #[test]
        fn property_negative_pagination_always_fails(limit in i64::MIN..0, offset in i64::MIN..0) {
            let (by_limit, by_offset) = block_on(async move {
                let repo = InMemoryRepository::<Ticket>::new();
                (repo.get_all(Some(limit), 0).await, repo.get_all(None, offset).await)
            });

            let limit_rejected = matches!(by_limit, Err(DatabaseError::PaginationParameter { .. }));
            let offset_rejected = matches!(by_offset, Err(DatabaseError::PaginationParameter { .. }));
            prop_assert!(limit_rejected, "negative limit {} accepted", limit);
            prop_assert!(offset_rejected, "negative offset {} accepted", offset);
        }

        #[test]
        fn property_insertion_order_is_preserved(ids in proptest::collection::hash_set(any::<u64>(), 0..30)) {
            let ids: Vec<u64> = ids.into_iter().collect();
            let expected = ids.clone();
            let stored = block_on(async move {
                let repo = InMemoryRepository::<Ticket>::new();
                for id in ids {
                    repo.insert_one(Ticket { id }).await.unwrap();
                }
                repo.get_all(None, 0).await.unwrap()
            });

            let stored: Vec<u64> = stored.into_iter().map(|t| t.id).collect();
            prop_assert_eq!(stored, expected);
        }

        #[test]
        fn property_conflicting_insert_many_is_atomic(
            existing in proptest::collection::hash_set(0u64..50, 1..10),
            fresh in proptest::collection::vec(50u64..100, 0..10),
            pick in any::<prop::sample::Index>(),
        ) {
            let existing: Vec<u64> = existing.into_iter().collect();
            let clash = existing[pick.index(existing.len())];
            let before = existing.len();

            let (result, after) = block_on(async move {
                let repo = InMemoryRepository::<Ticket>::new();
                repo.insert_many(existing.iter().map(|&id| Ticket { id }).collect())
                    .await
                    .unwrap();

                let mut batch: Vec<Ticket> = fresh.into_iter().map(|id| Ticket { id }).collect();
                batch.push(Ticket { id: clash });
                let result = repo.insert_many(batch).await;
                (result, repo.count().unwrap())
            });

            prop_assert!(result.is_err());
            prop_assert_eq!(after, before);
        }
    }
}
