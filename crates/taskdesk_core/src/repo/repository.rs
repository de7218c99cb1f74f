//! Generic cached repository over one storage collection.
//!
//! # Responsibility
//! - Provide create/find/update/delete over a full-collection storage model.
//! - Serve point lookups from a per-id TTL cache.
//!
//! # Invariants
//! - Every successful `create`/`update` refreshes the cache entry; every
//!   successful `delete` evicts it.
//! - `find_all` never reads or populates the per-id cache.
//! - A failed write leaves the persisted collection untouched.
//! - Each call runs load -> mutate -> save without yielding in between, so
//!   concurrent writers through different instances are last-writer-wins.

use crate::cache::TtlCache;
use crate::clock::Clock;
use crate::id_gen::IdGenerator;
use crate::repo::query::{apply_query, QueryOptions};
use crate::repo::{Entity, RepoError, RepoResult};
use crate::storage::Storage;
use chrono::{DateTime, Duration, Utc};
use log::{debug, error};
use serde_json::Value;
use std::rc::Rc;

/// Repository for one entity type, backed by a shared storage collaborator.
pub struct Repository<E: Entity> {
    storage: Rc<dyn Storage>,
    cache: TtlCache<E>,
    clock: Rc<dyn Clock>,
    ids: Rc<dyn IdGenerator>,
}

impl<E: Entity> Repository<E> {
    pub fn new(
        storage: Rc<dyn Storage>,
        clock: Rc<dyn Clock>,
        ids: Rc<dyn IdGenerator>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            storage,
            cache: TtlCache::new(cache_ttl, clock.clone()),
            clock,
            ids,
        }
    }

    /// Read-only view of the per-id cache.
    pub fn cache(&self) -> &TtlCache<E> {
        &self.cache
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Validates, assigns an id if missing, rejects collisions and appends.
    ///
    /// # Errors
    /// - `RepoError::Validation` for invalid entities.
    /// - `RepoError::Duplicate` when the id or a unique key is taken.
    pub fn create(&self, mut entity: E) -> RepoResult<E> {
        self.run("create", || {
            entity.validate()?;
            if entity.id().is_empty() {
                entity.assign_id(self.ids.next_id());
            }

            let mut entities = self.load_all()?;
            if entities.iter().any(|existing| existing.id() == entity.id()) {
                return Err(RepoError::Duplicate {
                    collection: E::COLLECTION,
                    field: "id",
                    value: entity.id().to_string(),
                });
            }
            ensure_unique(&entities, &entity)?;

            entities.push(entity.clone());
            self.persist(&entities)?;
            self.cache.insert(entity.id(), entity.clone());
            debug!(
                "event=repo_create module=repo status=ok collection={} id={}",
                E::COLLECTION,
                entity.id()
            );
            Ok(entity)
        })
    }

    /// Cache-first point lookup.
    ///
    /// A fresh cache hit never touches storage; a miss or stale entry reloads
    /// the collection and re-populates the cache.
    pub fn find_by_id(&self, id: &str) -> RepoResult<Option<E>> {
        if let Some(entity) = self.cache.get(id) {
            return Ok(Some(entity));
        }

        self.run("find_by_id", || {
            let found = self
                .load_all()?
                .into_iter()
                .find(|entity| entity.id() == id);
            if let Some(entity) = found.as_ref() {
                self.cache.insert(id, entity.clone());
            }
            Ok(found)
        })
    }

    /// Loads the full collection and applies filters, sort and pagination.
    pub fn find_all(&self, options: &QueryOptions<E::Filter, E::SortField>) -> RepoResult<Vec<E>> {
        self.run("find_all", || Ok(apply_query(self.load_all()?, options)))
    }

    /// Applies `patches` in order through the entity's mutators.
    ///
    /// Returns `Ok(None)` when `id` is absent. If any patch fails, nothing is
    /// persisted.
    pub fn update(&self, id: &str, patches: Vec<E::Patch>) -> RepoResult<Option<E>> {
        self.run("update", || {
            let mut entities = self.load_all()?;
            let Some(index) = entities.iter().position(|entity| entity.id() == id) else {
                return Ok(None);
            };

            let now = self.clock.now();
            let mut updated = entities[index].clone();
            for patch in patches {
                updated.apply_patch(patch, now)?;
            }
            updated.validate()?;

            entities.remove(index);
            ensure_unique(&entities, &updated)?;
            entities.insert(index, updated.clone());

            self.persist(&entities)?;
            self.cache.insert(id, updated.clone());
            debug!(
                "event=repo_update module=repo status=ok collection={} id={id}",
                E::COLLECTION
            );
            Ok(Some(updated))
        })
    }

    /// Removes the entity and evicts its cache entry; `false` when absent.
    pub fn delete(&self, id: &str) -> RepoResult<bool> {
        self.run("delete", || {
            let mut entities = self.load_all()?;
            let Some(index) = entities.iter().position(|entity| entity.id() == id) else {
                return Ok(false);
            };

            entities.remove(index);
            self.persist(&entities)?;
            self.cache.evict(id);
            debug!(
                "event=repo_delete module=repo status=ok collection={} id={id}",
                E::COLLECTION
            );
            Ok(true)
        })
    }

    pub fn exists(&self, id: &str) -> RepoResult<bool> {
        Ok(self.find_by_id(id)?.is_some())
    }

    pub fn count(&self) -> RepoResult<usize> {
        Ok(self.find_all(&QueryOptions::default())?.len())
    }

    fn load_all(&self) -> RepoResult<Vec<E>> {
        self.storage
            .load(E::COLLECTION, Vec::new())?
            .into_iter()
            .map(hydrate::<E>)
            .collect()
    }

    fn persist(&self, entities: &[E]) -> RepoResult<()> {
        let records = entities
            .iter()
            .map(|entity| {
                serde_json::to_value(entity).map_err(|err| {
                    RepoError::InvalidData(format!(
                        "cannot serialize {} record `{}`: {err}",
                        E::COLLECTION,
                        entity.id()
                    ))
                })
            })
            .collect::<RepoResult<Vec<Value>>>()?;
        self.storage.save(E::COLLECTION, &records)?;
        Ok(())
    }

    // Logs a failure once at its origin, then hands it back unchanged.
    fn run<T>(
        &self,
        operation: &'static str,
        body: impl FnOnce() -> RepoResult<T>,
    ) -> RepoResult<T> {
        body().map_err(|err| {
            error!(
                "event=repo_{operation} module=repo status=error collection={} \
                 error_kind={} error={err}",
                E::COLLECTION,
                err.kind()
            );
            err
        })
    }
}

fn hydrate<E: Entity>(record: Value) -> RepoResult<E> {
    let entity: E = serde_json::from_value(record).map_err(|err| {
        RepoError::InvalidData(format!("cannot hydrate {} record: {err}", E::COLLECTION))
    })?;
    entity.validate().map_err(|err| {
        RepoError::InvalidData(format!(
            "{} record `{}` failed validation: {err}",
            E::COLLECTION,
            entity.id()
        ))
    })?;
    Ok(entity)
}

fn ensure_unique<E: Entity>(others: &[E], candidate: &E) -> RepoResult<()> {
    for (field, value) in candidate.unique_keys() {
        let taken = others.iter().any(|other| {
            other.id() != candidate.id()
                && other
                    .unique_keys()
                    .iter()
                    .any(|(other_field, other_value)| {
                        *other_field == field && *other_value == value
                    })
        });
        if taken {
            return Err(RepoError::Duplicate {
                collection: E::COLLECTION,
                field,
                value,
            });
        }
    }
    Ok(())
}
