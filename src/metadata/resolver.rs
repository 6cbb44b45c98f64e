//! Metadata Resolver
//!
//! Resolves and caches descriptors for registered entity types. Field lookup
//! dominates the cost of persisting large documents, so every lookup is
//! memoized for the lifetime of the resolver, including misses.
//!
//! Lookup order for a document key:
//! 1. Direct field name match in the type's own fields
//! 2. Rename mapping (`map_from`) match in the type's own fields
//! 3. The same two steps for each base declaration, in order

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, PoisonError, RwLock};
use crate::{Error, Result};
use crate::schema::{EntityDescriptor, FieldDescriptor, Layer, Registry};

type FieldLookup = Option<Arc<FieldDescriptor>>;

/// Memoized lookups, keyed by type or by (type, key) / (type, type) pairs
#[derive(Debug, Default)]
struct Caches {
    descriptors: HashMap<String, Arc<EntityDescriptor>>,
    layers: HashMap<String, Arc<Vec<Layer>>>,
    fields_by_key: HashMap<(String, String), FieldLookup>,
    identity_fields: HashMap<String, FieldLookup>,
    fields_by_type: HashMap<(String, String), FieldLookup>,
    foreign_fields: HashMap<(String, String), FieldLookup>,
}

/// One lookup map of `Caches`, borrowed shared for hits and exclusive for inserts
struct Slot<K> {
    get: fn(&Caches) -> &HashMap<K, FieldLookup>,
    get_mut: fn(&mut Caches) -> &mut HashMap<K, FieldLookup>,
}

const FIELDS_BY_KEY: Slot<(String, String)> = Slot {
    get: |c| &c.fields_by_key,
    get_mut: |c| &mut c.fields_by_key,
};

const IDENTITY_FIELDS: Slot<String> = Slot {
    get: |c| &c.identity_fields,
    get_mut: |c| &mut c.identity_fields,
};

const FIELDS_BY_TYPE: Slot<(String, String)> = Slot {
    get: |c| &c.fields_by_type,
    get_mut: |c| &mut c.fields_by_type,
};

const FOREIGN_FIELDS: Slot<(String, String)> = Slot {
    get: |c| &c.foreign_fields,
    get_mut: |c| &mut c.foreign_fields,
};

/// Resolves entity and field descriptors from a `Registry`.
///
/// The caches are append-only and guarded by a `RwLock`, so a resolver can be
/// shared across threads by reference.
#[derive(Debug)]
pub struct MetadataResolver {
    registry: Registry,
    caches: RwLock<Caches>,
}

impl MetadataResolver {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            caches: RwLock::new(Caches::default()),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Drop every cached lookup
    #[cfg(test)]
    pub(crate) fn clear_cache(&self) {
        *self.caches.write().unwrap_or_else(PoisonError::into_inner) = Caches::default();
    }

    /// Resolve the descriptor of a persisted type.
    ///
    /// Fails with `Schema` when the type is unknown or carries no table mapping.
    pub fn describe(&self, type_name: &str) -> Result<Arc<EntityDescriptor>> {
        if let Some(found) = self.read(|c| c.descriptors.get(type_name).cloned()) {
            return Ok(found);
        }

        let def = self
            .registry
            .get(type_name)
            .ok_or_else(|| Error::Schema(format!("no table mapping found for {}", type_name)))?;
        let table = def.table_name().ok_or_else(|| {
            Error::Schema(format!("no table mapping found for {} (declared as base only)", type_name))
        })?;

        let descriptor = Arc::new(EntityDescriptor {
            type_name: type_name.to_string(),
            table: table.to_string(),
            layers: self.layers(type_name)?.as_ref().clone(),
        });

        tracing::debug!("resolved descriptor for {} (table {})", type_name, descriptor.table);
        Ok(self.write(|c| {
            c.descriptors
                .entry(type_name.to_string())
                .or_insert(descriptor)
                .clone()
        }))
    }

    /// Find the field a document key maps onto
    pub fn field_for(&self, type_name: &str, key: &str) -> Result<Option<Arc<FieldDescriptor>>> {
        let cache_key = (type_name.to_string(), key.to_string());
        self.memoized(
            &FIELDS_BY_KEY,
            cache_key,
            || {
                let layers = self.layers(type_name)?;
                Ok(layers.iter().find_map(|layer| {
                    layer
                        .fields
                        .iter()
                        .find(|f| f.matches_name(key))
                        .or_else(|| layer.fields.iter().find(|f| f.matches_mapping(key)))
                        .cloned()
                }))
            },
        )
    }

    /// The identity field of a type, searching its bases.
    ///
    /// Fails with `Schema` when no field is marked identity.
    pub fn identity_field(&self, type_name: &str) -> Result<Arc<FieldDescriptor>> {
        let found = self.memoized(
            &IDENTITY_FIELDS,
            type_name.to_string(),
            || {
                let layers = self.layers(type_name)?;
                Ok(layers
                    .iter()
                    .flat_map(|layer| layer.fields.iter())
                    .find(|f| f.is_identity())
                    .cloned())
            },
        )?;
        found.ok_or_else(|| Error::Schema(format!("no identity field found in {}", type_name)))
    }

    /// First foreign reference of `type_name` whose target is exactly `target_type`
    pub fn first_field_of_type(
        &self,
        type_name: &str,
        target_type: &str,
    ) -> Result<Option<Arc<FieldDescriptor>>> {
        let cache_key = (type_name.to_string(), target_type.to_string());
        self.memoized(
            &FIELDS_BY_TYPE,
            cache_key,
            || {
                let layers = self.layers(type_name)?;
                Ok(layers
                    .iter()
                    .flat_map(|layer| layer.fields.iter())
                    .find(|f| f.reference_target() == Some(target_type))
                    .cloned())
            },
        )
    }

    /// Foreign reference of `source_type` that can point at `points_at`.
    ///
    /// A reference declared against a base type also accepts its subtypes.
    pub fn foreign_field(
        &self,
        source_type: &str,
        points_at: &str,
    ) -> Result<Option<Arc<FieldDescriptor>>> {
        let cache_key = (source_type.to_string(), points_at.to_string());
        self.memoized(
            &FOREIGN_FIELDS,
            cache_key,
            || {
                let layers = self.layers(source_type)?;
                Ok(layers
                    .iter()
                    .flat_map(|layer| layer.fields.iter())
                    .find(|f| {
                        f.reference_target()
                            .is_some_and(|target| self.registry.is_a(points_at, target))
                    })
                    .cloned())
            },
        )
    }

    /// Flattened layers of a type, resolved once
    fn layers(&self, type_name: &str) -> Result<Arc<Vec<Layer>>> {
        if let Some(found) = self.read(|c| c.layers.get(type_name).cloned()) {
            return Ok(found);
        }
        let layers = Arc::new(self.registry.layers_of(type_name)?);
        Ok(self.write(|c| c.layers.entry(type_name.to_string()).or_insert(layers).clone()))
    }

    fn memoized<K, F>(
        &self,
        slot: &Slot<K>,
        key: K,
        compute: F,
    ) -> Result<FieldLookup>
    where
        K: Eq + Hash,
        F: FnOnce() -> Result<FieldLookup>,
    {
        if let Some(hit) = self.read(|c| (slot.get)(c).get(&key).cloned()) {
            return Ok(hit);
        }

        // Computed outside the lock: `compute` re-enters the layer cache
        let value = compute()?;
        Ok(self.write(|c| (slot.get_mut)(c).entry(key).or_insert(value).clone()))
    }

    fn read<T>(&self, f: impl FnOnce(&Caches) -> Option<T>) -> Option<T> {
        let guard = self.caches.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    fn write<T>(&self, f: impl FnOnce(&mut Caches) -> T) -> T {
        let mut guard = self.caches.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    #[cfg(test)]
    fn cached_lookups(&self) -> usize {
        self.read(|c| {
            Some(
                c.fields_by_key.len()
                    + c.identity_fields.len()
                    + c.fields_by_type.len()
                    + c.foreign_fields.len(),
            )
        })
        .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EntityDef, FieldDef, FieldKind, ValueType};
    use crate::testing;

    #[test]
    fn test_describe_user() {
        let resolver = testing::user_resolver();
        let user = resolver.describe("User").unwrap();
        assert_eq!(user.table, "User");
        assert_eq!(user.identity().unwrap().name, "id");
        assert_eq!(user.fields().count(), 4);
    }

    #[test]
    fn test_describe_requires_table_mapping() {
        let resolver = MetadataResolver::new(
            Registry::new()
                .with(EntityDef::base("Model").field(FieldDef::identity("id", ValueType::Integer)))
                .unwrap(),
        );
        assert!(matches!(resolver.describe("Model"), Err(Error::Schema(_))));
        assert!(matches!(resolver.describe("Nope"), Err(Error::Schema(_))));
    }

    #[test]
    fn test_field_for_prefers_direct_name_then_mapping_then_bases() {
        let registry = Registry::new()
            .with(
                EntityDef::base("Model")
                    .field(FieldDef::identity("id", ValueType::Integer))
                    .field(FieldDef::scalar("created", ValueType::Text).map_from("title")),
            )
            .unwrap()
            .with(
                EntityDef::new("Post")
                    .extends("Model")
                    .field(FieldDef::scalar("headline", ValueType::Text).map_from("title"))
                    .field(FieldDef::scalar("title", ValueType::Text).column("raw_title")),
            )
            .unwrap();
        let resolver = MetadataResolver::new(registry);

        // direct name wins over an earlier rename mapping
        let title = resolver.field_for("Post", "title").unwrap().unwrap();
        assert_eq!(title.column.as_deref(), Some("raw_title"));

        // inherited through the base
        let id = resolver.field_for("Post", "id").unwrap().unwrap();
        assert_eq!(id.declared_in, "Model");

        assert!(resolver.field_for("Post", "unknown").unwrap().is_none());
    }

    #[test]
    fn test_misses_are_cached() {
        let resolver = testing::user_resolver();
        assert!(resolver.field_for("User", "nickname").unwrap().is_none());
        let cached = resolver.cached_lookups();
        assert!(resolver.field_for("User", "nickname").unwrap().is_none());
        assert_eq!(resolver.cached_lookups(), cached);

        resolver.clear_cache();
        assert_eq!(resolver.cached_lookups(), 0);
    }

    #[test]
    fn test_cache_hits_only_need_shared_access() {
        let resolver = testing::user_resolver();
        let name = resolver.field_for("User", "name").unwrap();
        assert!(resolver.foreign_field("UserGroup", "User").unwrap().is_some());

        // hits must go through while another thread holds a read guard
        let _reader = resolver.caches.read().unwrap();
        std::thread::scope(|scope| {
            scope.spawn(|| {
                assert_eq!(resolver.field_for("User", "name").unwrap(), name);
                assert!(resolver.foreign_field("UserGroup", "User").unwrap().is_some());
            });
        });
    }

    #[test]
    fn test_identity_field_searches_bases() {
        let registry = Registry::new()
            .with(EntityDef::base("Model").field(FieldDef::identity("uuid", ValueType::Text)))
            .unwrap()
            .with(EntityDef::new("Doc").extends("Model"))
            .unwrap()
            .with(EntityDef::new("Loose").field(FieldDef::scalar("x", ValueType::Any)))
            .unwrap();
        let resolver = MetadataResolver::new(registry);

        let id = resolver.identity_field("Doc").unwrap();
        assert_eq!(id.kind, FieldKind::Identity(ValueType::Text));
        assert!(matches!(resolver.identity_field("Loose"), Err(Error::Schema(_))));
    }

    #[test]
    fn test_junction_lookups() {
        let resolver = testing::user_resolver();

        let to_group = resolver.first_field_of_type("UserGroup", "Group").unwrap().unwrap();
        assert_eq!(to_group.column.as_deref(), Some("group_id"));

        let to_user = resolver.foreign_field("UserGroup", "User").unwrap().unwrap();
        assert_eq!(to_user.column.as_deref(), Some("user_id"));

        assert!(resolver.foreign_field("Group", "User").unwrap().is_none());
    }

    #[test]
    fn test_foreign_field_accepts_subtypes() {
        let registry = Registry::new()
            .with(EntityDef::base("Owner").field(FieldDef::identity("id", ValueType::Integer)))
            .unwrap()
            .with(EntityDef::new("Account").extends("Owner"))
            .unwrap()
            .with(
                EntityDef::new("Item")
                    .field(FieldDef::identity("id", ValueType::Integer))
                    .field(FieldDef::foreign("owner", "Owner")),
            )
            .unwrap();
        let resolver = MetadataResolver::new(registry);

        let field = resolver.foreign_field("Item", "Account").unwrap().unwrap();
        assert_eq!(field.name, "owner");
        // exact type match only
        assert!(resolver.first_field_of_type("Item", "Account").unwrap().is_none());
    }
}
