//! Shared schema fixtures for unit tests

use crate::metadata::MetadataResolver;
use crate::schema::{EntityDef, FieldDef, Registry, ValueType};
use crate::storage::SqliteStore;

/// Users with groups (many-to-many) and scalar tags, messages with tags
/// (one-to-many), and posts inheriting an author reference from a base.
pub(crate) fn fixture_registry() -> Registry {
    Registry::new()
        .with(
            EntityDef::new("User")
                .field(FieldDef::identity("id", ValueType::Integer))
                .field(FieldDef::scalar("name", ValueType::Text))
                .field(FieldDef::many_to_many("groups", "UserGroup", "Group"))
                .field(FieldDef::scalar_collection("tags", "UserTag", "value")),
        )
        .and_then(|r| {
            r.with(
                EntityDef::new("Group")
                    .field(FieldDef::identity("id", ValueType::Integer).map_from("groupId"))
                    .field(FieldDef::scalar("name", ValueType::Text)),
            )
        })
        .and_then(|r| {
            r.with(
                EntityDef::new("UserGroup")
                    .field(FieldDef::identity("id", ValueType::Integer))
                    .field(FieldDef::foreign("user", "User"))
                    .field(FieldDef::foreign("group", "Group")),
            )
        })
        .and_then(|r| {
            r.with(
                EntityDef::new("UserTag")
                    .field(FieldDef::identity("id", ValueType::Integer))
                    .field(FieldDef::foreign("user", "User"))
                    .field(FieldDef::scalar("value", ValueType::Text)),
            )
        })
        .and_then(|r| {
            r.with(
                EntityDef::new("Message")
                    .field(FieldDef::identity("id", ValueType::Integer))
                    .field(FieldDef::scalar("text", ValueType::Text))
                    .field(FieldDef::one_to_many("tags", "Tag")),
            )
        })
        .and_then(|r| {
            r.with(
                EntityDef::new("Tag")
                    .field(FieldDef::identity("id", ValueType::Integer))
                    .field(FieldDef::scalar("name", ValueType::Text))
                    .field(FieldDef::foreign("message", "Message")),
            )
        })
        .and_then(|r| r.with(EntityDef::base("Authored").field(FieldDef::foreign("author", "User"))))
        .and_then(|r| {
            r.with(
                EntityDef::new("Post")
                    .extends("Authored")
                    .field(FieldDef::identity("slug", ValueType::Text))
                    .field(FieldDef::scalar("title", ValueType::Text)),
            )
        })
        .unwrap()
}

pub(crate) fn user_resolver() -> MetadataResolver {
    MetadataResolver::new(fixture_registry())
}

/// In-memory store with a table for every mapped fixture entity
pub(crate) fn store_with_schema(resolver: &MetadataResolver) -> SqliteStore {
    let store = SqliteStore::open_in_memory().unwrap();
    store.create_tables(resolver).unwrap();
    store
}
