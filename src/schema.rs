//! Schema catalog: entity/property to table/column resolution, key sets and relations.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ast::Literal;

/// Role a field plays in its entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldRole {
    PrimaryKey,
    Increment,
    SplitValue,
}

/// Storage class of a column in a created table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    #[default]
    Text,
    Integer,
    Real,
    Blob,
}

/// Resolved field: property name, physical column and roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub property: String,
    pub column: String,
    pub roles: Vec<FieldRole>,
    pub data_type: FieldType,
}

impl FieldDescriptor {
    pub fn in_role(&self, role: FieldRole) -> bool {
        self.roles.contains(&role)
    }

    /// Field with no roles whose column equals the property name.
    pub fn plain(property: &str) -> Self {
        Self {
            property: property.to_string(),
            column: property.to_string(),
            roles: Vec::new(),
            data_type: FieldType::default(),
        }
    }
}

/// Source of entity metadata consumed by the translator and statement generator.
pub trait SchemaCatalog {
    fn resolve_field(&self, entity: &str, property: &str) -> FieldDescriptor;

    /// Primary key fields in declaration order.
    fn primary_keys(&self, entity: &str) -> Vec<FieldDescriptor>;

    /// Every field that may appear in a select list.
    fn queryable_fields(&self, entity: &str) -> Vec<FieldDescriptor>;

    /// Every field that may appear in an insert.
    fn insertable_fields(&self, entity: &str) -> Vec<FieldDescriptor>;

    /// Field used by aggregates and paging when none is given.
    fn default_field(&self, entity: &str) -> Option<FieldDescriptor>;

    /// Pairs of (source property, target property) relating two entities.
    fn relation_fields(&self, source: &str, target: &str) -> Vec<(String, String)>;

    fn table_name(&self, entity: &str) -> String;

    /// Physical tables for a statement. A split value selects `<table>_<value>`;
    /// otherwise every declared partition is returned, or the base table.
    fn table_names(&self, entity: &str, split_value: Option<&Literal>) -> Vec<String>;

    fn column_name(&self, entity: &str, property: &str) -> String {
        self.resolve_field(entity, property).column
    }
}

/// Field declaration inside an entity schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub property: String,
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub roles: Vec<FieldRole>,
    #[serde(default)]
    pub data_type: FieldType,
}

impl FieldSchema {
    fn descriptor(&self) -> FieldDescriptor {
        FieldDescriptor {
            property: self.property.clone(),
            column: self.column.clone().unwrap_or_else(|| self.property.clone()),
            roles: self.roles.clone(),
            data_type: self.data_type,
        }
    }
}

/// Entity metadata as declared in configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EntitySchema {
    pub table: Option<String>,
    pub fields: Vec<FieldSchema>,
    /// Target entity -> (own property, target property) pairs
    pub relations: HashMap<String, Vec<(String, String)>>,
    pub default_field: Option<String>,
    /// Partition suffixes; each maps to `<table>_<suffix>`
    pub partitions: Vec<String>,
}

impl EntitySchema {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            ..Default::default()
        }
    }

    pub fn field(self, property: &str, roles: &[FieldRole]) -> Self {
        self.typed_field(property, FieldType::default(), roles)
    }

    pub fn typed_field(mut self, property: &str, data_type: FieldType, roles: &[FieldRole]) -> Self {
        self.fields.push(FieldSchema {
            property: property.to_string(),
            column: None,
            roles: roles.to_vec(),
            data_type,
        });
        self
    }

    pub fn mapped_field(mut self, property: &str, column: &str, roles: &[FieldRole]) -> Self {
        self.fields.push(FieldSchema {
            property: property.to_string(),
            column: Some(column.to_string()),
            roles: roles.to_vec(),
            data_type: FieldType::default(),
        });
        self
    }

    pub fn relation(mut self, target: &str, own: &str, other: &str) -> Self {
        self.relations
            .entry(target.to_string())
            .or_default()
            .push((own.to_string(), other.to_string()));
        self
    }

    pub fn default_field(mut self, property: &str) -> Self {
        self.default_field = Some(property.to_string());
        self
    }

    pub fn partitions<I, S>(mut self, partitions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.partitions = partitions.into_iter().map(Into::into).collect();
        self
    }
}

/// In-memory catalog keyed by entity name.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    entities: HashMap<String, EntitySchema>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity(mut self, entity: &str, schema: EntitySchema) -> Self {
        self.insert(entity, schema);
        self
    }

    pub fn insert(&mut self, entity: &str, schema: EntitySchema) {
        self.entities.insert(entity.to_string(), schema);
    }

    pub fn entity(&self, entity: &str) -> Option<&EntitySchema> {
        self.entities.get(entity)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    fn fields(&self, entity: &str) -> Vec<FieldDescriptor> {
        self.entities
            .get(entity)
            .map(|schema| schema.fields.iter().map(FieldSchema::descriptor).collect())
            .unwrap_or_default()
    }
}

impl From<HashMap<String, EntitySchema>> for StaticCatalog {
    fn from(entities: HashMap<String, EntitySchema>) -> Self {
        Self { entities }
    }
}

impl SchemaCatalog for StaticCatalog {
    fn resolve_field(&self, entity: &str, property: &str) -> FieldDescriptor {
        self.entities
            .get(entity)
            .and_then(|schema| schema.fields.iter().find(|f| f.property == property))
            .map(FieldSchema::descriptor)
            .unwrap_or_else(|| FieldDescriptor::plain(property))
    }

    fn primary_keys(&self, entity: &str) -> Vec<FieldDescriptor> {
        self.fields(entity)
            .into_iter()
            .filter(|f| f.in_role(FieldRole::PrimaryKey))
            .collect()
    }

    fn queryable_fields(&self, entity: &str) -> Vec<FieldDescriptor> {
        self.fields(entity)
    }

    fn insertable_fields(&self, entity: &str) -> Vec<FieldDescriptor> {
        self.fields(entity)
    }

    fn default_field(&self, entity: &str) -> Option<FieldDescriptor> {
        let schema = self.entities.get(entity)?;
        if let Some(property) = &schema.default_field {
            return Some(self.resolve_field(entity, property));
        }
        self.primary_keys(entity)
            .into_iter()
            .next()
            .or_else(|| schema.fields.first().map(FieldSchema::descriptor))
    }

    fn relation_fields(&self, source: &str, target: &str) -> Vec<(String, String)> {
        if let Some(pairs) = self
            .entities
            .get(source)
            .and_then(|schema| schema.relations.get(target))
        {
            return pairs.clone();
        }
        // relations may be declared on the other side only
        self.entities
            .get(target)
            .and_then(|schema| schema.relations.get(source))
            .map(|pairs| pairs.iter().map(|(a, b)| (b.clone(), a.clone())).collect())
            .unwrap_or_default()
    }

    fn table_name(&self, entity: &str) -> String {
        self.entities
            .get(entity)
            .and_then(|schema| schema.table.clone())
            .unwrap_or_else(|| entity.to_lowercase())
    }

    fn table_names(&self, entity: &str, split_value: Option<&Literal>) -> Vec<String> {
        let table = self.table_name(entity);
        if let Some(value) = split_value {
            return vec![format!("{}_{}", table, value.as_text())];
        }
        match self.entities.get(entity) {
            Some(schema) if !schema.partitions.is_empty() => schema
                .partitions
                .iter()
                .map(|suffix| format!("{}_{}", table, suffix))
                .collect(),
            _ => vec![table],
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Catalog shared by translator and statement tests.
    pub(crate) fn sample_catalog() -> StaticCatalog {
        StaticCatalog::new()
            .with_entity(
                "User",
                EntitySchema::new("users")
                    .field("Id", &[FieldRole::PrimaryKey])
                    .field("Name", &[])
                    .field("Age", &[])
                    .mapped_field("Status", "status_code", &[])
                    .relation("Order", "Id", "UserId"),
            )
            .with_entity(
                "Category",
                EntitySchema::new("category")
                    .field("Id", &[FieldRole::PrimaryKey])
                    .field("ParentId", &[])
                    .field("Name", &[]),
            )
            .with_entity(
                "Order",
                EntitySchema::new("orders")
                    .typed_field("Id", FieldType::Integer, &[FieldRole::PrimaryKey, FieldRole::Increment])
                    .typed_field("UserId", FieldType::Integer, &[])
                    .typed_field("Amount", FieldType::Real, &[]),
            )
            .with_entity(
                "Membership",
                EntitySchema::new("membership")
                    .field("UserId", &[FieldRole::PrimaryKey])
                    .field("GroupId", &[FieldRole::PrimaryKey])
                    .field("Level", &[]),
            )
            .with_entity(
                "AuditLog",
                EntitySchema::new("audit_log")
                    .field("Message", &[])
                    .field("CreatedAt", &[]),
            )
            .with_entity(
                "Event",
                EntitySchema::new("event")
                    .typed_field("Id", FieldType::Integer, &[FieldRole::PrimaryKey])
                    .field("Region", &[FieldRole::SplitValue])
                    .typed_field("Payload", FieldType::Blob, &[])
                    .partitions(["east", "west"]),
            )
            .with_entity(
                "Ticket",
                EntitySchema::new("ticket")
                    .field("Id", &[FieldRole::PrimaryKey, FieldRole::Increment])
                    .field("Shard", &[FieldRole::SplitValue])
                    .field("Title", &[]),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::sample_catalog;
    use super::*;

    #[test]
    fn test_resolve_field() {
        let catalog = sample_catalog();
        assert_eq!(catalog.column_name("User", "Status"), "status_code");
        assert_eq!(catalog.column_name("User", "Name"), "Name");
        // unknown property maps to a same-name column
        let unknown = catalog.resolve_field("User", "Nickname");
        assert_eq!(unknown.column, "Nickname");
        assert!(unknown.roles.is_empty());
    }

    #[test]
    fn test_table_name_fallback() {
        let catalog = sample_catalog();
        assert_eq!(catalog.table_name("User"), "users");
        assert_eq!(catalog.table_name("Product"), "product");
    }

    #[test]
    fn test_default_field() {
        let catalog = sample_catalog();
        assert_eq!(catalog.default_field("User").map(|f| f.property), Some("Id".to_string()));
        assert_eq!(
            catalog.default_field("AuditLog").map(|f| f.property),
            Some("Message".to_string())
        );
        assert!(catalog.default_field("Product").is_none());
    }

    #[test]
    fn test_relation_fields_both_directions() {
        let catalog = sample_catalog();
        assert_eq!(
            catalog.relation_fields("User", "Order"),
            vec![("Id".to_string(), "UserId".to_string())]
        );
        assert_eq!(
            catalog.relation_fields("Order", "User"),
            vec![("UserId".to_string(), "Id".to_string())]
        );
        assert!(catalog.relation_fields("User", "Category").is_empty());
    }

    #[test]
    fn test_table_names_partitions() {
        let catalog = sample_catalog();
        assert_eq!(catalog.table_names("User", None), vec!["users".to_string()]);
        assert_eq!(
            catalog.table_names("Event", None),
            vec!["event_east".to_string(), "event_west".to_string()]
        );
        assert_eq!(
            catalog.table_names("Event", Some(&Literal::from("north"))),
            vec!["event_north".to_string()]
        );
    }
}
