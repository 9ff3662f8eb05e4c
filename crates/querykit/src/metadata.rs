//! Entity metadata consumed by the query builders.
//!
//! Metadata describes which table an entity maps to and which of its columns
//! form the primary key. Builders only read it: `where_in_ids` needs the
//! primary columns, the executor needs to know whether lifecycle subscribers
//! apply to a target at all.

use crate::error::{OrmResult, QueryError};
use std::collections::HashMap;
use std::sync::Arc;

/// Strategy used by the database to generate a primary value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generation {
    Increment,
    Uuid,
    Rowid,
}

/// Options used to declare a column.
#[derive(Debug, Clone, Default)]
pub struct ColumnOptions {
    pub column_type: Option<String>,
    pub database_name: Option<String>,
    pub nullable: bool,
    pub generated: Option<Generation>,
}

impl ColumnOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the database column type (e.g. `"integer"`, `"varchar"`).
    pub fn column_type(mut self, ty: impl Into<String>) -> Self {
        self.column_type = Some(ty.into());
        self
    }

    /// Override the database column name (defaults to the property name).
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.database_name = Some(name.into());
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn generated(mut self, strategy: Generation) -> Self {
        self.generated = Some(strategy);
        self
    }
}

/// A mapped column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMetadata {
    pub property_name: String,
    pub database_name: String,
    pub column_type: String,
    pub primary: bool,
    pub nullable: bool,
    pub generated: Option<Generation>,
}

/// A mapped entity: its table and columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityMetadata {
    name: String,
    table_name: String,
    columns: Vec<ColumnMetadata>,
}

impl EntityMetadata {
    /// Start declaring an entity. The table name defaults to the entity name.
    pub fn builder(name: impl Into<String>) -> EntityMetadataBuilder {
        let name = name.into();
        EntityMetadataBuilder {
            table_name: name.clone(),
            name,
            columns: Vec::new(),
            error: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn columns(&self) -> &[ColumnMetadata] {
        &self.columns
    }

    pub fn primary_columns(&self) -> impl Iterator<Item = &ColumnMetadata> {
        self.columns.iter().filter(|c| c.primary)
    }

    pub fn has_primary_columns(&self) -> bool {
        self.columns.iter().any(|c| c.primary)
    }

    /// Find a column by property name or database name.
    pub fn find_column(&self, name: &str) -> Option<&ColumnMetadata> {
        self.columns
            .iter()
            .find(|c| c.property_name == name)
            .or_else(|| self.columns.iter().find(|c| c.database_name == name))
    }
}

/// Builder for [`EntityMetadata`].
///
/// Declaration errors are deferred to [`EntityMetadataBuilder::build`] so the
/// chain stays fluent.
#[derive(Debug)]
pub struct EntityMetadataBuilder {
    name: String,
    table_name: String,
    columns: Vec<ColumnMetadata>,
    error: Option<QueryError>,
}

impl EntityMetadataBuilder {
    pub fn table(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    /// Declare a regular column.
    pub fn column(self, property: &str, options: ColumnOptions) -> Self {
        self.push_column(property, options, false)
    }

    /// Declare a primary column. Primary columns must be typed and non-nullable.
    pub fn primary_column(self, property: &str, options: ColumnOptions) -> Self {
        self.push_column(property, options, true)
    }

    fn push_column(mut self, property: &str, options: ColumnOptions, primary: bool) -> Self {
        if self.error.is_some() {
            return self;
        }
        let Some(column_type) = options.column_type else {
            self.error = Some(QueryError::ColumnTypeUndefined {
                entity: self.name.clone(),
                column: property.to_string(),
            });
            return self;
        };
        if primary && options.nullable {
            self.error = Some(QueryError::NullablePrimaryColumn {
                entity: self.name.clone(),
                column: property.to_string(),
            });
            return self;
        }
        self.columns.push(ColumnMetadata {
            property_name: property.to_string(),
            database_name: options
                .database_name
                .unwrap_or_else(|| property.to_string()),
            column_type,
            primary,
            nullable: options.nullable,
            generated: options.generated,
        });
        self
    }

    pub fn build(self) -> OrmResult<EntityMetadata> {
        if let Some(err) = self.error {
            return Err(err);
        }
        Ok(EntityMetadata {
            name: self.name,
            table_name: self.table_name,
            columns: self.columns,
        })
    }
}

/// Lookup of entity metadata by entity name or table name.
#[derive(Debug, Clone, Default)]
pub struct MetadataRegistry {
    entities: HashMap<String, Arc<EntityMetadata>>,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, metadata: EntityMetadata) -> Arc<EntityMetadata> {
        let metadata = Arc::new(metadata);
        self.entities
            .insert(metadata.name().to_string(), Arc::clone(&metadata));
        metadata
    }

    /// Resolve a target by entity name first, then by table name.
    pub fn find(&self, target: &str) -> Option<Arc<EntityMetadata>> {
        self.entities.get(target).cloned().or_else(|| {
            self.entities
                .values()
                .find(|m| m.table_name() == target)
                .cloned()
        })
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category() -> EntityMetadata {
        EntityMetadata::builder("Category")
            .table("category")
            .primary_column(
                "id",
                ColumnOptions::new()
                    .column_type("integer")
                    .generated(Generation::Increment),
            )
            .column("name", ColumnOptions::new().column_type("varchar"))
            .build()
            .unwrap()
    }

    #[test]
    fn primary_columns_are_tracked() {
        let meta = category();
        let pks: Vec<_> = meta.primary_columns().map(|c| c.database_name.as_str()).collect();
        assert_eq!(pks, vec!["id"]);
        assert_eq!(meta.table_name(), "category");
    }

    #[test]
    fn nullable_primary_column_is_rejected() {
        let err = EntityMetadata::builder("Post")
            .primary_column("id", ColumnOptions::new().column_type("int").nullable(true))
            .build()
            .unwrap_err();
        assert!(matches!(err, QueryError::NullablePrimaryColumn { .. }));
    }

    #[test]
    fn untyped_column_is_rejected() {
        let err = EntityMetadata::builder("Post")
            .primary_column("id", ColumnOptions::new())
            .build()
            .unwrap_err();
        assert!(matches!(err, QueryError::ColumnTypeUndefined { .. }));
    }

    #[test]
    fn registry_resolves_entity_and_table_names() {
        let mut registry = MetadataRegistry::new();
        registry.register(category());
        assert!(registry.find("Category").is_some());
        assert!(registry.find("category").is_some());
        assert!(registry.find("post").is_none());
    }
}
