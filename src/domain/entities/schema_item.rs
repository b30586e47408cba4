use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaItemKind {
    Table,
    Column,
}

/// A table or column of the target database schema. Immutable once the
/// schema is loaded; shared read-only across questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaItem {
    identifier: String,
    kind: SchemaItemKind,
    /// Parent table name for columns; `None` for tables.
    table: Option<String>,
    declared_type: Option<String>,
    is_primary_key: bool,
    /// Identifiers of columns this column references (outgoing foreign keys).
    foreign_key_refs: Vec<String>,
    sample_tokens: Vec<String>,
    /// Position in the original schema declaration, used as the stable
    /// tie-break when ranking by relevance.
    declaration_index: usize,
}

impl SchemaItem {
    pub fn table(name: impl Into<String>, declaration_index: usize) -> Self {
        Self {
            identifier: name.into(),
            kind: SchemaItemKind::Table,
            table: None,
            declared_type: None,
            is_primary_key: false,
            foreign_key_refs: Vec::new(),
            sample_tokens: Vec::new(),
            declaration_index,
        }
    }

    pub fn column(
        table: impl Into<String>,
        name: impl AsRef<str>,
        declared_type: Option<String>,
        declaration_index: usize,
    ) -> Self {
        let table = table.into();
        Self {
            identifier: format!("{}.{}", table, name.as_ref()),
            kind: SchemaItemKind::Column,
            table: Some(table),
            declared_type,
            is_primary_key: false,
            foreign_key_refs: Vec::new(),
            sample_tokens: Vec::new(),
            declaration_index,
        }
    }

    pub fn with_primary_key(mut self, is_primary_key: bool) -> Self {
        self.is_primary_key = is_primary_key;
        self
    }

    pub fn with_foreign_key_refs(mut self, refs: Vec<String>) -> Self {
        self.foreign_key_refs = refs;
        self
    }

    pub fn with_sample_tokens(mut self, tokens: Vec<String>) -> Self {
        self.sample_tokens = tokens;
        self
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn kind(&self) -> SchemaItemKind {
        self.kind
    }

    pub fn is_table(&self) -> bool {
        self.kind == SchemaItemKind::Table
    }

    pub fn is_column(&self) -> bool {
        self.kind == SchemaItemKind::Column
    }

    /// Parent table name: the identifier itself for tables.
    pub fn table_name(&self) -> &str {
        self.table.as_deref().unwrap_or(&self.identifier)
    }

    /// Bare column name without the table prefix; `None` for tables.
    pub fn column_name(&self) -> Option<&str> {
        match self.kind {
            SchemaItemKind::Table => None,
            SchemaItemKind::Column => self.identifier.split('.').nth(1),
        }
    }

    pub fn declared_type(&self) -> Option<&str> {
        self.declared_type.as_deref()
    }

    pub fn is_primary_key(&self) -> bool {
        self.is_primary_key
    }

    pub fn is_foreign_key(&self) -> bool {
        !self.foreign_key_refs.is_empty()
    }

    /// A key column must survive pruning for downstream join correctness.
    pub fn is_key(&self) -> bool {
        self.is_primary_key || self.is_foreign_key()
    }

    pub fn foreign_key_refs(&self) -> &[String] {
        &self.foreign_key_refs
    }

    pub fn sample_tokens(&self) -> &[String] {
        &self.sample_tokens
    }

    pub fn declaration_index(&self) -> usize {
        self.declaration_index
    }
}

/// One record of a Spider-style `tables.json` file.
#[derive(Debug, Clone, Deserialize)]
pub struct TablesRecord {
    pub db_id: String,
    pub table_names_original: Vec<String>,
    /// `[table_index, column_name]` pairs; table index -1 is the `*` slot.
    pub column_names_original: Vec<(i64, String)>,
    #[serde(default)]
    pub column_types: Vec<String>,
    #[serde(default)]
    pub primary_keys: Vec<usize>,
    /// Pairs of column indices into `column_names_original`.
    #[serde(default)]
    pub foreign_keys: Vec<(usize, usize)>,
}

/// The full schema-item set of one database, loaded once and reused
/// across every question that targets it.
#[derive(Debug, Clone)]
pub struct DatabaseSchema {
    db_id: String,
    items: Vec<SchemaItem>,
}

impl DatabaseSchema {
    pub fn from_record(record: &TablesRecord) -> Self {
        let column_identifier = |index: usize| -> Option<String> {
            let (table_idx, name) = record.column_names_original.get(index)?;
            let table = record.table_names_original.get(usize::try_from(*table_idx).ok()?)?;
            Some(format!("{}.{}", table, name))
        };

        let mut items = Vec::new();
        let mut declaration_index = 0;

        for table in &record.table_names_original {
            items.push(SchemaItem::table(table, declaration_index));
            declaration_index += 1;
        }

        for (col_idx, (table_idx, name)) in record.column_names_original.iter().enumerate() {
            // Skip the `*` placeholder slot.
            let Ok(table_idx) = usize::try_from(*table_idx) else {
                continue;
            };
            let Some(table) = record.table_names_original.get(table_idx) else {
                continue;
            };

            let declared_type = record.column_types.get(col_idx).cloned();
            let refs: Vec<String> = record
                .foreign_keys
                .iter()
                .filter(|(from, _)| *from == col_idx)
                .filter_map(|(_, to)| column_identifier(*to))
                .collect();

            items.push(
                SchemaItem::column(table, name, declared_type, declaration_index)
                    .with_primary_key(record.primary_keys.contains(&col_idx))
                    .with_foreign_key_refs(refs),
            );
            declaration_index += 1;
        }

        Self {
            db_id: record.db_id.clone(),
            items,
        }
    }

    pub fn db_id(&self) -> &str {
        &self.db_id
    }

    pub fn items(&self) -> &[SchemaItem] {
        &self.items
    }

    pub fn tables(&self) -> impl Iterator<Item = &SchemaItem> {
        self.items.iter().filter(|item| item.is_table())
    }

    pub fn columns_of<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a SchemaItem> {
        self.items
            .iter()
            .filter(move |item| item.is_column() && item.table_name() == table)
    }
}
