use tabled::{settings::Style, Table, Tabled};
use crate::schema::{EntityDescriptor, FieldKind, Relation};

#[derive(Tabled)]
pub struct TableRow {
    #[tabled(rename = "Table")]
    pub metric: String,
    #[tabled(rename = "Rows")]
    pub value: String,
}

pub struct TableBuilder {
    rows: Vec<TableRow>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    pub fn add_row(&mut self, label: &str, value: &str) {
        self.rows.push(TableRow {
            metric: label.to_string(),
            value: value.to_string(),
        });
    }

    pub fn build(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }

        Table::new(&self.rows).with(Style::rounded()).to_string()
    }
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub fn stats_table(stats: &[(String, usize)]) -> String {
    let mut builder = TableBuilder::new();
    for (table, rows) in stats {
        builder.add_row(table, &rows.to_string());
    }
    builder.build()
}

#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "Field")]
    name: String,
    #[tabled(rename = "Column")]
    column: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Details")]
    details: String,
    #[tabled(rename = "Declared In")]
    declared_in: String,
}

/// Resolved fields of a descriptor, in lookup order
pub fn fields_table(descriptor: &EntityDescriptor) -> String {
    let rows: Vec<FieldRow> = descriptor
        .fields()
        .map(|field| {
            let details = match &field.kind {
                FieldKind::Identity(value_type) | FieldKind::Scalar(value_type) => value_type.to_string(),
                FieldKind::ForeignReference { target } => format!("-> {}", target),
                FieldKind::ForeignCollection { element, relation: Relation::OneToMany { value_column } } => {
                    match value_column {
                        Some(column) => format!("{}.{}", element, column),
                        None => element.clone(),
                    }
                }
                FieldKind::ForeignCollection { element, relation: Relation::ManyToMany { target } } => {
                    format!("{} via {}", target, element)
                }
            };
            let mut name = field.name.clone();
            if let Some(key) = &field.map_from {
                name = format!("{} (from '{}')", name, key);
            }
            FieldRow {
                name,
                column: field.column.clone().unwrap_or_else(|| "-".to_string()),
                kind: field.kind.as_str().to_string(),
                details,
                declared_in: field.declared_in.clone(),
            }
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn test_fields_table_lists_inherited_fields() {
        let resolver = testing::user_resolver();
        let post = resolver.describe("Post").unwrap();
        let rendered = fields_table(&post);
        assert!(rendered.contains("slug"));
        assert!(rendered.contains("author_id"));
        assert!(rendered.contains("Authored"));
    }

    #[test]
    fn test_empty_stats_render_nothing() {
        assert!(stats_table(&[]).is_empty());
        assert!(stats_table(&[("User".to_string(), 2)]).contains("User"));
    }
}
