//! Statement generation: full SQLite statements from commands.
//!
//! UPDATE and DELETE use the single-table form when the translated filter has
//! no join, pre-script or combine. Otherwise the target rows are selected by
//! primary key through a derived table and the mutation matches on that key.

use tracing::debug;

use crate::ast::{ExecutionMode, Literal, Query};
use crate::command::{
    AggregateFunction, Command, DeleteCommand, InsertCommand, SelectOutput, UpdateCommand,
    UpdateValue,
};
use crate::dialect::{
    calculate_token, convert_field, data_type_token, last_insert_id_statement, limit_clause,
    qualified, wrap_keyword, wrap_table, DEFAULT_ALIAS, PAGING_TABLE_NAME, TOTAL_COUNT_FIELD,
};
use crate::error::{DispatchError, DispatchResult};
use crate::params::ParameterSet;
use crate::schema::{FieldDescriptor, FieldRole, SchemaCatalog};
use crate::translator::{with_projection, TranslationContext, TranslationResult};

/// A statement ready for the execution adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub text: String,
    pub parameters: ParameterSet,
    /// Zero affected rows is a logical failure for this statement
    pub must_affect_rows: bool,
    pub has_pre_script: bool,
}

impl Statement {
    fn new(text: String, parameters: ParameterSet) -> Self {
        Self {
            text,
            parameters,
            must_affect_rows: false,
            has_pre_script: false,
        }
    }
}

/// Builds statements for commands against one schema catalog.
pub struct StatementGenerator<'a> {
    catalog: &'a dyn SchemaCatalog,
}

impl<'a> StatementGenerator<'a> {
    pub fn new(catalog: &'a dyn SchemaCatalog) -> Self {
        Self { catalog }
    }

    pub fn generate(&self, command: &Command) -> DispatchResult<Vec<Statement>> {
        let statements = match command {
            Command::Select { query, output } => vec![self.generate_select(query, *output)?],
            Command::Page { query, page, size } => vec![self.generate_page(query, *page, *size)?],
            Command::Aggregate { function, query } => {
                vec![self.generate_aggregate(*function, query)?]
            }
            Command::Insert(insert) => self.generate_insert(insert)?,
            Command::Update(update) => self.generate_update(update)?,
            Command::Delete(delete) => self.generate_delete(delete)?,
            Command::Script {
                script,
                must_affect_rows,
            } => {
                let parameters = script
                    .parameters
                    .iter()
                    .map(|(name, value)| (name.clone(), value.to_value()))
                    .collect();
                let mut statement = Statement::new(script.text.clone(), parameters);
                statement.must_affect_rows = *must_affect_rows;
                vec![statement]
            }
            Command::CreateTable { entity } => self.generate_create_table(entity)?,
        };
        for statement in &statements {
            debug!(
                entity = command.entity(),
                text = %statement.text,
                parameters = statement.parameters.len(),
                must_affect_rows = statement.must_affect_rows,
                "generated statement"
            );
        }
        Ok(statements)
    }

    pub fn generate_select(&self, query: &Query, output: SelectOutput) -> DispatchResult<Statement> {
        if let ExecutionMode::Text(script) = &query.mode {
            let parameters = script
                .parameters
                .iter()
                .map(|(name, value)| (name.clone(), value.to_value()))
                .collect();
            let text = match output {
                SelectOutput::Rows => script.text.clone(),
                SelectOutput::Count => format!("SELECT COUNT(1) FROM ({}) AS {}", script.text, DEFAULT_ALIAS),
                SelectOutput::Exists => format!("SELECT EXISTS({})", script.text),
            };
            return Ok(Statement::new(text, parameters));
        }

        let mut ctx = TranslationContext::new(self.catalog);
        let result = ctx.translate(query)?;
        let body = self.select_body(&ctx, query, &result)?;

        let text = match output {
            SelectOutput::Rows => {
                let mut text = body;
                if !result.sort.is_empty() {
                    text.push_str(&format!(" ORDER BY {}", result.sort));
                }
                if let Some(paging) = query.paging.filter(|paging| paging.size > 0) {
                    text.push(' ');
                    text.push_str(&limit_clause(paging.offset, paging.size));
                }
                text
            }
            SelectOutput::Count => format!("SELECT COUNT(1) FROM ({}) AS {}", body, DEFAULT_ALIAS),
            SelectOutput::Exists => format!("SELECT EXISTS({})", body),
        };
        Ok(finish(text, result))
    }

    /// One page of rows with the total count of the unpaged query.
    ///
    /// `page` is 1-based; the default field orders the page when no sort is given.
    pub fn generate_page(&self, query: &Query, page: u64, size: u64) -> DispatchResult<Statement> {
        if query.is_text() {
            return Err(DispatchError::RawQuery {
                entity: query.entity.clone(),
                usage: "a paged query",
            });
        }
        let mut ctx = TranslationContext::new(self.catalog);
        let result = ctx.translate(query)?;
        let body = self.select_body(&ctx, query, &result)?;
        let output: Vec<String> = if result.has_combine() {
            result.combine_fields.clone()
        } else if query.fields.is_empty() {
            self.catalog
                .queryable_fields(&query.entity)
                .into_iter()
                .map(|f| f.property)
                .collect()
        } else {
            query.fields.clone()
        };
        // the paging table only exposes projected fields
        let default_field = self
            .catalog
            .default_field(&query.entity)
            .filter(|f| output.contains(&f.property));

        let count_target = default_field
            .as_ref()
            .map(|f| wrap_keyword(&f.property))
            .unwrap_or_else(|| "1".to_string());
        let order = if query.sorts.is_empty() {
            default_field
                .as_ref()
                .map(|f| format!(" ORDER BY {} DESC", qualified(DEFAULT_ALIAS, &f.property)))
                .unwrap_or_default()
        } else {
            let sorts: Vec<String> = query
                .sorts
                .iter()
                .map(|sort| {
                    let field = qualified(DEFAULT_ALIAS, &sort.field.name);
                    let field = match &sort.field.conversion {
                        Some(conversion) => convert_field(&field, conversion),
                        None => field,
                    };
                    format!("{} {}", field, if sort.desc { "DESC" } else { "ASC" })
                })
                .collect();
            format!(" ORDER BY {}", sorts.join(","))
        };

        let paging_table = format!("{} AS ({})", PAGING_TABLE_NAME, body);
        let with = if result.has_pre_script() {
            format!("{},{}", result.pre_script, paging_table)
        } else {
            format!("WITH {}", paging_table)
        };
        let offset = page.max(1).saturating_sub(1).saturating_mul(size);
        let limit = if size > 0 {
            format!(" {}", limit_clause(offset, size))
        } else {
            String::new()
        };
        let text = format!(
            "{with} SELECT (SELECT COUNT({count}) FROM {table}) AS {total},{alias}.* FROM {table} AS {alias}{order}{limit}",
            with = with,
            count = count_target,
            table = PAGING_TABLE_NAME,
            total = TOTAL_COUNT_FIELD,
            alias = DEFAULT_ALIAS,
            order = order,
            limit = limit,
        );

        let has_pre_script = result.has_pre_script();
        Ok(Statement {
            text,
            parameters: result.parameters,
            must_affect_rows: false,
            has_pre_script,
        })
    }

    pub fn generate_aggregate(&self, function: AggregateFunction, query: &Query) -> DispatchResult<Statement> {
        if query.is_text() {
            return Err(DispatchError::RawQuery {
                entity: query.entity.clone(),
                usage: "an aggregate source",
            });
        }
        let entity = query.entity.as_str();
        let target = match query.fields.first() {
            Some(field) => Some(field.clone()),
            None => self.catalog.default_field(entity).map(|f| f.property),
        };
        if target.is_none() && function.requires_field() {
            return Err(DispatchError::MissingAggregateField {
                function: function.name().to_string(),
                entity: entity.to_string(),
            });
        }

        let mut ctx = TranslationContext::new(self.catalog);
        let source = ctx.source_table(entity)?;
        if query.combines.is_empty() {
            let result = ctx.translate(query)?;
            let argument = aggregate_argument(&ctx, entity, target.as_deref());
            let text = format!(
                "SELECT {}({}) FROM {} AS {}{}{}",
                function.name(),
                argument,
                source,
                DEFAULT_ALIAS,
                result.attachable_join(),
                result.where_clause()
            );
            return Ok(finish(text, result));
        }

        // primary keys plus the target keep row identity across the set operation
        let mut fields = self.key_properties(entity);
        if let Some(field) = &target {
            if !fields.contains(field) {
                fields.push(field.clone());
            }
        }
        let result = ctx.translate(&with_projection(query, &fields))?;
        let argument = aggregate_argument(&ctx, entity, target.as_deref());
        let text = format!(
            "SELECT {}({}) FROM (SELECT {} FROM {} AS {}{}{}{}) AS {}",
            function.name(),
            argument,
            ctx.projection(entity, DEFAULT_ALIAS, &result.combine_fields),
            source,
            DEFAULT_ALIAS,
            result.attachable_join(),
            result.where_clause(),
            result.combine,
            DEFAULT_ALIAS
        );
        Ok(finish(text, result))
    }

    pub fn generate_insert(&self, insert: &InsertCommand) -> DispatchResult<Vec<Statement>> {
        let entity = insert.entity.as_str();
        let mut fields = self.catalog.insertable_fields(entity);
        if fields.is_empty() {
            let mut properties: Vec<&String> = insert.values.keys().collect();
            properties.sort();
            fields = properties
                .into_iter()
                .map(|property| self.catalog.resolve_field(entity, property))
                .collect();
        }

        let increment = fields
            .iter()
            .find(|f| f.in_role(FieldRole::Increment) && f.in_role(FieldRole::PrimaryKey))
            .or_else(|| fields.iter().find(|f| f.in_role(FieldRole::Increment)))
            .cloned();
        let split_field = fields.iter().find(|f| f.in_role(FieldRole::SplitValue));
        if increment.is_some() && split_field.is_some() {
            return Err(DispatchError::IncrementWithSplit {
                entity: entity.to_string(),
            });
        }

        let tables = match split_field.and_then(|f| insert.values.get(&f.property)) {
            Some(value) => self.physical_tables(entity, Some(value))?,
            None => {
                let table = self.catalog.table_name(entity);
                if table.is_empty() {
                    return Err(DispatchError::MissingTable {
                        entity: entity.to_string(),
                    });
                }
                vec![table]
            }
        };

        let mut ctx = TranslationContext::new(self.catalog);
        let mut columns = Vec::new();
        let mut values = Vec::new();
        for field in &fields {
            if field.in_role(FieldRole::Increment) {
                continue;
            }
            let value = insert
                .values
                .get(&field.property)
                .cloned()
                .unwrap_or(Literal::Null);
            columns.push(wrap_keyword(&field.column));
            values.push(ctx.bind(&field.property, value.to_value()));
        }
        let parameters = ctx.take_parameters();

        let statements = tables
            .iter()
            .map(|table| {
                let mut text = format!(
                    "INSERT INTO {} ({}) VALUES ({});",
                    wrap_table(table),
                    columns.join(","),
                    values.join(",")
                );
                if let Some(field) = &increment {
                    let alias = insert.id_alias.as_deref().unwrap_or(&field.property);
                    text.push(' ');
                    text.push_str(&last_insert_id_statement(alias));
                }
                Statement {
                    text,
                    parameters: parameters.clone(),
                    must_affect_rows: increment.is_some() || insert.must_affect_rows,
                    has_pre_script: false,
                }
            })
            .collect();
        Ok(statements)
    }

    pub fn generate_update(&self, update: &UpdateCommand) -> DispatchResult<Vec<Statement>> {
        let entity = update.entity.as_str();
        if update.values.is_empty() {
            return Err(DispatchError::EmptyAssignment {
                entity: entity.to_string(),
            });
        }

        let mut ctx = TranslationContext::new(self.catalog);
        let mut result = self.translate_mutation_filter(&mut ctx, entity, update.query.as_ref(), "an update filter")?;

        let mut assignments = Vec::new();
        for (property, value) in &update.values {
            let column = self.catalog.column_name(entity, property);
            let assignment = match value {
                UpdateValue::Set(literal) => {
                    format!("{}={}", wrap_keyword(&column), ctx.bind(property, literal.to_value()))
                }
                UpdateValue::Calculate { operator, value } => format!(
                    "{}={}{}{}",
                    wrap_keyword(&column),
                    qualified(DEFAULT_ALIAS, &column),
                    calculate_token(*operator),
                    ctx.bind(property, value.to_value())
                ),
            };
            assignments.push(assignment);
        }
        result.parameters.union(ctx.take_parameters());
        let assignments = assignments.join(",");

        let statements = self
            .physical_tables(entity, None)?
            .iter()
            .map(|table| {
                let target = format!("UPDATE {} AS {} SET {}", wrap_table(table), DEFAULT_ALIAS, assignments);
                self.mutation_text(entity, table, target, &result)
            })
            .collect::<DispatchResult<Vec<String>>>()?;
        Ok(self.mutation_statements(statements, result, update.must_affect_rows))
    }

    pub fn generate_delete(&self, delete: &DeleteCommand) -> DispatchResult<Vec<Statement>> {
        let entity = delete.entity.as_str();
        let mut ctx = TranslationContext::new(self.catalog);
        let result = self.translate_mutation_filter(&mut ctx, entity, delete.query.as_ref(), "a delete filter")?;

        let statements = self
            .physical_tables(entity, None)?
            .iter()
            .map(|table| {
                let target = format!("DELETE FROM {} AS {}", wrap_table(table), DEFAULT_ALIAS);
                self.mutation_text(entity, table, target, &result)
            })
            .collect::<DispatchResult<Vec<String>>>()?;
        Ok(self.mutation_statements(statements, result, delete.must_affect_rows))
    }

    /// `CREATE TABLE IF NOT EXISTS` for the entity's table, or one per partition.
    pub fn generate_create_table(&self, entity: &str) -> DispatchResult<Vec<Statement>> {
        let fields = self.catalog.queryable_fields(entity);
        if fields.is_empty() {
            return Err(DispatchError::MissingFields {
                entity: entity.to_string(),
            });
        }
        let columns: Vec<String> = fields
            .iter()
            .map(|field| format!("{} {}", wrap_keyword(&field.column), data_type_token(field.data_type)))
            .collect();
        let keys: Vec<String> = fields
            .iter()
            .filter(|field| field.in_role(FieldRole::PrimaryKey))
            .map(|field| format!("{} ASC", wrap_keyword(&field.column)))
            .collect();
        let key_clause = if keys.is_empty() {
            String::new()
        } else {
            format!(", PRIMARY KEY ({})", keys.join(","))
        };

        Ok(self
            .physical_tables(entity, None)?
            .iter()
            .map(|table| {
                let text = format!(
                    "CREATE TABLE IF NOT EXISTS {} ({}{});",
                    wrap_table(table),
                    columns.join(","),
                    key_clause
                );
                Statement::new(text, ParameterSet::new())
            })
            .collect())
    }

    fn translate_mutation_filter(
        &self,
        ctx: &mut TranslationContext<'_>,
        entity: &str,
        query: Option<&Query>,
        usage: &'static str,
    ) -> DispatchResult<TranslationResult> {
        let Some(query) = query else {
            return Ok(TranslationResult::default());
        };
        if query.is_text() {
            return Err(DispatchError::RawQuery {
                entity: entity.to_string(),
                usage,
            });
        }
        if query.combines.is_empty() {
            ctx.translate(query)
        } else {
            let keys = self.key_properties(entity);
            if keys.is_empty() {
                return Err(DispatchError::MissingPrimaryKey {
                    entity: entity.to_string(),
                });
            }
            ctx.translate(&with_projection(query, &keys))
        }
    }

    /// Direct single-table text, or the primary key rewrite.
    fn mutation_text(
        &self,
        entity: &str,
        table: &str,
        target: String,
        result: &TranslationResult,
    ) -> DispatchResult<String> {
        if !result.has_join() && !result.has_pre_script() && !result.has_combine() {
            return Ok(format!("{}{};", target, result.where_clause()));
        }

        let keys = self.catalog.primary_keys(entity);
        if keys.is_empty() {
            return Err(DispatchError::MissingPrimaryKey {
                entity: entity.to_string(),
            });
        }
        let key_expression = keys
            .iter()
            .map(|key| qualified(DEFAULT_ALIAS, &key.column))
            .collect::<Vec<_>>()
            .join("||");
        let key_columns = keys
            .iter()
            .map(|key| qualified(DEFAULT_ALIAS, &key.column))
            .collect::<Vec<_>>()
            .join(",");
        let selection = format!(
            "SELECT {} FROM {} AS {}{}{}{}",
            key_columns,
            wrap_table(table),
            DEFAULT_ALIAS,
            result.attachable_join(),
            result.where_clause(),
            result.combine
        );
        let text = format!(
            "{} WHERE {} IN (SELECT {} FROM ({}) AS {});",
            target, key_expression, key_expression, selection, DEFAULT_ALIAS
        );
        if result.has_pre_script() {
            Ok(format!("{} {}", result.pre_script, text))
        } else {
            Ok(text)
        }
    }

    fn mutation_statements(
        &self,
        texts: Vec<String>,
        result: TranslationResult,
        must_affect_rows: bool,
    ) -> Vec<Statement> {
        let has_pre_script = result.has_pre_script();
        texts
            .into_iter()
            .map(|text| Statement {
                text,
                parameters: result.parameters.clone(),
                must_affect_rows,
                has_pre_script,
            })
            .collect()
    }

    /// `SELECT [DISTINCT] fields FROM ... [GROUP BY] [HAVING]`, wrapping a combine in a derived table.
    fn select_body(
        &self,
        ctx: &TranslationContext<'_>,
        query: &Query,
        result: &TranslationResult,
    ) -> DispatchResult<String> {
        let entity = query.entity.as_str();
        let distinct = if query.distinct { "DISTINCT " } else { "" };
        let source = ctx.source_table(entity)?;
        let mut tail = String::new();
        if !result.group.is_empty() {
            tail.push_str(&format!(" GROUP BY {}", result.group));
        }
        if !result.having.is_empty() {
            tail.push_str(&format!(" HAVING {}", result.having));
        }

        if result.has_combine() {
            let fields: Vec<FieldDescriptor> = result
                .combine_fields
                .iter()
                .map(|property| self.catalog.resolve_field(entity, property))
                .collect();
            Ok(format!(
                "SELECT {}{} FROM (SELECT {} FROM {} AS {}{}{}{}{}) AS {}",
                distinct,
                output_fields(&fields),
                ctx.projection(entity, DEFAULT_ALIAS, &result.combine_fields),
                source,
                DEFAULT_ALIAS,
                result.attachable_join(),
                result.where_clause(),
                tail,
                result.combine,
                DEFAULT_ALIAS
            ))
        } else {
            let fields: Vec<FieldDescriptor> = if query.fields.is_empty() {
                self.catalog.queryable_fields(entity)
            } else {
                query
                    .fields
                    .iter()
                    .map(|property| self.catalog.resolve_field(entity, property))
                    .collect()
            };
            Ok(format!(
                "SELECT {}{} FROM {} AS {}{}{}{}",
                distinct,
                output_fields(&fields),
                source,
                DEFAULT_ALIAS,
                result.attachable_join(),
                result.where_clause(),
                tail
            ))
        }
    }

    /// Tables a statement writes to; an entity without any is a configuration error.
    fn physical_tables(&self, entity: &str, split_value: Option<&Literal>) -> DispatchResult<Vec<String>> {
        let tables: Vec<String> = self
            .catalog
            .table_names(entity, split_value)
            .into_iter()
            .filter(|table| !table.is_empty())
            .collect();
        if tables.is_empty() {
            return Err(DispatchError::MissingTable {
                entity: entity.to_string(),
            });
        }
        Ok(tables)
    }

    fn key_properties(&self, entity: &str) -> Vec<String> {
        self.catalog
            .primary_keys(entity)
            .into_iter()
            .map(|key| key.property)
            .collect()
    }
}

fn aggregate_argument(ctx: &TranslationContext<'_>, entity: &str, target: Option<&str>) -> String {
    match target {
        Some(field) => ctx.column(entity, DEFAULT_ALIAS, field),
        None => "1".to_string(),
    }
}

/// Prefixes the pre-script once and moves the parameters into the statement.
fn finish(text: String, result: TranslationResult) -> Statement {
    let has_pre_script = result.has_pre_script();
    let text = if has_pre_script {
        format!("{} {}", result.pre_script, text)
    } else {
        text
    };
    Statement {
        text,
        parameters: result.parameters,
        must_affect_rows: false,
        has_pre_script,
    }
}

/// Output list aliased back to property names; `TB.*` when nothing is known.
fn output_fields(fields: &[FieldDescriptor]) -> String {
    if fields.is_empty() {
        return format!("{}.*", DEFAULT_ALIAS);
    }
    fields
        .iter()
        .map(|field| {
            let column = qualified(DEFAULT_ALIAS, &field.column);
            if field.column == field.property {
                column
            } else {
                format!("{} AS {}", column, wrap_keyword(&field.property))
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}
