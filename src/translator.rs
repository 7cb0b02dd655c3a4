//! Query translation: lowers a `Query` into SQLite clause fragments.
//!
//! A `TranslationContext` owns the name allocator, the parameter set and the
//! recursive CTE fragments of one pass. Nested translations (joins, combine
//! branches, subqueries, recursion) all run against the same context so names
//! never collide within a statement.

use tracing::trace;

use crate::ast::{
    Condition, Connector, ExecutionMode, Join, JoinCriterion, JoinKind, JoinSide, Operator,
    Query, RecursionDirection,
};
use crate::dialect::{
    self, combine_token, join_token, limit_clause, operator_token, qualified, wrap_table,
    DEFAULT_ALIAS, RECURSIVE_KEYWORD,
};
use crate::error::{DispatchError, DispatchResult};
use crate::naming::{NameAllocator, RecursiveTable};
use crate::params::ParameterSet;
use crate::schema::SchemaCatalog;

/// Clause fragments produced for one query.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationResult {
    /// WHERE body, without the keyword
    pub condition: String,
    /// ORDER BY body, without the keyword
    pub sort: String,
    /// Join clauses, each starting with a space
    pub join: String,
    /// Combine branches, each starting with a space
    pub combine: String,
    /// `WITH RECURSIVE ...` text that must precede the statement
    pub pre_script: String,
    pub group: String,
    pub having: String,
    /// Conditions that belong to WHERE but were produced by joined objects
    pub join_extra_condition: String,
    /// Properties projected by every combine branch
    pub combine_fields: Vec<String>,
    /// False once a recursive CTE has replaced ordinary join attachment
    pub allow_join: bool,
    pub recursive_table: Option<RecursiveTable>,
    pub parameters: ParameterSet,
}

impl Default for TranslationResult {
    fn default() -> Self {
        Self {
            condition: String::new(),
            sort: String::new(),
            join: String::new(),
            combine: String::new(),
            pre_script: String::new(),
            group: String::new(),
            having: String::new(),
            join_extra_condition: String::new(),
            combine_fields: Vec::new(),
            allow_join: true,
            recursive_table: None,
            parameters: ParameterSet::new(),
        }
    }
}

impl TranslationResult {
    /// The condition ANDed with the join extra condition.
    pub fn full_condition(&self) -> String {
        and_join(&self.condition, &self.join_extra_condition)
    }

    /// ` WHERE ...` or an empty string.
    pub fn where_clause(&self) -> String {
        where_clause(&self.full_condition())
    }

    pub fn has_pre_script(&self) -> bool {
        !self.pre_script.is_empty()
    }

    pub fn has_join(&self) -> bool {
        !self.join.is_empty()
    }

    pub fn has_combine(&self) -> bool {
        !self.combine.is_empty()
    }

    /// Join text still usable by a consumer of this result.
    pub fn attachable_join(&self) -> &str {
        if self.allow_join {
            &self.join
        } else {
            ""
        }
    }
}

pub(crate) fn where_clause(condition: &str) -> String {
    if condition.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", condition)
    }
}

/// `left AND (right)`, skipping empty sides.
pub(crate) fn and_join(left: &str, right: &str) -> String {
    match (left.is_empty(), right.is_empty()) {
        (_, true) => left.to_string(),
        (true, false) => right.to_string(),
        (false, false) => format!("{} AND ({})", left, right),
    }
}

fn append_connected(target: &mut String, connector: Connector, text: &str) {
    if text.is_empty() {
        return;
    }
    if target.is_empty() {
        target.push_str(text);
    } else {
        target.push(' ');
        target.push_str(connector.keyword());
        target.push(' ');
        target.push_str(text);
    }
}

/// Mutable state of one translation pass.
pub struct TranslationContext<'a> {
    pub(crate) catalog: &'a dyn SchemaCatalog,
    pub(crate) names: NameAllocator,
    pub(crate) parameters: ParameterSet,
    with_scripts: Vec<String>,
    recursive_table: Option<RecursiveTable>,
}

impl<'a> TranslationContext<'a> {
    pub fn new(catalog: &'a dyn SchemaCatalog) -> Self {
        Self {
            catalog,
            names: NameAllocator::new(),
            parameters: ParameterSet::new(),
            with_scripts: Vec::new(),
            recursive_table: None,
        }
    }

    pub fn catalog(&self) -> &'a dyn SchemaCatalog {
        self.catalog
    }

    /// Translates a top-level query, resetting all pass state first.
    pub fn translate(&mut self, query: &Query) -> DispatchResult<TranslationResult> {
        self.names.reset();
        self.parameters = ParameterSet::new();
        self.with_scripts.clear();
        self.recursive_table = None;

        let mut result = self.execute_translation(query, DEFAULT_ALIAS, true)?;
        if !self.with_scripts.is_empty() {
            result.pre_script = format!("{} {}", RECURSIVE_KEYWORD, self.with_scripts.join(","));
        }
        result.condition = result.full_condition();
        result.join_extra_condition.clear();
        result.recursive_table = self.recursive_table.clone();
        result.parameters = self.take_parameters();
        Ok(result)
    }

    /// Binds a value under a fresh name and returns its reference (`@name`).
    pub fn bind(&mut self, base: &str, value: sea_query::Value) -> String {
        let name = self.names.new_parameter_name(base);
        let reference = dialect::parameter_ref(&name);
        self.parameters.insert(name, value);
        reference
    }

    /// Moves out the parameters bound since the last translation.
    pub fn take_parameters(&mut self) -> ParameterSet {
        std::mem::take(&mut self.parameters)
    }

    /// Formatted column of `entity` under `alias`, e.g. ``TB.`Name` ``.
    pub fn column(&self, entity: &str, alias: &str, property: &str) -> String {
        qualified(alias, &self.catalog.column_name(entity, property))
    }

    pub(crate) fn execute_translation(
        &mut self,
        query: &Query,
        alias: &str,
        use_sort: bool,
    ) -> DispatchResult<TranslationResult> {
        let mut result = TranslationResult::default();

        if let ExecutionMode::Text(script) = &query.mode {
            result.condition = script.text.clone();
            for (name, value) in &script.parameters {
                self.parameters.insert(name.clone(), value.to_value());
            }
            return Ok(result);
        }

        let entity = query.entity.as_str();

        // conditions
        for node in &query.conditions {
            let text = self.translate_condition(entity, alias, node)?;
            append_connected(&mut result.condition, node.connector(), &text);
        }

        // sort
        if use_sort {
            let sorts: Vec<String> = query
                .sorts
                .iter()
                .map(|sort| {
                    let field = self.format_field(entity, alias, &sort.field);
                    format!("{} {}", field, if sort.desc { "DESC" } else { "ASC" })
                })
                .collect();
            result.sort = sorts.join(",");
        }

        // group and having
        if !query.group_by.is_empty() {
            let groups: Vec<String> = query
                .group_by
                .iter()
                .map(|field| self.format_field(entity, alias, field))
                .collect();
            result.group = groups.join(",");
        }
        for node in &query.having {
            let text = self.translate_condition(entity, alias, node)?;
            append_connected(&mut result.having, node.connector(), &text);
        }

        // joins
        for join in &query.joins {
            self.translate_join(query, alias, join, &mut result)?;
        }

        // recursion replaces the query's own filter with the CTE membership test
        if let Some(recursion) = &query.recursion {
            // a second recursion in the same pass replaces the tracked table
            let table = self.names.new_recursive_table();
            self.recursive_table = Some(table.clone());
            let data = self.catalog.column_name(entity, &recursion.data_field);
            let relation = self.catalog.column_name(entity, &recursion.relation_field);
            let data_field = qualified(alias, &data);
            let relation_field = qualified(alias, &relation);
            let equality = match recursion.direction {
                RecursionDirection::Ancestors => {
                    format!("{}={}", data_field, qualified(&table.alias, &relation))
                }
                RecursionDirection::Descendants => {
                    format!("{}={}", relation_field, qualified(&table.alias, &data))
                }
            };
            let source = self.source_table(entity)?;
            let script = format!(
                "{name} AS (SELECT {d},{r} FROM {source} AS {alias}{join}{seed} UNION ALL SELECT {d},{r} FROM {source} AS {alias} JOIN {name} AS {rtt} ON {equality})",
                name = table.name,
                d = data_field,
                r = relation_field,
                source = source,
                alias = alias,
                join = result.join,
                seed = result.where_clause(),
                rtt = table.alias,
                equality = equality,
            );
            trace!(entity, script = %script, "recursive table");
            self.with_scripts.push(script);

            result.condition = format!(
                "{} IN (SELECT {} FROM {} AS {})",
                data_field,
                qualified(&table.alias, &data),
                table.name,
                table.alias
            );
            result.join.clear();
            result.join_extra_condition.clear();
            result.allow_join = false;
            result.recursive_table = Some(table);
        }

        // combine
        if !query.combines.is_empty() {
            let fields = self.combine_fields(query);
            let mut combine = String::new();
            for item in &query.combines {
                let branch = &item.query;
                if branch.is_text() {
                    return Err(DispatchError::RawQuery {
                        entity: branch.entity.clone(),
                        usage: "a combine branch",
                    });
                }
                let branch_alias = self.names.new_alias();
                let branch_result = self.execute_translation(branch, &branch_alias, false)?;
                let projection = self.projection(&branch.entity, &branch_alias, &fields);
                let source = self.source_table(&branch.entity)?;
                combine.push_str(&format!(
                    " {} SELECT {} FROM {} AS {}{}{}{}",
                    combine_token(item.operator),
                    projection,
                    source,
                    branch_alias,
                    branch_result.attachable_join(),
                    branch_result.where_clause(),
                    branch_result.combine
                ));
            }
            result.combine = combine;
            result.combine_fields = fields;
        }

        trace!(entity, alias, condition = %result.condition, "translated query");
        Ok(result)
    }

    /// The entity's table, or a `UNION ALL` of every partition as a derived source.
    pub(crate) fn source_table(&self, entity: &str) -> DispatchResult<String> {
        let tables: Vec<String> = self
            .catalog
            .table_names(entity, None)
            .into_iter()
            .filter(|table| !table.is_empty())
            .collect();
        match tables.as_slice() {
            [] => Err(DispatchError::MissingTable {
                entity: entity.to_string(),
            }),
            [table] => Ok(wrap_table(table)),
            _ => {
                let parts: Vec<String> = tables
                    .iter()
                    .map(|table| format!("SELECT * FROM {}", wrap_table(table)))
                    .collect();
                Ok(format!("({})", parts.join(" UNION ALL ")))
            }
        }
    }

    /// Comma separated projection of `fields`, or `alias.*` when empty.
    pub(crate) fn projection(&self, entity: &str, alias: &str, fields: &[String]) -> String {
        if fields.is_empty() {
            return format!("{}.*", alias);
        }
        fields
            .iter()
            .map(|field| self.column(entity, alias, field))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Fields every combine branch projects.
    ///
    /// A shared explicit list wins; otherwise primary keys, then all queryable fields.
    pub(crate) fn combine_fields(&self, query: &Query) -> Vec<String> {
        let explicit: Vec<&Vec<String>> = std::iter::once(&query.fields)
            .chain(query.combines.iter().map(|c| &c.query.fields))
            .filter(|fields| !fields.is_empty())
            .collect();
        if let Some(first) = explicit.first() {
            if explicit.iter().all(|fields| fields == first) {
                return (*first).clone();
            }
        }
        let keys: Vec<String> = self
            .catalog
            .primary_keys(&query.entity)
            .into_iter()
            .map(|f| f.property)
            .collect();
        if !keys.is_empty() {
            return keys;
        }
        self.catalog
            .queryable_fields(&query.entity)
            .into_iter()
            .map(|f| f.property)
            .collect()
    }

    fn translate_join(
        &mut self,
        query: &Query,
        alias: &str,
        join: &Join,
        result: &mut TranslationResult,
    ) -> DispatchResult<()> {
        let target = &join.target;
        if target.is_text() {
            return Err(DispatchError::RawQuery {
                entity: target.entity.clone(),
                usage: "a join target",
            });
        }
        let criteria = self.join_criteria(query, join)?;
        if !target.combines.is_empty() {
            return self.translate_combined_join(query, alias, join, &criteria, result);
        }

        let join_alias = self.names.new_alias();
        let join_result = self.execute_translation(target, &join_alias, false)?;
        let table = self.source_table(&target.entity)?;
        let mut on = self.join_condition(query, alias, join, &criteria, &join_alias)?;

        let target_condition = &join_result.condition;
        if join_result.allow_join && join.kind != JoinKind::Cross && !on.is_empty() {
            if !target_condition.is_empty() {
                on = format!("{} AND ({})", on, target_condition);
            }
        } else {
            result.join_extra_condition = and_join(&result.join_extra_condition, target_condition);
        }
        result.join_extra_condition =
            and_join(&result.join_extra_condition, &join_result.join_extra_condition);
        self.append_join_filter(join, &join_alias, result)?;

        result.join.push_str(&format!(
            " {} {} AS {}{}{}",
            join_token(join.kind),
            table,
            join_alias,
            on_clause(&on),
            join_result.attachable_join()
        ));
        Ok(())
    }

    /// Joins a combined target as a derived table under a fresh alias.
    ///
    /// The derived table projects the target's fields plus every target field
    /// the ON criteria and the extra filter reference.
    fn translate_combined_join(
        &mut self,
        query: &Query,
        alias: &str,
        join: &Join,
        criteria: &[JoinCriterion],
        result: &mut TranslationResult,
    ) -> DispatchResult<()> {
        let target = &join.target;
        let fields = self.derived_table_fields(join, criteria);
        let inner_alias = self.names.new_alias();
        let inner = self.execute_translation(&with_projection(target, &fields), &inner_alias, false)?;
        let table = self.source_table(&target.entity)?;
        let join_alias = self.names.new_alias();
        let on = self.join_condition(query, alias, join, criteria, &join_alias)?;
        self.append_join_filter(join, &join_alias, result)?;

        result.join.push_str(&format!(
            " {} (SELECT {} FROM {} AS {}{}{}{}) AS {}{}",
            join_token(join.kind),
            self.projection(&target.entity, &inner_alias, &inner.combine_fields),
            table,
            inner_alias,
            inner.attachable_join(),
            inner.where_clause(),
            inner.combine,
            join_alias,
            on_clause(&on)
        ));
        Ok(())
    }

    fn derived_table_fields(&self, join: &Join, criteria: &[JoinCriterion]) -> Vec<String> {
        let target = &join.target;
        let mut fields: Vec<String> = if target.fields.is_empty() {
            self.catalog
                .queryable_fields(&target.entity)
                .into_iter()
                .map(|f| f.property)
                .collect()
        } else {
            target.fields.clone()
        };
        let mut referenced = Vec::new();
        for criterion in criteria {
            match criterion {
                JoinCriterion::Fields { target: field, .. } => referenced.push(field.name.clone()),
                JoinCriterion::Value {
                    side: JoinSide::Target,
                    field,
                    ..
                } => referenced.push(field.name.clone()),
                JoinCriterion::Group {
                    side: JoinSide::Target,
                    conditions,
                    ..
                } => condition_fields(conditions, &mut referenced),
                _ => {}
            }
        }
        if let Some(filter) = &join.extra_filter {
            condition_fields(&filter.conditions, &mut referenced);
        }
        for name in referenced {
            if !fields.contains(&name) {
                fields.push(name);
            }
        }
        fields
    }

    /// Extra filter conditions always land in WHERE.
    fn append_join_filter(
        &mut self,
        join: &Join,
        join_alias: &str,
        result: &mut TranslationResult,
    ) -> DispatchResult<()> {
        if let Some(filter) = &join.extra_filter {
            let filter_result = self.execute_translation(filter, join_alias, false)?;
            result.join_extra_condition =
                and_join(&result.join_extra_condition, &filter_result.full_condition());
        }
        Ok(())
    }

    /// Explicit criteria, or criteria derived from keys or relations. Cross joins have none.
    fn join_criteria(&self, source: &Query, join: &Join) -> DispatchResult<Vec<JoinCriterion>> {
        if join.kind == JoinKind::Cross {
            Ok(Vec::new())
        } else if join.criteria.is_empty() {
            self.derive_join_criteria(&source.entity, &join.target.entity)
        } else {
            Ok(join.criteria.clone())
        }
    }

    /// ON body for a join.
    pub(crate) fn join_condition(
        &mut self,
        source: &Query,
        source_alias: &str,
        join: &Join,
        criteria: &[JoinCriterion],
        target_alias: &str,
    ) -> DispatchResult<String> {
        let target = &join.target;
        let mut text = String::new();
        for criterion in criteria {
            let part = match criterion {
                JoinCriterion::Fields {
                    source: source_field,
                    operator,
                    target: target_field,
                    ..
                } => format!(
                    "{} {} {}",
                    self.format_field(&source.entity, source_alias, source_field),
                    operator_token(*operator),
                    self.format_field(&target.entity, target_alias, target_field)
                ),
                JoinCriterion::Value {
                    side,
                    field,
                    operator,
                    value,
                    ..
                } => {
                    let (entity, alias) = side_of(*side, source, source_alias, target, target_alias);
                    let criterion = crate::ast::Criterion {
                        field: field.clone(),
                        operator: *operator,
                        value: value.clone(),
                        connector: Connector::And,
                    };
                    self.translate_criterion(entity, alias, &criterion)?
                }
                JoinCriterion::Group {
                    side, conditions, ..
                } => {
                    let (entity, alias) = side_of(*side, source, source_alias, target, target_alias);
                    let group = Condition::group(Connector::And, conditions.clone());
                    self.translate_condition(entity, alias, &group)?
                }
            };
            append_connected(&mut text, criterion.connector(), &part);
        }
        Ok(text)
    }

    fn derive_join_criteria(&self, source: &str, target: &str) -> DispatchResult<Vec<JoinCriterion>> {
        let pairs: Vec<(String, String)> = if source == target {
            self.catalog
                .primary_keys(source)
                .into_iter()
                .map(|key| (key.property.clone(), key.property))
                .collect()
        } else {
            self.catalog.relation_fields(source, target)
        };
        if pairs.is_empty() {
            return Err(DispatchError::MissingRelation {
                source_entity: source.to_string(),
                target_entity: target.to_string(),
            });
        }
        Ok(pairs
            .into_iter()
            .map(|(source_field, target_field)| JoinCriterion::Fields {
                source: source_field.into(),
                operator: Operator::Equal,
                target: target_field.into(),
                connector: Connector::And,
            })
            .collect())
    }

    /// Criterion text for `field OP (subquery)`.
    pub(crate) fn translate_subquery(
        &mut self,
        operator: Operator,
        field: &str,
        subquery: &Query,
    ) -> DispatchResult<String> {
        let token = operator_token(operator);
        if let ExecutionMode::Text(script) = &subquery.mode {
            for (name, value) in &script.parameters {
                self.parameters.insert(name.clone(), value.to_value());
            }
            return Ok(format!("{} {} ({})", field, token, script.text));
        }
        if subquery.fields.len() != 1 {
            return Err(DispatchError::SubqueryField {
                entity: subquery.entity.clone(),
                found: subquery.fields.len(),
            });
        }

        let entity = subquery.entity.as_str();
        let page_size = subquery.paging.map(|paging| paging.size).unwrap_or(0);
        // sorting only matters under a limit
        let limited = !operator.is_collection() || page_size > 0;
        let sub_alias = self.names.new_alias();
        // every combine branch projects the compared field
        let projected = with_projection(subquery, &subquery.fields);
        let sub_result = self.execute_translation(&projected, &sub_alias, limited)?;
        let column = self.catalog.column_name(entity, &subquery.fields[0]);
        let output = qualified(&sub_alias, &column);
        let table = self.source_table(entity)?;
        let order = if sub_result.sort.is_empty() {
            String::new()
        } else {
            format!(" ORDER BY {}", sub_result.sort)
        };

        let inner = if sub_result.has_combine() {
            let projection = self.projection(entity, &sub_alias, &sub_result.combine_fields);
            format!(
                "SELECT {} FROM (SELECT {} FROM {} AS {}{}{}{}) AS {}{}",
                output,
                projection,
                table,
                sub_alias,
                sub_result.attachable_join(),
                sub_result.where_clause(),
                sub_result.combine,
                sub_alias,
                order
            )
        } else {
            format!(
                "SELECT {} FROM {} AS {}{}{}{}",
                output,
                table,
                sub_alias,
                sub_result.attachable_join(),
                sub_result.where_clause(),
                order
            )
        };

        let value = if operator.is_collection() {
            if page_size > 0 {
                let wrap_alias = self.names.new_alias();
                format!(
                    "(SELECT {} FROM ({} {}) AS {})",
                    qualified(&wrap_alias, &column),
                    inner,
                    limit_clause(0, page_size),
                    wrap_alias
                )
            } else {
                format!("({})", inner)
            }
        } else {
            format!("({} {})", inner, limit_clause(0, 1))
        };
        Ok(format!("{} {} {}", field, token, value))
    }
}

fn on_clause(on: &str) -> String {
    if on.is_empty() {
        String::new()
    } else {
        format!(" ON {}", on)
    }
}

fn condition_fields(conditions: &[Condition], fields: &mut Vec<String>) {
    for condition in conditions {
        match condition {
            Condition::Criterion(criterion) => fields.push(criterion.field.name.clone()),
            Condition::Group { conditions, .. } => condition_fields(conditions, fields),
        }
    }
}

/// Clone of `query` where the query and every combine branch project `fields`.
pub(crate) fn with_projection(query: &Query, fields: &[String]) -> Query {
    let mut projected = query.clone();
    projected.fields = fields.to_vec();
    for combine in &mut projected.combines {
        combine.query.fields = fields.to_vec();
    }
    projected
}

fn side_of<'q>(
    side: JoinSide,
    source: &'q Query,
    source_alias: &'q str,
    target: &'q Query,
    target_alias: &'q str,
) -> (&'q str, &'q str) {
    match side {
        JoinSide::Source => (source.entity.as_str(), source_alias),
        JoinSide::Target => (target.entity.as_str(), target_alias),
    }
}
