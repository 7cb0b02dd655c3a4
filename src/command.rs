//! Commands accepted by the statement generator.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ast::{Literal, Query, RawScript};

/// What a select returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectOutput {
    #[default]
    Rows,
    Count,
    Exists,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Max,
    Min,
}

impl AggregateFunction {
    /// Every function except COUNT needs a concrete field.
    pub fn requires_field(&self) -> bool {
        !matches!(self, AggregateFunction::Count)
    }

    pub fn name(&self) -> &'static str {
        crate::dialect::aggregate_token(*self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculateOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
}

/// New value of an updated field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateValue {
    Set(Literal),
    /// `field = field <op> value`
    Calculate {
        operator: CalculateOperator,
        value: Literal,
    },
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InsertCommand {
    pub entity: String,
    /// Property name -> value; properties absent from the map bind NULL
    pub values: HashMap<String, Literal>,
    /// Column alias for the recovered auto-increment id
    pub id_alias: Option<String>,
    pub must_affect_rows: bool,
}

impl InsertCommand {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            ..Default::default()
        }
    }

    pub fn value(mut self, property: &str, value: impl Into<Literal>) -> Self {
        self.values.insert(property.to_string(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateCommand {
    pub entity: String,
    pub values: Vec<(String, UpdateValue)>,
    #[serde(default)]
    pub query: Option<Query>,
    #[serde(default = "default_true")]
    pub must_affect_rows: bool,
}

impl UpdateCommand {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            values: Vec::new(),
            query: None,
            must_affect_rows: true,
        }
    }

    pub fn set(mut self, property: &str, value: impl Into<Literal>) -> Self {
        self.values
            .push((property.to_string(), UpdateValue::Set(value.into())));
        self
    }

    pub fn calculate(mut self, property: &str, operator: CalculateOperator, value: impl Into<Literal>) -> Self {
        self.values.push((
            property.to_string(),
            UpdateValue::Calculate {
                operator,
                value: value.into(),
            },
        ));
        self
    }

    pub fn filter(mut self, query: Query) -> Self {
        self.query = Some(query);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteCommand {
    pub entity: String,
    #[serde(default)]
    pub query: Option<Query>,
    #[serde(default = "default_true")]
    pub must_affect_rows: bool,
}

impl DeleteCommand {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            query: None,
            must_affect_rows: true,
        }
    }

    pub fn filter(mut self, query: Query) -> Self {
        self.query = Some(query);
        self
    }
}

fn default_true() -> bool {
    true
}

/// A unit of work for the statement generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Command {
    Select {
        query: Query,
        #[serde(default)]
        output: SelectOutput,
    },
    /// One page of rows plus the total row count
    Page {
        query: Query,
        page: u64,
        size: u64,
    },
    Aggregate {
        function: AggregateFunction,
        query: Query,
    },
    Insert(InsertCommand),
    Update(UpdateCommand),
    Delete(DeleteCommand),
    Script {
        script: RawScript,
        #[serde(default)]
        must_affect_rows: bool,
    },
    /// `CREATE TABLE IF NOT EXISTS` for the entity and each of its partitions
    CreateTable { entity: String },
}

impl Command {
    pub fn select(query: Query) -> Self {
        Command::Select {
            query,
            output: SelectOutput::Rows,
        }
    }

    pub fn entity(&self) -> &str {
        match self {
            Command::Select { query, .. }
            | Command::Page { query, .. }
            | Command::Aggregate { query, .. } => &query.entity,
            Command::Insert(insert) => &insert.entity,
            Command::Update(update) => &update.entity,
            Command::Delete(delete) => &delete.entity,
            Command::CreateTable { entity } => entity,
            Command::Script { .. } => "",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_update_command() {
        let json = r#"{
            "kind": "update",
            "entity": "User",
            "values": [["Age", {"calculate": {"operator": "add", "value": 1}}], ["Name", {"set": "bob"}]],
            "query": {"entity": "User", "conditions": [{"criterion": {"field": {"name": "Id"}, "operator": "equal", "value": 3}}]}
        }"#;

        let command: Command = serde_json::from_str(json).unwrap();
        match command {
            Command::Update(update) => {
                assert!(update.must_affect_rows);
                assert_eq!(update.values.len(), 2);
                assert_eq!(
                    update.values[0].1,
                    UpdateValue::Calculate {
                        operator: CalculateOperator::Add,
                        value: Literal::Number(1)
                    }
                );
                assert!(update.query.is_some());
            }
            other => panic!("Expected update command, found {:?}", other),
        }
    }

    #[test]
    fn test_deserialize_select_defaults_to_rows() {
        let command: Command =
            serde_json::from_str(r#"{"kind": "select", "query": {"entity": "User"}}"#).unwrap();
        assert_eq!(command, Command::select(crate::ast::Query::new("User")));
        assert_eq!(command.entity(), "User");
    }

    #[test]
    fn test_deserialize_create_table() {
        let command: Command =
            serde_json::from_str(r#"{"kind": "create_table", "entity": "Order"}"#).unwrap();
        assert_eq!(
            command,
            Command::CreateTable {
                entity: "Order".to_string()
            }
        );
        assert_eq!(command.entity(), "Order");
    }

    #[test]
    fn test_aggregate_field_requirement() {
        assert!(!AggregateFunction::Count.requires_field());
        assert!(AggregateFunction::Sum.requires_field());
        assert_eq!(AggregateFunction::Avg.name(), "AVG");
    }
}
