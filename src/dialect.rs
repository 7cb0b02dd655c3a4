//! SQLite token tables and identifier formatting.

use sea_query::{Iden, Quote};

use crate::ast::{CombineOperator, FieldConversion, JoinKind, Literal, Operator};
use crate::command::{AggregateFunction, CalculateOperator};
use crate::schema::FieldType;

/// Identifier quote character.
pub const KEYWORD_QUOTE: u8 = b'`';
/// Prefix of every bind parameter reference.
pub const PARAMETER_PREFIX: &str = "@";
/// Alias of the primary table in every statement.
pub const DEFAULT_ALIAS: &str = "TB";
pub const RECURSIVE_KEYWORD: &str = "WITH RECURSIVE";
pub const PAGING_TABLE_NAME: &str = "QueryPagingTable";
pub const TOTAL_COUNT_FIELD: &str = "QueryDataTotalCount";

/// Column identifier wrapper
#[derive(Debug, Clone)]
pub struct ColumnName(pub String);

impl Iden for ColumnName {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        write!(s, "{}", self.0).unwrap();
    }
}

/// Table identifier wrapper
#[derive(Debug, Clone)]
pub struct TableName(pub String);

impl Iden for TableName {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        write!(s, "{}", self.0).unwrap();
    }
}

fn quote_iden(iden: &dyn Iden) -> String {
    let mut out = String::new();
    iden.prepare(&mut out, Quote::new(KEYWORD_QUOTE));
    out
}

/// Wraps a column name in backticks, doubling any embedded backtick.
pub fn wrap_keyword(name: &str) -> String {
    quote_iden(&ColumnName(name.to_string()))
}

/// Wraps a table name in backticks.
pub fn wrap_table(name: &str) -> String {
    quote_iden(&TableName(name.to_string()))
}

/// `alias.`column``
pub fn qualified(alias: &str, column: &str) -> String {
    format!("{}.{}", alias, wrap_keyword(column))
}

pub fn parameter_ref(name: &str) -> String {
    format!("{}{}", PARAMETER_PREFIX, name)
}

pub fn limit_clause(offset: u64, size: u64) -> String {
    format!("LIMIT {},{}", offset, size)
}

pub fn operator_token(operator: Operator) -> &'static str {
    match operator {
        Operator::Equal => "=",
        Operator::NotEqual => "<>",
        Operator::GreaterThan => ">",
        Operator::GreaterThanOrEqual => ">=",
        Operator::LessThan => "<",
        Operator::LessThanOrEqual => "<=",
        Operator::In => "IN",
        Operator::NotIn => "NOT IN",
        Operator::Like | Operator::BeginLike | Operator::EndLike => "LIKE",
        Operator::NotLike | Operator::NotBeginLike | Operator::NotEndLike => "NOT LIKE",
        Operator::IsNull => "IS NULL",
        Operator::NotNull => "IS NOT NULL",
    }
}

/// Applies the LIKE wildcards for the operator; other operators keep the value.
pub fn format_criterion_value(operator: Operator, value: &Literal) -> Literal {
    match operator {
        Operator::Like | Operator::NotLike => Literal::String(format!("%{}%", value.as_text())),
        Operator::BeginLike | Operator::NotBeginLike => {
            Literal::String(format!("{}%", value.as_text()))
        }
        Operator::EndLike | Operator::NotEndLike => {
            Literal::String(format!("%{}", value.as_text()))
        }
        _ => value.clone(),
    }
}

pub fn join_token(kind: JoinKind) -> &'static str {
    match kind {
        JoinKind::Inner => "INNER JOIN",
        JoinKind::Left => "LEFT JOIN",
        JoinKind::Right => "RIGHT JOIN",
        JoinKind::Full => "FULL JOIN",
        JoinKind::Cross => "CROSS JOIN",
    }
}

pub fn combine_token(operator: CombineOperator) -> &'static str {
    match operator {
        CombineOperator::Union => "UNION",
        CombineOperator::UnionAll => "UNION ALL",
        CombineOperator::Intersect => "INTERSECT",
        CombineOperator::Except => "EXCEPT",
    }
}

pub fn aggregate_token(function: AggregateFunction) -> &'static str {
    match function {
        AggregateFunction::Count => "COUNT",
        AggregateFunction::Sum => "SUM",
        AggregateFunction::Avg => "AVG",
        AggregateFunction::Max => "MAX",
        AggregateFunction::Min => "MIN",
    }
}

pub fn calculate_token(operator: CalculateOperator) -> &'static str {
    match operator {
        CalculateOperator::Add => "+",
        CalculateOperator::Subtract => "-",
        CalculateOperator::Multiply => "*",
        CalculateOperator::Divide => "/",
    }
}

pub fn data_type_token(data_type: FieldType) -> &'static str {
    match data_type {
        FieldType::Text => "TEXT",
        FieldType::Integer => "INTEGER",
        FieldType::Real => "REAL",
        FieldType::Blob => "BLOB",
    }
}

/// Applies a field conversion to an already formatted field expression.
pub fn convert_field(field: &str, conversion: &FieldConversion) -> String {
    match conversion {
        FieldConversion::CharLength => format!("LENGTH({})", field),
        FieldConversion::Trim => format!("TRIM({})", field),
        FieldConversion::JsonValue { path } => {
            format!("JSON_EXTRACT({},'{}')", field, path.replace('\'', "''"))
        }
    }
}

/// Statement recovering the engine-assigned row id after an insert.
pub fn last_insert_id_statement(alias: &str) -> String {
    format!("SELECT LAST_INSERT_ROWID() AS {};", wrap_keyword(alias))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;
    use test_case::test_case;

    #[test_case(Operator::Equal, "=")]
    #[test_case(Operator::NotEqual, "<>")]
    #[test_case(Operator::GreaterThan, ">")]
    #[test_case(Operator::GreaterThanOrEqual, ">=")]
    #[test_case(Operator::LessThan, "<")]
    #[test_case(Operator::LessThanOrEqual, "<=")]
    #[test_case(Operator::In, "IN")]
    #[test_case(Operator::NotIn, "NOT IN")]
    #[test_case(Operator::BeginLike, "LIKE")]
    #[test_case(Operator::NotEndLike, "NOT LIKE")]
    #[test_case(Operator::IsNull, "IS NULL")]
    #[test_case(Operator::NotNull, "IS NOT NULL")]
    fn test_operator_token(operator: Operator, expected: &str) {
        assert_eq!(operator_token(operator), expected);
    }

    #[test]
    fn test_operator_table_is_total() {
        let tokens: HashSet<&str> = Operator::ALL.iter().map(|op| operator_token(*op)).collect();
        // like variants share LIKE / NOT LIKE
        assert_eq!(tokens.len(), 12);
    }

    #[test_case(Operator::Like, "%abc%")]
    #[test_case(Operator::NotLike, "%abc%")]
    #[test_case(Operator::BeginLike, "abc%")]
    #[test_case(Operator::NotBeginLike, "abc%")]
    #[test_case(Operator::EndLike, "%abc")]
    #[test_case(Operator::NotEndLike, "%abc")]
    #[test_case(Operator::Equal, "abc")]
    fn test_like_wrapping(operator: Operator, expected: &str) {
        let formatted = format_criterion_value(operator, &Literal::from("abc"));
        assert_eq!(formatted, Literal::String(expected.to_string()));
    }

    #[test_case(FieldType::Text, "TEXT")]
    #[test_case(FieldType::Integer, "INTEGER")]
    #[test_case(FieldType::Real, "REAL")]
    #[test_case(FieldType::Blob, "BLOB")]
    fn test_data_type_token(data_type: FieldType, expected: &str) {
        assert_eq!(data_type_token(data_type), expected);
    }

    #[test]
    fn test_wrap_keyword() {
        assert_eq!(wrap_keyword("Name"), "`Name`");
        assert_eq!(wrap_keyword("we`ird"), "`we``ird`");
        assert_eq!(qualified("TB", "Age"), "TB.`Age`");
    }

    #[test]
    fn test_convert_field() {
        assert_eq!(convert_field("TB.`Name`", &FieldConversion::CharLength), "LENGTH(TB.`Name`)");
        assert_eq!(
            convert_field(
                "TB.`Data`",
                &FieldConversion::JsonValue {
                    path: "$.o'k".to_string()
                }
            ),
            "JSON_EXTRACT(TB.`Data`,'$.o''k')"
        );
    }

    #[test]
    fn test_limit_and_parameters() {
        assert_eq!(limit_clause(10, 5), "LIMIT 10,5");
        assert_eq!(parameter_ref("Age0"), "@Age0");
        assert_eq!(
            last_insert_id_statement("Id"),
            "SELECT LAST_INSERT_ROWID() AS `Id`;"
        );
    }
}
