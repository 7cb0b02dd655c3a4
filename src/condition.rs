//! Condition translation: criteria and nested condition groups.

use tracing::trace;

use crate::ast::{Condition, Criterion, CriterionValue, FieldRef};
use crate::dialect::{convert_field, format_criterion_value, operator_token, qualified};
use crate::error::{DispatchError, DispatchResult};
use crate::translator::TranslationContext;

impl<'a> TranslationContext<'a> {
    /// Lowers one condition node of `entity` (aliased `alias`) to SQL text.
    ///
    /// A group with one child renders that child directly; a group with more
    /// children is parenthesized, and the first child's connector is dropped.
    pub fn translate_condition(
        &mut self,
        entity: &str,
        alias: &str,
        condition: &Condition,
    ) -> DispatchResult<String> {
        match condition {
            Condition::Criterion(criterion) => self.translate_criterion(entity, alias, criterion),
            Condition::Group { conditions, .. } => {
                if let [only] = conditions.as_slice() {
                    return self.translate_condition(entity, alias, only);
                }
                let mut text = String::new();
                for child in conditions {
                    let part = self.translate_condition(entity, alias, child)?;
                    if part.is_empty() {
                        continue;
                    }
                    if !text.is_empty() {
                        text.push(' ');
                        text.push_str(child.connector().keyword());
                        text.push(' ');
                    }
                    text.push_str(&part);
                }
                if text.is_empty() {
                    Ok(text)
                } else {
                    Ok(format!("( {} )", text))
                }
            }
        }
    }

    pub fn translate_criterion(
        &mut self,
        entity: &str,
        alias: &str,
        criterion: &Criterion,
    ) -> DispatchResult<String> {
        let operator = criterion.operator;
        let field = self.format_field(entity, alias, &criterion.field);
        let token = operator_token(operator);

        if !operator.needs_parameter() {
            return Ok(format!("{} {}", field, token));
        }

        let text = match &criterion.value {
            CriterionValue::Subquery(subquery) => {
                self.translate_subquery(operator, &field, subquery)?
            }
            CriterionValue::Collection(values) => {
                if !operator.is_collection() {
                    return Err(DispatchError::invalid_value(
                        &criterion.field.name,
                        format!("a collection cannot be compared with {}", token),
                    ));
                }
                let base = &criterion.field.name;
                let references: Vec<String> = values
                    .iter()
                    .map(|value| self.bind(base, value.to_value()))
                    .collect();
                format!("{} {} ({})", field, token, references.join(","))
            }
            CriterionValue::Literal(value) => {
                let reference = self.bind(
                    &criterion.field.name,
                    format_criterion_value(operator, value).to_value(),
                );
                if operator.is_collection() {
                    format!("{} {} ({})", field, token, reference)
                } else {
                    format!("{} {} {}", field, token, reference)
                }
            }
        };
        trace!(entity, criterion = %text, "translated criterion");
        Ok(text)
    }

    /// Column reference with its conversion applied, e.g. `LENGTH(TB.`Name`)`.
    pub fn format_field(&self, entity: &str, alias: &str, field: &FieldRef) -> String {
        let column = qualified(alias, &self.catalog.column_name(entity, &field.name));
        match &field.conversion {
            Some(conversion) => convert_field(&column, conversion),
            None => column,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Connector, FieldConversion, Literal, Operator};
    use crate::schema::fixtures::sample_catalog;
    use pretty_assertions::assert_eq;
    use sea_query::Value;
    use test_case::test_case;

    fn criterion(field: &str, operator: Operator, value: CriterionValue) -> Condition {
        Criterion::new(field, operator, value).into()
    }

    #[test]
    fn test_single_child_group_has_no_parentheses() {
        let catalog = sample_catalog();
        let mut ctx = TranslationContext::new(&catalog);
        let group = Condition::group(
            Connector::And,
            vec![criterion("Age", Operator::LessThan, 3.into())],
        );

        let text = ctx.translate_condition("User", "TB", &group).unwrap();
        assert_eq!(text, "TB.`Age` < @Age0");
    }

    #[test]
    fn test_nested_groups() {
        let catalog = sample_catalog();
        let mut ctx = TranslationContext::new(&catalog);
        let inner = Condition::group(
            Connector::Or,
            vec![
                criterion("Name", Operator::BeginLike, "a".into()),
                criterion("Name", Operator::EndLike, "z".into()),
            ],
        );
        let group = Condition::group(
            Connector::And,
            vec![criterion("Age", Operator::IsNull, CriterionValue::default()), inner],
        );

        let text = ctx.translate_condition("User", "TB", &group).unwrap();
        assert_eq!(
            text,
            "( TB.`Age` IS NULL OR ( TB.`Name` LIKE @Name0 AND TB.`Name` LIKE @Name1 ) )"
        );
        assert_eq!(
            ctx.parameters.get("Name0"),
            Some(&Value::String(Some(Box::new("a%".to_string()))))
        );
        assert_eq!(
            ctx.parameters.get("Name1"),
            Some(&Value::String(Some(Box::new("%z".to_string()))))
        );
    }

    #[test]
    fn test_in_collection_expands_parameters() {
        let catalog = sample_catalog();
        let mut ctx = TranslationContext::new(&catalog);
        let values = vec![Literal::Number(1), Literal::Number(2), Literal::Number(3)];

        let text = ctx
            .translate_condition("User", "TB", &criterion("Id", Operator::NotIn, values.into()))
            .unwrap();
        assert_eq!(text, "TB.`Id` NOT IN (@Id0,@Id1,@Id2)");
        assert_eq!(ctx.parameters.len(), 3);
    }

    #[test]
    fn test_in_with_scalar_value() {
        let catalog = sample_catalog();
        let mut ctx = TranslationContext::new(&catalog);

        let text = ctx
            .translate_condition("User", "TB", &criterion("Id", Operator::In, 9.into()))
            .unwrap();
        assert_eq!(text, "TB.`Id` IN (@Id0)");
    }

    #[test]
    fn test_collection_rejected_for_scalar_operator() {
        let catalog = sample_catalog();
        let mut ctx = TranslationContext::new(&catalog);
        let values = vec![Literal::Number(1)];

        let result = ctx.translate_condition("User", "TB", &criterion("Id", Operator::Equal, values.into()));
        assert!(matches!(result, Err(DispatchError::InvalidValue { .. })));
    }

    #[test_case(Operator::IsNull, "TB.`Name` IS NULL")]
    #[test_case(Operator::NotNull, "TB.`Name` IS NOT NULL")]
    fn test_null_checks_bind_nothing(operator: Operator, expected: &str) {
        let catalog = sample_catalog();
        let mut ctx = TranslationContext::new(&catalog);

        let text = ctx
            .translate_condition("User", "TB", &criterion("Name", operator, "ignored".into()))
            .unwrap();
        assert_eq!(text, expected);
        assert!(ctx.parameters.is_empty());
    }

    #[test]
    fn test_field_conversion() {
        let catalog = sample_catalog();
        let mut ctx = TranslationContext::new(&catalog);
        let condition: Condition = Criterion::new(
            FieldRef::converted("Name", FieldConversion::CharLength),
            Operator::GreaterThan,
            4,
        )
        .into();

        let text = ctx.translate_condition("User", "TB", &condition).unwrap();
        assert_eq!(text, "LENGTH(TB.`Name`) > @Name0");
    }
}
