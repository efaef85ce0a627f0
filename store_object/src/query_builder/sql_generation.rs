//! SQL rendering for query builder parts
//!
//! Placeholders are numbered `$1..$n` in the order values are pushed.

use crate::query_builder::filter::{LogicalOperator, QueryCondition, QueryFilter, QueryOperator};
use crate::query_builder::ordering::SortOrder;
use crate::query_builder::update::UpdateSet;
use serde_json::Value;

pub struct SqlGenerator;

impl SqlGenerator {
    /// Build WHERE clause from conditions
    pub fn build_where_clause(conditions: &[QueryFilter]) -> (String, Vec<Value>) {
        Self::build_where_clause_from(conditions, 1)
    }

    /// Build WHERE clause with placeholders starting at `first_param`
    pub fn build_where_clause_from(
        conditions: &[QueryFilter],
        first_param: usize,
    ) -> (String, Vec<Value>) {
        if conditions.is_empty() {
            return ("".to_string(), Vec::new());
        }

        let mut values = Vec::new();
        let mut param_counter = first_param;

        let conditions_sql = conditions
            .iter()
            .map(|condition| Self::build_condition_sql(condition, &mut values, &mut param_counter))
            .collect::<Vec<_>>()
            .join(" AND ");

        if conditions_sql.is_empty() {
            ("".to_string(), values)
        } else {
            (format!("WHERE {}", conditions_sql), values)
        }
    }

    fn build_condition_sql(
        filter: &QueryFilter,
        values: &mut Vec<Value>,
        param_counter: &mut usize,
    ) -> String {
        match filter {
            QueryFilter::Condition(condition) => {
                Self::build_single_condition_sql(condition, values, param_counter)
            }
            QueryFilter::Group { operator, filters } => {
                if filters.is_empty() {
                    // Empty AND is vacuously true, empty OR matches nothing
                    return match operator {
                        LogicalOperator::And => "1=1".to_string(),
                        LogicalOperator::Or => "1=0".to_string(),
                    };
                }

                let operator_str = match operator {
                    LogicalOperator::And => " AND ",
                    LogicalOperator::Or => " OR ",
                };

                let group_conditions = filters
                    .iter()
                    .map(|f| Self::build_condition_sql(f, values, param_counter))
                    .collect::<Vec<_>>()
                    .join(operator_str);

                format!("({})", group_conditions)
            }
        }
    }

    fn push_param(value: &Value, values: &mut Vec<Value>, param_counter: &mut usize) -> String {
        values.push(value.clone());
        let param = format!("${}", param_counter);
        *param_counter += 1;
        param
    }

    fn build_single_condition_sql(
        condition: &QueryCondition,
        values: &mut Vec<Value>,
        param_counter: &mut usize,
    ) -> String {
        let field = &condition.field;

        let comparison = match &condition.operator {
            QueryOperator::Eq => "=",
            QueryOperator::Ne => "!=",
            QueryOperator::Gt => ">",
            QueryOperator::Gte => ">=",
            QueryOperator::Lt => "<",
            QueryOperator::Lte => "<=",
            QueryOperator::IsNull => return format!("{} IS NULL", field),
            QueryOperator::IsNotNull => return format!("{} IS NOT NULL", field),
            QueryOperator::In | QueryOperator::NotIn => {
                return Self::build_membership_sql(condition, values, param_counter);
            }
        };

        match &condition.value {
            Some(Value::Null) | None => match condition.operator {
                QueryOperator::Eq => format!("{} IS NULL", field),
                QueryOperator::Ne => format!("{} IS NOT NULL", field),
                _ => "1=0".to_string(), // ordering against null never holds
            },
            Some(value) => {
                let param = Self::push_param(value, values, param_counter);
                format!("{} {} {}", field, comparison, param)
            }
        }
    }

    fn build_membership_sql(
        condition: &QueryCondition,
        values: &mut Vec<Value>,
        param_counter: &mut usize,
    ) -> String {
        let negated = condition.operator == QueryOperator::NotIn;

        let array_values = match &condition.value {
            Some(Value::Array(array_values)) if !array_values.is_empty() => array_values,
            // Empty IN matches nothing, empty NOT IN matches everything
            _ => return if negated { "1=1" } else { "1=0" }.to_string(),
        };

        let placeholders: Vec<String> = array_values
            .iter()
            .map(|value| Self::push_param(value, values, param_counter))
            .collect();

        format!(
            "{} {} ({})",
            condition.field,
            if negated { "NOT IN" } else { "IN" },
            placeholders.join(", ")
        )
    }

    /// Build the SET list of an UPDATE statement. Null values are written as
    /// literal NULL so no untyped parameter is bound.
    pub fn build_set_clause(updates: &UpdateSet) -> (String, Vec<Value>) {
        let mut values = Vec::new();
        let mut param_counter = 1;

        let assignments = updates
            .assignments()
            .map(|(field, value)| {
                if value.is_null() {
                    format!("{} = NULL", field)
                } else {
                    let param = Self::push_param(value, &mut values, &mut param_counter);
                    format!("{} = {}", field, param)
                }
            })
            .collect::<Vec<_>>()
            .join(", ");

        (assignments, values)
    }

    /// Build ORDER BY clause
    pub fn build_order_clause(order_by: &[(String, SortOrder)]) -> String {
        if order_by.is_empty() {
            return "".to_string();
        }

        let order_items: Vec<String> = order_by
            .iter()
            .map(|(field, order)| format!("{} {}", field, order.to_sql()))
            .collect();

        format!("ORDER BY {}", order_items.join(", "))
    }

    /// Build LIMIT/OFFSET clause
    pub fn build_limit_clause(limit: Option<i64>, offset: Option<i64>) -> String {
        let mut clauses = Vec::new();

        if let Some(limit) = limit {
            clauses.push(format!("LIMIT {}", limit));
        }

        if let Some(offset) = offset {
            clauses.push(format!("OFFSET {}", offset));
        }

        clauses.join(" ")
    }
}
