//! Builders for Notion database query filters and sorts.
//!
//! The sync pipeline queries databases unfiltered; these builders are for
//! callers constructing a custom [`DatabaseQuery`](super::DatabaseQuery),
//! e.g. to index a filtered view of a database.

#[cfg(test)]
mod tests;

use serde_json::{Value, json};

/// A single property condition for a Notion database query.
///
/// Each condition maps to exactly one condition group key in the query
/// payload (`rich_text`, `number`, `date`, or `checkbox`); the mapping is
/// spelled out per operator rather than inferred from the operator name, so
/// multi-word operators like `does_not_equal` land under the right group.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterCondition {
    Equals(String),
    DoesNotEqual(String),
    Contains(String),
    DoesNotContain(String),
    StartsWith(String),
    EndsWith(String),
    IsEmpty,
    IsNotEmpty,
    GreaterThan(f64),
    LessThan(f64),
    GreaterThanOrEqualTo(f64),
    LessThanOrEqualTo(f64),
    Before(String),
    After(String),
    OnOrBefore(String),
    OnOrAfter(String),
    CheckboxEquals(bool),
}

impl FilterCondition {
    /// The condition group key the operator belongs to.
    pub fn group(&self) -> &'static str {
        match self {
            FilterCondition::Equals(_)
            | FilterCondition::DoesNotEqual(_)
            | FilterCondition::Contains(_)
            | FilterCondition::DoesNotContain(_)
            | FilterCondition::StartsWith(_)
            | FilterCondition::EndsWith(_)
            | FilterCondition::IsEmpty
            | FilterCondition::IsNotEmpty => "rich_text",
            FilterCondition::GreaterThan(_)
            | FilterCondition::LessThan(_)
            | FilterCondition::GreaterThanOrEqualTo(_)
            | FilterCondition::LessThanOrEqualTo(_) => "number",
            FilterCondition::Before(_)
            | FilterCondition::After(_)
            | FilterCondition::OnOrBefore(_)
            | FilterCondition::OnOrAfter(_) => "date",
            FilterCondition::CheckboxEquals(_) => "checkbox",
        }
    }

    /// The operator key inside the condition group.
    pub fn operator(&self) -> &'static str {
        match self {
            FilterCondition::Equals(_) | FilterCondition::CheckboxEquals(_) => "equals",
            FilterCondition::DoesNotEqual(_) => "does_not_equal",
            FilterCondition::Contains(_) => "contains",
            FilterCondition::DoesNotContain(_) => "does_not_contain",
            FilterCondition::StartsWith(_) => "starts_with",
            FilterCondition::EndsWith(_) => "ends_with",
            FilterCondition::IsEmpty => "is_empty",
            FilterCondition::IsNotEmpty => "is_not_empty",
            FilterCondition::GreaterThan(_) => "greater_than",
            FilterCondition::LessThan(_) => "less_than",
            FilterCondition::GreaterThanOrEqualTo(_) => "greater_than_or_equal_to",
            FilterCondition::LessThanOrEqualTo(_) => "less_than_or_equal_to",
            FilterCondition::Before(_) => "before",
            FilterCondition::After(_) => "after",
            FilterCondition::OnOrBefore(_) => "on_or_before",
            FilterCondition::OnOrAfter(_) => "on_or_after",
        }
    }

    fn value(&self) -> Value {
        match self {
            FilterCondition::Equals(v)
            | FilterCondition::DoesNotEqual(v)
            | FilterCondition::Contains(v)
            | FilterCondition::DoesNotContain(v)
            | FilterCondition::StartsWith(v)
            | FilterCondition::EndsWith(v) => json!(v),
            FilterCondition::IsEmpty | FilterCondition::IsNotEmpty => json!(true),
            FilterCondition::GreaterThan(v)
            | FilterCondition::LessThan(v)
            | FilterCondition::GreaterThanOrEqualTo(v)
            | FilterCondition::LessThanOrEqualTo(v) => json!(v),
            FilterCondition::Before(v)
            | FilterCondition::After(v)
            | FilterCondition::OnOrBefore(v)
            | FilterCondition::OnOrAfter(v) => json!(v),
            FilterCondition::CheckboxEquals(v) => json!(v),
        }
    }
}

/// Build the JSON filter object for one property condition.
pub fn build_filter(property: &str, condition: &FilterCondition) -> Value {
    let mut group = serde_json::Map::new();
    group.insert(condition.operator().to_string(), condition.value());

    let mut filter = serde_json::Map::new();
    filter.insert("property".to_string(), json!(property));
    filter.insert(condition.group().to_string(), Value::Object(group));
    Value::Object(filter)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    fn as_str(self) -> &'static str {
        match self {
            SortDirection::Ascending => "ascending",
            SortDirection::Descending => "descending",
        }
    }
}

/// Build a property sort object for a database query.
pub fn build_sort(property: &str, direction: SortDirection) -> Value {
    json!({
        "property": property,
        "direction": direction.as_str()
    })
}
