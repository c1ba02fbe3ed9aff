use super::*;
use serde_json::json;

#[test]
fn text_equals_maps_to_rich_text_group() {
    let filter = build_filter("Status", &FilterCondition::Equals("Done".to_string()));
    assert_eq!(
        filter,
        json!({"property": "Status", "rich_text": {"equals": "Done"}})
    );
}

#[test]
fn does_not_equal_stays_in_rich_text_group() {
    // Multi-word operators must not be keyed by their first word.
    let filter = build_filter(
        "Status",
        &FilterCondition::DoesNotEqual("Archived".to_string()),
    );
    assert_eq!(
        filter,
        json!({"property": "Status", "rich_text": {"does_not_equal": "Archived"}})
    );
}

#[test]
fn numeric_comparisons_map_to_number_group() {
    let filter = build_filter("Score", &FilterCondition::GreaterThanOrEqualTo(0.5));
    assert_eq!(
        filter,
        json!({"property": "Score", "number": {"greater_than_or_equal_to": 0.5}})
    );
}

#[test]
fn date_bounds_map_to_date_group() {
    let filter = build_filter(
        "Due",
        &FilterCondition::OnOrBefore("2024-06-01".to_string()),
    );
    assert_eq!(
        filter,
        json!({"property": "Due", "date": {"on_or_before": "2024-06-01"}})
    );
}

#[test]
fn checkbox_maps_to_checkbox_group() {
    let filter = build_filter("Done", &FilterCondition::CheckboxEquals(true));
    assert_eq!(
        filter,
        json!({"property": "Done", "checkbox": {"equals": true}})
    );
}

#[test]
fn emptiness_operators_take_literal_true() {
    let filter = build_filter("Notes", &FilterCondition::IsEmpty);
    assert_eq!(
        filter,
        json!({"property": "Notes", "rich_text": {"is_empty": true}})
    );
}

#[test]
fn sort_renders_direction() {
    assert_eq!(
        build_sort("Created", SortDirection::Descending),
        json!({"property": "Created", "direction": "descending"})
    );
    assert_eq!(
        build_sort("Name", SortDirection::Ascending),
        json!({"property": "Name", "direction": "ascending"})
    );
}
