//! Flattening of nested dataset sections into child records, and the reverse
//! for exports that repeat the parent on every child row.

use std::collections::HashSet;

use serde_json::Value;

use helix_core::Record;

/// Turn every item of each parent's `list_field` into a record of its own,
/// copying `inherit` fields (`(child_field, parent_field)`) from the parent.
///
/// Items that are not objects become records holding only the inherited
/// fields, so the child shape rejects them with a proper message.
pub fn children(parents: &[Record], list_field: &str, inherit: &[(&str, &str)]) -> Vec<Record> {
    let mut out = Vec::new();
    for parent in parents {
        let Some(Value::Array(items)) = parent.get(list_field) else {
            continue;
        };
        for item in items {
            let mut child = Record::from_value(item.clone()).unwrap_or_default();
            for (child_field, parent_field) in inherit {
                let value = parent.get(parent_field).cloned().unwrap_or(Value::Null);
                child.insert(*child_field, value);
            }
            out.push(child);
        }
    }
    out
}

/// First record for each distinct non-blank `key`, in input order.
pub fn first_per_key(records: &[Record], key: &str) -> Vec<Record> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter(|r| !r.is_blank(key))
        .filter(|r| seen.insert(r.get(key).map(Value::to_string)))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_children_inherit_parent_key() {
        let parents = vec![
            Record::from_value(json!({
                "campaign_id": "C1",
                "orders": [{"order_id": "O1"}, {"order_id": "O2"}, 7]
            }))
            .unwrap(),
            Record::from_value(json!({"campaign_id": "C2"})).unwrap(),
        ];

        let orders = children(&parents, "orders", &[("campaign_id", "campaign_id")]);
        assert_eq!(orders.len(), 3);
        assert_eq!(orders[1].get_str("order_id"), Some("O2"));
        assert_eq!(orders[1].get_str("campaign_id"), Some("C1"));
        assert_eq!(orders[2].get("order_id"), None);
    }

    #[test]
    fn test_first_per_key_keeps_order() {
        let rows: Vec<Record> = [("PO-2", 1), ("PO-1", 1), ("PO-2", 2), ("", 1)]
            .iter()
            .map(|(order, item)| Record::new().with("orderNumber", *order).with("item", *item))
            .collect();

        let orders = first_per_key(&rows, "orderNumber");
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].get_str("orderNumber"), Some("PO-2"));
        assert_eq!(orders[0].get("item"), Some(&json!(1)));
        assert_eq!(orders[1].get_str("orderNumber"), Some("PO-1"));
    }
}
