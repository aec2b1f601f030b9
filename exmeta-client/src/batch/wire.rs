//! Batch wire format
//!
//! Each item is serialized on its own and the results are concatenated
//! into one JSON array literal, so element `i` of the array is exactly the
//! standalone serialization of item `i`.

use super::pending::PendingItem;
use exmeta_common::api::UploadMetadataRequest;
use serde_json::Value;

/// Serializes one item into its wire JSON
pub trait ItemSerializer: Send + Sync {
    fn serialize_item(&self, metadata: &Value, custom_data: &Value) -> serde_json::Result<String>;
}

/// Default serializer: `{"Metadata": ..., "CustomData": ...}`
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonItemSerializer;

impl ItemSerializer for JsonItemSerializer {
    fn serialize_item(&self, metadata: &Value, custom_data: &Value) -> serde_json::Result<String> {
        serde_json::to_string(&UploadMetadataRequest {
            metadata,
            custom_data,
        })
    }
}

/// Serialize `items` into a single JSON array literal
pub fn serialize_batch(
    serializer: &dyn ItemSerializer,
    items: &[PendingItem],
) -> serde_json::Result<String> {
    let parts = items
        .iter()
        .map(|item| serializer.serialize_item(&item.metadata, &item.custom_data))
        .collect::<serde_json::Result<Vec<_>>>()?;

    Ok(format!("[{}]", parts.join(",")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn items() -> Vec<PendingItem> {
        (1..=3)
            .map(|n| {
                PendingItem::new(
                    format!("tool{}.exe", n),
                    json!({"FileVersion": format!("{}.0", n), "ProductName": "Tool"}),
                    json!({"ExeIconDataList": [n]}),
                )
            })
            .collect()
    }

    #[test]
    fn test_three_items_make_three_elements() {
        let items = items();
        let body = serialize_batch(&JsonItemSerializer, &items).unwrap();

        let parsed: Value = serde_json::from_str(&body).unwrap();
        let array = parsed.as_array().unwrap();
        assert_eq!(array.len(), 3);

        for (element, item) in array.iter().zip(&items) {
            let standalone = JsonItemSerializer
                .serialize_item(&item.metadata, &item.custom_data)
                .unwrap();
            let standalone: Value = serde_json::from_str(&standalone).unwrap();
            assert_eq!(element, &standalone);
        }
    }

    #[test]
    fn test_empty_batch_is_empty_array() {
        assert_eq!(serialize_batch(&JsonItemSerializer, &[]).unwrap(), "[]");
    }

    #[test]
    fn test_item_shape() {
        let json = JsonItemSerializer
            .serialize_item(&json!({"a": 1}), &json!({"b": 2}))
            .unwrap();
        assert_eq!(json, r#"{"Metadata":{"a":1},"CustomData":{"b":2}}"#);
    }
}
