use grounded_agent_store::Record;
use serde_json::{Number, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};

/// Converts a row to a record, keeping the column order.
///
/// SQLite is dynamically typed, so the conversion goes by the storage class
/// of each value rather than the declared column type.
pub fn to_record(row: &SqliteRow) -> Result<Record, sqlx::Error> {
    let mut record = Record::with_capacity(row.columns().len());
    for (idx, column) in row.columns().iter().enumerate() {
        let value = to_value(row, idx)?;
        record.push(column.name(), value);
    }
    Ok(record)
}

fn to_value(row: &SqliteRow, idx: usize) -> Result<Value, sqlx::Error> {
    let raw = row.try_get_raw(idx)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let type_name = raw.type_info().name().to_owned();

    let value = match type_name.as_str() {
        "INTEGER" | "BOOLEAN" => Value::from(row.try_get::<i64, _>(idx)?),
        "REAL" => Number::from_f64(row.try_get::<f64, _>(idx)?)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        "BLOB" => {
            let bytes = row.try_get::<Vec<u8>, _>(idx)?;
            Value::String(format!("<blob: {} bytes>", bytes.len()))
        }
        _ => Value::String(row.try_get::<String, _>(idx)?),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;

    use super::*;

    #[tokio::test]
    async fn test_value_mapping() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let row = sqlx::query(
            "SELECT 42 AS i, 1.5 AS r, 'Springfield' AS t, NULL AS n, \
             x'00ff10' AS b, 9e999 AS inf",
        )
        .fetch_one(&pool)
        .await
        .unwrap();

        let record = to_record(&row).unwrap();
        let columns: Vec<_> = record.iter().map(|(name, _)| name).collect();
        assert_eq!(columns, ["i", "r", "t", "n", "b", "inf"]);
        assert_eq!(record.get("i"), Some(&json!(42)));
        assert_eq!(record.get("r"), Some(&json!(1.5)));
        assert_eq!(record.get("t"), Some(&json!("Springfield")));
        assert_eq!(record.get("n"), Some(&Value::Null));
        assert_eq!(record.get("b"), Some(&json!("<blob: 3 bytes>")));
        assert_eq!(record.get("inf"), Some(&Value::Null));
    }
}
