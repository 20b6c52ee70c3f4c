use cqn_core::stmt::{Record, Value, ValueStream};
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn json_documents_become_value_trees() {
    let value = Value::from_json(json!({
        "ID": 1,
        "title": "Wuthering Heights",
        "price": 12.5,
        "active": true,
        "tags": ["classic", null],
    }));

    let expected = Record::new()
        .with("ID", 1)
        .with("title", "Wuthering Heights")
        .with("price", 12.5)
        .with("active", true)
        .with(
            "tags",
            Value::List(vec![Value::from("classic"), Value::Null]),
        );

    assert_eq!(value, Value::Record(expected));
}

#[test]
fn decimals_keep_their_digits_in_json() {
    let record = Record::new()
        .with("price", Value::Decimal("1234567.891".to_string()))
        .with("pages", 416);

    assert_eq!(
        Value::Record(record).to_json().unwrap(),
        json!({ "price": "1234567.891", "pages": 416 })
    );
}

#[test]
fn bytes_have_no_json_form() {
    let err = Value::Bytes(vec![1, 2, 3]).to_json().unwrap_err();
    assert!(err.is_invalid_statement());
}

#[tokio::test]
async fn streams_are_single_use() {
    let stream = ValueStream::from_bytes(b"abc".to_vec(), true);
    let clone = stream.clone();

    assert!(stream.is_binary());
    assert_eq!(clone.read_all().await.unwrap(), b"abc");
    assert!(stream.read_all().await.is_err());
}
