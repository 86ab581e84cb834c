use orderstruct::bytestr::ByteStr;
use orderstruct::packed_list::entry::Value;
use orderstruct::PackedList;

#[test]
fn new_list_is_empty() {
    let pl = PackedList::new();
    assert_eq!(pl.count(), 0);
    assert_eq!(pl.iter().count(), 0);
    assert_eq!(pl.get(0), None);
}

#[test]
fn push_preserves_insertion_order() {
    let mut pl = PackedList::new();
    pl.push(Value::Int(1)).unwrap();
    pl.push(Value::Bytes(ByteStr::from("two"))).unwrap();
    pl.push(Value::Int(-3)).unwrap();

    let values: Vec<Value> = pl.iter().collect();
    assert_eq!(
        values,
        vec![
            Value::Int(1),
            Value::Bytes(ByteStr::from("two")),
            Value::Int(-3),
        ]
    );
    assert_eq!(pl.count(), 3);
}

#[test]
fn get_matches_iter_at_each_index() {
    let mut pl = PackedList::new();
    for i in 0..20i64 {
        pl.push(Value::Int(i)).unwrap();
    }
    for i in 0..20usize {
        assert_eq!(pl.get(i), Some(Value::Int(i as i64)));
    }
    assert_eq!(pl.get(20), None);
}

#[test]
fn mixed_int_widths_round_trip() {
    let mut pl = PackedList::new();
    let values = [0i64, 12, 13, 127, 128, -1, -129, 8_388_607, -8_388_608, i32::MAX as i64, i64::MAX];
    for v in values {
        pl.push(Value::Int(v)).unwrap();
    }
    let decoded: Vec<Value> = pl.iter().collect();
    for (v, d) in values.iter().zip(decoded.iter()) {
        assert_eq!(d, &Value::Int(*v));
    }
}

#[test]
fn byte_strings_of_varying_length_round_trip() {
    let mut pl = PackedList::new();
    let lengths = [0usize, 1, 63, 64, 300, 20_000];
    for len in lengths {
        pl.push(Value::Bytes(ByteStr::new(vec![b'x'; len]))).unwrap();
    }
    let decoded: Vec<Value> = pl.iter().collect();
    for (len, d) in lengths.iter().zip(decoded.iter()) {
        match d {
            Value::Bytes(b) => assert_eq!(b.len(), *len),
            other => panic!("expected bytes, got {other:?}"),
        }
    }
}

#[test]
fn delete_first_removes_only_first_match() {
    let mut pl = PackedList::new();
    pl.push(Value::Int(7)).unwrap();
    pl.push(Value::Int(7)).unwrap();
    pl.push(Value::Int(9)).unwrap();

    assert!(pl.delete_first(&Value::Int(7)).unwrap());
    let values: Vec<Value> = pl.iter().collect();
    assert_eq!(values, vec![Value::Int(7), Value::Int(9)]);
}

#[test]
fn as_bytes_round_trips_through_from_bytes() {
    let mut pl = PackedList::new();
    pl.push(Value::Int(100)).unwrap();
    pl.push(Value::Bytes(ByteStr::from("round-trip"))).unwrap();
    pl.push(Value::Int(-9000)).unwrap();

    let raw = pl.as_bytes().to_vec();
    let reloaded = PackedList::from_bytes(raw).unwrap();
    assert_eq!(reloaded.count(), pl.count());
    assert_eq!(
        reloaded.iter().collect::<Vec<_>>(),
        pl.iter().collect::<Vec<_>>()
    );
}

#[test]
fn from_bytes_rejects_truncated_buffer() {
    let pl = PackedList::new();
    let mut raw = pl.as_bytes().to_vec();
    raw.truncate(5);
    assert!(PackedList::from_bytes(raw).is_err());
}
