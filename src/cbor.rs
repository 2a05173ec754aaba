use ciborium::value::Value;

pub(crate) fn int(i: i64) -> Value {
    Value::Integer(i.into())
}

pub(crate) fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

pub(crate) fn parse_map(data: &[u8]) -> Result<Vec<(Value, Value)>, String> {
    let value: Value = ciborium::from_reader(data).map_err(|e| e.to_string())?;
    match value {
        Value::Map(map) => Ok(map),
        _ => Err("expected map".into()),
    }
}

pub(crate) fn encode(value: &Value) -> Result<Vec<u8>, String> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| e.to_string())?;
    Ok(buf)
}

pub(crate) fn get<'a>(map: &'a [(Value, Value)], key: i64) -> Option<&'a Value> {
    let target = int(key);
    map.iter().find(|(k, _)| k == &target).map(|(_, v)| v)
}

pub(crate) fn get_str<'a>(map: &'a [(Value, Value)], key: &str) -> Option<&'a Value> {
    map.iter()
        .find(|(k, _)| matches!(k, Value::Text(s) if s == key))
        .map(|(_, v)| v)
}

pub(crate) fn as_bytes(v: &Value) -> Option<&[u8]> {
    match v { Value::Bytes(b) => Some(b), _ => None }
}

pub(crate) fn as_int(v: &Value) -> Option<i128> {
    match v { Value::Integer(i) => Some(i128::from(*i)), _ => None }
}
