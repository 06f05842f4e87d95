/// 用于处理后端新旧字段名兼容的辅助模块
///
/// The comment API has gone through a schema rename (`postId` → `blogId`,
/// `User` → `author`) and old records still arrive under the legacy keys.
/// Each ambiguous field gets an explicit primary-then-legacy resolution rule
/// here instead of ad-hoc probing at the call sites.
use serde_json::Value;

/// 读取字符串字段，类型不符时视为缺失
pub fn string_field(raw: &Value, key: &str) -> Option<String> {
    raw.get(key).and_then(Value::as_str).map(String::from)
}

/// 先查主字段名，再查旧字段名
pub fn string_field_compat(raw: &Value, primary: &str, legacy: &str) -> Option<String> {
    string_field(raw, primary).or_else(|| string_field(raw, legacy))
}

/// 对象字段的新旧兼容版本（作者信息）
pub fn object_field_compat<'a>(raw: &'a Value, primary: &str, legacy: &str) -> Option<&'a Value> {
    raw.get(primary)
        .filter(|v| v.is_object())
        .or_else(|| raw.get(legacy).filter(|v| v.is_object()))
}

/// 读取数组字段，缺失或类型不符时返回 None
pub fn array_field<'a>(raw: &'a Value, key: &str) -> Option<&'a Vec<Value>> {
    raw.get(key).and_then(Value::as_array)
}

/// 读取非负整数字段
pub fn u64_field(raw: &Value, key: &str) -> Option<u64> {
    raw.get(key).and_then(Value::as_u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_field_compat_prefers_primary() {
        let raw = json!({ "blogId": "b1", "postId": "legacy" });
        assert_eq!(
            string_field_compat(&raw, "blogId", "postId"),
            Some("b1".to_string())
        );
    }

    #[test]
    fn test_string_field_compat_falls_back_to_legacy() {
        let raw = json!({ "postId": "p9" });
        assert_eq!(
            string_field_compat(&raw, "blogId", "postId"),
            Some("p9".to_string())
        );
        assert_eq!(string_field_compat(&json!({}), "blogId", "postId"), None);
    }

    #[test]
    fn test_wrong_types_resolve_as_absent() {
        let raw = json!({ "blogId": 42, "author": "not-an-object", "replies": {} });
        assert_eq!(string_field(&raw, "blogId"), None);
        assert!(object_field_compat(&raw, "author", "User").is_none());
        assert!(array_field(&raw, "replies").is_none());
    }

    #[test]
    fn test_object_field_compat_legacy_key() {
        let raw = json!({ "User": { "id": "u1" } });
        let author = object_field_compat(&raw, "author", "User").unwrap();
        assert_eq!(string_field(author, "id"), Some("u1".to_string()));
    }

    #[test]
    fn test_u64_field_rejects_negative_and_strings() {
        assert_eq!(u64_field(&json!({ "total": 7 }), "total"), Some(7));
        assert_eq!(u64_field(&json!({ "total": -1 }), "total"), None);
        assert_eq!(u64_field(&json!({ "total": "7" }), "total"), None);
    }
}
