use serde_json::{Map, Value};

pub const SIGNATURE_FIELD: &str = "hash";
pub const VALIDATE_FIELD: &str = "validateHash";

/// Attaches a request signature to a JSON body.
///
/// `relax` produces the variant sent after the source rejected a
/// request: no signature, validation switched off.
pub trait RequestSigner: Send + Sync {
    fn sign(&self, body: &mut Map<String, Value>);

    fn relax(&self, body: &mut Map<String, Value>) {
        body.remove(SIGNATURE_FIELD);
        body.insert(VALIDATE_FIELD.to_string(), Value::Bool(false));
    }
}

/// Sends bodies unsigned; `relax` still switches validation off.
pub struct Unsigned;

impl RequestSigner for Unsigned {
    fn sign(&self, _body: &mut Map<String, Value>) {}
}

/// MD5 over the body serialized with sorted keys and no whitespace, followed
/// by a shared secret.
pub struct Md5PayloadSigner {
    secret: String,
}

impl Md5PayloadSigner {
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into() }
    }

    pub fn digest(&self, body: &Map<String, Value>) -> String {
        let canonical = canonical_json(&Value::Object(
            body.iter()
                .filter(|(k, _)| k.as_str() != SIGNATURE_FIELD && k.as_str() != VALIDATE_FIELD)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ));

        let mut hasher = md5::Context::new();
        hasher.consume(canonical.as_bytes());
        hasher.consume(self.secret.as_bytes());
        format!("{:x}", hasher.compute())
    }
}

impl RequestSigner for Md5PayloadSigner {
    fn sign(&self, body: &mut Map<String, Value>) {
        let digest = self.digest(body);
        body.insert(SIGNATURE_FIELD.to_string(), Value::String(digest));
        body.insert(VALIDATE_FIELD.to_string(), Value::Bool(true));
    }
}

/// Compact JSON with object keys sorted at every level.
pub fn canonical_json(value: &Value) -> String {
    fn sorted(value: &Value) -> Value {
        match value {
            Value::Object(obj) => {
                let mut keys: Vec<&String> = obj.keys().collect();
                keys.sort();
                Value::Object(keys.into_iter().map(|k| (k.clone(), sorted(&obj[k]))).collect())
            }
            Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
            other => other.clone(),
        }
    }
    serde_json::to_string(&sorted(value)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn canonical_form_sorts_keys() {
        let value = json!({"b": 1, "a": {"d": true, "c": [2, {"z": 0, "y": 1}]}});
        assert_eq!(canonical_json(&value), r#"{"a":{"c":[2,{"y":1,"z":0}],"d":true},"b":1}"#);
    }

    #[test]
    fn digest_ignores_key_order_and_existing_signature() {
        let signer = Md5PayloadSigner::new("secret");
        let a = body(json!({"searchWord": "kurta", "offset": 0}));
        let b = body(json!({"offset": 0, "searchWord": "kurta", "hash": "stale", "validateHash": true}));
        assert_eq!(signer.digest(&a), signer.digest(&b));
        assert_eq!(signer.digest(&a).len(), 32);
    }

    #[test]
    fn digest_depends_on_secret() {
        let a = body(json!({"q": 1}));
        assert_ne!(
            Md5PayloadSigner::new("one").digest(&a),
            Md5PayloadSigner::new("two").digest(&a)
        );
    }

    #[test]
    fn sign_then_relax() {
        let signer = Md5PayloadSigner::new("k");
        let mut payload = body(json!({"q": "x"}));
        signer.sign(&mut payload);
        assert_eq!(payload[VALIDATE_FIELD], json!(true));
        assert!(payload.contains_key(SIGNATURE_FIELD));

        signer.relax(&mut payload);
        assert_eq!(payload[VALIDATE_FIELD], json!(false));
        assert!(!payload.contains_key(SIGNATURE_FIELD));
    }

    #[test]
    fn unsigned_relax_disables_validation() {
        let mut payload = body(json!({"q": "x"}));
        Unsigned.sign(&mut payload);
        assert!(!payload.contains_key(VALIDATE_FIELD));

        Unsigned.relax(&mut payload);
        assert_eq!(payload[VALIDATE_FIELD], json!(false));
        assert!(!payload.contains_key(SIGNATURE_FIELD));
    }
}
