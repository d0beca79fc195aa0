use serde_json::Value;
use url::form_urlencoded::Serializer;

use crate::resource::pascal_case;
use crate::ProxyError;

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Flattens a JSON object into the upstream's form parameters. Arrays repeat
/// the key, nested objects travel as JSON text, nulls are dropped.
pub fn encode_form(body: &Value) -> Result<Vec<u8>, ProxyError> {
    let object = match body {
        Value::Object(object) => object,
        Value::Null => return Ok(Vec::new()),
        _ => {
            return Err(ProxyError::Validation(
                "request body must be a JSON object".to_string(),
            ))
        }
    };
    let mut form = Serializer::new(String::new());
    for (key, value) in object {
        let key = pascal_case(key);
        match value {
            Value::Array(items) => {
                for item in items {
                    if let Some(rendered) = render_scalar(item) {
                        form.append_pair(&key, &rendered);
                    }
                }
            }
            other => {
                if let Some(rendered) = render_scalar(other) {
                    form.append_pair(&key, &rendered);
                }
            }
        }
    }
    Ok(form.finish().into_bytes())
}

fn render_scalar(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}
