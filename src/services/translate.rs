use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use super::{check_status, Translator};
use crate::error::ServiceError;

/// Client for the public Google Translate endpoint.
pub struct GoogleTranslator {
    base_url: String,
    http: Client,
}

impl GoogleTranslator {
    pub fn new(base_url: impl Into<String>, http: Client) -> Self {
        Self {
            base_url: base_url.into(),
            http,
        }
    }
}

#[async_trait]
impl Translator for GoogleTranslator {
    async fn translate(&self, text: &str, target: &str) -> Result<String, ServiceError> {
        let url = format!("{}/translate_a/single", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("client", "gtx"),
                ("sl", "auto"),
                ("tl", target),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await?;
        let body: Value = check_status(response).await?.json().await?;
        parse_translation(&body)
    }
}

/// The answer is `[[["translated chunk", "source chunk", ...], ...], ...]`.
fn parse_translation(body: &Value) -> Result<String, ServiceError> {
    let chunks = body
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| ServiceError::Malformed("no translation chunks".to_string()))?;
    let text: String = chunks
        .iter()
        .filter_map(|chunk| chunk.get(0).and_then(Value::as_str))
        .collect();
    if text.is_empty() {
        return Err(ServiceError::Malformed("empty translation".to_string()));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn joins_translated_chunks() {
        let body = json!([
            [["Кошки спят. ", "Cats sleep. ", null], ["Много.", "A lot.", null]],
            null,
            "en"
        ]);
        assert_eq!(parse_translation(&body).unwrap(), "Кошки спят. Много.");
    }

    #[test]
    fn rejects_unexpected_shape() {
        assert!(parse_translation(&json!({"error": "quota"})).is_err());
        assert!(parse_translation(&json!([[]])).is_err());
    }

    #[tokio::test]
    async fn queries_the_endpoint() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/translate_a/single")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("tl".into(), "ru".into()),
                mockito::Matcher::UrlEncoded("q".into(), "Cats sleep.".into()),
            ]))
            .with_status(200)
            .with_body(r#"[[["Кошки спят.","Cats sleep.",null]],null,"en"]"#)
            .create_async()
            .await;

        let translator = GoogleTranslator::new(server.url(), Client::new());
        let text = translator.translate("Cats sleep.", "ru").await.unwrap();
        assert_eq!(text, "Кошки спят.");
        mock.assert_async().await;
    }
}
