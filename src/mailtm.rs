use crate::error::{Error, Result};
use crate::models::{Collection, Domain, MessageSummary, RegisteredAccount, TokenResponse};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, header};
use serde_json::json;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.mail.tm";
const JSON_LD: &str = "application/ld+json";

/// Stateless operations against the temporary-mail provider. Every call is a
/// single request with no retry.
#[async_trait]
pub trait MailProvider: Send + Sync {
    async fn list_domains(&self) -> Result<Vec<Domain>>;

    async fn register_account(&self, address: &str, password: &str)
    -> Result<RegisteredAccount>;

    async fn mint_token(&self, address: &str, password: &str) -> Result<String>;

    async fn list_messages(&self, token: &str) -> Result<Vec<MessageSummary>>;

    async fn download_message(&self, token: &str, message_id: &str) -> Result<Vec<u8>>;
}

#[derive(Clone)]
pub struct MailTmClient {
    http: Client,
    base_url: String,
}

impl MailTmClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// JSON collection endpoints answer with `hydra:member` under this media type.
    async fn get_json(&self, path: &str, token: Option<&str>) -> Result<Response> {
        let mut req = self
            .http
            .get(self.url(path))
            .header(header::ACCEPT, JSON_LD);
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        Ok(req.send().await?)
    }

    async fn get_raw(&self, path: &str, token: &str) -> Result<Response> {
        let response = self
            .http
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await?;
        Ok(response)
    }

    async fn post_credentials(&self, path: &str, address: &str, password: &str) -> Result<Response> {
        let body = json!({ "address": address, "password": password });
        let response = self
            .http
            .post(self.url(path))
            .header(header::ACCEPT, JSON_LD)
            .json(&body)
            .send()
            .await?;
        Ok(response)
    }
}

impl Default for MailTmClient {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

#[async_trait]
impl MailProvider for MailTmClient {
    async fn list_domains(&self) -> Result<Vec<Domain>> {
        let response = self.get_json("/domains", None).await?;
        check_status(response.status(), |status| Error::ProviderUnavailable {
            status,
        })?;

        let domains: Collection<Domain> = response.json().await?;
        let domains = domains.into_vec();
        debug!("Provider listed {} domains", domains.len());
        Ok(domains)
    }

    async fn register_account(
        &self,
        address: &str,
        password: &str,
    ) -> Result<RegisteredAccount> {
        let response = self.post_credentials("/accounts", address, password).await?;
        // Any rejection is reported as a taken address; the status tells the real cause.
        check_status(response.status(), |status| Error::AddressTaken { status })?;

        Ok(response.json().await?)
    }

    async fn mint_token(&self, address: &str, password: &str) -> Result<String> {
        let response = self.post_credentials("/token", address, password).await?;
        let status = response.status();
        check_status(status, |status| Error::InvalidCredentials { status })?;

        let body: TokenResponse = response.json().await?;
        body.token
            .filter(|t| !t.is_empty())
            .ok_or(Error::InvalidCredentials {
                status: status.as_u16(),
            })
    }

    async fn list_messages(&self, token: &str) -> Result<Vec<MessageSummary>> {
        let response = self.get_json("/messages", Some(token)).await?;
        check_status(response.status(), |status| Error::InvalidToken { status })?;

        let messages: Collection<MessageSummary> = response.json().await?;
        Ok(messages.into_vec())
    }

    async fn download_message(&self, token: &str, message_id: &str) -> Result<Vec<u8>> {
        let path = format!("/messages/{}/download", message_id);
        let response = self.get_raw(&path, token).await?;
        download_status(response.status(), message_id)?;

        let bytes = response.bytes().await?;
        debug!("Downloaded message {} ({} bytes)", message_id, bytes.len());
        Ok(bytes.to_vec())
    }
}

fn check_status(status: StatusCode, on_failure: impl FnOnce(u16) -> Error) -> Result<()> {
    if status.is_success() {
        Ok(())
    } else {
        Err(on_failure(status.as_u16()))
    }
}

fn download_status(status: StatusCode, message_id: &str) -> Result<()> {
    if status == StatusCode::NOT_FOUND {
        return Err(Error::NotFound {
            id: message_id.to_string(),
        });
    }
    check_status(status, |status| Error::InvalidToken { status })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_status_accepts_any_2xx() {
        assert!(check_status(StatusCode::OK, |status| Error::AddressTaken { status }).is_ok());
        assert!(check_status(StatusCode::CREATED, |status| Error::AddressTaken { status }).is_ok());
    }

    #[test]
    fn test_registration_failure_keeps_raw_status() {
        let err = check_status(StatusCode::UNPROCESSABLE_ENTITY, |status| {
            Error::AddressTaken { status }
        })
        .unwrap_err();
        assert!(matches!(err, Error::AddressTaken { status: 422 }));

        let err = check_status(StatusCode::TOO_MANY_REQUESTS, |status| Error::AddressTaken {
            status,
        })
        .unwrap_err();
        assert!(matches!(err, Error::AddressTaken { status: 429 }));
    }

    #[test]
    fn test_download_status_distinguishes_missing_message() {
        let err = download_status(StatusCode::NOT_FOUND, "abc").unwrap_err();
        assert!(matches!(err, Error::NotFound { ref id } if id == "abc"));

        let err = download_status(StatusCode::UNAUTHORIZED, "abc").unwrap_err();
        assert!(matches!(err, Error::InvalidToken { status: 401 }));

        assert!(download_status(StatusCode::OK, "abc").is_ok());
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = MailTmClient::new("http://localhost:8080/");
        assert_eq!(client.url("/domains"), "http://localhost:8080/domains");
    }

    mod http {
        use super::*;
        use wiremock::matchers::{body_json, header, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        async fn server_with(mock: Mock) -> (MockServer, MailTmClient) {
            let server = MockServer::start().await;
            mock.mount(&server).await;
            let client = MailTmClient::new(&server.uri());
            (server, client)
        }

        #[tokio::test]
        async fn test_register_accepts_created() {
            let (_server, client) = server_with(
                Mock::given(method("POST"))
                    .and(path("/accounts"))
                    .and(body_json(json!({ "address": "abcd@mail.example", "password": "abcdefgh" })))
                    .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                        "id": "acc-1",
                        "address": "abcd@mail.example",
                        "quota": 40000000,
                    }))),
            )
            .await;

            let registered = client
                .register_account("abcd@mail.example", "abcdefgh")
                .await
                .unwrap();
            assert_eq!(registered.id, "acc-1");
            assert_eq!(registered.address, "abcd@mail.example");
        }

        #[tokio::test]
        async fn test_register_conflict_is_address_taken() {
            let (_server, client) = server_with(
                Mock::given(method("POST"))
                    .and(path("/accounts"))
                    .respond_with(ResponseTemplate::new(422)),
            )
            .await;

            let err = client.register_account("a@mail.example", "pw").await.unwrap_err();
            assert!(matches!(err, Error::AddressTaken { status: 422 }));
        }

        #[tokio::test]
        async fn test_mint_token_without_token_field() {
            let (_server, client) = server_with(
                Mock::given(method("POST"))
                    .and(path("/token"))
                    .respond_with(ResponseTemplate::new(200).set_body_json(json!({}))),
            )
            .await;

            let err = client.mint_token("a@mail.example", "pw").await.unwrap_err();
            assert!(matches!(err, Error::InvalidCredentials { status: 200 }));
        }

        #[tokio::test]
        async fn test_mint_token_returns_token() {
            let (_server, client) = server_with(
                Mock::given(method("POST"))
                    .and(path("/token"))
                    .respond_with(
                        ResponseTemplate::new(200).set_body_json(json!({ "id": "acc-1", "token": "T1" })),
                    ),
            )
            .await;

            assert_eq!(client.mint_token("a@mail.example", "pw").await.unwrap(), "T1");
        }

        #[tokio::test]
        async fn test_list_messages_sends_bearer_and_reads_hydra_members() {
            let (_server, client) = server_with(
                Mock::given(method("GET"))
                    .and(path("/messages"))
                    .and(header("Authorization", "Bearer T1"))
                    .and(header("Accept", JSON_LD))
                    .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                        "hydra:member": [
                            {
                                "id": "m1",
                                "from": { "address": "news@shop.example", "name": "Shop" },
                                "subject": "Welcome",
                                "intro": "Hello there",
                                "size": 1234,
                                "seen": false,
                                "createdAt": "2024-05-01T10:00:00+00:00",
                            }
                        ],
                        "hydra:totalItems": 1,
                    }))),
            )
            .await;

            let messages = client.list_messages("T1").await.unwrap();
            assert_eq!(messages.len(), 1);
            assert_eq!(messages[0].id, "m1");
            assert_eq!(messages[0].subject, "Welcome");
            assert_eq!(messages[0].from.address, "news@shop.example");
            assert_eq!(messages[0].size, 1234);
        }

        #[tokio::test]
        async fn test_list_messages_with_stale_token() {
            let (_server, client) = server_with(
                Mock::given(method("GET"))
                    .and(path("/messages"))
                    .respond_with(ResponseTemplate::new(401)),
            )
            .await;

            let err = client.list_messages("stale").await.unwrap_err();
            assert!(matches!(err, Error::InvalidToken { status: 401 }));
        }

        #[tokio::test]
        async fn test_list_domains_accepts_bare_array() {
            let (_server, client) = server_with(
                Mock::given(method("GET"))
                    .and(path("/domains"))
                    .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                        { "id": "d1", "domain": "mail.example", "isActive": true, "isPrivate": false }
                    ]))),
            )
            .await;

            let domains = client.list_domains().await.unwrap();
            assert_eq!(domains.len(), 1);
            assert_eq!(domains[0].domain, "mail.example");
        }

        #[tokio::test]
        async fn test_list_domains_server_error() {
            let (_server, client) = server_with(
                Mock::given(method("GET"))
                    .and(path("/domains"))
                    .respond_with(ResponseTemplate::new(503)),
            )
            .await;

            let err = client.list_domains().await.unwrap_err();
            assert!(matches!(err, Error::ProviderUnavailable { status: 503 }));
        }

        #[tokio::test]
        async fn test_download_missing_message_is_not_found() {
            let (_server, client) = server_with(
                Mock::given(method("GET"))
                    .and(path("/messages/gone/download"))
                    .respond_with(ResponseTemplate::new(404)),
            )
            .await;

            let err = client.download_message("T1", "gone").await.unwrap_err();
            assert!(matches!(err, Error::NotFound { ref id } if id == "gone"));
        }

        #[tokio::test]
        async fn test_download_returns_raw_bytes_without_json_accept() {
            let raw = b"From: a@b.example\r\nSubject: Hi\r\n\r\nBody\r\n".to_vec();
            let (server, client) = server_with(
                Mock::given(method("GET"))
                    .and(path("/messages/m1/download"))
                    .and(header("Authorization", "Bearer T1"))
                    .respond_with(
                        ResponseTemplate::new(200).set_body_raw(raw.clone(), "message/rfc822"),
                    ),
            )
            .await;

            let bytes = client.download_message("T1", "m1").await.unwrap();
            assert_eq!(bytes, raw);

            let requests = server.received_requests().await.unwrap();
            assert_eq!(requests.len(), 1);
            let accept = requests[0]
                .headers
                .get("accept")
                .and_then(|v| v.to_str().ok());
            assert_ne!(accept, Some(JSON_LD));
        }
    }
}
