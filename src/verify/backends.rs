use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use strum::Display;
use thiserror::Error;
use tracing::{debug, info, instrument};

use super::request::{
    MinimalVerificationRequest, StandardJsonVerificationRequest,
};

pub const ACCESS_KEY_HEADER: &str = "x-access-key";

const STANDARD_JSON_CODE_FORMAT: &str = "solidity-standard-json-input";
const PENDING_IN_QUEUE: &str = "Pending in queue";
const ALREADY_VERIFIED: &str = "already verified";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum Backend {
    Minimal,
    StandardJson,
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("backend responded with {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("backend rejected the submission: {0}")]
    Rejected(String),

    #[error("verification still pending after {0} status checks")]
    StillPending(u32),

    #[error("failed to encode the compiler input")]
    Encode(#[from] serde_json::Error),
}

#[async_trait]
pub trait MinimalVerifier: Send + Sync {
    async fn submit(
        &self,
        request: MinimalVerificationRequest,
    ) -> Result<(), BackendError>;
}

#[async_trait]
pub trait StandardJsonVerifier: Send + Sync {
    async fn submit(
        &self,
        request: StandardJsonVerificationRequest,
    ) -> Result<(), BackendError>;
}

/// Posts the minimal shape as JSON to a single endpoint.
#[derive(Debug, Clone)]
pub struct HttpMinimalVerifier {
    client: Client,
    url: String,
    access_key: Option<String>,
}

impl HttpMinimalVerifier {
    pub fn new(url: impl ToString) -> Self {
        Self {
            client: Client::new(),
            url: url.to_string(),
            access_key: None,
        }
    }

    pub fn with_access_key(mut self, access_key: impl ToString) -> Self {
        self.access_key = Some(access_key.to_string());
        self
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl MinimalVerifier for HttpMinimalVerifier {
    #[instrument(
        name = "minimal_verify",
        skip_all,
        fields(address = ?request.address, contract = %request.contract_name)
    )]
    async fn submit(
        &self,
        request: MinimalVerificationRequest,
    ) -> Result<(), BackendError> {
        let mut builder = self.client.post(&self.url).json(&request);

        if let Some(access_key) = &self.access_key {
            builder = builder.header(ACCESS_KEY_HEADER, access_key);
        }

        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await?;
            return Err(BackendError::Status { status, body });
        }

        info!("Submitted {} to {}", request.contract_name, self.url);

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    #[serde(default)]
    message: String,
    result: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifySourceCodeForm<'a> {
    apikey: &'a str,
    module: &'static str,
    action: &'static str,
    #[serde(rename = "contractaddress")]
    contract_address: String,
    source_code: String,
    #[serde(rename = "codeformat")]
    code_format: &'static str,
    #[serde(rename = "contractname")]
    contract_name: String,
    #[serde(rename = "compilerversion")]
    compiler_version: &'a str,
}

#[derive(Serialize)]
struct CheckStatusQuery<'a> {
    apikey: &'a str,
    module: &'static str,
    action: &'static str,
    guid: &'a str,
}

/// Etherscan-compatible explorer API.
#[derive(Debug, Clone)]
pub struct EtherscanVerifier {
    client: Client,
    api_url: String,
    api_key: String,
    poll_interval: Duration,
    max_status_checks: u32,
}

impl EtherscanVerifier {
    pub fn new(api_url: impl ToString, api_key: impl ToString) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
            poll_interval: Duration::from_secs(5),
            max_status_checks: 30,
        }
    }

    /// `max_status_checks` below 1 still checks once.
    pub fn with_polling(
        mut self,
        poll_interval: Duration,
        max_status_checks: u32,
    ) -> Self {
        self.poll_interval = poll_interval;
        self.max_status_checks = max_status_checks.max(1);
        self
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    async fn read_response(
        response: reqwest::Response,
    ) -> Result<ApiResponse, BackendError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(BackendError::Status { status, body });
        }

        serde_json::from_str(&body)
            .map_err(|_| BackendError::Status { status, body })
    }

    async fn check_status(&self, guid: &str) -> Result<ApiResponse, BackendError> {
        let query = CheckStatusQuery {
            apikey: &self.api_key,
            module: "contract",
            action: "checkverifystatus",
            guid,
        };

        let response =
            self.client.get(&self.api_url).query(&query).send().await?;

        Self::read_response(response).await
    }

    async fn wait_for_verification(&self, guid: &str) -> Result<(), BackendError> {
        for check in 1..=self.max_status_checks {
            tokio::time::sleep(self.poll_interval).await;

            let response = self.check_status(guid).await?;

            if response.status == "1" || is_already_verified(&response.result)
            {
                info!("Verification {guid} passed: {}", response.result);
                return Ok(());
            }

            if response.result != PENDING_IN_QUEUE {
                return Err(BackendError::Rejected(response.result));
            }

            debug!("Verification {guid} pending, check {check}");
        }

        Err(BackendError::StillPending(self.max_status_checks))
    }
}

fn is_already_verified(result: &str) -> bool {
    result.to_lowercase().contains(ALREADY_VERIFIED)
}

#[async_trait]
impl StandardJsonVerifier for EtherscanVerifier {
    #[instrument(
        name = "etherscan_verify",
        skip_all,
        fields(address = ?request.address, contract = %request.contract_name)
    )]
    async fn submit(
        &self,
        request: StandardJsonVerificationRequest,
    ) -> Result<(), BackendError> {
        let form = VerifySourceCodeForm {
            apikey: &self.api_key,
            module: "contract",
            action: "verifysourcecode",
            contract_address: format!("{:?}", request.address),
            source_code: serde_json::to_string(&request.input)?,
            code_format: STANDARD_JSON_CODE_FORMAT,
            contract_name: request.contract_name.to_string(),
            compiler_version: &request.compiler_version,
        };

        info!(
            "Submitting {} on {} with {}",
            request.contract_name, request.network, request.compiler_version
        );

        let response =
            self.client.post(&self.api_url).form(&form).send().await?;
        let response = Self::read_response(response).await?;

        if response.status != "1" {
            if is_already_verified(&response.result) {
                info!("{} is already verified", request.contract_name);
                return Ok(());
            }

            return Err(BackendError::Rejected(format!(
                "{}: {}",
                response.message, response.result
            )));
        }

        let guid = response.result;

        if request.wait_for_success {
            self.wait_for_verification(&guid).await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ethers::types::Address;
    use httpmock::Method::{GET, POST};
    use httpmock::MockServer;
    use serde_json::json;

    use super::*;
    use crate::verify::compiler_version::CompilerVersions;
    use crate::verify::request::tests::counter_request;
    use crate::verify::request::{minimal_request, standard_json_request};

    fn versions() -> CompilerVersions {
        CompilerVersions {
            short: "v0.8.18".to_string(),
            long: "v0.8.18+commit.87f61d96".to_string(),
        }
    }

    fn address() -> Address {
        Address::repeat_byte(0xaa)
    }

    fn etherscan(server: &MockServer) -> EtherscanVerifier {
        EtherscanVerifier::new(server.url("/api"), "secret")
            .with_polling(Duration::from_millis(1), 3)
    }

    #[tokio::test]
    async fn minimal_posts_json() {
        let server = MockServer::start_async().await;
        let verify = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/verify")
                    .header(ACCESS_KEY_HEADER, "key")
                    .json_body_partial(
                        r#"{
                            "contractName": "src/Counter.sol:Counter",
                            "compilerVersion": "v0.8.18",
                            "visibility": "public"
                        }"#,
                    );
                then.status(200).json_body(json!({ "ok": true }));
            })
            .await;

        let request =
            minimal_request("sepolia", address(), &counter_request(), &versions());

        HttpMinimalVerifier::new(server.url("/verify"))
            .with_access_key("key")
            .submit(request)
            .await
            .unwrap();

        verify.assert_async().await;
    }

    #[tokio::test]
    async fn minimal_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/verify");
                then.status(400).body("unsupported compiler");
            })
            .await;

        let request =
            minimal_request("sepolia", address(), &counter_request(), &versions());

        let err = HttpMinimalVerifier::new(server.url("/verify"))
            .submit(request)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            BackendError::Status { status, body }
                if status == StatusCode::BAD_REQUEST
                    && body == "unsupported compiler"
        ));
    }

    #[tokio::test]
    async fn etherscan_submits_and_waits() {
        let server = MockServer::start_async().await;
        let submit = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api")
                    .x_www_form_urlencoded_tuple("action", "verifysourcecode")
                    .x_www_form_urlencoded_tuple(
                        "codeformat",
                        "solidity-standard-json-input",
                    )
                    .x_www_form_urlencoded_tuple(
                        "compilerversion",
                        "v0.8.18+commit.87f61d96",
                    )
                    .x_www_form_urlencoded_tuple(
                        "contractname",
                        "src/Counter.sol:Counter",
                    )
                    .x_www_form_urlencoded_tuple(
                        "contractaddress",
                        "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
                    );
                then.status(200).json_body(json!({
                    "status": "1",
                    "message": "OK",
                    "result": "guid-1"
                }));
            })
            .await;
        let status = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api")
                    .query_param("action", "checkverifystatus")
                    .query_param("guid", "guid-1");
                then.status(200).json_body(json!({
                    "status": "1",
                    "message": "OK",
                    "result": "Pass - Verified"
                }));
            })
            .await;

        let request = standard_json_request(
            "sepolia",
            address(),
            &counter_request(),
            &versions(),
        );

        etherscan(&server).submit(request).await.unwrap();

        submit.assert_async().await;
        status.assert_async().await;
    }

    #[tokio::test]
    async fn etherscan_skips_polling_when_not_waiting() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api");
                then.status(200).json_body(json!({
                    "status": "1",
                    "message": "OK",
                    "result": "guid-1"
                }));
            })
            .await;
        let status = server
            .mock_async(|when, then| {
                when.method(GET).path("/api");
                then.status(200).json_body(json!({
                    "status": "0",
                    "message": "NOTOK",
                    "result": PENDING_IN_QUEUE
                }));
            })
            .await;

        let mut request = standard_json_request(
            "sepolia",
            address(),
            &counter_request(),
            &versions(),
        );
        request.wait_for_success = false;

        etherscan(&server).submit(request).await.unwrap();

        assert_eq!(status.hits_async().await, 0);
    }

    #[tokio::test]
    async fn etherscan_gives_up_while_pending() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api");
                then.status(200).json_body(json!({
                    "status": "1",
                    "message": "OK",
                    "result": "guid-1"
                }));
            })
            .await;
        let status = server
            .mock_async(|when, then| {
                when.method(GET).path("/api");
                then.status(200).json_body(json!({
                    "status": "0",
                    "message": "NOTOK",
                    "result": PENDING_IN_QUEUE
                }));
            })
            .await;

        let request = standard_json_request(
            "sepolia",
            address(),
            &counter_request(),
            &versions(),
        );

        let err = etherscan(&server).submit(request).await.unwrap_err();

        assert!(matches!(err, BackendError::StillPending(3)));
        assert_eq!(status.hits_async().await, 3);
    }

    #[tokio::test]
    async fn etherscan_checks_status_at_least_once() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api");
                then.status(200).json_body(json!({
                    "status": "1",
                    "message": "OK",
                    "result": "guid-1"
                }));
            })
            .await;
        let status = server
            .mock_async(|when, then| {
                when.method(GET).path("/api");
                then.status(200).json_body(json!({
                    "status": "1",
                    "message": "OK",
                    "result": "Pass - Verified"
                }));
            })
            .await;

        let request = standard_json_request(
            "sepolia",
            address(),
            &counter_request(),
            &versions(),
        );

        EtherscanVerifier::new(server.url("/api"), "secret")
            .with_polling(Duration::from_millis(1), 0)
            .submit(request)
            .await
            .unwrap();

        assert_eq!(status.hits_async().await, 1);
    }

    #[tokio::test]
    async fn etherscan_rejection_and_already_verified() {
        let server = MockServer::start_async().await;
        let rejected = server
            .mock_async(|when, then| {
                when.method(POST).path("/api");
                then.status(200).json_body(json!({
                    "status": "0",
                    "message": "NOTOK",
                    "result": "Invalid API Key"
                }));
            })
            .await;

        let request = standard_json_request(
            "sepolia",
            address(),
            &counter_request(),
            &versions(),
        );

        let err = etherscan(&server)
            .submit(request.clone())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BackendError::Rejected(message) if message.contains("Invalid API Key")
        ));

        rejected.delete_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api");
                then.status(200).json_body(json!({
                    "status": "0",
                    "message": "NOTOK",
                    "result": "Contract source code already verified"
                }));
            })
            .await;

        etherscan(&server).submit(request).await.unwrap();
    }
}
