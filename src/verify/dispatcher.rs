use std::time::Duration;

use ethers::types::Address;
use eyre::ContextCompat;
use tracing::{info, instrument};

use super::backends::{
    Backend, BackendError, EtherscanVerifier, HttpMinimalVerifier,
    MinimalVerifier, StandardJsonVerifier,
};
use super::compiler_version::CompilerVersionResolver;
use super::request::{minimal_request, standard_json_request};
use super::{VerificationError, VerificationRequest};
use crate::config::VerificationConfig;

/// Backends that accepted a submission, in submission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    pub completed: Vec<Backend>,
}

/// Submits one canonical request to the minimal backend, then to the
/// standard JSON backend. Stops at the first failure.
#[derive(Debug)]
pub struct VerificationDispatcher<A, B> {
    resolver: CompilerVersionResolver,
    minimal: A,
    standard_json: B,
    network: String,
}

impl VerificationDispatcher<HttpMinimalVerifier, EtherscanVerifier> {
    pub fn from_config(config: &VerificationConfig) -> eyre::Result<Self> {
        let api_key = config
            .etherscan_api_key
            .as_deref()
            .context("Missing etherscan api key")?;

        let mut minimal = HttpMinimalVerifier::new(&config.minimal_verifier_url);
        if let Some(access_key) = &config.minimal_verifier_access_key {
            minimal = minimal.with_access_key(access_key);
        }

        let standard_json =
            EtherscanVerifier::new(&config.etherscan_api_url, api_key)
                .with_polling(
                    Duration::from_secs(config.poll.interval_secs),
                    config.poll.max_status_checks,
                );

        Ok(Self::new(
            CompilerVersionResolver::new(&config.compiler_list_url),
            minimal,
            standard_json,
            &config.network,
        ))
    }
}

impl<A, B> VerificationDispatcher<A, B>
where
    A: MinimalVerifier,
    B: StandardJsonVerifier,
{
    pub fn new(
        resolver: CompilerVersionResolver,
        minimal: A,
        standard_json: B,
        network: impl ToString,
    ) -> Self {
        Self {
            resolver,
            minimal,
            standard_json,
            network: network.to_string(),
        }
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    #[instrument(
        skip(self, request),
        fields(
            network = %self.network,
            contract = %request.contract,
            compiler_version = %request.compiler_version,
        )
    )]
    pub async fn verify_contract(
        &self,
        address: Address,
        request: &VerificationRequest,
    ) -> Result<VerificationReport, VerificationError> {
        let versions = self.resolver.resolve(&request.compiler_version).await?;

        let mut completed = Vec::new();

        let submission_error =
            |backend, completed: &[Backend], source: BackendError| {
                VerificationError::Submission {
                    backend,
                    contract: request.contract.clone(),
                    address,
                    completed: completed.to_vec(),
                    source,
                }
            };

        let minimal =
            minimal_request(&self.network, address, request, &versions);
        self.minimal.submit(minimal).await.map_err(|source| {
            submission_error(Backend::Minimal, &completed, source)
        })?;
        completed.push(Backend::Minimal);

        info!("{} verified through {}", request.contract, Backend::Minimal);

        let standard_json =
            standard_json_request(&self.network, address, request, &versions);
        self.standard_json
            .submit(standard_json)
            .await
            .map_err(|source| {
                submission_error(Backend::StandardJson, &completed, source)
            })?;
        completed.push(Backend::StandardJson);

        info!(
            "{} verified through {}",
            request.contract,
            Backend::StandardJson
        );

        Ok(VerificationReport { completed })
    }
}
