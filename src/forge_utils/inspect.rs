use std::path::{Path, PathBuf};
use std::str::FromStr;

use ethers::types::Bytes;
use eyre::Context;
use strum::Display;
use tracing::{info, instrument};

use super::common::ContractSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum InspectField {
    Abi,
    Bytecode,
}

pub struct ForgeInspect {
    cwd: Option<PathBuf>,
    contract_spec: ContractSpec,
}

impl ForgeInspect {
    pub fn new(contract_spec: ContractSpec) -> Self {
        Self {
            cwd: None,
            contract_spec,
        }
    }

    pub fn with_cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_owned());
        self
    }

    fn command(&self, field: InspectField) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new("forge");

        cmd.arg("inspect");

        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }

        cmd.arg(self.contract_spec.to_string());
        cmd.arg(field.to_string());

        cmd
    }

    async fn run(&self, field: InspectField) -> eyre::Result<String> {
        let mut cmd = self.command(field);

        info!("Inspecting {} {field}", self.contract_spec);

        let output = cmd.output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            eyre::bail!("forge inspect {field} failed: {}", stderr);
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    #[instrument(name = "forge_inspect_abi", skip_all)]
    pub async fn abi(&self) -> eyre::Result<ethers::abi::Abi> {
        let stdout = self.run(InspectField::Abi).await?;

        serde_json::from_str(&stdout).with_context(|| {
            format!("Parsing abi of {}", self.contract_spec)
        })
    }

    #[instrument(name = "forge_inspect_bytecode", skip_all)]
    pub async fn bytecode(&self) -> eyre::Result<Bytes> {
        let stdout = self.run(InspectField::Bytecode).await?;

        Bytes::from_str(stdout.trim()).with_context(|| {
            format!("Parsing bytecode of {}", self.contract_spec)
        })
    }
}
