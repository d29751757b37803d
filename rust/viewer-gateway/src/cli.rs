use std::{net::IpAddr, time::Duration};

use clap::{Args, Parser, Subcommand};
use url::Url;
use viewer_worker::WorkerSettings;

use crate::{
    authority::{AuthorityConfig, UnreachablePolicy},
    ApiConfig, MaxAge,
};

#[derive(Debug, Parser)]
#[clap(name = "viewer-gateway")]
#[clap(about = "Dataset viewer API", long_about = None)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the API and its workers, and serve clients
    Serve(ServeArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// The IP address of the interface that the API should bind to
    #[clap(short, long, env = "API_INTERFACE", default_value = "127.0.0.1")]
    pub interface: IpAddr,

    /// The port that the API should listen on
    #[clap(short, long, env = "API_PORT", default_value = "8000")]
    pub port: u16,

    /// Optional origin to allow CORS for
    #[clap(short, long, env = "API_CORS_ORIGIN")]
    pub cors_origin: Option<Url>,

    /// Base URL of the Hub
    #[clap(long, env = "COMMON_HF_ENDPOINT", default_value = "https://huggingface.co")]
    pub hf_endpoint: Url,

    /// Token the workers use to read datasets; anonymous when absent
    #[clap(long, env = "COMMON_HF_TOKEN")]
    pub hf_token: Option<String>,

    /// Path of the authorization check on the Hub; `%s` is replaced by the dataset
    #[clap(long, env = "API_HF_AUTH_PATH", default_value = "/api/datasets/%s/auth-check")]
    pub hf_auth_path: String,

    /// Serve every request without checking access to the dataset
    #[clap(long, env = "API_DISABLE_AUTH")]
    pub disable_auth: bool,

    /// Bound on each authorization check
    #[clap(long, env = "API_HF_TIMEOUT_SECONDS", default_value = "3")]
    pub auth_timeout_seconds: u64,

    /// Let requests through when the authorization check cannot be performed
    #[clap(long, env = "API_AUTH_FAIL_OPEN")]
    pub auth_fail_open: bool,

    /// max-age of successful responses, in seconds
    #[clap(long, env = "API_MAX_AGE_LONG", default_value = "120")]
    pub max_age_long: u64,

    /// max-age of error responses, in seconds
    #[clap(long, env = "API_MAX_AGE_SHORT", default_value = "10")]
    pub max_age_short: u64,

    /// Number of concurrent workers
    #[clap(long, env = "WORKER_COUNT", default_value = "2")]
    pub worker_count: usize,

    /// Longest a job may run before it is retried
    #[clap(long, env = "WORKER_JOB_TIMEOUT_SECONDS", default_value = "600")]
    pub job_timeout_seconds: u64,

    /// Additional attempts granted to a failed job
    #[clap(long, env = "WORKER_JOB_RETRIES", default_value = "1")]
    pub job_retries: usize,
}

impl ServeArgs {
    pub fn to_config(&self) -> ApiConfig {
        let timeout = Duration::from_secs(self.auth_timeout_seconds);
        let authority = match self.disable_auth {
            true => None,
            false => Some(AuthorityConfig {
                base_url: self.hf_endpoint.clone(),
                path_template: self.hf_auth_path.clone(),
                timeout,
            }),
        };
        let unreachable_policy = match self.auth_fail_open {
            true => UnreachablePolicy::FailOpen,
            false => UnreachablePolicy::FailClosed,
        };

        ApiConfig {
            interface: self.interface,
            port: self.port,
            cors_origin: self.cors_origin.clone(),
            hf_endpoint: self.hf_endpoint.clone(),
            hf_token: self.hf_token.clone(),
            authority,
            unreachable_policy,
            max_age: MaxAge {
                long: self.max_age_long,
                short: self.max_age_short,
            },
            workers: WorkerSettings {
                worker_count: self.worker_count,
                job_timeout: Duration::from_secs(self.job_timeout_seconds),
                job_retries: self.job_retries,
            },
            hub_timeout: timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn it_uses_the_documented_defaults() -> Result<()> {
        let cli = Cli::try_parse_from(["viewer-gateway", "serve"])?;
        let Command::Serve(args) = cli.command;
        let config = args.to_config();

        assert_eq!(config.port, 8000);
        assert_eq!(config.max_age, MaxAge::default());
        assert_eq!(config.unreachable_policy, UnreachablePolicy::FailClosed);
        assert_eq!(
            config.authority.map(|authority| authority.path_template),
            Some("/api/datasets/%s/auth-check".to_string())
        );
        assert_eq!(config.workers.worker_count, 2);
        Ok(())
    }

    #[test]
    fn it_disables_the_authority_on_request() -> Result<()> {
        let cli = Cli::try_parse_from([
            "viewer-gateway",
            "serve",
            "--disable-auth",
            "--auth-fail-open",
            "--port",
            "9000",
        ])?;
        let Command::Serve(args) = cli.command;
        let config = args.to_config();

        assert!(config.authority.is_none());
        assert_eq!(config.unreachable_policy, UnreachablePolicy::FailOpen);
        assert_eq!(config.port, 9000);
        Ok(())
    }
}
