use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "podlogreader")]
#[command(about = "Grant per-Deployment log access to pods that opt in via label")]
pub struct Cli {
    /// Also create a ServiceAccount and RoleBinding next to each Role
    #[arg(long, env = "PODLOGREADER_CREATE_SA_AND_ROLEBINDING")]
    pub create_sa_and_rolebinding: bool,

    /// Namespace to watch (all namespaces if omitted)
    #[arg(short = 'n', long, env = "PODLOGREADER_NAMESPACE")]
    pub namespace: Option<String>,

    /// Context
    #[arg(long)]
    pub context: Option<String>,

    /// Read/write timeout for API requests, in seconds
    #[arg(long, env = "PODLOGREADER_REQUEST_TIMEOUT")]
    pub request_timeout: Option<u64>,

    /// Verbose logging
    #[arg(short = 'v', long)]
    pub verbose: bool,
}
