use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "acc-provisioner",
    version,
    about = "Boot an IPU from an ISO over Redfish and bring its ACC onto the cluster network"
)]
pub struct Cli {
    /// Cluster configuration file (YAML)
    #[arg(long, env = "ACC_PROVISIONER_CONFIG", default_value = "cluster.yaml")]
    pub config: PathBuf,

    /// Node to provision; required when the cluster has more than one node
    #[arg(long)]
    pub node: Option<String>,

    /// Installation image: an http(s) URL or a local ISO path (overrides the config)
    #[arg(long)]
    pub image: Option<String>,

    /// Port for serving a local image (overrides the config)
    #[arg(long)]
    pub image_server_port: Option<u16>,

    /// Skip the Redfish boot and resume at cluster port configuration
    #[arg(long)]
    pub skip_boot: bool,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    pub verbose: bool,
}
