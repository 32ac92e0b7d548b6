use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use reconcile::RuleMode;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ncedit")]
#[command(version)]
#[command(about = "Edit node classifier groups idempotently", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Settings file [default: <config dir>/ncedit.toml]
    #[arg(long, env = "NCEDIT_CONFIG", global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Overrides for the connection settings
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// Classifier host, must match its certificate [default: `facter fqdn`]
    #[arg(long, env = "NCEDIT_HOSTNAME", global = true)]
    pub hostname: Option<String>,

    /// Classifier port [default: 4433]
    #[arg(long, env = "NCEDIT_CLASSIFIER_PORT", global = true)]
    pub classifier_port: Option<u16>,

    /// Puppet server port [default: 8140]
    #[arg(long, env = "NCEDIT_PUPPET_PORT", global = true)]
    pub puppet_port: Option<u16>,

    /// Puppet ssl directory [default: /etc/puppetlabs/puppet/ssl]
    #[arg(long, env = "NCEDIT_SSL_DIR", global = true, value_name = "DIR")]
    pub ssl_dir: Option<PathBuf>,

    /// Seconds to wait for the classifier to come up [default: 300]
    #[arg(long, env = "NCEDIT_WAIT_TIMEOUT", global = true, value_name = "SECS")]
    pub wait_timeout: Option<u64>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Apply a YAML or JSON document describing several groups
    Batch(BatchArgs),

    /// Add or remove a class or class parameter on a group
    Classes(ClassesArgs),

    /// Create an environment group and set its environment
    Groups(GroupsArgs),

    /// Make the classifier re-read the classes in every environment
    RefreshClasses,

    /// Show the resolved settings
    Config,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_rule_mode(value: &str) -> Result<RuleMode, String> {
    value.parse().map_err(|e: reconcile::Error| e.to_string())
}

// ============================================================================
// Batch
// ============================================================================

#[derive(Args, Debug)]
pub struct BatchArgs {
    /// Document in YAML format
    #[arg(long, value_name = "FILE")]
    pub yaml_file: Option<PathBuf>,

    /// Document in JSON format
    #[arg(long, value_name = "FILE")]
    pub json_file: Option<PathBuf>,

    /// Apply code manager settings and deploy code before anything else
    #[arg(long)]
    pub smart_update: bool,

    /// Seconds to wait after the smart-update deploy [default: 60]
    #[arg(long, value_name = "SECS")]
    pub settle: Option<u64>,
}

// ============================================================================
// Classes
// ============================================================================

#[derive(Args, Debug)]
pub struct ClassesArgs {
    /// Group to edit; created under "All Nodes" if missing
    #[arg(long)]
    pub group_name: String,

    /// Class to add, change or delete
    #[arg(long)]
    pub class_name: Option<String>,

    /// Parameter of the class
    #[arg(long)]
    pub param_name: Option<String>,

    /// Value for the parameter, stored as a string
    #[arg(long)]
    pub param_value: Option<String>,

    /// Delete the class from the group
    #[arg(long)]
    pub delete_class: bool,

    /// Delete the parameter from the class
    #[arg(long)]
    pub delete_param: bool,

    /// Rule as JSON, e.g. '["or", ["=", "name", "web01"]]'
    #[arg(long)]
    pub rule: Option<String>,

    /// How to combine --rule with the current rule
    #[arg(long, default_value = "append", value_parser = parse_rule_mode)]
    pub rule_mode: RuleMode,

    /// Deploy code before adding classes so they exist on the server
    #[arg(long)]
    pub smart_update: bool,
}

// ============================================================================
// Groups
// ============================================================================

#[derive(Args, Debug)]
pub struct GroupsArgs {
    /// Group to edit; created under "All Environments" if missing
    #[arg(long)]
    pub group_name: String,

    /// Environment to assign
    #[arg(long)]
    pub environment: Option<String>,

    /// Make this an environment group
    #[arg(long)]
    pub environment_trumps: bool,

    /// Rule as JSON
    #[arg(long)]
    pub rule: Option<String>,

    /// How to combine --rule with the current rule
    #[arg(long, default_value = "append", value_parser = parse_rule_mode)]
    pub rule_mode: RuleMode,
}
