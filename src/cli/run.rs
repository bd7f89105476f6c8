use clap::Parser;

/// Arguments for run command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Provision and start the profile's command:\n    provisioner run\n\n\
                  Provision and start a different command:\n    provisioner run -- php-fpm -F\n\n\
                  Provision only (e.g. in an init container):\n    provisioner run --no-exec")]
pub struct RunArgs {
    /// Stop after provisioning instead of handing off
    #[arg(long)]
    pub no_exec: bool,

    /// Command to hand off to, overriding the profile's `exec`
    #[arg(last = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}
