use clap::Parser;

/// Arguments for completions command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Generate bash completions:\n    provisioner completions bash > ~/.bash_completion.d/provisioner\n\n\
                  Generate zsh completions:\n    provisioner completions zsh > ~/.zfunc/_provisioner\n\n\
                  Generate fish completions:\n    provisioner completions fish > ~/.config/fish/completions/provisioner.fish")]
pub struct CompletionsArgs {
    /// Shell type (bash, elvish, fish, powershell, zsh)
    pub shell: String,
}
