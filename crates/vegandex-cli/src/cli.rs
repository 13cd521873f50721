use clap::{ArgGroup, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "vegandex")]
#[command(about = "vegandex accounts from the terminal - sign in, register, session status")]
#[command(version)]
#[command(after_help = "Environment: VEGANDEX_API_URL, VEGANDEX_TIMEOUT_SECS, \
VEGANDEX_CREDENTIAL_BACKEND (keyring|file), RUST_LOG")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// The subcommand to run; `status` when none was given.
    pub fn into_command(self) -> Commands {
        self.command.unwrap_or(Commands::Status { json: false })
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Show the current session
    #[command(alias = "whoami")]
    Status {
        /// Print status and profile as JSON
        #[arg(long)]
        json: bool,
    },

    /// Sign in (prompts for the password)
    Login {
        /// Email address; prompted for when omitted
        email: Option<String>,
    },

    /// Create an account and sign in (prompts for the password twice)
    Register { username: String, email: String },

    /// Sign out
    Logout,

    /// Re-fetch your profile from the server
    Refresh,

    /// Change username and/or email
    #[command(group(ArgGroup::new("changes").required(true).multiple(true)))]
    UpdateProfile {
        #[arg(long, group = "changes")]
        username: Option<String>,
        #[arg(long, group = "changes")]
        email: Option<String>,
    },

    /// Add a product you created to your profile
    RecordUpload { product_id: String },

    /// Confirm your email address with the token from the verification mail
    VerifyEmail { token: String },

    /// Send the verification email again
    ResendVerification,
}
