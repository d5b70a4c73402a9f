use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
mod auth;
use filecrypt::{Cryptor, DEFAULT_ALGORITHM, KdfParams, Registry};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, clap::Args)]
struct Argon2Args {
    /// Argon2 memory cost in KiB (default: 65536)
    #[arg(long = "argon-mem")]
    mem_cost_kib: Option<u32>,

    /// Argon2 time cost / iterations (default: 3)
    #[arg(long = "argon-time")]
    time_cost: Option<u32>,

    /// Argon2 parallelism (default: 1)
    #[arg(long = "argon-parallelism")]
    parallelism: Option<u32>,
}

impl Argon2Args {
    fn to_kdf_params(&self) -> Result<KdfParams> {
        let default = KdfParams::default();

        Ok(KdfParams::new(
            self.mem_cost_kib.unwrap_or(default.mem_cost_kib()),
            self.time_cost.unwrap_or(default.time_cost()),
            self.parallelism.unwrap_or(default.parallelism()),
        )?)
    }
}

#[derive(Debug, Parser)]
#[command(name = "filecrypt")]
#[command(
    version,
    about = "Encrypts and decrypts files under a password or a raw key file."
)]
struct Cli {
    /// Log pipeline progress and internals
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Encrypts a file into a container
    #[command(arg_required_else_help = true)]
    Encrypt {
        /// File to encrypt
        input: PathBuf,

        /// Where to write the container
        #[arg(short, long, value_name = "PATH")]
        output: PathBuf,

        /// Cipher algorithm
        #[arg(short, long, default_value = DEFAULT_ALGORITHM)]
        algorithm: String,

        /// Also write the derived key to this file as hex
        #[arg(short, long, value_name = "PATH")]
        key_file: Option<PathBuf>,

        #[command(flatten)]
        argon2: Argon2Args,
    },

    /// Decrypts a container
    #[command(arg_required_else_help = true)]
    Decrypt {
        /// Container to decrypt
        input: PathBuf,

        /// Where to write the plaintext
        #[arg(short, long, value_name = "PATH")]
        output: PathBuf,

        /// Use this key file instead of a password
        #[arg(short, long, value_name = "PATH")]
        key_file: Option<PathBuf>,
    },

    /// Lists supported algorithms
    Algorithms,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_logging(args.verbose);

    let registry = Registry::builtin();
    let mut report = |n: u64| debug!(bytes = n, "progress");

    match args.command {
        Commands::Encrypt {
            input,
            output,
            algorithm,
            key_file,
            argon2,
        } => {
            let kdf = argon2.to_kdf_params()?;
            let password = auth::read_new_password_with_confirmation()?;
            Cryptor::new(&registry)
                .with_kdf(kdf)
                .encrypt(
                    &input,
                    &password,
                    &algorithm,
                    &output,
                    key_file.as_deref(),
                    Some(&mut report),
                )
                .with_context(|| format!("failed to encrypt '{}'", input.display()))?;
            println!("encrypted '{}' -> '{}'", input.display(), output.display());
        }
        Commands::Decrypt {
            input,
            output,
            key_file,
        } => {
            let password = match key_file {
                Some(_) => None,
                None => Some(auth::read_password()?),
            };
            Cryptor::new(&registry)
                .decrypt(
                    &input,
                    password.as_deref().map(String::as_str),
                    key_file.as_deref(),
                    &output,
                    Some(&mut report),
                )
                .with_context(|| format!("failed to decrypt '{}'", input.display()))?;
            println!("decrypted '{}' -> '{}'", input.display(), output.display());
        }
        Commands::Algorithms => {
            println!("symmetric:");
            for name in registry.symmetric() {
                println!("  {name}");
            }
            println!("asymmetric:");
            for name in registry.asymmetric() {
                println!("  {name}");
            }
        }
    }

    Ok(())
}
