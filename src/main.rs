use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use libsie4::validator::Target;

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Side {
    Import,
    Export,
}

#[derive(Parser, Debug)]
#[command(name = "sie4", version, about = "Parse, check and rewrite SIE4 files")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse a file and run the validation rules against it.
    Check {
        input: PathBuf,

        /// Which side of the interchange to validate for.
        #[arg(long, value_enum, default_value = "export")]
        side: Side,
    },
    /// Parse a file and write it back in canonical form.
    Rewrite {
        input: PathBuf,

        /// Output file (stdout when omitted).
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Seal the output with a trailing #KSUMMA post.
        #[arg(long)]
        ksumma: bool,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Check { input, side } => {
            let doc = libsie4::parse_file(&input)
                .with_context(|| format!("parsing {}", input.display()))?;
            let target = match side {
                Side::Import => Target::Import,
                Side::Export => Target::Export,
            };
            libsie4::validate(&doc, target)
                .with_context(|| format!("validating {}", input.display()))?;
            println!(
                "{}: ok ({} accounts, {} journal entries)",
                input.display(),
                doc.accounts.len(),
                doc.entries().len()
            );
        }
        Command::Rewrite {
            input,
            output,
            ksumma,
        } => {
            let doc = libsie4::parse_file(&input)
                .with_context(|| format!("parsing {}", input.display()))?;
            match output {
                Some(path) => {
                    libsie4::write_file(&doc, &path, ksumma)
                        .with_context(|| format!("writing {}", path.display()))?;
                }
                None => {
                    let text = libsie4::write(&doc, ksumma)?;
                    print!("{text}");
                }
            }
        }
    }

    Ok(())
}
