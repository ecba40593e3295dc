use std::fs;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(
    name = "wrencc",
    about = "Wren C compiler — C89 front end for the register VM",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Lex a C source file and print its tokens
    Tokens {
        /// Input C file
        input: PathBuf,
    },
    /// Parse a C source file and print the AST (debug format)
    Ast {
        /// Input C file
        input: PathBuf,
    },
    /// Compile a C source file to a program listing
    Compile {
        /// Input C file
        input: PathBuf,
        /// Output path (default: stdout)
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,
    },
}

fn read_source(path: &PathBuf) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Tokens { input } => {
            let src = read_source(&input)?;
            for tok in lex::tokenize(&src) {
                println!("{} {:?}", tok.loc, tok.kind);
            }
        }
        Commands::Ast { input } => {
            let src = read_source(&input)?;
            let tu = parse::parse_translation_unit(&src)
                .with_context(|| format!("parsing {}", input.display()))?;
            println!("{:#?}", tu);
        }
        Commands::Compile { input, output } => {
            let src = read_source(&input)?;
            let program = codegen::compile_source(&src)
                .with_context(|| format!("compiling {}", input.display()))?;
            debug!(
                instructions = program.instructions.len(),
                static_bytes = program.static_memory.len(),
                "compiled"
            );
            match output {
                Some(path) => fs::write(&path, program.to_string())
                    .with_context(|| format!("writing {}", path.display()))?,
                None => print!("{}", program),
            }
        }
    }
    Ok(())
}
