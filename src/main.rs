use std::fs;
use std::path::PathBuf;
use std::process::exit;

use anyhow::Context;
use clap::Parser;

/// Compile a C0 source file into an o0 binary image.
#[derive(Parser)]
#[clap(name = "c0", version)]
struct Command {
    /// The source file to compile
    input: PathBuf,

    /// Where to write the binary image
    #[clap(short, long, default_value = "out.o0")]
    output: PathBuf,

    /// Print the assembly listing instead of writing the image
    #[clap(long)]
    emit_asm: bool,
}

fn main() {
    env_logger::builder().format_timestamp(None).init();

    let command = Command::parse();
    if let Err(err) = run(&command) {
        eprintln!("{:#}", err);
        exit(1);
    }
}

fn run(command: &Command) -> anyhow::Result<()> {
    let source = fs::read_to_string(&command.input)
        .with_context(|| format!("cannot read {}", command.input.display()))?;
    let program = c0::compile_str(&source)
        .with_context(|| format!("failed to compile {}", command.input.display()))?;

    if command.emit_asm {
        print!("{}", program);
    } else {
        fs::write(&command.output, program.to_bytes())
            .with_context(|| format!("cannot write {}", command.output.display()))?;
        log::info!("wrote {}", command.output.display());
    }
    Ok(())
}
