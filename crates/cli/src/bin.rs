//! The `sexpr2wasm` command line interface.

#[derive(clap::Parser, Debug)]
#[command(version, about, long_about = None)]
struct Arguments {
    /// Path to the source file to compile.
    input: std::path::PathBuf,
    /// Path the WebAssembly module is written to.
    #[arg(default_value = "out.wasm")]
    output: std::path::PathBuf,
}

pub fn main() -> anyhow::Result<std::process::ExitCode> {
    use anyhow::Context;

    let arguments = <Arguments as clap::Parser>::parse();

    let source = std::fs::read_to_string(&arguments.input)
        .with_context(|| format!("could not read {:?}", arguments.input))?;

    match sexpr2wasm_compile::compile(&source) {
        Ok(wasm) => {
            std::fs::write(&arguments.output, wasm)
                .with_context(|| format!("could not write {:?}", arguments.output))?;
            Ok(std::process::ExitCode::SUCCESS)
        }
        Err(error) => {
            eprintln!("error: {}", error.name());
            Ok(std::process::ExitCode::FAILURE)
        }
    }
}
