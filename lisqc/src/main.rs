#[macro_use]
extern crate clap;

use clap::Arg;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

#[derive(Debug)]
enum IoErrorContext {
    ReadInput,
    WriteOutput,
}

#[derive(Debug)]
enum Error {
    Compile(lisqc::CompileError),
    Io(std::io::Error, IoErrorContext, PathBuf),
    Image(isa::Error, PathBuf),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(err, context, path) => write!(
                f,
                "{} file \"{}\" failed: {}",
                match context {
                    IoErrorContext::ReadInput => "Reading input",
                    IoErrorContext::WriteOutput => "Writing output",
                },
                path.display(),
                err
            ),
            Error::Image(err, path) => {
                write!(f, "Writing image \"{}\" failed: {}", path.display(), err)
            }
            Error::Compile(err) => write!(f, "Compilation failed: {}", err),
        }
    }
}

fn main() {
    // Parse command line arguments
    let matches = app_from_crate!()
        .arg(
            Arg::with_name("INPUT")
                .help("Source file to compile (.lisq)")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("OUTPUT")
                .help("Program image to write (.json)")
                .required(true)
                .index(2),
        )
        .get_matches();

    let input = matches.value_of("INPUT").unwrap();
    let output = matches.value_of("OUTPUT").unwrap();

    if let Err(err) = compiler(input, output) {
        eprintln!("{}", err);
        process::exit(1);
    }
}

fn compiler(input: &str, output: &str) -> Result<(), Error> {
    let input_path = Path::new(input);
    let output_path = Path::new(output);

    let source = fs::read_to_string(input_path)
        .map_err(|err| Error::Io(err, IoErrorContext::ReadInput, input_path.to_owned()))?;

    let base_dir = input_path.parent().unwrap_or_else(|| Path::new("."));
    let program = lisqc::compile(&source, base_dir).map_err(Error::Compile)?;

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|err| {
                Error::Io(err, IoErrorContext::WriteOutput, parent.to_owned())
            })?;
        }
    }

    isa::write_file(output_path, &program)
        .map_err(|err| Error::Image(err, output_path.to_owned()))?;

    Ok(())
}
