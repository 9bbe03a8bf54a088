//! Command-line driver: `-o<path>` selects an output path, everything else
//! is an input path, stdin/stdout are the fallback when neither is given.

use std::fs::File;
use std::io::{self, Read, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(exit) => {
            tracing::error!("{}", exit.message);
            ExitCode::from(exit.code)
        }
    }
}

struct Failure {
    code: u8,
    message: String,
}

fn run(args: &[String]) -> Result<(), Failure> {
    let mut output_path: Option<&str> = None;
    let mut inputs: Vec<&str> = Vec::new();

    for arg in args {
        if let Some(path) = arg.strip_prefix("-o") {
            if output_path.is_some() {
                tracing::warn!(path, "duplicate -o argument ignored");
            } else {
                output_path = Some(path);
            }
        } else {
            inputs.push(arg.as_str());
        }
    }

    let mut output: Box<dyn Write> = match output_path {
        Some(path) => Box::new(File::create(path).map_err(|e| Failure {
            code: 1,
            message: format!("output_file_open_failure: {path}: {e}"),
        })?),
        None => Box::new(io::stdout()),
    };

    if inputs.is_empty() {
        generate_one(io::stdin(), &mut output)?;
        return Ok(());
    }

    for path in inputs {
        let file = File::open(path).map_err(|e| Failure {
            code: 2,
            message: format!("read_failed: {path}: {e}"),
        })?;
        generate_one(file, &mut output)?;
    }
    Ok(())
}

fn generate_one(reader: impl Read, writer: &mut dyn Write) -> Result<(), Failure> {
    spark::generate(reader, writer).map_err(|error| {
        use spark::Error;
        let code = match &error {
            Error::ReadFailed(..) => 2,
            Error::WriteFailed(..) => 3,
            _ => 4,
        };
        Failure {
            code,
            message: error.to_string(),
        }
    })
}
