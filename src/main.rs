//! Carlos frontend CLI

use std::env;
use std::fs;
use std::process::ExitCode;

use carlosc::errors::print_error;
use carlosc::parser::StmtKind;
use carlosc::{analyze, Parser};

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        println!("Carlos compiler frontend");
        println!("Version {}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("Usage: carlosc <command> <file>");
        println!();
        println!("Commands:");
        println!("  parse <file>           Parse a source file and dump a summary");
        println!("  check <file>           Run the full semantic analyzer");
        println!();
        return ExitCode::SUCCESS;
    }

    let command = &args[1];

    match command.as_str() {
        "parse" => {
            let Some((filename, source)) = read_source(&args) else {
                return ExitCode::FAILURE;
            };

            match Parser::new(&source).parse() {
                Ok(program) => {
                    println!("Parsed {} statements:", program.statements.len());
                    for stmt in &program.statements {
                        println!("  {}", summarize(&stmt.kind));
                    }
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    print_error(&source, filename, &e);
                    ExitCode::FAILURE
                }
            }
        }

        "check" => {
            let Some((filename, source)) = read_source(&args) else {
                return ExitCode::FAILURE;
            };

            let program = match Parser::new(&source).parse() {
                Ok(program) => program,
                Err(e) => {
                    print_error(&source, filename, &e);
                    return ExitCode::FAILURE;
                }
            };

            match analyze(&program) {
                Ok(analyzed) => {
                    println!(
                        "{}: {} top-level statement(s), no errors",
                        filename,
                        analyzed.statements.len()
                    );
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    print_error(&source, filename, &e);
                    ExitCode::FAILURE
                }
            }
        }

        _ => {
            eprintln!("Error: unknown command '{}'", command);
            ExitCode::FAILURE
        }
    }
}

fn read_source<'a>(args: &'a [String]) -> Option<(&'a str, String)> {
    let Some(filename) = args.get(2) else {
        eprintln!("Error: missing file argument");
        return None;
    };
    match fs::read_to_string(filename) {
        Ok(source) => Some((filename, source)),
        Err(e) => {
            eprintln!("Error reading file '{}': {}", filename, e);
            None
        }
    }
}

fn summarize(stmt: &StmtKind) -> String {
    match stmt {
        StmtKind::VarDecl { constant, name, .. } => {
            let kind = if *constant { "const" } else { "let" };
            format!("{} {}", kind, name.name)
        }
        StmtKind::TypeDecl { name, fields } => {
            format!("struct {} ({} fields)", name.name, fields.len())
        }
        StmtKind::FunDecl { name, params, .. } => {
            format!("function {} ({} params)", name.name, params.len())
        }
        StmtKind::Increment { .. } => "increment".to_string(),
        StmtKind::Decrement { .. } => "decrement".to_string(),
        StmtKind::Assignment { .. } => "assignment".to_string(),
        StmtKind::Call(_) => "call".to_string(),
        StmtKind::Break => "break".to_string(),
        StmtKind::Return(_) => "return".to_string(),
        StmtKind::If { .. } => "if statement".to_string(),
        StmtKind::While { .. } => "while loop".to_string(),
        StmtKind::Repeat { .. } => "repeat loop".to_string(),
        StmtKind::ForRange { iterator, .. } => format!("for {} in range", iterator.name),
        StmtKind::ForEach { iterator, .. } => format!("for {} in collection", iterator.name),
    }
}
