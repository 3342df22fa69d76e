use std::io::{self, IsTerminal, Read};

use log::debug;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use minim::Error;
use minim::evaluator::Interp;
use minim::printer::print_value;
use minim::reader::read_program;
use minim::value::Value;

fn main() {
    env_logger::Builder::from_default_env().init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut interp = Interp::new();

    if !args.is_empty() {
        for arg in &args {
            match arg.as_str() {
                "--help" | "-h" => {
                    usage();
                    std::process::exit(0);
                }
                other if other.starts_with('-') => {
                    eprintln!("Unknown argument: {other}");
                    eprintln!("Try 'minim --help' for usage information.");
                    std::process::exit(1);
                }
                _ => {}
            }
        }
        for path in &args {
            debug!("running {path}");
            let source = match std::fs::read_to_string(path) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("Error: cannot read '{path}': {e}");
                    std::process::exit(1);
                }
            };
            run_source(&mut interp, &source);
        }
        return;
    }

    let stdin = io::stdin();
    if stdin.is_terminal() {
        run_repl(&mut interp);
    } else {
        let mut source = String::new();
        if let Err(e) = stdin.lock().read_to_string(&mut source) {
            eprintln!("Error: cannot read stdin: {e}");
            std::process::exit(1);
        }
        run_source(&mut interp, &source);
    }
}

fn usage() {
    println!("Usage: minim [FILE ...]");
    println!();
    println!("With file arguments, evaluates each file in order against one");
    println!("shared global environment. With piped input, evaluates stdin the");
    println!("same way. With no arguments on a terminal, starts a REPL.");
    println!();
    println!("Non-void results of top-level forms are printed one per line.");
}

/// Evaluate a whole program, printing non-void results. Any error aborts the
/// process: exit 1 for errors in the program, exit 2 for interpreter bugs.
fn run_source(interp: &mut Interp, source: &str) {
    let forms = match read_program(source, &mut interp.heap, &mut interp.symbols) {
        Ok(forms) => forms,
        Err(e) => exit_with(e),
    };
    debug!("{} top-level forms", forms.len());
    for (i, form) in forms.iter().enumerate() {
        match interp.eval_top(form) {
            Ok(value) => {
                if !matches!(value, Value::Void) {
                    println!("{}", print_value(&value, &interp.heap, &interp.symbols));
                }
            }
            Err(e) => exit_with(e),
        }
        // Checkpoint: forms not yet evaluated are reachable only from this
        // slice, so they are passed as roots alongside the global frame.
        let global = interp.global();
        interp.heap.collect(&forms[i + 1..], &[global]);
    }
}

fn exit_with(error: Error) -> ! {
    eprintln!("Error: {error}");
    let code = if error.is_internal() { 2 } else { 1 };
    std::process::exit(code);
}

fn run_repl(interp: &mut Interp) {
    println!("minim interpreter");
    println!("Type Ctrl-C or Ctrl-D to exit.");
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("Error: cannot start line editor: {e}");
            std::process::exit(1);
        }
    };
    loop {
        match editor.readline("minim> ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line.as_str());
                eval_line(interp, &line);
            }
            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => break,
            Err(e) => {
                eprintln!("readline error: {e}");
                break;
            }
        }
    }
}

/// Evaluate one REPL line. User errors are reported and leave the session
/// running; an internal error means interpreter state can no longer be
/// trusted, so the process exits.
fn eval_line(interp: &mut Interp, line: &str) {
    let forms = match read_program(line, &mut interp.heap, &mut interp.symbols) {
        Ok(forms) => forms,
        Err(e) => {
            eprintln!("Error: {e}");
            return;
        }
    };
    for (i, form) in forms.iter().enumerate() {
        let result = interp.eval_top(form);
        let global = interp.global();
        match result {
            Ok(value) => {
                if !matches!(value, Value::Void) {
                    println!("{}", print_value(&value, &interp.heap, &interp.symbols));
                }
                interp.heap.collect(&forms[i + 1..], &[global]);
            }
            Err(e) => {
                eprintln!("Error: {e}");
                if e.is_internal() {
                    std::process::exit(2);
                }
                // The rest of the line is abandoned.
                interp.heap.collect(&[], &[global]);
                break;
            }
        }
    }
}
