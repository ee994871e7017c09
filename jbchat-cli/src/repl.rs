//! One-shot and interactive front ends.

use std::io::Write;

use futures::StreamExt;
use jbchat_agent::{DialogueEngine, Fragment};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::debug;

pub const BANNER: &str = "This interactive JBrowse assistant can help you navigate your \
    configuration file. Enter a query relating to your config.json, or enter \"q\" to exit.";

/// `q` in any case, trailing whitespace ignored.
pub fn is_quit(line: &str) -> bool {
    line.trim_end().eq_ignore_ascii_case("q")
}

/// Stream one turn to `out` as it arrives.
pub async fn print_turn(
    engine: &DialogueEngine,
    thread_id: &str,
    input: &str,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let mut fragments = engine.stream(thread_id, input);
    while let Some(fragment) = fragments.next().await {
        match fragment? {
            Fragment::Text(text) => {
                write!(out, "{text}")?;
                out.flush()?;
            }
            Fragment::ToolCalls(calls) => {
                for call in calls {
                    debug!(tool.name = %call.name, "model called a tool");
                }
            }
        }
    }
    writeln!(out)?;
    Ok(())
}

/// Answer `prompt` and return.
pub async fn run_once(
    engine: &DialogueEngine,
    thread_id: &str,
    prompt: &str,
) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout();
    write!(stdout, "\nResponse: ")?;
    print_turn(engine, thread_id, prompt, &mut stdout).await
}

/// Read `Query: ` lines until `q` or end of input. A failed turn is reported
/// and the loop continues.
pub async fn run_interactive(engine: &DialogueEngine, thread_id: &str) -> anyhow::Result<()> {
    let mut editor = DefaultEditor::new()?;
    println!("{BANNER}");

    loop {
        let line = match editor.readline("\nQuery: ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        if is_quit(&line) {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(line.as_str());

        let mut stdout = std::io::stdout();
        write!(stdout, "\nResponse: \n\n")?;
        if let Err(e) = print_turn(engine, thread_id, &line, &mut stdout).await {
            eprintln!("\nError: {e}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quit_detection() {
        assert!(is_quit("q"));
        assert!(is_quit("Q"));
        assert!(is_quit("q  \n"));
        assert!(!is_quit(" q"));
        assert!(!is_quit("quit"));
        assert!(!is_quit(""));
    }
}
