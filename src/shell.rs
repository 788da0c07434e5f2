//! Interactive question loop
//!
//! Each line is a question for the current dataset. Backslash commands switch
//! dataset, print the last SQL, or save it as a view.

use crate::config::Config;
use crate::format::{format_datasets, format_query_result, format_save_view_result};
use crate::nl_sql::datasets::{all_descriptors, get_descriptor};
use crate::nl_sql::QueryEngine;
use nu_ansi_term::{Color, Style};
use reedline::{
    FileBackedHistory, Prompt, PromptEditMode, PromptHistorySearch, Reedline, Signal,
};
use std::borrow::Cow;
use std::io;
use tracing::warn;

const HISTORY_CAPACITY: usize = 1000;

const HELP: &str = "\
Type a question to query the current dataset.
  \\dataset N   switch dataset (1, 2 or 3)
  \\datasets    list datasets
  \\sql         show the last successful SQL
  \\view NAME   save the last successful SQL as a view
  \\x           toggle expanded display
  \\h           this help
  \\q           quit";

/// A parsed backslash command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Quit,
    Help,
    Datasets,
    SwitchDataset(i64),
    ShowSql,
    SaveView(String),
    ToggleExpanded,
    Unknown(String),
}

impl ShellCommand {
    /// `None` when the line is a question rather than a command
    pub fn parse(line: &str) -> Option<Self> {
        let rest = line.trim().strip_prefix('\\')?;
        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };

        let command = match name {
            "q" | "quit" => ShellCommand::Quit,
            "h" | "help" | "?" => ShellCommand::Help,
            "datasets" => ShellCommand::Datasets,
            "dataset" | "d" => match arg.parse() {
                Ok(id) => ShellCommand::SwitchDataset(id),
                Err(_) => ShellCommand::Unknown(line.trim().to_string()),
            },
            "sql" => ShellCommand::ShowSql,
            "view" if !arg.is_empty() => ShellCommand::SaveView(arg.to_string()),
            "x" => ShellCommand::ToggleExpanded,
            _ => ShellCommand::Unknown(line.trim().to_string()),
        };
        Some(command)
    }
}

pub struct ShellPrompt {
    dataset: i64,
}

impl Prompt for ShellPrompt {
    fn render_prompt_left(&self) -> Cow<'_, str> {
        let name = get_descriptor(self.dataset)
            .map(|d| d.name)
            .unwrap_or("unknown");
        Cow::Owned(format!("nlsql[{} {}]=> ", self.dataset, name))
    }

    fn render_prompt_right(&self) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    fn render_prompt_indicator(&self, _edit_mode: PromptEditMode) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    fn render_prompt_multiline_indicator(&self) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    fn render_prompt_history_search_indicator(
        &self,
        history_search: PromptHistorySearch,
    ) -> Cow<'_, str> {
        match history_search.term.as_str() {
            "" => Cow::Borrowed("(reverse-i-search): "),
            _ => Cow::Owned(format!("(reverse-i-search '{}'): ", history_search.term)),
        }
    }
}

fn line_editor() -> Reedline {
    let editor = Reedline::create().use_bracketed_paste(true);
    let Some(path) = Config::config_dir().map(|dir| dir.join("history.txt")) else {
        return editor;
    };
    match FileBackedHistory::with_file(HISTORY_CAPACITY, path) {
        Ok(history) => editor.with_history(Box::new(history)),
        Err(e) => {
            warn!("Shell history disabled: {}", e);
            editor
        }
    }
}

pub async fn run_shell(engine: &QueryEngine, dataset: i64) -> io::Result<()> {
    let mut prompt = ShellPrompt { dataset };
    let mut expanded = false;
    let mut editor = line_editor();
    let error_style = Style::new().fg(Color::Red);

    println!("Type a question, \\h for help or \\q to quit.");

    loop {
        match editor.read_line(&prompt)? {
            Signal::Success(buffer) => {
                let line = buffer.trim();
                if line.is_empty() {
                    continue;
                }

                let Some(command) = ShellCommand::parse(line) else {
                    let result = engine.answer(line, prompt.dataset).await;
                    let text = format_query_result(&result, expanded);
                    if result.is_success() {
                        print!("{text}");
                    } else {
                        print!("{}", error_style.paint(text));
                    }
                    continue;
                };

                match command {
                    ShellCommand::Quit => break,
                    ShellCommand::Help => println!("{HELP}"),
                    ShellCommand::Datasets => print!("{}", format_datasets(all_descriptors())),
                    ShellCommand::SwitchDataset(id) => match get_descriptor(id) {
                        Ok(descriptor) => {
                            prompt.dataset = id;
                            println!("Using dataset {} ({})", id, descriptor.name);
                        }
                        Err(e) => println!("{}", error_style.paint(e.user_message())),
                    },
                    ShellCommand::ShowSql => match engine.last_sql(prompt.dataset) {
                        Some(sql) => println!("{}", Color::Cyan.paint(sql)),
                        None => println!("No query has run on this dataset yet."),
                    },
                    ShellCommand::SaveView(name) => {
                        let result = engine.save_view(&name, prompt.dataset).await;
                        print!("{}", format_save_view_result(&result));
                    }
                    ShellCommand::ToggleExpanded => {
                        expanded = !expanded;
                        println!("Expanded display is {}.", if expanded { "on" } else { "off" });
                    }
                    ShellCommand::Unknown(text) => {
                        println!("Unknown command {text}. Type \\h for help.");
                    }
                }
            }
            Signal::CtrlC => {
                println!("^C");
                continue;
            }
            Signal::CtrlD => break,
        }
    }

    println!("Goodbye!");
    Ok(())
}
