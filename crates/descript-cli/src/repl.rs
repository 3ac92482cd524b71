//! Interactive REPL for exploring and partitioning a page's scripts.
//!
//! Launch with `descript repl [page.html]` to enter interactive mode.
//! Type `/help` for available commands, Tab for completion.
//!
//! Searches are written as `predicate=patterns`, e.g. `by-reference=s1,s2`.
//! `ref` and `content` are accepted as short names and a `re:` prefix makes
//! the pattern a regular expression.

use std::path::Path;

use rustyline::completion::{Completer, Pair};
use rustyline::config::CompletionType;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{
    Cmd, ConditionalEventHandler, Config, Editor, Event, EventContext, EventHandler, Helper,
    KeyEvent, RepeatCount,
};

use descript::{
    Pattern, PatternValue, Rewrite, ScriptPayload, ScriptRegistry, SearchSpec, BY_CONTENT,
    BY_REFERENCE,
};

use crate::extract::extract_from_file;
use crate::materialize::{render, render_entry, OutputFormat};
use crate::plan::Plan;
use crate::types::{CliError, CliResult};

/// Available REPL commands.
const COMMANDS: &[(&str, &str)] = &[
    ("/load", "Load a page: /load <page.html> [plan.json]"),
    ("/assign", "Move scripts: /assign <container> <search>..."),
    ("/delete", "Drop scripts: /delete <search>..."),
    ("/exists", "Test a search: /exists <search>"),
    ("/find", "Show the script a search resolves to"),
    ("/insert", "Insert after a match: /insert <search> <src | fn:source>"),
    ("/rewrite", "Rewrite a match: /rewrite <search> <from> -> <to>"),
    ("/get", "Show a container, or all of them"),
    ("/containers", "List containers and sizes"),
    ("/predicates", "List registered predicates"),
    ("/clear", "Clear the screen"),
    ("/help", "Show available commands"),
    ("/exit", "Quit the REPL"),
];

/// Commands taking `predicate=patterns` search tokens.
const SEARCH_COMMANDS: &[&str] = &["/assign", "/delete", "/exists", "/find", "/insert", "/rewrite"];

const REGEX_PREFIX: &str = "re:";
const FUNCTION_PREFIX: &str = "fn:";
const REWRITE_ARROW: &str = " -> ";

/// REPL helper for tab completion.
#[derive(Default)]
struct DescriptHelper;

impl Completer for DescriptHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let input = &line[..pos];

        if !input.contains(' ') {
            let matches: Vec<Pair> = COMMANDS
                .iter()
                .filter(|(cmd, _)| cmd.starts_with(input))
                .map(|(cmd, desc)| Pair {
                    display: format!("{cmd:<14} {desc}"),
                    replacement: format!("{cmd} "),
                })
                .collect();
            return Ok((0, matches));
        }

        let (cmd, args) = input.split_once(' ').unwrap_or((input, ""));

        // .html / .json file completion
        if cmd == "/load" {
            let wanted = if args.contains(' ') { "json" } else { "html" };
            let current = args.rsplit(' ').next().unwrap_or("");
            let mut files = Vec::new();
            if let Ok(entries) = std::fs::read_dir(".") {
                for entry in entries.flatten() {
                    let path = entry.path();
                    if path.extension().is_some_and(|e| e == wanted) {
                        if let Some(name) = path.file_name().and_then(|s| s.to_str()) {
                            files.push(name.to_string());
                        }
                    }
                }
            }
            files.sort();
            let matches: Vec<Pair> = files
                .iter()
                .filter(|f| f.starts_with(current))
                .map(|f| Pair {
                    display: f.clone(),
                    replacement: format!("{f} "),
                })
                .collect();
            return Ok((pos - current.len(), matches));
        }

        // search token completion
        let in_search = match cmd {
            "/assign" => args.contains(' '),
            "/insert" | "/rewrite" => !args.contains(' '),
            _ => SEARCH_COMMANDS.contains(&cmd),
        };
        if in_search {
            let current = args.rsplit(' ').next().unwrap_or("");
            if !current.contains('=') {
                return Ok((pos - current.len(), search_key_candidates(current)));
            }
        }

        Ok((pos, Vec::new()))
    }
}

/// Built-in predicate names offered as `name=` for a partial token.
fn search_key_candidates(partial: &str) -> Vec<Pair> {
    [BY_REFERENCE, BY_CONTENT]
        .iter()
        .filter(|name| name.starts_with(partial))
        .map(|name| Pair {
            display: format!("{name}="),
            replacement: format!("{name}="),
        })
        .collect()
}

impl Hinter for DescriptHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        if pos < line.len() || line.is_empty() {
            return None;
        }
        if line.starts_with('/') && !line.contains(' ') {
            for (cmd, _) in COMMANDS {
                if cmd.starts_with(line) && *cmd != line {
                    return Some(cmd[line.len()..].to_string());
                }
            }
        }
        None
    }
}

impl Highlighter for DescriptHelper {}
impl Validator for DescriptHelper {}
impl Helper for DescriptHelper {}

struct TabCompleteOrAcceptHint;

impl ConditionalEventHandler for TabCompleteOrAcceptHint {
    fn handle(
        &self,
        _evt: &Event,
        _n: RepeatCount,
        _positive: bool,
        ctx: &EventContext<'_>,
    ) -> Option<Cmd> {
        if ctx.has_hint() {
            Some(Cmd::CompleteHint)
        } else {
            Some(Cmd::Complete)
        }
    }
}

/// What the loop should do after a command.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    Print(String),
    Clear,
    Exit,
}

/// Session state: the registry built from the loaded page, if any.
#[derive(Debug, Default)]
pub struct ReplState {
    registry: Option<ScriptRegistry>,
}

impl ReplState {
    pub fn with_registry(registry: ScriptRegistry) -> Self {
        Self {
            registry: Some(registry),
        }
    }

    pub fn registry(&self) -> Option<&ScriptRegistry> {
        self.registry.as_ref()
    }

    /// Load a page, optionally running a plan over it.
    pub fn load(&mut self, page: &Path, plan: Option<&Path>) -> CliResult<String> {
        let scripts = extract_from_file(page)?;
        let registry = match plan {
            Some(plan) => Plan::load(plan)?.run(scripts)?.0,
            None => ScriptRegistry::with_scripts(scripts),
        };
        let message = format!(
            "Loaded: {} ({} scripts, {} containers)",
            page.display(),
            registry.len(),
            registry.container_names().len()
        );
        self.registry = Some(registry);
        Ok(message)
    }

    /// Execute one input line.
    pub fn execute(&mut self, line: &str) -> CliResult<Outcome> {
        let input = line.trim();
        let input = input.strip_prefix('/').unwrap_or(input);
        if input.is_empty() {
            return Ok(Outcome::Print(help_text()));
        }

        let (cmd, args) = input.split_once(' ').unwrap_or((input, ""));
        let args = args.trim();

        let output = match cmd {
            "exit" | "quit" => return Ok(Outcome::Exit),
            "clear" | "cls" => return Ok(Outcome::Clear),
            "help" | "h" | "?" => help_text(),
            "load" => {
                let mut paths = args.split_whitespace();
                let page = paths
                    .next()
                    .ok_or_else(|| usage("/load <page.html> [plan.json]"))?;
                self.load(Path::new(page), paths.next().map(Path::new))?
            }
            "assign" => {
                let (container, rest) = args
                    .split_once(' ')
                    .ok_or_else(|| usage("/assign <container> <search>..."))?;
                let search = parse_search(rest)?;
                let registry = self.loaded_mut()?;
                registry.assign(container, &search)?;
                let size = registry.get(container).map(|e| e.len()).unwrap_or(0);
                format!("{container}: {size} scripts")
            }
            "delete" => {
                let search = parse_search(args)?;
                let registry = self.loaded_mut()?;
                let before = registry.len();
                registry.delete(&search)?;
                format!("Deleted {} scripts", before - registry.len())
            }
            "exists" => self.loaded()?.exists(&parse_search(args)?)?.to_string(),
            "find" => match self.loaded()?.find(&parse_search(args)?)? {
                Some(entry) => format!("{} [{}] {}", entry.id, entry.container, render_entry(entry)),
                None => "No match".to_string(),
            },
            "insert" => {
                let (token, payload) = args
                    .split_once(' ')
                    .ok_or_else(|| usage("/insert <search> <src | fn:source>"))?;
                let search = parse_search(token)?;
                let payload = match payload.trim().strip_prefix(FUNCTION_PREFIX) {
                    Some(source) => ScriptPayload::function(source),
                    None => ScriptPayload::External(payload.trim().to_string()),
                };
                match self.loaded_mut()?.insert_after(&search, payload)? {
                    Some(id) => format!("Inserted {id}"),
                    None => "No match, nothing inserted".to_string(),
                }
            }
            "rewrite" => {
                let (token, rule) = args
                    .split_once(' ')
                    .ok_or_else(|| usage("/rewrite <search> <from> -> <to>"))?;
                let search = parse_search(token)?;
                let (from, to) = rule
                    .split_once(REWRITE_ARROW)
                    .ok_or_else(|| usage("/rewrite <search> <from> -> <to>"))?;
                let rewrite = Rewrite::new(parse_pattern(from.trim())?, to.trim());
                if self.loaded_mut()?.rewrite_content(&search, [rewrite])? {
                    "Rewritten".to_string()
                } else {
                    "No match, nothing rewritten".to_string()
                }
            }
            "get" => {
                let registry = self.loaded()?;
                if args.is_empty() {
                    render(&registry.get_all(), OutputFormat::Html)?
                } else {
                    let entries = registry.get(args)?;
                    entries
                        .iter()
                        .map(|e| format!("{} {}", e.id, render_entry(e)))
                        .collect::<Vec<_>>()
                        .join("\n")
                }
            }
            "containers" => {
                let all = self.loaded()?.get_all();
                all.iter()
                    .map(|(name, entries)| format!("{name:<20} {}", entries.len()))
                    .collect::<Vec<_>>()
                    .join("\n")
            }
            "predicates" => self.loaded()?.predicates().names().join("\n"),
            _ => {
                return Err(CliError::InvalidCommand(format!(
                    "Unknown command '/{cmd}'. Type /help for commands."
                )))
            }
        };

        Ok(Outcome::Print(output))
    }

    fn loaded(&self) -> CliResult<&ScriptRegistry> {
        self.registry.as_ref().ok_or(CliError::NoPageLoaded)
    }

    fn loaded_mut(&mut self) -> CliResult<&mut ScriptRegistry> {
        self.registry.as_mut().ok_or(CliError::NoPageLoaded)
    }
}

fn usage(text: &str) -> CliError {
    CliError::InvalidCommand(format!("Usage: {text}"))
}

/// Parse whitespace-separated `predicate=patterns` tokens.
fn parse_search(args: &str) -> CliResult<SearchSpec> {
    let mut search = SearchSpec::new();
    for token in args.split_whitespace() {
        let (name, value) = token
            .split_once('=')
            .ok_or_else(|| usage("<predicate>=<patterns>, e.g. by-reference=s1,s2"))?;
        let name = match name {
            "ref" | "src" => BY_REFERENCE,
            "content" => BY_CONTENT,
            other => other,
        };
        let value: PatternValue = match value.strip_prefix(REGEX_PREFIX) {
            Some(expr) => Pattern::regex(expr)?.into(),
            None => value.into(),
        };
        search = search.with(name, value);
    }
    Ok(search)
}

fn parse_pattern(text: &str) -> CliResult<Pattern> {
    match text.strip_prefix(REGEX_PREFIX) {
        Some(expr) => Ok(Pattern::regex(expr)?),
        None => Ok(Pattern::text(text)),
    }
}

fn help_text() -> String {
    let mut text = String::from("Commands:\n\n");
    for (cmd, desc) in COMMANDS {
        text.push_str(&format!("  {cmd:<14} {desc}\n"));
    }
    text.push_str("\nSearch: predicate=patterns (ref, content, or any registered name); re: for regex.");
    text
}

/// Run the interactive REPL.
pub fn run(page: Option<&Path>, plan: Option<&Path>) -> anyhow::Result<()> {
    eprintln!();
    eprintln!(
        "  \x1b[32m\u{25c9}\x1b[0m \x1b[1mdescript v{}\x1b[0m \x1b[90m(script partitioning)\x1b[0m",
        env!("CARGO_PKG_VERSION")
    );
    eprintln!();
    eprintln!(
        "    Press \x1b[36m/\x1b[0m to browse commands, \x1b[90mTab\x1b[0m to complete, \x1b[90m/exit\x1b[0m to quit."
    );
    eprintln!();

    let config = Config::builder()
        .history_ignore_space(true)
        .auto_add_history(true)
        .completion_type(CompletionType::List)
        .completion_prompt_limit(20)
        .build();

    let mut rl: Editor<DescriptHelper, rustyline::history::DefaultHistory> =
        Editor::with_config(config)?;
    rl.set_helper(Some(DescriptHelper));
    rl.bind_sequence(
        KeyEvent::from('\t'),
        EventHandler::Conditional(Box::new(TabCompleteOrAcceptHint)),
    );

    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    let hist_path = std::path::PathBuf::from(&home).join(".descript_history");
    if hist_path.exists() {
        let _ = rl.load_history(&hist_path);
    }

    let mut state = ReplState::default();
    if let Some(page) = page {
        match state.load(page, plan) {
            Ok(message) => eprintln!("  {message}"),
            Err(e) => eprintln!("  Failed to load: {e}"),
        }
    }
    let prompt = " \x1b[36mdescript>\x1b[0m ";

    loop {
        match rl.readline(prompt) {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                match state.execute(&line) {
                    Ok(Outcome::Print(text)) => {
                        for line in text.lines() {
                            eprintln!("  {line}");
                        }
                    }
                    Ok(Outcome::Clear) => eprint!("\x1b[2J\x1b[H"),
                    Ok(Outcome::Exit) => {
                        eprintln!("  Goodbye!");
                        break;
                    }
                    Err(e) => eprintln!("  Error: {e}"),
                }
            }
            Err(ReadlineError::Interrupted) => {
                eprintln!("  \x1b[90m(Ctrl+C)\x1b[0m Type \x1b[1m/exit\x1b[0m to quit.");
            }
            Err(ReadlineError::Eof) => {
                eprintln!("  Goodbye!");
                break;
            }
            Err(err) => {
                eprintln!("  Error: {err}");
                break;
            }
        }
    }

    let _ = rl.save_history(&hist_path);

    Ok(())
}
