//! rtyaml command-line tool for checking, reformatting and transcoding YAML
//! documents.
//!
//! Usage: rtyaml [OPTIONS] [FILE|DIR|-]
//!
//! Options:
//!   -t, --to <FORMAT>      Output format (yaml, json, events, tokens) [default: yaml]
//!   -r, --round-trip       Keep comments, quoting and layout when writing YAML
//!   --check                Check if input is valid (exit 0 if valid, 1 if invalid)
//!   -w, --write            Write output next to the input (in place for yaml)
//!   -o, --output <FILE>    Write output to the specified file
//!   --indent <N>           Spaces per nesting level [default: 2]
//!   --width <N>            Preferred line width [default: $RTYAML_WIDTH or 80]
//!   --explicit-start       Start every document with `---`

use clap::{value_parser, Arg, ArgAction, Command};
use librtyaml::{Dumper, DumperOptions, Loader, LoaderOptions, Profile, Schema, Value};
use std::env;
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use std::process;

mod transcode;

/// Default preferred line width
const DEFAULT_WIDTH: usize = 80;

/// Name used in error positions for standard input
const STDIN_NAME: &str = "<stdin>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Yaml,
    Json,
    Events,
    Tokens,
}

impl Format {
    fn from_name(name: &str) -> Option<Format> {
        match name {
            "yaml" | "yml" => Some(Format::Yaml),
            "json" => Some(Format::Json),
            "events" => Some(Format::Events),
            "tokens" => Some(Format::Tokens),
            _ => None,
        }
    }

    fn extension(self) -> &'static str {
        match self {
            Format::Yaml => "yaml",
            Format::Json => "json",
            Format::Events => "events",
            Format::Tokens => "tokens",
        }
    }
}

/// Everything one input needs besides its own path.
struct Settings {
    format: Format,
    round_trip: bool,
    check_only: bool,
    write_back: bool,
    output_file: Option<String>,
    dumper: DumperOptions,
}

impl Settings {
    fn schema(&self) -> Schema {
        if self.round_trip {
            Schema::for_profile(Profile::RoundTrip)
        } else {
            Schema::for_profile(Profile::Unrestricted)
        }
    }
}

fn main() {
    let matches = Command::new("rtyaml")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Check, reformat and transcode YAML documents")
        .arg(
            Arg::new("input")
                .help("Input file or directory; reads from stdin when absent or '-'")
                .index(1),
        )
        .arg(
            Arg::new("to")
                .long("to")
                .short('t')
                .help("Output format: yaml, json, events, tokens")
                .default_value("yaml"),
        )
        .arg(
            Arg::new("round-trip")
                .long("round-trip")
                .short('r')
                .help("Keep comments, quoting and layout when writing YAML")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("check")
                .long("check")
                .help("Check if the input is valid (exit 0 if valid, 1 if invalid)")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("write")
                .long("write")
                .short('w')
                .help("Write output next to the input, in place for yaml")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("output")
                .long("output")
                .short('o')
                .help("Write output to the specified file (not valid with directory input)"),
        )
        .arg(
            Arg::new("indent")
                .long("indent")
                .help("Spaces per nesting level, 2 to 9")
                .value_parser(value_parser!(usize))
                .default_value("2"),
        )
        .arg(
            Arg::new("width")
                .long("width")
                .help("Preferred line width [default: $RTYAML_WIDTH or 80]")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("explicit-start")
                .long("explicit-start")
                .help("Start every document with '---'")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let to = matches.get_one::<String>("to").map(String::as_str).unwrap_or("yaml");
    let Some(format) = Format::from_name(to) else {
        eprintln!("Unknown output format: {}", to);
        eprintln!("Supported formats: yaml, json, events, tokens");
        process::exit(2);
    };

    let width = matches.get_one::<usize>("width").copied().unwrap_or_else(default_width);
    let indent = matches.get_one::<usize>("indent").copied().unwrap_or(2);
    let settings = Settings {
        format,
        round_trip: matches.get_flag("round-trip"),
        check_only: matches.get_flag("check"),
        write_back: matches.get_flag("write"),
        output_file: matches.get_one::<String>("output").cloned(),
        dumper: DumperOptions::default()
            .with_indent(indent)
            .with_width(width)
            .with_explicit_start(matches.get_flag("explicit-start")),
    };

    let input_path = matches.get_one::<String>("input").map(String::as_str).filter(|p| *p != "-");

    if let Some(path) = input_path {
        if Path::new(path).is_dir() {
            if settings.output_file.is_some() {
                eprintln!("Error: --output cannot be used with directory input");
                process::exit(2);
            }
            process::exit(process_directory(path, &settings));
        }
    }

    process::exit(process_input(input_path, &settings));
}

/// Get the preferred line width from the RTYAML_WIDTH env var or default
fn default_width() -> usize {
    env::var("RTYAML_WIDTH")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_WIDTH)
}

/// Process every .yaml and .yml file in a directory. Returns the exit code.
fn process_directory(dir: &str, settings: &Settings) -> i32 {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            eprintln!("Error reading directory {}: {}", dir, e);
            return 1;
        }
    };

    let mut files: Vec<String> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "yaml" || ext == "yml"))
        .map(|path| path.to_string_lossy().to_string())
        .collect();
    files.sort();

    if files.is_empty() {
        eprintln!("No .yaml or .yml files found in {}", dir);
        return 1;
    }

    let mut failed = 0;
    for file in &files {
        if process_input(Some(file), settings) != 0 {
            failed += 1;
        }
    }

    if settings.check_only {
        println!("{} files checked, {} failed", files.len(), failed);
    }
    if failed > 0 {
        1
    } else {
        0
    }
}

/// Process one input file or stdin. Returns the exit code.
fn process_input(input_file: Option<&str>, settings: &Settings) -> i32 {
    let name = input_file.unwrap_or(STDIN_NAME);
    let bytes = match read_input(input_file) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading {}: {}", name, e);
            return 1;
        }
    };

    let options = LoaderOptions::default().with_name(name);

    if settings.check_only {
        return match load_documents(&bytes, settings, &options) {
            Ok(_) => {
                println!("{}: ok", name);
                0
            }
            Err(e) => {
                eprintln!("{}", e);
                1
            }
        };
    }

    match render(&bytes, settings, &options) {
        Ok(output) => {
            write_output(&output, settings, input_file);
            0
        }
        Err(e) => {
            eprintln!("{}", e);
            1
        }
    }
}

fn read_input(input_file: Option<&str>) -> io::Result<Vec<u8>> {
    match input_file {
        Some(path) => fs::read(path),
        None => {
            let mut bytes = Vec::new();
            io::stdin().lock().read_to_end(&mut bytes)?;
            Ok(bytes)
        }
    }
}

/// Load every document with the schema the settings select.
fn load_documents(
    bytes: &[u8],
    settings: &Settings,
    options: &LoaderOptions,
) -> librtyaml::Result<Vec<librtyaml::Document>> {
    Loader::from_read(bytes, settings.schema(), options).collect()
}

/// Produce the text for the requested output format.
fn render(bytes: &[u8], settings: &Settings, options: &LoaderOptions) -> Result<String, String> {
    match settings.format {
        Format::Tokens => {
            let mut loader = Loader::from_read(bytes, settings.schema(), options);
            let mut output = String::new();
            while let Some(token) = loader.next_token().map_err(|e| e.to_string())? {
                output.push_str(&token.to_string());
                output.push('\n');
            }
            Ok(output)
        }
        Format::Events => {
            let mut loader = Loader::from_read(bytes, settings.schema(), options);
            let mut output = String::new();
            while let Some(event) = loader.next_event().map_err(|e| e.to_string())? {
                output.push_str(&event.to_string());
                output.push('\n');
            }
            Ok(output)
        }
        Format::Json => {
            let documents = load_documents(bytes, settings, options).map_err(|e| e.to_string())?;
            let values: Vec<Value> = documents.into_iter().map(|d| d.root).collect();
            transcode::json::encode_stream(&values).map_err(|e| format!("Error: Cannot convert to JSON: {}", e))
        }
        Format::Yaml => {
            let documents = load_documents(bytes, settings, options).map_err(|e| e.to_string())?;
            dump_documents(&documents, settings).map_err(|e| e.to_string())
        }
    }
}

fn dump_documents(documents: &[librtyaml::Document], settings: &Settings) -> librtyaml::Result<String> {
    let mut dumper = Dumper::new(Vec::new(), settings.schema(), &settings.dumper);
    for document in documents {
        if settings.round_trip {
            dumper.dump_document(document)?;
        } else {
            dumper.dump(&document.root)?;
        }
    }
    let bytes = dumper.into_inner()?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn write_output(output: &str, settings: &Settings, input_file: Option<&str>) {
    if let Some(path) = settings.output_file.as_deref() {
        if let Err(e) = fs::write(path, output) {
            eprintln!("Error writing {}: {}", path, e);
            process::exit(1);
        }
    } else if settings.write_back {
        if let Some(input_path) = input_file {
            let output_path = Path::new(input_path).with_extension(settings.format.extension());
            if let Err(e) = fs::write(&output_path, output) {
                eprintln!("Error writing {}: {}", output_path.display(), e);
                process::exit(1);
            }
        } else {
            eprintln!("Error: --write requires an input file");
            process::exit(1);
        }
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        let mut result = handle.write_all(output.as_bytes());
        // Ensure output ends with newline
        if result.is_ok() && !output.is_empty() && !output.ends_with('\n') {
            result = handle.write_all(b"\n");
        }
        if let Err(e) = result {
            eprintln!("Error writing to stdout: {}", e);
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(format: Format, round_trip: bool) -> Settings {
        Settings {
            format,
            round_trip,
            check_only: false,
            write_back: false,
            output_file: None,
            dumper: DumperOptions::default(),
        }
    }

    fn render_str(input: &str, format: Format, round_trip: bool) -> Result<String, String> {
        render(input.as_bytes(), &settings(format, round_trip), &LoaderOptions::default())
    }

    #[test]
    fn test_format_names() {
        assert_eq!(Format::from_name("yml"), Some(Format::Yaml));
        assert_eq!(Format::from_name("events"), Some(Format::Events));
        assert_eq!(Format::from_name("toml"), None);
        assert_eq!(Format::Json.extension(), "json");
    }

    #[test]
    fn test_reformat_drops_comments() {
        let output = render_str("a:   1 # note\nb: [x, y]\n", Format::Yaml, false).unwrap();
        assert_eq!(output, "a: 1\nb:\n- x\n- y\n");
    }

    #[test]
    fn test_round_trip_keeps_comments() {
        let input = "# head\na: 1  # note\nb: [x, y]\n";
        assert_eq!(render_str(input, Format::Yaml, true).unwrap(), input);
    }

    #[test]
    fn test_events_output() {
        let output = render_str("[a]", Format::Events, false).unwrap();
        assert_eq!(output, "+STR\n+DOC\n+SEQ []\n=VAL :a\n-SEQ\n-DOC\n-STR\n");
    }

    #[test]
    fn test_tokens_output() {
        let output = render_str("a: 1", Format::Tokens, false).unwrap();
        assert!(output.lines().count() > 4);
    }

    #[test]
    fn test_json_output() {
        let output = render_str("a: 1\n", Format::Json, false).unwrap();
        assert_eq!(output, "{\n  \"a\": 1\n}");
    }

    #[test]
    fn test_errors_name_the_stream() {
        let options = LoaderOptions::default().with_name("broken.yaml");
        let err = render(b"a: [1\n", &settings(Format::Yaml, false), &options).unwrap_err();
        assert!(err.contains("broken.yaml"), "{}", err);
    }
}
