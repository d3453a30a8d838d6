//! htmlsync command line
//!
//! Runs the parser and response tooling over files and prints JSON.

use htmlsync::html::HtmlParser;
use htmlsync::pages::{AppContext, parse_multi_page_response, validate_inter_page_links};
use htmlsync::{EditorConfig, NAME, Result, SyncError, VERSION};
use serde_json::json;
use std::env;
use std::fs;

fn usage() -> String {
    format!(
        "{} v{}\n\nUsage:\n  {} parse <file>\n  {} validate <file>\n  {} inject-ids <file>\n  {} response <file> [--app <context.json>]\n\nOptions:\n  --config <file.json>  load editor configuration",
        NAME, VERSION, NAME, NAME, NAME, NAME
    )
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() || args.iter().any(|a| a == "--help" || a == "-h") {
        println!("{}", usage());
        return;
    }

    if let Err(e) = run(&args) {
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }
}

/// Value following `flag`, if present
fn option<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn run(args: &[String]) -> Result<()> {
    let config = match option(args, "--config") {
        Some(path) => EditorConfig::from_json_file(path)?,
        None => EditorConfig::default(),
    };

    let command = args[0].as_str();
    let path = args
        .get(1)
        .filter(|p| !p.starts_with("--"))
        .ok_or_else(|| SyncError::InvalidInput(format!("missing <file>\n\n{}", usage())))?;
    let input = fs::read_to_string(path)?;

    let output = match command {
        "parse" => {
            let mut parser = HtmlParser::with_options(config.parser);
            serde_json::to_value(parser.parse(&input, None, None)?)?
        }
        "validate" => {
            let parser = HtmlParser::with_options(config.parser);
            let result = parser.validate(&input);
            let value = serde_json::to_value(&result)?;
            if !result.valid {
                println!("{}", serde_json::to_string_pretty(&value)?);
                std::process::exit(2);
            }
            value
        }
        "inject-ids" => {
            let mut parser = HtmlParser::with_options(config.parser);
            println!("{}", parser.inject_identifiers(&input));
            return Ok(());
        }
        "response" => {
            let response = parse_multi_page_response(&input);
            let links = match option(args, "--app") {
                Some(app_path) => {
                    let context: AppContext = serde_json::from_str(&fs::read_to_string(app_path)?)?;
                    Some(validate_inter_page_links(&response.pages, &context))
                }
                None => None,
            };
            json!({ "response": response, "links": links })
        }
        other => {
            return Err(SyncError::InvalidInput(format!(
                "unknown command `{}`\n\n{}",
                other,
                usage()
            )));
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
