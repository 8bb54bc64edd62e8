use clap::{Parser, Subcommand};
use mquery::query::{FilterGrammar, ODataGrammar, compile_filter};
use mquery::{ParsedQuery, QueryParams, StatsRequest};

#[derive(Parser, Debug)]
#[command(name = "mquery", version, about = "HTTP query string to document-store query translator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Parse a query string and print the translated query as JSON")]
    Parse {
        #[arg(help = "Encoded query string (e.g., \"$filter=age gt 21&$top=10\")")]
        query: String,
        #[arg(long, help = "Default filter JSON merged over the parsed query (defaults win)")]
        defaults: Option<String>,
        #[arg(long, help = "Pretty-print the JSON output")]
        pretty: bool,
    },
    #[command(about = "Compile a $filter expression and print the predicate as JSON")]
    Filter {
        #[arg(help = "Filter expression (e.g., \"name eq 'bob' and age ge 21\")")]
        expression: String,
        #[arg(long, help = "Pretty-print the JSON output")]
        pretty: bool,
    },
    #[command(about = "Expand a stats request into its query and $inc update")]
    Stats {
        #[arg(help = "Request JSON with statsField, date, query and increments")]
        request: String,
        #[arg(long, help = "Pretty-print the JSON output")]
        pretty: bool,
    },
}

fn print_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<(), serde_json::Error> {
    let out =
        if pretty { serde_json::to_string_pretty(value)? } else { serde_json::to_string(value)? };
    println!("{}", out);
    Ok(())
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Parse { query, defaults, pretty } => {
            let defaults = match defaults {
                Some(s) => {
                    let value: serde_json::Value = serde_json::from_str(&s)?;
                    Some(bson::serialize_to_document(&value)?)
                }
                None => None,
            };
            let parsed = ParsedQuery::parse(&QueryParams::from_query_str(&query), defaults)?;
            print_json(&parsed, pretty)?;
        }
        Commands::Filter { expression, pretty } => {
            let predicate = compile_filter(&ODataGrammar.parse_filter(&expression)?)?;
            print_json(&predicate, pretty)?;
        }
        Commands::Stats { request, pretty } => {
            let request: StatsRequest = serde_json::from_str(&request)?;
            let plan = request.build_plan()?;
            let mut out = bson::Document::new();
            out.insert("query", plan.query.clone());
            out.insert("update", plan.update_document());
            print_json(&out, pretty)?;
        }
    }
    Ok(())
}

fn main() {
    // Logging is opt-in for the CLI; set MQUERY_LOG_DIR or MQUERY_LOG_LEVEL.
    if std::env::var_os("MQUERY_LOG_DIR").is_some()
        || std::env::var_os("MQUERY_LOG_LEVEL").is_some()
    {
        mquery::logger::configure_from_env();
    }
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
