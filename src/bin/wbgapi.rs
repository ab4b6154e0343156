use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::path::PathBuf;
use wbgapi::coder::AliasTable;
use wbgapi::data::DataRequest;
use wbgapi::{Client, Config, Param};

#[derive(Parser, Debug)]
#[command(
    name = "wbgapi",
    version,
    about = "Query World Bank databases: data, dimension names and economy codes"
)]
struct Cli {
    /// API root (overrides WBGAPI_ENDPOINT).
    #[arg(long, global = true)]
    endpoint: Option<String>,
    /// Response language (overrides WBGAPI_LANG).
    #[arg(long, global = true)]
    lang: Option<String>,
    /// Database id, e.g. 2 for WDI (overrides WBGAPI_DB).
    #[arg(long, global = true)]
    db: Option<u32>,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch observations.
    Data(DataArgs),
    /// Resolve economy names to codes.
    Code(CodeArgs),
    /// List the dimensions of a database.
    Concepts,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutFormat {
    /// One JSON object per line.
    Lines,
    /// A single JSON array.
    Json,
}

#[derive(Args, Debug)]
struct DataArgs {
    /// Series codes separated by comma or semicolon (e.g., SP.POP.TOTL)
    #[arg(short, long)]
    series: String,
    /// Economy codes separated by comma or semicolon (default: all)
    #[arg(short, long)]
    economy: Option<String>,
    /// Year, list of years, or inclusive range YYYY:YYYY
    #[arg(short, long)]
    time: Option<String>,
    /// Most recent N values
    #[arg(long)]
    mrv: Option<u32>,
    /// Most recent N non-empty values
    #[arg(long)]
    mrnev: Option<u32>,
    #[arg(long, default_value_t = false)]
    skip_blanks: bool,
    #[arg(long, default_value_t = false)]
    skip_aggs: bool,
    /// Include dimension names next to ids.
    #[arg(long, default_value_t = false)]
    labels: bool,
    /// Report time as 2015 instead of YR2015 where possible.
    #[arg(long, default_value_t = false)]
    numeric_time: bool,
    #[arg(long, value_enum, default_value_t = OutFormat::Lines)]
    format: OutFormat,
    /// Write to a file instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct CodeArgs {
    /// Names to resolve
    #[arg(required = true)]
    names: Vec<String>,
    /// Only show names that did not resolve or differ from the official name.
    #[arg(long, default_value_t = false)]
    summary: bool,
    /// JSON alias table to use instead of the bundled one.
    #[arg(long)]
    aliases: Option<PathBuf>,
}

fn parse_list(s: &str) -> Vec<String> {
    s.split([',', ';'])
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

fn list_param(s: &str) -> Param {
    let items = parse_list(s);
    match items.len() {
        1 => Param::from(items[0].as_str()),
        _ => Param::from(items),
    }
}

fn parse_time(s: &str) -> Result<Param> {
    if let Some((a, b)) = s.split_once(':') {
        let start: i32 = a.trim().parse().context("invalid --time range start")?;
        let end: i32 = b.trim().parse().context("invalid --time range end")?;
        if end < start {
            anyhow::bail!("invalid --time range {s}: end before start");
        }
        return Ok(Param::from(start..=end));
    }
    Ok(list_param(s))
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = Config::from_env().context("reading WBGAPI_* environment")?;
    if let Some(endpoint) = cli.endpoint {
        config.endpoint = endpoint.trim_end_matches('/').to_string();
    }
    if let Some(lang) = cli.lang {
        config.lang = lang;
    }
    if let Some(db) = cli.db {
        config.db = db;
    }

    match cli.cmd {
        Command::Data(args) => cmd_data(config, args),
        Command::Code(args) => cmd_code(config, args),
        Command::Concepts => cmd_concepts(config),
    }
}

fn cmd_data(config: Config, args: DataArgs) -> Result<()> {
    let client = Client::new(config).context("building HTTP client")?;
    let mut req = DataRequest::new(list_param(&args.series))
        .skip_blanks(args.skip_blanks)
        .skip_aggs(args.skip_aggs)
        .labels(args.labels)
        .numeric_time_keys(args.numeric_time);
    if let Some(e) = &args.economy {
        req = req.economy(list_param(e));
    }
    if let Some(t) = &args.time {
        req = req.time(parse_time(t)?);
    }
    if let Some(n) = args.mrv {
        req = req.mrv(n);
    }
    if let Some(n) = args.mrnev {
        req = req.mrnev(n);
    }

    let mut sink: Box<dyn Write> = match &args.out {
        Some(path) => Box::new(std::io::BufWriter::new(
            std::fs::File::create(path).with_context(|| format!("create {}", path.display()))?,
        )),
        None => Box::new(std::io::stdout().lock()),
    };

    let mut count = 0usize;
    match args.format {
        OutFormat::Lines => {
            for rec in client.data(&req)? {
                serde_json::to_writer(&mut sink, &rec?)?;
                writeln!(sink)?;
                count += 1;
            }
        }
        OutFormat::Json => {
            let records = client.data(&req)?.collect::<wbgapi::Result<Vec<_>>>()?;
            count = records.len();
            serde_json::to_writer_pretty(&mut sink, &records)?;
            writeln!(sink)?;
        }
    }
    sink.flush()?;
    if let Some(path) = &args.out {
        eprintln!("Saved {} rows to {}", count, path.display());
    }
    Ok(())
}

fn cmd_code(config: Config, args: CodeArgs) -> Result<()> {
    let mut client = Client::new(config).context("building HTTP client")?;
    if let Some(path) = &args.aliases {
        let table = AliasTable::from_path(path)
            .with_context(|| format!("loading alias table {}", path.display()))?;
        client = client.with_aliases(table);
    }
    let resolution = client.code_many(&args.names)?;
    let resolution = if args.summary {
        resolution.summary()
    } else {
        resolution
    };
    print!("{resolution}");
    Ok(())
}

fn cmd_concepts(config: Config) -> Result<()> {
    let client = Client::new(config).context("building HTTP client")?;
    let info = client.concepts(None)?;
    println!("database {}", info.db);
    for d in &info.dimensions {
        println!("{:<12} {:<24} {}", d.canonical, d.key, d.name);
    }
    Ok(())
}
