use anyhow::{anyhow, Context, Result};
use promiscuity::sample::example_dataset;
use promiscuity::{calculate_results, Config, Promiscuity};
use serde::Serialize;
use std::{env, fs, io};

#[derive(Serialize)]
struct ItemSummary {
    id: String,
    i: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    j: Option<String>,
}

#[derive(Serialize)]
struct ResultSummary {
    item_count: usize,
    dset: String,
    items: Vec<ItemSummary>,
}

fn usage() {
    eprintln!(
        "Usage:\n  \
  promiscuity_cli --version\n  \
  promiscuity_cli calc FILE\n  \
  promiscuity_cli summary FILE\n  \
  promiscuity_cli example\n\n  \
  FILE is a delimited-text or spreadsheet activity table; a column whose\n  \
  header contains 'fingerprint' or 'cid' selects the descriptors.\n  \
  'calc' and 'example' write result rows as CSV to stdout,\n  \
  'summary' writes them as JSON"
    );
}

fn write_rows(rows: &[Vec<String>]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(io::stdout());
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("could not serialize JSON output")?;
    println!("{text}");
    Ok(())
}

fn summarize(rows: &[Vec<String>]) -> ResultSummary {
    let Some((dset_row, item_rows)) = rows.split_last() else {
        return ResultSummary {
            item_count: 0,
            dset: String::new(),
            items: Vec::new(),
        };
    };
    ResultSummary {
        item_count: item_rows.len(),
        dset: dset_row.get(1).cloned().unwrap_or_default(),
        items: item_rows
            .iter()
            .map(|row| ItemSummary {
                id: row.first().cloned().unwrap_or_default(),
                i: row.get(1).cloned().unwrap_or_default(),
                j: row.get(2).cloned(),
            })
            .collect(),
    }
}

fn read_file(args: &[String], command: &str) -> Result<Vec<u8>> {
    let path = args
        .get(2)
        .ok_or_else(|| anyhow!("'{command}' needs a FILE argument"))?;
    fs::read(path).with_context(|| format!("could not read '{path}'"))
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let config = Config::default();
    match args.get(1).map(String::as_str) {
        Some("--version") => {
            println!("promiscuity_cli {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Some("calc") => {
            let bytes = read_file(&args, "calc")?;
            write_rows(&calculate_results(&bytes, &config)?)
        }
        Some("summary") => {
            let bytes = read_file(&args, "summary")?;
            let rows = calculate_results(&bytes, &config)?;
            print_json(&summarize(&rows))
        }
        Some("example") => {
            let (ids, activity) = example_dataset();
            write_rows(&Promiscuity::new(ids, activity, None).result_rows())
        }
        _ => {
            usage();
            Err(anyhow!("missing or unknown command"))
        }
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}
