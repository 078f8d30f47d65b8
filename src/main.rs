use std::{collections::HashMap, fs::File};

use anyhow::{bail, Context, Result};
use clap::Parser;
use xmlchunk::{Mode, SelectorSplitter};

/// Extract selector-matched elements from an XML document as standalone
/// fragments
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Selector path, e.g. `/catalog/item' or `//gml:featureMember'
    #[arg(short, long)]
    path: String,

    /// Namespace binding in the form `prefix=uri' (repeatable); use `=uri'
    /// to bind the empty prefix
    #[arg(short = 'n', long = "namespace")]
    namespaces: Vec<String>,

    /// Wrap each fragment in its ancestor elements instead of injecting
    /// inherited namespace declarations
    #[arg(short, long)]
    wrap: bool,

    /// The XML file to split
    #[arg(name = "FILE")]
    file: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let mut bindings = HashMap::new();
    for ns in &cli.namespaces {
        match ns.split_once('=') {
            Some((prefix, uri)) => {
                bindings.insert(prefix.to_string(), uri.to_string());
            }
            None => bail!("Invalid namespace binding: `{ns}' (expected `prefix=uri')"),
        }
    }

    let mode = if cli.wrap { Mode::Wrap } else { Mode::Inject };
    let file =
        File::open(&cli.file).with_context(|| format!("Unable to open `{}'", cli.file))?;

    let splitter = SelectorSplitter::from_path(&cli.path, Some(&bindings), mode, file)?;
    for chunk in splitter {
        println!("{}", chunk?);
    }

    Ok(())
}
