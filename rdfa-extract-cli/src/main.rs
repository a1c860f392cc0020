use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{LevelFilter, debug};
use rdfa_extract::{
    BoundaryQuad, BoundaryTerm, ContentType, Extractor, ListStyle, ParserOptions, SinkError, codec,
};

/// Extracts RDFa from an HTML or XHTML document.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Document to read (standard input if omitted)
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Base IRI of the document
    #[arg(long, value_name = "IRI")]
    base: String,

    /// Media type of the document, `text/html` or `application/xhtml+xml`
    #[arg(long, value_name = "TYPE", default_value = "text/html")]
    content_type: String,

    #[arg(long, value_enum, default_value_t = Format::Nquads)]
    format: Format,

    /// How `inlist` values are written: `members` or `collection`
    #[arg(long, value_name = "STYLE", default_value = "members")]
    lists: ListStyle,

    /// Log more (-v for advisories, -vv for processing detail)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum Format {
    /// One N-Quads line per quad, written as it is found
    Nquads,
    /// One JSON record per quad, written as it is found
    Json,
    /// A Turtle document, written once the whole input is processed
    Turtle,
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(match args.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        })
        .parse_default_env()
        .init();

    let bytes = match &args.input {
        Some(path) => std::fs::read(path)?,
        None => {
            let mut buf = Vec::new();
            std::io::stdin().read_to_end(&mut buf)?;
            buf
        }
    };
    debug!("read {} byte(s)", bytes.len());

    let options = ParserOptions::default().with_list_style(args.lists);
    match args.format {
        Format::Json => write_json(&args, options, &bytes),
        Format::Nquads => write_nquads(&args, options, &bytes),
        Format::Turtle => write_turtle(&args, options, &bytes),
    }
}

fn write_json(
    args: &Args,
    options: ParserOptions,
    bytes: &[u8],
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let mut out = std::io::stdout().lock();
    let outcome = Extractor::new(options).parse_bytes(
        bytes,
        &args.base,
        &args.content_type,
        &mut |subject: BoundaryTerm,
              predicate: BoundaryTerm,
              object: BoundaryTerm,
              graph: BoundaryTerm| {
            let quad = BoundaryQuad {
                subject,
                predicate,
                object,
                graph,
            };
            let line = serde_json::to_string(&quad).map_err(|e| SinkError::new(e.to_string()))?;
            writeln!(out, "{line}").map_err(|e| SinkError::new(e.to_string()))
        },
    );

    if let Some(error) = &outcome.error {
        eprintln!("Error: {error}");
    }

    Ok(if outcome.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn options_for(
    args: &Args,
    options: ParserOptions,
) -> Result<ParserOptions, Box<dyn std::error::Error>> {
    let content_type: ContentType = args.content_type.parse()?;
    Ok(ParserOptions {
        content_type,
        ..options
    })
}

fn write_nquads(
    args: &Args,
    options: ParserOptions,
    bytes: &[u8],
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let options = options_for(args, options)?;
    let base = oxiri::Iri::parse(args.base.clone())?;
    let text = codec::decode_to_string(bytes);

    let mut out = std::io::stdout().lock();
    let mut write_error = None;
    let result = rdfa_extract::extract(&text, base, &options, |quad| {
        if write_error.is_none() {
            if let Err(err) = writeln!(out, "{quad} .") {
                write_error = Some(err);
            }
        }
    });

    if let Some(err) = write_error {
        return Err(err.into());
    }

    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) => {
            eprintln!("Error: {err}");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn write_turtle(
    args: &Args,
    options: ParserOptions,
    bytes: &[u8],
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let options = options_for(args, options)?;
    let base = oxiri::Iri::parse(args.base.clone())?;
    let text = codec::decode_to_string(bytes);

    let graph = match rdfa_extract::extract_graph(&text, base, &options) {
        Ok(graph) => graph,
        Err(err) => {
            eprintln!("Error: {err}");
            return Ok(ExitCode::FAILURE);
        }
    };

    // use serializer with all known prefixes
    let serializer = rdfa_extract::initial_context_prefixes()
        .mappings()
        .filter(|(prefix, _)| !prefix.is_empty())
        .try_fold(
            oxttl::TurtleSerializer::new().with_base_iri(args.base.as_str())?,
            |serializer, (prefix, value)| serializer.with_prefix(prefix, value),
        )?;

    let mut locked_out = std::io::stdout().lock();
    let mut writer = serializer.for_writer(&mut locked_out);
    for triple in graph.iter() {
        writer.serialize_triple(triple)?;
    }

    writer.finish()?;
    Ok(ExitCode::SUCCESS)
}
