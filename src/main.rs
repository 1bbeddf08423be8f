use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::Level;

use peview::{Image, Options};

#[derive(Parser)]
#[command(name = "peview")]
#[command(about = "Decodes the headers, sections and resources of a PE image", long_about = None)]
struct Cli {
	/// Input executable
	#[arg(value_name = "EXE")]
	path: PathBuf,

	/// JSON options file; command line flags take precedence
	#[arg(short, long, value_name = "FILE")]
	options: Option<PathBuf>,

	/// Trace every read as `offset -> value`
	#[arg(short, long)]
	debug: bool,

	/// Skip the resource directory tree
	#[arg(long)]
	no_resources: bool,

	/// Don't decode version-info resources
	#[arg(long)]
	no_version_info: bool,

	/// Print the decoded image as JSON
	#[arg(long)]
	json: bool,
}

fn main() -> Result<()> {
	let cli = Cli::parse();

	let mut options = match &cli.options {
		Some(path) => Options::load(path)
			.with_context(|| format!("reading options from {}", path.display()))?,
		None => Options::default(),
	};
	options.debug |= cli.debug;
	options.decode_resources &= !cli.no_resources;
	options.decode_version_info &= !cli.no_version_info;

	tracing_subscriber::fmt()
		.with_target(false)
		.with_level(true)
		.with_writer(std::io::stderr)
		.with_max_level(if options.debug { Level::DEBUG } else { Level::INFO })
		.init();

	let image = Image::from_path(&cli.path, options)
		.with_context(|| format!("decoding {}", cli.path.display()))?;

	if cli.json {
		println!("{}", serde_json::to_string_pretty(&image)?);
	} else {
		println!("{:#?}", image);
	}

	Ok(())
}
