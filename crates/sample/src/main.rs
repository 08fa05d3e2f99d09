//! Sample aggregated API server serving the `wardle.example.com` group.
//!
//! Builds the resource set, resolves options from flags and an optional TOML file, and reports
//! the API surface it would serve.

mod apis;
mod runner;

use clap::Parser;
use tracing::info;

use apiary_builder::ServeArgs;
use apiary_resource::VersionOrder;

/// Sample server command line arguments.
#[derive(Parser, Debug)]
#[command(name = "apiary-sample")]
#[command(about = "Sample aggregated API server for the wardle.example.com group")]
struct Cli {
	#[command(flatten)]
	serve: ServeArgs,

	/// Version ordering used to pick each group's preferred version
	#[arg(long, value_name = "ORDER", default_value = "kube-aware")]
	version_order: VersionOrder,

	/// Verbose logging
	#[arg(short, long)]
	verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
	let cli = Cli::parse();

	setup_tracing(cli.verbose);

	info!(order = ?cli.version_order, "building apiserver");

	let mut runner = runner::ReportRunner::new(std::io::stdout().lock());
	apis::server(cli.version_order).execute(&cli.serve, &mut runner)?;

	Ok(())
}

fn setup_tracing(verbose: bool) {
	use tracing_subscriber::EnvFilter;
	use tracing_subscriber::prelude::*;

	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
		if verbose {
			EnvFilter::new("apiary_builder=debug,apiary_sample=debug,info")
		} else {
			EnvFilter::new("info")
		}
	});

	tracing_subscriber::registry()
		.with(filter)
		.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(true))
		.init();
}
