//! boilcheck CLI - compile-time SQL linting against a live schema

mod args;
mod config;
mod output;

use std::process::ExitCode;

use boilcheck_core::check::Checker;
use boilcheck_core::{driver, extract, host};
use clap::Parser;
use miette::{IntoDiagnostic, Result, WrapErr};

use crate::args::Args;
use crate::config::Config;

fn main() -> ExitCode {
    let args = Args::parse();

    // Route the debug flag through the subscriber configuration; stdout
    // stays reserved for diagnostics.
    let level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(args) {
        Ok(false) => ExitCode::SUCCESS,
        Ok(true) => ExitCode::from(1),
        Err(e) => {
            eprintln!("{e:?}");
            ExitCode::from(1)
        }
    }
}

fn run(args: Args) -> Result<bool> {
    let driver_name = driver::driver_name(&args.driver);
    let driver = driver::get_driver(&driver_name).into_diagnostic()?;

    let config = Config::from_file(&args.config)
        .wrap_err("failed to initialize config")?;
    let driver_config = config.driver_table(&driver_name)?;

    let packages = host::load_packages(&args.dir, &args.packages)
        .into_diagnostic()
        .wrap_err("failed to load packages")?;

    let mut had_errors = false;
    for package in &packages {
        for error in &package.errors {
            had_errors = true;
            println!("{error}");
        }
    }
    if args.verbose {
        for package in &packages {
            println!("package: {} ({:?})", package.name, package.path);
        }
    }
    if had_errors {
        miette::bail!("failed to load all packages specified");
    }

    let catalog = driver
        .assemble(driver_config)
        .into_diagnostic()
        .wrap_err("unable to fetch table data")?;
    if catalog.is_empty() {
        miette::bail!("no tables found in database");
    }
    let imports = driver
        .imports()
        .into_diagnostic()
        .wrap_err("failed to retrieve imports from driver")?;

    let (mut calls, mut warns) = extract::find_tagged_calls(&packages);

    for call in &mut calls {
        output::relativize(&args.dir, &mut call.pos);
    }
    for warn in &mut warns {
        output::relativize(&args.dir, &mut warn.pos);
    }

    output::print_warnings(&warns);

    let checker = Checker::new(&catalog, &imports);
    let diags = checker.check_calls(&calls);

    output::print_diagnostics(&packages, &calls, &diags, args.verbose);

    Ok(!diags.is_empty())
}
