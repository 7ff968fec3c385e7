use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{recipe, run, steps};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "pkgsteps")]
#[command(version = VERSION)]
#[command(about = "Packaging pipeline steps for Jamf Pro, Title Editor and mist")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single step against a set of variables
    Run(run::RunArgs),
    /// Run every step of a recipe in order
    Recipe(recipe::RecipeArgs),
    /// Inspect the available steps
    Steps(steps::StepsArgs),
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let (json_result, exit_code) = commands::run_json(cli.command);
    output::print_result(json_result);

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
