use clap::{Args, Subcommand};
use serde::Serialize;

use pkgsteps::step::{OutputSpec, VariableSpec};
use pkgsteps::steps::{all_steps, find_step};

use super::CmdResult;

#[derive(Args)]
pub struct StepsArgs {
    #[command(subcommand)]
    command: StepsCommand,
}

#[derive(Subcommand)]
enum StepsCommand {
    /// List available steps
    List,
    /// Show a step's inputs and outputs
    Info {
        /// Step name
        step: String,
    },
}

#[derive(Serialize)]
pub struct StepSummary {
    pub name: &'static str,
    pub description: &'static str,
}

#[derive(Serialize)]
pub struct StepInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub input_variables: &'static [VariableSpec],
    pub output_variables: &'static [OutputSpec],
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum StepsOutput {
    List { steps: Vec<StepSummary> },
    Info(StepInfo),
}

pub fn run(args: StepsArgs) -> CmdResult<StepsOutput> {
    match args.command {
        StepsCommand::List => {
            let steps = all_steps()
                .iter()
                .map(|step| StepSummary {
                    name: step.name(),
                    description: step.description(),
                })
                .collect();
            Ok((StepsOutput::List { steps }, 0))
        }
        StepsCommand::Info { step } => {
            let step = find_step(&step)?;
            Ok((
                StepsOutput::Info(StepInfo {
                    name: step.name(),
                    description: step.description(),
                    input_variables: step.input_variables(),
                    output_variables: step.output_variables(),
                }),
                0,
            ))
        }
    }
}
