use clap::Args;

use pkgsteps::command::SystemRunner;
use pkgsteps::http::ReqwestTransport;
use pkgsteps::pipeline::{self, PipelineRunResult};
use pkgsteps::recipe::Recipe;
use pkgsteps::step::{StepContext, ThreadSleeper};
use pkgsteps::paths;

use super::{CmdResult, VariableArgs};

#[derive(Args)]
pub struct RecipeArgs {
    /// Recipe file (.json, or .plist / .recipe property list)
    pub file: String,

    #[command(flatten)]
    pub vars: VariableArgs,
}

pub fn run(args: RecipeArgs) -> CmdResult<PipelineRunResult> {
    let recipe = Recipe::load(&paths::expand(&args.file))?;
    let steps = pipeline::plan(&recipe)?;

    let prefs = args.vars.load_prefs()?;
    let overrides = args.vars.overrides()?;
    let mut env = recipe.environment(&prefs, &overrides)?;

    let transport = ReqwestTransport::new()?;
    let ctx = StepContext {
        transport: &transport,
        runner: &SystemRunner,
        sleeper: &ThreadSleeper,
    };

    let result = pipeline::run(recipe.identifier(), steps, &mut env, &ctx);
    let exit_code = if result.summary.failed > 0 { 1 } else { 0 };
    Ok((result, exit_code))
}
