use clap::Args;

use pkgsteps::command::SystemRunner;
use pkgsteps::env::Environment;
use pkgsteps::http::ReqwestTransport;
use pkgsteps::recipe::{ensure_dir, RECIPE_CACHE_DIR};
use pkgsteps::step::{self, StepContext, StepReport, ThreadSleeper};
use pkgsteps::{paths, steps};

use super::{CmdResult, VariableArgs};

#[derive(Args)]
pub struct RunArgs {
    /// Step name (see `pkgsteps steps list`)
    pub step: String,

    /// JSON file with the starting variables
    #[arg(long, value_name = "FILE")]
    pub env: Option<String>,

    #[command(flatten)]
    pub vars: VariableArgs,
}

pub fn run(args: RunArgs) -> CmdResult<StepReport> {
    let step = steps::find_step(&args.step)?;
    let mut env = environment(&args)?;

    let transport = ReqwestTransport::new()?;
    let ctx = StepContext {
        transport: &transport,
        runner: &SystemRunner,
        sleeper: &ThreadSleeper,
    };

    let report = step::execute(step.as_ref(), &mut env, &ctx)?;
    Ok((report, 0))
}

/// Preferences, then the `--env` file, then `--set` overrides. A run without
/// a cache directory gets one named after the step.
fn environment(args: &RunArgs) -> pkgsteps::Result<Environment> {
    let mut env = args.vars.load_prefs()?;
    if let Some(path) = &args.env {
        env.merge(&Environment::from_json_file(&paths::expand(path))?);
    }
    env.merge(&args.vars.overrides()?);

    let cache_dir = match env.get_path(RECIPE_CACHE_DIR) {
        Some(dir) => dir,
        None => {
            let dir = paths::recipe_cache(&args.step)?;
            env.set(RECIPE_CACHE_DIR, dir.display().to_string());
            dir
        }
    };
    ensure_dir(&cache_dir)?;
    Ok(env)
}
