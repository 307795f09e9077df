//! upgrade command - Regenerate at a newer generator version and merge

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};

use crate::cli::args::UpgradeArgs;
use crate::core::config::Config;
use crate::engine::{Context, ProcessRegenerator, UpgradeOptions, UpgradeOrchestrator};
use crate::git::Git;
use crate::ui::output::Verbosity;
use crate::ui::report::ConflictReporter;

/// Run an upgrade and report the outcome.
///
/// Returns the exit code: 0 clean, 1 conflicted, 2 failed. Only failures to
/// set the run up (no repository, bad config) come back as `Err`.
pub fn upgrade(ctx: &Context, args: &UpgradeArgs) -> Result<u8> {
    let cwd = ctx
        .work_dir()
        .context("Failed to determine working directory")?;
    let git = Git::open(&cwd).context("Failed to open repository")?;
    let config = Config::load(Some(git.git_dir())).context("Failed to load configuration")?;
    let generator = config.generator();

    let silent = args.silent || config.silent();
    let verbosity = Verbosity::from_flags(ctx.quiet, ctx.debug);
    let report_verbosity = if silent { Verbosity::Quiet } else { verbosity };

    let executable = args
        .regenerate_executable
        .as_deref()
        .map(|path| absolutize(&cwd, path));
    let regenerator = ProcessRegenerator::new(generator.clone()).with_executable(executable);

    let options = UpgradeOptions {
        target: args.target_version.clone(),
        force: args.force,
        silent,
        use_version_placeholders: args.use_version_placeholders,
    };

    let mut orchestrator =
        UpgradeOrchestrator::new(&git, &generator, &regenerator).with_verbosity(verbosity);
    let reporter = ConflictReporter::new(report_verbosity);

    let code = match orchestrator.run(&options) {
        Ok(report) => reporter.report(&report),
        Err(err) => reporter.report_failure(&err, &orchestrator.failure_context()),
    };
    Ok(code)
}

fn absolutize(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}
