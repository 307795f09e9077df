//! status command - Show recorded version and upgrade branch state

use anyhow::{Context as _, Result};

use crate::core::config::Config;
use crate::core::generator::version_label;
use crate::core::metadata::MetadataStore;
use crate::engine::{Context, VersionProbe};
use crate::git::Git;
use crate::ui::output::format_list;

/// Display the generator version recorded for the project, the config files
/// in effect, the upgrade branch tip and any merge left in progress.
///
/// Read-only.
pub fn status(ctx: &Context) -> Result<u8> {
    let cwd = ctx
        .work_dir()
        .context("Failed to determine working directory")?;
    let git = Git::open(&cwd).context("Failed to open repository")?;
    let config = Config::load(Some(git.git_dir())).context("Failed to load configuration")?;
    let generator = config.generator();

    let store = MetadataStore::new(
        git.work_dir()?,
        generator.metadata_file.as_str(),
        generator.package.as_str(),
    );
    let source = VersionProbe::new(store)
        .resolve_source_version()
        .context("Failed to read project metadata")?;

    println!("generator:        {} ({})", generator.display_name, generator.package);
    let sources: Vec<String> = config
        .global_config_loaded_from()
        .into_iter()
        .chain(config.repo_config_loaded_from())
        .map(|path| path.display().to_string())
        .collect();
    if sources.is_empty() {
        println!("config:           defaults");
    } else {
        println!("config:           {}", sources.join(", "));
    }
    println!("recorded version: {}", version_label(source.as_ref(), false));

    match git.current_branch()? {
        Some(branch) => println!("current branch:   {}", branch),
        None => println!("current branch:   (detached)"),
    }

    let upgrade_branch = generator.upgrade_branch()?;
    match git.branch_tip(&upgrade_branch)? {
        Some(tip) => {
            let info = git.commit_info(&tip)?;
            println!(
                "upgrade branch:   {} at {} {}",
                upgrade_branch,
                tip.short(7),
                info.summary
            );
        }
        None => println!("upgrade branch:   {} (not created yet)", upgrade_branch),
    }

    let state = git.state();
    if state.is_in_progress() {
        println!("in progress:      {}", state);
        let conflicts = git.conflicted_paths()?;
        if !conflicts.is_empty() {
            println!("unresolved conflicts:");
            println!("{}", format_list(&conflicts, "  "));
        }
    }

    Ok(0)
}
