//! `grokdock tags`: Print the version tags of this build.

use clap::Args;
use grokdock_pipeline::version::resolve_version;

use super::VersionArgs;

/// Arguments for the `tags` command.
#[derive(Args, Debug)]
pub struct TagsArgs {
    /// Version inputs.
    #[command(flatten)]
    pub version: VersionArgs,

    /// Print a JSON object instead of space-separated tags.
    #[arg(long)]
    pub json: bool,
}

/// Executes the `tags` command.
///
/// # Errors
///
/// Returns an error if the version cannot be derived.
pub fn execute(args: &TagsArgs) -> anyhow::Result<()> {
    let tags = args.version.tags()?;
    if args.json {
        let info = resolve_version(args.version.git_ref.as_deref(), args.version.tag.as_deref())?;
        let value = serde_json::json!({
            "version": info.as_ref().map(|i| i.version.as_str()),
            "short_version": info.as_ref().map(|i| i.short_version.as_str()),
            "release": tags.is_release(),
            "tags": tags.tags(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{tags}");
    }
    Ok(())
}
