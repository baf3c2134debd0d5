//! Edit command handler: the guarded agent view.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use imagent_core::api::{self, AgentClient};
use imagent_core::config::Config;
use imagent_core::images::{self, ImageInput};
use imagent_core::routes::{self, Navigation, Route};
use imagent_core::run::{AgentRun, OutputImage, RunStatus, Step};
use imagent_core::session::SessionStore;

pub async fn run(config: &Config, prompt: &str, image: &str, output: Option<&str>) -> Result<()> {
    let session = SessionStore::open_default()?;
    match routes::resolve(Route::Agent, &session) {
        Navigation::RedirectToLogin => {
            bail!("the agent requires an account; run `imagent login` first")
        }
        Navigation::Render(_) => {}
    }

    let input_path = images::normalize_input_path(image);
    let input = ImageInput::from_path(&input_path)?;

    let base_url = api::resolve_base_url(config.base_url.as_deref())?;
    let client = AgentClient::new(base_url).with_token(session.token().map(str::to_string));

    let mut agent_run = AgentRun::new(client);
    agent_run
        .submit_with(prompt, Some(&input), print_step)
        .await?;

    if agent_run.status() == RunStatus::Failed {
        bail!("agent run failed");
    }

    match agent_run.output_image() {
        Some(edited) => {
            let out_path = output
                .map(PathBuf::from)
                .unwrap_or_else(|| default_output_path(&input_path, edited));
            fs::write(&out_path, edited.decode_bytes()?)
                .with_context(|| format!("failed to write {}", out_path.display()))?;
            println!("Wrote edited image to {}", out_path.display());
        }
        None => println!("The agent did not return an edited image."),
    }

    Ok(())
}

fn print_step(step: &Step) {
    println!("[{}] {}", step.kind.label(), step.content);
}

/// `photo.png` → `photo-edited.<ext>` next to the input.
fn default_output_path(input: &Path, image: &OutputImage) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let ext = images::extension_for_mime(&image.format).unwrap_or("png");
    input.with_file_name(format!("{stem}-edited.{ext}"))
}
