use anyhow::{Context, Result};
use log::warn;
use std::path::Path;
use std::sync::Arc;
use story2book::core::config::Config;
use story2book::core::error::GenerateError;
use story2book::core::story::{split_pages, StoryInput, Storybook};
use story2book::services::backend::{BackendClient, HttpBackend};
use story2book::services::orchestrator::Orchestrator;
use story2book::services::presenter;
use story2book::services::progress::{NullSink, ProgressSink, TermProgress};
use story2book::services::render::{self, Viewer};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    // 1. Load config and prepare the output folder
    let first_run = !Path::new("config.yml").exists();
    let config = Config::load()?;
    config.ensure_directories()?;
    if first_run {
        // Leave an editable config behind so the defaults are visible.
        if let Err(e) = config.save() {
            warn!("could not write default config.yml: {e:#}");
        }
    }

    // 2. Connect to the backend
    let backend = Arc::new(HttpBackend::new(&config.backend_url)?);
    if let Err(e) = backend.health().await {
        warn!("backend health check failed: {e}");
        println!(
            "⚠ Backend at {} is not answering yet; generation may fail.",
            config.backend_url
        );
    }

    // 3. Story text from a file argument, or prompted interactively
    let story_file = std::env::args().nth(1);

    loop {
        let input = match gather_input(story_file.as_deref()) {
            Some(input) => input,
            None => {
                if story_file.is_some() {
                    std::process::exit(1);
                }
                break;
            }
        };

        let failed = run_session(&config, backend.clone(), &input).await.is_err();

        // One story per invocation when scripted; otherwise the input
        // prompt stays reachable after success and failure alike.
        if config.unattended || story_file.is_some() {
            if failed {
                std::process::exit(1);
            }
            break;
        }
        let again_prompt = if failed {
            "Try again with another story?"
        } else {
            "Create another storybook?"
        };
        match inquire::Confirm::new(again_prompt).with_default(failed).prompt() {
            Ok(true) => continue,
            _ => break,
        }
    }

    Ok(())
}

fn gather_input(story_file: Option<&str>) -> Option<StoryInput> {
    if let Some(path) = story_file {
        return match read_story_file(path) {
            Ok(input) => Some(input),
            Err(e) => {
                eprintln!("❌ {e:#}");
                None
            }
        };
    }

    let title = inquire::Text::new("Story title (blank for default):")
        .prompt()
        .ok()?;
    let text = inquire::Editor::new("Write your story, one page per paragraph:")
        .with_help_message("Separate pages with blank lines. Maximum 15 pages.")
        .prompt()
        .ok()?;

    Some(StoryInput::new(Some(title), text))
}

fn read_story_file(path: &str) -> Result<StoryInput> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read story file {path}"))?;
    let title = Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().replace('_', " "));
    Ok(StoryInput::new(title, text))
}

async fn run_session(
    config: &Config,
    backend: Arc<HttpBackend>,
    input: &StoryInput,
) -> Result<(), GenerateError> {
    // Validate before showing any progress UI or touching the network.
    let pages = match split_pages(&input.text, config.max_pages) {
        Ok(pages) => pages,
        Err(e) => {
            presenter::present(&e);
            return Err(e);
        }
    };

    let orchestrator = Orchestrator::from_config(config, backend.clone());

    let term = if config.unattended {
        None
    } else {
        TermProgress::new()
            .map_err(|e| warn!("progress bar unavailable: {e}"))
            .ok()
    };
    let sink: &dyn ProgressSink = match &term {
        Some(t) => t,
        None => &NullSink,
    };

    let result = orchestrator.run(input, pages, sink).await;
    if let Some(t) = &term {
        match &result {
            Ok(_) => t.finish("done"),
            Err(_) => t.abandon(),
        }
    }

    finish_session(config, backend, result).await
}

async fn finish_session(
    config: &Config,
    backend: Arc<HttpBackend>,
    book: Result<Storybook, GenerateError>,
) -> Result<(), GenerateError> {
    let book = match book {
        Ok(book) => book,
        Err(e) => {
            presenter::present(&e);
            return Err(e);
        }
    };

    println!("\n📖 {}", book.title);
    match book.generation_time {
        Some(secs) => println!("{} pages, generated in {secs:.1}s", book.pages.len()),
        None => println!("{} pages", book.pages.len()),
    }

    let rendered = render::materialize(
        &book,
        backend.as_ref(),
        backend.base(),
        Path::new(&config.output_folder),
    )
    .await;

    if config.unattended {
        print!("{}", render::render_book(&book.title, &rendered));
    } else {
        viewer_loop(&book.title, &rendered);
    }
    Ok(())
}

fn viewer_loop(title: &str, pages: &[render::RenderedPage]) {
    if pages.is_empty() {
        return;
    }
    let mut viewer = Viewer::new(pages.len());

    loop {
        let page = &pages[viewer.current()];
        println!("\n{}", render::render_page(page, pages.len()));
        println!("{}", render::thumbnail_strip(&viewer, pages));

        let mut options = Vec::new();
        if !viewer.at_start() {
            options.push("Previous page");
        }
        if !viewer.at_end() {
            options.push("Next page");
        }
        options.push("Jump to page");
        options.push("Show all pages");
        options.push("Done");

        let choice = match inquire::Select::new("Navigate:", options).prompt() {
            Ok(choice) => choice,
            Err(_) => return,
        };

        match choice {
            "Previous page" => viewer.previous(),
            "Next page" => viewer.next(),
            "Jump to page" => {
                let answer = inquire::Text::new("Page number:").prompt();
                if let Ok(answer) = answer {
                    match answer.trim().parse::<u32>() {
                        Ok(n) if viewer.jump(n) => {}
                        _ => println!("No page {answer} in this book."),
                    }
                }
            }
            "Show all pages" => {
                // Flat scroll of everything, then back to the viewer.
                print!("{}", render::render_book(title, pages));
            }
            _ => return,
        }
    }
}
