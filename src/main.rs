use clap::Parser;

use coursegen::app::App;
use coursegen::cli::{Args, Command};
use coursegen::config::Config;
use coursegen::errors::Result;
use coursegen::pipeline::Created;
use coursegen::{log, ux};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    log::init_tracing();
    let args = Args::parse();
    let cfg = Config::load(&args)?;

    let outcome = match App::from_config(cfg) {
        Ok(app) => run(&app, &args).await,
        Err(e) => Err(e),
    };
    if let Err(e) = outcome {
        tracing::error!(error = %e, "command failed");
        ux::show_error(&e);
        std::process::exit(1);
    }
    Ok(())
}

async fn run(app: &App, args: &Args) -> Result<()> {
    let owner = args.user.as_str();
    match &args.command {
        Command::Create { prompt, detach } => {
            let pb = ux::spinner("validating request and writing course metadata");
            let created = app.create_course(owner, prompt).await;
            pb.finish_and_clear();
            finish_structure(created?, *detach).await;
        }
        Command::Regenerate { slug } => {
            finish_structure(app.regenerate_structure(owner, slug)?, false).await;
        }
        Command::List { page, limit, search } => {
            ux::show_listing(&app.list_courses(owner, *page, *limit, search)?);
        }
        Command::Stats { page, limit } => {
            ux::show_stats(&app.list_courses_with_stats(owner, *page, *limit)?);
        }
        Command::View { slug } => ux::show_course_tree(&app.view_course(owner, slug)?),
        Command::Modules { slug } => ux::show_modules(&app.list_modules(owner, slug)?),
        Command::Delete { slug } => {
            app.delete_course(owner, slug)?;
            println!("deleted {slug}");
        }
        Command::Lesson { course, module, lesson } => {
            let pb = ux::spinner("loading lesson");
            let view = app.open_lesson(owner, course, module, lesson).await;
            pb.finish_and_clear();
            ux::show_lesson(&view?);
        }
        Command::Complete { course, module, lesson, undo } => {
            ux::show_rollup(&app.set_lesson_completion(owner, course, module, lesson, !undo)?);
        }
        Command::Videos { query } => ux::show_videos(&app.search_videos(query).await?),
    }
    Ok(())
}

/// Show the shell, then keep the process alive until the background
/// structure task ends. `quiet` skips the spinner and outcome line.
async fn finish_structure(created: Created, quiet: bool) {
    ux::show_created(&created.course);
    let slug = created.course.slug.clone();
    if quiet {
        created.task.wait().await;
        return;
    }
    let pb = ux::spinner("generating modules and lessons");
    let outcome = created.task.wait().await;
    pb.finish_and_clear();
    ux::show_outcome(&slug, &outcome);
}
