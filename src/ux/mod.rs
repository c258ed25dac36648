use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::app::Listing;
use crate::errors::CourseError;
use crate::lesson::{LessonRef, LessonView};
use crate::pipeline::StructureOutcome;
use crate::progress::Rollup;
use crate::store::{CourseRecord, CourseStats, CourseTree, GenerationStatus, ModuleTree};
use crate::wire::ContentBlock;

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg} {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

fn status_label(status: GenerationStatus) -> colored::ColoredString {
    match status {
        GenerationStatus::Pending => "[PENDING]".yellow().bold(),
        GenerationStatus::Ready => "[READY]".green().bold(),
        GenerationStatus::Failed => "[FAILED]".red().bold(),
    }
}

fn check(done: bool) -> colored::ColoredString {
    if done { "✓".green() } else { "·".dimmed() }
}

pub fn show_created(course: &CourseRecord) {
    println!("\n{} {}", "Created".green().bold(), course.title.bold());
    println!("  slug: {}", course.slug);
    println!("  intent: {}", course.intent_category);
    if !course.tags.is_empty() {
        println!("  tags: {}", course.tags.join(", "));
    }
    println!("  {}", course.description);
}

pub fn show_outcome(slug: &str, outcome: &StructureOutcome) {
    match outcome {
        StructureOutcome::Ready(s) => println!(
            "{} {} modules, {} lessons",
            "Structure ready:".green().bold(),
            s.modules,
            s.lessons
        ),
        StructureOutcome::TimedOut => println!(
            "{} structure generation timed out; retry with `coursegen regenerate {slug}`",
            "[FAILED]".red().bold()
        ),
        StructureOutcome::Failed(e) => println!(
            "{} {e}; retry with `coursegen regenerate {slug}`",
            "[FAILED]".red().bold()
        ),
        StructureOutcome::Discarded(e) => {
            println!("{} {e}; the course was removed", "[FAILED]".red().bold())
        }
        StructureOutcome::Superseded => println!(
            "{} another run already built this course; see `coursegen view {slug}`",
            "[SKIPPED]".yellow().bold()
        ),
    }
}

pub fn show_course_tree(tree: &CourseTree) {
    let c = &tree.course;
    println!("\n{}  {}", c.title.bold(), status_label(c.generation_status));
    println!("{}", c.description);
    println!(
        "{}",
        format!("{} · {} · {}", c.intent_category, c.estimated_duration, c.target_audience.join(", ")).dimmed()
    );
    if tree.modules.is_empty() {
        println!("(no modules)");
        return;
    }
    show_modules(&tree.modules);
}

pub fn show_modules(modules: &[ModuleTree]) {
    for m in modules {
        println!(
            "\n{} {}. {}  {}",
            check(m.module.is_completed),
            m.module.order,
            m.module.title.bold(),
            m.module.slug.dimmed()
        );
        for l in &m.lessons {
            println!(
                "    {} {}. {}  {}  {}",
                check(l.is_completed),
                l.order,
                l.title,
                format!("{}m", l.estimated_minutes).dimmed(),
                l.slug.dimmed()
            );
        }
    }
    println!();
}

pub fn show_listing(list: &Listing<CourseRecord>) {
    if list.courses.is_empty() {
        println!("(no courses)");
    }
    for c in &list.courses {
        println!("{}  {}  {}", status_label(c.generation_status), c.title.bold(), c.slug.dimmed());
    }
    show_page(list.pagination.page, list.pagination.total_pages, list.pagination.total);
}

pub fn show_stats(list: &Listing<CourseStats>) {
    if list.courses.is_empty() {
        println!("(no courses)");
    }
    for s in &list.courses {
        println!(
            "{:>3}%  {}  {}/{} lessons, {}/{} modules  {}",
            s.progress,
            s.course.title.bold(),
            s.completed_lessons,
            s.total_lessons,
            s.completed_modules,
            s.total_modules,
            s.course.slug.dimmed()
        );
    }
    show_page(list.pagination.page, list.pagination.total_pages, list.pagination.total);
}

fn show_page(page: i64, total_pages: i64, total: i64) {
    println!("{}", format!("page {page}/{total_pages} ({total} total)").dimmed());
}

pub fn show_lesson(view: &LessonView) {
    println!("\n{} › {}", view.course_title.dimmed(), view.module_title.dimmed());
    println!("{}\n", view.lesson.title.bold().underline());

    let blocks: Vec<ContentBlock> = view
        .lesson
        .content
        .clone()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default();
    for (i, block) in blocks.iter().enumerate() {
        show_block(i, block);
    }

    if !view.lesson.yt_videos.is_empty() {
        println!("{}", "Videos".bold());
        for id in &view.lesson.yt_videos {
            println!("  https://www.youtube.com/watch?v={id}");
        }
        println!();
    }
    show_nav("previous", view.navigation.previous.as_ref());
    show_nav("next", view.navigation.next.as_ref());
}

fn show_block(i: usize, block: &ContentBlock) {
    match block {
        ContentBlock::Heading { text } => println!("{}\n", text.cyan().bold()),
        ContentBlock::Paragraph { text } => println!("{text}\n"),
        ContentBlock::Code { language, text } => {
            println!("{}", format!("```{language}").dimmed());
            println!("{}", text.yellow());
            println!("{}\n", "```".dimmed());
        }
        ContentBlock::List { items, ordered } => {
            for (n, item) in items.iter().enumerate() {
                if *ordered {
                    println!("  {}. {item}", n + 1);
                } else {
                    println!("  - {item}");
                }
            }
            println!();
        }
        ContentBlock::Video { query } => println!("{} {}\n", "[VIDEO]".magenta().bold(), query),
        ContentBlock::Mcq { question, options, answer, explanation } => {
            println!("{} {question}", format!("Q{}.", i + 1).bold());
            for (n, opt) in options.iter().enumerate() {
                let marker = if n == *answer { "*".green() } else { " ".normal() };
                println!("   {marker} {}) {opt}", (b'a' + (n % 26) as u8) as char);
            }
            if !explanation.is_empty() {
                println!("   {}", explanation.dimmed());
            }
            println!();
        }
    }
}

fn show_nav(label: &str, target: Option<&LessonRef>) {
    match target {
        Some(t) => println!("{label}: {} {}", t.module_slug, t.lesson_slug),
        None => println!("{label}: {}", "-".dimmed()),
    }
}

pub fn show_rollup(r: &Rollup) {
    println!(
        "lesson {}  module {}  course {}",
        check(r.lesson_completed),
        check(r.module_completed),
        check(r.course_completed)
    );
}

pub fn show_videos(ids: &[String]) {
    if ids.is_empty() {
        println!("(no videos)");
    }
    for id in ids {
        println!("https://www.youtube.com/watch?v={id}");
    }
}

/// The caller-facing error body as pretty JSON on stderr.
pub fn show_error(err: &CourseError) {
    let body = err.to_body();
    let json = serde_json::to_string_pretty(&body).unwrap_or_else(|_| body.message.clone());
    eprintln!("{}", json.red());
}
