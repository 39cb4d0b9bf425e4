//! One-shot subcommands working on a project file.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use chrono::Utc;

use crate::cli::{ChapterArgs, ExportArgs, OutlineArgs, ProviderArgs, StatsArgs};
use crate::config::ProviderSettings;
use crate::error::Error;
use crate::export::{self, ExportOptions};
use crate::gateway::ProviderGateway;
use crate::outline::BookDetails;
use crate::project::{self, ProjectFile};
use crate::prompts::{ChapterLength, ChapterRequest};
use crate::wizard::Session;

/// Session with the provider from `args` saved as its configuration.
pub fn configured_session(args: &ProviderArgs) -> anyhow::Result<(Session, ProviderGateway)> {
    let settings = ProviderSettings::from_args(args).context("provider settings")?;
    let model = settings.config(args.provider).model.clone();
    let mut session = Session::new(settings);
    session
        .save_configuration(args.provider, &model)
        .context("save configuration")?;
    let gateway = ProviderGateway::new(session.providers().active().clone())?;
    Ok((session, gateway))
}

fn unconfigured_session() -> anyhow::Result<Session> {
    let settings =
        ProviderSettings::from_args(&ProviderArgs::default()).context("provider settings")?;
    Ok(Session::new(settings))
}

/// Prints the provider text next to an unparseable outline so it can be salvaged by hand.
fn report_raw(err: Error) -> Error {
    if let Some(raw) = err.raw_response() {
        eprintln!("raw provider response:\n{raw}");
    }
    err
}

pub async fn outline(args: OutlineArgs) -> anyhow::Result<()> {
    let (mut session, gateway) = configured_session(&args.provider)?;
    let details = BookDetails {
        title: args.title,
        theme: args.theme,
        audience: args.audience,
        style: args.style,
        goals: args.goals,
    };
    let out = args
        .out
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(project::default_file_name(&details.title)));
    if !args.force && out.exists() {
        anyhow::bail!(
            "project file already exists (use --force to overwrite): {}",
            out.display()
        );
    }

    let outline = session
        .generate_outline(&gateway, details)
        .await
        .map_err(report_raw)
        .context("generate outline")?;
    println!("{}", outline.title);
    for chapter in &outline.chapters {
        println!("{:>2}. {}", chapter.number, chapter.title);
    }

    session
        .to_project(Utc::now())?
        .save(&out, args.force)
        .context("save project")?;
    println!("wrote {}", out.display());
    Ok(())
}

pub async fn chapter(args: ChapterArgs) -> anyhow::Result<()> {
    let path = Path::new(&args.project);
    let project = ProjectFile::load(path)?;
    let (mut session, gateway) = configured_session(&args.provider)?;
    session.load_project(project);

    let request = ChapterRequest {
        key_points: args.key_points,
        custom_content: args.custom_content,
        length: match (args.words, args.length) {
            (_, Some(bucket)) => ChapterLength::Bucket(bucket),
            (Some(words), None) => ChapterLength::Words(words),
            (None, None) => ChapterLength::default(),
        },
        tone: args.tone,
        examples: args.examples,
        title: args.title,
        description: args.description,
    };

    let generated = session
        .generate_chapter(&gateway, args.number, &request)
        .await
        .with_context(|| format!("generate chapter {}", args.number))?;
    let words = generated.content.split_whitespace().count();
    println!(
        "chapter {}: {} ({words} words)",
        generated.number, generated.title
    );

    if args.copy {
        session.copy_to_final_book(args.number)?;
    }
    session
        .to_project(Utc::now())?
        .save(path, true)
        .context("save project")?;
    Ok(())
}

pub fn export(args: ExportArgs) -> anyhow::Result<()> {
    let project = ProjectFile::load(Path::new(&args.project))?;
    let mut session = unconfigured_session()?;
    session.load_project(project);

    let options = ExportOptions {
        metadata: !args.no_metadata,
        table_of_contents: !args.no_toc,
        introduction: !args.no_introduction,
        conclusion: !args.no_conclusion,
    };
    let artifact = session
        .export(args.mode, args.format, &options, Utc::now().date_naive())
        .context("compile book")?;
    let out = export::write_artifact(Path::new(&args.out_dir), &artifact, args.force)?;
    println!("{}", out.display());
    Ok(())
}

pub fn stats(args: StatsArgs) -> anyhow::Result<()> {
    let project = ProjectFile::load(Path::new(&args.project))?;
    let mut session = unconfigured_session()?;
    session.load_project(project);
    print!("{}", session.stats()?.render());
    Ok(())
}
