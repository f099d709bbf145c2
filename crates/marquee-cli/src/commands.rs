use std::path::Path;

use anyhow::Context;
use colored::Colorize;
use marquee_core::{Cms, ListQuery, MediaRecord, SortSpec};
use marquee_server::{AppConfig, MarqueeServer};
use marquee_types::{KindSchema, RecordKind, Upload, UpsertRequest};
use serde::Serialize;

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let format = cli.format;
    match cli.command {
        Command::Serve(args) => cmd_serve(config, args).await,
        Command::Schema(args) => cmd_schema(args, &format),
        Command::List(args) => cmd_list(&config, args, &format).await,
        Command::Show(args) => cmd_show(&config, args, &format).await,
        Command::Upsert(args) => cmd_upsert(&config, args, &format).await,
        Command::Delete(args) => cmd_delete(&config, args, &format).await,
        Command::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => Ok(AppConfig::default()),
    }
}

fn open_cms(config: &AppConfig) -> anyhow::Result<Cms> {
    config.validate()?;
    Cms::from_config(&config.cms()).context("opening stores")
}

fn parse_kind(segment: &str) -> anyhow::Result<RecordKind> {
    Ok(RecordKind::from_route(segment)?)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn cmd_serve(mut config: AppConfig, args: ServeArgs) -> anyhow::Result<()> {
    if let Some(bind) = args.bind {
        config.server.bind_addr = bind
            .parse()
            .with_context(|| format!("invalid bind address `{bind}`"))?;
    }
    let server = MarqueeServer::new(config)?;
    println!(
        "{} Marquee listening on {}",
        "✓".green().bold(),
        server.config().server.bind_addr.to_string().bold()
    );
    server.serve().await?;
    Ok(())
}

fn cmd_schema(args: SchemaArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let schemas: Vec<&KindSchema> = match args.kind {
        Some(kind) => vec![parse_kind(&kind)?.schema()],
        None => RecordKind::ALL.into_iter().map(RecordKind::schema).collect(),
    };
    if *format == OutputFormat::Json {
        return print_json(&schemas);
    }
    for schema in schemas {
        println!("{} (/api/{})", schema.kind.as_str().bold(), schema.kind.route());
        for field in schema.fields {
            let mut line = format!("  {}", field.name);
            if field.required {
                line.push_str(&format!(" {}", "required".yellow()));
            }
            if let Some(default) = field.default {
                line.push_str(&format!(" default={}", default.cyan()));
            }
            if !field.allowed.is_empty() {
                line.push_str(&format!(" one of [{}]", field.allowed.join(", ")));
            }
            println!("{line}");
        }
        for slot in schema.slots {
            let required = if slot.required {
                " required".yellow().to_string()
            } else {
                String::new()
            };
            println!("  {} {}{}", slot.name, "image".blue(), required);
        }
    }
    Ok(())
}

async fn cmd_list(config: &AppConfig, args: ListArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let kind = parse_kind(&args.kind)?;
    let mut query = ListQuery::from_params(args.filters);
    if let Some(raw) = args.sort {
        let sort = SortSpec::parse(&raw).with_context(|| format!("invalid sort key `{raw}`"))?;
        query = query.sort_by(sort);
    }
    let cms = open_cms(config)?;
    let records = cms.list(kind, &query).await?;
    if *format == OutputFormat::Json {
        return print_json(&records);
    }
    if records.is_empty() {
        println!("No {} records.", kind.as_str());
    }
    for record in &records {
        print_summary(record);
    }
    Ok(())
}

async fn cmd_show(
    config: &AppConfig,
    args: RecordArgs,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    let kind = parse_kind(&args.kind)?;
    let record = open_cms(config)?.get(kind, &args.id).await?;
    if *format == OutputFormat::Json {
        return print_json(&record);
    }
    print_record(&record);
    Ok(())
}

async fn cmd_upsert(
    config: &AppConfig,
    args: UpsertArgs,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    let kind = parse_kind(&args.kind)?;
    let mut request = UpsertRequest::new();
    if let Some(id) = &args.id {
        request.offer_id(id);
    }
    request.fields.extend(args.fields);
    request.existing.extend(args.existing);
    request.clear.extend(args.clear);
    for (slot, path) in args.files {
        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("reading `{path}` for slot `{slot}`"))?;
        let mut upload = Upload::new(bytes);
        if let Some(name) = Path::new(&path).file_name().and_then(|n| n.to_str()) {
            upload = upload.with_filename(name);
        }
        request.uploads.insert(slot, upload);
    }

    let updating = request.identifier().is_some();
    let record = open_cms(config)?.upsert(kind, request).await?;
    if *format == OutputFormat::Json {
        return print_json(&record);
    }
    let verb = if updating { "Updated" } else { "Created" };
    println!(
        "{} {} {} {}",
        "✓".green().bold(),
        verb,
        kind.as_str(),
        record.id.to_string().yellow()
    );
    print_record(&record);
    Ok(())
}

async fn cmd_delete(
    config: &AppConfig,
    args: RecordArgs,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    let kind = parse_kind(&args.kind)?;
    let report = open_cms(config)?.delete(kind, &args.id).await?;
    if *format == OutputFormat::Json {
        return print_json(&report);
    }
    println!(
        "{} Deleted {} {}",
        "✓".green().bold(),
        kind.as_str(),
        report.id.to_string().yellow()
    );
    println!("  Released: {}", report.assets.released.len());
    for handle in &report.assets.failed {
        println!("  {} {}", "not released:".red(), handle.as_str());
    }
    Ok(())
}

fn print_summary(record: &MediaRecord) {
    let title = record
        .field("title")
        .or_else(|| record.field("name"))
        .unwrap_or("-");
    println!(
        "{}  {}  {}",
        record.id.short_id().yellow(),
        record.created_at.to_string().dimmed(),
        title
    );
}

fn print_record(record: &MediaRecord) {
    println!("{} {}", record.kind.as_str().bold(), record.id.to_string().yellow());
    println!("  Created: {}", record.created_at);
    println!("  Updated: {}", record.updated_at);
    for (name, value) in &record.fields {
        println!("  {name}: {value}");
    }
    for (slot, asset) in &record.assets {
        let tag = if asset.is_owned() { "owned" } else { "linked" };
        println!("  {} {} ({})", format!("{slot}:").blue(), asset.url, tag.dimmed());
    }
}
