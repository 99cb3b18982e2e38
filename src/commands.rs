use pmdraft::context::DraftContext;
use pmdraft::draft::DraftKey;
use pmdraft::gate::CompletenessGate;
use pmdraft::ledger::MetadataStore;

use crate::cli::{CheckArgs, DraftArgs};

type CommandResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

fn key(ctx: &DraftContext, args: &DraftArgs) -> Result<DraftKey, pmdraft::draft::KeyError> {
    ctx.draft_key(&args.station, args.report.as_deref())
}

pub async fn show(ctx: &DraftContext, args: DraftArgs) -> CommandResult {
    let key = key(ctx, &args)?;
    match ctx.metadata.load(&key).await? {
        Some(document) => println!("{}", serde_json::to_string_pretty(&document)?),
        None => println!("no draft stored for {key}"),
    }
    Ok(())
}

pub async fn check(ctx: &DraftContext, args: CheckArgs) -> CommandResult {
    let key = key(ctx, &args.draft)?;
    let schema = ctx.checklist(args.schema.as_deref())?;
    let document = ctx.metadata.load(&key).await?.unwrap_or_default();

    let report = CompletenessGate::new(&schema).evaluate(args.stage, &document);
    println!("{}", serde_json::to_string_pretty(&report)?);

    let verdict = match args.stage {
        pmdraft::draft::Stage::Pre => report.can_advance(),
        pmdraft::draft::Stage::Post => report.can_submit(),
    };
    for missing in report.missing() {
        eprintln!("missing: {missing}");
    }
    eprintln!(
        "{key} [{}] stage {}: {}",
        schema.name,
        args.stage,
        if verdict { "complete" } else { "incomplete" }
    );
    Ok(())
}

pub async fn purge(ctx: &DraftContext, args: DraftArgs) -> CommandResult {
    let key = key(ctx, &args)?;
    let Some(document) = ctx.metadata.load(&key).await? else {
        println!("no draft stored for {key}");
        return Ok(());
    };

    let report = ctx.controller.discard(&key, &document.photo_ids()).await?;
    println!(
        "{key}: {} blob(s) deleted, {} failed, metadata {}",
        report.blobs_deleted,
        report.blobs_failed.len(),
        if report.metadata_cleared { "cleared" } else { "kept" }
    );
    for id in &report.blobs_failed {
        println!("  still stored: {id}");
    }
    Ok(())
}

pub async fn list(ctx: &DraftContext) -> CommandResult {
    let keys = ctx.metadata.list()?;
    for key in &keys {
        let photos = ctx
            .metadata
            .load(key)
            .await?
            .map_or(0, |document| document.photo_count());
        println!("{key}\t{photos} photo(s)");
    }

    let stats = ctx.metadata.stats()?;
    eprintln!("{} draft(s), {} bytes", stats.draft_count, stats.total_bytes);
    Ok(())
}
