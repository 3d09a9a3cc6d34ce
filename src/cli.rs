use crate::{
    app::App,
    catalog::Catalog,
    config::AppConfig,
    game::{is_platform_supported, Game},
    manifest::ManifestLocation,
    ui,
    view::{rank_label, Filter, SortDirection, SortField},
};
use anyhow::{bail, Context, Result};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "json" => Some(OutputFormat::Json),
            "text" => Some(OutputFormat::Text),
            _ => None,
        }
    }
}

#[derive(Debug, Default, PartialEq)]
struct GlobalOptions {
    manifest: Option<String>,
    format: Option<OutputFormat>,
}

#[derive(Debug, PartialEq)]
enum CliAction {
    Ui { manifest: Option<String> },
    Command {
        command: CliCommand,
        format: OutputFormat,
        manifest: Option<String>,
    },
}

#[derive(Debug, PartialEq)]
enum CliCommand {
    List(ListOptions),
    Sources,
    Platforms,
    Show(String),
    Help,
    Version,
}

#[derive(Debug, Default, PartialEq)]
struct ListOptions {
    platform: Option<Filter>,
    source: Option<Filter>,
    sort: Option<SortField>,
    direction: Option<SortDirection>,
    query: Option<String>,
}

pub fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match parse_args(&args)? {
        CliAction::Ui { manifest } => {
            let mut app = App::initialize(manifest.as_deref())?;
            ui::run(&mut app)
        }
        CliAction::Command {
            command,
            format,
            manifest,
        } => match command {
            CliCommand::Help => {
                print_help();
                Ok(())
            }
            CliCommand::Version => {
                println!("Ludoteca v{}", env!("CARGO_PKG_VERSION"));
                Ok(())
            }
            command => {
                let config = AppConfig::load_or_create()?;
                let location = config.manifest_location(manifest.as_deref());
                let mut catalog = Catalog::with_selection(config.default_selection());
                load_catalog(&mut catalog, &location)?;
                run_command(&mut catalog, command, format)
            }
        },
    }
}

fn parse_args(args: &[String]) -> Result<CliAction> {
    let (global, tokens) = parse_global_options(args)?;
    let format = global.format.unwrap_or(OutputFormat::Text);
    let Some(head) = tokens.first() else {
        return Ok(CliAction::Ui {
            manifest: global.manifest,
        });
    };

    let command = match head.as_str() {
        "--help" | "-h" | "help" => CliCommand::Help,
        "--version" | "-V" | "version" => CliCommand::Version,
        "ui" => {
            return Ok(CliAction::Ui {
                manifest: global.manifest,
            })
        }
        "list" | "ls" => CliCommand::List(parse_list_options(&tokens[1..])?),
        "sources" => CliCommand::Sources,
        "platforms" => CliCommand::Platforms,
        "show" => {
            let query = tokens[1..].join(" ");
            if query.trim().is_empty() {
                bail!("show requires a game title");
            }
            CliCommand::Show(query)
        }
        other => bail!("Unknown command: {other} (try 'ludoteca help')"),
    };

    Ok(CliAction::Command {
        command,
        format,
        manifest: global.manifest,
    })
}

fn parse_global_options(args: &[String]) -> Result<(GlobalOptions, Vec<String>)> {
    let mut global = GlobalOptions::default();
    let mut tokens = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if let Some(value) = arg.strip_prefix("--format=") {
            global.format = Some(parse_format(value)?);
            continue;
        }
        if arg == "--format" {
            let Some(value) = iter.next() else {
                bail!("--format requires a value");
            };
            global.format = Some(parse_format(value)?);
            continue;
        }
        if let Some(value) = arg.strip_prefix("--manifest=") {
            global.manifest = Some(value.to_string());
            continue;
        }
        if arg == "--manifest" || arg == "-m" {
            let Some(value) = iter.next() else {
                bail!("--manifest requires a URL or path");
            };
            global.manifest = Some(value.to_string());
            continue;
        }
        tokens.push(arg.to_string());
    }
    Ok((global, tokens))
}

fn parse_format(value: &str) -> Result<OutputFormat> {
    match OutputFormat::parse(value) {
        Some(format) => Ok(format),
        None => bail!("Unknown format: {value} (use 'text' or 'json')"),
    }
}

fn parse_list_options(args: &[String]) -> Result<ListOptions> {
    let mut options = ListOptions::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) if flag.starts_with("--") => (flag, Some(value.to_string())),
            _ => (arg.as_str(), None),
        };
        let mut value = |name: &str| -> Result<String> {
            if let Some(value) = inline.clone() {
                return Ok(value);
            }
            match iter.next() {
                Some(value) => Ok(value.to_string()),
                None => bail!("{name} requires a value"),
            }
        };
        match flag {
            "--platform" | "-p" => options.platform = Some(Filter::parse(&value("--platform")?)),
            "--source" | "-s" => options.source = Some(Filter::parse(&value("--source")?)),
            "--sort" => {
                let key = value("--sort")?;
                match SortField::parse(&key) {
                    Some(field) => options.sort = Some(field),
                    None => bail!("Unknown sort key: {key}"),
                }
            }
            "--query" | "-q" => options.query = Some(value("--query")?),
            "--asc" => options.direction = Some(SortDirection::Asc),
            "--desc" | "--reverse" | "-r" => options.direction = Some(SortDirection::Desc),
            other => bail!("Unknown list option: {other}"),
        }
    }
    Ok(options)
}

fn load_catalog(catalog: &mut Catalog, location: &ManifestLocation) -> Result<()> {
    catalog
        .fetch_games(location)
        .with_context(|| format!("Failed to load manifest from {location}"))
}

fn run_command(catalog: &mut Catalog, command: CliCommand, format: OutputFormat) -> Result<()> {
    match command {
        CliCommand::List(options) => {
            apply_list_options(catalog, options);
            print_list(catalog, format)
        }
        CliCommand::Sources => print_ids(&catalog.known_sources(), format),
        CliCommand::Platforms => print_ids(&catalog.known_platforms(), format),
        CliCommand::Show(query) => {
            let Some(game) = find_game(catalog.games(), &query) else {
                bail!("No game matches \"{query}\"");
            };
            print_game(game, format)
        }
        CliCommand::Help | CliCommand::Version => Ok(()),
    }
}

fn apply_list_options(catalog: &mut Catalog, options: ListOptions) {
    if let Some(platform) = options.platform {
        catalog.set_selected_platform(platform);
    }
    if let Some(source) = options.source {
        catalog.set_selected_source(source);
    }
    if let Some(field) = options.sort {
        if catalog.selection().sort_by != field {
            catalog.set_sort_by(field);
        }
    }
    if let Some(direction) = options.direction {
        catalog.set_sort_direction(direction);
    }
    if let Some(query) = options.query {
        catalog.set_search_query(query);
    }
}

#[derive(Serialize)]
struct ListOutput<'a> {
    platform: &'a str,
    source: &'a str,
    sort: &'a str,
    direction: &'a str,
    displayed_count: usize,
    total_count: usize,
    games: Vec<GameItem<'a>>,
}

#[derive(Serialize)]
struct GameItem<'a> {
    title: &'a str,
    rank: Option<i64>,
    release_date: Option<String>,
    harmony_score: Option<f64>,
    metacritic: Option<f64>,
    total_score: Option<f64>,
    deemphasized: bool,
}

fn print_list(catalog: &Catalog, format: OutputFormat) -> Result<()> {
    let selection = catalog.selection();
    let view = catalog.view();
    match format {
        OutputFormat::Json => {
            let output = ListOutput {
                platform: selection.platform.as_str(),
                source: selection.source.as_str(),
                sort: selection.sort_by.key(),
                direction: selection.sort_direction.label(),
                displayed_count: view.displayed_count,
                total_count: view.total_count,
                games: view
                    .rows
                    .iter()
                    .map(|row| GameItem {
                        title: &row.game.title,
                        rank: row.rank,
                        release_date: row.game.release_date.map(crate::game::format_date),
                        harmony_score: row.game.harmony_score,
                        metacritic: row.game.metacritic,
                        total_score: row.game.total_score,
                        deemphasized: row.deemphasized,
                    })
                    .collect(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            for row in &view.rows {
                let rank = rank_label(row.rank);
                let marker = if row.deemphasized { "~" } else { " " };
                println!(
                    "{marker}{rank:>5}  {:<10}  {}",
                    row.game.release_label(),
                    row.game.title
                );
            }
            println!(
                "{} shown, {} supported, {} total ({})",
                view.rows.len(),
                view.displayed_count,
                view.total_count,
                selection.summary()
            );
        }
    }
    Ok(())
}

fn print_ids(ids: &[String], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(ids)?),
        OutputFormat::Text => {
            for id in ids {
                println!("{id}");
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct GameDetail<'a> {
    title: &'a str,
    release_date: Option<String>,
    rankings: &'a std::collections::BTreeMap<String, i64>,
    platforms: Vec<PlatformDetail<'a>>,
    harmony_score: Option<f64>,
    metacritic: Option<f64>,
    total_score: Option<f64>,
}

#[derive(Serialize)]
struct PlatformDetail<'a> {
    id: &'a str,
    value: String,
    supported: bool,
}

fn print_game(game: &Game, format: OutputFormat) -> Result<()> {
    let platforms: Vec<PlatformDetail> = game
        .platforms
        .iter()
        .map(|(id, support)| PlatformDetail {
            id,
            value: support.label(),
            supported: is_platform_supported(game, id),
        })
        .collect();
    match format {
        OutputFormat::Json => {
            let detail = GameDetail {
                title: &game.title,
                release_date: game.release_date.map(crate::game::format_date),
                rankings: &game.rankings,
                platforms,
                harmony_score: game.harmony_score,
                metacritic: game.metacritic,
                total_score: game.total_score,
            };
            println!("{}", serde_json::to_string_pretty(&detail)?);
        }
        OutputFormat::Text => {
            println!("{}", game.title);
            println!("  released: {}", game.release_label());
            for (label, score) in [
                ("harmony", game.harmony_score),
                ("metacritic", game.metacritic),
                ("total", game.total_score),
            ] {
                if let Some(score) = score {
                    println!("  {label}: {score}");
                }
            }
            for (source, rank) in &game.rankings {
                println!("  rank {source}: #{rank}");
            }
            for platform in platforms {
                let mark = if platform.supported { "yes" } else { "no" };
                println!("  {}: {} ({mark})", platform.id, platform.value);
            }
        }
    }
    Ok(())
}

/// Exact title first (ignoring case), then the first substring match.
fn find_game<'a>(games: &'a [Game], query: &str) -> Option<&'a Game> {
    let query = query.trim().to_lowercase();
    games
        .iter()
        .find(|game| game.title.to_lowercase() == query)
        .or_else(|| {
            games
                .iter()
                .find(|game| game.title.to_lowercase().contains(&query))
        })
}

fn print_help() {
    println!("Ludoteca v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage: ludoteca [--manifest <url|path>] [--format text|json] [command]");
    println!();
    println!("Commands:");
    println!("  (none) | ui            Open the interactive browser");
    println!("  list [options]         Print the filtered, sorted catalog");
    println!("      --platform <id>    Count support for a platform ('all' for none)");
    println!("      --source <id>      Only games ranked by this source");
    println!("      --sort <field>     rank, release_date, name, harmony_score, metacritic, total_score");
    println!("      --asc | --desc     Natural order or its reverse");
    println!("      --query <text>     Case-insensitive title search");
    println!("  sources                List ranking sources");
    println!("  platforms              List platform ids");
    println!("  show <title>           Show one game");
    println!("  help | version");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::tests::game;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn no_arguments_opens_ui() {
        assert_eq!(parse_args(&[]).unwrap(), CliAction::Ui { manifest: None });
        assert_eq!(
            parse_args(&args(&["--manifest", "local.json"])).unwrap(),
            CliAction::Ui {
                manifest: Some("local.json".to_string())
            }
        );
    }

    #[test]
    fn parses_list_with_options() {
        let action = parse_args(&args(&[
            "--format=json",
            "list",
            "--source",
            "gog",
            "--platform=steamdeck",
            "--sort",
            "release",
            "--desc",
            "-q",
            "zelda",
        ]))
        .unwrap();
        assert_eq!(
            action,
            CliAction::Command {
                command: CliCommand::List(ListOptions {
                    platform: Some(Filter::Only("steamdeck".to_string())),
                    source: Some(Filter::Only("gog".to_string())),
                    sort: Some(SortField::ReleaseDate),
                    direction: Some(SortDirection::Desc),
                    query: Some("zelda".to_string()),
                }),
                format: OutputFormat::Json,
                manifest: None,
            }
        );
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_args(&args(&["list", "--sort", "stars"])).is_err());
        assert!(parse_args(&args(&["list", "--source"])).is_err());
        assert!(parse_args(&args(&["--format", "xml", "list"])).is_err());
        assert!(parse_args(&args(&["frobnicate"])).is_err());
        assert!(parse_args(&args(&["show"])).is_err());
    }

    #[test]
    fn show_joins_title_words() {
        let action = parse_args(&args(&["show", "The", "Legend"])).unwrap();
        assert!(matches!(
            action,
            CliAction::Command {
                command: CliCommand::Show(ref title),
                ..
            } if title == "The Legend"
        ));
    }

    #[test]
    fn list_options_apply_to_catalog() {
        let mut catalog = Catalog::new();
        catalog.finish_fetch(Ok(crate::game::Manifest {
            games: vec![game("A", &[("gog", 1)]), game("B", &[("steam", 2)])],
            ..Default::default()
        }));
        apply_list_options(
            &mut catalog,
            ListOptions {
                source: Some(Filter::Only("gog".to_string())),
                sort: Some(SortField::Rank),
                ..ListOptions::default()
            },
        );
        // Requesting the already active field must not flip the direction.
        assert_eq!(catalog.selection().sort_direction, SortDirection::Asc);
        let titles: Vec<&str> = catalog
            .filtered_games()
            .into_iter()
            .map(|game| game.title.as_str())
            .collect();
        assert_eq!(titles, vec!["A"]);
    }

    #[test]
    fn finds_exact_title_before_substring() {
        let games = vec![game("Zelda II", &[]), game("Zelda", &[])];
        assert_eq!(find_game(&games, "zelda").map(|game| game.title.as_str()), Some("Zelda"));
        assert_eq!(find_game(&games, "ii").map(|game| game.title.as_str()), Some("Zelda II"));
        assert!(find_game(&games, "mario").is_none());
    }
}
