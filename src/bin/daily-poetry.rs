use std::env;
use std::path::PathBuf;

use daily_poetry::format::{DEFAULT_EXCERPT_CHARS, DateStyle, format_featured_date, subtitle, truncate_poem};
use daily_poetry::notifications::UnsupportedPlatform;
use daily_poetry::store::{load_theme, save_theme};
use daily_poetry::worker::DiskCacheStorage;
use daily_poetry::{
    AppConfig, CacheWorker, Context, FavouritesSync, NotificationManager, PoemGateway, PoetryApi,
    ReqwestTransport, Theme, ToggleOutcome,
};

fn print_usage() {
    eprintln!("Usage: daily-poetry [OPTIONS] [COMMAND] [ARGS]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  today               Show today's poem (default)");
    eprintln!("  favourites          List saved favourites");
    eprintln!("  favourite           Add or remove today's poem from favourites");
    eprintln!("  notifications [hour <0-23>]");
    eprintln!("                      Show the daily reminder or move its hour");
    eprintln!("                      (enabling needs a push-capable platform)");
    eprintln!("  theme [light|dark|system]");
    eprintln!("                      Show or change the colour scheme");
    eprintln!("  install-shell <ORIGIN>");
    eprintln!("                      Pre-cache the app shell of ORIGIN for offline use");
    eprintln!("  config              Print the active configuration");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -c, --config <PATH> Config file (default: platform config dir)");
    eprintln!("      --full          Print the whole poem instead of an excerpt");
    eprintln!("  -h, --help          Show this help");
}

#[tokio::main]
async fn main() -> daily_poetry::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut config_path: Option<PathBuf> = None;
    let mut full = false;
    let mut positional: Vec<String> = Vec::new();

    let args: Vec<String> = env::args().skip(1).collect();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_usage();
                std::process::exit(0);
            }
            "-c" | "--config" => {
                i += 1;
                if i < args.len() {
                    config_path = Some(PathBuf::from(&args[i]));
                } else {
                    eprintln!("Error: --config requires a value");
                    std::process::exit(1);
                }
            }
            "--full" => full = true,
            other if other.starts_with('-') => {
                eprintln!("Error: unknown option {other}");
                print_usage();
                std::process::exit(1);
            }
            _ => positional.push(args[i].clone()),
        }
        i += 1;
    }

    let config_path = config_path.unwrap_or_else(AppConfig::default_path);
    let config = AppConfig::load_or_create(&config_path)?;

    let command = positional.first().map_or("today", String::as_str);
    let rest = positional.get(1..).unwrap_or_default();

    if command == "config" {
        println!("# {}", config_path.display());
        let rendered =
            toml::to_string_pretty(&config).map_err(|e| daily_poetry::Error::Config(e.to_string()))?;
        print!("{rendered}");
        return Ok(());
    }

    let ctx = Context::from_config(config)?;
    let api = PoetryApi::new(&ctx);

    match command {
        "today" => show_today(&ctx, api, full).await,
        "favourites" => {
            let favourites = FavouritesSync::new(&ctx, api);
            let outcome = favourites.load().await;
            if let Some(notice) = &outcome.notice {
                eprintln!("{notice}");
            }
            println!("{} favourites ({})", outcome.entries.len(), outcome.source);
            for entry in &outcome.entries {
                println!(
                    "  {}  {}",
                    entry.title,
                    subtitle(&entry.author, &format_featured_date(&entry.date_featured, DateStyle::Short))
                );
            }
            Ok(())
        }
        "favourite" => {
            let today = PoemGateway::new(&ctx, api.clone()).get_today().await;
            let favourites = FavouritesSync::new(&ctx, api);
            favourites.load().await;
            match favourites.toggle(&today.poem).await? {
                ToggleOutcome::Added => println!("Added \"{}\" to favourites", today.poem.poem.title),
                ToggleOutcome::Removed => {
                    println!("Removed \"{}\" from favourites", today.poem.poem.title);
                }
            }
            Ok(())
        }
        "notifications" => notifications(&ctx, api, rest).await,
        "install-shell" => {
            let Some(origin) = rest.first() else {
                eprintln!("Error: install-shell requires an origin URL");
                std::process::exit(1);
            };
            let worker = CacheWorker::new(
                ctx.config().worker.clone(),
                origin,
                DiskCacheStorage::from_paths(&ctx.config().paths),
                ReqwestTransport::new(&ctx.config().api)?,
            )?;
            let purged = worker.install().await?;
            println!(
                "Cached app shell of {origin} into {} ({})",
                worker.cache_name(),
                worker.storage().root().display()
            );
            for name in purged {
                println!("  purged {name}");
            }
            Ok(())
        }
        "theme" => {
            let store = ctx.store().as_ref();
            match rest.first().map(String::as_str) {
                None => println!("{:?}", load_theme(store)),
                Some(choice) => {
                    let theme = match choice {
                        "light" => Theme::Light,
                        "dark" => Theme::Dark,
                        "system" => Theme::System,
                        other => {
                            eprintln!("Error: unknown theme {other}");
                            std::process::exit(1);
                        }
                    };
                    save_theme(store, theme)?;
                    println!("Theme set to {choice}");
                }
            }
            Ok(())
        }
        other => {
            eprintln!("Error: unknown command {other}");
            print_usage();
            std::process::exit(1);
        }
    }
}

async fn show_today(ctx: &Context, api: PoetryApi, full: bool) -> daily_poetry::Result<()> {
    let today = PoemGateway::new(ctx, api).get_today().await;
    let daily = &today.poem;

    println!("{}", format_featured_date(&daily.date, DateStyle::Long));
    println!();
    println!("{}", daily.poem.title);
    println!("{}", subtitle(&daily.author.name, &format_featured_date(&daily.date, DateStyle::Short)));
    println!();
    if full {
        println!("{}", daily.poem.text.replace("\r\n", "\n").trim());
    } else {
        println!("{}", truncate_poem(&daily.poem.text, DEFAULT_EXCERPT_CHARS));
    }
    if today.from_cache {
        println!();
        println!("(offline copy)");
    }
    Ok(())
}

async fn notifications(ctx: &Context, api: PoetryApi, args: &[String]) -> daily_poetry::Result<()> {
    let manager = NotificationManager::new(ctx, api, UnsupportedPlatform);
    manager.load().await;

    match args.first().map(String::as_str) {
        None | Some("status") => {}
        Some("hour") => {
            let Some(hour) = args.get(1).and_then(|h| h.parse::<u8>().ok()) else {
                eprintln!("Error: hour requires a value between 0 and 23");
                std::process::exit(1);
            };
            if let Some(error) = manager.last_error() {
                eprintln!("Error: current reminder could not be read: {error}");
                std::process::exit(1);
            }
            manager.set_reminder_hour(hour).await?;
        }
        Some("on" | "off") => {
            eprintln!("Error: reminders can only be switched on a push-capable platform");
            std::process::exit(1);
        }
        Some(other) => {
            eprintln!("Error: unknown notifications action {other}");
            std::process::exit(1);
        }
    }

    let preference = manager.preference();
    println!("State: {:?}", manager.state());
    println!(
        "Reminder: {} at {:02}:00 ({})",
        if preference.enabled { "on" } else { "off" },
        preference.local_hour,
        preference.time_zone
    );
    if let Some(error) = manager.last_error() {
        println!("Last error: {error}");
    }
    Ok(())
}
