//! Slashkey Command Line Interface
//!
//! Manages the snippet store and tries expansions against a scratch field.

use anyhow::Context;
use slashkey::{
    get_config_path, load_settings, manage, Dom, EventRouter, ExpansionOutcome, FileStore, KeyEvent, KeyHandled,
    MemoryPage, Result, SnippetDraft, SnippetEntry, SnippetStore,
};
use std::{env, process::Command};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

pub const BANNER: &str = r#"
     _           _     _
 ___| | __ _ ___| |__ | | _____ _   _
/ __| |/ _` / __| '_ \| |/ / _ \ | | |
\__ \ | (_| \__ \ | | |   <  __/ |_| |
|___/_|\__,_|___/_| |_|_|\_\___|\__, |
                                |___/
"#;

fn display_help() {
    println!("{}", BANNER.trim_matches('\n'));
    println!("\x1b[33;1m┌─\x1b[47m HOW TO USE \x1b[0m\x1b[33;1m──────────\x1b[0m");
    println!("\x1b[33;1m│\x1b[0m");
    println!("\x1b[33;1m│\x1b[36;1m slashkey list \x1b[90m- Show saved snippets\x1b[0m");
    println!("\x1b[33;1m│\x1b[36;1m slashkey add <trigger> <text> \x1b[90m- Save a snippet\x1b[0m");
    println!("\x1b[33;1m│\x1b[36;1m slashkey rename <old> <new> \x1b[90m- Give a snippet a new trigger\x1b[0m");
    println!("\x1b[33;1m│\x1b[36;1m slashkey remove <trigger> \x1b[90m- Delete a snippet\x1b[0m");
    println!("\x1b[33;1m│\x1b[36;1m slashkey expand <trigger> \x1b[90m- Print the snippet for a trigger\x1b[0m");
    println!("\x1b[33;1m│\x1b[36;1m slashkey try <text> \x1b[90m- Type text into a scratch field and press the expansion key\x1b[0m");
    println!("\x1b[33;1m│\x1b[36;1m slashkey watch \x1b[90m- Print snippets whenever the store file changes\x1b[0m");
    println!("\x1b[33;1m│\x1b[36;1m slashkey config \x1b[90m- Edit the configuration file\x1b[0m");
    println!("\x1b[33;1m│\x1b[36;1m slashkey path \x1b[90m- Show where configuration and snippets live\x1b[0m");
    println!("\x1b[33;1m│\x1b[0m");
}

fn usage(command: &str) -> Result<()> {
    println!("usage: \x1b[36;1mslashkey {}\x1b[0m", command);
    Ok(())
}

async fn handle_list(store: &FileStore) -> Result<()> {
    let entries = manage::list(store).await?;
    if entries.is_empty() {
        println!("No snippets yet. Add one with \x1b[36;1mslashkey add <trigger> <text>\x1b[0m");
        return Ok(());
    }
    for entry in entries {
        println!("\x1b[36;1m{}\x1b[0m \x1b[90m→\x1b[0m {}", entry.typed(), entry.preview());
    }
    Ok(())
}

async fn handle_add(store: &FileStore, trigger: &str, text: &str) -> Result<()> {
    let draft = SnippetDraft::new(trigger, text)?;
    manage::save(store, &draft, None).await?;
    println!("Saved \x1b[36;1m/{}\x1b[0m", draft.trigger());
    Ok(())
}

async fn handle_rename(store: &FileStore, old: &str, new: &str) -> Result<()> {
    manage::rename(store, old, new).await?;
    println!("Renamed \x1b[36;1m/{}\x1b[0m to \x1b[36;1m/{}\x1b[0m", old, new.trim().to_ascii_lowercase());
    Ok(())
}

async fn handle_remove(store: &FileStore, trigger: &str) -> Result<()> {
    manage::remove(store, trigger).await?;
    println!("Removed \x1b[36;1m/{}\x1b[0m", trigger.trim().to_ascii_lowercase());
    Ok(())
}

async fn handle_expand(store: &FileStore, trigger: &str) -> Result<()> {
    match store.expand(trigger).await? {
        Some(text) => println!("{}", text),
        None => println!("\x1b[33mNo snippet for /{}\x1b[0m", trigger),
    }
    Ok(())
}

// Runs one expansion in a scratch page with the configured keys
async fn handle_try(store: &FileStore, text: &str) -> Result<()> {
    let settings = load_settings()?;
    let key = settings.expansion_key.clone();
    let mut router = EventRouter::new(settings);
    router.load(store).await;

    let mut page = MemoryPage::new();
    let field = page.add_input(&[("type", "text")], text);
    page.focus(field);

    let mut event = KeyEvent::new(key.key.clone(), key.modifiers, Some(field));
    let handled = router.handle_key_down(&mut page, store, &mut event).await;
    debug!(?handled, "scratch expansion finished");

    match handled {
        KeyHandled::Expansion(ExpansionOutcome::Applied { trigger, caret }) => {
            println!("\x1b[32mExpanded /{}\x1b[0m (caret at {})", trigger, caret);
        }
        KeyHandled::Expansion(outcome) => println!("\x1b[33mNot expanded: {:?}\x1b[0m", outcome),
        _ => println!("\x1b[33mNo trigger before the caret; {} would act as usual\x1b[0m", key),
    }
    println!("{}", page.value(field));
    Ok(())
}

async fn handle_watch(store: &FileStore) -> Result<()> {
    let changes = store.subscribe();
    let _watcher = store.watch()?;
    println!("Watching \x1b[36;1m{}\x1b[0m (Ctrl+C to stop)", store.path().display());

    tokio::task::spawn_blocking(move || {
        for snippets in changes.iter() {
            println!("\x1b[33;1m│\x1b[0m {} snippet(s)", snippets.len());
            for (trigger, text) in &snippets {
                let entry = SnippetEntry { trigger: trigger.clone(), text: text.clone() };
                println!("\x1b[33;1m│\x1b[36;1m {}\x1b[0m \x1b[90m→\x1b[0m {}", entry.typed(), entry.preview());
            }
        }
    })
    .await
    .context("Watch loop stopped unexpectedly")?;
    Ok(())
}

fn handle_edit_config() -> Result<()> {
    let config_path = get_config_path()?;
    info!("Opening {:?}", config_path);

    #[cfg(target_os = "windows")]
    Command::new("notepad")
        .arg(&config_path)
        .spawn()
        .context("Failed to open config file in notepad")?;

    #[cfg(not(target_os = "windows"))]
    Command::new("xdg-open")
        .arg(&config_path)
        .spawn()
        .context("Failed to open config file")?;

    Ok(())
}

fn handle_path(store: &FileStore) -> Result<()> {
    println!("config:   {}", get_config_path()?.display());
    println!("snippets: {}", store.path().display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();

    tracing::subscriber::set_global_default(subscriber).context("Failed to set tracing subscriber")?;

    let args: Vec<String> = env::args().collect();
    if args.len() == 1 {
        display_help();
        return Ok(());
    }

    let store = FileStore::open_default()?;
    let rest = args[2..].join(" ");
    match (args[1].as_str(), args.get(2), args.get(3)) {
        ("list" | "ls", _, _) => handle_list(&store).await,
        ("add" | "set", Some(trigger), Some(_)) => handle_add(&store, trigger, &args[3..].join(" ")).await,
        ("add" | "set", _, _) => usage("add <trigger> <text>"),
        ("rename" | "mv", Some(old), Some(new)) => handle_rename(&store, old, new).await,
        ("rename" | "mv", _, _) => usage("rename <old> <new>"),
        ("remove" | "rm" | "delete", Some(trigger), _) => handle_remove(&store, trigger).await,
        ("remove" | "rm" | "delete", _, _) => usage("remove <trigger>"),
        ("expand", Some(trigger), _) => handle_expand(&store, trigger).await,
        ("expand", _, _) => usage("expand <trigger>"),
        ("try", Some(_), _) => handle_try(&store, &rest).await,
        ("try", _, _) => usage("try <text>"),
        ("watch", _, _) => handle_watch(&store).await,
        ("config" | "edit" | "settings", _, _) => handle_edit_config(),
        ("path" | "paths", _, _) => handle_path(&store),
        _ => {
            display_help();
            Ok(())
        }
    }
}
