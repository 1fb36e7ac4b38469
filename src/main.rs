use std::env;
use std::fs::{self, OpenOptions};
use std::path::PathBuf;

use anyhow::{Context, Result};

use brutal24::cli::Flags;
use brutal24::controllers::{post_controller, start_app, AppContext};
use brutal24::models::clock::Clock;
use brutal24::models::identity;
use brutal24::models::{Config, LocalStore};

fn log_path() -> Result<PathBuf> {
    let cache = env::var_os("XDG_CACHE_HOME")
        .map(PathBuf::from)
        .or_else(dirs::cache_dir)
        .context("Could not find cache directory")?;
    let dir = cache.join("brutal24");
    fs::create_dir_all(&dir)?;
    Ok(dir.join("brutal24.log"))
}

/// Logs go to a file; the terminal belongs to the feed.
fn init_logging() -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path()?)
        .context("Failed to open log file")?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    //Get Flags
    let flags = Flags::from_args();
    init_logging()?;

    let mut config = Config::load()?;
    config.offline |= flags.offline;

    let store = LocalStore::open_default()?;
    let ctx = AppContext::from_config(config, store)?;

    if flags.post() {
        let body = match flags.message.clone() {
            Some(message) => message,
            None => post_controller::create_post_via_editor()?,
        };
        let post = post_controller::post_note(&ctx, &body, flags.image.clone()).await?;
        println!("{}", post_controller::format_post(&post, ctx.clock.now()));
    } else if flags.fetch() {
        let now = ctx.clock.now();
        let posts = post_controller::fetch_posts(&ctx).await;
        if posts.is_empty() {
            println!("¡No hay publicaciones aún!");
        }
        for post in &posts {
            println!("{}", post_controller::format_post(post, now));
        }
    } else if flags.sweep() {
        post_controller::sweep_expired(&ctx).await?;
        println!("Publicaciones caducadas eliminadas");
    } else if flags.whoami() {
        let user = identity::get_anonymous_user(&ctx.store, ctx.backend.clone(), ctx.clock.as_ref()).await;
        println!("@{} ({})", user.username, user.id);
        println!("Activo desde {}", user.created_at.with_timezone(&chrono::Local).format("%d/%m/%Y"));
    } else if let Err(e) = start_app(ctx).await {
        log::error!("TUI exited with error: {}", e);
        return Err(anyhow::anyhow!("{}", e));
    }

    Ok(())
}
