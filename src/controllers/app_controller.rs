use std::io;
use std::time::{Duration, Instant};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::Terminal;
use tokio::sync::mpsc;

use crate::controllers::context::AppContext;
use crate::controllers::feed::{Effect, FeedController, Outcome};
use crate::models::realtime::RealtimeEvent;
use crate::models::storage::LocalStore;
use crate::views::{tui, Tab, UiState, WelcomeBanner};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub async fn start_app(ctx: AppContext) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let mut feed = FeedController::bootstrap(&ctx).await;
    log::info!("Session started as @{}", feed.user().username);

    let (realtime, realtime_rx) = ctx.subscribe()?;

    // Setup terminal
    let mut terminal = tui::setup_terminal()?;

    let mut ui = UiState::new(WelcomeBanner::load(&ctx.store, Instant::now()));
    ui.sync(&feed);

    // Run the app
    let res = run_app(&mut terminal, &mut feed, &mut ui, &ctx, realtime_rx).await;

    // Restore terminal
    tui::restore_terminal(&mut terminal)?;
    realtime.abort();

    if let Err(err) = res {
        eprintln!("{:?}", err);
    }

    Ok(())
}

/// Runs an effect off the loop; its outcome comes back over `tx`.
fn spawn_effect(ctx: &AppContext, tx: &mpsc::UnboundedSender<Outcome>, effect: Effect) {
    let ctx = ctx.clone();
    let tx = tx.clone();
    tokio::spawn(async move {
        let outcome = effect.run(&ctx).await;
        // Receiver gone means the app is shutting down.
        let _ = tx.send(outcome);
    });
}

pub async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    feed: &mut FeedController,
    ui: &mut UiState,
    ctx: &AppContext,
    mut realtime_rx: mpsc::UnboundedReceiver<RealtimeEvent>,
) -> io::Result<()> {
    let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel::<Outcome>();
    let sweep_every = ctx.config.sweep_interval();
    let mut last_sweep = Instant::now();
    let mut interacted = false;

    loop {
        while let Ok(outcome) = outcome_rx.try_recv() {
            for effect in feed.apply(outcome) {
                spawn_effect(ctx, &outcome_tx, effect);
            }
        }
        while let Ok(event) = realtime_rx.try_recv() {
            if let Some(effect) = feed.on_realtime(event) {
                spawn_effect(ctx, &outcome_tx, effect);
            }
        }
        if last_sweep.elapsed() >= sweep_every {
            last_sweep = Instant::now();
            log::debug!("Running expiry sweep");
            spawn_effect(ctx, &outcome_tx, feed.sweep());
        }

        ui.banner.tick(Instant::now());
        feed.prune_toasts();
        ui.sync(feed);
        terminal.draw(|f| tui::render_ui(f, feed, ui))?;

        if !event::poll(POLL_INTERVAL)? {
            continue;
        }
        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            if !interacted {
                interacted = true;
                feed.request_permission();
            }

            let action = handle_key(key, feed, ui, &ctx.store);
            for effect in action.effects {
                spawn_effect(ctx, &outcome_tx, effect);
            }
            if action.quit {
                return Ok(());
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct KeyAction {
    pub quit: bool,
    pub effects: Vec<Effect>,
}

impl KeyAction {
    fn run(effect: Option<Effect>) -> Self {
        Self {
            quit: false,
            effects: effect.into_iter().collect(),
        }
    }
}

/// Maps one key press onto the controller and the view state.
pub fn handle_key(
    key: KeyEvent,
    feed: &mut FeedController,
    ui: &mut UiState,
    store: &LocalStore,
) -> KeyAction {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return KeyAction { quit: true, effects: vec![] };
    }

    if let Some(post_id) = feed.selected_post().map(|p| p.id.clone()) {
        return thread_key(key, &post_id, feed, ui);
    }

    match ui.tab {
        Tab::Create => return create_key(key, feed, ui),
        Tab::Search => {
            if let Some(action) = search_key(key, feed, ui) {
                return action;
            }
        }
        Tab::Feed | Tab::Profile => {}
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => KeyAction { quit: true, effects: vec![] },
        KeyCode::Tab => {
            ui.tab = ui.tab.next();
            KeyAction::default()
        }
        KeyCode::Char('n') => {
            ui.tab = Tab::Create;
            KeyAction::default()
        }
        KeyCode::Char('/') => {
            ui.tab = Tab::Search;
            KeyAction::default()
        }
        KeyCode::Char('x') => {
            ui.banner.dismiss(store);
            KeyAction::default()
        }
        KeyCode::Char('r') => KeyAction::run(Some(feed.refresh())),
        KeyCode::Down | KeyCode::Char('j') if ui.tab == Tab::Feed => {
            ui.feed_list.next();
            KeyAction::default()
        }
        KeyCode::Up | KeyCode::Char('k') if ui.tab == Tab::Feed => {
            ui.feed_list.previous();
            KeyAction::default()
        }
        KeyCode::Char('l') => {
            let post_id = ui.selected_post().map(str::to_string);
            KeyAction::run(post_id.and_then(|id| feed.toggle_like(&id)))
        }
        KeyCode::Char('e') => {
            if let Some(id) = ui.selected_post().map(str::to_string) {
                feed.toggle_expanded(&id);
            }
            KeyAction::default()
        }
        KeyCode::Char('c') | KeyCode::Enter => {
            let post_id = ui.selected_post().map(str::to_string);
            ui.comment_draft.clear();
            ui.typing_comment = false;
            KeyAction::run(post_id.and_then(|id| feed.open_thread(&id)))
        }
        _ => KeyAction::default(),
    }
}

fn thread_key(key: KeyEvent, post_id: &str, feed: &mut FeedController, ui: &mut UiState) -> KeyAction {
    if ui.typing_comment {
        match key.code {
            KeyCode::Esc => {
                ui.typing_comment = false;
                ui.comment_draft.clear();
                feed.cancel_reply();
            }
            KeyCode::Enter => {
                let effect = feed.submit_comment(post_id, &ui.comment_draft);
                if effect.is_some() {
                    ui.comment_draft.clear();
                    ui.typing_comment = false;
                }
                return KeyAction::run(effect);
            }
            KeyCode::Backspace => {
                ui.comment_draft.pop();
            }
            KeyCode::Char(c) => ui.comment_draft.push(c),
            _ => {}
        }
        return KeyAction::default();
    }

    match key.code {
        KeyCode::Esc | KeyCode::Char('q') => feed.close_thread(),
        KeyCode::Down | KeyCode::Char('j') => ui.comment_list.next(),
        KeyCode::Up | KeyCode::Char('k') => ui.comment_list.previous(),
        KeyCode::Char('i') => {
            feed.cancel_reply();
            ui.typing_comment = true;
        }
        KeyCode::Char('r') => {
            if let Some(comment_id) = ui.comment_list.selected_item().cloned() {
                feed.reply_to(&comment_id);
                ui.typing_comment = true;
            }
        }
        KeyCode::Char('l') => return KeyAction::run(feed.toggle_like(post_id)),
        _ => {}
    }
    KeyAction::default()
}

fn create_key(key: KeyEvent, feed: &mut FeedController, ui: &mut UiState) -> KeyAction {
    let field = if ui.editing_image { &mut ui.image_url } else { &mut ui.draft };
    match key.code {
        KeyCode::Esc => ui.tab = Tab::Feed,
        KeyCode::Tab => ui.tab = ui.tab.next(),
        KeyCode::Up | KeyCode::Down => ui.editing_image = !ui.editing_image,
        KeyCode::Backspace => {
            field.pop();
        }
        KeyCode::Char(c) => field.push(c),
        KeyCode::Enter => {
            let image = ui.image_url.trim();
            let image = (!image.is_empty()).then(|| image.to_string());
            let effect = feed.create_post(&ui.draft, image);
            if effect.is_some() {
                ui.draft.clear();
                ui.image_url.clear();
                ui.editing_image = false;
                ui.tab = Tab::Feed;
            }
            return KeyAction::run(effect);
        }
        _ => {}
    }
    KeyAction::default()
}

/// Search tab swallows printable keys into the query. `None` falls through
/// to the shared bindings.
fn search_key(key: KeyEvent, feed: &mut FeedController, ui: &mut UiState) -> Option<KeyAction> {
    match key.code {
        KeyCode::Esc => {
            ui.search_query.clear();
            ui.tab = Tab::Feed;
        }
        KeyCode::Backspace => {
            ui.search_query.pop();
        }
        KeyCode::Down => ui.search_list.next(),
        KeyCode::Up => ui.search_list.previous(),
        KeyCode::Enter => {
            let post_id = ui.selected_post().map(str::to_string);
            return Some(KeyAction::run(post_id.and_then(|id| feed.open_thread(&id))));
        }
        KeyCode::Char(c) => {
            ui.search_query.push(c);
            ui.sync(feed);
        }
        _ => return None,
    }
    Some(KeyAction::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use chrono::{TimeZone, Utc};
    use crate::models::backend::MemoryBackend;
    use crate::models::clock::{Clock, ManualClock};
    use crate::models::{Backend, Config, LikeSet, NewPost};
    use crate::models::user::AnonymousUser;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    async fn session() -> (tempfile::TempDir, AppContext, FeedController, UiState) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        let backend = Arc::new(MemoryBackend::new());
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()));
        let draft = NewPost::new("anon_other", "NeonWolf7", "buenos días", None, clock.now()).unwrap();
        backend.insert_post(&draft).await.unwrap();

        let ctx = AppContext::local(Config::default(), store, backend, clock);
        let user = AnonymousUser {
            id: "anon_me".to_string(),
            username: "BrutalFox42".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap(),
        };
        let mut feed = FeedController::new(&ctx, user, LikeSet::default());
        feed.dispatch(&ctx, Effect::FetchPosts).await;
        let mut ui = UiState::new(WelcomeBanner::load(&ctx.store, Instant::now()));
        ui.sync(&feed);
        (dir, ctx, feed, ui)
    }

    #[tokio::test]
    async fn like_key_is_guarded_until_outcome() {
        let (_dir, ctx, mut feed, mut ui) = session().await;

        let first = handle_key(press(KeyCode::Char('l')), &mut feed, &mut ui, &ctx.store);
        assert_eq!(first.effects.len(), 1);
        let second = handle_key(press(KeyCode::Char('l')), &mut feed, &mut ui, &ctx.store);
        assert!(second.effects.is_empty());
    }

    #[tokio::test]
    async fn typing_a_post_submits_and_returns_to_feed() {
        let (_dir, ctx, mut feed, mut ui) = session().await;

        handle_key(press(KeyCode::Char('n')), &mut feed, &mut ui, &ctx.store);
        assert_eq!(ui.tab, Tab::Create);
        for c in "hola".chars() {
            handle_key(press(KeyCode::Char(c)), &mut feed, &mut ui, &ctx.store);
        }
        let action = handle_key(press(KeyCode::Enter), &mut feed, &mut ui, &ctx.store);

        assert!(matches!(action.effects.as_slice(), [Effect::CreatePost(p)] if p.content == "hola"));
        assert_eq!(ui.tab, Tab::Feed);
        assert!(ui.draft.is_empty());
        assert!(feed.is_creating());
    }

    #[tokio::test]
    async fn search_keys_filter_results() {
        let (_dir, ctx, mut feed, mut ui) = session().await;

        handle_key(press(KeyCode::Char('/')), &mut feed, &mut ui, &ctx.store);
        for c in "zzz".chars() {
            handle_key(press(KeyCode::Char(c)), &mut feed, &mut ui, &ctx.store);
        }
        assert!(ui.search_list.items.is_empty());

        for _ in 0..3 {
            handle_key(press(KeyCode::Backspace), &mut feed, &mut ui, &ctx.store);
        }
        for c in "DÍAS".chars() {
            handle_key(press(KeyCode::Char(c)), &mut feed, &mut ui, &ctx.store);
        }
        assert_eq!(ui.search_list.items.len(), 1);
        // 'q' is part of the query here, not quit.
        assert!(!handle_key(press(KeyCode::Char('q')), &mut feed, &mut ui, &ctx.store).quit);
    }

    #[tokio::test]
    async fn thread_keys_open_comment_and_close() {
        let (_dir, ctx, mut feed, mut ui) = session().await;

        let open = handle_key(press(KeyCode::Char('c')), &mut feed, &mut ui, &ctx.store);
        assert!(matches!(open.effects.as_slice(), [Effect::FetchComments { .. }]));
        assert!(feed.selected_post().is_some());

        handle_key(press(KeyCode::Char('i')), &mut feed, &mut ui, &ctx.store);
        for c in "ok".chars() {
            handle_key(press(KeyCode::Char(c)), &mut feed, &mut ui, &ctx.store);
        }
        let sent = handle_key(press(KeyCode::Enter), &mut feed, &mut ui, &ctx.store);
        assert!(matches!(sent.effects.as_slice(), [Effect::InsertComment(c)] if c.content == "ok"));
        assert!(!ui.typing_comment);

        handle_key(press(KeyCode::Esc), &mut feed, &mut ui, &ctx.store);
        assert!(feed.selected_post().is_none());
        assert!(handle_key(press(KeyCode::Esc), &mut feed, &mut ui, &ctx.store).quit);
    }

    #[tokio::test]
    async fn banner_dismissal_is_remembered() {
        let (_dir, ctx, mut feed, mut ui) = session().await;
        assert!(ui.banner.message().is_some());

        handle_key(press(KeyCode::Char('x')), &mut feed, &mut ui, &ctx.store);
        assert!(ui.banner.message().is_none());
        assert!(WelcomeBanner::load(&ctx.store, Instant::now()).message().is_none());
    }
}
